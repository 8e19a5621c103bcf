use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::Address;

/// The five independently paginated transaction categories, in fetch order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionCategory {
    Normal,
    Internal,
    Erc20,
    Erc721,
    Erc1155,
}

impl TransactionCategory {
    /// Fixed, deterministic fetch order
    pub const ALL: [TransactionCategory; 5] = [
        TransactionCategory::Normal,
        TransactionCategory::Internal,
        TransactionCategory::Erc20,
        TransactionCategory::Erc721,
        TransactionCategory::Erc1155,
    ];

    /// Explorer `action` query parameter for this category
    pub fn action(&self) -> &'static str {
        match self {
            TransactionCategory::Normal => "txlist",
            TransactionCategory::Internal => "txlistinternal",
            TransactionCategory::Erc20 => "tokentx",
            TransactionCategory::Erc721 => "tokennfttx",
            TransactionCategory::Erc1155 => "token1155tx",
        }
    }

    /// Human-readable transaction type label
    pub fn label(&self) -> &'static str {
        match self {
            TransactionCategory::Normal => "ETH Transfer",
            TransactionCategory::Internal => "Internal Transfer",
            TransactionCategory::Erc20 => "ERC-20 Transfer",
            TransactionCategory::Erc721 => "ERC-721 Transfer",
            TransactionCategory::Erc1155 => "ERC-1155 Transfer",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionCategory::Normal => "normal",
            TransactionCategory::Internal => "internal",
            TransactionCategory::Erc20 => "erc20",
            TransactionCategory::Erc721 => "erc721",
            TransactionCategory::Erc1155 => "erc1155",
        }
    }
}

impl fmt::Display for TransactionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "normal" | "txlist" => Ok(TransactionCategory::Normal),
            "internal" | "txlistinternal" => Ok(TransactionCategory::Internal),
            "erc20" | "tokentx" => Ok(TransactionCategory::Erc20),
            "erc721" | "tokennfttx" => Ok(TransactionCategory::Erc721),
            "erc1155" | "token1155tx" => Ok(TransactionCategory::Erc1155),
            other => Err(format!("unknown transaction category: {}", other)),
        }
    }
}

/// How `amount` was scaled from the provider's raw integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmountUnit {
    /// Wei divided by 10^18
    Ether,
    /// Token base units divided by 10^n
    Decimals(u32),
    /// Whole token counts (NFT transfers)
    Units,
    /// Token without a decimals field; raw integer reported as-is
    Unscaled,
}

impl fmt::Display for AmountUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountUnit::Ether => f.write_str("ether"),
            AmountUnit::Decimals(n) => write!(f, "decimals:{}", n),
            AmountUnit::Units => f.write_str("units"),
            AmountUnit::Unscaled => f.write_str("unscaled"),
        }
    }
}

/// Identity of a record across overlapping pages
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub hash: String,
    pub category: TransactionCategory,
    pub token_id: Option<String>,
    pub log_index: Option<String>,
}

/// Canonical, unit-adjusted transaction record shared by all categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTransaction {
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub from_address: Address,
    pub to_address: Address,
    pub category: TransactionCategory,
    pub contract_address: Option<Address>,
    pub asset_symbol: Option<String>,
    pub asset_name: Option<String>,
    pub token_id: Option<String>,
    pub amount: BigDecimal,
    pub amount_unit: AmountUnit,
    pub gas_fee_eth: BigDecimal,
    pub block_number: u64,
    /// Position of the parent transaction in its block; internal transfers have none
    pub index_in_block: Option<u64>,
    /// `logIndex` for token transfers, `traceId` for internal transfers
    pub log_index: Option<String>,
    pub is_error: bool,
}

impl NormalizedTransaction {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            hash: self.hash.clone(),
            category: self.category,
            token_id: self.token_id.clone(),
            log_index: self.log_index.clone(),
        }
    }

    pub fn transaction_type(&self) -> &'static str {
        self.category.label()
    }
}
