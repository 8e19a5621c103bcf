use serde::Deserialize;
use serde_json::Value;

use crate::models::{DedupKey, TransactionCategory};

/// `txlist` record
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NormalTransactionRecord {
    pub block_number: Option<String>,
    pub time_stamp: Option<String>,
    pub hash: Option<String>,
    pub transaction_index: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: Option<String>,
    pub contract_address: Option<String>,
    pub gas: Option<String>,
    pub gas_price: Option<String>,
    pub gas_used: Option<String>,
    pub is_error: Option<String>,
}

/// `txlistinternal` record. Internal calls carry no gas price of their own.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InternalTransactionRecord {
    pub block_number: Option<String>,
    pub time_stamp: Option<String>,
    pub hash: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: Option<String>,
    pub contract_address: Option<String>,
    pub gas: Option<String>,
    pub gas_used: Option<String>,
    pub trace_id: Option<String>,
    pub is_error: Option<String>,
}

/// `tokentx` record
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Erc20TransferRecord {
    pub block_number: Option<String>,
    pub time_stamp: Option<String>,
    pub hash: Option<String>,
    pub transaction_index: Option<String>,
    pub log_index: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: Option<String>,
    pub contract_address: Option<String>,
    pub token_name: Option<String>,
    pub token_symbol: Option<String>,
    pub token_decimal: Option<String>,
    pub gas_price: Option<String>,
    pub gas_used: Option<String>,
}

/// `tokennfttx` record
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Erc721TransferRecord {
    pub block_number: Option<String>,
    pub time_stamp: Option<String>,
    pub hash: Option<String>,
    pub transaction_index: Option<String>,
    pub log_index: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(rename = "tokenID")]
    pub token_id: Option<String>,
    pub contract_address: Option<String>,
    pub token_name: Option<String>,
    pub token_symbol: Option<String>,
    pub gas_price: Option<String>,
    pub gas_used: Option<String>,
}

/// `token1155tx` record; carries a token id and the transferred quantity
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Erc1155TransferRecord {
    pub block_number: Option<String>,
    pub time_stamp: Option<String>,
    pub hash: Option<String>,
    pub transaction_index: Option<String>,
    pub log_index: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(rename = "tokenID")]
    pub token_id: Option<String>,
    pub token_value: Option<String>,
    pub contract_address: Option<String>,
    pub token_name: Option<String>,
    pub token_symbol: Option<String>,
    pub gas_price: Option<String>,
    pub gas_used: Option<String>,
}

/// Provider-native record, tagged by the category it was fetched under
#[derive(Debug, Clone, PartialEq)]
pub enum RawTransactionRecord {
    Normal(NormalTransactionRecord),
    Internal(InternalTransactionRecord),
    Erc20(Erc20TransferRecord),
    Erc721(Erc721TransferRecord),
    Erc1155(Erc1155TransferRecord),
}

impl RawTransactionRecord {
    /// Parse one element of the explorer's `result` array with the parser for `category`
    pub fn from_value(category: TransactionCategory, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match category {
            TransactionCategory::Normal => Self::Normal(serde_json::from_value(value)?),
            TransactionCategory::Internal => Self::Internal(serde_json::from_value(value)?),
            TransactionCategory::Erc20 => Self::Erc20(serde_json::from_value(value)?),
            TransactionCategory::Erc721 => Self::Erc721(serde_json::from_value(value)?),
            TransactionCategory::Erc1155 => Self::Erc1155(serde_json::from_value(value)?),
        })
    }

    pub fn category(&self) -> TransactionCategory {
        match self {
            Self::Normal(_) => TransactionCategory::Normal,
            Self::Internal(_) => TransactionCategory::Internal,
            Self::Erc20(_) => TransactionCategory::Erc20,
            Self::Erc721(_) => TransactionCategory::Erc721,
            Self::Erc1155(_) => TransactionCategory::Erc1155,
        }
    }

    pub fn hash(&self) -> Option<&str> {
        match self {
            Self::Normal(r) => r.hash.as_deref(),
            Self::Internal(r) => r.hash.as_deref(),
            Self::Erc20(r) => r.hash.as_deref(),
            Self::Erc721(r) => r.hash.as_deref(),
            Self::Erc1155(r) => r.hash.as_deref(),
        }
    }

    pub fn block_number(&self) -> Option<u64> {
        let raw = match self {
            Self::Normal(r) => r.block_number.as_deref(),
            Self::Internal(r) => r.block_number.as_deref(),
            Self::Erc20(r) => r.block_number.as_deref(),
            Self::Erc721(r) => r.block_number.as_deref(),
            Self::Erc1155(r) => r.block_number.as_deref(),
        };
        raw.and_then(|b| b.trim().parse().ok())
    }

    pub fn token_id(&self) -> Option<&str> {
        match self {
            Self::Erc721(r) => r.token_id.as_deref(),
            Self::Erc1155(r) => r.token_id.as_deref(),
            _ => None,
        }
    }

    /// `logIndex` for token transfers, `traceId` for internal calls
    pub fn log_index(&self) -> Option<&str> {
        match self {
            Self::Normal(_) => None,
            Self::Internal(r) => r.trace_id.as_deref(),
            Self::Erc20(r) => r.log_index.as_deref(),
            Self::Erc721(r) => r.log_index.as_deref(),
            Self::Erc1155(r) => r.log_index.as_deref(),
        }
    }

    /// Same key the normalized record produces, so overlap can be detected before normalization
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            hash: clean(self.hash()).unwrap_or_default().to_ascii_lowercase(),
            category: self.category(),
            token_id: clean(self.token_id()).map(str::to_string),
            log_index: clean(self.log_index()).map(str::to_string),
        }
    }
}

/// Treat empty strings from the provider as absent
pub(crate) fn clean(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// One page of raw records for a single category
#[derive(Debug, Clone, Default)]
pub struct RawPage {
    pub records: Vec<RawTransactionRecord>,
}

impl RawPage {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
