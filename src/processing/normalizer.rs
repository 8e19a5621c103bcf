use bigdecimal::BigDecimal;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;

use crate::error::RecordError;
use crate::logging::LogContext;
use crate::models::raw::clean;
use crate::models::{
    Address, AmountUnit, DedupKey, Erc1155TransferRecord, Erc20TransferRecord, Erc721TransferRecord,
    InternalTransactionRecord, NormalTransactionRecord, NormalizedTransaction, RawTransactionRecord,
    RecordWarning, TransactionCategory,
};
use crate::processing::units::{parse_integer, scale_down, wei_to_ether};

/// Records that survived normalization for one category, plus what was dropped
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub transactions: Vec<NormalizedTransaction>,
    pub warnings: Vec<RecordWarning>,
    pub duplicates_removed: usize,
}

/// Turns provider-native records into the canonical transaction shape
#[derive(Debug, Default)]
pub struct TransactionNormalizer {
    seen: HashSet<DedupKey>,
}

impl TransactionNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a category's records, excluding malformed ones and any
    /// record whose dedup key was already emitted by this normalizer.
    pub fn normalize_batch(&mut self, records: Vec<RawTransactionRecord>) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();

        for record in records {
            match normalize(&record) {
                Ok(transaction) => {
                    if self.seen.insert(transaction.dedup_key()) {
                        batch.transactions.push(transaction);
                    } else {
                        batch.duplicates_removed += 1;
                    }
                }
                Err(error) => {
                    let warning = RecordWarning {
                        category: record.category(),
                        hash: clean(record.hash()).map(str::to_string),
                        block_number: record.block_number(),
                        error,
                    };
                    LogContext::new("normalizer", "normalize")
                        .with_category(warning.category)
                        .with_metadata("hash", serde_json::json!(warning.hash))
                        .warn(&format!("Skipping malformed record: {}", warning.error));
                    batch.warnings.push(warning);
                }
            }
        }

        batch
    }
}

/// Normalize a single raw record
pub fn normalize(record: &RawTransactionRecord) -> Result<NormalizedTransaction, RecordError> {
    match record {
        RawTransactionRecord::Normal(r) => normalize_normal(r),
        RawTransactionRecord::Internal(r) => normalize_internal(r),
        RawTransactionRecord::Erc20(r) => normalize_erc20(r),
        RawTransactionRecord::Erc721(r) => normalize_erc721(r),
        RawTransactionRecord::Erc1155(r) => normalize_erc1155(r),
    }
}

/// Fields every category shares
struct Common {
    hash: String,
    timestamp: DateTime<Utc>,
    block_number: u64,
    from_address: Address,
}

fn common(
    hash: &Option<String>,
    time_stamp: &Option<String>,
    block_number: &Option<String>,
    from: &Option<String>,
) -> Result<Common, RecordError> {
    let hash = clean(hash.as_deref())
        .ok_or(RecordError::MissingField { field: "hash" })?
        .to_ascii_lowercase();

    let block_raw = required(block_number, "blockNumber")?;
    let block_number = block_raw.parse::<u64>().map_err(|_| RecordError::InvalidNumber {
        field: "blockNumber",
        value: block_raw.to_string(),
    })?;

    Ok(Common {
        hash,
        timestamp: parse_timestamp(time_stamp)?,
        block_number,
        from_address: parse_address(from, "from")?,
    })
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, RecordError> {
    clean(value.as_deref()).ok_or(RecordError::MissingField { field })
}

fn optional_text(value: &Option<String>) -> Option<String> {
    clean(value.as_deref()).map(str::to_string)
}

fn parse_timestamp(value: &Option<String>) -> Result<DateTime<Utc>, RecordError> {
    let raw = clean(value.as_deref()).ok_or(RecordError::MissingField { field: "timeStamp" })?;
    let seconds = raw
        .parse::<i64>()
        .map_err(|_| RecordError::InvalidTimestamp(raw.to_string()))?;

    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| RecordError::InvalidTimestamp(raw.to_string()))
}

fn parse_address(value: &Option<String>, field: &'static str) -> Result<Address, RecordError> {
    let raw = required(value, field)?;
    Address::parse(raw).map_err(|_| RecordError::InvalidAddress {
        field,
        value: raw.to_string(),
    })
}

fn parse_optional_address(value: &Option<String>, field: &'static str) -> Result<Option<Address>, RecordError> {
    match clean(value.as_deref()) {
        Some(_) => parse_address(value, field).map(Some),
        None => Ok(None),
    }
}

/// Contract creations have an empty `to`; the created contract stands in for it
fn resolve_recipient(to: &Option<String>, contract: &Option<Address>) -> Result<Address, RecordError> {
    match (clean(to.as_deref()), contract) {
        (None, Some(created)) => Ok(created.clone()),
        _ => parse_address(to, "to"),
    }
}

fn parse_index(value: &Option<String>, field: &'static str) -> Result<Option<u64>, RecordError> {
    match clean(value.as_deref()) {
        Some(raw) => raw.parse::<u64>().map(Some).map_err(|_| RecordError::InvalidNumber {
            field,
            value: raw.to_string(),
        }),
        None => Ok(None),
    }
}

/// `gasUsed × gasPrice` in ether; zero when either is absent
fn gas_fee(gas_used: &Option<String>, gas_price: &Option<String>) -> Result<BigDecimal, RecordError> {
    match (clean(gas_used.as_deref()), clean(gas_price.as_deref())) {
        (Some(used), Some(price)) => {
            let wei = parse_integer("gasUsed", used)? * parse_integer("gasPrice", price)?;
            Ok(wei_to_ether(wei))
        }
        _ => Ok(BigDecimal::default()),
    }
}

fn is_error_flag(value: &Option<String>) -> bool {
    clean(value.as_deref()) == Some("1")
}

fn normalize_normal(r: &NormalTransactionRecord) -> Result<NormalizedTransaction, RecordError> {
    let common = common(&r.hash, &r.time_stamp, &r.block_number, &r.from)?;
    let contract_address = parse_optional_address(&r.contract_address, "contractAddress")?;
    let to_address = resolve_recipient(&r.to, &contract_address)?;
    let amount = wei_to_ether(parse_integer("value", required(&r.value, "value")?)?);

    Ok(NormalizedTransaction {
        hash: common.hash,
        timestamp: common.timestamp,
        from_address: common.from_address,
        to_address,
        category: TransactionCategory::Normal,
        contract_address,
        asset_symbol: Some("ETH".to_string()),
        asset_name: Some("Ether".to_string()),
        token_id: None,
        amount,
        amount_unit: AmountUnit::Ether,
        gas_fee_eth: gas_fee(&r.gas_used, &r.gas_price)?,
        block_number: common.block_number,
        index_in_block: parse_index(&r.transaction_index, "transactionIndex")?,
        log_index: None,
        is_error: is_error_flag(&r.is_error),
    })
}

fn normalize_internal(r: &InternalTransactionRecord) -> Result<NormalizedTransaction, RecordError> {
    let common = common(&r.hash, &r.time_stamp, &r.block_number, &r.from)?;
    let contract_address = parse_optional_address(&r.contract_address, "contractAddress")?;
    let to_address = resolve_recipient(&r.to, &contract_address)?;
    let amount = wei_to_ether(parse_integer("value", required(&r.value, "value")?)?);

    Ok(NormalizedTransaction {
        hash: common.hash,
        timestamp: common.timestamp,
        from_address: common.from_address,
        to_address,
        category: TransactionCategory::Internal,
        contract_address,
        asset_symbol: Some("ETH".to_string()),
        asset_name: Some("Ether".to_string()),
        token_id: None,
        amount,
        amount_unit: AmountUnit::Ether,
        // Gas is paid by the parent transaction
        gas_fee_eth: BigDecimal::default(),
        block_number: common.block_number,
        index_in_block: None,
        log_index: optional_text(&r.trace_id),
        is_error: is_error_flag(&r.is_error),
    })
}

fn normalize_erc20(r: &Erc20TransferRecord) -> Result<NormalizedTransaction, RecordError> {
    let common = common(&r.hash, &r.time_stamp, &r.block_number, &r.from)?;
    let raw_amount = parse_integer("value", required(&r.value, "value")?)?;

    let (amount, amount_unit) = match clean(r.token_decimal.as_deref()) {
        Some(decimals) => {
            // ERC-20 `decimals()` is a uint8
            let decimals = u32::from(decimals.parse::<u8>().map_err(|_| RecordError::InvalidNumber {
                field: "tokenDecimal",
                value: decimals.to_string(),
            })?);
            (scale_down(raw_amount, decimals), AmountUnit::Decimals(decimals))
        }
        None => {
            LogContext::new("normalizer", "token_decimals")
                .with_transaction_hash(&common.hash)
                .with_metadata("contract_address", serde_json::json!(r.contract_address))
                .warn("Token has no decimals field, reporting unscaled amount");
            (raw_amount.normalized(), AmountUnit::Unscaled)
        }
    };

    Ok(NormalizedTransaction {
        hash: common.hash,
        timestamp: common.timestamp,
        from_address: common.from_address,
        to_address: parse_address(&r.to, "to")?,
        category: TransactionCategory::Erc20,
        contract_address: parse_optional_address(&r.contract_address, "contractAddress")?,
        asset_symbol: optional_text(&r.token_symbol),
        asset_name: optional_text(&r.token_name),
        token_id: None,
        amount,
        amount_unit,
        gas_fee_eth: gas_fee(&r.gas_used, &r.gas_price)?,
        block_number: common.block_number,
        index_in_block: parse_index(&r.transaction_index, "transactionIndex")?,
        log_index: optional_text(&r.log_index),
        is_error: false,
    })
}

fn normalize_erc721(r: &Erc721TransferRecord) -> Result<NormalizedTransaction, RecordError> {
    let common = common(&r.hash, &r.time_stamp, &r.block_number, &r.from)?;

    Ok(NormalizedTransaction {
        hash: common.hash,
        timestamp: common.timestamp,
        from_address: common.from_address,
        to_address: parse_address(&r.to, "to")?,
        category: TransactionCategory::Erc721,
        contract_address: parse_optional_address(&r.contract_address, "contractAddress")?,
        asset_symbol: optional_text(&r.token_symbol),
        asset_name: optional_text(&r.token_name),
        token_id: Some(required(&r.token_id, "tokenID")?.to_string()),
        amount: BigDecimal::from(1),
        amount_unit: AmountUnit::Units,
        gas_fee_eth: gas_fee(&r.gas_used, &r.gas_price)?,
        block_number: common.block_number,
        index_in_block: parse_index(&r.transaction_index, "transactionIndex")?,
        log_index: optional_text(&r.log_index),
        is_error: false,
    })
}

fn normalize_erc1155(r: &Erc1155TransferRecord) -> Result<NormalizedTransaction, RecordError> {
    let common = common(&r.hash, &r.time_stamp, &r.block_number, &r.from)?;
    let quantity = parse_integer("tokenValue", required(&r.token_value, "tokenValue")?)?;

    Ok(NormalizedTransaction {
        hash: common.hash,
        timestamp: common.timestamp,
        from_address: common.from_address,
        to_address: parse_address(&r.to, "to")?,
        category: TransactionCategory::Erc1155,
        contract_address: parse_optional_address(&r.contract_address, "contractAddress")?,
        asset_symbol: optional_text(&r.token_symbol),
        asset_name: optional_text(&r.token_name),
        token_id: Some(required(&r.token_id, "tokenID")?.to_string()),
        amount: quantity.normalized(),
        amount_unit: AmountUnit::Units,
        gas_fee_eth: gas_fee(&r.gas_used, &r.gas_price)?,
        block_number: common.block_number,
        index_in_block: parse_index(&r.transaction_index, "transactionIndex")?,
        log_index: optional_text(&r.log_index),
        is_error: false,
    })
}
