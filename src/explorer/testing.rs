//! In-memory explorer used by unit tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::ApiError;
use crate::explorer::{PageRequest, TransactionSource};
use crate::models::{Address, RawPage, RawTransactionRecord, TransactionCategory};

pub(crate) const COUNTERPARTY: &str = "0x9aa99c23f67c81701c772b106b4f83f6e858dd2e";
pub(crate) const TOKEN_CONTRACT: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

pub(crate) fn test_address() -> Address {
    Address::parse("0xd8da6bf26964af9d7eed9e03e53415d37aa96045").unwrap()
}

pub(crate) fn timestamp_for(block: u64) -> u64 {
    1_600_000_000 + block * 12
}

fn parse(category: TransactionCategory, value: Value) -> RawTransactionRecord {
    RawTransactionRecord::from_value(category, value).unwrap()
}

pub(crate) fn normal_json(block: u64, index: u64, hash: &str) -> Value {
    json!({
        "blockNumber": block.to_string(),
        "timeStamp": timestamp_for(block).to_string(),
        "hash": hash,
        "transactionIndex": index.to_string(),
        "from": COUNTERPARTY,
        "to": test_address().as_str(),
        "value": "1000000000000000000",
        "contractAddress": "",
        "gas": "21000",
        "gasPrice": "20000000000",
        "gasUsed": "21000",
        "isError": "0"
    })
}

pub(crate) fn normal_record(block: u64, index: u64, hash: &str) -> RawTransactionRecord {
    parse(TransactionCategory::Normal, normal_json(block, index, hash))
}

pub(crate) fn internal_record(block: u64, hash: &str, trace_id: &str) -> RawTransactionRecord {
    parse(
        TransactionCategory::Internal,
        json!({
            "blockNumber": block.to_string(),
            "timeStamp": timestamp_for(block).to_string(),
            "hash": hash,
            "from": TOKEN_CONTRACT,
            "to": test_address().as_str(),
            "value": "500000000000000000",
            "contractAddress": "",
            "gas": "2300",
            "gasUsed": "0",
            "traceId": trace_id,
            "isError": "0"
        }),
    )
}

pub(crate) fn token_json(category: TransactionCategory, block: u64, hash: &str, log_index: &str) -> Value {
    let mut value = json!({
        "blockNumber": block.to_string(),
        "timeStamp": timestamp_for(block).to_string(),
        "hash": hash,
        "transactionIndex": "7",
        "logIndex": log_index,
        "from": COUNTERPARTY,
        "to": test_address().as_str(),
        "contractAddress": TOKEN_CONTRACT,
        "tokenName": "USD Coin",
        "tokenSymbol": "USDC",
        "gasPrice": "30000000000",
        "gasUsed": "50000"
    });

    match category {
        TransactionCategory::Erc20 => {
            value["value"] = json!("2500000");
            value["tokenDecimal"] = json!("6");
        }
        TransactionCategory::Erc721 => {
            value["tokenID"] = json!("42");
            value["tokenName"] = json!("Test Punks");
            value["tokenSymbol"] = json!("TPUNK");
        }
        TransactionCategory::Erc1155 => {
            value["tokenID"] = json!("7");
            value["tokenValue"] = json!("3");
            value["tokenName"] = json!("Test Items");
            value["tokenSymbol"] = json!("ITEM");
        }
        _ => {}
    }

    value
}

pub(crate) fn token_record(
    category: TransactionCategory,
    block: u64,
    hash: &str,
    log_index: &str,
) -> RawTransactionRecord {
    parse(category, token_json(category, block, hash, log_index))
}

/// Failure injected once a category has served a number of pages
#[derive(Debug, Clone, Copy)]
pub(crate) enum Failure {
    InvalidRequest,
    Authentication,
    Exhausted,
}

impl Failure {
    fn to_error(self, category: TransactionCategory) -> ApiError {
        match self {
            Failure::InvalidRequest => ApiError::InvalidRequest("Error! Invalid address format".to_string()),
            Failure::Authentication => ApiError::Authentication("Invalid API Key".to_string()),
            Failure::Exhausted => ApiError::RetriesExhausted {
                category,
                attempts: 3,
                last_cause: Box::new(ApiError::HttpStatus { status: 503 }),
            },
        }
    }
}

/// Serves pages from fixed per-category record lists, like an explorer sorted ascending by block
#[derive(Default)]
pub(crate) struct ScriptedSource {
    data: HashMap<TransactionCategory, Vec<RawTransactionRecord>>,
    failures: HashMap<TransactionCategory, (u32, Failure)>,
    calls: Mutex<Vec<(TransactionCategory, PageRequest)>>,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_records(mut self, category: TransactionCategory, records: Vec<RawTransactionRecord>) -> Self {
        self.data.insert(category, records);
        self
    }

    pub(crate) fn fail_after(mut self, category: TransactionCategory, pages: u32, failure: Failure) -> Self {
        self.failures.insert(category, (pages, failure));
        self
    }

    pub(crate) fn call_count(&self, category: TransactionCategory) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == category)
            .count()
    }

    pub(crate) fn start_blocks(&self, category: TransactionCategory) -> Vec<u64> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == category)
            .map(|(_, request)| request.start_block)
            .collect()
    }
}

#[async_trait]
impl TransactionSource for ScriptedSource {
    async fn fetch_page(&self, category: TransactionCategory, request: &PageRequest) -> Result<RawPage, ApiError> {
        let served = {
            let mut calls = self.calls.lock().unwrap();
            let served = calls.iter().filter(|(c, _)| *c == category).count() as u32;
            calls.push((category, request.clone()));
            served
        };

        if let Some((after, failure)) = self.failures.get(&category) {
            if served >= *after {
                return Err(failure.to_error(category));
            }
        }

        let records = self
            .data
            .get(&category)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| {
                        let block = r.block_number().unwrap_or(0);
                        block >= request.start_block && request.end_block.map_or(true, |end| block <= end)
                    })
                    .take(request.page_size)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(RawPage { records })
    }
}
