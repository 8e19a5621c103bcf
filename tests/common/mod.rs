#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use eth_tx_exporter::config::ExplorerConfig;
use eth_tx_exporter::explorer::ExplorerClient;
use eth_tx_exporter::models::Address;
use eth_tx_exporter::pipeline::{FetchConfig, TransactionPipeline};
use eth_tx_exporter::retry::RetryConfig;

pub const TARGET: &str = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";
pub const COUNTERPARTY: &str = "0x9aa99c23f67c81701c772b106b4f83f6e858dd2e";
pub const TOKEN_CONTRACT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";

pub fn target() -> Address {
    Address::parse(TARGET).unwrap()
}

pub fn explorer_config(server: &MockServer) -> ExplorerConfig {
    ExplorerConfig {
        api_url: format!("{}/api", server.uri()),
        api_key: "TESTKEY".to_string(),
        timeout_seconds: 5,
        rate_limit_ms: 0,
        ..ExplorerConfig::default()
    }
}

pub fn client(server: &MockServer) -> ExplorerClient {
    ExplorerClient::new(&explorer_config(server), RetryConfig::for_tests()).unwrap()
}

pub fn pipeline(server: &MockServer, config: FetchConfig) -> TransactionPipeline {
    TransactionPipeline::new(Arc::new(client(server)), config)
}

pub fn timestamp_for(block: u64) -> String {
    (1_650_000_000 + block * 12).to_string()
}

pub fn normal_tx(block: u64, index: u64, hash: &str) -> Value {
    json!({
        "blockNumber": block.to_string(),
        "timeStamp": timestamp_for(block),
        "hash": hash,
        "nonce": "1",
        "transactionIndex": index.to_string(),
        "from": COUNTERPARTY,
        "to": TARGET,
        "value": "250000000000000000",
        "gas": "21000",
        "gasPrice": "10000000000",
        "gasUsed": "21000",
        "isError": "0",
        "txreceipt_status": "1",
        "contractAddress": "",
        "input": "0x"
    })
}

pub fn erc20_tx(block: u64, hash: &str, log_index: &str) -> Value {
    json!({
        "blockNumber": block.to_string(),
        "timeStamp": timestamp_for(block),
        "hash": hash,
        "logIndex": log_index,
        "from": TARGET,
        "to": COUNTERPARTY,
        "contractAddress": TOKEN_CONTRACT,
        "value": "1500000",
        "tokenName": "Tether USD",
        "tokenSymbol": "USDT",
        "tokenDecimal": "6",
        "transactionIndex": "4",
        "gas": "60000",
        "gasPrice": "10000000000",
        "gasUsed": "45000"
    })
}

pub fn ok_envelope(records: Vec<Value>) -> Value {
    json!({"status": "1", "message": "OK", "result": records})
}

pub fn empty_envelope() -> Value {
    json!({"status": "0", "message": "No transactions found", "result": []})
}

pub fn error_envelope(result: &str) -> Value {
    json!({"status": "0", "message": "NOTOK", "result": result})
}

pub fn respond_json(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

/// Serve `body` for every request of `action`
pub async fn mount_action(server: &MockServer, action: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("action", action))
        .respond_with(respond_json(body))
        .mount(server)
        .await;
}

/// Serve `body` for requests of `action` starting at `start_block`, expecting exactly `times` calls
pub async fn mount_page(server: &MockServer, action: &str, start_block: u64, body: Value, times: u64) {
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("action", action))
        .and(query_param("startblock", start_block.to_string().as_str()))
        .respond_with(respond_json(body))
        .expect(times)
        .mount(server)
        .await;
}
