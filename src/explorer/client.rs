use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ExplorerConfig;
use crate::error::ApiError;
use crate::explorer::{PageRequest, RequestCadence, TransactionSource};
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::{RawPage, RawTransactionRecord, TransactionCategory};
use crate::retry::{RetryConfig, RetryManager};

/// `{status, message, result}` envelope returned by Etherscan-style APIs
#[derive(Debug, Deserialize)]
struct ExplorerEnvelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

/// Rate-limited HTTP client for an Etherscan-compatible explorer
#[derive(Clone)]
pub struct ExplorerClient {
    client: Client,
    api_url: String,
    api_key: String,
    timeout_seconds: u64,
    cadence: Arc<RequestCadence>,
    retry: RetryConfig,
}

impl ExplorerClient {
    pub fn new(config: &ExplorerConfig, retry: RetryConfig) -> Result<Self, ApiError> {
        let cadence = Arc::new(RequestCadence::from_millis(config.rate_limit_ms));
        Self::with_cadence(config, retry, cadence)
    }

    /// Build a client that shares an existing cadence limiter
    pub fn with_cadence(
        config: &ExplorerConfig,
        retry: RetryConfig,
        cadence: Arc<RequestCadence>,
    ) -> Result<Self, ApiError> {
        LogContext::new("explorer_client", "initialization")
            .with_metadata("api_url", serde_json::json!(config.api_url))
            .with_metadata("timeout_seconds", serde_json::json!(config.timeout_seconds))
            .with_metadata("rate_limit_ms", serde_json::json!(cadence.period().as_millis() as u64))
            .with_metadata("max_attempts", serde_json::json!(retry.max_attempts))
            .info("Initializing explorer client");

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            timeout_seconds: config.timeout_seconds,
            cadence,
            retry,
        })
    }

    pub fn cadence(&self) -> Arc<RequestCadence> {
        self.cadence.clone()
    }

    /// One HTTP attempt, throttled by the shared cadence
    async fn request_page(
        &self,
        category: TransactionCategory,
        request: &PageRequest,
    ) -> Result<RawPage, ApiError> {
        self.cadence.until_ready().await;

        let monitor = PerformanceMonitor::new(&format!("explorer_{}", category.action()))
            .with_metadata("start_block", serde_json::json!(request.start_block));

        let result = self.send(category, request).await;

        MetricsLogger::log_api_call(category, monitor.elapsed_ms(), result.is_ok());
        monitor.finish_with_result(&result);
        result
    }

    async fn send(&self, category: TransactionCategory, request: &PageRequest) -> Result<RawPage, ApiError> {
        let start_block = request.start_block.to_string();
        let end_block = request
            .end_block
            .map(|block| block.to_string())
            .unwrap_or_else(|| "latest".to_string());
        let offset = request.page_size.to_string();

        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("module", "account"),
                ("action", category.action()),
                ("address", request.address.as_str()),
                ("startblock", start_block.as_str()),
                ("endblock", end_block.as_str()),
                ("page", "1"),
                ("offset", offset.as_str()),
                ("sort", "asc"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        check_status(response.status())?;

        let body = response.text().await.map_err(|e| self.classify_transport(e))?;
        let envelope: ExplorerEnvelope = serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("{} response is not JSON: {}", category.action(), e)))?;

        parse_envelope(category, envelope)
    }

    fn classify_transport(&self, error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout {
                seconds: self.timeout_seconds,
            }
        } else {
            ApiError::Transport(error)
        }
    }
}

#[async_trait]
impl TransactionSource for ExplorerClient {
    async fn fetch_page(
        &self,
        category: TransactionCategory,
        request: &PageRequest,
    ) -> Result<RawPage, ApiError> {
        let retry_manager = RetryManager::new(category.action(), self.retry.clone());
        retry_manager
            .execute(category, || self.request_page(category, request))
            .await
    }
}

fn check_status(status: StatusCode) -> Result<(), ApiError> {
    if status.is_success() {
        return Ok(());
    }

    match status.as_u16() {
        429 => Err(ApiError::RateLimited(format!("HTTP {}", status))),
        401 | 403 => Err(ApiError::Authentication(format!("HTTP {}", status))),
        code if status.is_client_error() => Err(ApiError::InvalidRequest(format!("HTTP {}", code))),
        code => Err(ApiError::HttpStatus { status: code }),
    }
}

fn parse_envelope(category: TransactionCategory, envelope: ExplorerEnvelope) -> Result<RawPage, ApiError> {
    match (envelope.status.as_str(), envelope.result) {
        ("1", Value::Array(items)) => parse_records(category, items),
        ("0", Value::Array(items)) if items.is_empty() => Ok(RawPage::default()),
        ("0", result) => {
            let detail = match result {
                Value::String(text) => text,
                _ => String::new(),
            };
            classify_provider_error(&envelope.message, &detail)
        }
        (status, _) => Err(ApiError::InvalidResponse(format!(
            "{} returned unexpected envelope (status {:?}, message {:?})",
            category.action(),
            status,
            envelope.message
        ))),
    }
}

fn parse_records(category: TransactionCategory, items: Vec<Value>) -> Result<RawPage, ApiError> {
    let records = items
        .into_iter()
        .map(|item| RawTransactionRecord::from_value(category, item))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::InvalidResponse(format!("{} record has unexpected shape: {}", category.action(), e)))?;

    Ok(RawPage { records })
}

/// Map a `status: "0"` envelope to either an empty page or a typed error
fn classify_provider_error(message: &str, detail: &str) -> Result<RawPage, ApiError> {
    let combined = format!("{} {}", message, detail).to_lowercase();
    let text = if detail.is_empty() { message } else { detail }.to_string();

    if combined.contains("no transactions found") || combined.contains("no records found") {
        return Ok(RawPage::default());
    }

    if combined.contains("rate limit") || combined.contains("max calls per sec") || combined.contains("too many") {
        return Err(ApiError::RateLimited(text));
    }

    if combined.contains("api key") || combined.contains("apikey") {
        return Err(ApiError::Authentication(text));
    }

    Err(ApiError::InvalidRequest(text))
}
