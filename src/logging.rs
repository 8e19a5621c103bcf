use log::{debug, error, info, trace, warn};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::LoggingConfig;
use crate::error::{ApiError, ErrorSeverity, ExporterError};
use crate::models::{CategoryReport, TransactionCategory};

/// Structured logging context for the exporter
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub metadata: HashMap<String, Value>,
}

impl LogContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_category(self, category: TransactionCategory) -> Self {
        self.with_metadata("category", json!(category.as_str()))
    }

    pub fn with_block_number(self, block_number: u64) -> Self {
        self.with_metadata("block_number", json!(block_number))
    }

    pub fn with_transaction_hash(self, tx_hash: &str) -> Self {
        self.with_metadata("transaction_hash", json!(tx_hash))
    }

    pub fn with_address(self, address: &str) -> Self {
        self.with_metadata("address", json!(address))
    }

    pub fn with_duration_ms(self, duration_ms: u64) -> Self {
        self.with_metadata("duration_ms", json!(duration_ms))
    }

    pub fn with_retry_count(self, retry_count: u32) -> Self {
        self.with_metadata("retry_count", json!(retry_count))
    }

    fn format_message(&self, level: &str, message: &str) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut log_entry = json!({
            "timestamp": timestamp,
            "level": level,
            "component": self.component,
            "operation": self.operation,
            "message": message,
        });

        for (key, value) in &self.metadata {
            log_entry[key] = value.clone();
        }

        log_entry.to_string()
    }

    pub fn info(&self, message: &str) {
        info!("{}", self.format_message("INFO", message));
    }

    pub fn warn(&self, message: &str) {
        warn!("{}", self.format_message("WARN", message));
    }

    pub fn error(&self, message: &str) {
        error!("{}", self.format_message("ERROR", message));
    }

    pub fn debug(&self, message: &str) {
        debug!("{}", self.format_message("DEBUG", message));
    }

    pub fn trace(&self, message: &str) {
        trace!("{}", self.format_message("TRACE", message));
    }
}

/// Times an operation and logs its duration when finished
pub struct PerformanceMonitor {
    pub start_time: SystemTime,
    operation: String,
    metadata: HashMap<String, Value>,
}

impl PerformanceMonitor {
    pub fn new(operation: &str) -> Self {
        Self {
            start_time: SystemTime::now(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().unwrap_or_default().as_millis() as u64
    }

    fn context(&mut self, duration: u64) -> LogContext {
        let mut context = LogContext::new("performance", &self.operation).with_duration_ms(duration);
        for (key, value) in self.metadata.drain() {
            context = context.with_metadata(&key, value);
        }
        context
    }

    pub fn finish(mut self) -> u64 {
        let duration = self.elapsed_ms();
        self.context(duration)
            .debug(&format!("Operation completed in {}ms", duration));
        duration
    }

    pub fn finish_with_result<T, E>(mut self, result: &Result<T, E>) -> u64
    where
        E: std::fmt::Display,
    {
        let duration = self.elapsed_ms();
        let context = self.context(duration);

        match result {
            Ok(_) => {
                context.debug(&format!("Operation completed successfully in {}ms", duration));
            }
            Err(e) => {
                context
                    .with_metadata("error", json!(e.to_string()))
                    .warn(&format!("Operation failed after {}ms: {}", duration, e));
            }
        }

        duration
    }
}

/// Error logging utilities
pub struct ErrorLogger;

impl ErrorLogger {
    pub fn log_error(error: &ExporterError, context: Option<LogContext>) {
        let severity = error.severity();

        let mut log_context = context.unwrap_or_else(|| LogContext::new("error", "unknown"));
        log_context = log_context
            .with_metadata("error_type", json!(format!("{:?}", error)))
            .with_metadata("severity", json!(format!("{:?}", severity)))
            .with_metadata("recoverable", json!(error.is_recoverable()));

        let message = format!("Error occurred: {}", error);

        match severity {
            ErrorSeverity::Critical | ErrorSeverity::High => log_context.error(&message),
            ErrorSeverity::Medium => log_context.warn(&message),
            ErrorSeverity::Low => log_context.info(&message),
        }
    }

    pub fn log_recovery_attempt(error: &ApiError, attempt: u32, max_attempts: u32) {
        let mut context = LogContext::new("recovery", "retry_attempt")
            .with_retry_count(attempt)
            .with_metadata("max_attempts", json!(max_attempts))
            .with_metadata("error_type", json!(format!("{:?}", error)));

        if let Some(delay) = error.retry_delay_ms() {
            context = context.with_metadata("min_retry_delay_ms", json!(delay));
        }

        if attempt == max_attempts {
            context.error(&format!("Final retry attempt failed: {}", error));
        } else {
            context.warn(&format!("Retry attempt {} of {}: {}", attempt, max_attempts, error));
        }
    }

    pub fn log_recovery_success(operation: &str, attempts: u32, total_duration_ms: u64) {
        let context = LogContext::new("recovery", "success")
            .with_metadata("operation", json!(operation))
            .with_retry_count(attempts)
            .with_duration_ms(total_duration_ms);

        context.info(&format!(
            "Operation recovered after {} attempts in {}ms",
            attempts, total_duration_ms
        ));
    }
}

/// Progress notifications for the fetch pipeline
pub struct MetricsLogger;

impl MetricsLogger {
    pub fn log_api_call(category: TransactionCategory, duration_ms: u64, success: bool) {
        let context = LogContext::new("metrics", "api_call")
            .with_category(category)
            .with_metadata("action", json!(category.action()))
            .with_duration_ms(duration_ms)
            .with_metadata("success", json!(success));

        if success {
            context.debug(&format!("{} call completed in {}ms", category.action(), duration_ms));
        } else {
            context.warn(&format!("{} call failed after {}ms", category.action(), duration_ms));
        }
    }

    pub fn log_category_started(category: TransactionCategory, address: &str, start_block: u64) {
        LogContext::new("metrics", "category_started")
            .with_category(category)
            .with_address(address)
            .with_block_number(start_block)
            .info(&format!("Fetching {} transactions from block {}", category.label(), start_block));
    }

    pub fn log_page_fetched(
        category: TransactionCategory,
        page: u32,
        records: usize,
        start_block: u64,
        total: usize,
    ) {
        LogContext::new("metrics", "page_fetched")
            .with_category(category)
            .with_block_number(start_block)
            .with_metadata("page", json!(page))
            .with_metadata("records", json!(records))
            .with_metadata("total_records", json!(total))
            .info(&format!(
                "{} page {}: {} records from block {} ({} total)",
                category, page, records, start_block, total
            ));
    }

    pub fn log_category_completed(report: &CategoryReport, duration_ms: u64) {
        let mut context = LogContext::new("metrics", "category_completed")
            .with_category(report.category)
            .with_duration_ms(duration_ms)
            .with_metadata("status", json!(report.status.as_str()))
            .with_metadata("pages", json!(report.pages_fetched))
            .with_metadata("records_fetched", json!(report.records_fetched))
            .with_metadata("records_normalized", json!(report.records_normalized))
            .with_metadata("malformed", json!(report.malformed))
            .with_metadata("duplicates_removed", json!(report.duplicates_removed));

        let message = format!(
            "{} finished {}: {} records in {} pages",
            report.category.label(),
            report.status,
            report.records_normalized,
            report.pages_fetched
        );

        match &report.error {
            Some(error) => {
                context = context.with_metadata("error", json!(error));
                context.warn(&message);
            }
            None => context.info(&message),
        }
    }

    pub fn log_pipeline_summary(address: &str, total: usize, failed: usize, duration_ms: u64) {
        let context = LogContext::new("metrics", "pipeline_summary")
            .with_address(address)
            .with_metadata("total_transactions", json!(total))
            .with_metadata("failed_categories", json!(failed))
            .with_duration_ms(duration_ms);

        if failed > 0 {
            context.warn(&format!(
                "Collected {} transactions for {} with {} failed categories",
                total, address, failed
            ));
        } else {
            context.info(&format!("Collected {} transactions for {}", total, address));
        }
    }
}

/// Initialize logging for the application from the logging section of the config.
/// `RUST_LOG` still takes precedence when set.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let json_format = config.format == "json";

    env_logger::Builder::new()
        .parse_filters(&config.level)
        .parse_default_env()
        .format(move |buf, record| {
            use std::io::Write;

            let message = record.args().to_string();
            match serde_json::from_str::<Value>(&message) {
                Ok(json_value) if json_format => writeln!(buf, "{}", json_value),
                Ok(json_value) => writeln!(buf, "{}", render_pretty(record.level(), &json_value)),
                Err(_) => writeln!(
                    buf,
                    "{} [{}] {}: {}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    message
                ),
            }
        })
        .try_init()?;

    info!("Logging initialized at level {}", config.level);
    Ok(())
}

fn render_pretty(level: log::Level, entry: &Value) -> String {
    let mut extras: Vec<String> = entry
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .filter(|(key, _)| {
                    !matches!(key.as_str(), "timestamp" | "level" | "component" | "operation" | "message")
                })
                .map(|(key, value)| format!("{}={}", key, value))
                .collect()
        })
        .unwrap_or_default();
    extras.sort();

    format!(
        "{} [{}] {}::{}: {} {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        level,
        entry["component"].as_str().unwrap_or("-"),
        entry["operation"].as_str().unwrap_or("-"),
        entry["message"].as_str().unwrap_or_default(),
        extras.join(" ")
    )
    .trim_end()
    .to_string()
}
