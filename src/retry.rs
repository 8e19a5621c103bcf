use std::time::Duration;
use tokio::time::sleep;

use crate::error::ApiError;
use crate::logging::{ErrorLogger, LogContext, PerformanceMonitor};
use crate::models::TransactionCategory;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts per request, including the first
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Whether to add jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::for_explorer()
    }
}

impl RetryConfig {
    /// Configuration for block-explorer requests
    pub fn for_explorer() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    /// Millisecond-scale delays for tests against mock servers
    pub fn for_tests() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 5,
            max_delay_ms: 20,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

/// Retry mechanism with exponential backoff and jitter
pub struct RetryManager {
    config: RetryConfig,
    operation_name: String,
}

impl RetryManager {
    pub fn new(operation_name: &str, config: RetryConfig) -> Self {
        Self {
            config,
            operation_name: operation_name.to_string(),
        }
    }

    /// Execute a request for `category`, retrying recoverable failures.
    ///
    /// Non-recoverable errors are returned as-is on the attempt they occur.
    /// Running out of attempts yields [`ApiError::RetriesExhausted`].
    pub async fn execute<T, F, Fut>(&self, category: TransactionCategory, operation: F) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, ApiError>>,
    {
        let monitor = PerformanceMonitor::new(&format!("retry_{}", self.operation_name));
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        ErrorLogger::log_recovery_success(&self.operation_name, attempt, monitor.elapsed_ms());
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            if !error.is_recoverable() {
                LogContext::new("retry", &self.operation_name)
                    .with_category(category)
                    .with_retry_count(attempt)
                    .with_metadata("reason", serde_json::json!("non_recoverable"))
                    .error(&format!("Non-recoverable error, aborting retries: {}", error));
                return Err(error);
            }

            ErrorLogger::log_recovery_attempt(&error, attempt, max_attempts);

            if attempt >= max_attempts {
                return Err(ApiError::RetriesExhausted {
                    category,
                    attempts: attempt,
                    last_cause: Box::new(error),
                });
            }

            let mut delay = self.calculate_delay(attempt);
            if let Some(floor) = error.retry_delay_ms() {
                delay = delay.max(Duration::from_millis(floor).min(self.max_delay()));
            }

            LogContext::new("retry", &self.operation_name)
                .with_category(category)
                .with_retry_count(attempt)
                .with_metadata("delay_ms", serde_json::json!(delay.as_millis() as u64))
                .with_metadata("max_attempts", serde_json::json!(max_attempts))
                .info(&format!(
                    "Retrying in {}ms (attempt {} of {})",
                    delay.as_millis(),
                    attempt,
                    max_attempts
                ));

            sleep(delay).await;
        }
    }

    fn max_delay(&self) -> Duration {
        Duration::from_millis(self.config.max_delay_ms)
    }

    /// Calculate delay after the given failed attempt number
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay_ms as f64;
        let exponential_delay = base_delay * self.config.backoff_multiplier.powi(attempt as i32 - 1);

        let capped_delay = exponential_delay.min(self.config.max_delay_ms as f64);

        let final_delay = if self.config.jitter {
            let jitter_factor = 0.1;
            let jitter = capped_delay * jitter_factor * (rand::random::<f64>() - 0.5);
            (capped_delay + jitter).max(0.0)
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay.round() as u64)
    }
}
