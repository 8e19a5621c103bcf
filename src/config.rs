use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::models::TransactionCategory;
use crate::pipeline::{FetchConfig, FetchMode};
use crate::retry::RetryConfig;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub explorer: ExplorerConfig,
    pub fetch: FetchSettings,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

/// Block-explorer connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Etherscan-compatible API endpoint
    pub api_url: String,
    /// API key, normally supplied through `ETHERSCAN_API_KEY`
    pub api_key: String,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    /// Total attempts per request
    pub max_retries: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds
    pub max_retry_delay_ms: u64,
    /// Minimum spacing between outbound requests; 0 disables the limiter
    pub rate_limit_ms: u64,
}

/// Pagination and category selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub page_size: usize,
    /// Cap per category; unset means no cap
    pub max_records_per_category: Option<usize>,
    pub start_block: u64,
    /// Unset means the provider's latest block
    pub end_block: Option<u64>,
    pub categories: Vec<TransactionCategory>,
    /// Fetch categories in parallel tasks sharing one rate limiter
    pub concurrent: bool,
}

/// CSV export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub enabled: bool,
    pub output_dir: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.etherscan.io/api".to_string(),
            api_key: String::new(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_ms: 1_000,
            max_retry_delay_ms: 30_000,
            rate_limit_ms: 200,
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            page_size: 10_000,
            max_records_per_category: None,
            start_block: 0,
            end_block: None,
            categories: TransactionCategory::ALL.to_vec(),
            concurrent: false,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: "transaction_reports".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

impl AppConfig {
    /// Load configuration from file and environment variables.
    /// Environment variables take precedence over file values.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the TOML file named by `CONFIG_FILE` (default `config.toml`).
    /// A missing file yields the defaults.
    pub fn load_from_file() -> Result<Self, ConfigError> {
        let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(config_path: &str) -> Result<Self, ConfigError> {
        if !Path::new(config_path).exists() {
            return Ok(Self::default());
        }

        let content =
            fs::read_to_string(config_path).map_err(|_| ConfigError::FileNotFound(config_path.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parsing(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(api_key) = env::var("ETHERSCAN_API_KEY") {
            self.explorer.api_key = api_key.trim().to_string();
        }
        if let Ok(url) = env::var("ETHERSCAN_API_URL") {
            self.explorer.api_url = url;
        }
        if let Ok(timeout) = env::var("EXPLORER_TIMEOUT_SECONDS") {
            self.explorer.timeout_seconds = parse_env("EXPLORER_TIMEOUT_SECONDS", timeout)?;
        }
        if let Ok(retries) = env::var("EXPLORER_MAX_RETRIES") {
            self.explorer.max_retries = parse_env("EXPLORER_MAX_RETRIES", retries)?;
        }
        if let Ok(rate) = env::var("EXPLORER_RATE_LIMIT_MS") {
            self.explorer.rate_limit_ms = parse_env("EXPLORER_RATE_LIMIT_MS", rate)?;
        }

        if let Ok(page_size) = env::var("FETCH_PAGE_SIZE") {
            self.fetch.page_size = parse_env("FETCH_PAGE_SIZE", page_size)?;
        }
        if let Ok(max_records) = env::var("FETCH_MAX_RECORDS") {
            self.fetch.max_records_per_category = Some(parse_env("FETCH_MAX_RECORDS", max_records)?);
        }
        if let Ok(concurrent) = env::var("FETCH_CONCURRENT") {
            self.fetch.concurrent = parse_env("FETCH_CONCURRENT", concurrent)?;
        }

        if let Ok(output_dir) = env::var("EXPORT_OUTPUT_DIR") {
            self.export.output_dir = output_dir;
        }

        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            self.logging.format = format.to_lowercase();
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.explorer.api_key.trim().is_empty() {
            return Err(ConfigError::MissingEnvVar("ETHERSCAN_API_KEY".to_string()));
        }

        if !self.explorer.api_url.starts_with("http://") && !self.explorer.api_url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(self.explorer.api_url.clone()));
        }

        if self.explorer.timeout_seconds == 0 || self.explorer.timeout_seconds > 300 {
            return Err(ConfigError::InvalidValue {
                key: "explorer.timeout_seconds".to_string(),
                value: self.explorer.timeout_seconds.to_string(),
            });
        }

        if self.explorer.max_retries == 0 || self.explorer.max_retries > 20 {
            return Err(ConfigError::InvalidValue {
                key: "explorer.max_retries".to_string(),
                value: self.explorer.max_retries.to_string(),
            });
        }

        if self.explorer.retry_delay_ms > self.explorer.max_retry_delay_ms {
            return Err(ConfigError::InvalidValue {
                key: "explorer.retry_delay_ms".to_string(),
                value: self.explorer.retry_delay_ms.to_string(),
            });
        }

        if self.fetch.page_size == 0 || self.fetch.page_size > 10_000 {
            return Err(ConfigError::InvalidValue {
                key: "fetch.page_size".to_string(),
                value: self.fetch.page_size.to_string(),
            });
        }

        if self.fetch.max_records_per_category == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "fetch.max_records_per_category".to_string(),
                value: "0".to_string(),
            });
        }

        if let Some(end_block) = self.fetch.end_block {
            if end_block < self.fetch.start_block {
                return Err(ConfigError::InvalidValue {
                    key: "fetch.end_block".to_string(),
                    value: end_block.to_string(),
                });
            }
        }

        if self.fetch.categories.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "fetch.categories".to_string(),
                value: "[]".to_string(),
            });
        }

        if self.export.output_dir.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "export.output_dir".to_string(),
                value: self.export.output_dir.clone(),
            });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                value: self.logging.level.clone(),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.format".to_string(),
                value: self.logging.format.clone(),
            });
        }

        Ok(())
    }

    /// The value object handed to the pipeline
    pub fn fetch_config(&self) -> FetchConfig {
        let mut categories: Vec<TransactionCategory> = Vec::new();
        for category in TransactionCategory::ALL {
            if self.fetch.categories.contains(&category) {
                categories.push(category);
            }
        }

        FetchConfig {
            page_size: self.fetch.page_size,
            max_records_per_category: self.fetch.max_records_per_category,
            start_block: self.fetch.start_block,
            end_block: self.fetch.end_block,
            categories,
            mode: if self.fetch.concurrent {
                FetchMode::Concurrent
            } else {
                FetchMode::Sequential
            },
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.explorer.max_retries,
            initial_delay_ms: self.explorer.retry_delay_ms,
            max_delay_ms: self.explorer.max_retry_delay_ms,
            ..RetryConfig::for_explorer()
        }
    }

    /// Generate a sample configuration file
    pub fn generate_sample_config() -> Result<String, ConfigError> {
        toml::to_string_pretty(&Self::default()).map_err(|e| ConfigError::Parsing(e.to_string()))
    }
}
