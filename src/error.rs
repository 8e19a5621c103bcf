use thiserror::Error;

use crate::models::TransactionCategory;

/// Main error type for the transaction exporter
#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("Explorer API error: {0}")]
    Api(#[from] ApiError),

    #[error("Malformed record: {0}")]
    Record(#[from] RecordError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

/// Errors raised while talking to the block-explorer API
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("Timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("{category} fetch failed after {attempts} attempts: {last_cause}")]
    RetriesExhausted {
        category: TransactionCategory,
        attempts: u32,
        last_cause: Box<ApiError>,
    },
}

/// A single raw record that cannot be normalized
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("missing field `{field}`")]
    MissingField { field: &'static str },

    #[error("invalid address in `{field}`: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("invalid number in `{field}`: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Run-level failures that leave no usable result
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("all categories failed for {address}: {}", format_category_errors(.errors))]
    AllCategoriesFailed {
        address: String,
        errors: Vec<(TransactionCategory, String)>,
    },

    #[error("No categories selected")]
    NoCategories,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// Validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid Ethereum address: {0}")]
    InvalidAddress(String),

    #[error("Invalid block range: start {start} is after end {end}")]
    InvalidBlockRange { start: u64, end: u64 },
}

/// Errors from the CSV export collaborator
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),
}

fn format_category_errors(errors: &[(TransactionCategory, String)]) -> String {
    errors
        .iter()
        .map(|(category, error)| format!("{}: {}", category, error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ExporterError>;

/// Error severity levels for logging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Errors that end the run
    Critical,
    /// Errors that cost a whole category
    High,
    /// Transient errors that are retried
    Medium,
    /// Record-level problems
    Low,
}

impl ApiError {
    /// Check if the error is transient and the request may be retried
    pub fn is_recoverable(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::HttpStatus { status } => *status >= 500,
            ApiError::Timeout { .. } => true,
            ApiError::RateLimited(_) => true,
            ApiError::InvalidResponse(_) => true,

            ApiError::Authentication(_) => false,
            ApiError::InvalidRequest(_) => false,
            ApiError::RetriesExhausted { .. } => false,
        }
    }

    /// Authentication failures abort the whole run
    pub fn is_fatal(&self) -> bool {
        match self {
            ApiError::Authentication(_) => true,
            ApiError::RetriesExhausted { last_cause, .. } => last_cause.is_fatal(),
            _ => false,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ApiError::Authentication(_) => ErrorSeverity::Critical,
            ApiError::RetriesExhausted { .. } | ApiError::InvalidRequest(_) => ErrorSeverity::High,
            _ => ErrorSeverity::Medium,
        }
    }

    /// Minimum wait in milliseconds suggested by the error itself
    pub fn retry_delay_ms(&self) -> Option<u64> {
        if !self.is_recoverable() {
            return None;
        }

        match self {
            ApiError::RateLimited(_) => Some(1000),
            ApiError::Timeout { .. } => Some(500),
            _ => Some(0),
        }
    }
}

impl ExporterError {
    /// Get the severity level of an error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ExporterError::Api(e) => e.severity(),
            ExporterError::Config(_) => ErrorSeverity::Critical,
            ExporterError::Pipeline(_) => ErrorSeverity::Critical,
            ExporterError::Export(_) => ErrorSeverity::High,
            ExporterError::Validation(_) => ErrorSeverity::Low,
            ExporterError::Record(_) => ErrorSeverity::Low,
        }
    }

    /// Check if the error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            ExporterError::Api(e) => e.is_recoverable(),
            _ => false,
        }
    }
}
