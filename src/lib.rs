pub mod config;
pub mod error;
pub mod explorer;
pub mod export;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod processing;
pub mod retry;

pub use config::{AppConfig, ExplorerConfig, ExportConfig, FetchSettings, LoggingConfig};
pub use error::{ApiError, ExporterError, PipelineError, RecordError, Result};
pub use explorer::{CancellationFlag, ExplorerClient, PageRequest, RequestCadence, TransactionSource};
pub use export::{CsvExporter, ExportSummary};
pub use logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
pub use models::{Address, CategoryStatus, NormalizedTransaction, PipelineResult, TransactionCategory};
pub use pipeline::{FetchConfig, FetchMode, TransactionPipeline};
pub use retry::{RetryConfig, RetryManager};
