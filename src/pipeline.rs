use std::sync::Arc;

use crate::error::{ExporterError, PipelineError, ValidationError};
use crate::explorer::{CancellationFlag, CategoryFetch, CategoryPaginator, FetchOutcome, TransactionSource};
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::{
    Address, CategoryReport, CategoryStatus, FetchCursor, PipelineResult, RecordWarning, TransactionCategory,
};
use crate::processing::TransactionNormalizer;

/// How categories are scheduled against the shared request budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// One category at a time, one page at a time
    Sequential,
    /// One task per category; the source's rate limiter is shared by all of them
    Concurrent,
}

/// Inputs for one pipeline run
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub page_size: usize,
    pub max_records_per_category: Option<usize>,
    pub start_block: u64,
    pub end_block: Option<u64>,
    pub categories: Vec<TransactionCategory>,
    pub mode: FetchMode,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: 10_000,
            max_records_per_category: None,
            start_block: 0,
            end_block: None,
            categories: TransactionCategory::ALL.to_vec(),
            mode: FetchMode::Sequential,
        }
    }
}

impl FetchConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.end_block {
            Some(end) if end < self.start_block => Err(ValidationError::InvalidBlockRange {
                start: self.start_block,
                end,
            }),
            _ => Ok(()),
        }
    }
}

/// Fetches every selected category for an address and merges the results
/// into one normalized, time-ordered history.
pub struct TransactionPipeline {
    source: Arc<dyn TransactionSource>,
    config: FetchConfig,
    cancel: CancellationFlag,
}

impl TransactionPipeline {
    pub fn new(source: Arc<dyn TransactionSource>, config: FetchConfig) -> Self {
        Self {
            source,
            config,
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Run every category and return the merged result.
    ///
    /// Category failures are reported in the result. Authentication failures
    /// and runs where every category failed are returned as errors.
    pub async fn run(&self, address: &Address) -> Result<PipelineResult, ExporterError> {
        if self.config.categories.is_empty() {
            return Err(PipelineError::NoCategories.into());
        }
        self.config.validate()?;

        let monitor = PerformanceMonitor::new("pipeline_run")
            .with_metadata("address", serde_json::json!(address.as_str()));

        LogContext::new("pipeline", "run")
            .with_address(address.as_str())
            .with_metadata("categories", serde_json::json!(self.config.categories))
            .with_metadata("mode", serde_json::json!(format!("{:?}", self.config.mode)))
            .with_metadata("page_size", serde_json::json!(self.config.page_size))
            .info("Starting transaction history fetch");

        let mut fetches = match self.config.mode {
            FetchMode::Sequential => self.fetch_sequential(address).await,
            FetchMode::Concurrent => self.fetch_concurrent(address).await,
        };

        if let Some(position) = fetches
            .iter()
            .position(|f| matches!(&f.outcome, FetchOutcome::Failed(e) if e.is_fatal()))
        {
            let fetch = fetches.swap_remove(position);
            if let FetchOutcome::Failed(error) = fetch.outcome {
                LogContext::new("pipeline", "run")
                    .with_category(fetch.category)
                    .with_address(address.as_str())
                    .error(&format!("Aborting run: {}", error));
                return Err(error.into());
            }
        }

        let result = self.assemble(address, fetches)?;

        MetricsLogger::log_pipeline_summary(
            address.as_str(),
            result.transactions.len(),
            result.failed_categories().len(),
            monitor.finish(),
        );

        Ok(result)
    }

    fn paginator(&self) -> CategoryPaginator {
        CategoryPaginator::new(self.source.clone(), self.config.page_size)
            .with_max_records(self.config.max_records_per_category)
            .with_block_range(self.config.start_block, self.config.end_block)
            .with_cancellation(self.cancel.clone())
    }

    async fn fetch_sequential(&self, address: &Address) -> Vec<CategoryFetch> {
        let paginator = self.paginator();
        let mut fetches = Vec::with_capacity(self.config.categories.len());

        for category in &self.config.categories {
            let fetch = paginator.fetch_all(*category, address).await;
            let fatal = matches!(&fetch.outcome, FetchOutcome::Failed(e) if e.is_fatal());
            fetches.push(fetch);
            if fatal {
                break;
            }
        }

        fetches
    }

    async fn fetch_concurrent(&self, address: &Address) -> Vec<CategoryFetch> {
        let mut handles = Vec::with_capacity(self.config.categories.len());

        for category in &self.config.categories {
            let category = *category;
            let paginator = self.paginator();
            let address = address.clone();
            let handle = tokio::spawn(async move { paginator.fetch_all(category, &address).await });
            handles.push((category, handle));
        }

        let mut fetches = Vec::with_capacity(handles.len());
        for (category, handle) in handles {
            match handle.await {
                Ok(fetch) => fetches.push(fetch),
                Err(join_error) => {
                    LogContext::new("pipeline", "fetch_concurrent")
                        .with_category(category)
                        .error(&format!("Fetch task ended abnormally: {}", join_error));
                    fetches.push(CategoryFetch {
                        category,
                        records: Vec::new(),
                        cursor: FetchCursor::new(category, self.config.start_block),
                        outcome: FetchOutcome::Aborted,
                        boundary_duplicates: 0,
                        duration_ms: 0,
                    });
                }
            }
        }

        fetches
    }

    fn assemble(&self, address: &Address, fetches: Vec<CategoryFetch>) -> Result<PipelineResult, ExporterError> {
        let mut normalizer = TransactionNormalizer::new();
        let mut transactions = Vec::new();
        let mut reports = Vec::with_capacity(fetches.len());
        let mut warnings: Vec<RecordWarning> = Vec::new();

        for fetch in fetches {
            let batch = normalizer.normalize_batch(fetch.records);

            let (status, error) = match fetch.outcome {
                FetchOutcome::Exhausted => (CategoryStatus::Exhausted, None),
                FetchOutcome::Truncated => (CategoryStatus::Truncated, None),
                FetchOutcome::Aborted => (CategoryStatus::Aborted, None),
                FetchOutcome::Failed(error) if fetch.cursor.records_fetched > 0 => {
                    (CategoryStatus::Partial, Some(error.to_string()))
                }
                FetchOutcome::Failed(error) => (CategoryStatus::Failed, Some(error.to_string())),
            };

            let report = CategoryReport {
                category: fetch.category,
                status,
                pages_fetched: fetch.cursor.pages_fetched,
                records_fetched: fetch.cursor.records_fetched,
                records_normalized: batch.transactions.len(),
                malformed: batch.warnings.len(),
                duplicates_removed: fetch.boundary_duplicates + batch.duplicates_removed,
                next_start_block: fetch.cursor.next_start_block,
                error,
            };
            MetricsLogger::log_category_completed(&report, fetch.duration_ms);

            transactions.extend(batch.transactions);
            warnings.extend(batch.warnings);
            reports.push(report);
        }

        if reports.iter().all(|r| r.status == CategoryStatus::Failed) {
            return Err(PipelineError::AllCategoriesFailed {
                address: address.to_string(),
                errors: reports
                    .iter()
                    .map(|r| (r.category, r.error.clone().unwrap_or_default()))
                    .collect(),
            }
            .into());
        }

        transactions.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.block_number.cmp(&b.block_number))
                .then_with(|| a.hash.cmp(&b.hash))
        });

        Ok(PipelineResult {
            address: address.clone(),
            transactions,
            reports,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::explorer::testing::{
        internal_record, normal_json, normal_record, test_address, token_record, Failure, ScriptedSource,
    };
    use crate::models::RawTransactionRecord;

    fn five_category_source() -> ScriptedSource {
        ScriptedSource::new()
            .with_records(
                TransactionCategory::Normal,
                vec![normal_record(10, 0, "0x10"), normal_record(40, 1, "0x40")],
            )
            .with_records(TransactionCategory::Internal, vec![internal_record(20, "0x20", "0")])
            .with_records(
                TransactionCategory::Erc20,
                vec![token_record(TransactionCategory::Erc20, 30, "0x30", "1")],
            )
            .with_records(
                TransactionCategory::Erc721,
                vec![token_record(TransactionCategory::Erc721, 5, "0x05", "0")],
            )
            .with_records(
                TransactionCategory::Erc1155,
                vec![token_record(TransactionCategory::Erc1155, 50, "0x50", "3")],
            )
    }

    fn pipeline(source: ScriptedSource, config: FetchConfig) -> TransactionPipeline {
        TransactionPipeline::new(Arc::new(source), config)
    }

    #[tokio::test]
    async fn test_merged_history_is_time_ordered() {
        let result = pipeline(five_category_source(), FetchConfig::default())
            .run(&test_address())
            .await
            .unwrap();

        let blocks: Vec<u64> = result.transactions.iter().map(|t| t.block_number).collect();
        assert_eq!(blocks, vec![5, 10, 20, 30, 40, 50]);
        assert!(result.is_complete());
        assert_eq!(result.reports.len(), 5);
        assert_eq!(result.count_for(TransactionCategory::Normal), 2);
    }

    #[tokio::test]
    async fn test_one_failing_category_is_isolated() {
        let source = five_category_source().fail_after(TransactionCategory::Erc721, 0, Failure::InvalidRequest);

        let result = pipeline(source, FetchConfig::default())
            .run(&test_address())
            .await
            .unwrap();

        let report = result.report(TransactionCategory::Erc721).unwrap();
        assert_eq!(report.status, CategoryStatus::Failed);
        assert!(report.error.as_deref().unwrap().contains("Invalid address format"));
        assert_eq!(result.failed_categories(), vec![TransactionCategory::Erc721]);
        assert_eq!(result.len(), 5);
        for category in [
            TransactionCategory::Normal,
            TransactionCategory::Internal,
            TransactionCategory::Erc20,
            TransactionCategory::Erc1155,
        ] {
            assert_eq!(result.report(category).unwrap().status, CategoryStatus::Exhausted);
        }
    }

    #[tokio::test]
    async fn test_partial_category_keeps_records() {
        let source = ScriptedSource::new()
            .with_records(
                TransactionCategory::Normal,
                (1..=6).map(|b| normal_record(b, 0, &format!("0x{:02x}", b))).collect(),
            )
            .fail_after(TransactionCategory::Normal, 1, Failure::Exhausted);
        let config = FetchConfig {
            page_size: 3,
            categories: vec![TransactionCategory::Normal, TransactionCategory::Internal],
            ..FetchConfig::default()
        };

        let result = pipeline(source, config).run(&test_address()).await.unwrap();

        let report = result.report(TransactionCategory::Normal).unwrap();
        assert_eq!(report.status, CategoryStatus::Partial);
        assert_eq!(report.records_normalized, 3);
        assert!(report.error.as_deref().unwrap().contains("failed after 3 attempts"));
        assert!(result.has_failures());
    }

    #[tokio::test]
    async fn test_all_categories_failing_is_an_error() {
        let mut source = ScriptedSource::new();
        for category in TransactionCategory::ALL {
            source = source.fail_after(category, 0, Failure::Exhausted);
        }

        let error = pipeline(source, FetchConfig::default())
            .run(&test_address())
            .await
            .unwrap_err();

        match error {
            ExporterError::Pipeline(PipelineError::AllCategoriesFailed { errors, .. }) => {
                assert_eq!(errors.len(), 5);
                assert_eq!(errors[0].0, TransactionCategory::Normal);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_authentication_failure_aborts_run() {
        let source = five_category_source().fail_after(TransactionCategory::Internal, 0, Failure::Authentication);
        let source = Arc::new(source);

        let error = TransactionPipeline::new(source.clone(), FetchConfig::default())
            .run(&test_address())
            .await
            .unwrap_err();

        assert!(matches!(error, ExporterError::Api(ApiError::Authentication(_))));
        assert_eq!(source.call_count(TransactionCategory::Erc20), 0);
    }

    #[tokio::test]
    async fn test_malformed_record_is_excluded_with_warning() {
        let mut bad = normal_json(15, 0, "0xbad");
        bad["from"] = serde_json::json!("");
        let records = vec![
            normal_record(10, 0, "0x10"),
            RawTransactionRecord::from_value(TransactionCategory::Normal, bad).unwrap(),
            normal_record(20, 0, "0x20"),
        ];
        let config = FetchConfig {
            categories: vec![TransactionCategory::Normal],
            ..FetchConfig::default()
        };

        let result = pipeline(ScriptedSource::new().with_records(TransactionCategory::Normal, records), config)
            .run(&test_address())
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.warnings.len(), 1);
        let report = result.report(TransactionCategory::Normal).unwrap();
        assert_eq!(report.status, CategoryStatus::Exhausted);
        assert_eq!(report.records_fetched, 3);
        assert_eq!(report.malformed, 1);
    }

    #[tokio::test]
    async fn test_concurrent_mode_matches_sequential() {
        let sequential = pipeline(five_category_source(), FetchConfig::default())
            .run(&test_address())
            .await
            .unwrap();
        let concurrent = pipeline(
            five_category_source(),
            FetchConfig {
                mode: FetchMode::Concurrent,
                ..FetchConfig::default()
            },
        )
        .run(&test_address())
        .await
        .unwrap();

        assert_eq!(sequential.transactions, concurrent.transactions);
        let order: Vec<TransactionCategory> = concurrent.reports.iter().map(|r| r.category).collect();
        assert_eq!(order, TransactionCategory::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_cancelled_run_reports_aborted() {
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let result = pipeline(five_category_source(), FetchConfig::default())
            .with_cancellation(cancel)
            .run(&test_address())
            .await
            .unwrap();

        assert!(result.is_empty());
        assert!(result.reports.iter().all(|r| r.status == CategoryStatus::Aborted));
        assert!(!result.has_failures());
    }

    #[tokio::test]
    async fn test_config_errors() {
        let empty = FetchConfig {
            categories: Vec::new(),
            ..FetchConfig::default()
        };
        let error = pipeline(ScriptedSource::new(), empty).run(&test_address()).await.unwrap_err();
        assert!(matches!(error, ExporterError::Pipeline(PipelineError::NoCategories)));

        let inverted = FetchConfig {
            start_block: 10,
            end_block: Some(5),
            ..FetchConfig::default()
        };
        let error = pipeline(ScriptedSource::new(), inverted).run(&test_address()).await.unwrap_err();
        assert!(matches!(
            error,
            ExporterError::Validation(ValidationError::InvalidBlockRange { start: 10, end: 5 })
        ));
    }
}
