use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::ApiError;
use crate::explorer::{PageRequest, TransactionSource};
use crate::logging::{LogContext, MetricsLogger};
use crate::models::{Address, DedupKey, FetchCursor, RawTransactionRecord, TransactionCategory};

/// Shared stop signal, checked before every page request
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Why a category stopped fetching
#[derive(Debug)]
pub enum FetchOutcome {
    Exhausted,
    Truncated,
    Failed(ApiError),
    Aborted,
}

/// Raw records collected for one category, with the cursor they ended at
#[derive(Debug)]
pub struct CategoryFetch {
    pub category: TransactionCategory,
    pub records: Vec<RawTransactionRecord>,
    pub cursor: FetchCursor,
    pub outcome: FetchOutcome,
    /// Records dropped because they reappeared at a page boundary
    pub boundary_duplicates: usize,
    pub duration_ms: u64,
}

/// Walks one category's history page by page using block-number cursors.
///
/// A full page means more data may remain; the next request restarts at the
/// block of the last record so nothing in that block is skipped. Records from
/// that block already collected are recognised by their dedup key and dropped.
/// Re-reading that block costs one extra request when the history ends on a
/// full page, where restarting at `last + 1` would not.
pub struct CategoryPaginator {
    source: Arc<dyn TransactionSource>,
    page_size: usize,
    max_records: Option<usize>,
    start_block: u64,
    end_block: Option<u64>,
    cancel: CancellationFlag,
}

impl CategoryPaginator {
    pub fn new(source: Arc<dyn TransactionSource>, page_size: usize) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            max_records: None,
            start_block: 0,
            end_block: None,
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_max_records(mut self, max_records: Option<usize>) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn with_block_range(mut self, start_block: u64, end_block: Option<u64>) -> Self {
        self.start_block = start_block;
        self.end_block = end_block;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn fetch_all(&self, category: TransactionCategory, address: &Address) -> CategoryFetch {
        let mut cursor = FetchCursor::new(category, self.start_block);
        let mut records: Vec<RawTransactionRecord> = Vec::new();
        let mut boundary: Option<(u64, HashSet<DedupKey>)> = None;
        let mut boundary_duplicates = 0;
        let started = Instant::now();

        MetricsLogger::log_category_started(category, address.as_str(), self.start_block);

        let outcome = loop {
            if self.cancel.is_cancelled() {
                LogContext::new("paginator", "fetch_all")
                    .with_category(category)
                    .with_block_number(cursor.next_start_block)
                    .warn("Fetch cancelled");
                break FetchOutcome::Aborted;
            }

            if matches!(self.end_block, Some(end) if cursor.next_start_block > end) {
                break FetchOutcome::Exhausted;
            }

            let request = PageRequest {
                address: address.clone(),
                start_block: cursor.next_start_block,
                end_block: self.end_block,
                page_size: self.page_size,
            };

            let page = match self.source.fetch_page(category, &request).await {
                Ok(page) => page,
                Err(error) => {
                    if error.is_fatal() {
                        self.cancel.cancel();
                    }
                    break FetchOutcome::Failed(error);
                }
            };

            cursor.pages_fetched += 1;
            let page_len = page.len();

            if page_len == 0 {
                MetricsLogger::log_page_fetched(category, cursor.pages_fetched, 0, request.start_block, records.len());
                break FetchOutcome::Exhausted;
            }

            let last_block = page.records.iter().rev().find_map(|r| r.block_number());
            let mut truncated = false;

            for record in page.records {
                if let Some((block, keys)) = &boundary {
                    if record.block_number() == Some(*block) && keys.contains(&record.dedup_key()) {
                        boundary_duplicates += 1;
                        continue;
                    }
                }

                if matches!(self.max_records, Some(max) if records.len() >= max) {
                    truncated = true;
                    break;
                }

                records.push(record);
            }

            cursor.records_fetched = records.len();
            MetricsLogger::log_page_fetched(
                category,
                cursor.pages_fetched,
                page_len,
                request.start_block,
                records.len(),
            );

            if truncated {
                break FetchOutcome::Truncated;
            }

            if page_len < self.page_size {
                break FetchOutcome::Exhausted;
            }

            let last_block = match last_block {
                Some(block) => block,
                None => {
                    break FetchOutcome::Failed(ApiError::InvalidResponse(format!(
                        "{} page from block {} has no parseable block numbers",
                        category.action(),
                        request.start_block
                    )));
                }
            };

            if last_block <= cursor.next_start_block {
                // The whole page sits in one block; re-requesting it would loop forever
                LogContext::new("paginator", "advance_cursor")
                    .with_category(category)
                    .with_block_number(last_block)
                    .with_metadata("page_size", serde_json::json!(self.page_size))
                    .warn("Full page within a single block, skipping ahead; records beyond the page in this block are not fetched");
                cursor.next_start_block = last_block + 1;
                boundary = None;
                continue;
            }

            let keys = records
                .iter()
                .filter(|r| r.block_number() == Some(last_block))
                .map(|r| r.dedup_key())
                .collect();
            boundary = Some((last_block, keys));
            cursor.next_start_block = last_block;
        };

        CategoryFetch {
            category,
            records,
            cursor,
            outcome,
            boundary_duplicates,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::testing::{
        internal_record, normal_record, test_address, token_record, Failure, ScriptedSource,
    };

    fn paginator(source: Arc<ScriptedSource>, page_size: usize) -> CategoryPaginator {
        CategoryPaginator::new(source, page_size)
    }

    fn blocks(records: &[RawTransactionRecord]) -> Vec<u64> {
        records.iter().filter_map(|r| r.block_number()).collect()
    }

    #[tokio::test]
    async fn test_short_page_ends_pagination() {
        let source = Arc::new(ScriptedSource::new().with_records(
            TransactionCategory::Normal,
            (1..=5).map(|b| normal_record(b, 0, &format!("0x{:02x}", b))).collect(),
        ));

        let fetch = paginator(source.clone(), 10)
            .fetch_all(TransactionCategory::Normal, &test_address())
            .await;

        assert!(matches!(fetch.outcome, FetchOutcome::Exhausted));
        assert_eq!(fetch.records.len(), 5);
        assert_eq!(fetch.cursor.pages_fetched, 1);
        assert_eq!(source.call_count(TransactionCategory::Normal), 1);
    }

    #[tokio::test]
    async fn test_full_pages_continue_from_last_block() {
        let source = Arc::new(ScriptedSource::new().with_records(
            TransactionCategory::Normal,
            (1..=7).map(|b| normal_record(b * 10, 0, &format!("0x{:02x}", b))).collect(),
        ));

        let fetch = paginator(source.clone(), 3)
            .fetch_all(TransactionCategory::Normal, &test_address())
            .await;

        assert!(matches!(fetch.outcome, FetchOutcome::Exhausted));
        assert_eq!(blocks(&fetch.records), vec![10, 20, 30, 40, 50, 60, 70]);
        assert_eq!(source.start_blocks(TransactionCategory::Normal), vec![0, 30, 50, 70]);
        assert_eq!(fetch.boundary_duplicates, 3);
    }

    #[tokio::test]
    async fn test_boundary_block_records_are_not_lost_or_repeated() {
        // Three transfers in block 20 straddle the first page boundary
        let records = vec![
            token_record(TransactionCategory::Erc20, 10, "0xa1", "0"),
            token_record(TransactionCategory::Erc20, 20, "0xb1", "0"),
            token_record(TransactionCategory::Erc20, 20, "0xb1", "1"),
            token_record(TransactionCategory::Erc20, 20, "0xb2", "4"),
            token_record(TransactionCategory::Erc20, 30, "0xc1", "2"),
        ];
        let source = Arc::new(ScriptedSource::new().with_records(TransactionCategory::Erc20, records));

        let fetch = paginator(source, 3)
            .fetch_all(TransactionCategory::Erc20, &test_address())
            .await;

        let keys: Vec<(String, Option<String>)> = fetch
            .records
            .iter()
            .map(|r| (r.hash().unwrap().to_string(), r.log_index().map(str::to_string)))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("0xa1".to_string(), Some("0".to_string())),
                ("0xb1".to_string(), Some("0".to_string())),
                ("0xb1".to_string(), Some("1".to_string())),
                ("0xb2".to_string(), Some("4".to_string())),
                ("0xc1".to_string(), Some("2".to_string())),
            ]
        );
        assert_eq!(fetch.boundary_duplicates, 2);
    }

    #[tokio::test]
    async fn test_cap_marks_truncated() {
        let source = Arc::new(ScriptedSource::new().with_records(
            TransactionCategory::Normal,
            (1..=200).map(|b| normal_record(b, 0, &format!("0x{:04x}", b))).collect(),
        ));

        let fetch = paginator(source, 30)
            .with_max_records(Some(50))
            .fetch_all(TransactionCategory::Normal, &test_address())
            .await;

        assert!(matches!(fetch.outcome, FetchOutcome::Truncated));
        assert_eq!(fetch.records.len(), 50);
        assert_eq!(fetch.cursor.records_fetched, 50);
    }

    #[tokio::test]
    async fn test_cap_equal_to_total_is_exhausted() {
        let source = Arc::new(ScriptedSource::new().with_records(
            TransactionCategory::Normal,
            (1..=50).map(|b| normal_record(b, 0, &format!("0x{:04x}", b))).collect(),
        ));

        let fetch = paginator(source, 25)
            .with_max_records(Some(50))
            .fetch_all(TransactionCategory::Normal, &test_address())
            .await;

        assert!(matches!(fetch.outcome, FetchOutcome::Exhausted));
        assert_eq!(fetch.records.len(), 50);
    }

    #[tokio::test]
    async fn test_failure_keeps_partial_records() {
        let source = Arc::new(
            ScriptedSource::new()
                .with_records(
                    TransactionCategory::Internal,
                    (1..=10).map(|b| internal_record(b, &format!("0x{:02x}", b), "0")).collect(),
                )
                .fail_after(TransactionCategory::Internal, 1, Failure::InvalidRequest),
        );

        let fetch = paginator(source, 4)
            .fetch_all(TransactionCategory::Internal, &test_address())
            .await;

        assert!(matches!(fetch.outcome, FetchOutcome::Failed(ApiError::InvalidRequest(_))));
        assert_eq!(fetch.records.len(), 4);
        assert_eq!(fetch.cursor.next_start_block, 4);
    }

    #[tokio::test]
    async fn test_authentication_failure_cancels_others() {
        let cancel = CancellationFlag::new();
        let source = Arc::new(ScriptedSource::new().fail_after(
            TransactionCategory::Normal,
            0,
            Failure::Authentication,
        ));

        let fetch = paginator(source, 10)
            .with_cancellation(cancel.clone())
            .fetch_all(TransactionCategory::Normal, &test_address())
            .await;

        assert!(matches!(fetch.outcome, FetchOutcome::Failed(ApiError::Authentication(_))));
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_is_aborted() {
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let source = Arc::new(ScriptedSource::new());

        let fetch = paginator(source.clone(), 10)
            .with_cancellation(cancel)
            .fetch_all(TransactionCategory::Erc721, &test_address())
            .await;

        assert!(matches!(fetch.outcome, FetchOutcome::Aborted));
        assert_eq!(source.call_count(TransactionCategory::Erc721), 0);
    }

    #[tokio::test]
    async fn test_single_block_full_page_advances() {
        let mut records: Vec<RawTransactionRecord> = (0..4)
            .map(|i| token_record(TransactionCategory::Erc20, 5, &format!("0x{:02x}", i), "0"))
            .collect();
        records.push(token_record(TransactionCategory::Erc20, 6, "0xff", "0"));
        let source = Arc::new(ScriptedSource::new().with_records(TransactionCategory::Erc20, records));

        let fetch = paginator(source.clone(), 3)
            .with_block_range(5, None)
            .fetch_all(TransactionCategory::Erc20, &test_address())
            .await;

        assert!(matches!(fetch.outcome, FetchOutcome::Exhausted));
        assert_eq!(source.start_blocks(TransactionCategory::Erc20), vec![5, 6]);
        assert_eq!(blocks(&fetch.records), vec![5, 5, 5, 6]);
    }

    #[tokio::test]
    async fn test_end_block_bounds_requests() {
        let source = Arc::new(ScriptedSource::new().with_records(
            TransactionCategory::Normal,
            (1..=10).map(|b| normal_record(b, 0, &format!("0x{:02x}", b))).collect(),
        ));

        let fetch = paginator(source, 100)
            .with_block_range(3, Some(6))
            .fetch_all(TransactionCategory::Normal, &test_address())
            .await;

        assert_eq!(blocks(&fetch.records), vec![3, 4, 5, 6]);
    }
}
