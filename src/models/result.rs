use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::RecordError;
use crate::models::{Address, NormalizedTransaction, TransactionCategory};

/// Per-category pagination state, owned by the paginator for one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchCursor {
    pub category: TransactionCategory,
    pub next_start_block: u64,
    pub pages_fetched: u32,
    pub records_fetched: usize,
}

impl FetchCursor {
    pub fn new(category: TransactionCategory, start_block: u64) -> Self {
        Self {
            category,
            next_start_block: start_block,
            pages_fetched: 0,
            records_fetched: 0,
        }
    }
}

/// How a category's fetch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryStatus {
    /// A short page was seen; everything available was fetched
    Exhausted,
    /// The record cap was reached before the data ran out
    Truncated,
    /// Fetching failed after some records were already collected
    Partial,
    /// Fetching failed before any record was collected
    Failed,
    /// Cancelled; holds whatever was collected before the cancel
    Aborted,
}

impl CategoryStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, CategoryStatus::Partial | CategoryStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryStatus::Exhausted => "exhausted",
            CategoryStatus::Truncated => "truncated",
            CategoryStatus::Partial => "partial",
            CategoryStatus::Failed => "failed",
            CategoryStatus::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for CategoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Itemized outcome for one category
#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub category: TransactionCategory,
    pub status: CategoryStatus,
    pub pages_fetched: u32,
    pub records_fetched: usize,
    pub records_normalized: usize,
    pub malformed: usize,
    pub duplicates_removed: usize,
    pub next_start_block: u64,
    pub error: Option<String>,
}

/// A record excluded by the normalizer; a soft warning, never a run failure
#[derive(Debug, Clone, PartialEq)]
pub struct RecordWarning {
    pub category: TransactionCategory,
    pub hash: Option<String>,
    pub block_number: Option<u64>,
    pub error: RecordError,
}

impl std::fmt::Display for RecordWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} record {} (block {}): {}",
            self.category,
            self.hash.as_deref().unwrap_or("<no hash>"),
            self.block_number
                .map(|b| b.to_string())
                .unwrap_or_else(|| "?".to_string()),
            self.error
        )
    }
}

/// Ordered, normalized history for one address plus per-category outcomes.
/// Handed read-only to the export and summary collaborators.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub address: Address,
    pub transactions: Vec<NormalizedTransaction>,
    pub reports: Vec<CategoryReport>,
    pub warnings: Vec<RecordWarning>,
}

impl PipelineResult {
    pub fn report(&self, category: TransactionCategory) -> Option<&CategoryReport> {
        self.reports.iter().find(|r| r.category == category)
    }

    /// Normalized records kept for `category`
    pub fn count_for(&self, category: TransactionCategory) -> usize {
        self.transactions
            .iter()
            .filter(|tx| tx.category == category)
            .count()
    }

    pub fn counts(&self) -> BTreeMap<TransactionCategory, usize> {
        let mut counts = BTreeMap::new();
        for report in &self.reports {
            counts.insert(report.category, self.count_for(report.category));
        }
        counts
    }

    pub fn failed_categories(&self) -> Vec<TransactionCategory> {
        self.reports
            .iter()
            .filter(|r| r.status.is_failure())
            .map(|r| r.category)
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.reports.iter().any(|r| r.status.is_failure())
    }

    /// Every selected category ran to exhaustion
    pub fn is_complete(&self) -> bool {
        self.reports
            .iter()
            .all(|r| r.status == CategoryStatus::Exhausted)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
