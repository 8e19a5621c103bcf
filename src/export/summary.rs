use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt::Write as _;

use crate::models::{Address, CategoryReport, PipelineResult, TransactionCategory};
use crate::processing::plain_decimal;

/// Human-readable digest of a pipeline run
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub address: Address,
    pub total: usize,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub type_counts: Vec<(TransactionCategory, usize)>,
    pub total_gas_fee_eth: BigDecimal,
    pub reports: Vec<CategoryReport>,
    pub malformed: usize,
}

impl ExportSummary {
    pub fn from_result(result: &PipelineResult) -> Self {
        let type_counts = TransactionCategory::ALL
            .iter()
            .map(|category| (*category, result.count_for(*category)))
            .filter(|(_, count)| *count > 0)
            .collect();

        // Token transfers repeat the fee of their parent transaction, count each hash once
        let mut fee_by_hash: HashMap<String, BigDecimal> = HashMap::new();
        for tx in &result.transactions {
            let entry = fee_by_hash
                .entry(tx.hash.to_ascii_lowercase())
                .or_insert_with(|| BigDecimal::from(0));
            if tx.gas_fee_eth > *entry {
                *entry = tx.gas_fee_eth.clone();
            }
        }
        let total_gas_fee_eth = fee_by_hash
            .into_values()
            .fold(BigDecimal::from(0), |acc, fee| acc + fee);

        Self {
            address: result.address.clone(),
            total: result.transactions.len(),
            first_timestamp: result.transactions.iter().map(|tx| tx.timestamp).min(),
            last_timestamp: result.transactions.iter().map(|tx| tx.timestamp).max(),
            type_counts,
            total_gas_fee_eth,
            reports: result.reports.clone(),
            malformed: result.warnings.len(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let rule = "-".repeat(50);

        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "Export summary for {}:", self.address);

        match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) => {
                let _ = writeln!(
                    out,
                    "- Total transactions: {} (from {} to {})",
                    self.total,
                    first.format("%Y-%m-%d"),
                    last.format("%Y-%m-%d")
                );
            }
            _ => {
                let _ = writeln!(out, "- Total transactions: {}", self.total);
            }
        }

        if !self.type_counts.is_empty() {
            let _ = writeln!(out, "- Transaction types:");
            for (category, count) in &self.type_counts {
                let _ = writeln!(out, "   - {}: {}", category.label(), count);
            }
        }

        let _ = writeln!(
            out,
            "- Total gas fees: {} ETH",
            plain_decimal(&self.total_gas_fee_eth.round(6))
        );

        if !self.reports.is_empty() {
            let _ = writeln!(out, "- Categories:");
            for report in &self.reports {
                let _ = write!(
                    out,
                    "   - {}: {}, {} of {} records kept, {} page(s), {} malformed, {} duplicates removed",
                    report.category,
                    report.status,
                    report.records_normalized,
                    report.records_fetched,
                    report.pages_fetched,
                    report.malformed,
                    report.duplicates_removed
                );
                if let Some(error) = &report.error {
                    let _ = write!(out, " ({})", error);
                }
                let _ = writeln!(out);
            }
        }

        if self.malformed > 0 {
            let _ = writeln!(out, "- Skipped malformed records: {}", self.malformed);
        }

        let _ = write!(out, "{}", rule);
        out
    }
}

impl std::fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}
