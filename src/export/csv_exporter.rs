use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::ExportError;
use crate::logging::LogContext;
use crate::models::{Address, NormalizedTransaction, PipelineResult};
use crate::processing::plain_decimal;

pub const CSV_COLUMNS: [&str; 14] = [
    "transaction_hash",
    "date_time",
    "from_address",
    "to_address",
    "transaction_type",
    "contract_address",
    "asset_symbol",
    "asset_name",
    "token_id",
    "value_amount_eth",
    "gas_fee_eth",
    "block_number",
    "is_error",
    "amount_unit",
];

/// Writes a pipeline result to `<output_dir>/eth_transactions_<address>_<timestamp>.csv`
#[derive(Debug, Clone)]
pub struct CsvExporter {
    output_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn export(&self, result: &PipelineResult) -> Result<PathBuf, ExportError> {
        self.export_at(result, Utc::now())
    }

    pub fn export_at(&self, result: &PipelineResult, at: DateTime<Utc>) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join(file_name_for(&result.address, at));
        let file = fs::File::create(&path)?;
        write_transactions(file, &result.transactions)?;

        LogContext::new("csv_exporter", "export")
            .with_address(result.address.as_str())
            .with_metadata("path", serde_json::json!(path.display().to_string()))
            .with_metadata("rows", serde_json::json!(result.transactions.len()))
            .info(&format!(
                "Exported {} transactions to {}",
                result.transactions.len(),
                path.display()
            ));

        Ok(path)
    }
}

/// Write the header and one row per transaction
pub fn write_transactions<W: Write>(writer: W, transactions: &[NormalizedTransaction]) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(CSV_COLUMNS)?;

    for tx in transactions {
        csv_writer.write_record([
            tx.hash.clone(),
            tx.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            tx.from_address.to_string(),
            tx.to_address.to_string(),
            tx.transaction_type().to_string(),
            tx.contract_address
                .as_ref()
                .map(|a| a.to_string())
                .unwrap_or_default(),
            tx.asset_symbol.clone().unwrap_or_default(),
            tx.asset_name.clone().unwrap_or_default(),
            tx.token_id.clone().unwrap_or_default(),
            plain_decimal(&tx.amount),
            plain_decimal(&tx.gas_fee_eth),
            tx.block_number.to_string(),
            tx.is_error.to_string(),
            tx.amount_unit.to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

pub fn file_name_for(address: &Address, at: DateTime<Utc>) -> String {
    sanitize_filename(&format!(
        "eth_transactions_{}_{}.csv",
        address.short(),
        at.format("%Y%m%d_%H%M%S")
    ))
}

/// Replace characters that are invalid in file names and tidy up underscores
pub fn sanitize_filename(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') {
            '_'
        } else {
            c
        };
        if c == '_' && sanitized.ends_with('_') {
            continue;
        }
        sanitized.push(c);
    }

    sanitized.trim_matches(|c| c == '_' || c == '.').to_string()
}
