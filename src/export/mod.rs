pub mod csv_exporter;
pub mod summary;

pub use csv_exporter::{sanitize_filename, CsvExporter, CSV_COLUMNS};
pub use summary::ExportSummary;
