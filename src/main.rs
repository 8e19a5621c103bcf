use clap::Parser;
use eth_tx_exporter::config::AppConfig;
use eth_tx_exporter::error::ExporterError;
use eth_tx_exporter::explorer::{CancellationFlag, ExplorerClient};
use eth_tx_exporter::export::{CsvExporter, ExportSummary};
use eth_tx_exporter::logging::{init_logging, ErrorLogger, LogContext};
use eth_tx_exporter::models::Address;
use eth_tx_exporter::pipeline::TransactionPipeline;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "eth-tx-exporter")]
#[command(about = "Export the transaction history of an Ethereum address to CSV")]
#[command(version)]
struct Args {
    /// Address to export (with or without 0x prefix)
    #[arg(short, long)]
    address: String,

    /// Directory the CSV report is written to
    #[arg(short, long)]
    output_dir: Option<String>,

    /// Records requested per page
    #[arg(long)]
    page_size: Option<usize>,

    /// Maximum records per category
    #[arg(long)]
    max_records: Option<usize>,

    /// Fetch the categories concurrently
    #[arg(long)]
    concurrent: bool,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the summary without writing a CSV file
    #[arg(long)]
    no_export: bool,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(args, config).await {
        ErrorLogger::log_error(&e, None);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<AppConfig, ExporterError> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from_path(&path.to_string_lossy())?,
        None => AppConfig::load_from_file()?,
    };
    config.apply_env_overrides()?;

    if let Some(output_dir) = &args.output_dir {
        config.export.output_dir = output_dir.clone();
    }
    if let Some(page_size) = args.page_size {
        config.fetch.page_size = page_size;
    }
    if args.max_records.is_some() {
        config.fetch.max_records_per_category = args.max_records;
    }
    if args.concurrent {
        config.fetch.concurrent = true;
    }
    if args.no_export {
        config.export.enabled = false;
    }

    config.validate()?;
    Ok(config)
}

async fn run(args: Args, config: AppConfig) -> Result<(), ExporterError> {
    let address = Address::parse(&args.address)?;

    print_banner(&address);

    let client = ExplorerClient::new(&config.explorer, config.retry_config())?;
    let cancel = CancellationFlag::new();
    spawn_interrupt_handler(cancel.clone());

    let pipeline = TransactionPipeline::new(Arc::new(client), config.fetch_config()).with_cancellation(cancel);
    let result = pipeline.run(&address).await?;

    println!("{}", ExportSummary::from_result(&result));

    for warning in result.warnings.iter().take(10) {
        LogContext::new("main", "run")
            .with_category(warning.category)
            .warn(&format!("Skipped {}", warning));
    }

    if config.export.enabled {
        let exporter = CsvExporter::new(&config.export.output_dir);
        let path = exporter.export(&result)?;
        println!("Saved {} transactions to {}", result.len(), path.display());
    }

    if !result.is_complete() {
        println!("Export is incomplete, see the category lines above");
    }

    Ok(())
}

fn spawn_interrupt_handler(cancel: CancellationFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, finishing with the records fetched so far");
            cancel.cancel();
        }
    });
}

fn print_banner(address: &Address) {
    println!("==============================================================");
    println!("  Ethereum transaction exporter");
    println!("  Address: {}", address);
    println!("==============================================================");
    println!();
}
