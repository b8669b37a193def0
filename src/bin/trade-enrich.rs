//! Command-line front end: enrich one trade file against a product catalog.
//!
//! ```text
//! trade-enrich --catalog product.csv --input trades.csv --output enriched.csv
//! ```
//!
//! Every option has an environment fallback (`TRADE_ENRICH_*`). Logging goes
//! to stderr and honours `RUST_LOG` (default `info`). On failure the
//! structured error body is printed to stdout as JSON and the exit code is 1.

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use trade_enrich::io::compression::{EncodedWriter, create_writer, open_reader, strip_compression_extension};
use trade_enrich::{EnrichConfig, EnrichError, ErrorResponse, ShutdownOutcome, Strategy, TradeEnrichmentService};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    Batched,
    Streaming,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Batched => Self::Batched,
            StrategyArg::Streaming => Self::Streaming,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Enrich trade CSV files with product names")]
struct Cli {
    /// Product catalog CSV (`product_id,product_name`).
    #[arg(long, env = "TRADE_ENRICH_PRODUCT_CATALOG", default_value = "product.csv")]
    catalog: PathBuf,

    /// Trade CSV to enrich.
    #[arg(short, long)]
    input: PathBuf,

    /// Destination file; stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, env = "TRADE_ENRICH_BATCH_SIZE", default_value_t = 1000)]
    batch_size: usize,

    /// Worker threads; defaults to the logical core count.
    #[arg(long, env = "TRADE_ENRICH_WORKERS")]
    workers: Option<usize>,

    #[arg(long, value_enum, env = "TRADE_ENRICH_STRATEGY", default_value = "batched")]
    strategy: StrategyArg,

    /// Records in flight in streaming mode; defaults to the batch size.
    #[arg(long, env = "TRADE_ENRICH_MAX_IN_FLIGHT")]
    max_in_flight: Option<usize>,

    #[arg(long, env = "TRADE_ENRICH_BATCH_TIMEOUT_MS", default_value_t = 30_000)]
    batch_timeout_ms: u64,

    #[arg(long, env = "TRADE_ENRICH_SHUTDOWN_TIMEOUT_MS", default_value_t = 5_000)]
    shutdown_timeout_ms: u64,

    /// Write process metrics as JSON to this file after the run.
    #[arg(long, env = "TRADE_ENRICH_METRICS_OUT")]
    metrics_out: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> EnrichConfig {
        let mut config = EnrichConfig::new(&self.catalog)
            .with_batch_size(self.batch_size)
            .with_strategy(self.strategy.into())
            .with_batch_timeout(Duration::from_millis(self.batch_timeout_ms));
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        config.max_in_flight = self.max_in_flight;
        config.shutdown_timeout = Duration::from_millis(self.shutdown_timeout_ms);
        config
    }
}

/// Reject uploads that are empty or not CSV before any work starts.
fn check_upload(path: &Path) -> Result<()> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("input path has no file name: {}", path.display()))?;
    let stem = strip_compression_extension(name);
    let is_csv = Path::new(stem)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        bail!("please upload a CSV file: {name}");
    }
    let len = std::fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?
        .len();
    if len == 0 {
        bail!("please upload a non-empty CSV file: {name}");
    }
    Ok(())
}

fn run(cli: &Cli, service: &TradeEnrichmentService) -> Result<()> {
    let input = open_reader(&cli.input)?;
    let output = match &cli.output {
        Some(path) => create_writer(path)?,
        None => EncodedWriter::plain(io::stdout()),
    };
    let summary = enrich(service, input, output)?;
    info!(
        accepted = summary.accepted,
        skipped = summary.skipped(),
        missing_product = summary.missing_product,
        "wrote enriched trades"
    );
    Ok(())
}

fn enrich(
    service: &TradeEnrichmentService,
    input: impl Read,
    output: EncodedWriter,
) -> Result<trade_enrich::EnrichSummary> {
    service.enrich_to_encoded(input, output).map_err(report)
}

/// Print the structured error body and hand the error on to anyhow.
fn report(err: EnrichError) -> anyhow::Error {
    let body = ErrorResponse::from(&err);
    match serde_json::to_string(&body) {
        Ok(json) => println!("{json}"),
        Err(e) => error!("could not serialise error response: {e}"),
    }
    err.into()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = check_upload(&cli.input) {
        error!("{e:#}");
        return ExitCode::FAILURE;
    }

    let service = match TradeEnrichmentService::start(&cli.config()).map_err(report) {
        Ok(service) => service,
        Err(e) => {
            error!("service failed to start: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = run(&cli, &service);

    #[cfg(feature = "metrics")]
    {
        service.metrics().log();
        if let Some(path) = &cli.metrics_out
            && let Err(e) = service.metrics().save_to_file(path)
        {
            warn!("could not save metrics: {e:#}");
        }
    }

    if let ShutdownOutcome::Stuck { in_flight } = service.shutdown() {
        warn!(in_flight, "worker pool did not terminate");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("enrichment failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}
