//! # trade-enrich
//!
//! Concurrent **batch enrichment** of trade CSV files. Each trade row is
//! checked, joined against a read-only product catalog loaded once at
//! startup, and written back with the product name filled in.
//!
//! ## Key Features
//!
//! - **Load once, share everywhere** - the catalog is read eagerly and shared
//!   by every worker without locking
//! - **Bounded parallelism** - one process-wide worker pool, sized at startup
//! - **Order preserving** - output order equals input order in every strategy
//! - **Skip, don't fail** - bad dates and malformed rows are dropped and logged
//! - **Fail fast on faults** - task panics, timeouts and write errors abort
//!   the request with a stable error code
//! - **Compressed I/O** - gzip and zstd catalogs, inputs and outputs
//!   (feature flags `compression-gzip`, `compression-zstd`)
//!
//! ## Quick Start
//!
//! ```no_run
//! use trade_enrich::*;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let config = EnrichConfig::new("products.csv").with_batch_size(500);
//! let service = TradeEnrichmentService::start(&config)?;
//!
//! let input = "date,product_id,currency,price\n20240101,1,EUR,10.0\n";
//! let lines = service.enrich_to_lines(input.as_bytes())?;
//! assert_eq!(lines[0], OUTPUT_HEADER);
//!
//! service.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! ## Record Rules
//!
//! A row is **accepted** when its `date` is exactly eight digits forming a
//! real calendar date (`yyyyMMdd`). Its `product_id` is looked up in the
//! catalog; when absent the row is still accepted and carries
//! [`MISSING_PRODUCT_NAME`]. Rows with a bad date, a missing column, or the
//! wrong number of fields are **skipped**.
//!
//! ## Strategies
//!
//! - [`Strategy::Batched`] (default) - fixed-size batches, each awaited under
//!   the batch timeout before its lines are written
//! - [`Strategy::Streaming`] - a bounded window of in-flight records whose
//!   results are re-sequenced into input order as they complete
//!
//! ## Errors
//!
//! Fatal conditions surface as [`EnrichError`], each with a stable code
//! (see [`EnrichError::code`]) that an outer surface can return as an
//! [`ErrorResponse`].
//!
//! ## Module Overview
//!
//! - [`catalog`] - product catalog loading and lookup
//! - [`record`] - trade CSV reader and field extraction
//! - [`date`] - trade date validation with a per-request memo
//! - [`enrich`] - the per-record enrichment worker
//! - [`pool`] - process-wide worker pool with graceful shutdown
//! - [`scheduler`] - batch and streaming fan-out with ordered fan-in
//! - [`writer`] - output sinks
//! - [`service`] - the long-lived service object
//! - [`metrics`] - per-request summaries and process-wide counters
//! - [`io`] - compression codecs
//! - [`testing`] - fixtures and fault injection for tests

pub mod catalog;
pub mod config;
pub mod date;
pub mod enrich;
pub mod error;
pub mod io;
pub mod metrics;
pub mod pool;
pub mod record;
pub mod scheduler;
pub mod service;
pub mod testing;
pub mod writer;

pub use catalog::{Catalog, MISSING_PRODUCT_NAME};
pub use config::{EnrichConfig, Strategy};
pub use date::{DateValidator, is_valid_trade_date};
pub use enrich::{CatalogEnricher, EnrichedTradeLine, Enrichment, RecordEnricher, SkipReason, enrich_record};
pub use error::{
    ERROR_LOADING_PRODUCT_DATA, EnrichError, EnrichResult, ErrorResponse, INVALID_CONFIGURATION,
    READING_TRADE_DATA_ERROR, TRADE_LINE_PROCESSING_ERROR,
};
pub use metrics::EnrichSummary;
pub use pool::{ShutdownOutcome, WorkerPool};
pub use record::{RawTrade, TradeReader, TradeRequestRecord};
pub use scheduler::BatchScheduler;
pub use service::TradeEnrichmentService;
pub use writer::{LineSink, OUTPUT_HEADER, VecSink, WriterSink};

#[cfg(feature = "metrics")]
pub use metrics::EnrichMetrics;
