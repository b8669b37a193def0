//! Fatal error taxonomy for trade enrichment.
//!
//! Only failures that abort a whole request (or prevent the service from
//! starting) are errors. Record-level defects such as a malformed date are
//! reported through [`Enrichment::Skipped`](crate::enrich::Enrichment::Skipped)
//! instead and never surface here.
//!
//! Every variant maps to a stable, machine-readable code via
//! [`EnrichError::code`], which is what an outer surface (HTTP handler, CLI)
//! should report to callers.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Code reported when the product catalog cannot be loaded.
pub const ERROR_LOADING_PRODUCT_DATA: &str = "ERROR_LOADING_PRODUCT_DATA";
/// Code reported when the trade input stream cannot be read.
pub const READING_TRADE_DATA_ERROR: &str = "READING_TRADE_DATA_ERROR";
/// Code reported when a worker task faults or the output cannot be written.
pub const TRADE_LINE_PROCESSING_ERROR: &str = "TRADE_LINE_PROCESSING_ERROR";
/// Code reported for rejected configuration values.
pub const INVALID_CONFIGURATION: &str = "INVALID_CONFIGURATION";

/// Convenience alias used across the crate.
pub type EnrichResult<T> = Result<T, EnrichError>;

/// A fatal enrichment failure.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// The product catalog could not be opened or parsed. Start-up fails.
    #[error("failed to load product catalog from {}: {reason}", path.display())]
    CatalogLoad { path: PathBuf, reason: String },

    /// The trade input could not be read (I/O or CSV framing failure).
    #[error("failed to read trade data at record {record}: {source}")]
    ReadingTradeData {
        record: u64,
        #[source]
        source: csv::Error,
    },

    /// A worker task failed for a reason other than bad record data.
    #[error("trade line processing failed: {0}")]
    TradeLineProcessing(String),

    /// The scheduler gave up waiting on a unit of work.
    #[error("batch of {pending} trade lines did not complete within {timeout:?}")]
    BatchTimeout { pending: usize, timeout: Duration },

    /// The output sink rejected a write.
    #[error("failed to write enriched output: {0}")]
    WriteOutput(#[from] std::io::Error),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EnrichError {
    /// The stable machine-readable code for this failure.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::CatalogLoad { .. } => ERROR_LOADING_PRODUCT_DATA,
            Self::ReadingTradeData { .. } => READING_TRADE_DATA_ERROR,
            Self::TradeLineProcessing(_) | Self::BatchTimeout { .. } | Self::WriteOutput(_) => {
                TRADE_LINE_PROCESSING_ERROR
            }
            Self::InvalidConfig(_) => INVALID_CONFIGURATION,
        }
    }

    /// Whether the failure happened before any request could be served.
    #[must_use]
    pub fn is_startup(&self) -> bool {
        matches!(self, Self::CatalogLoad { .. } | Self::InvalidConfig(_))
    }

    pub(crate) fn catalog(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CatalogLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Structured error body handed to callers of an outer surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&EnrichError> for ErrorResponse {
    fn from(err: &EnrichError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}
