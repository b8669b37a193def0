//! Configuration surface consumed by the enrichment core.
//!
//! The values are supplied from outside (command-line flags, environment, or a
//! host application). [`EnrichConfig::default`] mirrors the runner defaults of
//! a batch engine: parallelism follows the logical core count.

use crate::error::{EnrichError, EnrichResult};
use std::path::PathBuf;
use std::time::Duration;

/// How records are dispatched to the worker pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Read up to `batch_size` records, fan the batch out, wait for all of it,
    /// append results in batch order, then move to the next batch.
    #[default]
    Batched,
    /// Submit every record as soon as it is parsed and re-sequence results in a
    /// single writer. Output order still equals input order.
    Streaming,
}

#[derive(Clone, Debug)]
pub struct EnrichConfig {
    /// Maximum number of records per batch. Must be positive.
    pub batch_size: usize,
    /// Location of the product catalog CSV.
    pub product_catalog_path: PathBuf,
    /// Worker pool size.
    pub workers: usize,
    /// Upper bound on how long the scheduler waits for one unit of work.
    pub batch_timeout: Duration,
    /// Bound used for both the drain and the cancel phase of pool shutdown.
    pub shutdown_timeout: Duration,
    pub strategy: Strategy,
    /// Records allowed in flight in streaming mode. `None` means `batch_size`.
    pub max_in_flight: Option<usize>,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            product_catalog_path: PathBuf::from("product.csv"),
            workers: num_cpus::get().max(1),
            batch_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(5),
            strategy: Strategy::Batched,
            max_in_flight: None,
        }
    }
}

impl EnrichConfig {
    /// Config for the given catalog path with all other values defaulted.
    pub fn new(product_catalog_path: impl Into<PathBuf>) -> Self {
        Self {
            product_catalog_path: product_catalog_path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    /// Effective streaming window.
    #[must_use]
    pub fn in_flight_limit(&self) -> usize {
        self.max_in_flight.unwrap_or(self.batch_size)
    }

    /// Reject values the scheduler cannot work with.
    ///
    /// # Errors
    /// Returns [`EnrichError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> EnrichResult<()> {
        if self.batch_size == 0 {
            return Err(EnrichError::InvalidConfig("batch_size must be > 0".into()));
        }
        if self.workers == 0 {
            return Err(EnrichError::InvalidConfig("workers must be > 0".into()));
        }
        if self.max_in_flight == Some(0) {
            return Err(EnrichError::InvalidConfig("max_in_flight must be > 0".into()));
        }
        if self.batch_timeout.is_zero() {
            return Err(EnrichError::InvalidConfig("batch_timeout must be > 0".into()));
        }
        Ok(())
    }
}
