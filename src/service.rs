//! The enrichment service: one long-lived object per process.
//!
//! [`TradeEnrichmentService::start`] validates the configuration, loads the
//! catalog (a failure here is fatal and the service never comes up) and
//! starts the shared worker pool. Each request then goes through
//! [`TradeEnrichmentService::enrich`], which accepts any reader and any
//! [`LineSink`]; [`enrich_to_lines`](TradeEnrichmentService::enrich_to_lines)
//! and [`enrich_to_writer`](TradeEnrichmentService::enrich_to_writer) are the
//! buffered and write-through integration modes built on top of it.

use crate::catalog::Catalog;
use crate::config::{EnrichConfig, Strategy};
use crate::enrich::CatalogEnricher;
use crate::error::{EnrichError, EnrichResult, TRADE_LINE_PROCESSING_ERROR};
use crate::io::compression::EncodedWriter;
use crate::metrics::EnrichSummary;
use crate::pool::{ShutdownOutcome, WorkerPool};
use crate::record::TradeReader;
use crate::scheduler::BatchScheduler;
use crate::writer::{LineSink, VecSink, WriterSink};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[cfg(feature = "metrics")]
use crate::metrics::EnrichMetrics;

pub struct TradeEnrichmentService {
    catalog: Catalog,
    pool: Arc<WorkerPool>,
    scheduler: BatchScheduler,
    strategy: Strategy,
    shutdown_timeout: Duration,
    #[cfg(feature = "metrics")]
    metrics: EnrichMetrics,
}

impl TradeEnrichmentService {
    /// Bring the service up from configuration.
    ///
    /// # Errors
    /// [`EnrichError::InvalidConfig`](crate::error::EnrichError::InvalidConfig)
    /// for bad settings and
    /// [`EnrichError::CatalogLoad`](crate::error::EnrichError::CatalogLoad) when
    /// the catalog cannot be read.
    pub fn start(config: &EnrichConfig) -> EnrichResult<Self> {
        config.validate()?;
        let catalog = Catalog::load(&config.product_catalog_path)?;
        let pool = Arc::new(WorkerPool::new(config.workers)?);
        Ok(Self::with_parts(catalog, pool, config))
    }

    /// Assemble a service from an already loaded catalog and a shared pool.
    pub fn with_parts(catalog: Catalog, pool: Arc<WorkerPool>, config: &EnrichConfig) -> Self {
        Self {
            catalog,
            scheduler: BatchScheduler::new(Arc::clone(&pool), config),
            pool,
            strategy: config.strategy,
            shutdown_timeout: config.shutdown_timeout,
            #[cfg(feature = "metrics")]
            metrics: EnrichMetrics::new(),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn metrics(&self) -> &EnrichMetrics {
        &self.metrics
    }

    /// Enrich `input` into `sink` using the configured strategy.
    ///
    /// # Errors
    /// Any fatal error from reading, scheduling, or writing; see
    /// [`BatchScheduler::run`].
    pub fn enrich<R, S>(&self, input: R, sink: &mut S) -> EnrichResult<EnrichSummary>
    where
        R: Read,
        S: LineSink + ?Sized,
    {
        self.enrich_with(self.strategy, input, sink)
    }

    /// Like [`enrich`](Self::enrich) with an explicit strategy.
    ///
    /// # Errors
    /// See [`enrich`](Self::enrich).
    pub fn enrich_with<R, S>(&self, strategy: Strategy, input: R, sink: &mut S) -> EnrichResult<EnrichSummary>
    where
        R: Read,
        S: LineSink + ?Sized,
    {
        info!(?strategy, batch_size = self.scheduler.batch_size(), "enrichment request started");
        // Fresh enricher per request keeps the date memo request-scoped.
        let enricher = Arc::new(CatalogEnricher::new(self.catalog.clone()));
        let result = TradeReader::new(input)
            .and_then(|rows| self.scheduler.run(strategy, rows, enricher, sink));
        match &result {
            Ok(summary) => {
                info!(
                    rows = summary.rows_read,
                    accepted = summary.accepted,
                    skipped = summary.skipped(),
                    missing_product = summary.missing_product,
                    elapsed_ms = summary.elapsed.as_millis() as u64,
                    "enrichment request finished"
                );
                #[cfg(feature = "metrics")]
                self.metrics.record(summary);
            }
            Err(e) => {
                error!(code = e.code(), "enrichment request failed: {e}");
                #[cfg(feature = "metrics")]
                self.metrics.record_failure(e);
            }
        }
        result
    }

    /// Buffered mode: the full output, header first, as a list of lines.
    ///
    /// # Errors
    /// See [`enrich`](Self::enrich).
    pub fn enrich_to_lines<R: Read>(&self, input: R) -> EnrichResult<Vec<String>> {
        let mut sink = VecSink::new();
        self.enrich(input, &mut sink)?;
        Ok(sink.into_lines())
    }

    /// Write-through mode: lines go to `out` as they are released.
    ///
    /// # Errors
    /// See [`enrich`](Self::enrich); write failures are fatal.
    pub fn enrich_to_writer<R: Read, W: Write>(&self, input: R, out: W) -> EnrichResult<EnrichSummary> {
        let mut sink = WriterSink::new(out);
        let summary = self.enrich(input, &mut sink)?;
        sink.into_inner()?;
        Ok(summary)
    }

    /// Write-through into a possibly compressed output, then end the stream.
    ///
    /// # Errors
    /// See [`enrich`](Self::enrich); a failure to write the stream trailer is
    /// fatal like any other write failure.
    pub fn enrich_to_encoded<R: Read>(&self, input: R, mut out: EncodedWriter) -> EnrichResult<EnrichSummary> {
        let summary = self.enrich_to_writer(input, &mut out)?;
        out.finish().map_err(|e| {
            error!(code = TRADE_LINE_PROCESSING_ERROR, "failed to finish enriched output: {e}");
            EnrichError::WriteOutput(e)
        })?;
        Ok(summary)
    }

    /// Graceful pool shutdown; see [`WorkerPool::shutdown`].
    pub fn shutdown(&self) -> ShutdownOutcome {
        self.pool.shutdown(self.shutdown_timeout)
    }
}
