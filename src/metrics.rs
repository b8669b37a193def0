//! Enrichment statistics.
//!
//! Every request produces an [`EnrichSummary`]. With the `metrics` feature
//! the service also folds summaries into a process-wide [`EnrichMetrics`]
//! collector, which can be snapshotted as JSON, logged, or saved to a file.

use crate::enrich::{Enrichment, SkipReason};
use serde::{Serialize, Serializer};
use std::time::Duration;

/// Outcome counts for one enrichment request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EnrichSummary {
    pub rows_read: u64,
    pub accepted: u64,
    pub skipped_invalid_date: u64,
    pub skipped_malformed: u64,
    /// Accepted rows written with the missing-product placeholder.
    pub missing_product: u64,
    /// Units of work dispatched (batches, or records in streaming mode).
    pub batches: u64,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

impl EnrichSummary {
    pub(crate) fn record(&mut self, outcome: &Enrichment) {
        self.rows_read += 1;
        match outcome {
            Enrichment::Accepted(line) => {
                self.accepted += 1;
                if line.is_catalog_miss() {
                    self.missing_product += 1;
                }
            }
            Enrichment::Skipped {
                reason: SkipReason::InvalidDate(_),
                ..
            } => self.skipped_invalid_date += 1,
            Enrichment::Skipped {
                reason: SkipReason::MalformedRow(_),
                ..
            } => self.skipped_malformed += 1,
        }
    }

    /// Rows left out of the output.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped_invalid_date + self.skipped_malformed
    }
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(feature = "metrics")]
pub use collector::EnrichMetrics;

#[cfg(feature = "metrics")]
mod collector {
    use super::EnrichSummary;
    use crate::error::EnrichError;
    use anyhow::{Context, Result};
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tracing::info;

    #[derive(Default)]
    struct Counters {
        requests: AtomicU64,
        rows_read: AtomicU64,
        accepted: AtomicU64,
        skipped_invalid_date: AtomicU64,
        skipped_malformed: AtomicU64,
        missing_product: AtomicU64,
        batches: AtomicU64,
        elapsed_ms: AtomicU64,
        failures: Mutex<BTreeMap<&'static str, u64>>,
    }

    /// Process-wide counters shared by all requests. Cloning shares state.
    #[derive(Clone, Default)]
    pub struct EnrichMetrics {
        inner: Arc<Counters>,
    }

    impl EnrichMetrics {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Fold a completed request into the totals.
        pub fn record(&self, summary: &EnrichSummary) {
            let c = &self.inner;
            c.requests.fetch_add(1, Ordering::Relaxed);
            c.rows_read.fetch_add(summary.rows_read, Ordering::Relaxed);
            c.accepted.fetch_add(summary.accepted, Ordering::Relaxed);
            c.skipped_invalid_date
                .fetch_add(summary.skipped_invalid_date, Ordering::Relaxed);
            c.skipped_malformed
                .fetch_add(summary.skipped_malformed, Ordering::Relaxed);
            c.missing_product
                .fetch_add(summary.missing_product, Ordering::Relaxed);
            c.batches.fetch_add(summary.batches, Ordering::Relaxed);
            let ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX);
            c.elapsed_ms.fetch_add(ms, Ordering::Relaxed);
        }

        /// Count a failed request under its error code.
        pub fn record_failure(&self, err: &EnrichError) {
            self.inner.requests.fetch_add(1, Ordering::Relaxed);
            *self.inner.failures.lock().entry(err.code()).or_default() += 1;
        }

        #[must_use]
        pub fn requests(&self) -> u64 {
            self.inner.requests.load(Ordering::Relaxed)
        }

        #[must_use]
        pub fn failures(&self, code: &str) -> u64 {
            self.inner.failures.lock().get(code).copied().unwrap_or(0)
        }

        /// All counters as a JSON object.
        #[must_use]
        pub fn to_json(&self) -> Value {
            let c = &self.inner;
            let load = |a: &AtomicU64| a.load(Ordering::Relaxed);
            json!({
                "requests": load(&c.requests),
                "rows_read": load(&c.rows_read),
                "accepted": load(&c.accepted),
                "skipped_invalid_date": load(&c.skipped_invalid_date),
                "skipped_malformed": load(&c.skipped_malformed),
                "missing_product": load(&c.missing_product),
                "batches": load(&c.batches),
                "elapsed_ms": load(&c.elapsed_ms),
                "failures": c.failures.lock().clone(),
            })
        }

        /// Log the current totals at info level.
        pub fn log(&self) {
            info!(metrics = %self.to_json(), "enrichment metrics");
        }

        /// Save the totals as pretty-printed JSON.
        ///
        /// # Errors
        /// Returns an error if the file cannot be created or written.
        pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
            let path = path.as_ref();
            let formatted = serde_json::to_string_pretty(&self.to_json())?;
            std::fs::write(path, formatted).with_context(|| format!("write {}", path.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::date::DateValidator;
    use crate::enrich::enrich_record;
    use crate::record::RawTrade;

    #[test]
    fn summary_counts_each_outcome() {
        let header = ["date", "product_id", "currency", "price"];
        let catalog = Catalog::from_pairs([("1", "Bills")]);
        let dates = DateValidator::new();
        let rows = [
            RawTrade::from_fields(1, &header, ["20240101", "1", "EUR", "1"]),
            RawTrade::from_fields(2, &header, ["20240101", "2", "EUR", "1"]),
            RawTrade::from_fields(3, &header, ["bad", "1", "EUR", "1"]),
            RawTrade::from_fields(4, &header, ["20240101"]),
        ];
        let mut summary = EnrichSummary::default();
        for row in &rows {
            summary.record(&enrich_record(row, &catalog, &dates));
        }
        assert_eq!(summary.rows_read, 4);
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.missing_product, 1);
        assert_eq!(summary.skipped(), 2);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["elapsed_ms"], 0);
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn collector_accumulates_requests() {
        let metrics = EnrichMetrics::new();
        let summary = EnrichSummary {
            rows_read: 3,
            accepted: 2,
            skipped_invalid_date: 1,
            ..EnrichSummary::default()
        };
        metrics.record(&summary);
        metrics.record(&summary);
        metrics.record_failure(&crate::error::EnrichError::TradeLineProcessing("x".into()));
        assert_eq!(metrics.requests(), 3);
        assert_eq!(metrics.failures("TRADE_LINE_PROCESSING_ERROR"), 1);
        let json = metrics.to_json();
        assert_eq!(json["accepted"], 4);
        assert_eq!(json["failures"]["TRADE_LINE_PROCESSING_ERROR"], 1);
    }
}
