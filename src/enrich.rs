//! Per-record enrichment.
//!
//! [`enrich_record`] maps one [`RawTrade`] to an [`Enrichment`]: either an
//! accepted output line or an explicit skip with its reason. It only reads
//! its inputs (the row, the shared [`Catalog`], and a concurrency-safe
//! [`DateValidator`]), so any number of workers may call it at once.
//!
//! Steps, in order:
//! 1. extract `date`, `product_id`, `currency`, `price` (skip if absent);
//! 2. validate `date` as `yyyyMMdd` (skip if invalid);
//! 3. look up the product name, substituting
//!    [`MISSING_PRODUCT_NAME`](crate::catalog::MISSING_PRODUCT_NAME) on a miss
//!    (the row is still emitted);
//! 4. join the five output fields with commas, without escaping.

use crate::catalog::Catalog;
use crate::date::DateValidator;
use crate::record::{FieldError, RawTrade};
use std::fmt;
use tracing::error;

/// Output column order.
pub const OUTPUT_COLUMNS: [&str; 5] = ["date", "product_id", "product_name", "currency", "price"];

/// A successfully enriched trade, ready to be written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrichedTradeLine {
    pub date: String,
    pub product_id: String,
    pub product_name: String,
    pub currency: String,
    pub price: String,
    catalog_miss: bool,
}

impl EnrichedTradeLine {
    /// `true` when the product name is the missing-product placeholder.
    #[must_use]
    pub fn is_catalog_miss(&self) -> bool {
        self.catalog_miss
    }
}

impl fmt::Display for EnrichedTradeLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{}",
            self.date, self.product_id, self.product_name, self.currency, self.price
        )
    }
}

/// Why a record was left out of the output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// A required field could not be read from the row.
    MalformedRow(FieldError),
    /// The date is not a valid `yyyyMMdd` calendar date.
    InvalidDate(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MalformedRow(e) => write!(f, "malformed row: {e}"),
            SkipReason::InvalidDate(d) => write!(f, "invalid date {d:?}"),
        }
    }
}

/// Result of enriching one record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Enrichment {
    Accepted(EnrichedTradeLine),
    Skipped { record: u64, reason: SkipReason },
}

impl Enrichment {
    #[must_use]
    pub fn accepted(&self) -> Option<&EnrichedTradeLine> {
        match self {
            Enrichment::Accepted(line) => Some(line),
            Enrichment::Skipped { .. } => None,
        }
    }
}

/// A unit of work the scheduler can run on any worker thread.
///
/// Implementations must be pure with respect to shared state: the scheduler
/// may call `enrich` for different rows concurrently.
pub trait RecordEnricher: Send + Sync {
    fn enrich(&self, row: &RawTrade) -> Enrichment;
}

/// Enrich one row against the catalog.
pub fn enrich_record(row: &RawTrade, catalog: &Catalog, dates: &DateValidator) -> Enrichment {
    let rec = match row.extract() {
        Ok(rec) => rec,
        Err(e) => {
            error!(record = row.record, "invalid trade record {row}: {e}");
            return Enrichment::Skipped {
                record: row.record,
                reason: SkipReason::MalformedRow(e),
            };
        }
    };

    if !dates.is_valid(&rec.date) {
        error!(record = row.record, "invalid date format in the record: {row}");
        return Enrichment::Skipped {
            record: row.record,
            reason: SkipReason::InvalidDate(rec.date),
        };
    }

    let (product_name, catalog_miss) = match catalog.product_name(&rec.product_id) {
        Some(name) => (name.to_string(), false),
        None => {
            error!(record = row.record, "missing product mapping for id: {}", rec.product_id);
            (catalog.name_or_missing(&rec.product_id).to_string(), true)
        }
    };

    Enrichment::Accepted(EnrichedTradeLine {
        date: rec.date,
        product_id: rec.product_id,
        product_name,
        currency: rec.currency,
        price: rec.price,
        catalog_miss,
    })
}

/// The production enricher: catalog lookup plus a per-request date memo.
///
/// Build a fresh one per request so the memo never outlives it.
#[derive(Debug)]
pub struct CatalogEnricher {
    catalog: Catalog,
    dates: DateValidator,
}

impl CatalogEnricher {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            dates: DateValidator::new(),
        }
    }

    #[must_use]
    pub fn dates(&self) -> &DateValidator {
        &self.dates
    }
}

impl RecordEnricher for CatalogEnricher {
    fn enrich(&self, row: &RawTrade) -> Enrichment {
        enrich_record(row, &self.catalog, &self.dates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MISSING_PRODUCT_NAME;

    const HEADER: [&str; 4] = ["date", "product_id", "currency", "price"];

    fn catalog() -> Catalog {
        Catalog::from_pairs([("1", "Treasury Bills Domestic"), ("2", "Corporate Bonds Domestic")])
    }

    #[test]
    fn known_product_is_joined_verbatim() {
        let row = RawTrade::from_fields(1, &HEADER, ["20240101", "1", "EUR", "10.0"]);
        let out = enrich_record(&row, &catalog(), &DateValidator::new());
        let line = out.accepted().expect("accepted");
        assert_eq!(line.to_string(), "20240101,1,Treasury Bills Domestic,EUR,10.0");
        assert!(!line.is_catalog_miss());
    }

    #[test]
    fn unknown_product_uses_placeholder() {
        let row = RawTrade::from_fields(1, &HEADER, ["20240101", "9", "EUR", "10.0"]);
        let out = enrich_record(&row, &catalog(), &DateValidator::new());
        let line = out.accepted().expect("still accepted");
        assert_eq!(line.product_name, MISSING_PRODUCT_NAME);
        assert!(line.is_catalog_miss());
    }

    #[test]
    fn invalid_date_is_skipped() {
        let row = RawTrade::from_fields(4, &HEADER, ["2024-01-01", "1", "EUR", "10.0"]);
        let out = enrich_record(&row, &catalog(), &DateValidator::new());
        assert_eq!(
            out,
            Enrichment::Skipped {
                record: 4,
                reason: SkipReason::InvalidDate("2024-01-01".into())
            }
        );
    }

    #[test]
    fn short_row_is_skipped_not_fatal() {
        let row = RawTrade::from_fields(2, &HEADER, ["20240101", "1", "EUR"]);
        let out = enrich_record(&row, &catalog(), &DateValidator::new());
        assert!(matches!(
            out,
            Enrichment::Skipped {
                reason: SkipReason::MalformedRow(FieldError::WrongFieldCount { .. }),
                ..
            }
        ));
    }

    #[test]
    fn catalog_enricher_memoizes_dates() {
        let enricher = CatalogEnricher::new(catalog());
        for i in 0..5 {
            let row = RawTrade::from_fields(i, &HEADER, ["20240101", "2", "EUR", "1"]);
            assert!(enricher.enrich(&row).accepted().is_some());
        }
        assert_eq!(enricher.dates().memoized(), 1);
    }

    /// Records the level of every event emitted while installed.
    struct LevelRecorder(std::sync::Arc<parking_lot::Mutex<Vec<tracing::Level>>>);

    impl tracing::Subscriber for LevelRecorder {
        fn enabled(&self, _: &tracing::Metadata<'_>) -> bool {
            true
        }

        fn new_span(&self, _: &tracing::span::Attributes<'_>) -> tracing::span::Id {
            tracing::span::Id::from_u64(1)
        }

        fn record(&self, _: &tracing::span::Id, _: &tracing::span::Record<'_>) {}

        fn record_follows_from(&self, _: &tracing::span::Id, _: &tracing::span::Id) {}

        fn event(&self, event: &tracing::Event<'_>) {
            self.0.lock().push(*event.metadata().level());
        }

        fn enter(&self, _: &tracing::span::Id) {}

        fn exit(&self, _: &tracing::span::Id) {}
    }

    #[test]
    fn record_defects_are_logged_at_error_level() {
        let levels = std::sync::Arc::default();
        let rows = [
            RawTrade::from_fields(1, &HEADER, ["20240101", "1", "EUR"]),
            RawTrade::from_fields(2, &HEADER, ["2024-01-01", "1", "EUR", "10.0"]),
            RawTrade::from_fields(3, &HEADER, ["20240101", "9", "EUR", "10.0"]),
        ];
        tracing::subscriber::with_default(LevelRecorder(std::sync::Arc::clone(&levels)), || {
            for row in &rows {
                enrich_record(row, &catalog(), &DateValidator::new());
            }
        });
        assert_eq!(*levels.lock(), [tracing::Level::ERROR; 3]);
    }
}
