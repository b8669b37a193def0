//! Enrichers that misbehave on purpose.

use crate::catalog::Catalog;
use crate::enrich::{CatalogEnricher, Enrichment, RecordEnricher};
use crate::record::RawTrade;
use std::time::Duration;

/// Enriches normally but panics on one record number.
#[derive(Debug)]
pub struct PanickingEnricher {
    inner: CatalogEnricher,
    panic_on: u64,
}

impl PanickingEnricher {
    #[must_use]
    pub fn new(catalog: Catalog, panic_on: u64) -> Self {
        Self {
            inner: CatalogEnricher::new(catalog),
            panic_on,
        }
    }
}

impl RecordEnricher for PanickingEnricher {
    fn enrich(&self, row: &RawTrade) -> Enrichment {
        if row.record == self.panic_on {
            panic!("simulated fault on record {}", row.record);
        }
        self.inner.enrich(row)
    }
}

/// Sleeps before every record; drives the batch timeout.
#[derive(Debug)]
pub struct SlowEnricher {
    inner: CatalogEnricher,
    delay: Duration,
}

impl SlowEnricher {
    #[must_use]
    pub fn new(catalog: Catalog, delay: Duration) -> Self {
        Self {
            inner: CatalogEnricher::new(catalog),
            delay,
        }
    }
}

impl RecordEnricher for SlowEnricher {
    fn enrich(&self, row: &RawTrade) -> Enrichment {
        std::thread::sleep(self.delay);
        self.inner.enrich(row)
    }
}
