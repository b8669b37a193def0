//! Trade date validation (`yyyyMMdd`).
//!
//! [`is_valid_trade_date`] is the pure predicate. [`DateValidator`] adds a
//! memo in front of it: trade files repeat the same handful of dates, so each
//! distinct string is parsed once. The memo is a [`DashMap`] because worker
//! threads share one validator per request; it is dropped with the request
//! and capped in size, so nothing accumulates across requests.

use chrono::{Datelike, NaiveDate};
use dashmap::DashMap;

pub const TRADE_DATE_FORMAT: &str = "%Y%m%d";

/// Default cap on distinct memoized date strings per validator.
pub const DEFAULT_MEMO_CAPACITY: usize = 4096;

/// `true` iff `date` is exactly eight ASCII digits forming a real calendar
/// date of the common era (year 0001 or later).
#[must_use]
pub fn is_valid_trade_date(date: &str) -> bool {
    // chrono's %Y also accepts signs and wider years; pin the shape first.
    date.len() == 8
        && date.bytes().all(|b| b.is_ascii_digit())
        && NaiveDate::parse_from_str(date, TRADE_DATE_FORMAT).is_ok_and(|d| d.year() >= 1)
}

/// Concurrency-safe memoizing wrapper around [`is_valid_trade_date`].
#[derive(Debug)]
pub struct DateValidator {
    memo: DashMap<String, bool>,
    capacity: usize,
}

impl Default for DateValidator {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MEMO_CAPACITY)
    }
}

impl DateValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validator that memoizes at most `capacity` distinct strings.
    /// Lookups past the cap are computed but not stored.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            memo: DashMap::new(),
            capacity,
        }
    }

    #[must_use]
    pub fn is_valid(&self, date: &str) -> bool {
        if let Some(hit) = self.memo.get(date) {
            return *hit;
        }
        let valid = is_valid_trade_date(date);
        if self.memo.len() < self.capacity {
            self.memo.insert(date.to_string(), valid);
        }
        valid
    }

    /// Number of distinct strings currently memoized.
    #[must_use]
    pub fn memoized(&self) -> usize {
        self.memo.len()
    }
}
