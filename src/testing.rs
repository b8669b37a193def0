//! Testing utilities for the enrichment service.
//!
//! - **Fixtures**: sample catalogs and trade CSV text built from plain rows
//! - **Mock I/O**: temporary catalog files and a writer that fails on demand
//! - **Faults**: enrichers that panic or stall, to drive the fatal paths
//!
//! ```
//! use trade_enrich::testing::*;
//!
//! let input = trade_csv(&[["20240101", "1", "EUR", "10.0"]]);
//! assert!(input.starts_with(TRADE_HEADER));
//! ```

mod faults;
mod fixtures;
mod mock_io;

pub use faults::*;
pub use fixtures::*;
pub use mock_io::*;
