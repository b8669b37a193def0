//! Trade CSV parsing.
//!
//! [`TradeReader`] consumes the header row and then yields one [`RawTrade`]
//! per data row, lazily and in input order. It deliberately does not extract
//! fields: a row with a missing column or the wrong number of fields is a
//! per-record defect, discovered by [`RawTrade::extract`] inside the
//! enrichment step, and never stops the stream. Bytes that are not valid
//! UTF-8 are replaced with U+FFFD rather than failing the row. Only I/O and
//! framing errors from the underlying reader end the stream, as
//! [`EnrichError::ReadingTradeData`].

use crate::error::{EnrichError, EnrichResult};
use csv::{ByteRecord, StringRecord};
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

pub const DATE_HEADER: &str = "date";
pub const PRODUCT_ID_HEADER: &str = "product_id";
pub const CURRENCY_HEADER: &str = "currency";
pub const PRICE_HEADER: &str = "price";

/// Input columns every row must provide, in canonical order.
pub const REQUIRED_COLUMNS: [&str; 4] = [DATE_HEADER, PRODUCT_ID_HEADER, CURRENCY_HEADER, PRICE_HEADER];

/// One trade row with all required fields present. Values are unvalidated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TradeRequestRecord {
    pub date: String,
    pub product_id: String,
    pub currency: String,
    pub price: String,
}

/// Why a row's fields could not be extracted.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("missing required column `{0}`")]
    MissingColumn(&'static str),
    #[error("row has {found} fields but the header has {expected}")]
    WrongFieldCount { expected: usize, found: usize },
}

/// Column positions resolved from the header row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TradeHeader {
    positions: [Option<usize>; 4],
    width: usize,
}

impl TradeHeader {
    /// Resolve required column positions by exact name.
    #[must_use]
    pub fn from_record(header: &StringRecord) -> Self {
        let positions = REQUIRED_COLUMNS.map(|name| header.iter().position(|h| h == name));
        Self {
            positions,
            width: header.len(),
        }
    }

    /// Required columns the header does not name.
    #[must_use]
    pub fn missing_columns(&self) -> Vec<&'static str> {
        REQUIRED_COLUMNS
            .iter()
            .zip(self.positions)
            .filter(|(_, pos)| pos.is_none())
            .map(|(name, _)| *name)
            .collect()
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }
}

/// A data row as read from the input, before field extraction.
#[derive(Clone, Debug)]
pub struct RawTrade {
    /// 1-based data record number (the header is not counted).
    pub record: u64,
    fields: StringRecord,
    header: Arc<TradeHeader>,
}

impl RawTrade {
    pub fn new(record: u64, fields: StringRecord, header: Arc<TradeHeader>) -> Self {
        Self {
            record,
            fields,
            header,
        }
    }

    /// Build a row from plain strings against a header. Mostly for tests.
    pub fn from_fields<I, S>(record: u64, header: &[&str], fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let header = TradeHeader::from_record(&StringRecord::from(header.to_vec()));
        let fields = decode_fields(fields.into_iter().collect(), record);
        Self::new(record, fields, Arc::new(header))
    }

    /// Pull the four required fields out of the row.
    ///
    /// # Errors
    /// [`FieldError::MissingColumn`] if the header lacks a required column,
    /// [`FieldError::WrongFieldCount`] if the row does not match the header width.
    pub fn extract(&self) -> Result<TradeRequestRecord, FieldError> {
        let mut values = [""; 4];
        for (slot, (name, pos)) in values
            .iter_mut()
            .zip(REQUIRED_COLUMNS.iter().zip(self.header.positions))
        {
            let pos = pos.ok_or(FieldError::MissingColumn(*name))?;
            if self.fields.len() != self.header.width {
                return Err(FieldError::WrongFieldCount {
                    expected: self.header.width,
                    found: self.fields.len(),
                });
            }
            *slot = self.fields.get(pos).ok_or(FieldError::MissingColumn(*name))?;
        }
        let [date, product_id, currency, price] = values.map(str::to_string);
        Ok(TradeRequestRecord {
            date,
            product_id,
            currency,
            price,
        })
    }
}

impl fmt::Display for RawTrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} [", self.record)?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(field)?;
        }
        f.write_str("]")
    }
}

/// Lazy, single-pass reader over a trade CSV stream.
pub struct TradeReader<R: Read> {
    rdr: csv::Reader<R>,
    header: Arc<TradeHeader>,
    read: u64,
    done: bool,
}

impl<R: Read> TradeReader<R> {
    /// Consume the header row of `reader`.
    ///
    /// An empty input has an empty header and yields no rows.
    ///
    /// # Errors
    /// Returns [`EnrichError::ReadingTradeData`] if the header cannot be read.
    pub fn new(reader: R) -> EnrichResult<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let header = rdr
            .byte_headers()
            .map(|raw| TradeHeader::from_record(&decode_fields(raw.clone(), 0)))
            .map_err(|source| EnrichError::ReadingTradeData { record: 0, source })?;
        let missing = header.missing_columns();
        if header.width() > 0 && !missing.is_empty() {
            warn!(?missing, "trade header lacks required columns; every row will be skipped");
        }
        Ok(Self {
            rdr,
            header: Arc::new(header),
            read: 0,
            done: false,
        })
    }

    #[must_use]
    pub fn header(&self) -> &TradeHeader {
        &self.header
    }

    /// Number of data rows yielded so far.
    #[must_use]
    pub fn rows_read(&self) -> u64 {
        self.read
    }
}

impl<R: Read> Iterator for TradeReader<R> {
    type Item = EnrichResult<RawTrade>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut raw = ByteRecord::new();
        match self.rdr.read_byte_record(&mut raw) {
            Ok(true) => {
                self.read += 1;
                let fields = decode_fields(raw, self.read);
                Some(Ok(RawTrade::new(self.read, fields, Arc::clone(&self.header))))
            }
            Ok(false) => {
                self.done = true;
                None
            }
            Err(source) => {
                self.done = true;
                Some(Err(EnrichError::ReadingTradeData {
                    record: self.read + 1,
                    source,
                }))
            }
        }
    }
}

/// Decode a raw row, replacing invalid UTF-8 sequences with U+FFFD.
fn decode_fields(raw: ByteRecord, record: u64) -> StringRecord {
    StringRecord::from_byte_record(raw).unwrap_or_else(|e| {
        warn!(record, "trade record is not valid UTF-8; replacing invalid bytes");
        e.into_byte_record()
            .iter()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect()
    })
}
