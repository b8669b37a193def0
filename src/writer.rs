//! Output writer: the enriched header followed by accepted lines.
//!
//! Two sinks implement the two integration modes:
//! - [`VecSink`] materializes the whole result (header included) in memory;
//! - [`WriterSink`] writes through to any [`std::io::Write`] as lines arrive.
//!
//! Lines are terminated with a fixed `\n` ([`LINE_SEPARATOR`]) on every
//! platform, and no field escaping is applied.

use crate::enrich::EnrichedTradeLine;
use crate::error::EnrichResult;
use std::io::{BufWriter, Write};

/// Header line of every enriched output, written even when no row is accepted.
pub const OUTPUT_HEADER: &str = "date,product_id,product_name,currency,price";

pub const LINE_SEPARATOR: &str = "\n";

/// Destination for enriched output, fed in order by the scheduler.
pub trait LineSink {
    fn write_header(&mut self) -> EnrichResult<()>;

    fn write_line(&mut self, line: &EnrichedTradeLine) -> EnrichResult<()>;

    /// Flush anything buffered. Called once after the last line.
    fn finish(&mut self) -> EnrichResult<()> {
        Ok(())
    }
}

impl<S: LineSink + ?Sized> LineSink for &mut S {
    fn write_header(&mut self) -> EnrichResult<()> {
        (**self).write_header()
    }

    fn write_line(&mut self, line: &EnrichedTradeLine) -> EnrichResult<()> {
        (**self).write_line(line)
    }

    fn finish(&mut self) -> EnrichResult<()> {
        (**self).finish()
    }
}

/// Collects output lines in memory, header first.
#[derive(Debug, Default)]
pub struct VecSink {
    lines: Vec<String>,
}

impl VecSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[must_use]
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

impl LineSink for VecSink {
    fn write_header(&mut self) -> EnrichResult<()> {
        self.lines.push(OUTPUT_HEADER.to_string());
        Ok(())
    }

    fn write_line(&mut self, line: &EnrichedTradeLine) -> EnrichResult<()> {
        self.lines.push(line.to_string());
        Ok(())
    }
}

/// Streams output lines into a buffered writer.
///
/// Any I/O failure is returned as
/// [`EnrichError::WriteOutput`](crate::error::EnrichError::WriteOutput) and
/// aborts the request.
pub struct WriterSink<W: Write> {
    out: BufWriter<W>,
}

impl<W: Write> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: BufWriter::new(out),
        }
    }

    /// Flush and hand back the underlying writer.
    ///
    /// # Errors
    /// Returns the flush error if buffered bytes cannot be written.
    pub fn into_inner(self) -> EnrichResult<W> {
        self.out.into_inner().map_err(|e| e.into_error().into())
    }
}

impl<W: Write> LineSink for WriterSink<W> {
    fn write_header(&mut self) -> EnrichResult<()> {
        self.out.write_all(OUTPUT_HEADER.as_bytes())?;
        self.out.write_all(LINE_SEPARATOR.as_bytes())?;
        Ok(())
    }

    fn write_line(&mut self, line: &EnrichedTradeLine) -> EnrichResult<()> {
        write!(self.out, "{line}{LINE_SEPARATOR}")?;
        Ok(())
    }

    fn finish(&mut self) -> EnrichResult<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_only_output() {
        let mut sink = WriterSink::new(Vec::new());
        sink.write_header().unwrap();
        sink.finish().unwrap();
        let bytes = sink.into_inner().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), format!("{OUTPUT_HEADER}\n"));
    }

    #[test]
    fn vec_sink_keeps_header_first() {
        let mut sink = VecSink::new();
        sink.write_header().unwrap();
        assert_eq!(sink.lines(), [OUTPUT_HEADER.to_string()]);
    }
}
