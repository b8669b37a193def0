//! Mock I/O helpers: temporary catalog files, and readers and writers that
//! fail on demand.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Catalog CSV text for `products`, header included.
#[must_use]
pub fn catalog_csv(products: &[(&str, &str)]) -> String {
    let mut out = String::from("product_id,product_name\n");
    for (id, name) in products {
        out.push_str(&format!("{id},{name}\n"));
    }
    out
}

/// Write `products` to a temporary `.csv` catalog file.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created or written.
pub fn catalog_file(products: &[(&str, &str)]) -> io::Result<NamedTempFile> {
    temp_file_with(catalog_csv(products).as_bytes(), ".csv")
}

/// A temporary file holding `contents`, named with `suffix`.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created or written.
pub fn temp_file_with(contents: &[u8], suffix: &str) -> io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile()?;
    file.write_all(contents)?;
    file.flush()?;
    Ok(file)
}

/// Write `products` to a temporary catalog compressed according to `suffix`
/// (for example `.csv.gz`).
///
/// # Errors
///
/// Returns an error if the file or the compressor cannot be set up.
pub fn compressed_catalog_file(products: &[(&str, &str)], suffix: &str) -> Result<NamedTempFile> {
    let file = tempfile::Builder::new().suffix(suffix).tempfile()?;
    {
        let mut w = crate::io::compression::create_writer(file.path())?;
        w.write_all(catalog_csv(products).as_bytes())
            .context("write compressed catalog")?;
        w.finish().context("finish compressed catalog")?;
    }
    Ok(file)
}

/// An [`io::Write`] that accepts `budget` bytes and then fails every call.
///
/// Clones share the accepted bytes, so a test can keep a handle while the
/// writer itself is moved into a codec or sink.
#[derive(Clone, Debug, Default)]
pub struct FailingWriter {
    budget: usize,
    written: Arc<Mutex<Vec<u8>>>,
}

impl FailingWriter {
    #[must_use]
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            written: Arc::default(),
        }
    }

    /// A writer that never runs out of budget.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(usize::MAX)
    }

    /// Bytes accepted so far.
    #[must_use]
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }
}

impl Write for FailingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut written = self.written.lock();
        let room = self.budget - written.len();
        if room == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "output sink closed"));
        }
        let n = room.min(buf.len());
        written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.written.lock().len() >= self.budget {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "output sink closed"));
        }
        Ok(())
    }
}

/// An [`io::Read`] that yields the first `budget` bytes of `data` and then
/// fails, like a connection dropped mid-upload.
#[derive(Debug)]
pub struct FailingReader {
    data: Vec<u8>,
    pos: usize,
    budget: usize,
}

impl FailingReader {
    pub fn new(data: impl Into<Vec<u8>>, budget: usize) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            budget,
        }
    }
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let end = self.budget.min(self.data.len());
        if self.pos >= end {
            if self.budget >= self.data.len() {
                return Ok(0);
            }
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "input stream reset"));
        }
        let n = (end - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
