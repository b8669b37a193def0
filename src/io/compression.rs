//! Transparent compression for catalog and trade files.
//!
//! Detection checks the file extension first and falls back to magic bytes,
//! so a gzip'd catalog named `product.csv` still loads. When no codec feature
//! is enabled both helpers reduce to buffered pass-throughs.
//!
//! | Codec | Extensions       | Feature            |
//! |-------|------------------|--------------------|
//! | gzip  | `.gz`, `.gzip`   | `compression-gzip` |
//! | zstd  | `.zst`, `.zstd`  | `compression-zstd` |

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// A supported compression format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Codec {
    Gzip,
    Zstd,
}

impl Codec {
    const ALL: [Codec; 2] = [Codec::Gzip, Codec::Zstd];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Codec::Gzip => "gzip",
            Codec::Zstd => "zstd",
        }
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            Codec::Gzip => &[".gz", ".gzip"],
            Codec::Zstd => &[".zst", ".zstd"],
        }
    }

    fn magic(self) -> &'static [u8] {
        match self {
            Codec::Gzip => &[0x1f, 0x8b],
            Codec::Zstd => &[0x28, 0xb5, 0x2f, 0xfd],
        }
    }

    fn enabled(self) -> bool {
        match self {
            Codec::Gzip => cfg!(feature = "compression-gzip"),
            Codec::Zstd => cfg!(feature = "compression-zstd"),
        }
    }

    fn wrap_reader(self, reader: Box<dyn Read + Send>) -> std::io::Result<Box<dyn Read + Send>> {
        match self {
            #[cfg(feature = "compression-gzip")]
            Codec::Gzip => Ok(Box::new(flate2::read::MultiGzDecoder::new(reader))),
            #[cfg(feature = "compression-zstd")]
            Codec::Zstd => {
                zstd::stream::read::Decoder::new(reader).map(|d| Box::new(d) as Box<dyn Read + Send>)
            }
            #[allow(unreachable_patterns)]
            _ => Ok(reader),
        }
    }

    fn encoder(self, writer: Box<dyn Write + Send>) -> std::io::Result<EncodedWriter> {
        let inner = match self {
            #[cfg(feature = "compression-gzip")]
            Codec::Gzip => Encoder::Gzip(flate2::write::GzEncoder::new(
                writer,
                flate2::Compression::default(),
            )),
            #[cfg(feature = "compression-zstd")]
            Codec::Zstd => Encoder::Zstd(zstd::stream::write::Encoder::new(writer, 3)?),
            #[allow(unreachable_patterns)]
            _ => Encoder::Plain(writer),
        };
        Ok(EncodedWriter { inner })
    }
}

enum Encoder {
    Plain(Box<dyn Write + Send>),
    #[cfg(feature = "compression-gzip")]
    Gzip(flate2::write::GzEncoder<Box<dyn Write + Send>>),
    #[cfg(feature = "compression-zstd")]
    Zstd(zstd::stream::write::Encoder<'static, Box<dyn Write + Send>>),
}

/// Output stream, possibly compressed.
///
/// A compressed stream is only complete after [`EncodedWriter::finish`]: it
/// writes the trailing block and reports any failure doing so. Dropping the
/// writer instead leaves the result undefined.
pub struct EncodedWriter {
    inner: Encoder,
}

impl EncodedWriter {
    /// An uncompressed writer.
    pub fn plain<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            inner: Encoder::Plain(Box::new(writer)),
        }
    }

    /// Codec in use, if any.
    #[must_use]
    pub fn codec(&self) -> Option<Codec> {
        match &self.inner {
            Encoder::Plain(_) => None,
            #[cfg(feature = "compression-gzip")]
            Encoder::Gzip(_) => Some(Codec::Gzip),
            #[cfg(feature = "compression-zstd")]
            Encoder::Zstd(_) => Some(Codec::Zstd),
        }
    }

    /// End the stream and flush everything down to the underlying writer.
    ///
    /// # Errors
    /// Returns the I/O error from writing the trailer or from the final flush.
    pub fn finish(self) -> std::io::Result<()> {
        let mut out = match self.inner {
            Encoder::Plain(w) => w,
            #[cfg(feature = "compression-gzip")]
            Encoder::Gzip(enc) => enc.finish()?,
            #[cfg(feature = "compression-zstd")]
            Encoder::Zstd(enc) => enc.finish()?,
        };
        out.flush()
    }
}

impl Write for EncodedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            Encoder::Plain(w) => w.write(buf),
            #[cfg(feature = "compression-gzip")]
            Encoder::Gzip(enc) => enc.write(buf),
            #[cfg(feature = "compression-zstd")]
            Encoder::Zstd(enc) => enc.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            Encoder::Plain(w) => w.flush(),
            #[cfg(feature = "compression-gzip")]
            Encoder::Gzip(enc) => enc.flush(),
            #[cfg(feature = "compression-zstd")]
            Encoder::Zstd(enc) => enc.flush(),
        }
    }
}

impl std::fmt::Debug for EncodedWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedWriter")
            .field("codec", &self.codec())
            .finish()
    }
}

/// Codec implied by the file name, if any enabled codec claims it.
#[must_use]
pub fn detect_from_extension(path: impl AsRef<Path>) -> Option<Codec> {
    let name = path.as_ref().to_string_lossy().to_lowercase();
    Codec::ALL
        .into_iter()
        .filter(|c| c.enabled())
        .find(|c| c.extensions().iter().any(|ext| name.ends_with(ext)))
}

/// Peek at the buffered stream without consuming it.
fn detect_from_magic<R: BufRead>(reader: &mut R) -> Option<Codec> {
    let buf = reader.fill_buf().ok()?;
    Codec::ALL
        .into_iter()
        .filter(|c| c.enabled())
        .find(|c| buf.starts_with(c.magic()))
}

/// Strip a recognised compression extension, e.g. `trades.csv.gz` -> `trades.csv`.
#[must_use]
pub fn strip_compression_extension(name: &str) -> &str {
    for codec in Codec::ALL {
        for ext in codec.extensions() {
            let Some(split) = name.len().checked_sub(ext.len()) else {
                continue;
            };
            if name.is_char_boundary(split) && name[split..].eq_ignore_ascii_case(ext) {
                return &name[..split];
            }
        }
    }
    name
}

/// Wrap `reader` with a decompressor when the path or content calls for one.
///
/// # Errors
/// Returns an error if the decompressor cannot be initialised.
pub fn auto_detect_reader<R: Read + Send + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Read + Send>> {
    if let Some(codec) = detect_from_extension(&path_hint) {
        return codec
            .wrap_reader(Box::new(reader))
            .with_context(|| format!("wrap reader with {} codec", codec.name()));
    }
    let mut buffered = BufReader::new(reader);
    if let Some(codec) = detect_from_magic(&mut buffered) {
        return codec
            .wrap_reader(Box::new(buffered))
            .with_context(|| format!("wrap reader with {} codec", codec.name()));
    }
    Ok(Box::new(buffered))
}

/// Wrap `writer` with a compressor when the path extension calls for one.
///
/// Call [`EncodedWriter::finish`] once everything is written.
///
/// # Errors
/// Returns an error if the compressor cannot be initialised.
pub fn auto_detect_writer<W: Write + Send + 'static>(
    writer: W,
    path_hint: impl AsRef<Path>,
) -> Result<EncodedWriter> {
    let buffered = Box::new(BufWriter::new(writer));
    match detect_from_extension(&path_hint) {
        Some(codec) => codec
            .encoder(buffered)
            .with_context(|| format!("wrap writer with {} codec", codec.name())),
        None => Ok(EncodedWriter {
            inner: Encoder::Plain(buffered),
        }),
    }
}

/// Open a file for reading with transparent decompression.
///
/// # Errors
/// Returns an error if the file cannot be opened.
pub fn open_reader(path: impl AsRef<Path>) -> Result<Box<dyn Read + Send>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    auto_detect_reader(f, path).with_context(|| format!("setup decompression for {}", path.display()))
}

/// Create a file for writing with transparent compression.
///
/// # Errors
/// Returns an error if the file cannot be created.
pub fn create_writer(path: impl AsRef<Path>) -> Result<EncodedWriter> {
    let path = path.as_ref();
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    auto_detect_writer(f, path).with_context(|| format!("setup compression for {}", path.display()))
}
