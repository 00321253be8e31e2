//! I/O helpers: delimiter and encoding resolution, text decoding, and
//! CSV writer construction with output transcoding.
//!
//! Input is decoded per file with whatever encoding the detector (or the
//! caller) chose; output always goes through [`open_csv_writer`], which
//! transcodes UTF-8 to the configured output encoding via `encoding_rs`.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Read, Write},
    path::Path,
};

use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

use crate::error::ConsolidateError;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding, ConsolidateError> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes()).ok_or_else(|| {
            ConsolidateError::UnknownEncoding {
                label: value.to_string(),
            }
        }),
        None => Ok(UTF_8),
    }
}

/// Like [`resolve_encoding`], but rejects encodings `encoding_rs` can only
/// decode (UTF-16 and `replacement`).
pub fn resolve_output_encoding(
    label: Option<&str>,
) -> Result<&'static Encoding, ConsolidateError> {
    let encoding = resolve_encoding(label)?;
    if encoding.output_encoding() != encoding {
        return Err(ConsolidateError::UnsupportedOutputEncoding {
            label: encoding.name().to_string(),
        });
    }
    Ok(encoding)
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn resolve_output_delimiter(path: Option<&Path>, provided: Option<u8>, fallback: u8) -> u8 {
    if let Some(delim) = provided {
        return delim;
    }
    if let Some(path) = path {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => return DEFAULT_TSV_DELIMITER,
            _ => {}
        }
    }
    fallback
}

/// File name used in messages and reports; falls back to the full path.
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn ensure_parent_dir(path: &Path) -> Result<(), ConsolidateError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            fs::create_dir_all(parent).map_err(|err| ConsolidateError::io(parent, err))
        }
        _ => Ok(()),
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

/// Decodes a whole file, dropping a leading byte-order mark. Malformed
/// sequences are an error rather than silently replaced.
pub fn decode_text(
    path: &Path,
    bytes: &[u8],
    encoding: &'static Encoding,
) -> Result<String, ConsolidateError> {
    let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
    if had_errors {
        return Err(ConsolidateError::Decode {
            path: path.to_path_buf(),
            encoding: encoding.name(),
        });
    }
    Ok(text.into_owned())
}

/// Fails on the first value that `encoding` cannot represent, so a write
/// can be refused before the destination is opened.
pub fn check_encodable<'a>(
    path: &Path,
    encoding: &'static Encoding,
    values: impl IntoIterator<Item = &'a String>,
) -> Result<(), ConsolidateError> {
    if encoding == UTF_8 {
        return Ok(());
    }
    for value in values {
        if value.is_ascii() {
            continue;
        }
        let (_, _, had_errors) = encoding.encode(value);
        if had_errors {
            return Err(ConsolidateError::Unencodable {
                path: path.to_path_buf(),
                encoding: encoding.name(),
                value: value.clone(),
            });
        }
    }
    Ok(())
}

/// Opens a CSV writer on `path` (stdout for `None` or `-`), creating the
/// parent directory when needed. The destination is truncated.
pub fn open_csv_writer(
    path: Option<&Path>,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<csv::Writer<Box<dyn Write>>, ConsolidateError> {
    let base: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => {
            ensure_parent_dir(p)?;
            let file = File::create(p).map_err(|err| ConsolidateError::io(p, err))?;
            Box::new(BufWriter::new(file))
        }
        _ => Box::new(io::stdout()),
    };

    let writer: Box<dyn Write> = if encoding == UTF_8 {
        base
    } else {
        Box::new(TranscodingWriter::new(base, encoding))
    };

    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    Ok(builder.from_writer(writer))
}

/// Re-encodes a UTF-8 byte stream into `encoding`. Partial multi-byte
/// sequences at the end of a write are held until the next call.
struct TranscodingWriter<W: Write> {
    inner: W,
    encoding: &'static Encoding,
    pending: Vec<u8>,
}

impl<W: Write> TranscodingWriter<W> {
    fn new(inner: W, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            encoding,
            pending: Vec::new(),
        }
    }

    fn drain_complete(&mut self) -> io::Result<()> {
        let complete = match std::str::from_utf8(&self.pending) {
            Ok(text) => text.len(),
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "invalid UTF-8 in output stream",
                ));
            }
        };
        if complete == 0 {
            return Ok(());
        }
        let tail = self.pending.split_off(complete);
        let head = std::mem::replace(&mut self.pending, tail);
        // `complete` always lands on a char boundary.
        let text = String::from_utf8(head)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let (encoded, _, had_errors) = self.encoding.encode(&text);
        if had_errors {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("text cannot be represented in {}", self.encoding.name()),
            ));
        }
        self.inner.write_all(&encoded)
    }
}

impl<W: Write> Write for TranscodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.drain_complete()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain_complete()?;
        if !self.pending.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "incomplete UTF-8 sequence at end of output stream",
            ));
        }
        self.inner.flush()
    }
}
