//! CSV reader construction, encoding resolution, and transcoded writes.
//!
//! Source files and dictionary files share one field delimiter and one text
//! encoding. Fields are read as raw bytes and decoded through `encoding_rs`;
//! text written back out is encoded the same way, so a dictionary produced in
//! `latin1` reads back byte-for-byte with the settings that wrote it.

use std::{fs, io::Read, path::Path};

use anyhow::{Context, Result, anyhow};
use encoding_rs::Encoding;

pub fn resolve_encoding(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| anyhow!("Unknown encoding '{label}'"))
}

/// Reader that tolerates short rows; over-long rows are rejected by the caller.
pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    decode_record(&headers, encoding)
}

/// Serializes `rows` as delimited text and writes it to `path` in `encoding`,
/// replacing any existing file.
pub fn write_encoded_csv<I, R>(
    path: &Path,
    rows: I,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<()>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(row).context("Serializing delimited row")?;
    }
    let buffer = writer
        .into_inner()
        .map_err(|err| anyhow!("Flushing delimited output: {}", err.error()))?;
    let text = String::from_utf8(buffer).context("Delimited output is not valid UTF-8")?;
    let (encoded, _, had_errors) = encoding.encode(&text);
    if had_errors {
        return Err(anyhow!(
            "Text for {path:?} cannot be represented in {}",
            encoding.name()
        ));
    }
    fs::write(path, encoded.as_ref()).with_context(|| format!("Writing {path:?}"))
}

pub fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
