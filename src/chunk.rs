//! Bounded-memory streaming of delimited rows.
//!
//! [`ChunkReader`] is the producer side of a load: it refills a caller-owned
//! [`RecordChunk`] with at most `chunk_size` raw records per call. The chunk's
//! record buffers are allocated once and overwritten on every refill, so peak
//! memory follows the chunk size rather than the dataset size.

use std::io::Read;

use anyhow::{Context, Result, bail};
use csv::ByteRecord;
use encoding_rs::Encoding;

use crate::io_utils;

#[derive(Debug, Default)]
pub struct RecordChunk {
    records: Vec<ByteRecord>,
    len: usize,
    first_line: usize,
}

impl RecordChunk {
    pub fn with_capacity(rows: usize) -> Self {
        Self {
            records: Vec::with_capacity(rows),
            len: 0,
            first_line: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 1-based source line of the first record (the header is line 1).
    pub fn first_line(&self) -> usize {
        self.first_line
    }

    pub fn records(&self) -> &[ByteRecord] {
        &self.records[..self.len]
    }

    /// Forgets the current rows while keeping the record buffers for reuse.
    pub fn release(&mut self) {
        self.len = 0;
    }

    fn slot(&mut self) -> &mut ByteRecord {
        if self.len == self.records.len() {
            self.records.push(ByteRecord::new());
        }
        &mut self.records[self.len]
    }
}

pub struct ChunkReader<R: Read> {
    reader: csv::Reader<R>,
    headers: Vec<String>,
    chunk_size: usize,
    rows_read: usize,
    exhausted: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(
        reader: R,
        delimiter: u8,
        encoding: &'static Encoding,
        chunk_size: usize,
    ) -> Result<Self> {
        if chunk_size == 0 {
            bail!("Chunk size must be greater than zero");
        }
        let mut reader = io_utils::open_csv_reader(reader, delimiter);
        let headers = io_utils::reader_headers(&mut reader, encoding).context("Reading header row")?;
        Ok(Self {
            reader,
            headers,
            chunk_size,
            rows_read: 0,
            exhausted: false,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Refills `chunk` with up to `chunk_size` rows. Returns `false` once the
    /// source is exhausted and no rows were read.
    pub fn next_chunk(&mut self, chunk: &mut RecordChunk) -> Result<bool> {
        self.next_chunk_at_most(chunk, self.chunk_size)
    }

    /// Like [`ChunkReader::next_chunk`] but never reads more than `max_rows`.
    pub fn next_chunk_at_most(&mut self, chunk: &mut RecordChunk, max_rows: usize) -> Result<bool> {
        chunk.release();
        chunk.first_line = self.rows_read + 2;
        if self.exhausted {
            return Ok(false);
        }
        let limit = max_rows.min(self.chunk_size);
        let field_count = self.headers.len();
        while chunk.len < limit {
            let line = self.rows_read + 2;
            let slot = chunk.slot();
            let more = self
                .reader
                .read_byte_record(slot)
                .with_context(|| format!("Reading line {line}"))?;
            if !more {
                self.exhausted = true;
                break;
            }
            if slot.len() > field_count {
                bail!(
                    "Line {line} has {} field(s) but the header declares {field_count}",
                    slot.len()
                );
            }
            chunk.len += 1;
            self.rows_read += 1;
        }
        Ok(!chunk.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::UTF_8;

    fn reader(data: &str, chunk_size: usize) -> ChunkReader<&[u8]> {
        ChunkReader::new(data.as_bytes(), b';', UTF_8, chunk_size).expect("chunk reader")
    }

    #[test]
    fn chunks_cover_every_row_once() {
        let mut data = String::from("ID;VAL\n");
        for i in 0..7 {
            data.push_str(&format!("{i};{}\n", i * 10));
        }
        let mut chunks = reader(&data, 3);
        let mut chunk = RecordChunk::with_capacity(3);
        let mut sizes = Vec::new();
        let mut ids = Vec::new();
        while chunks.next_chunk(&mut chunk).unwrap() {
            sizes.push(chunk.len());
            ids.extend(chunk.records().iter().map(|r| r[0].to_vec()));
        }
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(chunks.rows_read(), 7);
        let expected = (0..7).map(|i| i.to_string().into_bytes()).collect::<Vec<_>>();
        assert_eq!(ids, expected);
        assert!(!chunks.next_chunk(&mut chunk).unwrap());
    }

    #[test]
    fn exact_multiple_of_chunk_size_ends_cleanly() {
        let mut chunks = reader("A\n1\n2\n3\n4\n", 2);
        let mut chunk = RecordChunk::default();
        assert!(chunks.next_chunk(&mut chunk).unwrap());
        assert_eq!(chunk.first_line(), 2);
        assert!(chunks.next_chunk(&mut chunk).unwrap());
        assert_eq!(chunk.first_line(), 4);
        assert!(!chunks.next_chunk(&mut chunk).unwrap());
        assert!(chunk.is_empty());
    }

    #[test]
    fn short_rows_pass_and_long_rows_fail() {
        let mut chunks = reader("A;B;C\n1;2\n1;2;3;4\n", 10);
        let mut chunk = RecordChunk::default();
        let err = chunks.next_chunk(&mut chunk).unwrap_err();
        assert!(format!("{err:#}").contains("Line 3 has 4 field(s)"));
    }

    #[test]
    fn header_only_source_yields_no_chunks() {
        let mut chunks = reader("A;B\n", 5);
        assert_eq!(chunks.headers(), ["A".to_string(), "B".to_string()]);
        let mut chunk = RecordChunk::default();
        assert!(!chunks.next_chunk(&mut chunk).unwrap());
    }

    #[test]
    fn capped_read_stops_before_malformed_tail() {
        let mut chunks = reader("A;B\n1;2\n3;4\n5;6;7\n", 10);
        let mut chunk = RecordChunk::default();
        assert!(chunks.next_chunk_at_most(&mut chunk, 2).unwrap());
        assert_eq!(chunk.len(), 2);
        assert_eq!(chunks.rows_read(), 2);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert!(ChunkReader::new("A\n".as_bytes(), b';', UTF_8, 0).is_err());
    }
}
