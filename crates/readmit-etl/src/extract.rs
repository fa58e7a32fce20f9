// CSV extraction
//
// Reads a delimited source into a `Table` of text cells. Two modes:
// - whole file: every record in one table
// - chunked: a lazy sequence of tables of at most `chunk_size` rows
//
// Empty cells and the usual NA spellings are read as null. Structural
// problems (no header, ragged rows, invalid UTF-8) fail the whole source.

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter, Trim};
use std::io::{self, Read};
use tracing::{debug, info};

use crate::error::{EtlError, Result};
use crate::table::{Table, Value};

/// Rows per chunk when reading in chunked mode
pub const DEFAULT_CHUNK_SIZE: usize = 25;

/// Cell spellings that mean "no value"
pub const NA_TOKENS: &[&str] = &[
    "", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "#N/A", "-NaN", "<NA>",
];

/// How the source is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractMode {
    #[default]
    WholeFile,
    Chunked { chunk_size: usize },
}

impl ExtractMode {
    pub fn chunked() -> Self {
        ExtractMode::Chunked {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

pub(crate) fn is_na(cell: &str) -> bool {
    NA_TOKENS.contains(&cell.trim())
}

fn to_value(cell: &str) -> Value {
    if is_na(cell) {
        Value::Null
    } else {
        Value::Text(cell.to_string())
    }
}

/// Follows CSV quoting over the raw bytes
///
/// The CSV reader accepts a quoted field that is still open at end of input
/// and returns everything after the quote as one value. This state lets the
/// extractor reject such a source instead.
#[derive(Debug, Clone, Copy)]
struct QuoteState {
    at_field_start: bool,
    in_quotes: bool,
    /// A quote seen inside a quoted field: either an escape or the close
    quote_pending: bool,
}

impl Default for QuoteState {
    fn default() -> Self {
        Self {
            at_field_start: true,
            in_quotes: false,
            quote_pending: false,
        }
    }
}

impl QuoteState {
    fn feed(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.in_quotes {
                if !self.quote_pending {
                    self.quote_pending = b == b'"';
                    continue;
                }
                self.quote_pending = false;
                if b == b'"' {
                    continue;
                }
                self.in_quotes = false;
            }

            match b {
                b',' | b'\n' | b'\r' => self.at_field_start = true,
                b'"' if self.at_field_start => {
                    self.in_quotes = true;
                    self.at_field_start = false;
                },
                _ => self.at_field_start = false,
            }
        }
    }

    fn unterminated(&self) -> bool {
        self.in_quotes && !self.quote_pending
    }
}

/// Source wrapper that feeds every byte read through a [`QuoteState`]
struct QuoteTracking<R> {
    inner: R,
    state: QuoteState,
}

impl<R: Read> Read for QuoteTracking<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.state.feed(&buf[..n]);
        Ok(n)
    }
}

/// Reads CSV sources into tables
#[derive(Debug, Clone, Copy, Default)]
pub struct Extractor {
    mode: ExtractMode,
}

impl Extractor {
    pub fn new(mode: ExtractMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ExtractMode {
        self.mode
    }

    /// Open a source and read its header
    ///
    /// Rows are not read until the returned reader is iterated, so callers can
    /// check the header against the schema before doing any work.
    pub fn open<R: Read>(&self, source_name: &str, reader: R) -> Result<ChunkReader<R>> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .trim(Trim::Headers)
            .from_reader(QuoteTracking {
                inner: reader,
                state: QuoteState::default(),
            });

        let headers: Vec<String> = csv_reader
            .headers()
            .map_err(|e| EtlError::extraction(source_name, e))?
            .iter()
            .map(str::to_string)
            .collect();

        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(EtlError::extraction(source_name, "missing header row"));
        }

        let chunk_size = match self.mode {
            ExtractMode::WholeFile => usize::MAX,
            ExtractMode::Chunked { chunk_size } => chunk_size.max(1),
        };

        debug!(source = %source_name, columns = headers.len(), "opened CSV source");

        Ok(ChunkReader {
            source_name: source_name.to_string(),
            headers,
            records: csv_reader.into_records(),
            chunk_size,
            rows_read: 0,
            done: false,
        })
    }

    /// Read the whole source into one table, whatever the mode
    pub fn extract<R: Read>(&self, source_name: &str, reader: R) -> Result<Table> {
        let chunks = self.open(source_name, reader)?;
        let mut table = Table::new(chunks.headers().to_vec());

        for chunk in chunks {
            table.append(chunk?);
        }

        info!(source = %source_name, rows = table.len(), "extraction complete");
        Ok(table)
    }
}

/// Lazily reads a CSV source one chunk at a time
pub struct ChunkReader<R: Read> {
    source_name: String,
    headers: Vec<String>,
    records: StringRecordsIntoIter<QuoteTracking<R>>,
    chunk_size: usize,
    rows_read: usize,
    done: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Column names exactly as they appear in the header (trimmed)
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    fn convert(&self, record: &StringRecord) -> Vec<Value> {
        record.iter().map(to_value).collect()
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<Table>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut chunk = Table::new(self.headers.clone());

        while chunk.len() < self.chunk_size {
            match self.records.next() {
                Some(Ok(record)) => {
                    let row = self.convert(&record);
                    chunk.push_row(row);
                },
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(EtlError::extraction(&self.source_name, e)));
                },
                None => {
                    self.done = true;
                    if self.records.reader().get_ref().state.unterminated() {
                        return Some(Err(EtlError::extraction(
                            &self.source_name,
                            "quoted field not closed before end of input",
                        )));
                    }
                    break;
                },
            }
        }

        if chunk.is_empty() {
            return None;
        }

        self.rows_read += chunk.len();
        Some(Ok(chunk))
    }
}
