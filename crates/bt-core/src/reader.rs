//! Line source: turns a bodyfile byte stream into filtered records.

use std::io::BufRead;

use rayon::prelude::*;
use thiserror::Error;

use crate::filter::{CompiledFilter, EvalError, apply_filter};
use crate::record::{Record, RecordError, parse_record};

/// Lines starting with this character are ignored.
pub const COMMENT_MARKER: char = '#';

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: RecordError,
    },

    #[error("line {line}: could not evaluate filter: {source}")]
    Eval {
        line: usize,
        #[source]
        source: EvalError,
    },
}

impl ReadError {
    /// 1-based line number of a data error.
    pub const fn line(&self) -> Option<usize> {
        match self {
            Self::Io(_) => None,
            Self::Record { line, .. } | Self::Eval { line, .. } => Some(*line),
        }
    }
}

/// Parses one raw line, returning `None` for comments and blank lines.
pub fn parse_line(line: &str) -> Option<Result<Record, RecordError>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() || line.starts_with(COMMENT_MARKER) {
        return None;
    }
    Some(parse_record(line))
}

/// Parses and filters one numbered line. `Ok(None)` means skipped, either
/// as a comment or because the filter rejected it.
fn scan_line(
    number: usize,
    line: &str,
    filter: Option<&CompiledFilter>,
) -> Result<Option<Record>, ReadError> {
    parse_line(line).map_or(Ok(None), |parsed| accept(number, parsed, filter))
}

/// Applies the filter to a parsed data line.
fn accept(
    number: usize,
    parsed: Result<Record, RecordError>,
    filter: Option<&CompiledFilter>,
) -> Result<Option<Record>, ReadError> {
    let mut record = parsed.map_err(|source| ReadError::Record {
        line: number,
        source,
    })?;
    let matched = apply_filter(filter, &mut record).map_err(|source| ReadError::Eval {
        line: number,
        source,
    })?;
    Ok(matched.then_some(record))
}

/// Counters kept while reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub lines: usize,
    /// Comment and blank lines.
    pub skipped: usize,
    /// Lines that parsed into a record, whatever the filter made of them.
    pub records: usize,
    pub filtered_out: usize,
    /// Lines that failed to parse or to evaluate.
    pub errors: usize,
}

/// Streams records out of a bodyfile, skipping comments and records the
/// filter rejects.
///
/// Each item is either an accepted record or a per-line error. Iteration
/// can continue after a data error; it stops after an I/O error.
pub struct BodyfileReader<R> {
    input: R,
    filter: Option<CompiledFilter>,
    buf: Vec<u8>,
    stats: ReaderStats,
    done: bool,
}

impl<R: BufRead> BodyfileReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            filter: None,
            buf: Vec::new(),
            stats: ReaderStats::default(),
            done: false,
        }
    }

    /// Installs a compiled filter. Records matching none of their timestamps
    /// are dropped and matching ones carry their mask.
    #[must_use]
    pub fn with_filter(mut self, filter: Option<CompiledFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub const fn stats(&self) -> ReaderStats {
        self.stats
    }

    fn read_line(&mut self) -> std::io::Result<Option<String>> {
        self.buf.clear();
        if self.input.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

impl<R: BufRead> Iterator for BodyfileReader<R> {
    type Item = Result<Record, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let line = match self.read_line() {
                Ok(Some(line)) => line,
                Ok(None) => {
                    self.done = true;
                    break;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };
            self.stats.lines += 1;
            let number = self.stats.lines;

            let Some(parsed) = parse_line(&line) else {
                self.stats.skipped += 1;
                continue;
            };
            match accept(number, parsed, self.filter.as_ref()) {
                Ok(Some(record)) => {
                    self.stats.records += 1;
                    return Some(Ok(record));
                }
                Ok(None) => {
                    self.stats.records += 1;
                    self.stats.filtered_out += 1;
                    tracing::trace!(line = number, "record rejected by filter");
                }
                Err(e) => {
                    if matches!(e, ReadError::Eval { .. }) {
                        self.stats.records += 1;
                    }
                    self.stats.errors += 1;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

/// Parses and filters already-split lines in parallel.
///
/// Returns accepted records and per-line errors in input order, leaving the
/// skip-or-abort decision to the caller.
pub fn scan_parallel<S>(
    lines: &[S],
    filter: Option<&CompiledFilter>,
) -> Vec<Result<Record, ReadError>>
where
    S: AsRef<str> + Sync,
{
    let scanned: Vec<Result<Option<Record>, ReadError>> = lines
        .par_iter()
        .enumerate()
        .map(|(index, line)| scan_line(index + 1, line.as_ref(), filter))
        .collect();

    scanned.into_iter().filter_map(Result::transpose).collect()
}
