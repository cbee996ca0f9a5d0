//! Check command: validate a bodyfile without building a timeline.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use bt_core::{BodyfileReader, ReadError};
use serde::Serialize;

/// Invalid lines listed in the report; the rest are only counted.
const MAX_REPORTED_ERRORS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineError {
    pub line: usize,
    pub message: String,
}

/// Result of validating a bodyfile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub lines: usize,
    pub records: usize,
    /// Comment and blank lines.
    pub skipped: usize,
    pub invalid: usize,
    /// The first invalid lines, in input order.
    pub errors: Vec<LineError>,
}

impl CheckReport {
    pub const fn is_valid(&self) -> bool {
        self.invalid == 0
    }
}

/// Parses every line of `input` and writes a summary to `writer`.
pub fn run<W: Write, R: BufRead>(writer: &mut W, input: R, json: bool) -> Result<CheckReport> {
    let mut reader = BodyfileReader::new(input);
    let mut errors = Vec::new();

    for item in reader.by_ref() {
        let err = match item {
            Ok(_) => continue,
            Err(err @ ReadError::Io(_)) => return Err(err).context("failed to read bodyfile"),
            Err(err) => err,
        };
        if errors.len() < MAX_REPORTED_ERRORS {
            tracing::warn!(error = %err, "invalid line");
            if let Some(line) = err.line() {
                errors.push(LineError {
                    line,
                    message: err.to_string(),
                });
            }
        }
    }

    let stats = reader.stats();
    let report = CheckReport {
        lines: stats.lines,
        records: stats.records,
        skipped: stats.skipped,
        invalid: stats.errors,
        errors,
    };

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        writeln!(writer, "Lines: {}", report.lines)?;
        writeln!(writer, "Records: {}", report.records)?;
        writeln!(writer, "Skipped: {}", report.skipped)?;
        writeln!(writer, "Invalid: {}", report.invalid)?;
        for error in &report.errors {
            writeln!(writer, "- {}", error.message)?;
        }
        if report.invalid > report.errors.len() {
            writeln!(writer, "- ... and {} more", report.invalid - report.errors.len())?;
        }
    }

    Ok(report)
}
