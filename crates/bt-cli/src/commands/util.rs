//! Shared utilities for CLI commands.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc, Weekday};

/// Path that stands for standard input.
const STDIN_PATH: &str = "-";

/// Parse a datetime string given on the command line. Interpreted as UTC
/// unless an offset is included.
///
/// Supports:
/// - RFC 3339: "2013-04-09T10:30:00Z"
/// - Date and time: "2013-04-09 10:30:00"
/// - Date only: "2013-04-09" (midnight)
pub fn parse_datetime(s: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }

    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| {
        format!("Invalid datetime: {s}. Use YYYY-MM-DD or RFC 3339 (e.g., 2013-04-09T10:30:00Z)")
    })?;
    Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
}

/// Parse a weekday by full or abbreviated English name, in any case.
pub fn parse_weekday(s: &str) -> anyhow::Result<Weekday> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid weekday: {s}. Use a name like 'mon' or 'Wednesday'"))
}

/// Open a bodyfile for buffered reading; `None` or `-` reads stdin.
pub fn open_input(path: Option<&Path>) -> anyhow::Result<Box<dyn BufRead>> {
    match path {
        Some(path) if path.as_os_str() != STDIN_PATH => {
            let file = File::open(path)
                .with_context(|| format!("failed to open bodyfile {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        _ => Ok(Box::new(io::stdin().lock())),
    }
}
