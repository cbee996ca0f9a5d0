//! Bodyfile record parsing.
//!
//! A bodyfile line has eleven `|`-separated fields:
//!
//! ```text
//! MD5|name|inode|mode_as_string|UID|GID|size|atime|mtime|ctime|crtime
//! ```
//!
//! Producers are not consistent about escaping `|` inside the name, so the
//! parser recovers the path with a greedy heuristic when it sees too many
//! fields. See [`parse_record`].

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kind::{KindMask, TimestampKind};

/// Field separator.
pub const SEPARATOR: char = '|';

/// Escape marker protecting a separator inside the path.
pub const ESCAPE: char = '\\';

/// Number of fields in a bodyfile line.
pub const FIELD_COUNT: usize = 11;

/// Epoch second meaning "timestamp not available on this filesystem".
pub const SENTINEL_EPOCH: i64 = -1;

const FIELD_NAMES: [&str; FIELD_COUNT] = [
    "hash",
    "path",
    "inode",
    "mode",
    "uid",
    "gid",
    "size",
    "access_time",
    "modification_time",
    "change_time",
    "creation_time",
];

/// Errors produced while decoding a single line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The line could not be reconciled to eleven fields.
    #[error("malformed record: expected {FIELD_COUNT} fields, got {found}")]
    Malformed { found: usize },

    /// A field that must be an integer was not.
    #[error("{field} was not an integer: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// One decoded bodyfile line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Content digest, usually `0` when the producer did not hash.
    pub hash: String,
    pub path: String,
    /// Kept as text: NTFS producers emit composite ids such as `36434-128-1`.
    pub inode: String,
    pub mode: String,
    pub uid: i64,
    pub gid: i64,
    pub size: i64,
    pub access_time: DateTime<Utc>,
    pub modification_time: DateTime<Utc>,
    pub change_time: DateTime<Utc>,
    pub creation_time: DateTime<Utc>,
    /// Kinds that satisfied the active filter. Empty when no filter ran.
    #[serde(default)]
    pub matched_mask: KindMask,
}

impl Record {
    /// Returns the timestamp for the given role.
    #[must_use]
    pub const fn time(&self, kind: TimestampKind) -> DateTime<Utc> {
        match kind {
            TimestampKind::Access => self.access_time,
            TimestampKind::Modification => self.modification_time,
            TimestampKind::Change => self.change_time,
            TimestampKind::Creation => self.creation_time,
        }
    }

    /// Renders the MACB column for `time`: each letter is present when the
    /// corresponding timestamp equals `time`.
    #[must_use]
    pub fn macb(&self, time: DateTime<Utc>) -> String {
        [
            TimestampKind::Modification,
            TimestampKind::Access,
            TimestampKind::Change,
            TimestampKind::Creation,
        ]
        .into_iter()
        .map(|kind| {
            if self.time(kind) == time {
                kind.macb_letter()
            } else {
                '.'
            }
        })
        .collect()
    }
}

/// Returns the instant represented by [`SENTINEL_EPOCH`].
#[must_use]
pub fn sentinel_time() -> DateTime<Utc> {
    DateTime::from_timestamp(SENTINEL_EPOCH, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Decodes one bodyfile line.
///
/// Escape recovery only runs when the line has more than eleven fields. It
/// starts at the path and keeps absorbing the next fragment while the path
/// ends with a dangling escape marker (an odd number of trailing `\`). A
/// trailing `\\` is a literal backslash and does not count as dangling. When
/// the scan stops and surplus fields remain, the separator that stopped it
/// was unescaped: the following fragment is merged back into the path once
/// and the scan ends. The separator is restored at every merge.
///
/// This is a heuristic: a path mixing unescaped separators with dangling
/// escape markers is ambiguous and may be rejected or split differently from
/// what the producer intended.
pub fn parse_record(line: &str) -> Result<Record, RecordError> {
    let mut fields: Vec<&str> = line.split(SEPARATOR).collect();
    if fields.len() < FIELD_COUNT {
        return Err(RecordError::Malformed {
            found: fields.len(),
        });
    }

    let path = if fields.len() > FIELD_COUNT {
        let (path, absorbed) = recover_path(&fields);
        fields.drain(2..2 + absorbed);
        if fields.len() != FIELD_COUNT {
            tracing::trace!(fields = fields.len(), "escape recovery left surplus fields");
            return Err(RecordError::Malformed {
                found: fields.len(),
            });
        }
        path
    } else {
        fields[1].to_string()
    };

    Ok(Record {
        hash: fields[0].to_string(),
        path,
        inode: fields[2].to_string(),
        mode: fields[3].to_string(),
        uid: parse_int(fields[4], 4)?,
        gid: parse_int(fields[5], 5)?,
        // Some producers write garbage in this column; the record still counts.
        size: fields[6].trim().parse().unwrap_or(0),
        access_time: parse_time(fields[7], 7)?,
        modification_time: parse_time(fields[8], 8)?,
        change_time: parse_time(fields[9], 9)?,
        creation_time: parse_time(fields[10], 10)?,
        matched_mask: KindMask::EMPTY,
    })
}

/// Rebuilds the path from `fields[1..]`, returning it with the number of
/// fragments merged into it.
fn recover_path(fields: &[&str]) -> (String, usize) {
    let surplus = fields.len() - FIELD_COUNT;
    let mut path = fields[1].to_string();
    let mut absorbed = 0;

    while absorbed < surplus && has_dangling_escape(&path) {
        path.push(SEPARATOR);
        path.push_str(fields[2 + absorbed]);
        absorbed += 1;
    }

    // Unescaped separator inside the path.
    if absorbed < surplus {
        path.push(SEPARATOR);
        path.push_str(fields[2 + absorbed]);
        absorbed += 1;
    }

    (path, absorbed)
}

/// True when `s` ends with an odd run of escape markers.
fn has_dangling_escape(s: &str) -> bool {
    let trailing = s.chars().rev().take_while(|c| *c == ESCAPE).count();
    trailing % 2 == 1
}

/// Strict base-10 parse: surrounding whitespace is an error.
fn parse_int(value: &str, index: usize) -> Result<i64, RecordError> {
    value
        .parse()
        .map_err(|_| RecordError::InvalidField {
            field: FIELD_NAMES[index],
            value: value.to_string(),
        })
}

fn parse_time(value: &str, index: usize) -> Result<DateTime<Utc>, RecordError> {
    let secs = parse_int(value, index)?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| RecordError::InvalidField {
            field: FIELD_NAMES[index],
            value: value.to_string(),
        })
}
