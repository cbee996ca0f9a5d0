//! Core logic for building timelines out of bodyfiles.
//!
//! This crate contains:
//! - Record parsing: decoding `|`-separated bodyfile lines
//! - Filtering: a small expression language evaluated per timestamp
//! - Timeline: fan-out of records into time-ordered events

pub mod filter;
pub mod kind;
pub mod reader;
pub mod record;
pub mod timeline;

pub use filter::{CompileError, CompiledFilter, DateFilter, EvalError, FilterMatch, apply_filter};
pub use kind::{KindMask, TimestampKind, UnknownTimestampKind};
pub use reader::{BodyfileReader, ReadError, ReaderStats, parse_line, scan_parallel};
pub use record::{Record, RecordError, SENTINEL_EPOCH, parse_record, sentinel_time};
pub use timeline::{Timeline, TimelineError, TimelineEvent, fan_out};
