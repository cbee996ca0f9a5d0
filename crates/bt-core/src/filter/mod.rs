//! Filter expressions evaluated against each timestamp of a record.
//!
//! An expression is compiled once and then evaluated four times per record,
//! once per [`TimestampKind`]. Each evaluation sees the record path and the
//! calendar attributes of one timestamp:
//!
//! | variable | alias | value |
//! |---|---|---|
//! | `path` | `p` | record path |
//! | `hour` | `h` | hour of day (UTC) |
//! | `min` | `m` | minute of hour |
//! | `day` | `D` | day of month |
//! | `date` | `d` | epoch seconds |
//! | `weekday` | `w` | weekday name, e.g. `Monday` |
//!
//! String literals that look like dates (`'2013-04-09'`,
//! `'2013-04-09 14:00'`, RFC 3339) are turned into epoch seconds at compile
//! time so they compare against `date`.
//!
//! A record matches when at least one of its timestamps satisfies the
//! expression; the satisfying kinds are recorded in [`Record::matched_mask`].

mod eval;
mod lexer;
mod parser;
mod structured;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::kind::{KindMask, TimestampKind};
use crate::record::Record;

use eval::{Environment, Value};
use parser::Expr;

pub use structured::DateFilter;

/// The expression could not be compiled.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message} (at byte {position})")]
pub struct CompileError {
    pub message: String,
    pub position: usize,
}

impl CompileError {
    pub(crate) fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// A compiled expression failed while evaluating a record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    #[error("type mismatch: cannot apply {op} to {operands}")]
    TypeMismatch { op: &'static str, operands: String },

    #[error("filter must evaluate to a boolean, got {found}")]
    NonBoolean { found: &'static str },

    #[error("invalid regular expression: {0}")]
    InvalidRegex(String),

    #[error("division by zero")]
    DivisionByZero,
}

/// Outcome of evaluating a filter against all four timestamps of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterMatch {
    /// Kinds whose timestamp satisfied the expression.
    pub mask: KindMask,
}

impl FilterMatch {
    /// True when at least one timestamp satisfied the expression.
    pub const fn matched(&self) -> bool {
        !self.mask.is_empty()
    }
}

/// A filter expression compiled once and shared across records.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    source: String,
    expr: Expr,
}

impl CompiledFilter {
    pub fn compile(expression: &str) -> Result<Self, CompileError> {
        let expr = parser::parse_expression(expression)?;
        tracing::debug!(expression, "compiled filter");
        Ok(Self {
            source: expression.to_string(),
            expr,
        })
    }

    /// The expression text this filter was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the expression for a single timestamp.
    pub fn evaluate_at(&self, path: &str, time: DateTime<Utc>) -> Result<bool, EvalError> {
        let env = Environment { path, time };
        match self.expr.eval(&env)? {
            Value::Bool(b) => Ok(b),
            other => Err(EvalError::NonBoolean {
                found: other.type_name(),
            }),
        }
    }

    /// Evaluates the expression once per timestamp kind.
    ///
    /// Any evaluation error aborts the record: a filter that cannot be
    /// evaluated is reported rather than treated as a non-match.
    pub fn evaluate(&self, record: &Record) -> Result<FilterMatch, EvalError> {
        let mut mask = KindMask::EMPTY;
        for kind in TimestampKind::ALL {
            if self.evaluate_at(&record.path, record.time(kind))? {
                mask.insert(kind);
            }
        }
        Ok(FilterMatch { mask })
    }

    /// Evaluates the filter and stores the matching kinds on the record.
    pub fn apply(&self, record: &mut Record) -> Result<bool, EvalError> {
        let result = self.evaluate(record)?;
        record.matched_mask = result.mask;
        Ok(result.matched())
    }
}

/// Applies an optional filter. Without a filter every record matches and its
/// mask is left untouched.
pub fn apply_filter(filter: Option<&CompiledFilter>, record: &mut Record) -> Result<bool, EvalError> {
    filter.map_or(Ok(true), |filter| filter.apply(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parse_record;

    fn matches(expression: &str, line: &str) -> bool {
        let filter = CompiledFilter::compile(expression).unwrap();
        let record = parse_record(line).unwrap();
        filter.evaluate(&record).unwrap().matched()
    }

    const MFT: &str = r"0|\.\$MFT|0|0|256|0|284950528|1365579077|1365579077|1365579077|1365579077";
    const AUDIT: &str = r"0|\.\Windows\System32\oobe\audit.exe|36434|0|454|0|74240|1247527771|1247535535|1365579363|1247527771";
    const MRT: &str = r"0|\.\Windows\System32\MRT.exe|64535|0|497|0|116773704|1365584158|1424097650|1424097650|1365584158";

    #[test]
    fn date_filters() {
        assert!(!matches("date > '2018-11-10'", MFT));
        assert!(matches("date > '2013-04-09' && date < '2013-04-11'", AUDIT));
    }

    #[test]
    fn hour_filters() {
        assert!(matches("hour < 3 && hour > 0", AUDIT));
        assert!(matches("hour < 8", AUDIT));
        assert!(matches("hour > 6", AUDIT));
        assert!(matches("hour <= 15 && hour >= 14", MRT));
        assert!(!matches("hour == 3", MRT));
    }

    #[test]
    fn weekday_sets_only_matching_kinds() {
        let filter = CompiledFilter::compile("weekday == 'Monday'").unwrap();

        let mut record = parse_record(MRT).unwrap();
        assert!(filter.apply(&mut record).unwrap());
        assert_eq!(
            record.matched_mask,
            KindMask::EMPTY
                .with(TimestampKind::Modification)
                .with(TimestampKind::Change)
        );
    }

    #[test]
    fn or_across_kinds_with_single_modification_match() {
        // Only the modification time (2015-02-16) is a Monday.
        let line = "0|/tmp/x|1|r/r|0|0|0|1365584158|1424097650|1365579363|1427897741";
        let filter = CompiledFilter::compile("weekday == 'Monday'").unwrap();
        let record = parse_record(line).unwrap();

        let result = filter.evaluate(&record).unwrap();
        assert!(result.matched());
        assert_eq!(
            result.mask,
            KindMask::EMPTY.with(TimestampKind::Modification)
        );
    }

    #[test]
    fn non_matching_record_has_empty_mask() {
        let filter = CompiledFilter::compile("path =~ 'nothing'").unwrap();
        let mut record = parse_record(MRT).unwrap();
        assert!(!filter.apply(&mut record).unwrap());
        assert!(record.matched_mask.is_empty());
    }

    #[test]
    fn no_filter_is_identity() {
        let mut record = parse_record(MRT).unwrap();
        let before = record.clone();
        assert!(apply_filter(None, &mut record).unwrap());
        assert_eq!(record, before);
    }

    #[test]
    fn non_boolean_result_is_an_error() {
        let filter = CompiledFilter::compile("hour + 1").unwrap();
        let record = parse_record(MRT).unwrap();
        assert_eq!(
            filter.evaluate(&record).unwrap_err(),
            EvalError::NonBoolean { found: "number" }
        );
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let filter = CompiledFilter::compile("month == 2").unwrap();
        let mut record = parse_record(MRT).unwrap();
        let err = filter.apply(&mut record).unwrap_err();
        assert_eq!(err.to_string(), "unknown variable: month");
    }

    #[test]
    fn compile_error_reports_position() {
        let err = CompiledFilter::compile("hour >> 3").unwrap_err();
        assert_eq!(err.to_string(), "unexpected '>' (at byte 6)");
    }

    #[test]
    fn filter_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CompiledFilter>();
    }
}
