//! Structured date/time filter that compiles down to an expression.

use chrono::{DateTime, Utc, Weekday};

use super::eval::weekday_name;
use super::{CompileError, CompiledFilter};

/// Date range, hour window and weekday conditions, all optional.
///
/// Conditions are joined with `&&`. The filter is rendered as an expression
/// and compiled through [`CompiledFilter::compile`], so it shares the
/// per-kind evaluation and match tracking of hand-written expressions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateFilter {
    /// Keep timestamps strictly after this instant.
    pub after: Option<DateTime<Utc>>,
    /// Keep timestamps strictly before this instant.
    pub before: Option<DateTime<Utc>>,
    /// Keep timestamps whose hour is strictly greater.
    pub hour_after: Option<u32>,
    /// Keep timestamps whose hour is strictly lower.
    pub hour_before: Option<u32>,
    pub weekday: Option<Weekday>,
}

impl DateFilter {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Renders the equivalent filter expression, or `None` when no condition
    /// is set.
    pub fn to_expression(&self) -> Option<String> {
        let mut conditions = Vec::new();
        if let Some(after) = self.after {
            conditions.push(format!("date > {}", after.timestamp()));
        }
        if let Some(before) = self.before {
            conditions.push(format!("date < {}", before.timestamp()));
        }
        if let Some(hour) = self.hour_after {
            conditions.push(format!("hour > {hour}"));
        }
        if let Some(hour) = self.hour_before {
            conditions.push(format!("hour < {hour}"));
        }
        if let Some(weekday) = self.weekday {
            conditions.push(format!("weekday == '{}'", weekday_name(weekday)));
        }

        if conditions.is_empty() {
            None
        } else {
            Some(conditions.join(" && "))
        }
    }

    /// Compiles the filter, or returns `None` when no condition is set.
    pub fn compile(&self) -> Result<Option<CompiledFilter>, CompileError> {
        self.to_expression()
            .map(|expression| CompiledFilter::compile(&expression))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{KindMask, TimestampKind};
    use crate::record::parse_record;
    use chrono::TimeZone;

    #[test]
    fn empty_filter_compiles_to_nothing() {
        let filter = DateFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter.to_expression(), None);
        assert!(filter.compile().unwrap().is_none());
    }

    #[test]
    fn renders_all_conditions() {
        let filter = DateFilter {
            after: Some(Utc.with_ymd_and_hms(2013, 4, 9, 0, 0, 0).unwrap()),
            before: Some(Utc.with_ymd_and_hms(2013, 4, 11, 0, 0, 0).unwrap()),
            hour_after: Some(6),
            hour_before: Some(8),
            weekday: Some(Weekday::Wed),
        };
        assert_eq!(
            filter.to_expression().unwrap(),
            "date > 1365465600 && date < 1365638400 && hour > 6 && hour < 8 && weekday == 'Wednesday'"
        );
    }

    #[test]
    fn tracks_matching_kinds_like_expressions() {
        let filter = DateFilter {
            weekday: Some(Weekday::Mon),
            ..DateFilter::default()
        }
        .compile()
        .unwrap()
        .unwrap();

        let mut record = parse_record(
            r"0|\.\Windows\System32\MRT.exe|64535|0|497|0|116773704|1365584158|1424097650|1424097650|1365584158",
        )
        .unwrap();
        assert!(filter.apply(&mut record).unwrap());
        assert_eq!(
            record.matched_mask,
            KindMask::EMPTY
                .with(TimestampKind::Modification)
                .with(TimestampKind::Change)
        );
    }
}
