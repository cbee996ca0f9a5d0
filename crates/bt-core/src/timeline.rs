//! Fan-out of records into per-timestamp events and their global ordering.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::kind::TimestampKind;
use crate::record::{Record, SENTINEL_EPOCH};

/// Misuse of the builder, as opposed to bad input data.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TimelineError {
    #[error("timeline not initialized, ingest records first")]
    NotIngested,
    #[error("cannot ingest after consumption has started")]
    AlreadyConsuming,
}

/// A single point on the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEvent {
    /// The timestamp value that produced this event.
    pub time: DateTime<Utc>,
    /// Which of the record's timestamps this event stands for.
    pub kind: TimestampKind,
    /// Shared with the other events produced from the same record.
    pub record: Arc<Record>,
}

impl TimelineEvent {
    /// MACB flags of the record at this event's time.
    pub fn macb(&self) -> String {
        self.record.macb(self.time)
    }
}

/// Whether a timestamp of `record` becomes an event.
///
/// Outside strict mode any timestamp after the sentinel is kept. In strict
/// mode only timestamps that satisfied the filter are kept, whatever their
/// value.
fn include(record: &Record, kind: TimestampKind, strict: bool) -> bool {
    if strict {
        record.matched_mask.contains(kind)
    } else {
        record.time(kind).timestamp() > SENTINEL_EPOCH
    }
}

/// Expands a record into 0 to 4 events, in fan-out order.
///
/// A timestamp equal to one already considered for this record is skipped,
/// so a record whose four times are identical yields a single event.
pub fn fan_out(record: Arc<Record>, strict: bool) -> Vec<TimelineEvent> {
    let mut events = Vec::with_capacity(TimestampKind::ALL.len());

    for (index, kind) in TimestampKind::ALL.into_iter().enumerate() {
        let time = record.time(kind);
        let duplicate = TimestampKind::ALL[..index]
            .iter()
            .any(|earlier| record.time(*earlier) == time);
        if duplicate || !include(&record, kind, strict) {
            continue;
        }
        events.push(TimelineEvent {
            time,
            kind,
            record: Arc::clone(&record),
        });
    }

    events
}

/// Batch-built, time-ordered sequence of events.
///
/// Records are ingested in bulk, the events are sorted once, and then served
/// one at a time with [`Timeline::next_event`]. Ties keep insertion order.
#[derive(Debug, Default)]
pub struct Timeline {
    events: Vec<TimelineEvent>,
    /// `None` until the first ingest.
    offset: Option<usize>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fans out every record and sorts the accumulated events.
    ///
    /// May be called several times before consumption starts; events from
    /// all calls are merged into one ordering. Returns the number of events
    /// held.
    pub fn ingest<I>(&mut self, records: I, strict: bool) -> Result<usize, TimelineError>
    where
        I: IntoIterator<Item = Record>,
    {
        if self.offset.is_some_and(|offset| offset > 0) {
            return Err(TimelineError::AlreadyConsuming);
        }

        let before = self.events.len();
        let mut ingested = 0usize;
        for record in records {
            ingested += 1;
            self.events.extend(fan_out(Arc::new(record), strict));
        }

        self.events.sort_by_key(|event| event.time);
        self.offset = Some(0);

        tracing::debug!(
            records = ingested,
            events = self.events.len() - before,
            strict,
            "ingested records"
        );
        Ok(self.events.len())
    }

    /// Returns the next event in time order, or `None` once exhausted.
    pub fn next_event(&mut self) -> Result<Option<&TimelineEvent>, TimelineError> {
        let offset = self.offset.as_mut().ok_or(TimelineError::NotIngested)?;
        let Some(event) = self.events.get(*offset) else {
            return Ok(None);
        };
        *offset += 1;
        Ok(Some(event))
    }

    /// Total number of events held.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events not yet returned by [`Timeline::next_event`].
    pub fn remaining(&self) -> usize {
        self.offset
            .map_or(0, |offset| self.events.len().saturating_sub(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::CompiledFilter;
    use crate::record::parse_record;
    use chrono::TimeZone;

    fn record(times: [i64; 4]) -> Record {
        let [a, m, c, b] = times;
        parse_record(&format!("0|/tmp/f|1|r/r|0|0|0|{a}|{m}|{c}|{b}")).unwrap()
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn drain(timeline: &mut Timeline) -> Vec<(i64, TimestampKind)> {
        let mut out = Vec::new();
        while let Some(event) = timeline.next_event().unwrap() {
            out.push((event.time.timestamp(), event.kind));
        }
        out
    }

    #[test]
    fn identical_timestamps_yield_one_event() {
        let events = fan_out(Arc::new(record([5, 5, 5, 5])), false);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, TimestampKind::Access);
    }

    #[test]
    fn dedup_is_by_instant_not_kind() {
        let events = fan_out(Arc::new(record([1, 2, 1, 2])), false);
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            [TimestampKind::Access, TimestampKind::Modification]
        );

        let events = fan_out(Arc::new(record([1, 2, 3, 4])), false);
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn sentinel_times_are_excluded() {
        let events = fan_out(Arc::new(record([-1, -1, -1, 1_427_897_741])), false);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].time, ts(1_427_897_741));
        assert_eq!(events[0].kind, TimestampKind::Creation);
    }

    #[test]
    fn times_before_sentinel_are_excluded() {
        let events = fan_out(Arc::new(record([-100, 0, -1, 7])), false);
        let times: Vec<_> = events.iter().map(|e| e.time.timestamp()).collect();
        assert_eq!(times, [0, 7]);
    }

    #[test]
    fn events_share_the_record() {
        let shared = Arc::new(record([1, 2, 3, 4]));
        let events = fan_out(Arc::clone(&shared), false);
        assert!(events.iter().all(|e| Arc::ptr_eq(&e.record, &shared)));
        assert_eq!(Arc::strong_count(&shared), 5);
    }

    #[test]
    fn strict_mode_keeps_only_matching_kinds() {
        let filter = CompiledFilter::compile("weekday == 'Monday'").unwrap();
        // Only the modification time (2015-02-16) is a Monday.
        let mut rec = record([1_365_584_158, 1_424_097_650, 1_365_579_363, 1_427_897_741]);
        assert!(filter.apply(&mut rec).unwrap());

        let strict = fan_out(Arc::new(rec.clone()), true);
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].kind, TimestampKind::Modification);

        let lenient = fan_out(Arc::new(rec), false);
        assert_eq!(lenient.len(), 4);
    }

    #[test]
    fn strict_mode_keeps_matching_sentinel() {
        let filter = CompiledFilter::compile("date < 0").unwrap();
        let mut rec = record([-1, 10, 20, 30]);
        assert!(filter.apply(&mut rec).unwrap());

        let events = fan_out(Arc::new(rec), true);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].time, ts(SENTINEL_EPOCH));
    }

    #[test]
    fn strict_mode_without_filter_keeps_nothing() {
        assert!(fan_out(Arc::new(record([1, 2, 3, 4])), true).is_empty());
    }

    #[test]
    fn next_before_ingest_is_usage_error() {
        let mut timeline = Timeline::new();
        assert_eq!(
            timeline.next_event().unwrap_err(),
            TimelineError::NotIngested
        );
    }

    #[test]
    fn events_come_out_sorted_and_exhaust() {
        let mut timeline = Timeline::new();
        let count = timeline
            .ingest(
                [
                    record([40, 10, 30, 20]),
                    record([5, 50, 35, 15]),
                    record([-1, -1, -1, 25]),
                ],
                false,
            )
            .unwrap();
        assert_eq!(count, 9);
        assert_eq!(timeline.remaining(), 9);

        let times: Vec<_> = drain(&mut timeline).into_iter().map(|(t, _)| t).collect();
        assert_eq!(times, [5, 10, 15, 20, 25, 30, 35, 40, 50]);

        assert!(timeline.next_event().unwrap().is_none());
        assert!(timeline.next_event().unwrap().is_none());
        assert_eq!(timeline.remaining(), 0);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut timeline = Timeline::new();
        timeline
            .ingest([record([7, 3, 8, 9]), record([3, 1, 2, 4])], false)
            .unwrap();
        assert_eq!(
            drain(&mut timeline),
            [
                (1, TimestampKind::Modification),
                (2, TimestampKind::Change),
                (3, TimestampKind::Modification),
                (3, TimestampKind::Access),
                (4, TimestampKind::Creation),
                (7, TimestampKind::Access),
                (8, TimestampKind::Change),
                (9, TimestampKind::Creation),
            ]
        );
    }

    #[test]
    fn repeated_ingest_merges_before_consumption() {
        let mut timeline = Timeline::new();
        timeline.ingest([record([10, 10, 10, 10])], false).unwrap();
        let count = timeline.ingest([record([5, 5, 5, 5])], false).unwrap();
        assert_eq!(count, 2);

        let first = timeline.next_event().unwrap().unwrap();
        assert_eq!(first.time, ts(5));
        assert_eq!(
            timeline.ingest([record([1, 1, 1, 1])], false).unwrap_err(),
            TimelineError::AlreadyConsuming
        );
    }

    #[test]
    fn empty_ingest_is_ready_and_exhausted() {
        let mut timeline = Timeline::new();
        assert_eq!(timeline.ingest(Vec::new(), false).unwrap(), 0);
        assert!(timeline.is_empty());
        assert!(timeline.next_event().unwrap().is_none());
    }

    #[test]
    fn event_serializes_with_record() {
        let events = fan_out(Arc::new(record([1, 1, 1, 1])), false);
        let json = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(json["time"], "1970-01-01T00:00:01Z");
        assert_eq!(json["kind"], "access");
        assert_eq!(json["record"]["path"], "/tmp/f");
        assert_eq!(json["record"]["matched_mask"], 0);
    }
}
