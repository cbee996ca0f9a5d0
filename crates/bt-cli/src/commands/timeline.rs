//! Timeline command: read, filter, fan out, sort and print.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use bt_core::{
    BodyfileReader, CompiledFilter, DateFilter, ReadError, Record, Timeline, TimelineEvent,
    scan_parallel,
};
use serde::Serialize;

use crate::cli::{DateArgs, TimelineArgs};
use crate::config::Config;

/// Settings for one timeline run, merged from flags and config.
#[derive(Debug, Clone)]
pub struct TimelineOptions {
    pub filter: Option<CompiledFilter>,
    pub strict: bool,
    pub skip_invalid: bool,
    pub parallel: bool,
    pub json: bool,
    pub time_format: String,
}

impl TimelineOptions {
    /// Merges command-line flags over the loaded configuration and compiles
    /// the filter.
    pub fn from_args(args: &TimelineArgs, config: &Config) -> Result<Self> {
        let filter = match &args.filter {
            Some(expression) => Some(
                CompiledFilter::compile(expression)
                    .with_context(|| format!("invalid filter expression: {expression}"))?,
            ),
            None => date_filter(&args.date)
                .compile()
                .context("invalid date filter")?,
        };

        Ok(Self {
            filter,
            strict: args.strict || config.strict,
            skip_invalid: args.skip_invalid || config.skip_invalid,
            parallel: args.parallel || config.parallel,
            json: args.json,
            time_format: config.time_format.clone(),
        })
    }
}

const fn date_filter(args: &DateArgs) -> DateFilter {
    DateFilter {
        after: args.after,
        before: args.before,
        hour_after: args.hour_after,
        hour_before: args.hour_before,
        weekday: args.weekday,
    }
}

/// Counts reported after a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimelineSummary {
    /// Records accepted by the filter.
    pub records: usize,
    /// Lines skipped because they could not be parsed or evaluated.
    pub invalid: usize,
    /// Events printed.
    pub events: usize,
}

/// One JSON line per event.
#[derive(Serialize)]
struct EventLine<'a> {
    #[serde(flatten)]
    event: &'a TimelineEvent,
    macb: String,
}

/// Builds the timeline from `input` and writes it to `writer`.
pub fn run<W: Write, R: BufRead>(
    writer: &mut W,
    input: R,
    options: &TimelineOptions,
) -> Result<TimelineSummary> {
    if options.strict && options.filter.is_none() {
        tracing::warn!("strict mode without a filter emits no events");
    }

    let mut summary = TimelineSummary::default();
    let records = if options.parallel {
        read_parallel(input, options, &mut summary.invalid)?
    } else {
        let reader = BodyfileReader::new(input).with_filter(options.filter.clone());
        accept_records(reader, options.skip_invalid, &mut summary.invalid)?
    };
    summary.records = records.len();

    let mut timeline = Timeline::new();
    timeline.ingest(records, options.strict)?;

    while let Some(event) = timeline.next_event()? {
        if options.json {
            write_json(writer, event)?;
        } else {
            write_text(writer, event, &options.time_format)?;
        }
        summary.events += 1;
    }

    tracing::info!(
        records = summary.records,
        invalid = summary.invalid,
        events = summary.events,
        "timeline complete"
    );
    Ok(summary)
}

/// Reads every line up front and scans them on the rayon pool.
fn read_parallel<R: BufRead>(
    input: R,
    options: &TimelineOptions,
    invalid: &mut usize,
) -> Result<Vec<Record>> {
    let lines = input
        .split(b'\n')
        .map(|line| line.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
        .collect::<io::Result<Vec<_>>>()
        .context("failed to read bodyfile")?;
    tracing::debug!(lines = lines.len(), "scanning in parallel");

    let scanned = scan_parallel(&lines, options.filter.as_ref());
    accept_records(scanned, options.skip_invalid, invalid)
}

/// Applies the invalid-line policy: abort on the first bad line, or warn and
/// count it. I/O errors always abort.
fn accept_records<I>(items: I, skip_invalid: bool, invalid: &mut usize) -> Result<Vec<Record>>
where
    I: IntoIterator<Item = Result<Record, ReadError>>,
{
    let mut records = Vec::new();
    for item in items {
        match item {
            Ok(record) => records.push(record),
            Err(err @ ReadError::Io(_)) => {
                return Err(err).context("failed to read bodyfile");
            }
            Err(err) if skip_invalid => {
                tracing::warn!(error = %err, "skipping invalid line");
                *invalid += 1;
            }
            Err(err) => {
                return Err(err).context("invalid bodyfile (use --skip-invalid to continue past bad lines)");
            }
        }
    }
    Ok(records)
}

/// Writes one mactime-style line.
fn write_text<W: Write>(writer: &mut W, event: &TimelineEvent, time_format: &str) -> Result<()> {
    let record = &event.record;
    writeln!(
        writer,
        "{} {:>8} {} {} {:<8} {:<8} {:<8} {}",
        event.time.format(time_format),
        record.size,
        event.macb(),
        record.mode,
        record.uid,
        record.gid,
        record.inode,
        record.path
    )?;
    Ok(())
}

fn write_json<W: Write>(writer: &mut W, event: &TimelineEvent) -> Result<()> {
    let line = EventLine {
        event,
        macb: event.macb(),
    };
    serde_json::to_writer(&mut *writer, &line)?;
    writeln!(writer)?;
    Ok(())
}
