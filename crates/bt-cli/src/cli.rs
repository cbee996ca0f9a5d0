//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::{DateTime, Utc, Weekday};
use clap::{Args, Parser, Subcommand};

use crate::commands::util::{parse_datetime, parse_weekday};

/// Bodyfile timeline builder.
///
/// Reads bodyfile records (as produced by fls or similar tools), optionally
/// filters them, and prints one line per distinct timestamp in time order.
#[derive(Debug, Parser)]
#[command(name = "bt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build and print a timeline.
    Timeline(TimelineArgs),

    /// Validate a bodyfile and report per-line errors.
    Check {
        /// Bodyfile to read (stdin when omitted or `-`).
        bodyfile: Option<PathBuf>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
pub struct TimelineArgs {
    /// Bodyfile to read (stdin when omitted or `-`).
    pub bodyfile: Option<PathBuf>,

    /// Filter expression, e.g. "path =~ 'System32' && hour < 6".
    #[arg(
        short,
        long,
        conflicts_with_all = ["after", "before", "hour_after", "hour_before", "weekday"]
    )]
    pub filter: Option<String>,

    #[command(flatten)]
    pub date: DateArgs,

    /// Only emit timestamps that satisfied the filter.
    #[arg(short, long)]
    pub strict: bool,

    /// Warn about invalid lines instead of aborting.
    #[arg(long)]
    pub skip_invalid: bool,

    /// Parse the input on all cores.
    #[arg(long)]
    pub parallel: bool,

    /// Output as JSON lines.
    #[arg(long)]
    pub json: bool,
}

/// Structured alternative to `--filter`. Conditions are combined with AND.
#[derive(Debug, Default, Args)]
pub struct DateArgs {
    /// Keep timestamps after this date (YYYY-MM-DD or RFC 3339).
    #[arg(long, value_parser = parse_datetime)]
    pub after: Option<DateTime<Utc>>,

    /// Keep timestamps before this date (YYYY-MM-DD or RFC 3339).
    #[arg(long, value_parser = parse_datetime)]
    pub before: Option<DateTime<Utc>>,

    /// Keep timestamps whose hour is greater than this.
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
    pub hour_after: Option<u32>,

    /// Keep timestamps whose hour is less than this.
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
    pub hour_before: Option<u32>,

    /// Keep timestamps falling on this weekday (e.g. "mon", "Wednesday").
    #[arg(long, value_parser = parse_weekday)]
    pub weekday: Option<Weekday>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn filter_conflicts_with_structured_flags() {
        let result = Cli::try_parse_from(["bt", "timeline", "-f", "hour > 1", "--weekday", "mon"]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_structured_flags() {
        let cli = Cli::try_parse_from([
            "bt",
            "timeline",
            "body.txt",
            "--after",
            "2013-04-09",
            "--hour-before",
            "8",
            "--weekday",
            "wed",
            "-s",
        ])
        .unwrap();
        let Some(Commands::Timeline(args)) = cli.command else {
            panic!("expected timeline command");
        };
        assert!(args.strict);
        assert_eq!(args.date.after.unwrap().timestamp(), 1_365_465_600);
        assert_eq!(args.date.hour_before, Some(8));
        assert_eq!(args.date.weekday, Some(Weekday::Wed));
    }

    #[test]
    fn rejects_hour_out_of_range() {
        assert!(Cli::try_parse_from(["bt", "timeline", "--hour-after", "24"]).is_err());
    }
}
