use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bt_cli::commands::timeline::{self, TimelineOptions};
use bt_cli::commands::{check, util};
use bt_cli::{Cli, Commands, Config};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support; warnings are shown by default
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match &cli.command {
        Some(Commands::Timeline(args)) => {
            let config = load_config(cli.config.as_deref())?;
            let options = TimelineOptions::from_args(args, &config)?;
            let input = util::open_input(args.bodyfile.as_deref())?;

            let mut out = BufWriter::new(io::stdout().lock());
            timeline::run(&mut out, input, &options)?;
            out.flush()?;
        }
        Some(Commands::Check { bodyfile, json }) => {
            let input = util::open_input(bodyfile.as_deref())?;
            let report = check::run(&mut io::stdout().lock(), input, *json)?;
            if !report.is_valid() {
                anyhow::bail!("{} invalid line(s)", report.invalid);
            }
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
