//! Bodyfile timeline CLI library.
//!
//! This crate provides the CLI interface for building timelines.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, DateArgs, TimelineArgs};
pub use config::{Config, DEFAULT_TIME_FORMAT};
