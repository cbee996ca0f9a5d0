//! CLI subcommand implementations.

pub mod check;
pub mod timeline;
pub mod util;
