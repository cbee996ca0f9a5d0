//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Default `strftime` format for the time column.
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Application configuration.
///
/// Boolean settings are defaults for the matching `timeline` flags; a flag
/// given on the command line always turns the behavior on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Only emit timestamps that satisfied the filter.
    pub strict: bool,
    /// Warn about invalid lines instead of aborting.
    pub skip_invalid: bool,
    /// Parse input on all cores.
    pub parallel: bool,
    /// Format of the time column in text output.
    pub time_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strict: false,
            skip_invalid: false,
            parallel: false,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (BT_*)
        figment = figment.merge(Env::prefixed("BT_"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for bt.
///
/// On Linux: `~/.config/bt`
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("bt"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.strict);
        assert!(!config.skip_invalid);
        assert!(!config.parallel);
        assert_eq!(config.time_format, DEFAULT_TIME_FORMAT);
    }

    #[test]
    fn test_dirs_config_path_ends_with_bt() {
        let path = dirs_config_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "bt");
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bt.toml");
        std::fs::write(&path, "strict = true\ntime_format = \"%s\"\n").unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert!(config.strict);
        assert!(!config.skip_invalid);
        assert_eq!(config.time_format, "%s");
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load_from(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.time_format, DEFAULT_TIME_FORMAT);
    }
}
