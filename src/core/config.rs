//! Configuration management for Massive Jsonify
//!
//! Encoding and decoding take their limits explicitly; this module only exists
//! so applications can keep those limits (and the log setup) in a TOML file or
//! the environment. Unset limits mean unbounded.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file looked up by `Config::load`
pub const CONFIG_FILE: &str = "massive-jsonify.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Resource limits applied to every encode and decode
    #[serde(default)]
    pub limits: Limits,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Resource limits for a single encode or decode call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum number of slots in a table
    #[serde(default)]
    pub max_table_size: Option<usize>,

    /// Maximum number of containers open at once along one path
    #[serde(default)]
    pub max_depth: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,

    /// Log format (full, compact, pretty)
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "full".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

impl Limits {
    /// No limits at all
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Cap the slot table size
    pub fn with_max_table_size(mut self, max: usize) -> Self {
        self.max_table_size = Some(max);
        self
    }

    /// Cap the nesting depth
    pub fn with_max_depth(mut self, max: usize) -> Self {
        self.max_depth = Some(max);
        self
    }

    /// Fail if a table of `size` slots would break the limit
    pub fn check_table_size(&self, size: usize) -> Result<()> {
        match self.max_table_size {
            Some(max_size) if size > max_size => Err(Error::TableTooLarge { size, max_size }),
            _ => Ok(()),
        }
    }

    /// Fail if nesting `depth` containers would break the limit
    pub fn check_depth(&self, depth: usize) -> Result<()> {
        match self.max_depth {
            Some(max_depth) if depth > max_depth => Err(Error::DepthExceeded { depth, max_depth }),
            _ => Ok(()),
        }
    }
}

impl Config {
    /// Load configuration from the default file and environment variables
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        // Try to load from config file first
        if Path::new(CONFIG_FILE).exists() {
            config = Self::from_file(CONFIG_FILE)?;
        }

        // Override with environment variables
        config.apply_env_overrides()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply `MJ_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(max) = lookup("MJ_MAX_TABLE_SIZE") {
            self.limits.max_table_size = Some(
                max.parse()
                    .map_err(|e| Error::config(format!("Invalid max table size: {}", e)))?,
            );
        }

        if let Some(max) = lookup("MJ_MAX_DEPTH") {
            self.limits.max_depth = Some(
                max.parse()
                    .map_err(|e| Error::config(format!("Invalid max depth: {}", e)))?,
            );
        }

        if let Some(level) = lookup("MJ_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = lookup("MJ_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_table_size == Some(0) {
            return Err(Error::config("Max table size must be at least 1"));
        }

        if self.limits.max_depth == Some(0) {
            return Err(Error::config("Max depth must be at least 1"));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(Error::config("Invalid log level")),
        }

        match self.logging.format.as_str() {
            "full" | "compact" | "pretty" => {}
            _ => return Err(Error::config("Invalid log format")),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_unbounded() {
        let config = Config::default();
        assert_eq!(config.limits, Limits::unbounded());
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str("[limits]\nmax_depth = 64\n").unwrap();
        assert_eq!(config.limits.max_depth, Some(64));
        assert_eq!(config.limits.max_table_size, None);
        assert_eq!(config.logging, LoggingConfig::default());

        assert!(matches!(
            Config::from_toml_str("[limits]\nmax_depth = \"deep\"\n"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[limits]\nmax_table_size = 1000\n\n[logging]\nlevel = \"debug\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.limits.max_table_size, Some(1000));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "full");

        assert!(Config::from_file("/nonexistent/massive-jsonify.toml").is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [("MJ_MAX_TABLE_SIZE", "50"), ("MJ_LOG_FORMAT", "compact")]
            .into_iter()
            .collect();
        let mut config = Config::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.limits.max_table_size, Some(50));
        assert_eq!(config.limits.max_depth, None);
        assert_eq!(config.logging.format, "compact");

        let err = config
            .apply_overrides(|key| (key == "MJ_MAX_DEPTH").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.limits.max_depth = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_limit_checks() {
        let limits = Limits::unbounded().with_max_table_size(3).with_max_depth(2);
        assert!(limits.check_table_size(3).is_ok());
        assert!(matches!(
            limits.check_table_size(4),
            Err(Error::TableTooLarge { size: 4, max_size: 3 })
        ));
        assert!(limits.check_depth(2).is_ok());
        assert!(matches!(
            limits.check_depth(3),
            Err(Error::DepthExceeded { depth: 3, max_depth: 2 })
        ));
        assert!(Limits::unbounded().check_depth(usize::MAX).is_ok());
    }
}
