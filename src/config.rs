//! Configuration for supervised-lag.

use crate::core::PairingConfig;
use crate::export::ExportFormat;
use crate::table::{CsvLoader, TimestampKind};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// How pairs are built
    #[serde(default)]
    pub pairing: PairingConfig,

    /// How input files are read
    #[serde(default)]
    pub input: InputConfig,

    /// Where and how datasets are written
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    /// Load configuration from `path`, falling back to defaults if absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("supervised-lag")
            .join("config.json")
    }

    /// Build a CSV loader matching the pairing columns.
    pub fn csv_loader(&self) -> Result<CsvLoader, ConfigError> {
        Ok(CsvLoader::new(
            self.pairing.subject_column.clone(),
            self.pairing.timestamp_column.clone(),
        )
        .with_timestamp_kind(self.input.timestamp_kind)
        .with_timezone(self.input.timezone()?)
        .with_delimiter(self.input.delimiter()?))
    }
}

/// Input parsing options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub timestamp_kind: TimestampKind,

    /// IANA zone for timestamps without an offset
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_delimiter() -> char {
    ','
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            timestamp_kind: TimestampKind::default(),
            timezone: default_timezone(),
            delimiter: default_delimiter(),
        }
    }
}

impl InputConfig {
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::Invalid(format!("unknown time zone: {}", self.timezone)))
    }

    /// The delimiter as a byte; only ASCII delimiters are supported.
    pub fn delimiter(&self) -> Result<u8, ConfigError> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(ConfigError::Invalid(format!(
                "delimiter must be ASCII: {:?}",
                self.delimiter
            )))
        }
    }
}

/// Export options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub format: ExportFormat,

    /// Default output location when none is given on the command line
    #[serde(default = "default_export_path")]
    pub output_path: PathBuf,
}

fn default_export_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("supervised-lag")
        .join("exports")
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::default(),
            output_path: default_export_path(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ElapsedUnit, FeatureLayout};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pairing.subject_column, "subject_id");
        assert_eq!(config.pairing.timestamp_column, "timestamp");
        assert_eq!(config.pairing.layout, FeatureLayout::ElapsedPrevious);
        assert_eq!(config.pairing.elapsed_unit, ElapsedUnit::Days);
        assert!(config.pairing.allow_empty);
        assert_eq!(config.input.timezone().unwrap(), Tz::UTC);
        assert_eq!(config.export.format, ExportFormat::Json);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{ "pairing": { "subject_column": "host", "layout": "lagged_current" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.pairing.subject_column, "host");
        assert_eq!(config.pairing.timestamp_column, "timestamp");
        assert_eq!(config.pairing.layout, FeatureLayout::LaggedCurrent);
        assert_eq!(config.input.delimiter, ',');
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.pairing.elapsed_unit = ElapsedUnit::Hours;
        config.input.timezone = "America/New_York".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.pairing.elapsed_unit, ElapsedUnit::Hours);
        assert_eq!(loaded.input.timezone, "America/New_York");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.pairing.subject_column, "subject_id");
    }

    #[test]
    fn test_invalid_input_options() {
        let mut config = Config::default();
        config.input.timezone = "Mars/Olympus".to_string();
        assert!(matches!(config.csv_loader(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.input.delimiter = '§';
        assert!(config.input.delimiter().is_err());
    }
}
