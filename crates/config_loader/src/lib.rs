//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Produce a `TimedBatchConfig` plus optional observability settings
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let file = ConfigLoader::load_from_path(Path::new("batch.toml")).unwrap();
//! println!("batch size: {}", file.batch.batch_size);
//! ```
//!
//! File layout:
//!
//! ```toml
//! [batch]
//! batch_size = 10
//! batch_timeout_ms = 2000
//! thread_timeout_ms = 22000
//! max_in_flight_batches = 1   # optional
//!
//! [observability]             # optional
//! log_level = "info"
//! metrics_port = 9000
//! ```

mod parser;
mod validator;

pub use contracts::TimedBatchConfig;
pub use parser::ConfigFormat;

use contracts::ContractError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchFileConfig {
    /// Batching parameters
    pub batch: TimedBatchConfig,

    /// Logging and metrics settings
    #[serde(default)]
    pub observability: ObservabilitySection,
}

/// `[observability]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilitySection {
    /// Default log level when RUST_LOG is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Prometheus exporter port (absent = disabled)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
}

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<BatchFileConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<BatchFileConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(config: &BatchFileConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize configuration to JSON string
    pub fn to_json(config: &BatchFileConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_TOML: &str = r#"
[batch]
batch_size = 10
batch_timeout_ms = 2000
thread_timeout_ms = 22000

[observability]
metrics_port = 9000
"#;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("create temp file");
        file.write_all(content.as_bytes()).expect("write temp file");
        file
    }

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.batch, TimedBatchConfig::default());
        assert_eq!(config.observability.metrics_port, Some(9000));
    }

    #[test]
    fn test_load_from_path_detects_format() {
        let file = write_temp(".toml", MINIMAL_TOML);
        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(config.batch.thread_timeout_ms, 22000);

        let json = ConfigLoader::to_json(&config).unwrap();
        let file = write_temp(".json", &json);
        let from_json = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(config, from_json);
    }

    #[test]
    fn test_load_from_path_unsupported_extension() {
        let file = write_temp(".yaml", MINIMAL_TOML);
        let err = ConfigLoader::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let err = ConfigLoader::load_from_path(Path::new("/nonexistent/batch.toml")).unwrap_err();
        assert!(matches!(err, ContractError::Io(_)));
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&config).unwrap();
        let config2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(config, config2);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        // Parses fine, but the thread timeout does not exceed the batch timeout
        let content = r#"
[batch]
batch_size = 10
batch_timeout_ms = 2000
thread_timeout_ms = 1500
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("must be greater than batch timeout"));
    }
}
