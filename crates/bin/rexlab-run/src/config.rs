//! Runner configuration — TOML file with environment variable overrides.
//!
//! Looks for `rexlab.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::path::{Path, PathBuf};

use rexlab_app::ports::WireSettings;
use rexlab_app::ports::wire::{DEFAULT_HOST, DEFAULT_PORT};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which experiment document to run.
    pub experiment: ExperimentConfig,
    /// Aggregator connection.
    pub aggregator: AggregatorConfig,
    /// Where run logs go.
    pub output: OutputConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Measurement routine knobs.
    pub routine: RoutineConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Path of the experiment configuration document.
    pub path: PathBuf,
}

/// Aggregator (telemetry) configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// When `false`, devices never dial the Aggregator.
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving run-log artifacts.
    pub dir: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RoutineConfig {
    /// `measure()` calls per device.
    pub measurements: u32,
}

impl Config {
    /// Load configuration from `rexlab.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file(Path::new("rexlab.toml"))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("REXLAB_EXPERIMENT") {
            self.experiment.path = PathBuf::from(val);
        }
        if let Some(val) = var("REXLAB_AGGREGATOR_HOST") {
            self.aggregator.host = val;
        }
        if let Some(port) = var("REXLAB_AGGREGATOR_PORT").and_then(|val| val.parse().ok()) {
            self.aggregator.port = port;
        }
        if let Some(val) = var("REXLAB_AGGREGATOR") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.aggregator.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.aggregator.port = port;
                }
            }
        }
        if let Some(val) = var("REXLAB_TELEMETRY") {
            match val.to_ascii_lowercase().as_str() {
                "on" | "true" | "1" => self.aggregator.enabled = true,
                "off" | "false" | "0" => self.aggregator.enabled = false,
                _ => {}
            }
        }
        if let Some(val) = var("REXLAB_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(val);
        }
        if let Some(val) = var("REXLAB_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.aggregator.port == 0 {
            return Err(ConfigError::Validation(
                "aggregator port must be non-zero".to_string(),
            ));
        }
        if self.routine.measurements == 0 {
            return Err(ConfigError::Validation(
                "routine.measurements must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Aggregator settings handed to the orchestrator and every device.
    #[must_use]
    pub fn wire_settings(&self) -> WireSettings {
        WireSettings {
            enabled: self.aggregator.enabled,
            host: self.aggregator.host.clone(),
            port: self.aggregator.port,
        }
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("experiment.toml"),
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("runs"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "rexlab_run=info,rexlab_app=info,rexlab_adapter_runlog_toml=info".to_string(),
        }
    }
}

impl Default for RoutineConfig {
    fn default() -> Self {
        Self { measurements: 3 }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn overridden(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, val)| ((*key).to_string(), (*val).to_string()))
            .collect();
        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).cloned());
        config
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.experiment.path, PathBuf::from("experiment.toml"));
        assert_eq!(config.wire_settings(), WireSettings::default());
        assert_eq!(config.output.dir, PathBuf::from("runs"));
        assert_eq!(config.routine.measurements, 3);
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [aggregator]
            port = 9000

            [routine]
            measurements = 10
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.aggregator.port, 9000);
        assert_eq!(config.aggregator.host, "127.0.0.1");
        assert!(config.aggregator.enabled);
        assert_eq!(config.routine.measurements, 10);
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file(Path::new("nonexistent.toml")).unwrap();
        assert_eq!(config.aggregator.port, 8080);
    }

    #[test]
    fn should_override_aggregator_address() {
        let config = overridden(&[("REXLAB_AGGREGATOR", "10.0.0.5:7000")]);
        assert_eq!(config.wire_settings().addr(), "10.0.0.5:7000");
    }

    #[test]
    fn should_prefer_combined_address_over_host_and_port() {
        let config = overridden(&[
            ("REXLAB_AGGREGATOR_HOST", "lab-pc"),
            ("REXLAB_AGGREGATOR_PORT", "9001"),
            ("REXLAB_AGGREGATOR", "10.0.0.5:7000"),
        ]);
        assert_eq!(config.wire_settings().addr(), "10.0.0.5:7000");
    }

    #[test]
    fn should_disable_telemetry_from_env() {
        let config = overridden(&[("REXLAB_TELEMETRY", "off")]);
        assert!(!config.wire_settings().enabled);
        let config = overridden(&[("REXLAB_TELEMETRY", "maybe")]);
        assert!(config.wire_settings().enabled);
    }

    #[test]
    fn should_let_rust_log_win_over_rexlab_log() {
        let config = overridden(&[("REXLAB_LOG", "debug"), ("RUST_LOG", "trace")]);
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_override_paths() {
        let config = overridden(&[
            ("REXLAB_EXPERIMENT", "/lab/cooldown.toml"),
            ("REXLAB_OUTPUT_DIR", "/lab/runs"),
        ]);
        assert_eq!(config.experiment.path, PathBuf::from("/lab/cooldown.toml"));
        assert_eq!(config.output.dir, PathBuf::from("/lab/runs"));
    }

    #[test]
    fn should_reject_zero_port() {
        let mut config = Config::default();
        config.aggregator.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_measurements() {
        let mut config = Config::default();
        config.routine.measurements = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
