//! Configuration management for training and serving

use crate::models::estimator::EstimatorConfig;
use crate::schema::SchemaDescriptor;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    pub training: TrainingConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// HTTP bind configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Artifact store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactsConfig {
    /// Directory holding versioned artifacts
    pub root: PathBuf,
    /// Version to serve; latest when unset
    #[serde(default)]
    pub version: Option<String>,
}

/// Training job configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingConfig {
    /// Coordinate descent round budget
    pub max_iter: usize,
    /// Convergence tolerance on the largest coordinate step
    pub tol: f64,
    /// Inverse L2 regularisation strength
    pub c: f64,
    /// Held-out fraction when splitting a single input file
    pub test_fraction: f64,
    /// Seed for the stratified split
    pub seed: u64,
    /// Declared numeric columns; inferred from the data when both lists are empty
    #[serde(default)]
    pub numeric: Vec<String>,
    /// Declared categorical columns
    #[serde(default)]
    pub categorical: Vec<String>,
}

impl TrainingConfig {
    pub fn estimator(&self) -> EstimatorConfig {
        EstimatorConfig {
            max_iter: self.max_iter,
            tol: self.tol,
            c: self.c,
        }
    }

    /// The declared schema, or `None` when it should be inferred.
    pub fn declared_schema(&self) -> crate::error::Result<Option<SchemaDescriptor>> {
        if self.numeric.is_empty() && self.categorical.is_empty() {
            return Ok(None);
        }
        SchemaDescriptor::new(self.numeric.clone(), self.categorical.clone()).map(Some)
    }
}

/// Runtime metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsConfig {
    /// Seconds between periodic summaries; 0 disables the reporter
    pub report_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Defaults, then the file at `path` if it exists, then `INCOME__*` env vars.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let defaults =
            Config::try_from(&AppConfig::default()).context("Failed to encode default configuration")?;

        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("INCOME")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let estimator = EstimatorConfig::default();
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            artifacts: ArtifactsConfig {
                root: PathBuf::from("models"),
                version: None,
            },
            training: TrainingConfig {
                max_iter: estimator.max_iter,
                tol: estimator.tol,
                c: estimator.c,
                test_fraction: 0.2,
                seed: 42,
                numeric: Vec::new(),
                categorical: Vec::new(),
            },
            metrics: MetricsConfig {
                report_interval_secs: 60,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.training.max_iter, 300);
        assert_eq!(config.training.estimator(), EstimatorConfig::default());
        assert!(config.training.declared_schema().unwrap().is_none());
        assert!(config.artifacts.version.is_none());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from_path(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090

[training]
c = 0.5
numeric = ["age"]
categorical = ["sex"]
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.training.c, 0.5);

        let schema = config.training.declared_schema().unwrap().unwrap();
        assert_eq!(schema.numeric(), &["age".to_string()]);
    }
}
