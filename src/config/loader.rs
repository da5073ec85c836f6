//! Configuration Loader
//!
//! Environment-aware configuration loading: compiled-in defaults, an
//! optional `sentinel-config.yaml` plus a per-environment override file,
//! and `SENTINEL_`-prefixed environment variables, merged in that order.

use super::SentinelConfig;
use crate::error::{Result, SentinelError};
use ::config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

const BASE_FILE: &str = "sentinel-config";

/// Loaded configuration together with its provenance
pub struct ConfigManager {
    config: SentinelConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> Result<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> Result<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load with an explicit environment. Useful for tests that must not
    /// mutate process-global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> Result<Arc<ConfigManager>> {
        let config_directory =
            config_dir.unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading sentinel configuration"
        );

        let base_path = config_directory.join(BASE_FILE);
        let env_path = config_directory.join(format!("{BASE_FILE}.{environment}"));

        let defaults = Config::try_from(&SentinelConfig::default())
            .map_err(|e| SentinelError::configuration(format!("default serialization: {e}")))?;

        let merged = Config::builder()
            .add_source(defaults)
            .add_source(
                File::from(base_path)
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                File::from(env_path)
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(Environment::with_prefix("SENTINEL").separator("__"))
            .build()
            .map_err(|e| SentinelError::configuration(format!("configuration merge: {e}")))?;

        let config: SentinelConfig = merged
            .try_deserialize()
            .map_err(|e| SentinelError::configuration(format!("configuration parse: {e}")))?;

        config.validate()?;

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Detect the running environment from conventional variables
    pub fn detect_environment() -> String {
        env::var("SENTINEL_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    pub fn config(&self) -> &SentinelConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &PathBuf {
        &self.config_directory
    }
}
