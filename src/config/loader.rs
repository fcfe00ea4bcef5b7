//! Configuration Loader
//!
//! Environment-aware configuration loading built on the `config` crate. Missing keys
//! fall back to the serde defaults of [`TransferConfig`], so an absent file is not an
//! error unless it was requested explicitly through `TRANSFER_CONFIG_PATH`.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::{Config, Environment, File, FileFormat};
use tracing::{debug, info};

use super::error::{ConfigResult, ConfigurationError};
use super::TransferConfig;

const CONFIG_PATH_VAR: &str = "TRANSFER_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config/transfer.toml";
const ENV_PREFIX: &str = "TRANSFER";

/// Loaded, validated configuration plus the environment it was loaded for
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: TransferConfig,
    environment: String,
    source_file: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        match env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::load_from_file(Path::new(&path), true),
            _ => Self::load_from_file(Path::new(DEFAULT_CONFIG_PATH), false),
        }
    }

    /// Load configuration from a specific TOML file, layering environment overrides
    pub fn load_from_file(path: &Path, required: bool) -> ConfigResult<Arc<ConfigManager>> {
        if required && !path.exists() {
            return Err(ConfigurationError::ConfigFileNotFound {
                path: path.to_path_buf(),
            });
        }

        let environment = Self::detect_environment();
        debug!(
            environment = %environment,
            path = %path.display(),
            "Loading transfer configuration"
        );

        let mut config: TransferConfig = Config::builder()
            .add_source(
                File::new(&path.to_string_lossy(), FileFormat::Toml).required(required),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        if let Ok(database_url) = env::var("DATABASE_URL") {
            config.database.url = database_url;
        }

        config.validate()?;

        info!(
            environment = %environment,
            batch_size = config.batch.batch_size,
            worker_count = config.queue.worker_count,
            retention_days = config.retention.retention_days,
            "⚙️ Configuration loaded successfully"
        );

        let source_file = path.exists().then(|| path.to_path_buf());
        Ok(Arc::new(ConfigManager {
            config,
            environment,
            source_file,
        }))
    }

    /// Wrap an in-code configuration, validating it
    pub fn from_config(config: TransferConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            source_file: None,
        }))
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// The TOML file that contributed to this configuration, if any
    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }

    /// Detect the current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("TRANSFER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }
}
