//! Configuration loading and data folder resolution
//!
//! Every setting is resolved independently, highest priority first:
//! 1. Command-line argument
//! 2. Environment variable (`SCHOLAR_*`)
//! 3. TOML config file
//! 4. OS-dependent compiled default
//!
//! A missing TOML file is normal. A malformed one is logged and ignored so the
//! service still starts on defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Error, Result};

pub const ENV_DATA_FOLDER: &str = "SCHOLAR_DATA_FOLDER";
pub const ENV_BIND_ADDRESS: &str = "SCHOLAR_BIND";
pub const ENV_LOG_LEVEL: &str = "SCHOLAR_LOG_LEVEL";
pub const ENV_SESSION_TTL_HOURS: &str = "SCHOLAR_SESSION_TTL_HOURS";

/// Upper bound on the session lifetime, one year
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

/// Database file name inside the data folder
pub const DATABASE_FILE: &str = "scholar.db";

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub data_folder: PathBuf,
    pub bind_address: String,
    pub log_level: String,
    pub session_ttl_hours: i64,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let data_folder = dirs::data_local_dir()
            .map(|d| d.join("scholar"))
            .unwrap_or_else(|| PathBuf::from("./scholar_data"));

        Self {
            data_folder,
            bind_address: "127.0.0.1:5780".to_string(),
            log_level: "info".to_string(),
            session_ttl_hours: 168,
        }
    }
}

/// On-disk TOML configuration. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub data_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub log_level: Option<String>,
    pub session_ttl_hours: Option<i64>,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub log_level: Option<String>,
    pub session_ttl_hours: Option<i64>,
    /// Explicit TOML path (replaces the per-user default location)
    pub config_file: Option<PathBuf>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub data_folder: PathBuf,
    pub bind_address: String,
    pub log_level: String,
    pub session_ttl_hours: i64,
}

impl ServerConfig {
    /// Resolve configuration from CLI overrides, environment, TOML and defaults
    pub fn resolve(overrides: &ConfigOverrides) -> Self {
        let toml_path = overrides.config_file.clone().or_else(default_config_path);
        let toml_config = match toml_path.as_deref() {
            Some(path) => match load_toml_config(path) {
                Ok(Some(config)) => {
                    info!("Loaded configuration from {}", path.display());
                    config
                }
                Ok(None) => TomlConfig::default(),
                Err(e) => {
                    warn!("Ignoring config file {}: {}", path.display(), e);
                    TomlConfig::default()
                }
            },
            None => TomlConfig::default(),
        };

        Self::resolve_with(overrides, &toml_config, &CompiledDefaults::for_current_platform())
    }

    /// Resolution core, separated so the priority order can be tested without touching disk
    pub fn resolve_with(
        overrides: &ConfigOverrides,
        toml_config: &TomlConfig,
        defaults: &CompiledDefaults,
    ) -> Self {
        let data_folder = overrides
            .data_folder
            .clone()
            .or_else(|| env_value(ENV_DATA_FOLDER).map(PathBuf::from))
            .or_else(|| toml_config.data_folder.clone())
            .unwrap_or_else(|| defaults.data_folder.clone());

        let bind_address = overrides
            .bind_address
            .clone()
            .or_else(|| env_value(ENV_BIND_ADDRESS))
            .or_else(|| toml_config.bind_address.clone())
            .unwrap_or_else(|| defaults.bind_address.clone());

        let log_level = overrides
            .log_level
            .clone()
            .or_else(|| env_value(ENV_LOG_LEVEL))
            .or_else(|| toml_config.log_level.clone())
            .unwrap_or_else(|| defaults.log_level.clone());

        let session_ttl_hours = overrides
            .session_ttl_hours
            .or_else(|| {
                env_value(ENV_SESSION_TTL_HOURS).and_then(|v| match v.parse::<i64>() {
                    Ok(hours) => Some(hours),
                    Err(_) => {
                        warn!("{} is not an integer: {}", ENV_SESSION_TTL_HOURS, v);
                        None
                    }
                })
            })
            .or(toml_config.session_ttl_hours)
            .filter(|hours| *hours > 0)
            .map(|hours| {
                if hours > MAX_SESSION_TTL_HOURS {
                    warn!(hours, max = MAX_SESSION_TTL_HOURS, "Session TTL clamped");
                }
                hours.min(MAX_SESSION_TTL_HOURS)
            })
            .unwrap_or(defaults.session_ttl_hours);

        Self {
            data_folder,
            bind_address,
            log_level,
            session_ttl_hours,
        }
    }

    /// Path of the SQLite database inside the data folder
    pub fn database_path(&self) -> PathBuf {
        self.data_folder.join(DATABASE_FILE)
    }

    /// Create the data folder if missing
    pub fn ensure_data_folder(&self) -> Result<()> {
        if !self.data_folder.exists() {
            std::fs::create_dir_all(&self.data_folder)?;
            info!("Created data folder: {}", self.data_folder.display());
        }
        Ok(())
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Per-user config file location (`~/.config/scholar/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("scholar").join("config.toml"))
}

/// Load a TOML config file. `Ok(None)` when the file does not exist.
pub fn load_toml_config(path: &Path) -> Result<Option<TomlConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str::<TomlConfig>(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
    Ok(Some(config))
}
