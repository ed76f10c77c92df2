//! Bootstrap configuration loading and root folder resolution
//!
//! Two tiers, as for every Evonest service:
//! 1. **TOML bootstrap**: database path, port, logging, batch tuning
//! 2. **Database runtime**: `settings` table (see [`crate::db::settings`])
//!
//! A missing TOML file is not an error: defaults are used and a warning is
//! logged. A TOML file that exists but cannot be parsed is an error.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Database file name inside the root folder
pub const DEFAULT_DATABASE_FILE: &str = "evonest.db";

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change while a service is running.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Path to SQLite database file (relative paths are joined to the root folder)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Root folder holding the database and service data
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Batch conversion tuning (optional)
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Batch preview/apply tuning
///
/// Values set here take precedence over the `settings` table; unset values
/// fall back to it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchConfig {
    /// Upper bound on concurrently pending per-trait updates during apply
    #[serde(default)]
    pub max_in_flight_updates: Option<usize>,

    /// Number of trait rows fetched per keyset page while scanning
    #[serde(default)]
    pub scan_page_size: Option<u32>,

    /// Wall-clock budget for one batch; 0 means unbounded
    #[serde(default)]
    pub time_budget_ms: Option<u64>,
}

fn default_port() -> u16 {
    5731
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            port: default_port(),
            root_folder: None,
            logging: LoggingConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl TomlConfig {
    /// Parse a TOML bootstrap file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TomlConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the TOML file if present, otherwise fall back to defaults
    ///
    /// With no explicit path, the platform config location is tried
    /// (`~/.config/evonest/config.toml` on Linux).
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let candidate = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };

        match candidate {
            Some(p) if p.exists() => {
                info!("Loading configuration from {}", p.display());
                Self::load(&p)
            }
            Some(p) => {
                warn!(
                    "Config file not found at {}, using built-in defaults",
                    p.display()
                );
                Ok(Self::default())
            }
            None => {
                warn!("Could not determine config directory, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.batch.max_in_flight_updates == Some(0) {
            return Err(Error::Config(
                "batch.max_in_flight_updates must be at least 1".to_string(),
            ));
        }
        if self.batch.scan_page_size == Some(0) {
            return Err(Error::Config(
                "batch.scan_page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Database file location for the given root folder
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        match &self.database_path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => root_folder.join(p),
            None => root_folder.join(DEFAULT_DATABASE_FILE),
        }
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Platform config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("evonest").join("config.toml"))
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/evonest
        dirs::data_local_dir()
            .map(|d| d.join("evonest"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/evonest"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("evonest"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/evonest"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("evonest"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\evonest"))
    } else {
        PathBuf::from("./evonest_data")
    }
}
