//! Configuration loading and root folder resolution
//!
//! Resolution priority follows the same order everywhere:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "BIZDIR_ROOT_FOLDER";

/// Environment variable pointing at an explicit config file
pub const CONFIG_FILE_ENV: &str = "BIZDIR_CONFIG";

/// Top-level TOML configuration
///
/// Every section is optional; a missing file or missing section yields defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding the database and export files
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    /// SQLite database file (default: `<root>/bizdir.db`)
    pub database_path: Option<PathBuf>,
    /// JSON export file (default: `<root>/businesses.json`)
    pub export_path: Option<PathBuf>,
    pub providers: ProvidersConfig,
    pub aggregation: AggregationConfig,
    pub schedule: ScheduleConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Per-provider credentials and crawl limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProvidersConfig {
    pub companies_house_api_key: Option<String>,
    pub foursquare_api_key: Option<String>,
    pub yelp_api_key: Option<String>,
    pub companies_house_limit: usize,
    pub openstreetmap_limit: usize,
    pub foursquare_limit: usize,
    pub yelp_limit: usize,
    /// Overpass bounding box: `min_lat,min_lon,max_lat,max_lon`
    pub openstreetmap_bbox: String,
    /// Free-text location for Foursquare and Yelp searches
    pub search_location: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            companies_house_api_key: None,
            foursquare_api_key: None,
            yelp_api_key: None,
            companies_house_limit: 500,
            openstreetmap_limit: 500,
            foursquare_limit: 500,
            yelp_limit: 500,
            openstreetmap_bbox: "49.9,-7.6,58.7,1.8".to_string(),
            search_location: "London, UK".to_string(),
        }
    }
}

/// Aggregation engine settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AggregationConfig {
    /// Source tag prefixes treated as registry-tier
    pub registry_sources: Vec<String>,
    /// Bounded capacity of the ingest channel
    pub channel_capacity: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            registry_sources: vec!["companies_house".to_string()],
            channel_capacity: 256,
        }
    }
}

/// Periodic crawl schedule (local time)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Daily run time, `HH:MM`
    pub daily_at: String,
    /// Weekday of the extra weekly run; empty disables it
    pub weekly_day: String,
    /// Weekly run time, `HH:MM`
    pub weekly_at: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_at: "02:00".to_string(),
            weekly_day: "Sunday".to_string(),
            weekly_at: "03:00".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Database path, falling back to `<root>/bizdir.db`
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| root_folder.join("bizdir.db"))
    }

    /// Export path, falling back to `<root>/businesses.json`
    pub fn export_path(&self, root_folder: &Path) -> PathBuf {
        self.export_path
            .clone()
            .unwrap_or_else(|| root_folder.join("businesses.json"))
    }
}

/// Load configuration from a TOML file
///
/// A missing file is not an error: defaults are returned with a warning.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file {} not found, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = TomlConfig::from_toml_str(&content)?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Locate the configuration file
///
/// Order: explicit path, `BIZDIR_CONFIG`, `~/.config/bizdir/config.toml`,
/// then `/etc/bizdir/config.toml` on Linux.
pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("bizdir").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/bizdir/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Resolve the root folder: CLI → ENV → TOML → compiled default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("bizdir"))
        .unwrap_or_else(|| PathBuf::from("./bizdir_data"))
}

/// Resolve a provider API key: ENV → TOML
///
/// Warns when both sources carry a valid key, since the environment silently wins.
pub fn resolve_api_key(env_var: &str, toml_value: Option<&str>, label: &str) -> Option<String> {
    let env_key = std::env::var(env_var).ok().filter(|k| is_valid_key(k));
    let toml_key = toml_value.filter(|k| is_valid_key(k));

    match (env_key, toml_key) {
        (Some(env), Some(_)) => {
            warn!(
                "{} API key found in environment and TOML config. Using {}.",
                label, env_var
            );
            Some(env)
        }
        (Some(env), None) => {
            info!("{} API key loaded from environment variable", label);
            Some(env)
        }
        (None, Some(toml)) => {
            info!("{} API key loaded from TOML config", label);
            Some(toml.to_string())
        }
        (None, None) => None,
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
