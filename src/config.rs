use crate::core::{Result, RowgateError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub seed: Option<SeedConfig>,
}

/// Connection settings handed to `Connection::from_config`.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub dsn: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub options: ConnectionOptions,
}

impl DatabaseConfig {
    pub fn new(dsn: impl Into<String>) -> Self {
        DatabaseConfig {
            dsn: dsn.into(),
            username: None,
            password: None,
            options: ConnectionOptions::default(),
        }
    }
}

/// Driver options applied right after the connection opens.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionOptions {
    /// Defaults to enabled when unset
    pub foreign_keys: Option<bool>,
    pub journal_mode: Option<String>,
    pub busy_timeout_ms: Option<u64>,
}

/// Seed data location for the bulk loader.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub truncate: bool,
}

impl Config {
    /// Parses configuration from TOML text.
    pub fn from_str(content: &str) -> Result<Config> {
        toml::from_str(content).map_err(|e| RowgateError::Config(e.to_string()))
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = rowgate::config::load_config("rowgate.toml").expect("Failed to load config");
/// println!("{}", config.database.dsn);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        RowgateError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    Config::from_str(&content)
}
