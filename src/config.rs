use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::db::SearchOptions;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// Backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base API URL (e.g., "https://api.example.com/api")
    pub api_url: Option<String>,
    /// Bearer token for the signed-in user
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            access_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    /// Returns true if the remote is configured (has both api_url and access_token)
    pub fn is_configured(&self) -> bool {
        self.api_url.is_some() && self.access_token.is_some()
    }
}

/// Sync behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Run a sync pass when the application starts (default: true)
    pub on_startup: bool,
    /// Maximum concurrent remote calls while pushing
    pub push_concurrency: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            on_startup: true,
            push_concurrency: 4,
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite database
    pub database_path: ConfigValue<PathBuf>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub remote: RemoteConfig,
    pub sync: SyncSettings,
    pub search: SearchOptions,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    remote: Option<RemoteConfig>,
    sync: Option<SyncSettings>,
    search: Option<SearchOptions>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let default_db_path = Self::default_data_dir().join("liftlog.db");

        // Start with defaults
        let mut database_path = ConfigValue::new(default_db_path, ConfigSource::Default);
        let mut config_file = None;
        let mut remote = RemoteConfig::default();
        let mut sync = SyncSettings::default();
        let mut search = SearchOptions::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                // Resolve relative paths against config file's directory
                let resolved_path = if db_path.is_relative() {
                    path.parent().map(|p| p.join(&db_path)).unwrap_or(db_path)
                } else {
                    db_path
                };
                database_path = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            if let Some(remote_config) = file_config.remote {
                remote = remote_config;
            }
            if let Some(sync_settings) = file_config.sync {
                sync = sync_settings;
            }
            if let Some(search_options) = file_config.search {
                search = search_options;
            }
        }

        // Apply environment variable overrides
        if let Ok(db_path) = std::env::var("LIFTLOG_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("LIFTLOG_API_URL") {
            remote.api_url = Some(url);
        }
        if let Ok(token) = std::env::var("LIFTLOG_ACCESS_TOKEN") {
            remote.access_token = Some(token);
        }

        Ok(Self {
            database_path,
            config_file,
            remote,
            sync,
            search,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/liftlog/
    /// - macOS: ~/Library/Application Support/liftlog/
    /// - Windows: %APPDATA%/liftlog/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("liftlog")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/liftlog/
    /// - macOS: ~/Library/Application Support/liftlog/
    /// - Windows: %APPDATA%/liftlog/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("liftlog")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
