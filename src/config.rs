//! Configuration module
//!
//! Loaded from a TOML file, by default `~/.config/venue-ledger/config.toml`.
//! Every section is optional; a missing file yields the defaults, which
//! describe the billiard hall and the game room.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::VenueConfig;
use crate::shared::retry::RetryConfig;
use crate::shared::time::VenueZone;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "VENUE_LEDGER_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Default config file path: `<config dir>/venue-ledger/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("venue-ledger")
        .join("config.toml")
}

/// Explicit path, then `VENUE_LEDGER_CONFIG`, then the default path.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}

fn default_data_dir() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("venue-ledger")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub api_host: String,
    pub api_port: u16,
    /// Seconds to wait for tasks on shutdown
    pub shutdown_timeout: u64,
    /// Allowed CORS origins; empty allows any
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8080,
            shutdown_timeout: 30,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `trace`, `debug`, `info`, `warn`, `error` or a full filter directive
    pub level: String,
    /// `text` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON document per venue under `data_dir`
    File,
    /// One row per venue in a SQLite database
    Sqlite,
    /// Process memory only, lost on exit
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Sqlite => write!(f, "sqlite"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
    pub database_url: String,
    pub retry: RetryConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            data_dir: default_data_dir(),
            database_url: "sqlite://./venue-ledger.db?mode=rwc".to_string(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    /// Cookie also accepted in place of the `Authorization` header
    pub cookie_name: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_hours: 12,
            cookie_name: "admin_token".to_string(),
        }
    }
}

/// A statically configured operator account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticUser {
    pub username: String,
    /// bcrypt hash, see `venue-cli hash-password`
    #[serde(default)]
    pub password_hash: Option<String>,
    /// Plaintext password, accepted only when no hash is set
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "admin".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub users: Vec<StaticUser>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            users: vec![StaticUser {
                username: "admin".to_string(),
                password_hash: None,
                password: Some("admin".to_string()),
                role: default_role(),
            }],
        }
    }
}

impl AdminConfig {
    pub fn find(&self, username: &str) -> Option<&StaticUser> {
        self.users.iter().find(|u| u.username == username)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Live board refresh period
    pub tick_interval_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
        }
    }
}

fn default_venues() -> Vec<VenueConfig> {
    vec![VenueConfig::billiard(), VenueConfig::game_room()]
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub clock: VenueZone,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default = "default_venues")]
    pub venues: Vec<VenueConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            security: SecurityConfig::default(),
            admin: AdminConfig::default(),
            clock: VenueZone::default(),
            display: DisplayConfig::default(),
            venues: default_venues(),
        }
    }
}

impl AppConfig {
    /// Load and validate. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config = Self::from_toml(&raw).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let raw = toml::to_string_pretty(self)?;
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, raw).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.venues.is_empty() {
            return Err(ConfigError::Invalid("at least one venue is required".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for venue in &self.venues {
            venue.validate().map_err(ConfigError::Invalid)?;
            if !seen.insert(venue.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate venue id '{}'", venue.id)));
            }
        }
        if chrono::FixedOffset::east_opt(self.clock.utc_offset_minutes * 60).is_none() {
            return Err(ConfigError::Invalid(format!(
                "clock offset {} minutes is out of range",
                self.clock.utc_offset_minutes
            )));
        }
        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::Invalid("security.jwt_secret must not be empty".into()));
        }
        for user in &self.admin.users {
            if user.password_hash.is_none() && user.password.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "user '{}' needs password_hash or password",
                    user.username
                )));
            }
        }
        Ok(())
    }

    pub fn api_address(&self) -> String {
        format!("{}:{}", self.server.api_host, self.server.api_port)
    }

    pub fn venue(&self, id: &str) -> Option<&VenueConfig> {
        self.venues.iter().find(|v| v.id == id)
    }
}
