//! Node configuration
//!
//! Loaded from a TOML file. Every section and field has a default, so an
//! empty file (or no file at all) yields a runnable node.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::ConfigError;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "LAVANODE_CONFIG";

/// Config file name looked up in the platform config directory
pub const CONFIG_FILE_NAME: &str = "application.toml";

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sessions: SessionConfig,
    pub sources: SourcesConfig,
    pub cache: CacheConfig,
}

/// HTTP / WebSocket listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    /// Shared secret expected in the `Authorization` header
    pub password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            password: DEFAULT_PASSWORD.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.address, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("bad listen address: {}", e)))
    }
}

/// Session resume behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Timeout used by `configureResuming` when the client omits one
    pub default_resume_timeout_secs: u64,
    /// How often suspended sessions are swept for expiry
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_resume_timeout_secs: DEFAULT_RESUME_TIMEOUT_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl SessionConfig {
    pub fn default_resume_timeout(&self) -> Duration {
        Duration::from_secs(self.default_resume_timeout_secs.max(1))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Built-in source managers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub http: bool,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self { http: true }
    }
}

/// Credential cache persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache file; defaults to the platform data directory
    pub path: Option<PathBuf>,
    pub ttl_secs: u64,
    pub flush_debounce_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            flush_debounce_ms: DEFAULT_CACHE_FLUSH_DEBOUNCE_MS,
        }
    }
}

impl CacheConfig {
    /// Resolved cache file path, if one can be determined
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(|| {
            project_dirs().map(|dirs| dirs.data_dir().join("credentials.json"))
        })
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn flush_debounce(&self) -> Duration {
        Duration::from_millis(self.flush_debounce_ms)
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "lavanode", "lavanode")
}

impl AppConfig {
    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Self::from_toml(&text)
    }

    /// Load from the first config found: explicit path, `LAVANODE_CONFIG`,
    /// then the platform config directory. Falls back to defaults.
    pub fn load_or_default(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(&path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }
        if let Some(path) = project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME)) {
            if path.exists() {
                return Self::load(&path);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.password.is_empty() {
            return Err(ConfigError::Invalid("server.password must not be empty".into()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must not be 0".into()));
        }
        self.server.socket_addr()?;
        Ok(())
    }
}
