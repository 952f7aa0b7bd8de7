//! Server configuration
//!
//! Loaded from an optional JSON file; every field has a default so a
//! missing file yields a working configuration.
//!
//! ```json
//! {"host": "127.0.0.1", "port": 27017, "data_dir": "/var/lib/digitooldb"}
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Log levels accepted by `log_level`
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Server and client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Address the TCP server binds to and clients connect to
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Root of all databases
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional log file; logs go to stderr only when unset
    #[serde(default = "default_log_file")]
    pub log_file: Option<PathBuf>,

    /// Maximum concurrently served TCP connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Per-request time budget in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_rest_host")]
    pub rest_host: String,

    #[serde(default = "default_rest_port")]
    pub rest_port: u16,
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    27017
}

fn default_data_dir() -> PathBuf {
    home_dir().join(".digitooldb").join("data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> Option<PathBuf> {
    Some(home_dir().join(".digitooldb").join("logs").join("digitooldb.log"))
}

fn default_max_connections() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_rest_host() -> String {
    "0.0.0.0".to_string()
}

fn default_rest_port() -> u16 {
    8000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            log_file: default_log_file(),
            max_connections: default_max_connections(),
            timeout_secs: default_timeout_secs(),
            rest_host: default_rest_host(),
            rest_port: default_rest_port(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Default config file location: `~/.digitooldb/config.json`
    pub fn default_path() -> PathBuf {
        home_dir().join(".digitooldb").join("config.json")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".to_string()));
        }
        if self.rest_port == 0 {
            return Err(ConfigError::Invalid("rest_port must be non-zero".to_string()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid("max_connections must be at least 1".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be at least 1".to_string()));
        }
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown log_level '{}', expected one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }

    /// TCP server address
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// REST server address
    pub fn rest_addr(&self) -> String {
        format!("{}:{}", self.rest_host, self.rest_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 27017);
        assert_eq!(config.max_connections, 100);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.rest_addr(), "0.0.0.0:8000");
        assert!(config.data_dir.ends_with(".digitooldb/data"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"port": 28000, "data_dir": "/tmp/digi"}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.port, 28000);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/digi"));
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn test_invalid_files_are_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        fs::write(&path, "{port: }").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));

        fs::write(&path, r#"{"max_connections": 0}"#).unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));

        fs::write(&path, r#"{"log_level": "loud"}"#).unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
    }
}
