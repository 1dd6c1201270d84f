//! Application configuration
//!
//! [`AppConfig`] holds the server options. Values come from, in increasing
//! precedence: built-in defaults, an optional TOML or JSON file, and
//! `TRELLIS_*` environment variables (a `.env` file is loaded first).
//!
//! | variable               | field            |
//! |------------------------|------------------|
//! | `TRELLIS_PORT`         | `port`           |
//! | `TRELLIS_HOST`         | `host`           |
//! | `TRELLIS_ROUTE_PREFIX` | `route_prefix`   |
//! | `TRELLIS_STATIC_FILES` | `static_files`   |
//! | `TRELLIS_STATIC_PATH`  | `static_path`    |
//! | `TRELLIS_BODY_LIMIT`   | `body_limit`     |
//! | `TRELLIS_LOG_LEVEL`    | `log.level`      |
//! | `TRELLIS_LOG_FORMAT`   | `log.format`     |
//! | `TRELLIS_LOG_FILE`     | `log.file`       |

use crate::body::DEFAULT_BODY_LIMIT;
use crate::logging::{debug, LogSettings};
use crate::static_files::HistoryFallbackConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Prefix of the environment variables read by [`AppConfig::apply_env`].
pub const ENV_PREFIX: &str = "TRELLIS_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid value '{value}' for {key}")]
    Env { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub port: u16,
    pub host: String,
    /// Prefix for every controller route
    pub route_prefix: String,
    /// Serve files from `static_path`
    pub static_files: bool,
    pub static_path: PathBuf,
    /// Rewrite SPA navigation requests when set
    pub history_fallback: Option<HistoryFallbackConfig>,
    /// Maximum request body size in bytes
    pub body_limit: usize,
    pub log: LogSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
            route_prefix: "/".to_string(),
            static_files: true,
            static_path: PathBuf::from("./static"),
            history_fallback: None,
            body_limit: DEFAULT_BODY_LIMIT,
            log: LogSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, then `path` (if given), then `.env` and the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Ok(env_file) = dotenvy::dotenv() {
            debug!(file = %env_file.display(), "Loaded .env file");
        }
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("Failed to read {}: {}", path.display(), e)))?;

        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            Some(other) => Err(ConfigError::Load(format!("Unsupported format: {}", other))),
            None => Err(ConfigError::Load("No file extension found".to_string())),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(format!("TOML parse error: {}", e)))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("JSON parse error: {}", e)))
    }

    /// Override fields from `TRELLIS_*` process environment variables.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(std::env::vars())
    }

    /// Override fields from `(key, value)` pairs; keys without the
    /// `TRELLIS_` prefix are ignored.
    pub fn apply_env_from<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.into();
            let invalid = || ConfigError::Env {
                key: key.as_ref().to_string(),
                value: value.clone(),
            };

            match name.to_ascii_lowercase().as_str() {
                "port" => self.port = value.trim().parse().map_err(|_| invalid())?,
                "host" => self.host = value.clone(),
                "route_prefix" => self.route_prefix = value.clone(),
                "static_files" => self.static_files = parse_bool(&value).ok_or_else(invalid)?,
                "static_path" => self.static_path = PathBuf::from(&value),
                "body_limit" => self.body_limit = value.trim().parse().map_err(|_| invalid())?,
                "log_level" => self.log.level = value.trim().parse().map_err(|_| invalid())?,
                "log_format" => self.log.format = value.trim().parse().map_err(|_| invalid())?,
                "log_file" => self.log.file = Some(PathBuf::from(&value)),
                _ => continue,
            }
            debug!(key = key.as_ref(), "Applied environment override");
        }
        Ok(())
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn route_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.route_prefix = prefix.into();
        self
    }

    pub fn static_files(mut self, enabled: bool) -> Self {
        self.static_files = enabled;
        self
    }

    pub fn static_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.static_path = path.into();
        self
    }

    pub fn history_fallback(mut self, fallback: HistoryFallbackConfig) -> Self {
        self.history_fallback = Some(fallback);
        self
    }

    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn log(mut self, log: LogSettings) -> Self {
        self.log = log;
        self
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("bad listen address {}:{}", self.host, self.port)))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
