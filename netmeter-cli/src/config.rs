//! Configuration file support for the netmeter tools
//!
//! The measurement parameters always come from the command line; a TOML
//! config file supplies the ambient knobs (timeouts, parse strictness,
//! worker count) when the defaults don't fit.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Client-side defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Connection establishment deadline in milliseconds (0 = none).
    #[serde(default)]
    pub connect_timeout_ms: u64,
    /// Per-read deadline in milliseconds (0 = block forever).
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Fail on non-numeric protocol fields instead of degrading to 0.
    #[serde(default)]
    pub strict_parsing: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            connect_timeout_ms: 0,
            read_timeout_ms: default_read_timeout_ms(),
            strict_parsing: false,
        }
    }
}

/// Server-side defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Worker threads serving sessions.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Per-read deadline in milliseconds (0 = block forever).
    #[serde(default)]
    pub read_timeout_ms: u64,
    /// Fail on non-numeric protocol fields instead of degrading to 0.
    #[serde(default)]
    pub strict_parsing: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            workers: default_workers(),
            read_timeout_ms: 0,
            strict_parsing: false,
        }
    }
}

fn default_read_timeout_ms() -> u64 {
    0
}

fn default_workers() -> usize {
    4
}

/// Combined configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub client: Option<ClientConfig>,
    pub server: Option<ServerConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(server) = &self.server {
            if server.workers == 0 {
                return Err(ConfigError::Invalid(
                    "server.workers must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Example client configuration.
    pub fn example_client() -> Self {
        Config {
            client: Some(ClientConfig {
                connect_timeout_ms: 5_000,
                read_timeout_ms: 10_000,
                strict_parsing: false,
            }),
            server: None,
        }
    }

    /// Example server configuration.
    pub fn example_server() -> Self {
        Config {
            client: None,
            server: Some(ServerConfig {
                workers: 8,
                read_timeout_ms: 30_000,
                strict_parsing: false,
            }),
        }
    }
}

/// Convert a millisecond knob to an optional deadline (0 means none).
pub fn timeout_from_ms(ms: u64) -> Option<Duration> {
    if ms == 0 {
        None
    } else {
        Some(Duration::from_millis(ms))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
