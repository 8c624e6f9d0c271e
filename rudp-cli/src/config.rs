//! Configuration file support for the rudp transfer tools

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Transfer tool configuration
///
/// Every field has a default (server on 30000, client on 30001, 10 s
/// timeout, 256-byte chunks), so an empty TOML file is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Port the receiver binds and the sender targets
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// Port the sender binds
    #[serde(default = "default_client_port")]
    pub client_port: u16,
    /// Seconds of silence before the peer is considered gone
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
    /// Payload bytes per data chunk
    #[serde(default = "default_packet_size")]
    pub packet_size: usize,
    /// Seconds between stats lines while connected
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: f64,
}

fn default_server_port() -> u16 {
    30000
}

fn default_client_port() -> u16 {
    30001
}

fn default_timeout_secs() -> f64 {
    10.0
}

fn default_packet_size() -> usize {
    256
}

fn default_stats_interval() -> f64 {
    0.25
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            server_port: default_server_port(),
            client_port: default_client_port(),
            timeout_secs: default_timeout_secs(),
            packet_size: default_packet_size(),
            stats_interval_secs: default_stats_interval(),
        }
    }
}

impl TransferConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: TransferConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject configurations the transfer framing cannot carry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.packet_size < 64 || self.packet_size > 1400 {
            return Err(ConfigError::Invalid(format!(
                "packet_size {} outside 64..=1400",
                self.packet_size
            )));
        }
        if self.timeout_secs <= 0.0 {
            return Err(ConfigError::Invalid(
                "timeout_secs must be positive".to_string(),
            ));
        }
        if self.stats_interval_secs <= 0.0 {
            return Err(ConfigError::Invalid(
                "stats_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
