//! Configuration types for riglet

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Miner daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerConfig {
    /// Path to the installed miner daemon binary
    pub binary_path: PathBuf,
    /// Configuration directory handed to the daemon at startup
    pub config_dir: PathBuf,
    /// Command socket configuration
    pub api: ApiConfig,
    /// Timeout configuration
    pub timeouts: TimeoutConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("minerd"),
            config_dir: PathBuf::from("."),
            api: ApiConfig::default(),
            timeouts: TimeoutConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl MinerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::RigletError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::RigletError::Config(format!("Failed to read config file: {}", e))
        })?;
        toml::from_str(&content)
            .map_err(|e| crate::RigletError::Config(format!("Failed to parse config: {}", e)))
    }
}

/// Command socket configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address the daemon binds its command socket to
    pub address: String,
    /// Port of the command socket
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 3456,
        }
    }
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Maximum wait for a single command response, in seconds
    pub command_secs: u64,
    /// Maximum wait for the daemon to accept commands after spawn
    pub startup_secs: u64,
    /// Maximum wait for a clean daemon shutdown before killing it
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            command_secs: 10,
            startup_secs: 20,
            shutdown_secs: 5,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or text)
    pub format: String,
    /// Log file path (if any)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            file: None,
        }
    }
}
