//! Error types for riglet

use thiserror::Error;

/// Main error type for riglet
#[derive(Error, Debug)]
pub enum RigletError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No connection to the miner daemon
    #[error("Not connected to the miner daemon")]
    NotConnected,

    /// Connection-level failure (socket closed, write/read failed)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Command response did not arrive within the configured bound
    #[error("Command timed out: {method}")]
    Timeout { method: String },

    /// Malformed or uncorrelated response from the daemon
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The daemon rejected a command, with its own reason
    #[error("Command {method} rejected: {reason}")]
    Remote { method: String, reason: String },

    /// Process lifecycle error
    #[error("Process error: {0}")]
    Process(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for riglet operations
pub type RigletResult<T> = Result<T, RigletError>;

impl RigletError {
    /// Whether this failure leaves previously confirmed remote state
    /// unverifiable (the command may or may not have been applied).
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            RigletError::Connection(_) | RigletError::Timeout { .. } | RigletError::Io(_)
        )
    }
}

impl From<serde_json::Error> for RigletError {
    fn from(err: serde_json::Error) -> Self {
        RigletError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for RigletError {
    fn from(err: toml::de::Error) -> Self {
        RigletError::Config(err.to_string())
    }
}
