//! Error types for convertd

use std::path::PathBuf;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// convertd error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration value out of range or inconsistent
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Event socket could not be created, bound or listened on
    #[error("Failed to bind event socket {path}: {source}")]
    Bind {
        /// Socket path that was being bound
        path: PathBuf,
        /// Underlying OS error
        source: std::io::Error,
    },

    /// Accept thread failed to spawn or never reported running
    #[error("Event bus accept thread: {0}")]
    AcceptThread(String),

    /// Malformed or oversized protocol message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Serialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Accelerometer could not be read
    #[error("Sensor {sensor}: {reason}")]
    Sensor {
        /// Sensor (IIO device) name
        sensor: String,
        /// What went wrong
        reason: String,
    },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
