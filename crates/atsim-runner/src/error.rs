//! Error types for the runner.

use std::path::PathBuf;

use atsim_modem::{ConfigError, SessionError};
use thiserror::Error;

/// Errors raised while loading configuration, serving modems or talking to one.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Reading a file or socket failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be parsed.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A modem configuration failed validation.
    #[error("modem {name}: {source}")]
    InvalidModem {
        /// Modem name.
        name: String,
        /// Validation error.
        #[source]
        source: ConfigError,
    },

    /// Two modems share a name.
    #[error("duplicate modem name {0:?}")]
    DuplicateName(String),

    /// Two modems request the same port.
    #[error("port {0} requested more than once")]
    DuplicatePort(u16),

    /// Sequential allocation ran past the last TCP port.
    #[error("no free port left after {0}")]
    NoFreePort(u16),

    /// A session ended with a transport failure.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// No final result code arrived in time.
    #[error("timed out waiting for a response")]
    Timeout,

    /// The modem closed the connection before a final result code.
    #[error("connection closed before a final result code")]
    ConnectionClosed,
}

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
