//! Error types for the AT protocol.

use thiserror::Error;

/// Errors raised while interpreting a framed line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The line does not start with the `AT` prefix.
    #[error("not an AT command line: {0:?}")]
    NotAnATLine(String),
}

/// Extended error reports defined by 3GPP TS 27.005 / 27.007.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedError {
    /// SMS related failure (`+CMS ERROR: <n>`).
    Cms(u16),
    /// Mobile equipment failure (`+CME ERROR: <n>`).
    Cme(u16),
}

impl std::fmt::Display for ExtendedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtendedError::Cms(code) => write!(f, "+CMS ERROR: {}", code),
            ExtendedError::Cme(code) => write!(f, "+CME ERROR: {}", code),
        }
    }
}

/// CMS error: invalid PDU mode parameter.
pub const CMS_INVALID_PDU_PARAMETER: u16 = 304;
/// CMS error: invalid text mode parameter.
pub const CMS_INVALID_TEXT_PARAMETER: u16 = 305;
/// CMS error: invalid memory index.
pub const CMS_INVALID_MEMORY_INDEX: u16 = 321;

/// Errors produced by a single sub-command.
///
/// All of these are recoverable: they end processing of the current line and
/// are reported through the result-code channel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// No handler matches the identifier and operation.
    #[error("unknown command: {0}")]
    Unknown(String),

    /// The payload is malformed or out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Command specific extended failure.
    #[error("extended failure: {0}")]
    ExtendedFailure(ExtendedError),
}

/// Result type alias for command handlers.
pub type CommandResult<T> = Result<T, CommandError>;
