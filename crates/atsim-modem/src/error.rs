//! Error types for modem sessions and configuration.

use thiserror::Error;

/// Errors that end or refuse session processing.
///
/// Command-level failures never show up here; they are reported to the host
/// as result codes.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport failed while reading or writing.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The session was shut down and accepts no more input.
    #[error("session is closed")]
    Closed,
}

/// Invalid modem configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Signal strength outside `0..=31` and not the "unknown" value 99.
    #[error("signal strength {0} is not in 0-31 or 99")]
    InvalidSignalStrength(u8),

    /// Registration status outside `0..=5`.
    #[error("registration status {0} is not in 0-5")]
    InvalidRegistrationStatus(u8),

    /// A USSD code that is not a `*...#` dial string.
    #[error("invalid USSD code {0:?}")]
    InvalidUssdCode(String),

    /// An identity field that must be all digits.
    #[error("{field} must be numeric, got {value:?}")]
    NonNumericIdentity {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
}
