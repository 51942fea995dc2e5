//! Emulated cellular modem.
//!
//! This crate models a Hayes / 3GPP TS 27.007 modem behind a byte
//! [`Transport`]: device state (flags, S-registers, SIM and network facts,
//! message stores), the command handlers, and the [`ModemSession`] that ties
//! framing, dispatch, response formatting and message body capture together.
//!
//! # Example
//!
//! ```rust
//! use atsim_modem::{MemoryTransport, ModemConfig, ModemSession};
//!
//! let mut session = ModemSession::new("modem-0", MemoryTransport::new(), &ModemConfig::default());
//! session.feed_inbound_bytes(b"ATE0\rAT+CSQ\r").unwrap();
//!
//! let output = session.transport().output_str();
//! assert!(output.ends_with("\r\n+CSQ: 15,99\r\n\r\nOK\r\n"));
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod input;
pub mod registry;
pub mod session;
pub mod state;
pub mod transport;

pub use config::{InboxMessage, ModemConfig, NetworkConfig, SimInfo, UssdService};
pub use error::{ConfigError, SessionError};
pub use input::{InputState, PendingSubmission, TwoPhaseInput};
pub use registry::{CommandRegistry, Handler, Reply, Submission};
pub use session::{ModemSession, SessionEnd, SessionStats};
pub use state::{DeviceState, IpStatus, NetworkState, SmsMessage, SmsMode, SmsStatus, SmsStore};
pub use transport::{MemoryTransport, Transport};
