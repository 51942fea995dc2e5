//! Hosting layer for emulated AT modems.
//!
//! - [`config`]: YAML runner configuration (modems, ports, bind address)
//! - [`serial_server`]: one TCP "virtual serial port" per modem
//! - [`client`]: host side used by `atsim send` and the tests

pub mod client;
pub mod config;
pub mod error;
pub mod serial_server;

pub use client::{send_commands, AtClient, Exchange};
pub use config::{ModemEntry, RunnerConfig};
pub use error::{Result, RunnerError};
pub use serial_server::{ChannelTransport, ModemInfo, SerialServer};
