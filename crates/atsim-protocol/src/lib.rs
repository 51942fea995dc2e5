//! AT Command Wire Protocol
//!
//! This crate provides the wire-level building blocks of a Hayes / 3GPP TS 27.007
//! style modem command interface. It knows nothing about modem state; it only
//! frames bytes into lines, splits lines into sub-commands and renders result
//! codes.
//!
//! # Protocol Overview
//!
//! - **Requests** (host → modem): ASCII lines beginning with `AT`, terminated
//!   with `\r` and/or `\n`. Several sub-commands may share a line, separated
//!   by `;` (e.g. `ATE0;+CMGF=1`).
//! - **Responses** (modem → host): information text framed as `\r\n<text>\r\n`
//!   (verbose) or `<text>\r\n`, followed by a terminal result code such as
//!   `OK`, `ERROR` or `+CMS ERROR: 305`.
//! - **Body capture**: message submission commands answer with the prompt
//!   `> ` and then read raw bytes until `0x1A` (Ctrl-Z).
//!
//! # Command Types
//!
//! Each sub-command is one of:
//!
//! - **Execute**: `ATI`, `AT+CSQ`
//! - **Read**: `AT+CMGF?`
//! - **Set**: `AT+CMGF=1`
//! - **Test**: `AT+CMGF=?`
//!
//! # Example
//!
//! ```rust
//! use atsim_protocol::{CommandLine, LineFramer, OperationType};
//!
//! let mut framer = LineFramer::new();
//! let lines: Vec<String> = framer.feed(b"AT+CMGF=1;+CSQ\r").collect();
//!
//! let line = CommandLine::parse(&lines[0]).unwrap();
//! assert_eq!(line.commands()[0].identifier(), "+CMGF");
//! assert_eq!(line.commands()[0].operation(), OperationType::Set);
//! ```

mod codec;
mod commands;
mod error;
mod responses;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use responses::*;
