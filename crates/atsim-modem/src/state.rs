//! Device state of an emulated modem.
//!
//! One [`DeviceState`] exists per session. It is created from a
//! [`ModemConfig`] and mutated only by command handlers.

use std::collections::BTreeMap;

use atsim_protocol::{CommandError, CommandResult, FormatFlags, ResultCodeFormat};
use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};

use crate::config::{ModemConfig, SimInfo, UssdService};

/// Number of S-registers.
pub const S_REGISTER_COUNT: usize = 32;

/// Power-on values of the S-registers (V.250 defaults where defined).
pub const DEFAULT_S_REGISTERS: [u8; S_REGISTER_COUNT] = {
    let mut regs = [0u8; S_REGISTER_COUNT];
    regs[2] = 43; // escape character '+'
    regs[3] = 13; // command line termination
    regs[4] = 10; // response formatting
    regs[5] = 8; // command line editing
    regs[6] = 2; // pause before blind dialling
    regs[7] = 50; // connection completion timeout
    regs[8] = 2; // comma dial modifier time
    regs[10] = 14; // automatic disconnect delay
    regs
};

/// SMS message format (`+CMGF`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmsMode {
    /// PDU mode (`0`).
    Pdu = 0,
    /// Text mode (`1`).
    Text = 1,
}

impl SmsMode {
    /// Parse the `+CMGF` parameter.
    pub fn from_param(value: &str) -> Option<SmsMode> {
        match value.trim() {
            "0" => Some(SmsMode::Pdu),
            "1" => Some(SmsMode::Text),
            _ => None,
        }
    }
}

/// IP connection status (`+CIPSTATUS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpStatus {
    /// No connection.
    Initial,
    /// Connection established.
    Connected,
}

impl IpStatus {
    /// Text reported by `+CIPSTATUS`.
    pub fn as_str(&self) -> &'static str {
        match self {
            IpStatus::Initial => "IP INITIAL",
            IpStatus::Connected => "CONNECT OK",
        }
    }
}

/// Storage status of a message (27.005 `<stat>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmsStatus {
    /// Received, not yet read.
    RecUnread,
    /// Received and read.
    RecRead,
    /// Stored, not sent.
    StoUnsent,
    /// Stored and sent.
    StoSent,
}

impl SmsStatus {
    /// Text mode representation.
    pub fn as_text(&self) -> &'static str {
        match self {
            SmsStatus::RecUnread => "REC UNREAD",
            SmsStatus::RecRead => "REC READ",
            SmsStatus::StoUnsent => "STO UNSENT",
            SmsStatus::StoSent => "STO SENT",
        }
    }

    /// PDU mode representation.
    pub fn as_code(&self) -> u8 {
        match self {
            SmsStatus::RecUnread => 0,
            SmsStatus::RecRead => 1,
            SmsStatus::StoUnsent => 2,
            SmsStatus::StoSent => 3,
        }
    }
}

/// A stored message.
#[derive(Debug, Clone, PartialEq)]
pub struct SmsMessage {
    /// Storage index (1-based, stable across deletes).
    pub index: u16,
    /// Storage status.
    pub status: SmsStatus,
    /// Sender for received messages, recipient for sent ones.
    pub address: String,
    /// Service centre timestamp.
    pub timestamp: DateTime<FixedOffset>,
    /// Message text (or raw PDU in PDU mode).
    pub body: String,
}

impl SmsMessage {
    /// Timestamp in 27.005 `"yy/MM/dd,hh:mm:ss±zz"` form (zone in quarter hours).
    pub fn scts(&self) -> String {
        let quarters = self.timestamp.offset().local_minus_utc() / 900;
        format!("{}{:+03}", self.timestamp.format("%y/%m/%d,%H:%M:%S"), quarters)
    }
}

/// An ordered message store with stable indices.
#[derive(Debug, Clone, Default)]
pub struct SmsStore {
    messages: Vec<SmsMessage>,
    last_index: u16,
}

impl SmsStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, returning its index.
    pub fn push(
        &mut self,
        status: SmsStatus,
        address: impl Into<String>,
        timestamp: DateTime<FixedOffset>,
        body: impl Into<String>,
    ) -> u16 {
        self.last_index = self.last_index.wrapping_add(1).max(1);
        self.messages.push(SmsMessage {
            index: self.last_index,
            status,
            address: address.into(),
            timestamp,
            body: body.into(),
        });
        self.last_index
    }

    /// Look up a message by index.
    pub fn get(&self, index: u16) -> Option<&SmsMessage> {
        self.messages.iter().find(|m| m.index == index)
    }

    /// Look up a message by index for modification.
    pub fn get_mut(&mut self, index: u16) -> Option<&mut SmsMessage> {
        self.messages.iter_mut().find(|m| m.index == index)
    }

    /// Delete a message. Returns whether it existed.
    pub fn remove(&mut self, index: u16) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.index != index);
        self.messages.len() != before
    }

    /// Keep only messages for which `keep` returns true.
    pub fn retain(&mut self, keep: impl FnMut(&SmsMessage) -> bool) {
        self.messages.retain(keep);
    }

    /// Messages in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &SmsMessage> {
        self.messages.iter()
    }

    /// Messages in storage order, mutable.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SmsMessage> {
        self.messages.iter_mut()
    }

    /// Number of stored messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Simulated network facts.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkState {
    /// Operator name.
    pub operator_name: String,
    /// Access technology (`<AcT>`).
    pub access_technology: u8,
    /// `+COPS` selection mode.
    pub selection_mode: u8,
    /// `+CREG` status.
    pub registration_status: u8,
    /// `+CREG` unsolicited report mode.
    pub registration_report_mode: u8,
    /// `+CSQ` RSSI.
    pub signal_strength: u8,
    /// GPRS attach state.
    pub gprs_attached: bool,
    /// IP connection status.
    pub ip_status: IpStatus,
}

/// Settings restored by `ATZ` / `AT&F`.
#[derive(Debug, Clone, Copy)]
struct Profile {
    flags: FormatFlags,
}

/// The mutable model of one emulated modem.
#[derive(Debug, Clone)]
pub struct DeviceState {
    /// Echo received lines.
    pub echo: bool,
    /// Verbose response framing.
    pub verbose: bool,
    /// Suppress result codes.
    pub quiet: bool,
    /// Result code format.
    pub result_code_format: ResultCodeFormat,
    /// SMS message format.
    pub sms_mode: SmsMode,
    /// `+CUSD` presentation mode.
    pub ussd_mode: u8,
    /// Simulated network.
    pub network: NetworkState,
    s_registers: [u8; S_REGISTER_COUNT],
    current_register: usize,
    next_message_reference: u8,
    product_code: u16,
    sim: SimInfo,
    ussd_codes: BTreeMap<String, UssdService>,
    inbox: SmsStore,
    outbox: SmsStore,
    profile: Profile,
}

impl DeviceState {
    /// Build the initial state from a configuration.
    pub fn from_config(config: &ModemConfig) -> Self {
        let mut inbox = SmsStore::new();
        for msg in &config.inbox {
            inbox.push(msg.status, msg.sender.clone(), msg.timestamp, msg.body.clone());
        }

        let flags = FormatFlags {
            echo: config.echo,
            verbose: config.verbose,
            quiet: config.quiet,
            result_code_format: config.result_code_format,
        };

        DeviceState {
            echo: flags.echo,
            verbose: flags.verbose,
            quiet: flags.quiet,
            result_code_format: flags.result_code_format,
            sms_mode: config.sms_mode,
            ussd_mode: 0,
            network: NetworkState {
                operator_name: config.network.operator_name.clone(),
                access_technology: config.network.access_technology,
                selection_mode: 0,
                registration_status: config.network.registration_status,
                registration_report_mode: 0,
                signal_strength: config.network.signal_strength,
                gprs_attached: config.network.gprs_attached,
                ip_status: IpStatus::Initial,
            },
            s_registers: DEFAULT_S_REGISTERS,
            current_register: 0,
            next_message_reference: 1,
            product_code: config.product_code,
            sim: config.sim.clone(),
            ussd_codes: config.ussd_codes.clone(),
            inbox,
            outbox: SmsStore::new(),
            profile: Profile { flags },
        }
    }

    /// Flags the response formatter renders with.
    pub fn format_flags(&self) -> FormatFlags {
        FormatFlags {
            echo: self.echo,
            verbose: self.verbose,
            quiet: self.quiet,
            result_code_format: self.result_code_format,
        }
    }

    /// Restore the configured echo/verbose/quiet/format flags and the
    /// S-registers. Message stores and network facts are untouched.
    pub fn restore_profile(&mut self) {
        let flags = self.profile.flags;
        self.echo = flags.echo;
        self.verbose = flags.verbose;
        self.quiet = flags.quiet;
        self.result_code_format = flags.result_code_format;
        self.s_registers = DEFAULT_S_REGISTERS;
        self.current_register = 0;
    }

    // ========================================================================
    // S-registers
    // ========================================================================

    fn check_register(index: usize) -> CommandResult<usize> {
        if index < S_REGISTER_COUNT {
            Ok(index)
        } else {
            Err(CommandError::InvalidArgument(format!(
                "S-register {} out of range 0-{}",
                index,
                S_REGISTER_COUNT - 1
            )))
        }
    }

    /// The register addressed by bare `Sn`.
    pub fn current_register(&self) -> usize {
        self.current_register
    }

    /// Address register `index`.
    pub fn select_register(&mut self, index: usize) -> CommandResult<()> {
        self.current_register = Self::check_register(index)?;
        Ok(())
    }

    /// Read register `index`.
    pub fn s_register(&self, index: usize) -> CommandResult<u8> {
        Ok(self.s_registers[Self::check_register(index)?])
    }

    /// Write register `index`. Values above 255 are rejected and leave the
    /// state unchanged.
    pub fn set_s_register(&mut self, index: usize, value: u32) -> CommandResult<()> {
        let index = Self::check_register(index)?;
        let value = u8::try_from(value).map_err(|_| {
            CommandError::InvalidArgument(format!("S-register value {} out of range 0-255", value))
        })?;
        self.s_registers[index] = value;
        Ok(())
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Equipment and SIM identity.
    pub fn sim(&self) -> &SimInfo {
        &self.sim
    }

    /// Product code reported by `ATI`.
    pub fn product_code(&self) -> u16 {
        self.product_code
    }

    /// Canned reply for a USSD code, if recognized.
    pub fn ussd_reply(&self, code: &str) -> Option<String> {
        self.ussd_codes.get(code).map(|service| service.reply(&self.sim))
    }

    // ========================================================================
    // SMS
    // ========================================================================

    /// Received messages.
    pub fn inbox(&self) -> &SmsStore {
        &self.inbox
    }

    /// Received messages, mutable.
    pub fn inbox_mut(&mut self) -> &mut SmsStore {
        &mut self.inbox
    }

    /// Sent messages.
    pub fn outbox(&self) -> &SmsStore {
        &self.outbox
    }

    /// Reference the next submitted message will get.
    pub fn peek_message_reference(&self) -> u8 {
        self.next_message_reference
    }

    /// Store a sent message and assign its reference (1-255, never 0).
    pub fn submit_message(&mut self, recipient: &str, body: &str) -> u8 {
        let reference = self.next_message_reference;
        self.next_message_reference = match reference {
            u8::MAX => 1,
            n => n + 1,
        };
        self.outbox.push(
            SmsStatus::StoSent,
            recipient,
            Local::now().fixed_offset(),
            body,
        );
        reference
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::from_config(&ModemConfig::default())
    }
}
