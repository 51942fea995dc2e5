//! Modem configuration.
//!
//! A [`ModemConfig`] describes the initial device state of one emulated
//! modem. Every field has a default so partial YAML documents work:
//!
//! ```yaml
//! echo: false
//! sim:
//!   manufacturer: Quectel
//!   phone_number: "+15551230000"
//! network:
//!   operator_name: TestNet
//!   signal_strength: 22
//! ussd_codes:
//!   "*100#": balance
//!   "*555#": !message Promo active
//! ```

use std::collections::BTreeMap;

use atsim_protocol::ResultCodeFormat;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::state::{SmsMode, SmsStatus};

/// Identity of the emulated equipment and SIM. Fixed for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimInfo {
    /// Manufacturer (`+CGMI`, `ATI3`).
    pub manufacturer: String,
    /// Model (`+CGMM`, `ATI4`).
    pub model: String,
    /// Firmware revision (`+CGMR`, `ATI5`).
    pub revision: String,
    /// IMEI (`+CGSN`).
    pub imei: String,
    /// IMSI (`+CIMI`).
    pub imsi: String,
    /// ICCID (`+CCID`).
    pub iccid: String,
    /// Subscriber number (`+CNUM`).
    pub phone_number: String,
    /// Prepaid balance reported by balance USSD codes.
    pub balance: f64,
    /// Currency of `balance`.
    pub currency: String,
    /// Remaining minutes reported by minutes USSD codes.
    pub minutes_remaining: u32,
}

impl Default for SimInfo {
    fn default() -> Self {
        SimInfo {
            manufacturer: "Generic".to_string(),
            model: "Modem 1.0".to_string(),
            revision: "1.0.0".to_string(),
            imei: "123456789012345".to_string(),
            imsi: "310150123456789".to_string(),
            iccid: "89014103211118510720".to_string(),
            phone_number: "+15551234567".to_string(),
            balance: 10.0,
            currency: "USD".to_string(),
            minutes_remaining: 120,
        }
    }
}

/// Initial simulated network facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Operator name reported by `+COPS?`.
    pub operator_name: String,
    /// Access technology reported by `+COPS?` (27.007 `<AcT>`).
    pub access_technology: u8,
    /// `+CREG` status (0 not registered, 1 home, 5 roaming, ...).
    pub registration_status: u8,
    /// RSSI reported by `+CSQ` (0-31, 99 unknown).
    pub signal_strength: u8,
    /// Initial GPRS attach state.
    pub gprs_attached: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            operator_name: "Mobilis".to_string(),
            access_technology: 6,
            registration_status: 1,
            signal_strength: 15,
            gprs_attached: false,
        }
    }
}

/// A message preloaded into the inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxMessage {
    /// Storage status, normally `rec_unread`.
    #[serde(default = "default_inbox_status")]
    pub status: SmsStatus,
    /// Originating address.
    pub sender: String,
    /// Service centre timestamp (RFC 3339 in YAML).
    #[serde(default = "default_timestamp")]
    pub timestamp: DateTime<FixedOffset>,
    /// Message text.
    pub body: String,
}

fn default_inbox_status() -> SmsStatus {
    SmsStatus::RecUnread
}

fn default_timestamp() -> DateTime<FixedOffset> {
    // 2021-09-01 12:34:56 UTC
    DateTime::<Utc>::from_timestamp(1_630_499_696, 0)
        .unwrap_or_default()
        .fixed_offset()
}

/// Canned reply for a USSD code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UssdService {
    /// "Your balance is ..." from [`SimInfo::balance`].
    Balance,
    /// "You have N minutes remaining" from [`SimInfo::minutes_remaining`].
    Minutes,
    /// Fixed text.
    Message(String),
}

impl UssdService {
    /// Render the reply text for `sim`.
    pub fn reply(&self, sim: &SimInfo) -> String {
        match self {
            UssdService::Balance => {
                format!("Your balance is {:.2} {}", sim.balance, sim.currency)
            }
            UssdService::Minutes => {
                format!("You have {} minutes remaining", sim.minutes_remaining)
            }
            UssdService::Message(text) => text.clone(),
        }
    }
}

fn default_ussd_codes() -> BTreeMap<String, UssdService> {
    let mut codes = BTreeMap::new();
    codes.insert("*100#".to_string(), UssdService::Balance);
    codes.insert("*200#".to_string(), UssdService::Balance);
    codes.insert("*300#".to_string(), UssdService::Minutes);
    codes
}

/// Configuration of one emulated modem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Echo received lines (`ATE`).
    pub echo: bool,
    /// Verbose framing (`ATV`).
    pub verbose: bool,
    /// Suppress result codes (`ATQ`).
    pub quiet: bool,
    /// Result code format (`ATV`).
    pub result_code_format: ResultCodeFormat,
    /// SMS message format (`+CMGF`).
    pub sms_mode: SmsMode,
    /// Product code reported by `ATI`.
    pub product_code: u16,
    /// Equipment and SIM identity.
    pub sim: SimInfo,
    /// Network facts.
    pub network: NetworkConfig,
    /// Preloaded inbox.
    pub inbox: Vec<InboxMessage>,
    /// Recognized USSD codes.
    pub ussd_codes: BTreeMap<String, UssdService>,
}

impl Default for ModemConfig {
    fn default() -> Self {
        ModemConfig {
            echo: true,
            verbose: true,
            quiet: false,
            result_code_format: ResultCodeFormat::Verbose,
            sms_mode: SmsMode::Text,
            product_code: 247,
            sim: SimInfo::default(),
            network: NetworkConfig::default(),
            inbox: vec![InboxMessage {
                status: SmsStatus::RecUnread,
                sender: "1234567890".to_string(),
                timestamp: default_timestamp(),
                body: "Hello, World!".to_string(),
            }],
            ussd_codes: default_ussd_codes(),
        }
    }
}

impl ModemConfig {
    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rssi = self.network.signal_strength;
        if rssi > 31 && rssi != 99 {
            return Err(ConfigError::InvalidSignalStrength(rssi));
        }
        if self.network.registration_status > 5 {
            return Err(ConfigError::InvalidRegistrationStatus(
                self.network.registration_status,
            ));
        }
        for (field, value) in [
            ("imei", &self.sim.imei),
            ("imsi", &self.sim.imsi),
            ("iccid", &self.sim.iccid),
        ] {
            if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
                return Err(ConfigError::NonNumericIdentity {
                    field,
                    value: value.clone(),
                });
            }
        }
        for code in self.ussd_codes.keys() {
            if !crate::handlers::ussd::is_ussd_code(code) {
                return Err(ConfigError::InvalidUssdCode(code.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(ModemConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
echo: false
sms_mode: pdu
sim:
  manufacturer: Quectel
network:
  signal_strength: 22
ussd_codes:
  "*555#": !message Promo active
inbox:
  - sender: "+4912345"
    body: Hi
"#;
        let config: ModemConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.echo);
        assert_eq!(config.sms_mode, SmsMode::Pdu);
        assert_eq!(config.sim.manufacturer, "Quectel");
        assert_eq!(config.sim.model, "Modem 1.0");
        assert_eq!(config.network.signal_strength, 22);
        assert_eq!(config.inbox[0].status, SmsStatus::RecUnread);
        assert_eq!(
            config.ussd_codes.get("*555#"),
            Some(&UssdService::Message("Promo active".to_string()))
        );
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ModemConfig::default();
        config.network.signal_strength = 40;
        assert_eq!(config.validate(), Err(ConfigError::InvalidSignalStrength(40)));

        let mut config = ModemConfig::default();
        config.ussd_codes.insert("100".to_string(), UssdService::Balance);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUssdCode(_))));

        let mut config = ModemConfig::default();
        config.sim.imsi = "abc".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonNumericIdentity { field: "imsi", .. })
        ));
    }

    #[test]
    fn test_ussd_replies() {
        let sim = SimInfo::default();
        assert_eq!(UssdService::Balance.reply(&sim), "Your balance is 10.00 USD");
        assert_eq!(UssdService::Minutes.reply(&sim), "You have 120 minutes remaining");
    }
}
