//! Runner configuration.
//!
//! ```yaml
//! bind_address: 127.0.0.1
//! base_port: 5000
//! modems:
//!   - name: quectel
//!     modem:
//!       sim:
//!         manufacturer: Quectel
//!   - name: roaming
//!     port: 6000
//!     modem:
//!       network:
//!         registration_status: 5
//! ```

use std::collections::HashSet;
use std::path::Path;

use atsim_modem::ModemConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RunnerError};

/// Default first port for sequential allocation.
pub const DEFAULT_BASE_PORT: u16 = 5000;

/// One emulated modem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModemEntry {
    /// Name used in logs, metrics and the port table.
    pub name: String,
    /// Fixed TCP port. Allocated from `base_port` when absent.
    #[serde(default)]
    pub port: Option<u16>,
    /// Initial device state.
    #[serde(default)]
    pub modem: ModemConfig,
}

impl ModemEntry {
    /// A default modem named `name` on an allocated port.
    pub fn named(name: impl Into<String>) -> Self {
        ModemEntry {
            name: name.into(),
            port: None,
            modem: ModemConfig::default(),
        }
    }
}

/// Top-level runner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Address the listeners bind to.
    pub bind_address: String,
    /// First port for sequential allocation.
    pub base_port: u16,
    /// Emulated modems.
    pub modems: Vec<ModemEntry>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            bind_address: "127.0.0.1".to_string(),
            base_port: DEFAULT_BASE_PORT,
            modems: vec![ModemEntry::named("modem-0")],
        }
    }
}

impl RunnerConfig {
    /// `count` default modems named `modem-0`, `modem-1`, ...
    pub fn with_count(count: usize) -> Self {
        RunnerConfig {
            modems: (0..count)
                .map(|i| ModemEntry::named(format!("modem-{}", i)))
                .collect(),
            ..Default::default()
        }
    }

    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Load and validate a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text).map_err(|source| RunnerError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every modem and reject duplicate names or ports.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        let mut ports = HashSet::new();

        for entry in &self.modems {
            if !names.insert(entry.name.as_str()) {
                return Err(RunnerError::DuplicateName(entry.name.clone()));
            }
            if let Some(port) = entry.port.filter(|p| *p != 0) {
                if !ports.insert(port) {
                    return Err(RunnerError::DuplicatePort(port));
                }
            }
            entry
                .modem
                .validate()
                .map_err(|source| RunnerError::InvalidModem {
                    name: entry.name.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.base_port, DEFAULT_BASE_PORT);
        assert_eq!(config.modems.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_count() {
        let config = RunnerConfig::with_count(3);
        let names: Vec<_> = config.modems.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["modem-0", "modem-1", "modem-2"]);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
base_port: 7000
modems:
  - name: a
  - name: b
    port: 7100
    modem:
      echo: false
      network:
        operator_name: TestNet
"#;
        let config = RunnerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.base_port, 7000);
        assert_eq!(config.modems[0].port, None);
        assert_eq!(config.modems[1].port, Some(7100));
        assert!(!config.modems[1].modem.echo);
        assert_eq!(config.modems[1].modem.network.operator_name, "TestNet");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let mut config = RunnerConfig::with_count(2);
        config.modems[1].name = "modem-0".to_string();
        assert!(matches!(config.validate(), Err(RunnerError::DuplicateName(_))));

        let mut config = RunnerConfig::with_count(2);
        config.modems[0].port = Some(6000);
        config.modems[1].port = Some(6000);
        assert!(matches!(config.validate(), Err(RunnerError::DuplicatePort(6000))));
    }

    #[test]
    fn test_validate_reports_modem_name() {
        let mut config = RunnerConfig::with_count(1);
        config.modems[0].modem.network.signal_strength = 50;
        match config.validate() {
            Err(RunnerError::InvalidModem { name, .. }) => assert_eq!(name, "modem-0"),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
