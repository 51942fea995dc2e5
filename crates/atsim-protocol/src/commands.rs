//! Command line splitting and operation type disambiguation.
//!
//! A command line is the `AT` prefix followed by one or more sub-commands
//! separated by `;`:
//!
//! ```text
//! AT E0 ; +CMGF=1 ; +CMGF? ; +CMGF=?
//!    |      |         |        |
//!    |      |         |        +-- Test
//!    |      |         +----------- Read
//!    |      +--------------------- Set (payload "1")
//!    +---------------------------- Execute
//! ```

use crate::error::ProtocolError;

/// How a sub-command is being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    /// Bare action command (`ATI`, `AT+CSQ`).
    Execute,
    /// Query the current value (`AT+CMGF?`).
    Read,
    /// Assign a value (`AT+CMGF=1`).
    Set,
    /// Capability query (`AT+CMGF=?`).
    Test,
}

impl OperationType {
    /// Short lowercase name, used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Execute => "execute",
            OperationType::Read => "read",
            OperationType::Set => "set",
            OperationType::Test => "test",
        }
    }
}

/// A single sub-command of a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubCommand {
    identifier: String,
    operation: OperationType,
    payload: Option<String>,
}

impl SubCommand {
    /// Parse one sub-command (the text between `AT`/`;` separators).
    ///
    /// The identifier is canonicalized to uppercase; the payload of a SET is
    /// kept verbatim.
    pub fn parse(text: &str) -> SubCommand {
        let text = text.trim();

        if let Some(eq) = text.find('=') {
            let identifier = text[..eq].trim().to_ascii_uppercase();
            let rest = &text[eq + 1..];
            if rest.starts_with('?') {
                return SubCommand {
                    identifier,
                    operation: OperationType::Test,
                    payload: None,
                };
            }
            return SubCommand {
                identifier,
                operation: OperationType::Set,
                payload: Some(rest.to_string()),
            };
        }

        if let Some(stripped) = text.strip_suffix('?') {
            let identifier = match stripped.find('?') {
                Some(q) => &stripped[..q],
                None => stripped,
            };
            return SubCommand {
                identifier: identifier.trim().to_ascii_uppercase(),
                operation: OperationType::Read,
                payload: None,
            };
        }

        SubCommand {
            identifier: text.to_ascii_uppercase(),
            operation: OperationType::Execute,
            payload: None,
        }
    }

    /// Canonical (uppercase) identifier, e.g. `+CMGF`, `E0`, `S7`.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The operation type.
    pub fn operation(&self) -> OperationType {
        self.operation
    }

    /// Payload after `=` for SET operations.
    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// Rebuild the sub-command text (without the `AT` prefix).
    pub fn to_command_string(&self) -> String {
        match self.operation {
            OperationType::Execute => self.identifier.clone(),
            OperationType::Read => format!("{}?", self.identifier),
            OperationType::Test => format!("{}=?", self.identifier),
            OperationType::Set => {
                format!("{}={}", self.identifier, self.payload.as_deref().unwrap_or(""))
            }
        }
    }
}

/// A framed line split into its sub-commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    commands: Vec<SubCommand>,
}

impl CommandLine {
    /// Parse a framed line.
    ///
    /// Fails with [`ProtocolError::NotAnATLine`] unless the line starts with
    /// `AT` (any case). A bare `AT` yields one EXECUTE sub-command with an
    /// empty identifier.
    pub fn parse(line: &str) -> Result<CommandLine, ProtocolError> {
        let trimmed = line.trim();
        let has_prefix = trimmed
            .get(..2)
            .map(|p| p.eq_ignore_ascii_case("AT"))
            .unwrap_or(false);
        if !has_prefix {
            return Err(ProtocolError::NotAnATLine(line.to_string()));
        }

        let mut commands: Vec<SubCommand> = split_commands(&trimmed[2..])
            .iter()
            .map(|part| SubCommand::parse(part))
            .collect();
        if commands.is_empty() {
            commands.push(SubCommand::parse(""));
        }

        log::trace!("parsed {:?} into {} sub-command(s)", trimmed, commands.len());

        Ok(CommandLine { commands })
    }

    /// Sub-commands in execution order.
    pub fn commands(&self) -> &[SubCommand] {
        &self.commands
    }

    /// Consume the line, returning its sub-commands.
    pub fn into_commands(self) -> Vec<SubCommand> {
        self.commands
    }
}

/// Split on `;`, ignoring separators inside double quotes and dropping empty parts.
fn split_commands(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in text.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ';' if !in_quotes => {
                if !current.trim().is_empty() {
                    parts.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_types() {
        let cases = [
            ("+CMGF?", "+CMGF", OperationType::Read, None),
            ("+CMGF=?", "+CMGF", OperationType::Test, None),
            ("+CMGF=1", "+CMGF", OperationType::Set, Some("1")),
            ("I", "I", OperationType::Execute, None),
            ("e0", "E0", OperationType::Execute, None),
            ("s7?", "S7", OperationType::Read, None),
        ];
        for (text, id, op, payload) in cases {
            let cmd = SubCommand::parse(text);
            assert_eq!(cmd.identifier(), id, "{}", text);
            assert_eq!(cmd.operation(), op, "{}", text);
            assert_eq!(cmd.payload(), payload, "{}", text);
        }
    }

    #[test]
    fn test_set_payload_keeps_case() {
        let cmd = SubCommand::parse("+cops=0,0,\"MyNet\"");
        assert_eq!(cmd.identifier(), "+COPS");
        assert_eq!(cmd.payload(), Some("0,0,\"MyNet\""));
    }

    #[test]
    fn test_parse_multi_command_line() {
        let line = CommandLine::parse("ATE0;Q1").unwrap();
        let ids: Vec<&str> = line.commands().iter().map(|c| c.identifier()).collect();
        assert_eq!(ids, vec!["E0", "Q1"]);
    }

    #[test]
    fn test_bare_at() {
        let line = CommandLine::parse("at").unwrap();
        assert_eq!(line.commands().len(), 1);
        assert_eq!(line.commands()[0].identifier(), "");
        assert_eq!(line.commands()[0].operation(), OperationType::Execute);
    }

    #[test]
    fn test_not_an_at_line() {
        assert!(matches!(
            CommandLine::parse("HELLO"),
            Err(ProtocolError::NotAnATLine(_))
        ));
        assert!(CommandLine::parse("A").is_err());
    }

    #[test]
    fn test_quoted_semicolon_does_not_split() {
        let line = CommandLine::parse("AT+CUSD=1,\"*1;2#\";+CSQ").unwrap();
        assert_eq!(line.commands().len(), 2);
        assert_eq!(line.commands()[0].payload(), Some("1,\"*1;2#\""));
        assert_eq!(line.commands()[1].identifier(), "+CSQ");
    }

    #[test]
    fn test_trailing_separator_is_ignored() {
        let line = CommandLine::parse("ATD*100#;").unwrap();
        assert_eq!(line.commands().len(), 1);
        assert_eq!(line.commands()[0].identifier(), "D*100#");
    }

    #[test]
    fn test_to_command_string() {
        assert_eq!(SubCommand::parse("+cmgf=1").to_command_string(), "+CMGF=1");
        assert_eq!(SubCommand::parse("+creg?").to_command_string(), "+CREG?");
    }
}
