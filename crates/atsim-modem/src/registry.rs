//! Command registry and dispatch.
//!
//! Resolution is two-tier:
//! 1. an exact table keyed by canonical identifier and operation type
//! 2. an ordered list of structural matchers (S-registers, USSD dial strings),
//!    consulted only when the table has no entry

use std::collections::HashMap;

use atsim_protocol::{CommandError, CommandResult, OperationType, SubCommand};

use crate::state::DeviceState;

/// What a text-mode submission is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Submission {
    /// Destination address, when given as `+CMGS="<da>"`.
    pub recipient: Option<String>,
    /// Declared length, when given as `+CMGS=<len>`.
    pub declared_length: Option<usize>,
}

/// Successful handler outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Command finished, with optional information text.
    Done(Option<String>),
    /// Command accepted; the session must capture a message body before the
    /// command can finish.
    AwaitBody(Submission),
}

impl Reply {
    /// Finished without information text.
    pub fn ok() -> Reply {
        Reply::Done(None)
    }

    /// Finished with information text.
    pub fn text(text: impl Into<String>) -> Reply {
        Reply::Done(Some(text.into()))
    }
}

/// A command handler.
pub type Handler = fn(&mut DeviceState, &SubCommand) -> CommandResult<Reply>;

/// A structural matcher consulted after an exact-table miss.
#[derive(Clone)]
struct PatternEntry {
    name: &'static str,
    matches: fn(&str) -> bool,
    handler: Handler,
}

/// Maps sub-commands to handlers.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    exact: HashMap<(String, OperationType), Handler>,
    patterns: Vec<PatternEntry>,
}

impl CommandRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the full emulated command set.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        crate::handlers::register_all(&mut registry);
        registry
    }

    /// Register `handler` for `identifier` under each operation in `operations`.
    pub fn register(&mut self, identifier: &str, operations: &[OperationType], handler: Handler) {
        let identifier = identifier.to_ascii_uppercase();
        for &op in operations {
            self.exact.insert((identifier.clone(), op), handler);
        }
    }

    /// Append a structural matcher. Matchers are tried in registration order.
    pub fn register_pattern(
        &mut self,
        name: &'static str,
        matches: fn(&str) -> bool,
        handler: Handler,
    ) {
        self.patterns.push(PatternEntry {
            name,
            matches,
            handler,
        });
    }

    /// Find the handler for `cmd`.
    pub fn resolve(&self, cmd: &SubCommand) -> Option<Handler> {
        let key = (cmd.identifier().to_string(), cmd.operation());
        if let Some(handler) = self.exact.get(&key) {
            return Some(*handler);
        }
        self.patterns
            .iter()
            .find(|p| (p.matches)(cmd.identifier()))
            .map(|p| {
                tracing::trace!("{} matched pattern {}", cmd.identifier(), p.name);
                p.handler
            })
    }

    /// Resolve and run the handler for `cmd` against `state`.
    pub fn dispatch(&self, state: &mut DeviceState, cmd: &SubCommand) -> CommandResult<Reply> {
        match self.resolve(cmd) {
            Some(handler) => handler(state, cmd),
            None => Err(CommandError::Unknown(cmd.to_command_string())),
        }
    }

    /// Number of exact (identifier, operation) entries.
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    /// Check if the registry has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.patterns.is_empty()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("exact", &self.exact.len())
            .field(
                "patterns",
                &self.patterns.iter().map(|p| p.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(_: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
        Ok(Reply::text("exact"))
    }

    fn pattern(_: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
        Ok(Reply::text("pattern"))
    }

    fn starts_with_x(id: &str) -> bool {
        id.starts_with('X')
    }

    #[test]
    fn test_exact_match_wins_over_pattern() {
        let mut registry = CommandRegistry::new();
        registry.register("xa", &[OperationType::Execute], answer);
        registry.register_pattern("x", starts_with_x, pattern);
        let mut state = DeviceState::default();

        let reply = registry.dispatch(&mut state, &SubCommand::parse("XA")).unwrap();
        assert_eq!(reply, Reply::text("exact"));

        let reply = registry.dispatch(&mut state, &SubCommand::parse("XB")).unwrap();
        assert_eq!(reply, Reply::text("pattern"));
    }

    #[test]
    fn test_operation_is_part_of_key() {
        let mut registry = CommandRegistry::new();
        registry.register("+FOO", &[OperationType::Read], answer);
        let mut state = DeviceState::default();

        assert!(registry.dispatch(&mut state, &SubCommand::parse("+FOO?")).is_ok());
        assert!(matches!(
            registry.dispatch(&mut state, &SubCommand::parse("+FOO")),
            Err(CommandError::Unknown(_))
        ));
    }

    #[test]
    fn test_standard_registry_is_populated() {
        let registry = CommandRegistry::standard();
        assert!(!registry.is_empty());
        assert!(registry.resolve(&SubCommand::parse("+CSQ")).is_some());
        assert!(registry.resolve(&SubCommand::parse("S12?")).is_some());
        assert!(registry.resolve(&SubCommand::parse("*100#")).is_some());
        assert!(registry.resolve(&SubCommand::parse("+NOPE")).is_none());
    }
}
