//! Command handlers, grouped by area.
//!
//! Every handler has the [`Handler`](crate::registry::Handler) signature and
//! is wired into the registry by [`register_all`].

pub mod basic;
pub mod network;
pub mod sms;
pub mod sreg;
pub mod ussd;

use atsim_protocol::{CommandError, CommandResult, SubCommand};

use crate::registry::CommandRegistry;

/// Register the complete emulated command set.
pub fn register_all(registry: &mut CommandRegistry) {
    basic::register(registry);
    network::register(registry);
    sms::register(registry);
    ussd::register(registry);
    // Structural matchers, in resolution order.
    sreg::register_pattern(registry);
    ussd::register_pattern(registry);
}

/// Split a SET payload on commas outside double quotes, unquoting each field.
pub(crate) fn parse_args(payload: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in payload.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    args.push(current.trim().to_string());

    args
}

/// The SET payload, or `InvalidArgument` if missing.
pub(crate) fn payload(cmd: &SubCommand) -> CommandResult<&str> {
    cmd.payload()
        .ok_or_else(|| CommandError::InvalidArgument(format!("{} needs a value", cmd.identifier())))
}

/// Parse an integer parameter within `0..=max`.
pub(crate) fn parse_param(value: &str, max: u32) -> CommandResult<u32> {
    value
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|v| *v <= max)
        .ok_or_else(|| CommandError::InvalidArgument(format!("{:?} not in 0-{}", value, max)))
}
