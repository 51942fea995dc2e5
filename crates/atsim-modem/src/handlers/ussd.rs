//! USSD: `*...#` dial strings, `ATD*...#;` and `+CUSD`.

use atsim_protocol::{CommandError, CommandResult, OperationType, SubCommand};

use super::{parse_args, parse_param, payload};
use crate::registry::{CommandRegistry, Reply};
use crate::state::DeviceState;

use OperationType::{Read, Set, Test};

/// Data coding scheme reported with replies (GSM 7 bit, default language).
const USSD_DCS: u8 = 15;

pub(crate) fn register(registry: &mut CommandRegistry) {
    registry.register("+CUSD", &[Set], set_ussd);
    registry.register("+CUSD", &[Read], ussd_mode);
    registry.register("+CUSD", &[Test], ussd_modes);
}

pub(crate) fn register_pattern(registry: &mut CommandRegistry) {
    registry.register_pattern("ussd", is_dial_string, dial);
}

/// A USSD code: `*`, then digits and `*`, then a closing `#`.
pub fn is_ussd_code(code: &str) -> bool {
    code.len() >= 2
        && code.starts_with('*')
        && code.ends_with('#')
        && code[1..code.len() - 1]
            .bytes()
            .all(|b| b.is_ascii_digit() || b == b'*')
}

/// A USSD code, optionally dialled with `D`.
pub fn is_dial_string(identifier: &str) -> bool {
    is_ussd_code(identifier.strip_prefix('D').unwrap_or(identifier))
}

fn answer(state: &DeviceState, code: &str) -> CommandResult<Reply> {
    let text = state.ussd_reply(code).ok_or_else(|| {
        CommandError::InvalidArgument(format!("unrecognized USSD code {}", code))
    })?;
    Ok(Reply::text(format!("+CUSD: 0,\"{}\",{}", text, USSD_DCS)))
}

fn dial(state: &mut DeviceState, cmd: &SubCommand) -> CommandResult<Reply> {
    if cmd.operation() != OperationType::Execute {
        return Err(CommandError::Unknown(cmd.to_command_string()));
    }
    let id = cmd.identifier();
    answer(state, id.strip_prefix('D').unwrap_or(id))
}

/// `+CUSD=<n>[,"<str>"[,<dcs>]]`
fn set_ussd(state: &mut DeviceState, cmd: &SubCommand) -> CommandResult<Reply> {
    let args = parse_args(payload(cmd)?);
    let mode = parse_param(&args[0], 2)? as u8;
    if let Some(dcs) = args.get(2).filter(|d| !d.is_empty()) {
        parse_param(dcs, 255)?;
    }

    let reply = match args.get(1).filter(|s| !s.is_empty()) {
        Some(code) => answer(state, code)?,
        None => Reply::ok(),
    };
    state.ussd_mode = mode;
    Ok(reply)
}

fn ussd_mode(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::text(format!("+CUSD: {}", state.ussd_mode)))
}

fn ussd_modes(_: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::text("+CUSD: (0-2)"))
}
