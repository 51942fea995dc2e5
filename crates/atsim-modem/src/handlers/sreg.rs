//! S-register access (`Sn`, `Sn?`, `Sn=v`, and `?`/`=v` on the current register).

use atsim_protocol::{CommandError, CommandResult, OperationType, SubCommand};

use super::payload;
use crate::registry::{CommandRegistry, Reply};
use crate::state::DeviceState;

pub(crate) fn register_pattern(registry: &mut CommandRegistry) {
    registry.register_pattern("s-register", is_register_reference, access_register);
}

/// `S<digits>`, or the empty identifier of `AT?` / `AT=v`.
pub fn is_register_reference(identifier: &str) -> bool {
    match identifier.strip_prefix('S') {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => identifier.is_empty(),
    }
}

fn register_index(state: &DeviceState, identifier: &str) -> CommandResult<usize> {
    match identifier.strip_prefix('S') {
        Some(digits) => digits.parse::<usize>().map_err(|_| {
            CommandError::InvalidArgument(format!("invalid S-register {:?}", identifier))
        }),
        None => Ok(state.current_register()),
    }
}

fn access_register(state: &mut DeviceState, cmd: &SubCommand) -> CommandResult<Reply> {
    let index = register_index(state, cmd.identifier())?;

    match cmd.operation() {
        OperationType::Execute => {
            state.select_register(index)?;
            Ok(Reply::ok())
        }
        OperationType::Read => {
            let value = state.s_register(index)?;
            state.select_register(index)?;
            Ok(Reply::text(format!("{:03}", value)))
        }
        OperationType::Set => {
            let raw = payload(cmd)?.trim();
            let value = raw.parse::<u32>().map_err(|_| {
                CommandError::InvalidArgument(format!("invalid S-register value {:?}", raw))
            })?;
            state.set_s_register(index, value)?;
            state.select_register(index)?;
            Ok(Reply::ok())
        }
        OperationType::Test => {
            state.s_register(index)?;
            Ok(Reply::text(format!("S{}: (0-255)", index)))
        }
    }
}
