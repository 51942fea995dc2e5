//! Network registration, signal quality, packet attach and IP commands.

use atsim_protocol::{CommandError, CommandResult, OperationType, SubCommand};

use super::{parse_args, parse_param, payload};
use crate::registry::{CommandRegistry, Reply};
use crate::state::{DeviceState, IpStatus};

use OperationType::{Execute, Read, Set, Test};

pub(crate) fn register(registry: &mut CommandRegistry) {
    registry.register("+CSQ", &[Execute], signal_quality);
    registry.register("+CSQ", &[Test], signal_quality_range);

    registry.register("+CREG", &[Read], registration_status);
    registry.register("+CREG", &[Set], set_registration_report_mode);
    registry.register("+CREG", &[Test], registration_report_modes);

    registry.register("+COPS", &[Read], operator);
    registry.register("+COPS", &[Set], select_operator);
    registry.register("+COPS", &[Test], available_operators);

    registry.register("+CGATT", &[Read], gprs_attach_state);
    registry.register("+CGATT", &[Set], set_gprs_attach);
    registry.register("+CGATT", &[Test], gprs_attach_states);

    registry.register("+CIPSTATUS", &[Execute], ip_status);
    registry.register("+CIPSTART", &[Set], ip_start);
    registry.register("+CIPCLOSE", &[Execute, Set], ip_close);
}

fn signal_quality(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::text(format!("+CSQ: {},99", state.network.signal_strength)))
}

fn signal_quality_range(_: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::text("+CSQ: (0-31,99),(0-7,99)"))
}

fn registration_status(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::text(format!(
        "+CREG: {},{}",
        state.network.registration_report_mode, state.network.registration_status
    )))
}

fn set_registration_report_mode(
    state: &mut DeviceState,
    cmd: &SubCommand,
) -> CommandResult<Reply> {
    let mode = parse_param(payload(cmd)?, 2)?;
    state.network.registration_report_mode = mode as u8;
    Ok(Reply::ok())
}

fn registration_report_modes(_: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::text("+CREG: (0-2)"))
}

fn is_registered(state: &DeviceState) -> bool {
    matches!(state.network.registration_status, 1 | 5)
}

fn operator(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    let net = &state.network;
    if !is_registered(state) {
        return Ok(Reply::text(format!("+COPS: {}", net.selection_mode)));
    }
    Ok(Reply::text(format!(
        "+COPS: {},0,\"{}\",{}",
        net.selection_mode, net.operator_name, net.access_technology
    )))
}

/// `+COPS=<mode>[,<format>[,<oper>[,<AcT>]]]`
fn select_operator(state: &mut DeviceState, cmd: &SubCommand) -> CommandResult<Reply> {
    let args = parse_args(payload(cmd)?);
    let mode = parse_param(&args[0], 4)?;
    if let Some(format) = args.get(1).filter(|f| !f.is_empty()) {
        parse_param(format, 2)?;
    }

    match mode {
        0 | 1 | 4 => {
            if let Some(name) = args.get(2).filter(|n| !n.is_empty()) {
                state.network.operator_name = name.clone();
            }
            state.network.registration_status = 1;
            state.network.selection_mode = if mode == 4 { 1 } else { mode as u8 };
        }
        2 => {
            state.network.registration_status = 0;
            state.network.selection_mode = 2;
            state.network.gprs_attached = false;
            state.network.ip_status = IpStatus::Initial;
        }
        // 3 only changes the reported format
        _ => {}
    }
    Ok(Reply::ok())
}

fn available_operators(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    let net = &state.network;
    let numeric: String = state.sim().imsi.chars().take(5).collect();
    let stat = if is_registered(state) { 2 } else { 1 };
    Ok(Reply::text(format!(
        "+COPS: ({},\"{}\",\"{}\",\"{}\",{}),,(0-4),(0-2)",
        stat, net.operator_name, net.operator_name, numeric, net.access_technology
    )))
}

fn gprs_attach_state(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::text(format!(
        "+CGATT: {}",
        u8::from(state.network.gprs_attached)
    )))
}

fn set_gprs_attach(state: &mut DeviceState, cmd: &SubCommand) -> CommandResult<Reply> {
    let attach = parse_param(payload(cmd)?, 1)? == 1;
    state.network.gprs_attached = attach;
    if !attach {
        state.network.ip_status = IpStatus::Initial;
    }
    Ok(Reply::ok())
}

fn gprs_attach_states(_: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::text("+CGATT: (0,1)"))
}

fn ip_status(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::text(format!("STATE: {}", state.network.ip_status.as_str())))
}

/// `+CIPSTART="<mode>","<address>",<port>`
fn ip_start(state: &mut DeviceState, cmd: &SubCommand) -> CommandResult<Reply> {
    let args = parse_args(payload(cmd)?);
    if args.len() < 3 || args.iter().any(|a| a.is_empty()) {
        return Err(CommandError::InvalidArgument(
            "+CIPSTART needs mode, address and port".to_string(),
        ));
    }
    if !state.network.gprs_attached || state.network.ip_status == IpStatus::Connected {
        return Err(CommandError::InvalidArgument(
            "+CIPSTART needs an attached, idle bearer".to_string(),
        ));
    }
    state.network.ip_status = IpStatus::Connected;
    Ok(Reply::text("CONNECT OK"))
}

fn ip_close(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    if state.network.ip_status != IpStatus::Connected {
        return Err(CommandError::InvalidArgument("no open connection".to_string()));
    }
    state.network.ip_status = IpStatus::Initial;
    Ok(Reply::text("CLOSE OK"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(state: &mut DeviceState, text: &str) -> CommandResult<Reply> {
        CommandRegistry::standard().dispatch(state, &SubCommand::parse(text))
    }

    #[test]
    fn test_network_queries() {
        let mut state = DeviceState::default();
        assert_eq!(run(&mut state, "+CSQ"), Ok(Reply::text("+CSQ: 15,99")));
        assert_eq!(run(&mut state, "+CREG?"), Ok(Reply::text("+CREG: 0,1")));
        assert_eq!(
            run(&mut state, "+COPS?"),
            Ok(Reply::text("+COPS: 0,0,\"Mobilis\",6"))
        );
    }

    #[test]
    fn test_cgatt_round_trip() {
        let mut state = DeviceState::default();
        run(&mut state, "+CGATT=1").unwrap();
        assert_eq!(run(&mut state, "+CGATT?"), Ok(Reply::text("+CGATT: 1")));
        run(&mut state, "+CGATT=0").unwrap();
        assert_eq!(run(&mut state, "+CGATT?"), Ok(Reply::text("+CGATT: 0")));
        assert!(matches!(
            run(&mut state, "+CGATT=2"),
            Err(CommandError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_cgatt_independent_of_registration() {
        let mut state = DeviceState::default();
        state.network.registration_status = 2;
        assert_eq!(run(&mut state, "+CGATT=1"), Ok(Reply::ok()));
        assert_eq!(run(&mut state, "+CGATT?"), Ok(Reply::text("+CGATT: 1")));
    }

    #[test]
    fn test_cops_deregister_and_rename() {
        let mut state = DeviceState::default();
        run(&mut state, "+COPS=2").unwrap();
        assert_eq!(run(&mut state, "+COPS?"), Ok(Reply::text("+COPS: 2")));
        assert_eq!(run(&mut state, "+CREG?"), Ok(Reply::text("+CREG: 0,0")));
        assert_eq!(run(&mut state, "+CGATT?"), Ok(Reply::text("+CGATT: 0")));

        run(&mut state, "+COPS=1,0,\"TestNet\"").unwrap();
        assert_eq!(
            run(&mut state, "+COPS?"),
            Ok(Reply::text("+COPS: 1,0,\"TestNet\",6"))
        );
        assert!(run(&mut state, "+COPS=7").is_err());
    }

    #[test]
    fn test_creg_report_mode() {
        let mut state = DeviceState::default();
        run(&mut state, "+CREG=2").unwrap();
        assert_eq!(run(&mut state, "+CREG?"), Ok(Reply::text("+CREG: 2,1")));
        assert!(run(&mut state, "+CREG=3").is_err());
    }

    #[test]
    fn test_ip_lifecycle() {
        let mut state = DeviceState::default();
        let start = "+CIPSTART=\"TCP\",\"example.com\",80";
        assert!(run(&mut state, start).is_err());
        assert!(run(&mut state, "+CIPCLOSE").is_err());

        run(&mut state, "+CGATT=1").unwrap();
        assert_eq!(run(&mut state, start), Ok(Reply::text("CONNECT OK")));
        assert_eq!(
            run(&mut state, "+CIPSTATUS"),
            Ok(Reply::text("STATE: CONNECT OK"))
        );
        assert_eq!(run(&mut state, "+CIPCLOSE"), Ok(Reply::text("CLOSE OK")));
        assert_eq!(
            run(&mut state, "+CIPSTATUS"),
            Ok(Reply::text("STATE: IP INITIAL"))
        );

        run(&mut state, start).unwrap();
        run(&mut state, "+CGATT=0").unwrap();
        assert_eq!(state.network.ip_status, IpStatus::Initial);
    }
}
