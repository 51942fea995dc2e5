//! V.250 basic commands and equipment identification.

use atsim_protocol::{CommandResult, OperationType, ResultCodeFormat, SubCommand};

use crate::registry::{CommandRegistry, Reply};
use crate::state::DeviceState;

use OperationType::{Execute, Test};

pub(crate) fn register(registry: &mut CommandRegistry) {
    registry.register("", &[Execute], at);

    registry.register("E", &[Execute], echo_off);
    registry.register("E0", &[Execute], echo_off);
    registry.register("E1", &[Execute], echo_on);
    registry.register("V", &[Execute], numeric_results);
    registry.register("V0", &[Execute], numeric_results);
    registry.register("V1", &[Execute], verbose_results);
    registry.register("Q", &[Execute], quiet_off);
    registry.register("Q0", &[Execute], quiet_off);
    registry.register("Q1", &[Execute], quiet_on);

    for id in ["Z", "Z0", "&F", "&F0"] {
        registry.register(id, &[Execute], reset);
    }

    registry.register("I", &[Execute], product_code);
    registry.register("I0", &[Execute], product_code);
    registry.register("I1", &[Execute], rom_checksum);
    registry.register("I2", &[Execute], rom_check);
    registry.register("I3", &[Execute], manufacturer);
    registry.register("I4", &[Execute], model);
    registry.register("I5", &[Execute], revision);

    registry.register("+CGMI", &[Execute], manufacturer);
    registry.register("+GMI", &[Execute], manufacturer);
    registry.register("+CGMM", &[Execute], model);
    registry.register("+GMM", &[Execute], model);
    registry.register("+CGMR", &[Execute], revision);
    registry.register("+GMR", &[Execute], revision);
    registry.register("+CGSN", &[Execute], imei);
    registry.register("+GSN", &[Execute], imei);
    registry.register("+CIMI", &[Execute], imsi);
    registry.register("+CCID", &[Execute], iccid);
    registry.register("+CNUM", &[Execute], subscriber_number);

    for id in [
        "+CGMI", "+GMI", "+CGMM", "+GMM", "+CGMR", "+GMR", "+CGSN", "+GSN", "+CIMI", "+CCID",
        "+CNUM",
    ] {
        registry.register(id, &[Test], supported);
    }
}

fn at(_: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::ok())
}

fn supported(_: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::ok())
}

fn echo_off(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    state.echo = false;
    Ok(Reply::ok())
}

fn echo_on(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    state.echo = true;
    Ok(Reply::ok())
}

fn numeric_results(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    state.verbose = false;
    state.result_code_format = ResultCodeFormat::Numeric;
    Ok(Reply::ok())
}

fn verbose_results(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    state.verbose = true;
    state.result_code_format = ResultCodeFormat::Verbose;
    Ok(Reply::ok())
}

fn quiet_off(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    state.quiet = false;
    Ok(Reply::ok())
}

fn quiet_on(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    state.quiet = true;
    Ok(Reply::ok())
}

fn reset(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    state.restore_profile();
    Ok(Reply::ok())
}

fn product_code(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::text(state.product_code().to_string()))
}

/// 16-bit sum over the identity strings, stable for a given configuration.
fn checksum(state: &DeviceState) -> u16 {
    let sim = state.sim();
    [&sim.manufacturer, &sim.model, &sim.revision]
        .into_iter()
        .flat_map(|s| s.bytes())
        .fold(0u16, |acc, b| acc.wrapping_add(u16::from(b)))
}

fn rom_checksum(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::text(checksum(state).to_string()))
}

fn rom_check(_: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    // 0 = ROM check passed
    Ok(Reply::text("0"))
}

fn manufacturer(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::text(state.sim().manufacturer.clone()))
}

fn model(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::text(state.sim().model.clone()))
}

fn revision(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::text(state.sim().revision.clone()))
}

fn imei(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::text(state.sim().imei.clone()))
}

fn imsi(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::text(state.sim().imsi.clone()))
}

fn iccid(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::text(state.sim().iccid.clone()))
}

fn subscriber_number(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    let number = &state.sim().phone_number;
    // 145 = international format, 129 = unknown
    let number_type = if number.starts_with('+') { 145 } else { 129 };
    Ok(Reply::text(format!("+CNUM: \"\",\"{}\",{}", number, number_type)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(state: &mut DeviceState, text: &str) -> CommandResult<Reply> {
        CommandRegistry::standard().dispatch(state, &SubCommand::parse(text))
    }

    #[test]
    fn test_mode_flags() {
        let mut state = DeviceState::default();
        run(&mut state, "E0").unwrap();
        run(&mut state, "Q1").unwrap();
        run(&mut state, "V0").unwrap();
        assert!(!state.echo);
        assert!(state.quiet);
        assert!(!state.verbose);
        assert_eq!(state.result_code_format, ResultCodeFormat::Numeric);

        run(&mut state, "E1").unwrap();
        run(&mut state, "Q").unwrap();
        run(&mut state, "V1").unwrap();
        assert!(state.echo);
        assert!(!state.quiet);
        assert!(state.verbose);
        assert_eq!(state.result_code_format, ResultCodeFormat::Verbose);
    }

    #[test]
    fn test_identity_aliases() {
        let mut state = DeviceState::default();
        assert_eq!(run(&mut state, "+CGMI"), run(&mut state, "I3"));
        assert_eq!(run(&mut state, "+CGMM"), run(&mut state, "I4"));
        assert_eq!(run(&mut state, "+CGMR"), run(&mut state, "I5"));
        assert_eq!(run(&mut state, "+GMI"), Ok(Reply::text("Generic")));
        assert_eq!(run(&mut state, "+CIMI"), Ok(Reply::text("310150123456789")));
        assert_eq!(run(&mut state, "+CGSN"), Ok(Reply::text("123456789012345")));
    }

    #[test]
    fn test_numeric_info_codes() {
        let mut state = DeviceState::default();
        assert_eq!(run(&mut state, "I"), Ok(Reply::text("247")));
        for id in ["I1", "I2"] {
            match run(&mut state, id).unwrap() {
                Reply::Done(Some(text)) => assert!(text.parse::<u32>().is_ok(), "{}", text),
                other => panic!("unexpected reply {:?}", other),
            }
        }
    }

    #[test]
    fn test_cnum() {
        let mut state = DeviceState::default();
        assert_eq!(
            run(&mut state, "+CNUM"),
            Ok(Reply::text("+CNUM: \"\",\"+15551234567\",145"))
        );
    }

    #[test]
    fn test_reset_restores_profile() {
        let mut state = DeviceState::default();
        run(&mut state, "E0").unwrap();
        run(&mut state, "S7=9").unwrap();
        run(&mut state, "&F").unwrap();
        assert!(state.echo);
        assert_eq!(state.s_register(7), Ok(50));
    }
}
