//! 27.005 SMS commands.

use atsim_protocol::{
    CommandError, CommandResult, ExtendedError, OperationType, SubCommand,
    CMS_INVALID_MEMORY_INDEX, CMS_INVALID_PDU_PARAMETER, CMS_INVALID_TEXT_PARAMETER,
};

use super::{parse_args, parse_param, payload};
use crate::registry::{CommandRegistry, Reply, Submission};
use crate::state::{DeviceState, SmsMessage, SmsMode, SmsStatus};

use OperationType::{Execute, Read, Set, Test};

/// Shortest PDU accepted by `+CMGS` in PDU mode.
pub const MIN_PDU_LENGTH: usize = 7;
/// Longest PDU accepted by `+CMGS` in PDU mode.
pub const MAX_PDU_LENGTH: usize = 160;

pub(crate) fn register(registry: &mut CommandRegistry) {
    registry.register("+CMGF", &[Read], message_format);
    registry.register("+CMGF", &[Set], set_message_format);
    registry.register("+CMGF", &[Test], message_formats);

    registry.register("+CMGS", &[Set], send_message);
    registry.register("+CMGS", &[Test], supported);

    registry.register("+CMGR", &[Set], read_message);
    registry.register("+CMGR", &[Test], supported);

    registry.register("+CMGL", &[Execute, Set], list_messages);
    registry.register("+CMGL", &[Test], list_filters);

    registry.register("+CMGD", &[Set], delete_message);
    registry.register("+CMGD", &[Test], deletable);
}

fn cms(code: u16) -> CommandError {
    CommandError::ExtendedFailure(ExtendedError::Cms(code))
}

fn supported(_: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::ok())
}

fn message_format(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::text(format!("+CMGF: {}", state.sms_mode as u8)))
}

fn set_message_format(state: &mut DeviceState, cmd: &SubCommand) -> CommandResult<Reply> {
    let value = payload(cmd)?;
    state.sms_mode = SmsMode::from_param(value)
        .ok_or_else(|| CommandError::InvalidArgument(format!("invalid SMS mode {:?}", value)))?;
    Ok(Reply::ok())
}

fn message_formats(_: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    Ok(Reply::text("+CMGF: (0,1)"))
}

/// `+CMGS=<length>` or, in text mode, `+CMGS="<da>"`.
///
/// Validation happens here; the body is captured by the session afterwards.
fn send_message(state: &mut DeviceState, cmd: &SubCommand) -> CommandResult<Reply> {
    let value = payload(cmd)?.trim();

    match state.sms_mode {
        SmsMode::Text => {
            if value.starts_with('"') {
                let recipient = parse_args(value).swap_remove(0);
                if recipient.is_empty() {
                    return Err(cms(CMS_INVALID_TEXT_PARAMETER));
                }
                return Ok(Reply::AwaitBody(Submission {
                    recipient: Some(recipient),
                    declared_length: None,
                }));
            }
            match value.parse::<usize>() {
                Ok(len) if len > 0 => Ok(Reply::AwaitBody(Submission {
                    recipient: None,
                    declared_length: Some(len),
                })),
                _ => Err(cms(CMS_INVALID_TEXT_PARAMETER)),
            }
        }
        SmsMode::Pdu => match value.parse::<usize>() {
            Ok(len) if (MIN_PDU_LENGTH..=MAX_PDU_LENGTH).contains(&len) => {
                Ok(Reply::AwaitBody(Submission {
                    recipient: None,
                    declared_length: Some(len),
                }))
            }
            _ => Err(cms(CMS_INVALID_PDU_PARAMETER)),
        },
    }
}

fn parse_index(value: &str) -> CommandResult<u16> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| CommandError::InvalidArgument(format!("invalid message index {:?}", value)))
}

fn mark_read(msg: &mut SmsMessage) {
    if msg.status == SmsStatus::RecUnread {
        msg.status = SmsStatus::RecRead;
    }
}

/// PDU length in octets; PDU bodies are stored as hex.
fn pdu_length(msg: &SmsMessage) -> usize {
    msg.body.len() / 2
}

fn format_read(mode: SmsMode, msg: &SmsMessage) -> String {
    match mode {
        SmsMode::Text => format!(
            "+CMGR: \"{}\",\"{}\",,\"{}\"\r\n{}",
            msg.status.as_text(),
            msg.address,
            msg.scts(),
            msg.body
        ),
        SmsMode::Pdu => format!(
            "+CMGR: {},,{}\r\n{}",
            msg.status.as_code(),
            pdu_length(msg),
            msg.body
        ),
    }
}

fn format_list_entry(mode: SmsMode, msg: &SmsMessage) -> String {
    match mode {
        SmsMode::Text => format!(
            "+CMGL: {},\"{}\",\"{}\",,\"{}\"\r\n{}",
            msg.index,
            msg.status.as_text(),
            msg.address,
            msg.scts(),
            msg.body
        ),
        SmsMode::Pdu => format!(
            "+CMGL: {},{},,{}\r\n{}",
            msg.index,
            msg.status.as_code(),
            pdu_length(msg),
            msg.body
        ),
    }
}

/// `+CMGR=<index>`
fn read_message(state: &mut DeviceState, cmd: &SubCommand) -> CommandResult<Reply> {
    let index = parse_index(payload(cmd)?)?;
    let mode = state.sms_mode;
    let msg = state
        .inbox_mut()
        .get_mut(index)
        .ok_or_else(|| cms(CMS_INVALID_MEMORY_INDEX))?;

    // The header reports the status before the read.
    let text = format_read(mode, msg);
    mark_read(msg);
    Ok(Reply::text(text))
}

/// `<stat>` filter of `+CMGL`. `None` means all.
fn parse_filter(mode: SmsMode, value: &str) -> CommandResult<Option<SmsStatus>> {
    let value = value.trim().trim_matches('"');
    let filter = match (mode, value.to_ascii_uppercase().as_str()) {
        (SmsMode::Text, "REC UNREAD") | (SmsMode::Pdu, "0") => Some(SmsStatus::RecUnread),
        (SmsMode::Text, "REC READ") | (SmsMode::Pdu, "1") => Some(SmsStatus::RecRead),
        (SmsMode::Text, "STO UNSENT") | (SmsMode::Pdu, "2") => Some(SmsStatus::StoUnsent),
        (SmsMode::Text, "STO SENT") | (SmsMode::Pdu, "3") => Some(SmsStatus::StoSent),
        (SmsMode::Text, "ALL") | (SmsMode::Pdu, "4") => None,
        _ => {
            return Err(CommandError::InvalidArgument(format!(
                "invalid message filter {:?}",
                value
            )))
        }
    };
    Ok(filter)
}

/// `+CMGL[=<stat>]`
fn list_messages(state: &mut DeviceState, cmd: &SubCommand) -> CommandResult<Reply> {
    let mode = state.sms_mode;
    let filter = match cmd.payload() {
        Some(value) => parse_filter(mode, value)?,
        None => None,
    };

    let entries: Vec<String> = state
        .inbox_mut()
        .iter_mut()
        .filter(|m| filter.map_or(true, |status| m.status == status))
        .map(|msg| {
            let entry = format_list_entry(mode, msg);
            mark_read(msg);
            entry
        })
        .collect();

    if entries.is_empty() {
        Ok(Reply::ok())
    } else {
        Ok(Reply::text(entries.join("\r\n")))
    }
}

fn list_filters(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    match state.sms_mode {
        SmsMode::Text => Ok(Reply::text(
            "+CMGL: (\"REC UNREAD\",\"REC READ\",\"STO UNSENT\",\"STO SENT\",\"ALL\")",
        )),
        SmsMode::Pdu => Ok(Reply::text("+CMGL: (0-4)")),
    }
}

/// `+CMGD=<index>[,<delflag>]`
///
/// delflag 0 deletes `index` (absent indices are ignored); 1-4 ignore the
/// index and delete all read / read+sent / read+sent+unsent / all messages.
fn delete_message(state: &mut DeviceState, cmd: &SubCommand) -> CommandResult<Reply> {
    let args = parse_args(payload(cmd)?);
    let flag = match args.get(1).filter(|f| !f.is_empty()) {
        Some(flag) => parse_param(flag, 4)?,
        None => 0,
    };

    if flag == 0 {
        let index = parse_index(&args[0])?;
        if !state.inbox_mut().remove(index) {
            tracing::debug!("+CMGD: no message at index {}", index);
        }
        return Ok(Reply::ok());
    }

    state.inbox_mut().retain(|m| {
        let doomed = match m.status {
            SmsStatus::RecRead => true,
            SmsStatus::StoSent => flag >= 2,
            SmsStatus::StoUnsent => flag >= 3,
            SmsStatus::RecUnread => flag >= 4,
        };
        !doomed
    });
    Ok(Reply::ok())
}

fn deletable(state: &mut DeviceState, _: &SubCommand) -> CommandResult<Reply> {
    let indices: Vec<String> = state.inbox().iter().map(|m| m.index.to_string()).collect();
    Ok(Reply::text(format!("+CMGD: ({}),(0-4)", indices.join(","))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn run(state: &mut DeviceState, text: &str) -> CommandResult<Reply> {
        CommandRegistry::standard().dispatch(state, &SubCommand::parse(text))
    }

    #[test]
    fn test_cmgf_round_trip() {
        let mut state = DeviceState::default();
        run(&mut state, "+CMGF=0").unwrap();
        assert_eq!(run(&mut state, "+CMGF?"), Ok(Reply::text("+CMGF: 0")));
        run(&mut state, "+CMGF=1").unwrap();
        assert_eq!(run(&mut state, "+CMGF?"), Ok(Reply::text("+CMGF: 1")));
        assert!(matches!(
            run(&mut state, "+CMGF=9"),
            Err(CommandError::InvalidArgument(_))
        ));
        assert_eq!(state.sms_mode, SmsMode::Text);
    }

    #[test]
    fn test_cmgs_text_mode_validation() {
        let mut state = DeviceState::default();
        assert_eq!(
            run(&mut state, "+CMGS=5"),
            Ok(Reply::AwaitBody(Submission {
                recipient: None,
                declared_length: Some(5),
            }))
        );
        assert_eq!(
            run(&mut state, "+CMGS=\"+15550001\""),
            Ok(Reply::AwaitBody(Submission {
                recipient: Some("+15550001".to_string()),
                declared_length: None,
            }))
        );
        for bad in ["+CMGS=0", "+CMGS=abc", "+CMGS=\"\""] {
            assert_eq!(
                run(&mut state, bad),
                Err(cms(CMS_INVALID_TEXT_PARAMETER)),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_cmgs_pdu_mode_validation() {
        let mut state = DeviceState::default();
        state.sms_mode = SmsMode::Pdu;
        assert!(run(&mut state, "+CMGS=7").is_ok());
        assert!(run(&mut state, "+CMGS=160").is_ok());
        assert_eq!(run(&mut state, "+CMGS=6"), Err(cms(CMS_INVALID_PDU_PARAMETER)));
        assert_eq!(run(&mut state, "+CMGS=161"), Err(cms(CMS_INVALID_PDU_PARAMETER)));
    }

    #[test]
    fn test_cmgr_marks_read() {
        let mut state = DeviceState::default();
        assert_eq!(
            run(&mut state, "+CMGR=1"),
            Ok(Reply::text(
                "+CMGR: \"REC UNREAD\",\"1234567890\",,\"21/09/01,12:34:56+00\"\r\nHello, World!"
            ))
        );
        assert_eq!(state.inbox().get(1).map(|m| m.status), Some(SmsStatus::RecRead));
        assert_eq!(run(&mut state, "+CMGR=9"), Err(cms(CMS_INVALID_MEMORY_INDEX)));
    }

    #[test]
    fn test_cmgl_filters() {
        let mut state = DeviceState::default();
        let ts = Local::now().fixed_offset();
        state.inbox_mut().push(SmsStatus::RecRead, "555", ts, "old");

        match run(&mut state, "+CMGL=\"REC UNREAD\"").unwrap() {
            Reply::Done(Some(text)) => {
                assert!(text.starts_with("+CMGL: 1,\"REC UNREAD\",\"1234567890\""));
                assert!(!text.contains("old"));
            }
            other => panic!("unexpected reply {:?}", other),
        }
        // Listing marked message 1 read.
        assert_eq!(run(&mut state, "+CMGL=\"REC UNREAD\""), Ok(Reply::ok()));

        match run(&mut state, "+CMGL").unwrap() {
            Reply::Done(Some(text)) => assert_eq!(text.matches("+CMGL:").count(), 2),
            other => panic!("unexpected reply {:?}", other),
        }
        assert!(run(&mut state, "+CMGL=\"BOGUS\"").is_err());
    }

    #[test]
    fn test_cmgd() {
        let mut state = DeviceState::default();
        let ts = Local::now().fixed_offset();
        state.inbox_mut().push(SmsStatus::RecRead, "555", ts, "old");

        run(&mut state, "+CMGD=42").unwrap();
        assert_eq!(state.inbox().len(), 2);

        run(&mut state, "+CMGD=1,1").unwrap();
        assert_eq!(state.inbox().len(), 1);
        assert!(state.inbox().get(1).is_some());

        run(&mut state, "+CMGD=1").unwrap();
        assert!(state.inbox().is_empty());
        assert!(run(&mut state, "+CMGD=1,5").is_err());
    }
}
