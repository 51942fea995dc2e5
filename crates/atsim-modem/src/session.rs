//! AT command session.
//!
//! A [`ModemSession`] owns one emulated modem: its [`DeviceState`], the
//! command registry, the line framer and the two-phase input controller. It
//! reads bytes from a [`Transport`], processes complete lines strictly in
//! arrival order and writes every response back through the same transport.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use atsim_metrics::{metric_defs, metrics};
use atsim_protocol::{
    CommandLine, CommandResult, LineFramer, ResponseFormatter, ResultCode, SubCommand, CTRL_Z,
};
use tracing::{debug, trace, warn};

use crate::config::ModemConfig;
use crate::error::SessionError;
use crate::input::{InputState, TwoPhaseInput};
use crate::registry::{CommandRegistry, Reply};
use crate::state::DeviceState;
use crate::transport::Transport;

/// Largest read requested from the transport.
const READ_CHUNK: usize = 256;

/// Why [`ModemSession::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The stop flag was raised.
    Stopped,
    /// The host closed the transport.
    Disconnected,
}

/// Per-session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Lines received.
    pub lines: u64,
    /// Sub-commands that succeeded.
    pub commands_ok: u64,
    /// Sub-commands that failed.
    pub commands_failed: u64,
    /// Messages submitted.
    pub messages_sent: u64,
}

/// One emulated modem attached to a transport.
pub struct ModemSession<T: Transport> {
    name: String,
    transport: T,
    state: DeviceState,
    registry: CommandRegistry,
    framer: LineFramer,
    input: TwoPhaseInput,
    stats: SessionStats,
    closed: bool,
}

impl<T: Transport> ModemSession<T> {
    /// Create a session with the standard command set.
    pub fn new(name: impl Into<String>, transport: T, config: &ModemConfig) -> Self {
        Self::with_registry(name, transport, config, CommandRegistry::standard())
    }

    /// Create a session with a custom command registry.
    pub fn with_registry(
        name: impl Into<String>,
        transport: T,
        config: &ModemConfig,
        registry: CommandRegistry,
    ) -> Self {
        ModemSession {
            name: name.into(),
            transport,
            state: DeviceState::from_config(config),
            registry,
            framer: LineFramer::new(),
            input: TwoPhaseInput::new(),
            stats: SessionStats::default(),
            closed: false,
        }
    }

    /// Session name, used in logs and metric labels.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device state.
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Device state, for hosts that simulate network events.
    pub fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    /// Counters.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The transport, mutable.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the session, returning its transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Check if the session is capturing a message body.
    pub fn is_awaiting_body(&self) -> bool {
        self.input.is_capturing()
    }

    /// Two-phase input state.
    pub fn input_state(&self) -> InputState {
        self.input.state()
    }

    /// Check if [`shutdown`](Self::shutdown) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Process bytes received from the host.
    ///
    /// Every complete line (or, during body capture, everything up to Ctrl-Z)
    /// is handled before returning; a partial tail stays buffered.
    pub fn feed_inbound_bytes(&mut self, data: &[u8]) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        self.framer.push(data);

        loop {
            if self.input.is_capturing() {
                match self.framer.take_until(CTRL_Z) {
                    Some(raw) => self.finish_submission(&raw)?,
                    None => break,
                }
            } else {
                match self.framer.next_line() {
                    Some(line) => self.process_line(&line)?,
                    None => break,
                }
            }
        }
        Ok(())
    }

    /// Stop processing. Buffered input and any body capture are discarded
    /// without output.
    pub fn shutdown(&mut self) {
        if self.input.abort().is_some() {
            debug!("[{}] body capture aborted", self.name);
        }
        if self.framer.buffered_len() > 0 {
            trace!(
                "[{}] discarding {} buffered bytes",
                self.name,
                self.framer.buffered_len()
            );
        }
        self.framer.clear();
        self.closed = true;
    }

    /// Read from the transport and process input until `stop` is raised or the
    /// host disconnects.
    ///
    /// `stop` is checked between reads, so the transport's read timeout bounds
    /// how long shutdown takes.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<SessionEnd, SessionError> {
        debug!("[{}] session running", self.name);
        let end = loop {
            if stop.load(Ordering::Relaxed) {
                break SessionEnd::Stopped;
            }
            match self.transport.read(READ_CHUNK) {
                Ok(data) if data.is_empty() => continue,
                Ok(data) => {
                    if let Err(e) = self.feed_inbound_bytes(&data) {
                        warn!("[{}] session failed: {}", self.name, e);
                        self.shutdown();
                        return Err(e);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break SessionEnd::Disconnected;
                }
                Err(e) => {
                    warn!("[{}] transport read failed: {}", self.name, e);
                    self.shutdown();
                    return Err(e.into());
                }
            }
        };
        self.shutdown();
        debug!("[{}] session ended: {:?}", self.name, end);
        Ok(end)
    }

    // ========================================================================
    // Line processing
    // ========================================================================

    fn formatter(&self) -> ResponseFormatter {
        ResponseFormatter::new(self.state.format_flags())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        self.transport.write_all(bytes)?;
        Ok(())
    }

    fn write_body(&mut self, text: &str) -> Result<(), SessionError> {
        let bytes = self.formatter().body(text);
        self.write(&bytes)
    }

    fn write_result(&mut self, code: &ResultCode) -> Result<(), SessionError> {
        match self.formatter().result(code) {
            Some(bytes) => self.write(&bytes),
            None => Ok(()),
        }
    }

    fn process_line(&mut self, line: &str) -> Result<(), SessionError> {
        debug!("[{}] <- {:?}", self.name, line);
        self.stats.lines += 1;
        metrics::counter!(metric_defs::LINES.name, "modem" => self.name.clone()).increment(1);

        if let Some(echo) = self.formatter().echo(line) {
            self.write(&echo)?;
        }

        match CommandLine::parse(line) {
            Ok(command_line) => self.execute(command_line.into_commands().into()),
            Err(e) => {
                debug!("[{}] {}", self.name, e);
                self.write_result(&ResultCode::Error)
            }
        }
    }

    /// Run sub-commands left to right. Stops at the first failure, or when a
    /// submission needs its body (the rest is deferred).
    fn execute(&mut self, mut queue: VecDeque<SubCommand>) -> Result<(), SessionError> {
        while let Some(cmd) = queue.pop_front() {
            let result = self.registry.dispatch(&mut self.state, &cmd);
            self.record(&cmd, &result);

            match result {
                Ok(Reply::Done(Some(text))) => self.write_body(&text)?,
                Ok(Reply::Done(None)) => {}
                Ok(Reply::AwaitBody(submission)) => {
                    self.input.begin(submission, queue);
                    let prompt = self.formatter().prompt();
                    self.write(&prompt)?;
                    self.input.prompt_sent();
                    debug!("[{}] capturing message body", self.name);
                    return Ok(());
                }
                Err(e) => return self.write_result(&ResultCode::from(&e)),
            }
        }
        self.write_result(&ResultCode::Ok)
    }

    fn finish_submission(&mut self, raw: &[u8]) -> Result<(), SessionError> {
        let Some((body, pending)) = self.input.complete(raw) else {
            return Ok(());
        };
        if let Some(declared) = pending.submission.declared_length {
            if declared != body.len() {
                trace!(
                    "[{}] body is {} bytes, {} declared",
                    self.name,
                    body.len(),
                    declared
                );
            }
        }

        let recipient = pending.submission.recipient.as_deref().unwrap_or("");
        let reference = self.state.submit_message(recipient, &body);
        debug!(
            "[{}] message {} submitted ({} bytes)",
            self.name,
            reference,
            body.len()
        );
        self.stats.messages_sent += 1;
        metrics::counter!(metric_defs::SMS_SENT.name, "modem" => self.name.clone()).increment(1);
        metrics::histogram!(metric_defs::SMS_BODY_SIZE.name, "modem" => self.name.clone())
            .record(body.len() as f64);

        self.write_body(&format!("+CMGS: {}", reference))?;
        self.input.resume();
        self.execute(pending.remaining)
    }

    fn record(&mut self, cmd: &SubCommand, result: &CommandResult<Reply>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(atsim_protocol::CommandError::ExtendedFailure(_)) => "extended",
            Err(_) => "error",
        };
        match result {
            Ok(_) => self.stats.commands_ok += 1,
            Err(e) => {
                self.stats.commands_failed += 1;
                debug!("[{}] {} failed: {}", self.name, cmd.to_command_string(), e);
            }
        }
        trace!(
            "[{}] {} {} -> {}",
            self.name,
            cmd.operation().as_str(),
            cmd.identifier(),
            outcome
        );
        metrics::counter!(
            metric_defs::COMMANDS.name,
            "modem" => self.name.clone(),
            "result" => outcome
        )
        .increment(1);
    }
}

impl<T: Transport> std::fmt::Debug for ModemSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModemSession")
            .field("name", &self.name)
            .field("input", &self.input.state())
            .field("stats", &self.stats)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    fn session() -> ModemSession<MemoryTransport> {
        ModemSession::new("test", MemoryTransport::new(), &ModemConfig::default())
    }

    fn exchange(session: &mut ModemSession<MemoryTransport>, input: &[u8]) -> String {
        session.feed_inbound_bytes(input).unwrap();
        String::from_utf8(session.transport_mut().take_output()).unwrap()
    }

    #[test]
    fn test_bare_at() {
        let mut s = session();
        assert_eq!(exchange(&mut s, b"AT\r"), "AT\r\r\nOK\r\n");
    }

    #[test]
    fn test_not_an_at_line() {
        let mut s = session();
        assert_eq!(exchange(&mut s, b"hello\r"), "hello\r\r\nERROR\r\n");
        assert_eq!(s.stats().lines, 1);
    }

    #[test]
    fn test_unknown_command() {
        let mut s = session();
        assert_eq!(exchange(&mut s, b"AT+NOPE\r"), "AT+NOPE\r\r\nERROR\r\n");
        assert_eq!(s.stats().commands_failed, 1);
    }

    #[test]
    fn test_partial_line_is_buffered() {
        let mut s = session();
        assert_eq!(exchange(&mut s, b"AT+C"), "");
        assert_eq!(exchange(&mut s, b"SQ\r\n"), "AT+CSQ\r\r\n+CSQ: 15,99\r\n\r\nOK\r\n");
    }

    #[test]
    fn test_submission_in_one_chunk() {
        let mut s = session();
        let out = exchange(&mut s, b"AT+CMGS=5\rHello\x1a");
        assert_eq!(out, "AT+CMGS=5\r\r\n> \r\n+CMGS: 1\r\n\r\nOK\r\n");
        assert_eq!(s.input_state(), InputState::AwaitingCommand);
        assert_eq!(s.state().outbox().len(), 1);
        assert_eq!(s.stats().messages_sent, 1);
    }

    #[test]
    fn test_shutdown_discards_capture() {
        let mut s = session();
        exchange(&mut s, b"AT+CMGS=5\rHel");
        assert!(s.is_awaiting_body());

        s.shutdown();
        assert!(!s.is_awaiting_body());
        assert!(s.is_closed());
        assert!(s.transport().output().is_empty());
        assert!(matches!(
            s.feed_inbound_bytes(b"lo\x1a"),
            Err(SessionError::Closed)
        ));
        assert!(s.state().outbox().is_empty());
    }

    #[test]
    fn test_run_until_disconnect() {
        let transport = MemoryTransport::scripted([&b"ATE0\r"[..], &b"ATI\r"[..]]);
        let mut s = ModemSession::new("run", transport, &ModemConfig::default());
        let stop = AtomicBool::new(false);

        assert_eq!(s.run(&stop).unwrap(), SessionEnd::Disconnected);
        assert!(s.is_closed());
        assert_eq!(
            s.into_transport().output_str(),
            "ATE0\r\r\nOK\r\n\r\n247\r\n\r\nOK\r\n"
        );
    }

    /// Transport that replays `reads` and fails once they run out.
    struct FailingTransport {
        reads: VecDeque<Vec<u8>>,
        fail_writes: bool,
    }

    impl Transport for FailingTransport {
        fn read(&mut self, _max: usize) -> std::io::Result<Vec<u8>> {
            self.reads
                .pop_front()
                .ok_or_else(|| std::io::ErrorKind::ConnectionReset.into())
        }

        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            if self.fail_writes {
                return Err(std::io::ErrorKind::BrokenPipe.into());
            }
            Ok(data.len())
        }
    }

    #[test]
    fn test_read_failure_ends_session() {
        let transport = FailingTransport {
            reads: VecDeque::from([b"AT+CMGS=5\rHel".to_vec()]),
            fail_writes: false,
        };
        let mut s = ModemSession::new("broken", transport, &ModemConfig::default());
        let stop = AtomicBool::new(false);

        let err = s.run(&stop).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transport(ref e) if e.kind() == std::io::ErrorKind::ConnectionReset
        ));
        assert!(s.is_closed());
        assert_eq!(s.input_state(), InputState::AwaitingCommand);
        assert!(s.state().outbox().is_empty());
    }

    #[test]
    fn test_write_failure_ends_session() {
        let transport = FailingTransport {
            reads: VecDeque::from([b"AT\r".to_vec()]),
            fail_writes: true,
        };
        let mut s = ModemSession::new("broken", transport, &ModemConfig::default());
        let stop = AtomicBool::new(false);

        assert!(matches!(s.run(&stop), Err(SessionError::Transport(_))));
        assert!(s.is_closed());
        assert!(matches!(
            s.feed_inbound_bytes(b"AT\r"),
            Err(SessionError::Closed)
        ));
    }

    #[test]
    fn test_state_changes_from_host() {
        let mut s = session();
        exchange(&mut s, b"ATE0\r");
        s.state_mut().network.registration_status = 0;
        assert_eq!(exchange(&mut s, b"AT+COPS?\r"), "\r\n+COPS: 0\r\n\r\nOK\r\n");
    }

    #[test]
    fn test_run_stops_on_flag() {
        let mut s = session();
        let stop = AtomicBool::new(true);
        assert_eq!(s.run(&stop).unwrap(), SessionEnd::Stopped);
        assert!(s.is_closed());
    }
}
