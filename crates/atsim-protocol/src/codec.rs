//! Line-based framing for AT communication.
//!
//! Command lines are terminated with `\r`, `\n` or both. A terminator pair may
//! arrive split across two reads, so the framer never yields empty lines.
//! While a message body is being captured the caller bypasses line framing and
//! pulls raw bytes up to the `0x1A` terminator with [`LineFramer::take_until`].

use bytes::{Buf, BytesMut};

/// Longest unterminated line kept in the buffer. Anything longer is dropped
/// up to the next terminator.
pub const MAX_LINE_LENGTH: usize = 556;

/// Body terminator (Ctrl-Z).
pub const CTRL_Z: u8 = 0x1A;

/// Prompt sent when the modem is ready to capture a message body.
pub const PROMPT: &str = "> ";

fn is_terminator(byte: u8) -> bool {
    byte == b'\r' || byte == b'\n'
}

/// Accumulates bytes from a transport into complete lines.
#[derive(Debug, Default)]
pub struct LineFramer {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
    /// An over-long line was dropped; skip its tail.
    overflowed: bool,
}

/// Lazy iterator over the complete lines currently buffered in a [`LineFramer`].
///
/// Returned by [`LineFramer::feed`]. It is finite: iteration stops once no
/// terminator remains in the buffer, and the partial tail stays buffered for
/// the next call.
pub struct Lines<'a> {
    framer: &'a mut LineFramer,
}

impl Iterator for Lines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.framer.next_line()
    }
}

impl LineFramer {
    /// Create a new line framer.
    pub fn new() -> Self {
        LineFramer {
            buffer: BytesMut::with_capacity(MAX_LINE_LENGTH),
            overflowed: false,
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Add received data and iterate over every line it completes.
    pub fn feed(&mut self, data: &[u8]) -> Lines<'_> {
        self.push(data);
        Lines { framer: self }
    }

    /// Try to decode the next complete, non-empty line from the buffer.
    ///
    /// The line is returned without its terminator, otherwise as received.
    /// Blank lines are skipped. Returns `None` if more data is needed.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let Some(end) = self.buffer.iter().position(|&b| is_terminator(b)) else {
                if self.buffer.len() > MAX_LINE_LENGTH {
                    log::warn!(
                        "dropping {} bytes with no line terminator",
                        self.buffer.len()
                    );
                    self.buffer.clear();
                    self.overflowed = true;
                }
                return None;
            };

            let line_data = self.buffer.split_to(end);
            while !self.buffer.is_empty() && is_terminator(self.buffer[0]) {
                self.buffer.advance(1);
            }
            if std::mem::take(&mut self.overflowed) {
                continue;
            }

            let line = String::from_utf8_lossy(&line_data).into_owned();
            if !line.trim().is_empty() {
                return Some(line);
            }
        }
    }

    /// Take every byte up to the first `terminator`, consuming the terminator.
    ///
    /// Returns `None` (leaving the buffer untouched) if the terminator has not
    /// arrived yet.
    pub fn take_until(&mut self, terminator: u8) -> Option<Vec<u8>> {
        let end = self.buffer.iter().position(|&b| b == terminator)?;
        let data = self.buffer.split_to(end).to_vec();
        self.buffer.advance(1);
        Some(data)
    }

    /// Consume a pending `> ` prompt if it is all that is buffered.
    ///
    /// Leading line terminators are ignored. Used by hosts waiting for the
    /// modem to enter body capture.
    pub fn take_prompt(&mut self) -> bool {
        let start = self
            .buffer
            .iter()
            .position(|&b| !is_terminator(b))
            .unwrap_or(self.buffer.len());
        if &self.buffer[start..] == PROMPT.as_bytes() {
            self.buffer.clear();
            return true;
        }
        false
    }

    /// Encode a command for transmission.
    ///
    /// Appends the carriage return terminator.
    pub fn encode_command(cmd: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(cmd.len() + 1);
        buf.extend_from_slice(cmd.as_bytes());
        buf.push(b'\r');
        buf
    }

    /// Encode a message body followed by the Ctrl-Z terminator.
    pub fn encode_body(body: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(body.len() + 1);
        buf.extend_from_slice(body.as_bytes());
        buf.push(CTRL_Z);
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command() {
        assert_eq!(LineFramer::encode_command("AT+CSQ"), b"AT+CSQ\r");
    }

    #[test]
    fn test_feed_multiple_lines() {
        let mut framer = LineFramer::new();
        let lines: Vec<String> = framer.feed(b"ATI\r\nAT+CSQ\r\n").collect();
        assert_eq!(lines, vec!["ATI".to_string(), "AT+CSQ".to_string()]);
        assert_eq!(framer.buffered_len(), 0);
    }

    #[test]
    fn test_partial_line() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.feed(b"AT+CM").count(), 0);

        let lines: Vec<String> = framer.feed(b"GF?\r").collect();
        assert_eq!(lines, vec!["AT+CMGF?".to_string()]);
    }

    #[test]
    fn test_terminator_split_across_reads() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.feed(b"AT\r").collect::<Vec<_>>(), vec!["AT".to_string()]);
        // The trailing \n of the pair must not produce an empty line.
        assert_eq!(framer.feed(b"\n").count(), 0);
        assert_eq!(framer.feed(b"ATE0\n").collect::<Vec<_>>(), vec!["ATE0".to_string()]);
    }

    #[test]
    fn test_line_keeps_inner_whitespace() {
        let mut framer = LineFramer::new();
        let lines: Vec<String> = framer.feed(b"  at+csq  \r   \r\n").collect();
        assert_eq!(lines, vec!["  at+csq  ".to_string()]);
    }

    #[test]
    fn test_overlong_line_is_dropped() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.feed(&[b'A'; MAX_LINE_LENGTH + 1]).count(), 0);
        assert_eq!(framer.buffered_len(), 0);

        let lines: Vec<String> = framer.feed(b"AAAA\rAT\r").collect();
        assert_eq!(lines, vec!["AT".to_string()]);
    }

    #[test]
    fn test_take_until_ctrl_z() {
        let mut framer = LineFramer::new();
        framer.push(b"Hello");
        assert!(framer.take_until(CTRL_Z).is_none());

        framer.push(b" there\x1aAT\r");
        assert_eq!(framer.take_until(CTRL_Z), Some(b"Hello there".to_vec()));
        assert_eq!(framer.next_line(), Some("AT".to_string()));
    }

    #[test]
    fn test_take_prompt() {
        let mut framer = LineFramer::new();
        framer.push(b"\r\n> ");
        assert!(framer.take_prompt());
        assert_eq!(framer.buffered_len(), 0);

        framer.push(b"\r\nOK\r\n");
        assert!(!framer.take_prompt());
    }

    #[test]
    fn test_encode_body() {
        assert_eq!(LineFramer::encode_body("Hi"), b"Hi\x1a");
    }
}
