//! Result codes and response formatting.
//!
//! Output of a command line is shaped by three flags:
//! - **echo**: the received line is written back before it is processed
//! - **verbose**: information text is framed as `\r\n<text>\r\n` instead of
//!   `<text>\r\n`
//! - **quiet**: terminal result codes are suppressed (information text is not)
//!
//! The result-code format selects between `OK`/`ERROR` and `0`/`4`.

use crate::codec::PROMPT;
use crate::error::{CommandError, ExtendedError};

/// How terminal result codes are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ResultCodeFormat {
    /// `0`, `4`, ...
    Numeric,
    /// `OK`, `ERROR`, ...
    #[default]
    Verbose,
}

/// Terminal status of a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    /// Success.
    Ok,
    /// Generic failure.
    Error,
    /// `+CMS ERROR` / `+CME ERROR`.
    Extended(ExtendedError),
}

impl ResultCode {
    /// Numeric code as defined by V.250, if the code has one.
    pub fn numeric(&self) -> Option<u8> {
        match self {
            ResultCode::Ok => Some(0),
            ResultCode::Error => Some(4),
            ResultCode::Extended(_) => None,
        }
    }

    /// Code with the given V.250 numeric form.
    pub fn from_numeric(n: u8) -> Option<ResultCode> {
        [ResultCode::Ok, ResultCode::Error]
            .into_iter()
            .find(|code| code.numeric() == Some(n))
    }

    /// Verbose text of the code.
    pub fn verbose(&self) -> String {
        match self {
            ResultCode::Ok => "OK".to_string(),
            ResultCode::Error => "ERROR".to_string(),
            ResultCode::Extended(e) => e.to_string(),
        }
    }

    /// Render according to `format`. Extended codes have no numeric form and
    /// are always rendered verbosely.
    pub fn render(&self, format: ResultCodeFormat) -> String {
        match (format, self.numeric()) {
            (ResultCodeFormat::Numeric, Some(n)) => n.to_string(),
            _ => self.verbose(),
        }
    }

    /// Check if this is a success code.
    pub fn is_ok(&self) -> bool {
        matches!(self, ResultCode::Ok)
    }
}

impl From<&CommandError> for ResultCode {
    fn from(err: &CommandError) -> Self {
        match err {
            CommandError::Unknown(_) | CommandError::InvalidArgument(_) => ResultCode::Error,
            CommandError::ExtendedFailure(e) => ResultCode::Extended(*e),
        }
    }
}

/// Flags that shape rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatFlags {
    /// Echo received lines.
    pub echo: bool,
    /// Frame text with a leading `\r\n`.
    pub verbose: bool,
    /// Suppress terminal result codes.
    pub quiet: bool,
    /// Result code rendering.
    pub result_code_format: ResultCodeFormat,
}

impl Default for FormatFlags {
    fn default() -> Self {
        FormatFlags {
            echo: true,
            verbose: true,
            quiet: false,
            result_code_format: ResultCodeFormat::Verbose,
        }
    }
}

/// Renders echo, information text, prompts and result codes as wire bytes.
#[derive(Debug, Clone, Copy)]
pub struct ResponseFormatter {
    flags: FormatFlags,
}

impl ResponseFormatter {
    /// Create a formatter for the given flags.
    pub fn new(flags: FormatFlags) -> Self {
        ResponseFormatter { flags }
    }

    /// The flags this formatter renders with.
    pub fn flags(&self) -> FormatFlags {
        self.flags
    }

    /// Echo of a received line, if echo is enabled.
    pub fn echo(&self, line: &str) -> Option<Vec<u8>> {
        if !self.flags.echo {
            return None;
        }
        let mut out = Vec::with_capacity(line.len() + 1);
        out.extend_from_slice(line.as_bytes());
        out.push(b'\r');
        Some(out)
    }

    /// Information text. Emitted regardless of quiet mode.
    pub fn body(&self, text: &str) -> Vec<u8> {
        self.frame(text).into_bytes()
    }

    /// Terminal result code, or `None` in quiet mode.
    pub fn result(&self, code: &ResultCode) -> Option<Vec<u8>> {
        if self.flags.quiet {
            return None;
        }
        Some(self.frame(&code.render(self.flags.result_code_format)).into_bytes())
    }

    /// The body capture prompt. Never followed by a line terminator.
    pub fn prompt(&self) -> Vec<u8> {
        if self.flags.verbose {
            format!("\r\n{}", PROMPT).into_bytes()
        } else {
            PROMPT.as_bytes().to_vec()
        }
    }

    fn frame(&self, text: &str) -> String {
        if self.flags.verbose {
            format!("\r\n{}\r\n", text)
        } else {
            format!("{}\r\n", text)
        }
    }
}

/// A response line as seen by a host talking to a modem.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// `OK`.
    Ok,
    /// `ERROR`.
    Error,
    /// `+CMS ERROR: <n>` or `+CME ERROR: <n>`.
    Extended(ExtendedError),
    /// The `> ` body capture prompt.
    Prompt,
    /// Any other information text.
    Info(String),
}

impl Response {
    /// Parse one received line (without terminators).
    pub fn parse(text: &str) -> Response {
        let trimmed = text.trim();

        if trimmed == "OK" {
            return Response::Ok;
        }
        if trimmed == "ERROR" {
            return Response::Error;
        }
        if trimmed == PROMPT.trim() {
            return Response::Prompt;
        }
        if let Some(code) = Self::try_parse_extended(trimmed, "+CMS ERROR:") {
            return Response::Extended(ExtendedError::Cms(code));
        }
        if let Some(code) = Self::try_parse_extended(trimmed, "+CME ERROR:") {
            return Response::Extended(ExtendedError::Cme(code));
        }

        Response::Info(trimmed.to_string())
    }

    /// Parse one received line from a modem that may use numeric result
    /// codes. `0` and `4` are taken as finals on top of what [`parse`](Self::parse)
    /// recognizes, so a bare numeric information line is ambiguous.
    pub fn parse_numeric(text: &str) -> Response {
        let code = text.trim().parse().ok().and_then(ResultCode::from_numeric);
        match code {
            Some(ResultCode::Ok) => Response::Ok,
            Some(ResultCode::Error) => Response::Error,
            _ => Self::parse(text),
        }
    }

    fn try_parse_extended(text: &str, prefix: &str) -> Option<u16> {
        text.strip_prefix(prefix)?.trim().parse().ok()
    }

    /// Check if this response ends a command line.
    pub fn is_final(&self) -> bool {
        matches!(self, Response::Ok | Response::Error | Response::Extended(_))
    }

    /// Check if this is an OK response.
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok)
    }

    /// Get the text if this is an information response.
    pub fn as_info(&self) -> Option<&str> {
        match self {
            Response::Info(text) => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(echo: bool, verbose: bool, quiet: bool, format: ResultCodeFormat) -> FormatFlags {
        FormatFlags {
            echo,
            verbose,
            quiet,
            result_code_format: format,
        }
    }

    #[test]
    fn test_verbose_framing() {
        let fmt = ResponseFormatter::new(FormatFlags::default());
        assert_eq!(fmt.body("+CSQ: 15,99"), b"\r\n+CSQ: 15,99\r\n");
        assert_eq!(fmt.result(&ResultCode::Ok), Some(b"\r\nOK\r\n".to_vec()));
        assert_eq!(fmt.echo("ATI"), Some(b"ATI\r".to_vec()));
    }

    #[test]
    fn test_numeric_result_codes() {
        let fmt = ResponseFormatter::new(flags(false, false, false, ResultCodeFormat::Numeric));
        assert_eq!(fmt.result(&ResultCode::Ok), Some(b"0\r\n".to_vec()));
        assert_eq!(fmt.result(&ResultCode::Error), Some(b"4\r\n".to_vec()));
        assert_eq!(fmt.body("Generic"), b"Generic\r\n");
        assert!(fmt.echo("ATI").is_none());
    }

    #[test]
    fn test_extended_codes_stay_verbose() {
        let code = ResultCode::Extended(ExtendedError::Cms(305));
        assert_eq!(code.render(ResultCodeFormat::Numeric), "+CMS ERROR: 305");
        assert_eq!(code.render(ResultCodeFormat::Verbose), "+CMS ERROR: 305");
    }

    #[test]
    fn test_quiet_suppresses_result_not_body() {
        let fmt = ResponseFormatter::new(flags(true, true, true, ResultCodeFormat::Verbose));
        assert!(fmt.result(&ResultCode::Ok).is_none());
        assert!(fmt.result(&ResultCode::Error).is_none());
        assert_eq!(fmt.body("x"), b"\r\nx\r\n");
    }

    #[test]
    fn test_prompt() {
        assert_eq!(ResponseFormatter::new(FormatFlags::default()).prompt(), b"\r\n> ");
        let terse = ResponseFormatter::new(flags(false, false, false, ResultCodeFormat::Verbose));
        assert_eq!(terse.prompt(), b"> ");
    }

    #[test]
    fn test_result_from_command_error() {
        assert_eq!(
            ResultCode::from(&CommandError::Unknown("+FOO".into())),
            ResultCode::Error
        );
        assert_eq!(
            ResultCode::from(&CommandError::ExtendedFailure(ExtendedError::Cms(304))),
            ResultCode::Extended(ExtendedError::Cms(304))
        );
    }

    #[test]
    fn test_parse_responses() {
        assert_eq!(Response::parse("OK"), Response::Ok);
        assert_eq!(Response::parse("ERROR"), Response::Error);
        assert_eq!(
            Response::parse("+CMS ERROR: 305"),
            Response::Extended(ExtendedError::Cms(305))
        );
        assert_eq!(Response::parse(">"), Response::Prompt);
        let info = Response::parse("+CMGS: 1");
        assert_eq!(info.as_info(), Some("+CMGS: 1"));
        assert!(!info.is_final());
    }

    #[test]
    fn test_parse_numeric_finals() {
        assert_eq!(ResultCode::from_numeric(4), Some(ResultCode::Error));
        assert_eq!(ResultCode::from_numeric(7), None);
        assert_eq!(Response::parse("0"), Response::Info("0".to_string()));
        assert_eq!(Response::parse_numeric("0"), Response::Ok);
        assert_eq!(Response::parse_numeric("4"), Response::Error);
        assert_eq!(Response::parse_numeric("OK"), Response::Ok);
        assert_eq!(
            Response::parse_numeric("+CSQ: 15,99"),
            Response::Info("+CSQ: 15,99".to_string())
        );
    }
}
