//! Host side: send an AT command to an emulated modem and collect the reply.

use std::time::Duration;

use atsim_protocol::{CommandLine, LineFramer, Response, ResultCodeFormat};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{Result, RunnerError};

/// Default time to wait for each chunk of a reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything received for one command.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    /// Received lines in order, without terminators. Includes the echo.
    pub lines: Vec<String>,
    /// The final result code.
    pub result: Response,
}

impl Exchange {
    /// Information lines: everything but the echo of `command` and the result.
    pub fn info<'a>(&'a self, command: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let body = self.lines.len().saturating_sub(1);
        self.lines[..body]
            .iter()
            .map(String::as_str)
            .filter(move |line| *line != command)
    }
}

/// A connection to one emulated modem.
pub struct AtClient {
    stream: TcpStream,
    framer: LineFramer,
    timeout: Duration,
    /// Result-code format the modem is believed to use.
    format: ResultCodeFormat,
}

impl AtClient {
    /// Connect to `host:port`.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(AtClient {
            stream,
            framer: LineFramer::new(),
            timeout: DEFAULT_TIMEOUT,
            format: ResultCodeFormat::Verbose,
        })
    }

    /// Change the per-read timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `command` and wait for its final result code.
    ///
    /// When the modem prompts for a message body, `message` is sent followed
    /// by Ctrl-Z; without a message the body is left empty.
    pub async fn send(&mut self, command: &str, message: Option<&str>) -> Result<Exchange> {
        debug!("-> {:?}", command);
        self.stream
            .write_all(&LineFramer::encode_command(command))
            .await?;
        let format = expected_format(command, self.format);

        let mut lines = Vec::new();
        let mut buf = [0u8; 512];
        loop {
            while let Some(line) = self.framer.next_line() {
                debug!("<- {:?}", line);
                let response = match format {
                    ResultCodeFormat::Numeric => Response::parse_numeric(&line),
                    ResultCodeFormat::Verbose => Response::parse(&line),
                };
                if response.is_final() {
                    self.track_format(&line, &response);
                    lines.push(line);
                    return Ok(Exchange {
                        lines,
                        result: response,
                    });
                }
                lines.push(line);
            }
            if self.framer.take_prompt() {
                debug!("<- prompt");
                let body = LineFramer::encode_body(message.unwrap_or(""));
                self.stream.write_all(&body).await?;
                continue;
            }

            let n = tokio::time::timeout(self.timeout, self.stream.read(&mut buf))
                .await
                .map_err(|_| RunnerError::Timeout)??;
            if n == 0 {
                return Err(RunnerError::ConnectionClosed);
            }
            self.framer.push(&buf[..n]);
        }
    }

    /// Follow the format of the final code actually received. Extended codes
    /// are verbose in both formats and tell nothing.
    fn track_format(&mut self, line: &str, response: &Response) {
        if matches!(response, Response::Ok | Response::Error) {
            self.format = if Response::parse(line).is_final() {
                ResultCodeFormat::Verbose
            } else {
                ResultCodeFormat::Numeric
            };
        }
    }
}

/// Result-code format the reply to `command` will use, given the current one.
fn expected_format(command: &str, current: ResultCodeFormat) -> ResultCodeFormat {
    let Ok(line) = CommandLine::parse(command) else {
        return current;
    };
    line.commands()
        .iter()
        .fold(current, |format, cmd| match cmd.identifier() {
            "V" | "V0" => ResultCodeFormat::Numeric,
            "V1" => ResultCodeFormat::Verbose,
            _ => format,
        })
}

/// Connect, send `commands` in order over one connection and disconnect.
///
/// `message` answers every body prompt. Stops at the first transport error.
pub async fn send_commands(
    host: &str,
    port: u16,
    commands: &[String],
    message: Option<&str>,
    timeout: Duration,
) -> Result<Vec<Exchange>> {
    let mut client = AtClient::connect(host, port).await?.with_timeout(timeout);
    let mut exchanges = Vec::with_capacity(commands.len());
    for command in commands {
        exchanges.push(client.send(command, message).await?);
    }
    Ok(exchanges)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_format_follows_v_commands() {
        use ResultCodeFormat::{Numeric, Verbose};
        assert_eq!(expected_format("ATV0", Verbose), Numeric);
        assert_eq!(expected_format("ATE0;V", Verbose), Numeric);
        assert_eq!(expected_format("atv1", Numeric), Verbose);
        assert_eq!(expected_format("AT+CSQ", Numeric), Numeric);
        assert_eq!(expected_format("hello", Verbose), Verbose);
    }

    #[test]
    fn test_info_skips_echo_and_result() {
        let exchange = Exchange {
            lines: vec!["ATI2".to_string(), "0".to_string(), "OK".to_string()],
            result: Response::Ok,
        };
        assert_eq!(exchange.info("ATI2").collect::<Vec<_>>(), vec!["0"]);
    }
}
