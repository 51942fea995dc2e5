//! Byte transport between a session and its host.

use std::collections::VecDeque;
use std::io;

/// A bidirectional byte channel to the host.
///
/// `read` blocks until at least one byte is available or an implementation
/// defined timeout elapses; a timeout is reported as an empty read. A closed
/// channel is reported as [`io::ErrorKind::UnexpectedEof`].
pub trait Transport {
    /// Read up to `max` bytes.
    fn read(&mut self, max: usize) -> io::Result<Vec<u8>>;

    /// Write some of `data`, returning how many bytes were taken.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Write all of `data`.
    fn write_all(&mut self, mut data: &[u8]) -> io::Result<()> {
        while !data.is_empty() {
            match self.write(data)? {
                0 => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "transport accepted no bytes",
                    ))
                }
                n => data = &data[n..],
            }
        }
        Ok(())
    }
}

/// In-memory transport with scripted input and captured output.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inbound: VecDeque<Vec<u8>>,
    outbound: Vec<u8>,
    closed: bool,
}

impl MemoryTransport {
    /// Create an open transport with no pending input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport that yields `chunks` in order and then reports EOF.
    pub fn scripted<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        MemoryTransport {
            inbound: chunks.into_iter().map(|c| c.as_ref().to_vec()).collect(),
            outbound: Vec::new(),
            closed: true,
        }
    }

    /// Queue bytes for a later `read`.
    pub fn push_input(&mut self, data: &[u8]) {
        self.inbound.push_back(data.to_vec());
    }

    /// Report EOF once queued input is drained.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Everything written so far.
    pub fn output(&self) -> &[u8] {
        &self.outbound
    }

    /// Everything written so far, lossily decoded.
    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.outbound).into_owned()
    }

    /// Take and clear the captured output.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }
}

impl Transport for MemoryTransport {
    fn read(&mut self, max: usize) -> io::Result<Vec<u8>> {
        match self.inbound.pop_front() {
            Some(mut chunk) => {
                if chunk.len() > max {
                    let rest = chunk.split_off(max);
                    self.inbound.push_front(rest);
                }
                Ok(chunk)
            }
            None if self.closed => Err(io::ErrorKind::UnexpectedEof.into()),
            None => Ok(Vec::new()),
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.outbound.extend_from_slice(data);
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_reads() {
        let mut transport = MemoryTransport::scripted([&b"ABCDE"[..], &b"F"[..]]);
        assert_eq!(transport.read(3).unwrap(), b"ABC");
        assert_eq!(transport.read(3).unwrap(), b"DE");
        assert_eq!(transport.read(3).unwrap(), b"F");
        assert_eq!(
            transport.read(3).unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn test_open_transport_times_out() {
        let mut transport = MemoryTransport::new();
        assert!(transport.read(8).unwrap().is_empty());
        transport.push_input(b"AT\r");
        transport.close();
        assert_eq!(transport.read(8).unwrap(), b"AT\r");
        assert!(transport.read(8).is_err());
    }

    #[test]
    fn test_output_capture() {
        let mut transport = MemoryTransport::new();
        transport.write_all(b"OK\r\n").unwrap();
        assert_eq!(transport.output_str(), "OK\r\n");
        assert_eq!(transport.take_output(), b"OK\r\n");
        assert!(transport.output().is_empty());
    }
}
