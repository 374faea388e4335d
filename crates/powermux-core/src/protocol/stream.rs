//! Board link abstraction
//!
//! The protocol engine talks to the board through [`CommChannel`], a small
//! capability trait implemented for serial ports and TCP streams (the board
//! is sometimes reached through a serial-over-TCP bridge). Read timeouts
//! are an expected condition on a polled link, so they surface as
//! [`ReadEvent::Idle`] rather than as errors; only genuine I/O failures
//! (the link going away) come back as `Err`.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// Outcome of a bounded read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEvent {
    /// `n` bytes were placed at the front of the buffer
    Data(usize),
    /// Nothing arrived before the timeout
    Idle,
}

/// Abstraction for the board link (serial or TCP)
pub trait CommChannel: Send {
    /// Read whatever bytes are available within the configured timeout
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<ReadEvent>;

    /// Write a complete command; partial writes are not acceptable mid-command
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Set the timeout bounding subsequent reads
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Discard any unread input
    fn clear_input(&mut self) -> io::Result<()>;
}

/// Serial port implementing [`CommChannel`]
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Wrap an already-opened serial port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl CommChannel for SerialChannel {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<ReadEvent> {
        match self.port.read(buf) {
            Ok(0) => Ok(ReadEvent::Idle),
            Ok(n) => Ok(ReadEvent::Data(n)),
            Err(e) if is_timeout(&e) => Ok(ReadEvent::Idle),
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

/// TCP stream implementing [`CommChannel`]
pub struct TcpChannel {
    stream: TcpStream,
}

impl TcpChannel {
    /// Wrap a connected stream
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl CommChannel for TcpChannel {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<ReadEvent> {
        match self.stream.read(buf) {
            // EOF means the bridge hung up; that is a dead link, not idleness
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "link closed by peer",
            )),
            Ok(n) => Ok(ReadEvent::Data(n)),
            Err(e) if is_timeout(&e) => Ok(ReadEvent::Idle),
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.stream.set_read_timeout(Some(timeout))?;
        self.stream.set_write_timeout(Some(timeout))
    }

    fn clear_input(&mut self) -> io::Result<()> {
        // No clear-buffer syscall for sockets; drain with non-blocking reads
        self.stream.set_nonblocking(true)?;
        let mut buf = [0u8; 1024];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    let _ = self.stream.set_nonblocking(false);
                    return Err(e);
                }
            }
        }
        self.stream.set_nonblocking(false)
    }
}

/// Timeout-shaped errors that mean "no data yet" on a polled link
fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
