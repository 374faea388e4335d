//! TCP pass-through server
//!
//! Lets remote clients override channel states and watch telemetry without
//! going through the host bus. The protocol is deliberately trivial: a
//! client sends `$<NAME>,<0|1>` and gets back `OK` or `ERROR`; the server
//! periodically pushes `+TPH,<temp>,<pressure>,<humidity>` to everyone
//! connected.
//!
//! The server is polled from the same cooperative loop as the driver and
//! routes every override through the driver's serialized command path;
//! clients never touch the board link directly.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use crate::bus::TelemetryReport;
use crate::protocol::SwitchDriver;

/// Reply sent after a successful override
pub const OK_REPLY: &[u8] = b"OK\r\n";

/// Reply sent for anything else
pub const ERROR_REPLY: &[u8] = b"ERROR\r\n";

/// Most bytes a client may buffer without completing a line
const MAX_CLIENT_LINE: usize = 256;

/// A parsed `$NAME,<0|1>` override line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideRequest {
    /// Channel name as the client sent it
    pub channel: String,
    /// Desired state
    pub on: bool,
}

/// Parse one client line into an override request
///
/// Surrounding whitespace is tolerated; everything else is strict. Values
/// other than exactly `0` or `1` are out of range.
pub fn parse_override_line(line: &str) -> Option<OverrideRequest> {
    let rest = line.trim().strip_prefix('$')?;
    let (name, value) = rest.split_once(',')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let on = match value.trim() {
        "0" => false,
        "1" => true,
        _ => return None,
    };
    Some(OverrideRequest {
        channel: name.to_string(),
        on,
    })
}

/// Render the periodic telemetry broadcast line
pub fn render_telemetry_broadcast(report: &TelemetryReport) -> String {
    format!(
        "+TPH,{:.2},{:.2},{:.2}\r\n",
        report.temperature_c, report.pressure_hpa, report.humidity_pct
    )
}

struct ClientSlot {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: Vec<u8>,
    dead: bool,
}

/// Non-blocking pass-through server, polled cooperatively
pub struct PassthroughServer {
    listener: TcpListener,
    clients: Vec<ClientSlot>,
}

impl PassthroughServer {
    /// Bind the listening socket
    pub fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            clients: Vec::new(),
        })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Number of connected clients
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Accept new clients and service pending override lines
    ///
    /// Every valid override goes through `driver.set_channel_index`; the
    /// reply reflects whether the transmission actually happened.
    pub fn poll(&mut self, driver: &mut SwitchDriver) {
        self.accept_clients();

        for client in &mut self.clients {
            client.service(driver);
        }
        self.clients.retain(|c| !c.dead);
    }

    /// Push a telemetry line to every connected client
    pub fn broadcast(&mut self, report: &TelemetryReport) {
        let line = render_telemetry_broadcast(report);
        for client in &mut self.clients {
            if client.stream.write_all(line.as_bytes()).is_err() {
                client.dead = true;
            }
        }
        self.clients.retain(|c| !c.dead);
    }

    fn accept_clients(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if stream.set_nonblocking(true).is_err() {
                        continue;
                    }
                    tracing::info!(%peer, "pass-through client connected");
                    self.clients.push(ClientSlot {
                        stream,
                        peer,
                        buffer: Vec::new(),
                        dead: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::warn!(error = %e, "pass-through accept failed");
                    break;
                }
            }
        }
    }
}

impl ClientSlot {
    fn service(&mut self, driver: &mut SwitchDriver) {
        let mut buf = [0u8; 256];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    tracing::info!(peer = %self.peer, "pass-through client disconnected");
                    self.dead = true;
                    return;
                }
                Ok(n) => self.buffer.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::warn!(peer = %self.peer, error = %e, "pass-through read failed");
                    self.dead = true;
                    return;
                }
            }
        }

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                continue;
            }
            self.answer(line, driver);
            if self.dead {
                return;
            }
        }

        // A client spewing unterminated garbage gets cut off
        if self.buffer.len() > MAX_CLIENT_LINE {
            tracing::warn!(peer = %self.peer, "pass-through client flooding, dropping");
            self.dead = true;
        }
    }

    fn answer(&mut self, line: &str, driver: &mut SwitchDriver) {
        let applied = parse_override_line(line).is_some_and(|req| {
            match driver.channels().resolve_name(&req.channel) {
                Some(index) => driver.set_channel_index(index, req.on).is_ok(),
                None => false,
            }
        });

        let reply = if applied { OK_REPLY } else { ERROR_REPLY };
        if self.stream.write_all(reply).is_err() {
            self.dead = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_override() {
        assert_eq!(
            parse_override_line("$WIFI,1"),
            Some(OverrideRequest {
                channel: "WIFI".to_string(),
                on: true,
            })
        );
        assert_eq!(
            parse_override_line("  $GPS,0  "),
            Some(OverrideRequest {
                channel: "GPS".to_string(),
                on: false,
            })
        );
        assert_eq!(
            parse_override_line("$GSM/SAT, 1"),
            Some(OverrideRequest {
                channel: "GSM/SAT".to_string(),
                on: true,
            })
        );
    }

    #[test]
    fn test_parse_out_of_range_value() {
        assert_eq!(parse_override_line("$WIFI,7"), None);
        assert_eq!(parse_override_line("$WIFI,on"), None);
        assert_eq!(parse_override_line("$WIFI,"), None);
        assert_eq!(parse_override_line("$WIFI,01"), None);
    }

    #[test]
    fn test_parse_malformed_line() {
        assert_eq!(parse_override_line(""), None);
        assert_eq!(parse_override_line("WIFI,1"), None);
        assert_eq!(parse_override_line("$,1"), None);
        assert_eq!(parse_override_line("$WIFI"), None);
    }

    #[test]
    fn test_render_broadcast() {
        let report = TelemetryReport {
            temperature_c: 25.0,
            pressure_hpa: 1013.0,
            humidity_pct: 40.5,
            vin_v: 12.1,
            rail5_v: 5.0,
        };
        assert_eq!(
            render_telemetry_broadcast(&report),
            "+TPH,25.00,1013.00,40.50\r\n"
        );
    }
}
