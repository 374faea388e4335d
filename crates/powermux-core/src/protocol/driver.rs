//! Driver orchestration
//!
//! Owns the board link and composes the protocol pieces: periodic status
//! queries go out, raw bytes come back through the framer and decoder, and
//! decoded frames land in the channel model and telemetry cache. External
//! channel-control requests share the same `&mut self` command path, so
//! writes to the link never interleave mid-command.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::channels::{ChannelBank, ChannelConfig, SlotMapping};
use super::commands::{Command, WireFormat};
use super::frame::{self, Frame};
use super::framer::LineFramer;
use super::serial::open_board_port;
use super::stream::{CommChannel, ReadEvent, SerialChannel};
use super::{ProtocolError, DEFAULT_BAUD_RATE};
use crate::bus::{ChannelStateRecord, SwitchOp, SwitchRequest, TelemetryReport};
use crate::gpio::ResetLine;
use crate::telemetry::TelemetryCache;

/// Reads attempted per tick before yielding back to the caller
///
/// Bounds tick latency when the board streams continuously.
const MAX_READS_PER_TICK: usize = 4;

/// Driver lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverState {
    /// Constructed, channels not yet initialized
    Idle,
    /// Driving reset lines and channel defaults
    Initializing,
    /// Steady-state poll loop
    Running,
}

impl DriverState {
    fn name(self) -> &'static str {
        match self {
            DriverState::Idle => "Idle",
            DriverState::Initializing => "Initializing",
            DriverState::Running => "Running",
        }
    }
}

/// Driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Serial port name
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Period between status queries, in milliseconds
    pub query_period_ms: u64,
    /// Timeout bounding each poll read, in milliseconds
    pub read_timeout_ms: u64,
    /// Age beyond which cached telemetry is withheld, in milliseconds
    pub staleness_ms: u64,
    /// Wire dialect the board firmware speaks
    pub wire_format: WireFormat,
    /// How channels are matched to hardware slots
    pub mapping: SlotMapping,
    /// Channel declarations
    pub channels: Vec<ChannelConfig>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            query_period_ms: 10_000,
            read_timeout_ms: 50,
            staleness_ms: 10_000,
            wire_format: WireFormat::default(),
            mapping: SlotMapping::default(),
            channels: Vec::new(),
        }
    }
}

impl DriverConfig {
    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, ProtocolError> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| ProtocolError::InvalidConfig(e.to_string()))
    }

    /// Period between status queries
    pub fn query_period(&self) -> Duration {
        Duration::from_millis(self.query_period_ms)
    }

    /// Timeout bounding each poll read
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Telemetry staleness threshold
    pub fn staleness(&self) -> Duration {
        Duration::from_millis(self.staleness_ms)
    }
}

/// The switch board driver
///
/// Single logical stream of control: an external scheduler calls
/// [`SwitchDriver::tick`] periodically, and control requests arrive through
/// [`SwitchDriver::set_channel`] / [`SwitchDriver::handle_request`] on the
/// same thread of execution.
pub struct SwitchDriver {
    link: Box<dyn CommChannel>,
    state: DriverState,
    config: DriverConfig,
    bank: ChannelBank,
    framer: LineFramer,
    telemetry: TelemetryCache,
    resets: Vec<Option<Box<dyn ResetLine>>>,
    last_query: Option<Instant>,
    /// Metrics: cumulative bytes sent & received, frames decoded & dropped
    tx_bytes: u64,
    rx_bytes: u64,
    frames_decoded: u64,
    frames_dropped: u64,
}

impl SwitchDriver {
    /// Create a driver over an already-established link
    pub fn new(config: DriverConfig, link: Box<dyn CommChannel>) -> Result<Self, ProtocolError> {
        let bank = ChannelBank::new(&config.channels, config.mapping)?;
        let reset_count = bank.len();
        Ok(Self {
            link,
            state: DriverState::Idle,
            config,
            bank,
            framer: LineFramer::new(),
            telemetry: TelemetryCache::new(),
            resets: (0..reset_count).map(|_| None).collect(),
            last_query: None,
            tx_bytes: 0,
            rx_bytes: 0,
            frames_decoded: 0,
            frames_dropped: 0,
        })
    }

    /// Open the configured serial port and create a driver over it
    pub fn open(config: DriverConfig) -> Result<Self, ProtocolError> {
        let port = open_board_port(&config.port_name, config.baud_rate, config.read_timeout())?;
        Self::new(config, Box::new(SerialChannel::new(port)))
    }

    /// Supply the reset line for a channel, before initialization
    pub fn attach_reset_line(
        &mut self,
        channel: &str,
        line: Box<dyn ResetLine>,
    ) -> Result<(), ProtocolError> {
        if self.state != DriverState::Idle {
            return Err(ProtocolError::WrongState {
                state: self.state.name(),
                expected: "Idle",
            });
        }
        let index = self
            .bank
            .index_of(channel)
            .ok_or_else(|| ProtocolError::UnknownChannel(channel.to_string()))?;
        self.resets[index] = Some(line);
        Ok(())
    }

    /// Initialize the board: park reset lines, drive channel defaults
    ///
    /// Reset lines are driven to their inactive resting level exactly once,
    /// here, before any channel command is issued. On failure the driver
    /// returns to `Idle` so initialization can be retried.
    pub fn initialize(&mut self) -> Result<(), ProtocolError> {
        if self.state != DriverState::Idle {
            return Err(ProtocolError::WrongState {
                state: self.state.name(),
                expected: "Idle",
            });
        }
        self.state = DriverState::Initializing;

        match self.initialize_inner() {
            Ok(()) => {
                self.state = DriverState::Running;
                tracing::info!(channels = self.bank.len(), "driver running");
                Ok(())
            }
            Err(e) => {
                self.state = DriverState::Idle;
                Err(e)
            }
        }
    }

    fn initialize_inner(&mut self) -> Result<(), ProtocolError> {
        self.link.set_timeout(self.config.read_timeout())?;
        self.link.clear_input()?;

        for (index, reset) in self.resets.iter_mut().enumerate() {
            if let Some(line) = reset {
                let level = self.config.channels[index].reset_active;
                line.set_direction_output()?;
                line.set_value(level.inactive_value())?;
                tracing::info!(
                    channel = %self.config.channels[index].name,
                    "reset line parked inactive"
                );
            }
        }

        for index in 0..self.bank.len() {
            let default_state = self.config.channels[index].default_state;
            self.send_set(index, default_state)?;
        }
        Ok(())
    }

    /// Current lifecycle state
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Driver configuration
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// The channel model
    pub fn channels(&self) -> &ChannelBank {
        &self.bank
    }

    /// The telemetry cache
    pub fn telemetry(&self) -> &TelemetryCache {
        &self.telemetry
    }

    /// Cumulative tx bytes, rx bytes, frames decoded, frames dropped
    pub fn counters(&self) -> (u64, u64, u64, u64) {
        (
            self.tx_bytes,
            self.rx_bytes,
            self.frames_decoded,
            self.frames_dropped,
        )
    }

    /// One iteration of the running-state loop
    ///
    /// Sends the periodic status query when due, then drains whatever the
    /// board has written. Read timeouts are normal and silent; a transport
    /// error propagates, since it means the link is gone.
    pub fn tick(&mut self) -> Result<(), ProtocolError> {
        if self.state != DriverState::Running {
            return Err(ProtocolError::WrongState {
                state: self.state.name(),
                expected: "Running",
            });
        }

        let query_due = match self.last_query {
            None => true,
            Some(at) => at.elapsed() >= self.config.query_period(),
        };
        if query_due {
            self.query_status()?;
        }

        self.poll_input()
    }

    /// Send the status query now, regardless of the period
    ///
    /// Fire-and-forget: the reply arrives asynchronously through the normal
    /// read path.
    pub fn query_status(&mut self) -> Result<(), ProtocolError> {
        self.send(Command::QueryStatus)?;
        self.last_query = Some(Instant::now());
        Ok(())
    }

    /// Set a channel by display name
    pub fn set_channel(&mut self, name: &str, on: bool) -> Result<(), ProtocolError> {
        let index = self
            .bank
            .index_of(name)
            .ok_or_else(|| ProtocolError::UnknownChannel(name.to_string()))?;
        self.set_channel_index(index, on)
    }

    /// Set a channel by declaration-order index
    pub fn set_channel_index(&mut self, index: usize, on: bool) -> Result<(), ProtocolError> {
        if self.state != DriverState::Running {
            return Err(ProtocolError::WrongState {
                state: self.state.name(),
                expected: "Running",
            });
        }
        self.send_set(index, on)
    }

    /// Handle a host bus request
    ///
    /// Scheduled operations are rejected: the board has no scheduler, and
    /// pretending otherwise would mislead the caller.
    pub fn handle_request(&mut self, request: &SwitchRequest) -> Result<(), ProtocolError> {
        match request.op {
            SwitchOp::TurnOn => self.set_channel(&request.channel, true),
            SwitchOp::TurnOff => self.set_channel(&request.channel, false),
            SwitchOp::ScheduledOn | SwitchOp::ScheduledOff => {
                tracing::warn!(channel = %request.channel, "scheduled switching not supported");
                Err(ProtocolError::Unsupported("scheduled switching"))
            }
        }
    }

    /// One state record per channel, in declaration order
    pub fn channel_states(&self) -> Vec<ChannelStateRecord> {
        self.bank
            .channels()
            .iter()
            .map(|c| ChannelStateRecord {
                name: c.name().to_string(),
                state: c.state(),
                fault: c.fault(),
            })
            .collect()
    }

    /// Telemetry readings, if the cache is fresh enough to report
    pub fn telemetry_report(&self) -> Option<TelemetryReport> {
        if !self.telemetry.is_fresh(self.config.staleness()) {
            return None;
        }
        Some(TelemetryReport {
            temperature_c: self.telemetry.temperature_c(),
            pressure_hpa: self.telemetry.pressure_hpa(),
            humidity_pct: self.telemetry.humidity_pct(),
            vin_v: self.telemetry.vin_v(),
            rail5_v: self.telemetry.rail5_v(),
        })
    }

    /// Render and transmit a set command, recording the commanded state
    fn send_set(&mut self, index: usize, on: bool) -> Result<(), ProtocolError> {
        let slot = self
            .bank
            .channel(index)
            .ok_or(ProtocolError::ChannelIndexOutOfRange(index))?
            .slot();
        self.send(Command::Set { slot, on })?;
        self.bank.note_commanded(index, on);
        Ok(())
    }

    fn send(&mut self, command: Command) -> Result<(), ProtocolError> {
        let bytes = command.to_bytes(self.config.wire_format);
        tracing::debug!(tx = %String::from_utf8_lossy(&bytes).trim_end(), "sending command");
        self.link.write_all(&bytes)?;
        self.tx_bytes += bytes.len() as u64;
        Ok(())
    }

    /// Drain available input and apply every completed line
    fn poll_input(&mut self) -> Result<(), ProtocolError> {
        let mut buf = [0u8; 256];
        for _ in 0..MAX_READS_PER_TICK {
            match self.link.read_available(&mut buf)? {
                ReadEvent::Idle => break,
                ReadEvent::Data(n) => {
                    self.rx_bytes += n as u64;
                    self.framer.push(&buf[..n]);
                }
            }
        }

        for line in self.framer.drain_lines() {
            self.handle_line(&line);
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &str) {
        match frame::decode(line) {
            Some(Frame::Environment {
                temperature,
                pressure,
                humidity,
            }) => {
                self.telemetry
                    .record_environment(temperature, pressure, humidity);
                self.frames_decoded += 1;
            }
            Some(Frame::Analog { vin, rail5 }) => {
                self.telemetry.record_analog(vin, rail5);
                self.frames_decoded += 1;
            }
            Some(Frame::Status(word)) => {
                tracing::debug!(word = format_args!("{:#06x}", word), "status word");
                self.bank.apply_status_word(word);
                self.frames_decoded += 1;
            }
            Some(Frame::Fault(word)) => {
                if word != 0 {
                    tracing::warn!(word = format_args!("{:#06x}", word), "fault word");
                }
                self.bank.apply_fault_word(word);
                self.frames_decoded += 1;
            }
            None => {
                tracing::debug!(line, "dropping unrecognized line");
                self.frames_dropped += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::ActiveLevel;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Scripted link for testing the driver without hardware
    #[derive(Default)]
    struct MockState {
        reads: VecDeque<Vec<u8>>,
        written: Vec<u8>,
        fail_writes: bool,
    }

    #[derive(Clone)]
    struct MockLink(Arc<Mutex<MockState>>);

    impl MockLink {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(MockState::default())))
        }

        fn queue_read(&self, bytes: &[u8]) {
            self.0.lock().unwrap().reads.push_back(bytes.to_vec());
        }

        fn written(&self) -> Vec<u8> {
            self.0.lock().unwrap().written.clone()
        }

        fn set_fail_writes(&self, fail: bool) {
            self.0.lock().unwrap().fail_writes = fail;
        }
    }

    impl CommChannel for MockLink {
        fn read_available(&mut self, buf: &mut [u8]) -> io::Result<ReadEvent> {
            let mut state = self.0.lock().unwrap();
            match state.reads.pop_front() {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        let rest = chunk[n..].to_vec();
                        state.reads.push_front(rest);
                    }
                    Ok(ReadEvent::Data(n))
                }
                None => Ok(ReadEvent::Idle),
            }
        }

        fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
            let mut state = self.0.lock().unwrap();
            if state.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "port gone"));
            }
            state.written.extend_from_slice(bytes);
            Ok(())
        }

        fn set_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
            Ok(())
        }

        fn clear_input(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Reset line that records what was done to it
    #[derive(Clone, Default)]
    struct MockReset(Arc<Mutex<Vec<String>>>);

    impl ResetLine for MockReset {
        fn set_direction_output(&mut self) -> io::Result<()> {
            self.0.lock().unwrap().push("output".to_string());
            Ok(())
        }

        fn set_value(&mut self, value: bool) -> io::Result<()> {
            self.0.lock().unwrap().push(format!("value={}", value));
            Ok(())
        }
    }

    fn test_config() -> DriverConfig {
        DriverConfig {
            channels: vec![
                ChannelConfig {
                    name: "Wifi".to_string(),
                    default_state: true,
                    reset_pin: Some(17),
                    reset_active: ActiveLevel::High,
                },
                ChannelConfig::named("XBEE"),
                ChannelConfig::named("GPS"),
                ChannelConfig::named("ATMCLK"),
                ChannelConfig::named("GSM/SAT"),
            ],
            query_period_ms: 0,
            ..DriverConfig::default()
        }
    }

    fn running_driver() -> (SwitchDriver, MockLink) {
        let link = MockLink::new();
        let mut driver = SwitchDriver::new(test_config(), Box::new(link.clone())).unwrap();
        driver.initialize().unwrap();
        (driver, link)
    }

    #[test]
    fn test_initialize_drives_defaults_and_resets() {
        let link = MockLink::new();
        let reset = MockReset::default();
        let mut driver = SwitchDriver::new(test_config(), Box::new(link.clone())).unwrap();
        driver
            .attach_reset_line("Wifi", Box::new(reset.clone()))
            .unwrap();

        assert_eq!(driver.state(), DriverState::Idle);
        driver.initialize().unwrap();
        assert_eq!(driver.state(), DriverState::Running);

        // Reset parked before any command: output direction, then inactive level
        assert_eq!(*reset.0.lock().unwrap(), vec!["output", "value=false"]);

        let written = link.written();
        let text = String::from_utf8(written).unwrap();
        assert_eq!(
            text,
            "WIFI_SW=1\r\nXBEE_SW=0\r\nGPS_SW=0\r\nATM_CLK_SW=0\r\nSAT_GSM_SW=0\r\n"
        );

        // Commanded defaults are reflected until the board says otherwise
        assert!(driver.channels().get("Wifi").unwrap().state());
        assert!(!driver.channels().get("GPS").unwrap().state());
    }

    #[test]
    fn test_tick_queries_and_applies_status() {
        let (mut driver, link) = running_driver();
        link.queue_read(b"* STATUS: WORD=0185\r\n");
        driver.tick().unwrap();

        assert!(link.written().ends_with(b"STATUS_WORD?\r\n"));
        assert!(driver.channels().get("Wifi").unwrap().state());
        assert!(driver.channels().get("XBEE").unwrap().state());
        assert!(!driver.channels().get("GPS").unwrap().state());
        assert!(!driver.channels().get("ATMCLK").unwrap().state());
        assert!(!driver.channels().get("GSM/SAT").unwrap().state());
    }

    #[test]
    fn test_fragmented_frames_across_ticks() {
        let (mut driver, link) = running_driver();
        link.queue_read(b"* BME280: T=25.00 P=1013");
        driver.tick().unwrap();
        assert_eq!(driver.telemetry().last_valid_update(), None);

        link.queue_read(b"00.00 H=40.00\r\n");
        driver.tick().unwrap();
        assert_eq!(driver.telemetry().pressure_hpa(), 1013.0);
        assert_eq!(driver.telemetry().temperature_c(), 25.0);
        assert!(driver.telemetry().last_valid_update().is_some());
    }

    #[test]
    fn test_malformed_telemetry_leaves_cache_untouched() {
        let (mut driver, link) = running_driver();
        link.queue_read(b"* BME280: T=25.00 P=bad H=40.00\r\n");
        driver.tick().unwrap();

        assert_eq!(driver.telemetry().last_valid_update(), None);
        assert_eq!(driver.telemetry_report(), None);
        let (_, _, decoded, dropped) = driver.counters();
        assert_eq!(decoded, 0);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_telemetry_report_gated_on_freshness() {
        let (mut driver, link) = running_driver();
        assert_eq!(driver.telemetry_report(), None);

        link.queue_read(b"* BME280: T=25.00 P=101300.00 H=40.00\r\n");
        link.queue_read(b"* ADC: VIN_MON=12.10 5V_MON=5.02\r\n");
        driver.tick().unwrap();

        let report = driver.telemetry_report().expect("fresh cache");
        assert_eq!(report.temperature_c, 25.0);
        assert_eq!(report.pressure_hpa, 1013.0);
        assert_eq!(report.humidity_pct, 40.0);
        assert_eq!(report.vin_v, 12.10);
        assert_eq!(report.rail5_v, 5.02);
    }

    #[test]
    fn test_stale_telemetry_suppressed() {
        let link = MockLink::new();
        let config = DriverConfig {
            staleness_ms: 0,
            ..test_config()
        };
        let mut driver = SwitchDriver::new(config, Box::new(link.clone())).unwrap();
        driver.initialize().unwrap();

        link.queue_read(b"* BME280: T=25.00 P=101300.00 H=40.00\r\n");
        driver.tick().unwrap();
        std::thread::sleep(Duration::from_millis(5));

        // The reading is still cached, but too old to report
        assert_eq!(driver.telemetry().temperature_c(), 25.0);
        assert_eq!(driver.telemetry_report(), None);
    }

    #[test]
    fn test_fault_word_applies_to_all_channels() {
        let (mut driver, link) = running_driver();
        link.queue_read(b"* FAULTS: WORD=0040\r\n");
        driver.tick().unwrap();

        assert_eq!(driver.channels().get("GSM/SAT").unwrap().fault(), Some(true));
        assert_eq!(driver.channels().get("Wifi").unwrap().fault(), Some(false));
    }

    #[test]
    fn test_set_channel_writes_command() {
        let (mut driver, link) = running_driver();
        driver.set_channel("GPS", true).unwrap();
        assert!(link.written().ends_with(b"GPS_SW=1\r\n"));
        assert!(driver.channels().get("GPS").unwrap().state());
    }

    #[test]
    fn test_set_channel_unknown_name() {
        let (mut driver, _link) = running_driver();
        let err = driver.set_channel("NOPE", true).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownChannel(_)));
    }

    #[test]
    fn test_set_channel_write_failure_surfaces() {
        let (mut driver, link) = running_driver();
        link.set_fail_writes(true);
        assert!(driver.set_channel("Wifi", false).is_err());
        // State still reflects the last successful command
        assert!(driver.channels().get("Wifi").unwrap().state());
    }

    #[test]
    fn test_tick_requires_running() {
        let link = MockLink::new();
        let mut driver = SwitchDriver::new(test_config(), Box::new(link)).unwrap();
        let err = driver.tick().unwrap_err();
        assert!(matches!(err, ProtocolError::WrongState { .. }));
    }

    #[test]
    fn test_scheduled_request_rejected() {
        let (mut driver, link) = running_driver();
        let before = link.written().len();
        let err = driver
            .handle_request(&SwitchRequest {
                channel: "Wifi".to_string(),
                op: SwitchOp::ScheduledOn,
            })
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Unsupported(_)));
        assert_eq!(link.written().len(), before, "nothing transmitted");
    }

    #[test]
    fn test_turn_on_off_requests() {
        let (mut driver, link) = running_driver();
        driver
            .handle_request(&SwitchRequest {
                channel: "XBEE".to_string(),
                op: SwitchOp::TurnOn,
            })
            .unwrap();
        assert!(link.written().ends_with(b"XBEE_SW=1\r\n"));

        driver
            .handle_request(&SwitchRequest {
                channel: "XBEE".to_string(),
                op: SwitchOp::TurnOff,
            })
            .unwrap();
        assert!(link.written().ends_with(b"XBEE_SW=0\r\n"));
    }

    #[test]
    fn test_channel_states_snapshot() {
        let (mut driver, link) = running_driver();
        link.queue_read(b"* STATUS: WORD=0101\r\n");
        driver.tick().unwrap();

        let states = driver.channel_states();
        assert_eq!(states.len(), 5);
        assert_eq!(states[0].name, "Wifi");
        assert!(states[0].state, "bit 8 set");
        assert!(states[1].state, "bit 0 set");
        assert!(!states[2].state);
        assert_eq!(states[0].fault, None);
    }

    #[test]
    fn test_legacy_wire_format() {
        let link = MockLink::new();
        let config = DriverConfig {
            wire_format: WireFormat::LegacyLetter,
            ..test_config()
        };
        let mut driver = SwitchDriver::new(config, Box::new(link.clone())).unwrap();
        driver.initialize().unwrap();

        let text = String::from_utf8(link.written()).unwrap();
        assert_eq!(text, "W\r\nx\r\ng\r\nc\r\ns\r\n");
    }

    #[test]
    fn test_counters_track_traffic() {
        let (mut driver, link) = running_driver();
        let (tx0, rx0, _, _) = driver.counters();
        assert!(tx0 > 0, "initialization commands were sent");
        assert_eq!(rx0, 0);

        link.queue_read(b"* STATUS: WORD=0000\r\n");
        driver.tick().unwrap();
        let (_, rx1, decoded, _) = driver.counters();
        assert_eq!(rx1, 21);
        assert_eq!(decoded, 1);
    }
}
