//! Host bus message shapes
//!
//! The driver sits under a host message bus that sends channel-control
//! requests down and expects channel-state and telemetry records back.
//! The bus itself is the host's concern; these are the typed shapes that
//! cross the boundary.

use serde::{Deserialize, Serialize};

/// Requested operation on a power channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchOp {
    /// Switch the channel on now
    TurnOn,
    /// Switch the channel off now
    TurnOff,
    /// Switch on at a scheduled time (not supported by this board)
    ScheduledOn,
    /// Switch off at a scheduled time (not supported by this board)
    ScheduledOff,
}

/// Inbound request to change one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchRequest {
    /// Target channel display name
    pub channel: String,
    /// Operation to perform
    pub op: SwitchOp,
}

/// Snapshot of one channel's last known state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStateRecord {
    /// Channel display name
    pub name: String,
    /// Last known on/off state
    pub state: bool,
    /// Last decoded fault bit, if a fault word has been seen
    pub fault: Option<bool>,
}

/// Environmental and electrical readings ready for dispatch
///
/// Only produced while the telemetry cache is fresh; pressure is already
/// converted to hPa here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReport {
    /// Temperature in degrees Celsius
    pub temperature_c: f64,
    /// Pressure in hectopascals
    pub pressure_hpa: f64,
    /// Relative humidity in percent
    pub humidity_pct: f64,
    /// Supply input voltage in volts
    pub vin_v: f64,
    /// 5 V rail voltage in volts
    pub rail5_v: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_request_roundtrips_through_json() {
        let req = SwitchRequest {
            channel: "Wifi".to_string(),
            op: SwitchOp::TurnOn,
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: SwitchRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req, back);
    }
}
