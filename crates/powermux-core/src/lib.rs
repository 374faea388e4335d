//! # PowerMux Core Library
//!
//! Driver for the PowerMux power-switch board: a small microcontroller
//! board that switches a handful of power rails and reports environmental
//! telemetry over a serial line.

#![warn(missing_docs)]

//!
//! This library provides:
//! - Line framing and frame decoding for the board's serial protocol
//! - A channel model mapping configured channels to hardware switch slots
//! - Command encoding for both board firmware dialects
//! - A polled driver that keeps channel state and telemetry current
//! - An optional TCP pass-through server for remote overrides
//!
//! ## Example
//!
//! ```rust,ignore
//! use powermux_core::prelude::*;
//!
//! let config = DriverConfig {
//!     port_name: "/dev/ttymxc6".to_string(),
//!     channels: vec![
//!         ChannelConfig::named("Wifi"),
//!         ChannelConfig::named("XBEE"),
//!     ],
//!     ..DriverConfig::default()
//! };
//!
//! let mut driver = SwitchDriver::open(config)?;
//! driver.initialize()?;
//!
//! loop {
//!     driver.tick()?;
//!     if let Some(report) = driver.telemetry_report() {
//!         println!("{:.1} degC", report.temperature_c);
//!     }
//! }
//! ```

pub mod bus;
pub mod gpio;
pub mod passthrough;
pub mod protocol;
pub mod telemetry;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bus::{ChannelStateRecord, SwitchOp, SwitchRequest, TelemetryReport};
    pub use crate::gpio::{ActiveLevel, ResetLine};
    pub use crate::passthrough::PassthroughServer;
    pub use crate::protocol::{
        ChannelConfig, CommChannel, DriverConfig, DriverState, ProtocolError, SlotMapping,
        SwitchDriver, WireFormat,
    };
    pub use crate::telemetry::TelemetryCache;
}
