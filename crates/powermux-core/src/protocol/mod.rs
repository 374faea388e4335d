//! Switch board serial protocol
//!
//! Implements the line-oriented protocol spoken by the PowerMux switch
//! board: channel set commands and status queries go out, tagged telemetry
//! and status/fault bitword lines come back.
//!
//! Two firmware generations speak incompatible command dialects; see
//! [`WireFormat`].

pub mod channels;
pub mod commands;
mod driver;
mod error;
pub mod frame;
pub mod framer;
pub mod serial;
pub mod stream;

pub use channels::{
    Channel, ChannelBank, ChannelConfig, SlotMapping, SwitchSlot, MAX_CHANNELS, SWITCH_SLOTS,
};
pub use commands::{Command, WireFormat, STATUS_QUERY};
pub use driver::{DriverConfig, DriverState, SwitchDriver};
pub use error::ProtocolError;
pub use frame::Frame;
pub use framer::LineFramer;
pub use stream::{CommChannel, ReadEvent, SerialChannel, TcpChannel};

use std::time::Duration;

/// Default baud rate for the board link
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default timeout bounding each poll read
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Line terminator on the wire, both directions
pub const LINE_TERMINATOR: &str = "\r\n";

/// Maximum length of one buffered line
///
/// The board's own line buffer is this size; anything longer is noise.
pub const MAX_LINE_LENGTH: usize = 256;
