//! Protocol errors

use thiserror::Error;

/// Errors that can occur while driving the switch board
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Driver is in state {state}, expected {expected}")]
    WrongState {
        /// State the driver was actually in
        state: &'static str,
        /// State the operation requires
        expected: &'static str,
    },

    #[error("Unknown channel: '{0}'")]
    UnknownChannel(String),

    #[error("Channel index {0} out of range")]
    ChannelIndexOutOfRange(usize),

    #[error("Too many channels: {count} configured, board has {max} slots")]
    TooManyChannels {
        /// Number of channels in the configuration
        count: usize,
        /// Number of slots the board exposes
        max: usize,
    },

    #[error("Duplicate channel name: '{0}'")]
    DuplicateChannel(String),

    #[error("Channel '{0}' matches no hardware slot token")]
    UnmappedChannel(String),

    #[error("Channels '{first}' and '{second}' both map to slot {token}")]
    AmbiguousMapping {
        /// Slot token both channels resolved to
        token: &'static str,
        /// Name of the channel that claimed the slot first
        first: String,
        /// Name of the conflicting channel
        second: String,
    },

    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
