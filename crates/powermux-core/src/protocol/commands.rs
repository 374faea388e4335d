//! Command encoding
//!
//! Renders driver requests into the exact byte sequences the board expects.
//! Two firmware generations speak incompatible dialects; [`WireFormat`]
//! selects one explicitly. There is no negotiation on the wire, so the
//! driver never tries to guess.

use serde::{Deserialize, Serialize};

use super::channels::SwitchSlot;
use super::LINE_TERMINATOR;

/// Wire dialect spoken by the board firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WireFormat {
    /// `<TOKEN>_SW=<0|1>` assignments (current firmware)
    #[default]
    Token,
    /// One letter per slot, uppercase = on, lowercase = off (early firmware)
    LegacyLetter,
}

/// The fixed status-query command
pub const STATUS_QUERY: &[u8] = b"STATUS_WORD?\r\n";

/// A command addressed to the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Switch a hardware slot on or off
    Set {
        /// Target slot
        slot: &'static SwitchSlot,
        /// Desired state
        on: bool,
    },
    /// Ask for a fresh `* STATUS:` frame
    QueryStatus,
}

impl Command {
    /// Render the command to wire bytes
    ///
    /// Encoding cannot fail; only the transport write can.
    pub fn to_bytes(&self, format: WireFormat) -> Vec<u8> {
        match self {
            Command::Set { slot, on } => match format {
                WireFormat::Token => {
                    format!("{}={}{}", slot.command, u8::from(*on), LINE_TERMINATOR).into_bytes()
                }
                WireFormat::LegacyLetter => {
                    let letter = if *on {
                        slot.legacy.to_ascii_uppercase()
                    } else {
                        slot.legacy.to_ascii_lowercase()
                    };
                    let mut bytes = vec![letter];
                    bytes.extend_from_slice(LINE_TERMINATOR.as_bytes());
                    bytes
                }
            },
            Command::QueryStatus => STATUS_QUERY.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::channels::SWITCH_SLOTS;

    #[test]
    fn test_token_set_encoding() {
        let on = Command::Set {
            slot: &SWITCH_SLOTS[0],
            on: true,
        };
        assert_eq!(on.to_bytes(WireFormat::Token), b"WIFI_SW=1\r\n");

        let off = Command::Set {
            slot: &SWITCH_SLOTS[3],
            on: false,
        };
        assert_eq!(off.to_bytes(WireFormat::Token), b"ATM_CLK_SW=0\r\n");
    }

    #[test]
    fn test_legacy_letter_encoding() {
        let on = Command::Set {
            slot: &SWITCH_SLOTS[0],
            on: true,
        };
        assert_eq!(on.to_bytes(WireFormat::LegacyLetter), b"W\r\n");

        let off = Command::Set {
            slot: &SWITCH_SLOTS[4],
            on: false,
        };
        assert_eq!(off.to_bytes(WireFormat::LegacyLetter), b"s\r\n");
    }

    #[test]
    fn test_status_query_is_fixed() {
        assert_eq!(
            Command::QueryStatus.to_bytes(WireFormat::Token),
            b"STATUS_WORD?\r\n"
        );
        assert_eq!(
            Command::QueryStatus.to_bytes(WireFormat::LegacyLetter),
            b"STATUS_WORD?\r\n"
        );
    }

    #[test]
    fn test_every_slot_has_distinct_commands() {
        for (i, a) in SWITCH_SLOTS.iter().enumerate() {
            for b in SWITCH_SLOTS.iter().skip(i + 1) {
                assert_ne!(a.command, b.command);
                assert_ne!(a.legacy, b.legacy);
                assert_ne!(a.bit, b.bit);
            }
        }
    }
}
