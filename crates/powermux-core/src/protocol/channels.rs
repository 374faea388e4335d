//! Channel model
//!
//! The board exposes a fixed set of hardware switch slots. Each slot has a
//! wire command name, a legacy single-letter command, and a bit position in
//! the status/fault words. [`SWITCH_SLOTS`] is the single table both the
//! encode and decode paths consult, so the two can never drift apart.
//!
//! Configured channels are matched to slots either by declaration order or
//! by a token found in the channel name; see [`SlotMapping`].

use serde::{Deserialize, Serialize};

use super::ProtocolError;
use crate::gpio::ActiveLevel;

/// Number of switch slots the board firmware exposes
pub const MAX_CHANNELS: usize = 5;

/// Fixed identity of one hardware switch slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchSlot {
    /// Token searched for in channel names under [`SlotMapping::NameToken`]
    pub token: &'static str,
    /// Alternate token naming the same slot (the SAT slot also serves GSM)
    pub alias: Option<&'static str>,
    /// Command name on the wire, sent as `<command>=<0|1>`
    pub command: &'static str,
    /// Legacy single-letter command; uppercase switches on, lowercase off
    pub legacy: u8,
    /// Bit position in the status and fault words
    pub bit: u8,
}

/// The board's slot table, in firmware channel order
pub static SWITCH_SLOTS: [SwitchSlot; MAX_CHANNELS] = [
    SwitchSlot {
        token: "WIFI",
        alias: None,
        command: "WIFI_SW",
        legacy: b'W',
        bit: 8,
    },
    SwitchSlot {
        token: "XBEE",
        alias: None,
        command: "XBEE_SW",
        legacy: b'X',
        bit: 0,
    },
    SwitchSlot {
        token: "GPS",
        alias: None,
        command: "GPS_SW",
        legacy: b'G',
        bit: 5,
    },
    SwitchSlot {
        token: "ATM",
        alias: None,
        command: "ATM_CLK_SW",
        legacy: b'C',
        bit: 4,
    },
    SwitchSlot {
        token: "SAT",
        alias: Some("GSM"),
        command: "SAT_GSM_SW",
        legacy: b'S',
        bit: 6,
    },
];

/// How channel declarations are matched to hardware slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SlotMapping {
    /// Channel at configuration index N is hardware slot N
    ///
    /// Requires channels to be declared in the firmware's slot order.
    #[default]
    DeclarationOrder,
    /// Slot inferred from a token contained in the channel name
    ///
    /// Declaration order becomes irrelevant, but each name must contain
    /// exactly one slot token.
    NameToken,
}

/// Static configuration for one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Display name, unique within the channel set
    pub name: String,
    /// State the channel is driven to at startup
    #[serde(default)]
    pub default_state: bool,
    /// GPIO number of the reset line, if the channel has one
    #[serde(default)]
    pub reset_pin: Option<u32>,
    /// Polarity of the reset line
    #[serde(default)]
    pub reset_active: ActiveLevel,
}

impl ChannelConfig {
    /// Shorthand for a channel with no reset control
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_state: false,
            reset_pin: None,
            reset_active: ActiveLevel::default(),
        }
    }
}

/// Runtime state of one channel
#[derive(Debug)]
pub struct Channel {
    config: ChannelConfig,
    slot: usize,
    state: bool,
    fault: Option<bool>,
}

impl Channel {
    /// Channel display name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Static configuration this channel was built from
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Hardware slot this channel resolved to
    pub fn slot(&self) -> &'static SwitchSlot {
        &SWITCH_SLOTS[self.slot]
    }

    /// Last known on/off state
    ///
    /// Authoritative after the first status-word decode; before that it
    /// reflects the last commanded value.
    pub fn state(&self) -> bool {
        self.state
    }

    /// Last decoded fault bit, `None` until the first fault-word decode
    pub fn fault(&self) -> Option<bool> {
        self.fault
    }
}

/// The configured channel set and its slot resolution
///
/// Membership is fixed at construction; only per-channel `state`/`fault`
/// mutate afterwards.
#[derive(Debug)]
pub struct ChannelBank {
    channels: Vec<Channel>,
    mapping: SlotMapping,
}

impl ChannelBank {
    /// Build the channel set, resolving every channel to a hardware slot
    ///
    /// Rejects more channels than the board has slots, duplicate names,
    /// names that match no token (or more than one) under
    /// [`SlotMapping::NameToken`], and two channels resolving to the same
    /// slot.
    pub fn new(configs: &[ChannelConfig], mapping: SlotMapping) -> Result<Self, ProtocolError> {
        if configs.len() > MAX_CHANNELS {
            return Err(ProtocolError::TooManyChannels {
                count: configs.len(),
                max: MAX_CHANNELS,
            });
        }

        let mut channels: Vec<Channel> = Vec::with_capacity(configs.len());
        for (index, config) in configs.iter().enumerate() {
            if channels.iter().any(|c| c.config.name == config.name) {
                return Err(ProtocolError::DuplicateChannel(config.name.clone()));
            }

            let slot = match mapping {
                SlotMapping::DeclarationOrder => index,
                SlotMapping::NameToken => resolve_token(&config.name)?,
            };
            if let Some(prev) = channels.iter().find(|c| c.slot == slot) {
                return Err(ProtocolError::AmbiguousMapping {
                    token: SWITCH_SLOTS[slot].token,
                    first: prev.config.name.clone(),
                    second: config.name.clone(),
                });
            }

            channels.push(Channel {
                config: config.clone(),
                slot,
                state: false,
                fault: None,
            });
        }

        Ok(Self { channels, mapping })
    }

    /// Number of configured channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the channel set is empty
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Mapping variant this bank was built with
    pub fn mapping(&self) -> SlotMapping {
        self.mapping
    }

    /// All channels, in declaration order
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Look up a channel by display name
    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.config.name == name)
    }

    /// Index of the named channel in declaration order
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.config.name == name)
    }

    /// Like [`ChannelBank::index_of`], but falls back to an ASCII
    /// case-insensitive match
    ///
    /// Remote override clients tend to shout (`$WIFI,1`) regardless of how
    /// the configuration spells the name.
    pub fn resolve_name(&self, name: &str) -> Option<usize> {
        self.index_of(name).or_else(|| {
            self.channels
                .iter()
                .position(|c| c.config.name.eq_ignore_ascii_case(name))
        })
    }

    /// Channel at a declaration-order index
    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    /// Update every channel's on/off state from a status word
    pub fn apply_status_word(&mut self, word: u16) {
        for channel in &mut self.channels {
            channel.state = word & (1 << SWITCH_SLOTS[channel.slot].bit) != 0;
        }
    }

    /// Update every channel's fault flag from a fault word
    pub fn apply_fault_word(&mut self, word: u16) {
        for channel in &mut self.channels {
            channel.fault = Some(word & (1 << SWITCH_SLOTS[channel.slot].bit) != 0);
        }
    }

    /// Record the state just commanded for a channel
    ///
    /// Holds the model together until the board echoes the change in its
    /// next status frame.
    pub(crate) fn note_commanded(&mut self, index: usize, state: bool) {
        if let Some(channel) = self.channels.get_mut(index) {
            channel.state = state;
        }
    }
}

/// Resolve a channel name to a slot index by token search
///
/// The match is a case-insensitive substring test, so "Wifi_channel" and
/// "GSM/SAT" both resolve. A name matching more than one slot is rejected
/// rather than guessed at.
fn resolve_token(name: &str) -> Result<usize, ProtocolError> {
    let upper = name.to_ascii_uppercase();
    let mut found: Option<usize> = None;
    for (index, slot) in SWITCH_SLOTS.iter().enumerate() {
        let hit = upper.contains(slot.token)
            || slot.alias.is_some_and(|alias| upper.contains(alias));
        if hit {
            if found.is_some() {
                return Err(ProtocolError::UnmappedChannel(name.to_string()));
            }
            found = Some(index);
        }
    }
    found.ok_or_else(|| ProtocolError::UnmappedChannel(name.to_string()))
}
