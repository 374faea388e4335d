//! Reset line access
//!
//! The board's channels can each have a reset pin wired to a host GPIO.
//! The driver only ever parks those pins at their inactive level during
//! initialization; the actual GPIO implementation (sysfs, gpiod, a test
//! double) is supplied by the host through the [`ResetLine`] trait.

use serde::{Deserialize, Serialize};
use std::io;

/// Polarity of a reset line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActiveLevel {
    /// Reset is asserted by driving the pin high
    #[default]
    High,
    /// Reset is asserted by driving the pin low
    Low,
}

impl ActiveLevel {
    /// Pin value that leaves the reset de-asserted
    pub fn inactive_value(self) -> bool {
        match self {
            ActiveLevel::High => false,
            ActiveLevel::Low => true,
        }
    }
}

/// Capability interface for one channel's reset pin
pub trait ResetLine: Send {
    /// Configure the pin as an output
    fn set_direction_output(&mut self) -> io::Result<()>;

    /// Drive the pin to the given level
    fn set_value(&mut self, value: bool) -> io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_value() {
        assert!(!ActiveLevel::High.inactive_value());
        assert!(ActiveLevel::Low.inactive_value());
    }
}
