//! Telemetry cache
//!
//! Last-known environmental and electrical readings decoded from the board,
//! plus the timestamp of the last successful decode. Readings are only as
//! good as their age: consumers must check [`TelemetryCache::is_fresh`]
//! before reporting anything onward.

use std::time::{Duration, Instant};

/// Default age beyond which cached telemetry is considered unusable
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(10);

/// Last-known readings from the board's sensors
///
/// Pressure is stored in pascals as the board reports it;
/// [`TelemetryCache::pressure_hpa`] converts for consumers that want
/// hPa/mbar.
#[derive(Debug, Default)]
pub struct TelemetryCache {
    temperature_c: f64,
    pressure_pa: f64,
    humidity_pct: f64,
    vin_v: f64,
    rail5_v: f64,
    last_valid_update: Option<Instant>,
}

impl TelemetryCache {
    /// Create an empty cache with no valid readings
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully decoded environment frame
    pub fn record_environment(&mut self, temperature_c: f64, pressure_pa: f64, humidity_pct: f64) {
        self.temperature_c = temperature_c;
        self.pressure_pa = pressure_pa;
        self.humidity_pct = humidity_pct;
        self.last_valid_update = Some(Instant::now());
    }

    /// Record a successfully decoded analog frame
    pub fn record_analog(&mut self, vin_v: f64, rail5_v: f64) {
        self.vin_v = vin_v;
        self.rail5_v = rail5_v;
        self.last_valid_update = Some(Instant::now());
    }

    /// Temperature in degrees Celsius
    pub fn temperature_c(&self) -> f64 {
        self.temperature_c
    }

    /// Pressure in pascals, as stored
    pub fn pressure_pa(&self) -> f64 {
        self.pressure_pa
    }

    /// Pressure in hectopascals (millibar)
    pub fn pressure_hpa(&self) -> f64 {
        self.pressure_pa / 100.0
    }

    /// Relative humidity in percent
    pub fn humidity_pct(&self) -> f64 {
        self.humidity_pct
    }

    /// Supply input voltage in volts
    pub fn vin_v(&self) -> f64 {
        self.vin_v
    }

    /// 5 V rail voltage in volts
    pub fn rail5_v(&self) -> f64 {
        self.rail5_v
    }

    /// When a frame last parsed successfully, if ever
    pub fn last_valid_update(&self) -> Option<Instant> {
        self.last_valid_update
    }

    /// Age of the newest valid reading
    pub fn age(&self) -> Option<Duration> {
        self.last_valid_update.map(|t| t.elapsed())
    }

    /// Whether the cache has a valid reading younger than `max_age`
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        match self.age() {
            Some(age) => age <= max_age,
            None => false,
        }
    }
}
