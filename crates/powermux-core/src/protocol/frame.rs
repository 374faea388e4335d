//! Frame classification and field extraction
//!
//! The board tags each output line with a marker (`* BME280:`, `* ADC:`,
//! `* STATUS:`, `* FAULTS:`) followed by a fixed field layout. Decoding is
//! strictly positional: fields must appear with the expected key, in the
//! expected order, with nothing extra. Anything else is dropped silently;
//! the link picks up line noise and the firmware occasionally prints
//! unrelated diagnostics, neither of which is an error.

/// One decoded board frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Environmental readings from the BME280 sensor
    Environment {
        /// Temperature in degrees Celsius
        temperature: f64,
        /// Barometric pressure in pascals
        pressure: f64,
        /// Relative humidity in percent
        humidity: f64,
    },
    /// Analog rail measurements
    Analog {
        /// Supply input voltage in volts
        vin: f64,
        /// 5 V rail voltage in volts
        rail5: f64,
    },
    /// Per-channel on/off bitword
    Status(u16),
    /// Per-channel fault bitword
    Fault(u16),
}

const ENV_MARKER: &str = "* BME280:";
const ADC_MARKER: &str = "* ADC:";
const STATUS_MARKER: &str = "* STATUS: WORD=";
const FAULT_MARKER: &str = "* FAULTS: WORD=";

/// Decode one complete line into a frame
///
/// Returns `None` both for unrecognized lines and for recognized markers
/// whose fields fail to parse. Never panics, never returns an error.
pub fn decode(line: &str) -> Option<Frame> {
    if let Some(rest) = after_marker(line, ENV_MARKER) {
        return decode_environment(rest);
    }
    if let Some(rest) = after_marker(line, ADC_MARKER) {
        return decode_analog(rest);
    }
    if let Some(rest) = after_marker(line, STATUS_MARKER) {
        return decode_word(rest).map(Frame::Status);
    }
    if let Some(rest) = after_marker(line, FAULT_MARKER) {
        return decode_word(rest).map(Frame::Fault);
    }
    None
}

/// Scan for `marker` anywhere in the line, returning the text after it
///
/// Scanning (rather than prefix matching) tolerates leading garbage from a
/// partially captured previous line.
fn after_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.find(marker).map(|idx| &line[idx + marker.len()..])
}

fn decode_environment(rest: &str) -> Option<Frame> {
    let mut fields = rest.split_whitespace();
    let temperature = keyed_field(fields.next()?, "T=")?;
    let pressure = keyed_field(fields.next()?, "P=")?;
    let humidity = keyed_field(fields.next()?, "H=")?;
    if fields.next().is_some() {
        return None;
    }
    Some(Frame::Environment {
        temperature,
        pressure,
        humidity,
    })
}

fn decode_analog(rest: &str) -> Option<Frame> {
    let mut fields = rest.split_whitespace();
    let vin = keyed_field(fields.next()?, "VIN_MON=")?;
    let rail5 = keyed_field(fields.next()?, "5V_MON=")?;
    if fields.next().is_some() {
        return None;
    }
    Some(Frame::Analog { vin, rail5 })
}

/// Parse the hex bitword that follows a `WORD=` marker
fn decode_word(rest: &str) -> Option<u16> {
    let mut fields = rest.split_whitespace();
    let token = fields.next()?;
    if fields.next().is_some() {
        return None;
    }
    u16::from_str_radix(token, 16).ok()
}

/// Parse a `KEY=value` field with the exact expected key
fn keyed_field(token: &str, key: &str) -> Option<f64> {
    token.strip_prefix(key)?.parse().ok()
}
