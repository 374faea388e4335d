//! Serial port handling
//!
//! Provides low-level serial port access for the switch board link.

use serialport::SerialPort;
use std::time::Duration;

use super::{ProtocolError, DEFAULT_READ_TIMEOUT};

/// Open a serial port with the short poll timeout the driver expects
pub fn open_port(name: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>, ProtocolError> {
    serialport::new(name, baud_rate)
        .timeout(DEFAULT_READ_TIMEOUT)
        .open()
        .map_err(|e| ProtocolError::SerialError(e.to_string()))
}

/// Configure a serial port for board communication
///
/// The board speaks standard 8N1 with no flow control.
pub fn configure_port(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.set_data_bits(serialport::DataBits::Eight)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_parity(serialport::Parity::None)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_stop_bits(serialport::StopBits::One)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    Ok(())
}

/// Clear the serial port buffers
pub fn clear_buffers(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.clear(serialport::ClearBuffer::All)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))
}

/// Open and configure the board port in one step
pub fn open_board_port(
    name: &str,
    baud_rate: u32,
    read_timeout: Duration,
) -> Result<Box<dyn SerialPort>, ProtocolError> {
    let mut port = open_port(name, baud_rate)?;
    configure_port(port.as_mut())?;
    port.set_timeout(read_timeout)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    clear_buffers(port.as_mut())?;
    Ok(port)
}
