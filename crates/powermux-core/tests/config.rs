//! Configuration loading.

use std::io::Write;

use powermux_core::protocol::{DriverConfig, ProtocolError, SlotMapping, WireFormat};

#[test]
fn test_config_loads_from_json() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "port_name": "/dev/ttymxc6",
            "baud_rate": 115200,
            "query_period_ms": 10000,
            "read_timeout_ms": 50,
            "staleness_ms": 10000,
            "wire_format": "Token",
            "mapping": "NameToken",
            "channels": [
                {{ "name": "Wifi", "default_state": true, "reset_pin": 17, "reset_active": "Low" }},
                {{ "name": "GSM/SAT" }}
            ]
        }}"#
    )
    .unwrap();

    let config = DriverConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.port_name, "/dev/ttymxc6");
    assert_eq!(config.wire_format, WireFormat::Token);
    assert_eq!(config.mapping, SlotMapping::NameToken);
    assert_eq!(config.channels.len(), 2);
    assert!(config.channels[0].default_state);
    assert_eq!(config.channels[0].reset_pin, Some(17));
    // Omitted fields take their defaults
    assert!(!config.channels[1].default_state);
    assert_eq!(config.channels[1].reset_pin, None);
}

#[test]
fn test_malformed_config_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();

    let err = DriverConfig::from_json_file(file.path()).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidConfig(_)));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = DriverConfig::from_json_file("/nonexistent/powermux.json").unwrap_err();
    assert!(matches!(err, ProtocolError::IoError(_)));
}
