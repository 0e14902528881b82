// Tempest Relay - WeatherFlow UDP re-broadcaster
// Copyright (c) 2024 Tempest Relay contributors
//
// Distributed under the terms of the GNU General Public License (GPLv3).
// See LICENSE file for details.

//! Error types for Tempest Relay
//!
//! Missing sensor mappings and malformed wind directions are not errors:
//! they resolve to fallback values inside the resolver and encoders. Only
//! transmission and configuration problems surface here.

use std::io;
use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Main error type for relay operations
#[derive(Error, Debug)]
pub enum RelayError {
    /// Datagram could not be sent
    #[error("Transmission error: {0}")]
    Transmission(#[from] TransmissionError),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Payload could not be serialized or parsed
    #[error("Encoding error: {0}")]
    Encode(String),

    /// Record is unusable (no epoch timestamp)
    #[error("Invalid record: {0}")]
    Record(String),
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Encode(err.to_string())
    }
}

/// Errors raised while broadcasting a datagram
#[derive(Error, Debug)]
pub enum TransmissionError {
    /// Could not open the ephemeral socket
    #[error("Could not bind UDP socket: {source}")]
    Bind {
        #[source]
        source: io::Error,
    },

    /// Could not enable SO_BROADCAST
    #[error("Could not enable broadcast: {source}")]
    Broadcast {
        #[source]
        source: io::Error,
    },

    /// `sendto` failed
    #[error("Send to {addr} failed: {source}")]
    Send {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Destination is not a valid IPv4 address
    #[error("Invalid destination address: {0}")]
    InvalidAddress(String),

    /// Broadcaster was closed
    #[error("Broadcaster is closed")]
    Closed,
}

/// Errors raised while loading configuration at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Could not parse configuration: {0}")]
    Parse(String),

    /// Required top-level key is missing or empty
    #[error("Missing required key: {0}")]
    MissingKey(&'static str),

    /// Broadcast address is not an IPv4 address
    #[error("Invalid broadcast address: {0}")]
    InvalidAddress(String),

    /// `[sensor_map]` names a field outside the obs_st schema
    #[error("Unknown sensor_map field: {0}")]
    UnknownField(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RelayError::Transmission(TransmissionError::Send {
            addr: "192.168.1.255:50222".to_string(),
            source: io::Error::new(io::ErrorKind::Other, "network unreachable"),
        });
        let msg = format!("{}", err);
        assert!(msg.contains("192.168.1.255:50222"));
        assert!(msg.contains("network unreachable"));
    }

    #[test]
    fn test_error_conversion() {
        let config_err = ConfigError::MissingKey("device_serial");
        let relay_err: RelayError = config_err.into();
        assert!(matches!(relay_err, RelayError::Config(_)));
        assert!(relay_err.to_string().contains("device_serial"));
    }

    #[test]
    fn test_toml_error_conversion() {
        let parse: std::result::Result<toml::Value, _> = toml::from_str("port = ");
        let err: ConfigError = parse.unwrap_err().into();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
