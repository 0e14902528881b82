// Tempest Relay - WeatherFlow UDP re-broadcaster
// Copyright (c) 2024 Tempest Relay contributors
//
// Distributed under the terms of the GNU General Public License (GPLv3).
// See LICENSE file for details.

//! # Tempest Relay
//!
//! Re-broadcast weather station records as WeatherFlow Tempest UDP messages,
//! so that consoles listening for a Tempest hub can display data from
//! stations that do not speak the protocol.
//!
//! ## Key Features
//!
//! - **rapid_wind**: one datagram per loop packet `[epoch, m/s, degrees]`
//! - **obs_st**: one datagram per archive record, 17 positional fields
//! - **Sensor map**: any record field can feed any observation field
//! - **Partial stations**: unmapped or missing fields go out as `null`
//!
//! ## Quick Start
//!
//! ```rust
//! use tempest_relay::{encode_obs_st, CanonicalField, Record, SensorMap, StationIdentity};
//!
//! let identity = StationIdentity::new("ST-00006021", "HB-12345678");
//! let sensor_map = SensorMap::new()
//!     .with(CanonicalField::WindAvg, "windSpeed")
//!     .with(CanonicalField::Battery, "windBatteryStatus");
//!
//! let record = Record::new()
//!     .with("dateTime", 1725909100)
//!     .with("windSpeed", 0.6)
//!     .with("windBatteryStatus", 3.08);
//!
//! let message = encode_obs_st(&identity, &record, &sensor_map).unwrap();
//! let json = message.to_json().unwrap();
//! assert!(json.starts_with(r#"{"serial_number":"ST-00006021","type":"obs_st""#));
//! ```
//!
//! ## Modules
//!
//! - [`record`]: Named-value records handed over by the host
//! - [`units`]: Normalization into metric units
//! - [`sensor_map`]: Canonical obs_st fields and their sources
//! - [`resolver`]: Per-field value resolution with fallbacks
//! - [`protocol`]: Message types and encoders
//! - [`broadcast`]: UDP broadcast abstraction
//! - [`config`]: Startup configuration
//! - [`relay`]: Host-facing event callbacks

// Modules
pub mod broadcast;
pub mod config;
pub mod error;
pub mod protocol;
pub mod record;
pub mod relay;
pub mod resolver;
pub mod sensor_map;
pub mod units;

// Re-exports for convenient access
pub use broadcast::{broadcast, BroadcastMetrics, Broadcaster, MemoryBroadcaster, UdpBroadcaster};
pub use config::RelayConfig;
pub use error::{ConfigError, RelayError, Result, TransmissionError};
pub use protocol::{
    encode_obs_st, encode_rapid_wind, wind_direction, MessageType, ObsSt, Observation, RapidWind,
    StationIdentity, DEFAULT_PORT,
};
pub use record::Record;
pub use relay::{Relay, StationEvents};
pub use resolver::{resolve, resolve_all};
pub use sensor_map::{CanonicalField, Mapping, SensorMap};
pub use units::{MetricWxNormalizer, UnitNormalizer, UnitSystem};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WeatherFlow UDP API version the messages follow
pub const API_VERSION: &str = "171";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_basic_roundtrip() {
        let identity = StationIdentity::new("ST-00006021", "HB-12345678");
        let record = Record::new().with("dateTime", 1725909100).with("outTemp", 18.2);
        let sensor_map = SensorMap::new().with(CanonicalField::AirTemperature, "outTemp");

        let message = encode_obs_st(&identity, &record, &sensor_map).unwrap();
        let decoded = ObsSt::from_json(&message.to_json().unwrap()).unwrap();

        assert_eq!(decoded, message);
    }
}
