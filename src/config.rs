// Tempest Relay - WeatherFlow UDP re-broadcaster
// Copyright (c) 2024 Tempest Relay contributors
//
// Distributed under the terms of the GNU General Public License (GPLv3).
// See LICENSE file for details.

//! Relay configuration
//!
//! Loaded once at startup from a TOML file and read-only afterwards.
//!
//! ```toml
//! device_serial     = "ST-00006021"   # anything here will work
//! hub_serial        = "HB-12345678"   # anything here will work
//! broadcast_port    = 50222
//! broadcast_address = "192.168.1.255" # broadcast address of the console's subnet
//!
//! [sensor_map]
//! wind_avg = "windSpeed"
//! battery  = "windBatteryStatus"
//! ```
//!
//! A subnet-specific broadcast address is more reliable than `0.0.0.0` or
//! `255.255.255.255`.

use crate::error::ConfigError;
use crate::protocol::{StationIdentity, DEFAULT_PORT};
use crate::sensor_map::{CanonicalField, SensorMap};
use crate::units::UnitSystem;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;

/// Default configuration file name
pub const DEFAULT_CONFIG_PATH: &str = "tempest-relay.toml";

/// Top-level relay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Device serial number reported in every message
    #[serde(default)]
    pub device_serial: String,

    /// Hub serial number reported in every message
    #[serde(default)]
    pub hub_serial: String,

    /// Destination UDP port (default: 50222)
    #[serde(default = "default_port")]
    pub broadcast_port: u16,

    /// Destination IPv4 broadcast address
    #[serde(default)]
    pub broadcast_address: String,

    /// Unit system of records that carry no `usUnits` key
    #[serde(default)]
    pub source_unit_system: UnitSystem,

    /// Canonical field → record field
    #[serde(default)]
    pub sensor_map: SensorMap,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl RelayConfig {
    /// Parse and validate configuration text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: RelayConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Check required keys and the broadcast address
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_serial.trim().is_empty() {
            return Err(ConfigError::MissingKey("device_serial"));
        }
        if self.hub_serial.trim().is_empty() {
            return Err(ConfigError::MissingKey("hub_serial"));
        }
        if self.broadcast_address.trim().is_empty() {
            return Err(ConfigError::MissingKey("broadcast_address"));
        }
        self.broadcast_ip()?;
        Ok(())
    }

    /// Parsed broadcast address
    pub fn broadcast_ip(&self) -> Result<Ipv4Addr, ConfigError> {
        self.broadcast_address
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.broadcast_address.clone()))
    }

    /// Serial numbers as a [`StationIdentity`]
    pub fn identity(&self) -> StationIdentity {
        StationIdentity::new(self.device_serial.clone(), self.hub_serial.clone())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reference configuration for an Ecowitt station with a WS85 wind/rain
    /// sensor and an outside temperature/humidity sensor
    pub fn sample() -> Self {
        use CanonicalField::*;

        let sensor_map = SensorMap::new()
            .with(WindLull, "None")
            .with(WindAvg, "windSpeed")
            .with(WindGust, "windGust")
            .with(WindDirection, "windGustDir")
            .with(WindSampleInterval, "interval")
            .with(StationPressure, "pressure")
            .with(AirTemperature, "outTemp")
            .with(RelativeHumidity, "outHumidity")
            .with(Illuminance, "None")
            .with(Uv, "UV")
            .with(SolarRadiation, "None")
            .with(RainAccumulated, "dayRain")
            .with(PrecipitationType, "None")
            .with(LightningStrikeAvgDistance, "None")
            .with(LightningStrikeCount, "None")
            .with(Battery, "windBatteryStatus")
            .with(ReportInterval, "interval");

        Self {
            device_serial: "ST-00006021".to_string(),
            hub_serial: "HB-12345678".to_string(),
            broadcast_port: DEFAULT_PORT,
            broadcast_address: "192.168.1.255".to_string(),
            source_unit_system: UnitSystem::Us,
            sensor_map,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor_map::Mapping;
    use std::io::Write;

    const MINIMAL: &str = r#"
        device_serial = "ST-00006021"
        hub_serial = "HB-12345678"
        broadcast_address = "192.168.1.255"
    "#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = RelayConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.broadcast_port, 50222);
        assert_eq!(config.source_unit_system, UnitSystem::Us);
        assert_eq!(config.sensor_map.mapped_count(), 0);
        assert_eq!(config.identity().hub_serial, "HB-12345678");
    }

    #[test]
    fn test_missing_required_keys() {
        let err = RelayConfig::from_toml("hub_serial = \"HB\"\nbroadcast_address = \"10.0.0.255\"")
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey("device_serial")));

        let err = RelayConfig::from_toml("device_serial = \"ST\"\nhub_serial = \"HB\"").unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey("broadcast_address")));
    }

    #[test]
    fn test_invalid_broadcast_address() {
        let text = MINIMAL.replace("192.168.1.255", "192.168.1");
        let err = RelayConfig::from_toml(&text).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddress(_)));
    }

    #[test]
    fn test_sensor_map_section() {
        let text = format!(
            "{}\nsource_unit_system = \"METRICWX\"\nbroadcast_port = 50223\n[sensor_map]\nwind_avg = \"windSpeed\"\nuv = \"None\"\n",
            MINIMAL
        );
        let config = RelayConfig::from_toml(&text).unwrap();
        assert_eq!(config.broadcast_port, 50223);
        assert_eq!(config.source_unit_system, UnitSystem::MetricWx);
        assert_eq!(
            config.sensor_map.get(CanonicalField::WindAvg),
            &Mapping::Source("windSpeed".to_string())
        );
        assert_eq!(config.sensor_map.get(CanonicalField::Uv), &Mapping::Absent);
    }

    #[test]
    fn test_unknown_sensor_map_field() {
        let text = format!("{}\n[sensor_map]\nwind_speed = \"windSpeed\"\n", MINIMAL);
        assert!(matches!(
            RelayConfig::from_toml(&text),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_sample_round_trip() {
        let sample = RelayConfig::sample();
        let text = sample.to_toml().unwrap();
        let parsed = RelayConfig::from_toml(&text).unwrap();
        assert_eq!(parsed, sample);
        assert_eq!(parsed.sensor_map.mapped_count(), 11);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = RelayConfig::load(file.path()).unwrap();
        assert_eq!(config.device_serial, "ST-00006021");
    }

    #[test]
    fn test_load_missing_file() {
        let err = RelayConfig::load("/nonexistent/tempest-relay.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
