// Tempest Relay - WeatherFlow UDP re-broadcaster
// Copyright (c) 2024 Tempest Relay contributors
//
// Distributed under the terms of the GNU General Public License (GPLv3).
// See LICENSE file for details.

//! Sensor map
//!
//! The obs_st observation is a positional array of 17 fields (after the
//! epoch). [`CanonicalField`] enumerates them in wire order and a
//! [`SensorMap`] associates each one with the name of a field in the host
//! record, or with [`Mapping::Absent`] when the station has no such sensor.
//!
//! ```toml
//! [sensor_map]
//! wind_avg       = "windSpeed"
//! wind_direction = "windGustDir"
//! illuminance    = "None"
//! battery        = "windBatteryStatus"
//! ```

use crate::error::ConfigError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Marker the host configuration uses for "no sensor"
pub const ABSENT_MARKER: &str = "None";

/// The 17 obs_st observation fields, in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum CanonicalField {
    /// Wind lull (minimum 3 second sample), m/s
    WindLull = 0,
    /// Wind average over report interval, m/s
    WindAvg = 1,
    /// Wind gust (maximum 3 second sample), m/s
    WindGust = 2,
    /// Wind direction, degrees
    WindDirection = 3,
    /// Wind sample interval, seconds
    WindSampleInterval = 4,
    /// Station pressure, MB
    StationPressure = 5,
    /// Air temperature, °C
    AirTemperature = 6,
    /// Relative humidity, %
    RelativeHumidity = 7,
    /// Illuminance, lux
    Illuminance = 8,
    /// UV index
    Uv = 9,
    /// Solar radiation, W/m²
    SolarRadiation = 10,
    /// Rain amount over previous minute, mm
    RainAccumulated = 11,
    /// Precipitation type (0 = none, 1 = rain, 2 = hail)
    PrecipitationType = 12,
    /// Lightning strike average distance, km
    LightningStrikeAvgDistance = 13,
    /// Lightning strike count
    LightningStrikeCount = 14,
    /// Battery, volts
    Battery = 15,
    /// Report interval, minutes
    ReportInterval = 16,
}

impl CanonicalField {
    /// Number of canonical fields
    pub const COUNT: usize = 17;

    /// All fields in wire order
    pub const ALL: [CanonicalField; Self::COUNT] = [
        CanonicalField::WindLull,
        CanonicalField::WindAvg,
        CanonicalField::WindGust,
        CanonicalField::WindDirection,
        CanonicalField::WindSampleInterval,
        CanonicalField::StationPressure,
        CanonicalField::AirTemperature,
        CanonicalField::RelativeHumidity,
        CanonicalField::Illuminance,
        CanonicalField::Uv,
        CanonicalField::SolarRadiation,
        CanonicalField::RainAccumulated,
        CanonicalField::PrecipitationType,
        CanonicalField::LightningStrikeAvgDistance,
        CanonicalField::LightningStrikeCount,
        CanonicalField::Battery,
        CanonicalField::ReportInterval,
    ];

    /// Name used in configuration and in the published API docs
    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::WindLull => "wind_lull",
            CanonicalField::WindAvg => "wind_avg",
            CanonicalField::WindGust => "wind_gust",
            CanonicalField::WindDirection => "wind_direction",
            CanonicalField::WindSampleInterval => "wind_sample_interval",
            CanonicalField::StationPressure => "station_pressure",
            CanonicalField::AirTemperature => "air_temperature",
            CanonicalField::RelativeHumidity => "relative_humidity",
            CanonicalField::Illuminance => "illuminance",
            CanonicalField::Uv => "uv",
            CanonicalField::SolarRadiation => "solar_radiation",
            CanonicalField::RainAccumulated => "rain_accumulated",
            CanonicalField::PrecipitationType => "precipitation_type",
            CanonicalField::LightningStrikeAvgDistance => "lightning_strike_avg_distance",
            CanonicalField::LightningStrikeCount => "lightning_strike_count",
            CanonicalField::Battery => "battery",
            CanonicalField::ReportInterval => "report_interval",
        }
    }

    /// Position in the obs array (the epoch occupies index 0)
    pub fn obs_index(&self) -> usize {
        *self as usize + 1
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CanonicalField {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CanonicalField::ALL
            .iter()
            .copied()
            .find(|field| field.name() == s)
            .ok_or_else(|| ConfigError::UnknownField(s.to_string()))
    }
}

/// Where a canonical field's value comes from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Mapping {
    /// Name of a field in the host record
    Source(String),
    /// Station has no such sensor
    #[default]
    Absent,
}

impl Mapping {
    /// Parse a configuration value; `"None"` and `""` mean absent
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value == ABSENT_MARKER {
            Mapping::Absent
        } else {
            Mapping::Source(value.to_string())
        }
    }

    /// Source field name, if mapped
    pub fn source(&self) -> Option<&str> {
        match self {
            Mapping::Source(name) => Some(name),
            Mapping::Absent => None,
        }
    }
}

impl From<&str> for Mapping {
    fn from(value: &str) -> Self {
        Mapping::parse(value)
    }
}

impl Serialize for Mapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.source().unwrap_or(ABSENT_MARKER))
    }
}

impl<'de> Deserialize<'de> for Mapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Mapping::parse(&value))
    }
}

/// Association of canonical fields with host record fields
///
/// Fields without an entry behave as [`Mapping::Absent`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorMap {
    entries: HashMap<CanonicalField, Mapping>,
}

impl SensorMap {
    /// Create a map with every field absent
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `field` to a host record field
    pub fn set(&mut self, field: CanonicalField, mapping: impl Into<Mapping>) {
        self.entries.insert(field, mapping.into());
    }

    /// Builder-style [`SensorMap::set`]
    pub fn with(mut self, field: CanonicalField, mapping: impl Into<Mapping>) -> Self {
        self.set(field, mapping);
        self
    }

    /// Mapping for `field`; a missing entry reads as absent
    pub fn get(&self, field: CanonicalField) -> &Mapping {
        const ABSENT: &Mapping = &Mapping::Absent;
        self.entries.get(&field).unwrap_or(ABSENT)
    }

    /// Source field name for `field`, if mapped
    pub fn source(&self, field: CanonicalField) -> Option<&str> {
        self.get(field).source()
    }

    /// Number of fields mapped to a source
    pub fn mapped_count(&self) -> usize {
        self.entries
            .values()
            .filter(|m| matches!(m, Mapping::Source(_)))
            .count()
    }

    /// Build a map from `(name, source)` pairs as found in configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownField`] for a name outside the 17
    /// canonical fields.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut map = SensorMap::new();
        for (name, source) in pairs {
            map.set(name.parse()?, Mapping::parse(source));
        }
        Ok(map)
    }
}

impl Serialize for SensorMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            CanonicalField::ALL
                .iter()
                .map(|field| (field.name(), self.get(*field))),
        )
    }
}

impl<'de> Deserialize<'de> for SensorMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Mapping>::deserialize(deserializer)?;
        let mut map = SensorMap::new();
        for (name, mapping) in raw {
            let field: CanonicalField = name.parse().map_err(D::Error::custom)?;
            map.set(field, mapping);
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order() {
        let names: Vec<&str> = CanonicalField::ALL.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            vec![
                "wind_lull",
                "wind_avg",
                "wind_gust",
                "wind_direction",
                "wind_sample_interval",
                "station_pressure",
                "air_temperature",
                "relative_humidity",
                "illuminance",
                "uv",
                "solar_radiation",
                "rain_accumulated",
                "precipitation_type",
                "lightning_strike_avg_distance",
                "lightning_strike_count",
                "battery",
                "report_interval",
            ]
        );
    }

    #[test]
    fn test_obs_index() {
        for (i, field) in CanonicalField::ALL.iter().enumerate() {
            assert_eq!(field.obs_index(), i + 1);
        }
        assert_eq!(CanonicalField::Battery.obs_index(), 16);
    }

    #[test]
    fn test_field_from_str() {
        assert_eq!("uv".parse::<CanonicalField>().unwrap(), CanonicalField::Uv);
        assert!(matches!(
            "wind_speed".parse::<CanonicalField>(),
            Err(ConfigError::UnknownField(_))
        ));
    }

    #[test]
    fn test_mapping_parse() {
        assert_eq!(Mapping::parse("None"), Mapping::Absent);
        assert_eq!(Mapping::parse(""), Mapping::Absent);
        assert_eq!(
            Mapping::parse(" windSpeed "),
            Mapping::Source("windSpeed".to_string())
        );
    }

    #[test]
    fn test_missing_entry_reads_absent() {
        let map = SensorMap::new().with(CanonicalField::WindAvg, "windSpeed");
        assert_eq!(map.source(CanonicalField::WindAvg), Some("windSpeed"));
        assert_eq!(map.get(CanonicalField::Battery), &Mapping::Absent);
        assert_eq!(map.mapped_count(), 1);
    }

    #[test]
    fn test_from_pairs() {
        let map = SensorMap::from_pairs([("wind_gust", "windGust"), ("uv", "None")]).unwrap();
        assert_eq!(map.source(CanonicalField::WindGust), Some("windGust"));
        assert_eq!(map.source(CanonicalField::Uv), None);

        let err = SensorMap::from_pairs([("gust", "windGust")]);
        assert!(err.is_err());
    }

    #[test]
    fn test_deserialize_rejects_unknown_field() {
        let result: Result<SensorMap, _> = toml::from_str("bogus = \"outTemp\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_in_wire_order() {
        let map = SensorMap::new().with(CanonicalField::Battery, "windBatteryStatus");
        let json = serde_json::to_value(&map).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), CanonicalField::COUNT);
        assert_eq!(object["battery"], "windBatteryStatus");
        assert_eq!(object["wind_lull"], "None");
    }
}
