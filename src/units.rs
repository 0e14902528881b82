// Tempest Relay - WeatherFlow UDP re-broadcaster
// Copyright (c) 2024 Tempest Relay contributors
//
// Distributed under the terms of the GNU General Public License (GPLv3).
// See LICENSE file for details.

//! Unit normalization
//!
//! The obs_st and rapid_wind messages are defined in metric units with wind
//! in meters/second and rain in millimeters (the host framework's `METRICWX`
//! system). Every record is passed through a [`UnitNormalizer`] before any
//! field is resolved.
//!
//! ```rust
//! use tempest_relay::units::{MetricWxNormalizer, UnitNormalizer, UnitSystem};
//! use tempest_relay::Record;
//!
//! let record = Record::new()
//!     .with("dateTime", 1725909100)
//!     .with("usUnits", 1)
//!     .with("outTemp", 212.0);
//!
//! let normalized = MetricWxNormalizer::default().normalize(&record);
//! assert_eq!(normalized.get_f64("outTemp"), Some(100.0));
//! assert_eq!(normalized.get_f64("usUnits"), Some(UnitSystem::MetricWx.code() as f64));
//! ```

use crate::record::{Record, US_UNITS};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unit systems understood by the host framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum UnitSystem {
    /// Imperial: °F, inHg, mph, inches
    #[default]
    Us = 1,
    /// Metric: °C, mbar, km/h, centimeters
    Metric = 16,
    /// Metric with wind in m/s and rain in millimeters
    #[serde(rename = "METRICWX")]
    MetricWx = 17,
}

impl UnitSystem {
    /// Numeric code carried in the `usUnits` field
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Convert from a `usUnits` code
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(UnitSystem::Us),
            16 => Some(UnitSystem::Metric),
            17 => Some(UnitSystem::MetricWx),
            _ => None,
        }
    }
}

/// Physical quantity a record field belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitGroup {
    /// Air, soil and derived temperatures
    Temperature,
    /// Station and sea-level pressures
    Pressure,
    /// Wind speeds
    Speed,
    /// Rain amounts
    Rain,
    /// Rain amount per hour
    RainRate,
    /// Distances (wind run, lightning)
    Distance,
}

impl UnitGroup {
    /// Group of a host record field, if it needs conversion
    pub fn of(field: &str) -> Option<Self> {
        match field {
            "outTemp" | "inTemp" | "dewpoint" | "inDewpoint" | "windchill" | "heatindex"
            | "appTemp" | "humidex" => Some(UnitGroup::Temperature),
            "pressure" | "barometer" | "altimeter" | "relbarometer" => Some(UnitGroup::Pressure),
            "windSpeed" | "windGust" | "daymaxwind" | "windSpeed10" => Some(UnitGroup::Speed),
            "rain" | "dayRain" | "stormRain" | "weekRain" | "monthRain" | "yearRain" | "ET"
            | "hail" => Some(UnitGroup::Rain),
            "rainRate" | "hailRate" => Some(UnitGroup::RainRate),
            "windrun" | "lightning_distance" => Some(UnitGroup::Distance),
            f if f.starts_with("extraTemp")
                || f.starts_with("soilTemp")
                || f.starts_with("leafTemp") =>
            {
                Some(UnitGroup::Temperature)
            }
            _ => None,
        }
    }

    /// Convert a value of this group from `system` into METRICWX
    pub fn to_metric_wx(&self, value: f64, system: UnitSystem) -> f64 {
        match (system, self) {
            (UnitSystem::MetricWx, _) => value,
            (_, UnitGroup::Temperature) => match system {
                UnitSystem::Us => (value - 32.0) * 5.0 / 9.0,
                _ => value,
            },
            (UnitSystem::Us, UnitGroup::Pressure) => value * INHG_TO_MBAR,
            (UnitSystem::Us, UnitGroup::Speed) => value * MPH_TO_MPS,
            (UnitSystem::Us, UnitGroup::Rain) | (UnitSystem::Us, UnitGroup::RainRate) => {
                value * INCH_TO_MM
            }
            (UnitSystem::Us, UnitGroup::Distance) => value * MILE_TO_KM,
            (UnitSystem::Metric, UnitGroup::Speed) => value / KPH_PER_MPS,
            (UnitSystem::Metric, UnitGroup::Rain) | (UnitSystem::Metric, UnitGroup::RainRate) => {
                value * CM_TO_MM
            }
            (UnitSystem::Metric, UnitGroup::Pressure)
            | (UnitSystem::Metric, UnitGroup::Distance) => value,
        }
    }
}

const INHG_TO_MBAR: f64 = 33.863_886_666_7;
const MPH_TO_MPS: f64 = 0.447_04;
const KPH_PER_MPS: f64 = 3.6;
const INCH_TO_MM: f64 = 25.4;
const CM_TO_MM: f64 = 10.0;
const MILE_TO_KM: f64 = 1.609_344;

/// Converts a record into the METRICWX unit system
pub trait UnitNormalizer {
    /// Return an equivalent record expressed in METRICWX units
    fn normalize(&self, record: &Record) -> Record;
}

/// Pass-through for hosts that already deliver METRICWX records
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl UnitNormalizer for Identity {
    fn normalize(&self, record: &Record) -> Record {
        record.clone()
    }
}

/// Field-by-field conversion into METRICWX
///
/// The source system is read from the record's `usUnits` key, falling back
/// to `default_system` when the key is absent. Null values, non-numeric
/// values and fields without a known unit group pass through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricWxNormalizer {
    default_system: UnitSystem,
}

impl MetricWxNormalizer {
    /// Create a normalizer for records that carry no `usUnits` key
    pub fn new(default_system: UnitSystem) -> Self {
        Self { default_system }
    }

    /// Unit system assumed for records without `usUnits`
    pub fn default_system(&self) -> UnitSystem {
        self.default_system
    }

    fn source_system(&self, record: &Record) -> Option<UnitSystem> {
        match record.get(US_UNITS).and_then(Value::as_i64) {
            Some(code) => {
                let system = UnitSystem::from_code(code);
                if system.is_none() {
                    warn!("Unknown usUnits code {}, passing record through", code);
                }
                system
            }
            None => Some(self.default_system),
        }
    }
}

impl UnitNormalizer for MetricWxNormalizer {
    fn normalize(&self, record: &Record) -> Record {
        let system = match self.source_system(record) {
            Some(UnitSystem::MetricWx) | None => return record.clone(),
            Some(system) => system,
        };

        let mut out = record.clone();
        for (name, value) in record.iter() {
            let (Some(group), Some(number)) = (UnitGroup::of(name), value.as_f64()) else {
                continue;
            };
            if let Some(slot) = out.get_mut(name) {
                *slot = Value::from(group.to_metric_wx(number, system));
            }
        }
        out.insert(US_UNITS, UnitSystem::MetricWx.code());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn us_record() -> Record {
        Record::new()
            .with("dateTime", 1725909100)
            .with("usUnits", 1)
            .with("outTemp", 64.76)
            .with("pressure", 29.63)
            .with("windSpeed", 1.342)
            .with("dayRain", 0.1)
            .with("windGustDir", 63.0)
            .with("rain", Value::Null)
    }

    #[test]
    fn test_unit_system_codes() {
        assert_eq!(UnitSystem::Us.code(), 1);
        assert_eq!(UnitSystem::Metric.code(), 16);
        assert_eq!(UnitSystem::MetricWx.code(), 17);
        assert_eq!(UnitSystem::from_code(17), Some(UnitSystem::MetricWx));
        assert_eq!(UnitSystem::from_code(2), None);
    }

    #[test]
    fn test_unit_system_deserialize() {
        let system: UnitSystem = serde_json::from_str("\"METRICWX\"").unwrap();
        assert_eq!(system, UnitSystem::MetricWx);
        let system: UnitSystem = serde_json::from_str("\"US\"").unwrap();
        assert_eq!(system, UnitSystem::Us);
    }

    #[test]
    fn test_us_to_metric_wx() {
        let normalized = MetricWxNormalizer::default().normalize(&us_record());

        assert_relative_eq!(normalized.get_f64("outTemp").unwrap(), 18.2, epsilon = 1e-9);
        assert_relative_eq!(normalized.get_f64("pressure").unwrap(), 1003.386, epsilon = 1e-2);
        assert_relative_eq!(normalized.get_f64("windSpeed").unwrap(), 0.5999, epsilon = 1e-3);
        assert_relative_eq!(normalized.get_f64("dayRain").unwrap(), 2.54, epsilon = 1e-9);
        assert_eq!(normalized.get_f64("usUnits"), Some(17.0));
    }

    #[test]
    fn test_untouched_fields() {
        let normalized = MetricWxNormalizer::default().normalize(&us_record());

        assert_eq!(normalized.get("dateTime"), Some(&Value::from(1725909100)));
        assert_eq!(normalized.get_f64("windGustDir"), Some(63.0));
        assert_eq!(normalized.get("rain"), Some(&Value::Null));
    }

    #[test]
    fn test_metric_to_metric_wx() {
        let record = Record::new()
            .with("usUnits", 16)
            .with("windSpeed", 36.0)
            .with("rain", 0.2)
            .with("pressure", 1013.2)
            .with("extraTemp1", 21.6);
        let normalized = MetricWxNormalizer::default().normalize(&record);

        assert_relative_eq!(normalized.get_f64("windSpeed").unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(normalized.get_f64("rain").unwrap(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(normalized.get_f64("pressure").unwrap(), 1013.2, epsilon = 1e-9);
        assert_relative_eq!(normalized.get_f64("extraTemp1").unwrap(), 21.6, epsilon = 1e-9);
    }

    #[test]
    fn test_metric_wx_unchanged() {
        let record = Record::new()
            .with("usUnits", 17)
            .with("windSpeed", 0.6)
            .with("outTemp", 18.2);
        let normalized = MetricWxNormalizer::default().normalize(&record);
        assert_eq!(normalized, record);
    }

    #[test]
    fn test_default_system_without_us_units() {
        let record = Record::new().with("windSpeed", 36.0);

        let normalized = MetricWxNormalizer::new(UnitSystem::Metric).normalize(&record);
        assert_relative_eq!(normalized.get_f64("windSpeed").unwrap(), 10.0, epsilon = 1e-9);

        let normalized = MetricWxNormalizer::new(UnitSystem::MetricWx).normalize(&record);
        assert_eq!(normalized, record);
    }

    #[test]
    fn test_unknown_us_units_passthrough() {
        let record = Record::new().with("usUnits", 99).with("outTemp", 70.0);
        let normalized = MetricWxNormalizer::default().normalize(&record);
        assert_eq!(normalized, record);
    }

    #[test]
    fn test_identity() {
        let record = us_record();
        assert_eq!(Identity.normalize(&record), record);
    }

    #[test]
    fn test_unit_groups() {
        assert_eq!(UnitGroup::of("soilTemp1"), Some(UnitGroup::Temperature));
        assert_eq!(UnitGroup::of("rainRate"), Some(UnitGroup::RainRate));
        assert_eq!(UnitGroup::of("windrun"), Some(UnitGroup::Distance));
        assert_eq!(UnitGroup::of("windGustDir"), None);
        assert_eq!(UnitGroup::of("windBatteryStatus"), None);
    }
}
