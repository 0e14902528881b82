// Tempest Relay - WeatherFlow UDP re-broadcaster
// Copyright (c) 2024 Tempest Relay contributors
//
// Distributed under the terms of the GNU General Public License (GPLv3).
// See LICENSE file for details.

//! Field resolution
//!
//! Each canonical field is resolved on its own: an absent mapping, or a
//! mapped field missing from the record, yields the field's fallback and the
//! other fields are unaffected. Stations routinely lack wind, solar or
//! lightning sensors, so partial observations are the normal case.

use crate::record::Record;
use crate::sensor_map::{CanonicalField, SensorMap};
use serde_json::Value;

/// Value used when a field cannot be resolved
///
/// Battery falls back to `0`; every other field falls back to `null`.
pub fn fallback(field: CanonicalField) -> Value {
    match field {
        CanonicalField::Battery => Value::from(0),
        _ => Value::Null,
    }
}

/// Resolve one canonical field against a normalized record
///
/// A mapped field that is present in the record is returned as-is, including
/// an explicit `null`.
pub fn resolve(record: &Record, sensor_map: &SensorMap, field: CanonicalField) -> Value {
    sensor_map
        .source(field)
        .and_then(|source| record.get(source))
        .cloned()
        .unwrap_or_else(|| fallback(field))
}

/// Resolve all 17 canonical fields, in wire order
pub fn resolve_all(record: &Record, sensor_map: &SensorMap) -> [Value; CanonicalField::COUNT] {
    CanonicalField::ALL.map(|field| resolve(record, sensor_map, field))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record::new()
            .with("dateTime", 1725909100)
            .with("windSpeed", 0.6)
            .with("windBatteryStatus", 3.08)
            .with("rain", Value::Null)
    }

    #[test]
    fn test_resolve_mapped_present() {
        let map = SensorMap::new().with(CanonicalField::WindAvg, "windSpeed");
        assert_eq!(
            resolve(&record(), &map, CanonicalField::WindAvg),
            Value::from(0.6)
        );
    }

    #[test]
    fn test_resolve_mapped_missing_from_record() {
        let map = SensorMap::new().with(CanonicalField::WindGust, "windGust");
        assert_eq!(
            resolve(&record(), &map, CanonicalField::WindGust),
            Value::Null
        );
    }

    #[test]
    fn test_resolve_unmapped() {
        let map = SensorMap::new();
        assert_eq!(resolve(&record(), &map, CanonicalField::Uv), Value::Null);
    }

    #[test]
    fn test_resolve_explicit_null_passes_through() {
        let map = SensorMap::new().with(CanonicalField::RainAccumulated, "rain");
        assert_eq!(
            resolve(&record(), &map, CanonicalField::RainAccumulated),
            Value::Null
        );
    }

    #[test]
    fn test_battery_fallback() {
        let map = SensorMap::new();
        assert_eq!(
            resolve(&record(), &map, CanonicalField::Battery),
            Value::from(0)
        );

        let map = SensorMap::new().with(CanonicalField::Battery, "1");
        assert_eq!(
            resolve(&record(), &map, CanonicalField::Battery),
            Value::from(0)
        );

        let map = SensorMap::new().with(CanonicalField::Battery, "windBatteryStatus");
        assert_eq!(
            resolve(&record(), &map, CanonicalField::Battery),
            Value::from(3.08)
        );
    }

    #[test]
    fn test_resolve_all_independent() {
        let map = SensorMap::new()
            .with(CanonicalField::WindLull, "missing")
            .with(CanonicalField::WindAvg, "windSpeed")
            .with(CanonicalField::WindGust, "None")
            .with(CanonicalField::Battery, "windBatteryStatus");

        let values = resolve_all(&record(), &map);
        assert_eq!(values.len(), CanonicalField::COUNT);
        assert_eq!(values[0], Value::Null);
        assert_eq!(values[1], Value::from(0.6));
        assert_eq!(values[2], Value::Null);
        assert_eq!(values[15], Value::from(3.08));
        assert_eq!(values[16], Value::Null);
    }
}
