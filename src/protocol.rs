// Tempest Relay - WeatherFlow UDP re-broadcaster
// Copyright (c) 2024 Tempest Relay contributors
//
// Distributed under the terms of the GNU General Public License (GPLv3).
// See LICENSE file for details.

//! WeatherFlow UDP message definitions
//!
//! This module defines the two messages the relay emits, following the
//! WeatherFlow Tempest UDP API v171:
//!
//! ```text
//! rapid_wind:
//! {"serial_number":"SK-00008453","type":"rapid_wind","hub_sn":"HB-00000001",
//!  "ob":[1493322445,2.3,128]}
//!
//! obs_st:
//! {"serial_number":"ST-00000512","type":"obs_st","hub_sn":"HB-00013030",
//!  "firmware_revision":null,
//!  "obs":[[1588948614,0.18,0.22,0.27,144,6,1017.57,22.37,50.26,328,0.03,3,0.0,0,0,0,2.41,1]]}
//! ```
//!
//! Both arrays are positional; the order of their elements is part of the
//! wire contract.

use crate::error::{RelayError, Result};
use crate::record::Record;
use crate::resolver::resolve_all;
use crate::sensor_map::{CanonicalField, SensorMap};
use serde::de::Error as _;
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Default WeatherFlow UDP port
pub const DEFAULT_PORT: u16 = 50222;

/// Loop packet field carrying the rapid_wind direction
pub const RAPID_WIND_DIRECTION: &str = "windGustDir";

/// Loop packet field carrying the rapid_wind speed
pub const RAPID_WIND_SPEED: &str = "windSpeed";

/// Length of one obs_st observation (epoch + 17 fields)
pub const OBS_ST_LEN: usize = CanonicalField::COUNT + 1;

/// Serial numbers the relay reports as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationIdentity {
    /// Device serial number (`serial_number` on the wire)
    pub device_serial: String,
    /// Hub serial number (`hub_sn` on the wire)
    pub hub_serial: String,
}

impl StationIdentity {
    /// Create an identity from device and hub serial numbers
    pub fn new(device_serial: impl Into<String>, hub_serial: impl Into<String>) -> Self {
        Self {
            device_serial: device_serial.into(),
            hub_serial: hub_serial.into(),
        }
    }
}

/// Message types emitted by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Instantaneous wind sample
    RapidWind,
    /// Tempest archive observation
    ObsSt,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::RapidWind => write!(f, "rapid_wind"),
            MessageType::ObsSt => write!(f, "obs_st"),
        }
    }
}

/// `rapid_wind` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RapidWind {
    pub serial_number: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub hub_sn: String,
    /// `[epoch, speed m/s, direction degrees]`
    pub ob: (i64, Option<f64>, u16),
}

impl RapidWind {
    /// Epoch seconds of the sample
    pub fn epoch(&self) -> i64 {
        self.ob.0
    }

    /// Wind speed in m/s, if the sample carried one
    pub fn speed(&self) -> Option<f64> {
        self.ob.1
    }

    /// Direction in whole degrees, `0..360`
    pub fn direction(&self) -> u16 {
        self.ob.2
    }

    /// Serialize to wire JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse wire JSON
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// One obs_st observation: the epoch followed by the 17 canonical fields
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub epoch: i64,
    pub fields: [Value; CanonicalField::COUNT],
}

impl Observation {
    /// Value of a canonical field
    pub fn get(&self, field: CanonicalField) -> &Value {
        &self.fields[field as usize]
    }

    /// Flatten to the positional wire array
    pub fn to_values(&self) -> Vec<Value> {
        let mut values = Vec::with_capacity(OBS_ST_LEN);
        values.push(Value::from(self.epoch));
        values.extend(self.fields.iter().cloned());
        values
    }
}

impl Serialize for Observation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(OBS_ST_LEN)?;
        tuple.serialize_element(&self.epoch)?;
        for value in &self.fields {
            tuple.serialize_element(value)?;
        }
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for Observation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let values = Vec::<Value>::deserialize(deserializer)?;
        if values.len() != OBS_ST_LEN {
            return Err(D::Error::invalid_length(
                values.len(),
                &"an obs_st observation of 18 elements",
            ));
        }

        let mut values = values.into_iter();
        let epoch = values
            .next()
            .and_then(|v| v.as_i64())
            .ok_or_else(|| D::Error::custom("obs_st epoch is not an integer"))?;
        let fields = CanonicalField::ALL.map(|_| values.next().unwrap_or(Value::Null));

        Ok(Self { epoch, fields })
    }
}

/// `obs_st` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObsSt {
    pub serial_number: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub hub_sn: String,
    /// Never known to the relay; always serialized as `null`
    pub firmware_revision: Option<u32>,
    /// Always exactly one observation
    pub obs: Vec<Observation>,
}

impl ObsSt {
    /// The (single) observation
    pub fn observation(&self) -> Option<&Observation> {
        self.obs.first()
    }

    /// Serialize to wire JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse wire JSON
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Round a direction to whole degrees in `0..360`
///
/// `360` wraps to `0`. Absent, null, non-numeric and non-finite values give
/// `0`. Halves round to even.
pub fn wind_direction(value: Option<&Value>) -> u16 {
    match value.and_then(Value::as_f64) {
        Some(degrees) if degrees.is_finite() => {
            degrees.round_ties_even().rem_euclid(360.0) as u16
        }
        _ => 0,
    }
}

/// Build a `rapid_wind` message from a normalized loop packet
///
/// # Errors
///
/// Returns [`RelayError::Record`] if the packet has no usable `dateTime`.
pub fn encode_rapid_wind(identity: &StationIdentity, packet: &Record) -> Result<RapidWind> {
    let epoch = packet.epoch()?;
    let speed = packet.get_f64(RAPID_WIND_SPEED);
    let direction = wind_direction(packet.get(RAPID_WIND_DIRECTION));

    Ok(RapidWind {
        serial_number: identity.device_serial.clone(),
        message_type: MessageType::RapidWind,
        hub_sn: identity.hub_serial.clone(),
        ob: (epoch, speed, direction),
    })
}

/// Build an `obs_st` message from a normalized archive record
///
/// # Errors
///
/// Returns [`RelayError::Record`] if the record has no usable `dateTime`.
pub fn encode_obs_st(
    identity: &StationIdentity,
    record: &Record,
    sensor_map: &SensorMap,
) -> Result<ObsSt> {
    let epoch = record.epoch()?;
    let observation = Observation {
        epoch,
        fields: resolve_all(record, sensor_map),
    };

    Ok(ObsSt {
        serial_number: identity.device_serial.clone(),
        message_type: MessageType::ObsSt,
        hub_sn: identity.hub_serial.clone(),
        firmware_revision: None,
        obs: vec![observation],
    })
}

impl TryFrom<&Value> for ObsSt {
    type Error = RelayError;

    fn try_from(value: &Value) -> Result<Self> {
        Ok(ObsSt::deserialize(value)?)
    }
}
