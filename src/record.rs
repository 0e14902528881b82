// Tempest Relay - WeatherFlow UDP re-broadcaster
// Copyright (c) 2024 Tempest Relay contributors
//
// Distributed under the terms of the GNU General Public License (GPLv3).
// See LICENSE file for details.

//! Station records
//!
//! A [`Record`] is the named-value mapping the host framework hands over with
//! each loop packet or archive record. Values are kept as JSON values so that
//! numbers, explicit nulls and the occasional non-numeric entry all pass
//! through the resolver untouched.

use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key holding the epoch timestamp (seconds) of a record
pub const DATE_TIME: &str = "dateTime";

/// Key holding the unit system a record is expressed in
pub const US_UNITS: &str = "usUnits";

/// A named-value mapping for one loop packet or archive record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    values: Map<String, Value>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a field; `None` when the key is absent
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Numeric value of a field, if present and numeric
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(Value::as_f64)
    }

    /// Set a field
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Builder-style [`Record::insert`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Check if a key is present (even with a null value)
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the record has no fields
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Mutable access to a field
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.values.get_mut(name)
    }

    /// Epoch timestamp in whole seconds
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Record`] when `dateTime` is absent, null, or not
    /// a whole number.
    pub fn epoch(&self) -> Result<i64> {
        let value = self
            .values
            .get(DATE_TIME)
            .ok_or_else(|| RelayError::Record(format!("missing `{}`", DATE_TIME)))?;

        if let Some(epoch) = value.as_i64() {
            return Ok(epoch);
        }
        match value.as_f64() {
            Some(f) if f.fract() == 0.0 && f.is_finite() => Ok(f as i64),
            _ => Err(RelayError::Record(format!(
                "`{}` is not an epoch timestamp: {}",
                DATE_TIME, value
            ))),
        }
    }
}

impl From<Map<String, Value>> for Record {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
