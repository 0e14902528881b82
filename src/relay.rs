// Tempest Relay - WeatherFlow UDP re-broadcaster
// Copyright (c) 2024 Tempest Relay contributors
//
// Distributed under the terms of the GNU General Public License (GPLv3).
// See LICENSE file for details.

//! High-level relay API
//!
//! The host framework owns event dispatch and calls into the relay through
//! [`StationEvents`]: one callback per loop packet, one per archive record.
//! Each call is processed to completion (normalize, encode, broadcast) and
//! leaves no state behind apart from broadcaster counters.
//!
//! # Example
//!
//! ```rust
//! use tempest_relay::{
//!     CanonicalField, MemoryBroadcaster, Record, Relay, SensorMap, StationEvents,
//!     StationIdentity,
//! };
//! use tempest_relay::units::Identity;
//!
//! let sensor_map = SensorMap::new().with(CanonicalField::WindAvg, "windSpeed");
//! let mut relay = Relay::new(
//!     StationIdentity::new("ST-00006021", "HB-12345678"),
//!     sensor_map,
//!     Identity,
//!     MemoryBroadcaster::new(),
//! );
//!
//! let record = Record::new().with("dateTime", 1725909100).with("windSpeed", 0.6);
//! relay.on_new_archive_record(&record).unwrap();
//!
//! let payload = relay.broadcaster_mut().pop_sent().unwrap();
//! assert!(payload.contains("\"obs\":[[1725909100,null,0.6,"));
//! ```

use crate::broadcast::{BroadcastMetrics, Broadcaster, UdpBroadcaster};
use crate::config::RelayConfig;
use crate::error::Result;
use crate::protocol::{encode_obs_st, encode_rapid_wind, ObsSt, RapidWind, StationIdentity};
use crate::record::Record;
use crate::sensor_map::SensorMap;
use crate::units::{MetricWxNormalizer, UnitNormalizer};
use log::{debug, trace, warn};

/// Callbacks the host framework invokes
pub trait StationEvents {
    /// A new loop packet (instantaneous sample) is available
    fn on_new_sample(&mut self, packet: &Record) -> Result<()>;

    /// A new archive record is available
    fn on_new_archive_record(&mut self, record: &Record) -> Result<()>;
}

/// Turns host records into WeatherFlow broadcasts
pub struct Relay<N = MetricWxNormalizer, B = UdpBroadcaster> {
    identity: StationIdentity,
    sensor_map: SensorMap,
    normalizer: N,
    broadcaster: B,
}

impl Relay<MetricWxNormalizer, UdpBroadcaster> {
    /// Create a UDP relay from startup configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete or the broadcast
    /// address is not IPv4.
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        config.validate()?;
        let broadcaster = UdpBroadcaster::new(&config.broadcast_address, config.broadcast_port)?;
        Ok(Self::new(
            config.identity(),
            config.sensor_map.clone(),
            MetricWxNormalizer::new(config.source_unit_system),
            broadcaster,
        ))
    }
}

impl<N: UnitNormalizer, B: Broadcaster> Relay<N, B> {
    /// Create a relay from its parts
    pub fn new(
        identity: StationIdentity,
        sensor_map: SensorMap,
        normalizer: N,
        broadcaster: B,
    ) -> Self {
        Self {
            identity,
            sensor_map,
            normalizer,
            broadcaster,
        }
    }

    /// Normalize a loop packet and build its `rapid_wind` message
    pub fn rapid_wind(&self, packet: &Record) -> Result<RapidWind> {
        let packet = self.normalizer.normalize(packet);
        encode_rapid_wind(&self.identity, &packet)
    }

    /// Normalize an archive record and build its `obs_st` message
    pub fn obs_st(&self, record: &Record) -> Result<ObsSt> {
        let record = self.normalizer.normalize(record);
        trace!("Normalized archive record: {:?}", record);
        encode_obs_st(&self.identity, &record, &self.sensor_map)
    }

    /// Station identity
    pub fn identity(&self) -> &StationIdentity {
        &self.identity
    }

    /// Sensor map
    pub fn sensor_map(&self) -> &SensorMap {
        &self.sensor_map
    }

    /// Underlying broadcaster
    pub fn broadcaster(&self) -> &B {
        &self.broadcaster
    }

    /// Mutable access to the underlying broadcaster
    pub fn broadcaster_mut(&mut self) -> &mut B {
        &mut self.broadcaster
    }

    /// Broadcaster counters
    pub fn metrics(&self) -> BroadcastMetrics {
        self.broadcaster.metrics()
    }

    fn emit(&mut self, kind: &str, payload: &str) -> Result<()> {
        debug!("{}: {}", kind, payload);
        if let Err(e) = self.broadcaster.send(payload) {
            warn!("Failed to broadcast {}: {}", kind, e);
            return Err(e.into());
        }
        Ok(())
    }
}

impl<N: UnitNormalizer, B: Broadcaster> StationEvents for Relay<N, B> {
    fn on_new_sample(&mut self, packet: &Record) -> Result<()> {
        let payload = self.rapid_wind(packet)?.to_json()?;
        self.emit("rapid_wind", &payload)
    }

    fn on_new_archive_record(&mut self, record: &Record) -> Result<()> {
        let payload = self.obs_st(record)?.to_json()?;
        self.emit("obs_st", &payload)
    }
}
