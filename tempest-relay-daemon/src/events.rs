// Tempest Relay Daemon - host adapter
// Copyright (c) 2024 Tempest Relay contributors
//
// Distributed under the terms of the GNU General Public License (GPLv3).
// See LICENSE file for details.

//! Newline-delimited JSON host events.
//!
//! Each line carries one event from the data-collection host:
//!
//! ```text
//! {"event": "loop",    "record": {"dateTime": 1493322445, "windSpeed": 2.3, "windGustDir": 128}}
//! {"event": "archive", "record": {"dateTime": 1725909100, "outTemp": 18.2, "usUnits": 17}}
//! ```
//!
//! Blank lines are ignored. A line that cannot be decoded is logged and
//! skipped; the stream keeps going.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tempest_relay::{Record, RelayError, StationEvents};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// Kind of host event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Loop packet, relayed as rapid_wind.
    #[serde(alias = "sample", alias = "new_loop_packet")]
    Loop,
    /// Archive record, relayed as obs_st.
    #[serde(alias = "record", alias = "new_archive_record")]
    Archive,
}

/// One decoded host event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HostEvent {
    pub event: EventKind,
    pub record: Record,
}

/// Counters for one event stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Events handed to the relay.
    pub dispatched: usize,
    /// Lines that were not valid events.
    pub malformed: usize,
    /// Events the relay reported an error for.
    pub failed: usize,
}

/// Decode one line; `Ok(None)` for blank lines.
pub fn parse_line(line: &str) -> Result<Option<HostEvent>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// Hand an event to the matching relay callback.
pub fn dispatch<E: StationEvents>(relay: &mut E, event: &HostEvent) -> tempest_relay::Result<()> {
    debug!(
        "{:?} record at {}",
        event.event,
        describe_time(&event.record)
    );
    match event.event {
        EventKind::Loop => relay.on_new_sample(&event.record),
        EventKind::Archive => relay.on_new_archive_record(&event.record),
    }
}

/// Log an event failure at a level matching its kind.
pub fn report_failure(kind: EventKind, err: &RelayError) {
    match err {
        // Already reported by the relay.
        RelayError::Transmission(_) => debug!("{:?} event not delivered: {}", kind, err),
        _ => warn!("Skipping {:?} event: {}", kind, err),
    }
}

/// Read events until end of input, dispatching each in order.
pub async fn stream_events<R, E>(reader: R, relay: &mut E) -> std::io::Result<StreamStats>
where
    R: AsyncBufRead + Unpin,
    E: StationEvents,
{
    let mut stats = StreamStats::default();
    let mut lines = reader.lines();
    let mut line_number = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let event = match parse_line(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                warn!("Line {}: malformed event: {}", line_number, e);
                stats.malformed += 1;
                continue;
            }
        };

        stats.dispatched += 1;
        if let Err(e) = dispatch(relay, &event) {
            report_failure(event.event, &e);
            stats.failed += 1;
        }
    }

    Ok(stats)
}

/// Human-readable record time for logs.
pub fn describe_time(record: &Record) -> String {
    match record.epoch() {
        Ok(epoch) => DateTime::<Utc>::from_timestamp(epoch, 0)
            .map(|t| format!("{} ({})", t.format("%Y-%m-%d %H:%M:%S UTC"), epoch))
            .unwrap_or_else(|| epoch.to_string()),
        Err(_) => "unknown time".to_string(),
    }
}
