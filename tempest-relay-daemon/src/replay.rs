// Tempest Relay Daemon - CSV replay
// Copyright (c) 2024 Tempest Relay contributors
//
// Distributed under the terms of the GNU General Public License (GPLv3).
// See LICENSE file for details.

//! Replay of recorded archive data.
//!
//! A CSV export of archive records (one column per record field, one of
//! which must be `dateTime`) is fed through the relay row by row. Every row
//! is relayed as a loop packet and as an archive record, paced by the gap
//! between consecutive timestamps divided by the speed multiplier.

use crate::events::{describe_time, report_failure, EventKind};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tempest_relay::record::DATE_TIME;
use tempest_relay::{Record, StationEvents};
use tokio::time::sleep;
use tracing::{debug, info};

/// Configuration for dataset replay.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Path to CSV dataset file.
    pub csv_path: String,
    /// Replay speed multiplier (1.0 = real-time, 10.0 = 10x faster).
    pub speed: f64,
    /// Whether to loop the dataset.
    pub loop_replay: bool,
    /// Gap after the last row, in seconds.
    pub default_interval_secs: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            csv_path: String::new(),
            speed: 1.0,
            loop_replay: false,
            default_interval_secs: 300, // 5 minute archive interval
        }
    }
}

/// Dataset information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetInfo {
    pub field_count: usize,
    pub record_count: usize,
    pub duration_secs: i64,
}

/// Replays a CSV dataset through a relay.
pub struct ReplayEngine {
    config: ReplayConfig,
    fields: Vec<String>,
    rows: Vec<Record>,
}

impl ReplayEngine {
    /// Create a new replay engine from a CSV file.
    pub fn from_csv(config: ReplayConfig) -> Result<Self, ReplayError> {
        if !(config.speed.is_finite() && config.speed > 0.0) {
            return Err(ReplayError::InvalidSpeed(config.speed));
        }

        let path = Path::new(&config.csv_path);
        if !path.exists() {
            return Err(ReplayError::FileNotFound(config.csv_path.clone()));
        }

        let (fields, rows) = Self::parse_csv(path)?;
        if rows.is_empty() {
            return Err(ReplayError::EmptyDataset);
        }

        info!(
            "Loaded dataset: {} fields, {} records",
            fields.len(),
            rows.len()
        );

        Ok(Self {
            config,
            fields,
            rows,
        })
    }

    /// Parse a CSV file into field names and records.
    fn parse_csv(path: &Path) -> Result<(Vec<String>, Vec<Record>), ReplayError> {
        let mut reader = csv::Reader::from_path(path)?;

        let fields: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        if !fields.iter().any(|f| f == DATE_TIME) {
            return Err(ReplayError::InvalidFormat(format!(
                "missing '{}' column",
                DATE_TIME
            )));
        }

        let mut rows = Vec::new();
        for (line, result) in reader.records().enumerate() {
            let row = result?;
            let mut record = Record::new();
            for (name, cell) in fields.iter().zip(row.iter()) {
                record.insert(name.clone(), parse_cell(cell));
            }
            record.epoch().map_err(|_| {
                ReplayError::InvalidFormat(format!("row {}: invalid '{}'", line + 1, DATE_TIME))
            })?;
            rows.push(record);
        }

        Ok((fields, rows))
    }

    /// Dataset information.
    pub fn dataset_info(&self) -> DatasetInfo {
        let first = self.rows.first().and_then(|r| r.epoch().ok()).unwrap_or(0);
        let last = self.rows.last().and_then(|r| r.epoch().ok()).unwrap_or(0);
        DatasetInfo {
            field_count: self.fields.len(),
            record_count: self.rows.len(),
            duration_secs: last - first,
        }
    }

    /// Run the replay; returns when the dataset ends and looping is off.
    pub async fn run<E: StationEvents>(&self, relay: &mut E) {
        info!(
            "Starting replay: speed={}, loop={}",
            self.config.speed, self.config.loop_replay
        );

        loop {
            for (position, record) in self.rows.iter().enumerate() {
                self.process_row(relay, record, position);
                sleep(self.pause_after(position)).await;
            }

            if !self.config.loop_replay {
                info!("Dataset complete, stopping");
                break;
            }
            info!("Dataset complete, looping...");
        }
    }

    fn process_row<E: StationEvents>(&self, relay: &mut E, record: &Record, position: usize) {
        debug!("Replaying record {} at {}", position, describe_time(record));

        if let Err(e) = relay.on_new_sample(record) {
            report_failure(EventKind::Loop, &e);
        }
        if let Err(e) = relay.on_new_archive_record(record) {
            report_failure(EventKind::Archive, &e);
        }
    }

    /// Wall-clock pause after the row at `position`.
    fn pause_after(&self, position: usize) -> Duration {
        let gap_secs = match (self.rows.get(position), self.rows.get(position + 1)) {
            (Some(current), Some(next)) => match (current.epoch(), next.epoch()) {
                (Ok(a), Ok(b)) => (b - a).max(0) as f64,
                _ => 0.0,
            },
            _ => self.config.default_interval_secs as f64,
        };
        Duration::from_secs_f64(gap_secs / self.config.speed)
    }
}

/// Empty cells are null; numbers stay numbers; anything else is kept as text.
fn parse_cell(cell: &str) -> Value {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("none") || cell.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::from(i);
    }
    match cell.parse::<f64>() {
        Ok(f) if f.is_finite() => Value::from(f),
        _ => Value::from(cell),
    }
}

/// Replay errors.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("Invalid replay speed: {0}")]
    InvalidSpeed(f64),
}
