// Tempest Relay Daemon - host adapter
// Copyright (c) 2024 Tempest Relay contributors
//
// Distributed under the terms of the GNU General Public License (GPLv3).
// See LICENSE file for details.

//! # Tempest Relay Daemon
//!
//! Feeds station records into the relay and broadcasts them as WeatherFlow
//! Tempest UDP messages.
//!
//! ## Usage
//!
//! ```bash
//! # Relay newline-delimited JSON events read from stdin
//! weewx-bridge | tempest-relay --config tempest-relay.toml
//!
//! # Replay a CSV archive export at 10x speed
//! tempest-relay --config tempest-relay.toml --csv archive.csv --speed 10.0
//!
//! # Write a starting configuration
//! tempest-relay --print-sample-config > tempest-relay.toml
//! ```

mod events;
mod replay;

use clap::Parser;
use events::{stream_events, StreamStats};
use replay::{ReplayConfig, ReplayEngine};
use std::error::Error;
use tempest_relay::config::DEFAULT_CONFIG_PATH;
use tempest_relay::{Relay, RelayConfig};
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// WeatherFlow Tempest UDP re-broadcaster
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Event stream to read ("-" for stdin)
    #[arg(short, long, default_value = "-")]
    input: String,

    /// CSV archive export to replay instead of reading events
    #[arg(long)]
    csv: Option<String>,

    /// Replay speed multiplier (1.0 = real-time)
    #[arg(short, long, default_value = "1.0")]
    speed: f64,

    /// Loop the replay when it reaches the end
    #[arg(short, long)]
    loop_replay: bool,

    /// Print a sample configuration and exit
    #[arg(long)]
    print_sample_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    if args.print_sample_config {
        print!("{}", RelayConfig::sample().to_toml()?);
        return Ok(());
    }

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Tempest Relay v{}", env!("CARGO_PKG_VERSION"));

    let config = RelayConfig::load(&args.config).map_err(|e| {
        error!("Failed to load {}: {}", args.config, e);
        e
    })?;
    let mut relay = Relay::from_config(&config)?;

    info!(
        "Relaying as {} via {} to {}",
        config.device_serial,
        config.hub_serial,
        relay.broadcaster().destination()
    );
    info!(
        "{} of 17 obs_st fields mapped",
        config.sensor_map.mapped_count()
    );

    if let Some(csv_path) = args.csv.clone() {
        let engine = ReplayEngine::from_csv(ReplayConfig {
            csv_path,
            speed: args.speed,
            loop_replay: args.loop_replay,
            ..Default::default()
        })?;
        let info = engine.dataset_info();
        info!(
            "Dataset loaded: {} fields, {} records spanning {}s",
            info.field_count, info.record_count, info.duration_secs
        );

        tokio::select! {
            _ = engine.run(&mut relay) => {}
            _ = tokio::signal::ctrl_c() => info!("Interrupted, stopping replay"),
        }
    } else {
        let stats = if args.input == "-" {
            info!("Reading events from stdin");
            run_stream(BufReader::new(tokio::io::stdin()), &mut relay).await?
        } else {
            info!("Reading events from {}", args.input);
            let file = tokio::fs::File::open(&args.input).await?;
            run_stream(BufReader::new(file), &mut relay).await?
        };

        if let Some(stats) = stats {
            info!(
                "Input finished: {} events, {} malformed, {} failed",
                stats.dispatched, stats.malformed, stats.failed
            );
        }
    }

    let metrics = relay.metrics();
    info!(
        "Broadcast {} datagrams ({} bytes), {} failed",
        metrics.datagrams_sent, metrics.bytes_sent, metrics.send_failures
    );

    Ok(())
}

/// Stream events until end of input or Ctrl-C; `None` when interrupted.
async fn run_stream<R>(
    reader: R,
    relay: &mut Relay,
) -> std::io::Result<Option<StreamStats>>
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        stats = stream_events(reader, relay) => stats.map(Some),
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping");
            Ok(None)
        }
    }
}
