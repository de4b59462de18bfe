// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT to InfluxDB Logger CLI
//!
//! # Usage
//!
//! ```bash
//! # Run with a configuration file
//! mqtt-influx-logger --config logger.yaml
//!
//! # Legacy JSON configuration, overriding the write interval
//! mqtt-influx-logger --config logger.conf --min-write-interval 30
//!
//! # Print Line Protocol instead of writing to InfluxDB
//! mqtt-influx-logger --config logger.yaml --dry-run
//!
//! # Check a configuration file
//! mqtt-influx-logger validate --config logger.yaml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mqtt_influx_logger::{
    Bridge, BridgeConfig, BridgeStatsSnapshot, InfluxWriter, MqttIngress, SinkWriter, StdoutSink,
    StopHandle, TopicRegistry,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How long to wait for the MQTT client to say goodbye on shutdown.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "mqtt-influx-logger")]
#[command(author = "naskel.com")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Log MQTT topics into InfluxDB with per-topic write throttling")]
struct Args {
    /// Configuration file (.yaml/.yml, or .json/.conf)
    #[arg(short, long, default_value = "logger.yaml")]
    config: PathBuf,

    /// Override min_write_interval (seconds)
    #[arg(long)]
    min_write_interval: Option<u64>,

    /// Print Line Protocol to stdout instead of writing to InfluxDB
    #[arg(long)]
    dry_run: bool,

    /// Statistics reporting interval (seconds, 0 to disable)
    #[arg(long, default_value_t = 60)]
    stats_interval: u64,

    /// Log filter (e.g. "info", "mqtt_influx_logger=debug,rumqttc=warn")
    #[arg(long)]
    log_level: Option<String>,

    /// Verbose mode (debug logs)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a configuration file and print the topic mapping
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = log_filter(&args)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Some(Commands::Validate { config }) = args.command {
        return cmd_validate(config);
    }

    let mut config = BridgeConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    if let Some(secs) = args.min_write_interval {
        config.min_write_interval = secs;
    }

    let bridge = Arc::new(Bridge::from_config(&config).context("Invalid topic configuration")?);
    tracing::info!(
        config = %args.config.display(),
        topics = bridge.registry().len(),
        min_write_interval = config.min_write_interval,
        "Configuration loaded"
    );

    let sink: Box<dyn SinkWriter> = if args.dry_run {
        tracing::info!("Dry run: writing Line Protocol to stdout");
        Box::new(StdoutSink)
    } else {
        let writer =
            InfluxWriter::new(config.influxdb.clone()).context("Failed to create InfluxDB writer")?;
        if let Err(e) = writer.ensure_database().await {
            tracing::warn!(error = %e, "Could not create InfluxDB database");
        }
        Box::new(writer)
    };

    let topics = bridge
        .registry()
        .topics()
        .into_iter()
        .map(str::to_string)
        .collect();
    let ingress = MqttIngress::new(&config.mqtt, topics);
    let mqtt_client = ingress.client();
    let ingress_task = tokio::spawn(ingress.run(Arc::clone(&bridge)));

    tokio::spawn(stop_on_ctrl_c(bridge.stop_handle()));

    if args.stats_interval > 0 {
        let stats_bridge = Arc::clone(&bridge);
        let period = Duration::from_secs(args.stats_interval);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                log_stats(&stats_bridge.stats(), "Bridge statistics");
            }
        });
    }

    bridge
        .run(sink.as_ref(), Duration::from_millis(config.tick_interval_ms))
        .await;

    if let Err(e) = mqtt_client.disconnect().await {
        tracing::debug!(error = %e, "MQTT disconnect request failed");
    }
    if tokio::time::timeout(DISCONNECT_TIMEOUT, ingress_task)
        .await
        .is_err()
    {
        tracing::debug!("MQTT event loop did not stop in time");
    }

    log_stats(&bridge.stats(), "Logger shutdown complete");
    Ok(())
}

fn log_filter(args: &Args) -> Result<EnvFilter> {
    match (&args.log_level, args.verbose) {
        (Some(level), _) => {
            EnvFilter::try_new(level).with_context(|| format!("Invalid --log-level '{level}'"))
        }
        (None, true) => Ok(EnvFilter::new("mqtt_influx_logger=debug,rumqttc=info")),
        (None, false) => Ok(EnvFilter::new("mqtt_influx_logger=info,rumqttc=warn")),
    }
}

/// Stop the bridge on Ctrl+C. Without a signal handler the logger keeps
/// running.
async fn stop_on_ctrl_c(stop: StopHandle) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C, shutting down...");
            stop.stop();
        }
        Err(e) => {
            tracing::error!(error = %e, "Cannot listen for Ctrl+C, logger keeps running");
        }
    }
}

fn log_stats(stats: &BridgeStatsSnapshot, message: &str) {
    tracing::info!(
        received = stats.messages_received,
        unknown_topic = stats.unknown_topic,
        written = stats.samples_written,
        coercion_errors = stats.coercion_errors,
        write_errors = stats.write_errors,
        passes = stats.passes,
        "{}",
        message
    );
}

fn cmd_validate(path: PathBuf) -> Result<()> {
    let config = BridgeConfig::from_file(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let registry = TopicRegistry::from_config(&config).context("Invalid topic configuration")?;

    println!("Configuration valid!");
    println!();
    println!("MQTT: {}:{}", config.mqtt.host, config.mqtt.port);
    println!(
        "InfluxDB: {} ({})",
        config.influxdb.url,
        if config.influxdb.is_v2() { "v2" } else { "v1" }
    );
    println!("Min write interval: {}s", config.min_write_interval);
    println!("Topics: {}", registry.len());
    for topic in registry.topics() {
        if let Some(spec) = registry.lookup(topic) {
            println!(
                "  {} -> {}.{} ({}{})",
                topic,
                spec.measurement,
                spec.field,
                spec.value_type,
                if spec.momentary { ", momentary" } else { "" }
            );
        }
    }
    Ok(())
}
