// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT to InfluxDB Logger
//!
//! Subscribes to sensor and device topics on an MQTT broker and writes their
//! values into InfluxDB, throttling each topic to at most one write per
//! `min_write_interval` while still capturing state changes on "momentary"
//! topics right away.
//!
//! This crate provides:
//! - YAML/JSON configuration mapping topics to measurement fields
//! - A latest-value buffer shared by the MQTT callback and the flush loop
//! - The write gate (interval throttle with momentary fast path)
//! - Payload coercion to string/int/bool/float field values
//! - An InfluxDB 1.x/2.x Line Protocol writer
//!
//! # Overview
//!
//! ```text
//! MQTT publish --> Bridge::on_message --> SampleBuffer
//!                                             |
//! every tick:  drain --> WriteGate --> ValueCoercer --> SinkWriter (InfluxDB)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use mqtt_influx_logger::{Bridge, BridgeConfig, InfluxWriter};
//! use std::time::Duration;
//!
//! let config = BridgeConfig::from_file("logger.yaml")?;
//! let bridge = Bridge::from_config(&config)?;
//! let sink = InfluxWriter::new(config.influxdb.clone())?;
//!
//! bridge.on_message("sensors/temp", b"21.5");
//! bridge.run(&sink, Duration::from_secs(1)).await;
//! ```

pub mod bridge;
pub mod buffer;
pub mod coerce;
pub mod config;
pub mod gate;
pub mod influx;
pub mod mqtt;
pub mod registry;
pub mod sink;

pub use bridge::{Bridge, BridgeStats, BridgeStatsSnapshot, FlushReport, StopHandle};
pub use buffer::{PendingSample, SampleBuffer, TopicStateSnapshot};
pub use coerce::{BoolMode, CoerceError, ValueCoercer};
pub use config::{BridgeConfig, ConfigError, InfluxDbConfig, MqttConfig};
pub use gate::{GateState, WriteGate};
pub use influx::{FieldValue, InfluxWriter, Sample};
pub use mqtt::MqttIngress;
pub use registry::{TopicRegistry, TopicSpec, ValueType};
pub use sink::{SinkFuture, SinkWriter, StdoutSink, WriteError};
