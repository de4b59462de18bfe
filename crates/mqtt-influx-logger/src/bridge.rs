// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bridge engine.
//!
//! Ties the registry, buffer, gate and coercer together:
//!
//! ```text
//! MQTT publish --> on_message --> SampleBuffer
//!                                     |
//! tick --> flush_pass: drain --> WriteGate --> ValueCoercer --> SinkWriter
//! ```
//!
//! `on_message` and the ticker may run concurrently; they only meet inside
//! the buffer.

use crate::buffer::SampleBuffer;
use crate::coerce::{BoolMode, ValueCoercer};
use crate::config::{BridgeConfig, ConfigError};
use crate::gate::{GateState, WriteGate};
use crate::influx::Sample;
use crate::registry::TopicRegistry;
use crate::sink::SinkWriter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Bridge counters.
#[derive(Debug, Default)]
pub struct BridgeStats {
    /// Messages received for configured topics.
    pub messages_received: AtomicU64,
    /// Messages dropped because their topic is not configured.
    pub unknown_topic: AtomicU64,
    /// Samples accepted by the sink.
    pub samples_written: AtomicU64,
    /// Gate evaluations that kept a value back.
    pub samples_deferred: AtomicU64,
    /// Payloads dropped because they did not match the declared type.
    pub coercion_errors: AtomicU64,
    /// Sink write failures (value kept for retry).
    pub write_errors: AtomicU64,
    /// Completed flush passes.
    pub passes: AtomicU64,
}

impl BridgeStats {
    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> BridgeStatsSnapshot {
        BridgeStatsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            unknown_topic: self.unknown_topic.load(Ordering::Relaxed),
            samples_written: self.samples_written.load(Ordering::Relaxed),
            samples_deferred: self.samples_deferred.load(Ordering::Relaxed),
            coercion_errors: self.coercion_errors.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            passes: self.passes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStatsSnapshot {
    pub messages_received: u64,
    pub unknown_topic: u64,
    pub samples_written: u64,
    pub samples_deferred: u64,
    pub coercion_errors: u64,
    pub write_errors: u64,
    pub passes: u64,
}

/// Outcome of one flush pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Samples written.
    pub written: usize,
    /// Values kept back by the gate.
    pub deferred: usize,
    /// Values dropped as unparseable.
    pub dropped: usize,
    /// Values whose write failed (kept for the next pass).
    pub failed: usize,
}

/// Handle to stop a running ticker loop.
#[derive(Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// Request the ticker to stop after the current pass.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    /// Check if stop has been requested.
    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// MQTT-to-store bridge engine.
pub struct Bridge {
    registry: Arc<TopicRegistry>,
    buffer: SampleBuffer,
    gate: WriteGate,
    coercer: ValueCoercer,
    stats: BridgeStats,
    stop_tx: Arc<watch::Sender<bool>>,
}

impl Bridge {
    /// Create a bridge over an already built registry.
    pub fn new(registry: TopicRegistry, gate: WriteGate, coercer: ValueCoercer) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            registry: Arc::new(registry),
            buffer: SampleBuffer::new(),
            gate,
            coercer,
            stats: BridgeStats::default(),
            stop_tx: Arc::new(stop_tx),
        }
    }

    /// Build the registry and gate from configuration.
    pub fn from_config(config: &BridgeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = TopicRegistry::from_config(config)?;
        let bool_mode = if config.strict_bool {
            BoolMode::Strict
        } else {
            BoolMode::Loose
        };
        Ok(Self::new(
            registry,
            WriteGate::from_secs(config.min_write_interval),
            ValueCoercer::new(bool_mode),
        ))
    }

    pub fn registry(&self) -> &Arc<TopicRegistry> {
        &self.registry
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn gate(&self) -> &WriteGate {
        &self.gate
    }

    pub fn stats(&self) -> BridgeStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    /// Accept one inbound message.
    ///
    /// Returns `false` (and logs) if the topic is not configured.
    pub fn on_message(&self, topic: &str, payload: &[u8]) -> bool {
        if self.registry.lookup(topic).is_none() {
            self.stats.unknown_topic.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(topic, "Dropping message for unconfigured topic");
            return false;
        }
        self.stats.messages_received.fetch_add(1, Ordering::Relaxed);
        self.buffer.put(topic, payload.to_vec());
        true
    }

    /// Run one flush pass at `now`.
    ///
    /// Every pending value is offered to the gate; eligible ones are coerced
    /// and written one by one. A failed write leaves that value pending and
    /// does not stop the pass.
    pub async fn flush_pass<S>(&self, sink: &S, now: Instant) -> FlushReport
    where
        S: SinkWriter + ?Sized,
    {
        let mut report = FlushReport::default();
        let timestamp_ns = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();

        for entry in self.buffer.drain() {
            let Some(spec) = self.registry.lookup(&entry.topic) else {
                tracing::warn!(topic = %entry.topic, "Pending value for unconfigured topic");
                self.buffer.discard(entry);
                continue;
            };

            let state = GateState {
                fresh: entry.fresh,
                last_flush_at: entry.last_flush_at,
            };
            if !self.gate.eligible(spec, state, now) {
                self.buffer.restore(entry);
                report.deferred += 1;
                continue;
            }

            let value = match self.coercer.coerce(&entry.raw, spec.value_type) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(
                        topic = %entry.topic,
                        raw = %String::from_utf8_lossy(&entry.raw),
                        error = %e,
                        "Dropping value"
                    );
                    self.buffer.discard(entry);
                    report.dropped += 1;
                    continue;
                }
            };

            let sample = Sample::new(spec, value, timestamp_ns);
            match sink.write(&sample).await {
                Ok(()) => {
                    tracing::debug!(
                        topic = %entry.topic,
                        measurement = %sample.measurement,
                        field = %sample.field,
                        value = %sample.value,
                        "Sample written"
                    );
                    self.buffer
                        .mark_flushed(&entry.topic, now, entry.raw, spec.momentary);
                    report.written += 1;
                }
                Err(e) => {
                    tracing::warn!(topic = %entry.topic, error = %e, "Write failed, will retry");
                    self.buffer.restore(entry);
                    report.failed += 1;
                }
            }
        }

        self.record_pass(&report);
        report
    }

    fn record_pass(&self, report: &FlushReport) {
        let s = &self.stats;
        s.samples_written
            .fetch_add(report.written as u64, Ordering::Relaxed);
        s.samples_deferred
            .fetch_add(report.deferred as u64, Ordering::Relaxed);
        s.coercion_errors
            .fetch_add(report.dropped as u64, Ordering::Relaxed);
        s.write_errors
            .fetch_add(report.failed as u64, Ordering::Relaxed);
        s.passes.fetch_add(1, Ordering::Relaxed);
    }

    /// Run flush passes every `period` until stopped.
    ///
    /// A pass that has started always completes; the stop request is only
    /// observed between passes.
    pub async fn run<S>(&self, sink: &S, period: Duration)
    where
        S: SinkWriter + ?Sized,
    {
        let mut stop_rx = self.stop_tx.subscribe();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            topics = self.registry.len(),
            min_write_interval_secs = self.gate.min_write_interval().as_secs(),
            "Flush loop started"
        );

        loop {
            if *stop_rx.borrow_and_update() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.flush_pass(sink, Instant::now()).await;
                    if report != FlushReport::default() {
                        tracing::debug!(
                            written = report.written,
                            deferred = report.deferred,
                            dropped = report.dropped,
                            failed = report.failed,
                            "Flush pass"
                        );
                    }
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Flush loop stopped");
    }
}
