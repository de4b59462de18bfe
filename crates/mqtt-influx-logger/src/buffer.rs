// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-topic pending value store.
//!
//! Holds at most one raw value per topic (the latest one) together with the
//! bookkeeping the write gate needs: the freshness marker and the time of
//! the last successful flush.
//!
//! Both the ingress context (`put`) and the flush pass (`drain`, `restore`,
//! `mark_flushed`) go through one mutex. Every critical section touches a
//! single map operation or one sweep over the map; the lock is never held
//! across a sink write.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// A value taken out of the buffer by [`SampleBuffer::drain`].
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSample {
    /// Source topic.
    pub topic: String,
    /// Raw payload as received.
    pub raw: Vec<u8>,
    /// Placed since the last flush and different from the last written value.
    pub fresh: bool,
    /// Time of the last successful flush of this topic.
    pub last_flush_at: Option<Instant>,
}

/// Read-only view of one topic's state.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicStateSnapshot {
    pub pending: Option<Vec<u8>>,
    pub fresh: bool,
    pub last_flush_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct TopicState {
    pending: Option<Vec<u8>>,
    fresh: bool,
    last_flush_at: Option<Instant>,
    last_written: Option<Vec<u8>>,
    /// Drained and not yet written, restored or discarded.
    in_flight: Option<Vec<u8>>,
}

impl TopicState {
    /// Value a new put is compared against to decide freshness.
    fn reference(&self) -> Option<&Vec<u8>> {
        self.in_flight.as_ref().or(self.last_written.as_ref())
    }
}

/// Latest-value-wins buffer keyed by topic.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    states: Mutex<HashMap<String, TopicState>>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TopicState>> {
        // Every critical section leaves the map consistent, so a panic
        // elsewhere while holding the guard does not invalidate it.
        self.states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `raw` as the pending value of `topic`, replacing any older one.
    ///
    /// The value is fresh unless it equals the value being written (or, with
    /// no write in progress, the last value written) and no fresh value was
    /// pending.
    pub fn put(&self, topic: &str, raw: Vec<u8>) {
        let mut states = self.lock();
        let state = states.entry(topic.to_string()).or_default();
        state.fresh = state.fresh || state.reference() != Some(&raw);
        state.pending = Some(raw);
    }

    /// Remove and return every pending value.
    ///
    /// Values put after this call are kept for the next pass.
    pub fn drain(&self) -> Vec<PendingSample> {
        let mut states = self.lock();
        states
            .iter_mut()
            .filter_map(|(topic, state)| {
                let raw = state.pending.take()?;
                let fresh = std::mem::replace(&mut state.fresh, false);
                state.in_flight = Some(raw.clone());
                Some(PendingSample {
                    topic: topic.clone(),
                    raw,
                    fresh,
                    last_flush_at: state.last_flush_at,
                })
            })
            .collect()
    }

    /// Return a drained value that was not written.
    ///
    /// A value put in the meantime is newer and wins; the freshness marker
    /// of the returned entry is carried over either way.
    pub fn restore(&self, sample: PendingSample) {
        let mut states = self.lock();
        let state = states.entry(sample.topic).or_default();
        state.in_flight = None;
        state.fresh = state.fresh || sample.fresh;
        if state.pending.is_none() {
            state.pending = Some(sample.raw);
        }
    }

    /// Record a successful write of `raw` for `topic` at `at`.
    ///
    /// `last_flush_at` never moves backwards. With `retain`, the written
    /// value stays buffered as a stale (not fresh) value unless a newer one
    /// arrived meanwhile.
    pub fn mark_flushed(&self, topic: &str, at: Instant, raw: Vec<u8>, retain: bool) {
        let mut states = self.lock();
        let state = states.entry(topic.to_string()).or_default();
        state.last_flush_at = Some(match state.last_flush_at {
            Some(prev) if prev > at => prev,
            _ => at,
        });
        state.in_flight = None;
        if retain && state.pending.is_none() {
            state.pending = Some(raw.clone());
        }
        state.last_written = Some(raw);
    }

    /// Drop a drained value that will never be written.
    pub fn discard(&self, sample: PendingSample) {
        let mut states = self.lock();
        if let Some(state) = states.get_mut(&sample.topic) {
            state.in_flight = None;
        }
    }

    /// Snapshot one topic's state.
    pub fn peek(&self, topic: &str) -> Option<TopicStateSnapshot> {
        let states = self.lock();
        states.get(topic).map(|state| TopicStateSnapshot {
            pending: state.pending.clone(),
            fresh: state.fresh,
            last_flush_at: state.last_flush_at,
        })
    }

    /// Number of topics with a pending value.
    pub fn pending_len(&self) -> usize {
        self.lock().values().filter(|s| s.pending.is_some()).count()
    }

    /// Check if no topic has a pending value.
    pub fn is_empty(&self) -> bool {
        self.pending_len() == 0
    }
}
