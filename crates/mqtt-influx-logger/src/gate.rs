// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Write gate.
//!
//! Decides whether a buffered value may be written now. The decision is a
//! pure function of the topic spec, the topic's bookkeeping and the current
//! time; it does not depend on the order topics are visited in a pass.
//!
//! - Continuous topics are written at most once per `min_write_interval`.
//! - Momentary topics are written on the next pass after a change, and
//!   otherwise re-written once the interval has elapsed.

use crate::registry::TopicSpec;
use std::time::{Duration, Instant};

/// Bookkeeping the gate looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateState {
    /// The pending value changed since the last flush.
    pub fresh: bool,
    /// Time of the last successful flush.
    pub last_flush_at: Option<Instant>,
}

/// Process-wide write throttle.
#[derive(Debug, Clone, Copy)]
pub struct WriteGate {
    min_write_interval: Duration,
}

impl WriteGate {
    pub fn new(min_write_interval: Duration) -> Self {
        Self { min_write_interval }
    }

    /// Build from an interval in whole seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn min_write_interval(&self) -> Duration {
        self.min_write_interval
    }

    /// Check whether a value for `spec` in `state` may be written at `now`.
    pub fn eligible(&self, spec: &TopicSpec, state: GateState, now: Instant) -> bool {
        if spec.momentary && state.fresh {
            return true;
        }
        match state.last_flush_at {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.min_write_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ValueType;
    use std::collections::BTreeMap;

    fn spec(momentary: bool) -> TopicSpec {
        TopicSpec {
            measurement: "m".to_string(),
            tags: BTreeMap::new(),
            field: "value".to_string(),
            value_type: ValueType::Float,
            momentary,
        }
    }

    fn state(fresh: bool, last_flush_at: Option<Instant>) -> GateState {
        GateState {
            fresh,
            last_flush_at,
        }
    }

    #[test]
    fn test_continuous_first_write_allowed() {
        let gate = WriteGate::from_secs(60);
        assert!(gate.eligible(&spec(false), state(true, None), Instant::now()));
    }

    #[test]
    fn test_continuous_throttled_within_interval() {
        let gate = WriteGate::from_secs(60);
        let t0 = Instant::now();

        let s = state(true, Some(t0));
        assert!(!gate.eligible(&spec(false), s, t0 + Duration::from_secs(10)));
        // Interval must be strictly exceeded
        assert!(!gate.eligible(&spec(false), s, t0 + Duration::from_secs(60)));
        assert!(gate.eligible(&spec(false), s, t0 + Duration::from_secs(61)));
    }

    #[test]
    fn test_continuous_ignores_freshness() {
        let gate = WriteGate::from_secs(60);
        let t0 = Instant::now();
        let now = t0 + Duration::from_secs(5);

        assert!(!gate.eligible(&spec(false), state(true, Some(t0)), now));
        assert!(!gate.eligible(&spec(false), state(false, Some(t0)), now));
    }

    #[test]
    fn test_momentary_fresh_bypasses_interval() {
        let gate = WriteGate::from_secs(60);
        let t0 = Instant::now();

        assert!(gate.eligible(
            &spec(true),
            state(true, Some(t0)),
            t0 + Duration::from_secs(1)
        ));
    }

    #[test]
    fn test_momentary_stale_waits_for_interval() {
        let gate = WriteGate::from_secs(60);
        let t0 = Instant::now();
        let s = state(false, Some(t0));

        assert!(!gate.eligible(&spec(true), s, t0 + Duration::from_secs(30)));
        assert!(gate.eligible(&spec(true), s, t0 + Duration::from_secs(90)));
    }

    #[test]
    fn test_momentary_never_flushed_is_eligible() {
        let gate = WriteGate::from_secs(60);
        assert!(gate.eligible(&spec(true), state(false, None), Instant::now()));
    }

    #[test]
    fn test_clock_behind_last_flush_is_not_eligible() {
        let gate = WriteGate::from_secs(1);
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(10);

        assert!(!gate.eligible(&spec(false), state(false, Some(later)), t0));
    }
}
