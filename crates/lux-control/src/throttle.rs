// SPDX-License-Identifier: Apache-2.0
//! Per-endpoint notification throttling.
//!
//! State change notifications coalesce per endpoint: within the throttle
//! interval only the most recent pending payload survives, and it goes out
//! when the engine loop next flushes. The engine loop is the only caller,
//! so no locking is needed here.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::ClientId;

/// Camera-style endpoints where latency dominates.
pub const INTERACTIVE_INTERVAL: Duration = Duration::from_millis(1);
/// Default tier for state endpoints.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(50);
/// Statistics and progress, where staleness is cheap.
pub const SLOW_INTERVAL: Duration = Duration::from_millis(750);

/// An already-encoded notification waiting to go out, with the client that
/// caused it (excluded from the broadcast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNotice {
    /// Encoded notification frame.
    pub frame: String,
    /// Originating client, excluded from delivery.
    pub exclude: Option<ClientId>,
}

/// Throttle state for one endpoint.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
    pending: Option<PendingNotice>,
}

impl Throttle {
    /// A throttle with the given minimum interval between sends.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            pending: None,
        }
    }

    fn elapsed(&self, now: Instant) -> bool {
        self.last
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }

    /// Submit a notice. Returns it back when it should go out immediately;
    /// otherwise it replaces any pending notice (last write wins).
    pub fn submit(&mut self, now: Instant, notice: PendingNotice) -> Option<PendingNotice> {
        if self.elapsed(now) {
            self.last = Some(now);
            self.pending = None;
            Some(notice)
        } else {
            self.pending = Some(notice);
            None
        }
    }

    /// Drain the pending notice once its interval elapsed.
    pub fn take_due(&mut self, now: Instant) -> Option<PendingNotice> {
        if self.pending.is_some() && self.elapsed(now) {
            self.last = Some(now);
            self.pending.take()
        } else {
            None
        }
    }
}

/// Throttles keyed by endpoint, created lazily at the default tier.
#[derive(Debug, Default)]
pub struct ThrottleMap {
    map: HashMap<String, Throttle>,
}

impl ThrottleMap {
    /// Pin an endpoint to a non-default tier.
    pub fn set_interval(&mut self, endpoint: impl Into<String>, interval: Duration) {
        self.map.insert(endpoint.into(), Throttle::new(interval));
    }

    /// Submit a notice for an endpoint; see [`Throttle::submit`].
    pub fn submit(
        &mut self,
        endpoint: &str,
        now: Instant,
        notice: PendingNotice,
    ) -> Option<PendingNotice> {
        self.map
            .entry(endpoint.to_owned())
            .or_insert_with(|| Throttle::new(DEFAULT_INTERVAL))
            .submit(now, notice)
    }

    /// Drain every due pending notice.
    pub fn take_due(&mut self, now: Instant) -> Vec<PendingNotice> {
        self.map
            .values_mut()
            .filter_map(|throttle| throttle.take_due(now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice(frame: &str) -> PendingNotice {
        PendingNotice {
            frame: frame.to_owned(),
            exclude: None,
        }
    }

    #[test]
    fn first_submit_goes_out_immediately() {
        let mut throttle = Throttle::new(DEFAULT_INTERVAL);
        let now = Instant::now();
        assert_eq!(throttle.submit(now, notice("a")), Some(notice("a")));
    }

    #[test]
    fn burst_keeps_only_the_last_pending() {
        let mut throttle = Throttle::new(DEFAULT_INTERVAL);
        let t0 = Instant::now();
        assert!(throttle.submit(t0, notice("a")).is_some());
        assert!(throttle.submit(t0, notice("b")).is_none());
        assert!(throttle.submit(t0, notice("c")).is_none());

        // nothing due before the interval
        assert!(throttle.take_due(t0).is_none());

        let later = t0 + DEFAULT_INTERVAL;
        assert_eq!(throttle.take_due(later), Some(notice("c")));
        // drained exactly once
        assert!(throttle.take_due(later + DEFAULT_INTERVAL).is_none());
    }

    #[test]
    fn submit_after_interval_resets_the_window() {
        let mut throttle = Throttle::new(DEFAULT_INTERVAL);
        let t0 = Instant::now();
        assert!(throttle.submit(t0, notice("a")).is_some());
        let t1 = t0 + DEFAULT_INTERVAL;
        assert!(throttle.submit(t1, notice("b")).is_some());
        // window restarted at t1
        assert!(throttle.submit(t1, notice("c")).is_none());
    }

    #[test]
    fn map_drains_all_due_endpoints() {
        let mut map = ThrottleMap::default();
        map.set_interval("fast", INTERACTIVE_INTERVAL);
        let t0 = Instant::now();
        assert!(map.submit("fast", t0, notice("f1")).is_some());
        assert!(map.submit("fast", t0, notice("f2")).is_none());
        assert!(map.submit("slow", t0, notice("s1")).is_some());

        let due = map.take_due(t0 + DEFAULT_INTERVAL);
        assert_eq!(due, vec![notice("f2")]);
    }
}
