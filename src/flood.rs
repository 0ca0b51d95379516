//! Adaptive flood detection
//!
//! Per-member sliding-window rate limiter whose enforced interval scales
//! with reputation: trusted members get a shorter interval and may post
//! faster, low-trust members are throttled harder. Windows live only in
//! memory; a restart clears flood history but never reputation.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::config::FloodPolicy;
use crate::sweep::TransientState;
use crate::MemberId;

/// Transient per-member window state.
#[derive(Debug, Clone, Copy)]
struct FloodWindow {
    events: u32,
    window_start: DateTime<Utc>,
}

/// Result of observing one inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloodVerdict {
    /// False when the event crossed the flood threshold.
    pub within_limit: bool,
    /// Events counted in the current window, including this one.
    pub events_in_window: u32,
}

/// Reputation-scaled sliding-window detector.
///
/// `observe` is O(1) and touches only the single member's window; it never
/// suspends, so it is safe inside the per-member critical section.
pub struct FloodDetector {
    policy: FloodPolicy,
    max_reputation: f64,
    windows: DashMap<MemberId, FloodWindow>,
}

impl FloodDetector {
    pub fn new(policy: FloodPolicy, max_reputation: f64) -> Self {
        Self {
            policy,
            max_reputation,
            windows: DashMap::new(),
        }
    }

    /// Enforced minimum interval for a member with the given reputation.
    ///
    /// `interval = base + (1 - reputation/max) * spread`, monotonically
    /// decreasing in reputation.
    pub fn interval_secs(&self, reputation: f64) -> f64 {
        let trust = (reputation / self.max_reputation).clamp(0.0, 1.0);
        self.policy.base_interval_secs + (1.0 - trust) * self.policy.interval_spread_secs
    }

    /// Count one event against the member's window.
    ///
    /// Events spaced beyond the member's interval reset the window to one.
    /// When the threshold is crossed the verdict reports the violation and
    /// the window resets, so one burst produces exactly one violation.
    pub fn observe(
        &self,
        member: MemberId,
        reputation: f64,
        now: DateTime<Utc>,
    ) -> FloodVerdict {
        let interval = self.interval_secs(reputation);

        let mut entry = self.windows.entry(member).or_insert(FloodWindow {
            events: 0,
            window_start: now,
        });
        let window = entry.value_mut();

        let elapsed_secs =
            (now - window.window_start).num_milliseconds() as f64 / 1000.0;

        if window.events > 0 && elapsed_secs < interval {
            window.events += 1;
        } else {
            window.events = 1;
            window.window_start = now;
        }

        let events_in_window = window.events;
        let within_limit = events_in_window <= self.policy.flood_threshold;

        if !within_limit {
            debug!(
                member,
                events = events_in_window,
                interval_secs = interval,
                "Flood threshold crossed, resetting window"
            );
            window.events = 0;
            window.window_start = now;
        }

        FloodVerdict {
            within_limit,
            events_in_window,
        }
    }

    /// Number of members with a live window (for monitoring).
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }
}

impl TransientState for FloodDetector {
    /// Drop windows idle longer than the widest possible interval.
    fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let widest =
            self.policy.base_interval_secs + self.policy.interval_spread_secs;
        let cutoff = Duration::milliseconds((widest * 1000.0) as i64 * 2);

        let before = self.windows.len();
        self.windows
            .retain(|_, window| now - window.window_start <= cutoff);
        before - self.windows.len()
    }
}
