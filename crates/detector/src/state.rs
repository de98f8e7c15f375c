//! Per-instance detection state owned by exactly one worker.

use std::collections::{HashMap, VecDeque};
use std::time::{Instant, SystemTime};

use protocol::Payload;
use stats::TimeSeries;

/// Name of the server CPU-utilization metric's `TimeSeries`.
pub const METRIC_CPU_UTILIZATION: &str = "cpu_utilization";
/// Name of the server memory-utilization metric's `TimeSeries`.
pub const METRIC_MEMORY_UTILIZATION: &str = "memory_utilization";
/// Name of the link SYN-ratio metric's `TimeSeries`.
pub const METRIC_SYN_RATIO: &str = "syn_ratio";
/// Name of the link DNS-ratio metric's `TimeSeries`.
pub const METRIC_DNS_RATIO: &str = "dns_ratio";

/// All detection state kept for a single `InstanceKey`: its bounded sample
/// history, its per-metric time series, and its abnormal/failure bookkeeping.
#[derive(Debug)]
pub struct InstanceState {
    history: VecDeque<(SystemTime, Payload)>,
    pub(crate) metrics: HashMap<&'static str, TimeSeries>,
    /// Set the instant a metric rule last flagged this instance abnormal;
    /// sticky for the lifetime of the run, matching the reference worker's
    /// query semantics (an instance that has ever gone abnormal is reported
    /// abnormal from then on, distinct from the cooldown-gated question of
    /// whether a *new alert* should be emitted right now).
    pub abnormal_state: Option<Instant>,
    /// Whether the instance's most recent record reported it inactive.
    pub failure_state: bool,
    /// Instant the last ABNORMAL alert was actually emitted (cooldown
    /// bookkeeping).
    pub last_abnormal: Option<Instant>,
    /// Instant the last FAILURE alert was actually emitted (cooldown
    /// bookkeeping).
    pub last_failure: Option<Instant>,
}

impl InstanceState {
    /// Creates an empty state with no history and no metrics yet.
    pub fn new() -> Self {
        Self {
            history: VecDeque::new(),
            metrics: HashMap::new(),
            abnormal_state: None,
            failure_state: false,
            last_abnormal: None,
            last_failure: None,
        }
    }

    /// Pushes a new `(timestamp, payload)` pair into the bounded history
    /// ring, evicting the oldest entry once `limit` is exceeded.
    pub fn push_history(&mut self, observed_at: SystemTime, payload: Payload, limit: usize) {
        self.history.push_back((observed_at, payload));
        while self.history.len() > limit {
            let _ = self.history.pop_front();
        }
    }

    /// Returns the most recently observed payload, if any.
    pub fn last_payload(&self) -> Option<&Payload> {
        self.history.back().map(|(_, payload)| payload)
    }

    /// Returns the bounded history ring, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &(SystemTime, Payload)> {
        self.history.iter()
    }

    /// Returns true once an ABNORMAL condition has ever been observed on
    /// this instance (the sticky query-facing "abnormal" flag).
    pub fn is_abnormal(&self) -> bool {
        self.abnormal_state.is_some()
    }

    /// Returns whether `cooldown` has elapsed since `last`, treating "never
    /// fired" as elapsed.
    pub(crate) fn cooldown_elapsed(last: Option<Instant>, now: Instant, cooldown: std::time::Duration) -> bool {
        match last {
            None => true,
            Some(last) => now.duration_since(last) >= cooldown,
        }
    }

    /// Clears every owned `TimeSeries`, restarting their warm-up. Does not
    /// touch the history ring or the abnormal/failure bookkeeping: a RESET
    /// command only rewinds the k-sigma statistics.
    pub fn reset_time_series(&mut self) {
        for series in self.metrics.values_mut() {
            series.reset();
        }
    }
}

impl Default for InstanceState {
    fn default() -> Self {
        Self::new()
    }
}
