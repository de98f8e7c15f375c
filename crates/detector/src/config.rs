//! Thresholds and warm-up/cooldown parameters shared by every detector rule.

use std::time::Duration;

/// Knobs governing every per-kind detector rule and the debounce policy
/// applied to the alerts they produce.
#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    /// Sigma multiplier for the k-sigma predicate.
    pub k: f64,
    /// Warm-up length before any `TimeSeries` can flag an anomaly.
    pub normal_window_length: usize,
    /// Consecutive-outlier length required to flag an anomaly.
    pub abnormal_window_length: usize,
    /// Minimum interval between two alerts of the same kind for the same
    /// instance.
    pub cooldown: Duration,
    /// Jitter floor for the server CPU-utilization time series, expressed
    /// in the metric's own units (divided by `k` to become `minimum_sigma`
    /// when the series is constructed).
    pub cpu_jitter_sigma: f64,
    /// Jitter floor for the server memory-utilization time series.
    pub mem_jitter_sigma: f64,
    /// Link utilization threshold below which no link alert fires,
    /// regardless of packet ratios.
    pub link_util_thres: f64,
    /// Packet-count threshold a link's SYN or DNS traffic must clear before
    /// it can be flagged, preventing trivial quiet-link alerts.
    pub link_packet_num_thres: u64,
    /// Length of the bounded per-instance history ring.
    pub history_len_limit: usize,
}

impl DetectorConfig {
    /// Builds the `minimum_sigma` for a `TimeSeries` constructed with the
    /// given jitter floor, expressed in the metric's own units.
    pub fn minimum_sigma(&self, jitter_sigma: f64) -> f64 {
        jitter_sigma / self.k
    }
}
