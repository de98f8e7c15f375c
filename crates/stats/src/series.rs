//! `TimeSeries`: an append-only log of raw samples paired with a lagging
//! [`StatWindow`](crate::StatWindow), plus the k-sigma anomaly predicate
//! built on top of it.

use crate::window::StatWindow;

/// Parameters governing a `TimeSeries`'s warm-up and anomaly predicate.
#[derive(Debug, Clone, Copy)]
pub struct TimeSeriesParams {
    /// Sigma multiplier for the anomaly bounds.
    pub k: f64,
    /// Number of leading samples considered pure warm-up.
    pub normal_window_length: usize,
    /// Number of trailing samples that must all be outlying to flag an
    /// anomaly, and that lag behind the `StatWindow`'s baseline.
    pub abnormal_window_length: usize,
    /// Floor on sigma, expressed in the metric's own units, preventing
    /// false alarms when the metric is constant within numerical jitter.
    pub minimum_sigma: f64,
}

/// Append-only log of raw samples plus a `StatWindow` that deliberately lags
/// by `abnormal_window_length` positions, so the statistics used to judge a
/// sample never include that sample (or its immediate neighbors) in their
/// own baseline.
///
/// Created lazily per (instance, metric) by its owning worker; mutated only
/// by that worker.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    params: TimeSeriesParams,
    log: Vec<f64>,
    window: StatWindow,
}

impl TimeSeries {
    /// Creates a new time series with the given parameters. The backing
    /// `StatWindow` holds `normal_window_length + abnormal_window_length`
    /// samples, matching the warm-up length the anomaly predicate requires.
    pub fn new(params: TimeSeriesParams) -> Self {
        let limit = params.normal_window_length + params.abnormal_window_length;
        Self {
            params,
            log: Vec::new(),
            window: StatWindow::new(limit),
        }
    }

    /// Clears the log and the backing window, keeping the same parameters.
    pub fn reset(&mut self) {
        self.log.clear();
        self.window.reset();
    }

    /// Appends `value` to the log. Only once the log holds more than
    /// `abnormal_window_length` samples does the oldest sample not yet
    /// folded into the window get pushed into it — this is the lag that
    /// keeps the tail out of the baseline.
    pub fn add(&mut self, value: f64) {
        self.log.push(value);
        if self.log.len() > self.params.abnormal_window_length {
            let lagged = self.log[self.log.len() - self.params.abnormal_window_length - 1];
            self.window.add(lagged);
        }
    }

    /// Returns up to `limit` most recent samples (all of them if `limit` is
    /// `None` or exceeds the log length).
    pub fn value(&self, limit: Option<usize>) -> &[f64] {
        match limit {
            Some(limit) if limit < self.log.len() => &self.log[self.log.len() - limit..],
            _ => &self.log,
        }
    }

    /// Number of samples appended so far.
    pub fn len(&self) -> usize {
        self.log.len()
    }

    /// Returns true if no sample has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// The current `(mu, sigma)` of the backing window, before the
    /// `minimum_sigma` floor is applied.
    pub fn stats(&self) -> (f64, f64) {
        self.window.stats()
    }

    /// Returns true iff both of the following hold:
    /// (a) the log has at least `normal_window_length + abnormal_window_length`
    ///     samples (warm-up complete);
    /// (b) every one of the last `abnormal_window_length` samples lies
    ///     outside `[mu - k*sigma_eff, mu + k*sigma_eff]`, where
    ///     `sigma_eff = max(sigma, minimum_sigma)`.
    ///
    /// When `sigma_eff` is exactly zero the bounds collapse to the single
    /// point `mu`; a sample equal to `mu` is then correctly judged inside
    /// (not anomalous — this is how a constant metric with no jitter floor
    /// stays quiet), while a sample that actually differs from `mu` is
    /// still judged outside, so a real step change is still flagged even
    /// before any variance has been observed.
    pub fn is_abnormal(&self) -> bool {
        let warm_up = self.params.normal_window_length + self.params.abnormal_window_length;
        if self.log.len() < warm_up {
            return false;
        }

        let (mu, sigma) = self.window.stats();
        let sigma_eff = sigma.max(self.params.minimum_sigma);
        let low = mu - self.params.k * sigma_eff;
        let high = mu + self.params.k * sigma_eff;

        self.log[self.log.len() - self.params.abnormal_window_length..]
            .iter()
            .all(|&v| !(low..=high).contains(&v))
    }
}

#[cfg(test)]
mod test {
    use super::{TimeSeries, TimeSeriesParams};

    fn series(k: f64, normal: usize, abnormal: usize, minimum_sigma: f64) -> TimeSeries {
        TimeSeries::new(TimeSeriesParams {
            k,
            normal_window_length: normal,
            abnormal_window_length: abnormal,
            minimum_sigma,
        })
    }

    #[test]
    fn not_abnormal_before_warm_up_completes() {
        let mut ts = series(3.0, 5, 2, 0.0);
        for v in [10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0] {
            ts.add(v);
            assert!(!ts.is_abnormal());
        }
        assert_eq!(ts.len(), 7);
    }

    #[test]
    fn flags_sustained_shift_once_warm_up_completes() {
        let mut ts = series(3.0, 5, 2, 0.0);
        for v in [10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0] {
            ts.add(v);
        }
        assert!(!ts.is_abnormal());

        ts.add(50.0);
        assert!(!ts.is_abnormal());
        ts.add(50.0);
        assert!(ts.is_abnormal());
    }

    #[test]
    fn minimum_sigma_floor_prevents_constant_metric_alarms() {
        let mut ts = series(3.0, 5, 2, 0.0);
        for _ in 0..9 {
            ts.add(10.0);
        }
        // sigma is exactly 0 here (constant input); clamp (c) must suppress
        // the alarm rather than divide by zero / flag everything.
        assert!(!ts.is_abnormal());
    }

    #[test]
    fn reset_restarts_warm_up() {
        let mut ts = series(3.0, 5, 2, 0.0);
        for v in [10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 50.0, 50.0] {
            ts.add(v);
        }
        assert!(ts.is_abnormal());

        ts.reset();
        assert_eq!(ts.stats(), (0.0, 0.0));
        assert_eq!(ts.len(), 0);
        assert!(!ts.is_abnormal());

        for v in [50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0] {
            ts.add(v);
            assert!(!ts.is_abnormal());
        }
    }
}
