//! `StatWindow`: a bounded FIFO of raw samples with an incrementally
//! maintained running mean and standard deviation.

use std::collections::VecDeque;

/// A bounded window of up to `limit` samples, tracking a running mean `mu`
/// and standard deviation `sigma` that are updated algebraically on every
/// add and evict rather than recomputed from scratch.
///
/// Invariants: `0 <= len() <= limit`; `sigma >= 0` always; after every
/// `add`, `mu` and `sigma` equal the mean and sample standard deviation of
/// the samples currently held, to within floating-point tolerance.
#[derive(Debug, Clone)]
pub struct StatWindow {
    mu: f64,
    sigma: f64,
    values: VecDeque<f64>,
    limit: usize,
}

impl StatWindow {
    /// Creates an empty window holding at most `limit` samples.
    pub fn new(limit: usize) -> Self {
        Self {
            mu: 0.0,
            sigma: 0.0,
            values: VecDeque::with_capacity(limit.saturating_add(1)),
            limit,
        }
    }

    /// Clears the window back to its initial empty state, keeping `limit`.
    pub fn reset(&mut self) {
        self.mu = 0.0;
        self.sigma = 0.0;
        self.values.clear();
    }

    /// Appends `value`, updating `mu`/`sigma` incrementally, then evicts the
    /// oldest sample (also updating `mu`/`sigma` incrementally, inverting
    /// the add update) if the window now holds more than `limit` samples.
    pub fn add(&mut self, value: f64) {
        let n = self.values.len() as f64;
        let new_mu = (self.mu * n + value) / (n + 1.0);
        let new_sigma = ((n * (self.sigma.powi(2) + (new_mu - self.mu).powi(2)) + (new_mu - value).powi(2))
            / (n + 1.0))
            .sqrt();

        self.mu = new_mu;
        self.sigma = new_sigma;
        self.values.push_back(value);

        if self.values.len() > self.limit {
            // `limit` is only ever exceeded by exactly one, since we evict
            // immediately after every add that crosses it.
            let evicted = self.values.pop_front().expect("window over limit must be non-empty");
            let n = (self.limit + 1) as f64;
            let new_mu = (self.mu * n - evicted) / (n - 1.0);
            let variance =
                (n * (self.sigma.powi(2) + (new_mu - self.mu).powi(2)) - (new_mu - evicted).powi(2)) / (n - 1.0);
            self.mu = new_mu;
            // Negative values only arise from floating-point drift; clamp
            // before the square root rather than let it produce NaN.
            self.sigma = variance.max(0.0).sqrt();
        }
    }

    /// Returns the current `(mu, sigma)`.
    pub fn stats(&self) -> (f64, f64) {
        (self.mu, self.sigma)
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the window holds no samples.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::StatWindow;

    fn recompute(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mu = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / n;
        (mu, variance.sqrt())
    }

    #[test]
    fn matches_full_recompute_while_filling() {
        let mut window = StatWindow::new(5);
        let mut seen = Vec::new();

        for v in [10.0, 12.0, 9.0, 11.0, 10.5] {
            window.add(v);
            seen.push(v);

            let (mu, sigma) = window.stats();
            let (expected_mu, expected_sigma) = recompute(&seen);
            assert!((mu - expected_mu).abs() < 1e-6);
            assert!((sigma - expected_sigma).abs() < 1e-6);
        }
    }

    #[test]
    fn matches_full_recompute_after_eviction() {
        let mut window = StatWindow::new(5);
        let samples = [10.0, 12.0, 9.0, 11.0, 10.5, 50.0, 9.8, 10.1, 30.0];

        for (i, &v) in samples.iter().enumerate() {
            window.add(v);

            let start = (i + 1).saturating_sub(5);
            let (expected_mu, expected_sigma) = recompute(&samples[start..=i]);
            let (mu, sigma) = window.stats();
            assert!((mu - expected_mu).abs() < 1e-6, "mu mismatch at {i}");
            assert!((sigma - expected_sigma).abs() < 1e-6, "sigma mismatch at {i}");
        }
    }

    #[test]
    fn never_holds_more_than_limit_samples() {
        let mut window = StatWindow::new(3);
        for v in 0..10 {
            window.add(v as f64);
            assert!(window.len() <= 3);
        }
    }

    #[test]
    fn sigma_is_never_negative() {
        let mut window = StatWindow::new(4);
        for v in [1.0, 1.0, 1.0, 1.0, 1.0, 1.0] {
            window.add(v);
            let (_, sigma) = window.stats();
            assert!(sigma >= 0.0);
        }
    }

    #[test]
    fn reset_clears_window() {
        let mut window = StatWindow::new(4);
        window.add(5.0);
        window.add(7.0);
        window.reset();
        assert_eq!(window.stats(), (0.0, 0.0));
        assert!(window.is_empty());
    }
}
