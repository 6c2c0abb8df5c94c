//! Online Mean/Variance Accumulation
//!
//! Welford's algorithm: one value at a time, O(1) memory, numerically
//! stable. This is the streaming half of the numeric dual path; the
//! in-memory half funnels through the same accumulator so both produce
//! bit-identical moments.

/// Incremental mean/variance estimator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OnlineAccumulator {
    count: u64,
    mean: f64,
    m2: f64,
}

impl OnlineAccumulator {
    /// Empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observation in O(1)
    pub fn observe(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    /// Number of observations seen
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Running mean; `0.0` before any observation
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance (n-1 denominator); `0.0` when fewer than two observations
    pub fn sample_variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        self.m2 / (self.count - 1) as f64
    }

    /// Sample standard deviation
    pub fn std_dev(&self) -> f64 {
        self.sample_variance().sqrt()
    }

    /// Combine two accumulators as if their observations were interleaved
    pub fn merge(&self, other: &Self) -> Self {
        let count = self.count + other.count;
        if count == 0 {
            return Self::new();
        }
        let delta = other.mean - self.mean;
        let mean = self.mean + delta * other.count as f64 / count as f64;
        let m2 = self.m2
            + other.m2
            + delta * delta * (self.count as f64 * other.count as f64) / count as f64;
        Self { count, mean, m2 }
    }
}
