//! Numeric Summaries
//!
//! Mean, variance, percentiles and a t-based mean CI for a numeric
//! sample. `from_sample` folds through the same [`OnlineAccumulator`]
//! the streaming path uses and `from_aggregates` is the seam the
//! SQL-assisted path feeds, so both paths combine identically.

use crate::basic::{self, Ci};
use crate::online::OnlineAccumulator;
use serde::{Deserialize, Serialize};

/// Summary statistics of a numeric score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericSummary {
    /// All results, scored or not
    pub n_total: u64,
    /// Results that reached a terminal state with a non-null value
    pub n_scored: u64,
    /// Sample mean
    pub mean: Option<f64>,
    /// Sample variance (n-1 denominator)
    pub variance: Option<f64>,
    /// Sample standard deviation
    pub std: Option<f64>,
    /// 10th percentile (linear interpolation)
    pub p10: Option<f64>,
    /// Median
    pub p50: Option<f64>,
    /// 90th percentile
    pub p90: Option<f64>,
    /// `mean +/- tCritical(n) * std / sqrt(n)`
    pub ci95_mean: Option<Ci>,
}

impl NumericSummary {
    /// The all-null shape for a score with no scored results
    pub fn empty(n_total: u64) -> Self {
        Self {
            n_total,
            n_scored: 0,
            mean: None,
            variance: None,
            std: None,
            p10: None,
            p50: None,
            p90: None,
            ci95_mean: None,
        }
    }

    /// Build from a materialized sample
    pub fn from_sample(values: &[f64], n_total: u64) -> Self {
        if values.is_empty() {
            return Self::empty(n_total);
        }

        let mut acc = OnlineAccumulator::new();
        for &x in values {
            acc.observe(x);
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        Self::from_aggregates(
            n_total,
            acc.count(),
            acc.mean(),
            acc.std_dev(),
            basic::percentile(&sorted, 10.0),
            basic::percentile(&sorted, 50.0),
            basic::percentile(&sorted, 90.0),
        )
    }

    /// Build from externally-computed aggregates (streaming/SQL path)
    #[allow(clippy::too_many_arguments)]
    pub fn from_aggregates(
        n_total: u64,
        n_scored: u64,
        mean: f64,
        std: f64,
        p10: f64,
        p50: f64,
        p90: f64,
    ) -> Self {
        if n_scored == 0 {
            return Self::empty(n_total);
        }

        let half = basic::t_critical(n_scored) * std / (n_scored as f64).sqrt();

        Self {
            n_total,
            n_scored,
            mean: Some(mean),
            variance: Some(std * std),
            std: Some(std),
            p10: Some(p10),
            p50: Some(p50),
            p90: Some(p90),
            ci95_mean: Some(Ci {
                lower: mean - half,
                upper: mean + half,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_sample() {
        let summary = NumericSummary::from_sample(&[1.0, 2.0, 3.0, 4.0], 4);

        assert_eq!(summary.n_total, 4);
        assert_eq!(summary.n_scored, 4);
        assert!((summary.mean.unwrap() - 2.5).abs() < 1e-12);
        assert!((summary.variance.unwrap() - 1.6667).abs() < 1e-4);
        assert!((summary.std.unwrap() - 1.2910).abs() < 1e-4);
        assert!((summary.p10.unwrap() - 1.3).abs() < 1e-12);
        assert!((summary.p50.unwrap() - 2.5).abs() < 1e-12);
        assert!((summary.p90.unwrap() - 3.7).abs() < 1e-12);

        let ci = summary.ci95_mean.unwrap();
        assert!(ci.lower < 2.5 && 2.5 < ci.upper);
    }

    #[test]
    fn test_empty_shape() {
        let summary = NumericSummary::from_sample(&[], 7);
        assert_eq!(summary.n_total, 7);
        assert_eq!(summary.n_scored, 0);
        assert!(summary.mean.is_none());
        assert!(summary.ci95_mean.is_none());
    }

    #[test]
    fn test_single_value() {
        let summary = NumericSummary::from_sample(&[5.0], 2);
        assert_eq!(summary.mean, Some(5.0));
        assert_eq!(summary.variance, Some(0.0));
        assert_eq!(summary.p10, Some(5.0));
        assert_eq!(summary.p90, Some(5.0));
        let ci = summary.ci95_mean.unwrap();
        assert_eq!(ci.lower, 5.0);
        assert_eq!(ci.upper, 5.0);
    }

    #[test]
    fn test_aggregate_seam_matches_sample_path() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let by_sample = NumericSummary::from_sample(&values, 10);

        let mut acc = crate::OnlineAccumulator::new();
        for &v in &values {
            acc.observe(v);
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let by_aggregates = NumericSummary::from_aggregates(
            10,
            acc.count(),
            acc.mean(),
            acc.std_dev(),
            crate::percentile(&sorted, 10.0),
            crate::percentile(&sorted, 50.0),
            crate::percentile(&sorted, 90.0),
        );

        assert_eq!(by_sample, by_aggregates);
    }

    #[test]
    fn test_camel_case_serialization() {
        let summary = NumericSummary::from_sample(&[1.0, 2.0], 2);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["nScored"], 2);
        assert!(json["ci95Mean"]["lower"].is_number());
    }
}
