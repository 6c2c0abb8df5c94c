//! Ordinal Summaries
//!
//! Extends the nominal summary with a label/rank scale: CDF over ranks,
//! percentile category lookup, rank-unit IQR, and the two policy-gated
//! derived metrics (pass rate against an acceptable-label set, tail mass
//! below a rank threshold).
//!
//! The free functions operate on pre-aggregated counts so the in-memory
//! constructor and the streaming/SQL-assisted path share one code path.

use crate::basic::{self, Ci};
use crate::categorical::CategoricalSummary;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// One step of an ordinal scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalePoint {
    /// Category label, e.g. `"Good"`
    pub label: String,
    /// Position in the total order; need not be contiguous
    pub rank: i64,
}

impl ScalePoint {
    /// Convenience constructor
    pub fn new(label: impl Into<String>, rank: i64) -> Self {
        Self {
            label: label.into(),
            rank,
        }
    }
}

/// Errors from scale construction
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScaleError {
    /// A scale with no points cannot order anything
    #[error("scale must contain at least one point")]
    Empty,
    /// Labels must be unique to resolve categories
    #[error("duplicate scale label: {0}")]
    DuplicateLabel(String),
    /// Ranks must be distinct to form a total order
    #[error("duplicate scale rank: {0}")]
    DuplicateRank(i64),
}

/// A validated ordinal scale, points sorted ascending by rank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ScalePoint>", into = "Vec<ScalePoint>")]
pub struct Scale {
    points: Vec<ScalePoint>,
}

impl Scale {
    /// Validate and sort the points. Duplicate labels or ranks and empty
    /// input fail fast: a malformed scale is a configuration bug.
    pub fn new(mut points: Vec<ScalePoint>) -> Result<Self, ScaleError> {
        if points.is_empty() {
            return Err(ScaleError::Empty);
        }
        let mut labels = BTreeSet::new();
        let mut ranks = BTreeSet::new();
        for point in &points {
            if !labels.insert(point.label.clone()) {
                return Err(ScaleError::DuplicateLabel(point.label.clone()));
            }
            if !ranks.insert(point.rank) {
                return Err(ScaleError::DuplicateRank(point.rank));
            }
        }
        points.sort_by_key(|p| p.rank);
        Ok(Self { points })
    }

    /// Points in ascending rank order
    pub fn points(&self) -> &[ScalePoint] {
        &self.points
    }

    /// Highest-rank point
    pub fn highest(&self) -> &ScalePoint {
        self.points.last().expect("scale is non-empty")
    }

    /// Resolve a raw category code to a scale point, matching either the
    /// label or the stringified rank value.
    pub fn point_of(&self, code: &str) -> Option<&ScalePoint> {
        if let Some(point) = self.points.iter().find(|p| p.label == code) {
            return Some(point);
        }
        let rank = code
            .parse::<i64>()
            .ok()
            .or_else(|| match code.parse::<f64>() {
                Ok(f) if f.fract() == 0.0 && f.is_finite() => Some(f as i64),
                _ => None,
            })?;
        self.points.iter().find(|p| p.rank == rank)
    }

    /// Rank of a raw category code, if it resolves
    pub fn rank_of(&self, code: &str) -> Option<i64> {
        self.point_of(code).map(|p| p.rank)
    }
}

impl TryFrom<Vec<ScalePoint>> for Scale {
    type Error = ScaleError;

    fn try_from(points: Vec<ScalePoint>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<Scale> for Vec<ScalePoint> {
    fn from(scale: Scale) -> Self {
        scale.points
    }
}

/// Per-score configuration for the two derived ordinal metrics.
/// A missing field disables its metric (result is null, not zero).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdinalPolicy {
    /// Labels counted as passing
    pub acceptable_labels: Option<BTreeSet<String>>,
    /// Ranks strictly below this threshold count as tail mass
    pub tail_threshold_rank: Option<i64>,
}

/// A proportion with its Wilson 95% interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateStat {
    /// The proportion over nScored
    pub rate: f64,
    /// Wilson interval
    pub ci95: Ci,
}

/// One step of the cumulative distribution over ranks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdfEntry {
    /// Scale label
    pub label: String,
    /// Scale rank
    pub rank: i64,
    /// Proportion of scored values at exactly this point
    pub proportion: f64,
    /// Proportion of scored values at or below this point
    pub cumulative: f64,
}

/// Percentile category labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentileCategories {
    /// 10th percentile label
    pub p10: String,
    /// Median label
    pub p50: String,
    /// 90th percentile label
    pub p90: String,
}

/// Summary statistics of an ordinal score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdinalSummary {
    /// The nominal fields (counts, proportions, mode, entropy)
    #[serde(flatten)]
    pub categorical: CategoricalSummary,
    /// First label (rank order) whose CDF reaches 0.5
    pub median_category: Option<String>,
    /// p10/p50/p90 labels; `None` when unscored
    pub percentile_categories: Option<PercentileCategories>,
    /// CDF per scale point in rank order; empty when unscored
    pub cdf: Vec<CdfEntry>,
    /// Rank distance between index-based quartiles; `None` when no value
    /// resolved against the scale
    pub iqr_rank: Option<i64>,
    /// Pass rate against the policy's acceptable labels
    pub pass_rate: Option<RateStat>,
    /// Mass strictly below the policy's rank threshold
    pub tail_mass_below: Option<RateStat>,
}

impl OrdinalSummary {
    /// Build from raw category values
    pub fn from_values<I, S>(
        scale: &Scale,
        policy: Option<&OrdinalPolicy>,
        values: I,
        n_total: u64,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut counts: IndexMap<String, u64> = IndexMap::new();
        let mut n_scored = 0u64;
        for value in values {
            *counts.entry(value.into()).or_insert(0) += 1;
            n_scored += 1;
        }
        Self::from_counts(scale, policy, counts, n_total, n_scored)
    }

    /// Build from pre-aggregated counts (streaming/SQL path)
    pub fn from_counts(
        scale: &Scale,
        policy: Option<&OrdinalPolicy>,
        counts: IndexMap<String, u64>,
        n_total: u64,
        n_scored: u64,
    ) -> Self {
        let cdf = cdf_from_counts(scale, &counts, n_scored);
        let median_category = percentile_category(&cdf, 50.0);
        let percentile_categories = match (
            percentile_category(&cdf, 10.0),
            percentile_category(&cdf, 50.0),
            percentile_category(&cdf, 90.0),
        ) {
            (Some(p10), Some(p50), Some(p90)) => Some(PercentileCategories { p10, p50, p90 }),
            _ => None,
        };
        let iqr_rank = iqr_rank_from_counts(scale, &counts);
        let pass_rate = if n_scored > 0 {
            policy
                .and_then(|p| p.acceptable_labels.as_ref())
                .map(|set| pass_rate_from_counts(scale, set, &counts, n_scored))
        } else {
            None
        };
        let tail_mass_below = if n_scored > 0 {
            policy
                .and_then(|p| p.tail_threshold_rank)
                .map(|threshold| tail_mass_from_counts(scale, threshold, &counts, n_scored))
        } else {
            None
        };
        let categorical = CategoricalSummary::from_counts(counts, n_total, n_scored);

        Self {
            categorical,
            median_category,
            percentile_categories,
            cdf,
            iqr_rank,
            pass_rate,
            tail_mass_below,
        }
    }
}

/// Count per scale point (ascending rank order), resolving raw codes
/// through the scale. Codes that resolve to no point are dropped.
fn point_totals(scale: &Scale, counts: &IndexMap<String, u64>) -> Vec<u64> {
    let mut totals = vec![0u64; scale.points().len()];
    for (code, &count) in counts {
        if let Some(point) = scale.point_of(code) {
            let idx = scale
                .points()
                .iter()
                .position(|p| p.rank == point.rank)
                .expect("resolved point is on the scale");
            totals[idx] += count;
        }
    }
    totals
}

/// Cumulative distribution per scale point; denominator is `n_scored`,
/// so unresolvable codes leave the final cumulative below 1. Empty when
/// `n_scored == 0`.
pub fn cdf_from_counts(scale: &Scale, counts: &IndexMap<String, u64>, n_scored: u64) -> Vec<CdfEntry> {
    if n_scored == 0 {
        return Vec::new();
    }
    let nf = n_scored as f64;
    let totals = point_totals(scale, counts);
    let mut cumulative = 0u64;
    scale
        .points()
        .iter()
        .zip(totals)
        .map(|(point, count)| {
            cumulative += count;
            CdfEntry {
                label: point.label.clone(),
                rank: point.rank,
                proportion: count as f64 / nf,
                cumulative: cumulative as f64 / nf,
            }
        })
        .collect()
}

/// First label (rank order) whose CDF reaches `p/100`; the highest-rank
/// label when none qualifies; `None` for an empty CDF.
pub fn percentile_category(cdf: &[CdfEntry], p: f64) -> Option<String> {
    let target = p / 100.0;
    cdf.iter()
        .find(|entry| entry.cumulative >= target)
        .or_else(|| cdf.last())
        .map(|entry| entry.label.clone())
}

/// Rank distance between the index-based quartiles of the sorted
/// resolved-rank list: `sorted[floor(n*0.75)] - sorted[floor(n*0.25)]`.
/// `None` when no value resolved. Deliberately not the interpolated
/// percentile used for numeric scores; the two families keep their own
/// quartile conventions.
pub fn iqr_rank_from_counts(scale: &Scale, counts: &IndexMap<String, u64>) -> Option<i64> {
    let totals = point_totals(scale, counts);
    let n: u64 = totals.iter().sum();
    if n == 0 {
        return None;
    }

    let rank_at = |index: u64| -> i64 {
        let mut cumulative = 0u64;
        for (point, &count) in scale.points().iter().zip(&totals) {
            cumulative += count;
            if cumulative > index {
                return point.rank;
            }
        }
        scale.highest().rank
    };

    let q1 = rank_at((n as f64 * 0.25).floor() as u64);
    let q3 = rank_at((n as f64 * 0.75).floor() as u64);
    Some(q3 - q1)
}

/// Proportion of scored values whose resolved label is acceptable, with
/// its Wilson interval over `n_scored`.
pub fn pass_rate_from_counts(
    scale: &Scale,
    acceptable: &BTreeSet<String>,
    counts: &IndexMap<String, u64>,
    n_scored: u64,
) -> RateStat {
    let passes: u64 = counts
        .iter()
        .filter(|(code, _)| {
            scale
                .point_of(code)
                .map(|p| acceptable.contains(&p.label))
                .unwrap_or(false)
        })
        .map(|(_, &count)| count)
        .sum();
    rate_stat(passes, n_scored)
}

/// Proportion of scored values whose resolved rank is strictly below the
/// threshold, with its Wilson interval over `n_scored`.
pub fn tail_mass_from_counts(
    scale: &Scale,
    threshold_rank: i64,
    counts: &IndexMap<String, u64>,
    n_scored: u64,
) -> RateStat {
    let below: u64 = counts
        .iter()
        .filter(|(code, _)| {
            scale
                .rank_of(code)
                .map(|rank| rank < threshold_rank)
                .unwrap_or(false)
        })
        .map(|(_, &count)| count)
        .sum();
    rate_stat(below, n_scored)
}

fn rate_stat(hits: u64, n_scored: u64) -> RateStat {
    let rate = if n_scored == 0 {
        0.0
    } else {
        hits as f64 / n_scored as f64
    };
    RateStat {
        rate,
        ci95: basic::wilson_ci(n_scored, hits, crate::DEFAULT_CONFIDENCE_LEVEL),
    }
}
