//! Rows, Keys and Response Shapes
//!
//! The field names of the serialized response shapes are a consumer
//! contract; everything serializes camelCase. Statistics and comparison
//! results are ephemeral per-request values, never persisted here.

use chrono::{DateTime, Utc};
use scorebench_stats::{
    BowkerTest, CategoricalSummary, CdfEntry, Ci, NumericSummary, OrdinalSummary, RateStat,
    WilcoxonResult,
};
use serde::{Deserialize, Serialize};

/// A score payload: numeric for continuous scores, text for category
/// codes. Ordinal stores may emit either the label or the rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreValue {
    /// Continuous value
    Number(f64),
    /// Category code or label
    Text(String),
}

impl ScoreValue {
    /// Numeric view; `None` for text values
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ScoreValue::Number(n) => Some(*n),
            ScoreValue::Text(_) => None,
        }
    }

    /// Category-code view. Whole numbers render without a fraction so
    /// that rank-coded ordinal values resolve against the scale.
    pub fn as_code(&self) -> String {
        match self {
            ScoreValue::Number(n) if n.fract() == 0.0 && n.is_finite() => {
                format!("{}", *n as i64)
            }
            ScoreValue::Number(n) => n.to_string(),
            ScoreValue::Text(s) => s.clone(),
        }
    }
}

/// Lifecycle state of a result row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    /// Scoring not finished
    Pending,
    /// Scored; contributes to statistics when the value is non-null
    Done,
    /// Scoring failed terminally
    Failed,
}

/// One result row as streamed from the backing store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredRow {
    /// Row identity, the pagination tie-breaker
    pub id: u64,
    /// Creation time, the primary pagination key
    pub created_at: DateTime<Utc>,
    /// Score payload; null until scored
    pub value: Option<ScoreValue>,
    /// Lifecycle state
    pub status: RowStatus,
}

impl ScoredRow {
    /// The value, but only when this row counts as scored
    pub fn scored_value(&self) -> Option<&ScoreValue> {
        match self.status {
            RowStatus::Done => self.value.as_ref(),
            _ => None,
        }
    }
}

/// One pre-joined pair of scores for a dataset row present (scored,
/// done) in both experiments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairedRow {
    /// Experiment A's score
    pub value_a: ScoreValue,
    /// Experiment B's score
    pub value_b: ScoreValue,
}

/// Identifies one score's result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatKey {
    /// Owning evaluation
    pub evaluation_id: u64,
    /// The score being summarized
    pub score_id: u64,
    /// Restrict to one experiment's outputs; `None` covers dataset rows
    pub experiment_id: Option<u64>,
}

/// Identifies the paired rows of two experiments on one score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairedKey {
    /// Owning evaluation
    pub evaluation_id: u64,
    /// The score being compared
    pub score_id: u64,
    /// Baseline experiment
    pub experiment_a: u64,
    /// Candidate experiment
    pub experiment_b: u64,
}

/// Numeric count-and-percentile aggregates from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericAggregates {
    /// All rows
    pub n_total: u64,
    /// Scored rows
    pub n_scored: u64,
    /// 10th percentile
    pub p10: f64,
    /// Median
    pub p50: f64,
    /// 90th percentile
    pub p90: f64,
}

/// Ordinal aggregates from the store's rank-casting queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdinalAggregates {
    /// All rows
    pub n_total: u64,
    /// Scored rows
    pub n_scored: u64,
    /// CDF per scale point in rank order
    pub cdf: Vec<CdfEntry>,
    /// 10th percentile label
    pub p10_label: Option<String>,
    /// Median label
    pub p50_label: Option<String>,
    /// 90th percentile label
    pub p90_label: Option<String>,
    /// Rank-unit IQR
    pub iqr_rank: Option<i64>,
    /// Pass rate when the policy configures acceptable labels
    pub pass_rate: Option<RateStat>,
}

/// Pre-aggregated paired numeric statistics (the SQL fast path)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairedNumericAggregate {
    /// Rows scored in both experiments
    pub n_paired: u64,
    /// Mean of experiment A's scores
    pub mean_a: f64,
    /// Mean of experiment B's scores
    pub mean_b: f64,
    /// Mean of per-pair deltas (B minus A)
    pub delta_mean: f64,
    /// Sample standard deviation of the deltas
    pub std_delta: f64,
    /// Fraction of pairs with positive delta
    pub win_rate: f64,
    /// Fraction of pairs with negative delta
    pub loss_rate: f64,
    /// Fraction of pairs with zero delta
    pub tie_rate: f64,
}

/// Per-request statistics result, shaped by scoring type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Statistics {
    /// Continuous scores
    Numeric(NumericSummary),
    /// Unordered categories
    Nominal(CategoricalSummary),
    /// Ordered categories with a rank scale
    Ordinal(OrdinalSummary),
}

/// Paired numeric comparison of two experiments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericComparison {
    /// Rows scored in both experiments
    pub n_paired: u64,
    /// Mean of A's scores
    pub mean_a: Option<f64>,
    /// Mean of B's scores
    pub mean_b: Option<f64>,
    /// Mean per-pair delta (B minus A)
    pub delta_mean: Option<f64>,
    /// Student-t CI for the mean delta
    pub ci95_delta: Option<Ci>,
    /// Sign-flip permutation p; null on the aggregate fast path, which
    /// has no per-pair data to permute
    pub p_value_permutation: Option<f64>,
    /// `deltaMean / stdDelta`; null when the deltas have no spread
    pub cohens_dz: Option<f64>,
    /// Fraction of pairs where B scored higher
    pub win_rate: Option<f64>,
    /// Fraction of pairs where B scored lower
    pub loss_rate: Option<f64>,
    /// Fraction of tied pairs
    pub tie_rate: Option<f64>,
}

impl NumericComparison {
    /// The all-null shape for zero overlapping rows
    pub fn empty() -> Self {
        Self {
            n_paired: 0,
            mean_a: None,
            mean_b: None,
            delta_mean: None,
            ci95_delta: None,
            p_value_permutation: None,
            cohens_dz: None,
            win_rate: None,
            loss_rate: None,
            tie_rate: None,
        }
    }
}

/// One category's before/after proportions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDelta {
    /// Category code
    pub code: String,
    /// Proportion among A's paired rows
    pub proportion_a: f64,
    /// Proportion among B's paired rows
    pub proportion_b: f64,
    /// `proportionB - proportionA`
    pub delta: f64,
    /// Newcombe paired CI for the delta
    pub ci95: Option<Ci>,
}

/// Categories gained or lost between the two experiments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryChanges {
    /// Zero count in A, positive in B
    pub appeared_in_b: Vec<String>,
    /// Positive count in A, zero in B
    pub disappeared_in_b: Vec<String>,
}

/// Paired nominal comparison of two experiments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NominalComparison {
    /// Rows scored in both experiments
    pub n_paired: u64,
    /// Per-category proportions and deltas, first-seen order
    pub distribution_comparison: Vec<CategoryDelta>,
    /// Marginal symmetry test
    pub bowker_test: BowkerTest,
    /// Effect size from the Bowker statistic
    pub cramers_v: Option<f64>,
    /// `entropy(B) - entropy(A)` in bits
    pub entropy_difference: Option<f64>,
    /// Appeared/disappeared category sets
    pub category_changes: CategoryChanges,
}

impl NominalComparison {
    /// The all-null shape for zero overlapping rows
    pub fn empty() -> Self {
        Self {
            n_paired: 0,
            distribution_comparison: Vec::new(),
            bowker_test: BowkerTest {
                chi_squared: None,
                p_value: None,
                degrees_of_freedom: 0,
            },
            cramers_v: None,
            entropy_difference: None,
            category_changes: CategoryChanges::default(),
        }
    }
}

/// One scale point's CDF shift
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdfDelta {
    /// Scale label
    pub label: String,
    /// Scale rank
    pub rank: i64,
    /// Cumulative proportion in A
    pub cdf_a: f64,
    /// Cumulative proportion in B
    pub cdf_b: f64,
    /// `cdfB - cdfA`
    pub delta_cdf: f64,
}

/// A rate delta with its bootstrap CI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateDelta {
    /// `rateB - rateA`
    pub delta: f64,
    /// Bootstrap 95% interval
    pub ci95: Option<Ci>,
}

/// Median labels on both sides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedianComparison {
    /// Median category of A
    pub median_a: Option<String>,
    /// Median category of B
    pub median_b: Option<String>,
}

/// p50/p90 category labels on both sides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentileShift {
    /// Median label of A
    pub p50_a: Option<String>,
    /// Median label of B
    pub p50_b: Option<String>,
    /// 90th percentile label of A
    pub p90_a: Option<String>,
    /// 90th percentile label of B
    pub p90_b: Option<String>,
}

/// Paired ordinal comparison of two experiments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdinalComparison {
    /// The nominal comparison fields
    #[serde(flatten)]
    pub nominal: NominalComparison,
    /// Per-label CDF shift in rank order
    pub cdf_comparison: Vec<CdfDelta>,
    /// Pass-rate delta; null without an acceptable-label policy
    pub delta_pass_rate: Option<RateDelta>,
    /// Tail-mass delta; null without a rank-threshold policy
    pub delta_tail_mass: Option<RateDelta>,
    /// Median labels on both sides
    pub median_comparison: MedianComparison,
    /// p50/p90 labels on both sides
    pub percentile_shift: PercentileShift,
    /// Signed-rank test on rank-unit pair differences
    pub wilcoxon_signed_rank: WilcoxonResult,
    /// Dominance effect size on rank differences
    pub cliffs_delta: Option<f64>,
    /// Fraction of pairs where B outranks A
    pub probability_of_superiority: Option<f64>,
}

impl OrdinalComparison {
    /// The all-null shape for zero overlapping rows
    pub fn empty() -> Self {
        Self {
            nominal: NominalComparison::empty(),
            cdf_comparison: Vec::new(),
            delta_pass_rate: None,
            delta_tail_mass: None,
            median_comparison: MedianComparison::default(),
            percentile_shift: PercentileShift::default(),
            wilcoxon_signed_rank: WilcoxonResult {
                statistic: None,
                p_value: None,
            },
            cliffs_delta: None,
            probability_of_superiority: None,
        }
    }
}

/// Per-request comparison result, shaped by scoring type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Comparison {
    /// Continuous scores
    Numeric(NumericComparison),
    /// Unordered categories
    Nominal(NominalComparison),
    /// Ordered categories with a rank scale
    Ordinal(OrdinalComparison),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_value_codes() {
        assert_eq!(ScoreValue::Number(3.0).as_code(), "3");
        assert_eq!(ScoreValue::Number(2.5).as_code(), "2.5");
        assert_eq!(ScoreValue::Text("Good".into()).as_code(), "Good");
        assert_eq!(ScoreValue::Number(1.5).as_number(), Some(1.5));
        assert_eq!(ScoreValue::Text("x".into()).as_number(), None);
    }

    #[test]
    fn test_scored_value_requires_done() {
        let row = ScoredRow {
            id: 1,
            created_at: Utc::now(),
            value: Some(ScoreValue::Number(1.0)),
            status: RowStatus::Pending,
        };
        assert!(row.scored_value().is_none());

        let done = ScoredRow {
            status: RowStatus::Done,
            ..row.clone()
        };
        assert!(done.scored_value().is_some());

        let null_value = ScoredRow {
            value: None,
            status: RowStatus::Done,
            ..row
        };
        assert!(null_value.scored_value().is_none());
    }

    #[test]
    fn test_empty_shapes_serialize_with_full_field_sets() {
        let json = serde_json::to_value(NumericComparison::empty()).unwrap();
        assert_eq!(json["nPaired"], 0);
        assert!(json["pValuePermutation"].is_null());
        assert!(json["winRate"].is_null());

        let json = serde_json::to_value(OrdinalComparison::empty()).unwrap();
        assert_eq!(json["nPaired"], 0);
        assert!(json["bowkerTest"]["chiSquared"].is_null());
        assert!(json["cdfComparison"].as_array().unwrap().is_empty());
        assert!(json["medianComparison"]["medianA"].is_null());
    }
}
