#![warn(missing_docs)]
//! ScoreBench Statistical Engine
//!
//! Pure statistics over scored evaluation results:
//! - Basic formulas: mean/variance, interpolated percentiles, entropy,
//!   Wilson intervals, normal/chi-square/Student-t kernels
//! - Welford online accumulation for single-pass streaming aggregation
//! - Categorical, ordinal and numeric summaries with dual constructors
//!   (raw values or pre-aggregated inputs) that share one combine step
//! - A paired two-sample toolkit: permutation test, bootstrap intervals,
//!   Newcombe paired CIs, Bowker symmetry test, Wilcoxon signed-rank,
//!   Cliff's delta and probability of superiority
//!
//! All resampling draws from an injectable [`RandomSource`] so tests can
//! pin seeds and verify exact interval bounds.

mod basic;
mod categorical;
mod comparison;
mod numeric;
mod online;
mod ordinal;
mod random;

pub use basic::{
    Ci, chi_square_cdf, entropy, erf, mean, normal_cdf, normal_quantile, percentile,
    population_variance, sample_variance, std_dev, t_critical, t_quantile_975, wilson_ci,
};
pub use categorical::CategoricalSummary;
pub use comparison::{
    BowkerTest, ChangeTable, WilcoxonResult, bootstrap_delta_proportion_ci, bowker_test,
    bootstrap_delta_rate_ci, bootstrap_mean_ci, cliffs_delta, cramers_v, newcombe_paired_ci,
    permutation_p_value, probability_of_superiority, t_based_ci, wilcoxon_signed_rank,
};
pub use numeric::NumericSummary;
pub use online::OnlineAccumulator;
pub use ordinal::{
    CdfEntry, OrdinalPolicy, OrdinalSummary, PercentileCategories, RateStat, Scale, ScaleError,
    ScalePoint, cdf_from_counts, iqr_rank_from_counts, pass_rate_from_counts, percentile_category,
    tail_mass_from_counts,
};
pub use random::{RandomSource, SeededRandom, StdRandom};

/// Default iteration count for permutation tests
pub const DEFAULT_PERMUTATION_SAMPLES: usize = 10_000;

/// Default iteration count for bootstrap confidence intervals
pub const DEFAULT_BOOTSTRAP_SAMPLES: usize = 10_000;

/// Default iteration count for predicate-rate bootstrap intervals
/// (lower than the mean/proportion default for performance)
pub const DEFAULT_RATE_BOOTSTRAP_SAMPLES: usize = 1_000;

/// Default confidence level (95%)
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;
