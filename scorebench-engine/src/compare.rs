//! Paired Experiment Comparison
//!
//! Compares two experiments over their shared dataset rows. Each
//! scoring type has a store fast path (pre-aggregated numeric moments,
//! or a pre-grouped change table) and a streaming fallback that folds
//! the paired rows in batches; both routes end in the same pure
//! assembly functions, so the route taken never changes the numbers
//! beyond what the aggregate shape can carry (the permutation test
//! needs per-pair deltas and is null on the numeric fast path).

use crate::error::EngineError;
use crate::orchestrator::ScoringType;
use crate::source::{PairedAggregateQuery, PairedRowSource};
use crate::types::{
    CategoryChanges, CategoryDelta, CdfDelta, Comparison, MedianComparison, NominalComparison,
    NumericComparison, OrdinalComparison, PairedKey, PairedNumericAggregate, PairedRow,
    PercentileShift, RateDelta,
};
use crate::DEFAULT_BATCH_SIZE;
use indexmap::IndexMap;
use scorebench_stats::{
    bootstrap_delta_rate_ci, bowker_test, cdf_from_counts, cliffs_delta, cramers_v, entropy,
    mean, newcombe_paired_ci, percentile_category, permutation_p_value,
    probability_of_superiority, std_dev, t_based_ci, wilcoxon_signed_rank, ChangeTable,
    OrdinalPolicy, RandomSource, Scale, DEFAULT_PERMUTATION_SAMPLES,
    DEFAULT_RATE_BOOTSTRAP_SAMPLES,
};

/// Tunable sample counts and batching for a comparison run
#[derive(Debug, Clone)]
pub struct ComparisonConfig {
    /// Sign-flip iterations for the permutation p-value
    pub permutation_samples: usize,
    /// Resamples for pass-rate and tail-mass delta bootstraps
    pub rate_bootstrap_samples: usize,
    /// Paired-row fetch size on the streaming route
    pub batch_size: usize,
    /// Take the store fast path when the backend offers one
    pub prefer_aggregates: bool,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            permutation_samples: DEFAULT_PERMUTATION_SAMPLES,
            rate_bootstrap_samples: DEFAULT_RATE_BOOTSTRAP_SAMPLES,
            batch_size: DEFAULT_BATCH_SIZE,
            prefer_aggregates: true,
        }
    }
}

/// Runs paired comparisons against a paired-row source plus an optional
/// aggregate backend
#[derive(Debug)]
pub struct ComparisonEngine<P, Q, R> {
    pairs: P,
    aggregates: Q,
    rng: R,
    config: ComparisonConfig,
}

impl<P, Q, R> ComparisonEngine<P, Q, R>
where
    P: PairedRowSource,
    Q: PairedAggregateQuery,
    R: RandomSource,
{
    /// Engine with the default configuration
    pub fn new(pairs: P, aggregates: Q, rng: R) -> Self {
        Self::with_config(pairs, aggregates, rng, ComparisonConfig::default())
    }

    /// Engine with an explicit configuration
    pub fn with_config(pairs: P, aggregates: Q, rng: R, config: ComparisonConfig) -> Self {
        assert!(config.batch_size > 0, "batch size must be positive");
        Self {
            pairs,
            aggregates,
            rng,
            config,
        }
    }

    /// Compare experiment B against experiment A on one score
    pub async fn compare(
        &mut self,
        key: &PairedKey,
        scoring: &ScoringType,
    ) -> Result<Comparison, EngineError> {
        tracing::debug!(
            experiment_a = key.experiment_a,
            experiment_b = key.experiment_b,
            score_id = key.score_id,
            "comparing experiments"
        );
        match scoring {
            ScoringType::Numeric => self.compare_numeric(key).await,
            ScoringType::Nominal => {
                let table = self.change_table(key).await?;
                Ok(Comparison::Nominal(nominal_comparison_from_table(&table)))
            }
            ScoringType::Ordinal { scale, policy } => {
                let table = self.change_table(key).await?;
                Ok(Comparison::Ordinal(ordinal_comparison_from_table(
                    &table,
                    scale,
                    policy.as_ref(),
                    &self.config,
                    &mut self.rng,
                )))
            }
        }
    }

    async fn compare_numeric(&mut self, key: &PairedKey) -> Result<Comparison, EngineError> {
        if self.config.prefer_aggregates {
            if let Some(agg) = self.aggregates.numeric_aggregates(key).await? {
                tracing::trace!("numeric comparison via aggregate fast path");
                return Ok(Comparison::Numeric(numeric_comparison_from_aggregate(&agg)));
            }
        }
        let pairs = self.collect_pairs(key).await?;
        Ok(Comparison::Numeric(numeric_comparison_from_pairs(
            &pairs,
            &self.config,
            &mut self.rng,
        )))
    }

    /// The change table, from the store when it groups for us, else
    /// folded out of the paired-row stream in bounded memory
    async fn change_table(&mut self, key: &PairedKey) -> Result<ChangeTable, EngineError> {
        if self.config.prefer_aggregates {
            if let Some(table) = self.aggregates.change_table(key).await? {
                tracing::trace!("change table via aggregate fast path");
                return Ok(table);
            }
        }

        let mut table = ChangeTable::new();
        let mut offset = 0;
        loop {
            let batch = self
                .pairs
                .fetch_batch(key, offset, self.config.batch_size)
                .await?;
            let fetched = batch.len();
            for pair in &batch {
                table.record(&pair.value_a.as_code(), &pair.value_b.as_code());
            }
            offset += fetched;
            if fetched < self.config.batch_size {
                return Ok(table);
            }
        }
    }

    async fn collect_pairs(&mut self, key: &PairedKey) -> Result<Vec<PairedRow>, EngineError> {
        let mut pairs = Vec::new();
        loop {
            let batch = self
                .pairs
                .fetch_batch(key, pairs.len(), self.config.batch_size)
                .await?;
            let fetched = batch.len();
            pairs.extend(batch);
            if fetched < self.config.batch_size {
                return Ok(pairs);
            }
        }
    }
}

/// Numeric comparison from materialized pairs. Pairs where either side
/// is non-numeric are dropped.
pub fn numeric_comparison_from_pairs<R: RandomSource + ?Sized>(
    pairs: &[PairedRow],
    config: &ComparisonConfig,
    rng: &mut R,
) -> NumericComparison {
    let numeric: Vec<(f64, f64)> = pairs
        .iter()
        .filter_map(|p| Some((p.value_a.as_number()?, p.value_b.as_number()?)))
        .collect();
    if numeric.is_empty() {
        return NumericComparison::empty();
    }

    let values_a: Vec<f64> = numeric.iter().map(|(a, _)| *a).collect();
    let values_b: Vec<f64> = numeric.iter().map(|(_, b)| *b).collect();
    let deltas: Vec<f64> = numeric.iter().map(|(a, b)| b - a).collect();
    let n = deltas.len();

    let delta_mean = mean(&deltas);
    let std_delta = std_dev(&deltas);
    let wins = deltas.iter().filter(|&&d| d > 0.0).count();
    let losses = deltas.iter().filter(|&&d| d < 0.0).count();

    NumericComparison {
        n_paired: n as u64,
        mean_a: Some(mean(&values_a)),
        mean_b: Some(mean(&values_b)),
        delta_mean: Some(delta_mean),
        ci95_delta: t_based_ci(delta_mean, std_delta, n as u64),
        p_value_permutation: permutation_p_value(
            &deltas,
            delta_mean.abs(),
            config.permutation_samples,
            rng,
        ),
        cohens_dz: (std_delta > 0.0).then(|| delta_mean / std_delta),
        win_rate: Some(wins as f64 / n as f64),
        loss_rate: Some(losses as f64 / n as f64),
        tie_rate: Some((n - wins - losses) as f64 / n as f64),
    }
}

/// Numeric comparison from the store's pre-aggregated moments. The
/// permutation p-value needs per-pair deltas and stays null here.
pub fn numeric_comparison_from_aggregate(agg: &PairedNumericAggregate) -> NumericComparison {
    if agg.n_paired == 0 {
        return NumericComparison::empty();
    }
    NumericComparison {
        n_paired: agg.n_paired,
        mean_a: Some(agg.mean_a),
        mean_b: Some(agg.mean_b),
        delta_mean: Some(agg.delta_mean),
        ci95_delta: t_based_ci(agg.delta_mean, agg.std_delta, agg.n_paired),
        p_value_permutation: None,
        cohens_dz: (agg.std_delta > 0.0).then(|| agg.delta_mean / agg.std_delta),
        win_rate: Some(agg.win_rate),
        loss_rate: Some(agg.loss_rate),
        tie_rate: Some(agg.tie_rate),
    }
}

/// Nominal comparison assembled from a change table. Category-delta
/// intervals come from the paired Newcombe method, so no randomness
/// is involved.
pub fn nominal_comparison_from_table(table: &ChangeTable) -> NominalComparison {
    if table.is_empty() {
        return NominalComparison::empty();
    }
    let n_paired = table.n_paired();
    let nf = n_paired as f64;
    let categories = table.categories();

    let mut distribution_comparison = Vec::with_capacity(categories.len());
    let mut proportions_a = Vec::with_capacity(categories.len());
    let mut proportions_b = Vec::with_capacity(categories.len());
    let mut changes = CategoryChanges::default();
    for code in &categories {
        let count_a = table.marginal_a(code);
        let count_b = table.marginal_b(code);
        let proportion_a = count_a as f64 / nf;
        let proportion_b = count_b as f64 / nf;
        proportions_a.push(proportion_a);
        proportions_b.push(proportion_b);

        if count_a == 0 && count_b > 0 {
            changes.appeared_in_b.push(code.clone());
        } else if count_a > 0 && count_b == 0 {
            changes.disappeared_in_b.push(code.clone());
        }

        let (both, only_a, only_b, neither) = table.paired_cells(code);
        distribution_comparison.push(CategoryDelta {
            code: code.clone(),
            proportion_a,
            proportion_b,
            delta: proportion_b - proportion_a,
            ci95: newcombe_paired_ci(both, only_a, only_b, neither),
        });
    }

    let bowker = bowker_test(table);
    let cramers = bowker
        .chi_squared
        .and_then(|chi| cramers_v(chi, bowker.degrees_of_freedom, n_paired));

    NominalComparison {
        n_paired,
        distribution_comparison,
        cramers_v: cramers,
        bowker_test: bowker,
        entropy_difference: Some(entropy(&proportions_b) - entropy(&proportions_a)),
        category_changes: changes,
    }
}

/// Ordinal comparison assembled from a change table and the scale
pub fn ordinal_comparison_from_table<R: RandomSource + ?Sized>(
    table: &ChangeTable,
    scale: &Scale,
    policy: Option<&OrdinalPolicy>,
    config: &ComparisonConfig,
    rng: &mut R,
) -> OrdinalComparison {
    if table.is_empty() {
        return OrdinalComparison::empty();
    }
    let nominal = nominal_comparison_from_table(table);
    let n_paired = table.n_paired();

    let cdf_a = cdf_from_counts(scale, &marginal_counts(table, ChangeTable::marginal_a), n_paired);
    let cdf_b = cdf_from_counts(scale, &marginal_counts(table, ChangeTable::marginal_b), n_paired);
    let cdf_comparison = cdf_a
        .iter()
        .zip(&cdf_b)
        .map(|(a, b)| CdfDelta {
            label: a.label.clone(),
            rank: a.rank,
            cdf_a: a.cumulative,
            cdf_b: b.cumulative,
            delta_cdf: b.cumulative - a.cumulative,
        })
        .collect();

    // Rank-unit differences for the order-aware tests; cells whose
    // codes do not resolve against the scale are left out.
    let mut rank_differences = Vec::with_capacity(n_paired as usize);
    for (code_a, code_b, count) in table.cells() {
        if let (Some(rank_a), Some(rank_b)) = (scale.rank_of(code_a), scale.rank_of(code_b)) {
            for _ in 0..count {
                rank_differences.push((rank_b - rank_a) as f64);
            }
        }
    }

    let values_a = table.expand_a();
    let values_b = table.expand_b();
    let delta_pass_rate = policy.and_then(|p| p.acceptable_labels.as_ref()).map(|set| {
        let passes = |code: &str| {
            scale
                .point_of(code)
                .is_some_and(|point| set.contains(&point.label))
        };
        rate_delta(&values_a, &values_b, n_paired, &passes, config, rng)
    });
    let delta_tail_mass = policy.and_then(|p| p.tail_threshold_rank).map(|threshold| {
        let below = |code: &str| scale.rank_of(code).is_some_and(|rank| rank < threshold);
        rate_delta(&values_a, &values_b, n_paired, &below, config, rng)
    });

    OrdinalComparison {
        nominal,
        cdf_comparison,
        delta_pass_rate,
        delta_tail_mass,
        median_comparison: MedianComparison {
            median_a: percentile_category(&cdf_a, 50.0),
            median_b: percentile_category(&cdf_b, 50.0),
        },
        percentile_shift: PercentileShift {
            p50_a: percentile_category(&cdf_a, 50.0),
            p50_b: percentile_category(&cdf_b, 50.0),
            p90_a: percentile_category(&cdf_a, 90.0),
            p90_b: percentile_category(&cdf_b, 90.0),
        },
        wilcoxon_signed_rank: wilcoxon_signed_rank(&rank_differences),
        cliffs_delta: cliffs_delta(&rank_differences),
        probability_of_superiority: probability_of_superiority(&rank_differences),
    }
}

/// Marginal counts per raw code, first-seen cell order
fn marginal_counts(
    table: &ChangeTable,
    marginal: impl Fn(&ChangeTable, &str) -> u64,
) -> IndexMap<String, u64> {
    table
        .categories()
        .into_iter()
        .map(|code| {
            let count = marginal(table, &code);
            (code, count)
        })
        .filter(|(_, count)| *count > 0)
        .collect()
}

fn rate_delta<R: RandomSource + ?Sized>(
    values_a: &[String],
    values_b: &[String],
    n_paired: u64,
    predicate: &impl Fn(&str) -> bool,
    config: &ComparisonConfig,
    rng: &mut R,
) -> RateDelta {
    let nf = n_paired as f64;
    let rate_a = values_a.iter().filter(|v| predicate(v.as_str())).count() as f64 / nf;
    let rate_b = values_b.iter().filter(|v| predicate(v.as_str())).count() as f64 / nf;
    RateDelta {
        delta: rate_b - rate_a,
        ci95: bootstrap_delta_rate_ci(
            values_a,
            values_b,
            n_paired as usize,
            predicate,
            config.rate_bootstrap_samples,
            rng,
        ),
    }
}
