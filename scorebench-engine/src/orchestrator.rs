//! Statistics Orchestration
//!
//! Fans one summary request out over the two data paths: a streamed
//! fold over the row source for the count-and-moment fields, and an
//! aggregate query for the fields the store computes better itself
//! (sorted percentiles, rank-cast ordinal shapes). Both halves run
//! concurrently and funnel through the shared summary constructors,
//! so the assembled result matches an in-memory computation over the
//! same rows.

use crate::error::EngineError;
use crate::source::{AggregateQuery, RowSource};
use crate::stream::StreamingAggregator;
use crate::types::{ScoredRow, StatKey, Statistics};
use crate::DEFAULT_BATCH_SIZE;
use scorebench_stats::{
    tail_mass_from_counts, CategoricalSummary, NumericSummary, OrdinalPolicy, OrdinalSummary,
    PercentileCategories, Scale, ScalePoint,
};

/// How a score's values are interpreted
#[derive(Debug, Clone)]
pub enum ScoringType {
    /// Continuous values; mean/variance/percentile summaries
    Numeric,
    /// Unordered category codes; count/proportion/mode summaries
    Nominal,
    /// Ordered categories resolved against a rank scale
    Ordinal {
        /// The validated label/rank scale
        scale: Scale,
        /// Optional pass-set and tail-threshold configuration
        policy: Option<OrdinalPolicy>,
    },
}

impl ScoringType {
    /// Ordinal scoring from raw scale points, validating the scale
    pub fn ordinal(
        points: Vec<ScalePoint>,
        policy: Option<OrdinalPolicy>,
    ) -> Result<Self, EngineError> {
        Ok(ScoringType::Ordinal {
            scale: Scale::new(points)?,
            policy,
        })
    }
}

/// Computes per-score statistics against a row source plus an
/// aggregate-query backend
#[derive(Debug)]
pub struct StatisticsOrchestrator<R, Q> {
    rows: R,
    aggregates: Q,
    streamer: StreamingAggregator,
}

impl<R, Q> StatisticsOrchestrator<R, Q>
where
    R: RowSource,
    Q: AggregateQuery,
{
    /// Orchestrator with the default batch size
    pub fn new(rows: R, aggregates: Q) -> Self {
        Self::with_batch_size(rows, aggregates, DEFAULT_BATCH_SIZE)
    }

    /// Orchestrator with an explicit streaming batch size
    pub fn with_batch_size(rows: R, aggregates: Q, batch_size: usize) -> Self {
        Self {
            rows,
            aggregates,
            streamer: StreamingAggregator::new(batch_size),
        }
    }

    /// Compute the statistics for one score's result set
    pub async fn compute(
        &self,
        key: &StatKey,
        scoring: &ScoringType,
    ) -> Result<Statistics, EngineError> {
        tracing::debug!(
            evaluation_id = key.evaluation_id,
            score_id = key.score_id,
            "computing statistics"
        );
        match scoring {
            ScoringType::Numeric => self.compute_numeric(key).await,
            ScoringType::Nominal => self.compute_nominal(key).await,
            ScoringType::Ordinal { scale, policy } => {
                self.compute_ordinal(key, scale, policy.as_ref()).await
            }
        }
    }

    async fn compute_numeric(&self, key: &StatKey) -> Result<Statistics, EngineError> {
        let (fold, agg) = tokio::try_join!(
            self.streamer.fold_numeric(&self.rows, key),
            self.aggregates.count_and_percentiles(key),
        )?;
        let acc = fold.accumulator();
        Ok(Statistics::Numeric(NumericSummary::from_aggregates(
            fold.n_total(),
            acc.count(),
            acc.mean(),
            acc.std_dev(),
            agg.p10,
            agg.p50,
            agg.p90,
        )))
    }

    async fn compute_nominal(&self, key: &StatKey) -> Result<Statistics, EngineError> {
        let fold = self.streamer.fold_nominal(&self.rows, key).await?;
        let (n_total, n_scored) = (fold.n_total(), fold.n_scored());
        Ok(Statistics::Nominal(CategoricalSummary::from_counts(
            fold.into_counts(),
            n_total,
            n_scored,
        )))
    }

    async fn compute_ordinal(
        &self,
        key: &StatKey,
        scale: &Scale,
        policy: Option<&OrdinalPolicy>,
    ) -> Result<Statistics, EngineError> {
        let (fold, agg) = tokio::try_join!(
            self.streamer.fold_nominal(&self.rows, key),
            self.aggregates.ordinal_aggregates(key, scale, policy),
        )?;
        let (n_total, n_scored) = (fold.n_total(), fold.n_scored());
        let counts = fold.into_counts();

        let median_category = agg.p50_label.clone();
        let percentile_categories = match (agg.p10_label, agg.p50_label, agg.p90_label) {
            (Some(p10), Some(p50), Some(p90)) => Some(PercentileCategories { p10, p50, p90 }),
            _ => None,
        };
        // The tail mass is not part of the store's rank-cast query; it
        // falls out of the streamed counts instead.
        let tail_mass_below = if n_scored > 0 {
            policy
                .and_then(|p| p.tail_threshold_rank)
                .map(|threshold| tail_mass_from_counts(scale, threshold, &counts, n_scored))
        } else {
            None
        };

        Ok(Statistics::Ordinal(OrdinalSummary {
            categorical: CategoricalSummary::from_counts(counts, n_total, n_scored),
            median_category,
            percentile_categories,
            cdf: agg.cdf,
            iqr_rank: agg.iqr_rank,
            pass_rate: agg.pass_rate,
            tail_mass_below,
        }))
    }
}

/// Single-pass computation over rows already in memory. The reference
/// the streamed path is held equal to.
pub fn compute_in_memory(rows: &[ScoredRow], scoring: &ScoringType) -> Statistics {
    let n_total = rows.len() as u64;
    match scoring {
        ScoringType::Numeric => {
            let values: Vec<f64> = rows
                .iter()
                .filter_map(|r| r.scored_value().and_then(|v| v.as_number()))
                .collect();
            Statistics::Numeric(NumericSummary::from_sample(&values, n_total))
        }
        ScoringType::Nominal => {
            let codes = rows
                .iter()
                .filter_map(|r| r.scored_value())
                .map(|v| v.as_code());
            Statistics::Nominal(CategoricalSummary::from_values(codes, n_total))
        }
        ScoringType::Ordinal { scale, policy } => {
            let codes = rows
                .iter()
                .filter_map(|r| r.scored_value())
                .map(|v| v.as_code());
            Statistics::Ordinal(OrdinalSummary::from_values(
                scale,
                policy.as_ref(),
                codes,
                n_total,
            ))
        }
    }
}
