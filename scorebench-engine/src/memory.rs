//! In-Memory Collaborators
//!
//! Vec-backed implementations of the store traits for tests and for
//! small result sets that are already materialized. They honor the
//! ordering and short-batch termination contracts exactly, and the
//! aggregate queries compute through the same helpers the in-memory
//! calculators use, so the two computation paths agree by construction.

use crate::source::{AggregateQuery, PairedAggregateQuery, PairedRowSource, RowCursor, RowSource};
use crate::types::{
    NumericAggregates, OrdinalAggregates, PairedKey, PairedNumericAggregate, PairedRow, ScoredRow,
    StatKey,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use scorebench_stats::{percentile, ChangeTable, OrdinalPolicy, OrdinalSummary, Scale};

/// Row source over a materialized vector, pre-sorted by `(createdAt, id)`.
/// Holds the rows of a single key; the key argument is ignored.
#[derive(Debug, Clone, Default)]
pub struct VecRowSource {
    rows: Vec<ScoredRow>,
}

impl VecRowSource {
    /// Sort and wrap the rows
    pub fn new(mut rows: Vec<ScoredRow>) -> Self {
        rows.sort_by_key(|r| (r.created_at, r.id));
        Self { rows }
    }

    /// The backing rows in stream order
    pub fn rows(&self) -> &[ScoredRow] {
        &self.rows
    }
}

#[async_trait]
impl RowSource for VecRowSource {
    async fn fetch_batch(
        &self,
        _key: &StatKey,
        cursor: RowCursor,
        limit: usize,
    ) -> anyhow::Result<Vec<ScoredRow>> {
        let start = match cursor.after {
            None => 0,
            Some(position) => self
                .rows
                .partition_point(|r| (r.created_at, r.id) <= position),
        };
        Ok(self.rows[start..].iter().take(limit).cloned().collect())
    }
}

/// Aggregate queries computed from the same materialized rows
#[derive(Debug, Clone, Default)]
pub struct VecAggregateQuery {
    rows: Vec<ScoredRow>,
}

impl VecAggregateQuery {
    /// Wrap the rows
    pub fn new(rows: Vec<ScoredRow>) -> Self {
        Self { rows }
    }

    fn scored_codes(&self) -> (IndexMap<String, u64>, u64) {
        let mut counts: IndexMap<String, u64> = IndexMap::new();
        let mut n_scored = 0u64;
        for row in &self.rows {
            if let Some(value) = row.scored_value() {
                *counts.entry(value.as_code()).or_insert(0) += 1;
                n_scored += 1;
            }
        }
        (counts, n_scored)
    }
}

#[async_trait]
impl AggregateQuery for VecAggregateQuery {
    async fn count_and_percentiles(&self, _key: &StatKey) -> anyhow::Result<NumericAggregates> {
        let mut values: Vec<f64> = self
            .rows
            .iter()
            .filter_map(|r| r.scored_value().and_then(|v| v.as_number()))
            .collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let n_scored = values.len() as u64;
        let (p10, p50, p90) = if values.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            (
                percentile(&values, 10.0),
                percentile(&values, 50.0),
                percentile(&values, 90.0),
            )
        };

        Ok(NumericAggregates {
            n_total: self.rows.len() as u64,
            n_scored,
            p10,
            p50,
            p90,
        })
    }

    async fn ordinal_aggregates(
        &self,
        _key: &StatKey,
        scale: &Scale,
        policy: Option<&OrdinalPolicy>,
    ) -> anyhow::Result<OrdinalAggregates> {
        let (counts, n_scored) = self.scored_codes();
        let summary = OrdinalSummary::from_counts(
            scale,
            policy,
            counts,
            self.rows.len() as u64,
            n_scored,
        );

        let (p10_label, p50_label, p90_label) = match summary.percentile_categories {
            Some(pcs) => (Some(pcs.p10), Some(pcs.p50), Some(pcs.p90)),
            None => (None, None, None),
        };

        Ok(OrdinalAggregates {
            n_total: summary.categorical.n_total,
            n_scored: summary.categorical.n_scored,
            cdf: summary.cdf,
            p10_label,
            p50_label,
            p90_label,
            iqr_rank: summary.iqr_rank,
            pass_rate: summary.pass_rate,
        })
    }
}

/// Paired row source over a materialized vector of pre-joined pairs
#[derive(Debug, Clone, Default)]
pub struct VecPairedSource {
    pairs: Vec<PairedRow>,
}

impl VecPairedSource {
    /// Wrap the pairs in their join order
    pub fn new(pairs: Vec<PairedRow>) -> Self {
        Self { pairs }
    }
}

#[async_trait]
impl PairedRowSource for VecPairedSource {
    async fn fetch_batch(
        &self,
        _key: &PairedKey,
        offset: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<PairedRow>> {
        Ok(self
            .pairs
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Paired aggregate query that never offers a fast path, forcing the
/// engine onto the streaming route
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFastPath;

#[async_trait]
impl PairedAggregateQuery for NoFastPath {
    async fn numeric_aggregates(
        &self,
        _key: &PairedKey,
    ) -> anyhow::Result<Option<PairedNumericAggregate>> {
        Ok(None)
    }

    async fn change_table(&self, _key: &PairedKey) -> anyhow::Result<Option<ChangeTable>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RowStatus, ScoreValue};
    use chrono::{TimeZone, Utc};

    fn row(id: u64, value: f64) -> ScoredRow {
        ScoredRow {
            id,
            created_at: Utc.timestamp_opt(1_700_000_000 + id as i64, 0).unwrap(),
            value: Some(ScoreValue::Number(value)),
            status: RowStatus::Done,
        }
    }

    fn key() -> StatKey {
        StatKey {
            evaluation_id: 1,
            score_id: 1,
            experiment_id: Some(3),
        }
    }

    #[tokio::test]
    async fn test_cursor_pagination_is_exhaustive_and_stable() {
        let rows: Vec<ScoredRow> = (1..=10).map(|i| row(i, i as f64)).collect();
        let source = VecRowSource::new(rows.clone());

        let mut cursor = RowCursor::default();
        let mut seen = Vec::new();
        loop {
            let batch = source.fetch_batch(&key(), cursor, 3).await.unwrap();
            for r in &batch {
                cursor.advance(r);
                seen.push(r.id);
            }
            if batch.len() < 3 {
                break;
            }
        }
        assert_eq!(seen, (1..=10).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_short_batch_terminates_exact_multiple() {
        let rows: Vec<ScoredRow> = (1..=6).map(|i| row(i, i as f64)).collect();
        let source = VecRowSource::new(rows);

        let mut cursor = RowCursor::default();
        let batch = source.fetch_batch(&key(), cursor, 3).await.unwrap();
        assert_eq!(batch.len(), 3);
        for r in &batch {
            cursor.advance(r);
        }
        let batch = source.fetch_batch(&key(), cursor, 3).await.unwrap();
        assert_eq!(batch.len(), 3);
        for r in &batch {
            cursor.advance(r);
        }
        // one extra fetch returns the empty sentinel batch
        let batch = source.fetch_batch(&key(), cursor, 3).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_count_and_percentiles() {
        let rows: Vec<ScoredRow> = vec![row(1, 1.0), row(2, 2.0), row(3, 3.0), row(4, 4.0)];
        let query = VecAggregateQuery::new(rows);
        let agg = query.count_and_percentiles(&key()).await.unwrap();

        assert_eq!(agg.n_total, 4);
        assert_eq!(agg.n_scored, 4);
        assert!((agg.p10 - 1.3).abs() < 1e-12);
        assert!((agg.p50 - 2.5).abs() < 1e-12);
        assert!((agg.p90 - 3.7).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_paired_offset_pagination() {
        let pairs: Vec<PairedRow> = (0..5)
            .map(|i| PairedRow {
                value_a: ScoreValue::Number(i as f64),
                value_b: ScoreValue::Number(i as f64 + 1.0),
            })
            .collect();
        let source = VecPairedSource::new(pairs);
        let paired_key = PairedKey {
            evaluation_id: 1,
            score_id: 1,
            experiment_a: 1,
            experiment_b: 2,
        };

        let first = source.fetch_batch(&paired_key, 0, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        let last = source.fetch_batch(&paired_key, 4, 2).await.unwrap();
        assert_eq!(last.len(), 1);
    }
}
