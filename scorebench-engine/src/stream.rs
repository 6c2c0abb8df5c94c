//! Streaming Aggregation
//!
//! Pulls result rows in bounded batches and folds them into the
//! aggregate inputs the summary constructors take, so peak memory is
//! one batch regardless of result-set size. Batches are processed
//! strictly in arrival order; iteration ends at the first batch shorter
//! than the requested size.

use crate::source::{RowCursor, RowSource};
use crate::types::{ScoredRow, StatKey};
use crate::DEFAULT_BATCH_SIZE;
use indexmap::IndexMap;
use scorebench_stats::OnlineAccumulator;
use tracing::trace;

/// Batched fold driver
#[derive(Debug, Clone)]
pub struct StreamingAggregator {
    batch_size: usize,
}

impl Default for StreamingAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl StreamingAggregator {
    /// Aggregator pulling `batch_size` rows per fetch
    pub fn new(batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch size must be positive");
        Self { batch_size }
    }

    /// Fold all rows for `key` into category counts
    pub async fn fold_nominal<S>(&self, source: &S, key: &StatKey) -> anyhow::Result<NominalFold>
    where
        S: RowSource + ?Sized,
    {
        let mut fold = NominalFold::default();
        self.drive(source, key, |row| fold.observe(row)).await?;
        Ok(fold)
    }

    /// Fold all rows for `key` into running numeric moments
    pub async fn fold_numeric<S>(&self, source: &S, key: &StatKey) -> anyhow::Result<NumericFold>
    where
        S: RowSource + ?Sized,
    {
        let mut fold = NumericFold::default();
        self.drive(source, key, |row| fold.observe(row)).await?;
        Ok(fold)
    }

    async fn drive<S, F>(&self, source: &S, key: &StatKey, mut observe: F) -> anyhow::Result<()>
    where
        S: RowSource + ?Sized,
        F: FnMut(&ScoredRow),
    {
        let mut cursor = RowCursor::default();
        let mut batches = 0usize;
        loop {
            let batch = source.fetch_batch(key, cursor, self.batch_size).await?;
            batches += 1;
            trace!(batch = batches, rows = batch.len(), "folding batch");
            for row in &batch {
                observe(row);
                cursor.advance(row);
            }
            if batch.len() < self.batch_size {
                return Ok(());
            }
        }
    }
}

/// Running category counts with single-pass mode tracking
#[derive(Debug, Clone, Default)]
pub struct NominalFold {
    n_total: u64,
    n_scored: u64,
    counts: IndexMap<String, u64>,
    /// `(insertion index, count)` of the current mode
    mode: Option<(usize, u64)>,
}

impl NominalFold {
    /// Fold one row
    pub fn observe(&mut self, row: &ScoredRow) {
        self.n_total += 1;
        let Some(value) = row.scored_value() else {
            return;
        };
        self.n_scored += 1;
        let code = value.as_code();
        let entry = self.counts.entry(code);
        let index = entry.index();
        let count = {
            let slot = entry.or_insert(0);
            *slot += 1;
            *slot
        };
        // ties go to the first-seen code, matching the counts-based
        // constructor's scan order
        let better = match self.mode {
            None => true,
            Some((mode_index, best)) => count > best || (count == best && index < mode_index),
        };
        if better {
            self.mode = Some((index, count));
        }
    }

    /// All rows seen
    pub fn n_total(&self) -> u64 {
        self.n_total
    }

    /// Scored rows seen
    pub fn n_scored(&self) -> u64 {
        self.n_scored
    }

    /// Counts per code, first-seen order
    pub fn counts(&self) -> &IndexMap<String, u64> {
        &self.counts
    }

    /// Mode without a second pass
    pub fn mode_code(&self) -> Option<&str> {
        self.mode
            .and_then(|(index, _)| self.counts.get_index(index))
            .map(|(code, _)| code.as_str())
    }

    /// Consume into the counts map
    pub fn into_counts(self) -> IndexMap<String, u64> {
        self.counts
    }
}

/// Running numeric moments over scored numeric rows
#[derive(Debug, Clone, Default)]
pub struct NumericFold {
    n_total: u64,
    accumulator: OnlineAccumulator,
}

impl NumericFold {
    /// Fold one row; non-numeric and unscored rows count only toward
    /// the total
    pub fn observe(&mut self, row: &ScoredRow) {
        self.n_total += 1;
        if let Some(x) = row.scored_value().and_then(|v| v.as_number()) {
            self.accumulator.observe(x);
        }
    }

    /// All rows seen
    pub fn n_total(&self) -> u64 {
        self.n_total
    }

    /// Scored numeric rows seen
    pub fn n_scored(&self) -> u64 {
        self.accumulator.count()
    }

    /// The running moments
    pub fn accumulator(&self) -> &OnlineAccumulator {
        &self.accumulator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::VecRowSource;
    use crate::types::{RowStatus, ScoreValue};
    use chrono::{TimeZone, Utc};

    fn row(id: u64, value: Option<ScoreValue>, status: RowStatus) -> ScoredRow {
        ScoredRow {
            id,
            created_at: Utc.timestamp_opt(1_700_000_000 + id as i64, 0).unwrap(),
            value,
            status,
        }
    }

    fn key() -> StatKey {
        StatKey {
            evaluation_id: 1,
            score_id: 2,
            experiment_id: None,
        }
    }

    fn category_rows() -> Vec<ScoredRow> {
        vec![
            row(1, Some(ScoreValue::Text("a".into())), RowStatus::Done),
            row(2, Some(ScoreValue::Text("b".into())), RowStatus::Done),
            row(3, Some(ScoreValue::Text("a".into())), RowStatus::Done),
            row(4, None, RowStatus::Done),
            row(5, Some(ScoreValue::Text("c".into())), RowStatus::Pending),
            row(6, Some(ScoreValue::Text("b".into())), RowStatus::Done),
            row(7, Some(ScoreValue::Text("a".into())), RowStatus::Done),
        ]
    }

    #[tokio::test]
    async fn test_nominal_fold_counts_and_mode() {
        let source = VecRowSource::new(category_rows());
        let fold = StreamingAggregator::new(3)
            .fold_nominal(&source, &key())
            .await
            .unwrap();

        assert_eq!(fold.n_total(), 7);
        assert_eq!(fold.n_scored(), 5);
        assert_eq!(fold.counts()["a"], 3);
        assert_eq!(fold.counts()["b"], 2);
        assert_eq!(fold.counts().get("c"), None);
        assert_eq!(fold.mode_code(), Some("a"));
    }

    #[tokio::test]
    async fn test_batch_size_does_not_change_fold() {
        for batch_size in [1, 2, 3, 5, 100] {
            let source = VecRowSource::new(category_rows());
            let fold = StreamingAggregator::new(batch_size)
                .fold_nominal(&source, &key())
                .await
                .unwrap();
            assert_eq!(fold.n_total(), 7, "batch size {batch_size}");
            assert_eq!(fold.counts()["a"], 3, "batch size {batch_size}");
        }
    }

    #[tokio::test]
    async fn test_numeric_fold_skips_unscored() {
        let rows = vec![
            row(1, Some(ScoreValue::Number(1.0)), RowStatus::Done),
            row(2, Some(ScoreValue::Number(2.0)), RowStatus::Done),
            row(3, Some(ScoreValue::Number(99.0)), RowStatus::Pending),
            row(4, None, RowStatus::Done),
            row(5, Some(ScoreValue::Number(3.0)), RowStatus::Done),
        ];
        let source = VecRowSource::new(rows);
        let fold = StreamingAggregator::new(2)
            .fold_numeric(&source, &key())
            .await
            .unwrap();

        assert_eq!(fold.n_total(), 5);
        assert_eq!(fold.n_scored(), 3);
        assert!((fold.accumulator().mean() - 2.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_empty_source() {
        let source = VecRowSource::new(Vec::new());
        let fold = StreamingAggregator::default()
            .fold_nominal(&source, &key())
            .await
            .unwrap();
        assert_eq!(fold.n_total(), 0);
        assert_eq!(fold.n_scored(), 0);
        assert!(fold.counts().is_empty());
        assert!(fold.mode_code().is_none());
    }

    #[tokio::test]
    async fn test_mode_tie_breaks_first_seen() {
        let rows = vec![
            row(1, Some(ScoreValue::Text("y".into())), RowStatus::Done),
            row(2, Some(ScoreValue::Text("x".into())), RowStatus::Done),
            row(3, Some(ScoreValue::Text("x".into())), RowStatus::Done),
            row(4, Some(ScoreValue::Text("y".into())), RowStatus::Done),
        ];
        let source = VecRowSource::new(rows);
        let fold = StreamingAggregator::new(2)
            .fold_nominal(&source, &key())
            .await
            .unwrap();
        assert_eq!(fold.mode_code(), Some("y"));
    }
}
