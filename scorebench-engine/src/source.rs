//! Store Collaborator Traits
//!
//! The engine consumes a backing store through these interfaces and
//! nothing else: batched row streams for folding, and SQL-style
//! aggregate queries for the fast paths. Failures come back as
//! `anyhow::Error` and propagate uncaught; retry policy lives with the
//! store, not here.

use crate::types::{
    NumericAggregates, OrdinalAggregates, PairedKey, PairedNumericAggregate, PairedRow, ScoredRow,
    StatKey,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scorebench_stats::{ChangeTable, OrdinalPolicy, Scale};

/// Keyset pagination cursor over `(createdAt, id)`.
///
/// Keyset rather than offset pagination keeps batches stable under
/// concurrent writes: new rows land strictly after the cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCursor {
    /// Resume strictly after this `(createdAt, id)` position
    pub after: Option<(DateTime<Utc>, u64)>,
}

impl RowCursor {
    /// Advance past a fetched row
    pub fn advance(&mut self, row: &ScoredRow) {
        self.after = Some((row.created_at, row.id));
    }
}

/// Streams one score's result rows in bounded batches
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Up to `limit` rows ordered by `(createdAt, id)` ascending,
    /// strictly after the cursor. A batch shorter than `limit` is the
    /// end-of-stream sentinel.
    async fn fetch_batch(
        &self,
        key: &StatKey,
        cursor: RowCursor,
        limit: usize,
    ) -> anyhow::Result<Vec<ScoredRow>>;
}

/// SQL-style aggregate queries over one score's result rows
#[async_trait]
pub trait AggregateQuery: Send + Sync {
    /// Counts and interpolated percentiles for a numeric score
    async fn count_and_percentiles(&self, key: &StatKey) -> anyhow::Result<NumericAggregates>;

    /// Rank-cast aggregates for an ordinal score: CDF, percentile
    /// labels, IQR and the policy-gated pass rate
    async fn ordinal_aggregates(
        &self,
        key: &StatKey,
        scale: &Scale,
        policy: Option<&OrdinalPolicy>,
    ) -> anyhow::Result<OrdinalAggregates>;
}

/// Streams pre-joined pairs of two experiments' scores.
///
/// The store performs the join: only dataset rows scored (done) in both
/// experiments appear, in a deterministic order, so plain offset
/// pagination suffices.
#[async_trait]
pub trait PairedRowSource: Send + Sync {
    /// Up to `limit` pairs starting at `offset`. A batch shorter than
    /// `limit` is the end-of-stream sentinel.
    async fn fetch_batch(
        &self,
        key: &PairedKey,
        offset: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<PairedRow>>;
}

/// SQL fast paths over paired rows.
///
/// `Ok(None)` means the store offers no fast path for this key and the
/// engine should stream pairs instead; it is not an error.
#[async_trait]
pub trait PairedAggregateQuery: Send + Sync {
    /// Pre-aggregated paired numeric statistics
    async fn numeric_aggregates(
        &self,
        key: &PairedKey,
    ) -> anyhow::Result<Option<PairedNumericAggregate>>;

    /// Pre-aggregated (categoryA, categoryB) co-occurrence counts
    async fn change_table(&self, key: &PairedKey) -> anyhow::Result<Option<ChangeTable>>;
}
