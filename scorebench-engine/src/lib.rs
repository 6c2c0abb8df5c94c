#![warn(missing_docs)]
//! ScoreBench Engine
//!
//! Orchestrates the statistics calculators over potentially large result
//! sets without materializing them:
//! - Collaborator traits for the backing store: batched row sources and
//!   SQL-style aggregate queries ([`source`])
//! - A streaming aggregator that folds rows batch by batch with peak
//!   memory bounded to one batch ([`stream`])
//! - A per-scoring-type orchestrator producing numeric, nominal or
//!   ordinal statistics, with an in-memory twin guaranteed to agree
//!   with the streaming path ([`orchestrator`])
//! - A paired comparison engine for A/B experiment analysis ([`compare`])
//!
//! Zero rows or zero pairs never error: every response shape comes back
//! fully populated with nulls and zeros so callers can render
//! "insufficient data" uniformly. Collaborator failures propagate
//! untouched; retry policy belongs to the store layer.

mod compare;
mod error;
mod memory;
mod orchestrator;
mod source;
mod stream;
mod types;

pub use compare::{
    ComparisonConfig, ComparisonEngine, nominal_comparison_from_table,
    numeric_comparison_from_aggregate, numeric_comparison_from_pairs,
    ordinal_comparison_from_table,
};
pub use error::EngineError;
pub use memory::{NoFastPath, VecAggregateQuery, VecPairedSource, VecRowSource};
pub use orchestrator::{ScoringType, StatisticsOrchestrator, compute_in_memory};
pub use source::{AggregateQuery, PairedAggregateQuery, PairedRowSource, RowCursor, RowSource};
pub use stream::{NominalFold, NumericFold, StreamingAggregator};
pub use types::{
    CategoryChanges, CategoryDelta, CdfDelta, Comparison, MedianComparison, NominalComparison,
    NumericAggregates, NumericComparison, OrdinalAggregates, OrdinalComparison,
    PairedKey, PairedNumericAggregate, PairedRow, PercentileShift, RateDelta, RowStatus,
    ScoreValue, ScoredRow, StatKey, Statistics,
};

// Response-shape building blocks shared with the stats crate
pub use scorebench_stats::{
    BowkerTest, CategoricalSummary as NominalStatistics, CdfEntry, ChangeTable, Ci,
    NumericSummary as NumericStatistics, OrdinalPolicy, OrdinalSummary as OrdinalStatistics,
    PercentileCategories, RandomSource, RateStat, Scale, ScaleError, ScalePoint, SeededRandom,
    StdRandom, WilcoxonResult,
};

/// Default number of rows fetched per batch from the backing store
pub const DEFAULT_BATCH_SIZE: usize = 2000;
