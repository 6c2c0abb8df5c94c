//! Engine Errors
//!
//! Data absence is not an error anywhere in this crate; these variants
//! cover configuration bugs (malformed scales) and collaborator
//! failures, which propagate to the caller without retries.

use scorebench_stats::ScaleError;
use thiserror::Error;

/// Errors surfaced by the orchestrator and comparison engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed ordinal scale configuration
    #[error(transparent)]
    Scale(#[from] ScaleError),

    /// Row source or aggregate query failure from the backing store
    #[error(transparent)]
    Source(#[from] anyhow::Error),
}
