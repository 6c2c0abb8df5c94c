//! Nominal (Categorical) Summaries
//!
//! Counts, proportions, per-category Wilson intervals, mode and entropy
//! over unordered category codes. Two constructors feed one combine
//! step: raw values (in-memory path) or pre-aggregated counts
//! (streaming/SQL path), so the two paths agree structurally rather
//! than by coincidence.

use crate::basic::{self, Ci};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Summary statistics of a nominal score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoricalSummary {
    /// All results, scored or not
    pub n_total: u64,
    /// Results that reached a terminal state with a non-null value
    pub n_scored: u64,
    /// Occurrence count per category code, first-seen order
    pub counts_by_code: IndexMap<String, u64>,
    /// count / nScored per code
    pub proportions_by_code: IndexMap<String, f64>,
    /// Wilson 95% interval per code over nScored
    pub ci_proportion_by_code: IndexMap<String, Ci>,
    /// First code (in first-seen order) achieving the maximum count
    pub mode_code: Option<String>,
    /// Shannon entropy of the proportions in bits; `None` when unscored
    pub entropy: Option<f64>,
    /// Number of distinct category codes observed
    pub num_distinct_categories: u64,
}

impl CategoricalSummary {
    /// Build from raw category values. `n_total` includes unscored
    /// results; the values themselves are the scored ones.
    pub fn from_values<I, S>(values: I, n_total: u64) -> Self
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
        Self::from_counts(counts, n_total, n_scored)
    }

    /// Build from pre-aggregated counts (the streaming/SQL path).
    /// Counts must preserve first-seen order for the mode tie-break to
    /// match the raw-values path.
    pub fn from_counts(counts: IndexMap<String, u64>, n_total: u64, n_scored: u64) -> Self {
        if n_scored == 0 {
            return Self {
                n_total,
                n_scored: 0,
                counts_by_code: IndexMap::new(),
                proportions_by_code: IndexMap::new(),
                ci_proportion_by_code: IndexMap::new(),
                mode_code: None,
                entropy: None,
                num_distinct_categories: 0,
            };
        }
        debug_assert_eq!(
            counts.values().sum::<u64>(),
            n_scored,
            "counts must sum to nScored"
        );

        let nf = n_scored as f64;
        let mut proportions = IndexMap::with_capacity(counts.len());
        let mut cis = IndexMap::with_capacity(counts.len());
        let mut mode: Option<(&str, u64)> = None;

        for (code, &count) in &counts {
            proportions.insert(code.clone(), count as f64 / nf);
            cis.insert(
                code.clone(),
                basic::wilson_ci(n_scored, count, crate::DEFAULT_CONFIDENCE_LEVEL),
            );
            // strictly-greater keeps the first-seen code on ties
            if mode.map_or(true, |(_, best)| count > best) {
                mode = Some((code, count));
            }
        }

        let props: Vec<f64> = proportions.values().copied().collect();
        let entropy = basic::entropy(&props);
        let num_distinct = counts.len() as u64;

        Self {
            n_total,
            n_scored,
            mode_code: mode.map(|(code, _)| code.to_string()),
            counts_by_code: counts,
            proportions_by_code: proportions,
            ci_proportion_by_code: cis,
            entropy: Some(entropy),
            num_distinct_categories: num_distinct,
        }
    }
}
