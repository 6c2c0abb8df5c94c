//! Paired Two-Sample Toolkit
//!
//! Statistics over rows scored in both of two experiments: sign-flip
//! permutation test, bootstrap confidence intervals, Newcombe paired
//! proportion CIs, Bowker's symmetry test, Cramer's V, the Wilcoxon
//! signed-rank test, Cliff's delta and probability of superiority.
//!
//! Data-absence conditions (no pairs, no non-zero differences) yield
//! null-shaped results rather than errors; resampling routines draw
//! through [`RandomSource`] so they are deterministic under a seed.

use crate::basic::{self, Ci};
use crate::random::RandomSource;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Sparse contingency table of paired (before, after) category
/// co-occurrences. Cell and category order is first-seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeTable {
    cells: IndexMap<(String, String), u64>,
    n_paired: u64,
}

impl ChangeTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from paired category codes
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut table = Self::new();
        for (a, b) in pairs {
            table.record(a, b);
        }
        table
    }

    /// Count one observed pair
    pub fn record(&mut self, category_a: &str, category_b: &str) {
        self.add(category_a, category_b, 1);
    }

    /// Add a pre-aggregated cell count (SQL fast path)
    pub fn add(&mut self, category_a: &str, category_b: &str, count: u64) {
        *self
            .cells
            .entry((category_a.to_string(), category_b.to_string()))
            .or_insert(0) += count;
        self.n_paired += count;
    }

    /// Total paired observations
    pub fn n_paired(&self) -> u64 {
        self.n_paired
    }

    /// Whether any pair was observed
    pub fn is_empty(&self) -> bool {
        self.n_paired == 0
    }

    /// Count for a specific (before, after) cell
    pub fn count(&self, category_a: &str, category_b: &str) -> u64 {
        self.cells
            .get(&(category_a.to_string(), category_b.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Iterate cells as `(category_a, category_b, count)`
    pub fn cells(&self) -> impl Iterator<Item = (&str, &str, u64)> {
        self.cells
            .iter()
            .map(|((a, b), &count)| (a.as_str(), b.as_str(), count))
    }

    /// Distinct categories observed on either side, first-seen order
    pub fn categories(&self) -> Vec<String> {
        let mut seen: IndexMap<&str, ()> = IndexMap::new();
        for (a, b) in self.cells.keys() {
            seen.entry(a.as_str()).or_insert(());
            seen.entry(b.as_str()).or_insert(());
        }
        seen.keys().map(|c| c.to_string()).collect()
    }

    /// Marginal count of a category on the A side
    pub fn marginal_a(&self, category: &str) -> u64 {
        self.cells
            .iter()
            .filter(|((a, _), _)| a == category)
            .map(|(_, &count)| count)
            .sum()
    }

    /// Marginal count of a category on the B side
    pub fn marginal_b(&self, category: &str) -> u64 {
        self.cells
            .iter()
            .filter(|((_, b), _)| b == category)
            .map(|(_, &count)| count)
            .sum()
    }

    /// Collapse to the 2x2 cells for one category:
    /// `(both, only_a, only_b, neither)`
    pub fn paired_cells(&self, category: &str) -> (u64, u64, u64, u64) {
        let mut both = 0;
        let mut only_a = 0;
        let mut only_b = 0;
        let mut neither = 0;
        for ((a, b), &count) in &self.cells {
            match (a == category, b == category) {
                (true, true) => both += count,
                (true, false) => only_a += count,
                (false, true) => only_b += count,
                (false, false) => neither += count,
            }
        }
        (both, only_a, only_b, neither)
    }

    /// Category codes on the A side, one entry per pair, cell order
    pub fn expand_a(&self) -> Vec<String> {
        self.expand(|(a, _)| a)
    }

    /// Category codes on the B side, one entry per pair, cell order
    pub fn expand_b(&self) -> Vec<String> {
        self.expand(|(_, b)| b)
    }

    fn expand(&self, pick: impl Fn(&(String, String)) -> &String) -> Vec<String> {
        let mut out = Vec::with_capacity(self.n_paired as usize);
        for (key, &count) in &self.cells {
            for _ in 0..count {
                out.push(pick(key).clone());
            }
        }
        out
    }
}

/// Bowker test of marginal symmetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BowkerTest {
    /// Test statistic; `None` for an empty table
    pub chi_squared: Option<f64>,
    /// `1 - chiSquareCdf(statistic, df)`; `None` when df or statistic is 0
    pub p_value: Option<f64>,
    /// `C(c, 2)` over the observed categories
    pub degrees_of_freedom: u64,
}

/// Wilcoxon signed-rank test result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WilcoxonResult {
    /// `min(W+, W-)` over non-zero differences
    pub statistic: Option<f64>,
    /// Two-sided p from the tie-corrected normal approximation
    pub p_value: Option<f64>,
}

/// Sign-flip permutation p-value for the mean of paired differences.
///
/// Each iteration independently flips the sign of every difference with
/// probability 0.5 and counts means at least as extreme as the observed
/// absolute delta. `None` when there are no pairs.
pub fn permutation_p_value<R: RandomSource + ?Sized>(
    deltas: &[f64],
    observed_abs_delta: f64,
    samples: usize,
    rng: &mut R,
) -> Option<f64> {
    if deltas.is_empty() || samples == 0 {
        return None;
    }

    let n = deltas.len() as f64;
    let mut extreme = 0usize;
    for _ in 0..samples {
        let mut sum = 0.0;
        for &d in deltas {
            sum += if rng.flip() { -d } else { d };
        }
        if (sum / n).abs() >= observed_abs_delta {
            extreme += 1;
        }
    }
    Some(extreme as f64 / samples as f64)
}

/// Percentile bootstrap 95% CI for the mean of paired differences;
/// [`crate::DEFAULT_BOOTSTRAP_SAMPLES`] is the usual sample count.
/// `None` on empty input.
pub fn bootstrap_mean_ci<R: RandomSource + ?Sized>(
    deltas: &[f64],
    samples: usize,
    rng: &mut R,
) -> Option<Ci> {
    if deltas.is_empty() || samples == 0 {
        return None;
    }

    let n = deltas.len();
    let mut means = Vec::with_capacity(samples);
    for _ in 0..samples {
        let mut sum = 0.0;
        for _ in 0..n {
            sum += deltas[rng.index(n)];
        }
        means.push(sum / n as f64);
    }
    Some(percentile_bracket(means))
}

/// Bootstrap 95% CI for the difference in one category's proportion
/// between the two sides.
///
/// Resamples A and B index positions independently rather than jointly
/// by pair index, which is an approximation of a paired bootstrap kept
/// for compatibility; use [`newcombe_paired_ci`] where exact pairing
/// matters.
pub fn bootstrap_delta_proportion_ci<R: RandomSource + ?Sized>(
    values_a: &[String],
    values_b: &[String],
    n_paired: usize,
    category: &str,
    samples: usize,
    rng: &mut R,
) -> Option<Ci> {
    bootstrap_delta_rate_ci(
        values_a,
        values_b,
        n_paired,
        |code| code == category,
        samples,
        rng,
    )
}

/// Bootstrap 95% CI for the difference of an arbitrary predicate rate
/// between the two sides (pass rate, tail mass). Same independent
/// resampling caveat as [`bootstrap_delta_proportion_ci`].
pub fn bootstrap_delta_rate_ci<R, F>(
    values_a: &[String],
    values_b: &[String],
    n_paired: usize,
    predicate: F,
    samples: usize,
    rng: &mut R,
) -> Option<Ci>
where
    R: RandomSource + ?Sized,
    F: Fn(&str) -> bool,
{
    if n_paired == 0 || values_a.is_empty() || values_b.is_empty() || samples == 0 {
        return None;
    }

    let nf = n_paired as f64;
    let mut deltas = Vec::with_capacity(samples);
    for _ in 0..samples {
        let mut hits_a = 0u64;
        let mut hits_b = 0u64;
        for _ in 0..n_paired {
            if predicate(&values_a[rng.index(values_a.len())]) {
                hits_a += 1;
            }
            if predicate(&values_b[rng.index(values_b.len())]) {
                hits_b += 1;
            }
        }
        deltas.push(hits_b as f64 / nf - hits_a as f64 / nf);
    }
    Some(percentile_bracket(deltas))
}

/// Student-t 95% CI for a mean difference:
/// `meanDelta +/- t_{0.975, n-1} * stdDelta / sqrt(n)`.
/// `None` when there are no pairs or no spread.
pub fn t_based_ci(mean_delta: f64, std_delta: f64, n: u64) -> Option<Ci> {
    if n == 0 || std_delta <= 0.0 {
        return None;
    }
    let df = n.saturating_sub(1).max(1);
    let half = basic::t_quantile_975(df) * std_delta / (n as f64).sqrt();
    Some(Ci {
        lower: mean_delta - half,
        upper: mean_delta + half,
    })
}

/// Newcombe 95% CI for the difference of two paired proportions
/// (B minus A) from the 2x2 cells `a` = both, `b` = only-A,
/// `c` = only-B, `d` = neither. `None` when the table is empty.
pub fn newcombe_paired_ci(a: u64, b: u64, c: u64, d: u64) -> Option<Ci> {
    let n = a + b + c + d;
    if n == 0 {
        return None;
    }
    let nf = n as f64;

    let yes_a = a + b;
    let yes_b = a + c;
    let p_a = yes_a as f64 / nf;
    let p_b = yes_b as f64 / nf;
    let delta = p_b - p_a;

    let ci_a = basic::wilson_ci(n, yes_a, 0.95);
    let ci_b = basic::wilson_ci(n, yes_b, 0.95);

    // Marginal-correlation correction; zero when any marginal is empty
    let product =
        (yes_a as f64) * ((c + d) as f64) * (yes_b as f64) * ((b + d) as f64);
    let phi = if product == 0.0 {
        0.0
    } else {
        ((a as f64) * (d as f64) - (b as f64) * (c as f64)) / product.sqrt()
    };

    let lower_term = ((p_b - ci_b.lower).powi(2)
        - 2.0 * phi * (p_b - ci_b.lower) * (ci_a.upper - p_a)
        + (ci_a.upper - p_a).powi(2))
    .max(0.0);
    let upper_term = ((ci_b.upper - p_b).powi(2)
        - 2.0 * phi * (ci_b.upper - p_b) * (p_a - ci_a.lower)
        + (p_a - ci_a.lower).powi(2))
    .max(0.0);

    Some(Ci {
        lower: (delta - lower_term.sqrt()).max(-1.0),
        upper: (delta + upper_term.sqrt()).min(1.0),
    })
}

/// Bowker test of marginal symmetry over a paired contingency table.
///
/// Category pairs with no observations in either direction contribute
/// nothing (avoiding 0/0); degrees of freedom count all unordered pairs
/// of observed categories.
pub fn bowker_test(table: &ChangeTable) -> BowkerTest {
    if table.is_empty() {
        return BowkerTest {
            chi_squared: None,
            p_value: None,
            degrees_of_freedom: 0,
        };
    }

    let categories = table.categories();
    let c = categories.len();
    let df = (c * (c - 1) / 2) as u64;

    let mut chi_squared = 0.0;
    for i in 0..c {
        for j in (i + 1)..c {
            let o_ij = table.count(&categories[i], &categories[j]) as f64;
            let o_ji = table.count(&categories[j], &categories[i]) as f64;
            let denom = o_ij + o_ji;
            if denom > 0.0 {
                chi_squared += (o_ij - o_ji).powi(2) / denom;
            }
        }
    }

    let p_value = if df > 0 && chi_squared > 0.0 {
        Some(1.0 - basic::chi_square_cdf(chi_squared, df))
    } else {
        None
    };

    BowkerTest {
        chi_squared: Some(chi_squared),
        p_value,
        degrees_of_freedom: df,
    }
}

/// Cramer's V effect size: `sqrt(chiSquared / (n * df))`.
/// `None` unless both `n` and `df` are positive.
pub fn cramers_v(chi_squared: f64, df: u64, n: u64) -> Option<f64> {
    if n == 0 || df == 0 {
        return None;
    }
    Some((chi_squared / (n as f64 * df as f64)).sqrt())
}

/// Wilcoxon signed-rank test on paired differences.
///
/// Zero differences are dropped; mid-ranks handle ties, and the normal
/// approximation carries the tie correction. All-zero input is a
/// perfect non-result (`statistic` 0, p 1); empty input is null.
pub fn wilcoxon_signed_rank(differences: &[f64]) -> WilcoxonResult {
    if differences.is_empty() {
        return WilcoxonResult {
            statistic: None,
            p_value: None,
        };
    }

    let nonzero: Vec<f64> = differences.iter().copied().filter(|&d| d != 0.0).collect();
    if nonzero.is_empty() {
        return WilcoxonResult {
            statistic: Some(0.0),
            p_value: Some(1.0),
        };
    }

    let mut order: Vec<usize> = (0..nonzero.len()).collect();
    order.sort_by(|&i, &j| {
        nonzero[i]
            .abs()
            .partial_cmp(&nonzero[j].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let n = nonzero.len();
    let mut w_plus = 0.0;
    let mut tie_sum = 0.0;

    let mut i = 0;
    while i < n {
        // group equal magnitudes for mid-ranking
        let mut j = i + 1;
        while j < n && nonzero[order[j]].abs() == nonzero[order[i]].abs() {
            j += 1;
        }
        let tie = (j - i) as f64;
        let mid_rank = (i + 1 + j) as f64 / 2.0;
        for &idx in &order[i..j] {
            if nonzero[idx] > 0.0 {
                w_plus += mid_rank;
            }
        }
        if tie > 1.0 {
            tie_sum += tie.powi(3) - tie;
        }
        i = j;
    }

    let nf = n as f64;
    let total = nf * (nf + 1.0) / 2.0;
    let w_minus = total - w_plus;
    let statistic = w_plus.min(w_minus);

    let mean_w = total / 2.0;
    let var_w = nf * (nf + 1.0) * (2.0 * nf + 1.0) / 24.0 - tie_sum / 48.0;
    if var_w <= 0.0 {
        return WilcoxonResult {
            statistic: Some(statistic),
            p_value: Some(1.0),
        };
    }

    let z = (w_plus - mean_w) / var_w.sqrt();
    let p = (2.0 * (1.0 - basic::normal_cdf(z.abs()))).clamp(0.0, 1.0);

    WilcoxonResult {
        statistic: Some(statistic),
        p_value: Some(p),
    }
}

/// Cliff's delta over paired differences:
/// `(countPositive - countNegative) / n`. `None` when empty.
pub fn cliffs_delta(differences: &[f64]) -> Option<f64> {
    if differences.is_empty() {
        return None;
    }
    let positive = differences.iter().filter(|&&d| d > 0.0).count() as f64;
    let negative = differences.iter().filter(|&&d| d < 0.0).count() as f64;
    Some((positive - negative) / differences.len() as f64)
}

/// Probability that the B side exceeds the A side:
/// `countPositive / n`. `None` when empty.
pub fn probability_of_superiority(differences: &[f64]) -> Option<f64> {
    if differences.is_empty() {
        return None;
    }
    let positive = differences.iter().filter(|&&d| d > 0.0).count() as f64;
    Some(positive / differences.len() as f64)
}

/// 2.5th/97.5th percentile bracket of a bootstrap distribution
fn percentile_bracket(mut samples: Vec<f64>) -> Ci {
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let len = samples.len();
    let lower_idx = ((len as f64 * 0.025).floor() as usize).min(len - 1);
    let upper_idx = ((len as f64 * 0.975).floor() as usize).min(len - 1);
    Ci {
        lower: samples[lower_idx],
        upper: samples[upper_idx],
    }
}
