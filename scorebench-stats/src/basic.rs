//! Basic Statistical Formulas
//!
//! Shared numeric kernels for the summary calculators and the comparison
//! toolkit: moments, interpolated percentiles, Shannon entropy, Wilson
//! score intervals, and rational approximations for the normal,
//! chi-square and Student-t distributions.

use serde::{Deserialize, Serialize};

/// Confidence interval bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ci {
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
}

/// Arithmetic mean; `0.0` for an empty slice
pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population variance (n denominator); `0.0` when fewer than two samples
pub fn population_variance(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64
}

/// Sample variance (n-1 denominator); `0.0` when fewer than two samples
pub fn sample_variance(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64
}

/// Sample standard deviation
pub fn std_dev(xs: &[f64]) -> f64 {
    sample_variance(xs).sqrt()
}

/// Percentile of an already-sorted sample via linear interpolation
/// between nearest ranks.
///
/// A single sample is returned for any `p`. Panics on an empty slice:
/// a percentile of nothing is a caller bug, not a data condition.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    assert!(
        !sorted.is_empty(),
        "percentile requires at least one sample"
    );
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }

    let pos = (p / 100.0) * (n - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = (lower + 1).min(n - 1);
    let weight = pos - lower as f64;

    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// Shannon entropy in bits of a probability vector.
///
/// Zero-probability terms contribute nothing (`0 * log2(0) == 0`).
pub fn entropy(proportions: &[f64]) -> f64 {
    -proportions
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| p * p.log2())
        .sum::<f64>()
}

/// Wilson score interval for a binomial proportion.
///
/// `confidence` selects the z value (0.95 and 0.99 supported; anything
/// else falls back to 1.96). Returns `{0, 0}` when `n == 0`; bounds are
/// clamped to `[0, 1]`.
pub fn wilson_ci(n: u64, successes: u64, confidence: f64) -> Ci {
    if n == 0 {
        return Ci {
            lower: 0.0,
            upper: 0.0,
        };
    }
    debug_assert!(successes <= n, "successes cannot exceed trials");

    let z = if (confidence - 0.99).abs() < 1e-9 {
        2.576
    } else {
        1.96
    };

    let nf = n as f64;
    let p = successes as f64 / nf;
    let z2 = z * z;
    let denom = 1.0 + z2 / nf;
    let center = (p + z2 / (2.0 * nf)) / denom;
    let half = z * (p * (1.0 - p) / nf + z2 / (4.0 * nf * nf)).sqrt() / denom;

    Ci {
        lower: (center - half).clamp(0.0, 1.0),
        upper: (center + half).clamp(0.0, 1.0),
    }
}

/// Coarse two-sided 97.5th-percentile Student-t critical value, bucketed
/// by sample size. An approximation, not an inverse CDF.
pub fn t_critical(n: u64) -> f64 {
    match n {
        n if n >= 30 => 1.96,
        n if n >= 20 => 2.086,
        n if n >= 15 => 2.131,
        n if n >= 10 => 2.228,
        n if n >= 5 => 2.571,
        n if n >= 3 => 3.182,
        _ => 4.303,
    }
}

/// Error function approximation
pub fn erf(x: f64) -> f64 {
    // Abramowitz and Stegun approximation (7.1.26), max error ~1.5e-7
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x >= 0.0 { 1.0 } else { -1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

/// Standard normal CDF
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Standard normal quantile (inverse CDF)
pub fn normal_quantile(p: f64) -> f64 {
    // Abramowitz and Stegun rational approximation (26.2.23)
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let p = p.clamp(1e-10, 1.0 - 1e-10);
    let sign = if p < 0.5 { -1.0 } else { 1.0 };
    let p = if p < 0.5 { p } else { 1.0 - p };

    let t = (-2.0 * p.ln()).sqrt();

    let c0 = 2.515517;
    let c1 = 0.802853;
    let c2 = 0.010328;
    let d1 = 1.432788;
    let d2 = 0.189269;
    let d3 = 0.001308;

    let x = t - (c0 + c1 * t + c2 * t * t) / (1.0 + d1 * t + d2 * t * t + d3 * t * t * t);

    sign * x
}

/// Chi-square CDF with `df` degrees of freedom.
///
/// Computed as the regularized lower incomplete gamma P(df/2, x/2).
pub fn chi_square_cdf(x: f64, df: u64) -> f64 {
    if df == 0 || x <= 0.0 {
        return 0.0;
    }
    lower_regularized_gamma(df as f64 / 2.0, x / 2.0)
}

/// Two-sided 97.5th-percentile Student-t quantile.
///
/// Exact small-df values for df < 5, a Cornish-Fisher expansion from the
/// normal quantile above that (accurate to ~1e-4 in this range).
pub fn t_quantile_975(df: u64) -> f64 {
    match df {
        0 | 1 => 12.706,
        2 => 4.303,
        3 => 3.182,
        4 => 2.776,
        _ => {
            let z = 1.959_963_984_540_054_f64;
            let v = df as f64;
            let z3 = z.powi(3);
            let z5 = z.powi(5);
            let z7 = z.powi(7);
            let z9 = z.powi(9);
            z + (z3 + z) / (4.0 * v)
                + (5.0 * z5 + 16.0 * z3 + 3.0 * z) / (96.0 * v * v)
                + (3.0 * z7 + 19.0 * z5 + 17.0 * z3 - 15.0 * z) / (384.0 * v.powi(3))
                + (79.0 * z9 + 776.0 * z7 + 1482.0 * z5 - 1920.0 * z3 - 945.0 * z)
                    / (92160.0 * v.powi(4))
        }
    }
}

/// Natural log of the gamma function (Lanczos approximation, g = 7)
fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 8] = [
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];

    if x < 0.5 {
        // Reflection formula
        return (std::f64::consts::PI / (std::f64::consts::PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut a = 0.99999999999980993;
    for (i, &c) in COEFFS.iter().enumerate() {
        a += c / (x + (i + 1) as f64);
    }
    let t = x + 7.5;

    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

/// Regularized lower incomplete gamma P(a, x).
///
/// Series expansion for x < a + 1, continued fraction for the upper tail
/// otherwise (both converge rapidly in that split).
fn lower_regularized_gamma(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    let prefix = (-x + a * x.ln() - ln_gamma(a)).exp();

    if x < a + 1.0 {
        let mut ap = a;
        let mut term = 1.0 / a;
        let mut sum = term;
        for _ in 0..200 {
            ap += 1.0;
            term *= x / ap;
            sum += term;
            if term.abs() < sum.abs() * 1e-12 {
                break;
            }
        }
        (prefix * sum).clamp(0.0, 1.0)
    } else {
        let mut b = x + 1.0 - a;
        let mut c = 1e300;
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 1..200 {
            let an = -(i as f64) * (i as f64 - a);
            b += 2.0;
            d = an * d + b;
            if d.abs() < 1e-300 {
                d = 1e-300;
            }
            c = b + an / c;
            if c.abs() < 1e-300 {
                c = 1e-300;
            }
            d = 1.0 / d;
            let del = d * c;
            h *= del;
            if (del - 1.0).abs() < 1e-12 {
                break;
            }
        }
        (1.0 - prefix * h).clamp(0.0, 1.0)
    }
}
