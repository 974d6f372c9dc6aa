//! Bayesian scoring of one interval.
//!
//! All matrices are `datasets x positions`, aligned with
//! [PerDatasetArrays](crate::arrays::PerDatasetArrays).

use ndarray::{Array1, Array2, Zip};

use crate::models::BetaPrior;

/// Ratios are kept strictly inside (0, 1) before entering the beta update.
const RATIO_EPSILON: f64 = 1e-6;

///
/// Prior probability of protection at each position.
///
/// Every position gets a Laplace-smoothed share of datasets that are present
/// and significant there: `(k + 1) / (n + 2)`, with `n` the datasets present
/// (`w = 1`) and `k` those of them with `fdr <= cutoff`. The value is the
/// same for every dataset row.
///
pub fn prior_weighted(fdr: &Array2<f64>, w: &Array2<f64>, cutoff: f64) -> Array2<f64> {
    let mut prior = Array2::zeros(fdr.raw_dim());

    for j in 0..fdr.ncols() {
        let mut present = 0.0;
        let mut significant = 0.0;
        for d in 0..fdr.nrows() {
            present += w[[d, j]];
            if fdr[[d, j]] <= cutoff {
                significant += w[[d, j]];
            }
        }
        prior
            .column_mut(j)
            .fill((significant + 1.0) / (present + 2.0));
    }

    prior
}

///
/// Expected fraction of the background cleavage left under protection.
///
/// Significant, present positions contribute their observed/expected ratio
/// `(obs + 1) / (exp + 1)` to a beta update of each dataset's prior; the
/// posterior mean `a / (a + b)` is the scale applied to the expectation in
/// the "on" likelihood. Without evidence this is the prior mean.
///
pub fn delta_prior(
    obs: &Array2<f64>,
    exp: &Array2<f64>,
    fdr: &Array2<f64>,
    w: &Array2<f64>,
    priors: &[BetaPrior],
    cutoff: f64,
) -> Array2<f64> {
    let mut delta = Array2::zeros(obs.raw_dim());

    for j in 0..obs.ncols() {
        let mut ratio_sum = 0.0;
        let mut n = 0.0;
        for d in 0..obs.nrows() {
            if w[[d, j]] != 0.0 && fdr[[d, j]] <= cutoff {
                let ratio = (obs[[d, j]] + 1.0) / (exp[[d, j]] + 1.0);
                ratio_sum += ratio.clamp(RATIO_EPSILON, 1.0 - RATIO_EPSILON);
                n += 1.0;
            }
        }

        for (d, prior) in priors.iter().enumerate().take(obs.nrows()) {
            let a = prior.alpha + ratio_sum;
            let b = prior.beta + (n - ratio_sum);
            delta[[d, j]] = a / (a + b);
        }
    }

    delta
}

/// `ln(e^a + e^b)` without overflow.
pub fn logaddexp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY && b == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let m = a.max(b);
    m + ((a - m).exp() + (b - m).exp()).ln()
}

///
/// Posterior evidence for protection, per dataset and position.
///
/// `score = ln(pi * L_on + (1 - pi) * L_off) - ln(L_off)`, the log of how
/// much better the prior-weighted mixture explains the counts than the
/// no-effect model alone. Scores at or below 0 are clamped to exactly 0;
/// undefined scores stay NaN.
///
pub fn log_posterior(
    prior: &Array2<f64>,
    ll_on: &Array2<f64>,
    ll_off: &Array2<f64>,
) -> Array2<f64> {
    Zip::from(prior)
        .and(ll_on)
        .and(ll_off)
        .map_collect(|&pi, &on, &off| clamp_score(mixture_log_ratio(pi, on - off)))
}

/// `ln(pi * e^d + 1 - pi)` for a log-likelihood difference `d`; exactly 0 when `d == 0`.
fn mixture_log_ratio(pi: f64, d: f64) -> f64 {
    if d.is_nan() {
        f64::NAN
    } else if d == f64::INFINITY {
        f64::INFINITY
    } else if d < 30.0 {
        (pi * d.exp_m1()).ln_1p()
    } else {
        logaddexp(pi.ln() + d, (1.0 - pi).ln())
    }
}

/// Scores at or below 0 carry no evidence.
pub fn clamp_score(score: f64) -> f64 {
    if score <= 0.0 { 0.0 } else { score }
}

///
/// Maximum score at each position across datasets, ignoring NaN. A position
/// where every dataset is NaN stays NaN.
///
pub fn nanmax_by_position(scores: &Array2<f64>) -> Array1<f64> {
    Array1::from_iter(scores.columns().into_iter().map(|col| {
        col.iter()
            .filter(|v| !v.is_nan())
            .fold(f64::NAN, |acc, &v| if acc.is_nan() { v } else { acc.max(v) })
    }))
}

///
/// Offsets whose best score strictly exceeds `threshold`.
///
pub fn select_positions(maxes: &Array1<f64>, threshold: f64) -> Vec<usize> {
    maxes
        .iter()
        .enumerate()
        .filter(|(_, v)| **v > threshold)
        .map(|(j, _)| j)
        .collect()
}
