//! Dispersion models map an (observed, expected) cleavage count pair to a
//! log-likelihood under a negative-binomial noise model.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use statrs::function::gamma::ln_gamma;

use crate::errors::ModelError;

/// Per-dataset noise model queried by processors. Implementations are shared
/// read-only across all processor threads.
pub trait DispersionModel: Send + Sync {
    /// Log probability of `observed` given `expected`, with the expectation
    /// scaled by `scale` (1.0 means "no effect").
    fn log_pmf(&self, observed: f64, expected: f64, scale: f64) -> f64;

    ///
    /// Windowed log-likelihood for every position of one dataset row.
    ///
    /// Position `j` sums the per-position log pmf over
    /// `[j - window_radius, j + window_radius]`, clipped to the row.
    /// Without a `scale`, every position uses 1.0.
    ///
    fn log_likelihood(
        &self,
        observed: ArrayView1<f64>,
        expected: ArrayView1<f64>,
        scale: Option<ArrayView1<f64>>,
        window_radius: usize,
    ) -> Array1<f64> {
        let n = observed.len();
        let per_position: Vec<f64> = (0..n)
            .map(|j| {
                let s = scale.as_ref().map_or(1.0, |s| s[j]);
                self.log_pmf(observed[j], expected[j], s)
            })
            .collect();

        Array1::from_iter((0..n).map(|j| {
            let lo = j.saturating_sub(window_radius);
            let hi = (j + window_radius + 1).min(n);
            per_position[lo..hi].iter().sum::<f64>()
        }))
    }
}

///
/// Table-driven negative binomial model.
///
/// `mu[e]` and `r[e]` hold the fitted mean and size for an integer expected
/// count `e`; past the end of the tables both are extrapolated linearly from
/// `mu_params`/`r_params` (`[intercept, slope]`).
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegativeBinomialModel {
    pub mu: Vec<f64>,
    pub r: Vec<f64>,
    pub mu_params: [f64; 2],
    pub r_params: [f64; 2],
}

impl NegativeBinomialModel {
    pub fn from_json_file(path: &Path) -> Result<Self, ModelError> {
        let file = File::open(path)?;
        let model: NegativeBinomialModel = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ModelError::InvalidDispersionModel {
                path: path.to_owned(),
                reason: e.to_string(),
            })?;

        if model.mu.len() != model.r.len() {
            return Err(ModelError::InvalidDispersionModel {
                path: path.to_owned(),
                reason: format!(
                    "mu and r tables differ in length ({} vs {})",
                    model.mu.len(),
                    model.r.len()
                ),
            });
        }

        Ok(model)
    }

    fn table_index(&self, expected: f64) -> Option<usize> {
        if !expected.is_finite() || expected < 0.0 {
            return None;
        }
        let idx = expected.round() as usize;
        (idx < self.mu.len()).then_some(idx)
    }

    /// Negative binomial mean for an expected count.
    pub fn mu(&self, expected: f64) -> f64 {
        match self.table_index(expected) {
            Some(i) => self.mu[i],
            None => self.mu_params[0] + self.mu_params[1] * expected,
        }
    }

    /// Negative binomial size (dispersion) for an expected count.
    pub fn r(&self, expected: f64) -> f64 {
        match self.table_index(expected) {
            Some(i) => self.r[i],
            None => self.r_params[0] + self.r_params[1] * expected,
        }
    }
}

impl DispersionModel for NegativeBinomialModel {
    fn log_pmf(&self, observed: f64, expected: f64, scale: f64) -> f64 {
        nb_log_pmf(observed, self.mu(expected) * scale, self.r(expected))
    }
}

///
/// Log pmf of a negative binomial with mean `mu` and size `r` at `k`.
///
/// A zero mean puts all mass on zero. Non-positive or non-finite sizes are
/// undefined and yield NaN.
///
pub fn nb_log_pmf(k: f64, mu: f64, r: f64) -> f64 {
    if !(r.is_finite() && r > 0.0) || !mu.is_finite() || mu < 0.0 || k < 0.0 {
        return f64::NAN;
    }
    if mu == 0.0 {
        return if k == 0.0 { 0.0 } else { f64::NEG_INFINITY };
    }

    let denom = r + mu;
    ln_gamma(k + r) - ln_gamma(r) - ln_gamma(k + 1.0) + r * (r / denom).ln() + k * (mu / denom).ln()
}
