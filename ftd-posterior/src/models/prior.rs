use std::fs;
use std::path::Path;

use crate::errors::ModelError;

///
/// Beta prior `(alpha, beta)` on the magnitude of a true protection effect.
/// Defaults to the uniform `(1, 1)`.
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaPrior {
    pub alpha: f64,
    pub beta: f64,
}

impl Default for BetaPrior {
    fn default() -> Self {
        BetaPrior {
            alpha: 1.0,
            beta: 1.0,
        }
    }
}

impl BetaPrior {
    pub fn new(alpha: f64, beta: f64) -> Self {
        BetaPrior { alpha, beta }
    }

    ///
    /// Read a prior file: a single line `alpha<TAB>beta`.
    ///
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let contents = fs::read_to_string(path)?;
        let invalid = |reason: String| ModelError::InvalidBetaPrior {
            path: path.to_owned(),
            reason,
        };

        let line = contents
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| invalid("file is empty".to_string()))?;

        let values = line
            .trim()
            .split('\t')
            .map(|v| {
                v.trim()
                    .parse::<f64>()
                    .map_err(|e| invalid(format!("'{}': {}", v, e)))
            })
            .collect::<Result<Vec<f64>, ModelError>>()?;

        let [alpha, beta] = values[..] else {
            return Err(invalid(format!("expected 2 values, found {}", values.len())));
        };

        if !(alpha.is_finite() && alpha > 0.0 && beta.is_finite() && beta > 0.0) {
            return Err(invalid(format!(
                "parameters must be positive, got ({}, {})",
                alpha, beta
            )));
        }

        Ok(BetaPrior { alpha, beta })
    }

    /// Mean of the distribution, `alpha / (alpha + beta)`.
    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }
}
