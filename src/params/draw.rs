//! One full parameter draw: group hyper-parameters plus subject-level values.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::config::N_POOLED;
use crate::error::{ModelError, Result};

use super::transform::{CdfKind, GroupSummary, Pooled, SubjectParams};

/// Group-level location and scale of each pooled parameter (unconstrained scale).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HyperParams {
    /// Locations μ, ordered as [`Pooled::ALL`].
    pub mu: [f64; N_POOLED],
    /// Positive scales σ, ordered as [`Pooled::ALL`].
    pub sigma: [f64; N_POOLED],
}

impl Default for HyperParams {
    fn default() -> Self {
        Self {
            mu: [0.0; N_POOLED],
            sigma: [1.0; N_POOLED],
        }
    }
}

/// Everything the likelihood needs for one evaluation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelParams {
    pub hyper: HyperParams,

    /// Standard-normal subject deviations: N × 4.
    pub raw: Array2<f64>,

    /// Unpooled baseline mood bias β_h: N.
    pub mood_bias: Array1<f64>,

    /// Shared noise scale σ_m of the mood ratings.
    pub mood_noise: f64,
}

impl ModelParams {
    /// All subjects at the group mean with zero bias.
    pub fn at_group_mean(hyper: HyperParams, n_subjects: usize, mood_noise: f64) -> Self {
        Self {
            hyper,
            raw: Array2::zeros((n_subjects, N_POOLED)),
            mood_bias: Array1::zeros(n_subjects),
            mood_noise,
        }
    }

    pub fn n_subjects(&self) -> usize {
        self.mood_bias.len()
    }

    /// Check shapes and the positivity of every scale.
    pub fn validate(&self) -> Result<()> {
        let n = self.n_subjects();
        if self.raw.dim() != (n, N_POOLED) {
            return Err(ModelError::ShapeMismatch {
                what: "raw",
                expected: vec![n, N_POOLED],
                found: self.raw.shape().to_vec(),
            });
        }
        for param in Pooled::ALL {
            let k = param.index();
            let mu = self.hyper.mu[k];
            if !mu.is_finite() {
                return Err(ModelError::InvalidParameter {
                    name: format!("mu_{}", param.name()),
                    value: mu,
                    reason: "must be finite",
                });
            }
            let sigma = self.hyper.sigma[k];
            if !(sigma > 0.0 && sigma.is_finite()) {
                return Err(ModelError::InvalidParameter {
                    name: format!("sigma_{}", param.name()),
                    value: sigma,
                    reason: "must be finite and > 0",
                });
            }
        }
        if !(self.mood_noise > 0.0 && self.mood_noise.is_finite()) {
            return Err(ModelError::InvalidParameter {
                name: "sigma_m".to_string(),
                value: self.mood_noise,
                reason: "must be finite and > 0",
            });
        }
        if let Some((i, &z)) = self.raw.iter().enumerate().find(|(_, z)| !z.is_finite()) {
            return Err(ModelError::InvalidParameter {
                name: format!("raw[{}]", i + 1),
                value: z,
                reason: "must be finite",
            });
        }
        Ok(())
    }

    /// Transformed parameters of subject `i` (zero-based).
    pub fn subject(&self, i: usize, cdf: CdfKind) -> SubjectParams {
        let mut linear = [0.0; N_POOLED];
        for (k, slot) in linear.iter_mut().enumerate() {
            *slot = self.hyper.mu[k] + self.hyper.sigma[k] * self.raw[[i, k]];
        }
        SubjectParams::from_unconstrained(&linear, self.mood_bias[i], cdf)
    }

    /// Transformed parameters of every subject.
    pub fn transform(&self, cdf: CdfKind) -> Vec<SubjectParams> {
        (0..self.n_subjects()).map(|i| self.subject(i, cdf)).collect()
    }

    /// Population means of the transformed parameters.
    pub fn group_summary(&self, cdf: CdfKind) -> GroupSummary {
        GroupSummary::from_locations(&self.hyper.mu, cdf)
    }
}
