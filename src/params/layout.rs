//! Flat unconstrained parameter vector exchanged with an external sampler.
//!
//! Layout (`N` subjects):
//!
//! ```text
//! [ μ(4) | log σ(4) | log σ_m | β_h(N) | z(N × 4, subject-major) ]
//! ```
//!
//! Scales are sampled on the log scale; [`ParameterLayout::unpack`] returns
//! the log-Jacobian of that change of variables.

use ndarray::{Array1, Array2};

use crate::config::N_POOLED;
use crate::error::{ModelError, Result};

use super::draw::{HyperParams, ModelParams};
use super::transform::Pooled;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParameterLayout {
    pub n_subjects: usize,
}

impl ParameterLayout {
    pub fn new(n_subjects: usize) -> Self {
        Self { n_subjects }
    }

    const MU: usize = 0;
    const LOG_SIGMA: usize = N_POOLED;
    const LOG_NOISE: usize = 2 * N_POOLED;
    const BIAS: usize = 2 * N_POOLED + 1;

    fn raw_offset(&self) -> usize {
        Self::BIAS + self.n_subjects
    }

    /// Length of the flat vector.
    pub fn dim(&self) -> usize {
        self.raw_offset() + self.n_subjects * N_POOLED
    }

    /// Names of each coordinate, 1-based subject indices.
    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.dim());
        for p in Pooled::ALL {
            names.push(format!("mu_{}", p.name()));
        }
        for p in Pooled::ALL {
            names.push(format!("log_sigma_{}", p.name()));
        }
        names.push("log_sigma_m".to_string());
        for i in 0..self.n_subjects {
            names.push(format!("beta_h[{}]", i + 1));
        }
        for i in 0..self.n_subjects {
            for p in Pooled::ALL {
                names.push(format!("{}_raw[{}]", p.name(), i + 1));
            }
        }
        names
    }

    /// Flatten a parameter draw.
    pub fn pack(&self, params: &ModelParams) -> Result<Vec<f64>> {
        if params.n_subjects() != self.n_subjects {
            return Err(ModelError::ShapeMismatch {
                what: "params",
                expected: vec![self.n_subjects],
                found: vec![params.n_subjects()],
            });
        }
        params.validate()?;

        let mut x = Vec::with_capacity(self.dim());
        x.extend_from_slice(&params.hyper.mu);
        x.extend(params.hyper.sigma.iter().map(|s| s.ln()));
        x.push(params.mood_noise.ln());
        x.extend(params.mood_bias.iter().copied());
        x.extend(params.raw.iter().copied());
        Ok(x)
    }

    /// Rebuild a parameter draw from a flat vector.
    ///
    /// Returns the draw and `log |d constrained / d unconstrained|`.
    pub fn unpack(&self, x: &[f64]) -> Result<(ModelParams, f64)> {
        if x.len() != self.dim() {
            return Err(ModelError::ShapeMismatch {
                what: "unconstrained vector",
                expected: vec![self.dim()],
                found: vec![x.len()],
            });
        }

        let mut hyper = HyperParams::default();
        hyper.mu.copy_from_slice(&x[Self::MU..Self::MU + N_POOLED]);
        let log_sigma = &x[Self::LOG_SIGMA..Self::LOG_SIGMA + N_POOLED];
        for (s, &ls) in hyper.sigma.iter_mut().zip(log_sigma) {
            *s = ls.exp();
        }
        let log_noise = x[Self::LOG_NOISE];

        let mood_bias = Array1::from(x[Self::BIAS..self.raw_offset()].to_vec());
        let raw = Array2::from_shape_vec(
            (self.n_subjects, N_POOLED),
            x[self.raw_offset()..].to_vec(),
        )
        .map_err(|_| ModelError::ShapeMismatch {
            what: "raw",
            expected: vec![self.n_subjects, N_POOLED],
            found: vec![x.len() - self.raw_offset()],
        })?;

        let log_jacobian = log_sigma.iter().sum::<f64>() + log_noise;
        let params = ModelParams {
            hyper,
            raw,
            mood_bias,
            mood_noise: log_noise.exp(),
        };
        Ok((params, log_jacobian))
    }
}
