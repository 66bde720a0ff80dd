//! Log-density contract exposed to an external sampler.
//!
//! [`Posterior`] owns the data, prior and configuration and evaluates the
//! unnormalised log posterior of a flat unconstrained vector. Evaluation
//! takes `&self` and holds no mutable state, so several chains may share one
//! instance across threads.

use serde::{Deserialize, Serialize};

use crate::data::TaskData;
use crate::error::{ModelError, Result};
use crate::params::{HierarchicalPrior, ModelParams, ParameterLayout};

use super::likelihood::{log_likelihood, LikelihoodBreakdown};
use super::ModelConfig;

/// A target density over an unconstrained real vector.
pub trait LogDensity: Sync {
    /// Dimension of the unconstrained vector.
    fn dim(&self) -> usize;

    /// Name of each coordinate.
    fn parameter_names(&self) -> Vec<String>;

    /// Unnormalised log-density, including any change-of-variables term.
    fn log_density(&self, x: &[f64]) -> Result<f64>;
}

/// Prior, likelihood and Jacobian terms of one evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DensityBreakdown {
    pub log_prior: f64,
    pub log_likelihood: LikelihoodBreakdown,
    pub log_jacobian: f64,
}

impl DensityBreakdown {
    pub fn total(&self) -> f64 {
        self.log_prior + self.log_likelihood.total() + self.log_jacobian
    }
}

/// The hierarchical model conditioned on one dataset.
pub struct Posterior {
    pub data: TaskData,
    pub prior: HierarchicalPrior,
    pub config: ModelConfig,
    layout: ParameterLayout,
}

impl Posterior {
    pub fn new(data: TaskData, prior: HierarchicalPrior, config: ModelConfig) -> Self {
        let layout = ParameterLayout::new(data.n_subjects());
        Self {
            data,
            prior,
            config,
            layout,
        }
    }

    pub fn layout(&self) -> &ParameterLayout {
        &self.layout
    }

    /// Evaluate a parameter draw on the constrained scale (no Jacobian).
    pub fn evaluate(&self, params: &ModelParams) -> Result<DensityBreakdown> {
        let log_likelihood = log_likelihood(params, &self.data, &self.config)?;
        let log_prior = self.prior.log_density(params);
        if !log_prior.is_finite() {
            return Err(ModelError::NonFiniteDensity {
                value: log_prior,
                context: "log-prior".to_string(),
            });
        }
        Ok(DensityBreakdown {
            log_prior,
            log_likelihood,
            log_jacobian: 0.0,
        })
    }

    /// Evaluate a flat unconstrained vector with its full breakdown.
    pub fn evaluate_unconstrained(&self, x: &[f64]) -> Result<DensityBreakdown> {
        let (params, log_jacobian) = self.layout.unpack(x)?;
        let mut breakdown = self.evaluate(&params)?;
        breakdown.log_jacobian = log_jacobian;
        Ok(breakdown)
    }
}

impl LogDensity for Posterior {
    fn dim(&self) -> usize {
        self.layout.dim()
    }

    fn parameter_names(&self) -> Vec<String> {
        self.layout.names()
    }

    fn log_density(&self, x: &[f64]) -> Result<f64> {
        let total = self.evaluate_unconstrained(x)?.total();
        if !total.is_finite() {
            return Err(ModelError::NonFiniteDensity {
                value: total,
                context: "log posterior".to_string(),
            });
        }
        Ok(total)
    }
}
