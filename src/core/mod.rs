//! Latent state, the shared trial transition, subject replay, likelihood
//! aggregation, predictive generation and the sampler-facing density.

pub mod likelihood;
pub mod posterior;
pub mod predictive;
pub mod state;
pub mod subject;
pub mod trial;

use serde::{Deserialize, Serialize};

use crate::params::CdfKind;

/// Evaluation settings shared by fitting and predictive passes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Standard-normal CDF used by the bounded transforms.
    pub cdf: CdfKind,

    /// Replay subjects on the rayon pool.
    pub parallel: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            cdf: CdfKind::Exact,
            parallel: true,
        }
    }
}
