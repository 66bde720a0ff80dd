//! Hierarchical prior over group hyper-parameters and subject deviations.
//!
//! ```text
//! μ_k   ~ Normal(0, location_sd)
//! σ_k   ~ Gamma(mode = scale_mode, sd = scale_sd)
//! z_ik  ~ Normal(0, 1)
//! β_h,i ~ Normal(0, 1)
//! σ_m   ~ Gamma(mode = noise_mode, sd = noise_sd)
//! ```

use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::{Distribution, Gamma, Normal};
use serde::{Deserialize, Serialize};
use statrs::function::gamma::ln_gamma;

use crate::config::N_POOLED;
use crate::error::{ModelError, Result};

use super::draw::{HyperParams, ModelParams};

const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Normal log-density.
pub fn normal_lpdf(x: f64, mu: f64, sd: f64) -> f64 {
    let z = (x - mu) / sd;
    -LN_SQRT_2PI - sd.ln() - 0.5 * z * z
}

/// Gamma log-density with shape/rate parameterisation. `-inf` outside the support.
pub fn gamma_lpdf(x: f64, shape: f64, rate: f64) -> f64 {
    if !(x > 0.0) {
        return f64::NEG_INFINITY;
    }
    shape * rate.ln() - ln_gamma(shape) + (shape - 1.0) * x.ln() - rate * x
}

/// Convert a Gamma prior given by (mode, sd) into (shape, rate).
pub fn to_shape_rate(mode: f64, sd: f64) -> (f64, f64) {
    let rate = (mode + (mode * mode + 4.0 * sd * sd).sqrt()) / (2.0 * sd * sd);
    let shape = 1.0 + mode * rate;
    (shape, rate)
}

/// Prior hyper-hyper-parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorConfig {
    /// Standard deviation of the group locations.
    pub location_sd: f64,
    /// Mode of the group-scale Gamma prior.
    pub scale_mode: f64,
    /// Standard deviation of the group-scale Gamma prior.
    pub scale_sd: f64,
    /// Mode of the mood-noise Gamma prior.
    pub noise_mode: f64,
    /// Standard deviation of the mood-noise Gamma prior.
    pub noise_sd: f64,
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            location_sd: 1.0,
            scale_mode: 0.5,
            scale_sd: 0.5,
            noise_mode: 0.2,
            noise_sd: 0.2,
        }
    }
}

/// The group-level distribution subject parameters are drawn from.
#[derive(Clone, Debug, Default)]
pub struct HierarchicalPrior {
    pub config: PriorConfig,
}

impl HierarchicalPrior {
    pub fn new(config: PriorConfig) -> Result<Self> {
        let c = &config;
        for (name, value) in [
            ("location_sd", c.location_sd),
            ("scale_mode", c.scale_mode),
            ("scale_sd", c.scale_sd),
            ("noise_mode", c.noise_mode),
            ("noise_sd", c.noise_sd),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ModelError::InvalidParameter {
                    name: name.to_string(),
                    value,
                    reason: "prior settings must be finite and > 0",
                });
            }
        }
        Ok(Self { config })
    }

    fn scale_shape_rate(&self) -> (f64, f64) {
        to_shape_rate(self.config.scale_mode, self.config.scale_sd)
    }

    fn noise_shape_rate(&self) -> (f64, f64) {
        to_shape_rate(self.config.noise_mode, self.config.noise_sd)
    }

    /// Joint prior log-density of a parameter draw (constrained scale).
    pub fn log_density(&self, params: &ModelParams) -> f64 {
        let (s_shape, s_rate) = self.scale_shape_rate();
        let (n_shape, n_rate) = self.noise_shape_rate();

        let mut lp = 0.0;
        for k in 0..N_POOLED {
            lp += normal_lpdf(params.hyper.mu[k], 0.0, self.config.location_sd);
            lp += gamma_lpdf(params.hyper.sigma[k], s_shape, s_rate);
        }
        lp += gamma_lpdf(params.mood_noise, n_shape, n_rate);
        lp += params.raw.iter().map(|&z| normal_lpdf(z, 0.0, 1.0)).sum::<f64>();
        lp += params
            .mood_bias
            .iter()
            .map(|&b| normal_lpdf(b, 0.0, 1.0))
            .sum::<f64>();
        lp
    }

    /// Draw a full parameter set for `n_subjects` subjects.
    pub fn sample<R: Rng + ?Sized>(&self, n_subjects: usize, rng: &mut R) -> Result<ModelParams> {
        let (s_shape, s_rate) = self.scale_shape_rate();
        let (n_shape, n_rate) = self.noise_shape_rate();

        let location = normal(0.0, self.config.location_sd)?;
        let scale = gamma(s_shape, s_rate)?;
        let noise = gamma(n_shape, n_rate)?;
        let standard = normal(0.0, 1.0)?;

        let mut hyper = HyperParams::default();
        for k in 0..N_POOLED {
            hyper.mu[k] = location.sample(rng);
            hyper.sigma[k] = scale.sample(rng);
        }
        let raw = Array2::from_shape_simple_fn((n_subjects, N_POOLED), || standard.sample(rng));
        let mood_bias = Array1::from_shape_simple_fn(n_subjects, || standard.sample(rng));

        Ok(ModelParams {
            hyper,
            raw,
            mood_bias,
            mood_noise: noise.sample(rng),
        })
    }
}

fn normal(mean: f64, sd: f64) -> Result<Normal<f64>> {
    Normal::new(mean, sd).map_err(|_| ModelError::InvalidParameter {
        name: "normal.sd".to_string(),
        value: sd,
        reason: "not a valid standard deviation",
    })
}

fn gamma(shape: f64, rate: f64) -> Result<Gamma<f64>> {
    Gamma::new(shape, 1.0 / rate).map_err(|_| ModelError::InvalidParameter {
        name: "gamma.shape".to_string(),
        value: shape,
        reason: "not a valid Gamma shape/rate",
    })
}
