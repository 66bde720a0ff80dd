//! Non-centered parameter transform.
//!
//! Maps group locations/scales plus per-subject standard-normal draws onto
//! bounded subject parameters:
//!
//! ```text
//! β   = 20 · Φ(μ_β + σ_β · z_β)        ∈ (0, 20)
//! η_v = Φ(μ_v + σ_v · z_v)             ∈ (0, 1)
//! η_h = Φ(μ_h + σ_h · z_h)             ∈ (0, 1)
//! f   = exp(0.5 · (μ_f + σ_f · z_f))   > 0
//! ```
//!
//! The baseline mood bias β_h is not pooled and passes through unchanged.

use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;

use crate::config::{BETA_MAX, N_POOLED};
use crate::error::{ModelError, Result};

/// Which standard-normal CDF backs the bounded transforms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CdfKind {
    /// erf-based Φ.
    #[default]
    Exact,
    /// Logistic approximation (Bowling et al. 2009), as in Stan's `Phi_approx`.
    Approx,
}

impl CdfKind {
    pub fn eval(self, x: f64) -> f64 {
        match self {
            CdfKind::Exact => phi(x),
            CdfKind::Approx => phi_approx(x),
        }
    }
}

/// Standard-normal CDF.
pub fn phi(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Fast logistic approximation of the standard-normal CDF.
pub fn phi_approx(x: f64) -> f64 {
    inv_logit(0.07056 * x * x * x + 1.5976 * x)
}

/// Logistic function 1 / (1 + exp(-x)).
pub fn inv_logit(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// The hierarchically pooled subject parameters, in storage order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pooled {
    InverseTemperature,
    ValueLearningRate,
    HistoryLearningRate,
    MoodBase,
}

impl Pooled {
    pub const ALL: [Pooled; N_POOLED] = [
        Pooled::InverseTemperature,
        Pooled::ValueLearningRate,
        Pooled::HistoryLearningRate,
        Pooled::MoodBase,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Short name used in parameter listings.
    pub fn name(self) -> &'static str {
        match self {
            Pooled::InverseTemperature => "beta",
            Pooled::ValueLearningRate => "eta_v",
            Pooled::HistoryLearningRate => "eta_h",
            Pooled::MoodBase => "f",
        }
    }

    /// Map an unconstrained value onto this parameter's support.
    ///
    /// Φ rounds to exactly 0 or 1 in the far tails, so it is clamped to keep
    /// β and the learning rates inside their open intervals.
    pub fn to_bounded(self, x: f64, cdf: CdfKind) -> f64 {
        let unit = || cdf.eval(x).clamp(f64::MIN_POSITIVE, 1.0 - f64::EPSILON);
        match self {
            Pooled::InverseTemperature => unit() * BETA_MAX,
            Pooled::ValueLearningRate | Pooled::HistoryLearningRate => unit(),
            Pooled::MoodBase => (0.5 * x).exp(),
        }
    }
}

/// Bounded parameters of one subject, fixed for a full forward pass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubjectParams {
    /// Inverse temperature β.
    pub beta: f64,
    /// Value learning rate η_v.
    pub eta_v: f64,
    /// History learning rate η_h.
    pub eta_h: f64,
    /// Mood-sensitivity base f.
    pub mood_base: f64,
    /// Baseline mood bias β_h.
    pub mood_bias: f64,
}

impl SubjectParams {
    /// Apply the transform to one subject's location + scale · draw sums.
    pub fn from_unconstrained(
        linear: &[f64; N_POOLED],
        mood_bias: f64,
        cdf: CdfKind,
    ) -> Self {
        Self {
            beta: Pooled::InverseTemperature.to_bounded(linear[0], cdf),
            eta_v: Pooled::ValueLearningRate.to_bounded(linear[1], cdf),
            eta_h: Pooled::HistoryLearningRate.to_bounded(linear[2], cdf),
            mood_base: Pooled::MoodBase.to_bounded(linear[3], cdf),
            mood_bias,
        }
    }

    /// Reject parameters the state machine cannot evaluate.
    ///
    /// `subject` is zero-based; errors report it 1-based.
    pub fn check(&self, subject: usize) -> Result<()> {
        if !(self.mood_base > 0.0) || !self.mood_base.is_finite() {
            return Err(ModelError::NonPositiveMoodBase {
                subject: subject + 1,
                value: self.mood_base,
            });
        }
        let checks = [
            ("beta", self.beta, self.beta.is_finite() && self.beta >= 0.0),
            ("eta_v", self.eta_v, (0.0..=1.0).contains(&self.eta_v)),
            ("eta_h", self.eta_h, (0.0..=1.0).contains(&self.eta_h)),
            ("mood_bias", self.mood_bias, self.mood_bias.is_finite()),
        ];
        for (name, value, ok) in checks {
            if !ok {
                return Err(ModelError::InvalidParameter {
                    name: format!("{}[{}]", name, subject + 1),
                    value,
                    reason: "outside the parameter's support",
                });
            }
        }
        Ok(())
    }
}

/// Population-level means of the transformed parameters (zero subject deviation).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub beta: f64,
    pub eta_v: f64,
    pub eta_h: f64,
    pub mood_base: f64,
}

impl GroupSummary {
    pub fn from_locations(mu: &[f64; N_POOLED], cdf: CdfKind) -> Self {
        Self {
            beta: Pooled::InverseTemperature.to_bounded(mu[0], cdf),
            eta_v: Pooled::ValueLearningRate.to_bounded(mu[1], cdf),
            eta_h: Pooled::HistoryLearningRate.to_bounded(mu[2], cdf),
            mood_base: Pooled::MoodBase.to_bounded(mu[3], cdf),
        }
    }

    pub fn get(&self, param: Pooled) -> f64 {
        match param {
            Pooled::InverseTemperature => self.beta,
            Pooled::ValueLearningRate => self.eta_v,
            Pooled::HistoryLearningRate => self.eta_h,
            Pooled::MoodBase => self.mood_base,
        }
    }
}
