//! Per-subject latent state.
//!
//! The state holds one value estimate per option identity `Q ∈ R^9`, the
//! reward-history trace `h` and the mood `m = tanh(β_h + h)`. It is threaded
//! by value through the transitions below: each transition consumes the old
//! state and returns the new one, so no state is ever shared across subjects.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::config::N_OPTIONS;
use crate::error::{ModelError, Result};
use crate::params::SubjectParams;

/// Latent learning and mood state of one subject.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatentState {
    /// Value estimate per option identity: Q ∈ R^9.
    pub q: Array1<f64>,

    /// Exponentially smoothed prediction-error trace h.
    pub history: f64,

    /// Mood m ∈ (-1, 1).
    pub mood: f64,

    /// Number of learning updates applied (missing trials do not count).
    pub updates: u64,
}

impl LatentState {
    /// Initial state before a subject's first block: Q = 0, h = 0, m = tanh(β_h).
    pub fn new(mood_bias: f64) -> Self {
        Self {
            q: Array1::zeros(N_OPTIONS),
            history: 0.0,
            mood: mood_bias.tanh(),
            updates: 0,
        }
    }

    /// Pin mood to an externally measured value and back-solve `h` so that
    /// `m = tanh(β_h + h)` keeps holding.
    ///
    /// `subject` is zero-based and only used for error reporting.
    pub fn override_mood(mut self, value: f64, mood_bias: f64, subject: usize) -> Result<Self> {
        if !(value > -1.0 && value < 1.0) {
            return Err(ModelError::OverrideOutOfDomain {
                subject: subject + 1,
                value,
            });
        }
        self.history = value.atanh() - mood_bias;
        self.mood = value;
        Ok(self)
    }

    /// Unnormalised choice scores `β · Q` of the two presented options.
    pub fn choice_logits(&self, beta: f64, pair: [usize; 2]) -> [f64; 2] {
        [beta * self.q[pair[0]], beta * self.q[pair[1]]]
    }

    /// Log-probability of choosing position `choice` (0 or 1) of `pair`
    /// under a two-way softmax.
    pub fn choice_log_prob(&self, beta: f64, pair: [usize; 2], choice: usize) -> f64 {
        let [a, b] = self.choice_logits(beta, pair);
        if choice == 0 {
            -softplus(b - a)
        } else {
            -softplus(a - b)
        }
    }

    /// Probability of choosing the first presented option.
    pub fn prob_first(&self, beta: f64, pair: [usize; 2]) -> f64 {
        self.choice_log_prob(beta, pair, 0).exp()
    }

    /// Reward-prediction error `δ = f^m · R − Q[chosen]` under the current state.
    pub fn prediction_error(&self, params: &SubjectParams, chosen: usize, reward: f64) -> f64 {
        params.mood_base.powf(self.mood) * reward - self.q[chosen]
    }

    /// Apply one learning update for an observed choice and reward.
    ///
    /// Returns the new state and the prediction error that drove it.
    pub fn learn(mut self, params: &SubjectParams, chosen: usize, reward: f64) -> (Self, f64) {
        let delta = self.prediction_error(params, chosen, reward);
        self.q[chosen] += params.eta_v * delta;
        self.history += params.eta_h * (delta - self.history);
        self.mood = (params.mood_bias + self.history).tanh();
        self.updates += 1;
        (self, delta)
    }

    /// Check that nothing has diverged (NaN or Inf).
    pub fn is_healthy(&self) -> bool {
        self.q.iter().all(|v| v.is_finite()) && self.history.is_finite() && self.mood.is_finite()
    }
}

/// `ln(1 + e^x)` without overflow.
fn softplus(x: f64) -> f64 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}
