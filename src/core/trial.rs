//! The single trial transition shared by fitting and predictive generation.
//!
//! ```text
//! missing:  no score, state unchanged
//! observed: ll  = log softmax(β·Q[a], β·Q[b])[choice]
//!           δ   = f^m · R − Q[chosen]
//!           Q[chosen] += η_v · δ
//!           h  += η_h · (δ − h)
//!           m   = tanh(β_h + h)
//! ```
//!
//! [`PassMode`] only decides whether a simulated choice is drawn alongside
//! the score; the state update is identical in both modes.

use rand::rngs::StdRng;
use rand::Rng;

use crate::config::MISSING_CHOICE;
use crate::data::Trial;
use crate::params::SubjectParams;

use super::state::LatentState;

/// Whether a pass only scores observed choices or also simulates them.
pub enum PassMode<'r> {
    /// Score observed choices.
    Score,
    /// Score observed choices and draw a simulated choice per trial.
    Sample(&'r mut StdRng),
}

/// What one trial contributed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrialStep {
    /// Log-probability of the observed choice; exactly 0 for missing trials.
    pub choice_log_lik: f64,

    /// Simulated choice code (1 or 2, or the missing marker). None when scoring only.
    pub simulated_choice: Option<i32>,

    /// Prediction error applied by this trial, None when missing.
    pub prediction_error: Option<f64>,
}

/// Advance the state through one trial.
pub fn advance(
    state: LatentState,
    params: &SubjectParams,
    trial: &Trial,
    mode: &mut PassMode<'_>,
) -> (LatentState, TrialStep) {
    let Some(choice) = trial.choice else {
        let simulated_choice = match mode {
            PassMode::Score => None,
            PassMode::Sample(_) => Some(MISSING_CHOICE),
        };
        return (
            state,
            TrialStep {
                choice_log_lik: 0.0,
                simulated_choice,
                prediction_error: None,
            },
        );
    };

    let choice_log_lik = state.choice_log_prob(params.beta, trial.pair, choice);
    let simulated_choice = match mode {
        PassMode::Score => None,
        PassMode::Sample(rng) => {
            let p_first = state.prob_first(params.beta, trial.pair);
            Some(if rng.gen_bool(p_first.clamp(0.0, 1.0)) { 1 } else { 2 })
        }
    };

    let chosen = trial.pair[choice];
    let (state, delta) = state.learn(params, chosen, trial.reward);

    (
        state,
        TrialStep {
            choice_log_lik,
            simulated_choice,
            prediction_error: Some(delta),
        },
    )
}
