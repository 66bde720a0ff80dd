//! Replay of one subject's full trial sequence.
//!
//! The state is created once per subject and carried across blocks. The only
//! block-boundary special case is the start of the second block, where mood
//! is pinned to the subject's override value. Mood ratings are scored after
//! the update of their checkpoint trial, whether or not that trial's choice
//! was missing.

use ndarray::Array2;

use crate::config::{checkpoint_slot, N_CHECKPOINTS, OVERRIDE_BLOCK};
use crate::data::SubjectData;
use crate::error::{ModelError, Result};
use crate::params::prior::normal_lpdf;
use crate::params::SubjectParams;

use super::state::LatentState;
use super::trial::{advance, PassMode};

/// Everything recorded while replaying one subject.
#[derive(Clone, Debug)]
pub struct SubjectTrace {
    /// Per-trial choice log-likelihood, 0 on missing trials: B × T.
    pub choice_log_lik: Array2<f64>,

    /// Per-checkpoint mood-rating log-likelihood: B × 3. Slots whose
    /// checkpoint lies beyond the block length stay 0.
    pub mood_log_lik: Array2<f64>,

    /// Reward-history trace after each trial: B × T.
    pub history: Array2<f64>,

    /// Mood after each trial: B × T.
    pub mood: Array2<f64>,

    /// Simulated choice codes, only in sampling mode: B × T.
    pub simulated: Option<Array2<i32>>,

    /// State on entering each block, after any override.
    pub block_entry: Vec<LatentState>,

    /// State after the last trial.
    pub final_state: LatentState,
}

impl SubjectTrace {
    pub fn choice_total(&self) -> f64 {
        self.choice_log_lik.sum()
    }

    pub fn mood_total(&self) -> f64 {
        self.mood_log_lik.sum()
    }

    pub fn total(&self) -> f64 {
        self.choice_total() + self.mood_total()
    }
}

/// Replay one subject under fixed parameters.
///
/// `mood_noise` is the shared rating noise scale σ_m.
pub fn replay(
    params: &SubjectParams,
    data: &SubjectData<'_>,
    mood_noise: f64,
    mut mode: PassMode<'_>,
) -> Result<SubjectTrace> {
    params.check(data.index)?;
    if !(mood_noise > 0.0 && mood_noise.is_finite()) {
        return Err(ModelError::InvalidParameter {
            name: "sigma_m".to_string(),
            value: mood_noise,
            reason: "must be finite and > 0",
        });
    }

    let (n_blocks, n_trials) = (data.n_blocks(), data.n_trials());
    let mut choice_log_lik = Array2::zeros((n_blocks, n_trials));
    let mut mood_log_lik = Array2::zeros((n_blocks, N_CHECKPOINTS));
    let mut history = Array2::zeros((n_blocks, n_trials));
    let mut mood = Array2::zeros((n_blocks, n_trials));
    let mut simulated = match mode {
        PassMode::Score => None,
        PassMode::Sample(_) => Some(Array2::zeros((n_blocks, n_trials))),
    };
    let mut block_entry = Vec::with_capacity(n_blocks);

    let mut state = LatentState::new(params.mood_bias);

    for block in 0..n_blocks {
        if block == OVERRIDE_BLOCK {
            state = state.override_mood(data.mood_override, params.mood_bias, data.index)?;
        }
        block_entry.push(state.clone());

        for t in 0..n_trials {
            let trial = data.trial(block, t);
            let (next, step) = advance(state, params, &trial, &mut mode);
            state = next;

            choice_log_lik[[block, t]] = step.choice_log_lik;
            history[[block, t]] = state.history;
            mood[[block, t]] = state.mood;
            if let (Some(sim), Some(code)) = (simulated.as_mut(), step.simulated_choice) {
                sim[[block, t]] = code;
            }

            if let Some(slot) = checkpoint_slot(t) {
                mood_log_lik[[block, slot]] =
                    normal_lpdf(data.rating(block, slot), state.mood, mood_noise);
            }
        }
    }

    if !state.is_healthy() {
        return Err(ModelError::NonFiniteDensity {
            value: f64::NAN,
            context: format!("latent state of subject {} diverged", data.index + 1),
        });
    }

    tracing::trace!(
        subject = data.index + 1,
        updates = state.updates,
        "subject replayed"
    );

    Ok(SubjectTrace {
        choice_log_lik,
        mood_log_lik,
        history,
        mood,
        simulated,
        block_entry,
        final_state: state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MISSING_CHOICE, MOOD_CHECKPOINTS, N_OPTIONS};
    use crate::data::TaskData;
    use ndarray::{Array1, Array3, Array4};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params() -> SubjectParams {
        SubjectParams {
            beta: 5.0,
            eta_v: 0.3,
            eta_h: 0.2,
            mood_base: 1.0,
            mood_bias: 0.0,
        }
    }

    /// Uniform design: every trial presents (1, 2), chooses option 1,
    /// rewards alternate 1, 0, 1, ...
    fn design(n_blocks: usize, n_trials: usize, mood_override: f64) -> TaskData {
        let mut options = Array4::zeros((1, n_blocks, n_trials, 2));
        for ((_, _, _, p), v) in options.indexed_iter_mut() {
            *v = p as i32 + 1;
        }
        let mut rewards = Array3::zeros((1, n_blocks, n_trials));
        for ((_, _, k), v) in rewards.indexed_iter_mut() {
            *v = ((k + 1) % 2) as i32;
        }
        TaskData::new(
            options,
            Array3::from_elem((1, n_blocks, n_trials), 1),
            rewards,
            Array3::from_elem((1, n_blocks, N_CHECKPOINTS), 0.1),
            Array1::from_elem(1, mood_override),
        )
        .unwrap()
    }

    #[test]
    fn test_three_trial_scenario() {
        let data = design(1, 3, 0.0);
        let trace = replay(&params(), &data.subject(0), 0.5, PassMode::Score).unwrap();

        // Trial 1: Q = 0, both options tied.
        assert!((trace.choice_log_lik[[0, 0]] - 0.5_f64.ln()).abs() < 1e-12);
        // h = 0.2 · (1 − 0), m = tanh(0.2)
        assert!((trace.history[[0, 0]] - 0.2).abs() < 1e-12);
        assert!((trace.mood[[0, 0]] - 0.197_375_320_224_904).abs() < 1e-12);

        // Trial 2: δ = 1^m · 0 − 0.3 = −0.3, Q[1] = 0.21
        let expected_h2 = 0.2 + 0.2 * (-0.3 - 0.2);
        assert!((trace.history[[0, 1]] - expected_h2).abs() < 1e-12);

        // Trial 3: δ = 1 − 0.21 = 0.79, Q[1] = 0.21 + 0.3 · 0.79
        let q = &trace.final_state.q;
        assert!((q[0] - (0.21 + 0.3 * 0.79)).abs() < 1e-12);
        assert!(q.iter().skip(1).all(|&v| v == 0.0));

        // No checkpoint inside a 3-trial block.
        assert!(trace.mood_log_lik.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_q_zero_before_first_trial() {
        let data = design(3, 10, 0.2);
        let trace = replay(&params(), &data.subject(0), 0.5, PassMode::Score).unwrap();
        let first = &trace.block_entry[0];
        assert_eq!(first.q.len(), N_OPTIONS);
        assert!(first.q.iter().all(|&v| v == 0.0));
        assert_eq!(first.history, 0.0);
        assert_eq!(first.mood, 0.0);
    }

    #[test]
    fn test_q_carries_across_blocks() {
        let data = design(3, 4, 0.0);
        let trace = replay(&params(), &data.subject(0), 0.5, PassMode::Score).unwrap();

        // Block 1 alone ends where the three-block run enters block 2.
        let single = design(1, 4, 0.0);
        let first_block = replay(&params(), &single.subject(0), 0.5, PassMode::Score).unwrap();
        assert!(trace.block_entry[1].q[0] > 0.0);
        assert_eq!(trace.block_entry[1].q, first_block.final_state.q);

        // Q keeps growing through block 2 instead of restarting at zero.
        assert!(trace.block_entry[2].q[0] > trace.block_entry[1].q[0]);
        // h and m carry from block 2 into block 3 without reset.
        assert_eq!(trace.block_entry[2].history, trace.history[[1, 3]]);
        assert_eq!(trace.block_entry[2].mood, trace.mood[[1, 3]]);
    }

    #[test]
    fn test_block_two_override() {
        let mut p = params();
        p.mood_bias = 0.35;
        let data = design(3, 40, -0.45);
        let trace = replay(&p, &data.subject(0), 0.5, PassMode::Score).unwrap();
        let entry = &trace.block_entry[OVERRIDE_BLOCK];
        assert_eq!(entry.mood, -0.45);
        assert!((entry.history - ((-0.45_f64).atanh() - 0.35)).abs() < 1e-12);
        // Block 1 and 3 entries are not overridden.
        assert_eq!(trace.block_entry[0].mood, 0.35_f64.tanh());
        assert_eq!(trace.block_entry[2].mood, trace.mood[[1, 39]]);
    }

    #[test]
    fn test_post_update_mood_identity() {
        let mut p = params();
        p.mood_bias = -0.2;
        p.mood_base = 1.7;
        let data = design(2, 12, 0.3);
        let trace = replay(&p, &data.subject(0), 0.5, PassMode::Score).unwrap();
        for (&h, &m) in trace.history.iter().zip(trace.mood.iter()) {
            assert_eq!(m, (p.mood_bias + h).tanh());
        }
    }

    #[test]
    fn test_checkpoint_coverage() {
        let data = design(3, 40, 0.1);
        let noise = 0.3;
        let trace = replay(&params(), &data.subject(0), noise, PassMode::Score).unwrap();
        for block in 0..3 {
            for (slot, &k) in MOOD_CHECKPOINTS.iter().enumerate() {
                let expected = normal_lpdf(0.1, trace.mood[[block, k - 1]], noise);
                assert_eq!(trace.mood_log_lik[[block, slot]], expected);
                assert!(trace.mood_log_lik[[block, slot]] != 0.0);
            }
        }
        let expected_total = trace.choice_log_lik.sum() + trace.mood_log_lik.sum();
        assert_eq!(trace.total(), expected_total);
    }

    #[test]
    fn test_checkpoint_scored_on_missing_trial() {
        let mut data = design(1, 10, 0.0);
        data.choices[[0, 0, 6]] = MISSING_CHOICE;
        let trace = replay(&params(), &data.subject(0), 0.4, PassMode::Score).unwrap();
        assert_eq!(trace.choice_log_lik[[0, 6]], 0.0);
        assert_eq!(trace.history[[0, 6]], trace.history[[0, 5]]);
        assert_eq!(
            trace.mood_log_lik[[0, 0]],
            normal_lpdf(0.1, trace.mood[[0, 5]], 0.4)
        );
    }

    #[test]
    fn test_sampling_mode_records_choices() {
        let mut data = design(2, 8, 0.0);
        data.choices[[0, 1, 3]] = MISSING_CHOICE;
        let mut rng = StdRng::seed_from_u64(9);
        let sampled = replay(&params(), &data.subject(0), 0.4, PassMode::Sample(&mut rng)).unwrap();
        let scored = replay(&params(), &data.subject(0), 0.4, PassMode::Score).unwrap();

        let sim = sampled.simulated.as_ref().unwrap();
        assert_eq!(sim[[1, 3]], MISSING_CHOICE);
        assert!(sim
            .indexed_iter()
            .filter(|((b, t), _)| !(*b == 1 && *t == 3))
            .all(|(_, &c)| c == 1 || c == 2));
        assert_eq!(sampled.choice_log_lik, scored.choice_log_lik);
        assert_eq!(sampled.history, scored.history);
        assert!(scored.simulated.is_none());
    }

    #[test]
    fn test_replay_rejects_non_positive_mood_base() {
        let mut p = params();
        p.mood_base = -1.0;
        let data = design(1, 3, 0.0);
        let err = replay(&p, &data.subject(0), 0.4, PassMode::Score).unwrap_err();
        assert!(matches!(err, ModelError::NonPositiveMoodBase { subject: 1, .. }));
    }

    #[test]
    fn test_replay_is_idempotent() {
        let data = design(3, 36, -0.2);
        let a = replay(&params(), &data.subject(0), 0.4, PassMode::Score).unwrap();
        let b = replay(&params(), &data.subject(0), 0.4, PassMode::Score).unwrap();
        assert_eq!(a.choice_log_lik, b.choice_log_lik);
        assert_eq!(a.mood_log_lik, b.mood_log_lik);
        assert_eq!(a.history, b.history);
        assert_eq!(a.final_state, b.final_state);
    }
}
