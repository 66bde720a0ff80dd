//! Synthetic task generation for parameter-recovery runs and demos.
//!
//! Each block uses three machines taken from the nine option identities,
//! ordered low → high by reward probability. Every trial presents two of the
//! block's machines; the simulated subject chooses through the model's
//! softmax, receives a Bernoulli reward from the chosen machine and learns
//! through the same transition used for fitting.

use ndarray::{Array1, Array3, Array4};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::config::{checkpoint_slot, MISSING_CHOICE, N_CHECKPOINTS, N_OPTIONS, OVERRIDE_BLOCK};
use crate::core::state::LatentState;
use crate::core::trial::{advance, PassMode};
use crate::core::ModelConfig;
use crate::error::{ModelError, Result};
use crate::params::{ModelParams, SubjectParams};

use super::dataset::{TaskData, Trial};

/// Machines per block.
const MACHINES_PER_BLOCK: usize = 3;

/// Task layout and machine payoffs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDesign {
    pub n_blocks: usize,
    pub n_trials: usize,

    /// Reward probability of each option identity.
    pub reward_probs: [f64; N_OPTIONS],

    /// Probability that a trial's response is missing.
    pub miss_rate: f64,

    /// Spread of `atanh(override)` across subjects.
    pub override_sd: f64,
}

impl Default for TaskDesign {
    fn default() -> Self {
        Self {
            n_blocks: 3,
            n_trials: 42,
            reward_probs: [0.2, 0.4, 0.6, 0.2, 0.4, 0.6, 0.2, 0.4, 0.6],
            miss_rate: 0.0,
            override_sd: 0.5,
        }
    }
}

impl TaskDesign {
    fn validate(&self) -> Result<()> {
        if let Some(&p) = self
            .reward_probs
            .iter()
            .find(|p| !(0.0..=1.0).contains(*p))
        {
            return Err(ModelError::InvalidParameter {
                name: "reward_probs".to_string(),
                value: p,
                reason: "must be a probability",
            });
        }
        if !(0.0..1.0).contains(&self.miss_rate) {
            return Err(ModelError::InvalidParameter {
                name: "miss_rate".to_string(),
                value: self.miss_rate,
                reason: "must lie in [0, 1)",
            });
        }
        if !(self.override_sd >= 0.0 && self.override_sd.is_finite()) {
            return Err(ModelError::InvalidParameter {
                name: "override_sd".to_string(),
                value: self.override_sd,
                reason: "must be finite and >= 0",
            });
        }
        Ok(())
    }

    /// Zero-based option identities used in `block`.
    fn machines(&self, block: usize) -> [usize; MACHINES_PER_BLOCK] {
        let first = (block * MACHINES_PER_BLOCK) % N_OPTIONS;
        [first, first + 1, first + 2]
    }
}

/// A generated dataset and the subject parameters behind it.
#[derive(Clone, Debug)]
pub struct SyntheticTask {
    pub data: TaskData,
    pub subjects: Vec<SubjectParams>,
}

/// Simulate the full task for every subject of `params`.
pub fn generate<R: Rng + ?Sized>(
    params: &ModelParams,
    design: &TaskDesign,
    config: &ModelConfig,
    rng: &mut R,
) -> Result<SyntheticTask> {
    design.validate()?;
    params.validate()?;

    let (n, b, t) = (params.n_subjects(), design.n_blocks, design.n_trials);
    let mut options = Array4::zeros((n, b, t, 2));
    let mut choices = Array3::zeros((n, b, t));
    let mut rewards = Array3::zeros((n, b, t));
    let mut mood_ratings = Array3::zeros((n, b, N_CHECKPOINTS));
    let mut mood_override = Array1::zeros(n);

    let override_noise = Normal::new(0.0, design.override_sd.max(f64::MIN_POSITIVE))
        .map_err(|e| ModelError::Diagnostics(e.to_string()))?;
    let rating_noise = Normal::new(0.0, params.mood_noise)
        .map_err(|e| ModelError::Diagnostics(e.to_string()))?;

    let subjects = params.transform(config.cdf);
    for (i, sp) in subjects.iter().enumerate() {
        sp.check(i)?;
        mood_override[i] = override_noise.sample(rng).tanh();

        let mut state = LatentState::new(sp.mood_bias);
        for block in 0..b {
            if block == OVERRIDE_BLOCK {
                state = state.override_mood(mood_override[i], sp.mood_bias, i)?;
            }
            let machines = design.machines(block);
            for k in 0..t {
                let mut pair = [machines[k % 3], machines[(k + 1) % 3]];
                pair.shuffle(rng);

                let trial = if rng.gen_bool(design.miss_rate) {
                    Trial {
                        pair,
                        choice: None,
                        reward: 0.0,
                    }
                } else {
                    let choice = if rng.gen_bool(state.prob_first(sp.beta, pair)) {
                        0
                    } else {
                        1
                    };
                    let reward = rng.gen_bool(design.reward_probs[pair[choice]]);
                    Trial {
                        pair,
                        choice: Some(choice),
                        reward: if reward { 1.0 } else { 0.0 },
                    }
                };

                options[[i, block, k, 0]] = pair[0] as i32 + 1;
                options[[i, block, k, 1]] = pair[1] as i32 + 1;
                choices[[i, block, k]] = trial.choice.map_or(MISSING_CHOICE, |c| c as i32 + 1);
                rewards[[i, block, k]] = trial.reward as i32;

                state = advance(state, sp, &trial, &mut PassMode::Score).0;

                if let Some(slot) = checkpoint_slot(k) {
                    mood_ratings[[i, block, slot]] = state.mood + rating_noise.sample(rng);
                }
            }
        }
    }

    tracing::debug!(subjects = n, blocks = b, trials = t, "synthetic task generated");

    let data = TaskData::new(options, choices, rewards, mood_ratings, mood_override)?;
    Ok(SyntheticTask { data, subjects })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::likelihood::log_likelihood;
    use crate::params::HierarchicalPrior;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample(n: usize, seed: u64) -> (ModelParams, StdRng) {
        let mut rng = StdRng::seed_from_u64(seed);
        let params = HierarchicalPrior::default().sample(n, &mut rng).unwrap();
        (params, rng)
    }

    #[test]
    fn test_generated_data_is_valid() {
        let (params, mut rng) = sample(5, 1);
        let design = TaskDesign {
            miss_rate: 0.1,
            ..Default::default()
        };
        let task = generate(&params, &design, &ModelConfig::default(), &mut rng).unwrap();
        assert_eq!(task.data.n_subjects(), 5);
        assert_eq!(task.data.n_blocks(), 3);
        assert_eq!(task.data.n_trials(), 42);
        assert_eq!(task.subjects.len(), 5);
        assert!(task.data.n_observed_choices() < 5 * 3 * 42);
        assert!(task.data.validate().is_ok());
    }

    #[test]
    fn test_blocks_use_their_own_machines() {
        let (params, mut rng) = sample(2, 2);
        let task = generate(&params, &TaskDesign::default(), &ModelConfig::default(), &mut rng)
            .unwrap();
        for ((_, j, _, _), &opt) in task.data.options.indexed_iter() {
            let lo = (j * 3 % 9) as i32 + 1;
            assert!((lo..lo + 3).contains(&opt), "block {} shows option {}", j + 1, opt);
        }
    }

    #[test]
    fn test_true_parameters_beat_shuffled_ones() {
        let (params, mut rng) = sample(6, 3);
        let design = TaskDesign {
            n_trials: 60,
            ..Default::default()
        };
        let cfg = ModelConfig::default();
        let task = generate(&params, &design, &cfg, &mut rng).unwrap();

        let truth = log_likelihood(&params, &task.data, &cfg).unwrap().total();
        let mut wrong = params.clone();
        wrong.mood_noise = params.mood_noise * 8.0;
        let worse = log_likelihood(&wrong, &task.data, &cfg).unwrap().total();
        assert!(truth > worse);
    }

    #[test]
    fn test_invalid_design_rejected() {
        let (params, mut rng) = sample(1, 4);
        let mut design = TaskDesign::default();
        design.reward_probs[4] = 1.5;
        assert!(generate(&params, &design, &ModelConfig::default(), &mut rng).is_err());
    }
}
