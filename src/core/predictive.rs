//! Posterior predictive generation.
//!
//! Replays every subject in sampling mode: the state evolves on the observed
//! choices and rewards exactly as during fitting, while a simulated choice is
//! drawn from the same softmax on each trial. Each subject gets its own RNG
//! derived from the caller's seed, so output does not depend on scheduling.

use ndarray::{s, Array3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::N_CHECKPOINTS;
use crate::data::TaskData;
use crate::error::{ModelError, Result};
use crate::params::ModelParams;

use super::likelihood::check_compatible;
use super::subject::{replay, SubjectTrace};
use super::trial::PassMode;
use super::ModelConfig;

/// Output of one predictive pass, indexed like the inputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictiveDraw {
    /// Simulated choice codes (1, 2 or the missing marker): N × B × T.
    pub choices: Array3<i32>,

    /// Reward-history trace after each trial: N × B × T.
    pub history: Array3<f64>,

    /// Mood after each trial: N × B × T.
    pub mood: Array3<f64>,

    /// Observed-choice log-likelihood, 0 on missing trials: N × B × T.
    pub choice_log_lik: Array3<f64>,

    /// Mood-rating log-likelihood per checkpoint: N × B × 3.
    pub mood_log_lik: Array3<f64>,
}

impl PredictiveDraw {
    fn from_traces(traces: &[SubjectTrace], n_blocks: usize, n_trials: usize) -> Result<Self> {
        let n = traces.len();
        let mut draw = Self {
            choices: Array3::zeros((n, n_blocks, n_trials)),
            history: Array3::zeros((n, n_blocks, n_trials)),
            mood: Array3::zeros((n, n_blocks, n_trials)),
            choice_log_lik: Array3::zeros((n, n_blocks, n_trials)),
            mood_log_lik: Array3::zeros((n, n_blocks, N_CHECKPOINTS)),
        };
        for (i, trace) in traces.iter().enumerate() {
            let simulated = trace.simulated.as_ref().ok_or_else(|| {
                ModelError::Diagnostics(format!(
                    "subject {} was replayed without sampling",
                    i + 1
                ))
            })?;
            draw.choices.slice_mut(s![i, .., ..]).assign(simulated);
            draw.history.slice_mut(s![i, .., ..]).assign(&trace.history);
            draw.mood.slice_mut(s![i, .., ..]).assign(&trace.mood);
            draw.choice_log_lik
                .slice_mut(s![i, .., ..])
                .assign(&trace.choice_log_lik);
            draw.mood_log_lik
                .slice_mut(s![i, .., ..])
                .assign(&trace.mood_log_lik);
        }
        Ok(draw)
    }

    /// Total log-likelihood of this draw.
    pub fn total_log_lik(&self) -> f64 {
        self.choice_log_lik.sum() + self.mood_log_lik.sum()
    }

    /// Serialise for storage alongside a fit.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| ModelError::Diagnostics(e.to_string()))
    }

    /// Deserialise from [`PredictiveDraw::to_bytes`] output.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| ModelError::Diagnostics(e.to_string()))
    }
}

/// Seed of subject `i`'s generator.
fn subject_seed(seed: u64, i: usize) -> u64 {
    seed ^ (i as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Generate one predictive draw.
pub fn simulate(
    params: &ModelParams,
    data: &TaskData,
    config: &ModelConfig,
    seed: u64,
) -> Result<PredictiveDraw> {
    check_compatible(params, data)?;

    let run = |i: usize| {
        let subject = params.subject(i, config.cdf);
        let mut rng = StdRng::seed_from_u64(subject_seed(seed, i));
        replay(
            &subject,
            &data.subject(i),
            params.mood_noise,
            PassMode::Sample(&mut rng),
        )
    };

    let traces: Vec<SubjectTrace> = if config.parallel {
        (0..data.n_subjects())
            .into_par_iter()
            .map(run)
            .collect::<Result<_>>()?
    } else {
        (0..data.n_subjects()).map(run).collect::<Result<_>>()?
    };

    PredictiveDraw::from_traces(&traces, data.n_blocks(), data.n_trials())
}

/// Generate one predictive draw per parameter draw. Draw `d` uses seed `seed + d`.
pub fn simulate_many(
    draws: &[ModelParams],
    data: &TaskData,
    config: &ModelConfig,
    seed: u64,
) -> Result<Vec<PredictiveDraw>> {
    tracing::info!(
        draws = draws.len(),
        subjects = data.n_subjects(),
        "generating posterior predictive draws"
    );
    draws
        .iter()
        .enumerate()
        .map(|(d, params)| simulate(params, data, config, seed.wrapping_add(d as u64)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MISSING_CHOICE;
    use crate::core::likelihood::score_subjects;
    use crate::params::HyperParams;
    use ndarray::{Array1, Array4};

    fn data() -> TaskData {
        let (n, b, t) = (3, 3, 36);
        let mut options = Array4::zeros((n, b, t, 2));
        for ((_, j, k, p), v) in options.indexed_iter_mut() {
            *v = ((j * 3 + (k + p) % 3) % 9) as i32 + 1;
        }
        let mut choices = Array3::from_elem((n, b, t), 1);
        choices[[0, 0, 4]] = MISSING_CHOICE;
        choices[[2, 2, 20]] = MISSING_CHOICE;
        let mut rewards = Array3::zeros((n, b, t));
        for ((i, _, k), v) in rewards.indexed_iter_mut() {
            *v = ((i + k) % 3 == 0) as i32;
        }
        TaskData::new(
            options,
            choices,
            rewards,
            Array3::from_elem((n, b, N_CHECKPOINTS), -0.1),
            Array1::from_vec(vec![0.1, -0.3, 0.5]),
        )
        .unwrap()
    }

    fn params() -> ModelParams {
        let mut p = ModelParams::at_group_mean(HyperParams::default(), 3, 0.3);
        p.raw[[1, 0]] = 1.0;
        p.mood_bias[2] = -0.4;
        p
    }

    #[test]
    fn test_predictive_matches_fitted_trajectories() {
        let d = data();
        let p = params();
        let draw = simulate(&p, &d, &ModelConfig::default(), 5).unwrap();
        let traces = score_subjects(&p, &d, &ModelConfig::default()).unwrap();
        for (i, trace) in traces.iter().enumerate() {
            assert_eq!(draw.history.slice(s![i, .., ..]), trace.history);
            assert_eq!(draw.choice_log_lik.slice(s![i, .., ..]), trace.choice_log_lik);
            assert_eq!(draw.mood_log_lik.slice(s![i, .., ..]), trace.mood_log_lik);
        }
    }

    #[test]
    fn test_missing_trials_in_predictive_output() {
        let draw = simulate(&params(), &data(), &ModelConfig::default(), 5).unwrap();
        assert_eq!(draw.choices[[0, 0, 4]], MISSING_CHOICE);
        assert_eq!(draw.choice_log_lik[[0, 0, 4]], 0.0);
        assert_eq!(draw.history[[0, 0, 4]], draw.history[[0, 0, 3]]);
        assert_eq!(draw.choices[[2, 2, 20]], MISSING_CHOICE);
        let observed = draw.choices.iter().filter(|&&c| c == 1 || c == 2).count();
        assert_eq!(observed, 3 * 3 * 36 - 2);
    }

    #[test]
    fn test_same_seed_same_draw() {
        let d = data();
        let p = params();
        let a = simulate(&p, &d, &ModelConfig::default(), 77).unwrap();
        let b = simulate(
            &p,
            &d,
            &ModelConfig {
                parallel: false,
                ..Default::default()
            },
            77,
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_simulate_many_uses_distinct_seeds() {
        let d = data();
        let draws = vec![params(), params()];
        let out = simulate_many(&draws, &d, &ModelConfig::default(), 1).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].choice_log_lik, out[1].choice_log_lik);
        assert_ne!(out[0].choices, out[1].choices);
    }

    #[test]
    fn test_edited_data_fails_before_simulation() {
        let mut d = data();
        d.choices[[0, 1, 2]] = 3;
        assert!(matches!(
            simulate(&params(), &d, &ModelConfig::default(), 5),
            Err(ModelError::ChoiceOutOfRange {
                subject: 1,
                block: 2,
                trial: 3,
                value: 3
            })
        ));
        d.choices[[0, 1, 2]] = 1;
        d.options[[1, 0, 0, 1]] = 10;
        assert!(matches!(
            simulate_many(&[params()], &d, &ModelConfig::default(), 5),
            Err(ModelError::OptionOutOfRange { subject: 2, .. })
        ));
    }

    #[test]
    fn test_bincode_roundtrip() {
        let draw = simulate(&params(), &data(), &ModelConfig::default(), 3).unwrap();
        let restored = PredictiveDraw::from_bytes(&draw.to_bytes().unwrap()).unwrap();
        assert_eq!(draw, restored);
        assert_eq!(draw.total_log_lik(), restored.total_log_lik());
    }
}
