//! Validated task tensors.
//!
//! All inputs share a fixed subject × block × trial layout. Validation runs
//! once at construction so the replay code can index without re-checking.

use ndarray::{s, Array1, Array3, Array4, ArrayView2, ArrayView3};
use serde::{Deserialize, Serialize};

use crate::config::{is_missing, N_CHECKPOINTS, N_OPTIONS, N_PRESENTED, OVERRIDE_BLOCK};
use crate::error::{ModelError, Result};

/// One trial, decoded to zero-based indices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trial {
    /// Zero-based option identities of the two presented machines.
    pub pair: [usize; N_PRESENTED],

    /// Position (0 or 1) of the chosen option in `pair`, None if missing.
    pub choice: Option<usize>,

    /// Observed reward (0 or 1). Meaningless when `choice` is None.
    pub reward: f64,
}

impl Trial {
    /// Zero-based identity of the chosen option.
    pub fn chosen_option(&self) -> Option<usize> {
        self.choice.map(|c| self.pair[c])
    }
}

/// Trial data for all subjects.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskData {
    /// Presented option identities in [1, 9]: N × B × T × 2.
    pub options: Array4<i32>,

    /// Choice codes (≤0 missing, 1, 2): N × B × T.
    pub choices: Array3<i32>,

    /// Binary rewards: N × B × T.
    pub rewards: Array3<i32>,

    /// Mood ratings at the checkpoint trials: N × B × 3.
    pub mood_ratings: Array3<f64>,

    /// Mood value pinned at the start of the second block: N.
    pub mood_override: Array1<f64>,
}

impl TaskData {
    /// Assemble and validate a dataset.
    pub fn new(
        options: Array4<i32>,
        choices: Array3<i32>,
        rewards: Array3<i32>,
        mood_ratings: Array3<f64>,
        mood_override: Array1<f64>,
    ) -> Result<Self> {
        let data = Self {
            options,
            choices,
            rewards,
            mood_ratings,
            mood_override,
        };
        data.validate()?;
        Ok(data)
    }

    pub fn n_subjects(&self) -> usize {
        self.choices.dim().0
    }

    pub fn n_blocks(&self) -> usize {
        self.choices.dim().1
    }

    pub fn n_trials(&self) -> usize {
        self.choices.dim().2
    }

    /// Number of trials with an observed choice.
    pub fn n_observed_choices(&self) -> usize {
        self.choices.iter().filter(|&&c| !is_missing(c)).count()
    }

    /// Check shapes and value ranges. Reports the first violation found.
    pub fn validate(&self) -> Result<()> {
        let (n, b, t) = self.choices.dim();

        check_shape("options", &[n, b, t, N_PRESENTED], self.options.shape())?;
        check_shape("rewards", &[n, b, t], self.rewards.shape())?;
        check_shape("mood_ratings", &[n, b, N_CHECKPOINTS], self.mood_ratings.shape())?;
        check_shape("mood_override", &[n], self.mood_override.shape())?;

        for ((i, j, k), &choice) in self.choices.indexed_iter() {
            for p in 0..N_PRESENTED {
                let value = self.options[[i, j, k, p]];
                if value < 1 || value as usize > N_OPTIONS {
                    return Err(ModelError::OptionOutOfRange {
                        subject: i + 1,
                        block: j + 1,
                        trial: k + 1,
                        value,
                        max: N_OPTIONS,
                    });
                }
            }

            if is_missing(choice) {
                continue;
            }
            if choice as usize > N_PRESENTED {
                return Err(ModelError::ChoiceOutOfRange {
                    subject: i + 1,
                    block: j + 1,
                    trial: k + 1,
                    value: choice,
                });
            }

            let reward = self.rewards[[i, j, k]];
            if reward != 0 && reward != 1 {
                return Err(ModelError::RewardNotBinary {
                    subject: i + 1,
                    block: j + 1,
                    trial: k + 1,
                    value: reward,
                });
            }
        }

        for ((i, j, slot), &value) in self.mood_ratings.indexed_iter() {
            if !value.is_finite() {
                return Err(ModelError::RatingNotFinite {
                    subject: i + 1,
                    block: j + 1,
                    slot: slot + 1,
                    value,
                });
            }
        }

        // The override only enters the model when a second block exists.
        if b > OVERRIDE_BLOCK {
            for (i, &value) in self.mood_override.iter().enumerate() {
                if !(value > -1.0 && value < 1.0) {
                    return Err(ModelError::OverrideOutOfDomain {
                        subject: i + 1,
                        value,
                    });
                }
            }
        }

        tracing::debug!(
            subjects = n,
            blocks = b,
            trials = t,
            observed = self.n_observed_choices(),
            "task data validated"
        );
        Ok(())
    }

    /// Borrow the data of one subject.
    pub fn subject(&self, i: usize) -> SubjectData<'_> {
        SubjectData {
            index: i,
            options: self.options.slice(s![i, .., .., ..]),
            choices: self.choices.slice(s![i, .., ..]),
            rewards: self.rewards.slice(s![i, .., ..]),
            mood_ratings: self.mood_ratings.slice(s![i, .., ..]),
            mood_override: self.mood_override[i],
        }
    }
}

/// Read-only view of one subject's trials.
#[derive(Clone, Copy)]
pub struct SubjectData<'a> {
    /// Zero-based subject index.
    pub index: usize,
    pub options: ArrayView3<'a, i32>,
    pub choices: ArrayView2<'a, i32>,
    pub rewards: ArrayView2<'a, i32>,
    pub mood_ratings: ArrayView2<'a, f64>,
    pub mood_override: f64,
}

impl<'a> SubjectData<'a> {
    pub fn n_blocks(&self) -> usize {
        self.choices.dim().0
    }

    pub fn n_trials(&self) -> usize {
        self.choices.dim().1
    }

    /// Decode one trial. Assumes the owning [`TaskData`] was validated.
    pub fn trial(&self, block: usize, trial: usize) -> Trial {
        let code = self.choices[[block, trial]];
        Trial {
            pair: [
                (self.options[[block, trial, 0]] - 1) as usize,
                (self.options[[block, trial, 1]] - 1) as usize,
            ],
            choice: if is_missing(code) {
                None
            } else {
                Some((code - 1) as usize)
            },
            reward: self.rewards[[block, trial]] as f64,
        }
    }

    /// Observed mood rating for a checkpoint slot.
    pub fn rating(&self, block: usize, slot: usize) -> f64 {
        self.mood_ratings[[block, slot]]
    }
}

fn check_shape(what: &'static str, expected: &[usize], found: &[usize]) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(ModelError::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            found: found.to_vec(),
        })
    }
}
