//! Tabular task records and JSON file I/O.
//!
//! Upstream preprocessing delivers one record per subject/block/trial, one
//! per mood rating and one per subject. Indices in records are 1-based.

use std::fs;
use std::path::Path;

use anyhow::Context;
use ndarray::{Array1, Array3, Array4};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{MISSING_CHOICE, N_CHECKPOINTS};
use crate::error::{ModelError, Result};

use super::dataset::TaskData;

/// One trial row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub subject: usize,
    pub block: usize,
    pub trial: usize,
    pub option_a: i32,
    pub option_b: i32,
    /// 1, 2, or a non-positive missing marker.
    pub choice: i32,
    /// Only meaningful when `choice` is not missing.
    #[serde(default)]
    pub reward: i32,
}

/// One mood rating row; `slot` 1..=3 maps to the checkpoint trials.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub subject: usize,
    pub block: usize,
    pub slot: usize,
    pub rating: f64,
}

/// Per-subject inputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub subject: usize,
    pub mood_override: f64,
}

/// The complete tabular form of a dataset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskTable {
    pub trials: Vec<TrialRecord>,
    pub ratings: Vec<RatingRecord>,
    pub subjects: Vec<SubjectRecord>,
}

impl TaskTable {
    /// Flatten a dataset into records.
    pub fn from_data(data: &TaskData) -> Self {
        let mut table = TaskTable::default();
        for ((i, j, k), &choice) in data.choices.indexed_iter() {
            let missing = crate::config::is_missing(choice);
            table.trials.push(TrialRecord {
                subject: i + 1,
                block: j + 1,
                trial: k + 1,
                option_a: data.options[[i, j, k, 0]],
                option_b: data.options[[i, j, k, 1]],
                choice: if missing { MISSING_CHOICE } else { choice },
                reward: if missing { 0 } else { data.rewards[[i, j, k]] },
            });
        }
        for ((i, j, slot), &rating) in data.mood_ratings.indexed_iter() {
            table.ratings.push(RatingRecord {
                subject: i + 1,
                block: j + 1,
                slot: slot + 1,
                rating,
            });
        }
        for (i, &mood_override) in data.mood_override.iter().enumerate() {
            table.subjects.push(SubjectRecord {
                subject: i + 1,
                mood_override,
            });
        }
        table
    }

    /// Assemble and validate the tensors. Every subject × block × trial cell
    /// and every rating slot must be present exactly once.
    pub fn into_data(self) -> Result<TaskData> {
        let n = self.subjects.iter().map(|r| r.subject).max().unwrap_or(0);
        let b = self.trials.iter().map(|r| r.block).max().unwrap_or(0);
        let t = self.trials.iter().map(|r| r.trial).max().unwrap_or(0);

        let mut options = Array4::zeros((n, b, t, 2));
        let mut choices = Array3::from_elem((n, b, t), MISSING_CHOICE);
        let mut rewards = Array3::zeros((n, b, t));
        let mut seen = Array3::from_elem((n, b, t), false);
        for r in &self.trials {
            let (i, j, k) = to_index("trials", r.subject, r.block, r.trial, (n, b, t))?;
            if std::mem::replace(&mut seen[[i, j, k]], true) {
                return Err(duplicate("trials", r.subject, r.block, r.trial));
            }
            options[[i, j, k, 0]] = r.option_a;
            options[[i, j, k, 1]] = r.option_b;
            choices[[i, j, k]] = r.choice;
            rewards[[i, j, k]] = r.reward;
        }
        if let Some(((i, j, k), _)) = seen.indexed_iter().find(|(_, &s)| !s) {
            return Err(ModelError::IncompleteTable {
                what: "trials",
                subject: i + 1,
                block: j + 1,
                index: k + 1,
            });
        }

        let mut mood_ratings = Array3::zeros((n, b, N_CHECKPOINTS));
        let mut rated = Array3::from_elem((n, b, N_CHECKPOINTS), false);
        for r in &self.ratings {
            let (i, j, s) = to_index("ratings", r.subject, r.block, r.slot, (n, b, N_CHECKPOINTS))?;
            if std::mem::replace(&mut rated[[i, j, s]], true) {
                return Err(duplicate("ratings", r.subject, r.block, r.slot));
            }
            mood_ratings[[i, j, s]] = r.rating;
        }
        if let Some(((i, j, s), _)) = rated.indexed_iter().find(|(_, &s)| !s) {
            return Err(ModelError::IncompleteTable {
                what: "ratings",
                subject: i + 1,
                block: j + 1,
                index: s + 1,
            });
        }

        let mut mood_override = Array1::from_elem(n, f64::NAN);
        for r in &self.subjects {
            if r.subject == 0 {
                return Err(ModelError::RecordOutOfBounds {
                    what: "subjects",
                    subject: 0,
                    block: 0,
                    index: 0,
                });
            }
            if !mood_override[r.subject - 1].is_nan() {
                return Err(duplicate("subjects", r.subject, 0, 0));
            }
            mood_override[r.subject - 1] = r.mood_override;
        }
        if let Some(i) = mood_override.iter().position(|v| v.is_nan()) {
            return Err(ModelError::IncompleteTable {
                what: "subjects",
                subject: i + 1,
                block: 0,
                index: 0,
            });
        }

        TaskData::new(options, choices, rewards, mood_ratings, mood_override)
    }
}

fn to_index(
    what: &'static str,
    subject: usize,
    block: usize,
    index: usize,
    dims: (usize, usize, usize),
) -> Result<(usize, usize, usize)> {
    let inside = |v: usize, max: usize| v >= 1 && v <= max;
    if inside(subject, dims.0) && inside(block, dims.1) && inside(index, dims.2) {
        Ok((subject - 1, block - 1, index - 1))
    } else {
        Err(ModelError::RecordOutOfBounds {
            what,
            subject,
            block,
            index,
        })
    }
}

fn duplicate(what: &'static str, subject: usize, block: usize, index: usize) -> ModelError {
    ModelError::Diagnostics(format!(
        "{}: duplicate record for subject {}, block {}, index {}",
        what, subject, block, index
    ))
}

/// Read a JSON document.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// Write a JSON document, pretty-printed.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!("wrote {}", path.display());
    Ok(())
}

/// Load and validate a tabular dataset.
pub fn load_task(path: &Path) -> anyhow::Result<TaskData> {
    let table: TaskTable = read_json(path)?;
    let data = table
        .into_data()
        .with_context(|| format!("invalid task data in {}", path.display()))?;
    tracing::info!(
        subjects = data.n_subjects(),
        blocks = data.n_blocks(),
        trials = data.n_trials(),
        "loaded {}",
        path.display()
    );
    Ok(data)
}
