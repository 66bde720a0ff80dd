//! Likelihood aggregation across subjects.
//!
//! Subjects are independent given a parameter draw, so they are replayed in
//! parallel and their contributions summed in subject order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::TaskData;
use crate::error::{ModelError, Result};
use crate::params::ModelParams;

use super::subject::{replay, SubjectTrace};
use super::trial::PassMode;
use super::ModelConfig;

/// Log-likelihood split by observation type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LikelihoodBreakdown {
    /// Sum of choice log-probabilities.
    pub choice: f64,
    /// Sum of mood-rating log-densities.
    pub mood: f64,
    /// Per-subject totals.
    pub per_subject: Vec<f64>,
}

impl LikelihoodBreakdown {
    pub fn total(&self) -> f64 {
        self.choice + self.mood
    }
}

/// Check that a parameter draw fits the dataset and that the dataset still
/// honours its contract; fields are public and may have changed since `new`.
pub(crate) fn check_compatible(params: &ModelParams, data: &TaskData) -> Result<()> {
    data.validate()?;
    if params.n_subjects() != data.n_subjects() {
        return Err(ModelError::ShapeMismatch {
            what: "subject parameters",
            expected: vec![data.n_subjects()],
            found: vec![params.n_subjects()],
        });
    }
    params.validate()
}

/// Replay every subject in scoring mode.
pub fn score_subjects(
    params: &ModelParams,
    data: &TaskData,
    config: &ModelConfig,
) -> Result<Vec<SubjectTrace>> {
    check_compatible(params, data)?;

    let run = |i: usize| {
        let subject = params.subject(i, config.cdf);
        replay(&subject, &data.subject(i), params.mood_noise, PassMode::Score)
    };

    if config.parallel {
        (0..data.n_subjects()).into_par_iter().map(run).collect()
    } else {
        (0..data.n_subjects()).map(run).collect()
    }
}

/// Total log-likelihood of the observed choices and mood ratings.
pub fn log_likelihood(
    params: &ModelParams,
    data: &TaskData,
    config: &ModelConfig,
) -> Result<LikelihoodBreakdown> {
    let traces = score_subjects(params, data, config)?;

    let mut breakdown = LikelihoodBreakdown {
        choice: 0.0,
        mood: 0.0,
        per_subject: Vec::with_capacity(traces.len()),
    };
    for trace in &traces {
        let (choice, mood) = (trace.choice_total(), trace.mood_total());
        breakdown.choice += choice;
        breakdown.mood += mood;
        breakdown.per_subject.push(choice + mood);
    }

    let total = breakdown.total();
    if !total.is_finite() {
        return Err(ModelError::NonFiniteDensity {
            value: total,
            context: "log-likelihood".to_string(),
        });
    }

    tracing::trace!(
        choice = breakdown.choice,
        mood = breakdown.mood,
        "log-likelihood evaluated"
    );
    Ok(breakdown)
}
