//! Pointwise log-likelihood matrices built from predictive draws.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::{is_missing, MOOD_CHECKPOINTS, N_CHECKPOINTS};
use crate::core::predictive::PredictiveDraw;
use crate::data::TaskData;
use crate::error::{ModelError, Result};

/// Which observations enter the matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Observations {
    Choice,
    Mood,
    #[default]
    Both,
}

impl Observations {
    fn choices(self) -> bool {
        matches!(self, Observations::Choice | Observations::Both)
    }

    fn moods(self) -> bool {
        matches!(self, Observations::Mood | Observations::Both)
    }
}

/// Draws × observations log-likelihood matrix.
///
/// Choice columns come first in (subject, block, trial) order, skipping
/// missing trials. Mood columns follow in (subject, block, slot) order,
/// skipping checkpoints past the end of the block.
pub fn pointwise_log_lik(
    draws: &[PredictiveDraw],
    data: &TaskData,
    which: Observations,
) -> Result<Array2<f64>> {
    if draws.is_empty() {
        return Err(ModelError::Diagnostics("no predictive draws".to_string()));
    }

    let (n, b, t) = data.choices.dim();
    let mut columns: Vec<Column> = Vec::new();
    if which.choices() {
        for ((i, j, k), &c) in data.choices.indexed_iter() {
            if !is_missing(c) {
                columns.push(Column::Choice(i, j, k));
            }
        }
    }
    if which.moods() {
        for i in 0..n {
            for j in 0..b {
                for (s, &k) in MOOD_CHECKPOINTS.iter().enumerate() {
                    if k <= t {
                        columns.push(Column::Mood(i, j, s));
                    }
                }
            }
        }
    }

    let mut out = Array2::zeros((draws.len(), columns.len()));
    for (d, draw) in draws.iter().enumerate() {
        if draw.choice_log_lik.dim() != (n, b, t) {
            let (dn, db, dt) = draw.choice_log_lik.dim();
            return Err(ModelError::ShapeMismatch {
                what: "predictive draw",
                expected: vec![n, b, t],
                found: vec![dn, db, dt],
            });
        }
        if draw.mood_log_lik.dim() != (n, b, N_CHECKPOINTS) {
            return Err(ModelError::ShapeMismatch {
                what: "predictive mood log-likelihood",
                expected: vec![n, b, N_CHECKPOINTS],
                found: draw.mood_log_lik.shape().to_vec(),
            });
        }
        for (c, col) in columns.iter().enumerate() {
            out[[d, c]] = match *col {
                Column::Choice(i, j, k) => draw.choice_log_lik[[i, j, k]],
                Column::Mood(i, j, s) => draw.mood_log_lik[[i, j, s]],
            };
        }
    }

    tracing::debug!(
        draws = draws.len(),
        observations = columns.len(),
        "pointwise log-likelihood assembled"
    );
    Ok(out)
}

#[derive(Clone, Copy)]
enum Column {
    Choice(usize, usize, usize),
    Mood(usize, usize, usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MISSING_CHOICE;
    use ndarray::{Array1, Array3, Array4};

    fn data(t: usize) -> TaskData {
        let (n, b) = (2, 2);
        let mut options = Array4::from_elem((n, b, t, 2), 1);
        options.slice_mut(ndarray::s![.., .., .., 1]).fill(2);
        let mut choices = Array3::from_elem((n, b, t), 1);
        choices[[1, 0, 0]] = MISSING_CHOICE;
        TaskData::new(
            options,
            choices,
            Array3::zeros((n, b, t)),
            Array3::zeros((n, b, N_CHECKPOINTS)),
            Array1::zeros(n),
        )
        .unwrap()
    }

    fn draw(t: usize, fill: f64) -> PredictiveDraw {
        let mut choice_log_lik = Array3::from_elem((2, 2, t), fill);
        choice_log_lik[[1, 0, 0]] = 0.0;
        PredictiveDraw {
            choices: Array3::ones((2, 2, t)),
            history: Array3::zeros((2, 2, t)),
            mood: Array3::zeros((2, 2, t)),
            choice_log_lik,
            mood_log_lik: Array3::from_elem((2, 2, N_CHECKPOINTS), fill * 2.0),
        }
    }

    #[test]
    fn test_missing_choice_columns_dropped() {
        let m = pointwise_log_lik(&[draw(40, -0.5)], &data(40), Observations::Choice).unwrap();
        assert_eq!(m.dim(), (1, 2 * 2 * 40 - 1));
        assert!(m.iter().all(|&v| v == -0.5));
    }

    #[test]
    fn test_both_concatenates_choice_then_mood() {
        let draws = [draw(40, -0.5), draw(40, -0.25)];
        let m = pointwise_log_lik(&draws, &data(40), Observations::Both).unwrap();
        assert_eq!(m.dim(), (2, 159 + 12));
        assert_eq!(m[[0, 158]], -0.5);
        assert_eq!(m[[0, 159]], -1.0);
        assert_eq!(m[[1, 170]], -0.5);
    }

    #[test]
    fn test_unreached_checkpoints_dropped() {
        let m = pointwise_log_lik(&[draw(21, -0.5)], &data(21), Observations::Mood).unwrap();
        // Slots at trials 7 and 21 only.
        assert_eq!(m.ncols(), 2 * 2 * 2);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let err = pointwise_log_lik(&[draw(30, -0.5)], &data(40), Observations::Choice);
        assert!(matches!(err, Err(ModelError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_mood_shape_mismatch_rejected() {
        let mut d = draw(40, -0.5);
        d.mood_log_lik = Array3::zeros((1, 1, N_CHECKPOINTS));
        let err = pointwise_log_lik(&[d], &data(40), Observations::Mood);
        assert!(matches!(
            err,
            Err(ModelError::ShapeMismatch { what: "predictive mood log-likelihood", .. })
        ));
    }

    #[test]
    fn test_no_draws_rejected() {
        assert!(pointwise_log_lik(&[], &data(10), Observations::Both).is_err());
    }
}
