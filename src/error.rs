//! Error taxonomy for model evaluation.
//!
//! Contract violations are reported with 1-based (subject, block, trial)
//! coordinates and raised before any latent state is touched. Domain
//! violations carry the offending value. Missing choices are never errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("subject {subject}, block {block}, trial {trial}: option identity {value} outside [1, {max}]")]
    OptionOutOfRange {
        subject: usize,
        block: usize,
        trial: usize,
        value: i32,
        max: usize,
    },

    #[error("subject {subject}, block {block}, trial {trial}: choice code {value} is not missing, 1 or 2")]
    ChoiceOutOfRange {
        subject: usize,
        block: usize,
        trial: usize,
        value: i32,
    },

    #[error("subject {subject}, block {block}, trial {trial}: reward {value} is not binary")]
    RewardNotBinary {
        subject: usize,
        block: usize,
        trial: usize,
        value: i32,
    },

    #[error("subject {subject}, block {block}, slot {slot}: mood rating {value} is not finite")]
    RatingNotFinite {
        subject: usize,
        block: usize,
        slot: usize,
        value: f64,
    },

    #[error("subject {subject}: mood override {value} outside (-1, 1)")]
    OverrideOutOfDomain { subject: usize, value: f64 },

    #[error("subject {subject}: mood-sensitivity base {value} must be positive")]
    NonPositiveMoodBase { subject: usize, value: f64 },

    #[error("parameter {name} = {value} is invalid: {reason}")]
    InvalidParameter {
        name: String,
        value: f64,
        reason: &'static str,
    },

    #[error("{what}: expected shape {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("{what}: missing record for subject {subject}, block {block}, index {index}")]
    IncompleteTable {
        what: &'static str,
        subject: usize,
        block: usize,
        index: usize,
    },

    #[error("{what}: record for subject {subject}, block {block}, index {index} is outside the declared design")]
    RecordOutOfBounds {
        what: &'static str,
        subject: usize,
        block: usize,
        index: usize,
    },

    #[error("non-finite log density {value} ({context})")]
    NonFiniteDensity { value: f64, context: String },

    #[error("{0}")]
    Diagnostics(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
