//! # moodrl
//!
//! Hierarchical model of sequential choice in a probabilistic reward-learning
//! task, where value learning and mood are modelled jointly.
//!
//! ## Model
//!
//! Each subject carries a latent state of nine option values `Q`, a
//! reward-history trace `h` and a mood `m ∈ (-1, 1)`. Per non-missing trial:
//!
//! ```text
//! P(choice)  = softmax(β · Q[a], β · Q[b])
//! δ          = f^m · R − Q[chosen]
//! Q[chosen] += η_v · δ
//! h         += η_h · (δ − h)
//! m          = tanh(β_h + h)
//! ```
//!
//! Mood ratings at trials 7, 21 and 35 of each block are scored as
//! `Normal(rating | m, σ_m)`. At the start of the second block, mood is pinned
//! to an externally measured value and `h` is back-solved from it.
//!
//! ## Layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`params`] | Hierarchical prior, non-centered transform, flat sampler layout |
//! | [`core`] | Latent state, shared trial transition, per-subject replay, likelihood, predictive generation |
//! | [`data`] | Validated task tensors, tabular I/O, synthetic task generation |
//! | [`diagnostics`] | Pointwise log-likelihood, WAIC comparison, HDI summaries |

pub mod core;
pub mod data;
pub mod diagnostics;
pub mod error;
pub mod params;

pub use error::{ModelError, Result};

/// Model-wide constants.
pub mod config {
    /// Number of distinct option identities (slot machines).
    pub const N_OPTIONS: usize = 9;

    /// Options presented on each trial.
    pub const N_PRESENTED: usize = 2;

    /// Number of hierarchically pooled subject parameters (β, η_v, η_h, f).
    pub const N_POOLED: usize = 4;

    /// Trials (1-based, within a block) at which mood is rated.
    pub const MOOD_CHECKPOINTS: [usize; 3] = [7, 21, 35];

    /// Mood ratings per block.
    pub const N_CHECKPOINTS: usize = MOOD_CHECKPOINTS.len();

    /// Upper bound of the inverse temperature.
    pub const BETA_MAX: f64 = 20.0;

    /// Zero-based index of the block whose start pins mood to the override.
    pub const OVERRIDE_BLOCK: usize = 1;

    /// Choice code written for missing trials. Any non-positive input code is
    /// read as missing.
    pub const MISSING_CHOICE: i32 = 0;

    /// Returns the rating slot for a zero-based trial index, or None.
    pub fn checkpoint_slot(trial: usize) -> Option<usize> {
        MOOD_CHECKPOINTS.iter().position(|&k| k == trial + 1)
    }

    /// Returns whether a raw choice code marks a missing trial.
    pub fn is_missing(choice: i32) -> bool {
        choice <= 0
    }
}
