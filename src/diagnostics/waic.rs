//! Widely applicable information criterion and two-model comparison.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// `log(mean(exp(xs)))` without overflow.
pub fn log_mean_exp(xs: ArrayView1<f64>) -> f64 {
    let max = xs.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    if !max.is_finite() {
        return max;
    }
    let sum: f64 = xs.iter().map(|&x| (x - max).exp()).sum();
    max + (sum / xs.len() as f64).ln()
}

/// Per-observation WAIC terms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waic {
    /// `lppd_i − p_waic_i` for each observation.
    pub elpd: Array1<f64>,
    /// Posterior variance of each observation's log-likelihood.
    pub p_waic: Array1<f64>,
}

impl Waic {
    pub fn n_observations(&self) -> usize {
        self.elpd.len()
    }

    /// Summed elpd.
    pub fn total(&self) -> f64 {
        self.elpd.sum()
    }

    /// `−2 · elpd`, the deviance scale.
    pub fn deviance(&self) -> f64 {
        -2.0 * self.total()
    }

    /// Effective number of parameters.
    pub fn effective_parameters(&self) -> f64 {
        self.p_waic.sum()
    }
}

/// WAIC of a draws × observations log-likelihood matrix.
pub fn waic(log_lik: &Array2<f64>) -> Result<Waic> {
    let (draws, obs) = log_lik.dim();
    if draws < 2 || obs == 0 {
        return Err(ModelError::Diagnostics(format!(
            "WAIC needs at least 2 draws and 1 observation, got {} × {}",
            draws, obs
        )));
    }
    if log_lik.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::Diagnostics(
            "log-likelihood matrix has non-finite entries".to_string(),
        ));
    }

    let lppd: Array1<f64> = log_lik.axis_iter(Axis(1)).map(log_mean_exp).collect();
    let p_waic = log_lik.var_axis(Axis(0), 0.0);
    Ok(Waic {
        elpd: &lppd - &p_waic,
        p_waic,
    })
}

/// Deviance-scale comparison of two models on the same observations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub a: f64,
    pub b: f64,
    /// `a − b`; negative favours `a`.
    pub diff: f64,
    /// Standard error of `diff`.
    pub se: f64,
}

pub fn compare(a: &Waic, b: &Waic) -> Result<Comparison> {
    let n = a.n_observations();
    if n != b.n_observations() {
        return Err(ModelError::ShapeMismatch {
            what: "WAIC observations",
            expected: vec![n],
            found: vec![b.n_observations()],
        });
    }
    let pointwise = (&a.elpd - &b.elpd) * -2.0;
    let se = (n as f64 * pointwise.var(0.0)).sqrt();
    let (da, db) = (a.deviance(), b.deviance());
    Ok(Comparison {
        a: da,
        b: db,
        diff: da - db,
        se,
    })
}
