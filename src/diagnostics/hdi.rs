//! Interval estimates and posterior summaries.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::params::{CdfKind, GroupSummary, ModelParams, Pooled};

/// Highest-density interval: the shortest interval between sample points
/// that contains `cred_mass` of the sample.
pub fn hdi(samples: &[f64], cred_mass: f64) -> Result<(f64, f64)> {
    if samples.is_empty() {
        return Err(ModelError::Diagnostics("HDI of an empty sample".to_string()));
    }
    if !(cred_mass > 0.0 && cred_mass < 1.0) {
        return Err(ModelError::InvalidParameter {
            name: "cred_mass".to_string(),
            value: cred_mass,
            reason: "must lie in (0, 1)",
        });
    }
    if samples.iter().any(|v| v.is_nan()) {
        return Err(ModelError::Diagnostics("HDI sample contains NaN".to_string()));
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let width = ((cred_mass * n as f64).ceil() as usize).min(n - 1);
    if width == 0 {
        return Ok((sorted[0], sorted[0]));
    }

    let (lo, _) = (0..n - width)
        .map(|i| (i, sorted[i + width] - sorted[i]))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best });
    Ok((sorted[lo], sorted[lo + width]))
}

/// Standardise to zero mean and unit (population) standard deviation.
pub fn zscore(xs: &[f64]) -> Vec<f64> {
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let sd = (xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();
    xs.iter().map(|x| (x - mean) / sd).collect()
}

/// Posterior mean and HDI of one quantity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub name: String,
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Summary {
    pub fn of(name: impl Into<String>, samples: &[f64], cred_mass: f64) -> Result<Self> {
        let (lower, upper) = hdi(samples, cred_mass)?;
        Ok(Self {
            name: name.into(),
            mean: samples.iter().sum::<f64>() / samples.len() as f64,
            lower,
            upper,
        })
    }
}

/// Summaries of the group means on the bounded scale, in pooled order.
pub fn summarize_group(
    draws: &[ModelParams],
    cdf: CdfKind,
    cred_mass: f64,
) -> Result<Vec<Summary>> {
    let groups: Vec<GroupSummary> = draws.iter().map(|d| d.group_summary(cdf)).collect();
    Pooled::ALL
        .iter()
        .map(|&p| {
            let values: Vec<f64> = groups.iter().map(|g| g.get(p)).collect();
            Summary::of(p.name(), &values, cred_mass)
        })
        .collect()
}
