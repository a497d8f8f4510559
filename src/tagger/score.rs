//! Numeric building blocks of the scoring pipeline. All of them are total:
//! degenerate inputs map to defined fallbacks instead of NaN or panics.
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::ConfigError;

/// Min-max convert distances of one hit list to similarities in [0, 1],
/// nearest = 1. A list whose distances are all equal is uniformly 1.
#[must_use]
pub fn similarities(distances: &[f64]) -> Vec<f64> {
    let (min, max) = bounds(distances);
    let span = max - min;
    distances
        .iter()
        .map(|d| if span > 0.0 && span.is_finite() { 1.0 - (d - min) / span } else { 1.0 })
        .collect()
}

/// Competition ranks ("min" method), ascending: the smallest value gets 1 and
/// tied values share the lowest rank of their group.
#[must_use]
pub fn competition_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    let mut group_rank = 1usize;
    for (pos, &i) in order.iter().enumerate() {
        if pos > 0 && values[order[pos - 1]].total_cmp(&values[i]).is_ne() {
            group_rank = pos + 1;
        }
        ranks[i] = group_rank as f64;
    }
    ranks
}

/// Rescale to [0, 1]; a constant input maps to all ones.
#[must_use]
pub fn min_max(values: &[f64]) -> Vec<f64> {
    let (min, max) = bounds(values);
    let span = max - min;
    values.iter().map(|v| if span > 0.0 { (v - min) / span } else { 1.0 }).collect()
}

/// Sample variance; fewer than two values have variance 0.
#[must_use]
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
}

/// Which end of the row-variance spectrum the weighting penalizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightPolicy {
    /// `1 - var / maxVar`: the most-varying row weighs 0, flat rows keep weight 1.
    #[default]
    PenalizeVarying,
    /// `var / maxVar`: flat rows that score alike on every tag weigh 0.
    PenalizeUniform,
}

impl WeightPolicy {
    fn weight(self, ratio: f64) -> f64 {
        match self {
            WeightPolicy::PenalizeVarying => 1.0 - ratio,
            WeightPolicy::PenalizeUniform => ratio,
        }
    }
}

impl FromStr for WeightPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "varying" | "penalize_varying" => Ok(WeightPolicy::PenalizeVarying),
            "uniform" | "penalize_uniform" => Ok(WeightPolicy::PenalizeUniform),
            other => Err(ConfigError::InvalidWeightPolicy(other.to_string())),
        }
    }
}

/// Natural log of the sample variance of `exp(e)` over `exponents`.
/// Evaluated around the largest exponent so it never overflows; fewer than
/// two values or no spread give `-inf`.
#[must_use]
pub fn log_exp_variance(exponents: &[f64]) -> f64 {
    if exponents.len() < 2 {
        return f64::NEG_INFINITY;
    }
    let (_, max) = bounds(exponents);
    if !max.is_finite() {
        return f64::NEG_INFINITY;
    }
    let shifted: Vec<f64> = exponents.iter().map(|e| (e - max).exp()).collect();
    let var = sample_variance(&shifted);
    if var > 0.0 {
        var.ln() + 2.0 * max
    } else {
        f64::NEG_INFINITY
    }
}

/// Row weights from per-row log variances (see [`log_exp_variance`]).
/// Every row weighs 1 when no row varies; a NaN variance weighs 1.
#[must_use]
pub fn row_weights(log_variances: &[f64], policy: WeightPolicy) -> Vec<f64> {
    let max = log_variances.iter().copied().filter(|v| v.is_finite()).fold(f64::NEG_INFINITY, f64::max);
    log_variances
        .iter()
        .map(|lv| {
            if !max.is_finite() || lv.is_nan() {
                1.0
            } else {
                policy.weight((lv - max).exp().min(1.0))
            }
        })
        .collect()
}

fn bounds(values: &[f64]) -> (f64, f64) {
    values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}
