// Temperature-scaled categorical sampling.
//
// A predictor returns one probability per vocabulary id. Before drawing, the
// distribution is reshaped by a temperature:
//
//   logit_i = ln(p_i) / T        p'_i = softmax(logit)_i
//
// T = 1 leaves the distribution as is, T -> 0 concentrates it on the argmax,
// T > 1 flattens it toward uniform. Zero-probability entries stay at zero
// (ln 0 is never evaluated). Log-probabilities are shifted by their maximum
// before the division, so tiny temperatures cannot overflow `exp` or yield
// NaN.
//
// The draw is a cumulative walk against one uniform value in [0, 1), taken
// from a caller-owned `MelodyRng`. `sample_with_unit` accepts that value
// directly so tests can pin the outcome.

use crate::error::{MelodyError, Result};
use folk_melody_prng::MelodyRng;

/// How far the input probabilities may sum from 1.0. Model outputs are
/// usually f32 softmax results, so exact normalization is not expected.
pub const NORMALIZATION_TOLERANCE: f64 = 1e-4;

/// Reshape `probabilities` by `temperature`. The result sums to 1.
pub fn rescale(probabilities: &[f64], temperature: f64) -> Result<Vec<f64>> {
    if !(temperature.is_finite() && temperature > 0.0) {
        return Err(MelodyError::InvalidDistribution(format!(
            "temperature must be positive and finite, got {temperature}"
        )));
    }
    if probabilities.is_empty() {
        return Err(MelodyError::InvalidDistribution("empty distribution".into()));
    }
    if let Some((i, p)) = probabilities
        .iter()
        .enumerate()
        .find(|(_, p)| !p.is_finite() || **p < 0.0)
    {
        return Err(MelodyError::InvalidDistribution(format!(
            "entry {i} is {p}"
        )));
    }
    let total: f64 = probabilities.iter().sum();
    if (total - 1.0).abs() > NORMALIZATION_TOLERANCE {
        return Err(MelodyError::InvalidDistribution(format!(
            "probabilities sum to {total}, not 1"
        )));
    }

    // Shift by the largest log-probability before dividing, so the argmax
    // always gets exp(0) = 1 and no temperature can produce -inf - -inf.
    let max_ln = probabilities
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|p| p.ln())
        .fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = probabilities
        .iter()
        .map(|&p| {
            if p > 0.0 {
                ((p.ln() - max_ln) / temperature).exp()
            } else {
                0.0
            }
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    let scaled: Vec<f64> = weights.into_iter().map(|w| w / sum).collect();
    if scaled.iter().any(|w| !w.is_finite()) {
        return Err(MelodyError::InvalidDistribution(format!(
            "temperature {temperature} produced non-finite weights"
        )));
    }
    Ok(scaled)
}

/// Draw an index using an explicit uniform value `unit` in [0, 1).
pub fn sample_with_unit(probabilities: &[f64], temperature: f64, unit: f64) -> Result<usize> {
    let scaled = rescale(probabilities, temperature)?;
    Ok(pick(&scaled, unit))
}

/// Draw an index, consuming one value from `rng`.
pub fn sample(probabilities: &[f64], temperature: f64, rng: &mut MelodyRng) -> Result<usize> {
    sample_with_unit(probabilities, temperature, rng.next_f64())
}

/// Cumulative walk over normalized weights.
fn pick(weights: &[f64], unit: f64) -> usize {
    let mut cumulative = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumulative += w;
        if w > 0.0 && cumulative > unit {
            return i;
        }
    }
    // Rounding left the total just under `unit`; take the last live entry.
    weights.iter().rposition(|&w| w > 0.0).unwrap_or(0)
}
