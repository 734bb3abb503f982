//! Reliability curve data

use crate::error::{LoanEvalError, Result};
use ndarray::Array1;

/// Reliability curve over `n_bins` uniform bins on `[0, 1]`.
///
/// Returns `(fraction_of_positives, mean_predicted_probability)`, one entry
/// per non-empty bin in ascending order. A probability on an inner edge
/// falls into the upper bin; `1.0` falls into the last bin.
pub fn calibration_curve(
    y_true: &Array1<f64>,
    y_prob: &Array1<f64>,
    n_bins: usize,
) -> Result<(Vec<f64>, Vec<f64>)> {
    if y_true.len() != y_prob.len() {
        return Err(LoanEvalError::ShapeError {
            expected: format!("{} probabilities", y_true.len()),
            actual: format!("{} probabilities", y_prob.len()),
        });
    }
    if n_bins == 0 {
        return Err(LoanEvalError::invalid_param("n_bins", n_bins, "must be at least 1"));
    }
    if y_prob.iter().any(|p| !(0.0..=1.0).contains(p)) {
        return Err(LoanEvalError::InvalidInput(
            "probabilities must lie in [0, 1]".to_string(),
        ));
    }

    let mut counts = vec![0usize; n_bins];
    let mut positives = vec![0.0; n_bins];
    let mut prob_sums = vec![0.0; n_bins];

    for (&y, &p) in y_true.iter().zip(y_prob.iter()) {
        let bin = ((p * n_bins as f64).floor() as usize).min(n_bins - 1);
        counts[bin] += 1;
        positives[bin] += y;
        prob_sums[bin] += p;
    }

    let (frac_pos, mean_pred) = (0..n_bins)
        .filter(|&b| counts[b] > 0)
        .map(|b| (positives[b] / counts[b] as f64, prob_sums[b] / counts[b] as f64))
        .unzip();
    Ok((frac_pos, mean_pred))
}
