//! Isotonic regression calibration

use crate::calibration::Calibrator;
use crate::error::{LoanEvalError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Isotonic regression calibrator
///
/// Non-parametric calibration that fits a monotonically increasing step
/// function with the pool-adjacent-violators algorithm and interpolates
/// linearly between block boundaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IsotonicRegression {
    /// Block boundaries on the input axis
    x_values: Vec<f64>,
    /// Calibrated probability at each boundary
    y_values: Vec<f64>,
}

impl IsotonicRegression {
    /// Create new isotonic regression calibrator
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        !self.x_values.is_empty()
    }

    /// Pool Adjacent Violators Algorithm over already sorted targets.
    /// Returns `(block mean, block length)` pairs.
    fn pava(y: &[f64]) -> Vec<(f64, usize)> {
        let mut blocks: Vec<(f64, f64, usize)> = Vec::with_capacity(y.len());
        for &v in y {
            blocks.push((v, 1.0, 1));
            // merge backwards while the last two blocks violate monotonicity
            while blocks.len() >= 2 {
                let (m2, w2, n2) = blocks[blocks.len() - 1];
                let (m1, w1, n1) = blocks[blocks.len() - 2];
                if m1 <= m2 {
                    break;
                }
                blocks.truncate(blocks.len() - 2);
                blocks.push(((m1 * w1 + m2 * w2) / (w1 + w2), w1 + w2, n1 + n2));
            }
        }
        blocks.into_iter().map(|(m, _, n)| (m, n)).collect()
    }

    /// Interpolate calibrated value
    fn interpolate(&self, x: f64) -> f64 {
        let (xs, ys) = (&self.x_values, &self.y_values);
        let last = xs.len() - 1;
        if x <= xs[0] {
            return ys[0];
        }
        if x >= xs[last] {
            return ys[last];
        }

        // first boundary strictly above x
        let hi = xs.partition_point(|&v| v <= x);
        let lo = hi - 1;
        let (x0, x1, y0, y1) = (xs[lo], xs[hi], ys[lo], ys[hi]);
        if (x1 - x0).abs() < 1e-12 {
            return y0;
        }
        y0 + (x - x0) / (x1 - x0) * (y1 - y0)
    }
}

impl Calibrator for IsotonicRegression {
    fn fit(&mut self, probs: &Array1<f64>, labels: &Array1<f64>) -> Result<()> {
        let n = probs.len();
        if n != labels.len() {
            return Err(LoanEvalError::ShapeError {
                expected: format!("{} labels", n),
                actual: format!("{} labels", labels.len()),
            });
        }
        if n == 0 {
            return Err(LoanEvalError::InvalidInput("cannot calibrate on empty input".to_string()));
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| probs[a].partial_cmp(&probs[b]).unwrap_or(std::cmp::Ordering::Equal));

        let x_sorted: Vec<f64> = order.iter().map(|&i| probs[i]).collect();
        let y_sorted: Vec<f64> = order.iter().map(|&i| labels[i]).collect();

        // each block contributes its first and last input value
        let mut x_values = Vec::new();
        let mut y_values = Vec::new();
        let mut start = 0;
        for (mean, len) in Self::pava(&y_sorted) {
            let end = start + len - 1;
            x_values.push(x_sorted[start]);
            y_values.push(mean);
            if end > start && x_sorted[end] > x_sorted[start] {
                x_values.push(x_sorted[end]);
                y_values.push(mean);
            }
            start = end + 1;
        }

        self.x_values = x_values;
        self.y_values = y_values;
        Ok(())
    }

    fn calibrate(&self, probs: &Array1<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(LoanEvalError::ModelNotFitted);
        }
        Ok(probs.mapv(|p| self.interpolate(p).clamp(0.0, 1.0)))
    }
}
