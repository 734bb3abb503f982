//! Platt scaling (sigmoid calibration)

use crate::calibration::Calibrator;
use crate::error::{LoanEvalError, Result};
use crate::training::sigmoid;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Platt scaling calibrator
///
/// Fits a sigmoid `P(y=1|f) = 1 / (1 + exp(-(A*f + B)))` where `f` is an
/// uncalibrated score. As a [`Calibrator`] the score is the logit of the
/// input probability; [`PlattScaling::fit_scores`] takes raw decision values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlattScaling {
    /// Slope parameter A
    a: Option<f64>,
    /// Intercept parameter B
    b: Option<f64>,
    /// Maximum iterations
    max_iter: usize,
    /// Convergence tolerance
    tol: f64,
}

impl PlattScaling {
    /// Create new Platt scaling calibrator
    pub fn new() -> Self {
        Self {
            a: None,
            b: None,
            max_iter: 100,
            tol: 1e-9,
        }
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Get fitted parameters
    pub fn parameters(&self) -> Option<(f64, f64)> {
        match (self.a, self.b) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        }
    }

    fn logit(p: f64) -> f64 {
        let p = p.clamp(1e-10, 1.0 - 1e-10);
        (p / (1.0 - p)).ln()
    }

    /// Negative log-likelihood against smoothed targets
    fn objective(scores: &Array1<f64>, targets: &[f64], a: f64, b: f64) -> f64 {
        scores
            .iter()
            .zip(targets)
            .map(|(&f, &t)| {
                let z = a * f + b;
                // log(1 + exp(-z)) computed without overflow
                let log1p_exp_neg = if z >= 0.0 {
                    (-z).exp().ln_1p()
                } else {
                    -z + z.exp().ln_1p()
                };
                t * log1p_exp_neg + (1.0 - t) * (z + log1p_exp_neg)
            })
            .sum()
    }

    /// Fit on raw scores with Newton steps and backtracking
    pub fn fit_scores(&mut self, scores: &Array1<f64>, labels: &Array1<f64>) -> Result<()> {
        let n = scores.len();
        if n != labels.len() {
            return Err(LoanEvalError::ShapeError {
                expected: format!("{} labels", n),
                actual: format!("{} labels", labels.len()),
            });
        }
        if n == 0 {
            return Err(LoanEvalError::InvalidInput("cannot calibrate on empty input".to_string()));
        }

        // Platt's smoothed targets keep the optimum finite on separable data
        let n_pos = labels.iter().filter(|&&y| y > 0.5).count() as f64;
        let n_neg = n as f64 - n_pos;
        let target_pos = (n_pos + 1.0) / (n_pos + 2.0);
        let target_neg = 1.0 / (n_neg + 2.0);
        let targets: Vec<f64> = labels
            .iter()
            .map(|&y| if y > 0.5 { target_pos } else { target_neg })
            .collect();

        let mut a = 0.0;
        let mut b = ((n_pos + 1.0) / (n_neg + 1.0)).ln();
        let mut current = Self::objective(scores, &targets, a, b);

        for _ in 0..self.max_iter {
            let (mut grad_a, mut grad_b) = (0.0, 0.0);
            let (mut hess_aa, mut hess_ab, mut hess_bb) = (1e-12, 0.0, 1e-12);

            for (&f, &t) in scores.iter().zip(&targets) {
                let p = sigmoid(a * f + b);
                let d1 = p - t;
                let d2 = p * (1.0 - p);
                grad_a += f * d1;
                grad_b += d1;
                hess_aa += f * f * d2;
                hess_ab += f * d2;
                hess_bb += d2;
            }

            if grad_a.abs() < 1e-9 && grad_b.abs() < 1e-9 {
                break;
            }

            let det = hess_aa * hess_bb - hess_ab * hess_ab;
            if det.abs() < 1e-18 {
                break;
            }
            let delta_a = (hess_bb * grad_a - hess_ab * grad_b) / det;
            let delta_b = (hess_aa * grad_b - hess_ab * grad_a) / det;

            let mut step = 1.0;
            let mut improved = false;
            while step >= 1e-10 {
                let (na, nb) = (a - step * delta_a, b - step * delta_b);
                let candidate = Self::objective(scores, &targets, na, nb);
                if candidate < current + 1e-4 * step * (grad_a * -delta_a + grad_b * -delta_b) {
                    a = na;
                    b = nb;
                    current = candidate;
                    improved = true;
                    break;
                }
                step /= 2.0;
            }

            if !improved || (step * delta_a).abs().max((step * delta_b).abs()) < self.tol {
                break;
            }
        }

        self.a = Some(a);
        self.b = Some(b);
        Ok(())
    }

    /// Calibrated probability for raw scores
    pub fn predict_scores(&self, scores: &Array1<f64>) -> Result<Array1<f64>> {
        let (a, b) = self.parameters().ok_or(LoanEvalError::ModelNotFitted)?;
        Ok(scores.mapv(|f| sigmoid(a * f + b)))
    }
}

impl Default for PlattScaling {
    fn default() -> Self {
        Self::new()
    }
}

impl Calibrator for PlattScaling {
    fn fit(&mut self, probs: &Array1<f64>, labels: &Array1<f64>) -> Result<()> {
        self.fit_scores(&probs.mapv(Self::logit), labels)
    }

    fn calibrate(&self, probs: &Array1<f64>) -> Result<Array1<f64>> {
        self.predict_scores(&probs.mapv(Self::logit))
    }
}
