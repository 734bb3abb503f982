//! Linear models: penalised logistic regression and a least-squares helper

use super::{check_features, check_xy, sigmoid, ClassWeight};
use crate::error::{LoanEvalError, Result};
use crate::optimizer::ParameterValue;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Relative norm below which a column counts as dependent on earlier ones
const RANK_TOL: f64 = 1e-10;

/// Orthonormal basis of the column space of `x` by modified Gram-Schmidt
/// with one re-orthogonalisation pass. Columns whose residual norm falls
/// below `RANK_TOL` times their own norm are skipped, so the basis has the
/// rank of `x`.
pub(crate) fn orthonormal_basis(x: &Array2<f64>) -> Vec<Array1<f64>> {
    let mut basis: Vec<Array1<f64>> = Vec::with_capacity(x.ncols());
    for col in x.columns() {
        let norm = col.dot(&col).sqrt();
        if norm == 0.0 {
            continue;
        }
        let mut v = col.to_owned();
        for _ in 0..2 {
            for q in &basis {
                let proj = q.dot(&v);
                v.scaled_add(-proj, q);
            }
        }
        let residual = v.dot(&v).sqrt();
        if residual > RANK_TOL * norm {
            basis.push(v / residual);
        }
    }
    basis
}

/// Regularisation penalty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Penalty {
    L1,
    L2,
    ElasticNet,
}

impl Penalty {
    fn from_param(value: &ParameterValue) -> Result<Self> {
        match value.as_str("penalty")? {
            "l1" => Ok(Penalty::L1),
            "l2" => Ok(Penalty::L2),
            "elasticnet" => Ok(Penalty::ElasticNet),
            other => Err(LoanEvalError::invalid_param(
                "penalty",
                other,
                "expected l1, l2 or elasticnet",
            )),
        }
    }
}

/// Logistic regression for binary classification.
///
/// Minimises the mean (class-weighted) log loss plus `R(w) / (C * n)` with
/// proximal gradient descent, where `R` is the L1, L2 (`0.5 * ||w||^2`) or
/// elastic-net mix of both. The intercept is not penalised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: f64,
    /// Whether to fit intercept
    pub fit_intercept: bool,
    /// Inverse regularisation strength
    pub c: f64,
    pub penalty: Penalty,
    /// L1 share of the elastic-net penalty
    pub l1_ratio: f64,
    pub class_weight: ClassWeight,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the largest parameter update
    pub tol: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
            c: 1.0,
            penalty: Penalty::L2,
            l1_ratio: 0.5,
            class_weight: ClassWeight::Uniform,
            max_iter: 1000,
            tol: 1e-6,
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_penalty(mut self, penalty: Penalty) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match name {
            "C" => {
                let c = value.as_f64(name)?;
                if c <= 0.0 {
                    return Err(LoanEvalError::invalid_param(name, c, "must be positive"));
                }
                self.c = c;
            }
            "penalty" => self.penalty = Penalty::from_param(value)?,
            "l1_ratio" => {
                let r = value.as_f64(name)?;
                if !(0.0..=1.0).contains(&r) {
                    return Err(LoanEvalError::invalid_param(name, r, "must lie in [0, 1]"));
                }
                self.l1_ratio = r;
            }
            "class_weight" => self.class_weight = ClassWeight::from_param(name, value)?,
            "max_iter" => self.max_iter = value.as_usize(name)?,
            "tol" => self.tol = value.as_f64(name)?,
            other => {
                return Err(LoanEvalError::invalid_param(
                    other,
                    value,
                    "unknown parameter for logistic regression",
                ))
            }
        }
        Ok(())
    }

    fn l1_share(&self) -> f64 {
        match self.penalty {
            Penalty::L1 => 1.0,
            Penalty::L2 => 0.0,
            Penalty::ElasticNet => self.l1_ratio,
        }
    }

    /// Fit the model using proximal gradient descent
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        let n_samples = x.nrows() as f64;
        let n_features = x.ncols();

        let sample_weight = Array1::from_vec(self.class_weight.sample_weights(y));
        let lambda = 1.0 / (self.c * n_samples);
        let l1 = lambda * self.l1_share();
        let l2 = lambda * (1.0 - self.l1_share());

        // Step size from a Lipschitz bound of the smooth part
        let max_weight = sample_weight.iter().copied().fold(0.0, f64::max);
        let row_norm_sq = x.mapv(|v| v * v).sum() / n_samples;
        let lipschitz = max_weight * (row_norm_sq + 1.0) / 4.0 + l2;
        let step = 1.0 / lipschitz.max(1e-12);

        let mut weights: Array1<f64> = Array1::zeros(n_features);
        let mut bias = 0.0;

        for _iter in 0..self.max_iter {
            let linear = x.dot(&weights) + bias;
            let errors = (linear.mapv(sigmoid) - y) * &sample_weight;

            let grad_w = x.t().dot(&errors) / n_samples + l2 * &weights;
            let grad_b = errors.sum() / n_samples;

            let mut max_change: f64 = 0.0;
            for (w, g) in weights.iter_mut().zip(grad_w.iter()) {
                let z = *w - step * g;
                // soft threshold
                let updated = z.signum() * (z.abs() - step * l1).max(0.0);
                max_change = max_change.max((updated - *w).abs());
                *w = updated;
            }
            if self.fit_intercept {
                let delta = step * grad_b;
                bias -= delta;
                max_change = max_change.max(delta.abs());
            }

            if max_change < self.tol {
                break;
            }
        }

        self.coefficients = Some(weights);
        self.intercept = bias;
        Ok(self)
    }

    /// Linear decision values
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(LoanEvalError::ModelNotFitted)?;
        check_features(coefficients.len(), x)?;
        Ok(x.dot(coefficients) + self.intercept)
    }

    /// Predict probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    /// Count of coefficients driven exactly to zero
    pub fn n_zero_coefficients(&self) -> usize {
        self.coefficients
            .as_ref()
            .map(|c| c.iter().filter(|&&v| v == 0.0).count())
            .unwrap_or(0)
    }
}

/// Uncentred R² of an ordinary least-squares fit without intercept.
///
/// Projects `y` onto the column space of `x`, so collinear regressors
/// still give the least-squares fit of the remaining rank.
pub(crate) fn least_squares_r2(x: &Array2<f64>, y: &Array1<f64>) -> f64 {
    let ss_tot = y.dot(y);
    if ss_tot == 0.0 {
        return 0.0;
    }

    let mut residuals = y.clone();
    for q in orthonormal_basis(x) {
        let coef = q.dot(&residuals);
        residuals.scaled_add(-coef, &q);
    }
    let ss_res = residuals.dot(&residuals);
    (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [-2.0, 0.1],
            [-1.5, -0.3],
            [-1.0, 0.2],
            [-0.5, 0.0],
            [0.5, 0.1],
            [1.0, -0.2],
            [1.5, 0.3],
            [2.0, 0.0],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_logistic_regression_separates() {
        let (x, y) = blobs();
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        for (p, label) in proba.iter().zip(y.iter()) {
            assert_eq!((*p >= 0.5) as i32 as f64, *label);
        }
    }

    #[test]
    fn test_strong_l1_zeroes_coefficients() {
        let (x, y) = blobs();
        let mut model = LogisticRegression::new().with_penalty(Penalty::L1).with_c(0.001);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_zero_coefficients(), 2);
    }

    #[test]
    fn test_weaker_regularisation_grows_coefficients() {
        let (x, y) = blobs();
        let mut strong = LogisticRegression::new().with_c(0.01);
        let mut weak = LogisticRegression::new().with_c(10.0);
        strong.fit(&x, &y).unwrap();
        weak.fit(&x, &y).unwrap();
        let s = strong.coefficients.as_ref().unwrap()[0].abs();
        let w = weak.coefficients.as_ref().unwrap()[0].abs();
        assert!(w > s);
    }

    #[test]
    fn test_set_param() {
        let mut model = LogisticRegression::new();
        model.set_param("penalty", &"elasticnet".into()).unwrap();
        model.set_param("l1_ratio", &0.3.into()).unwrap();
        model.set_param("class_weight", &"balanced".into()).unwrap();
        assert_eq!(model.penalty, Penalty::ElasticNet);
        assert_eq!(model.class_weight, ClassWeight::Balanced);
        assert!(model.set_param("C", &(-1.0).into()).is_err());
        assert!(model.set_param("solver", &"saga".into()).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let (x, _) = blobs();
        assert!(LogisticRegression::new().predict_proba(&x).is_err());
    }

    #[test]
    fn test_basis_skips_dependent_columns() {
        let x = array![[1.0, 2.0, 0.0], [0.0, 0.0, 1.0], [1.0, 2.0, 1.0]];
        let basis = orthonormal_basis(&x);
        assert_eq!(basis.len(), 2);
        for q in &basis {
            assert!((q.dot(q) - 1.0).abs() < 1e-12);
        }
        assert!(basis[0].dot(&basis[1]).abs() < 1e-12);
    }

    #[test]
    fn test_r2_with_collinear_regressors() {
        // second regressor duplicates the first; y lies outside their span
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![1.0, -1.0, 1.0, -1.0];
        let r2 = least_squares_r2(&x, &y);
        assert!(r2 < 1.0);

        // same fit as the single-column design
        let single = x.slice(ndarray::s![.., 0..1]).to_owned();
        assert!((r2 - least_squares_r2(&single, &y)).abs() < 1e-12);

        let exact = array![2.0, 4.0, 6.0, 8.0];
        assert!((least_squares_r2(&x, &exact) - 1.0).abs() < 1e-12);
    }
}
