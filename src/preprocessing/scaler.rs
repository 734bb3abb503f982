//! Standard (z-score) scaling of numeric columns

use crate::data::DataTable;
use crate::error::{LoanEvalError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Parameters for one fitted column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub center: f64,
    pub scale: f64,
}

/// Scales each column to zero mean and unit (population) variance.
/// Constant columns are centred but left unscaled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl StandardScaler {
    /// Create a new scaler
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the scaler to `columns` of `table`
    pub fn fit(&mut self, table: &DataTable, columns: &[String]) -> Result<&mut Self> {
        let mut params = Vec::with_capacity(columns.len());
        for name in columns {
            let values = table.numeric(name)?;
            params.push(Self::compute_params(values));
        }

        self.columns = columns.to_vec();
        self.params = params;
        self.is_fitted = true;
        Ok(self)
    }

    fn compute_params(values: &[f64]) -> ScalerParams {
        if values.is_empty() {
            return ScalerParams { center: 0.0, scale: 1.0 };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        ScalerParams {
            center: mean,
            scale: if std == 0.0 { 1.0 } else { std },
        }
    }

    /// Scaled values of the fitted columns as a dense matrix
    pub fn transform(&self, table: &DataTable) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(LoanEvalError::ModelNotFitted);
        }

        let cols: Vec<&[f64]> = self
            .columns
            .iter()
            .map(|n| table.numeric(n))
            .collect::<Result<_>>()?;

        Ok(Array2::from_shape_fn((table.n_rows(), cols.len()), |(r, c)| {
            let p = &self.params[c];
            (cols[c][r] - p.center) / p.scale
        }))
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, table: &DataTable, columns: &[String]) -> Result<Array2<f64>> {
        self.fit(table, columns)?;
        self.transform(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn params(&self) -> &[ScalerParams] {
        &self.params
    }
}
