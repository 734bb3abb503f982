//! Column-wise preprocessing: scaled numeric block followed by one-hot block

use super::{OneHotEncoder, StandardScaler};
use crate::data::DataTable;
use crate::error::{LoanEvalError, Result};
use ndarray::{concatenate, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Applies a [`StandardScaler`] to numeric columns and a [`OneHotEncoder`]
/// to categorical columns, producing one dense matrix
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnTransformer {
    numeric_columns: Vec<String>,
    categorical_columns: Vec<String>,
    scaler: StandardScaler,
    encoder: OneHotEncoder,
    is_fitted: bool,
}

impl ColumnTransformer {
    /// Create a transformer for explicit column lists
    pub fn new(numeric_columns: Vec<String>, categorical_columns: Vec<String>) -> Self {
        Self {
            numeric_columns,
            categorical_columns,
            ..Default::default()
        }
    }

    /// Split the table's columns into numeric and categorical by dtype
    pub fn from_table(table: &DataTable) -> Self {
        Self::new(table.numeric_columns(), table.categorical_columns())
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric_columns
    }

    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical_columns
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn fit(&mut self, table: &DataTable) -> Result<&mut Self> {
        self.check_columns(table)?;
        self.scaler.fit(table, &self.numeric_columns)?;
        self.encoder.fit(table, &self.categorical_columns)?;
        self.is_fitted = true;
        Ok(self)
    }

    /// Transform `table`; fails on missing columns or non-finite output
    pub fn transform(&self, table: &DataTable) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(LoanEvalError::ModelNotFitted);
        }
        self.check_columns(table)?;

        let extras: Vec<&String> = table
            .names()
            .iter()
            .filter(|n| !self.numeric_columns.contains(*n) && !self.categorical_columns.contains(*n))
            .collect();
        if !extras.is_empty() {
            warn!(?extras, "dropped unseen columns at predict-time");
        }

        let numeric = self.scaler.transform(table)?;
        let categorical = self.encoder.transform(table)?;
        let out = concatenate(Axis(1), &[numeric.view(), categorical.view()])?;

        if out.iter().any(|v| !v.is_finite()) {
            return Err(LoanEvalError::NonFinite("preprocessing".to_string()));
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, table: &DataTable) -> Result<Array2<f64>> {
        self.fit(table)?;
        self.transform(table)
    }

    /// Names of the output matrix columns
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.numeric_columns.clone();
        names.extend(self.encoder.feature_names());
        names
    }

    fn check_columns(&self, table: &DataTable) -> Result<()> {
        let mut missing: Vec<&str> = self
            .numeric_columns
            .iter()
            .chain(&self.categorical_columns)
            .filter(|n| !table.has_column(n))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort_unstable();
        Err(LoanEvalError::MissingColumn(format!(
            "missing columns for transform: {}",
            missing.join(", ")
        )))
    }
}
