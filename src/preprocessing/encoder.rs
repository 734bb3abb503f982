//! One-hot encoding of categorical columns

use crate::data::DataTable;
use crate::error::{LoanEvalError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// One-hot encoder; categories unseen during fit encode as all zeros
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OneHotEncoder {
    columns: Vec<String>,
    /// Sorted categories per column
    categories: Vec<Vec<String>>,
    is_fitted: bool,
}

impl OneHotEncoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn the categories of `columns`
    pub fn fit(&mut self, table: &DataTable, columns: &[String]) -> Result<&mut Self> {
        let mut categories = Vec::with_capacity(columns.len());
        for name in columns {
            let mut values: Vec<String> = table.categorical(name)?.to_vec();
            values.sort();
            values.dedup();
            categories.push(values);
        }

        self.columns = columns.to_vec();
        self.categories = categories;
        self.is_fitted = true;
        Ok(self)
    }

    /// Number of output columns
    pub fn n_outputs(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    /// Output names in `column=category` form
    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .zip(&self.categories)
            .flat_map(|(col, cats)| cats.iter().map(move |c| format!("{}={}", col, c)))
            .collect()
    }

    pub fn transform(&self, table: &DataTable) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(LoanEvalError::ModelNotFitted);
        }

        let mut out = Array2::zeros((table.n_rows(), self.n_outputs()));
        let mut offset = 0;
        for (name, cats) in self.columns.iter().zip(&self.categories) {
            let values = table.categorical(name)?;
            for (row, value) in values.iter().enumerate() {
                if let Ok(pos) = cats.binary_search(value) {
                    out[[row, offset + pos]] = 1.0;
                }
            }
            offset += cats.len();
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, table: &DataTable, columns: &[String]) -> Result<Array2<f64>> {
        self.fit(table, columns)?;
        self.transform(table)
    }
}
