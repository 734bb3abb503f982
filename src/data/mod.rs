//! Tabular dataset handling
//!
//! The evaluation core works on a [`DataTable`]: named numeric and
//! categorical columns with no missing values. Tables are built from
//! polars DataFrames produced by [`load_csv`] and [`clean`].

mod loader;
mod split;

pub use loader::{clean, dataset_summary, drop_missing, load_csv, normalize_column_names};
pub use split::{stratified_split, TrainValTest};

use crate::error::{LoanEvalError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Values of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, ColumnData::Categorical(_))
    }

    /// Value at `row` as a grouping label
    pub fn label(&self, row: usize) -> String {
        match self {
            ColumnData::Numeric(v) => format_number(v[row]),
            ColumnData::Categorical(v) => v[row].clone(),
        }
    }

    fn select(&self, rows: &[usize]) -> ColumnData {
        match self {
            ColumnData::Numeric(v) => ColumnData::Numeric(rows.iter().map(|&r| v[r]).collect()),
            ColumnData::Categorical(v) => {
                ColumnData::Categorical(rows.iter().map(|&r| v[r].clone()).collect())
            }
        }
    }
}

/// Integral values print without a fractional part so `1.0` groups as `"1"`
pub(crate) fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

/// Cleaned dataset: ordered named columns of equal length
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    names: Vec<String>,
    columns: Vec<ColumnData>,
    n_rows: usize,
}

impl DataTable {
    /// Build a table from named columns
    pub fn new(columns: Vec<(String, ColumnData)>) -> Result<Self> {
        let n_rows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        let mut names = Vec::with_capacity(columns.len());
        let mut data = Vec::with_capacity(columns.len());

        for (name, column) in columns {
            if column.len() != n_rows {
                return Err(LoanEvalError::ShapeError {
                    expected: format!("{} rows", n_rows),
                    actual: format!("{} rows in column '{}'", column.len(), name),
                });
            }
            if names.contains(&name) {
                return Err(LoanEvalError::InvalidInput(format!("duplicate column '{}'", name)));
            }
            if let ColumnData::Numeric(values) = &column {
                if values.iter().any(|v| v.is_nan()) {
                    return Err(LoanEvalError::DataError(format!(
                        "column '{}' contains missing values",
                        name
                    )));
                }
            }
            names.push(name);
            data.push(column);
        }

        Ok(Self { names, columns: data, n_rows })
    }

    /// Convert a polars DataFrame; string columns become categorical,
    /// everything else is cast to f64
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let mut columns = Vec::with_capacity(df.width());

        for column in df.get_columns() {
            let name = column.name().to_string();
            let series = column.as_materialized_series();
            if series.null_count() > 0 {
                return Err(LoanEvalError::DataError(format!(
                    "column '{}' has {} missing values",
                    name,
                    series.null_count()
                )));
            }

            let data = match series.dtype() {
                DataType::String => {
                    let values = series
                        .str()?
                        .into_iter()
                        .map(|v| v.unwrap_or_default().to_string())
                        .collect();
                    ColumnData::Categorical(values)
                }
                _ => {
                    let casted = series.cast(&DataType::Float64)?;
                    let values = casted
                        .f64()?
                        .into_iter()
                        .map(|v| v.unwrap_or(f64::NAN))
                        .collect();
                    ColumnData::Numeric(values)
                }
            };
            columns.push((name, data));
        }

        Self::new(columns)
    }

    /// Back to a polars DataFrame, e.g. for writing
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let columns: Vec<Column> = self
            .names
            .iter()
            .zip(&self.columns)
            .map(|(name, data)| match data {
                ColumnData::Numeric(v) => Series::new(name.as_str().into(), v).into(),
                ColumnData::Categorical(v) => Series::new(name.as_str().into(), v).into(),
            })
            .collect();
        Ok(DataFrame::new(columns)?)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
    }

    fn require(&self, name: &str) -> Result<&ColumnData> {
        self.column(name)
            .ok_or_else(|| LoanEvalError::MissingColumn(name.to_string()))
    }

    /// Names of numeric columns in table order
    pub fn numeric_columns(&self) -> Vec<String> {
        self.names
            .iter()
            .zip(&self.columns)
            .filter(|(_, c)| !c.is_categorical())
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Names of categorical columns in table order
    pub fn categorical_columns(&self) -> Vec<String> {
        self.names
            .iter()
            .zip(&self.columns)
            .filter(|(_, c)| c.is_categorical())
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Numeric column values
    pub fn numeric(&self, name: &str) -> Result<&[f64]> {
        match self.require(name)? {
            ColumnData::Numeric(v) => Ok(v),
            ColumnData::Categorical(_) => Err(LoanEvalError::InvalidInput(format!(
                "column '{}' is categorical, expected numeric",
                name
            ))),
        }
    }

    /// Categorical column values
    pub fn categorical(&self, name: &str) -> Result<&[String]> {
        match self.require(name)? {
            ColumnData::Categorical(v) => Ok(v),
            ColumnData::Numeric(_) => Err(LoanEvalError::InvalidInput(format!(
                "column '{}' is numeric, expected categorical",
                name
            ))),
        }
    }

    /// Dense matrix of the given numeric columns
    pub fn numeric_matrix(&self, names: &[String]) -> Result<Array2<f64>> {
        let cols: Vec<&[f64]> = names
            .iter()
            .map(|n| self.numeric(n))
            .collect::<Result<_>>()?;
        Ok(Array2::from_shape_fn((self.n_rows, cols.len()), |(r, c)| cols[c][r]))
    }

    /// Remove `target` and return it as a 0/1 label vector
    pub fn split_target(&self, target: &str) -> Result<(DataTable, Array1<f64>)> {
        let y = match self.require(target)? {
            ColumnData::Numeric(v) => v.clone(),
            ColumnData::Categorical(_) => {
                return Err(LoanEvalError::InvalidInput(format!(
                    "target column '{}' must be numeric 0/1",
                    target
                )))
            }
        };
        if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(LoanEvalError::InvalidInput(format!(
                "target column '{}' must contain only 0/1, found {}",
                target, bad
            )));
        }
        Ok((self.drop_column(target), Array1::from_vec(y)))
    }

    /// Copy without `name`; unknown names leave the table unchanged
    pub fn drop_column(&self, name: &str) -> DataTable {
        let (names, columns) = self
            .names
            .iter()
            .zip(&self.columns)
            .filter(|(n, _)| n.as_str() != name)
            .map(|(n, c)| (n.clone(), c.clone()))
            .unzip();
        DataTable { names, columns, n_rows: self.n_rows }
    }

    /// Rows at `indices`, in that order, repeats allowed
    pub fn select_rows(&self, indices: &[usize]) -> DataTable {
        DataTable {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.select(indices)).collect(),
            n_rows: indices.len(),
        }
    }

    /// Values of a protected-group column coerced to strings
    pub fn group_labels(&self, name: &str) -> Result<Vec<String>> {
        let column = self.require(name)?;
        Ok((0..self.n_rows).map(|r| column.label(r)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> DataTable {
        DataTable::new(vec![
            ("income".to_string(), ColumnData::Numeric(vec![10.0, 20.0, 30.0])),
            (
                "area".to_string(),
                ColumnData::Categorical(vec!["Urban".into(), "Rural".into(), "Urban".into()]),
            ),
            ("Loan_Status".to_string(), ColumnData::Numeric(vec![1.0, 0.0, 1.0])),
        ])
        .unwrap()
    }

    #[test]
    fn test_column_kinds() {
        let table = sample_table();
        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.numeric_columns(), vec!["income", "Loan_Status"]);
        assert_eq!(table.categorical_columns(), vec!["area"]);
    }

    #[test]
    fn test_split_target() {
        let (x, y) = sample_table().split_target("Loan_Status").unwrap();
        assert_eq!(x.n_cols(), 2);
        assert!(!x.has_column("Loan_Status"));
        assert_eq!(y.to_vec(), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_split_target_rejects_non_binary() {
        let table = DataTable::new(vec![(
            "y".to_string(),
            ColumnData::Numeric(vec![0.0, 2.0]),
        )])
        .unwrap();
        assert!(table.split_target("y").is_err());
        assert!(matches!(
            table.split_target("missing"),
            Err(LoanEvalError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_select_rows_allows_repeats() {
        let table = sample_table().select_rows(&[2, 2, 0]);
        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.numeric("income").unwrap(), &[30.0, 30.0, 10.0]);
    }

    #[test]
    fn test_group_labels_integral_numbers() {
        let table = DataTable::new(vec![(
            "married".to_string(),
            ColumnData::Numeric(vec![1.0, 0.0, 2.5]),
        )])
        .unwrap();
        assert_eq!(table.group_labels("married").unwrap(), vec!["1", "0", "2.5"]);
    }

    #[test]
    fn test_mismatched_lengths() {
        let result = DataTable::new(vec![
            ("a".to_string(), ColumnData::Numeric(vec![1.0])),
            ("b".to_string(), ColumnData::Numeric(vec![1.0, 2.0])),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_dataframe() {
        let df = DataFrame::new(vec![
            Series::new("age".into(), &[25i64, 30, 35]).into(),
            Series::new("city".into(), &["NYC", "LA", "NYC"]).into(),
        ])
        .unwrap();
        let table = DataTable::from_dataframe(&df).unwrap();
        assert_eq!(table.numeric("age").unwrap(), &[25.0, 30.0, 35.0]);
        assert_eq!(table.categorical("city").unwrap()[1], "LA");

        let back = table.to_dataframe().unwrap();
        assert_eq!(back.shape(), (3, 2));
    }
}
