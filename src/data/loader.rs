//! CSV loading and cleaning

use super::DataTable;
use crate::error::{LoanEvalError, Result};
use polars::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

/// Read a CSV file with a header row
pub fn load_csv(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(LoanEvalError::DataError(format!(
            "Dataset not found: {}",
            path.display()
        )));
    }

    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    if df.height() == 0 {
        return Err(LoanEvalError::DataError(format!(
            "No data loaded from {}",
            path.display()
        )));
    }

    debug!(rows = df.height(), cols = df.width(), "loaded {}", path.display());
    Ok(df)
}

/// Trim column names and replace inner whitespace with underscores
pub fn normalize_column_names(df: &mut DataFrame) -> Result<()> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.split_whitespace().collect::<Vec<_>>().join("_"))
        .collect();
    df.set_column_names(names.iter().map(String::as_str))?;
    Ok(())
}

/// Cell values of one column rendered as strings, `None` for nulls
fn column_cells(column: &Column) -> Result<Vec<Option<String>>> {
    let series = column.as_materialized_series();
    let cells = match series.dtype() {
        DataType::String => series
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect(),
        _ => series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()).map(|x| x.to_string()))
            .collect(),
    };
    Ok(cells)
}

/// Drop rows with a null or NaN in any column; rows to be scored keep
/// their duplicates
pub fn drop_missing(df: &DataFrame) -> Result<DataFrame> {
    let cells: Vec<Vec<Option<String>>> = df
        .get_columns()
        .iter()
        .map(column_cells)
        .collect::<Result<_>>()?;
    let keep: Vec<bool> = (0..df.height())
        .map(|row| cells.iter().all(|c| c[row].is_some()))
        .collect();

    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped > 0 {
        warn!(dropped, "skipping rows with missing values");
    }
    Ok(df.filter(&BooleanChunked::new("keep".into(), &keep))?)
}

/// Drop rows with missing values and exact duplicate rows, then map a
/// `Y`/`N` target to 1/0
pub fn clean(df: &DataFrame, target: &str) -> Result<DataFrame> {
    let height = df.height();
    let cells: Vec<Vec<Option<String>>> = df
        .get_columns()
        .iter()
        .map(column_cells)
        .collect::<Result<_>>()?;

    let mut keep = vec![true; height];
    let mut seen: HashSet<Vec<&str>> = HashSet::with_capacity(height);
    for (row, flag) in keep.iter_mut().enumerate() {
        let key: Option<Vec<&str>> = cells.iter().map(|c| c[row].as_deref()).collect();
        *flag = match key {
            Some(key) => seen.insert(key),
            None => false,
        };
    }

    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped > 0 {
        debug!(dropped, "removed rows with missing values or duplicates");
    }

    let mask = BooleanChunked::new("keep".into(), &keep);
    let mut cleaned = df.filter(&mask)?;

    let is_string_target = cleaned
        .column(target)
        .map(|c| c.dtype() == &DataType::String)
        .unwrap_or(false);
    if is_string_target {
        let mapped: Vec<Option<f64>> = cleaned
            .column(target)?
            .as_materialized_series()
            .str()?
            .into_iter()
            .map(|v| match v.map(str::trim) {
                Some("Y") | Some("1") => Some(1.0),
                Some("N") | Some("0") => Some(0.0),
                _ => None,
            })
            .collect();

        let unmapped = mapped.iter().filter(|v| v.is_none()).count();
        let valid: Vec<bool> = mapped.iter().map(Option::is_some).collect();
        cleaned.with_column(Series::new(target.into(), mapped))?;
        if unmapped > 0 {
            warn!(unmapped, "dropping rows whose '{}' is neither Y nor N", target);
            cleaned = cleaned.filter(&BooleanChunked::new("valid".into(), &valid))?;
        }
    }

    Ok(cleaned)
}

/// Short overview: row and column counts plus the target class balance
pub fn dataset_summary(table: &DataTable, target: &str) -> String {
    let mut parts = vec![
        format!("Rows: {}", table.n_rows()),
        format!("Columns: {}", table.n_cols()),
    ];

    if let Ok(labels) = table.group_labels(target) {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for label in labels {
            *counts.entry(label).or_insert(0) += 1;
        }
        let total: usize = counts.values().sum();

        // most frequent first
        let mut ordered: Vec<(String, usize)> = counts.into_iter().collect();
        ordered.sort_by(|a, b| b.1.cmp(&a.1));

        let stats: Vec<String> = ordered
            .iter()
            .map(|(cls, cnt)| {
                format!("{}: {} ({:.1}%)", cls, cnt, *cnt as f64 / total as f64 * 100.0)
            })
            .collect();
        parts.push(format!("Class balance: {}", stats.join(", ")));
    }

    parts.join("\n")
}
