//! Per-model summary of nested-CV scores and fairness

use super::metrics::Scorer;
use super::nested_cv::{nested_cv, NestedCvResults};
use crate::config::EvaluationConfig;
use crate::data::DataTable;
use crate::error::{LoanEvalError, Result};
use crate::fairness::{FairnessAuditor, FairnessReport};
use ndarray::Array1;
use polars::prelude::*;
use std::fmt;
use std::fs::File;
use std::path::Path;
use tracing::info;

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// One model's mean fold scores plus fairness of its first-fold estimator
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub model: String,
    /// `(metric, mean)` in scorer order
    pub metrics: Vec<(String, f64)>,
    /// Four-fifths TPR ratio
    pub fairness: f64,
    pub equal_opp: f64,
    pub eq_odds_diff: f64,
    /// Youden threshold the fairness figures were computed at
    pub threshold: f64,
}

impl SummaryRow {
    /// Aggregate `results`; every value is rounded to 3 decimals
    pub fn from_results(results: &NestedCvResults, fairness: &FairnessReport) -> Self {
        Self {
            model: results.family.name().to_string(),
            metrics: results
                .mean_scores()
                .into_iter()
                .map(|(name, mean)| (name, round3(mean)))
                .collect(),
            fairness: round3(fairness.four_fifths),
            equal_opp: round3(fairness.equal_opportunity),
            eq_odds_diff: round3(fairness.equalized_odds_diff),
            threshold: round3(fairness.threshold),
        }
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
}

/// Summary metrics table, one row per model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryTable {
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn row(&self, model: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| r.model == model)
    }

    /// Metric columns in first-seen order across rows
    fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for row in &self.rows {
            for (name, _) in &row.metrics {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// Columns: `model`, each metric, `fairness`, `equal_opp`,
    /// `eq_odds_diff`, `threshold`. Missing metrics are null.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = vec![Column::new(
            "model".into(),
            self.rows.iter().map(|r| r.model.as_str()).collect::<Vec<_>>(),
        )];
        for name in self.metric_names() {
            let values: Vec<Option<f64>> = self.rows.iter().map(|r| r.metric(&name)).collect();
            columns.push(Column::new(name.as_str().into(), values));
        }
        let fixed: [(&str, fn(&SummaryRow) -> f64); 4] = [
            ("fairness", |r| r.fairness),
            ("equal_opp", |r| r.equal_opp),
            ("eq_odds_diff", |r| r.eq_odds_diff),
            ("threshold", |r| r.threshold),
        ];
        for (name, value) in fixed {
            columns.push(Column::new(name.into(), self.rows.iter().map(value).collect::<Vec<f64>>()));
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Write as CSV, creating parent directories
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut df = self.to_dataframe()?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
        Ok(())
    }
}

impl fmt::Display for SummaryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.metric_names();
        write!(f, "{:<18}", "model")?;
        for name in names.iter().map(String::as_str).chain(["fairness", "equal_opp", "eq_odds"]) {
            write!(f, " {:>11}", name)?;
        }
        writeln!(f)?;
        for row in &self.rows {
            write!(f, "{:<18}", row.model)?;
            for name in &names {
                match row.metric(name) {
                    Some(v) => write!(f, " {:>11.3}", v)?,
                    None => write!(f, " {:>11}", "-")?,
                }
            }
            writeln!(
                f,
                " {:>11.3} {:>11.3} {:>11.3}",
                row.fairness, row.equal_opp, row.eq_odds_diff
            )?;
        }
        Ok(())
    }
}

/// Fairness of the first-fold estimator on the full feature table
fn audit_representative(
    results: &NestedCvResults,
    features: &DataTable,
    y: &Array1<f64>,
    group_col: Option<&str>,
) -> Result<FairnessReport> {
    let estimator = results.representative().ok_or_else(|| {
        LoanEvalError::FairnessError(format!("{} produced no outer folds", results.family))
    })?;
    FairnessAuditor::new(group_col.map(str::to_string)).audit(estimator, features, y)
}

/// Nested-CV every configured model family on `table` (features plus the
/// target column), write the summary CSV to `config.output` and return it
pub fn evaluate_models(table: &DataTable, config: &EvaluationConfig) -> Result<SummaryTable> {
    config.validate()?;
    let mut summary = SummaryTable::default();

    for &family in &config.models {
        let (results, features, y) = nested_cv(
            table,
            &config.target,
            family,
            &family.default_grid(),
            &Scorer::CORE,
            &config.cv,
        )?;
        let fairness = audit_representative(&results, &features, &y, config.group_col.as_deref())?;
        summary.rows.push(SummaryRow::from_results(&results, &fairness));
    }

    summary.write_csv(&config.output)?;
    info!("Wrote summary for {} models to {}", summary.rows.len(), config.output.display());
    Ok(summary)
}
