//! Fairness auditing for protected groups
//!
//! Group values are compared as strings, in order of first appearance.
//! Conventions for degenerate inputs:
//! - a group with no positive rows has TPR 1.0 (nothing to miss)
//! - TPR ratios are 1.0 with fewer than two groups, fewer than two groups
//!   holding positives, or a zero maximum TPR
//! - the equalized-odds gap is 0.0 unless at least two groups hold both classes
//!
//! [`FairnessAuditor`] runs the estimator-level checks and falls back to a
//! neutral [`FairnessReport`] when the protected column is absent.

use crate::data::DataTable;
use crate::error::{LoanEvalError, Result};
use crate::evaluation::metrics::{roc_curve, DEFAULT_THRESHOLD};
use crate::pipeline::PredictProba;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Minimum TPR ratio accepted by the four-fifths rule
pub const FOUR_FIFTHS: f64 = 0.8;

/// Confusion-derived rates of one protected group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRates {
    pub group: String,
    pub n_pos: usize,
    pub n_neg: usize,
    /// Share of the group predicted positive
    pub selection_rate: f64,
    /// 1.0 when the group has no positives
    pub tpr: f64,
    /// 0.0 when the group has no negatives
    pub fpr: f64,
}

impl GroupRates {
    fn has_both_classes(&self) -> bool {
        self.n_pos > 0 && self.n_neg > 0
    }
}

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>, groups: &[String]) -> Result<()> {
    if y_true.len() != y_pred.len() || y_true.len() != groups.len() {
        return Err(LoanEvalError::FairnessError(format!(
            "labels ({}), predictions ({}) and groups ({}) must have the same length",
            y_true.len(),
            y_pred.len(),
            groups.len()
        )));
    }
    Ok(())
}

/// Per-group rates of 0/1 predictions, groups in order of first appearance
pub fn group_rate_table(
    y_true: &Array1<f64>,
    y_pred: &Array1<f64>,
    groups: &[String],
) -> Result<Vec<GroupRates>> {
    check_lengths(y_true, y_pred, groups)?;

    let mut order: Vec<&String> = Vec::new();
    for g in groups {
        if !order.contains(&g) {
            order.push(g);
        }
    }

    let table = order
        .into_iter()
        .map(|group| {
            let (mut tp, mut fp, mut n_pos, mut n_neg) = (0usize, 0usize, 0usize, 0usize);
            for ((&t, &p), g) in y_true.iter().zip(y_pred.iter()).zip(groups) {
                if g != group {
                    continue;
                }
                let predicted = p == 1.0;
                if t == 1.0 {
                    n_pos += 1;
                    tp += predicted as usize;
                } else {
                    n_neg += 1;
                    fp += predicted as usize;
                }
            }
            let size = (n_pos + n_neg) as f64;
            GroupRates {
                group: group.clone(),
                n_pos,
                n_neg,
                selection_rate: (tp + fp) as f64 / size,
                tpr: if n_pos > 0 { tp as f64 / n_pos as f64 } else { 1.0 },
                fpr: if n_neg > 0 { fp as f64 / n_neg as f64 } else { 0.0 },
            }
        })
        .collect();
    Ok(table)
}

fn tpr_ratio_of(table: &[GroupRates]) -> f64 {
    let with_positives = table.iter().filter(|r| r.n_pos > 0).count();
    if table.len() < 2 || with_positives < 2 {
        return 1.0;
    }
    let max = table.iter().map(|r| r.tpr).fold(f64::NEG_INFINITY, f64::max);
    let min = table.iter().map(|r| r.tpr).fold(f64::INFINITY, f64::min);
    if max == 0.0 {
        1.0
    } else {
        min / max
    }
}

fn equalized_odds_of(table: &[GroupRates]) -> f64 {
    let eligible: Vec<&GroupRates> = table.iter().filter(|r| r.has_both_classes()).collect();
    if eligible.len() < 2 {
        return 0.0;
    }
    let spread = |rate: fn(&GroupRates) -> f64| {
        let values = eligible.iter().map(|r| rate(r));
        let max = values.clone().fold(f64::NEG_INFINITY, f64::max);
        let min = values.fold(f64::INFINITY, f64::min);
        max - min
    };
    spread(|r| r.tpr) - spread(|r| r.fpr)
}

/// min(TPR) / max(TPR) across groups for 0/1 predictions
pub fn tpr_ratio(y_true: &Array1<f64>, y_pred: &Array1<f64>, groups: &[String]) -> Result<f64> {
    Ok(tpr_ratio_of(&group_rate_table(y_true, y_pred, groups)?))
}

/// TPR gap minus FPR gap across groups holding both classes
pub fn equalized_odds_gap(y_true: &Array1<f64>, y_pred: &Array1<f64>, groups: &[String]) -> Result<f64> {
    Ok(equalized_odds_of(&group_rate_table(y_true, y_pred, groups)?))
}

/// Threshold maximising Youden's J (TPR − FPR) on the estimator's ROC curve.
///
/// The first maximum in descending-threshold order wins; the result is
/// clamped to `[0, 1]`. Single-class labels give 0.5.
pub fn youden_threshold<M: PredictProba + ?Sized>(
    model: &M,
    features: &DataTable,
    y: &Array1<f64>,
) -> Result<f64> {
    let proba = model.predict_proba(features)?;
    let curve = roc_curve(y, &proba)?;
    if curve.tpr.iter().chain(&curve.fpr).any(|v| v.is_nan()) {
        warn!("Youden's J is undefined for single-class labels, using {}", DEFAULT_THRESHOLD);
        return Ok(DEFAULT_THRESHOLD);
    }

    let (mut best_idx, mut best_j) = (0, f64::NEG_INFINITY);
    for (i, (tpr, fpr)) in curve.tpr.iter().zip(&curve.fpr).enumerate() {
        if tpr - fpr > best_j {
            best_idx = i;
            best_j = tpr - fpr;
        }
    }

    let threshold = curve.thresholds[best_idx].clamp(0.0, 1.0);
    debug!("Youden threshold {:.4} (J = {:.4})", threshold, best_j);
    Ok(threshold)
}

/// Group rates of the estimator's predictions at `threshold`
pub fn estimator_group_rates<M: PredictProba + ?Sized>(
    model: &M,
    features: &DataTable,
    y: &Array1<f64>,
    group_col: &str,
    threshold: f64,
) -> Result<Vec<GroupRates>> {
    let groups = features.group_labels(group_col)?;
    let y_pred = model.predict(features, threshold)?;
    group_rate_table(y, &y_pred, &groups)
}

/// Four-fifths rule ratio: min over max of per-group TPR at `threshold`
pub fn four_fifths_ratio<M: PredictProba + ?Sized>(
    model: &M,
    features: &DataTable,
    y: &Array1<f64>,
    group_col: &str,
    threshold: f64,
) -> Result<f64> {
    Ok(tpr_ratio_of(&estimator_group_rates(model, features, y, group_col, threshold)?))
}

/// Equal-opportunity ratio; numerically the same as [`four_fifths_ratio`]
pub fn equal_opportunity_ratio<M: PredictProba + ?Sized>(
    model: &M,
    features: &DataTable,
    y: &Array1<f64>,
    group_col: &str,
    threshold: f64,
) -> Result<f64> {
    four_fifths_ratio(model, features, y, group_col, threshold)
}

/// TPR gap minus FPR gap of the estimator's predictions at `threshold`
pub fn equalized_odds_diff<M: PredictProba + ?Sized>(
    model: &M,
    features: &DataTable,
    y: &Array1<f64>,
    group_col: &str,
    threshold: f64,
) -> Result<f64> {
    Ok(equalized_odds_of(&estimator_group_rates(model, features, y, group_col, threshold)?))
}

/// Fairness summary of one estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessReport {
    /// `None` when no protected column was audited
    pub group_col: Option<String>,
    pub threshold: f64,
    pub groups: Vec<GroupRates>,
    pub four_fifths: f64,
    pub equal_opportunity: f64,
    pub equalized_odds_diff: f64,
}

impl FairnessReport {
    /// Report used when there is nothing to compare
    pub fn neutral(threshold: f64) -> Self {
        Self {
            group_col: None,
            threshold,
            groups: Vec::new(),
            four_fifths: 1.0,
            equal_opportunity: 1.0,
            equalized_odds_diff: 0.0,
        }
    }

    pub fn passes_four_fifths(&self) -> bool {
        self.four_fifths >= FOUR_FIFTHS
    }
}

/// Estimator-level fairness checks at a fixed or Youden-derived threshold
#[derive(Debug, Clone, Default)]
pub struct FairnessAuditor {
    group_col: Option<String>,
    threshold: Option<f64>,
}

impl FairnessAuditor {
    pub fn new(group_col: Option<String>) -> Self {
        Self {
            group_col,
            threshold: None,
        }
    }

    /// Use a fixed threshold instead of Youden's J
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn audit<M: PredictProba + ?Sized>(
        &self,
        model: &M,
        features: &DataTable,
        y: &Array1<f64>,
    ) -> Result<FairnessReport> {
        let threshold = match self.threshold {
            Some(t) => t,
            None => youden_threshold(model, features, y)?,
        };

        let group_col = match self.group_col.as_deref() {
            Some(col) if features.has_column(col) => col,
            Some(col) => {
                warn!("Group column '{}' not in features, reporting neutral fairness", col);
                return Ok(FairnessReport::neutral(threshold));
            }
            None => return Ok(FairnessReport::neutral(threshold)),
        };

        let groups = estimator_group_rates(model, features, y, group_col, threshold)?;
        let ratio = tpr_ratio_of(&groups);
        Ok(FairnessReport {
            group_col: Some(group_col.to_string()),
            threshold,
            four_fifths: ratio,
            equal_opportunity: ratio,
            equalized_odds_diff: equalized_odds_of(&groups),
            groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ColumnData;
    use ndarray::array;

    fn groups(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    /// Returns the `score` column as the probability
    struct ScoreColumn;

    impl PredictProba for ScoreColumn {
        fn predict_proba(&self, table: &DataTable) -> Result<Array1<f64>> {
            Ok(Array1::from_vec(table.numeric("score")?.to_vec()))
        }
    }

    fn scored(scores: Vec<f64>, group: &[&str]) -> DataTable {
        DataTable::new(vec![
            ("score".to_string(), ColumnData::Numeric(scores)),
            ("gender".to_string(), ColumnData::Categorical(groups(group))),
        ])
        .unwrap()
    }

    #[test]
    fn test_equal_groups_ratio_is_one() {
        let ratio = tpr_ratio(&array![1.0, 0.0, 1.0, 0.0], &array![1.0, 0.0, 1.0, 0.0], &groups(&["A", "A", "B", "B"])).unwrap();
        assert_eq!(ratio, 1.0);
    }

    #[test]
    fn test_missed_group_ratio_is_zero() {
        let ratio = tpr_ratio(&array![1.0, 1.0, 1.0, 1.0], &array![1.0, 1.0, 0.0, 0.0], &groups(&["A", "A", "B", "B"])).unwrap();
        assert_eq!(ratio, 0.0);
    }

    #[test]
    fn test_single_group_ratio_is_one() {
        let ratio = tpr_ratio(&array![1.0, 1.0, 0.0], &array![1.0, 0.0, 0.0], &groups(&["A", "A", "A"])).unwrap();
        assert_eq!(ratio, 1.0);
    }

    #[test]
    fn test_zero_positive_group() {
        let y = array![1.0, 1.0, 0.0, 0.0];
        let table = group_rate_table(&y, &array![1.0, 0.0, 1.0, 0.0], &groups(&["A", "A", "B", "B"])).unwrap();
        assert_eq!(table[1].tpr, 1.0);
        // only one group holds positives
        assert_eq!(tpr_ratio_of(&table), 1.0);

        let y = array![1.0, 1.0, 1.0, 0.0, 0.0];
        let pred = array![1.0, 0.0, 1.0, 0.0, 0.0];
        let ratio = tpr_ratio(&y, &pred, &groups(&["A", "A", "B", "C", "C"])).unwrap();
        // A = 0.5, B = 1.0, C has no positives and counts as 1.0
        assert_eq!(ratio, 0.5);
    }

    #[test]
    fn test_group_order_is_first_appearance() {
        let table = group_rate_table(&array![1.0, 0.0, 1.0], &array![1.0, 0.0, 0.0], &groups(&["Z", "A", "Z"])).unwrap();
        assert_eq!(table[0].group, "Z");
        assert_eq!(table[1].group, "A");
        assert_eq!(table[0].n_pos, 2);
        assert_eq!(table[0].tpr, 0.5);
    }

    #[test]
    fn test_equalized_odds_gap() {
        let y = array![1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0];
        let pred = array![1.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        let g = groups(&["A", "A", "A", "A", "B", "B", "B", "B"]);
        // TPR gap 0.5, FPR gap 0.5
        assert_eq!(equalized_odds_gap(&y, &pred, &g).unwrap(), 0.0);

        let pred = array![1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(equalized_odds_gap(&y, &pred, &g).unwrap(), 1.0);

        // B holds only positives, so fewer than two groups qualify
        let y = array![1.0, 0.0, 1.0, 1.0];
        let g = groups(&["A", "A", "B", "B"]);
        assert_eq!(equalized_odds_gap(&y, &array![1.0, 0.0, 0.0, 0.0], &g).unwrap(), 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(group_rate_table(&array![1.0], &array![1.0, 0.0], &groups(&["A"])).is_err());
    }

    #[test]
    fn test_youden_threshold() {
        let table = scored(vec![0.1, 0.4, 0.35, 0.8], &["A", "A", "B", "B"]);
        let y = array![0.0, 0.0, 1.0, 1.0];
        // J = 0.5 first at 0.8, again at 0.35
        let thr = youden_threshold(&ScoreColumn, &table, &y).unwrap();
        assert_eq!(thr, 0.8);

        let perfect = scored(vec![0.1, 0.2, 0.7, 0.9], &["A", "A", "B", "B"]);
        assert_eq!(youden_threshold(&ScoreColumn, &perfect, &y).unwrap(), 0.7);
    }

    #[test]
    fn test_youden_single_class_in_range() {
        let table = scored(vec![0.3, 0.6], &["A", "B"]);
        let thr = youden_threshold(&ScoreColumn, &table, &array![1.0, 1.0]).unwrap();
        assert_eq!(thr, DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_estimator_ratios() {
        let table = scored(vec![0.9, 0.8, 0.7, 0.2], &["M", "M", "F", "F"]);
        let y = array![1.0, 1.0, 1.0, 1.0];
        assert_eq!(four_fifths_ratio(&ScoreColumn, &table, &y, "gender", 0.5).unwrap(), 0.5);
        assert_eq!(equal_opportunity_ratio(&ScoreColumn, &table, &y, "gender", 0.5).unwrap(), 0.5);
        assert_eq!(equalized_odds_diff(&ScoreColumn, &table, &y, "gender", 0.5).unwrap(), 0.0);
        assert!(four_fifths_ratio(&ScoreColumn, &table, &y, "race", 0.5).is_err());
    }

    #[test]
    fn test_auditor_neutral_without_group_column() {
        let table = scored(vec![0.2, 0.9], &["A", "B"]);
        let y = array![0.0, 1.0];
        let report = FairnessAuditor::new(Some("race".to_string())).audit(&ScoreColumn, &table, &y).unwrap();
        assert_eq!(report.four_fifths, 1.0);
        assert_eq!(report.equalized_odds_diff, 0.0);
        assert!(report.group_col.is_none());

        let report = FairnessAuditor::new(None).with_threshold(0.3).audit(&ScoreColumn, &table, &y).unwrap();
        assert_eq!(report.threshold, 0.3);
        assert!(report.passes_four_fifths());
    }

    #[test]
    fn test_auditor_reports_groups() {
        let table = scored(vec![0.9, 0.1, 0.8, 0.3, 0.4, 0.2], &["M", "M", "M", "F", "F", "F"]);
        let y = array![1.0, 0.0, 1.0, 1.0, 1.0, 0.0];
        let report = FairnessAuditor::new(Some("gender".to_string()))
            .with_threshold(0.5)
            .audit(&ScoreColumn, &table, &y)
            .unwrap();
        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.four_fifths, 0.0);
        assert!(!report.passes_four_fifths());
    }
}
