//! Integration test: group fairness metrics on labels and on fitted pipelines

use loan_eval::data::{ColumnData, DataTable};
use loan_eval::fairness::{
    equal_opportunity_ratio, equalized_odds_diff, four_fifths_ratio, tpr_ratio, youden_threshold,
    FairnessAuditor,
};
use loan_eval::pipeline::ModelPipeline;
use loan_eval::training::ModelFamily;
use ndarray::{array, Array1};

fn groups(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_equal_predictions_give_ratio_one() {
    let ratio = tpr_ratio(
        &array![1.0, 0.0, 1.0, 0.0],
        &array![1.0, 0.0, 1.0, 0.0],
        &groups(&["A", "A", "B", "B"]),
    )
    .unwrap();
    assert_eq!(ratio, 1.0);
}

#[test]
fn test_missed_group_fails_four_fifths() {
    let ratio = tpr_ratio(
        &array![1.0, 1.0, 1.0, 1.0],
        &array![1.0, 1.0, 0.0, 0.0],
        &groups(&["A", "A", "B", "B"]),
    )
    .unwrap();
    assert!((0.0..0.8).contains(&ratio));
    assert_eq!(ratio, 0.0);
}

#[test]
fn test_single_group_gives_ratio_one() {
    let ratio = tpr_ratio(&array![1.0, 0.0, 1.0], &array![0.0, 0.0, 1.0], &groups(&["A", "A", "A"])).unwrap();
    assert_eq!(ratio, 1.0);
}

/// Applicants with a numeric score and a binary gender column; the score
/// separates classes well for men and poorly for women
fn applicants() -> (DataTable, Array1<f64>) {
    let n = 40;
    let mut score = Vec::with_capacity(n);
    let mut gender = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for i in 0..n {
        let approved = i % 2 == 0;
        let male = i < n / 2;
        let base = if approved { 6.0 } else { 2.0 };
        let noise = ((i * 7) % 5) as f64 * if male { 0.2 } else { 1.2 };
        score.push(base + noise);
        gender.push(if male { "Male" } else { "Female" }.to_string());
        y.push(if approved { 1.0 } else { 0.0 });
    }
    let table = DataTable::new(vec![
        ("score".to_string(), ColumnData::Numeric(score)),
        ("Gender".to_string(), ColumnData::Categorical(gender)),
    ])
    .unwrap();
    (table, Array1::from_vec(y))
}

fn fitted(table: &DataTable, y: &Array1<f64>) -> ModelPipeline {
    let mut pipe = ModelPipeline::builder()
        .columns_from(table)
        .family(ModelFamily::LogReg)
        .build()
        .unwrap();
    pipe.fit(table, y).unwrap();
    pipe
}

#[test]
fn test_youden_threshold_in_unit_interval() {
    let (table, y) = applicants();
    let pipe = fitted(&table, &y);
    let thr = youden_threshold(&pipe, &table, &y).unwrap();
    assert!((0.0..=1.0).contains(&thr));
}

#[test]
fn test_estimator_metrics_are_consistent() {
    let (table, y) = applicants();
    let pipe = fitted(&table, &y);
    let thr = youden_threshold(&pipe, &table, &y).unwrap();

    let ratio = four_fifths_ratio(&pipe, &table, &y, "Gender", thr).unwrap();
    assert!((0.0..=1.0).contains(&ratio));
    assert_eq!(equal_opportunity_ratio(&pipe, &table, &y, "Gender", thr).unwrap(), ratio);

    let gap = equalized_odds_diff(&pipe, &table, &y, "Gender", thr).unwrap();
    assert!((-1.0..=1.0).contains(&gap));
}

#[test]
fn test_auditor_matches_free_functions() {
    let (table, y) = applicants();
    let pipe = fitted(&table, &y);
    let report = FairnessAuditor::new(Some("Gender".to_string())).audit(&pipe, &table, &y).unwrap();

    let thr = youden_threshold(&pipe, &table, &y).unwrap();
    assert_eq!(report.threshold, thr);
    assert_eq!(report.four_fifths, four_fifths_ratio(&pipe, &table, &y, "Gender", thr).unwrap());
    assert_eq!(report.groups.len(), 2);
    assert_eq!(report.groups[0].group, "Male");
    assert_eq!(report.groups[0].n_pos + report.groups[0].n_neg, 20);
}

#[test]
fn test_absent_group_column_is_neutral() {
    let (table, y) = applicants();
    let pipe = fitted(&table, &y);
    let report = FairnessAuditor::new(Some("Married".to_string())).audit(&pipe, &table, &y).unwrap();
    assert_eq!(report.four_fifths, 1.0);
    assert_eq!(report.equal_opportunity, 1.0);
    assert_eq!(report.equalized_odds_diff, 0.0);
    assert!(four_fifths_ratio(&pipe, &table, &y, "Married", 0.5).is_err());
}
