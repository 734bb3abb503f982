//! Integration test: nested cross-validation and the summary table

use loan_eval::config::{CvConfig, EvaluationConfig};
use loan_eval::data::{clean, DataTable};
use loan_eval::evaluation::{evaluate_models, nested_cv, Scorer};
use loan_eval::optimizer::{ParamGrid, ParameterValue};
use loan_eval::pipeline::PredictProba;
use loan_eval::training::ModelFamily;
use polars::prelude::*;

/// Balanced 50-row, 4-feature binary problem
fn create_classification_dataset() -> DataFrame {
    let n = 50;
    let mut f1 = Vec::with_capacity(n);
    let mut f2 = Vec::with_capacity(n);
    let mut f3 = Vec::with_capacity(n);
    let mut f4 = Vec::with_capacity(n);
    let mut target = Vec::with_capacity(n);

    for i in 0..n {
        let x = i as f64;
        let label = if i % 2 == 0 { 1.0 } else { 0.0 };
        f1.push(label * 2.0 + (x * 0.7).sin());
        f2.push((x * 0.3).cos() - label);
        f3.push(x % 7.0);
        f4.push(label + (x * 1.3).sin() * 0.8);
        target.push(label);
    }

    df!(
        "feature1" => &f1,
        "feature2" => &f2,
        "feature3" => &f3,
        "feature4" => &f4,
        "target" => &target
    )
    .unwrap()
}

fn loan_dataset() -> DataFrame {
    let n = 60;
    let mut income = Vec::with_capacity(n);
    let mut loan = Vec::with_capacity(n);
    let mut gender = Vec::with_capacity(n);
    let mut status = Vec::with_capacity(n);
    for i in 0..n {
        let approved = i % 3 != 0;
        income.push(if approved { 5000.0 } else { 2500.0 } + (i * 137 % 1500) as f64);
        loan.push(100.0 + (i * 53 % 90) as f64);
        gender.push(if i % 4 < 2 { "Male" } else { "Female" });
        status.push(if approved { "Y" } else { "N" });
    }
    df!(
        "ApplicantIncome" => &income,
        "LoanAmount" => &loan,
        "Gender" => &gender,
        "Loan_Status" => &status
    )
    .unwrap()
}

#[test]
fn test_nested_cv_on_balanced_dataset() {
    let table = DataTable::from_dataframe(&create_classification_dataset()).unwrap();
    let cv = CvConfig::default();
    let grid = ModelFamily::LogReg.default_grid();

    let (results, features, y) =
        nested_cv(&table, "target", ModelFamily::LogReg, &grid, &Scorer::CORE, &cv).unwrap();

    let roc = results.test_scores("test_roc_auc");
    assert_eq!(roc.len(), cv.n_splits * cv.n_repeats);
    assert!(roc.iter().all(|s| (0.0..=1.0).contains(s)));
    assert_eq!(features.n_cols(), 4);
    assert_eq!(y.len(), 50);

    for name in ["pr_auc", "f1", "recall", "specificity", "bal_acc"] {
        assert_eq!(results.test_scores(name).len(), roc.len());
    }

    // the fold estimators are fitted and usable on the returned data
    let proba = results.representative().unwrap().predict_proba(&features).unwrap();
    assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
}

#[test]
fn test_nested_cv_bootstrap_fold_count() {
    let mut target = vec![0.0; 30];
    for t in target.iter_mut().take(6) {
        *t = 1.0;
    }
    let x: Vec<f64> = (0..30).map(|i| i as f64 * 0.1 + target[i] * 3.0).collect();
    let df = df!("x" => &x, "target" => &target).unwrap();
    let table = DataTable::from_dataframe(&df).unwrap();

    let cv = CvConfig::default().with_bootstrap_iters(4);
    let grid = ParamGrid::new().with_param("model__max_depth", vec![ParameterValue::Int(2)]);
    let (results, _, _) = nested_cv(&table, "target", ModelFamily::Cart, &grid, &[], &cv).unwrap();
    assert_eq!(results.n_folds(), 4);
}

#[test]
fn test_evaluate_models_writes_summary() {
    let df = clean(&loan_dataset(), "Loan_Status").unwrap();
    let table = DataTable::from_dataframe(&df).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("artefacts").join("summary_metrics.csv");
    let config = EvaluationConfig::default()
        .with_group_col(Some("Gender".to_string()))
        .with_output(&output)
        .with_models(vec![ModelFamily::LogReg, ModelFamily::Cart]);

    let summary = evaluate_models(&table, &config).unwrap();
    assert_eq!(summary.rows.len(), 2);
    assert_eq!(summary.rows[0].model, "logreg");
    assert_eq!(summary.rows[1].model, "cart");
    for row in &summary.rows {
        let roc = row.metric("roc_auc").unwrap();
        assert!((0.0..=1.0).contains(&roc));
        // rounded to three decimals
        assert_eq!((roc * 1000.0).round() / 1000.0, roc);
        assert!((0.0..=1.0).contains(&row.fairness));
    }

    let written = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(output))
        .unwrap()
        .finish()
        .unwrap();
    assert_eq!(written.height(), 2);
    let names: Vec<String> = written.get_column_names().iter().map(|n| n.to_string()).collect();
    for col in ["model", "roc_auc", "pr_auc", "f1", "recall", "specificity", "bal_acc", "fairness", "equal_opp"] {
        assert!(names.contains(&col.to_string()), "missing {}", col);
    }
}

#[test]
fn test_evaluate_without_group_column_is_neutral() {
    let df = clean(&loan_dataset(), "Loan_Status").unwrap();
    let table = DataTable::from_dataframe(&df).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let config = EvaluationConfig::default()
        .with_group_col(Some("Property_Area".to_string()))
        .with_output(dir.path().join("summary.csv"))
        .with_models(vec![ModelFamily::Cart]);

    let summary = evaluate_models(&table, &config).unwrap();
    assert_eq!(summary.rows[0].fairness, 1.0);
    assert_eq!(summary.rows[0].equal_opp, 1.0);
}
