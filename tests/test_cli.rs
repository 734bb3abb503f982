//! Integration test: CLI commands against CSV files on disk

use loan_eval::cli::{cmd_calibrate, cmd_predict, cmd_vif, load_features};
use loan_eval::data::{ColumnData, DataTable};
use loan_eval::pipeline::ModelPipeline;
use loan_eval::training::ModelFamily;
use ndarray::Array1;
use polars::prelude::*;
use std::path::Path;

fn write_csv(path: &Path, df: &mut DataFrame) {
    let mut file = std::fs::File::create(path).unwrap();
    CsvWriter::new(&mut file).include_header(true).finish(df).unwrap();
}

fn labelled_frame() -> DataFrame {
    let n = 40;
    let mut income = Vec::with_capacity(n);
    let mut loan = Vec::with_capacity(n);
    let mut copy = Vec::with_capacity(n);
    let mut status = Vec::with_capacity(n);
    for i in 0..n {
        let approved = i % 2 == 0;
        let inc = if approved { 6.0 } else { 3.0 } + ((i * 7) % 5) as f64 * 0.4;
        income.push(inc);
        loan.push(((i * 13) % 11) as f64 - 5.0);
        copy.push(((i * 13) % 11) as f64 - 5.0);
        status.push(if approved { "Y" } else { "N" });
    }
    df!(
        "ApplicantIncome" => &income,
        "LoanAmount" => &loan,
        "LoanAmountCopy" => &copy,
        "Loan_Status" => &status
    )
    .unwrap()
}

fn saved_pipeline(dir: &Path) -> std::path::PathBuf {
    let income: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 6.0 } else { 3.0 } + i as f64 * 0.01).collect();
    let loan: Vec<f64> = (0..20).map(|i| (i % 7) as f64).collect();
    let y = Array1::from_vec((0..20).map(|i| if i % 2 == 0 { 1.0 } else { 0.0 }).collect());
    let table = DataTable::new(vec![
        ("ApplicantIncome".to_string(), ColumnData::Numeric(income)),
        ("LoanAmount".to_string(), ColumnData::Numeric(loan)),
    ])
    .unwrap();

    let mut pipe = ModelPipeline::builder()
        .columns_from(&table)
        .family(ModelFamily::LogReg)
        .build()
        .unwrap();
    pipe.fit(&table, &y).unwrap();
    let path = dir.join("logreg.json");
    pipe.save(&path).unwrap();
    path
}

#[test]
fn test_predict_skips_rows_with_missing_values() {
    let dir = tempfile::tempdir().unwrap();
    let model = saved_pipeline(dir.path());

    let data = dir.path().join("score.csv");
    let mut df = df!(
        "ApplicantIncome" => &[Some(6.0), None, Some(3.0), Some(5.5)],
        "LoanAmount" => &[Some(1.0), Some(2.0), Some(3.0), Some(1.0)]
    )
    .unwrap();
    write_csv(&data, &mut df);

    let (frame, table) = load_features(&data).unwrap();
    assert_eq!(frame.height(), 3);
    assert_eq!(table.n_rows(), 3);

    let output = dir.path().join("out").join("predictions.csv");
    cmd_predict(&model, &data, &output).unwrap();

    let scored = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(output))
        .unwrap()
        .finish()
        .unwrap();
    assert_eq!(scored.height(), 3);
    let proba = scored.column("prediction").unwrap().as_materialized_series().f64().unwrap();
    assert!(proba.into_iter().all(|p| p.map_or(false, |p| (0.0..=1.0).contains(&p))));
}

#[test]
fn test_predict_rejects_all_missing_rows() {
    let dir = tempfile::tempdir().unwrap();
    let model = saved_pipeline(dir.path());
    let data = dir.path().join("empty.csv");
    let mut df = df!(
        "ApplicantIncome" => &[None::<f64>, Some(3.0)],
        "LoanAmount" => &[Some(1.0), None]
    )
    .unwrap();
    write_csv(&data, &mut df);

    assert!(cmd_predict(&model, &data, &dir.path().join("p.csv")).is_err());
}

#[test]
fn test_vif_with_top_features() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("loans.csv");
    write_csv(&data, &mut labelled_frame());

    cmd_vif(&data, "Loan_Status", 10.0, Some(1)).unwrap();
    cmd_vif(&data, "Loan_Status", 10.0, None).unwrap();
    assert!(cmd_vif(&data, "Loan_Status", 0.5, None).is_err());
}

#[test]
fn test_calibrate_saves_wrapper() {
    let dir = tempfile::tempdir().unwrap();
    let model = saved_pipeline(dir.path());

    let data = dir.path().join("labelled.csv");
    let mut df = labelled_frame().drop("LoanAmountCopy").unwrap();
    write_csv(&data, &mut df);

    let output = dir.path().join("calibrated.json");
    cmd_calibrate(&model, &data, "Loan_Status", "isotonic", &output, 5).unwrap();
    assert!(output.exists());
    assert!(cmd_calibrate(&model, &data, "Loan_Status", "beta", &output, 5).is_err());
}
