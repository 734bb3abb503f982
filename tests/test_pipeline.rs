//! Integration test: clean → table → pipeline → calibration

use loan_eval::calibration::{calibrate_model, calibration_curve, CalibratedClassifier};
use loan_eval::data::{clean, dataset_summary, stratified_split, ColumnData, DataTable};
use loan_eval::pipeline::{ModelPipeline, PredictProba};
use loan_eval::synthetic::Resampler;
use loan_eval::training::ModelFamily;
use ndarray::Array1;
use polars::prelude::*;

fn raw_loans() -> DataFrame {
    let n = 48;
    let mut income: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut area = Vec::with_capacity(n);
    let mut status = Vec::with_capacity(n);
    for i in 0..n {
        let approved = i % 4 != 0;
        let base = if approved { 6000.0 } else { 2000.0 };
        income.push(Some(base + (i * 97 % 800) as f64));
        area.push(["Urban", "Rural", "Semiurban"][i % 3]);
        status.push(if approved { "Y" } else { "N" });
    }
    // one missing value and one exact duplicate of row 0
    income[5] = None;
    income.push(income[0]);
    area.push(area[0]);
    status.push(status[0]);

    df!(
        "ApplicantIncome" => &income,
        "Property_Area" => &area,
        "Loan_Status" => &status
    )
    .unwrap()
}

fn prepared() -> (DataTable, Array1<f64>) {
    let df = clean(&raw_loans(), "Loan_Status").unwrap();
    DataTable::from_dataframe(&df).unwrap().split_target("Loan_Status").unwrap()
}

#[test]
fn test_clean_drops_missing_and_duplicates() {
    let df = clean(&raw_loans(), "Loan_Status").unwrap();
    assert_eq!(df.height(), 47);
    assert_eq!(df.column("Loan_Status").unwrap().dtype(), &DataType::Float64);
}

#[test]
fn test_pipeline_probabilities_in_unit_interval() {
    let (features, y) = prepared();
    for family in ModelFamily::ALL {
        let mut pipe = ModelPipeline::builder()
            .columns_from(&features)
            .seed(1)
            .family(family)
            .build()
            .unwrap();
        pipe.fit(&features, &y).unwrap();
        let proba = pipe.predict_proba(&features).unwrap();
        assert_eq!(proba.len(), features.n_rows());
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)), "{}", family);
    }
}

#[test]
fn test_unseen_category_is_ignored() {
    let (features, y) = prepared();
    let mut pipe = ModelPipeline::builder()
        .columns_from(&features)
        .family(ModelFamily::LogReg)
        .build()
        .unwrap();
    pipe.fit(&features, &y).unwrap();

    let unseen = DataTable::new(vec![
        ("ApplicantIncome".to_string(), ColumnData::Numeric(vec![6100.0])),
        ("Property_Area".to_string(), ColumnData::Categorical(vec!["Offshore".to_string()])),
    ])
    .unwrap();
    let proba = pipe.predict_proba(&unseen).unwrap();
    assert!((0.0..=1.0).contains(&proba[0]));
}

#[test]
fn test_resampled_pipeline_fits() {
    let (features, y) = prepared();
    for sampler in [Resampler::smote(), Resampler::RandomOver] {
        let mut pipe = ModelPipeline::builder()
            .columns_from(&features)
            .family(ModelFamily::Cart)
            .sampler(sampler)
            .build()
            .unwrap();
        pipe.fit(&features, &y).unwrap();
        // prediction never resamples
        assert_eq!(pipe.predict_proba(&features).unwrap().len(), features.n_rows());
    }
}

#[test]
fn test_calibrated_model_round_trip() {
    let (features, y) = prepared();
    let split = stratified_split(&y, 0.25, 0.25, 4).unwrap();
    let train = features.select_rows(&split.train);
    let y_train = Array1::from_vec(split.train.iter().map(|&i| y[i]).collect());
    let val = features.select_rows(&split.val);
    let y_val = Array1::from_vec(split.val.iter().map(|&i| y[i]).collect());

    let mut pipe = ModelPipeline::builder()
        .columns_from(&features)
        .family(ModelFamily::RandomForest)
        .build()
        .unwrap();
    pipe.fit(&train, &y_train).unwrap();

    for method in ["sigmoid", "isotonic"] {
        let calibrated = calibrate_model(pipe.clone(), &val, &y_val, method).unwrap();
        let proba = calibrated.predict_proba(&features).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));

        let (frac_pos, mean_pred) = calibration_curve(&y, &proba, 5).unwrap();
        assert_eq!(frac_pos.len(), mean_pred.len());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibrated.json");
        calibrated.save(&path).unwrap();
        let loaded = CalibratedClassifier::load(&path).unwrap();
        let reloaded = loaded.predict_proba(&features).unwrap();
        for (a, b) in reloaded.iter().zip(proba.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}

#[test]
fn test_split_and_summary() {
    let (features, y) = prepared();
    let split = stratified_split(&y, 0.2, 0.2, 0).unwrap();
    assert_eq!(split.train.len() + split.val.len() + split.test.len(), y.len());

    let df = clean(&raw_loans(), "Loan_Status").unwrap();
    let table = DataTable::from_dataframe(&df).unwrap();
    let text = dataset_summary(&table, "Loan_Status");
    assert!(text.contains("Rows: 47"));
    assert_eq!(features.n_cols(), 2);
}
