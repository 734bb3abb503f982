//! loan-eval CLI
//!
//! Command-line interface for nested-CV evaluation, single-model training,
//! prediction, calibration and VIF diagnostics.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::calibration::{calibrate_model, calibration_curve, CalibratedClassifier};
use crate::config::{CvConfig, EvaluationConfig};
use crate::data::{clean, dataset_summary, drop_missing, load_csv, normalize_column_names, DataTable};
use crate::evaluation::{eval_at, evaluate_models, DEFAULT_THRESHOLD};
use crate::optimizer::{format_params, GridSearchCV};
use crate::pipeline::{ModelPipeline, PredictProba};
use crate::preprocessing::{calculate_vif, tree_feature_selector, vif_prune};
use crate::training::{CrossValidator, ModelFamily};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "loan-eval")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Nested cross-validation, fairness auditing and calibration for loan-approval classifiers")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Nested-CV every model family and write the summary table
    Evaluate {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: Option<String>,

        /// Protected-group column audited for fairness
        #[arg(long)]
        group_col: Option<String>,

        /// Summary CSV path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// JSON evaluation config; flags override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Comma-separated model families (logreg, cart, random_forest, gradient_boosting, svm)
        #[arg(short, long, value_delimiter = ',')]
        models: Option<Vec<String>>,

        /// Seed for splitting, resampling and models
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show row count, column count and class balance
    Summary {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long, default_value = "Loan_Status")]
        target: String,
    },

    /// Grid-search one model family on all rows and save the pipeline
    Train {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long, default_value = "Loan_Status")]
        target: String,

        /// Model family
        #[arg(short, long, default_value = "logreg")]
        model: String,

        /// Output pipeline JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Seed for splitting, resampling and models
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Inner cross-validation folds
        #[arg(long, default_value = "3")]
        cv_folds: usize,
    },

    /// Score a CSV with a saved pipeline
    Predict {
        /// Saved pipeline (plain or calibrated)
        #[arg(short, long)]
        model: PathBuf,

        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Output CSV with a `prediction` column
        #[arg(short, long, default_value = "predictions.csv")]
        output: PathBuf,
    },

    /// Calibrate a saved pipeline on labelled data
    Calibrate {
        /// Saved pipeline
        #[arg(short, long)]
        model: PathBuf,

        /// Labelled CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long, default_value = "Loan_Status")]
        target: String,

        /// sigmoid or isotonic
        #[arg(long, default_value = "sigmoid")]
        method: String,

        /// Output calibrated pipeline JSON
        #[arg(short, long)]
        output: PathBuf,

        /// Calibration curve bins
        #[arg(long, default_value = "10")]
        bins: usize,
    },

    /// Variance inflation factors of the numeric columns
    Vif {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name, excluded from the check
        #[arg(short, long, default_value = "Loan_Status")]
        target: String,

        /// Prune columns until every VIF is below this value
        #[arg(long, default_value = "10.0")]
        cap: f64,

        /// Also rank the kept columns by random-forest importance and show the top N
        #[arg(long)]
        top: Option<usize>,
    },
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Evaluate { data, target, group_col, output, config, models, seed } => {
                let mut cfg = match config {
                    Some(path) => EvaluationConfig::from_file(&path)?,
                    None => EvaluationConfig::default(),
                };
                if let Some(target) = target {
                    cfg = cfg.with_target(target);
                }
                if group_col.is_some() {
                    cfg = cfg.with_group_col(group_col);
                }
                if let Some(output) = output {
                    cfg = cfg.with_output(output);
                }
                if let Some(models) = models {
                    let families = models
                        .iter()
                        .map(|m| m.parse::<ModelFamily>())
                        .collect::<crate::error::Result<Vec<_>>>()?;
                    cfg = cfg.with_models(families);
                }
                if let Some(seed) = seed {
                    let cv = cfg.cv.clone().with_seed(seed);
                    cfg = cfg.with_cv(cv);
                }
                cmd_evaluate(&data, &cfg)
            }
            Commands::Summary { data, target } => cmd_summary(&data, &target),
            Commands::Train { data, target, model, output, seed, cv_folds } => {
                cmd_train(&data, &target, &model, output.as_deref(), seed, cv_folds)
            }
            Commands::Predict { model, data, output } => cmd_predict(&model, &data, &output),
            Commands::Calibrate { model, data, target, method, output, bins } => {
                cmd_calibrate(&model, &data, &target, &method, &output, bins)
            }
            Commands::Vif { data, target, cap, top } => cmd_vif(&data, &target, cap, top),
        }
    }
}

// ─── Data loading ──────────────────────────────────────────────────────────────

/// Load, normalise column names and clean a labelled CSV
pub fn load_table(path: &Path, target: &str) -> anyhow::Result<DataTable> {
    let mut df = load_csv(path)?;
    normalize_column_names(&mut df)?;
    let cleaned = clean(&df, target)?;
    Ok(DataTable::from_dataframe(&cleaned)?)
}

fn load_labelled(path: &Path, target: &str) -> anyhow::Result<(DataTable, ndarray::Array1<f64>)> {
    step_run("Loading data");
    let start = Instant::now();
    let table = load_table(path, target)?;
    let (features, y) = table.split_target(target)?;
    step_done(&format!(
        "{} rows × {} features in {:.2?}",
        features.n_rows(),
        features.n_cols(),
        start.elapsed()
    ));
    Ok((features, y))
}

/// Load an unlabelled CSV for scoring. Rows with missing values are
/// skipped; the returned frame holds exactly the scored rows.
pub fn load_features(path: &Path) -> anyhow::Result<(DataFrame, DataTable)> {
    let mut df = load_csv(path)?;
    normalize_column_names(&mut df)?;
    let df = drop_missing(&df)?;
    if df.height() == 0 {
        anyhow::bail!("no complete rows to score in {}", path.display());
    }
    let table = DataTable::from_dataframe(&df)?;
    Ok((df, table))
}

/// Saved models may be plain or calibrated pipelines
fn load_model(path: &Path) -> anyhow::Result<Box<dyn PredictProba>> {
    if let Ok(calibrated) = CalibratedClassifier::load(path) {
        return Ok(Box::new(calibrated));
    }
    Ok(Box::new(ModelPipeline::load(path)?))
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_evaluate(data_path: &Path, config: &EvaluationConfig) -> anyhow::Result<()> {
    section("Evaluate");

    step_run("Loading data");
    let table = load_table(data_path, &config.target)?;
    step_done(&format!("{} rows × {} cols", table.n_rows(), table.n_cols()));

    let names: Vec<&str> = config.models.iter().map(|m| m.name()).collect();
    step_run(&format!("Nested CV for {}", names.join(", ").cyan()));
    let start = Instant::now();
    let summary = evaluate_models(&table, config)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    println!();
    for line in summary.to_string().lines() {
        println!("  {}", line);
    }
    println!();
    kv("Written", &config.output.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_summary(data_path: &Path, target: &str) -> anyhow::Result<()> {
    section("Dataset");
    let table = load_table(data_path, target)?;
    for line in dataset_summary(&table, target).lines() {
        println!("  {}", line);
    }
    println!();
    Ok(())
}

pub fn cmd_train(
    data_path: &Path,
    target: &str,
    model: &str,
    output: Option<&Path>,
    seed: u64,
    cv_folds: usize,
) -> anyhow::Result<()> {
    section("Train");
    let family: ModelFamily = model.parse()?;
    let (features, y) = load_labelled(data_path, target)?;

    let template = ModelPipeline::builder()
        .columns_from(&features)
        .seed(seed)
        .family(family)
        .build()?;
    let grid = family.tuning_grid();
    let cv = CvConfig::default().with_seed(seed).with_n_splits(cv_folds);
    cv.validate()?;

    step_run(&format!("Grid search {} over {} candidates", family.name().cyan(), grid.len()));
    let start = Instant::now();
    let mut search = GridSearchCV::new(template, grid, CrossValidator::from_config(&cv));
    search.fit(&features, &y)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    if let Some(params) = search.best_params() {
        kv("Best params", &format_params(params));
    }
    kv("Inner ROC-AUC", &format!("{:.4}", search.best_score().unwrap_or(f64::NAN)));

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(format!("artefacts/{}.json", family.name())));
    search.into_best_estimator()?.save(&path)?;
    kv("Saved", &path.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_predict(model_path: &Path, data_path: &Path, output: &Path) -> anyhow::Result<()> {
    section("Predict");
    let model = load_model(model_path)?;

    step_run("Scoring");
    let (mut df, table) = load_features(data_path)?;
    let proba = model.predict_proba(&table)?;
    step_done(&format!("{} rows", proba.len()));

    df.with_column(Series::new("prediction".into(), proba.to_vec()))?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(output)?;
    CsvWriter::new(&mut file).finish(&mut df)?;
    kv("Written", &output.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_calibrate(
    model_path: &Path,
    data_path: &Path,
    target: &str,
    method: &str,
    output: &Path,
    bins: usize,
) -> anyhow::Result<()> {
    section("Calibrate");
    let base = ModelPipeline::load(model_path)?;
    let (features, y) = load_labelled(data_path, target)?;

    step_run(&format!("Fitting {} calibrator", method.cyan()));
    let calibrated = calibrate_model(base, &features, &y, method)?;
    step_done("");

    let proba = calibrated.predict_proba(&features)?;
    let (frac_pos, mean_pred) = calibration_curve(&y, &proba, bins)?;
    println!();
    println!("  {:>12} {:>12}", muted("predicted"), muted("observed"));
    for (p, f) in mean_pred.iter().zip(&frac_pos) {
        println!("  {:>12.3} {:>12.3}", p, f);
    }

    let report = eval_at(&y, &proba, DEFAULT_THRESHOLD)?;
    println!();
    kv("ROC-AUC", &format!("{:.3}", report.roc_auc));
    kv("PR-AUC", &format!("{:.3}", report.pr_auc));
    kv("Brier", &format!("{:.4}", report.brier));
    kv("F1", &format!("{:.3}", report.f1));
    kv("Balanced acc", &format!("{:.3}", report.balanced_accuracy));

    calibrated.save(output)?;
    println!();
    kv("Saved", &output.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_vif(data_path: &Path, target: &str, cap: f64, top: Option<usize>) -> anyhow::Result<()> {
    section("Variance inflation");
    let (table, y) = load_table(data_path, target)?.split_target(target)?;
    let numeric = table.numeric_columns();
    if numeric.is_empty() {
        anyhow::bail!("no numeric columns in {}", data_path.display());
    }

    for (name, vif) in calculate_vif(&table, &numeric)? {
        let value = format!("{:.2}", vif);
        let styled = if vif >= cap { value.yellow() } else { value.white() };
        println!("  {:<28} {}", muted(&name), styled);
    }

    let kept = vif_prune(&table, &numeric, cap)?;
    println!();
    kv("Kept", &kept.join(", "));

    if let Some(top) = top {
        let x = table.numeric_matrix(&kept)?;
        let ranked = tree_feature_selector(&x, &y, &kept, 100, top)?;
        kv("Top features", &ranked.join(", "));
    }
    println!();
    Ok(())
}
