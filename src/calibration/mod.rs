//! Model calibration module
//!
//! Probability calibration on top of a fitted pipeline:
//! - Platt scaling (sigmoid calibration)
//! - Isotonic regression
//! - Reliability curve data

mod curve;
mod isotonic;
mod platt;

pub use curve::calibration_curve;
pub use isotonic::IsotonicRegression;
pub use platt::PlattScaling;

use crate::data::DataTable;
use crate::error::{LoanEvalError, Result};
use crate::pipeline::{ModelPipeline, PredictProba};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Trait for probability calibrators
pub trait Calibrator: Send + Sync {
    /// Fit the calibrator on predicted probabilities and true labels
    fn fit(&mut self, probs: &Array1<f64>, labels: &Array1<f64>) -> Result<()>;

    /// Calibrate probabilities
    fn calibrate(&self, probs: &Array1<f64>) -> Result<Array1<f64>>;

    /// Fit and calibrate in one step
    fn fit_calibrate(&mut self, probs: &Array1<f64>, labels: &Array1<f64>) -> Result<Array1<f64>> {
        self.fit(probs, labels)?;
        self.calibrate(probs)
    }
}

/// Calibration method
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum CalibrationMethod {
    Sigmoid(PlattScaling),
    Isotonic(IsotonicRegression),
}

impl CalibrationMethod {
    /// Unfitted calibrator by name: `sigmoid` or `isotonic`
    pub fn from_name(method: &str) -> Result<Self> {
        match method {
            "sigmoid" => Ok(CalibrationMethod::Sigmoid(PlattScaling::new())),
            "isotonic" => Ok(CalibrationMethod::Isotonic(IsotonicRegression::new())),
            other => Err(LoanEvalError::invalid_param(
                "method",
                other,
                "expected sigmoid or isotonic",
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CalibrationMethod::Sigmoid(_) => "sigmoid",
            CalibrationMethod::Isotonic(_) => "isotonic",
        }
    }

    fn calibrator(&self) -> &dyn Calibrator {
        match self {
            CalibrationMethod::Sigmoid(c) => c,
            CalibrationMethod::Isotonic(c) => c,
        }
    }

    fn calibrator_mut(&mut self) -> &mut dyn Calibrator {
        match self {
            CalibrationMethod::Sigmoid(c) => c,
            CalibrationMethod::Isotonic(c) => c,
        }
    }
}

/// A fitted pipeline whose probabilities pass through a calibrator fitted
/// on held-out predictions of that same pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibratedClassifier {
    base: ModelPipeline,
    method: CalibrationMethod,
}

impl CalibratedClassifier {
    /// Wrap an already fitted pipeline and fit the calibrator on `(table, y)`
    pub fn prefit(base: ModelPipeline, method: CalibrationMethod, table: &DataTable, y: &Array1<f64>) -> Result<Self> {
        let raw = base.predict_proba(table)?;
        let mut method = method;
        method.calibrator_mut().fit(&raw, y)?;
        Ok(Self { base, method })
    }

    pub fn base(&self) -> &ModelPipeline {
        &self.base
    }

    pub fn method(&self) -> &CalibrationMethod {
        &self.method
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl PredictProba for CalibratedClassifier {
    fn predict_proba(&self, table: &DataTable) -> Result<Array1<f64>> {
        let raw = self.base.predict_proba(table)?;
        self.method.calibrator().calibrate(&raw)
    }
}

/// Calibrate a fitted pipeline with `sigmoid` or `isotonic`
pub fn calibrate_model(
    model: ModelPipeline,
    table: &DataTable,
    y: &Array1<f64>,
    method: &str,
) -> Result<CalibratedClassifier> {
    let method = CalibrationMethod::from_name(method)?;
    info!("Calibrating {} pipeline with {} method", model.family(), method.name());
    CalibratedClassifier::prefit(model, method, table, y)
}
