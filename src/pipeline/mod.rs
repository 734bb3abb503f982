//! Preprocess → resample → classify pipeline
//!
//! [`ModelPipeline`] is the single fit/predict unit that grid search tunes
//! and nested cross-validation scores. Resampling runs only inside `fit`.

use crate::data::DataTable;
use crate::error::{LoanEvalError, Result};
use crate::optimizer::{ParameterValue, TrialParams};
use crate::preprocessing::ColumnTransformer;
use crate::synthetic::Resampler;
use crate::training::{Classifier, ClassifierModel, ModelFamily};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Anything that maps a table of features to positive-class probabilities
pub trait PredictProba: Send + Sync {
    fn predict_proba(&self, table: &DataTable) -> Result<Array1<f64>>;

    /// Hard labels at `threshold` (inclusive)
    fn predict(&self, table: &DataTable, threshold: f64) -> Result<Array1<f64>> {
        Ok(self
            .predict_proba(table)?
            .mapv(|p| if p >= threshold { 1.0 } else { 0.0 }))
    }
}

/// Column transformer, optional resampler and classifier fitted as one unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPipeline {
    preprocessor: ColumnTransformer,
    sampler: Resampler,
    model: ClassifierModel,
    seed: u64,
    is_fitted: bool,
}

impl ModelPipeline {
    pub fn new(preprocessor: ColumnTransformer, model: ClassifierModel) -> Self {
        Self {
            preprocessor,
            sampler: Resampler::Passthrough,
            model,
            seed: 0,
            is_fitted: false,
        }
    }

    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn with_sampler(mut self, sampler: Resampler) -> Self {
        self.sampler = sampler;
        self
    }

    /// Seed used by the resampler
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn family(&self) -> ModelFamily {
        self.model.family()
    }

    pub fn preprocessor(&self) -> &ColumnTransformer {
        &self.preprocessor
    }

    pub fn sampler(&self) -> &Resampler {
        &self.sampler
    }

    pub fn model(&self) -> &ClassifierModel {
        &self.model
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Set a parameter by path: `sampler` or `model__<name>`
    pub fn set_param(&mut self, path: &str, value: &ParameterValue) -> Result<()> {
        if path == "sampler" {
            self.sampler = match value {
                ParameterValue::Resampler(r) => r.clone(),
                ParameterValue::None => Resampler::Passthrough,
                ParameterValue::String(s) if s == "passthrough" => Resampler::Passthrough,
                other => {
                    return Err(LoanEvalError::invalid_param(path, other, "expected a resampler"))
                }
            };
            return Ok(());
        }
        match path.strip_prefix("model__") {
            Some(name) => self.model.set_param(name, value),
            None => Err(LoanEvalError::invalid_param(
                path,
                value,
                "unknown pipeline step, expected sampler or model__<param>",
            )),
        }
    }

    pub fn set_params(&mut self, params: &TrialParams) -> Result<()> {
        for (path, value) in params {
            self.set_param(path, value)?;
        }
        Ok(())
    }

    /// Preprocess, resample the training rows, then fit the classifier
    pub fn fit(&mut self, table: &DataTable, y: &Array1<f64>) -> Result<&mut Self> {
        if table.n_rows() != y.len() {
            return Err(LoanEvalError::ShapeError {
                expected: format!("{} labels", table.n_rows()),
                actual: format!("{} labels", y.len()),
            });
        }

        let x = self.preprocessor.fit_transform(table)?;
        let (x_train, y_train) = self.sampler.resample(&x, y, self.seed)?;
        if x_train.nrows() != x.nrows() {
            debug!(
                "{} resampled {} rows to {}",
                self.sampler,
                x.nrows(),
                x_train.nrows()
            );
        }

        self.model.fit(&x_train, &y_train)?;
        self.is_fitted = true;
        Ok(self)
    }

    /// Names of the model's input features after preprocessing
    pub fn feature_names(&self) -> Vec<String> {
        self.preprocessor.feature_names()
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

impl PredictProba for ModelPipeline {
    /// Preprocess and classify; never resamples
    fn predict_proba(&self, table: &DataTable) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(LoanEvalError::ModelNotFitted);
        }
        let x = self.preprocessor.transform(table)?;
        self.model.predict_proba(&x)
    }
}

/// Builder for [`ModelPipeline`]
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    numeric_columns: Vec<String>,
    categorical_columns: Vec<String>,
    model: Option<ClassifierModel>,
    sampler: Resampler,
    seed: u64,
}

impl PipelineBuilder {
    /// Take the column split from the table's dtypes
    pub fn columns_from(mut self, table: &DataTable) -> Self {
        self.numeric_columns = table.numeric_columns();
        self.categorical_columns = table.categorical_columns();
        self
    }

    pub fn numeric_columns(mut self, columns: Vec<String>) -> Self {
        self.numeric_columns = columns;
        self
    }

    pub fn categorical_columns(mut self, columns: Vec<String>) -> Self {
        self.categorical_columns = columns;
        self
    }

    pub fn model(mut self, model: ClassifierModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Default model of `family`, seeded with the builder's seed
    pub fn family(mut self, family: ModelFamily) -> Self {
        self.model = Some(ClassifierModel::from_family(family, self.seed));
        self
    }

    pub fn sampler(mut self, sampler: Resampler) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> Result<ModelPipeline> {
        let model = self
            .model
            .ok_or_else(|| LoanEvalError::ConfigError("pipeline needs a classifier".to_string()))?;
        if self.numeric_columns.is_empty() && self.categorical_columns.is_empty() {
            return Err(LoanEvalError::ConfigError(
                "pipeline needs at least one feature column".to_string(),
            ));
        }
        Ok(ModelPipeline::new(
            ColumnTransformer::new(self.numeric_columns, self.categorical_columns),
            model,
        )
        .with_sampler(self.sampler)
        .with_seed(self.seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ColumnData;

    fn loans() -> (DataTable, Array1<f64>) {
        let income = vec![1.0, 1.5, 2.0, 2.5, 3.0, 6.0, 6.5, 7.0, 7.5, 8.0];
        let area: Vec<String> = ["Urban", "Rural", "Urban", "Rural", "Urban", "Urban", "Rural", "Urban", "Rural", "Urban"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let table = DataTable::new(vec![
            ("income".to_string(), ColumnData::Numeric(income)),
            ("area".to_string(), ColumnData::Categorical(area)),
        ])
        .unwrap();
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        (table, y)
    }

    #[test]
    fn test_fit_predict_round_trip() {
        let (table, y) = loans();
        let mut pipe = ModelPipeline::builder()
            .columns_from(&table)
            .family(ModelFamily::LogReg)
            .build()
            .unwrap();
        pipe.fit(&table, &y).unwrap();

        let proba = pipe.predict_proba(&table).unwrap();
        assert_eq!(proba.len(), 10);
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(proba[9] > proba[0]);
        assert_eq!(pipe.feature_names(), vec!["income", "area=Rural", "area=Urban"]);
    }

    #[test]
    fn test_resampling_only_at_fit() {
        let (table, y) = loans();
        let mut pipe = ModelPipeline::builder()
            .columns_from(&table)
            .family(ModelFamily::Cart)
            .sampler(Resampler::RandomOver)
            .build()
            .unwrap();
        pipe.fit(&table, &y).unwrap();
        // prediction keeps one output per input row
        assert_eq!(pipe.predict_proba(&table).unwrap().len(), table.n_rows());
    }

    #[test]
    fn test_set_param_paths() {
        let (table, _) = loans();
        let mut pipe = ModelPipeline::builder()
            .columns_from(&table)
            .family(ModelFamily::LogReg)
            .build()
            .unwrap();
        pipe.set_param("model__C", &0.5.into()).unwrap();
        pipe.set_param("sampler", &Resampler::smote().into()).unwrap();
        assert_eq!(pipe.sampler(), &Resampler::smote());
        assert!(pipe.set_param("scaler__with_mean", &ParameterValue::Bool(true)).is_err());
        assert!(pipe.set_param("model__n_estimators", &ParameterValue::Int(5)).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let (table, _) = loans();
        let pipe = ModelPipeline::builder()
            .columns_from(&table)
            .family(ModelFamily::Cart)
            .build()
            .unwrap();
        assert!(matches!(pipe.predict_proba(&table), Err(LoanEvalError::ModelNotFitted)));
    }

    #[test]
    fn test_builder_requires_model() {
        assert!(ModelPipeline::builder()
            .numeric_columns(vec!["income".into()])
            .build()
            .is_err());
    }

    #[test]
    fn test_save_load() {
        let (table, y) = loans();
        let mut pipe = ModelPipeline::builder()
            .columns_from(&table)
            .family(ModelFamily::Cart)
            .build()
            .unwrap();
        pipe.fit(&table, &y).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("cart.json");
        pipe.save(&path).unwrap();
        let loaded = ModelPipeline::load(&path).unwrap();
        assert_eq!(
            loaded.predict_proba(&table).unwrap(),
            pipe.predict_proba(&table).unwrap()
        );
    }
}
