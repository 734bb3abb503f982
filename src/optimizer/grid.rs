//! Hyperparameter grids

use crate::error::{LoanEvalError, Result};
use crate::synthetic::Resampler;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Float(f64),
    Int(i64),
    String(String),
    Bool(bool),
    /// Unset, e.g. unlimited `max_depth` or no class weighting
    None,
    Resampler(Resampler),
}

impl ParameterValue {
    pub fn as_f64(&self, name: &str) -> Result<f64> {
        match self {
            ParameterValue::Float(v) => Ok(*v),
            ParameterValue::Int(v) => Ok(*v as f64),
            other => Err(LoanEvalError::invalid_param(name, other, "expected a number")),
        }
    }

    pub fn as_usize(&self, name: &str) -> Result<usize> {
        match self {
            ParameterValue::Int(v) if *v >= 0 => Ok(*v as usize),
            other => Err(LoanEvalError::invalid_param(
                name,
                other,
                "expected a non-negative integer",
            )),
        }
    }

    /// `None` or a non-negative integer
    pub fn as_opt_usize(&self, name: &str) -> Result<Option<usize>> {
        match self {
            ParameterValue::None => Ok(None),
            other => other.as_usize(name).map(Some),
        }
    }

    pub fn as_str(&self, name: &str) -> Result<&str> {
        match self {
            ParameterValue::String(s) => Ok(s),
            other => Err(LoanEvalError::invalid_param(name, other, "expected a string")),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::String(s) => write!(f, "{}", s),
            ParameterValue::Bool(b) => write!(f, "{}", b),
            ParameterValue::None => write!(f, "None"),
            ParameterValue::Resampler(r) => write!(f, "{}", r),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::String(v.to_string())
    }
}

impl From<Resampler> for ParameterValue {
    fn from(v: Resampler) -> Self {
        ParameterValue::Resampler(v)
    }
}

/// One grid point: ordered `(path, value)` assignments
pub type TrialParams = Vec<(String, ParameterValue)>;

/// Render a grid point as `path=value, ...`
pub fn format_params(params: &TrialParams) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ordered candidate lists for a set of parameter paths
pub type GridBlock = Vec<(String, Vec<ParameterValue>)>;

/// Exhaustive grid made of one or more blocks; each block expands to the
/// cartesian product of its candidate lists, blocks are enumerated in order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    blocks: Vec<GridBlock>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter to the last block, opening one if needed
    pub fn with_param(mut self, path: &str, values: Vec<ParameterValue>) -> Self {
        if self.blocks.is_empty() {
            self.blocks.push(Vec::new());
        }
        if let Some(block) = self.blocks.last_mut() {
            block.push((path.to_string(), values));
        }
        self
    }

    /// Start a new block
    pub fn with_block(mut self, block: GridBlock) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn blocks(&self) -> &[GridBlock] {
        &self.blocks
    }

    /// New grid where every block also searches over `resamplers` under
    /// the `sampler` path. Blocks are copied, never shared.
    pub fn with_resamplers(&self, resamplers: &[Resampler]) -> ParamGrid {
        let candidates: Vec<ParameterValue> = resamplers
            .iter()
            .cloned()
            .map(ParameterValue::Resampler)
            .collect();

        let source = if self.blocks.is_empty() {
            vec![Vec::new()]
        } else {
            self.blocks.clone()
        };
        let blocks = source
            .into_iter()
            .map(|mut block| {
                block.retain(|(path, _)| path != "sampler");
                block.push(("sampler".to_string(), candidates.clone()));
                block
            })
            .collect();
        ParamGrid { blocks }
    }

    /// Enumerate all grid points; the last parameter of a block varies fastest
    pub fn candidates(&self) -> Vec<TrialParams> {
        if self.blocks.is_empty() {
            return vec![Vec::new()];
        }

        let mut out = Vec::new();
        for block in &self.blocks {
            let mut points: Vec<TrialParams> = vec![Vec::new()];
            for (path, values) in block {
                points = points
                    .into_iter()
                    .flat_map(|point| {
                        values.iter().map(move |v| {
                            let mut next = point.clone();
                            next.push((path.clone(), v.clone()));
                            next
                        })
                    })
                    .collect();
            }
            out.extend(points);
        }
        out
    }

    pub fn len(&self) -> usize {
        if self.blocks.is_empty() {
            return 1;
        }
        self.blocks
            .iter()
            .map(|b| b.iter().map(|(_, v)| v.len()).product::<usize>())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
