//! Outcome records returned to callers

use serde::{Deserialize, Serialize};

use crate::errors::TrainingFailure;

/// Quality of a model measured against labelled rows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mean_absolute_error: f64,
    pub mean_squared_error: f64,
    pub root_mean_squared_error: f64,
    /// Coefficient of determination; closer to 1 is a better fit
    pub r_squared: f64,
}

/// One algorithm tried by the model search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmRun {
    pub name: String,
    pub duration_seconds: f64,
    pub mean_absolute_error: f64,
    pub mean_squared_error: f64,
    pub root_mean_squared_error: f64,
    pub r_squared: f64,
}

impl AlgorithmRun {
    pub fn new(name: impl Into<String>, duration_seconds: f64, metrics: RegressionMetrics) -> Self {
        Self {
            name: name.into(),
            duration_seconds,
            mean_absolute_error: metrics.mean_absolute_error,
            mean_squared_error: metrics.mean_squared_error,
            root_mean_squared_error: metrics.root_mean_squared_error,
            r_squared: metrics.r_squared,
        }
    }

    pub fn metrics(&self) -> RegressionMetrics {
        RegressionMetrics {
            mean_absolute_error: self.mean_absolute_error,
            mean_squared_error: self.mean_squared_error,
            root_mean_squared_error: self.root_mean_squared_error,
            r_squared: self.r_squared,
        }
    }
}

/// Keep runs with a finite R², best first. Ties keep their run order.
pub fn rank_by_r_squared(runs: &[AlgorithmRun]) -> Vec<AlgorithmRun> {
    let mut ranked: Vec<AlgorithmRun> = runs
        .iter()
        .filter(|run| run.r_squared.is_finite())
        .cloned()
        .collect();
    ranked.sort_by(|a, b| b.r_squared.total_cmp(&a.r_squared));
    ranked
}

/// Outcome of a `train` or `retrain` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingResult {
    /// A model was produced, evaluated and saved, and no error was recorded
    pub succeeded: bool,
    pub error: Option<TrainingFailure>,
    pub selected_algorithm: Option<String>,
    pub tested_algorithms: Vec<AlgorithmRun>,
    /// Metrics of the selected model on the evaluation set
    pub evaluation_metrics: Option<RegressionMetrics>,
}

impl TrainingResult {
    pub(crate) fn empty() -> Self {
        Self {
            succeeded: false,
            error: None,
            selected_algorithm: None,
            tested_algorithms: Vec::new(),
            evaluation_metrics: None,
        }
    }
}

/// Predicted value for a single question
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub score: f32,
}
