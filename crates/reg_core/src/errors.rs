//! Error types for the regression lifecycle
//!
//! Two policies live side by side here. [`RegressionError`] is raised to the
//! caller for contract violations (bad arguments, untrained system, corrupt
//! snapshots). [`TrainingFailure`] never escapes as an `Err`: it is recorded
//! on a [`TrainingResult`](crate::result::TrainingResult) when a step of the
//! training pipeline fails.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised synchronously by the regression system
#[derive(Error, Debug)]
pub enum RegressionError {
    /// A required input was empty or had an unsupported shape
    #[error("Invalid argument `{argument}`: {reason}")]
    InvalidArgument {
        argument: &'static str,
        reason: String,
    },

    /// An input was well formed but outside the accepted range
    #[error("Argument `{argument}` out of range: {reason}")]
    OutOfRange {
        argument: &'static str,
        reason: String,
    },

    /// Prediction or export requested before any model was trained
    #[error("System is not trained")]
    NotTrained,

    /// Snapshot bytes do not describe a loadable model
    #[error("Model content is not valid: {0}")]
    ModelNotValid(String),

    /// Snapshot file does not exist
    #[error("Snapshot file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Settings could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine failure outside of the training pipeline
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

impl RegressionError {
    pub(crate) fn invalid(argument: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument,
            reason: reason.into(),
        }
    }

    pub(crate) fn out_of_range(argument: &'static str, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            argument,
            reason: reason.into(),
        }
    }
}

/// Failures reported by the model trainer, evaluator or serializer
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineError {
    /// Input data unusable by the engine (e.g. wrong label kind)
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Model search failed
    #[error("model search failed: {0}")]
    Search(String),

    /// Evaluation against held-out data failed
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// Model could not be encoded
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Bytes could not be decoded into a model
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// Model could not score a row
    #[error("prediction failed: {0}")]
    Prediction(String),
}

/// Pipeline step a training failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrainingStep {
    Training,
    Evaluating,
    Saving,
}

impl fmt::Display for TrainingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TrainingStep::Training => "Training system",
            TrainingStep::Evaluating => "Evaluating trained model",
            TrainingStep::Saving => "Saving trained model",
        };
        f.write_str(label)
    }
}

/// Wrapped engine error recorded on a failed training result
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Error in step '{step}'. More information: {cause}")]
pub struct TrainingFailure {
    pub step: TrainingStep,
    #[source]
    pub cause: EngineError,
}

impl TrainingFailure {
    pub fn new(step: TrainingStep, cause: EngineError) -> Self {
        Self { step, cause }
    }
}

/// Result type for regression system operations
pub type Result<T> = std::result::Result<T, RegressionError>;
