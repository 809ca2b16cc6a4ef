use tabreg_core::EngineError;
use thiserror::Error;

/// Errors returned while fitting or applying a model.
#[derive(Debug, Error)]
pub enum FitError {
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("feature error: {0}")]
    Features(String),
}

impl From<FitError> for EngineError {
    fn from(err: FitError) -> Self {
        match err {
            FitError::Dataset(msg) => EngineError::InvalidData(msg),
            FitError::Training(msg) => EngineError::Search(msg),
            FitError::Features(msg) => EngineError::Prediction(msg),
        }
    }
}
