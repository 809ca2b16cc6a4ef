//! Capabilities the regression system delegates to
//!
//! How a model is fit, scored and encoded is left to implementations of
//! these traits. They are synchronous and may be slow; the system runs the
//! trainer and evaluator on the blocking thread pool.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::EngineError;
use crate::result::{AlgorithmRun, RegressionMetrics};
use crate::schema::{DataRow, DataView, Schema};

/// A trained, immutable model
pub trait RegressionModel: Send + Sync + 'static {
    /// Score one row shaped like the training schema
    fn predict(&self, row: &DataRow) -> Result<f32, EngineError>;

    /// Name of the algorithm that produced the model
    fn algorithm_name(&self) -> &str;
}

/// Best model of a search plus every candidate that was tried
#[derive(Debug, Clone)]
pub struct SearchOutcome<M> {
    pub best_model: M,
    pub best_algorithm: String,
    pub candidates: Vec<AlgorithmRun>,
}

/// Model search under a wall-clock budget
pub trait ModelTrainer: Send + Sync + 'static {
    type Model: RegressionModel;

    /// Search for the best model predicting `target_column`.
    ///
    /// `budget` is a ceiling the search should try to honor; it is not
    /// enforced by the caller.
    fn search(
        &self,
        data: &DataView,
        target_column: &str,
        budget: Duration,
    ) -> Result<SearchOutcome<Self::Model>, EngineError>;
}

/// Scores a model against held-out rows
pub trait ModelEvaluator<M>: Send + Sync + 'static {
    fn evaluate(
        &self,
        model: &M,
        data: &DataView,
        target_column: &str,
    ) -> Result<RegressionMetrics, EngineError>;
}

/// Encodes models (with their training schema) to bytes and back
pub trait ModelSerializer<M>: Send + Sync + 'static {
    fn save(&self, model: &M, schema: &Schema) -> Result<Vec<u8>, EngineError>;

    fn load(&self, bytes: &[u8]) -> Result<(M, Schema), EngineError>;
}

/// The three capabilities bundled for injection into a regression system
pub struct Engine<M> {
    trainer: Arc<dyn ModelTrainer<Model = M>>,
    evaluator: Arc<dyn ModelEvaluator<M>>,
    serializer: Arc<dyn ModelSerializer<M>>,
}

impl<M: RegressionModel> Engine<M> {
    pub fn new<Tr, Ev, Se>(trainer: Tr, evaluator: Ev, serializer: Se) -> Self
    where
        Tr: ModelTrainer<Model = M>,
        Ev: ModelEvaluator<M>,
        Se: ModelSerializer<M>,
    {
        Self {
            trainer: Arc::new(trainer),
            evaluator: Arc::new(evaluator),
            serializer: Arc::new(serializer),
        }
    }

    pub fn trainer(&self) -> &Arc<dyn ModelTrainer<Model = M>> {
        &self.trainer
    }

    pub fn evaluator(&self) -> &Arc<dyn ModelEvaluator<M>> {
        &self.evaluator
    }

    pub fn serializer(&self) -> &Arc<dyn ModelSerializer<M>> {
        &self.serializer
    }
}

impl<M> Clone for Engine<M> {
    fn clone(&self) -> Self {
        Self {
            trainer: Arc::clone(&self.trainer),
            evaluator: Arc::clone(&self.evaluator),
            serializer: Arc::clone(&self.serializer),
        }
    }
}

impl<M> fmt::Debug for Engine<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}
