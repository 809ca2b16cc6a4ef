//! Regression lifecycle over typed records
//!
//! Wraps a pluggable model-search engine with a stateful system that keeps
//! training and evaluation data, swaps trained models atomically and exports
//! them as self-contained snapshots.
//!
//! Modules:
//! - `schema`: Record introspection and the row/column view given to engines
//! - `config`: Target column, training budget and evaluation fraction
//! - `split`: Ordered training/evaluation partitioning
//! - `engine`: Trainer, evaluator and serializer capabilities
//! - `result`: Training results, metrics and predictions
//! - `system`: The regression system itself
//! - `logging`: Tracing subscriber setup

pub mod config;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod result;
pub mod schema;
pub mod split;
pub mod system;

pub use config::{
    Configuration, RegressionSettings, DEFAULT_EVALUATION_FRACTION, DEFAULT_TRAINING_TIME,
    MIN_TRAINING_TIME,
};
pub use engine::{
    Engine, ModelEvaluator, ModelSerializer, ModelTrainer, RegressionModel, SearchOutcome,
};
pub use errors::{EngineError, RegressionError, Result, TrainingFailure, TrainingStep};
pub use result::{rank_by_r_squared, AlgorithmRun, Prediction, RegressionMetrics, TrainingResult};
pub use schema::{
    Column, ColumnKind, ColumnValue, DataRow, DataView, FieldDescriptor, FieldType, Record, Schema,
};
pub use split::{split, training_size, Partition};
pub use system::{LearningSystem, RegressionSystem, MIN_DATASET_ROWS};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
