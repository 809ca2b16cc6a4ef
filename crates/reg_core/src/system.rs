//! Stateful regression system
//!
//! Owns the current training/evaluation partitions and the active model.
//! Training runs the engine's search and evaluation on the blocking pool and
//! swaps in the new model only once search, evaluation and saving all
//! succeeded. Predictions clone the active model pointer and never wait on
//! training.
//!
//! Overlapping `train`/`retrain` calls on one system are not serialized:
//! their updates of the training set may race. Callers issuing concurrent
//! writes must synchronize them.

use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::config::Configuration;
use crate::engine::{Engine, RegressionModel, SearchOutcome};
use crate::errors::{EngineError, RegressionError, Result, TrainingFailure, TrainingStep};
use crate::result::{rank_by_r_squared, Prediction, RegressionMetrics, TrainingResult};
use crate::schema::{DataView, Record, Schema};
use crate::split::{self, Partition};

/// Minimal number of rows accepted by [`RegressionSystem::train`]
pub const MIN_DATASET_ROWS: usize = 5;

/// Common surface of trainable systems
#[async_trait]
pub trait LearningSystem<T: Record>: Send + Sync {
    type Output;

    fn configuration(&self) -> &Configuration<T>;

    /// Records the current model was trained on
    fn training_set(&self) -> Arc<Vec<T>>;

    /// Records held out for evaluation
    fn evaluation_set(&self) -> Arc<Vec<T>>;

    /// Train from scratch on `dataset`
    async fn train(&self, dataset: &[T]) -> Result<TrainingResult>;

    /// Add `new_data` to the training set and train again
    async fn retrain(&self, new_data: &[T]) -> Result<TrainingResult>;

    fn predict(&self, question: &T) -> Result<Self::Output>;

    /// Serialized form of the active model
    fn export(&self) -> Result<Cursor<Vec<u8>>>;
}

/// Model currently served, with the snapshot produced when it was saved
struct ActiveModel<M> {
    model: M,
    snapshot: Arc<[u8]>,
}

struct DataSets<T> {
    training: Arc<Vec<T>>,
    evaluation: Arc<Vec<T>>,
}

impl<T> Default for DataSets<T> {
    fn default() -> Self {
        Self {
            training: Arc::new(Vec::new()),
            evaluation: Arc::new(Vec::new()),
        }
    }
}

/// Regression system over records of type `T`, served by models of type `M`
pub struct RegressionSystem<T: Record, M: RegressionModel> {
    configuration: Configuration<T>,
    schema: Arc<Schema>,
    engine: Engine<M>,
    data: RwLock<DataSets<T>>,
    active: RwLock<Option<Arc<ActiveModel<M>>>>,
}

impl<T: Record, M: RegressionModel> RegressionSystem<T, M> {
    /// Create an untrained system
    ///
    /// Fails with `InvalidArgument` naming the first field of `T` whose type
    /// is not text, boolean or float32.
    pub fn create(configuration: Configuration<T>, engine: Engine<M>) -> Result<Self> {
        let schema = Schema::of::<T>()?;
        debug!(
            "Created regression system over {} columns, target {}",
            schema.len(),
            configuration.target_column()
        );

        Ok(Self {
            configuration,
            schema: Arc::new(schema),
            engine,
            data: RwLock::new(DataSets::default()),
            active: RwLock::new(None),
        })
    }

    /// Restore a prediction-only system from an exported snapshot.
    ///
    /// Training and evaluation sets are not restored.
    pub fn load<R: Read>(
        mut snapshot: R,
        configuration: Configuration<T>,
        engine: Engine<M>,
    ) -> Result<Self> {
        let system = Self::create(configuration, engine)?;

        let mut bytes = Vec::new();
        snapshot.read_to_end(&mut bytes)?;
        if bytes.is_empty() {
            return Err(RegressionError::invalid("snapshot", "snapshot is empty"));
        }

        let (model, schema) = system
            .engine
            .serializer()
            .load(&bytes)
            .map_err(|e| RegressionError::ModelNotValid(e.to_string()))?;

        if !schema.is_compatible_with(&system.schema) {
            return Err(RegressionError::ModelNotValid(format!(
                "snapshot schema does not match {}",
                std::any::type_name::<T>()
            )));
        }

        info!(
            "Loaded {} model from snapshot ({} bytes)",
            model.algorithm_name(),
            bytes.len()
        );
        system.activate(ActiveModel {
            model,
            snapshot: bytes.into(),
        });
        Ok(system)
    }

    /// Restore a prediction-only system from a snapshot file
    pub fn load_from_path<P: AsRef<Path>>(
        path: P,
        configuration: Configuration<T>,
        engine: Engine<M>,
    ) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(RegressionError::FileNotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        Self::load(file, configuration, engine)
    }

    pub fn configuration(&self) -> &Configuration<T> {
        &self.configuration
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn training_set(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.data.read().training)
    }

    pub fn evaluation_set(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.data.read().evaluation)
    }

    pub fn is_trained(&self) -> bool {
        self.active.read().is_some()
    }

    /// Algorithm of the model currently served
    pub fn active_algorithm(&self) -> Option<String> {
        self.current()
            .map(|active| active.model.algorithm_name().to_string())
    }

    /// Train from scratch.
    ///
    /// The whole dataset feeds the model search; its trailing
    /// `evaluation_fraction` share becomes the evaluation set. Pipeline
    /// failures are reported on the returned result.
    #[instrument(skip(self, dataset), fields(rows = dataset.len()))]
    pub async fn train(&self, dataset: &[T]) -> Result<TrainingResult> {
        if dataset.is_empty() {
            return Err(RegressionError::invalid("dataset", "dataset is empty"));
        }
        if dataset.len() < MIN_DATASET_ROWS {
            return Err(RegressionError::out_of_range(
                "dataset",
                format!(
                    "{} rows given, at least {} required",
                    dataset.len(),
                    MIN_DATASET_ROWS
                ),
            ));
        }

        let training_view = self.schema.view_of(dataset)?;
        let Partition {
            training,
            evaluation,
        } = split::split(dataset.to_vec(), self.configuration.evaluation_fraction());
        // evaluation rows are the trailing rows of the dataset
        let evaluation_view = DataView::new(
            Arc::clone(&self.schema),
            training_view.rows()[training.len()..].to_vec(),
        );

        info!(
            "Split {} rows into {} training / {} evaluation",
            dataset.len(),
            training.len(),
            evaluation.len()
        );
        *self.data.write() = DataSets {
            training: Arc::new(training),
            evaluation: Arc::new(evaluation),
        };

        Ok(self.run_pipeline(training_view, evaluation_view).await)
    }

    /// Append `new_data` to the training set and train again.
    ///
    /// The evaluation set is left as it was.
    #[instrument(skip(self, new_data), fields(rows = new_data.len()))]
    pub async fn retrain(&self, new_data: &[T]) -> Result<TrainingResult> {
        if new_data.is_empty() {
            return Err(RegressionError::invalid("new_data", "new data is empty"));
        }
        let new_rows = self.schema.view_of(new_data)?.into_rows();

        let (training, evaluation) = {
            let mut sets = self.data.write();
            let mut training = Vec::with_capacity(sets.training.len() + new_data.len());
            training.extend_from_slice(&sets.training);
            training.extend_from_slice(new_data);
            sets.training = Arc::new(training);
            (Arc::clone(&sets.training), Arc::clone(&sets.evaluation))
        };

        info!(
            "Training set grew to {} rows ({} new)",
            training.len(),
            new_data.len()
        );
        let previous = training.len() - new_rows.len();
        let mut rows = training[..previous]
            .iter()
            .map(|record| self.schema.row_of(record))
            .collect::<Result<Vec<_>>>()?;
        rows.extend(new_rows);
        let training_view = DataView::new(Arc::clone(&self.schema), rows);
        let evaluation_view = self.schema.view_of(&evaluation)?;

        Ok(self.run_pipeline(training_view, evaluation_view).await)
    }

    /// Score `question` with the active model
    pub fn predict(&self, question: &T) -> Result<Prediction> {
        let active = self.current().ok_or(RegressionError::NotTrained)?;
        let row = self.schema.row_of(question)?;
        let score = active.model.predict(&row)?;
        Ok(Prediction { score })
    }

    /// Snapshot of the active model, positioned at its start
    pub fn export(&self) -> Result<Cursor<Vec<u8>>> {
        let active = self.current().ok_or(RegressionError::NotTrained)?;
        Ok(Cursor::new(active.snapshot.to_vec()))
    }

    /// Write the snapshot to `path`, replacing any existing file
    pub fn export_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let snapshot = self.export()?.into_inner();
        std::fs::write(path, &snapshot)?;
        info!("Exported {} bytes to {}", snapshot.len(), path.display());
        Ok(())
    }

    fn current(&self) -> Option<Arc<ActiveModel<M>>> {
        self.active.read().clone()
    }

    fn activate(&self, model: ActiveModel<M>) {
        *self.active.write() = Some(Arc::new(model));
    }

    /// Search, evaluate, save; the active model changes only if all three succeed
    async fn run_pipeline(&self, training: DataView, evaluation: DataView) -> TrainingResult {
        let started = Instant::now();
        let mut result = TrainingResult::empty();
        let target = self.configuration.target_column().to_string();
        let budget = self.configuration.training_budget();

        info!(
            "Searching models on {} rows for at most {}s",
            training.len(),
            budget.as_secs()
        );
        let outcome = match self.search(training, target.clone(), budget).await {
            Ok(outcome) => outcome,
            Err(cause) => return failed(result, TrainingStep::Training, cause),
        };
        result.tested_algorithms = rank_by_r_squared(&outcome.candidates);
        result.selected_algorithm = Some(outcome.best_algorithm.clone());

        let (model, metrics) = match self.evaluate(outcome.best_model, evaluation, target).await {
            Ok(evaluated) => evaluated,
            Err(cause) => return failed(result, TrainingStep::Evaluating, cause),
        };
        result.evaluation_metrics = Some(metrics);

        let snapshot = match self.engine.serializer().save(&model, &self.schema) {
            Ok(bytes) => bytes,
            Err(cause) => return failed(result, TrainingStep::Saving, cause),
        };

        info!(
            "Activated {} (R²={:.4}, RMSE={:.4}) after {}ms",
            outcome.best_algorithm,
            metrics.r_squared,
            metrics.root_mean_squared_error,
            started.elapsed().as_millis()
        );
        self.activate(ActiveModel {
            model,
            snapshot: snapshot.into(),
        });
        result.succeeded = true;
        result
    }

    async fn search(
        &self,
        data: DataView,
        target: String,
        budget: Duration,
    ) -> std::result::Result<SearchOutcome<M>, EngineError> {
        let trainer = Arc::clone(self.engine.trainer());
        tokio::task::spawn_blocking(move || trainer.search(&data, &target, budget))
            .await
            .map_err(|e| EngineError::Search(format!("search task aborted: {}", e)))?
    }

    async fn evaluate(
        &self,
        model: M,
        data: DataView,
        target: String,
    ) -> std::result::Result<(M, RegressionMetrics), EngineError> {
        let evaluator = Arc::clone(self.engine.evaluator());
        let (model, metrics) = tokio::task::spawn_blocking(move || {
            let metrics = evaluator.evaluate(&model, &data, &target);
            (model, metrics)
        })
        .await
        .map_err(|e| EngineError::Evaluation(format!("evaluation task aborted: {}", e)))?;
        Ok((model, metrics?))
    }
}

fn failed(mut result: TrainingResult, step: TrainingStep, cause: EngineError) -> TrainingResult {
    let failure = TrainingFailure::new(step, cause);
    warn!("{}", failure);
    result.succeeded = false;
    result.error = Some(failure);
    result
}

#[async_trait]
impl<T: Record, M: RegressionModel> LearningSystem<T> for RegressionSystem<T, M> {
    type Output = Prediction;

    fn configuration(&self) -> &Configuration<T> {
        RegressionSystem::configuration(self)
    }

    fn training_set(&self) -> Arc<Vec<T>> {
        RegressionSystem::training_set(self)
    }

    fn evaluation_set(&self) -> Arc<Vec<T>> {
        RegressionSystem::evaluation_set(self)
    }

    async fn train(&self, dataset: &[T]) -> Result<TrainingResult> {
        RegressionSystem::train(self, dataset).await
    }

    async fn retrain(&self, new_data: &[T]) -> Result<TrainingResult> {
        RegressionSystem::retrain(self, new_data).await
    }

    fn predict(&self, question: &T) -> Result<Prediction> {
        RegressionSystem::predict(self, question)
    }

    fn export(&self) -> Result<Cursor<Vec<u8>>> {
        RegressionSystem::export(self)
    }
}

impl<T: Record, M: RegressionModel> fmt::Debug for RegressionSystem<T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sets = self.data.read();
        f.debug_struct("RegressionSystem")
            .field("configuration", &self.configuration)
            .field("training_rows", &sets.training.len())
            .field("evaluation_rows", &sets.evaluation.len())
            .field("trained", &self.is_trained())
            .finish()
    }
}
