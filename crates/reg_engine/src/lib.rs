//! tabreg engine - in-process model search for tabreg-core
//!
//! Provides a time-budgeted search over ridge, decision-tree and
//! gradient-boosting regressors, an evaluator and a snapshot codec, bundled
//! as an [`Engine`] for [`RegressionSystem`].

pub mod cart;
pub mod deterministic;
pub mod errors;
pub mod featurize;
pub mod gbdt;
pub mod linear;
pub mod metrics;
pub mod model;
pub mod search;
pub mod snapshot;

use tabreg_core::{Engine, RegressionSystem};

pub use errors::FitError;
pub use featurize::{FeatureMatrix, Featurizer};
pub use metrics::{regression_metrics, RegressionEvaluator};
pub use model::{Estimator, SearchModel};
pub use search::{
    default_candidates, AutoRegressionSearch, Candidate, CandidateReport, ProgressObserver,
    DECISION_TREE_REGRESSION, GRADIENT_BOOSTING_REGRESSION, RIDGE_REGRESSION,
};
pub use snapshot::{SnapshotInfo, SnapshotSerializer};

/// Regression system served by the reference engine
pub type AutoRegressionSystem<T> = RegressionSystem<T, SearchModel>;

/// Engine built around the given search
pub fn engine_with_search(search: AutoRegressionSearch) -> Engine<SearchModel> {
    Engine::new(search, RegressionEvaluator, SnapshotSerializer::default())
}

/// Engine with the default candidates
pub fn default_engine() -> Engine<SearchModel> {
    engine_with_search(AutoRegressionSearch::default())
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
