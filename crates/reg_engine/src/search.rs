//! Time-budgeted model search
//!
//! Every candidate is fit on a deterministic hash-ordered share of the rows
//! and scored on the rest. Candidates run in order while the budget lasts
//! (the first always runs). The best one by R², or by MSE when no R² is
//! defined, is refit on every row.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ndarray::Array1;
use tabreg_core::{AlgorithmRun, DataView, EngineError, ModelTrainer, SearchOutcome};
use tracing::{debug, info, instrument, warn};

use crate::cart::{CartBuilder, TreeConfig};
use crate::deterministic::holdout_indices;
use crate::errors::FitError;
use crate::featurize::{FeatureMatrix, Featurizer};
use crate::gbdt::{GbdtConfig, GbdtTrainer};
use crate::linear::RidgeRegression;
use crate::metrics::regression_metrics;
use crate::model::{Estimator, SearchModel};

pub const RIDGE_REGRESSION: &str = "RidgeRegression";
pub const DECISION_TREE_REGRESSION: &str = "DecisionTreeRegression";
pub const GRADIENT_BOOSTING_REGRESSION: &str = "GradientBoostingRegression";

/// Share of rows held out to compare candidates
pub const DEFAULT_HOLDOUT_FRACTION: f64 = 0.2;

/// One algorithm with its hyper-parameters
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    Ridge(RidgeRegression),
    Tree(TreeConfig),
    Boosting(GbdtConfig),
}

impl Candidate {
    pub fn algorithm(&self) -> &'static str {
        match self {
            Candidate::Ridge(_) => RIDGE_REGRESSION,
            Candidate::Tree(_) => DECISION_TREE_REGRESSION,
            Candidate::Boosting(_) => GRADIENT_BOOSTING_REGRESSION,
        }
    }

    pub fn fit(&self, data: &FeatureMatrix, deadline: Option<Instant>) -> Result<Estimator, FitError> {
        match self {
            Candidate::Ridge(ridge) => ridge.fit(data).map(Estimator::Ridge),
            Candidate::Tree(config) => {
                if data.is_empty() {
                    return Err(FitError::Dataset("cannot grow a tree on an empty dataset".into()));
                }
                let gradients: Vec<f64> = data.targets.iter().map(|y| -y).collect();
                let hessians = vec![1.0; data.len()];
                let rows: Vec<usize> = (0..data.len()).collect();
                let tree =
                    CartBuilder::new(data.features.view(), &gradients, &hessians, config.clone())
                        .build(&rows);
                Ok(Estimator::Tree(tree))
            }
            Candidate::Boosting(config) => GbdtTrainer::new(config.clone())
                .train(data, deadline)
                .map(Estimator::Boosted),
        }
    }
}

/// Candidates tried by [`AutoRegressionSearch::default`], cheapest first
pub fn default_candidates() -> Vec<Candidate> {
    vec![
        Candidate::Ridge(RidgeRegression::new(1.0)),
        Candidate::Tree(TreeConfig {
            max_depth: 6,
            min_samples_leaf: 5,
            lambda: 0.0,
        }),
        Candidate::Boosting(GbdtConfig {
            num_trees: 100,
            max_depth: 3,
            min_samples_leaf: 3,
            learning_rate: 0.1,
            ..GbdtConfig::default()
        }),
        Candidate::Ridge(RidgeRegression::new(0.01)),
        Candidate::Ridge(RidgeRegression::new(10.0)),
        Candidate::Tree(TreeConfig {
            max_depth: 10,
            min_samples_leaf: 2,
            lambda: 0.0,
        }),
        Candidate::Boosting(GbdtConfig {
            num_trees: 200,
            max_depth: 5,
            min_samples_leaf: 2,
            learning_rate: 0.05,
            subsample: 0.8,
            ..GbdtConfig::default()
        }),
    ]
}

/// Outcome of one candidate, as reported to a progress observer
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateReport {
    Completed(AlgorithmRun),
    Failed { algorithm: String, message: String },
}

pub type ProgressObserver = Arc<dyn Fn(&CandidateReport) + Send + Sync>;

/// Reference [`ModelTrainer`] over ridge, tree and boosting candidates
#[derive(Clone)]
pub struct AutoRegressionSearch {
    candidates: Vec<Candidate>,
    holdout_fraction: f64,
    seed: i64,
    observer: Option<ProgressObserver>,
}

impl Default for AutoRegressionSearch {
    fn default() -> Self {
        Self::new(default_candidates())
    }
}

impl AutoRegressionSearch {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            holdout_fraction: DEFAULT_HOLDOUT_FRACTION,
            seed: 42,
            observer: None,
        }
    }

    /// Called after every candidate, successful or not
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&CandidateReport) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Fractions outside (0, 1) keep the default
    pub fn with_holdout_fraction(mut self, fraction: f64) -> Self {
        if fraction > 0.0 && fraction < 1.0 {
            self.holdout_fraction = fraction;
        }
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = seed;
        self
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    fn report(&self, report: CandidateReport) {
        match &self.observer {
            Some(observer) => observer(&report),
            None => match &report {
                CandidateReport::Completed(run) => debug!(
                    "{} finished in {:.3}s: R²={:.4} RMSE={:.4}",
                    run.name, run.duration_seconds, run.r_squared, run.root_mean_squared_error
                ),
                CandidateReport::Failed { algorithm, message } => {
                    debug!("{} failed: {}", algorithm, message)
                }
            },
        }
    }
}

/// Higher R² wins; MSE decides when either R² is undefined
fn is_better(run: &AlgorithmRun, best: &AlgorithmRun) -> bool {
    match (run.r_squared.is_finite(), best.r_squared.is_finite()) {
        (true, true) => run.r_squared > best.r_squared,
        (true, false) => true,
        (false, true) => false,
        (false, false) => run.mean_squared_error < best.mean_squared_error,
    }
}

impl ModelTrainer for AutoRegressionSearch {
    type Model = SearchModel;

    #[instrument(skip(self, data), fields(rows = data.len(), budget_secs = budget.as_secs()))]
    fn search(
        &self,
        data: &DataView,
        target_column: &str,
        budget: Duration,
    ) -> Result<SearchOutcome<SearchModel>, EngineError> {
        if data.is_empty() {
            return Err(EngineError::InvalidData("training set is empty".into()));
        }
        if self.candidates.is_empty() {
            return Err(EngineError::Search("no candidate algorithms configured".into()));
        }

        let started = Instant::now();
        // budgets past the clock's range never expire
        let deadline = started.checked_add(budget);

        let featurizer = Featurizer::fit(data, target_column)?;
        let matrix = featurizer.matrix(data)?;

        let (fit_rows, holdout_rows) =
            holdout_indices(matrix.len(), self.holdout_fraction, self.seed);
        let (fit_set, holdout_set) = if holdout_rows.is_empty() {
            (matrix.clone(), matrix.clone())
        } else {
            (matrix.select(&fit_rows), matrix.select(&holdout_rows))
        };

        let mut runs = Vec::with_capacity(self.candidates.len());
        let mut best: Option<(usize, AlgorithmRun)> = None;

        for (idx, candidate) in self.candidates.iter().enumerate() {
            if idx > 0 && deadline.is_some_and(|d| Instant::now() >= d) {
                info!(
                    "Search budget spent after {}/{} candidates",
                    idx,
                    self.candidates.len()
                );
                break;
            }

            let run_started = Instant::now();
            let estimator = match candidate.fit(&fit_set, deadline) {
                Ok(estimator) => estimator,
                Err(e) => {
                    self.report(CandidateReport::Failed {
                        algorithm: candidate.algorithm().to_string(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let predictions: Array1<f64> = holdout_set
                .features
                .rows()
                .into_iter()
                .map(|x| estimator.predict(x))
                .collect();
            let metrics = regression_metrics(predictions.view(), holdout_set.targets.view());
            let run = AlgorithmRun::new(
                candidate.algorithm(),
                run_started.elapsed().as_secs_f64(),
                metrics,
            );

            self.report(CandidateReport::Completed(run.clone()));
            if best.as_ref().map_or(true, |(_, b)| is_better(&run, b)) {
                best = Some((idx, run.clone()));
            }
            runs.push(run);
        }

        let Some((best_idx, best_run)) = best else {
            warn!("All {} candidates failed", self.candidates.len());
            return Err(EngineError::Search("every candidate algorithm failed".into()));
        };

        let estimator = self.candidates[best_idx].fit(&matrix, None)?;
        info!(
            "Selected {} (holdout R²={:.4}) from {} runs in {}ms",
            best_run.name,
            best_run.r_squared,
            runs.len(),
            started.elapsed().as_millis()
        );

        Ok(SearchOutcome {
            best_model: SearchModel::new(best_run.name.clone(), featurizer, estimator),
            best_algorithm: best_run.name,
            candidates: runs,
        })
    }
}

impl fmt::Debug for AutoRegressionSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoRegressionSearch")
            .field("candidates", &self.candidates)
            .field("holdout_fraction", &self.holdout_fraction)
            .field("seed", &self.seed)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tabreg_core::{Column, ColumnKind, ColumnValue, DataRow, RegressionModel, Schema};

    fn linear_view(rows: usize) -> DataView {
        let schema = Arc::new(Schema::new(vec![
            Column {
                name: "x".into(),
                kind: ColumnKind::Float32,
            },
            Column {
                name: "y".into(),
                kind: ColumnKind::Float32,
            },
        ]));
        let rows = (0..rows)
            .map(|i| {
                let x = i as f32;
                DataRow::new(vec![ColumnValue::Float32(x), ColumnValue::Float32(4.0 * x - 3.0)])
            })
            .collect();
        DataView::new(schema, rows)
    }

    #[test]
    fn test_linear_data_selects_ridge() {
        let search = AutoRegressionSearch::new(vec![
            Candidate::Tree(TreeConfig::default()),
            Candidate::Ridge(RidgeRegression::new(0.0)),
        ]);
        let outcome = search
            .search(&linear_view(60), "y", Duration::from_secs(10))
            .unwrap();

        assert_eq!(outcome.best_algorithm, RIDGE_REGRESSION);
        assert_eq!(outcome.candidates.len(), 2);
        let row = DataRow::new(vec![ColumnValue::Float32(10.0), ColumnValue::Float32(0.0)]);
        let score = outcome.best_model.predict(&row).unwrap();
        assert!((score - 37.0).abs() < 1e-3);
    }

    #[test]
    fn test_first_candidate_runs_even_without_budget() {
        let search = AutoRegressionSearch::default();
        let outcome = search
            .search(&linear_view(30), "y", Duration::ZERO)
            .unwrap();
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.best_algorithm, RIDGE_REGRESSION);
    }

    #[test]
    fn test_unbounded_budget_runs_every_candidate() {
        let search = AutoRegressionSearch::new(vec![
            Candidate::Ridge(RidgeRegression::new(0.0)),
            Candidate::Tree(TreeConfig::default()),
            Candidate::Boosting(GbdtConfig {
                num_trees: 5,
                ..GbdtConfig::default()
            }),
        ]);
        let outcome = search
            .search(&linear_view(40), "y", Duration::from_secs(u64::MAX))
            .unwrap();
        assert_eq!(outcome.candidates.len(), 3);
        assert_eq!(outcome.best_algorithm, RIDGE_REGRESSION);
    }

    #[test]
    fn test_observer_sees_every_candidate() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let search = AutoRegressionSearch::new(vec![
            Candidate::Ridge(RidgeRegression::new(-1.0)),
            Candidate::Tree(TreeConfig::default()),
        ])
        .with_observer(move |report| {
            if let Ok(mut reports) = sink.lock() {
                reports.push(report.clone());
            }
        });

        let outcome = search
            .search(&linear_view(40), "y", Duration::from_secs(10))
            .unwrap();

        let reports = seen.lock().unwrap();
        assert_eq!(reports.len(), 2);
        assert!(matches!(reports[0], CandidateReport::Failed { .. }));
        assert!(matches!(reports[1], CandidateReport::Completed(_)));
        assert_eq!(outcome.best_algorithm, DECISION_TREE_REGRESSION);
        assert_eq!(outcome.candidates.len(), 1);
    }

    #[test]
    fn test_all_candidates_failing_is_search_error() {
        let search = AutoRegressionSearch::new(vec![Candidate::Ridge(RidgeRegression::new(-1.0))]);
        let result = search.search(&linear_view(10), "y", Duration::from_secs(1));
        assert!(matches!(result, Err(EngineError::Search(_))));
    }

    #[test]
    fn test_non_float_target_is_invalid_data() {
        let schema = Arc::new(Schema::new(vec![Column {
            name: "label".into(),
            kind: ColumnKind::Text,
        }]));
        let view = DataView::new(
            schema,
            vec![DataRow::new(vec![ColumnValue::Text("a".into())])],
        );
        let result = AutoRegressionSearch::default().search(&view, "label", Duration::from_secs(1));
        assert!(matches!(result, Err(EngineError::InvalidData(_))));
    }

    #[test]
    fn test_nan_r_squared_falls_back_to_mse() {
        let nan_run = |mse| AlgorithmRun {
            name: "a".into(),
            duration_seconds: 0.0,
            mean_absolute_error: 0.0,
            mean_squared_error: mse,
            root_mean_squared_error: 0.0,
            r_squared: f64::NAN,
        };
        assert!(is_better(&nan_run(1.0), &nan_run(2.0)));
        assert!(!is_better(&nan_run(3.0), &nan_run(2.0)));
    }
}
