//! Models produced by the reference search

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use tabreg_core::{DataRow, EngineError, RegressionModel};

use crate::cart::RegressionTree;
use crate::featurize::Featurizer;
use crate::gbdt::GbdtModel;
use crate::linear::LinearModel;

/// Fitted estimator behind a [`SearchModel`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Estimator {
    Ridge(LinearModel),
    Tree(RegressionTree),
    Boosted(GbdtModel),
}

impl Estimator {
    pub fn predict(&self, features: ArrayView1<'_, f64>) -> f64 {
        match self {
            Estimator::Ridge(model) => model.predict(features),
            Estimator::Tree(tree) => tree.predict(features),
            Estimator::Boosted(model) => model.predict(features),
        }
    }

    /// Structural checks run on decoded snapshots
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Estimator::Ridge(model) if !model.is_valid() => {
                Err("linear model is malformed".into())
            }
            Estimator::Tree(tree) if !tree.is_well_formed() => Err("tree is malformed".into()),
            Estimator::Boosted(model) => {
                if !model.bias.is_finite() || !model.learning_rate.is_finite() {
                    return Err("boosted model has non-finite parameters".into());
                }
                match model.trees.iter().position(|t| !t.is_well_formed()) {
                    Some(i) => Err(format!("boosted tree {} is malformed", i)),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

/// Featurizer plus estimator, named after the algorithm that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchModel {
    algorithm: String,
    featurizer: Featurizer,
    estimator: Estimator,
}

impl SearchModel {
    pub fn new(algorithm: impl Into<String>, featurizer: Featurizer, estimator: Estimator) -> Self {
        Self {
            algorithm: algorithm.into(),
            featurizer,
            estimator,
        }
    }

    pub fn featurizer(&self) -> &Featurizer {
        &self.featurizer
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    /// Score an already featurized row
    pub fn predict_features(&self, features: ArrayView1<'_, f64>) -> f64 {
        self.estimator.predict(features)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.algorithm.is_empty() {
            return Err("algorithm name is empty".into());
        }
        self.estimator.validate()
    }
}

impl RegressionModel for SearchModel {
    fn predict(&self, row: &DataRow) -> Result<f32, EngineError> {
        let features = self.featurizer.transform(row)?;
        let score = self.estimator.predict(features.view());
        if !score.is_finite() {
            return Err(EngineError::Prediction(format!(
                "{} produced a non-finite score",
                self.algorithm
            )));
        }
        Ok(score as f32)
    }

    fn algorithm_name(&self) -> &str {
        &self.algorithm
    }
}
