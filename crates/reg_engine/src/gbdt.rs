//! Gradient Boosted Decision Tree (GBDT) trainer
//!
//! Squared-loss boosting of exact-greedy CART trees with optional
//! deterministic row subsampling. Training stops early once a deadline
//! passes; the trees built so far form the model.

use std::time::Instant;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cart::{CartBuilder, RegressionTree, TreeConfig};
use crate::deterministic::LcgRng;
use crate::errors::FitError;
use crate::featurize::FeatureMatrix;

/// GBDT training configuration
#[derive(Clone, Debug, PartialEq)]
pub struct GbdtConfig {
    pub num_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub learning_rate: f64,
    /// Share of rows drawn for each tree; 1.0 uses every row
    pub subsample: f64,
    pub lambda: f64,
    pub seed: i64,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            num_trees: 100,
            max_depth: 4,
            min_samples_leaf: 5,
            learning_rate: 0.1,
            subsample: 1.0,
            lambda: 1.0,
            seed: 42,
        }
    }
}

/// Boosted ensemble: `bias + learning_rate * Σ tree(x)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbdtModel {
    pub bias: f64,
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
}

impl GbdtModel {
    pub fn predict(&self, features: ArrayView1<'_, f64>) -> f64 {
        self.bias
            + self.learning_rate
                * self
                    .trees
                    .iter()
                    .map(|tree| tree.predict(features))
                    .sum::<f64>()
    }
}

/// GBDT trainer
pub struct GbdtTrainer {
    config: GbdtConfig,
}

impl GbdtTrainer {
    pub fn new(config: GbdtConfig) -> Self {
        Self { config }
    }

    /// Train on `data`, stopping early at `deadline`
    pub fn train(
        &self,
        data: &FeatureMatrix,
        deadline: Option<Instant>,
    ) -> Result<GbdtModel, FitError> {
        if data.is_empty() {
            return Err(FitError::Dataset("cannot boost on an empty dataset".into()));
        }
        if self.config.learning_rate.is_nan() || self.config.learning_rate <= 0.0 {
            return Err(FitError::Training(format!(
                "learning rate must be positive, got {}",
                self.config.learning_rate
            )));
        }

        let bias = data.targets.sum() / data.len() as f64;
        let mut predictions = vec![bias; data.len()];
        let hessians = vec![1.0; data.len()];
        let tree_config = TreeConfig {
            max_depth: self.config.max_depth,
            min_samples_leaf: self.config.min_samples_leaf,
            lambda: self.config.lambda,
        };
        let mut rng = LcgRng::new(self.config.seed);

        let mut trees = Vec::with_capacity(self.config.num_trees);
        for tree_idx in 0..self.config.num_trees {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                debug!(
                    "Deadline reached after {}/{} trees",
                    tree_idx, self.config.num_trees
                );
                break;
            }

            // Gradient of squared loss: prediction - target
            let gradients: Vec<f64> = predictions
                .iter()
                .zip(data.targets.iter())
                .map(|(p, y)| p - y)
                .collect();

            let rows = self.sample_rows(data.len(), &mut rng);
            let tree =
                CartBuilder::new(data.features.view(), &gradients, &hessians, tree_config.clone())
                    .build(&rows);

            for (prediction, features) in predictions.iter_mut().zip(data.features.rows()) {
                *prediction += self.config.learning_rate * tree.predict(features);
            }
            trees.push(tree);
        }

        Ok(GbdtModel {
            bias,
            learning_rate: self.config.learning_rate,
            trees,
        })
    }

    fn sample_rows(&self, n: usize, rng: &mut LcgRng) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n).collect();
        }
        let rows: Vec<usize> = (0..n)
            .filter(|_| rng.next_unit() < self.config.subsample)
            .collect();
        if rows.is_empty() {
            (0..n).collect()
        } else {
            rows
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{aview1, Array1, Array2};

    fn create_simple_dataset() -> FeatureMatrix {
        FeatureMatrix::new(
            Array2::from_shape_fn((40, 2), |(i, j)| {
                if j == 0 {
                    i as f64
                } else {
                    (i % 3) as f64
                }
            }),
            Array1::from_shape_fn(40, |i| 2.0 * i as f64 + 1.0),
        )
        .unwrap()
    }

    fn mse(model: &GbdtModel, data: &FeatureMatrix) -> f64 {
        data.features
            .rows()
            .into_iter()
            .zip(data.targets.iter())
            .map(|(x, y)| (model.predict(x) - y).powi(2))
            .sum::<f64>()
            / data.len() as f64
    }

    #[test]
    fn test_boosting_reduces_error() {
        let data = create_simple_dataset();
        let config = GbdtConfig {
            num_trees: 30,
            max_depth: 3,
            min_samples_leaf: 2,
            learning_rate: 0.3,
            lambda: 0.0,
            ..GbdtConfig::default()
        };

        let model = GbdtTrainer::new(config).train(&data, None).unwrap();
        assert_eq!(model.trees.len(), 30);

        let baseline = GbdtModel {
            bias: model.bias,
            learning_rate: model.learning_rate,
            trees: Vec::new(),
        };
        assert!(mse(&model, &data) < mse(&baseline, &data) / 10.0);
    }

    #[test]
    fn test_bias_is_target_mean() {
        let data = create_simple_dataset();
        let config = GbdtConfig {
            num_trees: 0,
            ..GbdtConfig::default()
        };
        let model = GbdtTrainer::new(config).train(&data, None).unwrap();
        assert_eq!(model.bias, 40.0);
        assert_eq!(model.predict(aview1(&[0.0, 0.0])), 40.0);
    }

    #[test]
    fn test_determinism() {
        let data = create_simple_dataset();
        let config = GbdtConfig {
            num_trees: 10,
            subsample: 0.7,
            ..GbdtConfig::default()
        };

        let model1 = GbdtTrainer::new(config.clone()).train(&data, None).unwrap();
        let model2 = GbdtTrainer::new(config).train(&data, None).unwrap();
        assert_eq!(model1, model2);
    }

    #[test]
    fn test_expired_deadline_keeps_bias_only() {
        let data = create_simple_dataset();
        let model = GbdtTrainer::new(GbdtConfig::default())
            .train(&data, Some(Instant::now()))
            .unwrap();
        assert!(model.trees.is_empty());
    }

    #[test]
    fn test_empty_dataset_is_rejected() {
        let result = GbdtTrainer::new(GbdtConfig::default()).train(&FeatureMatrix::default(), None);
        assert!(matches!(result, Err(FitError::Dataset(_))));
    }
}
