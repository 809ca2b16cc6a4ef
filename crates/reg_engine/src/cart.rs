//! CART (Classification and Regression Tree) builder
//!
//! Deterministic exact-greedy tree construction on gradient/hessian pairs.
//! With gradient `-y` and hessian `1` the tree is a plain least-squares
//! regression tree; boosting feeds it squared-loss residuals instead.

use ndarray::{s, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::deterministic::SplitTieBreaker;

/// Training parameters for a single tree
#[derive(Clone, Debug, PartialEq)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// L2 penalty added to every hessian sum
    pub lambda: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_leaf: 5,
            lambda: 0.0,
        }
    }
}

/// Tree node; children are indices into the owning tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Binary regression tree; `features[feature] <= threshold` goes left
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn leaf(value: f64) -> Self {
        Self {
            nodes: vec![Node::Leaf { value }],
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Evaluate the tree; malformed links or short vectors score 0
    pub fn predict(&self, features: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0usize;
        // a well-formed tree reaches a leaf in at most `nodes.len()` steps
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let Some(value) = features.get(*feature) else {
                        return 0.0;
                    };
                    idx = if *value <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
        0.0
    }

    /// Child links point forward and stay in bounds
    pub fn is_well_formed(&self) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(i, node)| match node {
                Node::Leaf { value } => value.is_finite(),
                Node::Split {
                    left,
                    right,
                    threshold,
                    ..
                } => {
                    threshold.is_finite()
                        && *left > i
                        && *right > i
                        && *left < self.nodes.len()
                        && *right < self.nodes.len()
                }
            })
    }
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn new(feature_idx: usize, threshold: f64, gain: f64, node_id: usize) -> Self {
        Self {
            feature_idx,
            threshold,
            gain,
            tie_breaker: SplitTieBreaker::new(feature_idx, threshold, node_id),
        }
    }

    fn beats(&self, other: &SplitCandidate) -> bool {
        self.gain > other.gain || (self.gain == other.gain && self.tie_breaker < other.tie_breaker)
    }
}

/// Build a regression tree using the exact-greedy CART algorithm
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: ArrayView2<'a, f64>,
    gradients: &'a [f64],
    hessians: &'a [f64],
}

impl<'a> CartBuilder<'a> {
    /// Rows beyond the shortest of `features`, `gradients` and `hessians`
    /// are ignored
    pub fn new(
        features: ArrayView2<'a, f64>,
        gradients: &'a [f64],
        hessians: &'a [f64],
        config: TreeConfig,
    ) -> Self {
        let rows = features.nrows().min(gradients.len()).min(hessians.len());
        Self {
            config,
            features: features.slice_move(s![..rows, ..]),
            gradients: &gradients[..rows],
            hessians: &hessians[..rows],
        }
    }

    /// Build the tree over the given rows
    pub fn build(&self, rows: &[usize]) -> RegressionTree {
        let rows: Vec<usize> = rows
            .iter()
            .copied()
            .filter(|&i| i < self.gradients.len())
            .collect();
        let mut nodes = Vec::new();
        self.build_node(&rows, 0, &mut nodes, 0);
        RegressionTree { nodes }
    }

    fn build_node(
        &self,
        indices: &[usize],
        depth: usize,
        nodes: &mut Vec<Node>,
        node_id: usize,
    ) -> usize {
        let current_idx = nodes.len();
        let leaf = Node::Leaf {
            value: self.calculate_leaf_value(indices),
        };

        if depth >= self.config.max_depth || indices.len() < 2 * self.config.min_samples_leaf.max(1)
        {
            nodes.push(leaf);
            return current_idx;
        }

        let Some(split) = self.find_best_split(indices, node_id) else {
            nodes.push(leaf);
            return current_idx;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.features[[i, split.feature_idx]] <= split.threshold);

        // Reserve space for current node
        nodes.push(Node::Split {
            feature: split.feature_idx,
            threshold: split.threshold,
            left: 0,
            right: 0,
        });

        let left_idx = self.build_node(&left_indices, depth + 1, nodes, node_id * 2 + 1);
        let right_idx = self.build_node(&right_indices, depth + 1, nodes, node_id * 2 + 2);

        if let Node::Split { left, right, .. } = &mut nodes[current_idx] {
            *left = left_idx;
            *right = right_idx;
        }

        current_idx
    }

    /// Sweep every feature in sorted order, scoring each boundary between
    /// distinct values
    fn find_best_split(&self, indices: &[usize], node_id: usize) -> Option<SplitCandidate> {
        let min_leaf = self.config.min_samples_leaf.max(1);
        let (g_total, h_total) = self.sum_gradients_hessians(indices);
        let parent_score = self.score(g_total, h_total);

        let mut best_split: Option<SplitCandidate> = None;
        let mut sorted = indices.to_vec();

        for (feature_idx, column) in self.features.columns().into_iter().enumerate() {
            sorted.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

            let mut g_left = 0.0;
            let mut h_left = 0.0;
            for k in 0..sorted.len() - 1 {
                let i = sorted[k];
                g_left += self.gradients[i];
                h_left += self.hessians[i];

                let left_count = k + 1;
                if left_count < min_leaf || sorted.len() - left_count < min_leaf {
                    continue;
                }

                let value = column[i];
                let next = column[sorted[k + 1]];
                if value >= next {
                    continue;
                }

                let gain = self.score(g_left, h_left)
                    + self.score(g_total - g_left, h_total - h_left)
                    - parent_score;
                if !gain.is_finite() || gain <= 1e-12 {
                    continue;
                }

                let mid = value + (next - value) / 2.0;
                let threshold = if mid < next { mid } else { value };
                let candidate = SplitCandidate::new(feature_idx, threshold, gain, node_id);

                if best_split.as_ref().map_or(true, |best| candidate.beats(best)) {
                    best_split = Some(candidate);
                }
            }
        }

        best_split
    }

    /// G²/(H+λ)
    fn score(&self, g: f64, h: f64) -> f64 {
        let denominator = h + self.config.lambda;
        if denominator > 0.0 {
            g * g / denominator
        } else {
            0.0
        }
    }

    fn sum_gradients_hessians(&self, indices: &[usize]) -> (f64, f64) {
        indices.iter().fold((0.0, 0.0), |(g, h), &i| {
            (g + self.gradients[i], h + self.hessians[i])
        })
    }

    /// Optimal leaf value: -G/(H+λ)
    fn calculate_leaf_value(&self, indices: &[usize]) -> f64 {
        let (sum_g, sum_h) = self.sum_gradients_hessians(indices);
        let denominator = sum_h + self.config.lambda;
        if denominator <= 0.0 {
            return 0.0;
        }
        -sum_g / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, aview1, Array2};

    fn step_data() -> (Array2<f64>, Vec<f64>, Vec<f64>) {
        let features = Array2::from_shape_fn((8, 2), |(i, j)| if j == 0 { i as f64 } else { 0.0 });
        // targets 1 for x < 4, 5 otherwise; gradient = -y
        let gradients = (0..8).map(|i| if i < 4 { -1.0 } else { -5.0 }).collect();
        let hessians = vec![1.0; 8];
        (features, gradients, hessians)
    }

    #[test]
    fn test_step_function_is_learned() {
        let (features, gradients, hessians) = step_data();
        let config = TreeConfig {
            max_depth: 2,
            min_samples_leaf: 1,
            lambda: 0.0,
        };
        let rows: Vec<usize> = (0..8).collect();
        let tree = CartBuilder::new(features.view(), &gradients, &hessians, config).build(&rows);

        assert!(tree.is_well_formed());
        assert!(matches!(
            tree.nodes()[0],
            Node::Split { feature: 0, threshold, .. } if threshold == 3.5
        ));
        assert_eq!(tree.predict(aview1(&[1.0, 0.0])), 1.0);
        assert_eq!(tree.predict(aview1(&[6.0, 0.0])), 5.0);
    }

    #[test]
    fn test_leaf_only_tree() {
        let features = array![[1.0]];
        let gradients = vec![-3.0];
        let hessians = vec![1.0];

        let tree = CartBuilder::new(features.view(), &gradients, &hessians, TreeConfig::default())
            .build(&[0]);

        assert_eq!(tree.nodes().len(), 1);
        assert_eq!(tree.predict(aview1(&[100.0])), 3.0);
    }

    #[test]
    fn test_min_samples_leaf_is_respected() {
        let (features, gradients, hessians) = step_data();
        let config = TreeConfig {
            max_depth: 10,
            min_samples_leaf: 3,
            lambda: 0.0,
        };
        let rows: Vec<usize> = (0..8).collect();
        let tree = CartBuilder::new(features.view(), &gradients, &hessians, config).build(&rows);
        // 8 rows with leaves of at least 3 allow at most 2 leaves
        assert!(tree.leaf_count() <= 2);
    }

    #[test]
    fn test_malformed_tree_scores_zero() {
        let tree = RegressionTree {
            nodes: vec![Node::Split {
                feature: 0,
                threshold: 0.0,
                left: 0,
                right: 0,
            }],
        };
        assert!(!tree.is_well_formed());
        assert_eq!(tree.predict(aview1(&[1.0])), 0.0);
    }
}
