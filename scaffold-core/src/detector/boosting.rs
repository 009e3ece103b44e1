//! Gradient-boosted regression trees with a binary logistic objective.
//!
//! # Algorithm
//!
//! 1. Start every sample at margin 0 (probability 0.5)
//! 2. For each boosting round:
//!    - gradient `g = p - y`, hessian `h = p(1 - p)`
//!    - grow a depth-limited tree level by level, choosing at each node the
//!      exact split maximizing `½[G_L²/(H_L+λ) + G_R²/(H_R+λ) − G²/(H+λ)]`
//!    - leaf weight `−η·G/(H+λ)` is added to the margin of every sample in it
//! 3. `P(class 1) = σ(margin)`
//!
//! Feature columns are sorted once per fit; each tree level is one linear scan
//! per feature over that order, with per-node running sums.

use crate::config::DetectorConfig;
use crate::error::{Result, ScaffoldError};
use crate::models::{Classifier, Estimator};
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

const MIN_SPLIT_GAIN: f64 = 1e-12;
const MIN_HESSIAN: f64 = 1e-16;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        weight: f64,
    },
}

/// A single regression tree; samples with `x[feature] < threshold` go left.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { weight } => return *weight,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Node still eligible for splitting at the current level.
#[derive(Debug, Clone, Copy, Default)]
struct OpenNode {
    node: usize,
    grad: f64,
    hess: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Scan {
    grad_left: f64,
    hess_left: f64,
    last: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    gain: f64,
    feature: usize,
    threshold: f64,
}

/// Boosted-tree binary classifier used as the default perturbation detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    n_estimators: usize,
    max_depth: usize,
    learning_rate: f64,
    lambda: f64,
    min_child_weight: f64,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl Default for GradientBoostedTrees {
    fn default() -> Self {
        Self::new()
    }
}

impl GradientBoostedTrees {
    /// 100 trees, depth 3, learning rate 0.3, λ = 1, minimum child weight 1.
    pub fn new() -> Self {
        Self::from_config(&DetectorConfig::default())
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            n_estimators: config.n_estimators,
            max_depth: config.max_depth,
            learning_rate: config.learning_rate,
            lambda: config.lambda,
            min_child_weight: config.min_child_weight,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Number of fitted trees (0 before `fit`).
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Deepest fitted tree.
    pub fn max_fitted_depth(&self) -> usize {
        self.trees.iter().map(RegressionTree::depth).max().unwrap_or(0)
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    fn margin(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.trees.iter().map(|t| t.predict_row(row)).sum()
    }

    fn grow_tree(
        &self,
        x: ArrayView2<'_, f64>,
        sorted: &[Vec<usize>],
        grad: &[f64],
        hess: &[f64],
    ) -> RegressionTree {
        let n = x.nrows();
        let mut nodes = vec![TreeNode::Leaf { weight: 0.0 }];
        let mut open = vec![OpenNode {
            node: 0,
            grad: grad.iter().sum(),
            hess: hess.iter().sum(),
        }];
        // Slot in `open` for each sample, or None once its leaf is settled.
        let mut position: Vec<Option<usize>> = vec![Some(0); n];

        for depth in 0..=self.max_depth {
            let mut best: Vec<Option<SplitCandidate>> = vec![None; open.len()];

            if depth < self.max_depth {
                for (feature, order) in sorted.iter().enumerate() {
                    let mut scans = vec![Scan::default(); open.len()];
                    for &i in order {
                        let Some(slot) = position[i] else { continue };
                        let value = x[[i, feature]];
                        let scan = &mut scans[slot];
                        if let Some(last) = scan.last {
                            if value > last {
                                let total = open[slot];
                                let grad_right = total.grad - scan.grad_left;
                                let hess_right = total.hess - scan.hess_left;
                                if scan.hess_left >= self.min_child_weight
                                    && hess_right >= self.min_child_weight
                                {
                                    let gain = 0.5
                                        * (self.score(scan.grad_left, scan.hess_left)
                                            + self.score(grad_right, hess_right)
                                            - self.score(total.grad, total.hess));
                                    if best[slot].is_none_or(|b| gain > b.gain) {
                                        let mut threshold = 0.5 * (last + value);
                                        if threshold <= last {
                                            threshold = value;
                                        }
                                        best[slot] = Some(SplitCandidate {
                                            gain,
                                            feature,
                                            threshold,
                                        });
                                    }
                                }
                            }
                        }
                        scan.grad_left += grad[i];
                        scan.hess_left += hess[i];
                        scan.last = Some(value);
                    }
                }
            }

            let mut next_open = Vec::new();
            let mut routes: Vec<Option<(usize, usize, SplitCandidate)>> = vec![None; open.len()];
            for (slot, open_node) in open.iter().enumerate() {
                match best[slot] {
                    Some(split) if split.gain > MIN_SPLIT_GAIN => {
                        let left = nodes.len();
                        let right = left + 1;
                        nodes.push(TreeNode::Leaf { weight: 0.0 });
                        nodes.push(TreeNode::Leaf { weight: 0.0 });
                        nodes[open_node.node] = TreeNode::Split {
                            feature: split.feature,
                            threshold: split.threshold,
                            left,
                            right,
                        };
                        let left_slot = next_open.len();
                        next_open.push(OpenNode {
                            node: left,
                            ..OpenNode::default()
                        });
                        next_open.push(OpenNode {
                            node: right,
                            ..OpenNode::default()
                        });
                        routes[slot] = Some((left_slot, left_slot + 1, split));
                    }
                    _ => {
                        nodes[open_node.node] = TreeNode::Leaf {
                            weight: self.leaf_weight(open_node.grad, open_node.hess),
                        };
                    }
                }
            }

            for i in 0..n {
                let Some(slot) = position[i] else { continue };
                position[i] = routes[slot].map(|(left, right, split)| {
                    let child = if x[[i, split.feature]] < split.threshold {
                        left
                    } else {
                        right
                    };
                    next_open[child].grad += grad[i];
                    next_open[child].hess += hess[i];
                    child
                });
            }

            open = next_open;
            if open.is_empty() {
                break;
            }
        }

        RegressionTree { nodes }
    }

    fn score(&self, grad: f64, hess: f64) -> f64 {
        grad * grad / (hess + self.lambda)
    }

    fn leaf_weight(&self, grad: f64, hess: f64) -> f64 {
        -self.learning_rate * grad / (hess + self.lambda)
    }
}

impl Classifier for GradientBoostedTrees {
    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(ScaffoldError::not_trained(
                "boosted-tree detector has no fitted trees",
            ));
        }
        if x.ncols() != self.n_features {
            return Err(ScaffoldError::model(format!(
                "detector was fit on {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        let mut probs = Array2::zeros((x.nrows(), 2));
        for (i, row) in x.rows().into_iter().enumerate() {
            let p = Self::sigmoid(self.margin(row));
            probs[[i, 0]] = 1.0 - p;
            probs[[i, 1]] = p;
        }
        Ok(probs)
    }
}

impl Estimator for GradientBoostedTrees {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize]) -> Result<()> {
        let (n, n_features) = x.dim();
        if n != y.len() {
            return Err(ScaffoldError::training(format!(
                "x has {n} rows but y has {} labels",
                y.len()
            )));
        }
        if n == 0 || n_features == 0 {
            return Err(ScaffoldError::training("cannot fit on an empty matrix"));
        }
        if let Some(label) = y.iter().find(|&&l| l > 1) {
            return Err(ScaffoldError::training(format!(
                "binary objective requires labels 0/1, found {label}"
            )));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(ScaffoldError::training("features must be finite"));
        }

        let sorted: Vec<Vec<usize>> = (0..n_features)
            .map(|f| {
                let column = x.column(f);
                let mut order: Vec<usize> = (0..n).collect();
                order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));
                order
            })
            .collect();

        let targets: Vec<f64> = y.iter().map(|&l| l as f64).collect();
        let mut margins = vec![0.0; n];
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];
        let mut trees = Vec::with_capacity(self.n_estimators);

        for round in 0..self.n_estimators {
            for i in 0..n {
                let p = Self::sigmoid(margins[i]);
                grad[i] = p - targets[i];
                hess[i] = (p * (1.0 - p)).max(MIN_HESSIAN);
            }
            let tree = self.grow_tree(x, &sorted, &grad, &hess);
            for (i, row) in x.rows().into_iter().enumerate() {
                margins[i] += tree.predict_row(row);
            }
            if round == 0 || round + 1 == self.n_estimators {
                let log_loss = margins
                    .iter()
                    .zip(&targets)
                    .map(|(&m, &t)| {
                        let p = Self::sigmoid(m).clamp(1e-15, 1.0 - 1e-15);
                        -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
                    })
                    .sum::<f64>()
                    / n as f64;
                tracing::debug!(round, log_loss, nodes = tree.nodes.len(), "boosting round");
            }
            trees.push(tree);
        }

        self.n_features = n_features;
        self.trees = trees;
        Ok(())
    }

    fn name(&self) -> &str {
        "gradient_boosted_trees"
    }
}
