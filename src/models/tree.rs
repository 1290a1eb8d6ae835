//! CART regression trees and bagged random forests.
//!
//! Trees split on expanded feature columns using the squared-error criterion.
//! Candidate thresholds are midpoints between consecutive distinct values;
//! the split search sorts once per feature and scans prefix sums, so a node
//! costs `O(p · m log m)` for `m` rows.
//!
//! Forests draw a bootstrap sample of rows and a random subset of columns per
//! tree from the caller's RNG, so a forest is reproducible from the run seed.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Hyperparameters of a single regression tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_leaf: 5,
        }
    }
}

/// Largest bootstrap size, as a multiple of `n`.
pub const MAX_SAMPLE_RATE: f64 = 10.0;

/// Hyperparameters of a random forest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Bootstrap sample size as a fraction of `n` (drawn with replacement), at most [`MAX_SAMPLE_RATE`].
    pub sample_rate: f64,
    /// Fraction of expanded columns offered to each tree.
    pub max_features_ratio: f64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 8,
            min_samples_leaf: 5,
            sample_rate: 1.0,
            max_features_ratio: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TreeNode {
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    Leaf {
        value: f64,
    },
}

/// A fitted regression tree over expanded feature columns.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    root: TreeNode,
}

struct BestSplit {
    feature_idx: usize,
    threshold: f64,
    sse: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

impl RegressionTree {
    /// Fit on every row and column of `z`.
    pub fn fit(z: &DMatrix<f64>, y: &DVector<f64>, params: &TreeParams) -> Self {
        let rows: Vec<usize> = (0..z.nrows()).collect();
        let features: Vec<usize> = (0..z.ncols()).collect();
        Self::fit_subset(z, y, &rows, &features, params)
    }

    /// Fit on the given rows (repeats allowed) using only the given columns.
    pub fn fit_subset(
        z: &DMatrix<f64>,
        y: &DVector<f64>,
        rows: &[usize],
        features: &[usize],
        params: &TreeParams,
    ) -> Self {
        let root = build(z, y, rows, features, params, 0);
        Self { root }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        fn count(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => count(left) + count(right),
            }
        }
        count(&self.root)
    }
}

fn mean_of(y: &DVector<f64>, rows: &[usize]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|&i| y[i]).sum::<f64>() / rows.len() as f64
}

fn build(
    z: &DMatrix<f64>,
    y: &DVector<f64>,
    rows: &[usize],
    features: &[usize],
    params: &TreeParams,
    depth: usize,
) -> TreeNode {
    let leaf = || TreeNode::Leaf {
        value: mean_of(y, rows),
    };
    let min_leaf = params.min_samples_leaf.max(1);
    if depth >= params.max_depth || rows.len() < 2 * min_leaf || features.is_empty() {
        return leaf();
    }

    let mean = mean_of(y, rows);
    let parent_sse: f64 = rows.iter().map(|&i| (y[i] - mean) * (y[i] - mean)).sum();
    if parent_sse <= f64::EPSILON * (1.0 + mean.abs()) {
        return leaf();
    }

    let Some(best) = best_split(z, y, rows, features, min_leaf) else {
        return leaf();
    };
    if best.sse >= parent_sse {
        return leaf();
    }

    let left = build(z, y, &best.left, features, params, depth + 1);
    let right = build(z, y, &best.right, features, params, depth + 1);
    TreeNode::Split {
        feature_idx: best.feature_idx,
        threshold: best.threshold,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn best_split(
    z: &DMatrix<f64>,
    y: &DVector<f64>,
    rows: &[usize],
    features: &[usize],
    min_leaf: usize,
) -> Option<BestSplit> {
    let m = rows.len();
    let total_sum: f64 = rows.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = rows.iter().map(|&i| y[i] * y[i]).sum();

    let mut best: Option<(usize, f64, f64)> = None;
    let mut sorted = rows.to_vec();

    for &f in features {
        sorted.sort_by(|&a, &b| {
            z[(a, f)]
                .partial_cmp(&z[(b, f)])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for pos in 0..m - 1 {
            let yi = y[sorted[pos]];
            left_sum += yi;
            left_sq += yi * yi;

            let n_left = pos + 1;
            let n_right = m - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            let here = z[(sorted[pos], f)];
            let next = z[(sorted[pos + 1], f)];
            if here >= next {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / n_left as f64)
                + (right_sq - right_sum * right_sum / n_right as f64);
            if best.is_none_or(|(_, _, b)| sse < b) {
                best = Some((f, 0.5 * (here + next), sse));
            }
        }
    }

    let (feature_idx, threshold, sse) = best?;
    let (left, right): (Vec<usize>, Vec<usize>) =
        rows.iter().copied().partition(|&i| z[(i, feature_idx)] <= threshold);
    Some(BestSplit {
        feature_idx,
        threshold,
        sse,
        left,
        right,
    })
}

/// An average of bagged regression trees.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit<R: Rng + ?Sized>(
        z: &DMatrix<f64>,
        y: &DVector<f64>,
        params: &ForestParams,
        rng: &mut R,
    ) -> Self {
        let n = z.nrows();
        let p = z.ncols();
        let n_draw = ((n as f64 * params.sample_rate).ceil() as usize).max(1);
        let n_features = ((p as f64 * params.max_features_ratio).ceil() as usize)
            .max(1)
            .min(p);
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_leaf: params.min_samples_leaf,
        };

        let mut trees = Vec::with_capacity(params.n_trees);
        let mut columns: Vec<usize> = (0..p).collect();
        for _ in 0..params.n_trees {
            let rows: Vec<usize> = (0..n_draw).map(|_| rng.gen_range(0..n)).collect();
            columns.shuffle(rng);
            let mut selected = columns[..n_features].to_vec();
            selected.sort_unstable();
            trees.push(RegressionTree::fit_subset(z, y, &rows, &selected, &tree_params));
        }
        Self { trees }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return f64::NAN;
        }
        self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / self.trees.len() as f64
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
