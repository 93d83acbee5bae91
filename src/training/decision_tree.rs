//! CART decision tree used as the building block for the forest and the
//! boosting ensemble.
//!
//! Supports Gini impurity for classification and variance reduction for
//! regression. Split search walks each feature once over sorted values with
//! running class counts (or running sums), so a node costs one sort per
//! feature rather than a rescan per candidate threshold.

use crate::error::{CliniqError, Result};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Split quality measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    /// Gini impurity (classification).
    Gini,
    /// Variance reduction (regression).
    Mse,
}

/// A fitted tree node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// CART tree for classification or regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    criterion: Criterion,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    /// Number of features examined per split; `None` means all of them.
    max_features: Option<usize>,
    seed: u64,
    n_features: usize,
    classes: Vec<f64>,
    feature_importances: Option<Array1<f64>>,
    is_fitted: bool,
}

impl DecisionTree {
    /// Classification tree with Gini impurity.
    pub fn classifier() -> Self {
        Self::with_criterion(Criterion::Gini)
    }

    /// Regression tree with variance reduction.
    pub fn regressor() -> Self {
        Self::with_criterion(Criterion::Mse)
    }

    fn with_criterion(criterion: Criterion) -> Self {
        Self {
            root: None,
            criterion,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 0,
            n_features: 0,
            classes: Vec::new(),
            feature_importances: None,
            is_fitted: false,
        }
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit the tree on `x` (n_samples x n_features) and targets `y`.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 {
            return Err(CliniqError::InvalidInput(
                "cannot fit a decision tree on empty data".to_string(),
            ));
        }
        if n_samples != y.len() {
            return Err(CliniqError::ShapeError {
                expected: format!("{} labels", n_samples),
                actual: format!("{} labels", y.len()),
            });
        }

        self.n_features = n_features;
        if self.criterion == Criterion::Gini {
            let mut classes: Vec<f64> = y.iter().copied().collect();
            classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            classes.dedup();
            self.classes = classes;
        }

        let mut importances = Array1::zeros(n_features);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_node(x, y, &indices, 0, &mut importances, &mut rng));

        let total: f64 = importances.sum();
        if total > 0.0 {
            importances /= total;
        }
        self.feature_importances = Some(importances);
        self.is_fitted = true;
        Ok(self)
    }

    /// Predict targets for each row of `x`.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(CliniqError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(CliniqError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(Array1::from_iter(
            x.rows().into_iter().map(|row| predict_row(root, &row.to_vec())),
        ))
    }

    /// Normalized split-gain importances. Available after `fit`.
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Class values seen during fit (classification only).
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Depth of the fitted tree; a lone leaf has depth 0.
    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        self.root.as_ref().map_or(0, walk)
    }

    pub fn n_leaves(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => walk(left) + walk(right),
            }
        }
        self.root.as_ref().map_or(0, walk)
    }

    fn build_node(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut Array1<f64>,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n = indices.len();
        let at_max_depth = self.max_depth.is_some_and(|d| depth >= d);
        if n < self.min_samples_split || at_max_depth || is_pure(y, indices) {
            return self.leaf(y, indices);
        }

        let parent_impurity = self.node_impurity(y, indices);
        let pool = self.feature_pool(rng);
        let best = pool
            .par_iter()
            .map(|&feature_idx| {
                self.scan_feature(x, y, indices, feature_idx, parent_impurity)
                    .map(|(threshold, gain)| (feature_idx, threshold, gain))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            // Strictly-greater keeps the lowest feature index on equal gain,
            // so fits are reproducible.
            .fold(None, |acc: Option<(usize, f64, f64)>, cand| match acc {
                Some(best) if cand.2 <= best.2 => Some(best),
                _ => Some(cand),
            });

        let Some((feature_idx, threshold, gain)) = best else {
            return self.leaf(y, indices);
        };

        importances[feature_idx] += n as f64 * gain;

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature_idx]] <= threshold);

        TreeNode::Split {
            feature_idx,
            threshold,
            left: Box::new(self.build_node(x, y, &left_idx, depth + 1, importances, rng)),
            right: Box::new(self.build_node(x, y, &right_idx, depth + 1, importances, rng)),
            n_samples: n,
        }
    }

    /// Features to examine at this split, in ascending order.
    fn feature_pool(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < self.n_features => {
                let mut all: Vec<usize> = (0..self.n_features).collect();
                let (sampled, _) = all.partial_shuffle(rng, k);
                let mut pool = sampled.to_vec();
                pool.sort_unstable();
                pool
            }
            _ => (0..self.n_features).collect(),
        }
    }

    /// Best threshold for one feature, as `(threshold, gain)`.
    fn scan_feature(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        feature_idx: usize,
        parent_impurity: f64,
    ) -> Option<(f64, f64)> {
        let mut pairs: Vec<(f64, f64)> = indices
            .iter()
            .map(|&i| (x[[i, feature_idx]], y[i]))
            .collect();
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        match self.criterion {
            Criterion::Gini => self.scan_gini(&pairs, parent_impurity),
            Criterion::Mse => self.scan_mse(&pairs, parent_impurity),
        }
    }

    fn scan_gini(&self, pairs: &[(f64, f64)], parent_impurity: f64) -> Option<(f64, f64)> {
        let n = pairs.len();
        let mut right: BTreeMap<i64, usize> = BTreeMap::new();
        for &(_, label) in pairs {
            *right.entry(label.round() as i64).or_insert(0) += 1;
        }
        let mut left: BTreeMap<i64, usize> = BTreeMap::new();

        let mut best: Option<(f64, f64)> = None;
        for i in 0..n - 1 {
            let label = pairs[i].1.round() as i64;
            *left.entry(label).or_insert(0) += 1;
            if let Some(count) = right.get_mut(&label) {
                *count -= 1;
                if *count == 0 {
                    right.remove(&label);
                }
            }
            // Cuts are only possible between distinct feature values.
            if pairs[i].0 >= pairs[i + 1].0 {
                continue;
            }
            let left_n = i + 1;
            let right_n = n - left_n;
            if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                continue;
            }
            let weighted = (left_n as f64 * gini(&left, left_n)
                + right_n as f64 * gini(&right, right_n))
                / n as f64;
            let gain = parent_impurity - weighted;
            if gain > best.map_or(0.0, |(_, g)| g) {
                best = Some(((pairs[i].0 + pairs[i + 1].0) / 2.0, gain));
            }
        }
        best
    }

    fn scan_mse(&self, pairs: &[(f64, f64)], parent_impurity: f64) -> Option<(f64, f64)> {
        let n = pairs.len();
        let total_sum: f64 = pairs.iter().map(|&(_, t)| t).sum();
        let total_sq: f64 = pairs.iter().map(|&(_, t)| t * t).sum();
        let mut left_sum = 0.0;
        let mut left_sq = 0.0;

        let mut best: Option<(f64, f64)> = None;
        for i in 0..n - 1 {
            left_sum += pairs[i].1;
            left_sq += pairs[i].1 * pairs[i].1;
            if pairs[i].0 >= pairs[i + 1].0 {
                continue;
            }
            let left_n = i + 1;
            let right_n = n - left_n;
            if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                continue;
            }
            let left_var = variance_from_sums(left_sum, left_sq, left_n);
            let right_var =
                variance_from_sums(total_sum - left_sum, total_sq - left_sq, right_n);
            let weighted =
                (left_n as f64 * left_var + right_n as f64 * right_var) / n as f64;
            let gain = parent_impurity - weighted;
            if gain > best.map_or(0.0, |(_, g)| g) {
                best = Some(((pairs[i].0 + pairs[i + 1].0) / 2.0, gain));
            }
        }
        best
    }

    fn node_impurity(&self, y: &Array1<f64>, indices: &[usize]) -> f64 {
        match self.criterion {
            Criterion::Gini => {
                let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
                for &i in indices {
                    *counts.entry(y[i].round() as i64).or_insert(0) += 1;
                }
                gini(&counts, indices.len())
            }
            Criterion::Mse => {
                let sum: f64 = indices.iter().map(|&i| y[i]).sum();
                let sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
                variance_from_sums(sum, sq, indices.len())
            }
        }
    }

    fn leaf(&self, y: &Array1<f64>, indices: &[usize]) -> TreeNode {
        let value = match self.criterion {
            Criterion::Gini => {
                let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
                for &i in indices {
                    *counts.entry(y[i].round() as i64).or_insert(0) += 1;
                }
                // Majority class; the lowest label wins a tie.
                counts
                    .iter()
                    .fold(None, |acc: Option<(i64, usize)>, (&label, &count)| match acc {
                        Some(best) if count <= best.1 => Some(best),
                        _ => Some((label, count)),
                    })
                    .map_or(0.0, |(label, _)| label as f64)
            }
            Criterion::Mse => {
                let sum: f64 = indices.iter().map(|&i| y[i]).sum();
                sum / indices.len().max(1) as f64
            }
        };
        TreeNode::Leaf {
            value,
            n_samples: indices.len(),
        }
    }
}

fn predict_row(node: &TreeNode, row: &[f64]) -> f64 {
    match node {
        TreeNode::Leaf { value, .. } => *value,
        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            ..
        } => {
            if row[*feature_idx] <= *threshold {
                predict_row(left, row)
            } else {
                predict_row(right, row)
            }
        }
    }
}

fn is_pure(y: &Array1<f64>, indices: &[usize]) -> bool {
    let Some(&first) = indices.first() else {
        return true;
    };
    indices.iter().all(|&i| y[i] == y[first])
}

fn gini(counts: &BTreeMap<i64, usize>, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .values()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

fn variance_from_sums(sum: f64, sum_sq: f64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 0.0],
            [2.0, 0.0],
            [3.0, 0.0],
            [10.0, 0.0],
            [11.0, 0.0],
            [12.0, 0.0],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_classifier_separable() {
        let (x, y) = step_data();
        let mut tree = DecisionTree::classifier();
        tree.fit(&x, &y).unwrap();
        let preds = tree.predict(&x).unwrap();
        assert_eq!(preds, y);
        assert_eq!(tree.classes(), &[0.0, 1.0]);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_regressor_recovers_step_means() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![1.0, 1.0, 1.0, 5.0, 5.0, 5.0];
        let mut tree = DecisionTree::regressor();
        tree.fit(&x, &y).unwrap();
        let preds = tree.predict(&x).unwrap();
        for (pred, truth) in preds.iter().zip(y.iter()) {
            assert!((pred - truth).abs() < 1e-9);
        }
    }

    #[test]
    fn test_max_depth_limits_tree() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let mut tree = DecisionTree::classifier().with_max_depth(Some(2));
        tree.fit(&x, &y).unwrap();
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn test_min_samples_leaf_blocks_small_splits() {
        let (x, y) = step_data();
        let mut tree = DecisionTree::classifier().with_min_samples_leaf(4);
        tree.fit(&x, &y).unwrap();
        // No cut of 6 samples leaves 4 on both sides, so the root stays a leaf.
        assert_eq!(tree.n_leaves(), 1);
    }

    #[test]
    fn test_importances_favor_informative_feature() {
        let (x, y) = step_data();
        let mut tree = DecisionTree::classifier();
        tree.fit(&x, &y).unwrap();
        let imp = tree.feature_importances().unwrap();
        assert!(imp[0] > 0.99);
        assert!(imp[1] < 1e-9);
        assert!((imp.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_feature_subsampling_is_deterministic() {
        let (x, y) = step_data();
        let mut a = DecisionTree::classifier()
            .with_max_features(Some(1))
            .with_seed(7);
        let mut b = DecisionTree::classifier()
            .with_max_features(Some(1))
            .with_seed(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        let probe = array![[2.5, 0.0], [10.5, 0.0]];
        assert_eq!(a.predict(&probe).unwrap(), b.predict(&probe).unwrap());
    }

    #[test]
    fn test_unfitted_predict_fails() {
        let tree = DecisionTree::classifier();
        let x = array![[1.0, 2.0]];
        assert!(matches!(tree.predict(&x), Err(CliniqError::ModelNotFitted)));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let x = array![[1.0], [2.0]];
        let y = array![0.0, 1.0, 0.0];
        let mut tree = DecisionTree::classifier();
        assert!(tree.fit(&x, &y).is_err());
    }
}
