//! Random forest classifier: bootstrapped CART trees with per-split feature
//! subsampling, fitted in parallel.

use super::decision_tree::DecisionTree;
use crate::error::{CliniqError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How many features each split may examine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of the feature count, rounded up.
    Sqrt,
    /// Fixed number, capped at the feature count.
    Fixed(usize),
    /// Every feature.
    All,
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }
}

/// Bagged ensemble of classification trees with majority voting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    trees: Vec<DecisionTree>,
    n_estimators: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    max_features: MaxFeatures,
    seed: u64,
    classes: Vec<f64>,
    feature_importances: Option<Array1<f64>>,
    is_fitted: bool,
}

impl RandomForestClassifier {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            seed: 0,
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
        self.min_samples_split = min_samples_split;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit the forest. Trees train in parallel, each on its own bootstrap
    /// sample drawn from a seed offset by the tree index.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(CliniqError::ShapeError {
                expected: format!("{} labels", n_samples),
                actual: format!("{} labels", y.len()),
            });
        }
        if self.n_estimators == 0 {
            return Err(CliniqError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "a forest needs at least one tree".to_string(),
            });
        }

        let mut classes: Vec<f64> = y.iter().copied().collect();
        classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        classes.dedup();
        self.classes = classes;

        let n_features = x.ncols();
        let max_features = self.max_features.resolve(n_features);
        let base_seed = self.seed;

        let trees: Result<Vec<DecisionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let sample: Vec<usize> =
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();

                let x_boot = x.select(Axis(0), &sample);
                let y_boot = Array1::from_iter(sample.iter().map(|&i| y[i]));

                let mut tree = DecisionTree::classifier()
                    .with_max_depth(self.max_depth)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(Some(max_features))
                    .with_seed(seed);
                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect();
        self.trees = trees?;

        self.feature_importances = Some(self.average_importances(n_features));
        self.is_fitted = true;
        Ok(self)
    }

    /// Mean of per-tree split-gain importances, re-normalized to sum to one.
    fn average_importances(&self, n_features: usize) -> Array1<f64> {
        let mut total: Array1<f64> = Array1::zeros(n_features);
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                total += imp;
            }
        }
        let sum = total.sum();
        if sum > 0.0 {
            total /= sum;
        }
        total
    }

    /// Majority-vote predictions. Ties go to the lowest class label.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let votes = self.collect_votes(x)?;
        Ok(Array1::from_iter(votes.into_iter().map(|counts| {
            counts
                .iter()
                .fold(None, |acc: Option<(i64, usize)>, (&label, &count)| match acc {
                    Some(best) if count <= best.1 => Some(best),
                    _ => Some((label, count)),
                })
                .map_or(0.0, |(label, _)| label as f64)
        })))
    }

    /// Vote shares per class, one row per sample in class order.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let votes = self.collect_votes(x)?;
        let n_trees = self.trees.len() as f64;
        let mut probs = Array2::zeros((x.nrows(), self.classes.len()));
        for (i, counts) in votes.iter().enumerate() {
            for (j, class) in self.classes.iter().enumerate() {
                let count = counts.get(&(class.round() as i64)).copied().unwrap_or(0);
                probs[[i, j]] = count as f64 / n_trees;
            }
        }
        Ok(probs)
    }

    fn collect_votes(&self, x: &Array2<f64>) -> Result<Vec<BTreeMap<i64, usize>>> {
        if self.trees.is_empty() {
            return Err(CliniqError::ModelNotFitted);
        }
        let per_tree: Result<Vec<Array1<f64>>> =
            self.trees.par_iter().map(|tree| tree.predict(x)).collect();
        let per_tree = per_tree?;

        let mut votes = vec![BTreeMap::new(); x.nrows()];
        for preds in &per_tree {
            for (i, &pred) in preds.iter().enumerate() {
                *votes[i].entry(pred.round() as i64).or_insert(0) += 1;
            }
        }
        Ok(votes)
    }

    /// Class values seen during fit, ascending.
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
