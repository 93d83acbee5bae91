//! Gradient boosting over shallow regression trees.
//!
//! Each class gets its own one-vs-rest binary booster fitted on log-loss
//! residuals; multiclass probabilities are the normalized per-class scores.

use super::decision_tree::DecisionTree;
use crate::error::{CliniqError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

/// Binary booster: an initial log-odds guess plus a sum of residual trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinaryBooster {
    trees: Vec<DecisionTree>,
    initial_log_odds: f64,
    learning_rate: f64,
}

impl BinaryBooster {
    /// Scores for the positive class after applying every round.
    fn decision(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for tree in &self.trees {
            let step = tree.predict(x)?;
            log_odds.zip_mut_with(&step, |lo, &s| *lo += self.learning_rate * s);
        }
        Ok(log_odds.mapv(sigmoid))
    }
}

/// One-vs-rest gradient boosting classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    boosters: Vec<BinaryBooster>,
    n_estimators: usize,
    learning_rate: f64,
    max_depth: Option<usize>,
    min_samples_split: usize,
    /// Fraction of rows each round trains on.
    subsample: f64,
    seed: u64,
    classes: Vec<f64>,
    feature_importances: Option<Array1<f64>>,
    is_fitted: bool,
}

impl GradientBoostingClassifier {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            boosters: Vec::new(),
            n_estimators,
            learning_rate: 0.1,
            max_depth: Some(3),
            min_samples_split: 2,
            subsample: 1.0,
            seed: 0,
            classes: Vec::new(),
            feature_importances: None,
            is_fitted: false,
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    pub fn with_subsample(mut self, subsample: f64) -> Self {
        self.subsample = subsample;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit one booster per class, in parallel. Class `k` trains against the
    /// binary target "is class k", seeded from the base seed plus `k`.
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
                reason: "boosting needs at least one round".to_string(),
            });
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(CliniqError::InvalidParameter {
                name: "subsample".to_string(),
                value: self.subsample.to_string(),
                reason: "row fraction must be in (0, 1]".to_string(),
            });
        }

        let mut classes: Vec<f64> = y.iter().copied().collect();
        classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        classes.dedup();
        if classes.len() < 2 {
            return Err(CliniqError::TrainingError(
                "gradient boosting needs at least two classes".to_string(),
            ));
        }

        let boosters: Result<Vec<BinaryBooster>> = classes
            .par_iter()
            .enumerate()
            .map(|(class_idx, &class)| {
                let target = y.mapv(|label| if label == class { 1.0 } else { 0.0 });
                self.fit_binary(x, &target, self.seed.wrapping_add(class_idx as u64))
            })
            .collect();
        let boosters = boosters?;

        self.feature_importances = Some(average_importances(&boosters, x.ncols()));
        self.boosters = boosters;
        self.classes = classes;
        self.is_fitted = true;
        Ok(self)
    }

    fn fit_binary(&self, x: &Array2<f64>, y: &Array1<f64>, seed: u64) -> Result<BinaryBooster> {
        let n_samples = x.nrows();
        let p = y.mean().unwrap_or(0.5).clamp(1e-10, 1.0 - 1e-10);
        let initial_log_odds = (p / (1.0 - p)).ln();

        let mut log_odds = Array1::from_elem(n_samples, initial_log_odds);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(self.n_estimators);

        for _round in 0..self.n_estimators {
            let residuals: Array1<f64> = y
                .iter()
                .zip(log_odds.iter())
                .map(|(&yi, &lo)| yi - sigmoid(lo))
                .collect();

            let rows = self.subsample_rows(n_samples, &mut rng);
            let x_fit = x.select(Axis(0), &rows);
            let r_fit = Array1::from_iter(rows.iter().map(|&i| residuals[i]));

            let mut tree = DecisionTree::regressor()
                .with_max_depth(self.max_depth)
                .with_min_samples_split(self.min_samples_split);
            tree.fit(&x_fit, &r_fit)?;

            // The new tree moves every row, sampled or not.
            let step = tree.predict(x)?;
            log_odds.zip_mut_with(&step, |lo, &s| *lo += self.learning_rate * s);
            trees.push(tree);
        }

        Ok(BinaryBooster {
            trees,
            initial_log_odds,
            learning_rate: self.learning_rate,
        })
    }

    fn subsample_rows(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.subsample >= 1.0 {
            return (0..n).collect();
        }
        let sample_size = ((n as f64) * self.subsample).ceil() as usize;
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(sample_size.max(1));
        indices.sort_unstable();
        indices
    }

    /// Per-class scores normalized to sum to one per row, in class order.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.boosters.is_empty() {
            return Err(CliniqError::ModelNotFitted);
        }
        let per_class: Result<Vec<Array1<f64>>> = self
            .boosters
            .par_iter()
            .map(|booster| booster.decision(x))
            .collect();
        let per_class = per_class?;

        let mut probs = Array2::zeros((x.nrows(), self.classes.len()));
        for (j, scores) in per_class.iter().enumerate() {
            for (i, &s) in scores.iter().enumerate() {
                probs[[i, j]] = s;
            }
        }
        for mut row in probs.rows_mut() {
            let sum = row.sum();
            if sum > 0.0 {
                row.mapv_inplace(|v| v / sum);
            }
        }
        Ok(probs)
    }

    /// Predicted class labels via the highest per-class score.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probs = self.predict_proba(x)?;
        Ok(Array1::from_iter(probs.rows().into_iter().map(|row| {
            let best = row
                .iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |acc, (j, &p)| {
                    if p > acc.1 {
                        (j, p)
                    } else {
                        acc
                    }
                });
            self.classes[best.0]
        })))
    }

    /// Class values seen during fit, ascending.
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

/// Mean split-gain importances over every round of every booster,
/// re-normalized to sum to one.
fn average_importances(boosters: &[BinaryBooster], n_features: usize) -> Array1<f64> {
    let mut total: Array1<f64> = Array1::zeros(n_features);
    for booster in boosters {
        for tree in &booster.trees {
            if let Some(imp) = tree.feature_importances() {
                total += imp;
            }
        }
    }
    let sum = total.sum();
    if sum > 0.0 {
        total /= sum;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn three_clusters() -> (Array2<f64>, Array1<f64>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..8 {
            let jitter = i as f64 * 0.1;
            rows.push([0.0 + jitter, 0.0]);
            labels.push(0.0);
            rows.push([5.0 + jitter, 5.0]);
            labels.push(1.0);
            rows.push([10.0 + jitter, 0.0]);
            labels.push(2.0);
        }
        let x = Array2::from_shape_fn((rows.len(), 2), |(i, j)| rows[i][j]);
        (x, Array1::from_vec(labels))
    }

    #[test]
    fn test_boosting_fits_three_clusters() {
        let (x, y) = three_clusters();
        let mut model = GradientBoostingClassifier::new(30).with_seed(42);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
        assert_eq!(model.classes(), &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_probabilities_normalized() {
        let (x, y) = three_clusters();
        let mut model = GradientBoostingClassifier::new(10).with_seed(1);
        model.fit(&x, &y).unwrap();
        let probs = model.predict_proba(&x).unwrap();
        assert_eq!(probs.dim(), (24, 3));
        for row in probs.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_subsampling_is_deterministic() {
        let (x, y) = three_clusters();
        let mut a = GradientBoostingClassifier::new(15)
            .with_subsample(0.8)
            .with_seed(9);
        let mut b = GradientBoostingClassifier::new(15)
            .with_subsample(0.8)
            .with_seed(9);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_importances_normalized() {
        let (x, y) = three_clusters();
        let mut model = GradientBoostingClassifier::new(10).with_seed(3);
        model.fit(&x, &y).unwrap();
        let imp = model.feature_importances().unwrap();
        assert!((imp.sum() - 1.0).abs() < 1e-9);
        // Cluster membership is written in the first feature.
        assert!(imp[0] > imp[1]);
    }

    #[test]
    fn test_invalid_subsample_rejected() {
        let (x, y) = three_clusters();
        let mut model = GradientBoostingClassifier::new(5).with_subsample(0.0);
        assert!(model.fit(&x, &y).is_err());
    }

    #[test]
    fn test_single_class_rejected() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![0.0, 0.0, 0.0];
        let mut model = GradientBoostingClassifier::new(5);
        assert!(model.fit(&x, &y).is_err());
    }
}
