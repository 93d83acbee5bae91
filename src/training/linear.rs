//! Multinomial logistic regression trained by gradient descent.

use crate::error::{CliniqError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const SGD_BATCH_SIZE: usize = 32;

/// Optimizer used to fit the weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Solver {
    /// Full-batch gradient descent.
    Gd,
    /// Mini-batch stochastic gradient descent.
    Sgd,
}

impl Solver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Solver::Gd => "gd",
            Solver::Sgd => "sgd",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "gd" => Some(Solver::Gd),
            "sgd" => Some(Solver::Sgd),
            _ => None,
        }
    }
}

/// Softmax classifier with L2 regularization.
///
/// `c` is the inverse regularization strength: smaller values shrink the
/// weights harder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted weights, one column per class.
    weights: Option<Array2<f64>>,
    /// Fitted intercepts, one per class.
    intercepts: Option<Array1<f64>>,
    c: f64,
    solver: Solver,
    max_iter: usize,
    learning_rate: f64,
    tol: f64,
    seed: u64,
    classes: Vec<f64>,
    is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            weights: None,
            intercepts: None,
            c: 1.0,
            solver: Solver::Gd,
            max_iter: 1000,
            learning_rate: 0.1,
            tol: 1e-6,
            seed: 0,
            classes: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_solver(mut self, solver: Solver) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit on `x` (n_samples x n_features) and encoded labels `y`.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let (n_samples, n_features) = x.dim();
        if n_samples != y.len() {
            return Err(CliniqError::ShapeError {
                expected: format!("{} labels", n_samples),
                actual: format!("{} labels", y.len()),
            });
        }
        if self.c <= 0.0 {
            return Err(CliniqError::InvalidParameter {
                name: "c".to_string(),
                value: self.c.to_string(),
                reason: "inverse regularization strength must be positive".to_string(),
            });
        }

        let mut classes: Vec<f64> = y.iter().copied().collect();
        classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        classes.dedup();
        if classes.len() < 2 {
            return Err(CliniqError::TrainingError(
                "logistic regression needs at least two classes".to_string(),
            ));
        }
        let n_classes = classes.len();
        let one_hot = one_hot_targets(y, &classes);

        let mut weights: Array2<f64> = Array2::zeros((n_features, n_classes));
        let mut intercepts: Array1<f64> = Array1::zeros(n_classes);
        // Per-sample L2 strength, matching the loss being averaged over rows.
        let alpha = 1.0 / (self.c * n_samples as f64);
        let lr = self.learning_rate;

        match self.solver {
            Solver::Gd => {
                for _iter in 0..self.max_iter {
                    let probs = softmax(&(x.dot(&weights) + &intercepts));
                    let diff = &probs - &one_hot;
                    let dw = x.t().dot(&diff) / n_samples as f64;
                    let db = diff
                        .mean_axis(Axis(0))
                        .unwrap_or_else(|| Array1::zeros(n_classes));

                    let gw = &dw + &weights * alpha;
                    let grad_norm =
                        (gw.mapv(|v| v * v).sum() + db.mapv(|v| v * v).sum()).sqrt();
                    if grad_norm < self.tol {
                        break;
                    }

                    // Ridge applied as a proximal step: contractive for any
                    // alpha, so hard regularization cannot blow up the weights.
                    weights = (weights - lr * &dw) / (1.0 + lr * alpha);
                    intercepts = intercepts - lr * &db;
                }
            }
            Solver::Sgd => {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
                let mut order: Vec<usize> = (0..n_samples).collect();
                'epochs: for _epoch in 0..self.max_iter {
                    order.shuffle(&mut rng);
                    for batch in order.chunks(SGD_BATCH_SIZE) {
                        let xb = x.select(Axis(0), batch);
                        let yb = one_hot.select(Axis(0), batch);
                        let probs = softmax(&(xb.dot(&weights) + &intercepts));
                        let diff = &probs - &yb;
                        let dw = xb.t().dot(&diff) / batch.len() as f64;
                        let db = diff
                            .mean_axis(Axis(0))
                            .unwrap_or_else(|| Array1::zeros(n_classes));
                        weights = (weights - lr * &dw) / (1.0 + lr * alpha);
                        intercepts = intercepts - lr * &db;
                    }

                    // Epoch-end convergence check on the full gradient.
                    let probs = softmax(&(x.dot(&weights) + &intercepts));
                    let diff = &probs - &one_hot;
                    let dw = x.t().dot(&diff) / n_samples as f64;
                    let gw = &dw + &weights * alpha;
                    let db = diff
                        .mean_axis(Axis(0))
                        .unwrap_or_else(|| Array1::zeros(n_classes));
                    let grad_norm =
                        (gw.mapv(|v| v * v).sum() + db.mapv(|v| v * v).sum()).sqrt();
                    if grad_norm < self.tol {
                        break 'epochs;
                    }
                }
            }
        }

        self.weights = Some(weights);
        self.intercepts = Some(intercepts);
        self.classes = classes;
        self.is_fitted = true;
        Ok(self)
    }

    /// Class probabilities, one row per sample in class order.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let weights = self.weights.as_ref().ok_or(CliniqError::ModelNotFitted)?;
        let intercepts = self.intercepts.as_ref().ok_or(CliniqError::ModelNotFitted)?;
        if x.ncols() != weights.nrows() {
            return Err(CliniqError::ShapeError {
                expected: format!("{} features", weights.nrows()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(softmax(&(x.dot(weights) + intercepts)))
    }

    /// Predicted class labels.
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

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// L2 norm of the weight matrix. Available after `fit`.
    pub fn weight_norm(&self) -> Option<f64> {
        self.weights
            .as_ref()
            .map(|w| w.mapv(|v| v * v).sum().sqrt())
    }
}

/// Row-wise softmax, shifted by the row maximum for numerical stability.
fn softmax(z: &Array2<f64>) -> Array2<f64> {
    let mut out = z.clone();
    for mut row in out.rows_mut() {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
    out
}

fn one_hot_targets(y: &Array1<f64>, classes: &[f64]) -> Array2<f64> {
    let index: BTreeMap<i64, usize> = classes
        .iter()
        .enumerate()
        .map(|(j, &c)| (c.round() as i64, j))
        .collect();
    let mut out = Array2::zeros((y.len(), classes.len()));
    for (i, &label) in y.iter().enumerate() {
        if let Some(&j) = index.get(&(label.round() as i64)) {
            out[[i, j]] = 1.0;
        }
    }
    out
}
