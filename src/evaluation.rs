//! Held-out evaluation: accuracy, weighted precision/recall/F1, confusion
//! matrix and one-vs-rest AUC.

use crate::error::Result;
use crate::training::FittedModel;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

/// Fraction of exactly-matched predictions.
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (**t - **p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Rows are truth, columns are predictions, both over the sorted union of
/// labels seen in either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<f64>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let labels: Vec<f64> = y_true
            .iter()
            .chain(y_pred.iter())
            .map(|&v| v.round() as i64)
            .collect::<BTreeSet<i64>>()
            .into_iter()
            .map(|v| v as f64)
            .collect();
        let index = |value: f64| -> Option<usize> {
            labels
                .iter()
                .position(|&l| (l - value.round()).abs() < 0.5)
        };

        let mut counts = vec![vec![0usize; labels.len()]; labels.len()];
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            if let (Some(row), Some(col)) = (index(t), index(p)) {
                counts[row][col] += 1;
            }
        }
        Self { labels, counts }
    }

    /// True-count per label (row sums).
    pub fn support(&self) -> Vec<usize> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    pub fn total(&self) -> usize {
        self.support().iter().sum()
    }
}

/// Test-set metrics for one trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    /// Support-weighted precision; labels never predicted score zero.
    pub precision: f64,
    /// Support-weighted recall.
    pub recall: f64,
    /// Support-weighted F1.
    pub f1: f64,
    /// Support-weighted one-vs-rest AUC, or zero when undefined.
    pub auc: f64,
    pub confusion_matrix: ConfusionMatrix,
}

/// Score a fitted model on held-out data.
pub fn evaluate(
    model: &FittedModel,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
) -> Result<ModelMetrics> {
    let y_pred = model.predict(x_test)?;
    let confusion_matrix = ConfusionMatrix::from_predictions(y_test, &y_pred);
    let (precision, recall, f1) = weighted_precision_recall_f1(&confusion_matrix);

    let proba = model.predict_proba(x_test)?;
    let auc = ovr_weighted_auc(model.classes(), &proba, y_test);

    Ok(ModelMetrics {
        accuracy: accuracy_score(y_test, &y_pred),
        precision,
        recall,
        f1,
        auc,
        confusion_matrix,
    })
}

/// Per-label precision/recall/F1 averaged by true-label support. Labels with
/// no predictions (or no true samples) contribute zero instead of NaN.
fn weighted_precision_recall_f1(cm: &ConfusionMatrix) -> (f64, f64, f64) {
    let support = cm.support();
    let total: usize = support.iter().sum();
    if total == 0 {
        return (0.0, 0.0, 0.0);
    }

    let n_labels = cm.labels.len();
    let mut precision = 0.0;
    let mut recall = 0.0;
    let mut f1 = 0.0;
    for i in 0..n_labels {
        let tp = cm.counts[i][i];
        let predicted: usize = (0..n_labels).map(|r| cm.counts[r][i]).sum();
        let truth = support[i];

        let p = if predicted > 0 {
            tp as f64 / predicted as f64
        } else {
            0.0
        };
        let r = if truth > 0 {
            tp as f64 / truth as f64
        } else {
            0.0
        };
        let f = if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            0.0
        };

        let weight = truth as f64 / total as f64;
        precision += weight * p;
        recall += weight * r;
        f1 += weight * f;
    }
    (precision, recall, f1)
}

/// One-vs-rest AUC weighted by class support. Returns zero when the test set
/// has fewer than two classes or does not cover every trained class, since
/// the score is undefined there.
fn ovr_weighted_auc(classes: &[f64], proba: &Array2<f64>, y_true: &Array1<f64>) -> f64 {
    let observed: BTreeSet<i64> = y_true.iter().map(|&v| v.round() as i64).collect();
    if observed.len() < 2 {
        warn!("AUC undefined: test set has fewer than two classes, reporting 0.0");
        return 0.0;
    }
    let trained: BTreeSet<i64> = classes.iter().map(|&v| v.round() as i64).collect();
    if observed != trained {
        warn!(
            observed = observed.len(),
            trained = trained.len(),
            "AUC undefined: test classes do not match trained classes, reporting 0.0"
        );
        return 0.0;
    }

    let total = y_true.len() as f64;
    let mut auc = 0.0;
    for (col, &class) in classes.iter().enumerate() {
        let scores: Vec<(f64, bool)> = y_true
            .iter()
            .enumerate()
            .map(|(i, &t)| (proba[[i, col]], (t - class).abs() < 0.5))
            .collect();
        let n_pos = scores.iter().filter(|(_, pos)| *pos).count();
        auc += (n_pos as f64 / total) * binary_auc(&scores);
    }
    auc
}

/// Mann-Whitney AUC with average ranks for tied scores.
fn binary_auc(scores: &[(f64, bool)]) -> f64 {
    let n = scores.len();
    let n_pos = scores.iter().filter(|(_, pos)| *pos).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        scores[a]
            .0
            .partial_cmp(&scores[b].0)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]].0 == scores[order[i]].0 {
            j += 1;
        }
        // 1-based ranks, ties share the mean rank of their block.
        let avg = (i + j + 2) as f64 / 2.0;
        for k in i..=j {
            ranks[order[k]] = avg;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = scores
        .iter()
        .zip(&ranks)
        .filter(|((_, pos), _)| *pos)
        .map(|(_, &r)| r)
        .sum();
    (pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0) / (n_pos * n_neg) as f64
}
