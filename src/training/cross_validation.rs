//! Stratified cross-validation folds

use crate::error::{CliniqError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Index sets for one fold: everything outside the validation block trains
#[derive(Debug, Clone)]
pub struct FoldSplit {
    pub train_indices: Vec<usize>,
    pub val_indices: Vec<usize>,
}

/// Stratified k-fold assignment.
///
/// Rows are grouped by class, shuffled inside each class with a seeded
/// ChaCha8 stream, then dealt round-robin across folds so every fold sees
/// roughly the batch's class mix.
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }

    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<FoldSplit>> {
        if self.n_splits < 2 {
            return Err(CliniqError::InvalidParameter {
                name: "n_splits".to_string(),
                value: format!("{}", self.n_splits),
                reason: "need at least 2 folds".to_string(),
            });
        }
        if y.len() < self.n_splits {
            return Err(CliniqError::TrainingError(format!(
                "{} samples cannot fill {} folds",
                y.len(),
                self.n_splits
            )));
        }

        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, &label) in y.iter().enumerate() {
            class_indices
                .entry(label.round() as i64)
                .or_default()
                .push(i);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        for indices in class_indices.values() {
            let mut shuffled = indices.clone();
            shuffled.shuffle(&mut rng);
            for (i, idx) in shuffled.into_iter().enumerate() {
                folds[i % self.n_splits].push(idx);
            }
        }

        if folds.iter().any(Vec::is_empty) {
            return Err(CliniqError::TrainingError(format!(
                "class distribution too sparse to fill {} folds",
                self.n_splits
            )));
        }

        let splits = (0..self.n_splits)
            .map(|k| {
                let val_indices = folds[k].clone();
                let train_indices = folds
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != k)
                    .flat_map(|(_, fold)| fold.iter().copied())
                    .collect();
                FoldSplit {
                    train_indices,
                    val_indices,
                }
            })
            .collect();

        Ok(splits)
    }
}

/// Per-fold scores with their summary statistics
#[derive(Debug, Clone)]
pub struct CvScores {
    pub scores: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

impl CvScores {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n = scores.len().max(1) as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let var = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            scores,
            mean,
            std: var.sqrt(),
        }
    }
}
