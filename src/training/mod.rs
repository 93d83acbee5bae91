//! Model training: hyperparameter grids, cross-validated search, and the
//! three model families the pipeline compares.

pub mod boosting;
pub mod cross_validation;
pub mod decision_tree;
pub mod forest;
pub mod grid;
pub mod linear;

pub use boosting::GradientBoostingClassifier;
pub use cross_validation::{CvScores, FoldSplit, StratifiedKFold};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use forest::{MaxFeatures, RandomForestClassifier};
pub use grid::{Candidate, ParamGrid, ParamValue};
pub use linear::{LogisticRegression, Solver};

use crate::config::GridProfile;
use crate::error::{CliniqError, Result};
use crate::evaluation::accuracy_score;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// The model families evaluated against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    LogisticRegression,
    RandomForest,
    GradientBoosting,
}

impl ModelFamily {
    /// Order in which families are trained and compared. Earlier entries win
    /// accuracy ties.
    pub const EVALUATION_ORDER: [ModelFamily; 3] = [
        ModelFamily::LogisticRegression,
        ModelFamily::RandomForest,
        ModelFamily::GradientBoosting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::LogisticRegression => "logistic_regression",
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::GradientBoosting => "gradient_boosting",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fitted model of any family, with a uniform prediction surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FittedModel {
    Linear(LogisticRegression),
    Forest(RandomForestClassifier),
    Boosting(GradientBoostingClassifier),
}

impl FittedModel {
    pub fn family(&self) -> ModelFamily {
        match self {
            FittedModel::Linear(_) => ModelFamily::LogisticRegression,
            FittedModel::Forest(_) => ModelFamily::RandomForest,
            FittedModel::Boosting(_) => ModelFamily::GradientBoosting,
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            FittedModel::Linear(m) => m.predict(x),
            FittedModel::Forest(m) => m.predict(x),
            FittedModel::Boosting(m) => m.predict(x),
        }
    }

    /// Class probabilities, one row per sample in class order.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            FittedModel::Linear(m) => m.predict_proba(x),
            FittedModel::Forest(m) => m.predict_proba(x),
            FittedModel::Boosting(m) => m.predict_proba(x),
        }
    }

    pub fn classes(&self) -> &[f64] {
        match self {
            FittedModel::Linear(m) => m.classes(),
            FittedModel::Forest(m) => m.classes(),
            FittedModel::Boosting(m) => m.classes(),
        }
    }

    /// Split-gain importances for the tree families; the linear model has
    /// none.
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        match self {
            FittedModel::Linear(_) => None,
            FittedModel::Forest(m) => m.feature_importances(),
            FittedModel::Boosting(m) => m.feature_importances(),
        }
    }
}

/// Winner of one family's grid search, refitted on the full training set.
#[derive(Debug, Clone)]
pub struct TrainerOutcome {
    pub model: FittedModel,
    pub best_params: Candidate,
    /// Mean validation accuracy of the best candidate across folds.
    pub cv_accuracy: f64,
}

/// One model family's training strategy: its grid and how to fit it.
pub trait Trainer: Send + Sync {
    fn family(&self) -> ModelFamily;
    fn param_grid(&self) -> ParamGrid;
    /// Grid-search `x`/`y` with cross-validation, then refit the best
    /// candidate on all rows.
    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<TrainerOutcome>;
}

/// Exhaustive grid search. Candidates are scored in parallel on a shared set
/// of stratified folds; the first candidate in grid order wins ties.
fn grid_search<F>(
    family: ModelFamily,
    grid: &ParamGrid,
    x: &Array2<f64>,
    y: &Array1<f64>,
    cv_folds: usize,
    seed: u64,
    fit_and_score: F,
) -> Result<(Candidate, f64)>
where
    F: Fn(&Candidate, &Array2<f64>, &Array1<f64>, &Array2<f64>, &Array1<f64>) -> Result<f64>
        + Send
        + Sync,
{
    let candidates = grid.candidates();
    if candidates.is_empty() {
        return Err(CliniqError::TrainingError(format!(
            "empty hyperparameter grid for {family}"
        )));
    }
    let splits = StratifiedKFold::new(cv_folds, seed).split(y)?;
    info!(
        %family,
        candidates = candidates.len(),
        folds = splits.len(),
        "starting grid search"
    );

    let scored: Result<Vec<(Candidate, f64)>> = candidates
        .into_par_iter()
        .map(|candidate| {
            let mut fold_scores = Vec::with_capacity(splits.len());
            for split in &splits {
                let x_train = x.select(Axis(0), &split.train_indices);
                let y_train = take_labels(y, &split.train_indices);
                let x_val = x.select(Axis(0), &split.val_indices);
                let y_val = take_labels(y, &split.val_indices);
                fold_scores.push(fit_and_score(&candidate, &x_train, &y_train, &x_val, &y_val)?);
            }
            let scores = CvScores::from_scores(fold_scores);
            debug!(
                %family,
                params = %grid::describe(&candidate),
                mean = format!("{:.4}", scores.mean),
                std = format!("{:.4}", scores.std),
                "candidate scored"
            );
            Ok((candidate, scores.mean))
        })
        .collect();

    let best = scored?
        .into_iter()
        .fold(None, |acc: Option<(Candidate, f64)>, cand| match acc {
            Some(best) if cand.1 <= best.1 => Some(best),
            _ => Some(cand),
        });
    best.ok_or_else(|| CliniqError::TrainingError(format!("no scored candidates for {family}")))
}

fn take_labels(y: &Array1<f64>, indices: &[usize]) -> Array1<f64> {
    Array1::from_iter(indices.iter().map(|&i| y[i]))
}

fn require_f64(candidate: &Candidate, name: &str) -> Result<f64> {
    candidate
        .get(name)
        .and_then(ParamValue::as_f64)
        .ok_or_else(|| missing_param(candidate, name))
}

fn require_usize(candidate: &Candidate, name: &str) -> Result<usize> {
    let value = candidate
        .get(name)
        .and_then(ParamValue::as_i64)
        .ok_or_else(|| missing_param(candidate, name))?;
    usize::try_from(value).map_err(|_| CliniqError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: "must be non-negative".to_string(),
    })
}

fn require_str<'a>(candidate: &'a Candidate, name: &str) -> Result<&'a str> {
    candidate
        .get(name)
        .and_then(ParamValue::as_str)
        .ok_or_else(|| missing_param(candidate, name))
}

/// Depth axes mix integers with `Unset` for "grow until pure".
fn optional_usize(candidate: &Candidate, name: &str) -> Result<Option<usize>> {
    match candidate.get(name) {
        None => Err(missing_param(candidate, name)),
        Some(ParamValue::Unset) => Ok(None),
        Some(_) => require_usize(candidate, name).map(Some),
    }
}

fn missing_param(candidate: &Candidate, name: &str) -> CliniqError {
    CliniqError::InvalidParameter {
        name: name.to_string(),
        value: "missing".to_string(),
        reason: format!("not present in candidate {}", grid::describe(candidate)),
    }
}

/// Logistic regression over C, penalty, solver and iteration cap.
pub struct LinearTrainer {
    profile: GridProfile,
    cv_folds: usize,
    seed: u64,
}

impl LinearTrainer {
    pub fn new(profile: GridProfile, cv_folds: usize, seed: u64) -> Self {
        Self {
            profile,
            cv_folds,
            seed,
        }
    }

    fn build(candidate: &Candidate, seed: u64) -> Result<LogisticRegression> {
        let penalty = require_str(candidate, "penalty")?;
        if penalty != "l2" {
            return Err(CliniqError::InvalidParameter {
                name: "penalty".to_string(),
                value: penalty.to_string(),
                reason: "only l2 regularization is supported".to_string(),
            });
        }
        let solver_name = require_str(candidate, "solver")?;
        let solver =
            Solver::from_name(solver_name).ok_or_else(|| CliniqError::InvalidParameter {
                name: "solver".to_string(),
                value: solver_name.to_string(),
                reason: "expected one of: gd, sgd".to_string(),
            })?;
        Ok(LogisticRegression::new()
            .with_c(require_f64(candidate, "c")?)
            .with_solver(solver)
            .with_max_iter(require_usize(candidate, "max_iter")?)
            .with_seed(seed))
    }
}

impl Trainer for LinearTrainer {
    fn family(&self) -> ModelFamily {
        ModelFamily::LogisticRegression
    }

    fn param_grid(&self) -> ParamGrid {
        match self.profile {
            GridProfile::Full => ParamGrid::new()
                .floats("c", &[0.001, 0.01, 0.1, 1.0, 10.0, 100.0])
                .texts("penalty", &["l2"])
                .texts("solver", &["gd", "sgd"])
                .ints("max_iter", &[1000]),
            GridProfile::Quick => ParamGrid::new()
                .floats("c", &[0.1, 10.0])
                .texts("penalty", &["l2"])
                .texts("solver", &["gd"])
                .ints("max_iter", &[200]),
        }
    }

    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<TrainerOutcome> {
        let grid = self.param_grid();
        let seed = self.seed;
        let (best_params, cv_accuracy) = grid_search(
            self.family(),
            &grid,
            x,
            y,
            self.cv_folds,
            self.seed,
            |candidate, x_train, y_train, x_val, y_val| {
                let mut model = Self::build(candidate, seed)?;
                model.fit(x_train, y_train)?;
                Ok(accuracy_score(y_val, &model.predict(x_val)?))
            },
        )?;

        let mut model = Self::build(&best_params, self.seed)?;
        model.fit(x, y)?;
        info!(
            family = %self.family(),
            cv_accuracy = format!("{:.4}", cv_accuracy),
            params = %grid::describe(&best_params),
            "grid search complete"
        );
        Ok(TrainerOutcome {
            model: FittedModel::Linear(model),
            best_params,
            cv_accuracy,
        })
    }
}

/// Random forest over tree count, depth and split thresholds.
pub struct ForestTrainer {
    profile: GridProfile,
    cv_folds: usize,
    seed: u64,
}

impl ForestTrainer {
    pub fn new(profile: GridProfile, cv_folds: usize, seed: u64) -> Self {
        Self {
            profile,
            cv_folds,
            seed,
        }
    }

    fn build(candidate: &Candidate, seed: u64) -> Result<RandomForestClassifier> {
        Ok(
            RandomForestClassifier::new(require_usize(candidate, "n_estimators")?)
                .with_max_depth(optional_usize(candidate, "max_depth")?)
                .with_min_samples_split(require_usize(candidate, "min_samples_split")?)
                .with_min_samples_leaf(require_usize(candidate, "min_samples_leaf")?)
                .with_seed(seed),
        )
    }
}

impl Trainer for ForestTrainer {
    fn family(&self) -> ModelFamily {
        ModelFamily::RandomForest
    }

    fn param_grid(&self) -> ParamGrid {
        let depth_axis = |depths: &[i64]| {
            let mut values: Vec<ParamValue> = depths.iter().map(|&d| ParamValue::Int(d)).collect();
            values.push(ParamValue::Unset);
            values
        };
        match self.profile {
            GridProfile::Full => ParamGrid::new()
                .ints("n_estimators", &[50, 100, 200])
                .axis("max_depth", depth_axis(&[5, 10, 15]))
                .ints("min_samples_split", &[2, 5, 10])
                .ints("min_samples_leaf", &[1, 2, 4]),
            GridProfile::Quick => ParamGrid::new()
                .ints("n_estimators", &[25])
                .axis("max_depth", depth_axis(&[5]))
                .ints("min_samples_split", &[2])
                .ints("min_samples_leaf", &[1]),
        }
    }

    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<TrainerOutcome> {
        let grid = self.param_grid();
        let seed = self.seed;
        let (best_params, cv_accuracy) = grid_search(
            self.family(),
            &grid,
            x,
            y,
            self.cv_folds,
            self.seed,
            |candidate, x_train, y_train, x_val, y_val| {
                let mut model = Self::build(candidate, seed)?;
                model.fit(x_train, y_train)?;
                Ok(accuracy_score(y_val, &model.predict(x_val)?))
            },
        )?;

        let mut model = Self::build(&best_params, self.seed)?;
        model.fit(x, y)?;
        info!(
            family = %self.family(),
            cv_accuracy = format!("{:.4}", cv_accuracy),
            params = %grid::describe(&best_params),
            "grid search complete"
        );
        Ok(TrainerOutcome {
            model: FittedModel::Forest(model),
            best_params,
            cv_accuracy,
        })
    }
}

/// Gradient boosting over round count, learning rate, depth and subsampling.
pub struct BoostingTrainer {
    profile: GridProfile,
    cv_folds: usize,
    seed: u64,
}

impl BoostingTrainer {
    pub fn new(profile: GridProfile, cv_folds: usize, seed: u64) -> Self {
        Self {
            profile,
            cv_folds,
            seed,
        }
    }

    fn build(candidate: &Candidate, seed: u64) -> Result<GradientBoostingClassifier> {
        Ok(
            GradientBoostingClassifier::new(require_usize(candidate, "n_estimators")?)
                .with_learning_rate(require_f64(candidate, "learning_rate")?)
                .with_max_depth(optional_usize(candidate, "max_depth")?)
                .with_min_samples_split(require_usize(candidate, "min_samples_split")?)
                .with_subsample(require_f64(candidate, "subsample")?)
                .with_seed(seed),
        )
    }
}

impl Trainer for BoostingTrainer {
    fn family(&self) -> ModelFamily {
        ModelFamily::GradientBoosting
    }

    fn param_grid(&self) -> ParamGrid {
        match self.profile {
            GridProfile::Full => ParamGrid::new()
                .ints("n_estimators", &[50, 100, 200])
                .floats("learning_rate", &[0.01, 0.05, 0.1])
                .ints("max_depth", &[3, 5, 7])
                .ints("min_samples_split", &[2, 5])
                .floats("subsample", &[0.8, 1.0]),
            GridProfile::Quick => ParamGrid::new()
                .ints("n_estimators", &[25])
                .floats("learning_rate", &[0.1])
                .ints("max_depth", &[3])
                .ints("min_samples_split", &[2])
                .floats("subsample", &[1.0, 0.8]),
        }
    }

    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<TrainerOutcome> {
        let grid = self.param_grid();
        let seed = self.seed;
        let (best_params, cv_accuracy) = grid_search(
            self.family(),
            &grid,
            x,
            y,
            self.cv_folds,
            self.seed,
            |candidate, x_train, y_train, x_val, y_val| {
                let mut model = Self::build(candidate, seed)?;
                model.fit(x_train, y_train)?;
                Ok(accuracy_score(y_val, &model.predict(x_val)?))
            },
        )?;

        let mut model = Self::build(&best_params, self.seed)?;
        model.fit(x, y)?;
        info!(
            family = %self.family(),
            cv_accuracy = format!("{:.4}", cv_accuracy),
            params = %grid::describe(&best_params),
            "grid search complete"
        );
        Ok(TrainerOutcome {
            model: FittedModel::Boosting(model),
            best_params,
            cv_accuracy,
        })
    }
}
