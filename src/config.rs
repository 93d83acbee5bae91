//! Pipeline configuration
//!
//! All knobs for one training run live in [`PipelineConfig`]; there is no
//! module-level mutable state, so repeated or parallel runs cannot leak
//! settings into each other.

use crate::error::{CliniqError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which hyperparameter grids the trainers explore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GridProfile {
    /// Production grids (the full search spaces)
    #[default]
    Full,
    /// Reduced grids for tests and smoke runs
    Quick,
}

/// Configuration for one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum raw usable rows before any model fit proceeds
    pub min_training_samples: usize,
    /// Minimum records a disease category needs to stay in the batch
    pub min_samples_per_class: usize,
    /// Fraction of rows held out for evaluation
    pub test_fraction: f64,
    /// Number of cross-validation folds per grid candidate
    pub cv_folds: usize,
    /// Seed for every stochastic component of the run
    pub seed: u64,
    /// Accuracy the winning model is expected to clear
    pub target_accuracy: f64,
    /// Directory artifact files are written to
    pub artifacts_dir: PathBuf,
    /// Name the run registers its model under
    pub model_name: String,
    /// Grid profile for the three family searches
    pub grid_profile: GridProfile,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_training_samples: 50,
            min_samples_per_class: 10,
            test_fraction: 0.2,
            cv_folds: 5,
            seed: 42,
            target_accuracy: 0.85,
            artifacts_dir: PathBuf::from("./models"),
            model_name: "medical_diagnosis_ai".to_string(),
            grid_profile: GridProfile::Full,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_training_samples(mut self, n: usize) -> Self {
        self.min_training_samples = n;
        self
    }

    pub fn with_min_samples_per_class(mut self, n: usize) -> Self {
        self.min_samples_per_class = n;
        self
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_target_accuracy(mut self, target: f64) -> Self {
        self.target_accuracy = target;
        self
    }

    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = name.into();
        self
    }

    pub fn with_grid_profile(mut self, profile: GridProfile) -> Self {
        self.grid_profile = profile;
        self
    }

    /// Check that the configuration is internally consistent
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(CliniqError::InvalidParameter {
                name: "test_fraction".to_string(),
                value: format!("{}", self.test_fraction),
                reason: "must be in (0, 1)".to_string(),
            });
        }
        if self.cv_folds < 2 {
            return Err(CliniqError::InvalidParameter {
                name: "cv_folds".to_string(),
                value: format!("{}", self.cv_folds),
                reason: "need at least 2 folds".to_string(),
            });
        }
        if self.min_samples_per_class < 2 {
            return Err(CliniqError::InvalidParameter {
                name: "min_samples_per_class".to_string(),
                value: format!("{}", self.min_samples_per_class),
                reason: "a class needs at least 2 members to appear in both partitions".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.min_training_samples, 50);
        assert_eq!(config.min_samples_per_class, 10);
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.seed, 42);
        assert!((config.test_fraction - 0.2).abs() < 1e-12);
        assert!((config.target_accuracy - 0.85).abs() < 1e-12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let config = PipelineConfig::new()
            .with_seed(7)
            .with_test_fraction(0.25)
            .with_grid_profile(GridProfile::Quick)
            .with_artifacts_dir("/tmp/cliniq-models");
        assert_eq!(config.seed, 7);
        assert_eq!(config.grid_profile, GridProfile::Quick);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_test_fraction() {
        let config = PipelineConfig::new().with_test_fraction(1.5);
        assert!(config.validate().is_err());
    }
}
