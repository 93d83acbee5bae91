//! Cliniq - Clinical diagnosis model training pipeline
//!
//! This crate turns batches of verified clinical encounters into registered
//! diagnosis models. A run fetches a batch, builds the fixed feature matrix,
//! grid-searches three model families with stratified cross-validation,
//! evaluates each on a held-out split, and persists the most accurate model
//! together with its preprocessing state and a registry entry.
//!
//! # Modules
//!
//! ## Data
//! - [`data`] - Encounter records, batch sources, batch quality summaries
//! - [`taxonomy`] - Diagnosis-text to disease-category mapping
//! - [`features`] - Feature matrix construction, scaling, label encoding
//! - [`split`] - Stratified train/test splitting
//!
//! ## Training
//! - [`training`] - Model families, hyperparameter grids, cross-validated search
//! - [`evaluation`] - Held-out metrics: accuracy, weighted P/R/F1, OVR AUC
//! - [`selection`] - Accuracy-based winner selection across families
//!
//! ## Persistence
//! - [`persistence`] - Versioned model artifacts and the model registry
//!
//! ## Orchestration
//! - [`pipeline`] - End-to-end training runs
//! - [`config`] - Pipeline configuration
//! - [`report`] - Console rendering of a finished run
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod data;
pub mod features;
pub mod split;
pub mod taxonomy;

// Training
pub mod evaluation;
pub mod selection;
pub mod training;

// Persistence
pub mod persistence;

// Orchestration
pub mod config;
pub mod pipeline;
pub mod report;

// Services
pub mod cli;

pub use error::{CliniqError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{CliniqError, Result};

    // Data
    pub use crate::data::{
        BatchQuality, CsvEncounterSource, DataSource, EncounterRecord, QualityTier, VecSource,
    };
    pub use crate::taxonomy::DiseaseCategory;

    // Features
    pub use crate::features::{
        FeatureBuilder, FeatureSet, LabelEncoder, StandardScaler, FEATURE_NAMES,
    };
    pub use crate::split::{stratified_split, TrainTestSplit};

    // Training
    pub use crate::training::{
        FittedModel, GradientBoostingClassifier, LogisticRegression, ModelFamily,
        RandomForestClassifier, Trainer, TrainerOutcome,
    };
    pub use crate::evaluation::{evaluate, ConfusionMatrix, ModelMetrics};
    pub use crate::selection::{best_index, FamilyResult};

    // Persistence
    pub use crate::persistence::{JsonlRegistry, ModelArtifact, RegistryRecord, RegistrySink};

    // Orchestration
    pub use crate::config::{GridProfile, PipelineConfig};
    pub use crate::pipeline::{TrainingPipeline, TrainingReport};
}
