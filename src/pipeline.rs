//! End-to-end training run: fetch, featurize, split, train the three
//! families, pick a winner, persist it and register the version.

use crate::config::PipelineConfig;
use crate::data::{BatchQuality, DataSource};
use crate::error::{CliniqError, Result};
use crate::evaluation::evaluate;
use crate::features::{FeatureBuilder, LabelEncoder, StandardScaler};
use crate::persistence::{ModelArtifact, RegistryRecord, RegistrySink};
use crate::selection::{self, FamilyResult};
use crate::split::stratified_split;
use crate::taxonomy::DiseaseCategory;
use crate::training::{
    BoostingTrainer, FittedModel, ForestTrainer, LinearTrainer, Trainer,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// How many of the winner's importances the report surfaces.
const TOP_FEATURES: usize = 10;

/// Everything a run produced, for reporting and for callers that chain on it.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// One entry per family, in evaluation order.
    pub results: Vec<FamilyResult>,
    pub winner_index: usize,
    pub artifact_path: PathBuf,
    pub version: String,
    pub model_type: String,
    pub target_accuracy: f64,
    pub target_cleared: bool,
    pub class_counts: BTreeMap<DiseaseCategory, usize>,
    pub dropped_classes: Vec<(DiseaseCategory, usize)>,
    pub n_train: usize,
    pub n_test: usize,
    /// False when the registry write failed; the artifact is still on disk.
    pub registry_recorded: bool,
    /// Winner's strongest features, descending. Empty for the linear family.
    pub top_features: Vec<(String, f64)>,
}

impl TrainingReport {
    pub fn winner(&self) -> &FamilyResult {
        &self.results[self.winner_index]
    }
}

/// One configured training run.
#[derive(Debug)]
pub struct TrainingPipeline {
    config: PipelineConfig,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline against `source`, appending the winning version
    /// to `registry`. A registry failure is downgraded to a warning once the
    /// artifact file is safely on disk.
    pub fn run(
        &self,
        source: &dyn DataSource,
        registry: &dyn RegistrySink,
    ) -> Result<TrainingReport> {
        info!(source = %source.name(), "starting training run");
        let records = source.fetch()?;
        let quality = BatchQuality::summarize(&records);
        info!(
            total = quality.total_rows,
            usable = quality.usable_rows,
            "training batch fetched"
        );

        let features = FeatureBuilder::new()
            .with_min_training_samples(self.config.min_training_samples)
            .with_min_samples_per_class(self.config.min_samples_per_class)
            .build(&records)?;
        for (category, count) in &features.class_counts {
            info!(category = %category, rows = count, "class kept");
        }
        if features.class_counts.len() < 2 {
            return Err(CliniqError::TrainingError(format!(
                "need at least two disease categories to train, found {}",
                features.class_counts.len()
            )));
        }

        let label_names: Vec<String> = features
            .labels
            .iter()
            .map(|c| c.as_str().to_string())
            .collect();
        let mut label_encoder = LabelEncoder::new();
        let y = label_encoder.fit_transform(&label_names)?;

        let mut scaler = StandardScaler::new();
        let x = scaler.fit_transform(&features.x)?;

        let split = stratified_split(
            &x,
            &y,
            label_encoder.classes(),
            self.config.test_fraction,
            self.config.seed,
        )?;
        let n_train = split.x_train.nrows();
        let n_test = split.x_test.nrows();
        info!(train = n_train, test = n_test, "stratified split done");

        let mut results = Vec::new();
        for trainer in self.trainers() {
            let outcome = trainer.fit(&split.x_train, &split.y_train)?;
            let metrics = evaluate(&outcome.model, &split.x_test, &split.y_test)?;
            info!(
                family = %outcome.model.family(),
                accuracy = format!("{:.4}", metrics.accuracy),
                f1 = format!("{:.4}", metrics.f1),
                auc = format!("{:.4}", metrics.auc),
                "family evaluated"
            );
            results.push(FamilyResult { outcome, metrics });
        }

        let winner_index = selection::best_index(&results).ok_or_else(|| {
            CliniqError::TrainingError("no model family produced a result".to_string())
        })?;
        let winner = &results[winner_index];
        let winner_accuracy = winner.metrics.accuracy;
        info!(
            family = %winner.outcome.model.family(),
            accuracy = format!("{:.4}", winner_accuracy),
            "winner selected"
        );

        let artifact = ModelArtifact::new(
            winner.outcome.model.clone(),
            scaler,
            label_encoder,
            features.feature_names.clone(),
            winner.metrics.clone(),
        );
        let artifact_path = artifact.save(&self.config.artifacts_dir)?;

        let record =
            RegistryRecord::from_artifact(&artifact, &self.config.model_name, &artifact_path);
        let registry_recorded = match registry.record(&record) {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "registry write failed; the saved artifact remains valid");
                false
            }
        };

        let top_features =
            top_importances(&winner.outcome.model, &features.feature_names, TOP_FEATURES);

        Ok(TrainingReport {
            winner_index,
            version: artifact.version,
            model_type: artifact.model_type,
            target_accuracy: self.config.target_accuracy,
            target_cleared: winner_accuracy >= self.config.target_accuracy,
            class_counts: features.class_counts,
            dropped_classes: features.dropped_classes,
            n_train,
            n_test,
            registry_recorded,
            top_features,
            artifact_path,
            results,
        })
    }

    /// The three family trainers, in evaluation order.
    fn trainers(&self) -> Vec<Box<dyn Trainer>> {
        let profile = self.config.grid_profile;
        let folds = self.config.cv_folds;
        let seed = self.config.seed;
        vec![
            Box::new(LinearTrainer::new(profile, folds, seed)),
            Box::new(ForestTrainer::new(profile, folds, seed)),
            Box::new(BoostingTrainer::new(profile, folds, seed)),
        ]
    }
}

fn top_importances(model: &FittedModel, names: &[String], k: usize) -> Vec<(String, f64)> {
    let Some(importances) = model.feature_importances() else {
        return Vec::new();
    };
    let mut pairs: Vec<(String, f64)> = names
        .iter()
        .cloned()
        .zip(importances.iter().copied())
        .collect();
    pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    pairs.truncate(k);
    pairs
}
