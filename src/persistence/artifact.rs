//! Self-contained model bundle: everything serving needs in one JSON file.

use crate::error::{CliniqError, Result};
use crate::evaluation::ModelMetrics;
use crate::features::{LabelEncoder, StandardScaler, FEATURE_NAMES};
use crate::training::FittedModel;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// A trained model together with its preprocessing state and metrics.
///
/// The scaler and label encoder are bundled so serving applies exactly the
/// transforms the model was trained with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model: FittedModel,
    pub scaler: StandardScaler,
    pub label_encoder: LabelEncoder,
    pub feature_names: Vec<String>,
    pub model_type: String,
    /// Timestamp version, e.g. `v20260824_153000`.
    pub version: String,
    pub metrics: ModelMetrics,
    pub trained_at: String,
}

impl ModelArtifact {
    pub fn new(
        model: FittedModel,
        scaler: StandardScaler,
        label_encoder: LabelEncoder,
        feature_names: Vec<String>,
        metrics: ModelMetrics,
    ) -> Self {
        let now = Utc::now();
        let model_type = model.family().as_str().to_string();
        Self {
            model,
            scaler,
            label_encoder,
            feature_names,
            model_type,
            version: format!("v{}", now.format("%Y%m%d_%H%M%S")),
            metrics,
            trained_at: now.to_rfc3339(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}_{}.json", self.model_type, self.version)
    }

    /// Write the bundle under `dir`, creating it if needed. Returns the full
    /// artifact path.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        info!(path = %path.display(), version = %self.version, "model artifact saved");
        Ok(path)
    }

    /// Read a bundle back and verify its feature contract still matches the
    /// featurizer this binary was built with.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let artifact: Self = serde_json::from_str(&contents)?;
        artifact.check_feature_contract()?;
        Ok(artifact)
    }

    fn check_feature_contract(&self) -> Result<()> {
        let matches = self.feature_names.len() == FEATURE_NAMES.len()
            && self
                .feature_names
                .iter()
                .zip(FEATURE_NAMES.iter())
                .all(|(stored, current)| stored == current);
        if !matches {
            return Err(CliniqError::FeatureMismatch(format!(
                "artifact was trained on {} feature(s) that do not match this build's {}-column contract",
                self.feature_names.len(),
                FEATURE_NAMES.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridProfile;
    use crate::evaluation::evaluate;
    use crate::training::{LinearTrainer, Trainer};
    use ndarray::{Array1, Array2};
    use tempfile::tempdir;

    fn fitted_artifact() -> ModelArtifact {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| {
            let offset = if i % 2 == 0 { 0.0 } else { 5.0 };
            offset + (i / 2) as f64 * 0.1 + j as f64 * 0.01
        });
        let y = Array1::from_shape_fn(30, |i| (i % 2) as f64);

        let mut scaler = StandardScaler::new();
        let x_scaled = scaler.fit_transform(&x).unwrap();
        let labels: Vec<&str> = (0..30)
            .map(|i| if i % 2 == 0 { "infection" } else { "other" })
            .collect();
        let mut encoder = LabelEncoder::new();
        encoder.fit(&labels).unwrap();

        let outcome = LinearTrainer::new(GridProfile::Quick, 3, 42)
            .fit(&x_scaled, &y)
            .unwrap();
        let metrics = evaluate(&outcome.model, &x_scaled, &y).unwrap();
        ModelArtifact::new(
            outcome.model,
            scaler,
            encoder,
            FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            metrics,
        )
    }

    #[test]
    fn test_version_format() {
        let artifact = fitted_artifact();
        assert!(artifact.version.starts_with('v'));
        assert_eq!(artifact.version.len(), "v20260824_153000".len());
        assert_eq!(artifact.model_type, "logistic_regression");
        assert_eq!(
            artifact.file_name(),
            format!("logistic_regression_{}.json", artifact.version)
        );
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let artifact = fitted_artifact();
        let path = artifact.save(dir.path()).unwrap();
        assert!(path.exists());

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.version, artifact.version);
        assert_eq!(loaded.model_type, artifact.model_type);
        assert_eq!(loaded.label_encoder.classes(), artifact.label_encoder.classes());
        assert!((loaded.metrics.accuracy - artifact.metrics.accuracy).abs() < 1e-12);
    }

    #[test]
    fn test_load_rejects_stale_feature_contract() {
        let dir = tempdir().unwrap();
        let mut artifact = fitted_artifact();
        artifact.feature_names.truncate(5);
        let path = artifact.save(dir.path()).unwrap();
        assert!(matches!(
            ModelArtifact::load(&path),
            Err(CliniqError::FeatureMismatch(_))
        ));
    }
}
