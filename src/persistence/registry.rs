//! Model version registry.
//!
//! The registry is metadata only; the artifact file is the source of truth.
//! Sinks map `RegistryRecord` onto whatever store serving reads, and a failed
//! write must never invalidate an already-saved artifact.

use super::ModelArtifact;
use crate::error::{CliniqError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One registered model version, mirroring the serving database's columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub model_name: String,
    pub version: String,
    pub model_type: String,
    pub accuracy: f64,
    pub precision_score: f64,
    pub recall_score: f64,
    pub f1_score: f64,
    pub auc_score: f64,
    /// Row-major confusion counts.
    pub confusion_matrix: Vec<Vec<usize>>,
    pub model_file_path: String,
    pub description: String,
    pub recorded_at: String,
}

impl RegistryRecord {
    pub fn from_artifact(artifact: &ModelArtifact, model_name: &str, file_path: &Path) -> Self {
        Self {
            model_name: model_name.to_string(),
            version: artifact.version.clone(),
            model_type: artifact.model_type.clone(),
            accuracy: artifact.metrics.accuracy,
            precision_score: artifact.metrics.precision,
            recall_score: artifact.metrics.recall,
            f1_score: artifact.metrics.f1,
            auc_score: artifact.metrics.auc,
            confusion_matrix: artifact.metrics.confusion_matrix.counts.clone(),
            model_file_path: file_path.display().to_string(),
            description: format!("auto-trained model - {}", artifact.model_type),
            recorded_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Destination for version records.
pub trait RegistrySink {
    fn record(&self, record: &RegistryRecord) -> Result<()>;
}

/// Append-only JSON-lines registry file, one record per line.
pub struct JsonlRegistry {
    path: PathBuf,
}

impl JsonlRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in the file, oldest first.
    pub fn records(&self) -> Result<Vec<RegistryRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)
            .map_err(|e| CliniqError::RegistryWrite(e.to_string()))?;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| CliniqError::RegistryWrite(e.to_string()))
            })
            .collect()
    }
}

impl RegistrySink for JsonlRegistry {
    fn record(&self, record: &RegistryRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| CliniqError::RegistryWrite(e.to_string()))?;
            }
        }
        let line = serde_json::to_string(record)
            .map_err(|e| CliniqError::RegistryWrite(e.to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| CliniqError::RegistryWrite(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| CliniqError::RegistryWrite(e.to_string()))?;
        Ok(())
    }
}
