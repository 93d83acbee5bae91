//! Encounter records and data sources
//!
//! A [`DataSource`] hands the pipeline a batch of [`EncounterRecord`]s that
//! already satisfy the eligibility rule: verified, non-empty physician
//! diagnosis, quality tier high or medium. Row order carries no meaning.

mod csv;

pub use csv::CsvEncounterSource;

use crate::error::Result;
use crate::taxonomy::DiseaseCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upstream data-quality grade attached to each record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    High,
    Medium,
    Low,
}

impl QualityTier {
    /// Decode the numeric grade used by the upstream store (1 high, 2 medium,
    /// 3 low). Unknown codes are graded low so they never train.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => QualityTier::High,
            2 => QualityTier::Medium,
            _ => QualityTier::Low,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            QualityTier::High => 1,
            QualityTier::Medium => 2,
            QualityTier::Low => 3,
        }
    }
}

/// One clinical observation, as delivered by the upstream store.
///
/// Numeric vitals are optional because real encounters arrive with gaps; the
/// feature builder imputes them per batch. The diagnosis text is the training
/// label source and must be non-empty for a record to be usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterRecord {
    pub age: Option<f64>,
    pub gender: Option<i32>,
    pub systolic_bp: Option<f64>,
    pub diastolic_bp: Option<f64>,
    pub heart_rate: Option<f64>,
    pub temperature: Option<f64>,
    pub blood_sugar: Option<f64>,
    pub bmi: Option<f64>,
    pub symptom_keywords: Option<String>,
    pub symptom_severity: Option<f64>,
    pub has_hypertension: Option<bool>,
    pub has_diabetes: Option<bool>,
    pub has_heart_disease: Option<bool>,
    pub smoking_status: Option<i32>,
    pub drinking_status: Option<i32>,
    pub doctor_diagnosis: String,
    pub diagnosis_icd10: Option<String>,
    pub is_verified: bool,
    pub quality: QualityTier,
}

impl Default for EncounterRecord {
    fn default() -> Self {
        Self {
            age: None,
            gender: None,
            systolic_bp: None,
            diastolic_bp: None,
            heart_rate: None,
            temperature: None,
            blood_sugar: None,
            bmi: None,
            symptom_keywords: None,
            symptom_severity: None,
            has_hypertension: None,
            has_diabetes: None,
            has_heart_disease: None,
            smoking_status: None,
            drinking_status: None,
            doctor_diagnosis: String::new(),
            diagnosis_icd10: None,
            is_verified: true,
            quality: QualityTier::High,
        }
    }
}

impl EncounterRecord {
    /// Eligibility rule every source applies before handing rows to the
    /// pipeline: verified, diagnosis present, quality high or medium.
    pub fn is_trainable(&self) -> bool {
        self.is_verified
            && !self.doctor_diagnosis.trim().is_empty()
            && self.quality != QualityTier::Low
    }

    /// Category this record's diagnosis maps to
    pub fn category(&self) -> DiseaseCategory {
        DiseaseCategory::from_diagnosis(&self.doctor_diagnosis)
    }
}

/// Supplier of one training batch
pub trait DataSource {
    /// Descriptive name for logs and error messages
    fn name(&self) -> String;

    /// Fetch the batch. Implementations apply
    /// [`EncounterRecord::is_trainable`] themselves so the pipeline never
    /// sees ineligible rows.
    fn fetch(&self) -> Result<Vec<EncounterRecord>>;
}

/// In-memory source over a prepared record set. Used by tests and by callers
/// that already hold rows from elsewhere.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    records: Vec<EncounterRecord>,
}

impl VecSource {
    pub fn new(records: Vec<EncounterRecord>) -> Self {
        Self { records }
    }
}

impl DataSource for VecSource {
    fn name(&self) -> String {
        format!("in-memory ({} rows)", self.records.len())
    }

    fn fetch(&self) -> Result<Vec<EncounterRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.is_trainable())
            .cloned()
            .collect())
    }
}

/// Batch-level coverage summary used by the `check` command and by
/// pre-training logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchQuality {
    /// Rows delivered by the source
    pub total_rows: usize,
    /// Rows passing the eligibility rule
    pub usable_rows: usize,
    /// Eligible rows per quality tier (high, medium)
    pub tier_counts: (usize, usize),
    /// Eligible rows per mapped disease category
    pub category_counts: BTreeMap<DiseaseCategory, usize>,
}

impl BatchQuality {
    pub fn summarize(records: &[EncounterRecord]) -> Self {
        let total_rows = records.len();
        let mut usable_rows = 0;
        let mut high = 0;
        let mut medium = 0;
        let mut category_counts = BTreeMap::new();

        for record in records.iter().filter(|r| r.is_trainable()) {
            usable_rows += 1;
            match record.quality {
                QualityTier::High => high += 1,
                QualityTier::Medium => medium += 1,
                QualityTier::Low => {}
            }
            *category_counts.entry(record.category()).or_insert(0) += 1;
        }

        Self {
            total_rows,
            usable_rows,
            tier_counts: (high, medium),
            category_counts,
        }
    }

    /// Categories that clear the per-class minimum
    pub fn covered_categories(&self, min_samples_per_class: usize) -> usize {
        self.category_counts
            .values()
            .filter(|&&n| n >= min_samples_per_class)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verified(diagnosis: &str) -> EncounterRecord {
        EncounterRecord {
            doctor_diagnosis: diagnosis.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_trainable_rule() {
        assert!(verified("hypertension").is_trainable());

        let unverified = EncounterRecord {
            is_verified: false,
            ..verified("hypertension")
        };
        assert!(!unverified.is_trainable());

        let empty = verified("   ");
        assert!(!empty.is_trainable());

        let low = EncounterRecord {
            quality: QualityTier::Low,
            ..verified("hypertension")
        };
        assert!(!low.is_trainable());
    }

    #[test]
    fn test_vec_source_filters() {
        let records = vec![
            verified("hypertension"),
            EncounterRecord {
                is_verified: false,
                ..verified("diabetes")
            },
            verified("migraine"),
        ];
        let source = VecSource::new(records);
        let fetched = source.fetch().unwrap();
        assert_eq!(fetched.len(), 2);
    }

    #[test]
    fn test_quality_tier_codes() {
        assert_eq!(QualityTier::from_code(1), QualityTier::High);
        assert_eq!(QualityTier::from_code(2), QualityTier::Medium);
        assert_eq!(QualityTier::from_code(3), QualityTier::Low);
        assert_eq!(QualityTier::from_code(99), QualityTier::Low);
        assert_eq!(QualityTier::Medium.code(), 2);
    }

    #[test]
    fn test_batch_summary_counts() {
        let mut records = vec![verified("hypertension"); 4];
        records.push(EncounterRecord {
            quality: QualityTier::Medium,
            ..verified("diabetes")
        });
        records.push(EncounterRecord {
            is_verified: false,
            ..verified("diabetes")
        });

        let summary = BatchQuality::summarize(&records);
        assert_eq!(summary.total_rows, 6);
        assert_eq!(summary.usable_rows, 5);
        assert_eq!(summary.tier_counts, (4, 1));
        assert_eq!(
            summary.category_counts[&DiseaseCategory::Hypertension],
            4
        );
        assert_eq!(summary.covered_categories(4), 1);
        assert_eq!(summary.covered_categories(1), 2);
    }
}
