//! Feature engineering
//!
//! Turns a batch of encounter records into the fixed-order numeric matrix the
//! trainers consume: per-batch median imputation for numeric vitals, binary
//! symptom indicators from the free-text keywords, two derived pressure
//! features, an ordinal age bucket, and the disease-category label per row.
//!
//! The column order in [`FEATURE_NAMES`] is the authoritative contract for
//! any downstream artifact reuse; inference-time vectors must match it.

mod encoder;
mod scaler;

pub use encoder::LabelEncoder;
pub use scaler::StandardScaler;

use crate::data::EncounterRecord;
use crate::error::{CliniqError, Result};
use crate::taxonomy::DiseaseCategory;
use ndarray::Array2;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Column order of the feature matrix
pub const FEATURE_NAMES: [&str; 22] = [
    "age",
    "gender",
    "systolic_bp",
    "diastolic_bp",
    "heart_rate",
    "temperature",
    "blood_sugar",
    "bmi",
    "symptom_severity",
    "has_hypertension",
    "has_diabetes",
    "has_heart_disease",
    "smoking_status",
    "drinking_status",
    "has_headache",
    "has_fever",
    "has_chest_pain",
    "has_cough",
    "has_abdominal_pain",
    "pulse_pressure",
    "mean_arterial_pressure",
    "age_group",
];

/// Symptom indicator columns and the terms that raise them. Matching is
/// case-sensitive substring search, OR across the terms of one indicator.
const SYMPTOM_INDICATORS: [(&str, &[&str]); 5] = [
    ("has_headache", &["headache", "dizziness"]),
    ("has_fever", &["fever"]),
    ("has_chest_pain", &["chest pain", "chest tightness"]),
    ("has_cough", &["cough"]),
    ("has_abdominal_pain", &["abdominal pain"]),
];

/// Default severity when the whole column is missing from a batch
const SEVERITY_FALLBACK: f64 = 5.0;

/// Output of one feature-building pass
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// Row-per-record feature matrix, columns ordered as [`FEATURE_NAMES`]
    pub x: Array2<f64>,
    /// Disease category per kept row
    pub labels: Vec<DiseaseCategory>,
    /// Copy of the column contract, recorded with the artifact
    pub feature_names: Vec<String>,
    /// Per-category row counts after the coverage filter
    pub class_counts: BTreeMap<DiseaseCategory, usize>,
    /// Categories removed by the coverage filter, with their row counts
    pub dropped_classes: Vec<(DiseaseCategory, usize)>,
}

/// Builds the feature matrix and labels from a batch of records
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    min_training_samples: usize,
    min_samples_per_class: usize,
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureBuilder {
    pub fn new() -> Self {
        Self {
            min_training_samples: 50,
            min_samples_per_class: 10,
        }
    }

    pub fn with_min_training_samples(mut self, n: usize) -> Self {
        self.min_training_samples = n;
        self
    }

    pub fn with_min_samples_per_class(mut self, n: usize) -> Self {
        self.min_samples_per_class = n;
        self
    }

    /// Build the matrix, labels, and column contract for one batch.
    ///
    /// Fails with [`CliniqError::InsufficientData`] when the raw usable batch
    /// is below the training floor; this is checked before the per-class
    /// coverage filter, so a small batch never reaches model fitting.
    pub fn build(&self, records: &[EncounterRecord]) -> Result<FeatureSet> {
        if records.len() < self.min_training_samples {
            return Err(CliniqError::InsufficientData {
                found: records.len(),
                required: self.min_training_samples,
            });
        }

        let medians = BatchMedians::compute(records);
        let categories: Vec<DiseaseCategory> = records.iter().map(|r| r.category()).collect();

        let mut raw_counts: BTreeMap<DiseaseCategory, usize> = BTreeMap::new();
        for category in &categories {
            *raw_counts.entry(*category).or_insert(0) += 1;
        }

        // Coverage filter: a category below the per-class minimum is removed
        // entirely, from training and evaluation alike. Never downsampled.
        let dropped_classes: Vec<(DiseaseCategory, usize)> = raw_counts
            .iter()
            .filter(|(_, &n)| n < self.min_samples_per_class)
            .map(|(&c, &n)| (c, n))
            .collect();
        for (category, n) in &dropped_classes {
            debug!(
                "dropping category '{category}': {n} rows below per-class minimum {}",
                self.min_samples_per_class
            );
        }

        let keep: Vec<usize> = (0..records.len())
            .filter(|&i| raw_counts[&categories[i]] >= self.min_samples_per_class)
            .collect();

        let mut x = Array2::zeros((keep.len(), FEATURE_NAMES.len()));
        let mut labels = Vec::with_capacity(keep.len());
        for (row, &i) in keep.iter().enumerate() {
            let features = featurize(&records[i], &medians);
            for (col, value) in features.iter().enumerate() {
                x[[row, col]] = *value;
            }
            labels.push(categories[i]);
        }

        let mut class_counts: BTreeMap<DiseaseCategory, usize> = BTreeMap::new();
        for label in &labels {
            *class_counts.entry(*label).or_insert(0) += 1;
        }

        info!(
            "feature batch: {} rows, {} categories ({} dropped by coverage)",
            labels.len(),
            class_counts.len(),
            dropped_classes.len()
        );
        for (category, n) in &class_counts {
            debug!("  {category}: {n}");
        }

        Ok(FeatureSet {
            x,
            labels,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            class_counts,
            dropped_classes,
        })
    }
}

/// Per-batch medians of the imputable numeric columns. Recomputed every run;
/// never stored constants.
#[derive(Debug, Clone, PartialEq)]
struct BatchMedians {
    age: f64,
    systolic_bp: f64,
    diastolic_bp: f64,
    heart_rate: f64,
    temperature: f64,
    blood_sugar: f64,
    bmi: f64,
    symptom_severity: f64,
}

impl BatchMedians {
    fn compute(records: &[EncounterRecord]) -> Self {
        Self {
            age: column_median(records, |r| r.age, 0.0),
            systolic_bp: column_median(records, |r| r.systolic_bp, 0.0),
            diastolic_bp: column_median(records, |r| r.diastolic_bp, 0.0),
            heart_rate: column_median(records, |r| r.heart_rate, 0.0),
            temperature: column_median(records, |r| r.temperature, 0.0),
            blood_sugar: column_median(records, |r| r.blood_sugar, 0.0),
            bmi: column_median(records, |r| r.bmi, 0.0),
            symptom_severity: column_median(records, |r| r.symptom_severity, SEVERITY_FALLBACK),
        }
    }
}

/// Median of the known values in one column; `default` when the whole column
/// is missing. Even counts take the mean of the two middle values.
fn column_median<F>(records: &[EncounterRecord], get: F, default: f64) -> f64
where
    F: Fn(&EncounterRecord) -> Option<f64>,
{
    let mut values: Vec<f64> = records.iter().filter_map(get).collect();
    if values.is_empty() {
        return default;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();
    if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    }
}

fn symptom_flags(text: Option<&str>) -> [f64; 5] {
    let mut flags = [0.0; 5];
    if let Some(text) = text {
        for (slot, (_, terms)) in SYMPTOM_INDICATORS.iter().enumerate() {
            if terms.iter().any(|term| text.contains(term)) {
                flags[slot] = 1.0;
            }
        }
    }
    flags
}

fn age_bucket(age: f64) -> f64 {
    if age <= 18.0 {
        0.0
    } else if age <= 40.0 {
        1.0
    } else if age <= 60.0 {
        2.0
    } else {
        3.0
    }
}

/// One record to one fixed-order feature row
fn featurize(record: &EncounterRecord, medians: &BatchMedians) -> [f64; 22] {
    let age = record.age.unwrap_or(medians.age);
    let systolic = record.systolic_bp.unwrap_or(medians.systolic_bp);
    let diastolic = record.diastolic_bp.unwrap_or(medians.diastolic_bp);
    let flags = symptom_flags(record.symptom_keywords.as_deref());

    [
        age,
        record.gender.unwrap_or(0) as f64,
        systolic,
        diastolic,
        record.heart_rate.unwrap_or(medians.heart_rate),
        record.temperature.unwrap_or(medians.temperature),
        record.blood_sugar.unwrap_or(medians.blood_sugar),
        record.bmi.unwrap_or(medians.bmi),
        // Severity is an integer score; an interpolated median is truncated
        // back to one.
        record
            .symptom_severity
            .unwrap_or(medians.symptom_severity)
            .trunc(),
        record.has_hypertension.unwrap_or(false) as u8 as f64,
        record.has_diabetes.unwrap_or(false) as u8 as f64,
        record.has_heart_disease.unwrap_or(false) as u8 as f64,
        record.smoking_status.unwrap_or(0) as f64,
        record.drinking_status.unwrap_or(0) as f64,
        flags[0],
        flags[1],
        flags[2],
        flags[3],
        flags[4],
        systolic - diastolic,
        (systolic + 2.0 * diastolic) / 3.0,
        age_bucket(age),
    ]
}
