//! CSV-backed encounter source
//!
//! Thin edge over files produced by the upstream export job. Column layout
//! follows the export: one row per encounter, vitals and flags by name,
//! `is_verified` / `data_quality` bookkeeping columns optional (exports that
//! already applied the eligibility filter omit them).

use super::{BatchQuality, DataSource, EncounterRecord, QualityTier};
use crate::error::{CliniqError, Result};
use polars::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Reads one training batch from a CSV export
#[derive(Debug, Clone)]
pub struct CsvEncounterSource {
    path: PathBuf,
}

impl CsvEncounterSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_frame(&self) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .with_infer_schema_length(Some(1000))
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(self.path.clone()))?
            .finish()?;
        Ok(df)
    }
}

/// Numeric column by name, cast to f64; `None` when the column is absent.
fn numeric(df: &DataFrame, name: &str) -> Result<Option<Float64Chunked>> {
    match df.column(name) {
        Ok(series) => Ok(Some(series.cast(&DataType::Float64)?.f64()?.clone())),
        Err(_) => Ok(None),
    }
}

/// Text column by name; `None` when the column is absent.
fn text(df: &DataFrame, name: &str) -> Result<Option<StringChunked>> {
    match df.column(name) {
        Ok(series) => Ok(Some(series.cast(&DataType::String)?.str()?.clone())),
        Err(_) => Ok(None),
    }
}

fn value_at(col: &Option<Float64Chunked>, idx: usize) -> Option<f64> {
    col.as_ref().and_then(|ca| ca.get(idx))
}

fn flag_at(col: &Option<Float64Chunked>, idx: usize) -> Option<bool> {
    value_at(col, idx).map(|v| v != 0.0)
}

fn code_at(col: &Option<Float64Chunked>, idx: usize) -> Option<i32> {
    value_at(col, idx).map(|v| v as i32)
}

impl DataSource for CsvEncounterSource {
    fn name(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    fn fetch(&self) -> Result<Vec<EncounterRecord>> {
        let df = self.read_frame()?;
        let height = df.height();

        let age = numeric(&df, "age")?;
        let gender = numeric(&df, "gender")?;
        let systolic_bp = numeric(&df, "systolic_bp")?;
        let diastolic_bp = numeric(&df, "diastolic_bp")?;
        let heart_rate = numeric(&df, "heart_rate")?;
        let temperature = numeric(&df, "temperature")?;
        let blood_sugar = numeric(&df, "blood_sugar")?;
        let bmi = numeric(&df, "bmi")?;
        let symptom_severity = numeric(&df, "symptom_severity")?;
        let has_hypertension = numeric(&df, "has_hypertension")?;
        let has_diabetes = numeric(&df, "has_diabetes")?;
        let has_heart_disease = numeric(&df, "has_heart_disease")?;
        let smoking_status = numeric(&df, "smoking_status")?;
        let drinking_status = numeric(&df, "drinking_status")?;
        let is_verified = numeric(&df, "is_verified")?;
        let data_quality = numeric(&df, "data_quality")?;

        let symptom_keywords = text(&df, "symptom_keywords")?;
        let diagnosis_icd10 = text(&df, "diagnosis_icd10")?;
        let doctor_diagnosis = text(&df, "doctor_diagnosis")?.ok_or_else(|| {
            CliniqError::DataUnavailable(format!(
                "column 'doctor_diagnosis' missing from {}",
                self.path.display()
            ))
        })?;

        let mut records = Vec::with_capacity(height);
        for i in 0..height {
            records.push(EncounterRecord {
                age: value_at(&age, i),
                gender: code_at(&gender, i),
                systolic_bp: value_at(&systolic_bp, i),
                diastolic_bp: value_at(&diastolic_bp, i),
                heart_rate: value_at(&heart_rate, i),
                temperature: value_at(&temperature, i),
                blood_sugar: value_at(&blood_sugar, i),
                bmi: value_at(&bmi, i),
                symptom_keywords: symptom_keywords
                    .as_ref()
                    .and_then(|ca| ca.get(i))
                    .map(str::to_string),
                symptom_severity: value_at(&symptom_severity, i),
                has_hypertension: flag_at(&has_hypertension, i),
                has_diabetes: flag_at(&has_diabetes, i),
                has_heart_disease: flag_at(&has_heart_disease, i),
                smoking_status: code_at(&smoking_status, i),
                drinking_status: code_at(&drinking_status, i),
                doctor_diagnosis: doctor_diagnosis.get(i).unwrap_or("").to_string(),
                diagnosis_icd10: diagnosis_icd10
                    .as_ref()
                    .and_then(|ca| ca.get(i))
                    .map(str::to_string),
                // Bookkeeping columns are optional: an export that already
                // applied the eligibility filter omits them.
                is_verified: flag_at(&is_verified, i).unwrap_or(is_verified.is_none()),
                quality: value_at(&data_quality, i)
                    .map(|v| QualityTier::from_code(v as i64))
                    .unwrap_or(if data_quality.is_none() {
                        QualityTier::High
                    } else {
                        QualityTier::Low
                    }),
            });
        }

        let summary = BatchQuality::summarize(&records);
        info!(
            "loaded {} rows from {} ({} usable)",
            summary.total_rows,
            self.path.display(),
            summary.usable_rows
        );
        debug!(
            "quality tiers: high={} medium={}",
            summary.tier_counts.0, summary.tier_counts.1
        );

        records.retain(EncounterRecord::is_trainable);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "age,gender,systolic_bp,diastolic_bp,heart_rate,temperature,blood_sugar,bmi,symptom_keywords,symptom_severity,has_hypertension,has_diabetes,has_heart_disease,smoking_status,drinking_status,doctor_diagnosis,diagnosis_icd10,is_verified,data_quality";

    fn write_csv(rows: &[&str]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encounters.csv");
        let mut contents = String::from(HEADER);
        for row in rows {
            contents.push('\n');
            contents.push_str(row);
        }
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_reads_typed_records() {
        let (_dir, path) = write_csv(&[
            "34,1,128,82,72,36.8,5.4,22.1,headache and dizziness,4,0,0,0,1,0,hypertension,I10,1,1",
            "61,0,110,70,68,37.2,6.1,27.4,persistent cough,6,0,1,0,0,1,diabetes,E11,1,2",
        ]);
        let source = CsvEncounterSource::new(&path);
        let records = source.fetch().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].age, Some(34.0));
        assert_eq!(records[0].gender, Some(1));
        assert_eq!(records[0].has_diabetes, Some(false));
        assert_eq!(
            records[0].symptom_keywords.as_deref(),
            Some("headache and dizziness")
        );
        assert_eq!(records[1].quality, QualityTier::Medium);
        assert_eq!(records[1].diagnosis_icd10.as_deref(), Some("E11"));
    }

    #[test]
    fn test_missing_values_stay_missing() {
        let (_dir, path) = write_csv(&[
            "34,1,128,82,72,36.8,5.4,22.1,headache,4,0,0,0,1,0,hypertension,I10,1,1",
            ",1,,82,72,,5.4,,fever,,0,0,0,1,0,infection,,1,1",
        ]);
        let source = CsvEncounterSource::new(&path);
        let records = source.fetch().unwrap();

        assert_eq!(records[1].age, None);
        assert_eq!(records[1].systolic_bp, None);
        assert_eq!(records[1].temperature, None);
        assert_eq!(records[1].symptom_severity, None);
        assert_eq!(records[1].diagnosis_icd10, None);
    }

    #[test]
    fn test_eligibility_applied() {
        let (_dir, path) = write_csv(&[
            "34,1,128,82,72,36.8,5.4,22.1,headache,4,0,0,0,1,0,hypertension,I10,1,1",
            "40,1,120,80,70,36.5,5.0,23.0,cough,3,0,0,0,0,0,bronchitis,J20,0,1",
            "52,0,135,88,75,36.9,5.8,26.0,chest pain,7,1,0,0,1,1,arrhythmia,I49,1,3",
        ]);
        let source = CsvEncounterSource::new(&path);
        let records = source.fetch().unwrap();

        // Unverified and low-quality rows never reach the pipeline.
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].doctor_diagnosis, "hypertension");
    }

    #[test]
    fn test_missing_file_is_data_unavailable() {
        let source = CsvEncounterSource::new("/nonexistent/batch.csv");
        let err = source.fetch().unwrap_err();
        assert!(matches!(err, CliniqError::DataUnavailable(_)));
    }
}
