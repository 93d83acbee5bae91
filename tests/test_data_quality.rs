//! Integration test: batch guardrails (size floor, class coverage, stratification)

use cliniq::config::{GridProfile, PipelineConfig};
use cliniq::data::{EncounterRecord, VecSource};
use cliniq::error::CliniqError;
use cliniq::persistence::JsonlRegistry;
use cliniq::pipeline::TrainingPipeline;
use cliniq::taxonomy::DiseaseCategory;
use std::path::Path;

// ============================================================================
// Batch builders
// ============================================================================

fn case(diagnosis: &str, i: usize) -> EncounterRecord {
    let drift = (i % 10) as f64;
    let (systolic, sugar, temp, keywords) = match DiseaseCategory::from_diagnosis(diagnosis) {
        DiseaseCategory::Hypertension => (152.0 + drift, 5.2, 36.5, "headache and dizziness"),
        DiseaseCategory::Diabetes => (119.0, 10.8 + drift * 0.2, 36.6, "fatigue"),
        DiseaseCategory::Digestive => (113.0, 4.9, 37.5, "abdominal pain and nausea"),
        _ => (121.0 + drift, 5.4, 36.8, "headache"),
    };
    EncounterRecord {
        age: Some(40.0 + drift),
        gender: Some((i % 2) as i32),
        systolic_bp: Some(systolic),
        diastolic_bp: Some(systolic - 45.0),
        heart_rate: Some(72.0 + drift * 0.4),
        temperature: Some(temp),
        blood_sugar: Some(sugar),
        bmi: Some(23.0 + drift * 0.3),
        symptom_keywords: Some(keywords.to_string()),
        symptom_severity: Some(4.0 + (i % 4) as f64),
        doctor_diagnosis: diagnosis.to_string(),
        ..Default::default()
    }
}

fn batch_of(spec: &[(&str, usize)]) -> Vec<EncounterRecord> {
    let mut records = Vec::new();
    for &(diagnosis, n) in spec {
        for i in 0..n {
            records.push(case(diagnosis, i));
        }
    }
    records
}

fn quick_config(dir: &Path) -> PipelineConfig {
    PipelineConfig::default()
        .with_grid_profile(GridProfile::Quick)
        .with_cv_folds(3)
        .with_artifacts_dir(dir)
}

fn run_on(
    dir: &Path,
    config: PipelineConfig,
    records: Vec<EncounterRecord>,
) -> cliniq::Result<cliniq::pipeline::TrainingReport> {
    let registry = JsonlRegistry::new(dir.join("registry.jsonl"));
    let source = VecSource::new(records);
    TrainingPipeline::new(config)?.run(&source, &registry)
}

// ============================================================================
// Size floor
// ============================================================================

#[test]
fn test_small_batch_fails_before_any_fit() {
    let dir = tempfile::tempdir().unwrap();
    let records = batch_of(&[
        ("essential hypertension", 10),
        ("type 2 diabetes", 10),
        ("acute gastritis", 10),
    ]);

    let err = run_on(dir.path(), quick_config(dir.path()), records).unwrap_err();
    assert!(matches!(
        err,
        CliniqError::InsufficientData {
            found: 30,
            required: 50
        }
    ));

    // Nothing was persisted: no artifact, no registry file.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_lowered_floor_admits_small_batch() {
    let dir = tempfile::tempdir().unwrap();
    let records = batch_of(&[
        ("essential hypertension", 10),
        ("type 2 diabetes", 10),
        ("acute gastritis", 10),
    ]);

    let config = quick_config(dir.path()).with_min_training_samples(20);
    let report = run_on(dir.path(), config, records).unwrap();
    assert_eq!(report.class_counts.len(), 3);
    assert!(report.artifact_path.exists());
}

// ============================================================================
// Class coverage
// ============================================================================

#[test]
fn test_under_covered_class_dropped_entirely() {
    let dir = tempfile::tempdir().unwrap();
    let records = batch_of(&[
        ("essential hypertension", 20),
        ("type 2 diabetes", 20),
        ("acute gastritis", 20),
        ("migraine with aura", 3),
    ]);

    let report = run_on(dir.path(), quick_config(dir.path()), records).unwrap();

    assert_eq!(
        report.dropped_classes,
        vec![(DiseaseCategory::Neurological, 3)]
    );
    assert_eq!(report.class_counts.len(), 3);
    assert!(!report.class_counts.contains_key(&DiseaseCategory::Neurological));
    // Dropped rows are gone from train and test alike.
    assert_eq!(report.n_train + report.n_test, 60);
}

#[test]
fn test_single_surviving_class_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let records = batch_of(&[("essential hypertension", 60)]);

    let err = run_on(dir.path(), quick_config(dir.path()), records).unwrap_err();
    match err {
        CliniqError::TrainingError(msg) => {
            assert!(msg.contains("two disease categories"), "{msg}");
        }
        other => panic!("expected TrainingError, got {other:?}"),
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_ineligible_rows_never_counted() {
    let dir = tempfile::tempdir().unwrap();
    let mut records = batch_of(&[
        ("essential hypertension", 25),
        ("type 2 diabetes", 25),
    ]);
    // 30 unverified digestive rows; the source must drop every one.
    for i in 0..30 {
        records.push(EncounterRecord {
            is_verified: false,
            ..case("acute gastritis", i)
        });
    }

    let report = run_on(dir.path(), quick_config(dir.path()), records).unwrap();
    assert_eq!(report.class_counts.len(), 2);
    assert!(!report.class_counts.contains_key(&DiseaseCategory::Digestive));
    assert_eq!(report.n_train + report.n_test, 50);
}

// ============================================================================
// Stratification guard
// ============================================================================

#[test]
fn test_per_class_minimum_below_two_rejected() {
    // A per-class minimum of 1 would let a singleton class reach the split,
    // where it cannot appear in both partitions.
    let config = PipelineConfig::default().with_min_samples_per_class(1);
    let err = TrainingPipeline::new(config).unwrap_err();
    match err {
        CliniqError::InvalidParameter { name, .. } => {
            assert_eq!(name, "min_samples_per_class");
        }
        other => panic!("expected InvalidParameter, got {other:?}"),
    }
}
