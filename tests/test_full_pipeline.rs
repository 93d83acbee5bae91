//! Integration test: full training runs (fetch → featurize → train → register)

use cliniq::config::{GridProfile, PipelineConfig};
use cliniq::data::{CsvEncounterSource, EncounterRecord, VecSource};
use cliniq::error::CliniqError;
use cliniq::features::FEATURE_NAMES;
use cliniq::persistence::{JsonlRegistry, ModelArtifact, RegistryRecord, RegistrySink};
use cliniq::pipeline::TrainingPipeline;
use ndarray::Array2;
use std::path::Path;

// ============================================================================
// Synthetic encounter batches
// ============================================================================

fn base(diagnosis: &str) -> EncounterRecord {
    EncounterRecord {
        doctor_diagnosis: diagnosis.to_string(),
        ..Default::default()
    }
}

fn hypertension_case(i: usize) -> EncounterRecord {
    let drift = (i % 10) as f64;
    EncounterRecord {
        // Occasional gaps exercise median imputation on the production path.
        age: if i % 7 == 3 { None } else { Some(55.0 + drift) },
        gender: Some((i % 2) as i32),
        systolic_bp: Some(150.0 + drift),
        diastolic_bp: Some(94.0 + drift * 0.5),
        heart_rate: Some(74.0 + drift * 0.3),
        temperature: Some(36.5),
        blood_sugar: Some(5.1 + drift * 0.05),
        bmi: Some(26.0 + drift * 0.2),
        symptom_keywords: Some("headache and dizziness".to_string()),
        symptom_severity: Some(6.0),
        has_hypertension: Some(true),
        smoking_status: Some((i % 3) as i32),
        ..base("essential hypertension")
    }
}

fn diabetes_case(i: usize) -> EncounterRecord {
    let drift = (i % 10) as f64;
    EncounterRecord {
        age: Some(48.0 + drift),
        gender: Some(((i + 1) % 2) as i32),
        systolic_bp: Some(118.0 + drift * 0.5),
        diastolic_bp: Some(76.0),
        heart_rate: Some(70.0 + drift * 0.2),
        temperature: Some(36.6),
        blood_sugar: Some(10.5 + drift * 0.2),
        bmi: if i % 5 == 2 { None } else { Some(24.3 + drift * 0.3) },
        symptom_severity: Some(4.0),
        has_diabetes: Some(true),
        ..base("type 2 diabetes")
    }
}

fn digestive_case(i: usize) -> EncounterRecord {
    let drift = (i % 10) as f64;
    EncounterRecord {
        age: Some(33.0 + drift),
        gender: Some((i % 2) as i32),
        systolic_bp: Some(112.0 + drift * 0.4),
        diastolic_bp: Some(71.0),
        heart_rate: Some(82.0 + drift * 0.5),
        temperature: Some(37.5 + drift * 0.05),
        blood_sugar: Some(4.9),
        bmi: Some(22.0 + drift * 0.2),
        symptom_keywords: Some("abdominal pain and nausea".to_string()),
        symptom_severity: Some(5.0),
        ..base("acute gastritis")
    }
}

fn balanced_batch(per_class: usize) -> Vec<EncounterRecord> {
    let mut records = Vec::with_capacity(per_class * 3);
    for i in 0..per_class {
        records.push(hypertension_case(i));
        records.push(diabetes_case(i));
        records.push(digestive_case(i));
    }
    records
}

fn quick_config(dir: &Path) -> PipelineConfig {
    PipelineConfig::default()
        .with_grid_profile(GridProfile::Quick)
        .with_cv_folds(3)
        .with_artifacts_dir(dir)
}

// ============================================================================
// End-to-end run
// ============================================================================

#[test]
fn test_healthy_batch_trains_and_registers() {
    let dir = tempfile::tempdir().unwrap();
    let registry = JsonlRegistry::new(dir.path().join("registry.jsonl"));
    let source = VecSource::new(balanced_batch(20));

    let pipeline = TrainingPipeline::new(quick_config(dir.path())).unwrap();
    let report = pipeline.run(&source, &registry).unwrap();

    // All three families trained, in the fixed evaluation order.
    let families: Vec<String> = report
        .results
        .iter()
        .map(|r| r.outcome.model.family().to_string())
        .collect();
    assert_eq!(
        families,
        vec!["logistic_regression", "random_forest", "gradient_boosting"]
    );
    for result in &report.results {
        assert!((0.0..=1.0).contains(&result.metrics.accuracy));
        assert!((0.0..=1.0).contains(&result.metrics.f1));
        assert!(result.outcome.cv_accuracy > 0.0);
    }

    // The winner is the family the report points at.
    let winner = report.winner();
    assert_eq!(winner.outcome.model.family().as_str(), report.model_type);

    // One artifact file on disk, one registry row describing it.
    assert!(report.artifact_path.exists());
    assert!(report.registry_recorded);
    let rows = registry.records().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].model_name, "medical_diagnosis_ai");
    assert_eq!(rows[0].model_type, report.model_type);
    assert_eq!(rows[0].accuracy, winner.metrics.accuracy);
    assert_eq!(rows[0].version, report.version);

    // Version stamp: "v" + YYYYMMDD + "_" + HHMMSS.
    assert_eq!(report.version.len(), 16);
    assert!(report.version.starts_with('v'));
    assert_eq!(report.version.as_bytes()[9], b'_');

    // Batch accounting.
    assert_eq!(report.class_counts.len(), 3);
    assert!(report.dropped_classes.is_empty());
    assert_eq!(report.n_train + report.n_test, 60);
    assert_eq!(report.n_test, 12);
}

#[test]
fn test_saved_artifact_predicts_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let registry = JsonlRegistry::new(dir.path().join("registry.jsonl"));
    let source = VecSource::new(balanced_batch(20));

    let pipeline = TrainingPipeline::new(quick_config(dir.path())).unwrap();
    let report = pipeline.run(&source, &registry).unwrap();

    let artifact = ModelArtifact::load(&report.artifact_path).unwrap();
    assert_eq!(artifact.feature_names, FEATURE_NAMES.to_vec());
    assert_eq!(artifact.model_type, report.model_type);

    // An archetypal hypertension row, in FEATURE_NAMES order.
    let raw = Array2::from_shape_vec(
        (1, 22),
        vec![
            62.0, 1.0, 152.0, 95.0, 76.0, 36.5, 5.2, 26.4, 6.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0,
            0.0, 0.0, 0.0, 0.0, 57.0, 114.0, 3.0,
        ],
    )
    .unwrap();
    let scaled = artifact.scaler.transform(&raw).unwrap();
    let pred = artifact.model.predict(&scaled).unwrap();
    let labels = artifact.label_encoder.inverse_transform(&pred).unwrap();
    assert_eq!(labels, vec!["hypertension".to_string()]);
}

#[test]
fn test_same_seed_same_winner() {
    let batch = balanced_batch(20);

    let run = |seed: u64| {
        let dir = tempfile::tempdir().unwrap();
        let registry = JsonlRegistry::new(dir.path().join("registry.jsonl"));
        let source = VecSource::new(batch.clone());
        let pipeline = TrainingPipeline::new(quick_config(dir.path()).with_seed(seed)).unwrap();
        let report = pipeline.run(&source, &registry).unwrap();
        (
            report.model_type.clone(),
            report.winner().outcome.cv_accuracy,
            report.winner().metrics.accuracy,
        )
    };

    let first = run(42);
    let second = run(42);
    assert_eq!(first, second);
}

// ============================================================================
// Registry failure stays non-fatal
// ============================================================================

struct FailingSink;

impl RegistrySink for FailingSink {
    fn record(&self, _record: &RegistryRecord) -> cliniq::Result<()> {
        Err(CliniqError::RegistryWrite("sink closed".to_string()))
    }
}

#[test]
fn test_registry_failure_keeps_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let source = VecSource::new(balanced_batch(20));

    let pipeline = TrainingPipeline::new(quick_config(dir.path())).unwrap();
    let report = pipeline.run(&source, &FailingSink).unwrap();

    assert!(!report.registry_recorded);
    assert!(report.artifact_path.exists());
    assert!(ModelArtifact::load(&report.artifact_path).is_ok());
}

// ============================================================================
// CSV export as the batch source
// ============================================================================

fn csv_batch() -> String {
    let mut out = String::from(
        "age,systolic_bp,diastolic_bp,heart_rate,temperature,blood_sugar,bmi,\
         symptom_keywords,symptom_severity,has_hypertension,has_diabetes,\
         doctor_diagnosis,is_verified,data_quality",
    );
    for i in 0..20 {
        let d = (i % 10) as f64;
        out.push_str(&format!(
            "\n{},{},{},74,36.5,5.2,26.1,headache and dizziness,6,1,0,essential hypertension,1,1",
            55.0 + d,
            150.0 + d,
            94.0 + d * 0.5,
        ));
        out.push_str(&format!(
            "\n{},118,76,70,36.6,{},24.3,,4,0,1,type 2 diabetes,1,1",
            48.0 + d,
            10.5 + d * 0.2,
        ));
        out.push_str(&format!(
            "\n{},112,71,82,{},4.9,22.0,abdominal pain and nausea,5,0,0,acute gastritis,1,2",
            33.0 + d,
            37.5 + d * 0.05,
        ));
    }
    out
}

#[test]
fn test_csv_export_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("encounters.csv");
    std::fs::write(&csv_path, csv_batch()).unwrap();

    let source = CsvEncounterSource::new(&csv_path);
    let registry = JsonlRegistry::new(dir.path().join("registry.jsonl"));
    let pipeline = TrainingPipeline::new(quick_config(dir.path())).unwrap();

    let report = pipeline.run(&source, &registry).unwrap();
    assert_eq!(report.results.len(), 3);
    assert_eq!(report.class_counts.len(), 3);
    assert!(report.artifact_path.exists());
    assert_eq!(registry.records().unwrap().len(), 1);
}
