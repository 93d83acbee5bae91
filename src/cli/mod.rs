//! Command-line interface for the training pipeline.
//!
//! Two subcommands: `train` runs the full pipeline on an encounter batch,
//! `check` inspects a batch without training so operators can see whether
//! it clears the size and coverage floors first.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::config::{GridProfile, PipelineConfig};
use crate::data::{BatchQuality, CsvEncounterSource, DataSource};
use crate::persistence::JsonlRegistry;
use crate::pipeline::TrainingPipeline;
use crate::report::{self, dim, muted, ok, section};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "cliniq")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Clinical diagnosis model training pipeline")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train all model families on an encounter batch and register the winner
    Train {
        /// Encounter batch (CSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Directory model artifacts are written to
        #[arg(long, default_value = "./models")]
        artifacts_dir: PathBuf,

        /// Registry file; defaults to <artifacts-dir>/registry.jsonl
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Name the winning model is registered under
        #[arg(long, default_value = "medical_diagnosis_ai")]
        model_name: String,

        /// Seed shared by every stochastic component
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Fraction of rows held out for the test split
        #[arg(long, default_value = "0.2")]
        test_fraction: f64,

        /// Number of cross-validation folds
        #[arg(long, default_value = "5")]
        cv_folds: usize,

        /// Accuracy the winner is expected to clear
        #[arg(long, default_value = "0.85")]
        target_accuracy: f64,

        /// Use the reduced hyperparameter grids (smoke runs)
        #[arg(long)]
        quick: bool,
    },

    /// Inspect batch quality and category coverage without training
    Check {
        /// Encounter batch (CSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Per-category minimum used for the coverage verdict
        #[arg(long, default_value = "10")]
        min_samples_per_class: usize,

        /// Batch size floor used for the trainability verdict
        #[arg(long, default_value = "50")]
        min_training_samples: usize,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub fn cmd_train(
    data: &PathBuf,
    artifacts_dir: PathBuf,
    registry: Option<PathBuf>,
    model_name: String,
    seed: u64,
    test_fraction: f64,
    cv_folds: usize,
    target_accuracy: f64,
    quick: bool,
) -> anyhow::Result<()> {
    section("Train");

    let registry_path = registry.unwrap_or_else(|| artifacts_dir.join("registry.jsonl"));
    let profile = if quick { GridProfile::Quick } else { GridProfile::Full };

    println!("  {:<16} {}", muted("Batch"), data.display());
    println!("  {:<16} {}", muted("Artifacts"), artifacts_dir.display());
    println!("  {:<16} {}", muted("Registry"), registry_path.display());
    println!("  {:<16} {}", muted("Grids"), format!("{:?}", profile).to_lowercase());
    println!("  {:<16} {}", muted("Seed"), seed);
    println!();

    let config = PipelineConfig::new()
        .with_test_fraction(test_fraction)
        .with_cv_folds(cv_folds)
        .with_seed(seed)
        .with_target_accuracy(target_accuracy)
        .with_artifacts_dir(artifacts_dir)
        .with_model_name(model_name)
        .with_grid_profile(profile);

    let source = CsvEncounterSource::new(data);
    let sink = JsonlRegistry::new(registry_path);
    let pipeline = TrainingPipeline::new(config)?;

    step_run("Training all model families");
    let start = Instant::now();
    let outcome = pipeline.run(&source, &sink)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    report::print_report(&outcome);
    Ok(())
}

pub fn cmd_check(
    data: &PathBuf,
    min_samples_per_class: usize,
    min_training_samples: usize,
) -> anyhow::Result<()> {
    section("Batch check");

    step_run("Loading batch");
    let source = CsvEncounterSource::new(data);
    let records = source.fetch()?;
    step_done(&format!("{} usable rows", records.len()));

    let quality = BatchQuality::summarize(&records);
    let (high, medium) = quality.tier_counts;

    println!();
    println!("  {:<16} {}", muted("File"), data.display());
    println!("  {:<16} {}", muted("Usable rows"), quality.usable_rows);
    println!("  {:<16} {} high / {} medium", muted("Quality tiers"), high, medium);

    section("Category coverage");
    for (category, count) in &quality.category_counts {
        let marker = if *count >= min_samples_per_class {
            ok("✓")
        } else {
            "✗".red()
        };
        println!("  {} {:<22} {:>6}", marker, category.as_str(), count);
    }

    let covered = quality.covered_categories(min_samples_per_class);
    let enough_rows = quality.usable_rows >= min_training_samples;
    let enough_classes = covered >= 2;

    println!();
    if enough_rows && enough_classes {
        println!(
            "  {} {} rows, {} categories at or above the per-class minimum",
            ok("✓"),
            quality.usable_rows,
            covered
        );
    } else {
        if !enough_rows {
            println!(
                "  {} {} usable rows; training needs at least {}",
                "!".yellow(),
                quality.usable_rows,
                min_training_samples
            );
        }
        if !enough_classes {
            println!(
                "  {} only {} categories reach {} samples; training needs at least 2",
                "!".yellow(),
                covered,
                min_samples_per_class
            );
        }
    }

    println!();
    Ok(())
}
