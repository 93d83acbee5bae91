//! Console rendering of a finished training run.

use crate::pipeline::TrainingReport;
use colored::*;

pub(crate) fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}

pub(crate) fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}

pub(crate) fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

pub(crate) fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

/// Print the full run summary: class coverage, the family comparison table,
/// the winner, its strongest features and the accuracy target check.
pub fn print_report(report: &TrainingReport) {
    section("Class distribution");
    for (category, count) in &report.class_counts {
        println!("  {:<20} {:>6}", muted(category.as_str()), count);
    }
    if !report.dropped_classes.is_empty() {
        let dropped: Vec<String> = report
            .dropped_classes
            .iter()
            .map(|(category, count)| format!("{} ({})", category.as_str(), count))
            .collect();
        println!("  {}", dim(&format!("dropped: {}", dropped.join(", "))));
    }
    println!(
        "  {}",
        dim(&format!(
            "{} training rows, {} held out",
            report.n_train, report.n_test
        ))
    );

    section("Model comparison");
    println!(
        "  {:<2}{:<22} {:>10} {:>10} {:>10} {:>10}",
        "",
        muted("Model"),
        muted("Accuracy"),
        muted("F1"),
        muted("AUC"),
        muted("CV acc")
    );
    println!("  {}", dim(&"─".repeat(68)));
    for (i, result) in report.results.iter().enumerate() {
        let name = result.outcome.model.family().as_str();
        let row = format!(
            "{:<22} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
            name,
            result.metrics.accuracy,
            result.metrics.f1,
            result.metrics.auc,
            result.outcome.cv_accuracy
        );
        if i == report.winner_index {
            println!("  {} {}", ok("▸"), row.white().bold());
        } else {
            println!("    {row}");
        }
    }

    let winner = report.winner();
    section("Winner");
    println!(
        "  {} {} {}",
        ok("✓"),
        report.model_type.white().bold(),
        dim(&format!("version {}", report.version))
    );
    println!(
        "  {:<12} {}",
        muted("Accuracy"),
        format!("{:.4}", winner.metrics.accuracy).white().bold()
    );
    println!(
        "  {:<12} {}",
        muted("Artifact"),
        report.artifact_path.display()
    );
    if report.registry_recorded {
        println!("  {:<12} {}", muted("Registry"), "recorded".white());
    } else {
        println!(
            "  {:<12} {}",
            muted("Registry"),
            "write failed, artifact still valid".yellow()
        );
    }

    if !report.top_features.is_empty() {
        section("Top features");
        for (name, weight) in &report.top_features {
            println!("  {:<24} {:>8.4}", name, weight);
        }
    }

    println!();
    if report.target_cleared {
        println!(
            "  {} accuracy {:.4} clears the {:.2} target",
            ok("✓"),
            winner.metrics.accuracy,
            report.target_accuracy
        );
    } else {
        println!(
            "  {} accuracy {:.4} is below the {:.2} target",
            "!".yellow(),
            winner.metrics.accuracy,
            report.target_accuracy
        );
        println!("  {}", muted("consider:"));
        println!("    {} collect more verified encounters", dim("-"));
        println!("    {} engineer more informative features", dim("-"));
        println!("    {} widen the hyperparameter grids", dim("-"));
    }
    println!();
}
