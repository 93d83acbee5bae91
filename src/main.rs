//! Cliniq - Main Entry Point
//!
//! Trains and registers clinical diagnosis models from encounter batches.

use clap::Parser;
use cliniq::cli::{cmd_check, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cliniq=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            data,
            artifacts_dir,
            registry,
            model_name,
            seed,
            test_fraction,
            cv_folds,
            target_accuracy,
            quick,
        } => {
            cmd_train(
                &data,
                artifacts_dir,
                registry,
                model_name,
                seed,
                test_fraction,
                cv_folds,
                target_accuracy,
                quick,
            )?;
        }
        Commands::Check {
            data,
            min_samples_per_class,
            min_training_samples,
        } => {
            cmd_check(&data, min_samples_per_class, min_training_samples)?;
        }
    }

    Ok(())
}
