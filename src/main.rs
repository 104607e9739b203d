//! energy-ids - Main Entry Point
//!
//! Trains per-device anomaly models and labels single readings.

use clap::Parser;
use energy_ids::cli::{cmd_models, cmd_predict, cmd_train, Cli, Commands, TrainOverrides};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries reports and JSON responses
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "energy_ids=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            data,
            sqlite,
            models,
            config,
            contamination,
            estimators,
            test_size,
            seed,
        } => {
            let overrides = TrainOverrides {
                contamination,
                estimators,
                test_size,
                seed,
            };
            cmd_train(
                data.as_deref(),
                sqlite.as_deref(),
                &models,
                config.as_deref(),
                &overrides,
            )?;
        }
        Commands::Predict { models } => {
            let code = cmd_predict(&models)?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Models { models } => {
            cmd_models(&models)?;
        }
    }

    Ok(())
}
