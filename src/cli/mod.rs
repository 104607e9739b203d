//! energy-ids CLI Module
//!
//! Command-line interface for training per-device models, single-reading
//! prediction and listing stored models.

use clap::{ArgGroup, Parser, Subcommand};
use colored::*;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::data::{CsvReadingSource, ReadingSource, SqliteReadingSource};
use crate::error::IdsError;
use crate::inference::{ErrorResponse, InferenceEngine};
use crate::pipeline::{DeviceOutcome, TrainingPipeline, TrainingReport};
use crate::store::{parse_artifact_key, FileModelStore, ModelKind, ModelStore};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
    let _ = io::stdout().flush();
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "energy-ids")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Per-device anomaly detection for electricity telemetry")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a novelty detector and a classifier for every known device
    #[command(group(ArgGroup::new("source").required(true).args(["data", "sqlite"])))]
    Train {
        /// Readings as CSV (electricity_monitor columns)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Readings from a SQLite database with an electricity_monitor table
        #[arg(long)]
        sqlite: Option<PathBuf>,

        /// Model directory
        #[arg(short, long, default_value = "models", env = "ENERGY_IDS_MODELS")]
        models: PathBuf,

        /// JSON pipeline config
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Expected anomaly fraction per device
        #[arg(long)]
        contamination: Option<f64>,

        /// Trees per classifier
        #[arg(long)]
        estimators: Option<usize>,

        /// Held-out fraction
        #[arg(long)]
        test_size: Option<f64>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Label one reading: JSON request on stdin, JSON response on stdout
    Predict {
        /// Model directory
        #[arg(short, long, default_value = "models", env = "ENERGY_IDS_MODELS")]
        models: PathBuf,
    },

    /// List devices with stored models
    Models {
        /// Model directory
        #[arg(short, long, default_value = "models", env = "ENERGY_IDS_MODELS")]
        models: PathBuf,
    },
}

/// Flag overrides applied on top of the config file
#[derive(Debug, Clone, Default)]
pub struct TrainOverrides {
    pub contamination: Option<f64>,
    pub estimators: Option<usize>,
    pub test_size: Option<f64>,
    pub seed: Option<u64>,
}

impl TrainOverrides {
    fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(c) = self.contamination {
            config = config.with_contamination(c);
        }
        if let Some(n) = self.estimators {
            config = config.with_classifier_estimators(n);
        }
        if let Some(t) = self.test_size {
            config = config.with_test_size(t);
        }
        if let Some(s) = self.seed {
            config = config.with_seed(s);
        }
        config
    }
}

/// Process exit code for an inference failure
pub fn exit_code(err: &IdsError) -> i32 {
    match err {
        IdsError::ValidationError(_) => 2,
        IdsError::ArtifactNotFound { .. } => 3,
        _ => 1,
    }
}

fn open_source(data: Option<&Path>, sqlite: Option<&Path>) -> anyhow::Result<Box<dyn ReadingSource>> {
    match (data, sqlite) {
        (Some(csv), None) => Ok(Box::new(CsvReadingSource::open(csv)?)),
        (None, Some(db)) => Ok(Box::new(SqliteReadingSource::open(db)?)),
        _ => anyhow::bail!("Exactly one of --data or --sqlite is required"),
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    data: Option<&Path>,
    sqlite: Option<&Path>,
    models: &Path,
    config_path: Option<&Path>,
    overrides: &TrainOverrides,
) -> anyhow::Result<()> {
    section("Train");

    let config = match config_path {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    let pipeline = TrainingPipeline::new(overrides.apply(config))?;

    let source = open_source(data, sqlite)?;
    let store = FileModelStore::open(models)?;

    step_run("Training per-device models");
    let start = Instant::now();
    let report = pipeline.run(source, &store)?;
    step_done(&format!("{:?}", start.elapsed()));

    print_report(&report);

    println!();
    println!("  {:<16} {}", muted("Readings"), report.n_readings.to_string().white());
    println!("  {:<16} {}", muted("Trained"), report.n_trained().to_string().white().bold());
    println!("  {:<16} {}", muted("Skipped"), report.n_skipped().to_string().white());
    if report.n_failed() > 0 {
        println!("  {:<16} {}", muted("Failed"), report.n_failed().to_string().red().bold());
    }
    println!("  {:<16} {}", muted("Models"), store.root().display());
    println!();

    Ok(())
}

fn print_report(report: &TrainingReport) {
    for outcome in &report.outcomes {
        println!();
        match outcome {
            DeviceOutcome::Trained {
                device_id,
                importances,
                n_train,
                train_anomaly_rate,
                holdout_agreement,
                ..
            } => {
                println!("Feature importances for device {}:", device_id);
                for (feature, importance) in importances {
                    println!("{}: {:.4}", feature, importance);
                }
                println!(
                    "  {} {} rows, {} anomalous",
                    dim("train"),
                    n_train,
                    format!("{:.1}%", train_anomaly_rate * 100.0).yellow()
                );
                match holdout_agreement {
                    Some(agreement) => println!("Held-out agreement: {:.4}", agreement),
                    None => println!("Held-out agreement: n/a"),
                }
            }
            DeviceOutcome::Skipped { device_id, .. } => {
                println!("No data available for device {}, skipping...", device_id);
            }
            DeviceOutcome::Failed { device_id, error } => {
                println!("  {} {}: {}", "✗".red(), device_id, error);
            }
        }
    }
}

/// Run one prediction over stdin/stdout and return the process exit code
pub fn cmd_predict(models: &Path) -> anyhow::Result<i32> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    let result = FileModelStore::open_existing(models)
        .and_then(|store| InferenceEngine::new(store).handle_request(&input));

    let mut stdout = io::stdout().lock();
    match result {
        Ok(body) => {
            writeln!(stdout, "{}", body)?;
            Ok(0)
        }
        Err(err) => {
            tracing::warn!(kind = err.kind(), error = %err, "Prediction failed");
            writeln!(stdout, "{}", serde_json::to_string(&ErrorResponse::from(&err))?)?;
            Ok(exit_code(&err))
        }
    }
}

pub fn cmd_models(models: &Path) -> anyhow::Result<()> {
    section("Models");

    let store = FileModelStore::open_existing(models)?;
    let keys = store.keys()?;
    let devices = store.list_devices()?;

    if devices.is_empty() {
        println!("  {}", "No trained devices".yellow());
        println!();
        return Ok(());
    }

    println!("  {:<28} {:<10} {:<10}", muted("Device"), muted("Novelty"), muted("Classifier"));
    println!("  {}", dim(&"─".repeat(50)));

    for device in &devices {
        let has = |kind: ModelKind| {
            keys.iter()
                .any(|k| parse_artifact_key(k) == Some((kind, device.as_str())))
        };
        let mark = |present: bool| if present { ok("✓") } else { dim("-") };
        println!(
            "  {:<28} {:<10} {:<10}",
            device,
            mark(has(ModelKind::Novelty)),
            mark(has(ModelKind::Classifier))
        );
    }

    println!();
    println!("  {:<16} {}", muted("Devices"), devices.len().to_string().white().bold());
    println!();
    Ok(())
}
