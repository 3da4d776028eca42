//! Stress CLI - Command-line interface for Synheart Stress
//!
//! Commands:
//! - prepare: Build windowed reference features from subject folders
//! - train: Train and export a model from a feature CSV
//! - merge: Merge reference features with field sessions, then train

use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use synheart_stress::pipeline::{
    merge_and_train, prepare_reference, train_from_csv, write_artifacts,
};
use synheart_stress::{ComputeError, PipelineConfig, STRESS_VERSION};

/// Stress - Stress feature extraction and portable model training
#[derive(Parser)]
#[command(name = "stress")]
#[command(author = "Synheart AI Inc")]
#[command(version = STRESS_VERSION)]
#[command(about = "Build stress features and train a portable classifier", long_about = None)]
struct Cli {
    /// Pipeline configuration file (JSON); flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build windowed features from reference subject folders
    Prepare {
        /// Root directory holding S*/ subject folders
        #[arg(long)]
        root: PathBuf,

        /// Output features CSV
        #[arg(long)]
        out_csv: PathBuf,

        /// Window length in seconds
        #[arg(long)]
        window_seconds: Option<u32>,

        /// Window stride in seconds
        #[arg(long)]
        step_seconds: Option<u32>,
    },

    /// Train from an existing features CSV
    Train {
        /// Features CSV (subject, label and the sixteen feature columns)
        #[arg(long)]
        features_csv: PathBuf,

        /// Output directory for model artifacts
        #[arg(long)]
        out_dir: PathBuf,

        /// Fraction of subject groups held out for evaluation
        #[arg(long)]
        test_size: Option<f64>,

        /// Seed for the group split
        #[arg(long)]
        random_state: Option<u64>,
    },

    /// Merge reference features with field sessions and train
    Merge {
        /// Reference features CSV
        #[arg(long)]
        reference_features: PathBuf,

        /// Folder with field session CSVs
        #[arg(long)]
        field_dir: PathBuf,

        /// Merged features CSV
        #[arg(long, default_value = "data/combined_features.csv")]
        out_merged_csv: PathBuf,

        /// Output directory for model artifacts
        #[arg(long, default_value = "artifacts_combined")]
        out_dir: PathBuf,

        /// Fraction of subject groups held out for evaluation
        #[arg(long)]
        test_size: Option<f64>,

        /// Seed for the group split
        #[arg(long)]
        random_state: Option<u64>,

        /// Sample weight multiplier for field rows
        #[arg(long)]
        local_weight: Option<f64>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, StressCliError> {
    match path {
        Some(path) => Ok(PipelineConfig::load(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

fn run(cli: Cli) -> Result<(), StressCliError> {
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Prepare {
            root,
            out_csv,
            window_seconds,
            step_seconds,
        } => {
            if let Some(v) = window_seconds {
                config.window.window_seconds = v;
            }
            if let Some(v) = step_seconds {
                config.window.step_seconds = v;
            }
            cmd_prepare(&root, &out_csv, &config)
        }

        Commands::Train {
            features_csv,
            out_dir,
            test_size,
            random_state,
        } => {
            override_split(&mut config, test_size, random_state);
            cmd_train(&features_csv, &out_dir, &config)
        }

        Commands::Merge {
            reference_features,
            field_dir,
            out_merged_csv,
            out_dir,
            test_size,
            random_state,
            local_weight,
        } => {
            override_split(&mut config, test_size, random_state);
            if let Some(v) = local_weight {
                config.training.local_weight = v;
            }
            cmd_merge(
                &reference_features,
                &field_dir,
                &out_merged_csv,
                &out_dir,
                &config,
            )
        }
    }
}

fn override_split(config: &mut PipelineConfig, test_size: Option<f64>, random_state: Option<u64>) {
    if let Some(v) = test_size {
        config.training.test_size = v;
    }
    if let Some(v) = random_state {
        config.training.random_state = v;
    }
}

fn cmd_prepare(root: &Path, out_csv: &Path, config: &PipelineConfig) -> Result<(), StressCliError> {
    let prepared = prepare_reference(root, config)?;
    prepared.write_csv(out_csv)?;
    println!("{}", serde_json::to_string_pretty(&prepared.summary)?);
    Ok(())
}

fn cmd_train(
    features_csv: &Path,
    out_dir: &Path,
    config: &PipelineConfig,
) -> Result<(), StressCliError> {
    let outcome = train_from_csv(features_csv, config)?;
    let summary = write_artifacts(&outcome, out_dir)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_merge(
    reference_features: &Path,
    field_dir: &Path,
    out_merged_csv: &Path,
    out_dir: &Path,
    config: &PipelineConfig,
) -> Result<(), StressCliError> {
    let outcome = merge_and_train(reference_features, field_dir, Some(out_merged_csv), config)?;

    let merge_report = serde_json::json!({
        "reference_rows": outcome.summary.reference_rows,
        "field_rows": outcome.summary.field_rows,
        "combined_rows": outcome.summary.combined_rows,
        "field_subjects": outcome.summary.field_subjects,
        "out_merged_csv": out_merged_csv,
    });
    println!("{}", serde_json::to_string_pretty(&merge_report)?);

    let summary = write_artifacts(&outcome.training, out_dir)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

// Error types

#[derive(Debug)]
enum StressCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
}

impl From<io::Error> for StressCliError {
    fn from(e: io::Error) -> Self {
        StressCliError::Io(e)
    }
}

impl From<ComputeError> for StressCliError {
    fn from(e: ComputeError) -> Self {
        StressCliError::Compute(e)
    }
}

impl From<serde_json::Error> for StressCliError {
    fn from(e: serde_json::Error) -> Self {
        StressCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(code: &str, message: String, hint: Option<&str>) -> Self {
        Self {
            code: code.to_string(),
            message,
            hint: hint.map(str::to_string),
        }
    }
}

impl From<StressCliError> for CliError {
    fn from(e: StressCliError) -> Self {
        match e {
            StressCliError::Io(e) => {
                CliError::new("IO_ERROR", e.to_string(), Some("Check file paths and permissions"))
            }
            StressCliError::Json(e) => {
                CliError::new("JSON_ERROR", e.to_string(), Some("Check JSON syntax"))
            }
            StressCliError::Compute(e) => {
                let message = e.to_string();
                match e {
                    ComputeError::MissingColumns { .. } => CliError::new(
                        "MISSING_COLUMNS",
                        message,
                        Some("Ensure the CSV carries every required column"),
                    ),
                    ComputeError::NoSubjects(_) => CliError::new(
                        "NO_SUBJECTS",
                        message,
                        Some("Point --root at the folder holding S*/ subject folders"),
                    ),
                    ComputeError::EmptySessionDir(_) => CliError::new(
                        "NO_SESSIONS",
                        message,
                        Some("Place field session CSV files in --field-dir"),
                    ),
                    ComputeError::NoRows(_) => CliError::new(
                        "NO_ROWS",
                        message,
                        Some("Check dataset path and label mapping"),
                    ),
                    ComputeError::InvalidConfig(_) => {
                        CliError::new("INVALID_CONFIG", message, Some("Review configuration values"))
                    }
                    ComputeError::InsufficientGroups { .. } | ComputeError::SingleClass(_) => {
                        CliError::new(
                            "TRAINING_ERROR",
                            message,
                            Some("Provide more subjects covering both classes"),
                        )
                    }
                    ComputeError::Io(_) => {
                        CliError::new("IO_ERROR", message, Some("Check file paths and permissions"))
                    }
                    ComputeError::JsonError(_) | ComputeError::CsvError(_) | ComputeError::ParseError(_) => {
                        CliError::new("PARSE_ERROR", message, Some("Check input format"))
                    }
                    ComputeError::ModelError(_) => CliError::new("MODEL_ERROR", message, None),
                }
            }
        }
    }
}
