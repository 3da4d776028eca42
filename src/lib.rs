//! Synheart Stress - Stress feature extraction and portable model training
//!
//! Stress turns wrist physiology into a sixteen-feature schema and trains a
//! binary stress classifier on it through a deterministic pipeline:
//! feature sources → harmonization → group-split training → portable export.
//!
//! ## Modules
//!
//! - **Reference path**: fixed-stride windows over raw pulse, conductance and
//!   temperature streams with heart-rate/HRV extraction from detected beats
//! - **Field path**: trailing rolling windows over pre-averaged session logs
//! - **Training**: leakage-safe split, class-balanced weighted logistic fit,
//!   and a language-neutral model artifact

pub mod config;
pub mod error;
pub mod harmonizer;
pub mod hrv;
pub mod normalizer;
pub mod peaks;
pub mod pipeline;
pub mod sources;
pub mod stats;
pub mod table;
pub mod training;
pub mod types;

pub use config::PipelineConfig;
pub use error::ComputeError;
pub use harmonizer::{Harmonizer, MergeSummary};
pub use pipeline::{
    build_field_tables, merge_and_train, prepare_reference, train_from_csv, write_artifacts,
    RunSummary,
};
pub use table::FeatureTable;
pub use training::{FittedPipeline, PortableModel, Trainer};
pub use types::{FeatureRow, Features, StressLabel, FEATURE_NAMES};

/// Stress version embedded in fitted pipelines
pub const STRESS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for fitted pipelines
pub const PRODUCER_NAME: &str = "synheart-stress";

/// `type` tag of the portable model
pub const MODEL_TYPE: &str = "logistic_regression_binary";
