//! Error types for Synheart Stress

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building features or training the model
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("{source_name} missing columns: {columns:?}")]
    MissingColumns {
        source_name: String,
        columns: Vec<String>,
    },

    #[error("No field session CSV files in {}", .0.display())]
    EmptySessionDir(PathBuf),

    #[error("No subject folders found in {}", .0.display())]
    NoSubjects(PathBuf),

    #[error("No rows built: {0}")]
    NoRows(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Group split needs at least 2 subject groups, found {groups}")]
    InsufficientGroups { groups: usize },

    #[error("Only one class present in {0} partition")]
    SingleClass(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}
