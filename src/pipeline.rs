//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Stress. It wires the
//! feature sources, harmonizer and trainer together for the three batch jobs:
//!
//! 1. `prepare_reference` - reference subject folders → windowed feature table
//! 2. `train_from_csv` - existing feature table → model (uniform weights)
//! 3. `merge_and_train` - reference table + field sessions → merged table → model
//!
//! `write_artifacts` persists a training outcome as `pipeline.json`,
//! `model_portable.json` and `metrics.json`.

use crate::config::PipelineConfig;
use crate::error::ComputeError;
use crate::harmonizer::{Harmonizer, MergeSummary};
use crate::sources::{
    collate, FeatureStrategy, FieldSession, FieldSessionBuilder, ReferenceSubject,
    ReferenceWindowing,
};
use crate::table::{write_windowed_csv, FeatureTable};
use crate::training::{SampleWeighting, Trainer, TrainingOutcome};
use crate::types::{FeatureRow, WindowedRow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File names written by `write_artifacts`
pub const PIPELINE_FILE: &str = "pipeline.json";
pub const PORTABLE_MODEL_FILE: &str = "model_portable.json";
pub const METRICS_FILE: &str = "metrics.json";

/// Shape of a prepared reference table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparationSummary {
    pub rows: usize,
    pub columns: usize,
    pub subjects: Vec<String>,
    pub label_counts: BTreeMap<String, usize>,
}

/// Windowed reference rows, undefined rows already dropped
#[derive(Debug, Clone)]
pub struct PreparedReference {
    pub rows: Vec<WindowedRow>,
    pub summary: PreparationSummary,
}

impl PreparedReference {
    /// Write `subject, window_start_s, window_end_s, label, <features>`
    pub fn write_csv(&self, path: &Path) -> Result<(), ComputeError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_windowed_csv(&self.rows, std::fs::File::create(path)?)
    }

    pub fn table(&self) -> FeatureTable {
        FeatureTable::new(self.rows.iter().map(|w| w.row.clone()).collect())
    }
}

fn sorted_entries<F>(dir: &Path, keep: F) -> Result<Vec<PathBuf>, ComputeError>
where
    F: Fn(&Path) -> bool,
{
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if keep(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Build the windowed reference table from `<root>/S*/S*.json` subject documents.
pub fn prepare_reference(
    root: &Path,
    config: &PipelineConfig,
) -> Result<PreparedReference, ComputeError> {
    config.validate()?;
    let prefix = config.window.subject_prefix.as_str();
    let subject_dirs = sorted_entries(root, |p| {
        p.is_dir()
            && p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix))
    })?;
    if subject_dirs.is_empty() {
        return Err(ComputeError::NoSubjects(root.to_path_buf()));
    }

    let windowing = ReferenceWindowing::new(config.window.clone(), config.extractor.clone());
    let mut rows = Vec::new();
    for dir in &subject_dirs {
        let subject = ReferenceSubject::load(dir, &config.window)?;
        let built: Vec<WindowedRow> = windowing
            .windowed_rows(&subject)?
            .into_iter()
            .filter(|w| w.row.is_valid())
            .collect();
        if built.is_empty() {
            warn!(subject = %subject.id, "subject yielded no rows");
        }
        rows.extend(built);
    }

    if rows.is_empty() {
        return Err(ComputeError::NoRows(
            "check dataset path and label mapping".to_string(),
        ));
    }

    let table = FeatureTable::new(rows.iter().map(|w| w.row.clone()).collect());
    let summary = PreparationSummary {
        rows: rows.len(),
        columns: FeatureTable::columns().len() + 2,
        subjects: table.subjects(),
        label_counts: table.label_counts(),
    };
    info!(
        rows = summary.rows,
        subjects = summary.subjects.len(),
        "reference features prepared"
    );

    Ok(PreparedReference { rows, summary })
}

/// Build one feature table per `*.csv` session in `dir`, in file-name order.
pub fn build_field_tables(
    dir: &Path,
    config: &PipelineConfig,
) -> Result<Vec<FeatureTable>, ComputeError> {
    let files = sorted_entries(dir, |p| {
        p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("csv")
    })?;
    if files.is_empty() {
        return Err(ComputeError::EmptySessionDir(dir.to_path_buf()));
    }

    let builder = FieldSessionBuilder::new(
        config.rolling.clone(),
        config.normalization.clone(),
        config.training.local_prefix.clone(),
    );

    let mut tables = Vec::with_capacity(files.len());
    for file in &files {
        let session = FieldSession::from_path(file)?;
        let rows = builder.build(&session)?;
        if rows.is_empty() {
            warn!(session = %session.name, "session yielded no rows");
        }
        debug!(builder = builder.name(), session = %session.name, rows = rows.len());
        tables.push(FeatureTable::new(rows));
    }
    Ok(tables)
}

/// Train on an existing feature table with uniform source weights
pub fn train_from_csv(
    features_csv: &Path,
    config: &PipelineConfig,
) -> Result<TrainingOutcome, ComputeError> {
    config.validate()?;
    let table = FeatureTable::read_csv_path(features_csv)?;
    let rows: Vec<FeatureRow> = collate(table.rows);
    if rows.is_empty() {
        return Err(ComputeError::NoRows(format!(
            "no usable rows in {}",
            features_csv.display()
        )));
    }
    Trainer::new(config.training.clone()).train(&FeatureTable::new(rows), SampleWeighting::Uniform)
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub summary: MergeSummary,
    pub merged: FeatureTable,
    pub training: TrainingOutcome,
}

/// Harmonize a reference feature table with every field session, optionally
/// write the merged table, then train with the field weight applied.
pub fn merge_and_train(
    reference_csv: &Path,
    field_dir: &Path,
    merged_csv: Option<&Path>,
    config: &PipelineConfig,
) -> Result<MergeOutcome, ComputeError> {
    config.validate()?;
    let reference = FeatureTable::read_csv_path(reference_csv)?;
    let field = build_field_tables(field_dir, config)?;

    let harmonized = Harmonizer::harmonize(reference, field)?;
    if let Some(path) = merged_csv {
        harmonized.table.write_csv_path(path)?;
    }

    let training = Trainer::new(config.training.clone()).train(
        &harmonized.table,
        SampleWeighting::FieldBoost(config.training.local_weight),
    )?;

    Ok(MergeOutcome {
        summary: harmonized.summary,
        merged: harmonized.table,
        training,
    })
}

/// Artifact locations and headline scores of a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub pipeline: PathBuf,
    pub portable_model: PathBuf,
    pub metrics: PathBuf,
    pub f1: f64,
    pub roc_auc: Option<f64>,
}

/// Write the compatibility pipeline, the portable model and the metrics report
pub fn write_artifacts(
    outcome: &TrainingOutcome,
    out_dir: &Path,
) -> Result<RunSummary, ComputeError> {
    std::fs::create_dir_all(out_dir)?;

    let pipeline = out_dir.join(PIPELINE_FILE);
    let portable_model = out_dir.join(PORTABLE_MODEL_FILE);
    let metrics = out_dir.join(METRICS_FILE);

    outcome.pipeline.save(&pipeline)?;
    outcome.pipeline.to_portable().save(&portable_model)?;
    std::fs::write(&metrics, serde_json::to_string_pretty(&outcome.report)?)?;

    info!(out_dir = %out_dir.display(), "artifacts written");

    Ok(RunSummary {
        pipeline,
        portable_model,
        metrics,
        f1: outcome.report.metrics.f1,
        roc_auc: outcome.report.metrics.roc_auc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("stress-{tag}-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_prepare_without_subjects() {
        let root = temp_dir("empty");
        std::fs::create_dir_all(root.join("notes")).unwrap();

        let err = prepare_reference(&root, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, ComputeError::NoSubjects(_)));
        std::fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_field_dir_without_sessions() {
        let dir = temp_dir("nofield");
        std::fs::write(dir.join("readme.txt"), "x").unwrap();

        let err = build_field_tables(&dir, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, ComputeError::EmptySessionDir(_)));
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_field_sessions_in_name_order() {
        let dir = temp_dir("order");
        let body = "time_iso,ts,bpm_avg,gsr_avg,temp_avg,label\n\
                    2024-01-01T00:00:00,1,70,2.0,33.0,rest\n\
                    2024-01-01T00:00:05,2,72,2.1,33.1,rest\n";
        std::fs::write(dir.join("b.csv"), body).unwrap();
        std::fs::write(dir.join("a.csv"), body).unwrap();

        let tables = build_field_tables(&dir, &PipelineConfig::default()).unwrap();
        let subjects: Vec<String> = tables.iter().flat_map(|t| t.subjects()).collect();
        assert_eq!(subjects, vec!["LOCAL_a".to_string(), "LOCAL_b".to_string()]);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_train_from_csv_rejects_missing_columns() {
        let dir = temp_dir("cols");
        let path = dir.join("features.csv");
        std::fs::write(&path, "subject,label\nS2,0\n").unwrap();

        let err = train_from_csv(&path, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, ComputeError::MissingColumns { .. }));
        std::fs::remove_dir_all(dir).ok();
    }
}
