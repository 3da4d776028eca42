//! Training and export
//!
//! Fits a standardized, class-balanced logistic classifier on a harmonized
//! feature table with subject-grouped hold-out evaluation:
//!
//! group split → scaler (train rows only) → weighted logistic fit → metrics
//!
//! The fitted result can be written as the reloadable `FittedPipeline` and as
//! the runtime-independent `PortableModel`.

mod export;
mod logistic;
mod metrics;
mod scaler;
mod split;

pub use export::{FittedPipeline, PortableModel};
pub use logistic::{fit as fit_logistic, LogisticModel, SolverOptions};
pub use metrics::{confusion_matrix, roc_auc, ClassReport, Metrics, ReportEntry};
pub use scaler::StandardScaler;
pub use split::{group_shuffle_split, GroupSplit};

use crate::config::TrainingConfig;
use crate::error::ComputeError;
use crate::table::FeatureTable;
use crate::types::{Provenance, StressLabel, FEATURE_COUNT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// How per-row importance is assigned before class balancing
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleWeighting {
    /// Every row weighs 1.0
    Uniform,
    /// Rows whose subject carries the field prefix weigh the given multiplier
    FieldBoost(f64),
}

impl SampleWeighting {
    fn local_weight(&self) -> Option<f64> {
        match self {
            SampleWeighting::Uniform => None,
            SampleWeighting::FieldBoost(w) => Some(*w),
        }
    }
}

/// Metrics report written next to the model artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub run_id: String,
    pub computed_at: DateTime<Utc>,
    pub rows_total: usize,
    pub rows_train: usize,
    pub rows_test: usize,
    pub subjects_train: Vec<String>,
    pub subjects_test: Vec<String>,
    #[serde(flatten)]
    pub metrics: Metrics,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub local_weight: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub pipeline: FittedPipeline,
    pub report: TrainingReport,
    pub split: GroupSplit,
}

pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Provenance multiplier times inverse class frequency of the training labels
    pub fn sample_weights(
        &self,
        table: &FeatureTable,
        indices: &[usize],
        weighting: SampleWeighting,
    ) -> Vec<f64> {
        let n = indices.len() as f64;
        let positives = indices
            .iter()
            .filter(|&&i| table.rows[i].label == StressLabel::Stress)
            .count() as f64;
        let negatives = n - positives;

        indices
            .iter()
            .map(|&i| {
                let row = &table.rows[i];
                let count = match row.label {
                    StressLabel::Stress => positives,
                    StressLabel::NonStress => negatives,
                };
                let balance = n / (2.0 * count);
                let provenance = match weighting {
                    SampleWeighting::FieldBoost(w)
                        if Provenance::of(&row.subject, &self.config.local_prefix)
                            == Provenance::Field =>
                    {
                        w
                    }
                    _ => 1.0,
                };
                balance * provenance
            })
            .collect()
    }

    pub fn train(
        &self,
        table: &FeatureTable,
        weighting: SampleWeighting,
    ) -> Result<TrainingOutcome, ComputeError> {
        let table = FeatureTable::new(table.rows.iter().filter(|r| r.is_valid()).cloned().collect());
        if table.is_empty() {
            return Err(ComputeError::NoRows("training table is empty".to_string()));
        }

        let groups: Vec<&str> = table.rows.iter().map(|r| r.subject.as_str()).collect();
        let split = group_shuffle_split(&groups, self.config.test_size, self.config.random_state)?;

        let features = |indices: &[usize]| -> Vec<[f64; FEATURE_COUNT]> {
            indices.iter().map(|&i| table.rows[i].features.to_array()).collect()
        };
        let labels = |indices: &[usize]| -> Vec<u8> {
            indices.iter().map(|&i| table.rows[i].label.as_u8()).collect()
        };

        let x_train = features(&split.train);
        let y_train = labels(&split.train);
        if y_train.iter().all(|&y| y == y_train[0]) {
            return Err(ComputeError::SingleClass("training".to_string()));
        }

        let scaler = StandardScaler::fit(&x_train)?;
        let weights = self.sample_weights(&table, &split.train, weighting);
        let targets: Vec<f64> = y_train.iter().map(|&y| f64::from(y)).collect();

        let classifier = fit_logistic(
            &scaler.transform(&x_train),
            &targets,
            &weights,
            SolverOptions {
                c: self.config.regularization_c,
                max_iter: self.config.max_iter,
                tol: self.config.tol,
            },
        )?;

        let run_id = Uuid::new_v4().to_string();
        let computed_at = Utc::now();
        let pipeline = FittedPipeline::new(
            scaler,
            classifier,
            self.config.threshold,
            run_id.clone(),
            computed_at,
        );

        let x_test = features(&split.test);
        let y_test = labels(&split.test);
        let scores: Vec<f64> = x_test.iter().map(|x| pipeline.predict_proba(x)).collect();
        let y_pred: Vec<u8> = scores
            .iter()
            .map(|&p| u8::from(p >= self.config.threshold))
            .collect();
        let metrics = Metrics::compute(&y_test, &y_pred, &scores);

        info!(
            rows_train = split.train.len(),
            rows_test = split.test.len(),
            f1 = metrics.f1,
            "model trained"
        );

        let report = TrainingReport {
            run_id,
            computed_at,
            rows_total: table.len(),
            rows_train: split.train.len(),
            rows_test: split.test.len(),
            subjects_train: split.train_groups.clone(),
            subjects_test: split.test_groups.clone(),
            metrics,
            local_weight: weighting.local_weight(),
        };

        Ok(TrainingOutcome {
            pipeline,
            report,
            split,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeatureRow, Features};
    use pretty_assertions::assert_eq;

    fn row(subject: &str, label: StressLabel, x: f64) -> FeatureRow {
        let values: [f64; FEATURE_COUNT] = std::array::from_fn(|i| x * (1.0 + i as f64 * 0.1));
        FeatureRow::new(subject, label, Features::from_array(values))
    }

    /// Stress rows have higher values; subjects offset slightly
    fn table() -> FeatureTable {
        let mut rows = Vec::new();
        for (s, subject) in ["S2", "S3", "S4", "S5", "LOCAL_a", "LOCAL_b"].iter().enumerate() {
            for k in 0..6 {
                let jitter = (k as f64 * 0.13 + s as f64 * 0.07).sin() * 0.4;
                rows.push(row(subject, StressLabel::NonStress, 1.0 + jitter));
                rows.push(row(subject, StressLabel::Stress, 2.5 + jitter));
            }
        }
        FeatureTable::new(rows)
    }

    #[test]
    fn test_balanced_weights_with_field_boost() {
        let table = FeatureTable::new(vec![
            row("S2", StressLabel::NonStress, 1.0),
            row("S2", StressLabel::NonStress, 1.0),
            row("S2", StressLabel::NonStress, 1.0),
            row("LOCAL_a", StressLabel::Stress, 1.0),
        ]);
        let trainer = Trainer::new(TrainingConfig::default());

        let uniform = trainer.sample_weights(&table, &[0, 1, 2, 3], SampleWeighting::Uniform);
        assert_eq!(uniform, vec![4.0 / 6.0, 4.0 / 6.0, 4.0 / 6.0, 2.0]);

        let boosted =
            trainer.sample_weights(&table, &[0, 1, 2, 3], SampleWeighting::FieldBoost(1.75));
        assert_eq!(boosted[0], 4.0 / 6.0);
        assert_eq!(boosted[3], 2.0 * 1.75);
    }

    #[test]
    fn test_train_separates_classes() {
        let trainer = Trainer::new(TrainingConfig::default());
        let outcome = trainer.train(&table(), SampleWeighting::FieldBoost(1.75)).unwrap();
        let report = &outcome.report;

        assert!(outcome.split.is_disjoint());
        assert_eq!(report.rows_total, 72);
        assert_eq!(report.rows_train + report.rows_test, 72);
        assert_eq!(report.subjects_test.len(), 2);
        assert_eq!(report.metrics.accuracy, 1.0);
        assert_eq!(report.metrics.roc_auc, Some(1.0));
        assert_eq!(report.local_weight, Some(1.75));
        assert!(outcome.pipeline.classifier.converged);
    }

    #[test]
    fn test_report_json_fields() {
        let trainer = Trainer::new(TrainingConfig::default());
        let outcome = trainer.train(&table(), SampleWeighting::Uniform).unwrap();
        let json = serde_json::to_value(&outcome.report).unwrap();

        for key in [
            "rows_total",
            "rows_train",
            "rows_test",
            "subjects_train",
            "subjects_test",
            "accuracy",
            "f1",
            "precision",
            "recall",
            "roc_auc",
            "confusion_matrix",
            "classification_report",
            "run_id",
            "computed_at",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert!(json.get("local_weight").is_none());
    }

    #[test]
    fn test_single_class_training_rejected() {
        let rows = ["S2", "S3", "S4", "S5"]
            .iter()
            .map(|s| row(s, StressLabel::Stress, 1.0))
            .collect();
        let trainer = Trainer::new(TrainingConfig::default());

        assert!(matches!(
            trainer.train(&FeatureTable::new(rows), SampleWeighting::Uniform),
            Err(ComputeError::SingleClass(_))
        ));
    }

    #[test]
    fn test_same_seed_same_split() {
        let trainer = Trainer::new(TrainingConfig::default());
        let a = trainer.train(&table(), SampleWeighting::Uniform).unwrap();
        let b = trainer.train(&table(), SampleWeighting::Uniform).unwrap();

        assert_eq!(a.split, b.split);
        assert_eq!(a.pipeline.classifier.coef, b.pipeline.classifier.coef);
    }
}
