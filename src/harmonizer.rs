//! Dataset harmonization
//!
//! Concatenates the reference table with every field session table and
//! scrubs rows that break the shared schema invariant. This is the last
//! point where undefined values can be removed before training.

use crate::error::ComputeError;
use crate::table::FeatureTable;
use crate::types::FeatureRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

/// Counts describing a harmonization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub reference_rows: usize,
    pub field_rows: usize,
    pub combined_rows: usize,
    pub field_subjects: Vec<String>,
}

/// Combined feature table with its summary
#[derive(Debug, Clone)]
pub struct Harmonized {
    pub table: FeatureTable,
    pub summary: MergeSummary,
}

pub struct Harmonizer;

impl Harmonizer {
    /// Concatenate reference and field tables, in order, keeping only rows
    /// with finite features and a subject. Fails if nothing survives.
    pub fn harmonize(
        reference: FeatureTable,
        field: Vec<FeatureTable>,
    ) -> Result<Harmonized, ComputeError> {
        let reference_rows = reference.len();
        let field_rows: usize = field.iter().map(FeatureTable::len).sum();
        let field_subjects: Vec<String> = field
            .iter()
            .flat_map(|t| t.rows.iter().map(|r| r.subject.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let rows: Vec<FeatureRow> = reference
            .rows
            .into_iter()
            .chain(field.into_iter().flat_map(|t| t.rows))
            .filter(FeatureRow::is_valid)
            .collect();

        if rows.is_empty() {
            return Err(ComputeError::NoRows(
                "no rows left after harmonization".to_string(),
            ));
        }

        let summary = MergeSummary {
            reference_rows,
            field_rows,
            combined_rows: rows.len(),
            field_subjects,
        };
        info!(
            reference = summary.reference_rows,
            field = summary.field_rows,
            combined = summary.combined_rows,
            "feature tables harmonized"
        );

        Ok(Harmonized {
            table: FeatureTable::new(rows),
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Features, StressLabel, FEATURE_COUNT};
    use pretty_assertions::assert_eq;

    fn row(subject: &str, value: f64) -> FeatureRow {
        FeatureRow::new(
            subject,
            StressLabel::NonStress,
            Features::from_array([value; FEATURE_COUNT]),
        )
    }

    #[test]
    fn test_concatenates_in_order() {
        let reference = FeatureTable::new(vec![row("S2", 1.0), row("S3", 2.0)]);
        let field = vec![
            FeatureTable::new(vec![row("LOCAL_b", 3.0)]),
            FeatureTable::new(vec![row("LOCAL_a", 4.0)]),
        ];

        let merged = Harmonizer::harmonize(reference, field).unwrap();
        let subjects: Vec<&str> = merged.table.rows.iter().map(|r| r.subject.as_str()).collect();

        assert_eq!(subjects, vec!["S2", "S3", "LOCAL_b", "LOCAL_a"]);
        assert_eq!(
            merged.summary,
            MergeSummary {
                reference_rows: 2,
                field_rows: 2,
                combined_rows: 4,
                field_subjects: vec!["LOCAL_a".to_string(), "LOCAL_b".to_string()],
            }
        );
    }

    #[test]
    fn test_scrubs_non_finite_and_anonymous_rows() {
        let reference = FeatureTable::new(vec![
            row("S2", 1.0),
            row("S2", f64::INFINITY),
            row("S2", f64::NAN),
            row("", 1.0),
        ]);

        let merged = Harmonizer::harmonize(reference, vec![]).unwrap();
        assert_eq!(merged.table.len(), 1);
        assert_eq!(merged.summary.reference_rows, 4);
    }

    #[test]
    fn test_empty_result_is_fatal() {
        let reference = FeatureTable::new(vec![row("S2", f64::NAN)]);
        assert!(matches!(
            Harmonizer::harmonize(reference, vec![FeatureTable::default()]),
            Err(ComputeError::NoRows(_))
        ));
    }
}
