//! Feature sources
//!
//! Each ingestion path reduces its own input to rows of the shared
//! sixteen-feature schema. The two strategies are kept separate on purpose:
//! the reference path summarizes fixed-stride batch windows, the field path
//! uses causal trailing windows over already-averaged rows.

mod field;
mod reference;

pub use field::{map_activity_label, parse_timestamp, FieldRecord, FieldSession, FieldSessionBuilder, FIELD_REQUIRED_COLUMNS};
pub use reference::{label_for_window, majority_label, ReferenceSubject, ReferenceWindowing};

use crate::error::ComputeError;
use crate::types::FeatureRow;

/// A strategy that turns one subject's or session's input into feature rows
pub trait FeatureStrategy {
    type Input;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Build feature rows for one input. Rows may still contain undefined
    /// features; collation decides what is kept.
    fn build(&self, input: &Self::Input) -> Result<Vec<FeatureRow>, ComputeError>;
}

/// Keep only rows with finite features and a subject
pub fn collate(rows: Vec<FeatureRow>) -> Vec<FeatureRow> {
    rows.into_iter().filter(FeatureRow::is_valid).collect()
}
