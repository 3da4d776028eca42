//! Field-session unit normalization
//!
//! Field logs do not declare units. Conductance and temperature columns are
//! inspected by median and rescaled when they sit an order of magnitude away
//! from the reference dataset's scale. Each decision is returned alongside the
//! column so callers can log and test it.

use crate::config::NormalizationConfig;
use serde::{Deserialize, Serialize};

/// What the heuristic did to a column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitDecision {
    /// Column left as-is
    Unchanged,
    /// Column divided by `divisor` in each of `passes` passes
    Rescaled { divisor: f64, passes: usize },
}

impl UnitDecision {
    pub fn is_rescaled(&self) -> bool {
        matches!(self, UnitDecision::Rescaled { .. })
    }
}

/// A normalized column with the decision that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedColumn {
    pub values: Vec<Option<f64>>,
    pub decision: UnitDecision,
}

/// Unit normalizer for field sessions
pub struct UnitNormalizer;

impl UnitNormalizer {
    /// Conductance: one division by 1000 when the median exceeds the threshold
    pub fn conductance(values: &[Option<f64>], config: &NormalizationConfig) -> NormalizedColumn {
        rescale_while_above(values, config.gsr_median_threshold, 1000.0, 1)
    }

    /// Temperature: division by 10 while the median exceeds the threshold,
    /// for at most `temp_max_passes` passes
    pub fn temperature(values: &[Option<f64>], config: &NormalizationConfig) -> NormalizedColumn {
        rescale_while_above(
            values,
            config.temp_median_threshold,
            10.0,
            config.temp_max_passes,
        )
    }
}

fn rescale_while_above(
    values: &[Option<f64>],
    threshold: f64,
    divisor: f64,
    max_passes: usize,
) -> NormalizedColumn {
    let mut column = values.to_vec();
    let mut passes = 0;

    while passes < max_passes {
        match median(&column) {
            Some(m) if m > threshold => {
                for v in column.iter_mut().flatten() {
                    *v /= divisor;
                }
                passes += 1;
            }
            _ => break,
        }
    }

    let decision = if passes == 0 {
        UnitDecision::Unchanged
    } else {
        UnitDecision::Rescaled { divisor, passes }
    };

    NormalizedColumn {
        values: column,
        decision,
    }
}

/// Median of the present, non-NaN values
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values
        .iter()
        .flatten()
        .copied()
        .filter(|v| !v.is_nan())
        .collect();
    if present.is_empty() {
        return None;
    }

    present.sort_by(|a, b| a.total_cmp(b));
    let mid = present.len() / 2;
    if present.len() % 2 == 0 {
        Some((present[mid - 1] + present[mid]) / 2.0)
    } else {
        Some(present[mid])
    }
}
