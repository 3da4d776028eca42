//! Core types for the stress feature pipeline
//!
//! This module defines the data that flows between stages: raw sensor and label
//! streams, analysis windows, and the sixteen-feature rows shared by both
//! ingestion paths.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Number of numeric features in the schema
pub const FEATURE_COUNT: usize = 16;

/// Ordered feature names. Every table, scaler and model vector uses this order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "bpm_avg",
    "bpm_min",
    "bpm_max",
    "bpm_std",
    "hrv_rmssd",
    "hrv_sdnn",
    "gsr_avg",
    "gsr_min",
    "gsr_max",
    "gsr_std",
    "gsr_slope",
    "temp_avg",
    "temp_min",
    "temp_max",
    "temp_std",
    "temp_slope",
];

/// Sensor kinds carried by the wrist device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensorKind {
    /// Optical pulse waveform
    Bvp,
    /// Electrodermal activity (skin conductance)
    Eda,
    /// Skin temperature
    Temp,
}

/// An ordered run of samples at a fixed rate
#[derive(Debug, Clone, PartialEq)]
pub struct SensorStream {
    pub kind: SensorKind,
    pub rate: u32,
    pub samples: Vec<f64>,
}

impl SensorStream {
    pub fn new(kind: SensorKind, rate: u32, samples: Vec<f64>) -> Self {
        Self {
            kind,
            rate,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples covering the time span of `window`, clamped to the stream length.
    pub fn slice(&self, window: &Window) -> &[f64] {
        let range = window.index_range(self.rate);
        let end = range.end.min(self.samples.len());
        let start = range.start.min(end);
        &self.samples[start..end]
    }
}

/// Integer condition codes at their own rate
#[derive(Debug, Clone, PartialEq)]
pub struct LabelStream {
    pub rate: u32,
    pub codes: Vec<i64>,
}

impl LabelStream {
    pub fn new(rate: u32, codes: Vec<i64>) -> Self {
        Self { rate, codes }
    }
}

/// Half-open sample range over the base stream, plus its time equivalent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
    pub base_rate: u32,
}

impl Window {
    pub fn new(start: usize, end: usize, base_rate: u32) -> Self {
        Self {
            start,
            end,
            base_rate,
        }
    }

    pub fn start_s(&self) -> f64 {
        self.start as f64 / self.base_rate as f64
    }

    pub fn end_s(&self) -> f64 {
        self.end as f64 / self.base_rate as f64
    }

    /// Index range into a stream sampled at `rate`, truncating both bounds.
    pub fn index_range(&self, rate: u32) -> Range<usize> {
        let start = (self.start_s() * rate as f64) as usize;
        let end = (self.end_s() * rate as f64) as usize;
        start..end
    }
}

/// The sixteen numeric features. Undefined values are carried as NaN until
/// collation drops the row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Features {
    pub bpm_avg: f64,
    pub bpm_min: f64,
    pub bpm_max: f64,
    pub bpm_std: f64,
    pub hrv_rmssd: f64,
    pub hrv_sdnn: f64,
    pub gsr_avg: f64,
    pub gsr_min: f64,
    pub gsr_max: f64,
    pub gsr_std: f64,
    pub gsr_slope: f64,
    pub temp_avg: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub temp_std: f64,
    pub temp_slope: f64,
}

impl Features {
    /// Values in [`FEATURE_NAMES`] order
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.bpm_avg,
            self.bpm_min,
            self.bpm_max,
            self.bpm_std,
            self.hrv_rmssd,
            self.hrv_sdnn,
            self.gsr_avg,
            self.gsr_min,
            self.gsr_max,
            self.gsr_std,
            self.gsr_slope,
            self.temp_avg,
            self.temp_min,
            self.temp_max,
            self.temp_std,
            self.temp_slope,
        ]
    }

    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        let [bpm_avg, bpm_min, bpm_max, bpm_std, hrv_rmssd, hrv_sdnn, gsr_avg, gsr_min, gsr_max, gsr_std, gsr_slope, temp_avg, temp_min, temp_max, temp_std, temp_slope] =
            values;
        Self {
            bpm_avg,
            bpm_min,
            bpm_max,
            bpm_std,
            hrv_rmssd,
            hrv_sdnn,
            gsr_avg,
            gsr_min,
            gsr_max,
            gsr_std,
            gsr_slope,
            temp_avg,
            temp_min,
            temp_max,
            temp_std,
            temp_slope,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Binary training target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StressLabel {
    NonStress,
    Stress,
}

impl StressLabel {
    pub fn as_u8(&self) -> u8 {
        match self {
            StressLabel::NonStress => 0,
            StressLabel::Stress => 1,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(StressLabel::NonStress),
            1 => Some(StressLabel::Stress),
            _ => None,
        }
    }
}

/// One output row: provenance, target and features
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub subject: String,
    pub label: StressLabel,
    pub features: Features,
}

impl FeatureRow {
    pub fn new(subject: impl Into<String>, label: StressLabel, features: Features) -> Self {
        Self {
            subject: subject.into(),
            label,
            features,
        }
    }

    /// Rows must have finite features and a non-empty subject to be kept
    pub fn is_valid(&self) -> bool {
        !self.subject.is_empty() && self.features.is_finite()
    }
}

/// Reference-dataset row with the window span it was computed over
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedRow {
    pub row: FeatureRow,
    pub window_start_s: f64,
    pub window_end_s: f64,
}

/// Where a subject group's rows came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Reference,
    Field,
}

impl Provenance {
    /// Field subjects are marked by a fixed prefix on their identifier
    pub fn of(subject: &str, local_prefix: &str) -> Self {
        if subject.starts_with(local_prefix) {
            Provenance::Field
        } else {
            Provenance::Reference
        }
    }
}
