//! Configuration for feature extraction and training.
//!
//! Every constant the extractors and the trainer depend on lives here so each
//! component can be exercised in isolation with explicit values.

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for a full run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub window: WindowConfig,
    pub extractor: ExtractorConfig,
    pub rolling: RollingConfig,
    pub normalization: NormalizationConfig,
    pub training: TrainingConfig,
}

impl PipelineConfig {
    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ComputeError> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make windowing or training meaningless.
    pub fn validate(&self) -> Result<(), ComputeError> {
        self.window.validate()?;
        self.extractor.validate()?;
        self.rolling.validate()?;
        self.training.validate()
    }
}

/// Sliding-window policy for the reference dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window length in seconds
    pub window_seconds: u32,
    /// Stride between window starts in seconds
    pub step_seconds: u32,
    /// Pulse waveform (BVP) rate in Hz; windows are generated on this stream
    pub bvp_rate: u32,
    /// Electrodermal activity rate in Hz
    pub eda_rate: u32,
    /// Skin temperature rate in Hz
    pub temp_rate: u32,
    /// Label stream rate in Hz
    pub label_rate: u32,
    /// Label code mapped to target 0
    pub baseline_code: i64,
    /// Label code mapped to target 1
    pub stress_code: i64,
    /// Directory name prefix identifying subject folders
    pub subject_prefix: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_seconds: 30,
            step_seconds: 5,
            bvp_rate: 64,
            eda_rate: 4,
            temp_rate: 4,
            label_rate: 700,
            baseline_code: 1,
            stress_code: 2,
            subject_prefix: "S".to_string(),
        }
    }
}

impl WindowConfig {
    fn validate(&self) -> Result<(), ComputeError> {
        if self.window_seconds == 0 || self.step_seconds == 0 {
            return Err(ComputeError::InvalidConfig(
                "window_seconds and step_seconds must be positive".to_string(),
            ));
        }
        if self.bvp_rate == 0 || self.eda_rate == 0 || self.temp_rate == 0 || self.label_rate == 0
        {
            return Err(ComputeError::InvalidConfig(
                "stream rates must be positive".to_string(),
            ));
        }
        if self.baseline_code == self.stress_code {
            return Err(ComputeError::InvalidConfig(
                "baseline_code and stress_code must differ".to_string(),
            ));
        }
        self.window_samples(self.bvp_rate)?;
        self.step_samples(self.bvp_rate)?;
        Ok(())
    }

    /// Window length in samples of a stream at `rate` Hz
    pub fn window_samples(&self, rate: u32) -> Result<usize, ComputeError> {
        span_samples("window_seconds", self.window_seconds, rate)
    }

    /// Stride in samples of a stream at `rate` Hz
    pub fn step_samples(&self, rate: u32) -> Result<usize, ComputeError> {
        span_samples("step_seconds", self.step_seconds, rate)
    }
}

fn span_samples(name: &str, seconds: u32, rate: u32) -> Result<usize, ComputeError> {
    seconds
        .checked_mul(rate)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            ComputeError::InvalidConfig(format!("{name} = {seconds} overflows at {rate} Hz"))
        })
}

/// Peak detection and interval acceptance for the HR/HRV extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Minimum peak separation as a fraction of the sample rate
    pub peak_distance_factor: f64,
    /// Minimum prominence on the standardized waveform
    pub min_prominence: f64,
    /// Shortest accepted inter-beat interval in seconds (exclusive)
    pub min_interval_s: f64,
    /// Longest accepted inter-beat interval in seconds (exclusive)
    pub max_interval_s: f64,
    /// Standard deviation below which the segment is not rescaled
    pub scale_epsilon: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            peak_distance_factor: 0.4,
            min_prominence: 0.2,
            min_interval_s: 0.3,
            max_interval_s: 1.8,
            scale_epsilon: 1e-9,
        }
    }
}

impl ExtractorConfig {
    fn validate(&self) -> Result<(), ComputeError> {
        if self.min_interval_s >= self.max_interval_s {
            return Err(ComputeError::InvalidConfig(
                "min_interval_s must be below max_interval_s".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trailing-window policy for field sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingConfig {
    /// Number of rows in the trailing window, current row included
    pub window: usize,
    /// Pulse rates at or below this value are ignored by the HRV calculators
    pub min_rate: f64,
}

impl Default for RollingConfig {
    fn default() -> Self {
        Self {
            window: 8,
            min_rate: 1e-6,
        }
    }
}

impl RollingConfig {
    fn validate(&self) -> Result<(), ComputeError> {
        if self.window == 0 {
            return Err(ComputeError::InvalidConfig(
                "rolling window must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Median thresholds for the field unit heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Conductance median above which the column is divided by 1000
    pub gsr_median_threshold: f64,
    /// Temperature median above which the column is divided by 10
    pub temp_median_threshold: f64,
    /// Maximum number of temperature rescaling passes
    pub temp_max_passes: usize,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            gsr_median_threshold: 50.0,
            temp_median_threshold: 80.0,
            temp_max_passes: 2,
        }
    }
}

/// Decision threshold carried by exported models
pub const PORTABLE_THRESHOLD: f64 = 0.5;

/// Split, weighting and classifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of subject groups held out for evaluation
    pub test_size: f64,
    /// Seed for the group partition draw
    pub random_state: u64,
    /// Sample weight for rows from field sessions
    pub local_weight: f64,
    /// Subject prefix marking field provenance
    pub local_prefix: String,
    /// Inverse L2 regularization strength
    pub regularization_c: f64,
    pub max_iter: usize,
    pub tol: f64,
    /// Probability at or above which a row is classified as stress
    pub threshold: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.25,
            random_state: 42,
            local_weight: 1.75,
            local_prefix: "LOCAL_".to_string(),
            regularization_c: 1.0,
            max_iter: 3000,
            tol: 1e-8,
            threshold: PORTABLE_THRESHOLD,
        }
    }
}

impl TrainingConfig {
    fn validate(&self) -> Result<(), ComputeError> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ComputeError::InvalidConfig(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if !(self.local_weight > 0.0) || !(self.regularization_c > 0.0) {
            return Err(ComputeError::InvalidConfig(
                "local_weight and regularization_c must be positive".to_string(),
            ));
        }
        if self.max_iter == 0 {
            return Err(ComputeError::InvalidConfig(
                "max_iter must be positive".to_string(),
            ));
        }
        // Portable consumers apply a fixed 0.5 cut
        if self.threshold != PORTABLE_THRESHOLD {
            return Err(ComputeError::InvalidConfig(format!(
                "threshold must be {PORTABLE_THRESHOLD}, got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}
