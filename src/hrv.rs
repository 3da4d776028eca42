//! Heart-rate and HRV extraction from a pulse waveform
//!
//! A segment is standardized, pulse peaks are detected, and inter-beat
//! intervals outside the plausible range are discarded before computing:
//! - Beats per minute (average, min, max, std)
//! - RMSSD and SDNN in milliseconds
//!
//! Any insufficiency yields `None`; callers never substitute zeros.

use crate::config::ExtractorConfig;
use crate::peaks::find_peaks;
use crate::stats::{mean, population_std, rmssd, stats};
use serde::{Deserialize, Serialize};

/// Heart-rate features for one pulse segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartRateFeatures {
    pub bpm_avg: f64,
    pub bpm_min: f64,
    pub bpm_max: f64,
    pub bpm_std: f64,
    pub hrv_rmssd: f64,
    pub hrv_sdnn: f64,
}

/// Pulse-waveform feature extractor
#[derive(Debug, Clone, Default)]
pub struct HeartRateExtractor {
    config: ExtractorConfig,
}

impl HeartRateExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract features from `segment` sampled at `rate` Hz.
    ///
    /// Returns `None` when the segment is shorter than one second, fewer than
    /// two peaks are found, or fewer than two intervals survive filtering.
    pub fn extract(&self, segment: &[f64], rate: u32) -> Option<HeartRateFeatures> {
        if rate == 0 || segment.len() < rate as usize {
            return None;
        }

        let standardized = self.standardize(segment);
        let distance = ((rate as f64 * self.config.peak_distance_factor) as usize).max(1);
        let peaks = find_peaks(&standardized, distance, self.config.min_prominence);
        if peaks.len() < 2 {
            return None;
        }

        let intervals = self.valid_intervals(&peaks, rate);
        if intervals.len() < 2 {
            return None;
        }

        let bpm: Vec<f64> = intervals.iter().map(|rr| 60.0 / rr).collect();
        let bpm_stats = stats(&bpm)?;

        let rr_ms: Vec<f64> = intervals.iter().map(|rr| rr * 1000.0).collect();
        let hrv_rmssd = rmssd(&rr_ms)?;
        let hrv_sdnn = population_std(&rr_ms, mean(&rr_ms));

        Some(HeartRateFeatures {
            bpm_avg: bpm_stats.avg,
            bpm_min: bpm_stats.min,
            bpm_max: bpm_stats.max,
            bpm_std: bpm_stats.std,
            hrv_rmssd,
            hrv_sdnn,
        })
    }

    /// Center on the mean; rescale by std unless the segment is flat.
    fn standardize(&self, segment: &[f64]) -> Vec<f64> {
        let m = mean(segment);
        let centered: Vec<f64> = segment.iter().map(|v| v - m).collect();
        let scale = population_std(&centered, 0.0);

        if scale > self.config.scale_epsilon {
            centered.into_iter().map(|v| v / scale).collect()
        } else {
            centered
        }
    }

    /// Peak-to-peak gaps in seconds, restricted to the open plausible range.
    fn valid_intervals(&self, peaks: &[usize], rate: u32) -> Vec<f64> {
        peaks
            .windows(2)
            .map(|pair| (pair[1] - pair[0]) as f64 / rate as f64)
            .filter(|rr| *rr > self.config.min_interval_s && *rr < self.config.max_interval_s)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const RATE: u32 = 64;

    fn sine_pulse(bpm: f64, seconds: f64) -> Vec<f64> {
        let n = (seconds * RATE as f64) as usize;
        let freq = bpm / 60.0;
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / RATE as f64).sin())
            .collect()
    }

    /// Deterministic xorshift noise in [-1, 1)
    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state as f64 / u64::MAX as f64) * 2.0 - 1.0
            })
            .collect()
    }

    #[test]
    fn test_short_segment_is_undefined() {
        let extractor = HeartRateExtractor::default();
        let segment = sine_pulse(60.0, 0.9);

        assert!(segment.len() < RATE as usize);
        assert_eq!(extractor.extract(&segment, RATE), None);
        assert_eq!(extractor.extract(&[], RATE), None);
    }

    #[test]
    fn test_constant_segment_is_undefined() {
        let extractor = HeartRateExtractor::default();
        assert_eq!(extractor.extract(&[1.5; 640], RATE), None);
    }

    #[test]
    fn test_regular_pulse_rate() {
        let extractor = HeartRateExtractor::default();
        let features = extractor.extract(&sine_pulse(75.0, 30.0), RATE).unwrap();

        // 0.8s period sampled at 64 Hz lands on 51 or 52 sample gaps
        assert!((features.bpm_avg - 75.0).abs() < 1.5);
        assert!(features.bpm_min >= 33.3 && features.bpm_max <= 200.0);
        assert!(features.hrv_rmssd >= 0.0);
        assert!(features.hrv_sdnn >= 0.0);
        assert!(features.hrv_sdnn < 15.0);
    }

    #[test]
    fn test_bpm_bounds_across_rates() {
        let extractor = HeartRateExtractor::default();
        for bpm in [40.0, 55.0, 90.0, 120.0, 145.0] {
            if let Some(features) = extractor.extract(&sine_pulse(bpm, 30.0), RATE) {
                assert!(features.bpm_min >= 33.3, "bpm {bpm}");
                assert!(features.bpm_max <= 200.0, "bpm {bpm}");
                assert!(features.hrv_rmssd >= 0.0 && features.hrv_sdnn >= 0.0);
            }
        }
    }

    #[test]
    fn test_too_slow_pulse_is_undefined() {
        // 2.5 s between beats is outside the accepted interval range
        let extractor = HeartRateExtractor::default();
        assert_eq!(extractor.extract(&sine_pulse(24.0, 30.0), RATE), None);
    }

    #[test]
    fn test_noise_output_respects_bounds() {
        let extractor = HeartRateExtractor::default();
        let segment = noise(30 * RATE as usize, 0x9E37_79B9_7F4A_7C15);

        if let Some(features) = extractor.extract(&segment, RATE) {
            assert!(features.bpm_min > 33.3 && features.bpm_max < 200.0);
        }
    }
}
