//! Reference dataset windowing
//!
//! Slides a fixed-length window over a subject's pulse stream, maps the same
//! time span onto the conductance, temperature and label streams, and emits a
//! feature row for every window whose majority label is an in-study condition.

use crate::config::{ExtractorConfig, WindowConfig};
use crate::error::ComputeError;
use crate::hrv::HeartRateExtractor;
use crate::stats::{slope, stats};
use crate::types::{
    FeatureRow, Features, LabelStream, SensorKind, SensorStream, StressLabel, Window, WindowedRow,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use super::FeatureStrategy;

/// One subject's wrist recording
#[derive(Debug, Clone)]
pub struct ReferenceSubject {
    pub id: String,
    pub bvp: SensorStream,
    pub eda: SensorStream,
    pub temp: SensorStream,
    pub labels: LabelStream,
}

impl ReferenceSubject {
    /// Parse a subject document shaped as
    /// `{"signal": {"wrist": {"BVP": [...], "EDA": [...], "TEMP": [...]}}, "label": [...]}`.
    ///
    /// Arrays may be nested (one value per inner array); they are flattened in order.
    pub fn from_json(id: &str, json: &str, window: &WindowConfig) -> Result<Self, ComputeError> {
        let doc: SubjectDocument = serde_json::from_str(json)?;
        let wrist = doc.signal.wrist;

        let labels = flatten(doc.label).into_iter().map(|v| v as i64).collect();

        Ok(Self {
            id: id.to_string(),
            bvp: SensorStream::new(SensorKind::Bvp, window.bvp_rate, flatten(wrist.bvp)),
            eda: SensorStream::new(SensorKind::Eda, window.eda_rate, flatten(wrist.eda)),
            temp: SensorStream::new(SensorKind::Temp, window.temp_rate, flatten(wrist.temp)),
            labels: LabelStream::new(window.label_rate, labels),
        })
    }

    /// Load `<dir>/<dir name>.json`
    pub fn load(dir: &Path, window: &WindowConfig) -> Result<Self, ComputeError> {
        let id = dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ComputeError::ParseError(format!("bad subject dir {}", dir.display())))?;
        let content = std::fs::read_to_string(dir.join(format!("{id}.json")))?;
        Self::from_json(id, &content, window)
    }
}

#[derive(Deserialize)]
struct SubjectDocument {
    signal: SignalGroup,
    label: Vec<Sample>,
}

#[derive(Deserialize)]
struct SignalGroup {
    wrist: WristSignals,
}

#[derive(Deserialize)]
struct WristSignals {
    #[serde(rename = "BVP")]
    bvp: Vec<Sample>,
    #[serde(rename = "EDA")]
    eda: Vec<Sample>,
    #[serde(rename = "TEMP")]
    temp: Vec<Sample>,
}

/// One stream entry: a bare value, a one-per-row `[x]` wrapper, or null
#[derive(Deserialize)]
#[serde(untagged)]
enum Sample {
    Scalar(f64),
    Nested(Vec<f64>),
    Missing,
}

fn flatten(samples: Vec<Sample>) -> Vec<f64> {
    let mut out = Vec::with_capacity(samples.len());
    for sample in samples {
        match sample {
            Sample::Scalar(v) => out.push(v),
            Sample::Nested(values) => out.extend(values),
            Sample::Missing => out.push(f64::NAN),
        }
    }
    out
}

/// Most frequent code. Ties go to the smallest code.
pub fn majority_label(codes: &[i64]) -> Option<i64> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for &code in codes {
        *counts.entry(code).or_insert(0) += 1;
    }

    let mut best: Option<(i64, usize)> = None;
    for (code, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((code, count));
        }
    }
    best.map(|(code, _)| code)
}

/// Majority label over the label samples spanning `window`.
///
/// The label range is floored at the start and ceiled at the end. When that
/// range is empty, the single label at the floor index is used; `None` if
/// that index is past the end of the stream.
pub fn label_for_window(labels: &LabelStream, window: &Window) -> Option<i64> {
    let rate = labels.rate as f64;
    let l0 = (window.start_s() * rate).floor().max(0.0) as usize;
    let l1 = ((window.end_s() * rate).ceil() as usize).min(labels.codes.len());

    if l1 <= l0 {
        return labels.codes.get(l0).copied();
    }
    majority_label(&labels.codes[l0..l1])
}

/// Fixed-stride windowing over the reference dataset
#[derive(Debug, Clone, Default)]
pub struct ReferenceWindowing {
    window: WindowConfig,
    extractor: HeartRateExtractor,
}

impl ReferenceWindowing {
    pub fn new(window: WindowConfig, extractor: ExtractorConfig) -> Self {
        Self {
            window,
            extractor: HeartRateExtractor::new(extractor),
        }
    }

    /// Windows that fit entirely inside the pulse stream
    pub fn windows(&self, subject: &ReferenceSubject) -> Result<Vec<Window>, ComputeError> {
        let rate = subject.bvp.rate;
        let len = self.window.window_samples(rate)?;
        let step = self.window.step_samples(rate)?;
        if len == 0 || step == 0 || subject.bvp.len() < len {
            return Ok(Vec::new());
        }

        Ok((0..=subject.bvp.len() - len)
            .step_by(step)
            .map(|start| Window::new(start, start + len, rate))
            .collect())
    }

    fn target(&self, code: i64) -> Option<StressLabel> {
        if code == self.window.baseline_code {
            Some(StressLabel::NonStress)
        } else if code == self.window.stress_code {
            Some(StressLabel::Stress)
        } else {
            None
        }
    }

    /// Rows for every in-study window, with their time span. Features that
    /// could not be computed are NaN.
    pub fn windowed_rows(
        &self,
        subject: &ReferenceSubject,
    ) -> Result<Vec<WindowedRow>, ComputeError> {
        let windows = self.windows(subject)?;
        let mut rows = Vec::new();

        for window in &windows {
            let label = match label_for_window(&subject.labels, window).and_then(|c| self.target(c)) {
                Some(label) => label,
                None => continue,
            };

            let features = self.window_features(subject, window);
            rows.push(WindowedRow {
                row: FeatureRow::new(subject.id.clone(), label, features),
                window_start_s: window.start_s(),
                window_end_s: window.end_s(),
            });
        }

        debug!(
            subject = %subject.id,
            windows = windows.len(),
            labeled = rows.len(),
            "reference windows built"
        );
        Ok(rows)
    }

    fn window_features(&self, subject: &ReferenceSubject, window: &Window) -> Features {
        let pulse = subject.bvp.slice(window);
        let eda = subject.eda.slice(window);
        let temp = subject.temp.slice(window);

        let hr = self.extractor.extract(pulse, subject.bvp.rate);
        let eda_stats = stats(eda);
        let temp_stats = stats(temp);

        let nan = f64::NAN;
        Features {
            bpm_avg: hr.map_or(nan, |h| h.bpm_avg),
            bpm_min: hr.map_or(nan, |h| h.bpm_min),
            bpm_max: hr.map_or(nan, |h| h.bpm_max),
            bpm_std: hr.map_or(nan, |h| h.bpm_std),
            hrv_rmssd: hr.map_or(nan, |h| h.hrv_rmssd),
            hrv_sdnn: hr.map_or(nan, |h| h.hrv_sdnn),
            gsr_avg: eda_stats.map_or(nan, |s| s.avg),
            gsr_min: eda_stats.map_or(nan, |s| s.min),
            gsr_max: eda_stats.map_or(nan, |s| s.max),
            gsr_std: eda_stats.map_or(nan, |s| s.std),
            gsr_slope: slope(eda),
            temp_avg: temp_stats.map_or(nan, |s| s.avg),
            temp_min: temp_stats.map_or(nan, |s| s.min),
            temp_max: temp_stats.map_or(nan, |s| s.max),
            temp_std: temp_stats.map_or(nan, |s| s.std),
            temp_slope: slope(temp),
        }
    }
}

impl FeatureStrategy for ReferenceWindowing {
    type Input = ReferenceSubject;

    fn name(&self) -> &'static str {
        "reference"
    }

    fn build(&self, input: &ReferenceSubject) -> Result<Vec<FeatureRow>, ComputeError> {
        Ok(self
            .windowed_rows(input)?
            .into_iter()
            .map(|w| w.row)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::collate;
    use std::f64::consts::PI;

    fn config() -> WindowConfig {
        WindowConfig {
            window_seconds: 10,
            step_seconds: 5,
            ..Default::default()
        }
    }

    fn subject(seconds: usize, bvp: Vec<f64>, label: i64) -> ReferenceSubject {
        let cfg = config();
        ReferenceSubject {
            id: "S2".to_string(),
            bvp: SensorStream::new(SensorKind::Bvp, cfg.bvp_rate, bvp),
            eda: SensorStream::new(
                SensorKind::Eda,
                cfg.eda_rate,
                (0..seconds * 4).map(|i| 1.0 + i as f64 * 0.01).collect(),
            ),
            temp: SensorStream::new(SensorKind::Temp, cfg.temp_rate, vec![33.0; seconds * 4]),
            labels: LabelStream::new(cfg.label_rate, vec![label; seconds * 700]),
        }
    }

    fn pulse(seconds: usize) -> Vec<f64> {
        (0..seconds * 64)
            .map(|i| (2.0 * PI * 1.2 * i as f64 / 64.0).sin())
            .collect()
    }

    #[test]
    fn test_majority_label() {
        let mut codes = vec![1; 5];
        codes.extend(vec![2; 3]);
        assert_eq!(majority_label(&codes), Some(1));
        assert_eq!(majority_label(&[]), None);
    }

    #[test]
    fn test_majority_tie_prefers_smallest_code() {
        assert_eq!(majority_label(&[4, 4, 2, 2, 3]), Some(2));
        assert_eq!(majority_label(&[7, 1]), Some(1));
    }

    #[test]
    fn test_label_for_window_fallback() {
        let labels = LabelStream::new(700, vec![0, 1, 2]);

        // Empty span: falls back to the label at the floor index
        let window = Window::new(0, 0, 64);
        assert_eq!(label_for_window(&labels, &window), Some(0));

        // Span entirely past the stream end
        let window = Window::new(640, 640, 64);
        assert_eq!(label_for_window(&labels, &window), None);
    }

    #[test]
    fn test_window_stride() {
        let windowing = ReferenceWindowing::new(config(), ExtractorConfig::default());
        let windows = windowing.windows(&subject(30, pulse(30), 1)).unwrap();

        // 30 s recording, 10 s windows every 5 s
        assert_eq!(windows.len(), 5);
        assert_eq!(windows[1].start, 320);
        assert_eq!(windows[4].end, 30 * 64);
    }

    #[test]
    fn test_short_recording_has_no_windows() {
        let windowing = ReferenceWindowing::new(config(), ExtractorConfig::default());
        assert!(windowing.windows(&subject(5, pulse(5), 1)).unwrap().is_empty());
    }

    #[test]
    fn test_rows_labeled_and_complete() {
        let windowing = ReferenceWindowing::new(config(), ExtractorConfig::default());
        let rows = windowing.windowed_rows(&subject(30, pulse(30), 2)).unwrap();

        assert_eq!(rows.len(), 5);
        for w in &rows {
            assert_eq!(w.row.label, StressLabel::Stress);
            assert!(w.row.is_valid());
            assert!((w.row.features.bpm_avg - 72.0).abs() < 2.0);
            assert!((w.row.features.temp_avg - 33.0).abs() < 1e-9);
            assert!(w.row.features.temp_slope.abs() < 1e-12);
            assert!((w.row.features.gsr_slope - 0.01).abs() < 1e-9);
        }
        assert_eq!(rows[2].window_start_s, 10.0);
        assert_eq!(rows[2].window_end_s, 20.0);
    }

    #[test]
    fn test_out_of_study_labels_are_discarded() {
        let windowing = ReferenceWindowing::new(config(), ExtractorConfig::default());
        assert!(windowing.windowed_rows(&subject(30, pulse(30), 0)).unwrap().is_empty());
        assert!(windowing.windowed_rows(&subject(30, pulse(30), 3)).unwrap().is_empty());
    }

    #[test]
    fn test_flat_pulse_rows_are_dropped_on_collation() {
        let windowing = ReferenceWindowing::new(config(), ExtractorConfig::default());
        let rows = windowing.build(&subject(30, vec![0.25; 30 * 64], 1)).unwrap();

        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r.features.bpm_avg.is_nan()));
        assert!(collate(rows).is_empty());
    }

    #[test]
    fn test_from_json_flattens_nested_arrays() {
        let json = r#"{
            "signal": {"wrist": {"BVP": [[0.1], [0.2], [0.3]], "EDA": [[1.0], [1.1]], "TEMP": [[33.0], [33.1]]}},
            "label": [0, 1, 1, 2.0]
        }"#;
        let subject = ReferenceSubject::from_json("S3", json, &WindowConfig::default()).unwrap();

        assert_eq!(subject.bvp.samples, vec![0.1, 0.2, 0.3]);
        assert_eq!(subject.eda.rate, 4);
        assert_eq!(subject.labels.codes, vec![0, 1, 1, 2]);
        assert_eq!(subject.labels.rate, 700);
    }

    #[test]
    fn test_from_json_mixed_entries() {
        let json = r#"{
            "signal": {"wrist": {"BVP": [0.5, [0.6], null], "EDA": [], "TEMP": [[33.0, 33.1]]}},
            "label": [[1], 2]
        }"#;
        let subject = ReferenceSubject::from_json("S4", json, &WindowConfig::default()).unwrap();

        assert_eq!(subject.bvp.samples.len(), 3);
        assert_eq!(subject.bvp.samples[..2], [0.5, 0.6]);
        assert!(subject.bvp.samples[2].is_nan());
        assert!(subject.eda.samples.is_empty());
        assert_eq!(subject.temp.samples, vec![33.0, 33.1]);
        assert_eq!(subject.labels.codes, vec![1, 2]);
    }

    #[test]
    fn test_from_json_rejects_text_samples() {
        let json = r#"{"signal": {"wrist": {"BVP": ["a"], "EDA": [1.0], "TEMP": [1.0]}}, "label": [1]}"#;
        assert!(ReferenceSubject::from_json("S3", json, &WindowConfig::default()).is_err());
    }

    #[test]
    fn test_oversized_window_is_an_error() {
        let cfg = WindowConfig {
            window_seconds: u32::MAX,
            ..config()
        };
        let windowing = ReferenceWindowing::new(cfg, ExtractorConfig::default());
        assert!(matches!(
            windowing.windows(&subject(30, pulse(30), 1)),
            Err(ComputeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_from_json_missing_stream_fails() {
        let json = r#"{"signal": {"wrist": {"BVP": [1.0], "EDA": [1.0]}}, "label": [1]}"#;
        assert!(ReferenceSubject::from_json("S3", json, &WindowConfig::default()).is_err());
    }
}
