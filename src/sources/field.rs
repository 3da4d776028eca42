//! Field session features
//!
//! Field logs already carry one averaged reading per row. Rows are ordered by
//! time, units are normalized, activity labels mapped to the binary target, and
//! every row gets causal trailing-window features over the rows before it.

use crate::config::{NormalizationConfig, RollingConfig};
use crate::error::ComputeError;
use crate::normalizer::UnitNormalizer;
use crate::sources::collate;
use crate::stats::rolling;
use crate::types::{FeatureRow, Features, StressLabel};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::cmp::Ordering;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use super::FeatureStrategy;

/// Columns every field session table must carry
pub const FIELD_REQUIRED_COLUMNS: [&str; 6] =
    ["time_iso", "ts", "bpm_avg", "gsr_avg", "temp_avg", "label"];

/// One parsed row of a field session. Unparsable cells are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRecord {
    pub time: Option<NaiveDateTime>,
    pub ts: Option<f64>,
    pub bpm_avg: Option<f64>,
    pub gsr_avg: Option<f64>,
    pub temp_avg: Option<f64>,
    pub label: String,
}

/// A single field session
#[derive(Debug, Clone)]
pub struct FieldSession {
    /// Session name, taken from the file stem
    pub name: String,
    pub records: Vec<FieldRecord>,
}

impl FieldSession {
    /// Parse a delimited session table. Missing required columns are fatal.
    pub fn from_reader<R: Read>(name: &str, reader: R) -> Result<Self, ComputeError> {
        let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = csv.headers()?.clone();

        let position = |column: &str| headers.iter().position(|h| h.trim() == column);
        let missing: Vec<String> = FIELD_REQUIRED_COLUMNS
            .iter()
            .filter(|c| position(**c).is_none())
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ComputeError::MissingColumns {
                source_name: format!("{name}.csv"),
                columns: missing,
            });
        }

        let [time_i, ts_i, bpm_i, gsr_i, temp_i, label_i] =
            FIELD_REQUIRED_COLUMNS.map(|c| position(c).unwrap_or_default());

        let mut records = Vec::new();
        for record in csv.records() {
            let record = record?;
            let cell = |i: usize| record.get(i).unwrap_or("").trim();
            records.push(FieldRecord {
                time: parse_timestamp(cell(time_i)),
                ts: parse_number(cell(ts_i)),
                bpm_avg: parse_number(cell(bpm_i)),
                gsr_avg: parse_number(cell(gsr_i)),
                temp_avg: parse_number(cell(temp_i)),
                label: cell(label_i).to_string(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            records,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, ComputeError> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ComputeError::ParseError(format!("bad session path {}", path.display())))?;
        let file = std::fs::File::open(path)?;
        Self::from_reader(name, file)
    }
}

/// Parse RFC 3339 or naive `YYYY-MM-DD[ T]HH:MM:SS[.f]` / `YYYY-MM-DD`.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Map a free-text activity label to the binary target
pub fn map_activity_label(label: &str) -> Option<StressLabel> {
    match label.trim().to_lowercase().as_str() {
        "rest" | "recovery" | "unlabeled" => Some(StressLabel::NonStress),
        "stress_task" | "stress" => Some(StressLabel::Stress),
        _ => None,
    }
}

/// Missing values sort after present ones
fn cmp_missing_last<T: PartialOrd>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Trailing-window feature builder for field sessions
#[derive(Debug, Clone)]
pub struct FieldSessionBuilder {
    rolling: RollingConfig,
    normalization: NormalizationConfig,
    subject_prefix: String,
}

impl Default for FieldSessionBuilder {
    fn default() -> Self {
        Self::new(
            RollingConfig::default(),
            NormalizationConfig::default(),
            "LOCAL_",
        )
    }
}

impl FieldSessionBuilder {
    pub fn new(
        rolling: RollingConfig,
        normalization: NormalizationConfig,
        subject_prefix: impl Into<String>,
    ) -> Self {
        Self {
            rolling,
            normalization,
            subject_prefix: subject_prefix.into(),
        }
    }

    /// Subject identifier marking field provenance
    pub fn subject_for(&self, session: &FieldSession) -> String {
        format!("{}{}", self.subject_prefix, session.name)
    }
}

impl FeatureStrategy for FieldSessionBuilder {
    type Input = FieldSession;

    fn name(&self) -> &'static str {
        "field"
    }

    fn build(&self, session: &FieldSession) -> Result<Vec<FeatureRow>, ComputeError> {
        let mut records = session.records.clone();
        records.sort_by(|a, b| {
            cmp_missing_last(&a.time, &b.time).then_with(|| cmp_missing_last(&a.ts, &b.ts))
        });

        let gsr: Vec<Option<f64>> = records.iter().map(|r| r.gsr_avg).collect();
        let temp: Vec<Option<f64>> = records.iter().map(|r| r.temp_avg).collect();
        let gsr = UnitNormalizer::conductance(&gsr, &self.normalization);
        let temp = UnitNormalizer::temperature(&temp, &self.normalization);
        if gsr.decision.is_rescaled() || temp.decision.is_rescaled() {
            warn!(
                session = %session.name,
                gsr = ?gsr.decision,
                temp = ?temp.decision,
                "field units normalized"
            );
        }

        // Only complete, labeled rows take part in the rolling windows
        let mut labels = Vec::new();
        let mut bpm = Vec::new();
        let mut eda = Vec::new();
        let mut skin = Vec::new();
        for (i, record) in records.iter().enumerate() {
            let label = map_activity_label(&record.label);
            if let (Some(label), Some(b), Some(g), Some(t)) =
                (label, record.bpm_avg, gsr.values[i], temp.values[i])
            {
                labels.push(label);
                bpm.push(b);
                eda.push(g);
                skin.push(t);
            }
        }

        let w = self.rolling.window;
        let bpm_min = rolling::min(&bpm, w);
        let bpm_max = rolling::max(&bpm, w);
        let bpm_std = rolling::std(&bpm, w);
        let rmssd = rolling::rmssd_from_rate(&bpm, w, self.rolling.min_rate);
        let sdnn = rolling::sdnn_from_rate(&bpm, w, self.rolling.min_rate);
        let gsr_min = rolling::min(&eda, w);
        let gsr_max = rolling::max(&eda, w);
        let gsr_std = rolling::std(&eda, w);
        let gsr_slope = rolling::slope(&eda, w);
        let temp_min = rolling::min(&skin, w);
        let temp_max = rolling::max(&skin, w);
        let temp_std = rolling::std(&skin, w);
        let temp_slope = rolling::slope(&skin, w);

        let subject = self.subject_for(session);
        let rows: Vec<FeatureRow> = (0..labels.len())
            .map(|i| {
                let features = Features {
                    bpm_avg: bpm[i],
                    bpm_min: bpm_min[i],
                    bpm_max: bpm_max[i],
                    bpm_std: bpm_std[i],
                    hrv_rmssd: rmssd[i],
                    hrv_sdnn: sdnn[i],
                    gsr_avg: eda[i],
                    gsr_min: gsr_min[i],
                    gsr_max: gsr_max[i],
                    gsr_std: gsr_std[i],
                    gsr_slope: gsr_slope[i],
                    temp_avg: skin[i],
                    temp_min: temp_min[i],
                    temp_max: temp_max[i],
                    temp_std: temp_std[i],
                    temp_slope: temp_slope[i],
                };
                FeatureRow::new(subject.clone(), labels[i], features)
            })
            .collect();

        let kept = collate(rows);
        debug!(
            session = %session.name,
            records = session.records.len(),
            kept = kept.len(),
            "field session built"
        );
        Ok(kept)
    }
}
