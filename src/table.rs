//! Feature tables
//!
//! In-memory feature table plus its delimited text form:
//! `subject, label, bpm_avg, ..., temp_slope`. Reference preparation output
//! also carries `window_start_s, window_end_s` after the subject.

use crate::error::ComputeError;
use crate::types::{FeatureRow, Features, StressLabel, WindowedRow, FEATURE_COUNT, FEATURE_NAMES};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};
use std::path::Path;

/// An ordered collection of feature rows sharing the sixteen-feature schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(rows: Vec<FeatureRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct subjects, sorted
    pub fn subjects(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.subject.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Row count per binary label, keyed "0" / "1"
    pub fn label_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.label.as_u8().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Column names of the harmonized table
    pub fn columns() -> Vec<&'static str> {
        let mut columns = vec!["subject", "label"];
        columns.extend(FEATURE_NAMES);
        columns
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ComputeError> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(Self::columns())?;
        for row in &self.rows {
            let mut record = vec![row.subject.clone(), row.label.as_u8().to_string()];
            record.extend(row.features.to_array().iter().map(|v| v.to_string()));
            csv.write_record(&record)?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn write_csv_path(&self, path: &Path) -> Result<(), ComputeError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.write_csv(std::fs::File::create(path)?)
    }

    /// Read a feature table. All harmonized columns must be present; extra
    /// columns are ignored. Rows with an unparsable label or feature are
    /// skipped.
    pub fn read_csv<R: Read>(reader: R, source_name: &str) -> Result<Self, ComputeError> {
        let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = csv.headers()?.clone();

        let columns = Self::columns();
        let positions: Vec<Option<usize>> = columns
            .iter()
            .map(|c| headers.iter().position(|h| h.trim() == *c))
            .collect();

        let mut missing: Vec<String> = columns
            .iter()
            .zip(&positions)
            .filter(|(_, p)| p.is_none())
            .map(|(c, _)| c.to_string())
            .collect();
        if !missing.is_empty() {
            missing.sort();
            return Err(ComputeError::MissingColumns {
                source_name: source_name.to_string(),
                columns: missing,
            });
        }
        let positions: Vec<usize> = positions.into_iter().flatten().collect();

        let mut rows = Vec::new();
        for record in csv.records() {
            let record = record?;
            let cell = |i: usize| record.get(positions[i]).unwrap_or("").trim();

            let subject = cell(0).to_string();
            let label = match parse_label(cell(1)) {
                Some(label) => label,
                None => continue,
            };

            let mut values = [f64::NAN; FEATURE_COUNT];
            for (k, value) in values.iter_mut().enumerate() {
                *value = cell(k + 2).parse().unwrap_or(f64::NAN);
            }

            rows.push(FeatureRow::new(subject, label, Features::from_array(values)));
        }

        Ok(Self { rows })
    }

    pub fn read_csv_path(path: &Path) -> Result<Self, ComputeError> {
        let name = path.display().to_string();
        Self::read_csv(std::fs::File::open(path)?, &name)
    }
}

/// Labels are written as integers but may come back as "1.0"
fn parse_label(s: &str) -> Option<StressLabel> {
    let value: f64 = s.parse().ok()?;
    if value.fract() != 0.0 || !(0.0..=1.0).contains(&value) {
        return None;
    }
    StressLabel::from_u8(value as u8)
}

/// Write reference preparation rows, including their window spans
pub fn write_windowed_csv<W: Write>(rows: &[WindowedRow], writer: W) -> Result<(), ComputeError> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec!["subject", "window_start_s", "window_end_s", "label"];
    header.extend(FEATURE_NAMES);
    csv.write_record(&header)?;

    for w in rows {
        let mut record = vec![
            w.row.subject.clone(),
            w.window_start_s.to_string(),
            w.window_end_s.to_string(),
            w.row.label.as_u8().to_string(),
        ];
        record.extend(w.row.features.to_array().iter().map(|v| v.to_string()));
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(subject: &str, label: StressLabel, base: f64) -> FeatureRow {
        let values: [f64; FEATURE_COUNT] = std::array::from_fn(|i| base + i as f64 * 0.5);
        FeatureRow::new(subject, label, Features::from_array(values))
    }

    #[test]
    fn test_header_order() {
        let mut buf = Vec::new();
        FeatureTable::default().write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(
            text.trim_end(),
            "subject,label,bpm_avg,bpm_min,bpm_max,bpm_std,hrv_rmssd,hrv_sdnn,gsr_avg,gsr_min,gsr_max,gsr_std,gsr_slope,temp_avg,temp_min,temp_max,temp_std,temp_slope"
        );
    }

    #[test]
    fn test_write_then_read_preserves_rows() {
        let table = FeatureTable::new(vec![
            row("S2", StressLabel::NonStress, 70.125),
            row("LOCAL_a", StressLabel::Stress, 1.0 / 3.0),
        ]);

        let mut buf = Vec::new();
        table.write_csv(&mut buf).unwrap();
        let loaded = FeatureTable::read_csv(buf.as_slice(), "mem").unwrap();

        assert_eq!(loaded, table);
    }

    #[test]
    fn test_read_reports_missing_columns() {
        let csv = "subject,label,bpm_avg\nS2,1,70\n";
        let err = FeatureTable::read_csv(csv.as_bytes(), "features.csv").unwrap_err();

        match err {
            ComputeError::MissingColumns { source_name, columns } => {
                assert_eq!(source_name, "features.csv");
                assert_eq!(columns.len(), 15);
                assert!(columns.contains(&"temp_slope".to_string()));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_windowed_output_is_readable_as_table() {
        let rows = vec![WindowedRow {
            row: row("S5", StressLabel::Stress, 2.0),
            window_start_s: 5.0,
            window_end_s: 35.0,
        }];

        let mut buf = Vec::new();
        write_windowed_csv(&rows, &mut buf).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("subject,window_start_s,window_end_s,label,bpm_avg"));

        let table = FeatureTable::read_csv(buf.as_slice(), "reference").unwrap();
        assert_eq!(table.rows, vec![rows[0].row.clone()]);
    }

    #[test]
    fn test_bad_labels_skipped_and_bad_values_undefined() {
        let mut text = FeatureTable::columns().join(",");
        text.push('\n');
        text.push_str(&format!("S2,7,{}\n", vec!["1"; 16].join(",")));
        text.push_str(&format!("S2,1.0,{}\n", vec!["1"; 16].join(",")));
        text.push_str(&format!("S3,0,inf,{}\n", vec!["1"; 15].join(",")));

        let table = FeatureTable::read_csv(text.as_bytes(), "mem").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].label, StressLabel::Stress);
        assert!(!table.rows[1].features.is_finite());
    }
}
