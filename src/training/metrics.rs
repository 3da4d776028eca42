//! Held-out evaluation metrics
//!
//! Degenerate ratios (no predicted positives, no actual positives) resolve
//! to 0 rather than failing; ROC AUC is absent when only one class is
//! present in the evaluation labels.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Precision / recall / F1 for one class, plus its support
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1_score: f64,
    pub support: u64,
}

/// Scalar entries and per-class entries share one JSON object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportEntry {
    Class(ClassReport),
    Scalar(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub accuracy: f64,
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
    pub roc_auc: Option<f64>,
    /// `[[tn, fp], [fn, tp]]`
    pub confusion_matrix: [[u64; 2]; 2],
    pub classification_report: BTreeMap<String, ReportEntry>,
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    ratio(2.0 * precision * recall, precision + recall)
}

/// `[[tn, fp], [fn, tp]]` for 0/1 labels
pub fn confusion_matrix(y_true: &[u8], y_pred: &[u8]) -> [[u64; 2]; 2] {
    let mut cm = [[0u64; 2]; 2];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        cm[usize::from(t.min(1))][usize::from(p.min(1))] += 1;
    }
    cm
}

/// Rank-based area under the ROC curve, ties sharing their average rank
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&t| t == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = avg;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = y_true
        .iter()
        .zip(&ranks)
        .filter(|(&t, _)| t == 1)
        .map(|(_, r)| r)
        .sum();
    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

impl Metrics {
    /// Compute every metric from true labels, hard predictions and scores
    pub fn compute(y_true: &[u8], y_pred: &[u8], scores: &[f64]) -> Self {
        let cm = confusion_matrix(y_true, y_pred);
        let support = cm.iter().flatten().sum::<u64>();
        let [[tn, fp], [fn_, tp]] = cm.map(|r| r.map(|v| v as f64));
        let total = support as f64;

        let accuracy = ratio(tn + tp, total);

        let class = |tp: f64, fp: f64, fn_: f64| {
            let precision = ratio(tp, tp + fp);
            let recall = ratio(tp, tp + fn_);
            ClassReport {
                precision,
                recall,
                f1_score: f1(precision, recall),
                support: (tp + fn_) as u64,
            }
        };
        let negative = class(tn, fn_, fp);
        let positive = class(tp, fp, fn_);

        let macro_avg = ClassReport {
            precision: (negative.precision + positive.precision) / 2.0,
            recall: (negative.recall + positive.recall) / 2.0,
            f1_score: (negative.f1_score + positive.f1_score) / 2.0,
            support,
        };
        let weighted = |pick: fn(&ClassReport) -> f64| {
            ratio(
                pick(&negative) * negative.support as f64
                    + pick(&positive) * positive.support as f64,
                total,
            )
        };
        let weighted_avg = ClassReport {
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1_score: weighted(|c| c.f1_score),
            support,
        };

        let mut report = BTreeMap::new();
        report.insert("0".to_string(), ReportEntry::Class(negative));
        report.insert("1".to_string(), ReportEntry::Class(positive.clone()));
        report.insert("accuracy".to_string(), ReportEntry::Scalar(accuracy));
        report.insert("macro avg".to_string(), ReportEntry::Class(macro_avg));
        report.insert("weighted avg".to_string(), ReportEntry::Class(weighted_avg));

        Self {
            accuracy,
            f1: positive.f1_score,
            precision: positive.precision,
            recall: positive.recall,
            roc_auc: roc_auc(y_true, scores),
            confusion_matrix: cm,
            classification_report: report,
        }
    }
}
