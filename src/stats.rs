//! Signal statistics
//!
//! Stateless numeric primitives shared by every feature builder:
//! - Window level/spread summaries
//! - Least-squares trend estimate
//! - Trailing (causal) rolling variants used on field sessions

use serde::{Deserialize, Serialize};

/// Level and spread of one window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation
    pub std: f64,
}

/// Mean, min, max and population std of `x`. `None` for an empty slice.
pub fn stats(x: &[f64]) -> Option<WindowStats> {
    if x.is_empty() {
        return None;
    }

    let avg = mean(x);
    let min = x.iter().copied().fold(f64::INFINITY, f64::min);
    let max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(WindowStats {
        avg,
        min,
        max,
        std: population_std(x, avg),
    })
}

/// Least-squares slope of `x` against the index 0, 1, 2, ...
///
/// Returns 0.0 for fewer than two samples.
pub fn slope(x: &[f64]) -> f64 {
    if x.len() < 2 {
        return 0.0;
    }

    let n = x.len() as f64;
    let t_mean = (n - 1.0) / 2.0;
    let y_mean = mean(x);

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in x.iter().enumerate() {
        let dt = i as f64 - t_mean;
        num += dt * (y - y_mean);
        den += dt * dt;
    }

    if den < 1e-9 {
        0.0
    } else {
        num / den
    }
}

/// Finite values strictly above `floor`
pub fn valid_rates(x: &[f64], floor: f64) -> Vec<f64> {
    x.iter().copied().filter(|v| v.is_finite() && *v > floor).collect()
}

/// Root mean square of successive differences. `None` when there is no pair.
pub fn rmssd(intervals_ms: &[f64]) -> Option<f64> {
    if intervals_ms.len() < 2 {
        return None;
    }
    let sum_sq: f64 = intervals_ms
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).powi(2))
        .sum();
    Some((sum_sq / (intervals_ms.len() - 1) as f64).sqrt())
}

pub(crate) fn mean(x: &[f64]) -> f64 {
    x.iter().sum::<f64>() / x.len() as f64
}

pub(crate) fn population_std(x: &[f64], mean: f64) -> f64 {
    let variance = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / x.len() as f64;
    variance.sqrt()
}

fn sample_std(x: &[f64]) -> f64 {
    let m = mean(x);
    let variance = x.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (x.len() - 1) as f64;
    variance.sqrt()
}

/// Trailing-window calculators. Window `i` covers rows `i+1-w ..= i`, clipped at 0.
pub mod rolling {
    use super::{population_std, rmssd, sample_std, valid_rates};

    /// Apply `f` to each trailing window of width `w`
    pub fn apply<F>(values: &[f64], w: usize, f: F) -> Vec<f64>
    where
        F: Fn(&[f64]) -> f64,
    {
        let w = w.max(1);
        (0..values.len())
            .map(|i| {
                let lo = (i + 1).saturating_sub(w);
                f(&values[lo..=i])
            })
            .collect()
    }

    pub fn min(values: &[f64], w: usize) -> Vec<f64> {
        apply(values, w, |win| {
            win.iter().copied().fold(f64::INFINITY, f64::min)
        })
    }

    pub fn max(values: &[f64], w: usize) -> Vec<f64> {
        apply(values, w, |win| {
            win.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        })
    }

    /// Sample std; 0 until two rows are available
    pub fn std(values: &[f64], w: usize) -> Vec<f64> {
        apply(values, w, |win| {
            if win.len() < 2 {
                0.0
            } else {
                sample_std(win)
            }
        })
    }

    pub fn slope(values: &[f64], w: usize) -> Vec<f64> {
        apply(values, w, super::slope)
    }

    /// RMSSD of the intervals implied by trailing pulse rates (bpm).
    /// Needs three valid rates, else 0.
    pub fn rmssd_from_rate(values: &[f64], w: usize, min_rate: f64) -> Vec<f64> {
        apply(values, w, |win| {
            let rates = valid_rates(win, min_rate);
            if rates.len() < 3 {
                return 0.0;
            }
            rmssd(&intervals_ms(&rates)).unwrap_or(0.0)
        })
    }

    /// Population std of the intervals implied by trailing pulse rates (bpm).
    /// Needs two valid rates, else 0.
    pub fn sdnn_from_rate(values: &[f64], w: usize, min_rate: f64) -> Vec<f64> {
        apply(values, w, |win| {
            let rates = valid_rates(win, min_rate);
            if rates.len() < 2 {
                return 0.0;
            }
            let rr = intervals_ms(&rates);
            population_std(&rr, super::mean(&rr))
        })
    }

    fn intervals_ms(rates: &[f64]) -> Vec<f64> {
        rates.iter().map(|bpm| 60_000.0 / bpm).collect()
    }
}
