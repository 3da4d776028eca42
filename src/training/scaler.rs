//! Per-feature standardization fitted on the training partition

use crate::error::ComputeError;
use crate::stats::{mean, population_std};
use crate::types::FEATURE_COUNT;
use serde::{Deserialize, Serialize};

/// Column means and scales; a constant column keeps scale 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &[[f64; FEATURE_COUNT]]) -> Result<Self, ComputeError> {
        if x.is_empty() {
            return Err(ComputeError::NoRows("cannot fit scaler on zero rows".to_string()));
        }

        let mut means = Vec::with_capacity(FEATURE_COUNT);
        let mut scales = Vec::with_capacity(FEATURE_COUNT);
        for j in 0..FEATURE_COUNT {
            let column: Vec<f64> = x.iter().map(|row| row[j]).collect();
            let m = mean(&column);
            let s = population_std(&column, m);
            means.push(m);
            scales.push(if is_constant(s, m, column.len()) { 1.0 } else { s });
        }

        Ok(Self {
            mean: means,
            scale: scales,
        })
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    pub fn transform(&self, x: &[[f64; FEATURE_COUNT]]) -> Vec<Vec<f64>> {
        x.iter().map(|row| self.transform_row(row)).collect()
    }
}

/// Variance within the rounding error of summing `n` copies of `mean`.
///
/// Averaging a constant column rarely reproduces the constant exactly, so the
/// std of such a column is a tiny residue rather than 0.
fn is_constant(std: f64, mean: f64, n: usize) -> bool {
    let n = n as f64;
    let var = std * std;
    let eps = f64::EPSILON;
    var <= n * eps * var + (n * mean * eps).powi(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_centers_and_scales() {
        let mut a = [0.0; FEATURE_COUNT];
        let mut b = [0.0; FEATURE_COUNT];
        a[0] = 1.0;
        b[0] = 3.0;
        a[1] = 5.0;
        b[1] = 5.0;

        let scaler = StandardScaler::fit(&[a, b]).unwrap();
        assert_eq!(scaler.mean[0], 2.0);
        assert_eq!(scaler.scale[0], 1.0);
        assert_eq!(scaler.mean[1], 5.0);
        // constant column
        assert_eq!(scaler.scale[1], 1.0);

        let z = scaler.transform(&[a, b]);
        assert_eq!(z[0][0], -1.0);
        assert_eq!(z[1][0], 1.0);
        assert_eq!(z[0][1], 0.0);
    }

    #[test]
    fn test_population_scale() {
        let rows: Vec<[f64; FEATURE_COUNT]> = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]
            .iter()
            .map(|&v| [v; FEATURE_COUNT])
            .collect();

        let scaler = StandardScaler::fit(&rows).unwrap();
        assert!((scaler.scale[3] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_rounding_residue_treated_as_constant() {
        let rows: Vec<[f64; FEATURE_COUNT]> = (0..10)
            .map(|i| {
                let mut row = [i as f64; FEATURE_COUNT];
                row[6] = 0.1;
                row[11] = 33.3;
                row
            })
            .collect();

        let scaler = StandardScaler::fit(&rows).unwrap();
        assert_eq!(scaler.scale[6], 1.0);
        assert_eq!(scaler.scale[11], 1.0);
        assert!((scaler.scale[0] - 8.25f64.sqrt()).abs() < 1e-12);

        let z = scaler.transform_row(&rows[3]);
        assert!(z[11].abs() < 1e-12);
        assert!(z[6].abs() < 1e-12);
    }

    #[test]
    fn test_small_real_spread_kept() {
        let rows: Vec<[f64; FEATURE_COUNT]> = [33.3, 33.30001]
            .iter()
            .map(|&v| [v; FEATURE_COUNT])
            .collect();

        let scaler = StandardScaler::fit(&rows).unwrap();
        assert!((scaler.scale[0] - 0.000005).abs() < 1e-9);
    }

    #[test]
    fn test_empty_rejected() {
        assert!(StandardScaler::fit(&[]).is_err());
    }
}
