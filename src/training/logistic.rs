//! L2-regularized binary logistic regression
//!
//! Minimizes `0.5 * |w|^2 + C * sum_i s_i * logloss_i` over coefficients `w`
//! and an unpenalized intercept, using Newton steps with a backtracking line
//! search. With at most a few dozen parameters the dense Hessian is cheap.

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Solver settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// Inverse regularization strength
    pub c: f64,
    pub max_iter: usize,
    /// Stop once half the squared Newton decrement drops below this
    pub tol: f64,
}

/// Fitted coefficients in standardized feature space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub coef: Vec<f64>,
    pub intercept: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl LogisticModel {
    pub fn decision(&self, z: &[f64]) -> f64 {
        affine(&self.coef, self.intercept, z)
    }

    pub fn predict_proba(&self, z: &[f64]) -> f64 {
        sigmoid(self.decision(z))
    }
}

pub(crate) fn affine(coef: &[f64], intercept: f64, z: &[f64]) -> f64 {
    coef.iter().zip(z).map(|(w, v)| w * v).sum::<f64>() + intercept
}

pub(crate) fn sigmoid(t: f64) -> f64 {
    if t >= 0.0 {
        1.0 / (1.0 + (-t).exp())
    } else {
        let e = t.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^t)` without overflow
fn softplus(t: f64) -> f64 {
    if t > 0.0 {
        t + (-t).exp().ln_1p()
    } else {
        t.exp().ln_1p()
    }
}

struct Problem<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    s: &'a [f64],
    inv_c: f64,
    dim: usize,
}

impl Problem<'_> {
    /// Objective divided by C
    fn objective(&self, theta: &[f64]) -> f64 {
        let (w, b) = theta.split_at(self.dim);
        let penalty = 0.5 * self.inv_c * w.iter().map(|v| v * v).sum::<f64>();
        let loss: f64 = self
            .x
            .iter()
            .zip(self.y.iter().zip(self.s))
            .map(|(row, (y, s))| {
                let t = affine(w, b[0], row);
                s * (softplus(t) - y * t)
            })
            .sum();
        loss + penalty
    }

    fn gradient_and_hessian(&self, theta: &[f64]) -> (Vec<f64>, Vec<Vec<f64>>) {
        let n = self.dim + 1;
        let (w, b) = theta.split_at(self.dim);
        let mut grad = vec![0.0; n];
        let mut hess = vec![vec![0.0; n]; n];

        for (row, (y, s)) in self.x.iter().zip(self.y.iter().zip(self.s)) {
            let p = sigmoid(affine(w, b[0], row));
            let r = s * (p - y);
            let h = s * p * (1.0 - p);
            for j in 0..n {
                let xj = if j < self.dim { row[j] } else { 1.0 };
                grad[j] += r * xj;
                for k in 0..=j {
                    let xk = if k < self.dim { row[k] } else { 1.0 };
                    hess[j][k] += h * xj * xk;
                }
            }
        }

        for j in 0..self.dim {
            grad[j] += self.inv_c * w[j];
            hess[j][j] += self.inv_c;
        }
        for j in 0..n {
            for k in 0..j {
                hess[k][j] = hess[j][k];
            }
        }
        (grad, hess)
    }
}

/// Fit on standardized rows `x` with 0/1 targets and positive sample weights.
pub fn fit(
    x: &[Vec<f64>],
    y: &[f64],
    weights: &[f64],
    options: SolverOptions,
) -> Result<LogisticModel, ComputeError> {
    if x.is_empty() || x.len() != y.len() || x.len() != weights.len() {
        return Err(ComputeError::ModelError(format!(
            "inconsistent training shapes: {} rows, {} targets, {} weights",
            x.len(),
            y.len(),
            weights.len()
        )));
    }
    let has_pos = y.iter().any(|&v| v == 1.0);
    let has_neg = y.iter().any(|&v| v == 0.0);
    if !(has_pos && has_neg) {
        return Err(ComputeError::SingleClass("training".to_string()));
    }

    let dim = x[0].len();
    let problem = Problem {
        x,
        y,
        s: weights,
        inv_c: 1.0 / options.c,
        dim,
    };

    let mut theta = vec![0.0; dim + 1];
    let mut f = problem.objective(&theta);
    let mut converged = false;
    let mut iterations = 0;

    while iterations < options.max_iter {
        iterations += 1;
        let (grad, hess) = problem.gradient_and_hessian(&theta);
        let neg_grad: Vec<f64> = grad.iter().map(|g| -g).collect();
        let step = solve_spd(&hess, &neg_grad)?;

        let decrement: f64 = -grad.iter().zip(&step).map(|(g, d)| g * d).sum::<f64>();
        if decrement / 2.0 < options.tol {
            converged = true;
            break;
        }

        let mut t = 1.0;
        let mut accepted = false;
        for _ in 0..60 {
            let candidate: Vec<f64> = theta.iter().zip(&step).map(|(v, d)| v + t * d).collect();
            let fc = problem.objective(&candidate);
            if fc <= f - 0.25 * t * decrement {
                theta = candidate;
                f = fc;
                accepted = true;
                break;
            }
            t *= 0.5;
        }
        if !accepted {
            // No descent possible at machine precision
            converged = true;
            break;
        }
    }

    if converged {
        debug!(iterations, objective = f, "logistic solver converged");
    } else {
        warn!(iterations, "logistic solver hit max_iter before converging");
    }

    let intercept = theta[dim];
    theta.truncate(dim);
    Ok(LogisticModel {
        coef: theta,
        intercept,
        iterations,
        converged,
    })
}

/// Solve `a * x = b` for symmetric positive definite `a` by Cholesky,
/// adding diagonal jitter if the factorization breaks down.
fn solve_spd(a: &[Vec<f64>], b: &[f64]) -> Result<Vec<f64>, ComputeError> {
    let mut jitter = 0.0;
    for _ in 0..8 {
        if let Some(l) = cholesky(a, jitter) {
            let n = b.len();
            let mut z = vec![0.0; n];
            for i in 0..n {
                let s: f64 = (0..i).map(|k| l[i][k] * z[k]).sum();
                z[i] = (b[i] - s) / l[i][i];
            }
            let mut x = vec![0.0; n];
            for i in (0..n).rev() {
                let s: f64 = (i + 1..n).map(|k| l[k][i] * x[k]).sum();
                x[i] = (z[i] - s) / l[i][i];
            }
            return Ok(x);
        }
        jitter = if jitter == 0.0 { 1e-10 } else { jitter * 100.0 };
    }
    Err(ComputeError::ModelError(
        "Hessian is not positive definite".to_string(),
    ))
}

fn cholesky(a: &[Vec<f64>], jitter: f64) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let s: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let d = a[i][i] + jitter - s;
                if !(d > 0.0) || !d.is_finite() {
                    return None;
                }
                l[i][i] = d.sqrt();
            } else {
                l[i][j] = (a[i][j] - s) / l[j][j];
            }
        }
    }
    Some(l)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> SolverOptions {
        SolverOptions {
            c: 1.0,
            max_iter: 100,
            tol: 1e-10,
        }
    }

    fn dataset() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x = vec![
            vec![-2.0, 0.5],
            vec![-1.5, -0.3],
            vec![-1.0, 0.1],
            vec![-0.2, 0.9],
            vec![0.3, -0.8],
            vec![1.0, 0.2],
            vec![1.4, -0.1],
            vec![2.2, 0.4],
        ];
        let y = vec![0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_gradient_vanishes_at_solution() {
        let (x, y) = dataset();
        let s = vec![1.0; x.len()];
        let model = fit(&x, &y, &s, options()).unwrap();
        assert!(model.converged);

        let mut grad = vec![0.0; 3];
        for (row, yi) in x.iter().zip(&y) {
            let r = model.predict_proba(row) - yi;
            grad[0] += r * row[0];
            grad[1] += r * row[1];
            grad[2] += r;
        }
        grad[0] += model.coef[0];
        grad[1] += model.coef[1];

        for g in grad {
            assert!(g.abs() < 1e-6, "gradient component {g}");
        }
        assert!(model.coef[0] > 0.0);
    }

    #[test]
    fn test_weight_equals_duplication() {
        let (x, y) = dataset();
        let mut weights = vec![1.0; x.len()];
        weights[3] = 2.0;
        let weighted = fit(&x, &y, &weights, options()).unwrap();

        let mut xd = x.clone();
        let mut yd = y.clone();
        xd.push(x[3].clone());
        yd.push(y[3]);
        let duplicated = fit(&xd, &yd, &vec![1.0; xd.len()], options()).unwrap();

        for (a, b) in weighted.coef.iter().zip(&duplicated.coef) {
            assert!((a - b).abs() < 1e-8);
        }
        assert!((weighted.intercept - duplicated.intercept).abs() < 1e-8);
    }

    #[test]
    fn test_separable_data_stays_bounded() {
        let x = vec![vec![-1.0], vec![-0.5], vec![0.5], vec![1.0]];
        let y = vec![0.0, 0.0, 1.0, 1.0];
        let model = fit(&x, &y, &[1.0; 4], options()).unwrap();

        assert!(model.converged);
        assert!(model.coef[0].is_finite() && model.coef[0] > 0.0);
        assert!(model.intercept.abs() < 1e-8);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = vec![vec![0.0], vec![1.0]];
        assert!(matches!(
            fit(&x, &[1.0, 1.0], &[1.0, 1.0], options()),
            Err(ComputeError::SingleClass(_))
        ));
    }

    #[test]
    fn test_sigmoid_is_stable() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(-800.0) >= 0.0);
        assert_eq!(sigmoid(800.0), 1.0);
    }
}
