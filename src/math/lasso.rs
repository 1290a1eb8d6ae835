//! L1-penalized least squares (LASSO) by coordinate descent.
//!
//! Objective, for each penalty `λ` on the grid:
//!
//! ```text
//! minimize (1/2n) Σ (y_i - b - z_i^T w)^2 + λ Σ |w_j|
//! ```
//!
//! The intercept `b` is never penalized. With `standardize = true` the penalty
//! applies to coefficients of unit-variance columns and the reported
//! coefficients are mapped back to the original scale.
//!
//! Implementation notes:
//! - Covariance updates: the Gram matrix `G = UᵀU/n` and `c = Uᵀ(y - ȳ)/n` are
//!   computed once per dataset, so a sweep costs `O(p²)` regardless of `n`.
//! - The grid is solved from the largest to the smallest `λ`, each solve warm
//!   started from the previous one. Results come back in the caller's order.
//! - At `λ = 0` the minimizer is the OLS solution, so the two fits agree up to
//!   the convergence tolerance.

use nalgebra::{DMatrix, DVector};

/// Columns whose standard deviation falls below this are treated as constant.
const CONSTANT_SD: f64 = 1e-12;

/// Coordinate-descent settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LassoOptions {
    pub standardize: bool,
    /// Upper bound on full passes over the coefficients, per `λ`.
    pub max_sweeps: usize,
    /// Stop when the largest scaled coefficient step falls below this
    /// (relative to the largest scaled coefficient, floored at 1).
    pub tol: f64,
}

impl Default for LassoOptions {
    fn default() -> Self {
        Self {
            standardize: true,
            max_sweeps: 100_000,
            tol: 1e-12,
        }
    }
}

/// Solution at one penalty strength.
#[derive(Debug, Clone, PartialEq)]
pub struct LassoFit {
    pub lambda: f64,
    pub intercept: f64,
    pub coefs: Vec<f64>,
    pub sweeps: usize,
}

impl LassoFit {
    pub fn nonzero(&self) -> usize {
        self.coefs.iter().filter(|w| **w != 0.0).count()
    }
}

/// Coordinate descent hit `max_sweeps` without meeting the tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct NotConverged {
    pub lambda: f64,
    pub sweeps: usize,
}

impl std::fmt::Display for NotConverged {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "coordinate descent did not converge at lambda={} after {} sweeps",
            self.lambda, self.sweeps
        )
    }
}

/// Centered/scaled sufficient statistics of one dataset.
struct Standardized {
    means: Vec<f64>,
    scales: Vec<f64>,
    active: Vec<bool>,
    y_mean: f64,
    gram: DMatrix<f64>,
    cov: Vec<f64>,
}

fn standardize(z: &DMatrix<f64>, y: &DVector<f64>, scale: bool) -> Standardized {
    let (n, p) = z.shape();
    let nf = n as f64;
    let y_mean = y.mean();

    let means: Vec<f64> = (0..p).map(|j| z.column(j).mean()).collect();
    let sds: Vec<f64> = (0..p)
        .map(|j| {
            let m = means[j];
            (z.column(j).iter().map(|v| (v - m) * (v - m)).sum::<f64>() / nf).sqrt()
        })
        .collect();
    let active: Vec<bool> = sds.iter().map(|&s| s > CONSTANT_SD).collect();
    let scales: Vec<f64> = sds
        .iter()
        .zip(active.iter())
        .map(|(&s, &a)| if scale && a { s } else { 1.0 })
        .collect();

    let u = DMatrix::from_fn(n, p, |i, j| (z[(i, j)] - means[j]) / scales[j]);
    let gram = u.tr_mul(&u) / nf;
    let yc = y.map(|v| v - y_mean);
    let cov: Vec<f64> = (u.tr_mul(&yc) / nf).iter().copied().collect();

    Standardized {
        means,
        scales,
        active,
        y_mean,
        gram,
        cov,
    }
}

fn soft_threshold(r: f64, lambda: f64) -> f64 {
    if r > lambda {
        r - lambda
    } else if r < -lambda {
        r + lambda
    } else {
        0.0
    }
}

/// Smallest `λ` at which every coefficient is zero.
pub fn lambda_max(z: &DMatrix<f64>, y: &DVector<f64>, standardize_columns: bool) -> f64 {
    let s = standardize(z, y, standardize_columns);
    s.cov
        .iter()
        .zip(s.active.iter())
        .filter(|(_, a)| **a)
        .map(|(c, _)| c.abs())
        .fold(0.0, f64::max)
}

/// Fit the whole `λ` grid on one dataset.
pub fn lasso_path(
    z: &DMatrix<f64>,
    y: &DVector<f64>,
    lambdas: &[f64],
    opts: &LassoOptions,
) -> Result<Vec<LassoFit>, NotConverged> {
    let p = z.ncols();
    let s = standardize(z, y, opts.standardize);

    let mut order: Vec<usize> = (0..lambdas.len()).collect();
    order.sort_by(|&a, &b| {
        lambdas[b]
            .partial_cmp(&lambdas[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut beta = vec![0.0; p];
    let mut fits: Vec<Option<LassoFit>> = vec![None; lambdas.len()];

    for idx in order {
        let lambda = lambdas[idx];
        let sweeps = descend(&s, lambda, &mut beta, opts)?;

        let coefs: Vec<f64> = beta
            .iter()
            .zip(s.scales.iter())
            .map(|(b, sc)| b / sc)
            .collect();
        let intercept = s.y_mean
            - coefs
                .iter()
                .zip(s.means.iter())
                .map(|(w, m)| w * m)
                .sum::<f64>();

        fits[idx] = Some(LassoFit {
            lambda,
            intercept,
            coefs,
            sweeps,
        });
    }

    Ok(fits.into_iter().flatten().collect())
}

/// Run coordinate descent in place from the current `beta`. Returns sweeps used.
fn descend(
    s: &Standardized,
    lambda: f64,
    beta: &mut [f64],
    opts: &LassoOptions,
) -> Result<usize, NotConverged> {
    let p = beta.len();
    for sweep in 1..=opts.max_sweeps {
        let mut max_step = 0.0_f64;
        let mut max_coef = 0.0_f64;
        for j in 0..p {
            if !s.active[j] {
                beta[j] = 0.0;
                continue;
            }
            let gjj = s.gram[(j, j)];
            let mut r = s.cov[j];
            for k in 0..p {
                if k != j {
                    r -= s.gram[(j, k)] * beta[k];
                }
            }
            let next = soft_threshold(r, lambda) / gjj;
            let step = (next - beta[j]).abs() * gjj.sqrt();
            max_step = max_step.max(step);
            max_coef = max_coef.max(next.abs() * gjj.sqrt());
            beta[j] = next;
        }
        if max_step < opts.tol * max_coef.max(1.0) {
            return Ok(sweep);
        }
    }
    Err(NotConverged {
        lambda,
        sweeps: opts.max_sweeps,
    })
}
