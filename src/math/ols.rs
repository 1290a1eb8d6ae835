//! Ordinary least squares with an explicit rank check.
//!
//! Every simulation run solves a handful of small regression problems:
//!
//! ```text
//! minimize Σ (y_i - b - z_i^T w)^2
//! ```
//!
//! Implementation choices:
//! - We prepend an intercept column and solve with SVD, which handles tall
//!   designs robustly. (Nalgebra's `QR::solve` is intended for square systems.)
//! - A singular design is reported, not answered with a minimum-norm solution:
//!   that would mix a different estimator into the statistics.

use nalgebra::{DMatrix, DVector};

/// Relative singular-value cutoff used for the rank decision.
const RANK_RTOL: f64 = 1e-10;

/// Why a least-squares problem could not be solved.
#[derive(Debug, Clone, PartialEq)]
pub enum LstsqError {
    /// Fewer observations than parameters.
    Underdetermined { rows: usize, cols: usize },
    /// Numerical rank below the column count.
    RankDeficient { rank: usize, cols: usize },
    /// SVD solve failed or produced non-finite coefficients.
    Numerical(String),
}

impl std::fmt::Display for LstsqError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LstsqError::Underdetermined { rows, cols } => {
                write!(f, "{cols} parameters but only {rows} observations")
            }
            LstsqError::RankDeficient { rank, cols } => {
                write!(f, "design matrix has rank {rank} < {cols} columns")
            }
            LstsqError::Numerical(msg) => write!(f, "{msg}"),
        }
    }
}

/// Solve a full-rank least squares problem using SVD.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<DVector<f64>, LstsqError> {
    let (rows, cols) = x.shape();
    if rows < cols {
        return Err(LstsqError::Underdetermined { rows, cols });
    }

    let svd = x.clone().svd(true, true);
    let sigma_max = svd.singular_values.max();
    let eps = (sigma_max * RANK_RTOL).max(f64::MIN_POSITIVE);
    let rank = svd.rank(eps);
    if rank < cols {
        return Err(LstsqError::RankDeficient { rank, cols });
    }

    let beta = svd
        .solve(y, eps)
        .map_err(|e| LstsqError::Numerical(e.to_string()))?;
    if beta.iter().all(|v| v.is_finite()) {
        Ok(beta)
    } else {
        Err(LstsqError::Numerical("non-finite coefficients".to_string()))
    }
}

/// Intercept and slopes of an OLS fit on an expanded design `z`.
pub fn fit_ols(z: &DMatrix<f64>, y: &DVector<f64>) -> Result<(f64, Vec<f64>), LstsqError> {
    let n = z.nrows();
    let p = z.ncols();
    let design = DMatrix::from_fn(n, p + 1, |i, j| if j == 0 { 1.0 } else { z[(i, j - 1)] });
    let beta = solve_least_squares(&design, y)?;
    Ok((beta[0], beta.iter().skip(1).copied().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn fit_ols_adds_intercept() {
        let z = DMatrix::from_row_slice(4, 1, &[0.0, 1.0, 2.0, 3.0]);
        let y = DVector::from_row_slice(&[1.0, 0.5, 0.0, -0.5]);
        let (b, w) = fit_ols(&z, &y).unwrap();
        assert!((b - 1.0).abs() < 1e-12);
        assert!((w[0] + 0.5).abs() < 1e-12);
    }

    #[test]
    fn more_parameters_than_rows_is_underdetermined() {
        let z = DMatrix::from_row_slice(2, 2, &[0.1, 0.2, 0.3, 0.5]);
        let y = DVector::from_row_slice(&[1.0, 2.0]);
        assert_eq!(
            fit_ols(&z, &y).unwrap_err(),
            LstsqError::Underdetermined { rows: 2, cols: 3 }
        );
    }

    #[test]
    fn constant_column_is_rank_deficient() {
        // The second feature duplicates the intercept.
        let z = DMatrix::from_row_slice(4, 2, &[0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0, 1.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0, 4.0]);
        assert!(matches!(
            fit_ols(&z, &y),
            Err(LstsqError::RankDeficient { rank: 2, cols: 3 })
        ));
    }
}
