//! Small dense linear algebra helpers on `ndarray` types.
//!
//! The systems solved here are tiny (one dimension per continuous parent),
//! so plain Gaussian elimination with partial pivoting is sufficient.

use ndarray::{Array1, Array2, ArrayView1};

use crate::error::{BnError, Result};

const PIVOT_TOL: f64 = 1e-12;

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
pub fn solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    if a.ncols() != n || b.len() != n {
        return Err(BnError::Estimation("solve: shape mismatch".into()));
    }

    // augmented matrix [a | b]
    let mut m = vec![vec![0.0; n + 1]; n];
    for i in 0..n {
        for j in 0..n {
            m[i][j] = a[[i, j]];
        }
        m[i][n] = b[i];
    }

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))
            .unwrap_or(col);
        if m[pivot][col].abs() < PIVOT_TOL {
            return Err(BnError::Estimation("solve: singular system".into()));
        }
        m.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = m[row][col] / m[col][col];
            for j in col..=n {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let mut acc = m[row][n];
        for j in (row + 1)..n {
            acc -= m[row][j] * x[j];
        }
        x[row] = acc / m[row][row];
    }
    Ok(x)
}

/// Invert a square matrix by Gauss-Jordan elimination.
pub fn inverse(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(BnError::Estimation("inverse: not square".into()));
    }

    // augmented matrix [a | I]
    let mut m = vec![vec![0.0; 2 * n]; n];
    for i in 0..n {
        for j in 0..n {
            m[i][j] = a[[i, j]];
        }
        m[i][n + i] = 1.0;
    }

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))
            .unwrap_or(col);
        if m[pivot][col].abs() < PIVOT_TOL {
            return Err(BnError::Estimation("inverse: singular matrix".into()));
        }
        m.swap(col, pivot);

        let scale = m[col][col];
        for j in 0..2 * n {
            m[col][j] /= scale;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = m[row][col];
            for j in 0..2 * n {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    let mut out = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            out[[i, j]] = m[i][n + j];
        }
    }
    Ok(out)
}

/// Log-determinant of a positive-definite matrix via LU pivots.
pub fn log_det(a: &Array2<f64>) -> Result<f64> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(BnError::Estimation("log_det: not square".into()));
    }

    let mut m = a.clone();
    let mut log_det = 0.0;
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| m[[i, col]].abs().total_cmp(&m[[j, col]].abs()))
            .unwrap_or(col);
        let pivot_val = m[[pivot, col]];
        if pivot_val <= PIVOT_TOL {
            return Err(BnError::Estimation("log_det: not positive definite".into()));
        }
        if pivot != col {
            // covariance matrices keep positive pivots on the diagonal, so a
            // swap here indicates numerical noise only
            for j in 0..n {
                m.swap([pivot, j], [col, j]);
            }
        }
        log_det += pivot_val.ln();

        for row in (col + 1)..n {
            let factor = m[[row, col]] / pivot_val;
            for j in col..n {
                let v = m[[col, j]];
                m[[row, j]] -= factor * v;
            }
        }
    }
    Ok(log_det)
}

/// Density of a multivariate normal at `x`.
pub fn mvn_pdf(x: ArrayView1<f64>, mean: ArrayView1<f64>, cov: &Array2<f64>) -> Result<f64> {
    let d = x.len() as f64;
    let inv = inverse(cov)?;
    let log_det = log_det(cov)?;

    let diff = &x - &mean;
    let quad = diff.dot(&inv.dot(&diff));
    let log_p = -0.5 * (d * (2.0 * std::f64::consts::PI).ln() + log_det + quad);
    Ok(log_p.exp())
}

#[cfg(test)]
mod tests {

    use super::*;
    use ndarray::{arr1, arr2};

    #[test]
    fn solve_known_system() {
        let a = arr2(&[[2.0, 1.0], [1.0, 3.0]]);
        let b = arr1(&[5.0, 10.0]);
        let x = solve(&a, &b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-10);
        assert!((x[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn solve_singular_fails() {
        let a = arr2(&[[1.0, 2.0], [2.0, 4.0]]);
        let b = arr1(&[1.0, 2.0]);
        assert!(matches!(solve(&a, &b), Err(BnError::Estimation(_))));
    }

    #[test]
    fn inverse_round_trip() {
        let a = arr2(&[[4.0, 1.0], [1.0, 3.0]]);
        let inv = inverse(&a).unwrap();
        let id = a.dot(&inv);
        assert!((id[[0, 0]] - 1.0).abs() < 1e-10);
        assert!((id[[0, 1]]).abs() < 1e-10);
        assert!((id[[1, 0]]).abs() < 1e-10);
        assert!((id[[1, 1]] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn log_det_of_diagonal() {
        let a = arr2(&[[2.0, 0.0], [0.0, 8.0]]);
        assert!((log_det(&a).unwrap() - 16.0_f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn mvn_pdf_standard_normal() {
        let x = arr1(&[0.0]);
        let mean = arr1(&[0.0]);
        let cov = arr2(&[[1.0]]);
        let p = mvn_pdf(x.view(), mean.view(), &cov).unwrap();
        assert!((p - 1.0 / (2.0 * std::f64::consts::PI).sqrt()).abs() < 1e-10);
    }
}
