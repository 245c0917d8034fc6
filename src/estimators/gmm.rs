//! Full-covariance Gaussian mixtures fitted by expectation-maximization.
//!
//! Mixture nodes model the joint distribution over `[parents.., self]` and
//! condition it on observed parent values at sampling/prediction time, so
//! the mixture carries full covariance blocks rather than per-dimension
//! variances.

use ndarray::{arr1, Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{BnError, Result};
use crate::estimators::linalg;

const MAX_ITERATIONS: usize = 100;
const CONVERGENCE_TOL: f64 = 1e-6;
const COV_REGULARIZATION: f64 = 1e-6;

/// A fitted Gaussian mixture over `d` dimensions.
///
/// The weight vector always has exactly the requested component count and
/// sums to 1; degenerate fits are padded with zero-weight components.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianMixture {
    pub weights: Vec<f64>,
    /// Per-component mean vectors, `k x d`.
    pub means: Vec<Vec<f64>>,
    /// Per-component covariance matrices, `k x d x d`.
    pub covariances: Vec<Vec<Vec<f64>>>,
}

impl GaussianMixture {
    /// Fit `k` components to the rows of `data` by EM.
    ///
    /// When fewer than `k` rows are available the fit uses one component per
    /// row cluster and pads the rest with zero weight. Initialization is
    /// deterministic (evenly spaced rows of the data sorted by coordinate
    /// sum), so repeated fits on the same data agree.
    pub fn fit(data: &Array2<f64>, k: usize) -> Result<Self> {
        let n = data.nrows();
        let d = data.ncols();
        if n == 0 || d == 0 || k == 0 {
            return Err(BnError::Estimation("mixture: empty input".into()));
        }

        let effective_k = k.min(n);
        let mut means = init_means(data, effective_k);
        let global_cov = covariance(data, &column_means(data));
        let mut covs = vec![global_cov.clone(); effective_k];
        let mut weights = vec![1.0 / effective_k as f64; effective_k];

        let mut responsibilities = Array2::zeros((n, effective_k));
        let mut prev_log_likelihood = f64::NEG_INFINITY;

        for _ in 0..MAX_ITERATIONS {
            // E-step
            let mut log_likelihood = 0.0;
            for (i, row) in data.outer_iter().enumerate() {
                let mut total = 0.0;
                for c in 0..effective_k {
                    let p = linalg::mvn_pdf(row, means[c].view(), &covs[c]).unwrap_or(0.0);
                    responsibilities[[i, c]] = weights[c] * p;
                    total += weights[c] * p;
                }
                if total <= 0.0 {
                    // point unsupported by every component; spread it evenly
                    for c in 0..effective_k {
                        responsibilities[[i, c]] = 1.0 / effective_k as f64;
                    }
                    total = 1.0;
                }
                for c in 0..effective_k {
                    responsibilities[[i, c]] /= total;
                }
                log_likelihood += total.max(f64::MIN_POSITIVE).ln();
            }

            // M-step
            for c in 0..effective_k {
                let resp_total: f64 = (0..n).map(|i| responsibilities[[i, c]]).sum();
                weights[c] = resp_total / n as f64;
                if resp_total <= 0.0 {
                    continue;
                }

                let mut mean = Array1::zeros(d);
                for (i, row) in data.outer_iter().enumerate() {
                    mean = mean + &row * responsibilities[[i, c]];
                }
                mean /= resp_total;

                let mut cov = Array2::zeros((d, d));
                for (i, row) in data.outer_iter().enumerate() {
                    let diff = &row - &mean;
                    let r = responsibilities[[i, c]];
                    for a in 0..d {
                        for b in 0..d {
                            cov[[a, b]] += r * diff[a] * diff[b];
                        }
                    }
                }
                cov /= resp_total;
                for a in 0..d {
                    cov[[a, a]] += COV_REGULARIZATION;
                }

                means[c] = mean;
                covs[c] = cov;
            }

            if (log_likelihood - prev_log_likelihood).abs() < CONVERGENCE_TOL {
                break;
            }
            prev_log_likelihood = log_likelihood;
        }

        // pad to the requested component count with inert zero-weight
        // components so the shape is stable for serialization
        let mut out_weights: Vec<f64> = weights;
        let mut out_means: Vec<Vec<f64>> = means.into_iter().map(|m| m.to_vec()).collect();
        let mut out_covs: Vec<Vec<Vec<f64>>> = covs.iter().map(matrix_to_rows).collect();
        while out_weights.len() < k {
            out_weights.push(0.0);
            out_means.push(vec![0.0; d]);
            out_covs.push(matrix_to_rows(&Array2::eye(d)));
        }

        let total: f64 = out_weights.iter().sum();
        if total > 0.0 {
            for w in &mut out_weights {
                *w /= total;
            }
        }

        Ok(GaussianMixture {
            weights: out_weights,
            means: out_means,
            covariances: out_covs,
        })
    }

    pub fn n_components(&self) -> usize {
        self.weights.len()
    }

    pub fn n_dims(&self) -> usize {
        self.means.first().map_or(0, |m| m.len())
    }

    /// Condition the joint mixture on the first `d - 1` dimensions.
    ///
    /// Returns per-component `(weights, means, variances)` of the last
    /// dimension given `x`: component weights are reweighted by the marginal
    /// density of `x`, and each component contributes its conditional
    /// Gaussian `mean + cov_yx cov_xx^-1 (x - mean_x)`.
    pub fn condition(&self, x: &[f64]) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>)> {
        let d = self.n_dims();
        if d == 0 {
            return Err(BnError::Estimation("mixture: no components".into()));
        }
        if x.len() + 1 != d {
            return Err(BnError::InvalidParentValues(format!(
                "expected {} parent values, got {}",
                d - 1,
                x.len()
            )));
        }

        let k = self.n_components();
        let mut weights = vec![0.0; k];
        let mut means = vec![0.0; k];
        let mut vars = vec![0.0; k];

        let px = arr1(x);
        for c in 0..k {
            let mean = &self.means[c];
            let cov = rows_to_matrix(&self.covariances[c]);
            means[c] = mean[d - 1];
            vars[c] = cov[[d - 1, d - 1]];
            if self.weights[c] <= 0.0 {
                continue;
            }

            if d == 1 {
                weights[c] = self.weights[c];
                continue;
            }

            let mean_x = arr1(&mean[..d - 1]);
            let cov_xx = cov.slice(ndarray::s![..d - 1, ..d - 1]).to_owned();
            let cov_yx = cov.slice(ndarray::s![d - 1, ..d - 1]).to_owned();

            let inv_xx = linalg::inverse(&cov_xx)?;
            let diff = &px - &mean_x;
            let gain = inv_xx.dot(&cov_yx);

            means[c] = mean[d - 1] + gain.dot(&diff);
            vars[c] = (cov[[d - 1, d - 1]] - gain.dot(&cov_yx)).max(1e-12);
            weights[c] = self.weights[c]
                * linalg::mvn_pdf(px.view(), mean_x.view(), &cov_xx).unwrap_or(0.0);
        }

        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            for w in &mut weights {
                *w /= total;
            }
        } else {
            // evidence far outside every component; keep the prior weights
            weights.copy_from_slice(&self.weights);
        }

        Ok((weights, means, vars))
    }
}

fn column_means(data: &Array2<f64>) -> Array1<f64> {
    let n = data.nrows() as f64;
    data.t().dot(&Array1::from_elem(data.nrows(), 1.0 / n))
}

fn covariance(data: &Array2<f64>, mean: &Array1<f64>) -> Array2<f64> {
    let n = data.nrows();
    let d = data.ncols();
    let mut cov = Array2::zeros((d, d));
    for row in data.outer_iter() {
        let diff = &row - mean;
        for a in 0..d {
            for b in 0..d {
                cov[[a, b]] += diff[a] * diff[b];
            }
        }
    }
    cov /= n.max(1) as f64;
    for a in 0..d {
        cov[[a, a]] += COV_REGULARIZATION;
    }
    cov
}

fn init_means(data: &Array2<f64>, k: usize) -> Vec<Array1<f64>> {
    let n = data.nrows();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| data.row(i).sum().total_cmp(&data.row(j).sum()));

    (0..k)
        .map(|c| {
            let idx = if k > 1 { c * (n - 1) / (k - 1) } else { n / 2 };
            data.row(order[idx]).to_owned()
        })
        .collect()
}

fn matrix_to_rows(m: &Array2<f64>) -> Vec<Vec<f64>> {
    m.outer_iter().map(|r| r.to_vec()).collect()
}

fn rows_to_matrix(rows: &[Vec<f64>]) -> Array2<f64> {
    let d = rows.len();
    let mut out = Array2::zeros((d, d));
    for (i, row) in rows.iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            out[[i, j]] = *v;
        }
    }
    out
}
