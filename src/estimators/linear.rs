//! Ordinary least squares regression for Gaussian nodes with parents.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{BnError, Result};
use crate::estimators::linalg;

/// A fitted linear regressor. Serializable as a store artifact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressor {
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegressor {
    /// Fit by solving the normal equations of the intercept-augmented design
    /// matrix. A singular system (collinear or constant parents) is an
    /// estimation error; callers degrade to a marginal mean.
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        let n = x.nrows();
        let d = x.ncols();
        if n != y.len() || n == 0 {
            return Err(BnError::Estimation("regression: shape mismatch".into()));
        }

        let mut design = Array2::ones((n, d + 1));
        design.slice_mut(ndarray::s![.., 1..]).assign(x);

        let xtx = design.t().dot(&design);
        let xty = design.t().dot(y);
        let theta = linalg::solve(&xtx, &xty)?;

        Ok(LinearRegressor {
            intercept: theta[0],
            coef: theta.iter().skip(1).copied().collect(),
        })
    }

    pub fn predict(&self, x: &[f64]) -> Result<f64> {
        if x.len() != self.coef.len() {
            return Err(BnError::InvalidParentValues(format!(
                "expected {} parent values, got {}",
                self.coef.len(),
                x.len()
            )));
        }
        Ok(self.intercept + self.coef.iter().zip(x).map(|(c, v)| c * v).sum::<f64>())
    }

    /// Mean squared residual of the fit over the training data.
    pub fn residual_variance(&self, x: &Array2<f64>, y: &Array1<f64>) -> f64 {
        let n = x.nrows();
        if n == 0 {
            return 0.0;
        }
        let mut acc = 0.0;
        for (row, target) in x.outer_iter().zip(y.iter()) {
            let fitted = self.intercept
                + self
                    .coef
                    .iter()
                    .zip(row.iter())
                    .map(|(c, v)| c * v)
                    .sum::<f64>();
            acc += (target - fitted).powi(2);
        }
        acc / n as f64
    }
}
