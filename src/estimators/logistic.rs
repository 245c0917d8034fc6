//! Multinomial logistic (softmax) classification for logit nodes.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{BnError, Result};

const ITERATIONS: usize = 300;
const LEARNING_RATE: f64 = 0.5;

/// A fitted softmax classifier over standardized features. Serializable as a
/// store artifact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogitClassifier {
    pub n_classes: usize,
    /// Per-feature standardization applied before the linear map.
    pub feature_means: Vec<f64>,
    pub feature_stds: Vec<f64>,
    /// `n_classes x n_features` weight matrix.
    pub weights: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

impl LogitClassifier {
    /// Fit by batch gradient descent on the softmax cross-entropy.
    ///
    /// `labels` are class indices in `0..n_classes`; every class must have
    /// at least one sample for the marginal fallback logic upstream to be
    /// meaningful, but that is not enforced here.
    pub fn fit(x: &Array2<f64>, labels: &[usize], n_classes: usize) -> Result<Self> {
        let n = x.nrows();
        let d = x.ncols();
        if n == 0 || n != labels.len() || n_classes < 2 {
            return Err(BnError::Estimation("classifier: degenerate input".into()));
        }

        let feature_means: Vec<f64> = x.mean_axis(Axis(0)).map(|m| m.to_vec()).unwrap_or_default();
        let feature_stds: Vec<f64> = (0..d)
            .map(|j| {
                let col = x.column(j);
                let var = col
                    .iter()
                    .map(|v| (v - feature_means[j]).powi(2))
                    .sum::<f64>()
                    / n as f64;
                var.sqrt().max(1e-9)
            })
            .collect();

        let mut z = x.clone();
        for j in 0..d {
            z.column_mut(j)
                .mapv_inplace(|v| (v - feature_means[j]) / feature_stds[j]);
        }

        // one-hot targets
        let mut targets = Array2::zeros((n, n_classes));
        for (i, &label) in labels.iter().enumerate() {
            if label >= n_classes {
                return Err(BnError::Estimation("classifier: label out of range".into()));
            }
            targets[[i, label]] = 1.0;
        }

        let mut weights = Array2::zeros((n_classes, d));
        let mut intercepts = Array1::zeros(n_classes);

        for _ in 0..ITERATIONS {
            // P = softmax(Z W^T + b), row-wise
            let mut scores = z.dot(&weights.t());
            scores += &intercepts;
            let probs = softmax_rows(&scores);

            let delta = &probs - &targets;
            let grad_w = delta.t().dot(&z) / n as f64;
            let grad_b = delta.sum_axis(Axis(0)) / n as f64;

            weights -= &(grad_w * LEARNING_RATE);
            intercepts -= &(grad_b * LEARNING_RATE);
        }

        Ok(LogitClassifier {
            n_classes,
            feature_means,
            feature_stds,
            weights: weights.outer_iter().map(|r| r.to_vec()).collect(),
            intercepts: intercepts.to_vec(),
        })
    }

    /// Class probabilities for one feature vector.
    pub fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>> {
        if x.len() != self.feature_means.len() {
            return Err(BnError::InvalidParentValues(format!(
                "expected {} features, got {}",
                self.feature_means.len(),
                x.len()
            )));
        }

        let z: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(j, v)| (v - self.feature_means[j]) / self.feature_stds[j])
            .collect();

        let scores: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.intercepts)
            .map(|(w, b)| b + w.iter().zip(&z).map(|(wi, zi)| wi * zi).sum::<f64>())
            .collect();

        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        Ok(exps.into_iter().map(|e| e / total).collect())
    }

    /// The most probable class index.
    pub fn predict(&self, x: &[f64]) -> Result<usize> {
        let probs = self.predict_proba(x)?;
        Ok(argmax(&probs))
    }
}

pub(crate) fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn softmax_rows(scores: &Array2<f64>) -> Array2<f64> {
    let mut out = scores.clone();
    for mut row in out.outer_iter_mut() {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|s| (s - max).exp());
        let total = row.sum();
        row.mapv_inplace(|e| e / total);
    }
    out
}

#[cfg(test)]
mod tests {

    use super::*;
    use ndarray::arr2;

    #[test]
    /// Two well-separated clusters are classified correctly.
    fn separable_two_class() {
        let x = arr2(&[
            [0.0, 0.1],
            [0.2, 0.0],
            [0.1, 0.2],
            [0.0, 0.0],
            [5.0, 5.1],
            [5.2, 4.9],
            [4.8, 5.0],
            [5.1, 5.2],
        ]);
        let labels = [0, 0, 0, 0, 1, 1, 1, 1];

        let clf = LogitClassifier::fit(&x, &labels, 2).unwrap();
        assert_eq!(clf.predict(&[0.1, 0.1]).unwrap(), 0);
        assert_eq!(clf.predict(&[5.0, 5.0]).unwrap(), 1);

        let probs = clf.predict_proba(&[5.0, 5.0]).unwrap();
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(probs[1] > 0.9);
    }

    #[test]
    fn three_classes_along_a_line() {
        let x = arr2(&[
            [-5.0],
            [-4.8],
            [-5.2],
            [0.0],
            [0.1],
            [-0.1],
            [5.0],
            [5.1],
            [4.9],
        ]);
        let labels = [0, 0, 0, 1, 1, 1, 2, 2, 2];

        let clf = LogitClassifier::fit(&x, &labels, 3).unwrap();
        assert_eq!(clf.predict(&[-5.0]).unwrap(), 0);
        assert_eq!(clf.predict(&[0.0]).unwrap(), 1);
        assert_eq!(clf.predict(&[5.0]).unwrap(), 2);
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let x = arr2(&[[0.0], [1.0]]);
        let clf = LogitClassifier::fit(&x, &[0, 1], 2).unwrap();
        assert!(matches!(
            clf.predict_proba(&[1.0, 2.0]),
            Err(BnError::InvalidParentValues(_))
        ));
    }

    #[test]
    fn single_class_is_degenerate() {
        let x = arr2(&[[0.0], [1.0]]);
        assert!(LogitClassifier::fit(&x, &[0, 0], 1).is_err());
    }
}
