//! The Gaussian node family.
//!
//! Without continuous parents the node is a marginal Normal (mean and
//! variance). With parents it regresses on them: the fitted
//! [`LinearRegressor`](crate::estimators::LinearRegressor) goes to the
//! parameter store and the record keeps the residual variance plus an
//! artifact reference. Too little data or a singular system degrades the fit
//! to the marginal mean; the absent-regressor state is explicit and checked
//! before any dereference.

use ndarray::{Array1, Array2};
use rand::distributions::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

use crate::data::{DataFrame, Value};
use crate::error::{BnError, Result};
use crate::estimators::LinearRegressor;
use crate::store::{ArtifactRef, ParameterStore};

use super::{cont_column, cont_values, FitContext, Node};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianParams {
    /// Marginal mean; `None` when a regressor carries the conditioning, or
    /// when the (sub-)sample was empty.
    pub mean: Option<f64>,
    /// Marginal or residual variance; `None` only for empty sub-samples.
    pub variance: Option<f64>,
    /// Reference to the fitted regression artifact in the parameter store.
    pub regressor: Option<ArtifactRef>,
}

impl GaussianParams {
    pub fn empty() -> Self {
        GaussianParams {
            mean: None,
            variance: None,
            regressor: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_none() && self.variance.is_none() && self.regressor.is_none()
    }
}

pub fn fit(node: &Node, data: &DataFrame, ctx: &FitContext) -> Result<GaussianParams> {
    let own = cont_column(data, &node.name)?;
    let parents: Vec<Vec<Option<f64>>> = node
        .cont_parents
        .iter()
        .map(|p| cont_column(data, p))
        .collect::<Result<_>>()?;

    // rows where the node and every parent are observed
    let mut y = Vec::new();
    let mut x = Vec::new();
    for (row, value) in own.iter().enumerate() {
        let Some(target) = value else { continue };
        let features: Option<Vec<f64>> = parents.iter().map(|col| col[row]).collect();
        if let Some(features) = features {
            y.push(*target);
            x.push(features);
        }
    }

    fit_slice(&y, &x, node.cont_parents.len(), ctx, "regressor.json")
}

/// Fit one Gaussian block from aligned target/feature rows. Shared with the
/// conditionally-Gaussian family, which calls it once per combination with a
/// distinct artifact file.
pub(crate) fn fit_slice(
    y: &[f64],
    x: &[Vec<f64>],
    n_parents: usize,
    ctx: &FitContext,
    artifact_file: &str,
) -> Result<GaussianParams> {
    if y.is_empty() {
        return Ok(GaussianParams::empty());
    }

    let mean = y.iter().sum::<f64>() / y.len() as f64;
    let marginal_variance = y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / y.len() as f64;

    // marginal fit: no parents, or too few rows to support a regression
    if n_parents == 0 || y.len() < n_parents + 2 {
        return Ok(GaussianParams {
            mean: Some(mean),
            variance: Some(marginal_variance),
            regressor: None,
        });
    }

    let design = Array2::from_shape_vec(
        (y.len(), n_parents),
        x.iter().flatten().copied().collect(),
    )
    .map_err(|e| BnError::Estimation(e.to_string()))?;
    let targets = Array1::from_vec(y.to_vec());

    match LinearRegressor::fit(&design, &targets) {
        Ok(reg) => {
            let residual = reg.residual_variance(&design, &targets);
            let artifact = ctx.store.put(ctx.index, artifact_file, &reg)?;
            Ok(GaussianParams {
                mean: None,
                variance: Some(residual),
                regressor: Some(artifact),
            })
        }
        // collinear or constant parents; fall back to the marginal statistic
        Err(BnError::Estimation(_)) => Ok(GaussianParams {
            mean: Some(mean),
            variance: Some(marginal_variance),
            regressor: None,
        }),
        Err(e) => Err(e),
    }
}

pub fn choose<R: Rng>(
    params: &GaussianParams,
    pvals: &[Value],
    store: &ParameterStore,
    rng: &mut R,
) -> Result<Value> {
    choose_block(params, pvals, store, "[]", rng)
}

/// Draw from one Gaussian block. Shared with the conditionally-Gaussian
/// family, which passes the combination key for error reporting.
pub(crate) fn choose_block<R: Rng>(
    params: &GaussianParams,
    pvals: &[Value],
    store: &ParameterStore,
    key: &str,
    rng: &mut R,
) -> Result<Value> {
    let mu = conditional_mean(params, pvals, store, key)?;
    let std = params.variance.unwrap_or(0.0).max(0.0).sqrt().max(1e-9);
    let normal = Normal::new(mu, std).map_err(|e| BnError::Estimation(e.to_string()))?;
    Ok(Value::cont(normal.sample(rng)))
}

pub fn predict(params: &GaussianParams, pvals: &[Value], store: &ParameterStore) -> Result<Value> {
    Ok(Value::cont(conditional_mean(params, pvals, store, "[]")?))
}

/// The conditional mean of one Gaussian block: the regressor's prediction
/// when an artifact exists, otherwise the marginal mean. An all-`None` block
/// (an empty combination at fit time) is an error keyed by `key`.
pub(crate) fn conditional_mean(
    params: &GaussianParams,
    pvals: &[Value],
    store: &ParameterStore,
    key: &str,
) -> Result<f64> {
    if let Some(artifact) = &params.regressor {
        let reg: LinearRegressor = store.get(artifact)?;
        return reg.predict(&cont_values(pvals)?);
    }
    params
        .mean
        .ok_or_else(|| BnError::EmptyCombination(key.to_string()))
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::nodes::NodeType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;

    fn fixture() -> (Node, DataFrame) {
        let mut node = Node::new("test", NodeType::Gaussian);
        node.cont_parents = vec!["node0".into(), "node1".into()];
        node.children = vec!["node6".into()];

        let node0: Vec<f64> = (0..30).map(|i| i as f64 * 0.5).collect();
        let node1: Vec<f64> = (0..30).map(|i| 2.0 + (i % 7) as f64 * 0.1).collect();
        // test = 1 + 2*node0 - node1, exactly linear
        let test: Vec<f64> = node0
            .iter()
            .zip(&node1)
            .map(|(a, b)| 1.0 + 2.0 * a - b)
            .collect();
        let foster: Vec<f64> = (0..30).map(|i| 2.5 + (i % 5) as f64 * 0.01).collect();

        let mut df = DataFrame::new();
        df.insert_cont("node0", &node0);
        df.insert_cont("node1", &node1);
        df.insert_cont("test", &test);
        df.insert_cont("foster-son", &foster);
        (node, df)
    }

    #[test]
    fn fit_with_parents_externalizes_a_regressor() {
        let tmp = tempdir().unwrap();
        let store = ParameterStore::new(tmp.path().join("store"));
        let ctx = FitContext {
            store: &store,
            index: 0,
            mixture_components: 3,
        };

        let (node, df) = fixture();
        let params = fit(&node, &df, &ctx).unwrap();

        assert!(params.mean.is_none());
        assert!(params.regressor.is_some());
        assert!(params.variance.unwrap() < 1e-8);
        assert!(store.node_dir(0).join("regressor.json").is_file());
    }

    #[test]
    fn fit_without_parents_is_marginal() {
        let tmp = tempdir().unwrap();
        let store = ParameterStore::new(tmp.path().join("store"));
        let ctx = FitContext {
            store: &store,
            index: 1,
            mixture_components: 3,
        };

        let mut node = Node::new("foster-son", NodeType::Gaussian);
        node.children = vec!["node6".into()];
        let (_, df) = fixture();

        let params = fit(&node, &df, &ctx).unwrap();
        assert!(params.regressor.is_none());
        assert!(params.mean.is_some());
        assert!(params.variance.is_some());

        // parentless predict returns the marginal mean exactly
        let predicted = predict(&params, &[], &store).unwrap();
        assert_eq!(predicted, Value::cont(params.mean.unwrap()));
    }

    #[test]
    fn choose_and_predict_follow_the_regression() {
        let tmp = tempdir().unwrap();
        let store = ParameterStore::new(tmp.path().join("store"));
        let ctx = FitContext {
            store: &store,
            index: 0,
            mixture_components: 3,
        };

        let (node, df) = fixture();
        let params = fit(&node, &df, &ctx).unwrap();

        let pvals = [Value::cont(1.05), Value::cont(1.95)];
        let predicted = predict(&params, &pvals, &store).unwrap();
        let Value::Cont(mu) = predicted else {
            panic!("expected a continuous value")
        };
        assert!((mu - (1.0 + 2.0 * 1.05 - 1.95)).abs() < 1e-6);

        let mut rng = StdRng::seed_from_u64(11);
        let drawn = choose(&params, &pvals, &store, &mut rng).unwrap();
        let Value::Cont(v) = drawn else {
            panic!("expected a continuous value")
        };
        // residual variance is ~0, the draw collapses onto the mean
        assert!((v - mu).abs() < 1e-3);
    }

    #[test]
    fn non_numeric_parent_values_are_a_value_error() {
        let tmp = tempdir().unwrap();
        let store = ParameterStore::new(tmp.path().join("store"));
        let ctx = FitContext {
            store: &store,
            index: 0,
            mixture_components: 3,
        };

        let (node, df) = fixture();
        let params = fit(&node, &df, &ctx).unwrap();

        let err = predict(&params, &[Value::disc("bad"), Value::disc("values")], &store)
            .unwrap_err();
        assert!(matches!(err, BnError::InvalidParentValues(_)));
    }

    #[test]
    fn empty_block_surfaces_as_empty_combination() {
        let tmp = tempdir().unwrap();
        let store = ParameterStore::new(tmp.path().join("store"));

        let err = predict(&GaussianParams::empty(), &[], &store).unwrap_err();
        assert!(matches!(err, BnError::EmptyCombination(_)));
    }
}
