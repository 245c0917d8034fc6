//! The Gaussian-mixture node family.
//!
//! The node models the joint distribution over `[cont_parents.., self]` as a
//! K-component full-covariance mixture (K is the engine hyperparameter) and
//! conditions it on parent values when sampling or predicting. Components
//! are inlined in the params record; there is no store artifact.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

use crate::data::{DataFrame, Value};
use crate::error::{BnError, Result};
use crate::estimators::GaussianMixture;

use super::{cont_column, cont_values, FitContext, Node};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MixtureParams {
    /// Component weights; sum to 1 unless the (sub-)sample was empty, in
    /// which case all three vectors are empty.
    pub coef: Vec<f64>,
    /// Per-component joint mean vectors over `[parents.., self]`.
    pub mean: Vec<Vec<f64>>,
    /// Per-component joint covariance matrices.
    pub covars: Vec<Vec<Vec<f64>>>,
}

impl MixtureParams {
    pub fn empty() -> Self {
        MixtureParams {
            coef: Vec::new(),
            mean: Vec::new(),
            covars: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.coef.is_empty()
    }

    fn to_mixture(&self) -> GaussianMixture {
        GaussianMixture {
            weights: self.coef.clone(),
            means: self.mean.clone(),
            covariances: self.covars.clone(),
        }
    }
}

pub fn fit(node: &Node, data: &DataFrame, ctx: &FitContext) -> Result<MixtureParams> {
    let own = cont_column(data, &node.name)?;
    let parents: Vec<Vec<Option<f64>>> = node
        .cont_parents
        .iter()
        .map(|p| cont_column(data, p))
        .collect::<Result<_>>()?;

    let mut rows = Vec::new();
    for (row, value) in own.iter().enumerate() {
        let Some(target) = value else { continue };
        let features: Option<Vec<f64>> = parents.iter().map(|col| col[row]).collect();
        if let Some(mut features) = features {
            features.push(*target);
            rows.push(features);
        }
    }

    fit_slice(&rows, node.cont_parents.len() + 1, ctx.mixture_components)
}

/// Fit one mixture block from complete joint rows. Shared with the
/// conditional-mixture family.
pub(crate) fn fit_slice(rows: &[Vec<f64>], dims: usize, k: usize) -> Result<MixtureParams> {
    if rows.is_empty() {
        return Ok(MixtureParams::empty());
    }

    let data = ndarray::Array2::from_shape_vec(
        (rows.len(), dims),
        rows.iter().flatten().copied().collect(),
    )
    .map_err(|e| BnError::Estimation(e.to_string()))?;

    let gmm = GaussianMixture::fit(&data, k)?;
    Ok(MixtureParams {
        coef: gmm.weights,
        mean: gmm.means,
        covars: gmm.covariances,
    })
}

pub fn choose<R: Rng>(params: &MixtureParams, pvals: &[Value], rng: &mut R) -> Result<Value> {
    choose_block(params, pvals, "[]", rng)
}

pub fn predict(params: &MixtureParams, pvals: &[Value]) -> Result<Value> {
    predict_block(params, pvals, "[]")
}

pub(crate) fn choose_block<R: Rng>(
    params: &MixtureParams,
    pvals: &[Value],
    key: &str,
    rng: &mut R,
) -> Result<Value> {
    let (weights, means, vars) = condition(params, pvals, key)?;
    let dist = WeightedIndex::new(&weights).map_err(|e| BnError::Estimation(e.to_string()))?;
    let component = dist.sample(rng);

    let std = vars[component].max(0.0).sqrt().max(1e-9);
    let normal =
        Normal::new(means[component], std).map_err(|e| BnError::Estimation(e.to_string()))?;
    Ok(Value::cont(normal.sample(rng)))
}

pub(crate) fn predict_block(params: &MixtureParams, pvals: &[Value], key: &str) -> Result<Value> {
    let (weights, means, _) = condition(params, pvals, key)?;
    let mean: f64 = weights.iter().zip(&means).map(|(w, m)| w * m).sum();
    Ok(Value::cont(mean))
}

fn condition(
    params: &MixtureParams,
    pvals: &[Value],
    key: &str,
) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>)> {
    if params.is_empty() {
        return Err(BnError::EmptyCombination(key.to_string()));
    }
    params.to_mixture().condition(&cont_values(pvals)?)
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::nodes::NodeType;
    use crate::store::ParameterStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixture() -> (Node, DataFrame) {
        let mut node = Node::new("test", NodeType::MixtureGaussian);
        node.cont_parents = vec!["node0".into(), "node1".into()];
        node.children = vec!["node6".into()];

        let node0: Vec<f64> = (0..30).map(|i| 1.0 + (i % 13) as f64 * 0.4).collect();
        let node1: Vec<f64> = (0..30).map(|i| 2.0 + ((i * 5) % 9) as f64 * 0.05).collect();
        let test: Vec<f64> = node0
            .iter()
            .zip(&node1)
            .map(|(a, b)| 3.0 + 0.2 * a - 0.1 * b)
            .collect();

        let mut df = DataFrame::new();
        df.insert_cont("node0", &node0);
        df.insert_cont("node1", &node1);
        df.insert_cont("test", &test);
        (node, df)
    }

    fn ctx(store: &ParameterStore) -> FitContext<'_> {
        FitContext {
            store,
            index: 0,
            mixture_components: 3,
        }
    }

    #[test]
    fn coefficients_sum_to_one() {
        let store = ParameterStore::new("unused");
        let (node, df) = fixture();
        let params = fit(&node, &df, &ctx(&store)).unwrap();

        assert_eq!(params.coef.len(), 3);
        assert!((params.coef.iter().sum::<f64>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn choose_and_predict_are_continuous() {
        let store = ParameterStore::new("unused");
        let (node, df) = fixture();
        let params = fit(&node, &df, &ctx(&store)).unwrap();

        let pvals = [Value::cont(1.05), Value::cont(1.95)];
        assert!(matches!(predict(&params, &pvals).unwrap(), Value::Cont(_)));

        let mut rng = StdRng::seed_from_u64(5);
        assert!(matches!(
            choose(&params, &pvals, &mut rng).unwrap(),
            Value::Cont(_)
        ));
    }

    #[test]
    fn empty_block_surfaces_as_empty_combination() {
        let err = predict(&MixtureParams::empty(), &[Value::cont(1.0)]).unwrap_err();
        assert!(matches!(err, BnError::EmptyCombination(_)));
    }
}
