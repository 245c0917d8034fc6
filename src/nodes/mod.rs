//! Node parameter models.
//!
//! A [`Node`] is one random variable of the network: a name, a distribution
//! family, and its parent/child relations. The six families share one
//! contract (`fit_parameters`, `choose`, `predict`) and differ in the
//! shape of their [`NodeParams`] record and the sampling/prediction math.
//! Each family's numeric logic lives in its own submodule; the `Node`
//! methods only dispatch on the family tag.
//!
//! Parent-value ordering: `choose`/`predict` take the values of continuous
//! parents first (in `cont_parents` order) followed by discrete parents (in
//! `disc_parents` order), matching the ordering used at fit time.

use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::{DataFrame, Value};
use crate::descriptor::VarKind;
use crate::error::{BnError, Result};
use crate::store::ParameterStore;

pub mod conditional_gaussian;
pub mod conditional_mixture;
pub mod discrete;
pub mod gaussian;
pub mod logit;
pub mod mixture;

pub use conditional_gaussian::ConditionalGaussianParams;
pub use conditional_mixture::ConditionalMixtureParams;
pub use discrete::DiscreteParams;
pub use gaussian::GaussianParams;
pub use logit::LogitParams;
pub use mixture::MixtureParams;

/// The distribution family of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Discrete,
    Gaussian,
    ConditionalGaussian,
    MixtureGaussian,
    ConditionalMixtureGaussian,
    Logit,
}

impl NodeType {
    /// The descriptor kind this family realizes.
    pub fn var_kind(&self) -> VarKind {
        match self {
            NodeType::Discrete | NodeType::Logit => VarKind::Disc,
            _ => VarKind::Cont,
        }
    }

    /// Whether fitting this family may write an artifact to the store.
    pub fn needs_store(&self) -> bool {
        matches!(
            self,
            NodeType::Logit | NodeType::Gaussian | NodeType::ConditionalGaussian
        )
    }
}

/// One random variable of the network.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: NodeType,
    pub disc_parents: Vec<String>,
    pub cont_parents: Vec<String>,
    pub children: Vec<String>,
}

impl Node {
    pub fn new(name: impl Into<String>, ty: NodeType) -> Self {
        Node {
            name: name.into(),
            ty,
            disc_parents: Vec::new(),
            cont_parents: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Fit this node's conditional distribution from the dataset, restricted
    /// implicitly to the node's own column and its parents' columns.
    pub fn fit_parameters(&self, data: &DataFrame, ctx: &FitContext) -> Result<NodeParams> {
        match self.ty {
            NodeType::Discrete => Ok(NodeParams::Discrete(discrete::fit(self, data)?)),
            NodeType::Gaussian => Ok(NodeParams::Gaussian(gaussian::fit(self, data, ctx)?)),
            NodeType::ConditionalGaussian => Ok(NodeParams::ConditionalGaussian(
                conditional_gaussian::fit(self, data, ctx)?,
            )),
            NodeType::MixtureGaussian => {
                Ok(NodeParams::MixtureGaussian(mixture::fit(self, data, ctx)?))
            }
            NodeType::ConditionalMixtureGaussian => Ok(NodeParams::ConditionalMixtureGaussian(
                conditional_mixture::fit(self, data, ctx)?,
            )),
            NodeType::Logit => Ok(NodeParams::Logit(logit::fit(self, data, ctx)?)),
        }
    }

    /// Draw one stochastic sample conditioned on `pvals`.
    pub fn choose<R: Rng>(
        &self,
        params: &NodeParams,
        pvals: &[Value],
        store: &ParameterStore,
        rng: &mut R,
    ) -> Result<Value> {
        match (self.ty, params) {
            (NodeType::Discrete, NodeParams::Discrete(p)) => discrete::choose(p, pvals, rng),
            (NodeType::Gaussian, NodeParams::Gaussian(p)) => {
                gaussian::choose(p, pvals, store, rng)
            }
            (NodeType::ConditionalGaussian, NodeParams::ConditionalGaussian(p)) => {
                conditional_gaussian::choose(self, p, pvals, store, rng)
            }
            (NodeType::MixtureGaussian, NodeParams::MixtureGaussian(p)) => {
                mixture::choose(p, pvals, rng)
            }
            (NodeType::ConditionalMixtureGaussian, NodeParams::ConditionalMixtureGaussian(p)) => {
                conditional_mixture::choose(self, p, pvals, rng)
            }
            (NodeType::Logit, NodeParams::Logit(p)) => logit::choose(p, pvals, store, rng),
            _ => Err(BnError::FamilyMismatch(self.name.clone())),
        }
    }

    /// The deterministic point estimate conditioned on `pvals`: the mode for
    /// discrete families, the conditional mean for continuous ones.
    pub fn predict(
        &self,
        params: &NodeParams,
        pvals: &[Value],
        store: &ParameterStore,
    ) -> Result<Value> {
        match (self.ty, params) {
            (NodeType::Discrete, NodeParams::Discrete(p)) => discrete::predict(p, pvals),
            (NodeType::Gaussian, NodeParams::Gaussian(p)) => gaussian::predict(p, pvals, store),
            (NodeType::ConditionalGaussian, NodeParams::ConditionalGaussian(p)) => {
                conditional_gaussian::predict(self, p, pvals, store)
            }
            (NodeType::MixtureGaussian, NodeParams::MixtureGaussian(p)) => {
                mixture::predict(p, pvals)
            }
            (NodeType::ConditionalMixtureGaussian, NodeParams::ConditionalMixtureGaussian(p)) => {
                conditional_mixture::predict(self, p, pvals)
            }
            (NodeType::Logit, NodeParams::Logit(p)) => logit::predict(p, pvals, store),
            _ => Err(BnError::FamilyMismatch(self.name.clone())),
        }
    }

    /// All parent names in the `choose`/`predict` value order: continuous
    /// parents first, then discrete parents.
    pub fn parent_order(&self) -> impl Iterator<Item = &str> {
        self.cont_parents
            .iter()
            .chain(self.disc_parents.iter())
            .map(|s| s.as_str())
    }
}

/// The fitted, serializable representation of one node's distribution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum NodeParams {
    Discrete(DiscreteParams),
    Gaussian(GaussianParams),
    ConditionalGaussian(ConditionalGaussianParams),
    MixtureGaussian(MixtureParams),
    ConditionalMixtureGaussian(ConditionalMixtureParams),
    Logit(LogitParams),
}

/// Per-fit context threaded into every node's fitting call: the artifact
/// store, this node's index in the network node list, and the mixture
/// component count hyperparameter.
pub struct FitContext<'a> {
    pub store: &'a ParameterStore,
    pub index: usize,
    pub mixture_components: usize,
}

/// Canonical encoding of a discrete-parent combination: the JSON array of
/// the parent values in declared parent order, e.g. `["cat4","cat7"]`. The
/// empty combination is `[]`. This encoding is part of the persisted params
/// file format.
pub fn combination_key(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("[{}]", quoted.join(","))
}

/// Split parent values into the continuous prefix and the discrete suffix,
/// checking arity against the node's declared parents.
pub(crate) fn split_parent_values<'v>(
    node: &Node,
    pvals: &'v [Value],
) -> Result<(&'v [Value], &'v [Value])> {
    let n_cont = node.cont_parents.len();
    let n_disc = node.disc_parents.len();
    if pvals.len() != n_cont + n_disc {
        return Err(BnError::InvalidParentValues(format!(
            "node `{}` expects {} parent values, got {}",
            node.name,
            n_cont + n_disc,
            pvals.len()
        )));
    }
    Ok(pvals.split_at(n_cont))
}

/// Coerce parent values to numbers for a regression/mixture input.
pub(crate) fn cont_values(pvals: &[Value]) -> Result<Vec<f64>> {
    pvals.iter().map(|v| v.as_f64()).collect()
}

/// Coerce parent values to category labels for a combination key.
pub(crate) fn category_values(pvals: &[Value]) -> Result<Vec<String>> {
    pvals
        .iter()
        .map(|v| {
            v.as_category()
                .ok_or_else(|| BnError::InvalidParentValues("missing value".into()))
        })
        .collect()
}

/// A column as category labels; `None` marks missing cells.
pub(crate) fn disc_column(data: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    Ok(data.column(name)?.iter().map(|v| v.as_category()).collect())
}

/// A column as numbers; `None` marks missing or non-numeric cells.
pub(crate) fn cont_column(data: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    Ok(data
        .column(name)?
        .iter()
        .map(|v| v.as_f64().ok())
        .collect())
}

/// Sorted unique category labels of a column.
pub(crate) fn vocabulary(column: &[Option<String>]) -> Vec<String> {
    let mut vals: Vec<String> = column.iter().flatten().cloned().collect();
    vals.sort();
    vals.dedup();
    vals
}

/// The discrete-parent combinations observed at fit time: the cartesian
/// product of every discrete parent's vocabulary, in declared parent order.
/// Returns the single empty combination when there are no discrete parents.
pub(crate) fn parent_combinations(vocabs: &[Vec<String>]) -> Vec<Vec<String>> {
    use itertools::Itertools;

    if vocabs.is_empty() {
        return vec![Vec::new()];
    }
    vocabs
        .iter()
        .map(|v| v.iter().cloned())
        .multi_cartesian_product()
        .collect()
}
