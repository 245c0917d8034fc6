//! The conditionally-Gaussian node family: a Gaussian block per discrete
//! parent combination.
//!
//! Each combination of the discrete parents' vocabularies gets its own
//! [`GaussianParams`] block, fitted on the matching row subset and keyed by
//! the canonical combination encoding. Unobserved combinations keep an
//! all-`None` block so sparse and absent keys stay distinguishable.

use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::{DataFrame, Value};
use crate::error::{BnError, Result};
use crate::store::ParameterStore;

use super::gaussian::{self, GaussianParams};
use super::{
    category_values, combination_key, cont_column, disc_column, parent_combinations,
    split_parent_values, vocabulary, FitContext, Node,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConditionalGaussianParams {
    /// Combination key -> Gaussian block.
    pub hybcprob: IndexMap<String, GaussianParams>,
}

pub fn fit(node: &Node, data: &DataFrame, ctx: &FitContext) -> Result<ConditionalGaussianParams> {
    let own = cont_column(data, &node.name)?;
    let cont_parents: Vec<Vec<Option<f64>>> = node
        .cont_parents
        .iter()
        .map(|p| cont_column(data, p))
        .collect::<Result<_>>()?;
    let disc_parents: Vec<Vec<Option<String>>> = node
        .disc_parents
        .iter()
        .map(|p| disc_column(data, p))
        .collect::<Result<_>>()?;
    let vocabs: Vec<Vec<String>> = disc_parents.iter().map(|c| vocabulary(c)).collect();

    let mut hybcprob = IndexMap::new();
    for (ordinal, combo) in parent_combinations(&vocabs).into_iter().enumerate() {
        let mut y = Vec::new();
        let mut x = Vec::new();
        for (row, value) in own.iter().enumerate() {
            let matches = disc_parents
                .iter()
                .zip(&combo)
                .all(|(col, want)| col[row].as_deref() == Some(want.as_str()));
            if !matches {
                continue;
            }
            let Some(target) = value else { continue };
            let features: Option<Vec<f64>> = cont_parents.iter().map(|col| col[row]).collect();
            if let Some(features) = features {
                y.push(*target);
                x.push(features);
            }
        }

        let block = gaussian::fit_slice(
            &y,
            &x,
            node.cont_parents.len(),
            ctx,
            &format!("regressor_{}.json", ordinal),
        )?;
        hybcprob.insert(combination_key(&combo), block);
    }

    Ok(ConditionalGaussianParams { hybcprob })
}

pub fn choose<R: Rng>(
    node: &Node,
    params: &ConditionalGaussianParams,
    pvals: &[Value],
    store: &ParameterStore,
    rng: &mut R,
) -> Result<Value> {
    let (cont, key, block) = lookup(node, params, pvals)?;
    gaussian::choose_block(block, cont, store, &key, rng)
}

pub fn predict(
    node: &Node,
    params: &ConditionalGaussianParams,
    pvals: &[Value],
    store: &ParameterStore,
) -> Result<Value> {
    let (cont, key, block) = lookup(node, params, pvals)?;
    Ok(Value::cont(gaussian::conditional_mean(
        block, cont, store, &key,
    )?))
}

fn lookup<'p, 'v>(
    node: &Node,
    params: &'p ConditionalGaussianParams,
    pvals: &'v [Value],
) -> Result<(&'v [Value], String, &'p GaussianParams)> {
    let (cont, disc) = split_parent_values(node, pvals)?;
    let key = combination_key(&category_values(disc)?);
    let block = params
        .hybcprob
        .get(&key)
        .ok_or_else(|| BnError::UnknownCombination(key.clone()))?;
    Ok((cont, key, block))
}
