//! The conditional Gaussian-mixture node family: one mixture block per
//! discrete parent combination.

use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::{DataFrame, Value};
use crate::error::{BnError, Result};

use super::mixture::{self, MixtureParams};
use super::{
    category_values, combination_key, cont_column, disc_column, parent_combinations,
    split_parent_values, vocabulary, FitContext, Node,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConditionalMixtureParams {
    /// Combination key -> mixture block. Unobserved combinations keep an
    /// empty (zero-component) block.
    pub hybcprob: IndexMap<String, MixtureParams>,
}

pub fn fit(node: &Node, data: &DataFrame, ctx: &FitContext) -> Result<ConditionalMixtureParams> {
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

    let dims = node.cont_parents.len() + 1;
    let mut hybcprob = IndexMap::new();
    for combo in parent_combinations(&vocabs) {
        let mut rows = Vec::new();
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
            if let Some(mut features) = features {
                features.push(*target);
                rows.push(features);
            }
        }

        let block = mixture::fit_slice(&rows, dims, ctx.mixture_components)?;
        hybcprob.insert(combination_key(&combo), block);
    }

    Ok(ConditionalMixtureParams { hybcprob })
}

pub fn choose<R: Rng>(
    node: &Node,
    params: &ConditionalMixtureParams,
    pvals: &[Value],
    rng: &mut R,
) -> Result<Value> {
    let (cont, key, block) = lookup(node, params, pvals)?;
    mixture::choose_block(block, cont, &key, rng)
}

pub fn predict(node: &Node, params: &ConditionalMixtureParams, pvals: &[Value]) -> Result<Value> {
    let (cont, key, block) = lookup(node, params, pvals)?;
    mixture::predict_block(block, cont, &key)
}

fn lookup<'p, 'v>(
    node: &Node,
    params: &'p ConditionalMixtureParams,
    pvals: &'v [Value],
) -> Result<(&'v [Value], String, &'p MixtureParams)> {
    let (cont, disc) = split_parent_values(node, pvals)?;
    let key = combination_key(&category_values(disc)?);
    let block = params
        .hybcprob
        .get(&key)
        .ok_or_else(|| BnError::UnknownCombination(key.clone()))?;
    Ok((cont, key, block))
}
