//! The discrete (categorical) node family.
//!
//! Parameters are a fixed value vocabulary plus a table mapping every
//! observed discrete-parent combination to a probability vector over that
//! vocabulary. Combinations that are structurally present (cartesian product
//! of parent vocabularies) but unobserved get the uniform vector, so every
//! key is validly shaped; a combination absent from the table is a hard
//! lookup error at `choose`/`predict` time.

use indexmap::IndexMap;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::{DataFrame, Value};
use crate::error::{BnError, Result};

use super::{
    category_values, combination_key, disc_column, parent_combinations, vocabulary, Node,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscreteParams {
    /// The value vocabulary, sorted; probability vectors index into it.
    pub vals: Vec<String>,
    /// Combination key -> probability vector over `vals`.
    pub cprob: IndexMap<String, Vec<f64>>,
}

pub fn fit(node: &Node, data: &DataFrame) -> Result<DiscreteParams> {
    let own = disc_column(data, &node.name)?;
    let vals = vocabulary(&own);

    let parents: Vec<Vec<Option<String>>> = node
        .disc_parents
        .iter()
        .map(|p| disc_column(data, p))
        .collect::<Result<_>>()?;
    let vocabs: Vec<Vec<String>> = parents.iter().map(|c| vocabulary(c)).collect();

    let mut cprob = IndexMap::new();
    for combo in parent_combinations(&vocabs) {
        let mut counts = vec![0.0; vals.len()];
        let mut total = 0.0;
        for (row, value) in own.iter().enumerate() {
            let matches = parents
                .iter()
                .zip(&combo)
                .all(|(col, want)| col[row].as_deref() == Some(want.as_str()));
            if !matches {
                continue;
            }
            if let Some(v) = value {
                if let Some(idx) = vals.iter().position(|x| x == v) {
                    counts[idx] += 1.0;
                    total += 1.0;
                }
            }
        }

        let probs = if total > 0.0 {
            counts.iter().map(|c| c / total).collect()
        } else {
            // structurally present but unobserved; keep a validly shaped entry
            vec![1.0 / vals.len().max(1) as f64; vals.len()]
        };
        cprob.insert(combination_key(&combo), probs);
    }

    Ok(DiscreteParams { vals, cprob })
}

pub fn choose<R: Rng>(params: &DiscreteParams, pvals: &[Value], rng: &mut R) -> Result<Value> {
    let probs = lookup(params, pvals)?;
    let dist = WeightedIndex::new(probs).map_err(|e| BnError::Estimation(e.to_string()))?;
    Ok(Value::disc(params.vals[dist.sample(rng)].clone()))
}

pub fn predict(params: &DiscreteParams, pvals: &[Value]) -> Result<Value> {
    let probs = lookup(params, pvals)?;
    let idx = crate::estimators::logistic::argmax(probs);
    params
        .vals
        .get(idx)
        .map(|v| Value::disc(v.clone()))
        .ok_or_else(|| BnError::Estimation("empty vocabulary".into()))
}

fn lookup<'p>(params: &'p DiscreteParams, pvals: &[Value]) -> Result<&'p [f64]> {
    let key = combination_key(&category_values(pvals)?);
    params
        .cprob
        .get(&key)
        .map(|p| p.as_slice())
        .ok_or(BnError::UnknownCombination(key))
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::nodes::NodeType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// 30 rows over a child with two discrete parents, covering most but not
    /// all of the 3x3 parent combinations.
    fn fixture() -> (Node, DataFrame) {
        let mut node = Node::new("test", NodeType::Discrete);
        node.disc_parents = vec!["node4".into(), "node5".into()];
        node.children = vec!["node6".into()];

        let child: Vec<&str> = ["cat1", "cat2", "cat3", "cat1", "cat2", "cat1"]
            .into_iter()
            .cycle()
            .take(30)
            .collect();
        let p4: Vec<&str> = ["cat4", "cat4", "cat5", "cat5", "cat6", "cat4"]
            .into_iter()
            .cycle()
            .take(30)
            .collect();
        let p5: Vec<&str> = ["cat7", "cat8", "cat7", "cat9", "cat8", "cat7"]
            .into_iter()
            .cycle()
            .take(30)
            .collect();

        let mut df = DataFrame::new();
        df.insert_disc("test", &child);
        df.insert_disc("node4", &p4);
        df.insert_disc("node5", &p5);
        (node, df)
    }

    #[test]
    fn fit_produces_normalized_vectors_for_every_combination() {
        let (node, df) = fixture();
        let params = fit(&node, &df).unwrap();

        assert_eq!(params.vals, vec!["cat1", "cat2", "cat3"]);
        // 3 x 3 cartesian combinations, observed or not
        assert_eq!(params.cprob.len(), 9);
        for probs in params.cprob.values() {
            assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn choose_stays_in_vocabulary() {
        let (node, df) = fixture();
        let params = fit(&node, &df).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..20 {
            let v = choose(
                &params,
                &[Value::disc("cat4"), Value::disc("cat7")],
                &mut rng,
            )
            .unwrap();
            let label = v.as_category().unwrap();
            assert!(params.vals.contains(&label));
        }
    }

    #[test]
    fn predict_is_argmax_and_deterministic() {
        let (node, df) = fixture();
        let params = fit(&node, &df).unwrap();

        let pvals = [Value::disc("cat4"), Value::disc("cat7")];
        let first = predict(&params, &pvals).unwrap();
        assert_eq!(first, predict(&params, &pvals).unwrap());
        // rows with (cat4, cat7) are all cat1 in the fixture
        assert_eq!(first, Value::disc("cat1"));
    }

    #[test]
    fn unseen_combination_is_a_lookup_error() {
        let (node, df) = fixture();
        let params = fit(&node, &df).unwrap();

        let err = predict(&params, &[Value::disc("bad"), Value::disc("values")]).unwrap_err();
        assert!(matches!(err, BnError::UnknownCombination(_)));
    }

    #[test]
    fn missing_column_fails() {
        let node = Node::new("absent", NodeType::Discrete);
        assert!(matches!(
            fit(&node, &DataFrame::new()),
            Err(BnError::MissingColumn(_))
        ));
    }
}
