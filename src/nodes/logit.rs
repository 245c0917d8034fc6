//! The logit node family: a discrete child classified from its parents.
//!
//! Continuous parents feed the classifier directly; discrete parents are
//! one-hot encoded over the vocabulary observed at fit time. The fitted
//! classifier goes to the parameter store; the record keeps the class
//! vocabulary and the marginal class frequencies, which carry degenerate
//! fits (a single observed class, or too few rows for the classifier).

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::{DataFrame, Value};
use crate::error::{BnError, Result};
use crate::estimators::logistic::argmax;
use crate::estimators::LogitClassifier;
use crate::store::{ArtifactRef, ParameterStore};

use super::{category_values, cont_values, disc_column, vocabulary};
use super::{FitContext, Node};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogitParams {
    /// The class vocabulary, sorted; all outputs are members of it.
    pub classes: Vec<String>,
    /// Marginal class frequencies; the fallback distribution when no
    /// classifier artifact exists.
    pub cprob: Vec<f64>,
    /// Reference to the fitted classifier artifact in the parameter store.
    pub classifier: Option<ArtifactRef>,
}

/// The store artifact: the classifier plus the one-hot vocabularies of the
/// discrete parents, in declared parent order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogitArtifact {
    pub disc_vocab: Vec<Vec<String>>,
    pub classifier: LogitClassifier,
}

pub fn fit(node: &Node, data: &DataFrame, ctx: &FitContext) -> Result<LogitParams> {
    let own = disc_column(data, &node.name)?;
    let classes = vocabulary(&own);

    let cont_parents: Vec<Vec<Option<f64>>> = node
        .cont_parents
        .iter()
        .map(|p| super::cont_column(data, p))
        .collect::<Result<_>>()?;
    let disc_parents: Vec<Vec<Option<String>>> = node
        .disc_parents
        .iter()
        .map(|p| disc_column(data, p))
        .collect::<Result<_>>()?;
    let disc_vocab: Vec<Vec<String>> = disc_parents.iter().map(|c| vocabulary(c)).collect();

    // complete rows: label plus every encoded feature
    let mut labels = Vec::new();
    let mut rows = Vec::new();
    for (row, value) in own.iter().enumerate() {
        let Some(label) = value else { continue };
        let Some(class_idx) = classes.iter().position(|c| c == label) else {
            continue;
        };

        let cont: Option<Vec<f64>> = cont_parents.iter().map(|col| col[row]).collect();
        let Some(mut features) = cont else { continue };

        let mut complete = true;
        for (col, vocab) in disc_parents.iter().zip(&disc_vocab) {
            match &col[row] {
                Some(v) => features.extend(one_hot(vocab, v)?),
                None => {
                    complete = false;
                    break;
                }
            }
        }
        if complete {
            labels.push(class_idx);
            rows.push(features);
        }
    }

    let mut counts = vec![0.0; classes.len()];
    for &label in &labels {
        counts[label] += 1.0;
    }
    let total: f64 = counts.iter().sum();
    let cprob: Vec<f64> = if total > 0.0 {
        counts.iter().map(|c| c / total).collect()
    } else {
        vec![1.0 / classes.len().max(1) as f64; classes.len()]
    };

    // degenerate fits keep the marginal frequencies only
    if classes.len() < 2 || labels.len() < classes.len() + 1 {
        return Ok(LogitParams {
            classes,
            cprob,
            classifier: None,
        });
    }

    let n_features = rows.first().map_or(0, |r| r.len());
    let design = ndarray::Array2::from_shape_vec(
        (rows.len(), n_features),
        rows.iter().flatten().copied().collect(),
    )
    .map_err(|e| BnError::Estimation(e.to_string()))?;

    let classifier = LogitClassifier::fit(&design, &labels, classes.len())?;
    let artifact = ctx.store.put(
        ctx.index,
        "classifier.json",
        &LogitArtifact {
            disc_vocab,
            classifier,
        },
    )?;

    Ok(LogitParams {
        classes,
        cprob,
        classifier: Some(artifact),
    })
}

pub fn choose<R: Rng>(
    params: &LogitParams,
    pvals: &[Value],
    store: &ParameterStore,
    rng: &mut R,
) -> Result<Value> {
    let probs = class_probabilities(params, pvals, store)?;
    let dist = WeightedIndex::new(&probs).map_err(|e| BnError::Estimation(e.to_string()))?;
    Ok(Value::disc(params.classes[dist.sample(rng)].clone()))
}

pub fn predict(params: &LogitParams, pvals: &[Value], store: &ParameterStore) -> Result<Value> {
    let probs = class_probabilities(params, pvals, store)?;
    let idx = argmax(&probs);
    params
        .classes
        .get(idx)
        .map(|c| Value::disc(c.clone()))
        .ok_or_else(|| BnError::Estimation("empty class vocabulary".into()))
}

fn class_probabilities(
    params: &LogitParams,
    pvals: &[Value],
    store: &ParameterStore,
) -> Result<Vec<f64>> {
    let Some(artifact) = &params.classifier else {
        // marginal fallback; checked before any artifact dereference
        return Ok(params.cprob.clone());
    };

    let loaded: LogitArtifact = store.get(artifact)?;
    let n_disc = loaded.disc_vocab.len();
    if pvals.len() < n_disc {
        return Err(BnError::InvalidParentValues(format!(
            "expected at least {} parent values, got {}",
            n_disc,
            pvals.len()
        )));
    }

    let (cont, disc) = pvals.split_at(pvals.len() - n_disc);
    let mut features = cont_values(cont)?;
    for (vocab, label) in loaded.disc_vocab.iter().zip(category_values(disc)?) {
        features.extend(one_hot(vocab, &label)?);
    }

    loaded.classifier.predict_proba(&features)
}

fn one_hot(vocab: &[String], value: &str) -> Result<Vec<f64>> {
    let Some(idx) = vocab.iter().position(|v| v == value) else {
        return Err(BnError::InvalidParentValues(format!(
            "category `{}` was not seen at fit time",
            value
        )));
    };
    let mut out = vec![0.0; vocab.len()];
    out[idx] = 1.0;
    Ok(out)
}
