//! Defines the error type for the `hybnet` library.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BnError>;

#[derive(Debug, Error)]
pub enum BnError {
    /// A conditional lookup used a discrete parent combination that was never
    /// seen at fit time. Never retried or defaulted; callers must ensure the
    /// combination was represented in the training data.
    #[error("unknown parent combination {0}")]
    UnknownCombination(String),

    /// Parent values passed to `choose`/`predict` had the wrong arity, the
    /// wrong kind, or could not be coerced to what the fitted model expects.
    #[error("invalid parent values: {0}")]
    InvalidParentValues(String),

    /// The dataset does not carry a column required for fitting.
    #[error("column `{0}` is missing from the dataset")]
    MissingColumn(String),

    /// A combination was present at fit time but produced no usable
    /// statistics (neither a mean nor a regression artifact).
    #[error("empty conditional distribution for combination {0}")]
    EmptyCombination(String),

    /// `sample`/`predict` was called before `fit_parameters`.
    #[error("no distribution fitted for node `{0}`")]
    NotFitted(String),

    /// A params record does not belong to the node family it was given to.
    #[error("parameter record does not match the `{0}` node family")]
    FamilyMismatch(String),

    /// The edge list does not describe a DAG.
    #[error("the edge list contains a cycle")]
    CyclicGraph,

    /// A numeric fitting routine failed (singular system, degenerate data).
    #[error("estimation failed: {0}")]
    Estimation(String),

    #[error("thread pool: {0}")]
    ThreadPool(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}
