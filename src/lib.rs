//! `hybnet` is a hybrid Bayesian network engine.
//!
//! A network is a directed acyclic graph over named random variables of mixed
//! kinds: discrete categorical variables, continuous variables, and continuous
//! variables whose distribution depends on discrete parent combinations. The
//! engine learns per-node conditional distributions from tabular sample data,
//! generates synthetic samples by ancestral sampling, and predicts missing
//! values from partial observations.
//!
//! Structure discovery, type inference and scoring-function search are
//! external collaborators; the engine consumes a pre-validated node list,
//! edge list and descriptor (see [`network::StructureBuilder`]).

pub mod data;
pub mod descriptor;
pub mod error;
pub mod estimators;
pub mod network;
pub mod nodes;
pub mod store;

pub use data::{DataFrame, Value};
pub use descriptor::{Descriptor, Sign, VarKind};
pub use error::{BnError, Result};
pub use network::BayesianNetwork;
pub use nodes::{Node, NodeParams, NodeType};
pub use store::ParameterStore;
