//! The `Descriptor`: declared variable kinds and domain signs.
//!
//! A descriptor is produced by an external type-inference collaborator and
//! consumed by the engine to split parents into discrete/continuous lists and
//! to validate node types. Signs are carried for downstream consumers and are
//! not enforced numerically here.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The declared kind of a variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    #[serde(rename = "cont")]
    Cont,
    #[serde(rename = "disc")]
    Disc,
    /// A discrete variable with numeric labels.
    #[serde(rename = "disc_num")]
    DiscNum,
    /// An unspecified placeholder, accepted by the validator for any node.
    #[serde(rename = "Abstract")]
    Abstract,
}

impl VarKind {
    pub fn is_discrete(&self) -> bool {
        matches!(self, VarKind::Disc | VarKind::DiscNum)
    }

    pub fn is_continuous(&self) -> bool {
        matches!(self, VarKind::Cont)
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, VarKind::Abstract)
    }
}

/// The sign of a continuous variable's domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sign {
    #[serde(rename = "pos")]
    Pos,
    #[serde(rename = "neg")]
    Neg,
}

/// Variable metadata: `name -> kind` and `name -> sign`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub types: IndexMap<String, VarKind>,
    pub signs: IndexMap<String, Sign>,
}

impl Descriptor {
    pub fn new() -> Self {
        Descriptor::default()
    }

    pub fn with_type(mut self, name: impl Into<String>, kind: VarKind) -> Self {
        self.types.insert(name.into(), kind);
        self
    }

    pub fn with_sign(mut self, name: impl Into<String>, sign: Sign) -> Self {
        self.signs.insert(name.into(), sign);
        self
    }

    pub fn kind_of(&self, name: &str) -> Option<VarKind> {
        self.types.get(name).copied()
    }

    /// Restrict `types` and `signs` to exactly the given names. Entries are
    /// never inferred, only pruned.
    pub fn retain_names(&mut self, names: &[&str]) {
        self.types.retain(|k, _| names.contains(&k.as_str()));
        self.signs.retain(|k, _| names.contains(&k.as_str()));
    }
}
