//! The `ParameterStore`: an on-disk cache for fitted artifacts.
//!
//! Regression and classification artifacts are not inlined in the params
//! file; they live under a per-node subdirectory of the store root, named by
//! the node's position in the network's node list, and params records hold an
//! [`ArtifactRef`] in their place. Per-node directories are disjoint, so
//! concurrent fitting needs no locking. The store is write-once per fitting
//! cycle and safe to delete between cycles.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A reference to an artifact held by the store: the owning node's index and
/// the file name under that node's subdirectory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub index: usize,
    pub file: String,
}

/// A path-addressed artifact cache rooted at an explicit directory.
#[derive(Clone, Debug)]
pub struct ParameterStore {
    root: PathBuf,
}

impl ParameterStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ParameterStore { root: root.into() }
    }

    /// The documented default root, relative to the working directory.
    pub fn default_root() -> PathBuf {
        PathBuf::from("node_params")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn node_dir(&self, index: usize) -> PathBuf {
        self.root.join(index.to_string())
    }

    /// Create the root and the subdirectory for `index` if absent. Called
    /// for every artifact-bearing node before fitting starts, so the store
    /// is fully materialized before any dependent read.
    pub fn materialize(&self, index: usize) -> Result<PathBuf> {
        let dir = self.node_dir(index);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Serialize `artifact` under the node's subdirectory, returning the
    /// reference to embed in a params record.
    pub fn put<T: Serialize>(&self, index: usize, file: &str, artifact: &T) -> Result<ArtifactRef> {
        let dir = self.materialize(index)?;
        let json = serde_json::to_vec(artifact)?;
        fs::write(dir.join(file), json)?;
        Ok(ArtifactRef {
            index,
            file: file.to_string(),
        })
    }

    pub fn get<T: DeserializeOwned>(&self, artifact: &ArtifactRef) -> Result<T> {
        let path = self.node_dir(artifact.index).join(&artifact.file);
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Remove the whole store. A fresh fitting cycle recreates it lazily.
    pub fn clear(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        ParameterStore::new(Self::default_root())
    }
}
