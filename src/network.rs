//! The network engine: structure bookkeeping, parallel parameter fitting,
//! topological ancestral sampling, and evidence-conditioned prediction.
//!
//! The engine owns the node collection, the edge list, the descriptor and
//! the fitted distributions mapping. Structure discovery and edge weighting
//! are external collaborators behind the [`StructureBuilder`] and
//! [`EdgeWeighter`] seams; the engine only validates and consumes their
//! output.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use indicatif::{ParallelProgressIterator, ProgressBar};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::data::{DataFrame, Value};
use crate::descriptor::Descriptor;
use crate::error::{BnError, Result};
use crate::nodes::{FitContext, Node, NodeParams};
use crate::store::ParameterStore;

const DEFAULT_MIXTURE_COMPONENTS: usize = 3;

/// An external structure-learning collaborator: produces the node list and
/// edge list the engine will consume.
pub trait StructureBuilder {
    fn build(
        &self,
        data: &DataFrame,
        descriptor: &Descriptor,
    ) -> Result<(Vec<Node>, Vec<(String, String)>)>;
}

/// An external edge-strength estimator.
pub trait EdgeWeighter {
    fn calculate_weights(
        &self,
        network: &BayesianNetwork,
        data: &DataFrame,
    ) -> Result<IndexMap<(String, String), f64>>;
}

/// A hybrid Bayesian network over named nodes of mixed distribution
/// families.
pub struct BayesianNetwork {
    nodes: Vec<Node>,
    edges: Vec<(String, String)>,
    descriptor: Descriptor,
    distributions: IndexMap<String, NodeParams>,
    /// Whether discrete-child-of-continuous-parent (logit) edges are
    /// admitted by `set_edges`.
    has_logit: bool,
    mixture_components: usize,
    store: ParameterStore,
}

impl Default for BayesianNetwork {
    fn default() -> Self {
        BayesianNetwork::new()
    }
}

impl BayesianNetwork {
    pub fn new() -> Self {
        BayesianNetwork {
            nodes: Vec::new(),
            edges: Vec::new(),
            descriptor: Descriptor::new(),
            distributions: IndexMap::new(),
            has_logit: false,
            mixture_components: DEFAULT_MIXTURE_COMPONENTS,
            store: ParameterStore::default(),
        }
    }

    /// A network whose parameter store lives under `root` instead of the
    /// default working-directory location.
    pub fn with_storage(root: impl Into<std::path::PathBuf>) -> Self {
        let mut bn = BayesianNetwork::new();
        bn.store = ParameterStore::new(root);
        bn
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn distributions(&self) -> &IndexMap<String, NodeParams> {
        &self.distributions
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub fn set_has_logit(&mut self, has_logit: bool) {
        self.has_logit = has_logit;
    }

    pub fn set_mixture_components(&mut self, k: usize) {
        self.mixture_components = k.max(1);
    }

    /// Check a descriptor against the current node set: every declared type
    /// must be the `Abstract` placeholder or exactly the effective kind of
    /// the same-named node.
    pub fn validate(&self, descriptor: &Descriptor) -> bool {
        descriptor.types.iter().all(|(name, kind)| {
            if kind.is_placeholder() {
                return true;
            }
            self.nodes
                .iter()
                .find(|n| &n.name == name)
                .is_some_and(|n| n.ty.var_kind() == *kind)
        })
    }

    /// Restrict the descriptor to exactly the current node names. Entries
    /// are pruned, never inferred.
    pub fn update_descriptor(&mut self) {
        let names: Vec<&str> = self.nodes.iter().map(|n| n.name.as_str()).collect();
        self.descriptor.retain_names(&names);
    }

    /// Accept a node set only if `info.types` supplies a concrete
    /// (non-placeholder) type for every node; otherwise the node set is
    /// rejected and becomes empty.
    pub fn set_nodes(&mut self, nodes: Vec<Node>, info: &Descriptor) {
        let ok = nodes
            .iter()
            .all(|n| info.kind_of(&n.name).is_some_and(|k| !k.is_placeholder()));
        if !ok {
            warn!("node set rejected: missing or placeholder types in the descriptor");
            self.nodes = Vec::new();
            return;
        }
        self.nodes = nodes;
        self.descriptor = info.clone();
    }

    /// Apply the edges whose endpoints are valid names of current nodes,
    /// silently dropping the rest, and back-fill every node's parent and
    /// child relation lists.
    ///
    /// An endpoint is valid when it is a non-empty, non-purely-numeric
    /// string naming a current node. A continuous-parent/discrete-child
    /// edge is additionally dropped unless `has_logit` is set, since only
    /// the logit family can realize that dependence.
    pub fn set_edges(&mut self, edges: &[(Value, Value)]) {
        let mut kept = Vec::new();
        for (parent, child) in edges {
            let (Some(parent), Some(child)) = (self.endpoint(parent), self.endpoint(child))
            else {
                warn!(?parent, ?child, "dropping edge with malformed endpoint");
                continue;
            };

            let parent_cont = self
                .descriptor
                .kind_of(&parent)
                .is_some_and(|k| k.is_continuous());
            let child_disc = self
                .descriptor
                .kind_of(&child)
                .is_some_and(|k| k.is_discrete());
            if !self.has_logit && parent_cont && child_disc {
                warn!(%parent, %child, "dropping continuous-to-discrete edge without logit nodes");
                continue;
            }

            kept.push((parent, child));
        }

        self.edges = kept;
        self.rebuild_relations();
    }

    fn endpoint(&self, value: &Value) -> Option<String> {
        let Value::Disc(name) = value else {
            return None;
        };
        if name.is_empty() || name.parse::<f64>().is_ok() {
            return None;
        }
        self.nodes
            .iter()
            .any(|n| &n.name == name)
            .then(|| name.clone())
    }

    fn rebuild_relations(&mut self) {
        for node in &mut self.nodes {
            node.disc_parents.clear();
            node.cont_parents.clear();
            node.children.clear();
        }

        let edges = self.edges.clone();
        for (parent, child) in &edges {
            let parent_disc = self
                .descriptor
                .kind_of(parent)
                .is_some_and(|k| k.is_discrete());

            if let Some(node) = self.nodes.iter_mut().find(|n| &n.name == child) {
                if parent_disc {
                    node.disc_parents.push(parent.clone());
                } else {
                    node.cont_parents.push(parent.clone());
                }
            }
            if let Some(node) = self.nodes.iter_mut().find(|n| &n.name == parent) {
                node.children.push(child.clone());
            }
        }
    }

    /// A topological order over node indices (parents before children).
    /// The edge list must describe a DAG.
    pub fn topological_order(&self) -> Result<Vec<usize>> {
        let index_of = |name: &str| self.nodes.iter().position(|n| n.name == name);

        let mut indegree = vec![0usize; self.nodes.len()];
        let mut adjacency = vec![Vec::new(); self.nodes.len()];
        for (parent, child) in &self.edges {
            let (Some(p), Some(c)) = (index_of(parent), index_of(child)) else {
                continue;
            };
            indegree[c] += 1;
            adjacency[p].push(c);
        }

        let mut queue: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&i| indegree[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(i) = queue.pop_front() {
            order.push(i);
            for &c in &adjacency[i] {
                indegree[c] -= 1;
                if indegree[c] == 0 {
                    queue.push_back(c);
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(BnError::CyclicGraph);
        }
        Ok(order)
    }

    /// Fit every node's conditional distribution from the dataset,
    /// distributing node-level fitting across up to `parall_count` workers.
    /// Nodes are independent once parent identities are fixed, so no
    /// cross-node ordering is required.
    ///
    /// The parameter store root and every artifact-bearing node's
    /// subdirectory are materialized before fitting starts, so the store
    /// layout exists even if a node's fit later fails.
    pub fn fit_parameters(&mut self, data: &DataFrame, parall_count: usize) -> Result<()> {
        self.distributions.clear();

        for (index, node) in self.nodes.iter().enumerate() {
            if node.ty.needs_store() {
                self.store.materialize(index)?;
            }
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parall_count.max(1))
            .build()
            .map_err(|e| BnError::ThreadPool(e.to_string()))?;

        let fitted: Result<Vec<(String, NodeParams)>> = pool.install(|| {
            self.nodes
                .par_iter()
                .enumerate()
                .map(|(index, node)| {
                    debug!(node = %node.name, "fitting parameters");
                    let ctx = FitContext {
                        store: &self.store,
                        index,
                        mixture_components: self.mixture_components,
                    };
                    node.fit_parameters(data, &ctx)
                        .map(|params| (node.name.clone(), params))
                })
                .collect()
        });

        self.distributions = fitted?.into_iter().collect();
        Ok(())
    }

    /// Generate `n` records by ancestral sampling and return them as a
    /// table with one column per node.
    pub fn sample(&self, n: usize, progress_bar: bool) -> Result<DataFrame> {
        let records = self.sample_records(n, progress_bar)?;
        let order: Vec<&str> = self.nodes.iter().map(|nd| nd.name.as_str()).collect();
        Ok(DataFrame::from_records(&records, &order))
    }

    /// Generate `n` records by ancestral sampling, as per-record mappings.
    ///
    /// Nodes are processed in topological order, so each draw conditions on
    /// the already-sampled values of its declared parents. A failed draw
    /// degrades to `Missing` for that cell; it never aborts the batch.
    pub fn sample_records(
        &self,
        n: usize,
        progress_bar: bool,
    ) -> Result<Vec<IndexMap<String, Value>>> {
        self.require_fitted()?;
        let order = self.topological_order()?;

        let bar = if progress_bar {
            ProgressBar::new(n as u64)
        } else {
            ProgressBar::hidden()
        };

        let mut rng = StdRng::from_entropy();
        let mut records = Vec::with_capacity(n);
        for _ in 0..n {
            let mut record: IndexMap<String, Value> = IndexMap::with_capacity(self.nodes.len());
            for &idx in &order {
                let node = &self.nodes[idx];
                let params = &self.distributions[&node.name];
                let value = self.resolve(node, params, &record, |node, params, pvals| {
                    node.choose(params, pvals, &self.store, &mut rng)
                });
                record.insert(node.name.clone(), value);
            }
            records.push(record);
            bar.inc(1);
        }
        bar.finish_and_clear();

        Ok(records)
    }

    /// Predict the unobserved nodes of each input row.
    ///
    /// Rows are independent and processed across up to `parall_count`
    /// workers; within a row, nodes are walked strictly in topological
    /// order so a node's prediction observes its parents' already-resolved
    /// values. Evidence columns pass through unchanged. An unresolved
    /// ancestor or a failed prediction yields `Missing` for that cell only.
    ///
    /// Returns one column per node, one value per input row.
    pub fn predict(
        &self,
        data: &DataFrame,
        parall_count: usize,
        progress_bar: bool,
    ) -> Result<IndexMap<String, Vec<Value>>> {
        self.require_fitted()?;
        let order = self.topological_order()?;
        let n = data.n_rows();

        let bar = if progress_bar {
            ProgressBar::new(n as u64)
        } else {
            ProgressBar::hidden()
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parall_count.max(1))
            .build()
            .map_err(|e| BnError::ThreadPool(e.to_string()))?;

        let rows: Result<Vec<Vec<Value>>> = pool.install(|| {
            (0..n)
                .into_par_iter()
                .progress_with(bar)
                .map(|row| self.predict_row(data, row, &order))
                .collect()
        });
        let rows = rows?;

        let mut out: IndexMap<String, Vec<Value>> = IndexMap::with_capacity(self.nodes.len());
        for (j, node) in self.nodes.iter().enumerate() {
            out.insert(
                node.name.clone(),
                rows.iter().map(|r| r[j].clone()).collect(),
            );
        }
        Ok(out)
    }

    fn predict_row(&self, data: &DataFrame, row: usize, order: &[usize]) -> Result<Vec<Value>> {
        let mut resolved: IndexMap<String, Value> = IndexMap::with_capacity(self.nodes.len());
        for &idx in order {
            let node = &self.nodes[idx];
            let value = if data.has_column(&node.name) {
                data.value(&node.name, row)?
            } else {
                let params = &self.distributions[&node.name];
                self.resolve(node, params, &resolved, |node, params, pvals| {
                    node.predict(params, pvals, &self.store)
                })
            };
            resolved.insert(node.name.clone(), value);
        }

        Ok(self
            .nodes
            .iter()
            .map(|node| resolved[&node.name].clone())
            .collect())
    }

    /// Gather a node's parent values from already-resolved cells and apply
    /// `op`; missing ancestors or a failed operation degrade to `Missing`.
    fn resolve<F>(
        &self,
        node: &Node,
        params: &NodeParams,
        resolved: &IndexMap<String, Value>,
        mut op: F,
    ) -> Value
    where
        F: FnMut(&Node, &NodeParams, &[Value]) -> Result<Value>,
    {
        let pvals: Vec<Value> = node
            .parent_order()
            .map(|p| resolved.get(p).cloned().unwrap_or(Value::Missing))
            .collect();
        if pvals.iter().any(Value::is_missing) {
            return Value::Missing;
        }
        match op(node, params, &pvals) {
            Ok(value) => value,
            Err(e) => {
                warn!(node = %node.name, error = %e, "node evaluation failed; emitting missing");
                Value::Missing
            }
        }
    }

    fn require_fitted(&self) -> Result<()> {
        for node in &self.nodes {
            if !self.distributions.contains_key(&node.name) {
                return Err(BnError::NotFitted(node.name.clone()));
            }
        }
        Ok(())
    }

    /// Serialize the edge list as a JSON array of `[parent, child]` pairs.
    /// Non-`.json` destinations are declined with `Ok(false)`.
    pub fn save_structure(&self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        if !is_json(path) {
            warn!(path = %path.display(), "structure is only saved to .json destinations");
            return Ok(false);
        }
        fs::write(path, serde_json::to_vec_pretty(&self.edges)?)?;
        Ok(true)
    }

    /// Replace the edge list from a structure file written by
    /// [`save_structure`](Self::save_structure). Relation lists are only
    /// rebuilt by `set_edges`, which validates endpoints against nodes.
    pub fn load_structure(&mut self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        if !is_json(path) {
            warn!(path = %path.display(), "structure is only loaded from .json sources");
            return Ok(false);
        }
        self.edges = serde_json::from_slice(&fs::read(path)?)?;
        Ok(true)
    }

    /// Serialize the distributions mapping exactly as produced by
    /// `fit_parameters`. Non-`.json` destinations are declined with
    /// `Ok(false)`.
    pub fn save_params(&self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        if !is_json(path) {
            warn!(path = %path.display(), "parameters are only saved to .json destinations");
            return Ok(false);
        }
        fs::write(path, serde_json::to_vec_pretty(&self.distributions)?)?;
        Ok(true)
    }

    /// Replace the distributions mapping from a params file written by
    /// [`save_params`](Self::save_params).
    pub fn load_params(&mut self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        if !is_json(path) {
            warn!(path = %path.display(), "parameters are only loaded from .json sources");
            return Ok(false);
        }
        self.distributions = serde_json::from_slice(&fs::read(path)?)?;
        Ok(true)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "json")
}

/// Convenience constructor for a well-formed edge endpoint pair.
pub fn edge(parent: &str, child: &str) -> (Value, Value) {
    (Value::disc(parent), Value::disc(child))
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::descriptor::{Sign, VarKind};
    use crate::nodes::NodeType;
    use tempfile::tempdir;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn three_nodes() -> Vec<Node> {
        vec![
            Node::new("Node0", NodeType::Gaussian),
            Node::new("Node1", NodeType::Discrete),
            Node::new("Node2", NodeType::Gaussian),
        ]
    }

    fn three_node_descriptor() -> Descriptor {
        Descriptor::new()
            .with_type("Node0", VarKind::Cont)
            .with_type("Node1", VarKind::Disc)
            .with_type("Node2", VarKind::Cont)
            .with_sign("Node0", Sign::Pos)
            .with_sign("Node1", Sign::Neg)
    }

    /// The 41-row categorical survey dataset used by the end-to-end
    /// scenarios, with integer codes carried as category labels.
    fn survey_data() -> DataFrame {
        let columns: [(&str, [i32; 41]); 9] = [
            (
                "Tectonic regime",
                [
                    0, 1, 4, 4, 0, 2, 0, 0, 0, 0, 3, 1, 0, 3, 0, 1, 4, 0, 4, 3, 4, 0, 1, 1, 1, 0,
                    1, 1, 1, 1, 1, 0, 0, 3, 2, 3, 2, 3, 3, 3, 0,
                ],
            ),
            (
                "Period",
                [
                    3, 1, 4, 4, 1, 1, 0, 0, 3, 5, 3, 9, 0, 5, 0, 3, 5, 3, 2, 4, 4, 1, 5, 7, 7, 7,
                    1, 1, 1, 1, 4, 6, 8, 4, 4, 5, 4, 7, 5, 5, 0,
                ],
            ),
            (
                "Lithology",
                [
                    2, 4, 6, 4, 2, 2, 2, 2, 4, 4, 4, 4, 1, 4, 1, 4, 4, 4, 5, 3, 2, 2, 2, 4, 1, 1,
                    3, 4, 4, 4, 4, 2, 0, 3, 4, 4, 4, 4, 4, 4, 2,
                ],
            ),
            (
                "Structural setting",
                [
                    2, 6, 10, 10, 7, 5, 8, 8, 2, 2, 6, 6, 3, 7, 3, 6, 10, 9, 3, 0, 0, 7, 6, 6, 6,
                    7, 6, 6, 6, 6, 8, 2, 9, 4, 7, 6, 1, 8, 4, 4, 3,
                ],
            ),
            (
                "Gross",
                [
                    1, 3, 1, 3, 1, 0, 2, 3, 0, 4, 4, 4, 0, 3, 0, 0, 3, 4, 0, 4, 3, 2, 2, 4, 0, 4,
                    1, 2, 2, 4, 2, 4, 3, 1, 1, 1, 2, 3, 0, 2, 1,
                ],
            ),
            (
                "Netpay",
                [
                    3, 2, 1, 4, 2, 0, 2, 2, 1, 4, 3, 4, 0, 3, 1, 1, 0, 4, 1, 3, 4, 3, 3, 4, 0, 4,
                    0, 1, 2, 4, 2, 3, 2, 1, 2, 0, 2, 4, 1, 3, 0,
                ],
            ),
            (
                "Porosity",
                [
                    3, 0, 4, 3, 3, 1, 0, 0, 3, 0, 2, 1, 2, 3, 0, 2, 3, 0, 0, 4, 2, 4, 2, 2, 1, 1,
                    1, 3, 3, 2, 4, 3, 1, 4, 4, 4, 3, 1, 4, 4, 0,
                ],
            ),
            (
                "Permeability",
                [
                    4, 0, 3, 3, 2, 1, 1, 1, 1, 0, 4, 4, 1, 3, 1, 4, 3, 0, 0, 3, 0, 1, 2, 0, 2, 2,
                    1, 2, 3, 4, 3, 2, 2, 2, 4, 4, 3, 0, 4, 4, 0,
                ],
            ),
            (
                "Depth",
                [
                    1, 4, 3, 4, 1, 3, 1, 3, 1, 4, 3, 4, 1, 2, 1, 4, 0, 4, 0, 0, 3, 2, 3, 2, 2, 3,
                    4, 2, 2, 4, 1, 0, 2, 0, 4, 0, 1, 2, 0, 0, 3,
                ],
            ),
        ];

        let mut df = DataFrame::new();
        for (name, values) in columns {
            let labels: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            df.insert_disc(name, &labels);
        }
        df
    }

    fn survey_edges() -> Vec<(Value, Value)> {
        vec![
            edge("Tectonic regime", "Period"),
            edge("Structural setting", "Period"),
            edge("Tectonic regime", "Lithology"),
            edge("Lithology", "Structural setting"),
        ]
    }

    fn survey_network(names: &[&str], store_root: &Path) -> BayesianNetwork {
        let mut bn = BayesianNetwork::with_storage(store_root);
        let nodes: Vec<Node> = names
            .iter()
            .map(|n| Node::new(*n, NodeType::Discrete))
            .collect();
        let mut info = Descriptor::new();
        for name in names {
            info = info.with_type(*name, VarKind::Disc);
        }
        bn.set_nodes(nodes, &info);
        bn.set_edges(&survey_edges());
        bn
    }

    #[test]
    fn validate_accepts_placeholders_and_exact_matches_only() {
        let bn = BayesianNetwork::new();

        let all_abstract = Descriptor::new()
            .with_type("Node0", VarKind::Abstract)
            .with_type("Node1", VarKind::Abstract);
        let mixed = Descriptor::new()
            .with_type("Node0", VarKind::Abstract)
            .with_type("Node1", VarKind::Cont);

        assert!(bn.validate(&all_abstract));
        assert!(!bn.validate(&mixed));

        let mut bn = BayesianNetwork::new();
        bn.set_nodes(three_nodes(), &three_node_descriptor());
        assert!(bn.validate(&three_node_descriptor()));
    }

    #[test]
    fn update_descriptor_prunes_to_node_names() {
        let mut bn = BayesianNetwork::new();
        bn.set_nodes(
            vec![Node::new("Node0", NodeType::Gaussian)],
            &three_node_descriptor(),
        );

        bn.update_descriptor();
        assert_eq!(bn.descriptor().types.len(), 1);
        assert_eq!(bn.descriptor().kind_of("Node0"), Some(VarKind::Cont));
        assert_eq!(bn.descriptor().signs.len(), 1);
    }

    #[test]
    fn set_nodes_fails_closed() {
        let mut bn = BayesianNetwork::new();

        // a node without a descriptor entry rejects the whole set
        let incomplete = Descriptor::new().with_type("Node0", VarKind::Cont);
        bn.set_nodes(three_nodes(), &incomplete);
        assert!(bn.nodes().is_empty());

        // placeholder types are not concrete
        let placeholder = Descriptor::new()
            .with_type("Node0", VarKind::Abstract)
            .with_type("Node1", VarKind::Abstract)
            .with_type("Node2", VarKind::Abstract);
        bn.set_nodes(three_nodes(), &placeholder);
        assert!(bn.nodes().is_empty());

        bn.set_nodes(three_nodes(), &three_node_descriptor());
        assert_eq!(bn.nodes().len(), 3);
    }

    #[test]
    fn set_edges_drops_malformed_and_logit_edges() {
        init_tracing();
        let mut bn = BayesianNetwork::new();
        bn.set_nodes(three_nodes(), &three_node_descriptor());

        let edges = vec![
            edge("Node0", "Node1"),
            edge("Node1", "Node2"),
            (Value::cont(0.0), Value::cont(1.0)),
            (Value::Missing, Value::disc("1")),
        ];
        bn.set_edges(&edges);

        // numeric and null endpoints are dropped; the continuous-to-discrete
        // edge is dropped because logit nodes are not enabled
        assert_eq!(
            bn.edges(),
            &[("Node1".to_string(), "Node2".to_string())]
        );

        let node1 = &bn.nodes()[1];
        assert_eq!(node1.children, vec!["Node2"]);
        let node2 = &bn.nodes()[2];
        assert_eq!(node2.disc_parents, vec!["Node1"]);
        assert!(node2.cont_parents.is_empty());

        // with logit nodes enabled the same edge survives
        bn.set_has_logit(true);
        bn.set_edges(&edges);
        assert_eq!(bn.edges().len(), 2);
    }

    #[test]
    fn fit_materializes_the_store_before_failing() {
        init_tracing();
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("store");
        let mut bn = BayesianNetwork::with_storage(&root);

        bn.set_nodes(
            vec![Node::new("Node0", NodeType::Logit)],
            &Descriptor::new().with_type("Node0", VarKind::Disc),
        );

        let err = bn.fit_parameters(&DataFrame::new(), 1).unwrap_err();
        assert!(matches!(err, BnError::MissingColumn(_)));

        // the store root and the node's subdirectory exist regardless
        assert!(root.is_dir());
        assert!(root.join("0").is_dir());
    }

    #[test]
    fn sample_covers_every_node_with_known_values() {
        let tmp = tempdir().unwrap();
        let data = survey_data();
        let names: Vec<&str> = data.column_names().collect();
        let mut bn = survey_network(&names, &tmp.path().join("store"));

        bn.fit_parameters(&data, 2).unwrap();
        let records = bn.sample_records(50, false).unwrap();
        assert_eq!(records.len(), 50);

        for record in &records {
            for name in &names {
                let value = &record[*name];
                assert!(!value.is_missing(), "missing sample for {}", name);
                let label = value.as_category().unwrap();
                let observed: Vec<String> = data
                    .column(name)
                    .unwrap()
                    .iter()
                    .filter_map(|v| v.as_category())
                    .collect();
                assert!(observed.contains(&label), "{} not observed for {}", label, name);
            }
        }

        let frame = bn.sample(10, false).unwrap();
        assert_eq!(frame.n_rows(), 10);
        assert_eq!(frame.n_columns(), names.len());
    }

    #[test]
    fn predict_fills_the_missing_column() {
        let tmp = tempdir().unwrap();
        let data = survey_data();
        let names = [
            "Tectonic regime",
            "Period",
            "Lithology",
            "Structural setting",
        ];
        let mut bn = survey_network(&names, &tmp.path().join("store"));

        let fit_data = data.select(&names);
        bn.fit_parameters(&fit_data, 2).unwrap();

        let evidence = data.select(&names[..3]);
        let result = bn.predict(&evidence, 2, false).unwrap();
        assert!(!result.is_empty());

        let predicted = &result["Structural setting"];
        assert_eq!(predicted.len(), fit_data.n_rows());
        assert!(predicted.iter().all(|v| !v.is_missing()));

        // evidence columns pass through unchanged
        for name in &names[..3] {
            assert_eq!(result[*name], evidence.column(name).unwrap().to_vec());
        }
    }

    #[test]
    fn structure_round_trip_preserves_edge_order() {
        let tmp = tempdir().unwrap();
        let mut bn = BayesianNetwork::new();
        bn.set_nodes(three_nodes(), &three_node_descriptor());
        bn.set_has_logit(true);
        bn.set_edges(&[edge("Node0", "Node1"), edge("Node1", "Node2")]);

        assert!(!bn.save_structure(tmp.path().join("out.txt")).unwrap());

        let path = tmp.path().join("out.json");
        assert!(bn.save_structure(&path).unwrap());

        let mut other = BayesianNetwork::new();
        assert!(other.load_structure(&path).unwrap());
        assert_eq!(other.edges(), bn.edges());
    }

    #[test]
    fn params_round_trip_is_deep_equal() {
        let tmp = tempdir().unwrap();
        let data = survey_data();
        let names = ["Tectonic regime", "Lithology"];
        let mut bn = survey_network(&names, &tmp.path().join("store"));
        bn.fit_parameters(&data.select(&names), 1).unwrap();

        assert!(!bn.save_params(tmp.path().join("params.txt")).unwrap());

        let path = tmp.path().join("params.json");
        assert!(bn.save_params(&path).unwrap());

        let mut other = BayesianNetwork::new();
        assert!(other.load_params(&path).unwrap());
        assert_eq!(other.distributions(), bn.distributions());
    }

    #[test]
    fn cyclic_structure_is_rejected() {
        let tmp = tempdir().unwrap();
        let mut bn = BayesianNetwork::with_storage(tmp.path().join("store"));
        let info = Descriptor::new()
            .with_type("a", VarKind::Disc)
            .with_type("b", VarKind::Disc);
        bn.set_nodes(
            vec![
                Node::new("a", NodeType::Discrete),
                Node::new("b", NodeType::Discrete),
            ],
            &info,
        );
        bn.set_edges(&[edge("a", "b"), edge("b", "a")]);

        let mut df = DataFrame::new();
        df.insert_disc("a", &["x", "y", "x"]);
        df.insert_disc("b", &["u", "u", "v"]);
        bn.fit_parameters(&df, 1).unwrap();

        assert!(matches!(
            bn.sample_records(5, false),
            Err(BnError::CyclicGraph)
        ));
    }
}
