//! The build graph.
//!
//! A [`Graph`] is an arena of [`Node`]s keyed by canonical path. Nodes refer to
//! their inputs by path; shared inputs (a header used by many translation
//! units) exist once and are looked up through the graph that owns them.
//!
//! # Duplicate policy
//!
//! [`Graph::add`] is first-write-wins: adding a node whose path is already
//! present returns the existing node and drops the new one. For produced
//! nodes this is sound because the path embeds the configuration signature.
//! When the dropped node is of a different kind than the kept one, a
//! [`DiagnosticKind::NodeConflict`] warning is emitted.

mod node;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::diagnostics::{Diagnostic, DiagnosticKind, SharedSink, tracing_sink};
use crate::error::{IncludeChain, ProjectError};

pub use node::{CompiledNode, ExternalNode, LinkSpec, LinkedNode, Node, NodeId, NodeKind, SourceNode};

#[derive(Debug)]
pub struct Graph {
  nodes: Vec<Node>,
  by_path: HashMap<PathBuf, NodeId>,
  diagnostics: SharedSink,
}

impl Default for Graph {
  fn default() -> Self {
    Self::new()
  }
}

impl Graph {
  pub fn new() -> Self {
    Self::with_diagnostics(tracing_sink())
  }

  pub fn with_diagnostics(diagnostics: SharedSink) -> Self {
    Self {
      nodes: Vec::new(),
      by_path: HashMap::new(),
      diagnostics,
    }
  }

  /// Inserts `node` unless a node with the same path exists.
  ///
  /// Returns the id of the node now stored at that path.
  pub fn add(&mut self, node: Node) -> NodeId {
    if let Some(&id) = self.by_path.get(node.path()) {
      let existing = &self.nodes[id.0];
      if existing.kind() != node.kind() {
        self.diagnostics.emit(Diagnostic::warning(
          DiagnosticKind::NodeConflict,
          Some(node.path().to_path_buf()),
          format!(
            "keeping existing {} node, dropping conflicting {} node",
            existing.kind(),
            node.kind()
          ),
        ));
      }
      return id;
    }

    let id = NodeId(self.nodes.len());
    self.by_path.insert(node.path().to_path_buf(), id);
    self.nodes.push(node);
    id
  }

  pub fn find_node_with_path(&self, path: &Path) -> Option<&Node> {
    self.by_path.get(path).map(|id| &self.nodes[id.0])
  }

  pub fn id_of(&self, path: &Path) -> Option<NodeId> {
    self.by_path.get(path).copied()
  }

  pub fn contains_path(&self, path: &Path) -> bool {
    self.by_path.contains_key(path)
  }

  /// Node for an id handed out by this graph.
  ///
  /// # Panics
  ///
  /// Panics if `id` was issued by a different graph and is out of range.
  pub fn node(&self, id: NodeId) -> &Node {
    &self.nodes[id.0]
  }

  pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
    &mut self.nodes[id.0]
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Nodes in insertion order.
  pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
    self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
  }

  pub fn diagnostics(&self) -> &SharedSink {
    &self.diagnostics
  }

  /// Dependency graph over the nodes of this graph.
  ///
  /// Inputs owned by another graph (e.g. sources referenced from a profile)
  /// do not produce edges.
  fn dependency_graph(&self) -> DiGraph<NodeId, ()> {
    let mut graph = DiGraph::with_capacity(self.nodes.len(), 0);
    let indices: Vec<NodeIndex> = self.nodes.iter().enumerate().map(|(i, _)| graph.add_node(NodeId(i))).collect();

    for (i, node) in self.nodes.iter().enumerate() {
      for input in node.inputs() {
        if let Some(dep) = self.by_path.get(input) {
          graph.add_edge(indices[dep.0], indices[i], ());
        }
      }
    }
    graph
  }

  /// Node ids ordered so that every node comes after its inputs.
  pub fn topological_order(&self) -> Result<Vec<NodeId>, ProjectError> {
    let graph = self.dependency_graph();
    let sorted = toposort(&graph, None).map_err(|cycle| ProjectError::CycleDetected {
      chain: IncludeChain(vec![self.nodes[graph[cycle.node_id()].0].path().to_path_buf()]),
    })?;
    Ok(sorted.into_iter().map(|idx| graph[idx]).collect())
  }

  /// Node ids grouped by dependency depth.
  ///
  /// Layer 0 holds nodes without in-graph inputs; every node sits one layer
  /// after the deepest of its inputs.
  pub fn layers(&self) -> Result<Vec<Vec<NodeId>>, ProjectError> {
    let graph = self.dependency_graph();
    let mut in_degree: HashMap<NodeIndex, usize> = graph
      .node_indices()
      .map(|idx| (idx, graph.neighbors_directed(idx, Direction::Incoming).count()))
      .collect();
    let mut remaining: HashSet<NodeIndex> = graph.node_indices().collect();
    let mut layers = Vec::new();

    while !remaining.is_empty() {
      let mut ready: Vec<NodeIndex> = remaining.iter().filter(|idx| in_degree[*idx] == 0).copied().collect();

      if ready.is_empty() {
        let mut stuck: Vec<PathBuf> = remaining.iter().map(|idx| self.nodes[graph[*idx].0].path().to_path_buf()).collect();
        stuck.sort();
        return Err(ProjectError::CycleDetected {
          chain: IncludeChain(stuck),
        });
      }

      ready.sort_by_key(|idx| graph[*idx]);
      for idx in &ready {
        remaining.remove(idx);
        for next in graph.neighbors_directed(*idx, Direction::Outgoing) {
          if let Some(deg) = in_degree.get_mut(&next) {
            *deg = deg.saturating_sub(1);
          }
        }
      }
      layers.push(ready.into_iter().map(|idx| graph[idx]).collect());
    }

    Ok(layers)
  }
}
