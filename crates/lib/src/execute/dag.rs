//! Execution DAG for build steps.
//!
//! This module orders build steps by their inputs and computes parallel
//! execution waves.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use super::types::{BuildStep, ExecuteError};
use crate::graph::Graph;

/// A DAG of build steps, with edges from inputs to the steps that consume them.
#[derive(Debug)]
pub struct StepDag {
  graph: DiGraph<usize, ()>,
  steps: Vec<BuildStep>,
  nodes: HashMap<PathBuf, NodeIndex>,
}

impl StepDag {
  /// Builds the DAG. Steps are deduplicated by path, first one wins.
  ///
  /// Inputs that no step produces become leaf steps.
  pub fn new(steps: Vec<BuildStep>) -> Self {
    let mut unique: Vec<BuildStep> = Vec::with_capacity(steps.len());
    let mut seen: HashSet<PathBuf> = HashSet::new();
    for step in steps {
      if seen.insert(step.path.clone()) {
        unique.push(step);
      }
    }

    let dangling: Vec<PathBuf> = unique
      .iter()
      .flat_map(|s| s.inputs.iter())
      .filter(|input| !seen.contains(*input))
      .cloned()
      .collect::<HashSet<_>>()
      .into_iter()
      .collect();
    unique.extend(dangling.into_iter().map(BuildStep::leaf));

    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();
    for (i, step) in unique.iter().enumerate() {
      nodes.insert(step.path.clone(), graph.add_node(i));
    }
    for (i, step) in unique.iter().enumerate() {
      let to = nodes[&step.path];
      for input in &step.inputs {
        let from = nodes[input];
        if from != to {
          graph.update_edge(from, to, ());
        }
      }
      debug_assert_eq!(graph[to], i);
    }

    Self {
      graph,
      steps: unique,
      nodes,
    }
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  pub fn steps(&self) -> &[BuildStep] {
    &self.steps
  }

  pub fn step(&self, path: &Path) -> Option<&BuildStep> {
    self.nodes.get(path).map(|&idx| &self.steps[self.graph[idx]])
  }

  /// Direct inputs of `path` that are themselves steps.
  pub fn dependencies(&self, path: &Path) -> Vec<&Path> {
    let Some(&idx) = self.nodes.get(path) else {
      return Vec::new();
    };
    self
      .graph
      .neighbors_directed(idx, Direction::Incoming)
      .map(|dep| self.steps[self.graph[dep]].path.as_path())
      .collect()
  }

  /// Groups steps into waves; every step's inputs are in earlier waves.
  pub fn waves(&self) -> Result<Vec<Vec<PathBuf>>, ExecuteError> {
    // Kahn's algorithm, one level at a time
    let mut in_degree: HashMap<NodeIndex, usize> = self
      .graph
      .node_indices()
      .map(|idx| (idx, self.graph.neighbors_directed(idx, Direction::Incoming).count()))
      .collect();
    let mut remaining: HashSet<NodeIndex> = self.graph.node_indices().collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
      let ready: Vec<NodeIndex> = remaining.iter().filter(|idx| in_degree[*idx] == 0).copied().collect();
      if ready.is_empty() {
        return Err(ExecuteError::CycleDetected);
      }

      for idx in &ready {
        remaining.remove(idx);
        for neighbor in self.graph.neighbors_directed(*idx, Direction::Outgoing) {
          if let Some(deg) = in_degree.get_mut(&neighbor) {
            *deg = deg.saturating_sub(1);
          }
        }
      }

      let mut wave: Vec<PathBuf> = ready
        .into_iter()
        .map(|idx| self.steps[self.graph[idx]].path.clone())
        .collect();
      wave.sort();
      waves.push(wave);
    }

    Ok(waves)
  }
}

/// Collects the steps needed to produce `roots`, looking nodes up in `graphs` in order.
///
/// Paths that no graph knows become leaf steps.
pub fn collect_steps(roots: &[PathBuf], graphs: &[&Graph]) -> Vec<BuildStep> {
  let mut seen: HashSet<PathBuf> = HashSet::new();
  let mut pending: Vec<PathBuf> = roots.to_vec();
  let mut steps = Vec::new();

  while let Some(path) = pending.pop() {
    if !seen.insert(path.clone()) {
      continue;
    }
    let step = graphs
      .iter()
      .find_map(|g| g.find_node_with_path(&path))
      .map(BuildStep::from_node)
      .unwrap_or_else(|| BuildStep::leaf(&path));
    pending.extend(step.inputs.iter().filter(|i| !seen.contains(*i)).cloned());
    steps.push(step);
  }
  steps
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::execute::types::StepKind;
  use crate::tools::ToolInvocation;

  fn tool(path: &str, inputs: &[&str]) -> BuildStep {
    BuildStep {
      path: PathBuf::from(path),
      kind: StepKind::Compile,
      inputs: inputs.iter().map(PathBuf::from).collect(),
      invocation: Some(ToolInvocation::new("cc")),
    }
  }

  #[test]
  fn waves_respect_inputs() {
    let dag = StepDag::new(vec![
      tool("/b/app", &["/b/a.o", "/b/b.o"]),
      tool("/b/a.o", &["/p/a.cpp", "/p/common.h"]),
      tool("/b/b.o", &["/p/b.cpp", "/p/common.h"]),
    ]);
    let waves = dag.waves().unwrap();
    assert_eq!(waves.len(), 3);
    assert_eq!(
      waves[0],
      vec![
        PathBuf::from("/p/a.cpp"),
        PathBuf::from("/p/b.cpp"),
        PathBuf::from("/p/common.h")
      ]
    );
    assert_eq!(waves[1], vec![PathBuf::from("/b/a.o"), PathBuf::from("/b/b.o")]);
    assert_eq!(waves[2], vec![PathBuf::from("/b/app")]);
  }

  #[test]
  fn dangling_inputs_become_leaves() {
    let dag = StepDag::new(vec![tool("/b/a.o", &["/p/a.cpp"])]);
    assert_eq!(dag.len(), 2);
    assert_eq!(dag.step(Path::new("/p/a.cpp")).unwrap().kind, StepKind::Leaf);
  }

  #[test]
  fn duplicate_steps_first_wins() {
    let dag = StepDag::new(vec![tool("/b/a.o", &["/p/a.cpp"]), tool("/b/a.o", &["/p/other.cpp"])]);
    assert_eq!(dag.dependencies(Path::new("/b/a.o")), vec![Path::new("/p/a.cpp")]);
  }

  #[test]
  fn cycle_is_detected() {
    let dag = StepDag::new(vec![tool("/b/x", &["/b/y"]), tool("/b/y", &["/b/x"])]);
    assert!(matches!(dag.waves(), Err(ExecuteError::CycleDetected)));
  }

  #[test]
  fn empty_dag_has_no_waves() {
    let dag = StepDag::new(Vec::new());
    assert!(dag.is_empty());
    assert!(dag.waves().unwrap().is_empty());
  }

  #[test]
  fn collect_steps_walks_graph_inputs() {
    use crate::graph::{Node, SourceNode};

    let mut graph = Graph::new();
    let mut header = SourceNode::new("/p/a.h", true);
    header.scanned = true;
    graph.add(Node::Source(header));
    let mut source = SourceNode::new("/p/a.cpp", false);
    source.includes.insert(PathBuf::from("/p/a.h"));
    source.scanned = true;
    graph.add(Node::Source(source));

    let steps = collect_steps(&[PathBuf::from("/p/a.cpp")], &[&graph]);
    let mut paths: Vec<_> = steps.iter().map(|s| s.path.clone()).collect();
    paths.sort();
    assert_eq!(paths, vec![PathBuf::from("/p/a.cpp"), PathBuf::from("/p/a.h")]);
  }
}
