//! Types for build execution.
//!
//! This module defines the error types, result types, and configuration
//! for executing build steps.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::graph::{Node, NodeKind};
use crate::tools::ToolInvocation;

/// Errors that can occur while executing build steps.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// The compiler exited unsuccessfully.
  #[error("compiling {} failed with exit code {}:\n{output}", .path.display(), display_code(.code))]
  CompileFailed {
    path: PathBuf,
    code: Option<i32>,
    output: String,
  },

  /// The linker exited unsuccessfully.
  #[error("linking {} failed with exit code {}:\n{output}", .path.display(), display_code(.code))]
  LinkFailed {
    path: PathBuf,
    code: Option<i32>,
    output: String,
  },

  /// A file that is not built by any step does not exist.
  #[error("missing input: {}", .path.display())]
  MissingInput { path: PathBuf },

  /// The task running this step panicked.
  #[error("build task for {} panicked: {message}", .path.display())]
  Panicked { path: PathBuf, message: String },

  /// The build was cancelled before or while this step ran.
  #[error("cancelled")]
  Cancelled,

  /// I/O error during execution.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// Cycle detected in the dependency graph.
  #[error("dependency cycle detected")]
  CycleDetected,
}

fn display_code(code: &Option<i32>) -> String {
  match code {
    Some(code) => code.to_string(),
    None => "none (terminated by signal)".to_string(),
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
  /// A file that must already exist.
  Leaf,
  Compile,
  Link,
}

/// Owned, executable form of one graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
  pub path: PathBuf,
  pub kind: StepKind,
  pub inputs: Vec<PathBuf>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub invocation: Option<ToolInvocation>,
}

impl BuildStep {
  pub fn leaf(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      kind: StepKind::Leaf,
      inputs: Vec::new(),
      invocation: None,
    }
  }

  pub fn from_node(node: &Node) -> Self {
    let kind = match node.kind() {
      NodeKind::Compiled => StepKind::Compile,
      NodeKind::Linked => StepKind::Link,
      NodeKind::Source | NodeKind::Header | NodeKind::External => StepKind::Leaf,
    };
    Self {
      path: node.path().to_path_buf(),
      kind,
      inputs: node.inputs().into_iter().map(Path::to_path_buf).collect(),
      invocation: node.invocation(),
    }
  }
}

/// How a step that did not fail finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
  /// The tool ran and produced the artifact.
  Built,
  /// The artifact was newer than all of its inputs.
  UpToDate,
  /// A leaf file exists.
  Present,
}

/// The input whose failure caused a step to be skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDependency(pub PathBuf);

impl fmt::Display for FailedDependency {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.display())
  }
}

/// Result of executing a set of build steps.
#[derive(Debug, Default)]
pub struct BuildReport {
  /// Artifacts produced by running a tool.
  pub built: BTreeSet<PathBuf>,

  /// Artifacts that were already newer than their inputs.
  pub up_to_date: BTreeSet<PathBuf>,

  /// Steps that failed, with their error.
  pub failed: BTreeMap<PathBuf, ExecuteError>,

  /// Steps that were skipped because an input failed.
  /// Maps skipped path -> the failed input.
  pub skipped: BTreeMap<PathBuf, FailedDependency>,

  /// Steps that never finished because the build was cancelled.
  pub cancelled: BTreeSet<PathBuf>,

  pub elapsed: Duration,
}

impl BuildReport {
  /// Returns true if every step succeeded.
  pub fn is_success(&self) -> bool {
    self.failed.is_empty() && self.skipped.is_empty() && self.cancelled.is_empty()
  }

  /// Returns the number of tool steps processed.
  pub fn total(&self) -> usize {
    self.built.len() + self.up_to_date.len() + self.failed.len() + self.skipped.len() + self.cancelled.len()
  }
}

/// Shared cancellation signal.
///
/// Clones observe the same flag. Once set it stays set.
#[derive(Debug, Clone)]
pub struct CancelFlag {
  tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelFlag {
  fn default() -> Self {
    let (tx, _rx) = watch::channel(false);
    Self { tx: Arc::new(tx) }
  }
}

impl CancelFlag {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.tx.send_replace(true);
  }

  pub fn is_cancelled(&self) -> bool {
    *self.tx.borrow()
  }

  /// Resolves once the flag is set.
  pub async fn cancelled(&self) {
    let mut rx = self.tx.subscribe();
    // The sender lives in `self`, so the channel cannot close while we wait.
    let _ = rx.wait_for(|cancelled| *cancelled).await;
  }
}

/// Configuration for build execution.
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
  /// Maximum number of tools to run in parallel.
  pub parallelism: usize,

  pub cancel: CancelFlag,
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self {
      parallelism: num_cpus(),
      cancel: CancelFlag::default(),
    }
  }
}

/// Get the number of CPUs for default parallelism.
pub(crate) fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}
