//! Structured, non-fatal diagnostics.
//!
//! Components that can observe something worth reporting without failing
//! (an include that resolves outside the project, a rejected duplicate node)
//! receive a [`DiagnosticSink`] at construction time instead of writing to a
//! global logger. The default sink forwards to `tracing`; tests use
//! [`CollectingSink`] and assert on the records.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
  /// An include directive did not resolve to any project file.
  ExternalInclude,
  /// `Graph::add` kept an existing node of a different kind for the same path.
  NodeConflict,
  /// A library string matched project files but was treated as a library name.
  LibraryNameShadowsFile,
  /// A target does not exist for a requested profile.
  MissingProfileTarget,
  /// A target name refers to both a library and an executable.
  AmbiguousTargetName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
  Note,
  Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
  pub kind: DiagnosticKind,
  pub severity: Severity,
  pub path: Option<PathBuf>,
  pub message: String,
}

impl Diagnostic {
  pub fn note(kind: DiagnosticKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
    Self {
      kind,
      severity: Severity::Note,
      path,
      message: message.into(),
    }
  }

  pub fn warning(kind: DiagnosticKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
    Self {
      kind,
      severity: Severity::Warning,
      path,
      message: message.into(),
    }
  }
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.path {
      Some(path) => write!(f, "{}: {}", path.display(), self.message),
      None => write!(f, "{}", self.message),
    }
  }
}

/// Receiver of [`Diagnostic`] records.
pub trait DiagnosticSink: fmt::Debug + Send + Sync {
  fn emit(&self, diagnostic: Diagnostic);
}

pub type SharedSink = Arc<dyn DiagnosticSink>;

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
  fn emit(&self, diagnostic: Diagnostic) {
    let path = diagnostic.path.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
    match diagnostic.severity {
      Severity::Note => info!(kind = ?diagnostic.kind, path = %path, "{}", diagnostic.message),
      Severity::Warning => warn!(kind = ?diagnostic.kind, path = %path, "{}", diagnostic.message),
    }
  }
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
  records: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
  pub fn new() -> Self {
    Self::default()
  }

  /// Copy of all records emitted so far, in emission order.
  pub fn records(&self) -> Vec<Diagnostic> {
    self.records.lock().map(|r| r.clone()).unwrap_or_default()
  }

  pub fn of_kind(&self, kind: DiagnosticKind) -> Vec<Diagnostic> {
    self.records().into_iter().filter(|d| d.kind == kind).collect()
  }
}

impl DiagnosticSink for CollectingSink {
  fn emit(&self, diagnostic: Diagnostic) {
    debug!(kind = ?diagnostic.kind, "{}", diagnostic.message);
    if let Ok(mut records) = self.records.lock() {
      records.push(diagnostic);
    }
  }
}

pub fn tracing_sink() -> SharedSink {
  Arc::new(TracingSink)
}
