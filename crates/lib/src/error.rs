//! Configuration-time errors.
//!
//! These are raised while indexing, scanning and declaring targets. They are
//! fatal for the step that raised them and carry enough context to fix the
//! project layout. Build-time failures live in [`crate::execute::ExecuteError`].

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A chain of files forming an include cycle, first file repeated at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeChain(pub Vec<PathBuf>);

impl fmt::Display for IncludeChain {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let parts: Vec<String> = self.0.iter().map(|p| p.display().to_string()).collect();
    write!(f, "{}", parts.join(" -> "))
  }
}

#[derive(Debug, Error)]
pub enum ProjectError {
  /// A name matched more than one indexed file.
  #[error("'{name}' is ambiguous, candidates: {candidates:?}; provide a longer path to disambiguate")]
  AmbiguousReference { name: String, candidates: Vec<PathBuf> },

  /// A name matched no indexed file.
  #[error("could not find '{name}' in the project")]
  UnresolvedReference { name: String },

  /// The include graph contains a cycle.
  #[error("include cycle detected: {chain}")]
  CycleDetected { chain: IncludeChain },

  /// Structural misuse of the API or project file.
  #[error("configuration error: {0}")]
  Configuration(String),

  #[error("profile '{name}' does not exist, available profiles: {available:?}")]
  UnknownProfile { name: String, available: Vec<String> },

  #[error("target '{name}' does not exist in the project")]
  UnknownTarget { name: String },

  /// Artifacts needed by the operation failed to build.
  #[error("build failed: {} step(s) failed, {} skipped", .failed.len(), .skipped)]
  BuildFailed { failed: Vec<PathBuf>, skipped: usize },

  #[error(transparent)]
  Execute(#[from] crate::execute::ExecuteError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("serialization failed: {0}")]
  Signature(#[from] serde_json::Error),
}

pub type Result<T, E = ProjectError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cycle_chain_display() {
    let err = ProjectError::CycleDetected {
      chain: IncludeChain(vec![
        PathBuf::from("/p/a.h"),
        PathBuf::from("/p/b.h"),
        PathBuf::from("/p/a.h"),
      ]),
    };
    assert_eq!(err.to_string(), "include cycle detected: /p/a.h -> /p/b.h -> /p/a.h");
  }

  #[test]
  fn ambiguous_lists_candidates() {
    let err = ProjectError::AmbiguousReference {
      name: "utils.h".to_string(),
      candidates: vec![PathBuf::from("/a/utils.h"), PathBuf::from("/b/utils.h")],
    };
    let msg = err.to_string();
    assert!(msg.contains("/a/utils.h"));
    assert!(msg.contains("/b/utils.h"));
  }
}
