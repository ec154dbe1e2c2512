//! Build backends.
//!
//! A backend turns the project's graphs into something that can be built and
//! then builds requested artifacts. Configuration happens once per project
//! layout; building happens many times.

mod local;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::Result;
use crate::execute::{BuildReport, ExecuteError};
use crate::graph::Graph;

pub use local::{BUILD_DESCRIPTION_VERSION, BuildDescription, LocalBackend};

pub trait Backend: std::fmt::Debug + Send + Sync {
  /// File written by [`Backend::configure`].
  fn config_file(&self) -> &Path;

  /// Records every buildable node in `files` and `profiles`.
  fn configure(&self, files: &Graph, profiles: &[&Graph]) -> Result<PathBuf>;

  /// True when the configuration is missing or older than `config_timestamp`.
  fn needs_configure(&self, config_timestamp: SystemTime) -> bool;

  /// Builds `roots` and everything they depend on.
  fn build(
    &self,
    roots: &[PathBuf],
    graphs: &[&Graph],
  ) -> impl Future<Output = std::result::Result<BuildReport, ExecuteError>> + Send;
}
