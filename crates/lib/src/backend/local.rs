//! In-process backend.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Backend;
use crate::consts::{BUILD_DESCRIPTION_FILE, PARTIAL_SUFFIX};
use crate::error::{ProjectError, Result};
use crate::execute::{BuildReport, BuildStep, ExecuteConfig, ExecuteError, collect_steps, execute_steps};
use crate::graph::Graph;

/// Current format version of [`BuildDescription`].
pub const BUILD_DESCRIPTION_VERSION: u32 = 1;

/// Every buildable step of a configured project, as written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDescription {
  pub version: u32,
  pub steps: Vec<BuildStep>,
}

impl BuildDescription {
  pub fn from_graphs(graphs: &[&Graph]) -> Self {
    let mut steps: Vec<BuildStep> = graphs
      .iter()
      .flat_map(|g| g.iter())
      .map(|(_, node)| BuildStep::from_node(node))
      .collect();
    steps.sort_by(|a, b| a.path.cmp(&b.path));
    steps.dedup_by(|a, b| a.path == b.path);
    Self {
      version: BUILD_DESCRIPTION_VERSION,
      steps,
    }
  }

  pub fn load(path: &Path) -> Result<Self> {
    let content = fs::read_to_string(path)?;
    let description: Self = serde_json::from_str(&content)?;
    if description.version != BUILD_DESCRIPTION_VERSION {
      return Err(ProjectError::Configuration(format!(
        "unsupported build description version {} in {}",
        description.version,
        path.display()
      )));
    }
    Ok(description)
  }
}

/// Writes a JSON build description and builds in-process.
#[derive(Debug, Clone)]
pub struct LocalBackend {
  config_file: PathBuf,
  config: ExecuteConfig,
}

impl LocalBackend {
  /// Backend for `build_dir`, with parallelism taken from the environment.
  pub fn new(build_dir: &Path) -> Self {
    let config = ExecuteConfig {
      parallelism: crate::platform::parallelism(),
      ..Default::default()
    };
    Self::with_config(build_dir, config)
  }

  pub fn with_config(build_dir: &Path, config: ExecuteConfig) -> Self {
    Self {
      config_file: build_dir.join(BUILD_DESCRIPTION_FILE),
      config,
    }
  }

  pub fn execute_config(&self) -> &ExecuteConfig {
    &self.config
  }

  pub fn execute_config_mut(&mut self) -> &mut ExecuteConfig {
    &mut self.config
  }
}

impl Backend for LocalBackend {
  fn config_file(&self) -> &Path {
    &self.config_file
  }

  fn configure(&self, files: &Graph, profiles: &[&Graph]) -> Result<PathBuf> {
    let mut graphs = vec![files];
    graphs.extend_from_slice(profiles);
    let description = BuildDescription::from_graphs(&graphs);

    if let Some(parent) = self.config_file.parent() {
      fs::create_dir_all(parent)?;
    }
    let mut temp_name = self.config_file.as_os_str().to_owned();
    temp_name.push(".");
    temp_name.push(PARTIAL_SUFFIX);
    let temp_path = PathBuf::from(temp_name);

    let content = serde_json::to_string_pretty(&description)?;
    fs::write(&temp_path, &content)?;
    fs::rename(&temp_path, &self.config_file)?;

    info!(
      path = %self.config_file.display(),
      steps = description.steps.len(),
      "wrote build description"
    );
    Ok(self.config_file.clone())
  }

  fn needs_configure(&self, config_timestamp: SystemTime) -> bool {
    match fs::metadata(&self.config_file).and_then(|m| m.modified()) {
      Ok(written) => written < config_timestamp,
      Err(e) if e.kind() == io::ErrorKind::NotFound => true,
      Err(e) => {
        debug!(error = %e, "cannot read build description timestamp");
        true
      }
    }
  }

  async fn build(&self, roots: &[PathBuf], graphs: &[&Graph]) -> std::result::Result<BuildReport, ExecuteError> {
    let steps = collect_steps(roots, graphs);
    debug!(roots = roots.len(), steps = steps.len(), "collected build steps");
    execute_steps(steps, &self.config).await
  }
}
