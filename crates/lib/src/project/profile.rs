//! Build profiles.
//!
//! Each profile owns a graph of compiled and linked nodes. The source tree,
//! held by the [`FileManager`], is shared between profiles.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::diagnostics::SharedSink;
use crate::error::Result;
use crate::files::FileManager;
use crate::graph::{CompiledNode, Graph, LinkSpec, LinkedNode, Node};
use crate::tools::{BuildFlags, LinkLibrary, SharedCompiler, SharedLinker};
use crate::util::paths::with_profile_suffix;

/// A library as linked by one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileLibrary {
  pub library: LinkLibrary,
  /// Node whose changes must trigger a relink.
  pub input: Option<PathBuf>,
}

/// A target with every project-level name already resolved.
#[derive(Debug, Clone)]
pub struct TargetConfig {
  pub name: String,
  /// Platform file name before the profile suffix, e.g. `libmath.so`.
  pub artifact: String,
  /// Canonical, scanned source paths.
  pub sources: Vec<PathBuf>,
  pub flags: BuildFlags,
  pub compiler: SharedCompiler,
  pub linker: SharedLinker,
  pub include_dirs: Vec<PathBuf>,
  pub lib_dirs: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct Profile {
  name: String,
  flags: BuildFlags,
  build_dir: PathBuf,
  suffix: String,
  graph: Graph,
}

impl Profile {
  pub fn new(
    name: impl Into<String>,
    flags: BuildFlags,
    build_dir: impl Into<PathBuf>,
    suffix: impl Into<String>,
    diagnostics: SharedSink,
  ) -> Self {
    Self {
      name: name.into(),
      flags,
      build_dir: build_dir.into(),
      suffix: suffix.into(),
      graph: Graph::with_diagnostics(diagnostics),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn flags(&self) -> &BuildFlags {
    &self.flags
  }

  pub fn build_dir(&self) -> &Path {
    &self.build_dir
  }

  pub fn suffix(&self) -> &str {
    &self.suffix
  }

  pub fn graph(&self) -> &Graph {
    &self.graph
  }

  /// Install file name of `artifact` in this profile.
  pub fn artifact_name(&self, artifact: &str) -> String {
    with_profile_suffix(artifact, &self.suffix)
  }

  /// Adds the compiled and linked nodes for `config`, returning the linked path.
  ///
  /// Per-target flags override the profile's. Objects already present in this
  /// profile are reused.
  pub fn target(&mut self, files: &FileManager, config: &TargetConfig, libs: &[ProfileLibrary]) -> Result<PathBuf> {
    let flags = self.flags.merged(&config.flags);

    let mut objects = Vec::with_capacity(config.sources.len());
    for source in &config.sources {
      let headers = files.header_closure(source);
      let discovered = files.include_dirs_of(source).cloned().unwrap_or_default();
      let compiled = CompiledNode::new(
        &self.build_dir,
        source,
        headers,
        config.compiler.clone(),
        &config.include_dirs,
        discovered,
        flags.clone(),
      )?;
      let id = self.graph.add(Node::Compiled(compiled));
      objects.push(self.graph.node(id).path().to_path_buf());
    }

    let spec = LinkSpec {
      artifact: self.artifact_name(&config.artifact),
      objects,
      libs: libs.iter().map(|l| l.library.clone()).collect(),
      library_inputs: libs.iter().filter_map(|l| l.input.clone()).collect(),
      lib_dirs: config.lib_dirs.clone(),
      flags,
    };
    let linked = LinkedNode::new(&self.build_dir, &config.name, spec, config.linker.clone())?;
    let id = self.graph.add(Node::Linked(linked));
    let path = self.graph.node(id).path().to_path_buf();

    debug!(profile = %self.name, target_name = %config.name, path = %path.display(), "declared target");
    Ok(path)
  }
}
