//! Project file index.
//!
//! The [`FileManager`] owns the list of every file under the project
//! directories and the shared graph of source, header and external nodes.
//! Profiles reference these nodes by path.
//!
//! Name resolution never guesses: a short name that matches several indexed
//! files is an error, and the caller must provide a longer path.

mod scan;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::consts::{DEFAULT_BUILD_DIR, HEADER_EXTENSIONS, SOURCE_EXTENSIONS};
use crate::diagnostics::{SharedSink, tracing_sink};
use crate::error::{ProjectError, Result};
use crate::graph::{ExternalNode, Graph, Node, NodeId, SourceNode};

pub use scan::parse_includes;

#[derive(Debug)]
pub struct FileManager {
  root_dir: PathBuf,
  build_dir: PathBuf,
  /// Project directories: the root plus any additional directories.
  dirs: BTreeSet<PathBuf>,
  /// Directories explicitly added to every include search.
  include_dirs: Vec<PathBuf>,
  exclude_dirs: BTreeSet<PathBuf>,
  files: BTreeSet<PathBuf>,
  graph: Graph,
  diagnostics: SharedSink,
}

impl FileManager {
  /// Indexes `root` and `dirs`, excluding the build directory.
  ///
  /// Relative `dirs` and `build_dir` are interpreted relative to `root`.
  /// `build_dir` defaults to `<root>/build`.
  pub fn new(root: &Path, build_dir: Option<&Path>, dirs: &[PathBuf]) -> Result<Self> {
    Self::with_diagnostics(root, build_dir, dirs, tracing_sink())
  }

  pub fn with_diagnostics(
    root: &Path,
    build_dir: Option<&Path>,
    dirs: &[PathBuf],
    diagnostics: SharedSink,
  ) -> Result<Self> {
    let root_dir = dunce::canonicalize(root)?;
    let build_dir = absolutize(&root_dir, build_dir.unwrap_or(Path::new(DEFAULT_BUILD_DIR)));

    let mut project_dirs = BTreeSet::from([root_dir.clone()]);
    for dir in dirs {
      let dir = absolutize(&root_dir, dir);
      let dir = dunce::canonicalize(&dir)
        .map_err(|e| ProjectError::Configuration(format!("project directory {}: {}", dir.display(), e)))?;
      project_dirs.insert(dir);
    }

    let mut manager = Self {
      root_dir,
      build_dir: build_dir.clone(),
      dirs: project_dirs,
      include_dirs: Vec::new(),
      exclude_dirs: BTreeSet::from([build_dir]),
      files: BTreeSet::new(),
      graph: Graph::with_diagnostics(diagnostics.clone()),
      diagnostics,
    };
    manager.refresh();
    Ok(manager)
  }

  pub fn root_dir(&self) -> &Path {
    &self.root_dir
  }

  pub fn build_dir(&self) -> &Path {
    &self.build_dir
  }

  pub fn dirs(&self) -> &BTreeSet<PathBuf> {
    &self.dirs
  }

  pub fn include_dirs(&self) -> &[PathBuf] {
    &self.include_dirs
  }

  pub fn files(&self) -> &BTreeSet<PathBuf> {
    &self.files
  }

  pub fn graph(&self) -> &Graph {
    &self.graph
  }

  pub fn diagnostics(&self) -> &SharedSink {
    &self.diagnostics
  }

  /// Excludes `dir` from the index. Returns the absolute directory.
  pub fn add_exclude_dir(&mut self, dir: &Path) -> PathBuf {
    let dir = absolutize(&self.root_dir, dir);
    self.files.retain(|f| !f.starts_with(&dir));
    self.exclude_dirs.insert(dir.clone());
    dir
  }

  /// Whether files placed in `dir` would be picked up by the next refresh.
  ///
  /// Relative `dir` is taken from the current directory. `dir` need not exist.
  pub fn indexes_dir(&self, dir: &Path) -> Result<bool> {
    let dir = if dir.is_absolute() {
      normalize(dir)
    } else {
      normalize(&std::env::current_dir()?.join(dir))
    };
    let canonical = canonicalize_existing(&dir);
    if self
      .exclude_dirs
      .iter()
      .any(|ex| dir.starts_with(ex) || canonical.starts_with(ex))
    {
      return Ok(false);
    }
    Ok(self.dirs.iter().any(|root| match canonical.strip_prefix(root) {
      Ok(rest) => !rest.components().any(|c| c.as_os_str().to_string_lossy().starts_with('.')),
      Err(_) => false,
    }))
  }

  /// Adds a directory that is searched for every include.
  pub fn add_include_dir(&mut self, dir: &Path) -> Result<PathBuf> {
    let dir = dunce::canonicalize(absolutize(&self.root_dir, dir))?;
    if !self.include_dirs.contains(&dir) {
      self.include_dirs.push(dir.clone());
    }
    Ok(dir)
  }

  /// Re-reads every project directory.
  ///
  /// Hidden files and directories are skipped, like the excluded ones.
  pub fn refresh(&mut self) {
    let mut files = BTreeSet::new();
    for dir in &self.dirs {
      let walker = WalkDir::new(dir).sort_by_file_name().into_iter().filter_entry(|e| {
        if e.depth() > 0 && e.file_name().to_string_lossy().starts_with('.') {
          return false;
        }
        !self.exclude_dirs.iter().any(|ex| e.path().starts_with(ex))
      });

      for entry in walker.filter_map(|e| e.ok()) {
        if entry.file_type().is_file() {
          files.insert(entry.path().to_path_buf());
        }
      }
    }
    info!(count = files.len(), root = %self.root_dir.display(), "indexed project files");
    self.files = files;
  }

  /// All indexed files whose trailing path components equal `name`.
  pub fn find(&self, name: &str) -> Vec<PathBuf> {
    let wanted = normalize(Path::new(name));
    if wanted.is_absolute() {
      let wanted = dunce::canonicalize(&wanted).unwrap_or(wanted);
      return self.files.iter().filter(|f| **f == wanted).cloned().collect();
    }
    if wanted.as_os_str().is_empty() {
      return Vec::new();
    }
    self.files.iter().filter(|f| f.ends_with(&wanted)).cloned().collect()
  }

  /// Resolves `name` to exactly one indexed file.
  pub fn resolve(&self, name: &str) -> Result<PathBuf> {
    let mut candidates = self.find(name);
    match candidates.len() {
      0 => {
        let path = Path::new(name);
        if path.is_absolute() && path.is_file() {
          return Ok(dunce::canonicalize(path)?);
        }
        Err(ProjectError::UnresolvedReference { name: name.to_string() })
      }
      1 => Ok(candidates.remove(0)),
      _ => Err(ProjectError::AmbiguousReference {
        name: name.to_string(),
        candidates,
      }),
    }
  }

  /// Node for the source or header `name`, created on first access.
  pub fn source(&mut self, name: &str) -> Result<NodeId> {
    let path = self.resolve(name)?;
    debug!(name = %name, path = %path.display(), "resolved source");
    Ok(self.source_node(&path))
  }

  pub(crate) fn source_node(&mut self, path: &Path) -> NodeId {
    match self.graph.id_of(path) {
      Some(id) => id,
      None => self.graph.add(Node::Source(SourceNode::new(path, is_header(path)))),
    }
  }

  /// Registers a library file that lives outside the build.
  ///
  /// `path` must be absolute; relative library paths are resolved through
  /// [`FileManager::resolve`] by the caller first.
  pub fn external(&mut self, path: &Path) -> Result<NodeId> {
    if !path.is_absolute() {
      return Err(ProjectError::Configuration(format!(
        "external path must be absolute: {}",
        path.display()
      )));
    }
    let path = dunce::canonicalize(path).unwrap_or_else(|_| normalize(path));
    Ok(self.graph.add(Node::External(ExternalNode::new(path))))
  }

  /// Creates `dir`, which must be inside the build directory.
  pub fn mkdir(&self, dir: &Path) -> Result<()> {
    if !dir.starts_with(&self.build_dir) {
      return Err(ProjectError::Configuration(format!(
        "refusing to create {} outside the build directory {}",
        dir.display(),
        self.build_dir.display()
      )));
    }
    fs::create_dir_all(dir)?;
    Ok(())
  }

  /// Directories needed for `path`'s includes to resolve, once scanned.
  pub fn include_dirs_of(&self, path: &Path) -> Option<&BTreeSet<PathBuf>> {
    self
      .graph
      .find_node_with_path(path)
      .and_then(Node::as_source)
      .filter(|s| s.is_scanned())
      .map(SourceNode::include_dirs)
  }

  /// Every header reachable from `path` through its includes.
  pub fn header_closure(&self, path: &Path) -> BTreeSet<PathBuf> {
    let mut closure = BTreeSet::new();
    let mut pending = vec![path.to_path_buf()];
    while let Some(current) = pending.pop() {
      let Some(node) = self.graph.find_node_with_path(&current).and_then(Node::as_source) else {
        continue;
      };
      for include in node.includes() {
        if closure.insert(include.clone()) {
          pending.push(include.clone());
        }
      }
    }
    closure
  }
}

pub fn is_header(path: &Path) -> bool {
  has_extension(path, HEADER_EXTENSIONS)
}

pub fn is_scannable(path: &Path) -> bool {
  has_extension(path, HEADER_EXTENSIONS) || has_extension(path, SOURCE_EXTENSIONS)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
  path
    .extension()
    .map(|e| extensions.contains(&e.to_string_lossy().as_ref()))
    .unwrap_or(false)
}

fn absolutize(root: &Path, path: &Path) -> PathBuf {
  if path.is_absolute() {
    normalize(path)
  } else {
    normalize(&root.join(path))
  }
}

/// Canonicalizes the longest existing ancestor of `path` and appends the rest.
fn canonicalize_existing(path: &Path) -> PathBuf {
  for ancestor in path.ancestors() {
    if let Ok(canonical) = dunce::canonicalize(ancestor) {
      return match path.strip_prefix(ancestor) {
        Ok(rest) if !rest.as_os_str().is_empty() => canonical.join(rest),
        _ => canonical,
      };
    }
  }
  path.to_path_buf()
}

/// Lexically removes `.` and resolves `..` components.
pub(crate) fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        if !out.pop() {
          out.push("..");
        }
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}
