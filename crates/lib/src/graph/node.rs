//! Node types stored in a [`Graph`](super::Graph).
//!
//! Every node is one file on disk. Source, header and external nodes are
//! provided; compiled and linked nodes are produced by a tool. A produced
//! node's path embeds the signature of its configuration, so two nodes with
//! the same path always describe the same build.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::tools::{BuildFlags, LinkLibrary, SharedCompiler, SharedLinker, ToolInvocation};
use crate::util::hash::{HashError, Signature};
use crate::util::paths::file_suffix;

/// Index of a node inside the graph that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
  Source,
  Header,
  Compiled,
  Linked,
  External,
}

impl fmt::Display for NodeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      NodeKind::Source => "source",
      NodeKind::Header => "header",
      NodeKind::Compiled => "compiled",
      NodeKind::Linked => "linked",
      NodeKind::External => "external",
    };
    write!(f, "{}", s)
  }
}

#[derive(Debug, Clone)]
pub enum Node {
  /// A translation unit or header inside the project.
  Source(SourceNode),
  Compiled(CompiledNode),
  Linked(LinkedNode),
  /// A library file outside the build; observable, never built.
  External(ExternalNode),
}

impl Node {
  pub fn path(&self) -> &Path {
    match self {
      Node::Source(n) => &n.path,
      Node::Compiled(n) => &n.path,
      Node::Linked(n) => &n.path,
      Node::External(n) => &n.path,
    }
  }

  pub fn kind(&self) -> NodeKind {
    match self {
      Node::Source(n) if n.is_header => NodeKind::Header,
      Node::Source(_) => NodeKind::Source,
      Node::Compiled(_) => NodeKind::Compiled,
      Node::Linked(_) => NodeKind::Linked,
      Node::External(_) => NodeKind::External,
    }
  }

  /// Paths of the nodes this one depends on.
  pub fn inputs(&self) -> Vec<&Path> {
    match self {
      Node::Source(n) => n.includes.iter().map(PathBuf::as_path).collect(),
      Node::Compiled(n) => n.inputs().collect(),
      Node::Linked(n) => n.inputs().collect(),
      Node::External(_) => Vec::new(),
    }
  }

  /// Command that produces this node, if it is produced at all.
  pub fn invocation(&self) -> Option<ToolInvocation> {
    match self {
      Node::Compiled(n) => Some(n.invocation()),
      Node::Linked(n) => Some(n.invocation()),
      Node::Source(_) | Node::External(_) => None,
    }
  }

  pub fn as_source(&self) -> Option<&SourceNode> {
    match self {
      Node::Source(n) => Some(n),
      _ => None,
    }
  }

  pub fn as_compiled(&self) -> Option<&CompiledNode> {
    match self {
      Node::Compiled(n) => Some(n),
      _ => None,
    }
  }

  pub fn as_linked(&self) -> Option<&LinkedNode> {
    match self {
      Node::Linked(n) => Some(n),
      _ => None,
    }
  }
}

/// A source file or header.
///
/// `includes` and `include_dirs` are filled in by the scanner the first time
/// the file is scanned and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceNode {
  pub(crate) path: PathBuf,
  pub(crate) is_header: bool,
  pub(crate) includes: BTreeSet<PathBuf>,
  pub(crate) include_dirs: BTreeSet<PathBuf>,
  pub(crate) scanned: bool,
}

impl SourceNode {
  pub fn new(path: impl Into<PathBuf>, is_header: bool) -> Self {
    Self {
      path: path.into(),
      is_header,
      includes: BTreeSet::new(),
      include_dirs: BTreeSet::new(),
      scanned: false,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn is_header(&self) -> bool {
    self.is_header
  }

  /// Headers included directly by this file.
  pub fn includes(&self) -> &BTreeSet<PathBuf> {
    &self.includes
  }

  /// Directories needed on the search path for this file's includes to resolve.
  pub fn include_dirs(&self) -> &BTreeSet<PathBuf> {
    &self.include_dirs
  }

  pub fn is_scanned(&self) -> bool {
    self.scanned
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalNode {
  pub(crate) path: PathBuf,
}

impl ExternalNode {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }
}

/// One translation unit compiled into an object file.
#[derive(Debug, Clone)]
pub struct CompiledNode {
  path: PathBuf,
  source: PathBuf,
  headers: BTreeSet<PathBuf>,
  include_dirs: Vec<PathBuf>,
  flags: BuildFlags,
  compiler: SharedCompiler,
  signature: Signature,
}

impl CompiledNode {
  /// Builds the node and derives its output path inside `build_dir`.
  ///
  /// `explicit_dirs` are searched before `discovered_dirs`; duplicates keep
  /// their first position.
  pub fn new(
    build_dir: &Path,
    source: &Path,
    headers: BTreeSet<PathBuf>,
    compiler: SharedCompiler,
    explicit_dirs: &[PathBuf],
    discovered_dirs: impl IntoIterator<Item = PathBuf>,
    flags: BuildFlags,
  ) -> Result<Self, HashError> {
    let mut include_dirs: Vec<PathBuf> = Vec::new();
    for dir in explicit_dirs.iter().cloned().chain(discovered_dirs) {
      if !include_dirs.contains(&dir) {
        include_dirs.push(dir);
      }
    }

    let signature = compiler.signature(source, &include_dirs, &flags)?;
    let path = build_dir.join(file_suffix(source, &signature.0, Some(".o")));

    Ok(Self {
      path,
      source: source.to_path_buf(),
      headers,
      include_dirs,
      flags,
      compiler,
      signature,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn source(&self) -> &Path {
    &self.source
  }

  /// Every header reachable from the source, flattened.
  pub fn headers(&self) -> &BTreeSet<PathBuf> {
    &self.headers
  }

  pub fn include_dirs(&self) -> &[PathBuf] {
    &self.include_dirs
  }

  pub fn flags(&self) -> &BuildFlags {
    &self.flags
  }

  pub fn compiler(&self) -> &str {
    self.compiler.identity()
  }

  pub fn signature(&self) -> &Signature {
    &self.signature
  }

  pub fn inputs(&self) -> impl Iterator<Item = &Path> {
    std::iter::once(self.source.as_path()).chain(self.headers.iter().map(PathBuf::as_path))
  }

  pub fn invocation(&self) -> ToolInvocation {
    self
      .compiler
      .compile(&self.source, &self.path, &self.include_dirs, &self.flags)
  }
}

/// A library or executable.
#[derive(Debug, Clone)]
pub struct LinkedNode {
  path: PathBuf,
  name: String,
  objects: Vec<PathBuf>,
  library_inputs: Vec<PathBuf>,
  libs: Vec<LinkLibrary>,
  lib_dirs: Vec<PathBuf>,
  flags: BuildFlags,
  linker: SharedLinker,
  signature: Signature,
}

/// Everything a [`LinkedNode`] is configured with.
#[derive(Debug, Clone)]
pub struct LinkSpec {
  /// Artifact file name before the signature is inserted, e.g. `libmath_debug.so`.
  pub artifact: String,
  pub objects: Vec<PathBuf>,
  pub libs: Vec<LinkLibrary>,
  /// Nodes among `libs` whose changes must trigger a relink.
  pub library_inputs: Vec<PathBuf>,
  pub lib_dirs: Vec<PathBuf>,
  pub flags: BuildFlags,
}

impl LinkedNode {
  pub fn new(build_dir: &Path, name: impl Into<String>, spec: LinkSpec, linker: SharedLinker) -> Result<Self, HashError> {
    let signature = linker.signature(&spec.objects, &spec.libs, &spec.lib_dirs, &spec.flags)?;
    let path = build_dir.join(file_suffix(Path::new(&spec.artifact), &signature.0, None));

    Ok(Self {
      path,
      name: name.into(),
      objects: spec.objects,
      library_inputs: spec.library_inputs,
      libs: spec.libs,
      lib_dirs: spec.lib_dirs,
      flags: spec.flags,
      linker,
      signature,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Logical target name.
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn objects(&self) -> &[PathBuf] {
    &self.objects
  }

  pub fn libs(&self) -> &[LinkLibrary] {
    &self.libs
  }

  pub fn lib_dirs(&self) -> &[PathBuf] {
    &self.lib_dirs
  }

  pub fn flags(&self) -> &BuildFlags {
    &self.flags
  }

  pub fn linker(&self) -> &str {
    self.linker.identity()
  }

  pub fn signature(&self) -> &Signature {
    &self.signature
  }

  pub fn inputs(&self) -> impl Iterator<Item = &Path> {
    self
      .objects
      .iter()
      .chain(self.library_inputs.iter())
      .map(PathBuf::as_path)
  }

  pub fn invocation(&self) -> ToolInvocation {
    self
      .linker
      .link(&self.objects, &self.path, &self.libs, &self.lib_dirs, &self.flags)
  }
}
