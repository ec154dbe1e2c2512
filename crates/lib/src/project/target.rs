//! Logical targets spanning every profile.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::tools::BuildFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
  Executable,
  Library,
  /// An executable run by `run_tests`; never installed.
  Test,
}

impl fmt::Display for TargetKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      TargetKind::Executable => "exe",
      TargetKind::Library => "lib",
      TargetKind::Test => "test",
    };
    write!(f, "{}", s)
  }
}

/// Handle to a library produced outside this project.
///
/// Fetching and building dependencies is someone else's job; this is what
/// they hand back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageLibrary {
  /// The linkable file.
  pub artifact: PathBuf,
  #[serde(default)]
  pub include_dirs: Vec<PathBuf>,
  #[serde(default)]
  pub lib_dirs: Vec<PathBuf>,
}

/// A library dependency, classified once when the target is declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryRef {
  /// Another library target of this project.
  Target(String),
  /// A library file, registered as an external node.
  Path(PathBuf),
  /// A name passed to the linker as `-l<name>`.
  Name(String),
  Package(PackageLibrary),
}

/// Everything a target is declared with, before profiles are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetOptions {
  /// Source names or paths, resolved through the file index.
  pub sources: Vec<String>,
  pub flags: BuildFlags,
  /// Library targets, library paths, or bare library names.
  pub libs: Vec<String>,
  pub packages: Vec<PackageLibrary>,
  /// Compiler driver; `clang++` when unset.
  pub compiler: Option<String>,
  /// Linker driver; `clang++` when unset.
  pub linker: Option<String>,
  /// Searched before any discovered include directory.
  pub include_dirs: Vec<PathBuf>,
  pub lib_dirs: Vec<PathBuf>,
  /// Internal targets are never installed.
  pub internal: bool,
}

impl TargetOptions {
  pub fn new<I, S>(sources: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      sources: sources.into_iter().map(Into::into).collect(),
      ..Default::default()
    }
  }

  pub fn flags(mut self, flags: BuildFlags) -> Self {
    self.flags = flags;
    self
  }

  pub fn lib(mut self, lib: impl Into<String>) -> Self {
    self.libs.push(lib.into());
    self
  }

  pub fn package(mut self, package: PackageLibrary) -> Self {
    self.packages.push(package);
    self
  }

  pub fn compiler(mut self, compiler: impl Into<String>) -> Self {
    self.compiler = Some(compiler.into());
    self
  }

  pub fn linker(mut self, linker: impl Into<String>) -> Self {
    self.linker = Some(linker.into());
    self
  }

  pub fn include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.include_dirs.push(dir.into());
    self
  }

  pub fn lib_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.lib_dirs.push(dir.into());
    self
  }

  pub fn internal(mut self) -> Self {
    self.internal = true;
    self
  }
}

/// One profile's artifact for a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileArtifact {
  /// Signature-named file inside the profile's build directory.
  pub path: PathBuf,
  /// Name used when installing, e.g. `libmath_debug.so`.
  pub install_name: String,
}

/// A user-facing target, mapping profile names to that profile's artifact.
///
/// Profiles may omit a target, for example when a library it links against
/// is missing from that profile.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectTarget {
  name: String,
  kind: TargetKind,
  internal: bool,
  artifacts: BTreeMap<String, ProfileArtifact>,
}

impl ProjectTarget {
  pub(crate) fn new(name: impl Into<String>, kind: TargetKind, internal: bool) -> Self {
    Self {
      name: name.into(),
      kind,
      internal: internal || kind == TargetKind::Test,
      artifacts: BTreeMap::new(),
    }
  }

  pub(crate) fn insert(&mut self, profile: impl Into<String>, artifact: ProfileArtifact) {
    self.artifacts.insert(profile.into(), artifact);
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn kind(&self) -> TargetKind {
    self.kind
  }

  pub fn is_lib(&self) -> bool {
    self.kind == TargetKind::Library
  }

  pub fn is_internal(&self) -> bool {
    self.internal
  }

  pub fn path(&self, profile: &str) -> Option<&Path> {
    self.artifacts.get(profile).map(|a| a.path.as_path())
  }

  pub fn artifact(&self, profile: &str) -> Option<&ProfileArtifact> {
    self.artifacts.get(profile)
  }

  pub fn artifacts(&self) -> impl Iterator<Item = (&str, &ProfileArtifact)> {
    self.artifacts.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn contains_profile(&self, profile: &str) -> bool {
    self.artifacts.contains_key(profile)
  }
}

impl fmt::Display for ProjectTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.name, self.kind)?;
    if self.internal {
      write!(f, " (internal)")?;
    }
    Ok(())
  }
}
