//! Compiler and linker capabilities.
//!
//! A [`Compiler`] or [`Linker`] does two things: it names a configuration with a
//! [`Signature`] and it turns a configuration into a [`ToolInvocation`]. Running
//! the invocation is the executor's job.

mod cc;
mod flags;
mod invocation;

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::util::hash::{HashError, Hashable, Signature};

pub use cc::CcTool;
pub use flags::BuildFlags;
pub use invocation::{ToolInvocation, ToolOutput};

/// A library passed to the linker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkLibrary {
  /// A library file, linked by path.
  Path(PathBuf),
  /// A bare library name, resolved by the linker (`-l<name>`).
  Name(String),
}

impl fmt::Display for LinkLibrary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LinkLibrary::Path(path) => write!(f, "{}", path.display()),
      LinkLibrary::Name(name) => write!(f, "{}", name),
    }
  }
}

#[derive(Serialize)]
struct CompileRecord<'a> {
  tool: &'a str,
  source: &'a Path,
  include_dirs: BTreeSet<&'a Path>,
  flags: &'a BuildFlags,
}

impl Hashable for CompileRecord<'_> {}

#[derive(Serialize)]
struct LinkRecord<'a> {
  tool: &'a str,
  objects: &'a [PathBuf],
  libs: &'a [LinkLibrary],
  lib_dirs: BTreeSet<&'a Path>,
  flags: &'a BuildFlags,
}

impl Hashable for LinkRecord<'_> {}

pub trait Compiler: fmt::Debug + Send + Sync {
  /// Identifies the tool inside signatures, e.g. `clang++`.
  fn identity(&self) -> &str;

  /// Signature of compiling `source` with the given configuration.
  ///
  /// `include_dirs` is treated as a set; `flags` is already canonical.
  fn signature(&self, source: &Path, include_dirs: &[PathBuf], flags: &BuildFlags) -> Result<Signature, HashError> {
    CompileRecord {
      tool: self.identity(),
      source,
      include_dirs: include_dirs.iter().map(PathBuf::as_path).collect(),
      flags,
    }
    .compute_signature()
  }

  /// Command that compiles `source` into `output`, searching `include_dirs` in order.
  fn compile(&self, source: &Path, output: &Path, include_dirs: &[PathBuf], flags: &BuildFlags) -> ToolInvocation;
}

pub trait Linker: fmt::Debug + Send + Sync {
  fn identity(&self) -> &str;

  /// Signature of linking `objects` (in order) with the given configuration.
  fn signature(
    &self,
    objects: &[PathBuf],
    libs: &[LinkLibrary],
    lib_dirs: &[PathBuf],
    flags: &BuildFlags,
  ) -> Result<Signature, HashError> {
    LinkRecord {
      tool: self.identity(),
      objects,
      libs,
      lib_dirs: lib_dirs.iter().map(PathBuf::as_path).collect(),
      flags,
    }
    .compute_signature()
  }

  fn link(
    &self,
    objects: &[PathBuf],
    output: &Path,
    libs: &[LinkLibrary],
    lib_dirs: &[PathBuf],
    flags: &BuildFlags,
  ) -> ToolInvocation;
}

pub type SharedCompiler = Arc<dyn Compiler>;
pub type SharedLinker = Arc<dyn Linker>;

#[cfg(test)]
mod tests {
  use super::*;

  fn dirs(list: &[&str]) -> Vec<PathBuf> {
    list.iter().map(PathBuf::from).collect()
  }

  #[test]
  fn compile_signature_ignores_include_dir_order() {
    let cc = CcTool::clang();
    let flags = BuildFlags::new().o("3").raw("-Wall").raw("-Wextra");
    let reordered = BuildFlags::new().raw("-Wextra").raw("-Wall").o("3");
    let a = Compiler::signature(&cc, Path::new("/p/a.cpp"), &dirs(&["/p/x", "/p/y"]), &flags).unwrap();
    let b = Compiler::signature(&cc, Path::new("/p/a.cpp"), &dirs(&["/p/y", "/p/x", "/p/y"]), &reordered).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn compile_signature_depends_on_tool() {
    let flags = BuildFlags::new();
    let a = Compiler::signature(&CcTool::clang(), Path::new("/p/a.cpp"), &[], &flags).unwrap();
    let b = Compiler::signature(&CcTool::gcc(), Path::new("/p/a.cpp"), &[], &flags).unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn compile_signature_depends_on_flags() {
    let cc = CcTool::clang();
    let a = Compiler::signature(&cc, Path::new("/p/a.cpp"), &[], &BuildFlags::new().o("3")).unwrap();
    let b = Compiler::signature(&cc, Path::new("/p/a.cpp"), &[], &BuildFlags::new().o("0")).unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn link_signature_depends_on_object_order() {
    let cc = CcTool::clang();
    let flags = BuildFlags::new();
    let a = Linker::signature(&cc, &dirs(&["/b/a.o", "/b/b.o"]), &[], &[], &flags).unwrap();
    let b = Linker::signature(&cc, &dirs(&["/b/b.o", "/b/a.o"]), &[], &[], &flags).unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn link_signature_depends_on_libraries() {
    let cc = CcTool::clang();
    let flags = BuildFlags::new();
    let objects = dirs(&["/b/a.o"]);
    let a = Linker::signature(&cc, &objects, &[LinkLibrary::Name("m".into())], &[], &flags).unwrap();
    let b = Linker::signature(&cc, &objects, &[LinkLibrary::Name("stdc++".into())], &[], &flags).unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn link_signature_ignores_lib_dir_order() {
    let cc = CcTool::clang();
    let flags = BuildFlags::new();
    let objects = dirs(&["/b/a.o"]);
    let a = Linker::signature(&cc, &objects, &[], &dirs(&["/l1", "/l2"]), &flags).unwrap();
    let b = Linker::signature(&cc, &objects, &[], &dirs(&["/l2", "/l1"]), &flags).unwrap();
    assert_eq!(a, b);
  }
}
