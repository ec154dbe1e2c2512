//! GCC/Clang style compiler drivers.

use std::path::{Path, PathBuf};

use super::{BuildFlags, Compiler, LinkLibrary, Linker, ToolInvocation};

/// A compiler driver that understands GCC-compatible arguments.
///
/// The same driver compiles and links, so `CcTool` implements both
/// [`Compiler`] and [`Linker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CcTool {
  program: String,
}

impl CcTool {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
    }
  }

  pub fn clang() -> Self {
    Self::new("clang++")
  }

  pub fn gcc() -> Self {
    Self::new("g++")
  }

  /// Maps the short names accepted in project files to drivers.
  ///
  /// `clang` and `gcc` select the C++ drivers; anything else is used as the
  /// program name verbatim.
  pub fn from_name(name: &str) -> Self {
    match name {
      "clang" | "clang++" => Self::clang(),
      "gcc" | "g++" => Self::gcc(),
      other => Self::new(other),
    }
  }

  pub fn program(&self) -> &str {
    &self.program
  }
}

impl Default for CcTool {
  fn default() -> Self {
    Self::clang()
  }
}

impl Compiler for CcTool {
  fn identity(&self) -> &str {
    &self.program
  }

  fn compile(&self, source: &Path, output: &Path, include_dirs: &[PathBuf], flags: &BuildFlags) -> ToolInvocation {
    ToolInvocation::new(&self.program)
      .args(flags.compile_args())
      .args(include_dirs.iter().map(|dir| format!("-I{}", dir.display())))
      .arg("-c")
      .path_arg(source)
      .arg("-o")
      .path_arg(output)
  }
}

impl Linker for CcTool {
  fn identity(&self) -> &str {
    &self.program
  }

  fn link(
    &self,
    objects: &[PathBuf],
    output: &Path,
    libs: &[LinkLibrary],
    lib_dirs: &[PathBuf],
    flags: &BuildFlags,
  ) -> ToolInvocation {
    let mut invocation = ToolInvocation::new(&self.program).args(flags.link_args());
    for object in objects {
      invocation = invocation.path_arg(object);
    }
    invocation = invocation
      .arg("-o")
      .path_arg(output)
      .args(lib_dirs.iter().map(|dir| format!("-L{}", dir.display())));
    for lib in libs {
      invocation = match lib {
        LinkLibrary::Path(path) => invocation.path_arg(path),
        LinkLibrary::Name(name) => invocation.arg(format!("-l{}", name)),
      };
    }
    invocation
  }
}
