//! Project file evaluation.
//!
//! A project file is a Lua chunk that returns a table describing the project:
//!
//! ```lua
//! return {
//!   build_dir = "out",
//!   profiles = {
//!     release = { flags = { opt = 2, std = 20 } },
//!     asan = { flags = { opt = 1, debug = true, extra = { "-fsanitize=address" } }, suffix = "_asan" },
//!   },
//!   libraries = {
//!     { name = "math", sources = { "src/math.cpp" } },
//!   },
//!   executables = {
//!     { name = "calc", sources = { "src/main.cpp" }, libs = { "math" } },
//!   },
//!   tests = {
//!     { name = "math_test", sources = { "tests/math_test.cpp" }, libs = { "math" } },
//!   },
//!   interfaces = { "include/math.hpp" },
//! }
//! ```
//!
//! While the chunk runs, the global `kiln` table exposes `kiln.dir` (the
//! directory containing the project file), `kiln.os` and `kiln.version`.
//! Sibling Lua modules can be loaded with `require`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use mlua::prelude::*;
use serde::Deserialize;
use tracing::{debug, info};

use crate::consts::VERSION;
use crate::error::ProjectError;
use crate::platform::paths::build_dir_override;
use crate::project::{PackageLibrary, Project, TargetOptions};
use crate::tools::BuildFlags;

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
  #[error("lua error: {0}")]
  Lua(#[from] LuaError),

  #[error("cannot read project file '{}': {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Project(#[from] ProjectError),
}

/// The table returned by a project file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectSpec {
  /// Relative paths are taken from the project file's directory.
  pub build_dir: Option<PathBuf>,
  /// Extra directories indexed alongside the project root.
  pub dirs: Vec<PathBuf>,
  /// Directories left out of the file index.
  pub exclude: Vec<PathBuf>,
  /// Directories searched for quoted includes.
  pub include_dirs: Vec<PathBuf>,
  pub profiles: BTreeMap<String, ProfileSpec>,
  pub libraries: Vec<TargetSpec>,
  pub executables: Vec<TargetSpec>,
  pub tests: Vec<TargetSpec>,
  /// Public headers installed with the libraries.
  pub interfaces: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileSpec {
  pub flags: BuildFlags,
  pub build_subdir: Option<String>,
  pub suffix: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSpec {
  pub name: String,
  pub sources: Vec<String>,
  #[serde(default)]
  pub flags: BuildFlags,
  /// Library targets, library paths or plain `-l` names.
  #[serde(default)]
  pub libs: Vec<String>,
  #[serde(default)]
  pub packages: Vec<PackageLibrary>,
  #[serde(default)]
  pub compiler: Option<String>,
  #[serde(default)]
  pub linker: Option<String>,
  #[serde(default)]
  pub include_dirs: Vec<PathBuf>,
  #[serde(default)]
  pub lib_dirs: Vec<PathBuf>,
  #[serde(default)]
  pub internal: bool,
}

impl TargetSpec {
  fn into_parts(self) -> (String, TargetOptions) {
    let options = TargetOptions {
      sources: self.sources,
      flags: self.flags,
      libs: self.libs,
      packages: self.packages,
      compiler: self.compiler,
      linker: self.linker,
      include_dirs: self.include_dirs,
      lib_dirs: self.lib_dirs,
      internal: self.internal,
    };
    (self.name, options)
  }
}

/// Runs the project file at `path` and returns the table it produced.
pub fn evaluate_spec(path: &Path) -> Result<ProjectSpec, EvalError> {
  let canonical_path = dunce::canonicalize(path).map_err(|source| EvalError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  let content = fs::read_to_string(&canonical_path).map_err(|source| EvalError::Read {
    path: canonical_path.clone(),
    source,
  })?;
  let dir = canonical_path.parent().unwrap_or(Path::new("."));

  let lua = Lua::new();
  register_globals(&lua, dir)?;

  debug!(path = %canonical_path.display(), "evaluating project file");
  let value = lua
    .load(&content)
    .set_name(format!("@{}", canonical_path.display()))
    .eval::<LuaValue>()?;

  if !value.is_table() {
    return Err(EvalError::Lua(LuaError::external(format!(
      "project file must return a table, got {}",
      value.type_name()
    ))));
  }

  Ok(lua.from_value(value)?)
}

fn register_globals(lua: &Lua, dir: &Path) -> LuaResult<()> {
  let dir = dir.to_string_lossy().into_owned();

  let kiln = lua.create_table()?;
  kiln.set("dir", dir.as_str())?;
  kiln.set("os", std::env::consts::OS)?;
  kiln.set("version", VERSION)?;
  lua.globals().set("kiln", kiln)?;

  let package: LuaTable = lua.globals().get("package")?;
  let path: String = package.get("path")?;
  package.set("path", format!("{dir}/?.lua;{dir}/?/init.lua;{path}"))?;
  Ok(())
}

/// Orders libraries so each comes after the libraries it links against.
///
/// Otherwise keeps the listed order. Duplicate names and libraries linking
/// against themselves through others are configuration errors.
fn order_libraries(libraries: Vec<TargetSpec>) -> Result<Vec<TargetSpec>, ProjectError> {
  let names: Vec<String> = libraries.iter().map(|lib| lib.name.clone()).collect();
  let mut by_name = HashMap::with_capacity(libraries.len());
  for lib in libraries {
    if by_name.contains_key(&lib.name) {
      return Err(ProjectError::Configuration(format!("library '{}' is declared twice", lib.name)));
    }
    by_name.insert(lib.name.clone(), lib);
  }

  let mut order = Vec::with_capacity(names.len());
  let mut visited = HashSet::new();
  let mut stack = Vec::new();
  for name in &names {
    visit_library(name, &by_name, &mut visited, &mut stack, &mut order)?;
  }

  Ok(order.into_iter().filter_map(|name| by_name.remove(&name)).collect())
}

fn visit_library(
  name: &str,
  libraries: &HashMap<String, TargetSpec>,
  visited: &mut HashSet<String>,
  stack: &mut Vec<String>,
  order: &mut Vec<String>,
) -> Result<(), ProjectError> {
  if visited.contains(name) {
    return Ok(());
  }
  if let Some(start) = stack.iter().position(|entry| entry == name) {
    let mut chain = stack[start..].to_vec();
    chain.push(name.to_string());
    return Err(ProjectError::Configuration(format!(
      "libraries link against each other in a cycle: {}",
      chain.join(" -> ")
    )));
  }
  let Some(spec) = libraries.get(name) else {
    return Ok(());
  };

  stack.push(name.to_string());
  for dep in &spec.libs {
    if libraries.contains_key(dep) {
      visit_library(dep, libraries, visited, stack, order)?;
    }
  }
  stack.pop();

  visited.insert(name.to_string());
  order.push(name.to_string());
  Ok(())
}

/// Evaluates the project file at `path` and declares everything it describes.
///
/// Libraries are declared before executables and tests so either can link
/// against them, and each library after the libraries it links against. `KILN_BUILD_DIR` overrides the file's `build_dir`.
pub fn load_project(path: &Path) -> Result<Project, EvalError> {
  let spec = evaluate_spec(path)?;
  let path = dunce::canonicalize(path).map_err(|source| EvalError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  let root = path.parent().unwrap_or(Path::new(".")).to_path_buf();

  let build_dir = build_dir_override().or_else(|| spec.build_dir.clone());
  let mut project = Project::new(&root, build_dir.as_deref(), &spec.dirs)?;
  project.set_config_file(&path);

  for dir in &spec.exclude {
    project.files_mut().add_exclude_dir(dir);
  }
  for dir in &spec.include_dirs {
    project.files_mut().add_include_dir(dir)?;
  }

  for (name, profile) in spec.profiles {
    project.set_profile(&name, profile.flags, profile.build_subdir.as_deref(), &profile.suffix)?;
  }

  for target in order_libraries(spec.libraries)? {
    let (name, options) = target.into_parts();
    project.library(&name, options)?;
  }
  for target in spec.executables {
    let (name, options) = target.into_parts();
    project.executable(&name, options)?;
  }
  for target in spec.tests {
    let (name, options) = target.into_parts();
    project.test(&name, options)?;
  }

  if !spec.interfaces.is_empty() {
    project.interfaces(&spec.interfaces)?;
  }

  info!(
    path = %path.display(),
    targets = project.all_targets().count(),
    profiles = project.profile_names().len(),
    "loaded project"
  );
  Ok(project)
}
