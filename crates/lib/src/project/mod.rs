//! Projects: files, profiles and targets tied together.
//!
//! A [`Project`] starts with two profiles, `release` and `debug`. Declaring a
//! target adds its nodes to every profile that exists at that point, so
//! profiles should be configured before targets are declared.

mod install;
mod profile;
mod target;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::backend::{Backend, LocalBackend};
use crate::diagnostics::{Diagnostic, DiagnosticKind, SharedSink, tracing_sink};
use crate::error::{ProjectError, Result};
use crate::execute::BuildReport;
use crate::files::{FileManager, normalize};
use crate::graph::Graph;
use crate::tools::{BuildFlags, CcTool, LinkLibrary};
use crate::util::paths::{exec_name, lib_name};

pub use install::InstallAction;
pub use profile::{Profile, ProfileLibrary, TargetConfig};
pub use target::{LibraryRef, PackageLibrary, ProfileArtifact, ProjectTarget, TargetKind, TargetOptions};

pub const RELEASE: &str = "release";
pub const DEBUG: &str = "debug";

/// A test that did not exit successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFailure {
  pub name: String,
  pub profile: String,
  /// `None` when the test was terminated by a signal.
  pub code: Option<i32>,
}

#[derive(Debug)]
pub struct Project<B: Backend = LocalBackend> {
  files: FileManager,
  config_file: Option<PathBuf>,
  profiles: BTreeMap<String, Profile>,
  executables: BTreeMap<String, ProjectTarget>,
  libraries: BTreeMap<String, ProjectTarget>,
  tests: BTreeMap<String, ProjectTarget>,
  public_headers: BTreeSet<PathBuf>,
  backend: B,
  diagnostics: SharedSink,
}

impl Project<LocalBackend> {
  /// Creates a project rooted at `root` with the default profiles.
  ///
  /// `build_dir` defaults to `<root>/build`; `dirs` are additional directories
  /// whose files belong to the project.
  pub fn new(root: &Path, build_dir: Option<&Path>, dirs: &[PathBuf]) -> Result<Self> {
    Self::with_diagnostics(root, build_dir, dirs, tracing_sink())
  }

  pub fn with_diagnostics(
    root: &Path,
    build_dir: Option<&Path>,
    dirs: &[PathBuf],
    diagnostics: SharedSink,
  ) -> Result<Self> {
    let files = FileManager::with_diagnostics(root, build_dir, dirs, diagnostics.clone())?;
    let backend = LocalBackend::new(files.build_dir());
    Project::with_backend(files, backend, diagnostics)
  }
}

impl<B: Backend> Project<B> {
  pub fn with_backend(files: FileManager, backend: B, diagnostics: SharedSink) -> Result<Self> {
    let mut project = Self {
      files,
      config_file: None,
      profiles: BTreeMap::new(),
      executables: BTreeMap::new(),
      libraries: BTreeMap::new(),
      tests: BTreeMap::new(),
      public_headers: BTreeSet::new(),
      backend,
      diagnostics,
    };
    project.profile(RELEASE, BuildFlags::new().o("3").std(17).march("native").fpic(), None, "")?;
    project.profile(
      DEBUG,
      BuildFlags::new().o("0").std(17).debug().fpic().define("S_DEBUG"),
      None,
      "_debug",
    )?;
    Ok(project)
  }

  pub fn files(&self) -> &FileManager {
    &self.files
  }

  pub fn files_mut(&mut self) -> &mut FileManager {
    &mut self.files
  }

  pub fn build_dir(&self) -> &Path {
    self.files.build_dir()
  }

  pub fn backend(&self) -> &B {
    &self.backend
  }

  pub fn backend_mut(&mut self) -> &mut B {
    &mut self.backend
  }

  /// The file this project was loaded from, used by [`Project::needs_configure`].
  pub fn config_file(&self) -> Option<&Path> {
    self.config_file.as_deref()
  }

  pub fn set_config_file(&mut self, path: impl Into<PathBuf>) {
    self.config_file = Some(path.into());
  }

  /// Returns the profile `name`, creating it when it does not exist yet.
  ///
  /// `build_subdir` is a directory name inside the build directory and
  /// defaults to `name`. An existing profile is returned unchanged.
  pub fn profile(&mut self, name: &str, flags: BuildFlags, build_subdir: Option<&str>, suffix: &str) -> Result<&Profile> {
    if !self.profiles.contains_key(name) {
      let profile = self.new_profile(name, flags, build_subdir, suffix)?;
      self.profiles.insert(name.to_string(), profile);
    }
    self.get_profile(name)
  }

  /// Creates or replaces the profile `name`.
  ///
  /// Only allowed before any target is declared, since targets are added to
  /// the profiles that exist when they are declared.
  pub fn set_profile(&mut self, name: &str, flags: BuildFlags, build_subdir: Option<&str>, suffix: &str) -> Result<&Profile> {
    if self.all_targets().next().is_some() {
      return Err(ProjectError::Configuration(format!(
        "profile '{}' must be defined before any target is declared",
        name
      )));
    }
    let profile = self.new_profile(name, flags, build_subdir, suffix)?;
    self.profiles.insert(name.to_string(), profile);
    self.get_profile(name)
  }

  fn new_profile(&self, name: &str, flags: BuildFlags, build_subdir: Option<&str>, suffix: &str) -> Result<Profile> {
    let subdir = build_subdir.unwrap_or(name);
    if subdir.is_empty() || Path::new(subdir).is_absolute() {
      return Err(ProjectError::Configuration(format!(
        "build subdirectory for profile '{}' must be a relative directory name, got '{}'",
        name, subdir
      )));
    }
    let build_dir = normalize(&self.files.build_dir().join(subdir));
    if !build_dir.starts_with(self.files.build_dir()) || build_dir == self.files.build_dir() {
      return Err(ProjectError::Configuration(format!(
        "build subdirectory for profile '{}' escapes the build directory: {}",
        name, subdir
      )));
    }
    debug!(profile = %name, build_dir = %build_dir.display(), "adding profile");
    Ok(Profile::new(name, flags, build_dir, suffix, self.diagnostics.clone()))
  }

  pub fn get_profile(&self, name: &str) -> Result<&Profile> {
    self.profiles.get(name).ok_or_else(|| ProjectError::UnknownProfile {
      name: name.to_string(),
      available: self.profile_names(),
    })
  }

  pub fn profiles(&self) -> impl Iterator<Item = &Profile> {
    self.profiles.values()
  }

  pub fn profile_names(&self) -> Vec<String> {
    self.profiles.keys().cloned().collect()
  }

  pub fn executables(&self) -> &BTreeMap<String, ProjectTarget> {
    &self.executables
  }

  pub fn libraries(&self) -> &BTreeMap<String, ProjectTarget> {
    &self.libraries
  }

  pub fn tests(&self) -> &BTreeMap<String, ProjectTarget> {
    &self.tests
  }

  pub fn public_headers(&self) -> &BTreeSet<PathBuf> {
    &self.public_headers
  }

  /// Libraries, executables and tests, in that order.
  pub fn all_targets(&self) -> impl Iterator<Item = &ProjectTarget> {
    self
      .libraries
      .values()
      .chain(self.executables.values())
      .chain(self.tests.values())
  }

  /// True when `name` is a library or executable.
  pub fn contains(&self, name: &str) -> bool {
    self.libraries.contains_key(name) || self.executables.contains_key(name)
  }

  /// Adds an executable target to all profiles.
  pub fn executable(&mut self, name: &str, options: TargetOptions) -> Result<&ProjectTarget> {
    let target = self.declare(name, TargetKind::Executable, exec_name(name), options)?;
    self.executables.insert(name.to_string(), target);
    Ok(&self.executables[name])
  }

  /// Adds a shared library target to all profiles.
  pub fn library(&mut self, name: &str, mut options: TargetOptions) -> Result<&ProjectTarget> {
    options.flags = options.flags.shared();
    let target = self.declare(name, TargetKind::Library, lib_name(name), options)?;
    self.libraries.insert(name.to_string(), target);
    Ok(&self.libraries[name])
  }

  /// Adds a test executable to all profiles. Tests are always internal.
  pub fn test(&mut self, name: &str, options: TargetOptions) -> Result<&ProjectTarget> {
    let target = self.declare(name, TargetKind::Test, exec_name(name), options)?;
    self.tests.insert(name.to_string(), target);
    Ok(&self.tests[name])
  }

  fn declare(&mut self, name: &str, kind: TargetKind, artifact: String, options: TargetOptions) -> Result<ProjectTarget> {
    validate_target_name(name)?;
    if options.sources.is_empty() {
      return Err(ProjectError::Configuration(format!("target '{}' has no sources", name)));
    }

    let mut sources = Vec::with_capacity(options.sources.len());
    for source in &options.sources {
      let id = self.files.source(source)?;
      let path = self.files.graph().node(id).path().to_path_buf();
      self.files.scan(&path)?;
      sources.push(path);
    }

    let mut libs = Vec::with_capacity(options.libs.len() + options.packages.len());
    for lib in &options.libs {
      libs.push(self.resolve_library(lib)?);
    }
    for package in &options.packages {
      self.files.external(&package.artifact)?;
      libs.push(LibraryRef::Package(package.clone()));
    }

    let root = self.files.root_dir().to_path_buf();
    let mut include_dirs: Vec<PathBuf> = options.include_dirs.iter().map(|d| normalize(&root.join(d))).collect();
    let mut lib_dirs: Vec<PathBuf> = options.lib_dirs.iter().map(|d| normalize(&root.join(d))).collect();
    for lib in &libs {
      if let LibraryRef::Package(package) = lib {
        include_dirs.extend(package.include_dirs.iter().cloned());
        lib_dirs.extend(package.lib_dirs.iter().cloned());
      }
    }

    let config = TargetConfig {
      name: name.to_string(),
      artifact,
      sources,
      flags: options.flags,
      compiler: Arc::new(CcTool::from_name(options.compiler.as_deref().unwrap_or("clang++"))),
      linker: Arc::new(CcTool::from_name(options.linker.as_deref().unwrap_or("clang++"))),
      include_dirs,
      lib_dirs,
    };

    let mut target = ProjectTarget::new(name, kind, options.internal);
    'profiles: for (profile_name, profile) in self.profiles.iter_mut() {
      let mut profile_libs = Vec::with_capacity(libs.len());
      for lib in &libs {
        let resolved = match lib {
          LibraryRef::Target(lib_name) => {
            let Some(path) = self.libraries.get(lib_name).and_then(|t| t.path(profile_name)) else {
              self.diagnostics.emit(Diagnostic::warning(
                DiagnosticKind::MissingProfileTarget,
                None,
                format!(
                  "skipping target '{}' for profile '{}': library '{}' does not exist in that profile",
                  name, profile_name, lib_name
                ),
              ));
              continue 'profiles;
            };
            ProfileLibrary {
              library: LinkLibrary::Path(path.to_path_buf()),
              input: Some(path.to_path_buf()),
            }
          }
          LibraryRef::Path(path) => ProfileLibrary {
            library: LinkLibrary::Path(path.clone()),
            input: Some(path.clone()),
          },
          LibraryRef::Package(package) => ProfileLibrary {
            library: LinkLibrary::Path(package.artifact.clone()),
            input: Some(package.artifact.clone()),
          },
          LibraryRef::Name(lib_name) => ProfileLibrary {
            library: LinkLibrary::Name(lib_name.clone()),
            input: None,
          },
        };
        profile_libs.push(resolved);
      }

      let path = profile.target(&self.files, &config, &profile_libs)?;
      let install_name = profile.artifact_name(&config.artifact);
      target.insert(profile_name.clone(), ProfileArtifact { path, install_name });
    }

    info!(target_name = %target, profiles = target.artifacts().count(), "declared target");
    Ok(target)
  }

  /// Decides what a library string refers to.
  ///
  /// Library targets win. Strings with a directory component or an extension
  /// are paths; anything else is a name for the linker.
  pub fn resolve_library(&mut self, lib: &str) -> Result<LibraryRef> {
    if self.libraries.contains_key(lib) {
      return Ok(LibraryRef::Target(lib.to_string()));
    }

    let path = Path::new(lib);
    let looks_like_path = path.components().count() > 1 || path.extension().is_some();
    if looks_like_path {
      let resolved = if path.is_absolute() {
        path.to_path_buf()
      } else {
        self.files.resolve(lib)?
      };
      let id = self.files.external(&resolved)?;
      return Ok(LibraryRef::Path(self.files.graph().node(id).path().to_path_buf()));
    }

    let candidates = self.files.find(lib);
    if !candidates.is_empty() {
      self.diagnostics.emit(Diagnostic::warning(
        DiagnosticKind::LibraryNameShadowsFile,
        None,
        format!(
          "library '{}' is treated as a library name, but matches project files {:?}; use a longer path to link a file",
          lib, candidates
        ),
      ));
    }
    Ok(LibraryRef::Name(lib.to_string()))
  }

  /// Declares public headers, installed by [`Project::install`].
  pub fn interfaces(&mut self, headers: &[String]) -> Result<Vec<PathBuf>> {
    let mut discovered = Vec::with_capacity(headers.len());
    for header in headers {
      discovered.push(self.files.resolve(header)?);
    }
    self.public_headers.extend(discovered.iter().cloned());
    Ok(discovered)
  }

  /// Looks up targets by name. A name shared by a library and an executable selects both.
  pub fn select_targets(&self, names: &[String]) -> Result<Vec<&ProjectTarget>> {
    let mut selected = Vec::new();
    for name in names {
      let lib = self.libraries.get(name);
      let exe = self.executables.get(name);
      let test = self.tests.get(name);
      if lib.is_some() && exe.is_some() {
        self.diagnostics.emit(Diagnostic::warning(
          DiagnosticKind::AmbiguousTargetName,
          None,
          format!("target '{}' refers to both an executable and a library, selecting both", name),
        ));
      }
      let found: Vec<&ProjectTarget> = lib.into_iter().chain(exe).chain(test).collect();
      if found.is_empty() {
        return Err(ProjectError::UnknownTarget { name: name.clone() });
      }
      selected.extend(found);
    }
    Ok(selected)
  }

  /// Profile names to use, all of them when `names` is empty.
  fn select_profiles(&self, names: &[String]) -> Result<Vec<String>> {
    if names.is_empty() {
      return Ok(self.profile_names());
    }
    for name in names {
      self.get_profile(name)?;
    }
    Ok(names.to_vec())
  }

  /// True when the build description is missing or older than the project file.
  pub fn needs_configure(&self) -> bool {
    let timestamp = self
      .config_file
      .as_ref()
      .and_then(|p| p.metadata().ok())
      .and_then(|m| m.modified().ok())
      .unwrap_or(SystemTime::UNIX_EPOCH);
    self.backend.needs_configure(timestamp)
  }

  /// Scans every project file and writes the backend configuration.
  pub fn configure(&mut self) -> Result<PathBuf> {
    self.files.scan_all()?;
    self.files.mkdir(self.files.build_dir())?;
    let graphs: Vec<&Graph> = self.profiles.values().map(Profile::graph).collect();
    self.backend.configure(self.files.graph(), &graphs)
  }

  /// Builds `targets` for `profiles`; empty slices mean all of them.
  ///
  /// Step failures are reported in the returned [`BuildReport`], not as errors.
  pub async fn build(&self, targets: &[String], profiles: &[String]) -> Result<BuildReport> {
    let selected: Vec<&ProjectTarget> = if targets.is_empty() {
      self.all_targets().collect()
    } else {
      self.select_targets(targets)?
    };
    let profiles = self.select_profiles(profiles)?;
    self.build_selected(&selected, &profiles).await
  }

  async fn build_selected(&self, targets: &[&ProjectTarget], profiles: &[String]) -> Result<BuildReport> {
    info!(
      targets = ?targets.iter().map(|t| t.name()).collect::<Vec<_>>(),
      profiles = ?profiles,
      "building"
    );

    let mut roots = Vec::new();
    let mut graphs = vec![self.files.graph()];
    for profile_name in profiles {
      let profile = self.get_profile(profile_name)?;
      self.files.mkdir(profile.build_dir())?;
      graphs.push(profile.graph());
      for target in targets {
        match target.path(profile_name) {
          Some(path) => roots.push(path.to_path_buf()),
          None => debug!(target_name = %target.name(), profile = %profile_name, "target not in profile, skipping"),
        }
      }
    }

    let report = self.backend.build(&roots, &graphs).await?;
    if report.is_success() {
      info!(
        targets = targets.len(),
        profiles = profiles.len(),
        elapsed = ?report.elapsed,
        "build complete"
      );
    } else {
      warn!(failed = report.failed.len(), skipped = report.skipped.len(), "build incomplete");
    }
    Ok(report)
  }

  /// Builds and runs executable `target` from `profile`, inheriting stdio.
  pub async fn run(&self, target: &str, profile: &str, args: &[String]) -> Result<ExitStatus> {
    let exe = self
      .executables
      .get(target)
      .ok_or_else(|| ProjectError::UnknownTarget { name: target.to_string() })?;
    self.get_profile(profile)?;
    let path = exe.path(profile).ok_or_else(|| {
      ProjectError::Configuration(format!("target '{}' does not exist in profile '{}'", target, profile))
    })?;

    let report = self.build_selected(&[exe], &[profile.to_string()]).await?;
    ensure_built(&report)?;

    info!(target_name = %target, profile = %profile, "running");
    Ok(Command::new(path).args(args).status().await?)
  }

  /// Builds and runs tests for `profiles`; empty slices mean all of them.
  ///
  /// Every test is run even when earlier ones fail. Returns the failures.
  pub async fn run_tests(&self, tests: &[String], profiles: &[String]) -> Result<Vec<TestFailure>> {
    let mut selected = Vec::new();
    if tests.is_empty() {
      selected.extend(self.tests.values());
    } else {
      for name in tests {
        let test = self
          .tests
          .get(name)
          .ok_or_else(|| ProjectError::UnknownTarget { name: name.clone() })?;
        selected.push(test);
      }
    }
    let profiles = self.select_profiles(profiles)?;

    let report = self.build_selected(&selected, &profiles).await?;
    ensure_built(&report)?;

    let mut failures = Vec::new();
    for profile in &profiles {
      for test in &selected {
        let Some(path) = test.path(profile) else {
          continue;
        };
        info!(test = %test.name(), profile = %profile, "running test");
        let status = Command::new(path).status().await?;
        if !status.success() {
          warn!(test = %test.name(), profile = %profile, code = ?status.code(), "test failed");
          failures.push(TestFailure {
            name: test.name().to_string(),
            profile: profile.clone(),
            code: status.code(),
          });
        }
      }
    }
    Ok(failures)
  }

  /// Removes build output for `profiles`, or the whole build directory when `nuke` is set.
  ///
  /// Returns the directories that were (or, with `dry_run`, would be) removed.
  pub fn clean(&self, profiles: &[String], nuke: bool, dry_run: bool) -> Result<Vec<PathBuf>> {
    let dirs: Vec<PathBuf> = if nuke {
      vec![self.files.build_dir().to_path_buf()]
    } else {
      self
        .select_profiles(profiles)?
        .iter()
        .map(|name| self.get_profile(name).map(|p| p.build_dir().to_path_buf()))
        .collect::<Result<_>>()?
    };

    let mut removed = Vec::new();
    for dir in dirs {
      if !dir.exists() {
        continue;
      }
      if dry_run {
        info!(dir = %dir.display(), "would remove");
      } else {
        info!(dir = %dir.display(), "removing");
        std::fs::remove_dir_all(&dir)?;
      }
      removed.push(dir);
    }
    Ok(removed)
  }
}

fn ensure_built(report: &BuildReport) -> Result<()> {
  if report.is_success() {
    return Ok(());
  }
  Err(ProjectError::BuildFailed {
    failed: report.failed.keys().cloned().collect(),
    skipped: report.skipped.len() + report.cancelled.len(),
  })
}

fn validate_target_name(name: &str) -> Result<()> {
  let path = Path::new(name);
  if name.is_empty() || path.components().count() != 1 {
    return Err(ProjectError::Configuration(format!(
      "target name '{}' must be a plain file name",
      name
    )));
  }
  if path.extension().is_some() {
    return Err(ProjectError::Configuration(format!(
      "target name '{}' must not include a platform-dependent extension",
      name
    )));
  }
  Ok(())
}
