//! Copying artifacts and public headers out of the build tree.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use super::{Project, ProjectTarget, RELEASE, TargetKind, ensure_built};
use crate::backend::Backend;
use crate::error::{ProjectError, Result};
use crate::platform::paths::InstallDirs;

/// One file copied by `install` or removed by `uninstall`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallAction {
  pub source: PathBuf,
  pub destination: PathBuf,
}

impl fmt::Display for InstallAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} -> {}", self.source.display(), self.destination.display())
  }
}

impl<B: Backend> Project<B> {
  /// Builds and copies public targets and headers into `dirs`.
  ///
  /// Empty `targets` selects every library and executable, empty `profiles`
  /// selects release, and empty `headers` selects the declared interfaces.
  /// With `dry_run` nothing is built or copied.
  pub async fn install(
    &self,
    targets: &[String],
    profiles: &[String],
    headers: &[String],
    dirs: &InstallDirs,
    dry_run: bool,
  ) -> Result<Vec<InstallAction>> {
    let (selected, profiles) = self.install_selection(targets, profiles)?;
    let actions = self.install_actions(&selected, &profiles, headers, dirs)?;
    self.check_destinations(&actions)?;

    if dry_run {
      for action in &actions {
        info!(action = %action, "would install");
      }
      return Ok(actions);
    }

    let report = self.build_selected(&selected, &profiles).await?;
    ensure_built(&report)?;

    for action in &actions {
      if let Some(parent) = action.destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
      }
      tokio::fs::copy(&action.source, &action.destination).await?;
      info!(action = %action, "installed");
    }
    Ok(actions)
  }

  /// Removes what [`Project::install`] would install. Selection works the same way.
  pub fn uninstall(
    &self,
    targets: &[String],
    profiles: &[String],
    headers: &[String],
    dirs: &InstallDirs,
    dry_run: bool,
  ) -> Result<Vec<InstallAction>> {
    let (selected, profiles) = self.install_selection(targets, profiles)?;
    let actions = self.install_actions(&selected, &profiles, headers, dirs)?;

    let mut removed = Vec::new();
    for action in actions {
      if !action.destination.exists() {
        debug!(path = %action.destination.display(), "not installed");
        continue;
      }
      if dry_run {
        info!(path = %action.destination.display(), "would uninstall");
      } else {
        std::fs::remove_file(&action.destination)?;
        info!(path = %action.destination.display(), "uninstalled");
      }
      removed.push(action);
    }
    Ok(removed)
  }

  /// Installed files must stay out of the file index.
  fn check_destinations(&self, actions: &[InstallAction]) -> Result<()> {
    let dirs: BTreeSet<&Path> = actions.iter().filter_map(|a| a.destination.parent()).collect();
    for dir in dirs {
      if self.files.indexes_dir(dir)? {
        return Err(ProjectError::Configuration(format!(
          "install directory {} is inside the project tree; choose a directory outside it or exclude it",
          dir.display()
        )));
      }
    }
    Ok(())
  }

  fn install_selection(&self, targets: &[String], profiles: &[String]) -> Result<(Vec<&ProjectTarget>, Vec<String>)> {
    let candidates: Vec<&ProjectTarget> = if targets.is_empty() {
      self.libraries.values().chain(self.executables.values()).collect()
    } else {
      self.select_targets(targets)?
    };
    let selected = candidates
      .into_iter()
      .filter(|t| {
        if t.is_internal() {
          debug!(target_name = %t.name(), "internal target, not installing");
        }
        !t.is_internal()
      })
      .collect();

    let profiles = if profiles.is_empty() {
      vec![RELEASE.to_string()]
    } else {
      self.select_profiles(profiles)?
    };
    Ok((selected, profiles))
  }

  fn install_actions(
    &self,
    targets: &[&ProjectTarget],
    profiles: &[String],
    headers: &[String],
    dirs: &InstallDirs,
  ) -> Result<Vec<InstallAction>> {
    let mut actions = Vec::new();
    for profile in profiles {
      for target in targets {
        let Some(artifact) = target.artifact(profile) else {
          continue;
        };
        let dir = match target.kind() {
          TargetKind::Library => &dirs.libraries,
          TargetKind::Executable | TargetKind::Test => &dirs.executables,
        };
        actions.push(InstallAction {
          source: artifact.path.clone(),
          destination: dir.join(&artifact.install_name),
        });
      }
    }

    let headers: Vec<PathBuf> = if headers.is_empty() {
      self.public_headers.iter().cloned().collect()
    } else {
      headers.iter().map(|h| self.files.resolve(h)).collect::<Result<_>>()?
    };
    for header in headers {
      if let Some(name) = header.file_name() {
        let destination = dirs.headers.join(name);
        actions.push(InstallAction {
          source: header,
          destination,
        });
      }
    }
    Ok(actions)
  }
}
