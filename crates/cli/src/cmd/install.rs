//! Implementation of the `kiln install` and `kiln uninstall` commands.
//!
//! Positional names that match a library or executable select targets; every
//! other name is treated as a header. Both commands only print what they would
//! do unless `--force` is given.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};

use kiln_lib::Project;
use kiln_lib::platform::paths::InstallDirs;
use kiln_lib::project::InstallAction;

use crate::InstallArgs;
use crate::output::{print_info, print_success, print_transfer};

pub fn cmd_install(file: &Path, args: &InstallArgs, profiles: &[String]) -> Result<ExitCode> {
  let project = super::load_configured(file)?;
  let (targets, headers) = split_names(&project, &args.targets);
  let dirs = install_dirs(args);
  let cancel = project.backend().execute_config().cancel.clone();

  let rt = super::runtime()?;
  let actions = rt
    .block_on(async {
      super::cancel_on_ctrl_c(cancel);
      project.install(&targets, profiles, &headers, &dirs, !args.force).await
    })
    .context("Install failed")?;

  report(&actions, args.force, "Installed", |action| {
    print_transfer(
      Some(&action.source.display().to_string()),
      &action.destination.display().to_string(),
    )
  });
  Ok(ExitCode::SUCCESS)
}

pub fn cmd_uninstall(file: &Path, args: &InstallArgs, profiles: &[String]) -> Result<ExitCode> {
  let project = super::load(file)?;
  let (targets, headers) = split_names(&project, &args.targets);
  let dirs = install_dirs(args);

  let actions = project
    .uninstall(&targets, profiles, &headers, &dirs, !args.force)
    .context("Uninstall failed")?;

  report(&actions, args.force, "Removed", |action| {
    print_transfer(None, &action.destination.display().to_string())
  });
  Ok(ExitCode::SUCCESS)
}

fn split_names(project: &Project, names: &[String]) -> (Vec<String>, Vec<String>) {
  names.iter().cloned().partition(|name| project.contains(name))
}

fn install_dirs(args: &InstallArgs) -> InstallDirs {
  let defaults = InstallDirs::default();
  InstallDirs {
    headers: args.headers.clone().unwrap_or(defaults.headers),
    libraries: args.libraries.clone().unwrap_or(defaults.libraries),
    executables: args.executables.clone().unwrap_or(defaults.executables),
  }
}

fn report(actions: &[InstallAction], force: bool, verb: &str, print: impl Fn(&InstallAction)) {
  if actions.is_empty() {
    print_info("Nothing to do");
    return;
  }
  for action in actions {
    print(action);
  }
  if force {
    print_success(&format!("{} {} file(s)", verb, actions.len()));
  } else {
    print_info("Dry run - no changes made. Pass --force to apply.");
  }
}
