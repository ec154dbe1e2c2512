//! Implementation of the `kiln clean` command.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};

use crate::output::{print_info, print_success, print_transfer};

/// Removes build output. Without `nuke`, only the selected profiles' directories
/// go (every profile by default).
pub fn cmd_clean(file: &Path, profiles: &[String], nuke: bool, dry_run: bool) -> Result<ExitCode> {
  let project = super::load(file)?;
  let removed = project.clean(profiles, nuke, dry_run).context("Failed to clean")?;

  if removed.is_empty() {
    print_info("Nothing to clean");
    return Ok(ExitCode::SUCCESS);
  }

  for dir in &removed {
    print_transfer(None, &dir.display().to_string());
  }
  if dry_run {
    print_info("Dry run - no changes made");
  } else {
    print_success(&format!("Removed {} director(ies)", removed.len()));
  }
  Ok(ExitCode::SUCCESS)
}
