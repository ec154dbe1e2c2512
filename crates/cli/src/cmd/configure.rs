use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};

use crate::output::{print_stat, print_success};

pub fn cmd_configure(file: &Path) -> Result<ExitCode> {
  let mut project = super::load(file)?;
  let description = project.configure().context("Failed to configure project")?;

  print_success("Configured");
  print_stat("Files", &project.files().files().len().to_string());
  print_stat("Profiles", &project.profile_names().join(", "));
  print_stat("Build description", &description.display().to_string());
  Ok(ExitCode::SUCCESS)
}
