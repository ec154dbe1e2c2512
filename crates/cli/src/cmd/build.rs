//! Implementation of the `kiln build` command.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};

use kiln_lib::execute::BuildReport;

use crate::output::{format_duration, print_error, print_stat, print_success, print_warning};

pub fn cmd_build(file: &Path, targets: &[String], profiles: &[String]) -> Result<ExitCode> {
  let project = super::load_configured(file)?;
  let cancel = project.backend().execute_config().cancel.clone();

  let rt = super::runtime()?;
  let report = rt
    .block_on(async {
      super::cancel_on_ctrl_c(cancel);
      project.build(targets, profiles).await
    })
    .context("Build failed")?;

  print_report(&report);
  Ok(if report.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Prints a summary of `report`, with the output of every failed tool.
pub(super) fn print_report(report: &BuildReport) {
  for (path, err) in &report.failed {
    print_error(&format!("{}: {}", path.display(), err));
  }
  if !report.cancelled.is_empty() {
    print_warning(&format!("Cancelled {} step(s)", report.cancelled.len()));
  }

  if report.is_success() {
    print_success("Build complete");
  } else {
    print_error("Build failed");
  }
  print_stat("Steps", &report.total().to_string());
  print_stat("Built", &report.built.len().to_string());
  print_stat("Up to date", &report.up_to_date.len().to_string());
  if !report.failed.is_empty() {
    print_stat("Failed", &report.failed.len().to_string());
  }
  if !report.skipped.is_empty() {
    print_stat("Skipped", &report.skipped.len().to_string());
  }
  print_stat("Duration", &format_duration(report.elapsed));
}
