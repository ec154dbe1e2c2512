//! Implementation of the `kiln targets` command.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use serde::Serialize;

use kiln_lib::project::{ProjectTarget, TargetKind};

use crate::output::{OutputFormat, print_json, print_stat, symbols};

#[derive(Serialize)]
struct TargetInfo<'a> {
  name: &'a str,
  kind: TargetKind,
  internal: bool,
  artifacts: BTreeMap<&'a str, &'a Path>,
}

impl<'a> From<&'a ProjectTarget> for TargetInfo<'a> {
  fn from(target: &'a ProjectTarget) -> Self {
    Self {
      name: target.name(),
      kind: target.kind(),
      internal: target.is_internal(),
      artifacts: target.artifacts().map(|(profile, a)| (profile, a.path.as_path())).collect(),
    }
  }
}

pub fn cmd_targets(file: &Path, names: &[String], output: OutputFormat) -> Result<ExitCode> {
  let project = super::load(file)?;
  let targets: Vec<&ProjectTarget> = if names.is_empty() {
    project.all_targets().collect()
  } else {
    project.select_targets(names).context("Failed to select targets")?
  };
  let headers: Vec<&PathBuf> = project.public_headers().iter().collect();

  if output.is_json() {
    let infos: Vec<TargetInfo> = targets.iter().copied().map(TargetInfo::from).collect();
    print_json(&serde_json::json!({ "targets": infos, "public_headers": headers }))?;
    return Ok(ExitCode::SUCCESS);
  }

  println!("Targets:");
  for target in &targets {
    println!("  {} {}", symbols::INFO, target);
    for (profile, artifact) in target.artifacts() {
      print_stat(&format!("  {}", profile), &artifact.path.display().to_string());
    }
  }
  println!();
  println!("Public headers:");
  for header in headers {
    println!("  {} {}", symbols::INFO, header.display());
  }
  Ok(ExitCode::SUCCESS)
}
