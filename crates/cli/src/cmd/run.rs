//! Implementation of the `kiln run` command.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};

use kiln_lib::project::RELEASE;

use crate::output::print_warning;

/// Builds and runs `target`, exiting with the executable's exit code.
///
/// Uses the release profile unless exactly one profile is selected.
pub fn cmd_run(file: &Path, target: &str, profiles: &[String], args: &[String]) -> Result<ExitCode> {
  let profile = match profiles {
    [] => RELEASE,
    [profile] => profile.as_str(),
    _ => bail!("'run' takes a single profile, got {}", profiles.join(", ")),
  };

  let project = super::load_configured(file)?;
  let cancel = project.backend().execute_config().cancel.clone();

  let rt = super::runtime()?;
  let status = rt
    .block_on(async {
      super::cancel_on_ctrl_c(cancel);
      project.run(target, profile, args).await
    })
    .with_context(|| format!("Failed to run '{}'", target))?;

  match status.code() {
    Some(code) => Ok(ExitCode::from(u8::try_from(code).unwrap_or(1))),
    None => {
      print_warning(&format!("'{}' was terminated by a signal", target));
      Ok(ExitCode::FAILURE)
    }
  }
}
