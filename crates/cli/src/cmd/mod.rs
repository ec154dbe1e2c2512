mod build;
mod clean;
mod configure;
mod install;
mod run;
mod targets;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use kiln_lib::Project;
use kiln_lib::eval::load_project;
use kiln_lib::execute::CancelFlag;

pub use build::cmd_build;
pub use clean::cmd_clean;
pub use configure::cmd_configure;
pub use install::{cmd_install, cmd_uninstall};
pub use run::cmd_run;
pub use run_tests::cmd_tests;
pub use targets::cmd_targets;

/// Loads the project file, configuring when the build description is stale.
fn load_configured(file: &Path) -> Result<Project> {
  let mut project = load(file)?;
  if project.needs_configure() {
    project.configure().context("Failed to configure project")?;
  }
  Ok(project)
}

fn load(file: &Path) -> Result<Project> {
  load_project(file).with_context(|| format!("Failed to load project file: {}", file.display()))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}

/// Cancels `cancel` on Ctrl-C. Must be called from inside the runtime.
fn cancel_on_ctrl_c(cancel: CancelFlag) {
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupted, stopping running tools");
      cancel.cancel();
    }
  });
}
