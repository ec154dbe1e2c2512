//! External tool invocations.

use std::path::Path;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

/// A fully resolved command line for one compile or link step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
  pub program: String,
  pub args: Vec<String>,
}

/// Exit status and interleaved output of a finished tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
  /// `None` when the process was terminated by a signal.
  pub code: Option<i32>,
  pub output: String,
}

impl ToolOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

impl ToolInvocation {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn path_arg(self, path: &Path) -> Self {
    self.arg(path.to_string_lossy().to_string())
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  /// Replaces every argument equal to `from` with `to`.
  ///
  /// Used by the executor to point the output argument at a temporary path.
  pub fn with_replaced_arg(&self, from: &str, to: &str) -> Self {
    Self {
      program: self.program.clone(),
      args: self
        .args
        .iter()
        .map(|a| if a == from { to.to_string() } else { a.clone() })
        .collect(),
    }
  }

  /// Shell-like rendering for logs and error messages.
  pub fn command_line(&self) -> String {
    std::iter::once(self.program.as_str())
      .chain(self.args.iter().map(String::as_str))
      .collect::<Vec<_>>()
      .join(" ")
  }

  /// Runs the tool to completion, capturing stdout and stderr.
  ///
  /// The child is killed if the returned future is dropped before it finishes.
  pub async fn run(&self) -> std::io::Result<ToolOutput> {
    debug!(cmd = %self.command_line(), "spawning tool");

    let output = Command::new(&self.program)
      .args(&self.args)
      .stdin(Stdio::null())
      .kill_on_drop(true)
      .output()
      .await?;

    let mut captured = String::from_utf8_lossy(&output.stdout).to_string();
    captured.push_str(&String::from_utf8_lossy(&output.stderr));

    Ok(ToolOutput {
      code: output.status.code(),
      output: captured,
    })
  }
}
