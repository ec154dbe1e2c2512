use std::path::{Path, PathBuf};

use serde::Serialize;

/// Install prefix used when `KILN_PREFIX` is not set.
#[cfg(not(windows))]
pub const DEFAULT_PREFIX: &str = "/usr/local";

#[cfg(windows)]
pub const DEFAULT_PREFIX: &str = "C:\\Program Files";

/// Returns the install prefix, honoring `KILN_PREFIX`.
pub fn install_prefix() -> PathBuf {
  std::env::var_os("KILN_PREFIX")
    .filter(|v| !v.is_empty())
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from(DEFAULT_PREFIX))
}

/// Returns the build directory override from `KILN_BUILD_DIR`, if any.
pub fn build_dir_override() -> Option<PathBuf> {
  std::env::var_os("KILN_BUILD_DIR")
    .filter(|v| !v.is_empty())
    .map(PathBuf::from)
}

/// Destination directories for `install` and `uninstall`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallDirs {
  pub headers: PathBuf,
  pub libraries: PathBuf,
  pub executables: PathBuf,
}

impl InstallDirs {
  pub fn from_prefix(prefix: &Path) -> Self {
    Self {
      headers: prefix.join("include"),
      libraries: prefix.join("lib"),
      executables: prefix.join("bin"),
    }
  }
}

impl Default for InstallDirs {
  fn default() -> Self {
    Self::from_prefix(&install_prefix())
  }
}
