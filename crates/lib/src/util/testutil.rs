//! Test utilities for kiln-lib.
//!
//! [`ProjectTree`] lays out a throwaway project on disk. [`fake_compiler`]
//! writes a shell script that behaves like a compiler driver closely enough
//! for the executor: it writes whatever follows `-o` and fails when an input
//! contains `FAIL_BUILD`. Its outputs are themselves runnable scripts that
//! exit with 3 when any input contained `FAIL_TEST`, so linked tests can be
//! run.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub struct ProjectTree {
  _temp: TempDir,
  root: PathBuf,
}

impl ProjectTree {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();
    Self { _temp: temp, root }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn path(&self, relative: &str) -> PathBuf {
    self.root.join(relative)
  }

  pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
    let path = self.path(relative);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
  }
}

/// Writes an executable fake compiler into `dir` and returns its path.
///
/// Each run appends its output path to `<dir>/invocations.log`.
#[cfg(unix)]
pub fn fake_compiler(dir: &Path) -> PathBuf {
  use std::os::unix::fs::PermissionsExt;

  let log = dir.join("invocations.log");
  let script = format!(
    r##"#!/bin/sh
out=""
prev=""
status=0
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  if [ -f "$arg" ] && grep -q FAIL_BUILD "$arg"; then
    echo "error: forced failure in $arg" >&2
    exit 1
  fi
  if [ -f "$arg" ] && grep -q FAIL_TEST "$arg"; then status=3; fi
  prev="$arg"
done
echo "$out" >> "{log}"
{{
  echo "#!/bin/sh"
  echo "# $*"
  if [ "$status" -ne 0 ]; then echo "exit $status # FAIL_TEST"; else echo "exit 0"; fi
}} > "$out"
chmod +x "$out"
"##,
    log = log.display()
  );

  let path = dir.join("fakecc");
  fs::write(&path, script).unwrap();
  fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
  path
}

/// Output paths the fake compiler has written, in order.
pub fn invocations(dir: &Path) -> Vec<String> {
  fs::read_to_string(dir.join("invocations.log"))
    .map(|s| s.lines().map(str::to_string).collect())
    .unwrap_or_default()
}
