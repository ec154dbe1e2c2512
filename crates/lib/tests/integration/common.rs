//! Shared test helpers for integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use kiln_lib::{Project, TargetOptions};
use tempfile::TempDir;

/// Fake compiler driver.
///
/// Writes a runnable script to the `-o` path and logs it to `invocations.log`
/// next to itself. Fails on inputs containing FAIL_BUILD; outputs exit with 3
/// when an input contains FAIL_TEST.
const FAKE_CC: &str = r##"#!/bin/sh
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
echo "$out" >> "$(dirname "$0")/invocations.log"
{
  echo "#!/bin/sh"
  echo "# $*"
  if [ "$status" -ne 0 ]; then echo "exit $status # FAIL_TEST"; else echo "exit 0"; fi
} > "$out"
chmod +x "$out"
"##;

/// Isolated project directory with a fake toolchain outside the indexed tree.
pub struct TestEnv {
  _temp: TempDir,
  root: PathBuf,
  tools: PathBuf,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let base = dunce::canonicalize(temp.path()).unwrap();
    let root = base.join("project");
    let tools = base.join("tools");
    fs::create_dir_all(&root).unwrap();
    fs::create_dir_all(&tools).unwrap();

    let cc = tools.join("fakecc");
    fs::write(&cc, FAKE_CC).unwrap();
    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      fs::set_permissions(&cc, fs::Permissions::from_mode(0o755)).unwrap();
    }

    Self { _temp: temp, root, tools }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn path(&self, relative: &str) -> PathBuf {
    self.root.join(relative)
  }

  /// A path next to the project root, outside the indexed tree.
  pub fn outside(&self, relative: &str) -> PathBuf {
    self.root.parent().unwrap().join(relative)
  }

  /// Write a file relative to the project root.
  pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
    let path = self.path(relative);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
  }

  pub fn cc(&self) -> String {
    self.tools.join("fakecc").to_string_lossy().into_owned()
  }

  /// Target options using the fake compiler for both compiling and linking.
  pub fn options(&self, sources: &[&str]) -> TargetOptions {
    TargetOptions::new(sources.iter().copied()).compiler(self.cc()).linker(self.cc())
  }

  /// Output paths the fake compiler has written, in order.
  pub fn invocations(&self) -> Vec<String> {
    fs::read_to_string(self.tools.join("invocations.log"))
      .map(|s| s.lines().map(str::to_string).collect())
      .unwrap_or_default()
  }

  pub fn project(&self) -> Project {
    Project::new(&self.root, None, &[]).unwrap()
  }

  /// A library, an executable linking it, and a header only the executable uses.
  pub fn write_calculator(&self) {
    self.write("include/math.hpp", "#pragma once\nint add(int a, int b);\n");
    self.write("include/format.hpp", "#pragma once\n#include \"math.hpp\"\n");
    self.write("src/math.cpp", "#include \"math.hpp\"\nint add(int a, int b) { return a + b; }\n");
    self.write("src/main.cpp", "#include \"format.hpp\"\nint main() { return add(1, 2) - 3; }\n");
  }

  pub fn calculator(&self) -> Project {
    self.write_calculator();
    let mut project = self.project();
    project.library("math", self.options(&["src/math.cpp"])).unwrap();
    project
      .executable("calc", self.options(&["src/main.cpp"]).lib("math"))
      .unwrap();
    project
  }
}

/// Sets the modification time of `path` to `offset_secs` seconds from now.
pub fn touch(path: &Path, offset_secs: u64) {
  let when = std::time::SystemTime::now() + std::time::Duration::from_secs(offset_secs);
  fs::File::options()
    .write(true)
    .open(path)
    .unwrap()
    .set_modified(when)
    .unwrap();
}

pub fn file_name(path: &Path) -> String {
  path.file_name().unwrap().to_string_lossy().into_owned()
}
