//! Artifact file naming.

use std::path::Path;

/// Platform file name of an executable target.
pub fn exec_name(name: &str) -> String {
  if cfg!(windows) { format!("{}.exe", name) } else { name.to_string() }
}

/// Platform file name of a shared library target.
pub fn lib_name(name: &str) -> String {
  if cfg!(windows) {
    format!("{}.dll", name)
  } else if cfg!(target_os = "macos") {
    format!("lib{}.dylib", name)
  } else {
    format!("lib{}.so", name)
  }
}

/// Inserts `suffix` into the file name of `path`, just before the extension.
///
/// `ext` replaces the original extension when given (it must include the dot).
///
/// ```ignore
/// assert_eq!(file_suffix(Path::new("/src/a.cpp"), "abc", Some(".o")), "a.abc.o");
/// assert_eq!(file_suffix(Path::new("libm.so"), "abc", None), "libm.abc.so");
/// ```
pub fn file_suffix(path: &Path, suffix: &str, ext: Option<&str>) -> String {
  let stem = path
    .file_stem()
    .map(|s| s.to_string_lossy().to_string())
    .unwrap_or_default();
  let ext = match ext {
    Some(ext) => ext.to_string(),
    None => path
      .extension()
      .map(|e| format!(".{}", e.to_string_lossy()))
      .unwrap_or_default(),
  };
  format!("{}.{}{}", stem, suffix, ext)
}

/// Appends a profile suffix (e.g. `_debug`) to the stem of an artifact name.
pub fn with_profile_suffix(name: &str, suffix: &str) -> String {
  if suffix.is_empty() {
    return name.to_string();
  }
  let path = Path::new(name);
  match (path.file_stem(), path.extension()) {
    (Some(stem), Some(ext)) => format!("{}{}.{}", stem.to_string_lossy(), suffix, ext.to_string_lossy()),
    _ => format!("{}{}", name, suffix),
  }
}
