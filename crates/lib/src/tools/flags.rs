//! Compiler and linker flags.
//!
//! `BuildFlags` is the canonical, order-independent representation of the
//! options a target is built with. It is part of every signature, so every
//! collection in it is sorted.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildFlags {
  /// Optimization level (`0`, `1`, `2`, `3`, `s`, `fast`, ...).
  #[serde(deserialize_with = "string_or_number")]
  pub opt: Option<String>,
  /// C++ standard year, e.g. `17`.
  pub std: Option<u32>,
  pub march: Option<String>,
  pub fpic: Option<bool>,
  pub debug: Option<bool>,
  /// Produce a shared library instead of an executable.
  pub shared: Option<bool>,
  /// Preprocessor definitions, `NAME` or `NAME=VALUE`.
  pub defines: BTreeSet<String>,
  /// Extra compiler arguments passed through verbatim.
  pub extra: BTreeSet<String>,
  /// Extra linker arguments passed through verbatim.
  pub link_extra: BTreeSet<String>,
}

impl BuildFlags {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn o(mut self, level: impl Into<String>) -> Self {
    self.opt = Some(level.into());
    self
  }

  pub fn std(mut self, year: u32) -> Self {
    self.std = Some(year);
    self
  }

  pub fn march(mut self, arch: impl Into<String>) -> Self {
    self.march = Some(arch.into());
    self
  }

  pub fn fpic(mut self) -> Self {
    self.fpic = Some(true);
    self
  }

  pub fn debug(mut self) -> Self {
    self.debug = Some(true);
    self
  }

  pub fn shared(mut self) -> Self {
    self.shared = Some(true);
    self
  }

  pub fn define(mut self, define: impl Into<String>) -> Self {
    self.defines.insert(define.into());
    self
  }

  pub fn raw(mut self, arg: impl Into<String>) -> Self {
    self.extra.insert(arg.into());
    self
  }

  pub fn link_raw(mut self, arg: impl Into<String>) -> Self {
    self.link_extra.insert(arg.into());
    self
  }

  pub fn is_shared(&self) -> bool {
    self.shared.unwrap_or(false)
  }

  /// Layers `overrides` on top of `self`.
  ///
  /// Scalar options set in `overrides` win. Definitions are merged by name,
  /// with the override's value replacing ours. Pass-through arguments are unioned.
  pub fn merged(&self, overrides: &BuildFlags) -> BuildFlags {
    let mut defines: BTreeMap<&str, &String> = BTreeMap::new();
    for define in self.defines.iter().chain(overrides.defines.iter()) {
      defines.insert(define_name(define), define);
    }

    BuildFlags {
      opt: overrides.opt.clone().or_else(|| self.opt.clone()),
      std: overrides.std.or(self.std),
      march: overrides.march.clone().or_else(|| self.march.clone()),
      fpic: overrides.fpic.or(self.fpic),
      debug: overrides.debug.or(self.debug),
      shared: overrides.shared.or(self.shared),
      defines: defines.into_values().cloned().collect(),
      extra: self.extra.union(&overrides.extra).cloned().collect(),
      link_extra: self.link_extra.union(&overrides.link_extra).cloned().collect(),
    }
  }

  /// Arguments for a GCC/Clang style compiler driver.
  pub fn compile_args(&self) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(opt) = &self.opt {
      args.push(format!("-O{}", opt));
    }
    if let Some(std) = self.std {
      args.push(format!("-std=c++{}", std));
    }
    if let Some(march) = &self.march {
      args.push(format!("-march={}", march));
    }
    if self.fpic.unwrap_or(false) {
      args.push("-fPIC".to_string());
    }
    if self.debug.unwrap_or(false) {
      args.push("-g".to_string());
    }
    args.extend(self.defines.iter().map(|d| format!("-D{}", d)));
    args.extend(self.extra.iter().cloned());
    args
  }

  /// Arguments for a GCC/Clang style driver used as a linker.
  pub fn link_args(&self) -> Vec<String> {
    let mut args = Vec::new();
    if self.is_shared() {
      args.push("-shared".to_string());
    }
    if self.fpic.unwrap_or(false) {
      args.push("-fPIC".to_string());
    }
    if self.debug.unwrap_or(false) {
      args.push("-g".to_string());
    }
    args.extend(self.link_extra.iter().cloned());
    args
  }
}

impl std::ops::Add<&BuildFlags> for &BuildFlags {
  type Output = BuildFlags;

  fn add(self, rhs: &BuildFlags) -> BuildFlags {
    self.merged(rhs)
  }
}

fn define_name(define: &str) -> &str {
  define.split_once('=').map(|(name, _)| name).unwrap_or(define)
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Level {
    Text(String),
    Number(i64),
  }

  Ok(Option::<Level>::deserialize(deserializer)?.map(|level| match level {
    Level::Text(s) => s,
    Level::Number(n) => n.to_string(),
  }))
}
