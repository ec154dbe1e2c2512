//! kiln-lib: Core types and logic for kiln
//!
//! This crate provides everything needed to build a C++ project described by
//! a Lua project file:
//! - `FileManager`: indexes project files and scans their quoted includes
//! - `Graph`: arena of source, object and artifact nodes
//! - `Project`: profiles and targets, plus build/run/test/install/clean
//! - `Backend`: turns graphs into a build description and executes it

pub mod backend;
pub mod consts;
pub mod diagnostics;
pub mod error;
pub mod eval;
pub mod execute;
pub mod files;
pub mod graph;
pub mod platform;
pub mod project;
pub mod tools;
pub mod util;

pub use error::{ProjectError, Result};
pub use eval::{EvalError, load_project};
pub use project::{Project, TargetOptions};
