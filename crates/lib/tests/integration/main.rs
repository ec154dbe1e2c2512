//! Integration tests for kiln-lib.
//!
//! Builds run a shell script in place of the compiler, so most of these are
//! unix only.

mod common;

#[cfg(unix)]
mod build_tests;
mod eval_tests;
#[cfg(unix)]
mod install_tests;
#[cfg(unix)]
mod test_runner_tests;
