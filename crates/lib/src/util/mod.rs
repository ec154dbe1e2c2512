//! Shared utilities.
//!
//! Signature hashing, artifact naming and test helpers.

pub mod hash;
pub mod paths;

#[cfg(test)]
pub mod testutil;
