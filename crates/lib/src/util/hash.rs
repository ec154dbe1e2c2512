//! Signature hashing for content-addressed artifact names.
//!
//! A `Signature` is derived from a build configuration, never from file bytes.
//! It only has to give distinct configurations distinct file names; deciding
//! whether an existing artifact is stale is left to the executor.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::SIGNATURE_LEN;

pub type HashError = serde_json::Error;

/// A deterministic token identifying one build configuration.
///
/// The token is a truncated SHA-256 of the JSON-serialized configuration record.
///
/// # Format
///
/// A lowercase hexadecimal string of [`SIGNATURE_LEN`] characters, e.g.
/// `"a1b2c3d4e5f6789012ab"`, which is safe to embed in any file name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Signature(pub String);

impl std::fmt::Display for Signature {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Configuration records that can be turned into a [`Signature`].
///
/// Implementors must serialize canonically: any field whose order is not
/// semantically meaningful has to be a sorted collection (`BTreeSet`,
/// `BTreeMap`) so that set-equal configurations serialize identically.
pub trait Hashable: Serialize {
  fn compute_signature(&self) -> Result<Signature, HashError> {
    let serialized = serde_json::to_string(self)?;
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    let full = format!("{:x}", hasher.finalize());
    Ok(Signature(full[..SIGNATURE_LEN].to_string()))
  }
}
