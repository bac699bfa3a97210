//! Hashing utilities for the content-addressed store.
//!
//! This module provides:
//! - `ContentHash`: a full 64-character SHA-256 hash
//! - `hash_bytes()`: arbitrary byte hashing
//! - `hash_tree()`: deterministic hashing of an in-memory file tree

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A full 64-character SHA-256 hash, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}

/// Compute a deterministic hash of a file tree given as `(path, content)` pairs.
///
/// The hash covers relative paths and file contents, never metadata. Entries are
/// sorted by path first, so callers may pass them in any order.
pub fn hash_tree<'a>(files: impl IntoIterator<Item = (&'a str, &'a [u8])>) -> ContentHash {
  let mut entries: Vec<String> = files
    .into_iter()
    .map(|(path, content)| format!("F:{}:{}", path, hash_bytes(content).0))
    .collect();
  entries.sort();

  let mut hasher = Sha256::new();
  for entry in entries {
    hasher.update(entry.as_bytes());
    hasher.update(b"\n");
  }

  ContentHash(hex::encode(hasher.finalize()))
}
