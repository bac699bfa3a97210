//! Content-addressed storage for file trees.
//!
//! The store keeps immutable trees keyed by [`Digest`]. It is append-only: a
//! digest, once stored, never changes, so concurrent readers need no
//! coordination beyond the map lock. The on-disk build root is reached through
//! [`Workspace`], which is also the only place that writes files.
//!
//! # Submodules
//!
//! - [`globs`] - glob matching over build-root relative paths
//! - [`rules`] - engine rules exposing the store to rule bodies
//! - [`workspace`] - reading and writing the build root

pub mod globs;
pub mod rules;
mod types;
pub mod workspace;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

pub use types::*;
pub use workspace::Workspace;

/// In-memory content-addressed store.
#[derive(Debug, Default)]
pub struct Store {
  objects: RwLock<HashMap<Digest, Arc<DigestContents>>>,
}

impl Store {
  pub fn new() -> Self {
    Self::default()
  }

  /// Store a synthetic tree and return its digest.
  ///
  /// Paths must be relative and may not repeat with different content.
  pub fn create_digest(&self, files: Vec<FileContent>) -> Result<Digest, StoreError> {
    let mut files = files;
    for file in &files {
      validate_path(&file.path)?;
    }
    files.sort();
    files.dedup();
    if let Some(pair) = files.windows(2).find(|pair| pair[0].path == pair[1].path) {
      return Err(StoreError::DuplicatePath {
        path: pair[0].path.clone(),
      });
    }

    let digest = Digest::of(&files);
    let mut objects = self.objects.write();
    objects
      .entry(digest.clone())
      .or_insert_with(|| Arc::new(DigestContents(files)));
    trace!(digest = %digest, objects = objects.len(), "stored digest");
    Ok(digest)
  }

  /// Read back the contents of a digest.
  pub fn contents(&self, digest: &Digest) -> Result<Arc<DigestContents>, StoreError> {
    if let Some(contents) = self.objects.read().get(digest) {
      return Ok(contents.clone());
    }
    if *digest == Digest::empty() {
      return Ok(Arc::new(DigestContents::default()));
    }
    Err(StoreError::UnknownDigest(digest.to_string()))
  }

  pub fn contains(&self, digest: &Digest) -> bool {
    self.objects.read().contains_key(digest)
  }

  pub fn len(&self) -> usize {
    self.objects.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

fn validate_path(path: &str) -> Result<(), StoreError> {
  let invalid = |message: &str| StoreError::InvalidPath {
    path: path.to_string(),
    message: message.to_string(),
  };
  if path.is_empty() {
    return Err(invalid("path is empty"));
  }
  if path.starts_with('/') {
    return Err(invalid("path must be relative"));
  }
  if path.split('/').any(|c| c.is_empty() || c == "." || c == "..") {
    return Err(invalid("path must be normalized"));
  }
  Ok(())
}
