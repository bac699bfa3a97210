//! Value types exchanged with the content-addressed store.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::hash::{ContentHash, hash_tree};

/// Errors raised by the store and workspace.
///
/// I/O failures keep only their message so the error stays cloneable: a failed
/// computation is delivered to every awaiter of the same request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
  #[error("invalid glob '{glob}': {message}")]
  InvalidGlob { glob: String, message: String },

  #[error("invalid path '{path}': {message}")]
  InvalidPath { path: String, message: String },

  #[error("conflicting contents for '{path}' in the same digest")]
  DuplicatePath { path: String },

  #[error("unknown digest {0}")]
  UnknownDigest(String),

  #[error("failed to walk {path}: {message}")]
  Walk { path: String, message: String },

  #[error("failed to read {path}: {message}")]
  Read { path: String, message: String },

  #[error("failed to write {path}: {message}")]
  Write { path: String, message: String },

  #[error("{path} is not valid UTF-8")]
  NotUtf8 { path: String },
}

/// Identifies an immutable file tree in the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Digest {
  pub fingerprint: ContentHash,
  pub size_bytes: usize,
}

impl Digest {
  /// Compute the digest of a set of files. Identical trees always produce
  /// identical digests regardless of input order.
  pub fn of(files: &[FileContent]) -> Self {
    Self {
      fingerprint: hash_tree(files.iter().map(|f| (f.path.as_str(), f.content.as_slice()))),
      size_bytes: files.iter().map(|f| f.content.len()).sum(),
    }
  }

  pub fn empty() -> Self {
    Self::of(&[])
  }
}

impl std::fmt::Display for Digest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}/{}", self.fingerprint, self.size_bytes)
  }
}

/// A single file in a tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileContent {
  pub path: String,
  pub content: Vec<u8>,
}

impl FileContent {
  pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
    Self {
      path: path.into(),
      content: content.into(),
    }
  }

  pub fn text(&self) -> Result<&str, StoreError> {
    std::str::from_utf8(&self.content).map_err(|_| StoreError::NotUtf8 { path: self.path.clone() })
  }
}

/// The materialized contents of a digest, sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DigestContents(pub Vec<FileContent>);

impl DigestContents {
  pub fn iter(&self) -> impl Iterator<Item = &FileContent> {
    self.0.iter()
  }

  pub fn get(&self, path: &str) -> Option<&FileContent> {
    self.0.iter().find(|f| f.path == path)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

/// A request to materialize a synthetic tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CreateDigest(pub Vec<FileContent>);

/// A set of globs relative to the build root.
///
/// `*` does not cross directory separators, `**` matches zero or more
/// directories and a leading `!` excludes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathGlobs {
  pub globs: Vec<String>,
}

impl PathGlobs {
  pub fn new<I, S>(globs: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      globs: globs.into_iter().map(Into::into).collect(),
    }
  }

  /// Globs that match exactly the given paths, escaping glob metacharacters.
  pub fn literal<I, S>(paths: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    Self {
      globs: paths.into_iter().map(|p| glob::Pattern::escape(p.as_ref())).collect(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.globs.iter().all(|g| g.starts_with('!'))
  }
}

/// Files and directories matched by a [`PathGlobs`], each sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Paths {
  pub files: Vec<String>,
  pub dirs: Vec<String>,
}

/// A digest plus the listing of what it contains.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Snapshot {
  pub digest: Digest,
  pub files: Vec<String>,
  pub dirs: Vec<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn digest_ignores_file_order() {
    let a = Digest::of(&[FileContent::new("a", "1"), FileContent::new("b", "2")]);
    let b = Digest::of(&[FileContent::new("b", "2"), FileContent::new("a", "1")]);
    assert_eq!(a, b);
    assert_eq!(a.size_bytes, 2);
  }

  #[test]
  fn literal_globs_escape_metacharacters() {
    let globs = PathGlobs::literal(["src/[x]/BUILD"]);
    assert_eq!(globs.globs, vec!["src/[[]x[]]/BUILD".to_string()]);
  }

  #[test]
  fn exclude_only_globs_are_empty() {
    assert!(PathGlobs::new(["!*.py"]).is_empty());
    assert!(PathGlobs::default().is_empty());
    assert!(!PathGlobs::new(["*.py"]).is_empty());
  }
}
