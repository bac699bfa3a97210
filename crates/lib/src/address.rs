//! Target addresses.
//!
//! An address is a directory relative to the build root plus a target name.
//! Its spec form is `path:name`; targets in the root directory are written
//! `:name`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::paths;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
  #[error("empty address spec")]
  Empty,

  #[error("invalid address '{spec}': {message}")]
  Invalid { spec: String, message: String },
}

/// Identifies a target: `(path, name)`. Ordered by path, then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address {
  pub path: String,
  pub name: String,
}

impl Address {
  pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      path: path.into(),
      name: name.into(),
    }
  }

  /// The `path:name` form. Root targets render as `:name`.
  pub fn spec(&self) -> String {
    format!("{}:{}", self.path, self.name)
  }

  /// Parse an address spec.
  ///
  /// Accepts `path:name`, `:name` (resolved against `relative_to`) and a bare
  /// `path`, whose name defaults to the last path component. A leading `//` is
  /// tolerated and ignored.
  pub fn parse(spec: &str, relative_to: &str) -> Result<Self, AddressError> {
    let raw = spec.trim();
    if raw.is_empty() {
      return Err(AddressError::Empty);
    }
    let invalid = |message: &str| AddressError::Invalid {
      spec: spec.to_string(),
      message: message.to_string(),
    };
    let trimmed = raw.strip_prefix("//").unwrap_or(raw);

    let (path, name) = match trimmed.split_once(':') {
      Some(("", name)) => (relative_to.to_string(), name.to_string()),
      Some((path, name)) => (path.trim_end_matches('/').to_string(), name.to_string()),
      None => {
        let path = trimmed.trim_end_matches('/');
        if path.is_empty() {
          return Err(invalid("a bare path must name a directory"));
        }
        (path.to_string(), paths::basename(path).to_string())
      }
    };

    if name.is_empty() {
      return Err(invalid("target name is empty"));
    }
    if name.contains(['/', ':']) {
      return Err(invalid("target name may not contain '/' or ':'"));
    }
    if path.starts_with('/') {
      return Err(invalid("path must be relative to the build root"));
    }
    if path.split('/').any(|c| c == ".." || c == ".") {
      return Err(invalid("path must be normalized"));
    }
    Ok(Self { path, name })
  }
}

impl std::fmt::Display for Address {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}:{}", self.path, self.name)
  }
}
