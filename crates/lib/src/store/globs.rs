//! Glob matching over build-root relative paths.

use std::collections::BTreeMap;

use glob::{MatchOptions, Pattern};

use super::types::StoreError;
use crate::util::paths;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
  case_sensitive: true,
  require_literal_separator: true,
  require_literal_leading_dot: false,
};

/// A directory a walk for some include globs starts from, relative to the
/// build root, and how deep below it those globs can reach. `None` means
/// unbounded (`**`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkRoot {
  pub dir: String,
  pub max_depth: Option<usize>,
}

/// A compiled set of include and exclude globs.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
  includes: Vec<Pattern>,
  excludes: Vec<Pattern>,
}

impl GlobMatcher {
  pub fn new(globs: &[String]) -> Result<Self, StoreError> {
    let mut includes = Vec::new();
    let mut excludes = Vec::new();

    for raw in globs {
      let (negated, glob) = match raw.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, raw.as_str()),
      };
      let glob = validate(raw, glob)?;
      let pattern = Pattern::new(glob).map_err(|e| StoreError::InvalidGlob {
        glob: raw.clone(),
        message: e.to_string(),
      })?;
      if negated {
        excludes.push(pattern);
      } else {
        includes.push(pattern);
      }
    }

    Ok(Self { includes, excludes })
  }

  pub fn matches(&self, path: &str) -> bool {
    self.includes.iter().any(|p| p.matches_with(path, MATCH_OPTIONS))
      && !self.excludes.iter().any(|p| p.matches_with(path, MATCH_OPTIONS))
  }

  /// The directories a walk needs to visit to find every include match.
  ///
  /// Each include starts at its leading components free of glob syntax.
  /// Roots under an unbounded root are dropped; bounded overlaps remain and
  /// may yield the same path twice.
  pub fn walk_roots(&self) -> Vec<WalkRoot> {
    let mut roots: BTreeMap<String, Option<usize>> = BTreeMap::new();
    for pattern in &self.includes {
      let root = walk_root(pattern.as_str());
      roots
        .entry(root.dir)
        .and_modify(|depth| *depth = deeper(*depth, root.max_depth))
        .or_insert(root.max_depth);
    }

    let unbounded: Vec<String> = roots
      .iter()
      .filter(|(_, depth)| depth.is_none())
      .map(|(dir, _)| dir.clone())
      .collect();
    roots
      .into_iter()
      .filter(|(dir, _)| !unbounded.iter().any(|u| u != dir && paths::is_ancestor_or_self(u, dir)))
      .map(|(dir, max_depth)| WalkRoot { dir, max_depth })
      .collect()
  }
}

fn walk_root(glob: &str) -> WalkRoot {
  let components: Vec<&str> = glob.split('/').collect();
  // The last component may name a file, so it never becomes part of the root.
  let literal = components[..components.len() - 1]
    .iter()
    .take_while(|c| !c.is_empty() && !c.contains(['*', '?', '[', ']']))
    .count();
  let rest = &components[literal..];
  WalkRoot {
    dir: components[..literal].join("/"),
    max_depth: if rest.iter().any(|c| c.contains("**")) { None } else { Some(rest.len()) },
  }
}

fn deeper(a: Option<usize>, b: Option<usize>) -> Option<usize> {
  match (a, b) {
    (Some(a), Some(b)) => Some(a.max(b)),
    _ => None,
  }
}

fn validate<'a>(raw: &str, glob: &'a str) -> Result<&'a str, StoreError> {
  let glob = glob.strip_prefix("./").unwrap_or(glob);
  if glob.starts_with('/') {
    return Err(StoreError::InvalidGlob {
      glob: raw.to_string(),
      message: "globs must be relative to the build root".to_string(),
    });
  }
  if glob.split('/').any(|c| c == "..") {
    return Err(StoreError::InvalidGlob {
      glob: raw.to_string(),
      message: "globs must not reference parent directories".to_string(),
    });
  }
  Ok(glob)
}

/// Anchor a target-relative source glob at the target's directory, keeping a
/// leading `!` in front.
pub fn prefix_glob_with_dirpath(dir: &str, glob: &str) -> String {
  match glob.strip_prefix('!') {
    Some(rest) => format!("!{}", paths::join(dir, rest)),
    None => paths::join(dir, glob),
  }
}
