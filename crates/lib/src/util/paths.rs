//! Helpers for build-root relative paths.
//!
//! Paths inside the build graph are always `/`-separated and relative to the
//! build root. The root directory itself is the empty string.

/// Join a directory and a relative path. An empty directory is the build root.
pub fn join(dir: &str, name: &str) -> String {
  if dir.is_empty() {
    name.to_string()
  } else if name.is_empty() {
    dir.to_string()
  } else {
    format!("{}/{}", dir.trim_end_matches('/'), name)
  }
}

/// Split a path into `(dirname, filename)`.
pub fn split(path: &str) -> (&str, &str) {
  match path.rfind('/') {
    Some(idx) => (&path[..idx], &path[idx + 1..]),
    None => ("", path),
  }
}

pub fn dirname(path: &str) -> &str {
  split(path).0
}

pub fn basename(path: &str) -> &str {
  split(path).1
}

/// Whether `ancestor` is `dir` itself or one of its parent directories.
pub fn is_ancestor_or_self(ancestor: &str, dir: &str) -> bool {
  ancestor.is_empty() || dir == ancestor || dir.strip_prefix(ancestor).is_some_and(|rest| rest.starts_with('/'))
}

/// Normalize a user-supplied relative directory: strips `./` prefixes and
/// trailing slashes, and maps `.` to the root.
pub fn normalize_dir(dir: &str) -> String {
  let mut dir = dir.trim();
  while let Some(rest) = dir.strip_prefix("./") {
    dir = rest;
  }
  let dir = dir.trim_end_matches('/');
  if dir == "." { String::new() } else { dir.to_string() }
}
