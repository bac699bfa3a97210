//! The on-disk build root.
//!
//! Reads go through glob matching and land in the [`Store`]; writes take a
//! digest from the store and materialize it under the root. Each file is written
//! to a temporary sibling and renamed into place so that a reader never sees a
//! half-written file.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use super::Store;
use super::globs::GlobMatcher;
use super::types::{Digest, FileContent, PathGlobs, Paths, Snapshot, StoreError};

/// A view of the build root on disk.
#[derive(Debug, Clone)]
pub struct Workspace {
  root: PathBuf,
}

impl Workspace {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Whether a build-root relative path is an existing directory.
  pub fn is_dir(&self, relative: &str) -> bool {
    self.root.join(relative).is_dir()
  }

  /// Find the files and directories matching `globs`.
  ///
  /// Only the directories under each glob's literal prefix are walked.
  pub fn paths(&self, globs: &PathGlobs) -> Result<Paths, StoreError> {
    let matcher = GlobMatcher::new(&globs.globs)?;
    let mut result = Paths::default();

    for root in matcher.walk_roots() {
      if root.dir.split('/').any(|c| c.starts_with('.')) || root.dir == "dist" || root.dir.starts_with("dist/") {
        continue;
      }
      let start = self.root.join(&root.dir);
      if !start.is_dir() {
        continue;
      }

      let mut walker = WalkDir::new(&start).sort_by_file_name();
      if let Some(depth) = root.max_depth {
        walker = walker.max_depth(depth);
      }
      let walker = walker
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_ignored(&self.root, e));

      for entry in walker {
        let entry = entry.map_err(|e| StoreError::Walk {
          path: start.display().to_string(),
          message: e.to_string(),
        })?;
        if entry.depth() == 0 {
          continue;
        }
        let Some(relative) = relative_path(&self.root, entry.path()) else {
          continue;
        };
        if !matcher.matches(&relative) {
          continue;
        }
        if entry.file_type().is_dir() {
          result.dirs.push(relative);
        } else if entry.file_type().is_file() {
          result.files.push(relative);
        }
      }
    }

    result.files.sort();
    result.files.dedup();
    result.dirs.sort();
    result.dirs.dedup();
    Ok(result)
  }

  /// Read the files matching `globs` into the store.
  pub fn snapshot(&self, globs: &PathGlobs, store: &Store) -> Result<Snapshot, StoreError> {
    let paths = self.paths(globs)?;
    let mut files = Vec::with_capacity(paths.files.len());
    for path in &paths.files {
      let content = fs::read(self.root.join(path)).map_err(|e| StoreError::Read {
        path: path.clone(),
        message: e.to_string(),
      })?;
      files.push(FileContent::new(path.clone(), content));
    }
    let digest = store.create_digest(files)?;
    debug!(files = paths.files.len(), digest = %digest, "captured snapshot");
    Ok(Snapshot {
      digest,
      files: paths.files,
      dirs: paths.dirs,
    })
  }

  /// Materialize a digest under the build root, returning the written paths.
  pub fn write_digest(&self, digest: &Digest, store: &Store) -> Result<Vec<PathBuf>, StoreError> {
    let contents = store.contents(digest)?;
    let mut written = Vec::with_capacity(contents.len());

    for file in contents.iter() {
      let target = self.root.join(&file.path);
      let write_err = |e: std::io::Error| StoreError::Write {
        path: file.path.clone(),
        message: e.to_string(),
      };
      if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
      }
      let temp = temp_sibling(&target);
      fs::write(&temp, &file.content).map_err(write_err)?;
      fs::rename(&temp, &target).map_err(write_err)?;
      written.push(target);
    }

    info!(files = written.len(), digest = %digest, "wrote digest to workspace");
    Ok(written)
  }
}

/// Hidden directories anywhere and the build root's `dist` output directory.
fn is_ignored(root: &Path, entry: &DirEntry) -> bool {
  if !entry.file_type().is_dir() {
    return false;
  }
  let Some(name) = entry.file_name().to_str() else {
    return false;
  };
  name.starts_with('.') || (name == "dist" && entry.path().parent() == Some(root))
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
  let relative = path.strip_prefix(root).ok()?;
  let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
  Some(parts?.join("/"))
}

fn temp_sibling(path: &Path) -> PathBuf {
  let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
  name.push(".tmp");
  path.with_file_name(name)
}
