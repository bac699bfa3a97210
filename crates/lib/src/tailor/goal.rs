//! The tailor goal: validate arguments, compute edits, write them once.

use tracing::info;

use super::{AddedTarget, PutativeTargetsSearchPaths, TailorError, TailorOptions, TailorReport, TailorRequest};
use crate::engine::{EngineError, Session};
use crate::store::{Store, Workspace};
use crate::util::paths;

/// Turn command-line arguments into search directories.
///
/// Every argument must name an existing directory relative to the build root;
/// `.`, `./x` and trailing slashes are normalized. No arguments means the whole
/// repository.
pub fn validate_search_roots(workspace: &Workspace, args: &[String]) -> Result<PutativeTargetsSearchPaths, TailorError> {
  if args.is_empty() {
    return Ok(PutativeTargetsSearchPaths::all());
  }

  let mut dirs = Vec::with_capacity(args.len());
  let mut invalid = Vec::new();
  for arg in args {
    let dir = paths::normalize_dir(arg);
    let looks_like_dir = !dir.contains([':', '*', '?', '[', ']', '!'])
      && !dir.starts_with('/')
      && !dir.split('/').any(|c| c == "..");
    if looks_like_dir && (dir.is_empty() || workspace.is_dir(&dir)) {
      dirs.push(dir);
    } else {
      invalid.push(arg.clone());
    }
  }

  if !invalid.is_empty() {
    return Err(TailorError::InvalidSearchRoots(invalid));
  }
  dirs.sort();
  dirs.dedup();
  Ok(PutativeTargetsSearchPaths::new(dirs))
}

/// Run tailor in `session`. When `write` is set the edits are materialized in
/// the workspace, exactly once and only after everything else succeeded.
pub async fn run(
  session: &Session,
  workspace: &Workspace,
  store: &Store,
  search_paths: PutativeTargetsSearchPaths,
  options: TailorOptions,
  write: bool,
) -> Result<TailorReport, EngineError> {
  let outcome = session.execute(TailorRequest { search_paths, options }).await?;
  let Some(edited) = outcome.edited else {
    return Ok(TailorReport::default());
  };

  let added = edited
    .by_build_file
    .iter()
    .flat_map(|(build_file, ptgts)| {
      ptgts.iter().map(move |ptgt| AddedTarget {
        build_file: build_file.clone(),
        type_alias: ptgt.type_alias.clone(),
        name: ptgt.name.clone(),
      })
    })
    .collect();

  if write {
    workspace.write_digest(&edited.digest, store)?;
  }
  info!(
    created = edited.created.len(),
    updated = edited.updated.len(),
    written = write,
    "tailor finished"
  );

  Ok(TailorReport {
    created: edited.created,
    updated: edited.updated,
    added,
    written: write,
  })
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::*;

  fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
  }

  #[test]
  fn empty_args_search_everything() {
    let temp = tempdir().unwrap();
    let ws = Workspace::new(temp.path());
    assert_eq!(validate_search_roots(&ws, &[]).unwrap().dirs, vec![""]);
  }

  #[test]
  fn directories_are_normalized() {
    let temp = tempdir().unwrap();
    fs::create_dir_all(temp.path().join("src/python")).unwrap();
    let ws = Workspace::new(temp.path());

    let roots = validate_search_roots(&ws, &args(&["./src/python/", "src/python", "."])).unwrap();
    assert_eq!(roots.dirs, vec!["", "src/python"]);
  }

  #[test]
  fn non_directories_are_all_reported() {
    let temp = tempdir().unwrap();
    fs::create_dir_all(temp.path().join("src")).unwrap();
    fs::write(temp.path().join("src/a.py"), "").unwrap();
    let ws = Workspace::new(temp.path());

    let err = validate_search_roots(&ws, &args(&["src", "src/a.py", "src:lib", "src/*", "missing"])).unwrap_err();
    assert_eq!(
      err,
      TailorError::InvalidSearchRoots(args(&["src/a.py", "src:lib", "src/*", "missing"]))
    );
    assert!(err.to_string().contains("src/a.py, src:lib, src/*, missing"));
  }
}
