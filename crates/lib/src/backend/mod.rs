//! Bundled backends.
//!
//! A backend contributes target types and macros to the
//! [`BuildConfiguration`] and rules to the [`RuleRegistry`]: tailor detectors
//! as members of [`PutativeTargetsRequest`](crate::tailor::PutativeTargetsRequest)
//! and dependency injectors as members of
//! [`InjectDependenciesRequest`](crate::inject::InjectDependenciesRequest).
//!
//! # Submodules
//!
//! - [`docker`] - `docker_image` targets and Dockerfile dependency injection
//! - [`python`] - python libraries, tests, binaries and requirements
//! - [`shell`] - shell libraries and shunit2 tests

pub mod docker;
pub mod python;
pub mod shell;

use std::collections::BTreeMap;

use futures::future::try_join;
use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::engine::{Context, EngineError, RuleRegistry};
use crate::store::PathGlobs;
use crate::tailor::{AllOwnedSourcesRequest, PutativeTargetsSearchPaths};
use crate::target::{BuildConfiguration, TargetType};
use crate::util::paths;

/// Per-backend settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendOptions {
  /// Whether the backend's tailor detector runs.
  pub tailor: bool,
}

impl Default for BackendOptions {
  fn default() -> Self {
    Self { tailor: true }
  }
}

/// Target types every build understands.
pub fn register_core(build: &mut BuildConfiguration) {
  build
    .register_target_type(TargetType::new("target").with_dependencies("dependencies"))
    .register_target_type(
      TargetType::new("files")
        .with_sources(Vec::<String>::new())
        .with_dependencies("dependencies"),
    );
}

pub fn register_all(
  build: &mut BuildConfiguration,
  registry: &mut RuleRegistry,
  python: BackendOptions,
  shell: BackendOptions,
  docker: BackendOptions,
) {
  register_core(build);
  python::register(build, registry, python);
  shell::register(build, registry, shell);
  docker::register(build, registry, docker);
}

/// Files under the search paths matching any of `filename_globs` that no
/// existing target owns, sorted.
pub(crate) async fn unowned_files(
  ctx: &Context,
  search_paths: &PutativeTargetsSearchPaths,
  filename_globs: &[&str],
) -> Result<Vec<String>, EngineError> {
  let globs = PathGlobs::new(
    filename_globs
      .iter()
      .flat_map(|glob| search_paths.path_globs(glob).globs),
  );
  let (found, owned) = try_join(ctx.get(globs), ctx.get(AllOwnedSourcesRequest)).await?;
  Ok(found.files.into_iter().filter(|f| !owned.contains(f)).collect())
}

/// Group paths by directory, keeping only file names.
pub(crate) fn group_by_dir(files: &[String]) -> BTreeMap<String, Vec<String>> {
  let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
  for file in files {
    let (dir, name) = paths::split(file);
    grouped.entry(dir.to_string()).or_default().push(name.to_string());
  }
  for names in grouped.values_mut() {
    names.sort();
    names.dedup();
  }
  grouped
}

/// Whether the file name `name` matches any of the glob `patterns`.
pub(crate) fn matches_any(name: &str, patterns: &[&str]) -> bool {
  patterns
    .iter()
    .any(|pattern| Pattern::new(pattern).is_ok_and(|p| p.matches(name)))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn grouping_by_directory() {
    let files = vec!["a.py".to_string(), "src/b.py".to_string(), "src/a.py".to_string()];
    let grouped = group_by_dir(&files);
    assert_eq!(grouped[""], vec!["a.py"]);
    assert_eq!(grouped["src"], vec!["a.py", "b.py"]);
  }

  #[test]
  fn file_name_patterns() {
    assert!(matches_any("test_x.py", &["test_*.py"]));
    assert!(matches_any("x_test.py", &["test_*.py", "*_test.py"]));
    assert!(matches_any("conftest.py", &["conftest.py"]));
    assert!(!matches_any("x.py", &["test_*.py", "*_test.py"]));
    assert!(!matches_any("test_x.sh", &["test_*.py"]));
  }

  #[test]
  fn backend_options_default_to_enabled() {
    let options: BackendOptions = toml::from_str("").unwrap();
    assert!(options.tailor);
  }
}
