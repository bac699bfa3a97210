//! Python: libraries, tests, binaries and requirements files.

use std::collections::BTreeMap;

use tracing::debug;

use super::{BackendOptions, group_by_dir, matches_any, unowned_files};
use crate::build_file::Call;
use crate::engine::{Context, EngineError, Request, RuleRegistry, UnionMember};
use crate::tailor::{PutativeTarget, PutativeTargets, PutativeTargetsRequest, PutativeTargetsSearchPaths};
use crate::target::{BuildConfiguration, FieldValue, TargetType};
use crate::util::paths;

pub const DEPENDENCIES_KIND: &str = "python_dependencies";

const TEST_PATTERNS: [&str; 3] = ["test_*.py", "*_test.py", "conftest.py"];
const REQUIREMENTS_FILE: &str = "requirements.txt";

pub fn library_type() -> TargetType {
  TargetType::new("python_library")
    .with_sources(["*.py", "!test_*.py", "!*_test.py", "!conftest.py"])
    .with_dependencies(DEPENDENCIES_KIND)
}

pub fn tests_type() -> TargetType {
  TargetType::new("python_tests")
    .with_sources(TEST_PATTERNS)
    .with_dependencies(DEPENDENCIES_KIND)
    .with_field("timeout")
}

pub fn binary_type() -> TargetType {
  TargetType::new("pex_binary")
    .with_dependencies(DEPENDENCIES_KIND)
    .with_field("entry_point")
}

fn requirements_file_type() -> TargetType {
  TargetType::new("_python_requirements_file").with_sources(Vec::<String>::new())
}

/// `python_requirements(requirements_relpath="requirements.txt")` owns one
/// requirements file through a generated `_python_requirements_file` target.
fn expand_requirements(_dir: &str, call: &Call) -> Result<Vec<Call>, String> {
  let relpath = match call.kwargs.get("requirements_relpath") {
    None => REQUIREMENTS_FILE,
    Some(FieldValue::Str(relpath)) => relpath.as_str(),
    Some(_) => return Err("requirements_relpath must be a string".to_string()),
  };
  if let Some(unknown) = call.kwargs.keys().find(|k| k.as_str() != "requirements_relpath") {
    return Err(format!("unexpected argument {unknown}"));
  }
  Ok(vec![
    Call::new("_python_requirements_file")
      .with_kwarg("name", FieldValue::Str(relpath.to_string()))
      .with_kwarg("sources", FieldValue::list([relpath])),
  ])
}

/// Tailor detector for python sources and requirements files.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PutativePythonTargetsRequest(pub PutativeTargetsSearchPaths);

impl Request for PutativePythonTargetsRequest {
  type Output = PutativeTargets;
}

impl UnionMember<PutativeTargetsRequest> for PutativePythonTargetsRequest {
  fn from_input(input: PutativeTargetsSearchPaths) -> Self {
    Self(input)
  }
}

pub fn register(build: &mut BuildConfiguration, registry: &mut RuleRegistry, options: BackendOptions) {
  build
    .register_target_type(library_type())
    .register_target_type(tests_type())
    .register_target_type(binary_type())
    .register_target_type(requirements_file_type())
    .register_macro("python_requirements", expand_requirements);

  registry
    .rule(move |ctx: Context, request: PutativePythonTargetsRequest| find_putative_targets(ctx, request, options))
    .union_member::<PutativeTargetsRequest, PutativePythonTargetsRequest>();
}

fn is_test_file(name: &str) -> bool {
  matches_any(name, &TEST_PATTERNS)
}

async fn find_putative_targets(
  ctx: Context,
  PutativePythonTargetsRequest(search_paths): PutativePythonTargetsRequest,
  options: BackendOptions,
) -> Result<PutativeTargets, EngineError> {
  if !options.tailor {
    return Ok(PutativeTargets::default());
  }

  let unowned = unowned_files(&ctx, &search_paths, &["*.py", REQUIREMENTS_FILE]).await?;
  let (requirements, sources): (Vec<String>, Vec<String>) = unowned
    .into_iter()
    .partition(|f| paths::basename(f) == REQUIREMENTS_FILE);

  let library = library_type();
  let tests = tests_type();
  let mut ptgts = Vec::new();
  for (dir, files) in group_by_dir(&sources) {
    let (test_files, lib_files): (Vec<String>, Vec<String>) = files.into_iter().partition(|f| is_test_file(f));
    if !lib_files.is_empty() {
      let name = paths::basename(&dir).to_string();
      ptgts.push(PutativeTarget::for_target_type(&library, &dir, name, lib_files, BTreeMap::new())?);
    }
    if !test_files.is_empty() {
      let kwargs = BTreeMap::from([("name".to_string(), FieldValue::Str("tests".to_string()))]);
      ptgts.push(PutativeTarget::for_target_type(&tests, &dir, "tests", test_files, kwargs)?);
    }
  }

  for file in &requirements {
    let (dir, name) = paths::split(file);
    ptgts.push(PutativeTarget::new(dir, name, "python_requirements", [name], [name]).non_addressable());
  }

  debug!(proposed = ptgts.len(), "python putative targets");
  Ok(PutativeTargets::new(ptgts))
}
