//! Shell: `shell_library` and `shunit2_tests`.

use std::collections::BTreeMap;

use tracing::debug;

use super::{BackendOptions, group_by_dir, matches_any, unowned_files};
use crate::engine::{Context, EngineError, Request, RuleRegistry, UnionMember};
use crate::tailor::{PutativeTarget, PutativeTargets, PutativeTargetsRequest, PutativeTargetsSearchPaths};
use crate::target::{BuildConfiguration, FieldValue, TargetType};
use crate::util::paths;

pub const DEPENDENCIES_KIND: &str = "shell_dependencies";

const TEST_PATTERNS: [&str; 2] = ["*_test.sh", "test_*.sh"];

pub fn library_type() -> TargetType {
  TargetType::new("shell_library")
    .with_sources(["*.sh", "!*_test.sh", "!test_*.sh"])
    .with_dependencies(DEPENDENCIES_KIND)
}

pub fn tests_type() -> TargetType {
  TargetType::new("shunit2_tests")
    .with_sources(TEST_PATTERNS)
    .with_dependencies(DEPENDENCIES_KIND)
    .with_field("shell")
    .with_field("timeout")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PutativeShellTargetsRequest(pub PutativeTargetsSearchPaths);

impl Request for PutativeShellTargetsRequest {
  type Output = PutativeTargets;
}

impl UnionMember<PutativeTargetsRequest> for PutativeShellTargetsRequest {
  fn from_input(input: PutativeTargetsSearchPaths) -> Self {
    Self(input)
  }
}

pub fn register(build: &mut BuildConfiguration, registry: &mut RuleRegistry, options: BackendOptions) {
  build
    .register_target_type(library_type())
    .register_target_type(tests_type());

  registry
    .rule(move |ctx: Context, request: PutativeShellTargetsRequest| find_putative_targets(ctx, request, options))
    .union_member::<PutativeTargetsRequest, PutativeShellTargetsRequest>();
}

fn is_test_file(name: &str) -> bool {
  matches_any(name, &TEST_PATTERNS)
}

async fn find_putative_targets(
  ctx: Context,
  PutativeShellTargetsRequest(search_paths): PutativeShellTargetsRequest,
  options: BackendOptions,
) -> Result<PutativeTargets, EngineError> {
  if !options.tailor {
    return Ok(PutativeTargets::default());
  }

  let unowned = unowned_files(&ctx, &search_paths, &["*.sh"]).await?;
  let library = library_type();
  let tests = tests_type();
  let mut ptgts = Vec::new();
  for (dir, files) in group_by_dir(&unowned) {
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

  debug!(proposed = ptgts.len(), "shell putative targets");
  Ok(PutativeTargets::new(ptgts))
}
