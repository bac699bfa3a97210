//! Docker: `docker_image` targets.
//!
//! # Submodules
//!
//! - [`dependencies`] - dependencies injected from `COPY` instructions
//! - [`parser`] - Dockerfile scanning

pub mod dependencies;
pub mod parser;

use tracing::debug;

use self::dependencies::{InjectDockerDependencies, inject_docker_dependencies};
use self::parser::parse_dockerfile;
use super::{BackendOptions, unowned_files};
use crate::engine::{Context, EngineError, Request, RuleRegistry, UnionMember};
use crate::inject::InjectDependenciesRequest;
use crate::tailor::{PutativeTarget, PutativeTargets, PutativeTargetsRequest, PutativeTargetsSearchPaths};
use crate::target::{BuildConfiguration, TargetType};
use crate::util::paths;

pub const DEPENDENCIES_KIND: &str = "docker_image_dependencies";

const DOCKERFILE: &str = "Dockerfile";

pub fn image_type() -> TargetType {
  TargetType::new("docker_image")
    .with_sources([DOCKERFILE])
    .with_dependencies(DEPENDENCIES_KIND)
    .with_field("image_tags")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PutativeDockerTargetsRequest(pub PutativeTargetsSearchPaths);

impl Request for PutativeDockerTargetsRequest {
  type Output = PutativeTargets;
}

impl UnionMember<PutativeTargetsRequest> for PutativeDockerTargetsRequest {
  fn from_input(input: PutativeTargetsSearchPaths) -> Self {
    Self(input)
  }
}

pub fn register(build: &mut BuildConfiguration, registry: &mut RuleRegistry, options: BackendOptions) {
  build.register_target_type(image_type());

  registry
    .rule(parse_dockerfile)
    .rule(inject_docker_dependencies)
    .rule(move |ctx: Context, request: PutativeDockerTargetsRequest| find_putative_targets(ctx, request, options))
    .union_member::<InjectDependenciesRequest, InjectDockerDependencies>()
    .union_member::<PutativeTargetsRequest, PutativeDockerTargetsRequest>();
}

async fn find_putative_targets(
  ctx: Context,
  PutativeDockerTargetsRequest(search_paths): PutativeDockerTargetsRequest,
  options: BackendOptions,
) -> Result<PutativeTargets, EngineError> {
  if !options.tailor {
    return Ok(PutativeTargets::default());
  }

  let image = image_type();
  let mut ptgts = Vec::new();
  for file in unowned_files(&ctx, &search_paths, &[DOCKERFILE]).await? {
    let (dir, name) = paths::split(&file);
    ptgts.push(PutativeTarget::for_target_type(
      &image,
      dir,
      paths::basename(dir),
      [name],
      Default::default(),
    )?);
  }

  debug!(proposed = ptgts.len(), "docker putative targets");
  Ok(PutativeTargets::new(ptgts))
}
