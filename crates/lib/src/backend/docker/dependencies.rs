//! Dependencies a `docker_image` gets from the binaries its Dockerfile copies.

use tracing::debug;

use super::DEPENDENCIES_KIND;
use super::parser::DockerfileParseRequest;
use crate::address::Address;
use crate::engine::{Context, EngineError, Request};
use crate::inject::{InjectDependencies, InjectedDependencies};
use crate::target::DependenciesField;
use crate::target::rules::{AllTargetsRequest, WrappedTargetRequest};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InjectDockerDependencies(pub DependenciesField);

impl Request for InjectDockerDependencies {
  type Output = InjectedDependencies;
}

impl InjectDependencies for InjectDockerDependencies {
  const INJECT_FOR: &'static str = DEPENDENCIES_KIND;

  fn new(field: DependenciesField) -> Self {
    Self(field)
  }
}

/// Inspect the image's `COPY` instructions for known packageable targets.
///
/// Referenced addresses that no BUILD file defines are dropped, as are targets
/// that cannot be packaged into a binary.
pub(super) async fn inject_docker_dependencies(
  ctx: Context,
  InjectDockerDependencies(field): InjectDockerDependencies,
) -> Result<InjectedDependencies, EngineError> {
  let image = ctx.get(WrappedTargetRequest(field.address.clone())).await?;
  let Some(sources) = image.sources().filter(|s| !s.globs.is_empty()) else {
    return Ok(InjectedDependencies::default());
  };

  let dockerfile = ctx.get(DockerfileParseRequest(sources)).await?;
  if dockerfile.putative_target_addresses.is_empty() {
    return Ok(InjectedDependencies::default());
  }

  let all = ctx.get(AllTargetsRequest).await?;
  let mut injected = Vec::new();
  for spec in &dockerfile.putative_target_addresses {
    let Ok(address) = Address::parse(spec, "") else {
      debug!(spec = %spec, "skipping unparseable reference");
      continue;
    };
    match all.get(&address) {
      Some(target) if target.has_field("entry_point") => injected.push(address),
      Some(_) => {}
      None => debug!(address = %address, "Dockerfile references an unknown target"),
    }
  }

  debug!(image = %field.address, injected = injected.len(), "injected docker dependencies");
  Ok(InjectedDependencies::new(injected))
}
