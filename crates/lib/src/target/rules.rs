//! Rules that turn BUILD files into targets and resolve addresses.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::{Addresses, BuildConfiguration, DependenciesField, SourcesField, SourcesPaths, Target, TargetError, Targets};
use crate::address::Address;
use crate::build_file::parse_targets;
use crate::engine::{Context, EngineError, Request, RuleRegistry};
use crate::store::PathGlobs;
use crate::store::rules::DigestContentsRequest;
use crate::util::paths;

/// Parse one BUILD file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildFileRequest {
  pub path: String,
}

impl Request for BuildFileRequest {
  type Output = Targets;
}

/// Every target in the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllTargetsRequest;

impl Request for AllTargetsRequest {
  type Output = Targets;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AddressSpec {
  /// Every target in the directory or below it.
  Descendant(String),
  /// Every target in the directory or any of its parents.
  Ascendant(String),
  /// Exactly this target; it must exist.
  Literal(Address),
}

/// Targets matching any of the given specs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressSpecs(pub Vec<AddressSpec>);

impl Request for AddressSpecs {
  type Output = Targets;
}

/// Look up a single target by address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WrappedTargetRequest(pub Address);

impl Request for WrappedTargetRequest {
  type Output = Target;
}

/// Resolve a sources field to the files it matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourcesPathsRequest(pub SourcesField);

impl Request for SourcesPathsRequest {
  type Output = SourcesPaths;
}

/// Address specs as written in a BUILD file, relative to the owning directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnparsedAddressInputs {
  pub specs: Vec<String>,
  pub relative_to: String,
}

impl Request for UnparsedAddressInputs {
  type Output = Targets;
}

/// Resolved dependency addresses of a field: explicit plus injected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependenciesRequest(pub DependenciesField);

impl Request for DependenciesRequest {
  type Output = Addresses;
}

pub fn register(registry: &mut RuleRegistry, config: Arc<BuildConfiguration>, build_patterns: Arc<Vec<String>>) {
  registry
    .rule(move |ctx: Context, request: BuildFileRequest| parse_build_file(ctx, request, config.clone()))
    .rule(move |ctx: Context, _: AllTargetsRequest| all_targets(ctx, build_patterns.clone()))
    .rule(resolve_address_specs)
    .rule(resolve_target)
    .rule(resolve_sources_paths)
    .rule(resolve_unparsed_addresses);
}

async fn parse_build_file(
  ctx: Context,
  request: BuildFileRequest,
  config: Arc<BuildConfiguration>,
) -> Result<Targets, EngineError> {
  let path = request.path;
  let contents = ctx.get(DigestContentsRequest(PathGlobs::literal([&path]))).await?;
  let Some(file) = contents.get(&path) else {
    return Ok(Targets::default());
  };
  let targets = parse_targets(&path, file.text()?, &config)?;
  Ok(Targets::new(targets))
}

async fn all_targets(ctx: Context, build_patterns: Arc<Vec<String>>) -> Result<Targets, EngineError> {
  let globs = PathGlobs::new(build_patterns.iter().map(|p| format!("**/{p}")));
  let build_files = ctx.get(globs).await?.files;
  let parsed = ctx
    .get_many(build_files.iter().map(|path| BuildFileRequest { path: path.clone() }))
    .await?;

  let mut owners: BTreeMap<Address, &str> = BTreeMap::new();
  let mut all = Vec::new();
  for (path, targets) in build_files.iter().zip(&parsed) {
    for target in targets.iter() {
      if let Some(first) = owners.insert(target.address.clone(), path.as_str()) {
        return Err(
          TargetError::DuplicateAddress {
            address: target.address.spec(),
            first: first.to_string(),
            second: path.clone(),
          }
          .into(),
        );
      }
      all.push(target.clone());
    }
  }

  debug!(build_files = build_files.len(), targets = all.len(), "loaded targets");
  Ok(Targets::new(all))
}

async fn resolve_address_specs(ctx: Context, AddressSpecs(specs): AddressSpecs) -> Result<Targets, EngineError> {
  let all = ctx.get(AllTargetsRequest).await?;
  let mut selected = Vec::new();
  for spec in &specs {
    match spec {
      AddressSpec::Descendant(dir) => selected.extend(
        all
          .iter()
          .filter(|t| paths::is_ancestor_or_self(dir, &t.address.path))
          .cloned(),
      ),
      AddressSpec::Ascendant(dir) => selected.extend(
        all
          .iter()
          .filter(|t| paths::is_ancestor_or_self(&t.address.path, dir))
          .cloned(),
      ),
      AddressSpec::Literal(address) => {
        let target = all
          .get(address)
          .ok_or_else(|| TargetError::UnknownAddress(address.spec()))?;
        selected.push(target.clone());
      }
    }
  }
  Ok(Targets::new(selected))
}

async fn resolve_target(ctx: Context, WrappedTargetRequest(address): WrappedTargetRequest) -> Result<Target, EngineError> {
  let all = ctx.get(AllTargetsRequest).await?;
  let target = all
    .get(&address)
    .ok_or_else(|| TargetError::UnknownAddress(address.spec()))?;
  Ok(target.clone())
}

async fn resolve_sources_paths(
  ctx: Context,
  SourcesPathsRequest(field): SourcesPathsRequest,
) -> Result<SourcesPaths, EngineError> {
  let globs = field.path_globs();
  if globs.is_empty() {
    return Ok(SourcesPaths::default());
  }
  let files = ctx.get(globs).await?.files;
  let mut dirs: Vec<String> = files.iter().map(|f| paths::dirname(f).to_string()).collect();
  dirs.sort();
  dirs.dedup();
  Ok(SourcesPaths { files, dirs })
}

async fn resolve_unparsed_addresses(ctx: Context, inputs: UnparsedAddressInputs) -> Result<Targets, EngineError> {
  let addresses = inputs
    .specs
    .iter()
    .map(|spec| Address::parse(spec, &inputs.relative_to))
    .collect::<Result<Vec<_>, _>>()
    .map_err(TargetError::from)?;
  let targets = ctx.get_many(addresses.into_iter().map(WrappedTargetRequest)).await?;
  Ok(Targets::new(targets))
}
