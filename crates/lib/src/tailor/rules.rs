//! The rules behind the tailor goal.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, info};

use super::render::make_content_str;
use super::{
  AllOwnedSources, AllOwnedSourcesRequest, DisjointSourcePutativeTarget, EditBuildFilesRequest, EditedBuildFiles,
  PutativeTarget, PutativeTargets, PutativeTargetsRequest, TailorOutcome, TailorRequest, UniquelyNamedPutativeTargets,
};
use crate::engine::{Context, EngineError, Request, RuleRegistry, short_type_name};
use crate::store::globs::prefix_glob_with_dirpath;
use crate::store::rules::DigestContentsRequest;
use crate::store::{CreateDigest, FileContent, PathGlobs};
use crate::target::FieldValue;
use crate::target::rules::{AddressSpec, AddressSpecs, AllTargetsRequest, SourcesPathsRequest};
use crate::util::paths;

/// Suffix for a BUILD file whose preferred name is taken by a directory.
pub const ALTERNATE_BUILD_FILE_SUFFIX: &str = ".trellis";

impl Request for AllOwnedSourcesRequest {
  type Output = AllOwnedSources;
}

impl Request for PutativeTargets {
  type Output = UniquelyNamedPutativeTargets;
}

impl Request for PutativeTarget {
  type Output = DisjointSourcePutativeTarget;
}

impl Request for EditBuildFilesRequest {
  type Output = EditedBuildFiles;
}

impl Request for TailorRequest {
  type Output = TailorOutcome;
}

pub fn register(registry: &mut RuleRegistry) {
  registry
    .rule(determine_all_owned_sources)
    .rule(rename_conflicting_targets)
    .rule(restrict_conflicting_sources)
    .rule(edit_build_files)
    .rule(tailor);
}

async fn determine_all_owned_sources(ctx: Context, _: AllOwnedSourcesRequest) -> Result<AllOwnedSources, EngineError> {
  let all = ctx.get(AllTargetsRequest).await?;
  let fields = all.iter().filter_map(|t| t.sources()).map(SourcesPathsRequest);
  let sources = ctx.get_many(fields).await?;
  let owned = AllOwnedSources::new(sources.into_iter().flat_map(|s| s.files));
  debug!(targets = all.len(), files = owned.len(), "determined owned sources");
  Ok(owned)
}

/// Give every addressable putative target an address unused by existing
/// targets and by the other putative targets.
async fn rename_conflicting_targets(ctx: Context, ptgts: PutativeTargets) -> Result<UniquelyNamedPutativeTargets, EngineError> {
  let all = ctx.get(AllTargetsRequest).await?;
  let mut taken: HashSet<_> = all.addresses().into_iter().collect();
  let mut named = Vec::with_capacity(ptgts.len());

  for ptgt in ptgts {
    if !ptgt.addressable {
      named.push(ptgt);
      continue;
    }

    // Root-level targets cannot use the directory name as a default.
    let base = if ptgt.path.is_empty() && !ptgt.kwargs.contains_key("name") {
      ptgt.rename("root")
    } else {
      ptgt
    };

    let mut candidate = base.clone();
    let mut idx = 0;
    while taken.contains(&candidate.address()?) {
      candidate = base.rename(format!("{}{idx}", base.name));
      idx += 1;
    }
    taken.insert(candidate.address()?);
    named.push(candidate);
  }

  Ok(UniquelyNamedPutativeTargets(PutativeTargets::new(named)))
}

/// Restrict a putative target to its triggering sources when its owned globs
/// would also match files that existing targets own.
async fn restrict_conflicting_sources(ctx: Context, ptgt: PutativeTarget) -> Result<DisjointSourcePutativeTarget, EngineError> {
  if ptgt.owned_sources.is_empty() {
    return Ok(DisjointSourcePutativeTarget(ptgt));
  }

  let globs = PathGlobs::new(ptgt.owned_sources.iter().map(|g| prefix_glob_with_dirpath(&ptgt.path, g)));
  let source_paths: BTreeSet<String> = ctx.get(globs).await?.files.into_iter().collect();
  if source_paths.is_empty() {
    return Ok(DisjointSourcePutativeTarget(ptgt));
  }

  let source_dirs: BTreeSet<String> = source_paths.iter().map(|p| paths::dirname(p).to_string()).collect();
  let possible_owners = ctx
    .get(AddressSpecs(source_dirs.into_iter().map(AddressSpec::Ascendant).collect()))
    .await?;
  let owner_fields: Vec<_> = possible_owners.iter().filter_map(|t| t.sources()).collect();
  let owner_sources = ctx
    .get_many(owner_fields.iter().cloned().map(SourcesPathsRequest))
    .await?;

  let mut conflicting: Vec<String> = owner_fields
    .iter()
    .zip(&owner_sources)
    .filter(|(_, sources)| sources.files.iter().any(|f| source_paths.contains(f)))
    .map(|(field, _)| field.address.spec())
    .collect();
  if conflicting.is_empty() {
    return Ok(DisjointSourcePutativeTarget(ptgt));
  }
  conflicting.sort();

  let original = match ptgt.kwargs.get("sources") {
    Some(FieldValue::List(globs)) if !globs.is_empty() => format!("[{}]", globs.join(", ")),
    _ => format!("the default for {}", ptgt.type_alias),
  };
  let comments = std::iter::once(format!("# NOTE: Sources restricted from {original} due to conflict with"))
    .chain(conflicting.iter().map(|addr| format!("#   - {addr}")));

  debug!(path = %ptgt.path, name = %ptgt.name, conflicts = conflicting.len(), "restricted sources");
  Ok(DisjointSourcePutativeTarget(ptgt.restrict_sources().add_comments(comments)))
}

async fn edit_build_files(ctx: Context, req: EditBuildFilesRequest) -> Result<EditedBuildFiles, EngineError> {
  let mut grouped: BTreeMap<String, Vec<PutativeTarget>> = BTreeMap::new();
  for ptgt in req.putative_targets.iter() {
    grouped
      .entry(paths::join(&ptgt.path, &req.name))
      .or_default()
      .push(ptgt.clone());
  }

  // A directory may already sit where a BUILD file should go, e.g. on a
  // case-insensitive filesystem.
  let existing = ctx.get(PathGlobs::literal(grouped.keys())).await?;
  let by_build_file: BTreeMap<String, Vec<PutativeTarget>> = grouped
    .into_iter()
    .map(|(path, ptgts)| {
      if existing.dirs.contains(&path) {
        (format!("{path}{ALTERNATE_BUILD_FILE_SUFFIX}"), ptgts)
      } else {
        (path, ptgts)
      }
    })
    .collect();

  let contents = ctx
    .get(DigestContentsRequest(PathGlobs::literal(by_build_file.keys())))
    .await?;

  let mut files = Vec::with_capacity(by_build_file.len());
  let mut created = Vec::new();
  let mut updated = Vec::new();
  for (path, ptgts) in &by_build_file {
    let prefix = match contents.get(path) {
      Some(file) => {
        updated.push(path.clone());
        file.text()?
      }
      None => {
        created.push(path.clone());
        req.header.as_str()
      }
    };
    files.push(FileContent::new(path.clone(), make_content_str(prefix, &req.indent, ptgts)));
  }

  let digest = ctx.get(CreateDigest(files)).await?;
  Ok(EditedBuildFiles {
    digest,
    created,
    updated,
    by_build_file,
  })
}

async fn tailor(ctx: Context, req: TailorRequest) -> Result<TailorOutcome, EngineError> {
  if !ctx.has_union_members::<PutativeTargetsRequest>() {
    return Err(EngineError::NoUnionMembers(short_type_name::<PutativeTargetsRequest>()));
  }
  let TailorRequest { search_paths, options } = req;

  let detected = ctx.get_union::<PutativeTargetsRequest>(search_paths).await?;
  let putative = PutativeTargets::merge(detected)
    .into_iter()
    .map(|ptgt| {
      let alias = options.alias_for(&ptgt.type_alias).map(str::to_string);
      ptgt.realias(alias.as_deref())
    })
    .collect::<PutativeTargets>();
  debug!(putative = putative.len(), "detected putative targets");

  let UniquelyNamedPutativeTargets(named) = ctx.get(putative).await?;
  let disjoint = ctx.get_many(named).await?;
  let ptgts: Vec<PutativeTarget> = disjoint.into_iter().map(|d| d.0).collect();
  if ptgts.is_empty() {
    info!("no new targets to add");
    return Ok(TailorOutcome::default());
  }

  let edited = ctx
    .get(EditBuildFilesRequest {
      putative_targets: PutativeTargets::new(ptgts),
      name: options.build_file_name,
      header: options.build_file_header,
      indent: options.build_file_indent,
    })
    .await?;
  info!(
    created = edited.created.len(),
    updated = edited.updated.len(),
    "computed build file edits"
  );
  Ok(TailorOutcome { edited: Some(edited) })
}
