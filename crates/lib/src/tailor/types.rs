use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;
use crate::engine::Union;
use crate::store::{Digest, PathGlobs};
use crate::target::{FieldValue, TargetType};
use crate::util::paths;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TailorError {
  #[error("{0}")]
  Config(String),

  #[error("alias_mapping cannot map '{standard}' to '{custom}': the standard alias must be known and the custom one unused")]
  InvalidAlias { standard: String, custom: String },

  #[error("cannot compute an address for the non-addressable {type_alias} at '{path}'")]
  NotAddressable { type_alias: String, path: String },

  #[error(
    "tailor only accepts existing directories relative to the build root, but got: {}. \
     Pass no arguments to search the whole repository.",
    .0.join(", ")
  )]
  InvalidSearchRoots(Vec<String>),
}

/// Union category for backends that detect missing targets.
pub struct PutativeTargetsRequest;

impl Union for PutativeTargetsRequest {
  type Input = PutativeTargetsSearchPaths;
  type Output = PutativeTargets;
}

/// Directories to search, relative to the build root. `""` is the whole
/// repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PutativeTargetsSearchPaths {
  pub dirs: Vec<String>,
}

impl PutativeTargetsSearchPaths {
  pub fn new<I, S>(dirs: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      dirs: dirs.into_iter().map(Into::into).collect(),
    }
  }

  /// The whole repository.
  pub fn all() -> Self {
    Self::new([""])
  }

  /// Globs for `filename_glob` anywhere under the search directories.
  pub fn path_globs(&self, filename_glob: &str) -> PathGlobs {
    PathGlobs::new(self.dirs.iter().map(|d| paths::join(&paths::join(d, "**"), filename_glob)))
  }
}

/// A target that tailor may add to a BUILD file.
///
/// Field order gives the ordering: by address (path, then name) first. The
/// generated stanza is rendered from `type_alias`, `kwargs` and `comments`
/// only; the other fields steer naming and ownership decisions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PutativeTarget {
  pub path: String,
  pub name: String,
  pub type_alias: String,
  /// The unowned files that triggered the proposal, relative to `path`.
  pub triggering_sources: Vec<String>,
  /// The source globs the target would own. Empty iff the type has no sources
  /// field.
  pub owned_sources: Vec<String>,
  /// `false` for macros, which have no address and never collide.
  pub addressable: bool,
  pub kwargs: BTreeMap<String, FieldValue>,
  /// Lines rendered above the stanza, each including its `#`.
  pub comments: Vec<String>,
}

impl PutativeTarget {
  pub fn new<I, J, S, T>(
    path: impl Into<String>,
    name: impl Into<String>,
    type_alias: impl Into<String>,
    triggering_sources: I,
    owned_sources: J,
  ) -> Self
  where
    I: IntoIterator<Item = S>,
    J: IntoIterator<Item = T>,
    S: Into<String>,
    T: Into<String>,
  {
    Self {
      path: path.into(),
      name: name.into(),
      type_alias: type_alias.into(),
      triggering_sources: triggering_sources.into_iter().map(Into::into).collect(),
      owned_sources: owned_sources.into_iter().map(Into::into).collect(),
      addressable: true,
      kwargs: BTreeMap::new(),
      comments: Vec::new(),
    }
  }

  /// Propose a target of a registered type. Owned sources are the explicit
  /// `sources` kwarg when given, else the type's defaults.
  pub fn for_target_type<I, S>(
    target_type: &TargetType,
    path: impl Into<String>,
    name: impl Into<String>,
    triggering_sources: I,
    kwargs: BTreeMap<String, FieldValue>,
  ) -> Result<Self, TailorError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let path = path.into();
    let name = name.into();
    let triggering_sources: Vec<String> = triggering_sources.into_iter().map(Into::into).collect();

    let explicit_sources = match kwargs.get("sources") {
      None => None,
      Some(FieldValue::List(globs)) => Some(globs.clone()),
      Some(_) => {
        return Err(TailorError::Config(format!(
          "explicit sources for {path}:{name} must be a list of strings"
        )));
      }
    };

    let Some(default_sources) = &target_type.default_sources else {
      let offending = explicit_sources.as_ref().unwrap_or(&triggering_sources);
      if !offending.is_empty() {
        return Err(TailorError::Config(format!(
          "a target of type {} was proposed at address {path}:{name} with explicit sources {}, \
           but this target type does not have a `sources` field",
          target_type.alias,
          offending.join(", ")
        )));
      }
      return Ok(Self::new(path, name, target_type.alias.clone(), triggering_sources, Vec::<String>::new()).with_kwargs(kwargs));
    };

    let owned_sources = match explicit_sources {
      Some(globs) if !globs.is_empty() => globs,
      _ => default_sources.clone(),
    };
    Ok(Self::new(path, name, target_type.alias.clone(), triggering_sources, owned_sources).with_kwargs(kwargs))
  }

  pub fn with_kwargs(mut self, kwargs: BTreeMap<String, FieldValue>) -> Self {
    self.kwargs = kwargs;
    self
  }

  pub fn with_kwarg(mut self, key: impl Into<String>, value: FieldValue) -> Self {
    self.kwargs.insert(key.into(), value);
    self
  }

  pub fn non_addressable(mut self) -> Self {
    self.addressable = false;
    self
  }

  pub fn address(&self) -> Result<Address, TailorError> {
    if !self.addressable {
      return Err(TailorError::NotAddressable {
        type_alias: self.type_alias.clone(),
        path: self.path.clone(),
      });
    }
    Ok(Address::new(self.path.clone(), self.name.clone()))
  }

  /// A copy using `new_alias`, or `self` unchanged when there is none or it
  /// matches.
  pub fn realias(self, new_alias: Option<&str>) -> Self {
    match new_alias {
      Some(alias) if alias != self.type_alias => Self {
        type_alias: alias.to_string(),
        ..self
      },
      _ => self,
    }
  }

  /// A copy with the given name. The name is always written out explicitly,
  /// even if it matches the default.
  pub fn rename(&self, new_name: impl Into<String>) -> Self {
    let name = new_name.into();
    let mut renamed = self.clone();
    renamed.kwargs.insert("name".to_string(), FieldValue::Str(name.clone()));
    renamed.name = name;
    renamed
  }

  /// A copy owning only its triggering sources, listed explicitly.
  pub fn restrict_sources(&self) -> Self {
    let mut restricted = self.clone();
    restricted.owned_sources = self.triggering_sources.clone();
    restricted
      .kwargs
      .insert("sources".to_string(), FieldValue::List(self.triggering_sources.clone()));
    restricted
  }

  pub fn add_comments<I, S>(&self, comments: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let mut commented = self.clone();
    commented.comments.extend(comments.into_iter().map(Into::into));
    commented
  }
}

/// A sorted, deduplicated collection of putative targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct PutativeTargets(Vec<PutativeTarget>);

impl PutativeTargets {
  pub fn new(targets: impl IntoIterator<Item = PutativeTarget>) -> Self {
    let mut targets: Vec<_> = targets.into_iter().collect();
    targets.sort();
    targets.dedup();
    Self(targets)
  }

  pub fn merge(collections: impl IntoIterator<Item = PutativeTargets>) -> Self {
    Self::new(collections.into_iter().flat_map(|c| c.0))
  }

  pub fn iter(&self) -> impl Iterator<Item = &PutativeTarget> {
    self.0.iter()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl IntoIterator for PutativeTargets {
  type Item = PutativeTarget;
  type IntoIter = std::vec::IntoIter<PutativeTarget>;

  fn into_iter(self) -> Self::IntoIter {
    self.0.into_iter()
  }
}

impl FromIterator<PutativeTarget> for PutativeTargets {
  fn from_iter<T: IntoIterator<Item = PutativeTarget>>(iter: T) -> Self {
    Self::new(iter)
  }
}

/// Putative targets whose addresses collide with no existing target nor with
/// each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniquelyNamedPutativeTargets(pub PutativeTargets);

/// A putative target whose sources overlap no existing target's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisjointSourcePutativeTarget(pub PutativeTarget);

/// Every file in the repository already owned by some target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllOwnedSources(Arc<BTreeSet<String>>);

impl AllOwnedSources {
  pub fn new(paths: impl IntoIterator<Item = String>) -> Self {
    Self(Arc::new(paths.into_iter().collect()))
  }

  pub fn contains(&self, path: &str) -> bool {
    self.0.contains(path)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllOwnedSourcesRequest;

/// Settings for one tailor run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TailorOptions {
  pub build_file_name: String,
  /// Prefix for newly created BUILD files. Empty means none.
  pub build_file_header: String,
  pub build_file_indent: String,
  /// Standard target type alias to the custom alias written instead.
  pub alias_mapping: BTreeMap<String, String>,
}

impl Default for TailorOptions {
  fn default() -> Self {
    Self {
      build_file_name: "BUILD".to_string(),
      build_file_header: String::new(),
      build_file_indent: "    ".to_string(),
      alias_mapping: BTreeMap::new(),
    }
  }
}

impl TailorOptions {
  pub fn alias_for(&self, standard: &str) -> Option<&str> {
    self.alias_mapping.get(standard).map(String::as_str)
  }

  /// Reject settings that would write outside the target directories or
  /// produce unreadable BUILD files.
  pub fn validate(&self) -> Result<(), TailorError> {
    let name = &self.build_file_name;
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
      return Err(TailorError::Config(format!(
        "build_file_name must be a plain file name, got '{name}'"
      )));
    }
    if self.build_file_indent.chars().any(|c| c != ' ' && c != '\t') {
      return Err(TailorError::Config(format!(
        "build_file_indent may only contain spaces and tabs, got {:?}",
        self.build_file_indent
      )));
    }
    if let Some((standard, custom)) = self.alias_mapping.iter().find(|(_, custom)| !is_identifier(custom)) {
      return Err(TailorError::InvalidAlias {
        standard: standard.clone(),
        custom: custom.clone(),
      });
    }
    Ok(())
  }
}

fn is_identifier(alias: &str) -> bool {
  let mut chars = alias.chars();
  chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EditBuildFilesRequest {
  pub putative_targets: PutativeTargets,
  pub name: String,
  pub header: String,
  pub indent: String,
}

/// New BUILD file contents, not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditedBuildFiles {
  pub digest: Digest,
  pub created: Vec<String>,
  pub updated: Vec<String>,
  /// Putative targets keyed by the BUILD file they were written to.
  pub by_build_file: BTreeMap<String, Vec<PutativeTarget>>,
}

/// Run tailor over some search paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TailorRequest {
  pub search_paths: PutativeTargetsSearchPaths,
  pub options: TailorOptions,
}

/// The result of a tailor computation. `edited` is `None` when nothing needs
/// adding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailorOutcome {
  pub edited: Option<EditedBuildFiles>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedTarget {
  pub build_file: String,
  pub type_alias: String,
  pub name: String,
}

/// What a tailor run changed (or would change, when not written).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TailorReport {
  pub created: Vec<String>,
  pub updated: Vec<String>,
  pub added: Vec<AddedTarget>,
  /// Whether the changes were written to the workspace.
  pub written: bool,
}

impl TailorReport {
  pub fn has_changes(&self) -> bool {
    !self.created.is_empty() || !self.updated.is_empty()
  }
}
