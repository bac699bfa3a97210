use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::address::{Address, AddressError};
use crate::store::PathGlobs;
use crate::store::globs::prefix_glob_with_dirpath;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
  #[error(transparent)]
  Address(#[from] AddressError),

  #[error("invalid `{field}` for {address}: {message}")]
  InvalidField {
    address: String,
    field: String,
    message: String,
  },

  #[error("no target found for address {0}")]
  UnknownAddress(String),

  #[error("target {address} is defined in both {first} and {second}")]
  DuplicateAddress {
    address: String,
    first: String,
    second: String,
  },
}

/// A raw field value as written in a BUILD file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
  Str(String),
  Int(i64),
  Bool(bool),
  List(Vec<String>),
}

impl FieldValue {
  pub fn list<I, S>(items: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::List(items.into_iter().map(Into::into).collect())
  }
}

/// A registered kind of target, e.g. `python_library`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetType {
  pub alias: String,
  /// Default source globs. `Some` means the type has a sources field, even when
  /// the default is empty.
  pub default_sources: Option<Vec<String>>,
  /// Kind of the dependencies field, used to select injectors.
  pub dependencies_kind: Option<String>,
  pub extra_fields: Vec<String>,
}

impl TargetType {
  pub fn new(alias: impl Into<String>) -> Self {
    Self {
      alias: alias.into(),
      default_sources: None,
      dependencies_kind: None,
      extra_fields: Vec::new(),
    }
  }

  pub fn with_sources<I, S>(mut self, globs: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.default_sources = Some(globs.into_iter().map(Into::into).collect());
    self
  }

  pub fn with_dependencies(mut self, kind: impl Into<String>) -> Self {
    self.dependencies_kind = Some(kind.into());
    self
  }

  pub fn with_field(mut self, name: impl Into<String>) -> Self {
    self.extra_fields.push(name.into());
    self
  }

  pub fn has_sources_field(&self) -> bool {
    self.default_sources.is_some()
  }

  /// Whether targets of this type declare the named field.
  pub fn has_field(&self, name: &str) -> bool {
    match name {
      "sources" => self.has_sources_field(),
      "dependencies" => self.dependencies_kind.is_some(),
      "description" | "tags" => true,
      other => self.extra_fields.iter().any(|f| f == other),
    }
  }
}

/// An addressable unit of the build graph. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
  pub address: Address,
  pub target_type: Arc<TargetType>,
  pub fields: BTreeMap<String, FieldValue>,
}

impl Target {
  /// Build a target, validating field names and the sources and dependencies
  /// values.
  pub fn new(
    address: Address,
    target_type: Arc<TargetType>,
    fields: BTreeMap<String, FieldValue>,
  ) -> Result<Self, TargetError> {
    let invalid = |field: &str, message: &str| TargetError::InvalidField {
      address: address.spec(),
      field: field.to_string(),
      message: message.to_string(),
    };

    for (name, value) in &fields {
      if !target_type.has_field(name) {
        return Err(invalid(name, &format!("not a field of {}", target_type.alias)));
      }
      match name.as_str() {
        "sources" => match value {
          FieldValue::List(globs) => validate_globs(globs).map_err(|message| invalid(name, &message))?,
          _ => return Err(invalid(name, "must be a list of strings")),
        },
        "dependencies" | "tags" if !matches!(value, FieldValue::List(_)) => {
          return Err(invalid(name, "must be a list of strings"));
        }
        _ => {}
      }
    }

    Ok(Self {
      address,
      target_type,
      fields,
    })
  }

  pub fn alias(&self) -> &str {
    &self.target_type.alias
  }

  pub fn field(&self, name: &str) -> Option<&FieldValue> {
    self.fields.get(name)
  }

  pub fn has_field(&self, name: &str) -> bool {
    self.target_type.has_field(name)
  }

  /// The sources field, with the type's default globs when none were given.
  pub fn sources(&self) -> Option<SourcesField> {
    let defaults = self.target_type.default_sources.as_ref()?;
    let globs = match self.fields.get("sources") {
      Some(FieldValue::List(globs)) => globs.clone(),
      _ => defaults.clone(),
    };
    Some(SourcesField {
      address: self.address.clone(),
      globs,
    })
  }

  pub fn dependencies(&self) -> Option<DependenciesField> {
    let kind = self.target_type.dependencies_kind.as_ref()?;
    let specs = match self.fields.get("dependencies") {
      Some(FieldValue::List(specs)) => specs.clone(),
      _ => Vec::new(),
    };
    Some(DependenciesField {
      address: self.address.clone(),
      kind: kind.clone(),
      specs,
    })
  }
}

fn validate_globs(globs: &[String]) -> Result<(), String> {
  for glob in globs {
    let bare = glob.strip_prefix('!').unwrap_or(glob);
    if bare.starts_with('/') {
      return Err(format!("glob '{glob}' must be relative to the target's directory"));
    }
    if bare.split('/').any(|c| c == "..") {
      return Err(format!("glob '{glob}' must not escape the target's directory"));
    }
  }
  Ok(())
}

/// The source globs owned by one target, relative to its directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourcesField {
  pub address: Address,
  pub globs: Vec<String>,
}

impl SourcesField {
  /// The globs anchored at the build root.
  pub fn path_globs(&self) -> PathGlobs {
    PathGlobs::new(self.globs.iter().map(|g| prefix_glob_with_dirpath(&self.address.path, g)))
  }
}

/// Declared dependencies of one target plus the field kind used to pick
/// injectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependenciesField {
  pub address: Address,
  pub kind: String,
  pub specs: Vec<String>,
}

/// Files matched by a sources field, with their distinct directories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourcesPaths {
  pub files: Vec<String>,
  pub dirs: Vec<String>,
}

/// A set of targets sorted and deduplicated by address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Targets(pub Arc<Vec<Target>>);

impl Targets {
  pub fn new(mut targets: Vec<Target>) -> Self {
    targets.sort_by(|a, b| a.address.cmp(&b.address));
    targets.dedup_by(|a, b| a.address == b.address);
    Self(Arc::new(targets))
  }

  pub fn iter(&self) -> impl Iterator<Item = &Target> {
    self.0.iter()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn get(&self, address: &Address) -> Option<&Target> {
    self
      .0
      .binary_search_by(|t| t.address.cmp(address))
      .ok()
      .map(|idx| &self.0[idx])
  }

  pub fn addresses(&self) -> Vec<Address> {
    self.iter().map(|t| t.address.clone()).collect()
  }
}

/// A sorted, deduplicated set of addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Addresses(pub Vec<Address>);

impl Addresses {
  pub fn new(addresses: impl IntoIterator<Item = Address>) -> Self {
    let mut addresses: Vec<_> = addresses.into_iter().collect();
    addresses.sort();
    addresses.dedup();
    Self(addresses)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Address> {
    self.0.iter()
  }
}
