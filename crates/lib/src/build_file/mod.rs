//! BUILD files.
//!
//! A BUILD file is a sequence of calls such as `python_library(name="lib")`.
//! Each call names either a registered target type or a macro; macros expand
//! into target calls and have no address of their own.
//!
//! # Submodules
//!
//! - `lexer` - logos tokenizer
//! - `parser` - recursive-descent parser producing [`Call`]s

mod lexer;
mod parser;

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::trace;

use crate::address::Address;
use crate::target::{BuildConfiguration, FieldValue, Target, TargetError};
use crate::util::paths;

pub use parser::parse;

/// Default BUILD file name patterns searched for targets.
pub const BUILD_FILE_PATTERNS: &[&str] = &["BUILD", "BUILD.*"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildFileError {
  #[error("{path}:{line}: unrecognized input")]
  Lex { path: String, line: usize },

  #[error("{path}:{line}: {message}")]
  Syntax { path: String, line: usize, message: String },

  #[error("{path}:{line}: unknown target type '{alias}'")]
  UnknownTargetType { path: String, line: usize, alias: String },

  #[error("{path}:{line}: {alias} target in the build root must set `name`")]
  UnnamedRootTarget { path: String, line: usize, alias: String },

  #[error("{path}: duplicate target address {address}")]
  DuplicateAddress { path: String, address: String },

  #[error("{path}:{line}: {source}")]
  InvalidTarget {
    path: String,
    line: usize,
    #[source]
    source: TargetError,
  },

  #[error("{path}:{line}: macro {alias} failed: {message}")]
  Macro {
    path: String,
    line: usize,
    alias: String,
    message: String,
  },
}

/// One top-level call in a BUILD file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
  pub alias: String,
  pub kwargs: BTreeMap<String, FieldValue>,
  pub line: usize,
}

impl Call {
  pub fn new(alias: impl Into<String>) -> Self {
    Self {
      alias: alias.into(),
      kwargs: BTreeMap::new(),
      line: 0,
    }
  }

  pub fn with_kwarg(mut self, key: impl Into<String>, value: FieldValue) -> Self {
    self.kwargs.insert(key.into(), value);
    self
  }

  pub fn str_kwarg(&self, key: &str) -> Option<&str> {
    match self.kwargs.get(key) {
      Some(FieldValue::Str(s)) => Some(s),
      _ => None,
    }
  }
}

/// Parse a BUILD file at `path` into targets, expanding macros.
pub fn parse_targets(path: &str, source: &str, config: &BuildConfiguration) -> Result<Vec<Target>, BuildFileError> {
  let dir = paths::dirname(path);
  let mut targets = Vec::new();
  let mut seen = BTreeSet::new();

  for call in parse(path, source)? {
    for call in expand(path, call, config)? {
      let target = to_target(path, dir, call, config)?;
      if !seen.insert(target.address.clone()) {
        return Err(BuildFileError::DuplicateAddress {
          path: path.to_string(),
          address: target.address.spec(),
        });
      }
      targets.push(target);
    }
  }

  trace!(path, targets = targets.len(), "parsed build file");
  Ok(targets)
}

fn expand(path: &str, call: Call, config: &BuildConfiguration) -> Result<Vec<Call>, BuildFileError> {
  let Some(macro_fn) = config.macro_for(&call.alias) else {
    return Ok(vec![call]);
  };
  let macro_error = |message: String| BuildFileError::Macro {
    path: path.to_string(),
    line: call.line,
    alias: call.alias.clone(),
    message,
  };
  let expanded = macro_fn(paths::dirname(path), &call).map_err(macro_error)?;
  expanded
    .into_iter()
    .map(|mut generated| {
      if config.macro_for(&generated.alias).is_some() {
        return Err(macro_error(format!("expanded into another macro, {}", generated.alias)));
      }
      generated.line = call.line;
      Ok(generated)
    })
    .collect()
}

fn to_target(path: &str, dir: &str, call: Call, config: &BuildConfiguration) -> Result<Target, BuildFileError> {
  let Some(target_type) = config.target_type(&call.alias) else {
    return Err(BuildFileError::UnknownTargetType {
      path: path.to_string(),
      line: call.line,
      alias: call.alias,
    });
  };

  let name = match call.kwargs.get("name") {
    Some(FieldValue::Str(name)) => name.clone(),
    Some(_) => {
      return Err(BuildFileError::InvalidTarget {
        path: path.to_string(),
        line: call.line,
        source: TargetError::InvalidField {
          address: dir.to_string(),
          field: "name".to_string(),
          message: "must be a string".to_string(),
        },
      });
    }
    None if dir.is_empty() => {
      return Err(BuildFileError::UnnamedRootTarget {
        path: path.to_string(),
        line: call.line,
        alias: call.alias,
      });
    }
    None => paths::basename(dir).to_string(),
  };

  let mut fields = call.kwargs;
  fields.remove("name");
  Target::new(Address::new(dir, name), target_type.clone(), fields).map_err(|source| BuildFileError::InvalidTarget {
    path: path.to_string(),
    line: call.line,
    source,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::target::TargetType;

  fn config() -> BuildConfiguration {
    let mut config = BuildConfiguration::new();
    config
      .register_target_type(TargetType::new("lib").with_sources(["*.py"]))
      .register_target_type(TargetType::new("files").with_sources(Vec::<String>::new()))
      .register_macro("many", |_dir, call| {
        let count = match call.kwargs.get("count") {
          Some(FieldValue::Int(n)) => *n,
          _ => return Err("count must be an integer".to_string()),
        };
        Ok(
          (0..count)
            .map(|i| Call::new("files").with_kwarg("name", FieldValue::Str(format!("f{i}"))))
            .collect(),
        )
      });
    config
  }

  #[test]
  fn names_default_to_directory() {
    let targets = parse_targets("src/util/BUILD", "lib()\nlib(name=\"other\")\n", &config()).unwrap();
    let specs: Vec<_> = targets.iter().map(|t| t.address.spec()).collect();
    assert_eq!(specs, vec!["src/util:util", "src/util:other"]);
  }

  #[test]
  fn root_targets_need_names() {
    let err = parse_targets("BUILD", "lib()", &config()).unwrap_err();
    assert!(matches!(err, BuildFileError::UnnamedRootTarget { line: 1, .. }));
    assert!(parse_targets("BUILD", "lib(name=\"root\")", &config()).is_ok());
  }

  #[test]
  fn duplicate_addresses_rejected() {
    let err = parse_targets("a/BUILD", "lib()\nfiles(name=\"a\")", &config()).unwrap_err();
    assert_eq!(
      err,
      BuildFileError::DuplicateAddress {
        path: "a/BUILD".into(),
        address: "a:a".into(),
      }
    );
  }

  #[test]
  fn unknown_types_rejected() {
    let err = parse_targets("a/BUILD", "\n\nmystery()", &config()).unwrap_err();
    assert_eq!(
      err,
      BuildFileError::UnknownTargetType {
        path: "a/BUILD".into(),
        line: 3,
        alias: "mystery".into(),
      }
    );
  }

  #[test]
  fn macros_expand_to_targets() {
    let targets = parse_targets("x/BUILD", "many(count=2)", &config()).unwrap();
    let specs: Vec<_> = targets.iter().map(|t| t.address.spec()).collect();
    assert_eq!(specs, vec!["x:f0", "x:f1"]);

    let err = parse_targets("x/BUILD", "many()", &config()).unwrap_err();
    assert!(matches!(err, BuildFileError::Macro { ref alias, .. } if alias == "many"));
  }
}
