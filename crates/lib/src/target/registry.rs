//! The set of BUILD file symbols known to a build: target types and macros.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::TargetType;
use crate::build_file::Call;

/// Expands one BUILD call, made in the given directory, into target calls.
pub type MacroFn = Arc<dyn Fn(&str, &Call) -> Result<Vec<Call>, String> + Send + Sync>;

#[derive(Clone, Default)]
pub struct BuildConfiguration {
  target_types: BTreeMap<String, Arc<TargetType>>,
  macros: BTreeMap<String, MacroFn>,
}

impl BuildConfiguration {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register_target_type(&mut self, target_type: TargetType) -> &mut Self {
    self.target_types.insert(target_type.alias.clone(), Arc::new(target_type));
    self
  }

  pub fn register_macro<F>(&mut self, alias: impl Into<String>, expand: F) -> &mut Self
  where
    F: Fn(&str, &Call) -> Result<Vec<Call>, String> + Send + Sync + 'static,
  {
    self.macros.insert(alias.into(), Arc::new(expand));
    self
  }

  /// Accept `custom` in BUILD files as another spelling of the registered
  /// symbol `standard`. Returns `false` when `standard` is unknown or `custom`
  /// already names a different symbol.
  pub fn register_synonym(&mut self, standard: &str, custom: &str) -> bool {
    if standard == custom {
      return self.is_registered(standard);
    }
    if self.is_registered(custom) {
      return false;
    }
    if let Some(target_type) = self.target_types.get(standard) {
      let renamed = TargetType {
        alias: custom.to_string(),
        ..TargetType::clone(target_type)
      };
      self.target_types.insert(custom.to_string(), Arc::new(renamed));
      true
    } else if let Some(expand) = self.macros.get(standard).cloned() {
      self.macros.insert(custom.to_string(), expand);
      true
    } else {
      false
    }
  }

  fn is_registered(&self, alias: &str) -> bool {
    self.target_types.contains_key(alias) || self.macros.contains_key(alias)
  }

  pub fn target_type(&self, alias: &str) -> Option<&Arc<TargetType>> {
    self.target_types.get(alias)
  }

  pub fn macro_for(&self, alias: &str) -> Option<&MacroFn> {
    self.macros.get(alias)
  }

  /// Every registered symbol, sorted.
  pub fn aliases(&self) -> Vec<&str> {
    let mut aliases: Vec<&str> = self.target_types.keys().chain(self.macros.keys()).map(String::as_str).collect();
    aliases.sort_unstable();
    aliases
  }
}

impl std::fmt::Debug for BuildConfiguration {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BuildConfiguration")
      .field("target_types", &self.target_types.keys().collect::<Vec<_>>())
      .field("macros", &self.macros.keys().collect::<Vec<_>>())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config() -> BuildConfiguration {
    let mut config = BuildConfiguration::new();
    config
      .register_target_type(TargetType::new("shell_library").with_sources(["*.sh"]))
      .register_target_type(TargetType::new("files").with_sources(Vec::<String>::new()))
      .register_macro("requirements", |_, _| Ok(Vec::new()));
    config
  }

  #[test]
  fn synonyms_share_the_standard_definition() {
    let mut config = config();
    assert!(config.register_synonym("shell_library", "sh_lib"));
    assert!(config.register_synonym("requirements", "reqs"));

    let synonym = config.target_type("sh_lib").unwrap();
    assert_eq!(synonym.alias, "sh_lib");
    assert_eq!(synonym.default_sources, Some(vec!["*.sh".to_string()]));
    assert!(config.macro_for("reqs").is_some());
  }

  #[test]
  fn synonyms_never_shadow_other_symbols() {
    let mut config = config();
    assert!(!config.register_synonym("shell_library", "files"));
    assert!(!config.register_synonym("unknown", "other"));
    assert!(config.register_synonym("files", "files"));
    assert_eq!(config.target_type("files").unwrap().alias, "files");
  }
}
