//! A build root wired up with the bundled backends.
//!
//! [`Project`] owns the workspace, the content store and the engine. Every
//! operation runs in a fresh [`Session`], so results are never shared between
//! commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::address::Address;
use crate::backend;
use crate::build_file::BUILD_FILE_PATTERNS;
use crate::config::TrellisConfig;
use crate::engine::{Engine, EngineError, RuleRegistry, Session};
use crate::inject;
use crate::store::{self, Store, Workspace};
use crate::tailor::{self, TailorError, TailorOptions, TailorReport};
use crate::target::rules::{AddressSpec, AddressSpecs, DependenciesRequest, WrappedTargetRequest};
use crate::target::{self, BuildConfiguration, TargetError};
use crate::util::paths;

/// One line of `list` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetSummary {
  pub address: String,
  pub type_alias: String,
}

pub struct Project {
  config: TrellisConfig,
  workspace: Arc<Workspace>,
  store: Arc<Store>,
  build: Arc<BuildConfiguration>,
  engine: Engine,
}

impl Project {
  /// Register every rule and backend for the build root at `root`.
  pub fn open(root: impl Into<PathBuf>, config: TrellisConfig) -> Result<Self, EngineError> {
    let workspace = Arc::new(Workspace::new(root));
    let store = Arc::new(Store::new());

    let mut build = BuildConfiguration::new();
    let mut registry = RuleRegistry::new();
    backend::register_all(&mut build, &mut registry, config.python, config.shell, config.docker);
    // Targets written under a custom alias must parse on the next run.
    for (standard, custom) in &config.tailor.alias_mapping {
      if !build.register_synonym(standard, custom) {
        return Err(
          TailorError::InvalidAlias {
            standard: standard.clone(),
            custom: custom.clone(),
          }
          .into(),
        );
      }
    }
    let build = Arc::new(build);

    store::rules::register(&mut registry, workspace.clone(), store.clone());
    target::rules::register(&mut registry, build.clone(), Arc::new(build_file_patterns(&config.tailor)));
    inject::register(&mut registry);
    tailor::rules::register(&mut registry);
    let engine = registry.build()?;

    debug!(
      root = %workspace.root().display(),
      rules = engine.rule_names().len(),
      symbols = build.aliases().len(),
      "opened project"
    );
    Ok(Self {
      config,
      workspace,
      store,
      build,
      engine,
    })
  }

  pub fn root(&self) -> &Path {
    self.workspace.root()
  }

  pub fn workspace(&self) -> &Workspace {
    &self.workspace
  }

  pub fn store(&self) -> &Store {
    &self.store
  }

  pub fn config(&self) -> &TrellisConfig {
    &self.config
  }

  pub fn engine(&self) -> &Engine {
    &self.engine
  }

  pub fn build_configuration(&self) -> &BuildConfiguration {
    &self.build
  }

  pub fn session(&self) -> Session {
    self.engine.session()
  }

  /// Add targets for unowned files under `dirs` (the whole repository when
  /// empty). Nothing is written unless `write` is set. Custom aliases in
  /// `options` must have been registered when the project was opened.
  pub async fn tailor(&self, dirs: &[String], options: TailorOptions, write: bool) -> Result<TailorReport, EngineError> {
    options.validate()?;
    let search_paths = tailor::goal::validate_search_roots(&self.workspace, dirs)?;
    if let Some((standard, custom)) = options
      .alias_mapping
      .iter()
      .find(|(_, custom)| !self.build.aliases().contains(&custom.as_str()))
    {
      return Err(
        TailorError::InvalidAlias {
          standard: standard.clone(),
          custom: custom.clone(),
        }
        .into(),
      );
    }
    info!(dirs = ?search_paths.dirs, write, "running tailor");
    let session = self.session();
    let report = tailor::goal::run(&session, &self.workspace, &self.store, search_paths, options, write).await?;
    let stats = session.stats();
    debug!(rules_executed = stats.rules_executed, cache_hits = stats.cache_hits, "tailor session finished");
    Ok(report)
  }

  /// Targets defined at or below `dirs` (everywhere when empty), by address.
  pub async fn list(&self, dirs: &[String]) -> Result<Vec<TargetSummary>, EngineError> {
    let specs = if dirs.is_empty() {
      vec![AddressSpec::Descendant(String::new())]
    } else {
      dirs.iter().map(|d| AddressSpec::Descendant(paths::normalize_dir(d))).collect()
    };
    let targets = self.session().execute(AddressSpecs(specs)).await?;
    Ok(
      targets
        .iter()
        .map(|t| TargetSummary {
          address: t.address.spec(),
          type_alias: t.alias().to_string(),
        })
        .collect(),
    )
  }

  /// Explicit and injected dependencies of the target at `spec`.
  pub async fn dependencies(&self, spec: &str) -> Result<Vec<Address>, EngineError> {
    let address = Address::parse(spec, "").map_err(TargetError::from)?;
    let session = self.session();
    let target = session.execute(WrappedTargetRequest(address)).await?;
    let Some(field) = target.dependencies() else {
      return Ok(Vec::new());
    };
    Ok(session.execute(DependenciesRequest(field)).await?.0)
  }
}

impl std::fmt::Debug for Project {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Project")
      .field("root", &self.workspace.root())
      .field("build", &self.build)
      .finish_non_exhaustive()
  }
}

/// BUILD file names to discover: the defaults plus the configured name and its
/// alternates.
fn build_file_patterns(options: &TailorOptions) -> Vec<String> {
  let mut patterns: Vec<String> = BUILD_FILE_PATTERNS.iter().map(|p| p.to_string()).collect();
  let name = &options.build_file_name;
  for pattern in [name.clone(), format!("{name}.*")] {
    if !patterns.contains(&pattern) {
      patterns.push(pattern);
    }
  }
  patterns
}
