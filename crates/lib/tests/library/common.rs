use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use trellis_lib::backend;
use trellis_lib::build_file::BUILD_FILE_PATTERNS;
use trellis_lib::config::TrellisConfig;
use trellis_lib::engine::{Context, Engine, EngineError, Request, RuleRegistry, UnionMember};
use trellis_lib::project::Project;
use trellis_lib::store::{self, Store, Workspace};
use trellis_lib::tailor::{self, PutativeTarget, PutativeTargets, PutativeTargetsRequest, PutativeTargetsSearchPaths};
use trellis_lib::target::{self, BuildConfiguration};

/// A temporary build root.
pub struct TestRepo {
  pub temp: TempDir,
}

impl TestRepo {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn write(&self, path: &str, content: &str) -> &Self {
    let path = self.temp.path().join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
    self
  }

  pub fn mkdir(&self, path: &str) -> &Self {
    fs::create_dir_all(self.temp.path().join(path)).unwrap();
    self
  }

  pub fn read(&self, path: &str) -> String {
    fs::read_to_string(self.temp.path().join(path)).unwrap()
  }

  pub fn exists(&self, path: &str) -> bool {
    self.temp.path().join(path).exists()
  }

  pub fn project(&self) -> Project {
    self.project_with(TrellisConfig::default())
  }

  pub fn project_with(&self, config: TrellisConfig) -> Project {
    Project::open(self.temp.path(), config).unwrap()
  }
}

/// An engine with the store, target and tailor rules, the core and python
/// target types, and whatever `extra` registers. No backend detectors run.
pub struct CustomEngine {
  pub engine: Engine,
  pub workspace: Arc<Workspace>,
  pub store: Arc<Store>,
}

pub fn custom_engine(repo: &TestRepo, extra: impl FnOnce(&mut RuleRegistry)) -> CustomEngine {
  let workspace = Arc::new(Workspace::new(repo.temp.path()));
  let store = Arc::new(Store::new());

  let mut build = BuildConfiguration::new();
  backend::register_core(&mut build);
  build.register_target_type(backend::python::library_type());
  build.register_target_type(backend::shell::library_type());

  let mut registry = RuleRegistry::new();
  store::rules::register(&mut registry, workspace.clone(), store.clone());
  let patterns = BUILD_FILE_PATTERNS.iter().map(|p| p.to_string()).collect();
  target::rules::register(&mut registry, Arc::new(build), Arc::new(patterns));
  tailor::rules::register(&mut registry);
  extra(&mut registry);

  CustomEngine {
    engine: registry.build().unwrap(),
    workspace,
    store,
  }
}

/// Register a detector of type `D` that always proposes `ptgts`.
pub fn fixed_detector<D>(registry: &mut RuleRegistry, ptgts: Vec<PutativeTarget>)
where
  D: UnionMember<PutativeTargetsRequest>,
{
  let ptgts = Arc::new(ptgts);
  registry
    .rule(move |_ctx: Context, _request: D| {
      let ptgts = ptgts.clone();
      async move { Ok::<_, EngineError>(PutativeTargets::new(ptgts.iter().cloned())) }
    })
    .union_member::<PutativeTargetsRequest, D>();
}

macro_rules! detector {
  ($name:ident) => {
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct $name(pub PutativeTargetsSearchPaths);

    impl Request for $name {
      type Output = PutativeTargets;
    }

    impl UnionMember<PutativeTargetsRequest> for $name {
      fn from_input(input: PutativeTargetsSearchPaths) -> Self {
        Self(input)
      }
    }
  };
}

detector!(DetectA);
detector!(DetectB);
