use std::collections::BTreeSet;

use trellis_lib::backend::BackendOptions;
use trellis_lib::config::TrellisConfig;
use trellis_lib::engine::EngineError;
use trellis_lib::tailor::goal::run;
use trellis_lib::tailor::{PutativeTarget, PutativeTargetsSearchPaths, TailorError, TailorOptions};
use trellis_lib::target::FieldValue;

use super::common::{CustomEngine, DetectA, DetectB, TestRepo, custom_engine, fixed_detector};

async fn tailor(repo: &TestRepo) -> trellis_lib::tailor::TailorReport {
  repo.project().tailor(&[], TailorOptions::default(), true).await.unwrap()
}

async fn run_custom(custom: &CustomEngine) -> trellis_lib::tailor::TailorReport {
  run(
    &custom.engine.session(),
    &custom.workspace,
    &custom.store,
    PutativeTargetsSearchPaths::all(),
    TailorOptions::default(),
    true,
  )
  .await
  .unwrap()
}

fn names(report: &trellis_lib::tailor::TailorReport) -> BTreeSet<(String, String)> {
  report
    .added
    .iter()
    .map(|a| (a.build_file.clone(), a.name.clone()))
    .collect()
}

// =============================================================================
// Scenarios with fixed proposals
// =============================================================================

#[tokio::test]
async fn proposal_creates_src_build() {
  let repo = TestRepo::new();
  repo.write("src/a.py", "");

  let ptgt = PutativeTarget::new("src", "lib", "python_library", ["a.py"], ["*.py"])
    .with_kwarg("name", FieldValue::Str("lib".into()));
  let custom = custom_engine(&repo, |registry| fixed_detector::<DetectA>(registry, vec![ptgt]));

  let report = run_custom(&custom).await;
  assert_eq!(report.created, vec!["src/BUILD"]);
  assert!(report.updated.is_empty());
  assert_eq!(repo.read("src/BUILD"), "python_library(\n    name=\"lib\",\n)\n");
}

#[tokio::test]
async fn colliding_names_get_numbered_suffixes() {
  let repo = TestRepo::new();
  repo.write("a/BUILD", "target(name=\"b\")\n");

  let first = PutativeTarget::new("a", "b", "target", Vec::<String>::new(), Vec::<String>::new())
    .with_kwarg("name", FieldValue::Str("b".into()));
  let second = first.clone().with_kwarg("description", FieldValue::Str("second".into()));
  let custom = custom_engine(&repo, |registry| fixed_detector::<DetectA>(registry, vec![first, second]));

  let report = run_custom(&custom).await;
  assert_eq!(report.updated, vec!["a/BUILD"]);
  assert_eq!(
    names(&report),
    BTreeSet::from([("a/BUILD".to_string(), "b0".to_string()), ("a/BUILD".to_string(), "b1".to_string())])
  );
  assert_eq!(
    repo.read("a/BUILD"),
    "target(name=\"b\")\n\ntarget(\n    name=\"b0\",\n    description=\"second\",\n)\n\ntarget(\n    name=\"b1\",\n)\n"
  );
}

#[tokio::test]
async fn same_address_from_two_detectors_keeps_both() {
  let repo = TestRepo::new();
  repo.write("src/a.py", "").write("src/a.sh", "");

  let python = PutativeTarget::new("src", "lib", "python_library", ["a.py"], ["*.py"])
    .with_kwarg("name", FieldValue::Str("lib".into()));
  let shell = PutativeTarget::new("src", "lib", "shell_library", ["a.sh"], ["*.sh"])
    .with_kwarg("name", FieldValue::Str("lib".into()));
  let custom = custom_engine(&repo, |registry| {
    fixed_detector::<DetectA>(registry, vec![python]);
    fixed_detector::<DetectB>(registry, vec![shell]);
  });

  let report = run_custom(&custom).await;
  assert_eq!(report.added.len(), 2);
  assert_eq!(
    names(&report),
    BTreeSet::from([("src/BUILD".to_string(), "lib".to_string()), ("src/BUILD".to_string(), "lib0".to_string())])
  );

  let listed = repo.project().list(&[]).await.unwrap();
  let addresses: Vec<_> = listed.iter().map(|t| t.address.as_str()).collect();
  assert_eq!(addresses, vec!["src:lib", "src:lib0"]);
}

#[tokio::test]
async fn tailor_without_detectors_fails() {
  let repo = TestRepo::new();
  let custom = custom_engine(&repo, |_| {});

  let err = run(
    &custom.engine.session(),
    &custom.workspace,
    &custom.store,
    PutativeTargetsSearchPaths::all(),
    TailorOptions::default(),
    true,
  )
  .await
  .unwrap_err();
  assert!(matches!(err, EngineError::NoUnionMembers(_)));
}

// =============================================================================
// Bundled backends
// =============================================================================

fn mixed_repo() -> TestRepo {
  let repo = TestRepo::new();
  repo
    .write("setup.py", "")
    .write("requirements.txt", "requests\n")
    .write("Dockerfile", "FROM scratch\n")
    .write("src/python/app/main.py", "")
    .write("src/python/app/util.py", "")
    .write("src/python/app/test_main.py", "")
    .write("src/python/app/conftest.py", "")
    .write("scripts/deploy.sh", "")
    .write("scripts/deploy_test.sh", "")
    .write("docker/web/Dockerfile", "FROM python:3.9\n")
    .write("dist/out.py", "")
    .write(".venv/lib/site.py", "");
  repo
}

#[tokio::test]
async fn tailor_covers_every_backend() {
  let repo = mixed_repo();
  let report = tailor(&repo).await;

  assert_eq!(
    report.created,
    vec!["BUILD", "docker/web/BUILD", "scripts/BUILD", "src/python/app/BUILD"]
  );
  assert_eq!(
    repo.read("src/python/app/BUILD"),
    "python_library()\n\npython_tests(\n    name=\"tests\",\n)\n"
  );
  assert_eq!(
    repo.read("scripts/BUILD"),
    "shell_library()\n\nshunit2_tests(\n    name=\"tests\",\n)\n"
  );
  assert_eq!(repo.read("docker/web/BUILD"), "docker_image()\n");
  assert!(!repo.exists("dist/BUILD"));
  assert!(!repo.exists(".venv/lib/BUILD"));

  let root = repo.read("BUILD");
  assert!(root.contains("docker_image(\n    name=\"root\",\n)"));
  assert!(root.contains("python_library(\n    name=\"root0\",\n)"));
  assert!(root.contains("python_requirements()"));
}

#[tokio::test]
async fn tailor_is_idempotent() {
  let repo = mixed_repo();
  let first = tailor(&repo).await;
  assert!(first.has_changes());

  let snapshot: Vec<String> = first.created.iter().map(|p| repo.read(p)).collect();
  let second = tailor(&repo).await;
  assert!(!second.has_changes());
  assert!(second.added.is_empty());
  let after: Vec<String> = first.created.iter().map(|p| repo.read(p)).collect();
  assert_eq!(snapshot, after);
}

#[tokio::test]
async fn conflicting_sources_are_restricted() {
  let repo = TestRepo::new();
  repo
    .write("src/BUILD", "python_library(name=\"lib\", sources=[\"a.py\"])\n")
    .write("src/a.py", "")
    .write("src/b.py", "");

  let report = tailor(&repo).await;
  assert_eq!(report.updated, vec!["src/BUILD"]);
  assert_eq!(
    repo.read("src/BUILD"),
    r#"python_library(name="lib", sources=["a.py"])

# NOTE: Sources restricted from the default for python_library due to conflict with
#   - src:lib
python_library(
    sources=[
        "b.py",
    ],
)
"#
  );

  // Every file has exactly one owner afterwards.
  let second = tailor(&repo).await;
  assert!(!second.has_changes());
}

#[tokio::test]
async fn existing_content_is_a_prefix_of_the_update() {
  let repo = TestRepo::new();
  let original = "# Keep this comment.\nfiles(\n    name=\"data\",\n    sources=[],\n)\n";
  repo.write("src/BUILD", original).write("src/x.py", "");

  let report = tailor(&repo).await;
  assert_eq!(report.updated, vec!["src/BUILD"]);
  let updated = repo.read("src/BUILD");
  assert!(updated.starts_with(original));
  assert!(updated.ends_with("\n\npython_library()\n"));
}

#[tokio::test]
async fn directory_named_like_the_build_file_uses_alternate_name() {
  let repo = TestRepo::new();
  repo.mkdir("src/BUILD").write("src/a.py", "");

  let report = tailor(&repo).await;
  assert_eq!(report.created, vec!["src/BUILD.trellis"]);
  assert_eq!(repo.read("src/BUILD.trellis"), "python_library()\n");

  let second = tailor(&repo).await;
  assert!(!second.has_changes());
}

#[tokio::test]
async fn header_is_only_used_for_new_files() {
  let repo = TestRepo::new();
  repo.write("old/BUILD", "\n\n").write("old/a.py", "").write("new/a.py", "");

  let options = TailorOptions {
    build_file_header: "# Generated by trellis".to_string(),
    build_file_indent: "  ".to_string(),
    ..TailorOptions::default()
  };
  let report = repo.project().tailor(&[], options, true).await.unwrap();

  assert_eq!(report.created, vec!["new/BUILD"]);
  assert_eq!(report.updated, vec!["old/BUILD"]);
  assert_eq!(repo.read("new/BUILD"), "# Generated by trellis\n\npython_library()\n");
  assert_eq!(repo.read("old/BUILD"), "python_library()\n");
}

#[tokio::test]
async fn search_roots_limit_detection() {
  let repo = TestRepo::new();
  repo.write("src/a.py", "").write("lib/b.py", "");

  let report = repo
    .project()
    .tailor(&["./src/".to_string()], TailorOptions::default(), true)
    .await
    .unwrap();
  assert_eq!(report.created, vec!["src/BUILD"]);
  assert!(!repo.exists("lib/BUILD"));
}

#[tokio::test]
async fn invalid_search_roots_are_rejected_before_any_write() {
  let repo = TestRepo::new();
  repo.write("src/a.py", "");

  let err = repo
    .project()
    .tailor(&["src/a.py".to_string()], TailorOptions::default(), true)
    .await
    .unwrap_err();
  assert_eq!(
    err,
    EngineError::Tailor(TailorError::InvalidSearchRoots(vec!["src/a.py".to_string()]))
  );
  assert!(!repo.exists("src/BUILD"));
}

#[tokio::test]
async fn dry_run_writes_nothing() {
  let repo = TestRepo::new();
  repo.write("src/a.py", "");

  let report = repo.project().tailor(&[], TailorOptions::default(), false).await.unwrap();
  assert_eq!(report.created, vec!["src/BUILD"]);
  assert!(!report.written);
  assert!(!repo.exists("src/BUILD"));
}

#[tokio::test]
async fn disabled_backend_proposes_nothing() {
  let repo = TestRepo::new();
  repo.write("src/a.py", "").write("src/run.sh", "");

  let config = TrellisConfig {
    python: BackendOptions { tailor: false },
    ..TrellisConfig::default()
  };
  let report = repo.project_with(config).tailor(&[], TailorOptions::default(), true).await.unwrap();
  assert_eq!(repo.read("src/BUILD"), "shell_library()\n");
  assert_eq!(report.added.len(), 1);
}

#[tokio::test]
async fn aliases_are_remapped() {
  let repo = TestRepo::new();
  repo.write("src/a.sh", "");

  let mut config = TrellisConfig::default();
  config
    .tailor
    .alias_mapping
    .insert("shell_library".to_string(), "sh_lib".to_string());
  config
    .tailor
    .alias_mapping
    .insert("python_library".to_string(), "python_library".to_string());
  let options = config.tailor.clone();

  let first = repo.project_with(config.clone()).tailor(&[], options.clone(), true).await.unwrap();
  assert_eq!(first.created, vec!["src/BUILD"]);
  assert_eq!(repo.read("src/BUILD"), "sh_lib()\n");

  // The custom alias parses back, so the file is neither rewritten nor broken.
  let project = repo.project_with(config);
  let second = project.tailor(&[], options, true).await.unwrap();
  assert!(!second.has_changes());
  let listed = project.list(&[]).await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].address, "src:src");
  assert_eq!(listed[0].type_alias, "sh_lib");
}

#[tokio::test]
async fn unregistered_custom_alias_is_rejected() {
  let repo = TestRepo::new();
  repo.write("src/a.sh", "");

  let mut options = TailorOptions::default();
  options
    .alias_mapping
    .insert("shell_library".to_string(), "sh_lib".to_string());
  let err = repo.project().tailor(&[], options, true).await.unwrap_err();
  assert!(matches!(err, EngineError::Tailor(TailorError::InvalidAlias { .. })));
  assert!(!repo.exists("src/BUILD"));

  let mut config = TrellisConfig::default();
  config
    .tailor
    .alias_mapping
    .insert("shell_library".to_string(), "python_library".to_string());
  assert!(trellis_lib::Project::open(repo.temp.path(), config).is_err());
}

#[tokio::test]
async fn test_files_are_classified_without_conftest() {
  let repo = TestRepo::new();
  repo
    .write("src/app/main.py", "")
    .write("src/app/test_main.py", "")
    .write("scripts/run.sh", "")
    .write("scripts/test_run.sh", "");

  let first = tailor(&repo).await;
  assert_eq!(first.created, vec!["scripts/BUILD", "src/app/BUILD"]);
  assert_eq!(
    repo.read("src/app/BUILD"),
    "python_library()\n\npython_tests(\n    name=\"tests\",\n)\n"
  );
  assert_eq!(
    repo.read("scripts/BUILD"),
    "shell_library()\n\nshunit2_tests(\n    name=\"tests\",\n)\n"
  );

  let second = tailor(&repo).await;
  assert!(!second.has_changes());
  assert!(second.added.is_empty());
}
