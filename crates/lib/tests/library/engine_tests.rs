use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Barrier;

use trellis_lib::engine::{Context, EngineError, Request, RuleRegistry};
use trellis_lib::store::rules::SnapshotRequest;
use trellis_lib::store::{self, CreateDigest, FileContent, PathGlobs, Store, Workspace};

use trellis_lib::tailor::{PutativeTargetsSearchPaths, TailorOptions, goal};

use super::common::TestRepo;

/// Waits until `n` requests are running at once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Rendezvous(usize);

impl Request for Rendezvous {
  type Output = usize;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FanOut(usize);

impl Request for FanOut {
  type Output = Vec<usize>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Flaky;

impl Request for Flaky {
  type Output = ();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn batched_requests_run_concurrently() {
  let barrier = Arc::new(Barrier::new(3));
  let mut registry = RuleRegistry::new();
  registry
    .rule(move |_ctx: Context, Rendezvous(n): Rendezvous| {
      let barrier = barrier.clone();
      async move {
        barrier.wait().await;
        Ok::<_, EngineError>(n * 10)
      }
    })
    .rule(|ctx: Context, FanOut(n): FanOut| async move { ctx.get_many((0..n).map(Rendezvous)).await });
  let engine = registry.build().unwrap();

  let result = tokio::time::timeout(Duration::from_secs(5), engine.session().execute(FanOut(3)))
    .await
    .expect("requests in one batch must not run one after another")
    .unwrap();
  assert_eq!(result, vec![0, 10, 20]);
}

#[tokio::test]
async fn concurrent_awaiters_share_one_failure() {
  let runs = Arc::new(AtomicUsize::new(0));
  let counter = runs.clone();
  let mut registry = RuleRegistry::new();
  registry.rule(move |_ctx: Context, _: Flaky| {
    counter.fetch_add(1, Ordering::SeqCst);
    async move { Err::<(), EngineError>(EngineError::NoRule("upstream")) }
  });
  let engine = registry.build().unwrap();
  let session = engine.session();

  let (a, b) = tokio::join!(session.execute(Flaky), session.execute(Flaky));
  assert_eq!(a, Err(EngineError::NoRule("upstream")));
  assert_eq!(b, a);
  assert_eq!(runs.load(Ordering::SeqCst), 1);
  assert_eq!(session.stats().rules_executed, 1);

  // A new session starts from scratch.
  assert!(engine.session().execute(Flaky).await.is_err());
  assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn identical_trees_have_identical_digests() {
  let first = TestRepo::new();
  let second = TestRepo::new();
  for repo in [&first, &second] {
    repo.write("src/a.py", "print(1)\n").write("src/b/c.txt", "c");
  }

  let snapshot = |repo: &TestRepo| {
    let workspace = Arc::new(Workspace::new(repo.temp.path()));
    let store = Arc::new(Store::new());
    let mut registry = RuleRegistry::new();
    store::rules::register(&mut registry, workspace, store);
    registry.build().unwrap()
  };

  let globs = PathGlobs::new(["src/**/*"]);
  let a = snapshot(&first).session().execute(SnapshotRequest(globs.clone())).await.unwrap();
  let b = snapshot(&second).session().execute(SnapshotRequest(globs)).await.unwrap();
  assert_eq!(a.digest, b.digest);
  assert_eq!(a.files, vec!["src/a.py", "src/b/c.txt"]);

  let engine = snapshot(&first);
  let session = engine.session();
  let created = session
    .execute(CreateDigest(vec![
      FileContent::new("src/b/c.txt", "c"),
      FileContent::new("src/a.py", "print(1)\n"),
    ]))
    .await
    .unwrap();
  assert_eq!(created, a.digest);
}

#[tokio::test]
async fn tailor_session_reuses_results() {
  let repo = TestRepo::new();
  repo
    .write("src/a/x.py", "")
    .write("src/b/y.py", "")
    .write("src/c/z.sh", "");

  let project = repo.project();
  let session = project.session();
  let report = goal::run(
    &session,
    project.workspace(),
    project.store(),
    PutativeTargetsSearchPaths::all(),
    TailorOptions::default(),
    false,
  )
  .await
  .unwrap();

  assert_eq!(report.created.len(), 3);
  // Every detector and every restriction asks for the same target set.
  assert!(session.stats().cache_hits > 0);
  assert!(
    session
      .dependency_edges()
      .iter()
      .any(|(caller, callee)| caller.starts_with("TailorRequest") && callee.starts_with("EditBuildFilesRequest"))
  );
}
