//! Intrinsic rules over the store and the build root.
//!
//! Filesystem access runs on the blocking pool so that rule bodies never stall
//! the async workers.

use std::sync::Arc;

use tokio::task::spawn_blocking;

use super::types::{CreateDigest, Digest, DigestContents, PathGlobs, Paths, Snapshot, StoreError};
use super::{Store, Workspace};
use crate::engine::{Context, EngineError, Request, RuleRegistry};

impl Request for PathGlobs {
  type Output = Paths;
}

/// Capture the files matching some globs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotRequest(pub PathGlobs);

impl Request for SnapshotRequest {
  type Output = Snapshot;
}

/// Snapshot some globs and read back the captured contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DigestContentsRequest(pub PathGlobs);

impl Request for DigestContentsRequest {
  type Output = Arc<DigestContents>;
}

impl Request for CreateDigest {
  type Output = Digest;
}

impl Request for Digest {
  type Output = Arc<DigestContents>;
}

pub fn register(registry: &mut RuleRegistry, workspace: Arc<Workspace>, store: Arc<Store>) {
  let ws = workspace.clone();
  registry.rule(move |_: Context, globs: PathGlobs| {
    let ws = ws.clone();
    async move { blocking(move || ws.paths(&globs)).await }
  });

  let ws = workspace;
  let st = store.clone();
  registry.rule(move |_: Context, SnapshotRequest(globs): SnapshotRequest| {
    let ws = ws.clone();
    let st = st.clone();
    async move { blocking(move || ws.snapshot(&globs, &st)).await }
  });

  registry.rule(|ctx: Context, DigestContentsRequest(globs): DigestContentsRequest| async move {
    let snapshot = ctx.get(SnapshotRequest(globs)).await?;
    ctx.get(snapshot.digest).await
  });

  let st = store.clone();
  registry.rule(move |_: Context, CreateDigest(files): CreateDigest| {
    let st = st.clone();
    async move { Ok(st.create_digest(files)?) }
  });

  registry.rule(move |_: Context, digest: Digest| {
    let st = store.clone();
    async move { Ok(st.contents(&digest)?) }
  });
}

async fn blocking<T, F>(f: F) -> Result<T, EngineError>
where
  F: FnOnce() -> Result<T, StoreError> + Send + 'static,
  T: Send + 'static,
{
  let result = spawn_blocking(f).await.map_err(|e| EngineError::Panicked {
    rule: "filesystem".to_string(),
    message: e.to_string(),
  })?;
  Ok(result?)
}
