//! Memoized, concurrent evaluation of requests.
//!
//! A [`Session`] owns one memo table. The first `get` of a request spawns its
//! rule on the tokio runtime and stores a shared handle to the result; later
//! `get`s of an equal request (from any rule, concurrently or not) await that
//! same handle. Failures are memoized too, so a failing rule runs once.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared, try_join_all};
use futures::FutureExt;
use parking_lot::Mutex;
use petgraph::graph::NodeIndex;
use serde::Serialize;
use tracing::{Instrument, trace};

use super::graph::RuleGraph;
use super::registry::Engine;
use super::types::{EngineError, Request, Union, short_type_name};

type SharedResult<O> = Shared<BoxFuture<'static, Result<O, EngineError>>>;

struct Entry<O> {
  node: NodeIndex,
  result: SharedResult<O>,
}

type MemoTable<R> = HashMap<R, Entry<<R as Request>::Output>>;

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
  /// Distinct requests whose rule was started.
  pub rules_executed: usize,
  /// Requests answered from the memo table.
  pub cache_hits: usize,
}

#[derive(Default)]
struct SessionState {
  memo: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
  graph: RuleGraph,
  stats: SessionStats,
}

struct SessionInner {
  engine: Engine,
  state: Mutex<SessionState>,
}

/// One evaluation scope over an [`Engine`].
#[derive(Clone)]
pub struct Session {
  inner: Arc<SessionInner>,
}

impl Session {
  pub(crate) fn new(engine: Engine) -> Self {
    Self {
      inner: Arc::new(SessionInner {
        engine,
        state: Mutex::new(SessionState::default()),
      }),
    }
  }

  /// Evaluate a root request.
  pub async fn execute<R: Request>(&self, request: R) -> Result<R::Output, EngineError> {
    self.context().get(request).await
  }

  /// A context for issuing root requests outside any rule.
  pub fn context(&self) -> Context {
    Context {
      session: self.inner.clone(),
      caller: None,
    }
  }

  pub fn engine(&self) -> &Engine {
    &self.inner.engine
  }

  pub fn stats(&self) -> SessionStats {
    self.inner.state.lock().stats
  }

  /// Number of distinct requests evaluated so far.
  pub fn request_count(&self) -> usize {
    self.inner.state.lock().graph.node_count()
  }

  /// The recorded `(caller, callee)` dependency edges, by request label.
  pub fn dependency_edges(&self) -> Vec<(String, String)> {
    self.inner.state.lock().graph.edges()
  }
}

/// The handle a rule body uses to request other values.
///
/// Requests made through a context are recorded as dependencies of the rule
/// that owns it, which is how cycles are detected.
#[derive(Clone)]
pub struct Context {
  session: Arc<SessionInner>,
  caller: Option<NodeIndex>,
}

impl Context {
  pub fn engine(&self) -> &Engine {
    &self.session.engine
  }

  /// Request a single value.
  pub async fn get<R: Request>(&self, request: R) -> Result<R::Output, EngineError> {
    let result = self.session.begin(self.caller, request)?;
    result.await
  }

  /// Request several values concurrently. Results keep the input order; the
  /// first failure fails the whole batch.
  pub async fn get_many<R, I>(&self, requests: I) -> Result<Vec<R::Output>, EngineError>
  where
    R: Request,
    I: IntoIterator<Item = R>,
  {
    try_join_all(requests.into_iter().map(|request| self.get(request))).await
  }

  /// Run every member of `U` that applies to `input`, concurrently, and collect
  /// their outputs in registration order.
  pub async fn get_union<U: Union>(&self, input: U::Input) -> Result<Vec<U::Output>, EngineError> {
    let pending: Vec<_> = self
      .session
      .engine
      .union_membership()
      .dispatchers::<U>()
      .iter()
      .filter_map(|dispatch| dispatch(self.clone(), input.clone()))
      .collect();
    try_join_all(pending).await
  }

  pub fn has_union_members<U: Union>(&self) -> bool {
    self.session.engine.union_membership().has_members::<U>()
  }
}

impl SessionInner {
  /// Look up or start the computation of `request`, recording the dependency
  /// edge from `caller` first.
  fn begin<R: Request>(
    self: &Arc<Self>,
    caller: Option<NodeIndex>,
    request: R,
  ) -> Result<SharedResult<R::Output>, EngineError> {
    let name = short_type_name::<R>();
    let rule = self.engine.rule::<R>().ok_or(EngineError::NoRule(name))?;

    let mut state = self.state.lock();
    let SessionState { memo, graph, stats } = &mut *state;
    let table = memo
      .entry(TypeId::of::<R>())
      .or_insert_with(|| Box::new(MemoTable::<R>::new()))
      .downcast_mut::<MemoTable<R>>()
      .ok_or(EngineError::TypeMismatch(name))?;

    if let Some(entry) = table.get(&request) {
      if let Some(caller) = caller {
        graph.add_dependency(caller, entry.node).map_err(EngineError::Cycle)?;
      }
      stats.cache_hits += 1;
      return Ok(entry.result.clone());
    }

    let node = graph.add_node(format!("{name}({request:?})"));
    if let Some(caller) = caller {
      graph.add_dependency(caller, node).map_err(EngineError::Cycle)?;
    }
    stats.rules_executed += 1;
    trace!(rule = name, request = ?request, "starting rule");

    let ctx = Context {
      session: self.clone(),
      caller: Some(node),
    };
    let handle = tokio::spawn(rule(ctx, request.clone()).in_current_span());
    let result = async move {
      match handle.await {
        Ok(result) => result,
        Err(e) => Err(EngineError::Panicked {
          rule: name.to_string(),
          message: e.to_string(),
        }),
      }
    }
    .boxed()
    .shared();

    table.insert(request, Entry {
      node,
      result: result.clone(),
    });
    Ok(result)
  }
}
