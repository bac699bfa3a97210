//! Rule registration.
//!
//! Rules are stored per request type behind `TypeId`, each as a boxed async
//! function. Registration problems (duplicate rules, union members without a
//! rule) are collected and reported when the registry is built.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use super::session::{Context, Session};
use super::types::{EngineError, Request, Union, UnionMember, short_type_name};

pub(crate) type RuleFn<R> =
  Arc<dyn Fn(Context, R) -> BoxFuture<'static, Result<<R as Request>::Output, EngineError>> + Send + Sync>;

type Dispatch<U> = Arc<
  dyn Fn(Context, <U as Union>::Input) -> Option<BoxFuture<'static, Result<<U as Union>::Output, EngineError>>>
    + Send
    + Sync,
>;

struct UnionEntry {
  name: &'static str,
  /// A `Vec<Dispatch<U>>` for the union's concrete type.
  dispatchers: Box<dyn Any + Send + Sync>,
  members: Vec<(TypeId, &'static str)>,
}

/// The registered implementations of every union category.
#[derive(Default)]
pub struct UnionMembership {
  unions: HashMap<TypeId, UnionEntry>,
}

impl UnionMembership {
  fn add<U: Union>(&mut self, member: TypeId, member_name: &'static str, dispatch: Dispatch<U>) {
    let entry = self.unions.entry(TypeId::of::<U>()).or_insert_with(|| UnionEntry {
      name: short_type_name::<U>(),
      dispatchers: Box::new(Vec::<Dispatch<U>>::new()),
      members: Vec::new(),
    });
    if entry.members.iter().any(|(id, _)| *id == member) {
      return;
    }
    if let Some(dispatchers) = entry.dispatchers.downcast_mut::<Vec<Dispatch<U>>>() {
      dispatchers.push(dispatch);
      entry.members.push((member, member_name));
    }
  }

  pub(crate) fn dispatchers<U: Union>(&self) -> &[Dispatch<U>] {
    self
      .unions
      .get(&TypeId::of::<U>())
      .and_then(|entry| entry.dispatchers.downcast_ref::<Vec<Dispatch<U>>>())
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  /// Whether any member is registered for `U`.
  pub fn has_members<U: Union>(&self) -> bool {
    !self.dispatchers::<U>().is_empty()
  }

  /// Names of the members registered for `U`, in registration order.
  pub fn member_names<U: Union>(&self) -> Vec<&'static str> {
    self
      .unions
      .get(&TypeId::of::<U>())
      .map(|entry| entry.members.iter().map(|(_, name)| *name).collect())
      .unwrap_or_default()
  }

  /// Every union with at least one member, as `(union, members)` name pairs.
  pub fn summary(&self) -> Vec<(&'static str, Vec<&'static str>)> {
    let mut summary: Vec<_> = self
      .unions
      .values()
      .map(|entry| (entry.name, entry.members.iter().map(|(_, name)| *name).collect()))
      .collect();
    summary.sort();
    summary
  }
}

impl std::fmt::Debug for UnionMembership {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_map().entries(self.summary()).finish()
  }
}

/// Collects rules and union members before building an [`Engine`].
#[derive(Default)]
pub struct RuleRegistry {
  rules: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
  rule_names: Vec<&'static str>,
  unions: UnionMembership,
  required: Vec<(TypeId, &'static str)>,
  errors: Vec<EngineError>,
}

impl RuleRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register the rule that computes `R`.
  ///
  /// A second rule for the same request type is a configuration error reported
  /// by [`build`](Self::build).
  pub fn rule<R, F, Fut>(&mut self, f: F) -> &mut Self
  where
    R: Request,
    F: Fn(Context, R) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R::Output, EngineError>> + Send + 'static,
  {
    let id = TypeId::of::<R>();
    let name = short_type_name::<R>();
    if self.rules.contains_key(&id) {
      self.errors.push(EngineError::DuplicateRule(name));
      return self;
    }
    let rule: RuleFn<R> = Arc::new(move |ctx, request| f(ctx, request).boxed());
    self.rules.insert(id, Box::new(rule));
    self.rule_names.push(name);
    self
  }

  /// Register `M` as an implementation of the union `U`.
  ///
  /// `M` must also have a rule; that is checked by [`build`](Self::build).
  pub fn union_member<U, M>(&mut self) -> &mut Self
  where
    U: Union,
    M: UnionMember<U>,
  {
    let dispatch: Dispatch<U> = Arc::new(|ctx: Context, input: U::Input| {
      if !M::applies_to(&input) {
        return None;
      }
      let request = M::from_input(input);
      Some(async move { ctx.get(request).await }.boxed())
    });
    let member = TypeId::of::<M>();
    let name = short_type_name::<M>();
    self.unions.add::<U>(member, name, dispatch);
    self.required.push((member, name));
    self
  }

  pub fn build(self) -> Result<Engine, EngineError> {
    if let Some(err) = self.errors.into_iter().next() {
      return Err(err);
    }
    if let Some((_, name)) = self.required.iter().find(|(id, _)| !self.rules.contains_key(id)) {
      return Err(EngineError::NoRule(*name));
    }

    debug!(rules = self.rule_names.len(), unions = self.unions.unions.len(), "built rule engine");

    Ok(Engine {
      inner: Arc::new(EngineInner {
        rules: self.rules,
        rule_names: self.rule_names,
        unions: self.unions,
      }),
    })
  }
}

struct EngineInner {
  rules: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
  rule_names: Vec<&'static str>,
  unions: UnionMembership,
}

/// An immutable set of rules. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
  inner: Arc<EngineInner>,
}

impl Engine {
  /// Start a fresh session with an empty memo table.
  pub fn session(&self) -> Session {
    Session::new(self.clone())
  }

  pub fn union_membership(&self) -> &UnionMembership {
    &self.inner.unions
  }

  pub fn rule_names(&self) -> &[&'static str] {
    &self.inner.rule_names
  }

  pub(crate) fn rule<R: Request>(&self) -> Option<RuleFn<R>> {
    self
      .inner
      .rules
      .get(&TypeId::of::<R>())
      .and_then(|rule| rule.downcast_ref::<RuleFn<R>>())
      .cloned()
  }
}

impl std::fmt::Debug for Engine {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Engine")
      .field("rules", &self.inner.rule_names)
      .field("unions", &self.inner.unions)
      .finish()
  }
}
