//! Request, union and error types for the rule engine.

use std::fmt::Debug;
use std::hash::Hash;

use thiserror::Error;

use crate::build_file::BuildFileError;
use crate::store::StoreError;
use crate::tailor::TailorError;
use crate::target::TargetError;

/// A typed, hashable input to exactly one rule.
///
/// Two requests that compare equal share one memoized result within a session.
pub trait Request: Clone + Eq + Hash + Debug + Send + Sync + 'static {
  type Output: Clone + Send + Sync + 'static;
}

/// An abstract request category with pluggable implementations.
///
/// Members are registered on the [`RuleRegistry`](super::RuleRegistry) and
/// dispatched through [`Context::get_union`](super::Context::get_union).
pub trait Union: 'static {
  type Input: Clone + Send + Sync + 'static;
  type Output: Clone + Send + Sync + 'static;
}

/// A concrete request type implementing a [`Union`] category.
pub trait UnionMember<U: Union>: Request<Output = U::Output> {
  fn from_input(input: U::Input) -> Self;

  /// Whether this member should run for `input`. Members that do not apply are
  /// skipped without being evaluated.
  fn applies_to(_input: &U::Input) -> bool {
    true
  }
}

/// Errors surfaced by the engine and by rule bodies.
///
/// Cloneable because one failed computation is delivered to every awaiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
  #[error("no rule registered for {0}")]
  NoRule(&'static str),

  #[error("more than one rule registered for {0}")]
  DuplicateRule(&'static str),

  #[error("no implementations registered for union {0}")]
  NoUnionMembers(&'static str),

  #[error("dependency cycle detected: {}", .0.join(" -> "))]
  Cycle(Vec<String>),

  #[error("rule for {rule} panicked: {message}")]
  Panicked { rule: String, message: String },

  #[error("memo table for {0} holds a different type")]
  TypeMismatch(&'static str),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Target(#[from] TargetError),

  #[error(transparent)]
  BuildFile(#[from] BuildFileError),

  #[error(transparent)]
  Tailor(#[from] TailorError),
}

/// The last path segment of a type name, without generic arguments.
pub fn short_type_name<T: ?Sized>() -> &'static str {
  let full = std::any::type_name::<T>();
  let base = full.split('<').next().unwrap_or(full);
  base.rsplit("::").next().unwrap_or(base)
}
