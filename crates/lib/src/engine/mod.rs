//! The rule engine.
//!
//! Rules are async functions from one typed [`Request`] to its output. A rule
//! asks for other values through its [`Context`]; the engine memoizes every
//! result per [`Session`], runs independent requests concurrently and turns
//! dependency cycles into [`EngineError::Cycle`] instead of deadlocking.
//!
//! Pluggable behavior goes through [`Union`] categories: any number of
//! [`UnionMember`] request types can be registered for a union and are invoked
//! together with [`Context::get_union`].
//!
//! # Submodules
//!
//! - `graph` - the per-session dependency graph used for cycle detection
//! - `registry` - [`RuleRegistry`] and the built [`Engine`]
//! - `session` - [`Session`], [`Context`] and memoization

mod graph;
mod registry;
mod session;
mod types;

pub use registry::{Engine, RuleRegistry, UnionMembership};
pub use session::{Context, Session, SessionStats};
pub use types::*;
