//! The target model.
//!
//! Targets are read from BUILD files through the rules in [`rules`]; the set of
//! target types and macros that may appear in a BUILD file is the
//! [`BuildConfiguration`] assembled by the backends.

mod registry;
pub mod rules;
mod types;

pub use registry::{BuildConfiguration, MacroFn};
pub use types::*;
