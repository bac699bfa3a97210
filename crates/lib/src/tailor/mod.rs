//! Tailor: add BUILD targets for files that no target owns.
//!
//! Backends detect unowned sources through the [`PutativeTargetsRequest`]
//! union. The proposals are merged, re-aliased, renamed so that no address
//! collides, restricted so that no file gains a second owner, and rendered into
//! BUILD files. The result is one digest that the goal writes once.
//!
//! # Submodules
//!
//! - [`goal`] - argument validation and the single workspace write
//! - `render` - BUILD stanza rendering
//! - [`rules`] - ownership, renaming, restriction and file editing rules

pub mod goal;
mod render;
pub mod rules;
mod types;

pub use render::make_content_str;
pub use types::*;
