//! trellis-lib: an on-demand build graph engine.
//!
//! Facts about a repository (its targets, their sources and dependencies, the
//! BUILD files it is missing) are computed by small async rules that request
//! one another through a memoizing engine:
//! - `engine`: typed requests, rules, sessions and union dispatch
//! - `store`: content-addressed file trees and the on-disk workspace
//! - `target` / `build_file`: the address space defined by BUILD files
//! - `inject`: dependencies that backends add to targets
//! - `tailor`: synthesis of BUILD targets for unowned files
//! - `backend`: python, shell and docker plugins
//! - `config`: `trellis.toml` options
//! - `project`: everything wired together for one build root

pub mod address;
pub mod backend;
pub mod build_file;
pub mod config;
pub mod engine;
pub mod inject;
pub mod project;
pub mod store;
pub mod tailor;
pub mod target;
pub mod util;

pub use address::Address;
pub use config::TrellisConfig;
pub use project::Project;
