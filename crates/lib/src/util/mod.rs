//! Shared utilities.

pub mod hash;
pub mod paths;
