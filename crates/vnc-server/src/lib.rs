//! vnc-server library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the `redroid-vnc` binary share the same module tree.

pub mod application;
pub mod infrastructure;
