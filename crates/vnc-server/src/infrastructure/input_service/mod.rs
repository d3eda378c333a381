//! Input service adapters.
//!
//! The platform's RPC transport is outside this crate; the in-memory
//! implementations here back headless runs and tests.

pub mod memory;

pub use memory::{InMemoryInputManager, InMemoryServiceManager};
