//! # Anbar — a scope-tracking facade over a dependency injection engine
//!
//! Anbar wraps a DI engine with the plumbing applications keep
//! rewriting by hand: a process-wide container, disposable nested
//! scopes that bulk-release whatever was resolved inside them, and
//! catalog-driven bulk registration.

pub use anbar_container::*;
pub use anbar_engine::{Engine, Resolved};
pub use anbar_support::rendering;
