//! Container facade for Anbar.
//!
//! Wraps [`anbar_engine`] with the conveniences applications actually
//! use: a process-wide entry point, a disposable scope stack that
//! bulk-releases what was resolved inside it, and catalog-driven bulk
//! registration via the [`component!`] macro.

pub mod container;
pub mod descriptor;
pub mod error;
pub mod scope;

// The engine surface flows through unchanged; the facade adds no types
// of its own for registration and resolution.
pub use anbar_engine::{
    bindings, erase, resolve, unbox_service, Arguments, EngineError, ErasedInstance, Lifestyle,
    Registration, Resolver, ServiceCast, ServiceId,
};

// `component!` expands to an inventory submission; consumers reach the
// runtime through this re-export.
pub use inventory;

pub use container::Container;
pub use descriptor::RegistrationDescriptor;
pub use error::{AnbarError, Result};
pub use scope::Scope;

pub mod prelude {
    pub use super::{
        bindings, component, erase, resolve, AnbarError, Arguments, Container, Lifestyle, Result,
        Scope, ServiceCast, ServiceId,
    };
}
