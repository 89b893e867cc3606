//! The dependency injection engine wrapped by `anbar-container`.
//!
//! The engine owns the registrations and does the actual work: it keeps a
//! registry of components indexed by service type and by key, builds
//! instances according to their [`Lifestyle`], and accounts for live
//! instances until they are released. The facade crate drives it only
//! through this surface:
//!
//! - [`Engine::register`] / [`Engine::register_instance`]
//! - [`Engine::resolve`] / [`Engine::resolve_keyed`] / [`Engine::resolve_all`]
//! - [`Engine::release`]
//! - [`Engine::dispose`]
//! - [`manifest`] — the engine's declarative installation file format

pub mod arguments;
pub mod engine;
pub mod error;
pub mod key;
pub mod lifestyle;
pub mod manifest;
pub mod registration;

pub use arguments::Arguments;
pub use engine::{Engine, Resolved};
pub use error::{EngineError, NotRegisteredError, Result};
pub use key::ServiceId;
pub use lifestyle::Lifestyle;
pub use registration::{
    erase, resolve, unbox_service, CastFn, ErasedInstance, FactoryFn, Registration, Resolver,
    ServiceCast,
};
