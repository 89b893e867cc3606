//! Component registrations.
//!
//! A [`Registration`] ties a lookup key to the set of services a component
//! exposes, the factory that builds it, and its [`Lifestyle`]. Service
//! exposure goes through [`ServiceCast`] shims that downcast the concrete
//! instance and re-erase it as the requested `Arc<Service>`, the
//! no-reflection equivalent of binding an implementation to its
//! interfaces.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::arguments::Arguments;
use crate::error::{EngineError, Result};
use crate::key::ServiceId;
use crate::lifestyle::Lifestyle;

/// A concrete component instance, type-erased.
///
/// The allocation address doubles as the release identity.
pub type ErasedInstance = Arc<dyn Any + Send + Sync>;

/// Downcasts the concrete instance and re-erases it as `Arc<Service>`
/// boxed into `Any`. Returns `None` when the instance is not the
/// expected concrete type.
pub type CastFn = fn(ErasedInstance) -> Option<Box<dyn Any + Send + Sync>>;

/// Type alias for factory functions.
///
/// A factory receives a [`Resolver`] for its own sub-dependencies and the
/// caller's construction [`Arguments`].
///
/// # Why `Arc` and not `Box`?
/// Factories are shared between threads (the engine is `Send + Sync`).
/// `Arc` allows cloning without copying the closure.
pub type FactoryFn =
    Arc<dyn Fn(&dyn Resolver, &Arguments) -> Result<ErasedInstance> + Send + Sync>;

/// Trait for resolving sub-dependencies inside factories.
///
/// Separated from the engine so factories never hold a registry lock.
pub trait Resolver: Send + Sync {
    fn resolve_service(&self, service: &ServiceId) -> Result<Box<dyn Any + Send + Sync>>;
}

/// Resolve a typed dependency from a [`Resolver`].
///
/// Use this inside factory closures:
///
/// ```rust,ignore
/// let factory = |r: &dyn Resolver, _: &Arguments| {
///     let logger: Arc<dyn Logger> = anbar_engine::resolve(r)?;
///     Ok(anbar_engine::erase(UserService { logger }))
/// };
/// ```
pub fn resolve<S: ?Sized + 'static>(resolver: &dyn Resolver) -> Result<Arc<S>> {
    let service = ServiceId::of::<S>();
    let boxed = resolver.resolve_service(&service)?;
    unbox_service::<S>(boxed)
}

/// Recovers the typed `Arc<S>` from a resolved service box.
pub fn unbox_service<S: ?Sized + 'static>(boxed: Box<dyn Any + Send + Sync>) -> Result<Arc<S>> {
    boxed
        .downcast::<Arc<S>>()
        .map(|service| *service)
        .map_err(|_| EngineError::TypeMismatch {
            service: ServiceId::of::<S>(),
        })
}

/// Erases a freshly built component value into an [`ErasedInstance`].
pub fn erase<T: Send + Sync + 'static>(value: T) -> ErasedInstance {
    Arc::new(value)
}

/// One service exposed by a component: the service id plus the cast shim.
pub struct ServiceCast {
    service: ServiceId,
    cast: CastFn,
}

impl ServiceCast {
    /// Creates a cast entry for service type `S`.
    pub fn new<S: ?Sized + 'static>(cast: CastFn) -> Self {
        Self {
            service: ServiceId::of::<S>(),
            cast,
        }
    }

    /// Cast entry exposing a component as its own concrete type.
    pub fn identity<T: Send + Sync + 'static>() -> Self {
        Self::new::<T>(|instance| {
            let concrete = instance.downcast::<T>().ok()?;
            Some(Box::new(concrete) as Box<dyn Any + Send + Sync>)
        })
    }

    /// The service this cast exposes.
    pub fn service(&self) -> &ServiceId {
        &self.service
    }

    /// Applies the cast, yielding the service box for [`unbox_service`].
    ///
    /// `None` when the instance is not the expected concrete type.
    pub fn apply(&self, instance: &ErasedInstance) -> Option<Box<dyn Any + Send + Sync>> {
        (self.cast)(Arc::clone(instance))
    }
}

impl fmt::Debug for ServiceCast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceCast({})", self.service)
    }
}

/// Builds the [`ServiceCast`] list binding an implementation type to each
/// of its service types.
///
/// # Examples
/// ```rust,ignore
/// let casts = bindings![SmtpMailer => dyn Mailer, SmtpMailer];
/// ```
#[macro_export]
macro_rules! bindings {
    ($impl:ty => $($service:ty),+ $(,)?) => {
        ::std::vec![$(
            $crate::registration::ServiceCast::new::<$service>(|instance| {
                let concrete = instance.downcast::<$impl>().ok()?;
                let service: ::std::sync::Arc<$service> = concrete;
                ::core::option::Option::Some(
                    ::std::boxed::Box::new(service)
                        as ::std::boxed::Box<
                            dyn ::core::any::Any + ::core::marker::Send + ::core::marker::Sync,
                        >,
                )
            })
        ),+]
    };
}

/// Registration entry for a single component.
pub struct Registration {
    key: String,
    lifestyle: Lifestyle,
    services: Vec<ServiceCast>,
    pub(crate) factory: FactoryFn,
    pub(crate) singleton: OnceCell<ErasedInstance>,
}

impl Registration {
    /// Creates a registration with an explicit factory.
    pub fn new(
        key: impl Into<String>,
        lifestyle: Lifestyle,
        services: Vec<ServiceCast>,
        factory: FactoryFn,
    ) -> Self {
        Self {
            key: key.into(),
            lifestyle,
            services,
            factory,
            singleton: OnceCell::new(),
        }
    }

    /// Creates a singleton registration for a pre-built instance.
    pub fn instance(
        key: impl Into<String>,
        instance: ErasedInstance,
        services: Vec<ServiceCast>,
    ) -> Self {
        let singleton = OnceCell::with_value(Arc::clone(&instance));
        let factory: FactoryFn = Arc::new(move |_, _| Ok(Arc::clone(&instance)));
        Self {
            key: key.into(),
            lifestyle: Lifestyle::Singleton,
            services,
            factory,
            singleton,
        }
    }

    /// The unique lookup key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The component's lifestyle.
    pub fn lifestyle(&self) -> Lifestyle {
        self.lifestyle
    }

    /// Services the component is exposed as.
    pub fn services(&self) -> &[ServiceCast] {
        &self.services
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("key", &self.key)
            .field("lifestyle", &self.lifestyle)
            .field("services", &self.services)
            .finish()
    }
}
