//! Registration descriptors and the component catalog.
//!
//! Descriptors replace runtime reflection: each module that wants its
//! components picked up by a bulk scan submits a
//! [`RegistrationDescriptor`] at link time via `inventory`, usually
//! through the [`component!`](crate::component) macro. The catalog is
//! consumed only while a scan runs; registrations live in the engine
//! afterwards.
//!
//! ```rust,ignore
//! component! {
//!     module: "messaging",
//!     key: "smtp-mailer",
//!     implementation: SmtpMailer,
//!     services: [dyn Mailer],
//!     construct: |_, _| Ok(erase(SmtpMailer::new())),
//! }
//! ```

use anbar_engine::{Arguments, ErasedInstance, Lifestyle, Resolver, ServiceCast, ServiceId};

/// Builds a fresh component instance. Descriptors are static, so this is
/// a plain function pointer; sub-dependencies come from the [`Resolver`].
pub type ConstructFn =
    fn(&dyn Resolver, &Arguments) -> anbar_engine::Result<ErasedInstance>;

/// Produces the service bindings of the described implementation.
pub type BindingsFn = fn() -> Vec<ServiceCast>;

/// Compile-time registration descriptor for one component.
///
/// Mirrors what an attribute on the implementation type would carry: the
/// lookup key, the services it satisfies, a lifestyle, and an enabled
/// flag. Only entries with `enabled == true` participate in
/// [`Container::register_module`](crate::Container::register_module).
pub struct RegistrationDescriptor {
    /// Scan group this component belongs to.
    pub module: &'static str,
    /// Unique lookup key.
    pub key: &'static str,
    /// Lifestyle used by the descriptor-driven scan.
    pub lifestyle: Lifestyle,
    /// Disabled descriptors are cataloged but never scan-registered.
    pub enabled: bool,
    /// Identity of the implementation type (automap exclusion checks).
    pub implementation: fn() -> ServiceId,
    /// Service bindings of the implementation.
    pub bindings: BindingsFn,
    /// Instance constructor.
    pub construct: ConstructFn,
}

inventory::collect!(RegistrationDescriptor);

/// All cataloged descriptors in `module`, in link order.
pub fn entries_in(module: &str) -> Vec<&'static RegistrationDescriptor> {
    inventory::iter::<RegistrationDescriptor>()
        .filter(|descriptor| descriptor.module == module)
        .collect()
}

/// Looks a descriptor up by key.
pub fn by_key(key: &str) -> Option<&'static RegistrationDescriptor> {
    inventory::iter::<RegistrationDescriptor>().find(|descriptor| descriptor.key == key)
}

impl std::fmt::Debug for RegistrationDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationDescriptor")
            .field("module", &self.module)
            .field("key", &self.key)
            .field("lifestyle", &self.lifestyle)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Substitutes a default when an optional macro argument is omitted.
#[doc(hidden)]
#[macro_export]
macro_rules! __or_default {
    (, $default:expr) => {
        $default
    };
    ($value:expr, $default:expr) => {
        $value
    };
}

/// Submits a [`RegistrationDescriptor`] to the catalog.
///
/// `lifestyle` defaults to [`Lifestyle::Singleton`] and `enabled` to
/// `true`, matching the scan defaults.
///
/// # Examples
/// ```rust,ignore
/// component! {
///     module: "messaging",
///     key: "audit-log",
///     implementation: AuditLog,
///     services: [dyn Sink, AuditLog],
///     construct: |r, _| {
///         let mailer: Arc<dyn Mailer> = anbar_container::resolve(r)?;
///         Ok(erase(AuditLog::new(mailer)))
///     },
///     lifestyle: Lifestyle::Transient,
///     enabled: false,
/// }
/// ```
#[macro_export]
macro_rules! component {
    (
        module: $module:expr,
        key: $key:expr,
        implementation: $impl:ty,
        services: [$($service:ty),+ $(,)?],
        construct: $construct:expr
        $(, lifestyle: $lifestyle:expr)?
        $(, enabled: $enabled:expr)?
        $(,)?
    ) => {
        $crate::inventory::submit! {
            $crate::descriptor::RegistrationDescriptor {
                module: $module,
                key: $key,
                lifestyle: $crate::__or_default!($($lifestyle)?, $crate::Lifestyle::Singleton),
                enabled: $crate::__or_default!($($enabled)?, true),
                implementation: || $crate::ServiceId::of::<$impl>(),
                bindings: || $crate::bindings!($impl => $($service),+),
                construct: $construct,
            }
        }
    };
}
