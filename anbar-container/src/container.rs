//! # The Container facade
//!
//! Single entry point for registration and resolution. The container
//! owns exactly one [`Engine`] at a time and a stack of open
//! [`Scope`]s; everything else is forwarded to the engine untouched.
//!
//! # Architecture
//! ```text
//! Container ──register*()──> Engine
//!     │
//!   begin()
//!     │
//!     ▼
//!   Scope ──dispose()──> release tracked instances
//! ```
//!
//! # Examples
//! ```rust
//! use anbar_container::prelude::*;
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct PlainGreeter;
//! impl Greeter for PlainGreeter {
//!     fn greet(&self) -> String { "hi".to_string() }
//! }
//!
//! let container = Container::new();
//! container
//!     .register_with::<PlainGreeter, _>(
//!         "greeter",
//!         Lifestyle::Singleton,
//!         bindings![PlainGreeter => dyn Greeter],
//!         |_, _| Ok(PlainGreeter),
//!     )
//!     .expect("register");
//!
//! let greeter: Arc<dyn Greeter> = container.resolve().expect("resolve");
//! assert_eq!(greeter.greet(), "hi");
//! ```

use std::any::{type_name, TypeId};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace};

use anbar_engine::{
    erase, manifest, unbox_service, Arguments, Engine, ErasedInstance, FactoryFn, Lifestyle,
    Registration, Resolver, ServiceCast, ServiceId,
};

use crate::descriptor::{self, RegistrationDescriptor};
use crate::error::{AnbarError, Result};
use crate::scope::{Scope, ScopeCore};

static CURRENT: OnceCell<Container> = OnceCell::new();

/// The container facade.
///
/// Cheaply cloneable handle; clones share the same engine and scope
/// stack. Construct one explicitly and pass it through call chains;
/// [`Container::current`] exists for the process entry point only.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    /// The wrapped engine. Replaced wholesale by [`Container::clear`].
    engine: RwLock<Engine>,
    /// Open scopes, innermost last. Push/pop ordering under concurrent
    /// use is the caller's problem; the lock only keeps it memory-safe.
    scopes: Mutex<Vec<Arc<ScopeCore>>>,
    next_scope_id: AtomicU64,
    initialized: AtomicBool,
}

impl Container {
    /// Creates a container with a fresh engine.
    pub fn new() -> Self {
        info!("container created");
        Self {
            inner: Arc::new(ContainerInner {
                engine: RwLock::new(Engine::new()),
                scopes: Mutex::new(Vec::new()),
                next_scope_id: AtomicU64::new(1),
                initialized: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the process-wide container, constructing it on first
    /// access. Concurrent first calls construct exactly one instance.
    pub fn current() -> Container {
        CURRENT.get_or_init(Container::new).clone()
    }

    // ── Scopes ──

    /// Opens a new scope and pushes it onto the stack.
    ///
    /// Instances resolved while the scope is innermost are tracked by it
    /// and released when it is disposed. Disposing a non-innermost scope
    /// cascade-closes everything opened after it first.
    pub fn begin(&self) -> Scope {
        let id = self.inner.next_scope_id.fetch_add(1, Ordering::Relaxed);
        let core = ScopeCore::new(id, Arc::downgrade(&self.inner));
        self.inner.scopes.lock().push(Arc::clone(&core));
        debug!(scope = id, "scope opened");
        Scope::new(core)
    }

    /// Id of the innermost open scope, if any.
    pub fn current_scope_id(&self) -> Option<u64> {
        self.inner.scopes.lock().last().map(|core| core.id())
    }

    /// Number of open scopes.
    pub fn open_scopes(&self) -> usize {
        self.inner.scopes.lock().len()
    }

    // ── Registration ──

    /// Registers a singleton under its type name.
    pub fn register_singleton<T, F>(&self, factory: F) -> Result<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn Resolver, &Arguments) -> anbar_engine::Result<T> + Send + Sync + 'static,
    {
        self.register_with(
            type_name::<T>(),
            Lifestyle::Singleton,
            vec![ServiceCast::identity::<T>()],
            factory,
        )
    }

    /// Registers a transient under its type name.
    pub fn register_transient<T, F>(&self, factory: F) -> Result<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn Resolver, &Arguments) -> anbar_engine::Result<T> + Send + Sync + 'static,
    {
        self.register_with(
            type_name::<T>(),
            Lifestyle::Transient,
            vec![ServiceCast::identity::<T>()],
            factory,
        )
    }

    /// Registers an implementation with explicit key, lifestyle and
    /// service bindings (see [`bindings!`](crate::bindings)).
    pub fn register_with<T, F>(
        &self,
        key: &str,
        lifestyle: Lifestyle,
        services: Vec<ServiceCast>,
        factory: F,
    ) -> Result<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn Resolver, &Arguments) -> anbar_engine::Result<T> + Send + Sync + 'static,
    {
        let factory: FactoryFn = Arc::new(move |resolver: &dyn Resolver, args: &Arguments| {
            Ok(erase(factory(resolver, args)?))
        });
        self.inner
            .engine
            .read()
            .register(Registration::new(key, lifestyle, services, factory))?;
        Ok(())
    }

    /// Registers a pre-built instance as a singleton.
    ///
    /// The instance is always reachable as its own concrete type, plus
    /// any extra service bindings supplied.
    pub fn register_instance<T: Send + Sync + 'static>(
        &self,
        key: &str,
        value: T,
        mut services: Vec<ServiceCast>,
    ) -> Result<()> {
        if !services
            .iter()
            .any(|cast| cast.service().type_id() == TypeId::of::<T>())
        {
            services.push(ServiceCast::identity::<T>());
        }
        self.inner
            .engine
            .read()
            .register(Registration::instance(key, erase(value), services))?;
        Ok(())
    }

    /// Registers every enabled cataloged descriptor in `module`.
    pub fn register_module(&self, module: &str) -> Result<()> {
        let mut count = 0usize;
        for entry in descriptor::entries_in(module) {
            if !entry.enabled {
                trace!(key = entry.key, "skipping disabled descriptor");
                continue;
            }
            self.register_descriptor(entry, entry.lifestyle)?;
            count += 1;
        }
        info!(module, count, "module registered");
        Ok(())
    }

    /// Registers every cataloged descriptor in `module` (enabled or not)
    /// against all its declared services, under `lifestyle`.
    ///
    /// Entries whose implementation type or any service type appears in
    /// `excluded` are skipped.
    pub fn register_module_automap(
        &self,
        module: &str,
        lifestyle: Lifestyle,
        excluded: &[TypeId],
    ) -> Result<()> {
        let mut count = 0usize;
        for entry in descriptor::entries_in(module) {
            if excluded.contains(&(entry.implementation)().type_id()) {
                continue;
            }
            let services = (entry.bindings)();
            if services
                .iter()
                .any(|cast| excluded.contains(&cast.service().type_id()))
            {
                continue;
            }
            self.register_descriptor_as(entry, lifestyle, services)?;
            count += 1;
        }
        info!(module, count, %lifestyle, "module automapped");
        Ok(())
    }

    /// Installs components selected by a manifest file.
    ///
    /// The engine parses the file; each enabled entry is materialized
    /// from the catalog, honoring a per-entry lifestyle override.
    pub fn register_config_file(&self, path: &Path) -> Result<()> {
        let manifest = manifest::load(path)?;
        for entry in manifest.components {
            if !entry.enabled {
                trace!(key = %entry.key, "skipping disabled manifest entry");
                continue;
            }
            let cataloged =
                descriptor::by_key(&entry.key).ok_or_else(|| AnbarError::NotCataloged {
                    key: entry.key.clone(),
                })?;
            let lifestyle = match entry.lifestyle {
                Some(ref text) => text.parse::<Lifestyle>()?,
                None => cataloged.lifestyle,
            };
            self.register_descriptor(cataloged, lifestyle)?;
        }
        Ok(())
    }

    fn register_descriptor(
        &self,
        entry: &'static RegistrationDescriptor,
        lifestyle: Lifestyle,
    ) -> Result<()> {
        self.register_descriptor_as(entry, lifestyle, (entry.bindings)())
    }

    fn register_descriptor_as(
        &self,
        entry: &'static RegistrationDescriptor,
        lifestyle: Lifestyle,
        services: Vec<ServiceCast>,
    ) -> Result<()> {
        let construct = entry.construct;
        let factory: FactoryFn =
            Arc::new(move |resolver: &dyn Resolver, args: &Arguments| construct(resolver, args));
        self.inner
            .engine
            .read()
            .register(Registration::new(entry.key, lifestyle, services, factory))?;
        Ok(())
    }

    // ── Resolution ──

    /// Resolves a service by type.
    pub fn resolve<S: ?Sized + 'static>(&self) -> Result<Arc<S>> {
        self.mark_initialized();
        let resolved = self
            .inner
            .engine
            .read()
            .resolve(&ServiceId::of::<S>(), &Arguments::new())?;
        self.inner.track_current(&resolved.instance);
        Ok(unbox_service::<S>(resolved.service)?)
    }

    /// Resolves the component registered under `key` as service `S`.
    pub fn resolve_named<S: ?Sized + 'static>(&self, key: &str) -> Result<Arc<S>> {
        self.mark_initialized();
        let resolved = self
            .inner
            .engine
            .read()
            .resolve_keyed(key, &ServiceId::of::<S>())?;
        self.inner.track_current(&resolved.instance);
        Ok(unbox_service::<S>(resolved.service)?)
    }

    /// Resolves a service by type, passing constructor arguments to the
    /// factory.
    pub fn resolve_with<S: ?Sized + 'static>(&self, args: &Arguments) -> Result<Arc<S>> {
        self.mark_initialized();
        let resolved = self
            .inner
            .engine
            .read()
            .resolve(&ServiceId::of::<S>(), args)?;
        self.inner.track_current(&resolved.instance);
        Ok(unbox_service::<S>(resolved.service)?)
    }

    /// Resolves every component exposing service `S`, in registration
    /// order. No match yields an empty vector.
    pub fn resolve_all<S: ?Sized + 'static>(&self) -> Result<Vec<Arc<S>>> {
        self.mark_initialized();
        let all = self
            .inner
            .engine
            .read()
            .resolve_all(&ServiceId::of::<S>(), &Arguments::new())?;
        let mut services = Vec::with_capacity(all.len());
        for resolved in all {
            self.inner.track_current(&resolved.instance);
            services.push(unbox_service::<S>(resolved.service)?);
        }
        Ok(services)
    }

    // ── Release / teardown ──

    /// Releases a previously resolved instance back to the engine.
    pub fn release<S: ?Sized + 'static>(&self, instance: &Arc<S>) {
        let addr = Arc::as_ptr(instance) as *const () as usize;
        self.inner.engine.read().release_addr(addr);
    }

    /// Disposes the wrapped engine without replacing it. Every
    /// subsequent engine operation fails until [`Container::clear`].
    pub fn dispose(&self) {
        self.inner.engine.read().dispose();
    }

    /// Disposes the current engine and installs a fresh one, resetting
    /// the initialized flag.
    ///
    /// Scopes still open keep tracking into the disposed engine; their
    /// releases become no-ops. Serialize `clear` against in-flight
    /// resolutions externally.
    pub fn clear(&self) {
        info!("clearing container");
        let mut engine = self.inner.engine.write();
        engine.dispose();
        *engine = Engine::new();
        self.inner.initialized.store(false, Ordering::Release);
    }

    /// Whether any resolution has run since construction or the last
    /// [`Container::clear`].
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire) && !self.inner.engine.read().is_disposed()
    }

    /// Live (unreleased) transient instances in the engine.
    pub fn live_instances(&self) -> usize {
        self.inner.engine.read().live_instances()
    }

    /// Number of registered components.
    pub fn registered_components(&self) -> usize {
        self.inner.engine.read().registered_len()
    }

    fn mark_initialized(&self) {
        if !self.inner.initialized.swap(true, Ordering::AcqRel) {
            debug!("container initialized on first resolution");
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("registered", &self.registered_components())
            .field("open_scopes", &self.open_scopes())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl ContainerInner {
    /// Forwards a release to the engine.
    pub(crate) fn release_erased(&self, instance: &ErasedInstance) {
        self.engine.read().release(instance);
    }

    /// Tracks a resolved instance against the innermost open scope.
    fn track_current(&self, instance: &ErasedInstance) {
        let scope = self.scopes.lock().last().cloned();
        if let Some(scope) = scope {
            scope.track(self, instance);
        }
    }

    /// Pops scopes down to and including `id`, fully disposing every
    /// scope above it first (innermost outward). Scopes are popped
    /// before any release runs, so in-flight resolutions attach to the
    /// next outer scope.
    pub(crate) fn close_through(inner: &Arc<ContainerInner>, id: u64) {
        loop {
            let above = {
                let mut scopes = inner.scopes.lock();
                let Some(position) = scopes.iter().position(|core| core.id() == id) else {
                    return;
                };
                if position + 1 == scopes.len() {
                    scopes.pop();
                    return;
                }
                let Some(top) = scopes.pop() else {
                    return;
                };
                top
            };
            debug!(scope = above.id(), "cascade-closing nested scope");
            above.dispose();
        }
    }
}
