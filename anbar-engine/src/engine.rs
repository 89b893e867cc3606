//! # The Engine
//!
//! Owns the component registry and produces instances. The facade in
//! `anbar-container` forwards every registration and resolution here and
//! never reaches past this surface.
//!
//! # Architecture
//! ```text
//! Registration ──register()──> Engine
//!                                │
//!                            resolve*()
//!                                │
//!                                ▼
//!                            Resolved { instance, service }
//! ```
//!
//! Instance accounting: transient instances are entered into a tracker
//! keyed by allocation address, weakly, so a caller dropping every handle
//! simply leaves a dead entry behind. [`Engine::release`] removes the
//! entry and evicts per-request cache hits for the same allocation.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use anbar_support::rendering::suggest_similar;

use crate::arguments::Arguments;
use crate::error::{EngineError, NotRegisteredError, Result};
use crate::key::ServiceId;
use crate::lifestyle::Lifestyle;
use crate::registration::{ErasedInstance, Registration, Resolver};

/// Outcome of a resolution.
pub struct Resolved {
    /// The concrete instance handle; its allocation address is the
    /// release identity.
    pub instance: ErasedInstance,
    /// `Arc<Service>` boxed as `Any`; recover it with
    /// [`unbox_service`](crate::unbox_service).
    pub service: Box<dyn Any + Send + Sync>,
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved").finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Registry {
    components: Vec<Arc<Registration>>,
    by_key: HashMap<String, usize>,
    by_service: HashMap<TypeId, Vec<usize>>,
}

impl Registry {
    fn not_registered(&self, service: &ServiceId, key: Option<&str>) -> EngineError {
        let mut candidates: Vec<&str> = Vec::new();
        for registration in &self.components {
            candidates.push(registration.key());
            for cast in registration.services() {
                candidates.push(cast.service().type_name());
            }
        }

        let requested = key.unwrap_or_else(|| service.type_name());
        let suggestions = suggest_similar(requested, &candidates, 3);

        warn!(service = %service, ?key, "service not registered");
        EngineError::NotRegistered(NotRegisteredError {
            requested: service.clone(),
            key: key.map(str::to_string),
            suggestions,
        })
    }
}

fn instance_addr(instance: &ErasedInstance) -> usize {
    Arc::as_ptr(instance) as *const () as usize
}

/// The dependency injection engine.
///
/// Thread-safe; registrations may be added at any time. Destructive
/// operations ([`Engine::dispose`]) do not coordinate with in-flight
/// resolutions; callers serialize those externally.
pub struct Engine {
    registry: RwLock<Registry>,
    /// Live transient instances, keyed by allocation address.
    tracked: DashMap<usize, Weak<dyn Any + Send + Sync>>,
    /// Per-request instances, keyed by registration index.
    request_cache: DashMap<usize, ErasedInstance>,
    disposed: AtomicBool,
}

impl Engine {
    /// Creates an empty engine.
    pub fn new() -> Self {
        debug!("engine created");
        Self {
            registry: RwLock::new(Registry::default()),
            tracked: DashMap::new(),
            request_cache: DashMap::new(),
            disposed: AtomicBool::new(false),
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(EngineError::Disposed);
        }
        Ok(())
    }

    /// Registers a component.
    ///
    /// # Errors
    /// [`EngineError::AlreadyRegistered`] when the key is taken;
    /// [`EngineError::Disposed`] after [`Engine::dispose`].
    pub fn register(&self, registration: Registration) -> Result<()> {
        self.ensure_live()?;

        let mut registry = self.registry.write();
        if registry.by_key.contains_key(registration.key()) {
            return Err(EngineError::AlreadyRegistered {
                key: registration.key().to_string(),
            });
        }

        debug!(
            key = registration.key(),
            lifestyle = %registration.lifestyle(),
            services = registration.services().len(),
            "registered component"
        );

        let index = registry.components.len();
        registry
            .by_key
            .insert(registration.key().to_string(), index);
        for cast in registration.services() {
            registry
                .by_service
                .entry(cast.service().type_id())
                .or_default()
                .push(index);
        }
        registry.components.push(Arc::new(registration));
        Ok(())
    }

    /// Resolves the first component exposing `service`.
    pub fn resolve(&self, service: &ServiceId, args: &Arguments) -> Result<Resolved> {
        self.ensure_live()?;
        trace!(service = %service, "resolving");

        let (index, registration) = {
            let registry = self.registry.read();
            let index = registry
                .by_service
                .get(&service.type_id())
                .and_then(|indices| indices.first().copied())
                .ok_or_else(|| registry.not_registered(service, None))?;
            (index, Arc::clone(&registry.components[index]))
        };

        self.instantiate(index, &registration, service, args)
    }

    /// Resolves the component registered under `key` as `service`.
    pub fn resolve_keyed(&self, key: &str, service: &ServiceId) -> Result<Resolved> {
        self.ensure_live()?;
        trace!(key, service = %service, "resolving by key");

        let (index, registration) = {
            let registry = self.registry.read();
            let index = *registry
                .by_key
                .get(key)
                .ok_or_else(|| registry.not_registered(service, Some(key)))?;
            (index, Arc::clone(&registry.components[index]))
        };

        self.instantiate(index, &registration, service, args_none())
    }

    /// Resolves every component exposing `service`, in registration order.
    ///
    /// No matching component yields an empty vector, not an error.
    pub fn resolve_all(&self, service: &ServiceId, args: &Arguments) -> Result<Vec<Resolved>> {
        self.ensure_live()?;
        trace!(service = %service, "resolving all");

        let targets: Vec<(usize, Arc<Registration>)> = {
            let registry = self.registry.read();
            registry
                .by_service
                .get(&service.type_id())
                .map(|indices| {
                    indices
                        .iter()
                        .map(|&index| (index, Arc::clone(&registry.components[index])))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut resolved = Vec::with_capacity(targets.len());
        for (index, registration) in &targets {
            resolved.push(self.instantiate(*index, registration, service, args)?);
        }
        Ok(resolved)
    }

    /// Builds (or fetches the cached) instance for one registration and
    /// casts it to the requested service.
    fn instantiate(
        &self,
        index: usize,
        registration: &Arc<Registration>,
        service: &ServiceId,
        args: &Arguments,
    ) -> Result<Resolved> {
        let resolver = EngineResolver { engine: self };

        let instance = match registration.lifestyle() {
            Lifestyle::Singleton => registration
                .singleton
                .get_or_try_init(|| (registration.factory)(&resolver, args))?
                .clone(),
            Lifestyle::Transient => {
                let instance = (registration.factory)(&resolver, args)?;
                self.tracked
                    .insert(instance_addr(&instance), Arc::downgrade(&instance));
                instance
            }
            Lifestyle::PerRequest => {
                let cached = self
                    .request_cache
                    .get(&index)
                    .map(|entry| entry.value().clone());
                match cached {
                    Some(instance) => instance,
                    None => {
                        let instance = (registration.factory)(&resolver, args)?;
                        self.request_cache.insert(index, Arc::clone(&instance));
                        instance
                    }
                }
            }
        };

        let cast = registration
            .services()
            .iter()
            .find(|cast| cast.service().type_id() == service.type_id())
            .ok_or_else(|| EngineError::ServiceNotExposed {
                key: registration.key().to_string(),
                service: service.clone(),
            })?;

        let service_box = cast
            .apply(&instance)
            .ok_or_else(|| EngineError::TypeMismatch {
                service: service.clone(),
            })?;

        Ok(Resolved {
            instance,
            service: service_box,
        })
    }

    /// Releases a previously resolved instance.
    ///
    /// Removes it from the live-instance tracker and evicts a matching
    /// per-request cache entry. Releasing a singleton is a no-op.
    pub fn release(&self, instance: &ErasedInstance) {
        self.release_addr(instance_addr(instance));
    }

    /// Releases by allocation address (see [`Resolved::instance`]).
    pub fn release_addr(&self, addr: usize) {
        if self.tracked.remove(&addr).is_some() {
            trace!(addr, "released tracked instance");
        }
        self.request_cache
            .retain(|_, cached| instance_addr(cached) != addr);
        // Drop entries whose instances are already gone.
        self.tracked.retain(|_, weak| weak.strong_count() > 0);
    }

    /// Number of transient instances still alive and unreleased.
    pub fn live_instances(&self) -> usize {
        self.tracked
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }

    /// Number of registered components.
    pub fn registered_len(&self) -> usize {
        self.registry.read().components.len()
    }

    /// Tears the engine down. Registrations and caches are dropped;
    /// every subsequent operation fails with [`EngineError::Disposed`].
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("engine disposed");
        self.request_cache.clear();
        self.tracked.clear();
        *self.registry.write() = Registry::default();
    }

    /// Whether [`Engine::dispose`] has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("registered", &self.registered_len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

fn args_none() -> &'static Arguments {
    static EMPTY: once_cell::sync::Lazy<Arguments> = once_cell::sync::Lazy::new(Arguments::new);
    &EMPTY
}

/// Resolver handed to factories; re-enters the engine without holding
/// any registry lock.
struct EngineResolver<'a> {
    engine: &'a Engine,
}

impl Resolver for EngineResolver<'_> {
    fn resolve_service(&self, service: &ServiceId) -> Result<Box<dyn Any + Send + Sync>> {
        self.engine
            .resolve(service, args_none())
            .map(|resolved| resolved.service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings;
    use crate::registration::{erase, resolve, unbox_service, FactoryFn};

    trait Mailer: Send + Sync {
        fn send(&self, to: &str) -> String;
    }

    struct SmtpMailer {
        host: String,
    }

    impl Mailer for SmtpMailer {
        fn send(&self, to: &str) -> String {
            format!("smtp://{}/{to}", self.host)
        }
    }

    struct SendmailMailer;

    impl Mailer for SendmailMailer {
        fn send(&self, to: &str) -> String {
            format!("sendmail:{to}")
        }
    }

    struct Notifier {
        mailer: Arc<dyn Mailer>,
    }

    fn smtp_factory() -> FactoryFn {
        Arc::new(|_, _| {
            Ok(erase(SmtpMailer {
                host: "mail.local".to_string(),
            }))
        })
    }

    fn register_smtp(engine: &Engine, key: &str, lifestyle: Lifestyle) {
        engine
            .register(Registration::new(
                key,
                lifestyle,
                bindings![SmtpMailer => dyn Mailer, SmtpMailer],
                smtp_factory(),
            ))
            .unwrap();
    }

    fn resolve_mailer(engine: &Engine) -> Arc<dyn Mailer> {
        let resolved = engine
            .resolve(&ServiceId::of::<dyn Mailer>(), &Arguments::new())
            .unwrap();
        unbox_service::<dyn Mailer>(resolved.service).unwrap()
    }

    #[test]
    fn singleton_resolutions_share_one_instance() {
        let engine = Engine::new();
        register_smtp(&engine, "smtp", Lifestyle::Singleton);

        let first = resolve_mailer(&engine);
        let second = resolve_mailer(&engine);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn transient_resolutions_are_distinct() {
        let engine = Engine::new();
        register_smtp(&engine, "smtp", Lifestyle::Transient);

        let first = resolve_mailer(&engine);
        let second = resolve_mailer(&engine);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(engine.live_instances(), 2);
    }

    #[test]
    fn release_forgets_a_transient() {
        let engine = Engine::new();
        register_smtp(&engine, "smtp", Lifestyle::Transient);

        let resolved = engine
            .resolve(&ServiceId::of::<dyn Mailer>(), &Arguments::new())
            .unwrap();
        assert_eq!(engine.live_instances(), 1);

        engine.release(&resolved.instance);
        assert_eq!(engine.live_instances(), 0);
    }

    #[test]
    fn dropped_transient_leaves_no_live_entry() {
        let engine = Engine::new();
        register_smtp(&engine, "smtp", Lifestyle::Transient);

        let mailer = resolve_mailer(&engine);
        assert_eq!(engine.live_instances(), 1);

        drop(mailer);
        assert_eq!(engine.live_instances(), 0);
    }

    #[test]
    fn per_request_caches_until_released() {
        let engine = Engine::new();
        register_smtp(&engine, "smtp", Lifestyle::PerRequest);

        let first = engine
            .resolve(&ServiceId::of::<dyn Mailer>(), &Arguments::new())
            .unwrap();
        let second = engine
            .resolve(&ServiceId::of::<dyn Mailer>(), &Arguments::new())
            .unwrap();
        assert!(Arc::ptr_eq(&first.instance, &second.instance));

        engine.release(&first.instance);

        let third = engine
            .resolve(&ServiceId::of::<dyn Mailer>(), &Arguments::new())
            .unwrap();
        assert!(!Arc::ptr_eq(&first.instance, &third.instance));
    }

    #[test]
    fn keyed_resolution_targets_one_component() {
        let engine = Engine::new();
        register_smtp(&engine, "smtp", Lifestyle::Singleton);
        engine
            .register(Registration::new(
                "sendmail",
                Lifestyle::Singleton,
                bindings![SendmailMailer => dyn Mailer],
                Arc::new(|_, _| Ok(erase(SendmailMailer))),
            ))
            .unwrap();

        let resolved = engine
            .resolve_keyed("sendmail", &ServiceId::of::<dyn Mailer>())
            .unwrap();
        let mailer = unbox_service::<dyn Mailer>(resolved.service).unwrap();
        assert_eq!(mailer.send("ops"), "sendmail:ops");
    }

    #[test]
    fn keyed_resolution_matches_typed_resolution_for_singletons() {
        let engine = Engine::new();
        register_smtp(&engine, "smtp", Lifestyle::Singleton);

        let typed = resolve_mailer(&engine);
        let keyed = engine
            .resolve_keyed("smtp", &ServiceId::of::<dyn Mailer>())
            .unwrap();
        let keyed = unbox_service::<dyn Mailer>(keyed.service).unwrap();
        assert!(Arc::ptr_eq(&typed, &keyed));
    }

    #[test]
    fn resolve_all_returns_registration_order() {
        let engine = Engine::new();
        register_smtp(&engine, "smtp", Lifestyle::Singleton);
        engine
            .register(Registration::new(
                "sendmail",
                Lifestyle::Singleton,
                bindings![SendmailMailer => dyn Mailer],
                Arc::new(|_, _| Ok(erase(SendmailMailer))),
            ))
            .unwrap();

        let all = engine
            .resolve_all(&ServiceId::of::<dyn Mailer>(), &Arguments::new())
            .unwrap();
        assert_eq!(all.len(), 2);

        let mailers: Vec<Arc<dyn Mailer>> = all
            .into_iter()
            .map(|r| unbox_service::<dyn Mailer>(r.service).unwrap())
            .collect();
        assert_eq!(mailers[0].send("x"), "smtp://mail.local/x");
        assert_eq!(mailers[1].send("x"), "sendmail:x");
    }

    #[test]
    fn resolve_all_unknown_service_is_empty() {
        let engine = Engine::new();
        let all = engine
            .resolve_all(&ServiceId::of::<dyn Mailer>(), &Arguments::new())
            .unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let engine = Engine::new();
        register_smtp(&engine, "smtp", Lifestyle::Singleton);

        let result = engine.register(Registration::new(
            "smtp",
            Lifestyle::Transient,
            bindings![SendmailMailer => dyn Mailer],
            Arc::new(|_, _| Ok(erase(SendmailMailer))),
        ));

        match result.unwrap_err() {
            EngineError::AlreadyRegistered { key } => assert_eq!(key, "smtp"),
            other => panic!("Expected AlreadyRegistered, got: {other:?}"),
        }
    }

    #[test]
    fn unknown_service_reports_suggestions() {
        let engine = Engine::new();
        register_smtp(&engine, "mailer", Lifestyle::Singleton);

        let result = engine.resolve(&ServiceId::of::<String>(), &Arguments::new());
        match result.unwrap_err() {
            EngineError::NotRegistered(err) => {
                assert!(err.requested.type_name().contains("String"));
                assert!(err.key.is_none());
            }
            other => panic!("Expected NotRegistered, got: {other:?}"),
        }
    }

    #[test]
    fn unknown_key_reports_key() {
        let engine = Engine::new();
        register_smtp(&engine, "smtp", Lifestyle::Singleton);

        let result = engine.resolve_keyed("smtp_mailer", &ServiceId::of::<dyn Mailer>());
        match result.unwrap_err() {
            EngineError::NotRegistered(err) => {
                assert_eq!(err.key.as_deref(), Some("smtp_mailer"));
                assert_eq!(err.suggestions.first().map(String::as_str), Some("smtp"));
            }
            other => panic!("Expected NotRegistered, got: {other:?}"),
        }
    }

    #[test]
    fn keyed_component_must_expose_requested_service() {
        let engine = Engine::new();
        register_smtp(&engine, "smtp", Lifestyle::Singleton);

        let result = engine.resolve_keyed("smtp", &ServiceId::of::<String>());
        match result.unwrap_err() {
            EngineError::ServiceNotExposed { key, service } => {
                assert_eq!(key, "smtp");
                assert!(service.type_name().contains("String"));
            }
            other => panic!("Expected ServiceNotExposed, got: {other:?}"),
        }
    }

    #[test]
    fn factories_resolve_sub_dependencies() {
        let engine = Engine::new();
        register_smtp(&engine, "smtp", Lifestyle::Singleton);
        engine
            .register(Registration::new(
                "notifier",
                Lifestyle::Transient,
                bindings![Notifier => Notifier],
                Arc::new(|r, _| {
                    let mailer: Arc<dyn Mailer> = resolve(r)?;
                    Ok(erase(Notifier { mailer }))
                }),
            ))
            .unwrap();

        let resolved = engine
            .resolve(&ServiceId::of::<Notifier>(), &Arguments::new())
            .unwrap();
        let notifier = unbox_service::<Notifier>(resolved.service).unwrap();
        assert_eq!(notifier.mailer.send("dev"), "smtp://mail.local/dev");
    }

    #[test]
    fn construction_arguments_reach_the_factory() {
        let engine = Engine::new();
        engine
            .register(Registration::new(
                "smtp",
                Lifestyle::Transient,
                bindings![SmtpMailer => dyn Mailer],
                Arc::new(|_, args: &Arguments| {
                    let host = args
                        .get::<String>()
                        .cloned()
                        .unwrap_or_else(|| "default.local".to_string());
                    Ok(erase(SmtpMailer { host }))
                }),
            ))
            .unwrap();

        let args = Arguments::new().with("override.local".to_string());
        let resolved = engine.resolve(&ServiceId::of::<dyn Mailer>(), &args).unwrap();
        let mailer = unbox_service::<dyn Mailer>(resolved.service).unwrap();
        assert_eq!(mailer.send("x"), "smtp://override.local/x");

        let resolved = engine
            .resolve(&ServiceId::of::<dyn Mailer>(), &Arguments::new())
            .unwrap();
        let mailer = unbox_service::<dyn Mailer>(resolved.service).unwrap();
        assert_eq!(mailer.send("x"), "smtp://default.local/x");
    }

    #[test]
    fn prebuilt_instance_resolves_as_itself() {
        let engine = Engine::new();
        let value = erase(SmtpMailer {
            host: "prebuilt.local".to_string(),
        });
        engine
            .register(Registration::instance(
                "prebuilt",
                value,
                bindings![SmtpMailer => dyn Mailer, SmtpMailer],
            ))
            .unwrap();

        let first = resolve_mailer(&engine);
        let second = resolve_mailer(&engine);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.send("x"), "smtp://prebuilt.local/x");
    }

    #[test]
    fn disposed_engine_rejects_operations() {
        let engine = Engine::new();
        register_smtp(&engine, "smtp", Lifestyle::Singleton);

        engine.dispose();
        assert!(engine.is_disposed());
        assert_eq!(engine.registered_len(), 0);

        let result = engine.resolve(&ServiceId::of::<dyn Mailer>(), &Arguments::new());
        assert!(matches!(result.unwrap_err(), EngineError::Disposed));

        let result = engine.register(Registration::new(
            "late",
            Lifestyle::Singleton,
            bindings![SendmailMailer => dyn Mailer],
            Arc::new(|_, _| Ok(erase(SendmailMailer))),
        ));
        assert!(matches!(result.unwrap_err(), EngineError::Disposed));
    }

    #[test]
    fn dispose_is_idempotent() {
        let engine = Engine::new();
        engine.dispose();
        engine.dispose();
        assert!(engine.is_disposed());
    }

    #[test]
    fn debug_shows_registration_count() {
        let engine = Engine::new();
        register_smtp(&engine, "smtp", Lifestyle::Singleton);
        let debug = format!("{engine:?}");
        assert!(debug.contains("Engine"));
        assert!(debug.contains('1'));
    }
}
