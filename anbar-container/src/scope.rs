//! Dependency scopes.
//!
//! A [`Scope`] tracks the instances resolved while it is the innermost
//! open scope and bulk-releases them when it is disposed. Tracking is
//! weak: a caller that drops every handle before disposal simply leaves
//! a dead reference behind, which disposal skips.
//!
//! Disposal order is the container's invariant: disposing a scope first
//! cascade-closes every scope opened after it (LIFO), then releases its
//! own tracked instances. The stack manipulation is direct and
//! synchronous: the scope calls back into the owning container, no
//! subscriber indirection.

use std::any::Any;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use anbar_engine::ErasedInstance;

use crate::container::ContainerInner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Active,
    Disposing,
    Disposed,
}

struct ScopeState {
    tracked: Vec<Weak<dyn Any + Send + Sync>>,
    phase: Phase,
}

/// Shared scope state; the container's stack and the caller's [`Scope`]
/// guard both hold it.
pub(crate) struct ScopeCore {
    id: u64,
    /// Back-reference, not ownership.
    container: Weak<ContainerInner>,
    state: Mutex<ScopeState>,
}

impl ScopeCore {
    pub(crate) fn new(id: u64, container: Weak<ContainerInner>) -> Arc<Self> {
        Arc::new(Self {
            id,
            container,
            state: Mutex::new(ScopeState {
                tracked: Vec::new(),
                phase: Phase::Active,
            }),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn tracked_count(&self) -> usize {
        self.state.lock().tracked.len()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.state.lock().phase == Phase::Disposed
    }

    /// Records a resolved instance against this scope.
    ///
    /// Once disposal has begun the instance is released immediately
    /// instead of tracked, so nothing slips past the bulk release.
    pub(crate) fn track(&self, container: &ContainerInner, instance: &ErasedInstance) {
        {
            let mut state = self.state.lock();
            if state.phase == Phase::Active {
                state.tracked.push(Arc::downgrade(instance));
                trace!(scope = self.id, "tracked resolved instance");
                return;
            }
        }
        trace!(scope = self.id, "scope closing; releasing late instance");
        container.release_erased(instance);
    }

    /// Disposes the scope: cascade-closes everything above it on the
    /// container's stack, then releases its own tracked instances.
    /// Idempotent; repeated calls return immediately.
    pub(crate) fn dispose(&self) {
        {
            let mut state = self.state.lock();
            if state.phase != Phase::Active {
                return;
            }
            state.phase = Phase::Disposing;
        }
        debug!(scope = self.id, "disposing scope");

        match self.container.upgrade() {
            Some(container) => {
                ContainerInner::close_through(&container, self.id);
                self.release_tracked(&container);
            }
            None => {
                // Container already gone; nothing left to release into.
                self.state.lock().tracked.clear();
            }
        }

        self.state.lock().phase = Phase::Disposed;
    }

    fn release_tracked(&self, container: &ContainerInner) {
        let tracked = {
            let mut state = self.state.lock();
            std::mem::take(&mut state.tracked)
        };

        for weak in tracked {
            match weak.upgrade() {
                Some(instance) => container.release_erased(&instance),
                None => trace!(scope = self.id, "skipping dead tracked reference"),
            }
        }
    }
}

/// Disposal guard for a unit of work.
///
/// Obtained from [`Container::begin`](crate::Container::begin). Dropping
/// the guard disposes the scope; [`Scope::dispose`] does so explicitly.
pub struct Scope {
    core: Arc<ScopeCore>,
}

impl Scope {
    pub(crate) fn new(core: Arc<ScopeCore>) -> Self {
        Self { core }
    }

    /// Stack identity of this scope.
    pub fn id(&self) -> u64 {
        self.core.id()
    }

    /// Number of tracked instance references (dead ones included).
    pub fn tracked_count(&self) -> usize {
        self.core.tracked_count()
    }

    /// Whether disposal has completed, possibly via an outer scope's
    /// cascade.
    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    /// Disposes the scope now instead of at drop.
    pub fn dispose(self) {
        // Drop impl does the work.
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.core.dispose();
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.core.id())
            .field("tracked", &self.core.tracked_count())
            .finish()
    }
}
