//! Diagnostic observers for container activity.
//!
//! Observers see every component construction and every scope opened or
//! disposed. Hosts use them to correlate service instances with the sessions
//! and calls that own their scopes.

use std::sync::Arc;
use std::time::Duration;

/// Hooks invoked by the container.
///
/// Only [`resolved`](DiObserver::resolved) is required; the scope hooks
/// default to no-ops.
///
/// # Examples
///
/// ```
/// use ferrous_host::{DiObserver, Lifetime, ServiceCollection};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct ScopeCounter {
///     opened: AtomicUsize,
/// }
///
/// impl DiObserver for ScopeCounter {
///     fn resolved(&self, _component: &'static str, _duration: Duration) {}
///     fn scope_opened(&self, _scope: u64) {
///         self.opened.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// let counter = Arc::new(ScopeCounter::default());
/// let mut services = ServiceCollection::new();
/// services.add_observer(counter.clone());
/// let provider = services.build();
/// let _scope = provider.begin_scope();
/// assert_eq!(counter.opened.load(Ordering::SeqCst), 1);
/// ```
pub trait DiObserver: Send + Sync {
    /// A component factory ran to completion (successfully or not).
    fn resolved(&self, component: &'static str, duration: Duration);

    /// A child scope was opened.
    fn scope_opened(&self, _scope: u64) {}

    /// A scope (or the root, id 0) was disposed.
    fn scope_disposed(&self, _scope: u64) {}
}

#[derive(Default)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn resolved(&self, component: &'static str, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(component, duration);
        }
    }

    #[inline]
    pub(crate) fn scope_opened(&self, scope: u64) {
        for observer in &self.observers {
            observer.scope_opened(scope);
        }
    }

    #[inline]
    pub(crate) fn scope_disposed(&self, scope: u64) {
        for observer in &self.observers {
            observer.scope_disposed(scope);
        }
    }
}

/// Observer that emits `tracing` events at `trace` level.
pub struct TracingObserver {
    target: &'static str,
}

impl TracingObserver {
    /// Observer labelled `ferrous_host`
    pub fn new() -> Self {
        Self {
            target: "ferrous_host",
        }
    }

    /// Observer with a custom label recorded in the `observer` field
    pub fn with_label(target: &'static str) -> Self {
        Self { target }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl DiObserver for TracingObserver {
    fn resolved(&self, component: &'static str, duration: Duration) {
        tracing::trace!(observer = self.target, component, ?duration, "resolved");
    }

    fn scope_opened(&self, scope: u64) {
        tracing::trace!(observer = self.target, scope, "scope opened");
    }

    fn scope_disposed(&self, scope: u64) {
        tracing::trace!(observer = self.target, scope, "scope disposed");
    }
}
