//! Child scopes and their disposal.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::ServiceProvider;
use crate::error::{DiError, DiResult};
use crate::internal::{DisposeBag, Disposer, StackGuard};
use crate::key::RegistrationId;
use crate::lifetime::Lifetime;
use crate::observer::Observers;
use crate::registration::{AnyArc, Parameter, Registry};
use crate::traits::ResolverCore;

/// State shared by the root and by child scopes.
pub(crate) struct ScopeCore {
    id: u64,
    scoped: Mutex<HashMap<RegistrationId, AnyArc>>,
    disposers: Mutex<DisposeBag>,
    disposed: AtomicBool,
}

impl ScopeCore {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            scoped: Mutex::new(HashMap::new()),
            disposers: Mutex::new(DisposeBag::default()),
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Queues `f` for disposal, or runs it at once if the scope is already
    /// disposed.
    pub(crate) fn push_disposer(&self, f: Disposer) {
        let mut disposers = self.disposers.lock();
        if !self.is_disposed() {
            disposers.push(f);
            return;
        }
        drop(disposers);
        tracing::trace!(scope = self.id, "disposal hook registered after dispose");
        f();
    }

    /// Returns false if the scope was already disposed.
    pub(crate) fn dispose(&self, observers: &Observers) -> bool {
        // The flag flips under the disposers lock, so every hook is either in
        // the drained bag or sees the flag in `push_disposer`.
        let bag = {
            let mut disposers = self.disposers.lock();
            if self.disposed.swap(true, Ordering::AcqRel) {
                return false;
            }
            disposers.take()
        };
        // Hooks run outside the lock; a hook may touch another scope.
        let hooks = bag.run_reverse();
        self.scoped.lock().clear();

        tracing::debug!(scope = self.id, hooks, "scope disposed");
        observers.scope_disposed(self.id);
        true
    }
}

/// A child resolution scope.
///
/// Scoped components are cached per scope; singletons come from the root.
/// A scope is disposed exactly once, either explicitly with
/// [`dispose`](Scope::dispose) or when dropped, and refuses to resolve
/// anything afterwards.
///
/// # Examples
///
/// ```
/// use ferrous_host::{Lifetime, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct RequestId(u32);
///
/// let mut services = ServiceCollection::new();
/// services.register::<RequestId, _>(|_| Ok(RequestId(7))).lifetime(Lifetime::Scoped).add();
///
/// let provider = services.build();
/// let scope1 = provider.begin_scope();
/// let scope2 = provider.begin_scope();
///
/// let a = scope1.get::<RequestId>().unwrap();
/// assert!(Arc::ptr_eq(&a, &scope1.get::<RequestId>().unwrap()));
/// assert!(!Arc::ptr_eq(&a, &scope2.get::<RequestId>().unwrap()));
///
/// scope1.dispose();
/// assert!(scope1.get::<RequestId>().is_err());
/// ```
pub struct Scope {
    provider: ServiceProvider,
    parent: u64,
    core: ScopeCore,
}

impl Scope {
    pub(crate) fn open(provider: ServiceProvider, parent: u64) -> Self {
        let id = provider.allocate_scope_id();
        tracing::debug!(scope = id, parent, "scope opened");
        provider.observers().scope_opened(id);
        Self {
            provider,
            parent,
            core: ScopeCore::new(id),
        }
    }

    /// Unique id of this scope
    pub fn id(&self) -> u64 {
        self.core.id
    }

    /// Id of the scope this one was opened from
    pub fn parent_id(&self) -> u64 {
        self.parent
    }

    /// Root provider
    pub fn provider(&self) -> &ServiceProvider {
        &self.provider
    }

    /// Registry backing this scope
    pub fn registry(&self) -> &Registry {
        self.provider.registry()
    }

    /// Opens a nested scope. Disposing this scope does not dispose the child.
    pub fn begin_scope(&self) -> Scope {
        Scope::open(self.provider.clone(), self.core.id)
    }

    /// Resolves `registration` in this scope.
    pub fn resolve_component(
        &self,
        registration: RegistrationId,
        parameters: &[Parameter],
    ) -> DiResult<AnyArc> {
        if self.core.is_disposed() {
            return Err(DiError::ScopeDisposed(self.core.id));
        }
        let reg = self.provider.lookup(registration)?;
        match reg.lifetime {
            Lifetime::Singleton => self.provider.resolve_singleton(reg, parameters),
            Lifetime::Scoped => {
                if let Some(cached) = self.core.scoped.lock().get(&registration) {
                    return Ok(cached.clone());
                }
                let _guard = StackGuard::enter(reg.component.name())?;
                // Build without holding the lock; the first stored value wins.
                let value = self.provider.construct(reg, self, parameters)?;
                let mut cache = self.core.scoped.lock();
                // Disposal clears the cache after setting the flag.
                if self.core.is_disposed() {
                    return Err(DiError::ScopeDisposed(self.core.id));
                }
                Ok(cache.entry(registration).or_insert(value).clone())
            }
            Lifetime::Transient => {
                let _guard = StackGuard::enter(reg.component.name())?;
                let value = self.provider.construct(reg, self, parameters)?;
                if self.core.is_disposed() {
                    return Err(DiError::ScopeDisposed(self.core.id));
                }
                Ok(value)
            }
        }
    }

    /// Runs this scope's disposal hooks in LIFO order and releases its scoped
    /// components. Returns true only for the call that performed the disposal.
    pub fn dispose(&self) -> bool {
        self.core.dispose(self.provider.observers())
    }

    /// True once disposed
    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }
}

impl ResolverCore for Scope {
    fn registry(&self) -> &Registry {
        self.provider.registry()
    }

    fn resolve_component(
        &self,
        registration: RegistrationId,
        parameters: &[Parameter],
    ) -> DiResult<AnyArc> {
        Scope::resolve_component(self, registration, parameters)
    }

    fn push_disposer(&self, f: Disposer) {
        self.core.push_disposer(f);
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.core.id)
            .field("parent", &self.parent)
            .field("disposed", &self.core.is_disposed())
            .finish()
    }
}
