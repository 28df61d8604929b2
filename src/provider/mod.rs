//! Root service provider.
//!
//! The [`ServiceProvider`] is the root scope of the container: it owns the
//! registry, caches singletons and opens child [`Scope`]s.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{DiError, DiResult};
use crate::internal::{Disposer, StackGuard};
use crate::key::RegistrationId;
use crate::lifetime::Lifetime;
use crate::observer::Observers;
use crate::registration::{AnyArc, Parameter, Registration, Registry};
use crate::traits::ResolverCore;

pub mod context;
pub mod scope;

pub use context::ResolverContext;
pub use scope::Scope;
use scope::ScopeCore;

/// Id of the root scope.
pub const ROOT_SCOPE_ID: u64 = 0;

/// Root of the container.
///
/// Cheap to clone; every clone shares the same registry, singleton cache and
/// root disposal hooks. Scoped components cannot be resolved here.
///
/// # Examples
///
/// ```
/// use ferrous_host::{Lifetime, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let mut services = ServiceCollection::new();
/// services.add_instance(Database { url: "postgres://localhost".to_string() });
/// services
///     .register::<UserService, _>(|r| Ok(UserService { db: r.get::<Database>()? }))
///     .add();
///
/// let provider = services.build();
/// let users = provider.get::<UserService>().unwrap();
/// assert_eq!(users.db.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

pub(crate) struct ProviderInner {
    registry: Registry,
    root: ScopeCore,
    observers: Observers,
    next_scope_id: AtomicU64,
}

impl ServiceProvider {
    pub(crate) fn new(registry: Registry, observers: Observers) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                registry,
                root: ScopeCore::new(ROOT_SCOPE_ID),
                observers,
                next_scope_id: AtomicU64::new(ROOT_SCOPE_ID + 1),
            }),
        }
    }

    /// Registry backing this provider
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Resolves `registration` from the root, passing `parameters` to its factory.
    pub fn resolve_component(
        &self,
        registration: RegistrationId,
        parameters: &[Parameter],
    ) -> DiResult<AnyArc> {
        if self.inner.root.is_disposed() {
            return Err(DiError::ScopeDisposed(ROOT_SCOPE_ID));
        }
        let reg = self.lookup(registration)?;
        match reg.lifetime {
            Lifetime::Singleton => self.resolve_singleton(reg, parameters),
            Lifetime::Scoped => Err(DiError::WrongLifetime(
                "Cannot resolve scoped service from root provider",
            )),
            Lifetime::Transient => {
                let _guard = StackGuard::enter(reg.component.name())?;
                self.construct(reg, self, parameters)
            }
        }
    }

    /// Opens a child scope of the root.
    pub fn begin_scope(&self) -> Scope {
        Scope::open(self.clone(), ROOT_SCOPE_ID)
    }

    /// Runs the root disposal hooks (those registered while building
    /// singletons) in LIFO order. Later calls are no-ops.
    pub fn dispose_all(&self) {
        self.inner.root.dispose(&self.inner.observers);
    }

    /// True once [`dispose_all`](Self::dispose_all) has run
    pub fn is_disposed(&self) -> bool {
        self.inner.root.is_disposed()
    }

    /// True when both handles point at the same root.
    pub fn same_root(&self, other: &ServiceProvider) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn observers(&self) -> &Observers {
        &self.inner.observers
    }

    pub(crate) fn allocate_scope_id(&self) -> u64 {
        self.inner.next_scope_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn lookup(&self, registration: RegistrationId) -> DiResult<&Registration> {
        self.inner
            .registry
            .get(registration)
            .ok_or(DiError::NotFound("registration"))
    }

    /// Singletons are built against the root, whichever scope asked first.
    pub(crate) fn resolve_singleton(
        &self,
        reg: &Registration,
        parameters: &[Parameter],
    ) -> DiResult<AnyArc> {
        if let Some(value) = reg.singleton.get() {
            return Ok(value.clone());
        }
        // Guard before the cell: re-entering a cell that is initialising on
        // the same thread would deadlock instead of reporting the cycle.
        let _guard = StackGuard::enter(reg.component.name())?;
        reg.singleton
            .get_or_try_init(|| self.construct(reg, self, parameters))
            .cloned()
    }

    pub(crate) fn construct(
        &self,
        reg: &Registration,
        resolver: &dyn ResolverCore,
        parameters: &[Parameter],
    ) -> DiResult<AnyArc> {
        let ctx = ResolverContext::new(resolver, parameters);
        if !self.inner.observers.has_observers() {
            return (reg.ctor)(&ctx);
        }
        let start = Instant::now();
        let result = (reg.ctor)(&ctx);
        self.inner
            .observers
            .resolved(reg.component.name(), start.elapsed());
        result
    }

    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        let mut s = String::new();
        s.push_str("=== Service Provider Debug ===\n");
        for reg in self.registry().iter() {
            s.push_str(&format!("  {:?}\n", reg));
        }
        s
    }
}

impl ResolverCore for ServiceProvider {
    fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    fn resolve_component(
        &self,
        registration: RegistrationId,
        parameters: &[Parameter],
    ) -> DiResult<AnyArc> {
        ServiceProvider::resolve_component(self, registration, parameters)
    }

    fn push_disposer(&self, f: Disposer) {
        self.inner.root.push_disposer(f);
    }
}

impl Drop for ProviderInner {
    fn drop(&mut self) {
        self.root.dispose(&self.observers);
    }
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("registrations", &self.inner.registry.len())
            .field("disposed", &self.inner.root.is_disposed())
            .finish()
    }
}
