//! Component lifetime definitions.

/// Component lifetimes controlling instance caching inside the container
///
/// This is the container's own caching rule and is independent of the host's
/// instance context mode: a PerSession service may still be registered as
/// `Transient` (a fresh object per `get_instance`) or `Scoped` (one object per
/// session scope).
///
/// # Examples
///
/// ```rust
/// use ferrous_host::{Lifetime, Resolver, ServiceCollection};
///
/// struct Clock;
/// struct Repository;
///
/// let mut services = ServiceCollection::new();
/// services.register::<Clock, _>(|_| Ok(Clock)).lifetime(Lifetime::Singleton).add();
/// services.register::<Repository, _>(|_| Ok(Repository)).lifetime(Lifetime::Scoped).add();
///
/// let provider = services.build();
/// let scope = provider.begin_scope();
/// let a = scope.get::<Repository>().unwrap();
/// let b = scope.get::<Repository>().unwrap();
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifetime {
    /// Single instance per root provider, cached forever
    Singleton,
    /// Single instance per scope, cached for scope lifetime
    ///
    /// Scoped components cannot be resolved from the root provider.
    Scoped,
    /// New instance per resolution, never cached
    #[default]
    Transient,
}
