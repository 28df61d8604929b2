//! Disposal trait for resource cleanup.

/// Trait for synchronous resource disposal.
///
/// Implement this for components that need structured teardown (flushing
/// buffers, closing connections). Hooks registered through
/// [`Resolver::register_disposer`](crate::Resolver::register_disposer) run in
/// LIFO order when the owning scope is disposed, which for hosted services
/// happens when their session or call ends.
///
/// # Examples
///
/// ```
/// use ferrous_host::{Dispose, Lifetime, Resolver, ServiceCollection};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Connection {
///     closed: AtomicBool,
/// }
///
/// impl Dispose for Connection {
///     fn dispose(&self) {
///         self.closed.store(true, Ordering::SeqCst);
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services
///     .register_arc::<Connection, _>(|r| {
///         let conn = Arc::new(Connection { closed: AtomicBool::new(false) });
///         r.register_disposer(conn.clone());
///         Ok(conn)
///     })
///     .lifetime(Lifetime::Scoped)
///     .add();
///
/// let provider = services.build();
/// let scope = provider.begin_scope();
/// let conn = scope.get::<Connection>().unwrap();
/// scope.dispose();
/// assert!(conn.closed.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self);
}
