//! Resolver traits for component resolution.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::internal::Disposer;
use crate::key::{RegistrationId, TypeKey};
use crate::registration::{AnyArc, Parameter, Registry};
use crate::traits::Dispose;

/// Object-safe resolution primitives shared by the root provider, child
/// scopes and the context handed to factories.
pub trait ResolverCore: Send + Sync {
    /// Registry this resolver draws from
    fn registry(&self) -> &Registry;

    /// Resolves one registration, passing `parameters` to its factory.
    fn resolve_component(
        &self,
        registration: RegistrationId,
        parameters: &[Parameter],
    ) -> DiResult<Arc<dyn std::any::Any + Send + Sync>>;

    /// Queues a cleanup hook on the scope that owns the current resolution.
    fn push_disposer(&self, f: Disposer);
}

/// Typed resolution on top of [`ResolverCore`].
pub trait Resolver: ResolverCore {
    /// Resolves the component registered as concrete type `T`.
    fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let key = TypeKey::of::<T>();
        let registration = self
            .registry()
            .for_component(key)
            .ok_or(DiError::NotFound(key.name()))?;
        let any = self.resolve_component(registration.id(), &[])?;
        any.downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(key.name()))
    }

    /// Resolves the single component exposed as contract `C`.
    ///
    /// If several components implement `C` the most recently registered one
    /// is used, matching the by-type rule of [`get`](Resolver::get).
    fn get_contract<C: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<C>> {
        let key = TypeKey::of::<C>();
        let registration = self
            .registry()
            .registrations_for(key)
            .last()
            .copied()
            .ok_or(DiError::NotFound(key.name()))?;
        let any = self.resolve_component(registration.id(), &[])?;
        upcast_to::<C>(registration.upcast(key), &any)
    }

    /// Disposes `service` when the owning scope is disposed.
    fn register_disposer<T: Dispose>(&self, service: Arc<T>) {
        self.push_disposer(Box::new(move || service.dispose()));
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}

pub(crate) fn upcast_to<C: ?Sized + Send + Sync + 'static>(
    upcast: Option<&crate::registration::Upcast>,
    object: &AnyArc,
) -> DiResult<Arc<C>> {
    let name = std::any::type_name::<C>();
    let upcast = upcast.ok_or(DiError::NotFound(name))?;
    let boxed = upcast(object).ok_or(DiError::TypeMismatch(name))?;
    boxed
        .downcast::<Arc<C>>()
        .map(|inner| (*inner).clone())
        .map_err(|_| DiError::TypeMismatch(name))
}
