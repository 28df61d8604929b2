//! Resolver context for component factories.

use std::sync::Arc;

use crate::error::DiResult;
use crate::internal::Disposer;
use crate::key::{RegistrationId, TypeKey};
use crate::registration::{AnyArc, Parameter, Registry};
use crate::traits::ResolverCore;

/// Context passed to factory functions.
///
/// Wraps the resolver that owns the current resolution (root provider for
/// singletons, the requesting scope otherwise) together with the parameters
/// supplied for this one resolution. Nested resolutions through the context
/// do not inherit those parameters.
///
/// # Examples
///
/// ```
/// use ferrous_host::{Parameter, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Tenant(&'static str);
/// struct Greeter { tenant: Arc<Tenant> }
///
/// let mut services = ServiceCollection::new();
/// services
///     .register::<Greeter, _>(|ctx| {
///         let tenant = ctx.typed_parameter::<Tenant>().unwrap_or_else(|| Arc::new(Tenant("default")));
///         Ok(Greeter { tenant })
///     })
///     .add();
///
/// let provider = services.build();
/// let id = provider.registry().for_component(ferrous_host::TypeKey::of::<Greeter>()).unwrap().id();
/// let greeter = provider
///     .resolve_component(id, &[Parameter::typed(Arc::new(Tenant("acme")))])
///     .unwrap()
///     .downcast::<Greeter>()
///     .unwrap();
/// assert_eq!(greeter.tenant.0, "acme");
/// ```
pub struct ResolverContext<'a> {
    resolver: &'a dyn ResolverCore,
    parameters: &'a [Parameter],
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(resolver: &'a dyn ResolverCore, parameters: &'a [Parameter]) -> Self {
        Self {
            resolver,
            parameters,
        }
    }

    /// Parameters supplied for this resolution
    pub fn parameters(&self) -> &[Parameter] {
        self.parameters
    }

    /// The parameter matched by `key`.
    pub fn parameter(&self, key: TypeKey) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.key() == key)
    }

    /// First parameter whose value is a `T`, regardless of its key.
    pub fn typed_parameter<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.parameters
            .iter()
            .find_map(|p| p.value().clone().downcast::<T>().ok())
    }
}

impl<'a> ResolverCore for ResolverContext<'a> {
    fn registry(&self) -> &Registry {
        self.resolver.registry()
    }

    fn resolve_component(
        &self,
        registration: RegistrationId,
        parameters: &[Parameter],
    ) -> DiResult<AnyArc> {
        self.resolver.resolve_component(registration, parameters)
    }

    fn push_disposer(&self, f: Disposer) {
        self.resolver.push_disposer(f);
    }
}
