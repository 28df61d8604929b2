//! Service collection: registration API and provider construction.

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::DiResult;
use crate::host::{ContractDescription, DeclaredBehavior, ServiceBehavior, BEHAVIOR_METADATA};
use crate::key::{RegistrationId, TypeKey};
use crate::lifetime::Lifetime;
use crate::observer::{DiObserver, Observers};
use crate::provider::{ResolverContext, ServiceProvider};
use crate::registration::{AnyArc, ContractBinding, Ctor, Registration, Registry};

/// Mutable set of registrations, turned into a [`ServiceProvider`] by
/// [`build`](ServiceCollection::build).
///
/// # Examples
///
/// ```rust
/// use ferrous_host::{ContractDescription, Lifetime, ServiceCollection};
/// use std::sync::Arc;
///
/// trait Echo: Send + Sync {
///     fn echo(&self, text: &str) -> String;
/// }
///
/// struct EchoService;
/// impl Echo for EchoService {
///     fn echo(&self, text: &str) -> String { text.to_string() }
/// }
///
/// let mut services = ServiceCollection::new();
/// services
///     .register::<EchoService, _>(|_| Ok(EchoService))
///     .lifetime(Lifetime::Transient)
///     .implements(ContractDescription::of::<dyn Echo>(), |s| s as Arc<dyn Echo>)
///     .add();
///
/// let provider = services.build();
/// assert_eq!(provider.registry().len(), 1);
/// ```
pub struct ServiceCollection {
    registrations: Vec<Registration>,
    observers: Observers,
}

impl ServiceCollection {
    /// Creates a new empty service collection.
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            observers: Observers::new(),
        }
    }

    /// Registers an existing value as a singleton component.
    pub fn add_instance<T: Send + Sync + 'static>(&mut self, value: T) -> RegistrationId {
        let value = Arc::new(value);
        self.register_arc::<T, _>(move |_| Ok(value.clone()))
            .lifetime(Lifetime::Singleton)
            .add()
    }

    /// Starts a registration for component `T` built by `factory`.
    ///
    /// The registration defaults to [`Lifetime::Transient`] and is only
    /// recorded once [`RegistrationBuilder::add`] is called.
    pub fn register<T, F>(&mut self, factory: F) -> RegistrationBuilder<'_, T>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        let ctor: Ctor = Arc::new(move |ctx: &ResolverContext<'_>| -> DiResult<AnyArc> {
            Ok(Arc::new(factory(ctx)?))
        });
        RegistrationBuilder::new(self, ctor, None)
    }

    /// Like [`register`](Self::register) for factories that already produce
    /// an `Arc`, typically because they also register it for disposal.
    pub fn register_arc<T, F>(&mut self, factory: F) -> RegistrationBuilder<'_, T>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        let ctor: Ctor = Arc::new(move |ctx: &ResolverContext<'_>| -> DiResult<AnyArc> {
            Ok(factory(ctx)?)
        });
        RegistrationBuilder::new(self, ctor, None)
    }

    /// Registers a component whose type declares its own hosting behavior.
    ///
    /// The declared behavior is used when the registration carries no
    /// `behavior` metadata.
    pub fn register_declared<T, F>(&mut self, factory: F) -> RegistrationBuilder<'_, T>
    where
        T: DeclaredBehavior + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        let mut builder = self.register::<T, F>(factory);
        builder.declared = Some(T::behavior());
        builder
    }

    /// Adds an observer notified of resolutions and scope transitions.
    pub fn add_observer(&mut self, observer: Arc<dyn DiObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    /// Number of recorded registrations
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// True when nothing has been registered
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Freezes the registrations into a root provider.
    pub fn build(self) -> ServiceProvider {
        ServiceProvider::new(Registry::new(self.registrations), self.observers)
    }
}

impl Default for ServiceCollection {
    fn default() -> Self {
        Self::new()
    }
}

/// Pending registration for component `T`.
#[must_use = "call `add()` to record the registration"]
pub struct RegistrationBuilder<'a, T> {
    collection: &'a mut ServiceCollection,
    ctor: Ctor,
    lifetime: Lifetime,
    contracts: Vec<ContractBinding>,
    metadata: HashMap<&'static str, AnyArc>,
    declared: Option<ServiceBehavior>,
    _component: PhantomData<fn() -> T>,
}

impl<'a, T: Send + Sync + 'static> RegistrationBuilder<'a, T> {
    fn new(
        collection: &'a mut ServiceCollection,
        ctor: Ctor,
        declared: Option<ServiceBehavior>,
    ) -> Self {
        Self {
            collection,
            ctor,
            lifetime: Lifetime::default(),
            contracts: Vec::new(),
            metadata: HashMap::new(),
            declared,
            _component: PhantomData,
        }
    }

    /// Container lifetime of the component
    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Exposes the component as contract `C`.
    ///
    /// `upcast` converts the component into the contract's trait object; for a
    /// plain trait implementation it is just `|s| s as Arc<dyn C>`.
    ///
    /// # Panics
    ///
    /// Panics if `contract` describes a type other than `C`.
    pub fn implements<C, F>(mut self, contract: ContractDescription, upcast: F) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<C> + Send + Sync + 'static,
    {
        assert_eq!(
            contract.contract_type(),
            TypeKey::of::<C>(),
            "contract description `{}` does not describe the upcast target",
            contract.name()
        );
        let upcast = Arc::new(move |object: &AnyArc| -> Option<AnyArc> {
            let component = object.clone().downcast::<T>().ok()?;
            Some(Arc::new(upcast(component)) as AnyArc)
        });
        self.contracts.push(ContractBinding {
            description: contract,
            upcast,
        });
        self
    }

    /// Attaches a named metadata value.
    pub fn with_metadata<M: Any + Send + Sync>(mut self, name: &'static str, value: M) -> Self {
        self.metadata.insert(name, Arc::new(value));
        self
    }

    /// Attaches hosting behavior as registration metadata; it takes precedence
    /// over any behavior declared by the component type.
    pub fn with_behavior(self, behavior: ServiceBehavior) -> Self {
        self.with_metadata(BEHAVIOR_METADATA, behavior)
    }

    /// Records the registration and returns its id.
    pub fn add(self) -> RegistrationId {
        let id = RegistrationId(self.collection.registrations.len());
        self.collection.registrations.push(Registration {
            id,
            component: TypeKey::of::<T>(),
            lifetime: self.lifetime,
            ctor: self.ctor,
            contracts: self.contracts,
            metadata: self.metadata,
            declared: self.declared,
            singleton: once_cell::sync::OnceCell::new(),
        });
        id
    }
}
