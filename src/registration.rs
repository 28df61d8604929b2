//! Component registrations and the built registry.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::DiResult;
use crate::host::{ContractDescription, ServiceBehavior};
use crate::key::{RegistrationId, TypeKey};
use crate::lifetime::Lifetime;
use crate::provider::ResolverContext;

/// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type Ctor = Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync>;

/// Maps the component object to `Arc<Arc<dyn Contract>>` (boxed as `AnyArc`).
pub(crate) type Upcast = Arc<dyn Fn(&AnyArc) -> Option<AnyArc> + Send + Sync>;

/// Extra value handed to a component factory for one resolution.
///
/// Parameters are matched by type key. The hosting layer uses this to pass a
/// duplex caller's channel, keyed by the callback contract.
#[derive(Clone)]
pub struct Parameter {
    key: TypeKey,
    value: AnyArc,
}

impl Parameter {
    /// Parameter keyed by the type of its value.
    pub fn typed<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            key: TypeKey::of::<T>(),
            value,
        }
    }

    /// Parameter keyed by an arbitrary type (for example a `dyn Callback` contract).
    pub fn keyed<T: Send + Sync + 'static>(key: TypeKey, value: Arc<T>) -> Self {
        Self { key, value }
    }

    /// Key this parameter is matched by
    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub(crate) fn value(&self) -> &AnyArc {
        &self.value
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter").field("key", &self.key).finish_non_exhaustive()
    }
}

/// A contract implemented by a registration, with the cast from the component.
#[derive(Clone)]
pub(crate) struct ContractBinding {
    pub(crate) description: ContractDescription,
    pub(crate) upcast: Upcast,
}

/// A registered component: its type, lifetime, contracts and metadata.
///
/// Immutable once the [`ServiceCollection`](crate::ServiceCollection) is built.
pub struct Registration {
    pub(crate) id: RegistrationId,
    pub(crate) component: TypeKey,
    pub(crate) lifetime: Lifetime,
    pub(crate) ctor: Ctor,
    pub(crate) contracts: Vec<ContractBinding>,
    pub(crate) metadata: HashMap<&'static str, AnyArc>,
    /// Behavior declared on the component type itself
    pub(crate) declared: Option<ServiceBehavior>,
    /// Singleton cache; only populated for `Lifetime::Singleton`
    pub(crate) singleton: OnceCell<AnyArc>,
}

impl Registration {
    /// Registry position
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    /// Concrete component type
    pub fn component(&self) -> TypeKey {
        self.component
    }

    /// Container lifetime
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Contracts this component is exposed as
    pub fn contracts(&self) -> impl Iterator<Item = &ContractDescription> {
        self.contracts.iter().map(|c| &c.description)
    }

    /// True if the component is exposed as `contract`.
    pub fn implements(&self, contract: TypeKey) -> bool {
        self.contracts
            .iter()
            .any(|c| c.description.contract_type() == contract)
    }

    /// Raw metadata entry
    pub fn metadata(&self, name: &str) -> Option<&(dyn Any + Send + Sync)> {
        self.metadata.get(name).map(|v| v.as_ref())
    }

    /// Typed metadata entry; `None` if absent or of another type.
    pub fn metadata_as<M: 'static>(&self, name: &str) -> Option<&M> {
        self.metadata(name).and_then(|v| v.downcast_ref::<M>())
    }

    /// Behavior declared by the component type, if any
    pub fn declared_behavior(&self) -> Option<&ServiceBehavior> {
        self.declared.as_ref()
    }

    pub(crate) fn upcast(&self, contract: TypeKey) -> Option<&Upcast> {
        self.contracts
            .iter()
            .find(|c| c.description.contract_type() == contract)
            .map(|c| &c.upcast)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("component", &self.component)
            .field("lifetime", &self.lifetime)
            .field(
                "contracts",
                &self
                    .contracts
                    .iter()
                    .map(|c| c.description.name())
                    .collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// All registrations, with lookup by component and by contract.
#[derive(Debug, Default)]
pub struct Registry {
    registrations: Vec<Registration>,
    by_component: HashMap<TypeKey, RegistrationId>,
    by_contract: HashMap<TypeKey, Vec<RegistrationId>>,
}

impl Registry {
    pub(crate) fn new(registrations: Vec<Registration>) -> Self {
        let mut by_component = HashMap::new();
        let mut by_contract: HashMap<TypeKey, Vec<RegistrationId>> = HashMap::new();

        for reg in &registrations {
            // last registration of a component type wins for by-type lookup
            by_component.insert(reg.component, reg.id);
            for contract in &reg.contracts {
                by_contract
                    .entry(contract.description.contract_type())
                    .or_default()
                    .push(reg.id);
            }
        }

        Self {
            registrations,
            by_component,
            by_contract,
        }
    }

    /// Registration by id
    pub fn get(&self, id: RegistrationId) -> Option<&Registration> {
        self.registrations.get(id.0)
    }

    /// Every registration, in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.registrations.iter()
    }

    /// Number of registrations
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Registration whose component type is `component`.
    pub fn for_component(&self, component: TypeKey) -> Option<&Registration> {
        self.by_component
            .get(&component)
            .and_then(|id| self.get(*id))
    }

    /// Registrations exposed as `contract`.
    pub fn registrations_for(&self, contract: TypeKey) -> Vec<&Registration> {
        self.by_contract
            .get(&contract)
            .map(|ids| ids.iter().filter_map(|id| self.get(*id)).collect())
            .unwrap_or_default()
    }
}
