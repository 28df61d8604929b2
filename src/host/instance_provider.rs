//! Service object resolution for an instance context.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::binding::ContextBinding;
use super::channel::CallbackChannel;
use super::dispatch::Message;
use super::instance_context::InstanceContext;
use crate::error::{HostError, HostResult};
use crate::key::{RegistrationId, TypeKey};
use crate::registration::{AnyArc, ContractBinding, Parameter, Registration};
use crate::traits::resolver::upcast_to;

/// Resolves the service object backing an instance context.
///
/// Non-singleton contexts resolve the registration from their binding's
/// scope on every call; whether that yields a new object depends on the
/// registration's container lifetime. Duplex contracts get the caller's
/// channel as a [`CallbackChannel`] parameter keyed by the callback contract.
pub struct InstanceProvider {
    registration: RegistrationId,
    component: TypeKey,
    callback_contract: Option<TypeKey>,
    contracts: Arc<[ContractBinding]>,
}

impl InstanceProvider {
    /// Provider for `registration`, passing a callback channel when
    /// `callback_contract` is set.
    pub fn new(registration: &Registration, callback_contract: Option<TypeKey>) -> Self {
        Self {
            registration: registration.id(),
            component: registration.component(),
            callback_contract,
            contracts: registration.contracts.clone().into(),
        }
    }

    /// Registration this provider resolves
    pub fn registration(&self) -> RegistrationId {
        self.registration
    }

    /// Callback contract injected for duplex calls
    pub fn callback_contract(&self) -> Option<TypeKey> {
        self.callback_contract
    }

    /// Service object for `context`.
    pub fn get_instance(&self, context: &InstanceContext) -> HostResult<ServiceInstance> {
        if let Some(object) = context.service_object() {
            return Ok(self.wrap(object.clone()));
        }
        let binding = context
            .binding()
            .ok_or(HostError::Consistency("instance context was never initialized"))?;
        let parameters = self.parameters(binding)?;
        let object = binding
            .scope()
            .resolve_component(self.registration, &parameters)?;
        Ok(self.wrap(object))
    }

    /// Same as [`get_instance`](Self::get_instance); the message plays no part.
    pub fn get_instance_for_message(
        &self,
        context: &InstanceContext,
        _message: &Message,
    ) -> HostResult<ServiceInstance> {
        self.get_instance(context)
    }

    /// No-op: objects are released when their scope is disposed.
    pub fn release_instance(&self, _context: &InstanceContext, _instance: ServiceInstance) {}

    fn parameters(&self, binding: &ContextBinding) -> HostResult<Vec<Parameter>> {
        let Some(contract) = self.callback_contract else {
            return Ok(Vec::new());
        };
        let channel = binding
            .channel()
            .ok_or(HostError::Consistency("duplex contract without a live channel"))?;
        Ok(vec![Parameter::keyed(
            contract,
            Arc::new(CallbackChannel::new(contract, channel)),
        )])
    }

    fn wrap(&self, object: AnyArc) -> ServiceInstance {
        ServiceInstance {
            object,
            component: self.component,
            contracts: self.contracts.clone(),
        }
    }
}

impl fmt::Debug for InstanceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceProvider")
            .field("registration", &self.registration)
            .field("component", &self.component)
            .field("callback_contract", &self.callback_contract)
            .finish()
    }
}

/// A resolved service object, viewable as any contract its registration
/// implements.
#[derive(Clone)]
pub struct ServiceInstance {
    object: AnyArc,
    component: TypeKey,
    contracts: Arc<[ContractBinding]>,
}

impl ServiceInstance {
    /// Concrete component type
    pub fn component(&self) -> TypeKey {
        self.component
    }

    /// The object as its concrete type.
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.object.clone().downcast::<T>().ok()
    }

    /// The object as contract `C`.
    pub fn contract<C: ?Sized + Send + Sync + 'static>(&self) -> HostResult<Arc<C>> {
        let key = TypeKey::of::<C>();
        let upcast = self
            .contracts
            .iter()
            .find(|c| c.description.contract_type() == key)
            .map(|c| &c.upcast);
        Ok(upcast_to::<C>(upcast, &self.object)?)
    }

    /// True when both wrap the same object.
    pub fn ptr_eq(&self, other: &ServiceInstance) -> bool {
        Arc::ptr_eq(&self.object, &other.object)
    }

    /// The type-erased object
    pub fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self.object.as_ref()
    }
}

impl fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}
