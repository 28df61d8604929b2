//! Contract-to-registration resolution.

use super::behavior::{resolve_behavior_or, ServiceBehavior};
use super::contract::ContractDescription;
use crate::error::{HostError, HostResult};
use crate::registration::{Registration, Registry};

/// Finds the registration implementing a contract, and its behavior.
///
/// A contract must be implemented by exactly one registration; anything else
/// is a configuration error.
///
/// # Examples
///
/// ```
/// use ferrous_host::host::{InstanceContextMode, RegistrationResolver, ServiceBehavior};
/// use ferrous_host::{ContractDescription, ServiceCollection};
/// use std::sync::Arc;
///
/// trait Echo: Send + Sync {}
/// struct EchoService;
/// impl Echo for EchoService {}
///
/// let mut services = ServiceCollection::new();
/// services
///     .register::<EchoService, _>(|_| Ok(EchoService))
///     .implements(ContractDescription::of::<dyn Echo>(), |s| s as Arc<dyn Echo>)
///     .with_behavior(ServiceBehavior::with_mode(InstanceContextMode::PerCall))
///     .add();
/// let provider = services.build();
///
/// let resolver = RegistrationResolver::new(provider.registry());
/// let resolved = resolver.classify(&ContractDescription::of::<dyn Echo>()).unwrap();
/// assert_eq!(resolved.behavior.instance_context_mode, InstanceContextMode::PerCall);
/// ```
#[derive(Debug, Clone)]
pub struct RegistrationResolver<'a> {
    registry: &'a Registry,
    fallback: ServiceBehavior,
}

/// A contract's registration together with its resolved behavior.
#[derive(Debug, Clone)]
pub struct ResolvedContract<'a> {
    pub registration: &'a Registration,
    pub behavior: ServiceBehavior,
}

impl<'a> RegistrationResolver<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            fallback: ServiceBehavior::default(),
        }
    }

    /// Behavior for registrations that neither carry nor declare one.
    pub fn with_fallback(mut self, fallback: ServiceBehavior) -> Self {
        self.fallback = fallback;
        self
    }

    /// The single registration implementing `contract`.
    pub fn resolve(&self, contract: &ContractDescription) -> HostResult<&'a Registration> {
        let key = contract.contract_type();
        let matches = self.registry.registrations_for(key);
        match matches.as_slice() {
            [registration] => Ok(*registration),
            [] => Err(HostError::NoRegistration {
                contract: key.name(),
            }),
            many => Err(HostError::AmbiguousRegistration {
                contract: key.name(),
                count: many.len(),
            }),
        }
    }

    /// Behavior of `registration` (metadata, declared, fallback).
    pub fn behavior_for(&self, registration: &Registration) -> HostResult<ServiceBehavior> {
        resolve_behavior_or(registration, &self.fallback)
    }

    /// [`resolve`](Self::resolve) followed by [`behavior_for`](Self::behavior_for).
    pub fn classify(&self, contract: &ContractDescription) -> HostResult<ResolvedContract<'a>> {
        let registration = self.resolve(contract)?;
        let behavior = self.behavior_for(registration)?;
        Ok(ResolvedContract {
            registration,
            behavior,
        })
    }
}
