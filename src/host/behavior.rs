//! Hosting behavior attached to a registration.
//!
//! Behavior is looked up in three tiers: the registration's `behavior`
//! metadata, then the behavior the component type declares through
//! [`DeclaredBehavior`], then [`ServiceBehavior::default`].

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{HostError, HostResult};
use crate::registration::Registration;

/// Metadata key under which a registration carries its [`ServiceBehavior`].
pub const BEHAVIOR_METADATA: &str = "behavior";

/// How instance contexts are shared between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(try_from = "String", into = "String"))]
pub enum InstanceContextMode {
    /// One context and one object for the life of the process
    Single,
    /// One context per session (channel)
    #[default]
    PerSession,
    /// A fresh context for every call
    PerCall,
}

impl InstanceContextMode {
    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceContextMode::Single => "Single",
            InstanceContextMode::PerSession => "PerSession",
            InstanceContextMode::PerCall => "PerCall",
        }
    }
}

impl fmt::Display for InstanceContextMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceContextMode {
    type Err = HostError;

    /// Case-insensitive; `Singleton` is accepted for `Single`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "singleton" => Ok(InstanceContextMode::Single),
            "persession" | "per_session" => Ok(InstanceContextMode::PerSession),
            "percall" | "per_call" => Ok(InstanceContextMode::PerCall),
            _ => Err(HostError::UnknownInstanceMode(s.to_string())),
        }
    }
}

impl TryFrom<String> for InstanceContextMode {
    type Error = HostError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InstanceContextMode> for String {
    fn from(mode: InstanceContextMode) -> Self {
        mode.as_str().to_string()
    }
}

/// How many threads may run inside one service object at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
pub enum ConcurrencyMode {
    /// One call at a time
    #[default]
    Single,
    /// One call at a time, but outgoing calls release the object
    Reentrant,
    /// Any number of concurrent calls
    Multiple,
}

/// How incoming messages' `to` addresses are matched against the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
pub enum AddressFilterMode {
    /// Address must equal the endpoint address
    #[default]
    Exact,
    /// Address must start with the endpoint address
    Prefix,
    /// Any address is accepted
    Any,
}

/// Dispatch behavior of a service component.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ServiceBehavior {
    pub instance_context_mode: InstanceContextMode,
    pub concurrency_mode: ConcurrencyMode,
    pub ensure_ordered_dispatch: bool,
    pub validate_must_understand: bool,
    pub automatic_session_shutdown: bool,
    pub transaction_auto_complete_on_session_close: bool,
    pub release_service_instance_on_transaction_complete: bool,
    pub use_synchronization_context: bool,
    pub address_filter_mode: AddressFilterMode,
    pub ignore_extension_data_object: bool,
    pub max_items_in_object_graph: u32,
}

impl Default for ServiceBehavior {
    fn default() -> Self {
        Self {
            instance_context_mode: InstanceContextMode::PerSession,
            concurrency_mode: ConcurrencyMode::Single,
            ensure_ordered_dispatch: false,
            validate_must_understand: true,
            automatic_session_shutdown: true,
            transaction_auto_complete_on_session_close: false,
            release_service_instance_on_transaction_complete: true,
            use_synchronization_context: true,
            address_filter_mode: AddressFilterMode::Exact,
            ignore_extension_data_object: false,
            max_items_in_object_graph: 65_536,
        }
    }
}

impl ServiceBehavior {
    /// Default behavior with the given instancing mode.
    pub fn with_mode(instance_context_mode: InstanceContextMode) -> Self {
        Self {
            instance_context_mode,
            ..Self::default()
        }
    }

    /// Sets the concurrency mode.
    pub fn concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency_mode = mode;
        self
    }

    /// Sets the address filter mode.
    pub fn address_filter(mut self, mode: AddressFilterMode) -> Self {
        self.address_filter_mode = mode;
        self
    }
}

/// Behavior declared by a component type itself.
///
/// Consulted when the registration has no `behavior` metadata; see
/// [`ServiceCollection::register_declared`](crate::ServiceCollection::register_declared).
///
/// # Examples
///
/// ```
/// use ferrous_host::host::{DeclaredBehavior, InstanceContextMode, ServiceBehavior};
///
/// struct Calculator;
///
/// impl DeclaredBehavior for Calculator {
///     fn behavior() -> ServiceBehavior {
///         ServiceBehavior::with_mode(InstanceContextMode::PerCall)
///     }
/// }
///
/// assert_eq!(Calculator::behavior().instance_context_mode, InstanceContextMode::PerCall);
/// ```
pub trait DeclaredBehavior {
    /// The behavior of every instance of this type
    fn behavior() -> ServiceBehavior;
}

/// Resolves the behavior of `registration`: metadata, then declared, then default.
///
/// A `behavior` metadata entry that is not a [`ServiceBehavior`] is a
/// configuration error rather than silently ignored.
pub fn resolve_behavior(registration: &Registration) -> HostResult<ServiceBehavior> {
    resolve_behavior_or(registration, &ServiceBehavior::default())
}

/// Like [`resolve_behavior`] with `fallback` as the last tier.
pub fn resolve_behavior_or(
    registration: &Registration,
    fallback: &ServiceBehavior,
) -> HostResult<ServiceBehavior> {
    if let Some(value) = registration.metadata(BEHAVIOR_METADATA) {
        return value
            .downcast_ref::<ServiceBehavior>()
            .cloned()
            .ok_or(HostError::InvalidBehaviorMetadata {
                component: registration.component().name(),
            });
    }
    Ok(registration
        .declared_behavior()
        .cloned()
        .unwrap_or_else(|| fallback.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mode_names() {
        assert_eq!("PerCall".parse::<InstanceContextMode>().unwrap(), InstanceContextMode::PerCall);
        assert_eq!(" singleton ".parse::<InstanceContextMode>().unwrap(), InstanceContextMode::Single);
        assert_eq!("persession".parse::<InstanceContextMode>().unwrap(), InstanceContextMode::PerSession);

        match "Pooled".parse::<InstanceContextMode>() {
            Err(HostError::UnknownInstanceMode(name)) => assert_eq!(name, "Pooled"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn defaults_match_host_defaults() {
        let behavior = ServiceBehavior::default();
        assert_eq!(behavior.instance_context_mode, InstanceContextMode::PerSession);
        assert_eq!(behavior.concurrency_mode, ConcurrencyMode::Single);
        assert_eq!(behavior.address_filter_mode, AddressFilterMode::Exact);
        assert_eq!(behavior.max_items_in_object_graph, 65_536);
        assert!(behavior.automatic_session_shutdown);
    }
}
