//! Scope-lifetime binding for RPC service hosting.
//!
//! Service objects are resolved from the container instead of being created
//! by the host, and each object's scope follows the instancing mode of its
//! registration:
//!
//! - [`SingletonPolicy`]: one object, resolved once from the root.
//! - [`PerSessionPolicy`]: one child scope per channel, disposed when the
//!   channel closes or faults.
//! - [`PerCallPolicy`]: one child scope per call, disposed when the call's
//!   instance context closes.
//!
//! [`ServiceHost::open`] runs the [`DispatchConfigurer`], which finds the one
//! registration implementing each endpoint's contract and installs the
//! matching policy plus an [`InstanceProvider`] into the endpoint's
//! [`DispatchRuntime`]. The host then drives those hooks for every message.

mod behavior;
mod binding;
mod channel;
mod configurer;
mod contract;
mod dispatch;
mod instance_context;
mod instance_provider;
mod lifecycle;
mod policy;
mod resolver;
mod service_host;

pub use behavior::{
    resolve_behavior, resolve_behavior_or, AddressFilterMode, ConcurrencyMode, DeclaredBehavior,
    InstanceContextMode, ServiceBehavior, BEHAVIOR_METADATA,
};
pub use binding::{BindingScope, BindingState, ContextBinding, IdleCallback, TeardownCause};
pub use channel::{CallbackChannel, Channel, ChannelId, MemoryChannel, SessionSlot};
pub use configurer::{ConfiguredContract, DispatchConfigurer};
pub use contract::{ContractDescription, DEFAULT_NAMESPACE};
pub use dispatch::{
    AddressFilter, ChannelDispatcher, DispatchRuntime, EndpointDispatcher, Message,
    SerializerSettings, ServiceDescription, ServiceEndpoint,
};
pub use instance_context::InstanceContext;
pub use instance_provider::{InstanceProvider, ServiceInstance};
pub use lifecycle::{
    CommunicationState, LifecycleEvent, LifecycleEvents, LifecycleHandler, SubscriptionId,
};
pub use policy::{
    policy_for, InstanceContextProvider, PerCallPolicy, PerSessionPolicy, SingletonPolicy,
};
pub use resolver::{RegistrationResolver, ResolvedContract};
pub use service_host::{HostConfig, ServiceHost};
