//! Host-side dispatch descriptors.
//!
//! These mirror what a transport runtime exposes to its extensions: channel
//! dispatchers (one per listener/binding) holding endpoint dispatchers, each
//! with a dispatch runtime where instancing hooks and behavior flags are
//! installed.

use std::fmt;
use std::sync::Arc;

use super::behavior::{AddressFilterMode, ConcurrencyMode};
use super::contract::ContractDescription;
use super::instance_provider::InstanceProvider;
use super::policy::InstanceContextProvider;

/// An incoming message, reduced to what dispatch looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    action: String,
    to: String,
}

impl Message {
    pub fn new(action: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            to: to.into(),
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// Destination address
    pub fn to(&self) -> &str {
        &self.to
    }
}

/// Decides whether a message addressed to `to` belongs to an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressFilter {
    /// Everything matches
    MatchAll,
    /// Addresses starting with the prefix match
    Prefix(String),
    /// Only the exact address matches
    Exact(String),
}

impl AddressFilter {
    /// Filter of kind `mode` for `address`.
    pub fn for_mode(mode: AddressFilterMode, address: &str) -> Self {
        match mode {
            AddressFilterMode::Any => AddressFilter::MatchAll,
            AddressFilterMode::Prefix => AddressFilter::Prefix(address.to_string()),
            AddressFilterMode::Exact => AddressFilter::Exact(address.to_string()),
        }
    }

    pub fn matches(&self, to: &str) -> bool {
        match self {
            AddressFilter::MatchAll => true,
            AddressFilter::Prefix(prefix) => to.starts_with(prefix.as_str()),
            AddressFilter::Exact(address) => to == address,
        }
    }
}

/// Serializer limits applied per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializerSettings {
    pub ignore_extension_data_object: bool,
    pub max_items_in_object_graph: u32,
}

impl Default for SerializerSettings {
    fn default() -> Self {
        Self {
            ignore_extension_data_object: false,
            max_items_in_object_graph: 65_536,
        }
    }
}

/// Per-endpoint runtime settings and installed instancing hooks.
#[derive(Clone)]
pub struct DispatchRuntime {
    pub concurrency_mode: ConcurrencyMode,
    pub ensure_ordered_dispatch: bool,
    pub validate_must_understand: bool,
    pub automatic_input_session_shutdown: bool,
    pub transaction_auto_complete_on_session_close: bool,
    pub release_service_instance_on_transaction_complete: bool,
    pub use_synchronization_context: bool,
    pub serializer: SerializerSettings,
    /// Installed by [`DispatchConfigurer`](super::DispatchConfigurer)
    pub instance_context_provider: Option<Arc<dyn InstanceContextProvider>>,
    /// Installed by [`DispatchConfigurer`](super::DispatchConfigurer)
    pub instance_provider: Option<Arc<InstanceProvider>>,
}

impl Default for DispatchRuntime {
    fn default() -> Self {
        Self {
            concurrency_mode: ConcurrencyMode::Single,
            ensure_ordered_dispatch: false,
            validate_must_understand: true,
            automatic_input_session_shutdown: true,
            transaction_auto_complete_on_session_close: false,
            release_service_instance_on_transaction_complete: true,
            use_synchronization_context: true,
            serializer: SerializerSettings::default(),
            instance_context_provider: None,
            instance_provider: None,
        }
    }
}

impl fmt::Debug for DispatchRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchRuntime")
            .field("concurrency_mode", &self.concurrency_mode)
            .field("ensure_ordered_dispatch", &self.ensure_ordered_dispatch)
            .field("serializer", &self.serializer)
            .field(
                "instance_context_provider",
                &self.instance_context_provider.as_ref().map(|p| p.mode()),
            )
            .field("instance_provider", &self.instance_provider)
            .finish_non_exhaustive()
    }
}

/// One endpoint as seen by the dispatcher.
#[derive(Debug, Clone)]
pub struct EndpointDispatcher {
    pub address: String,
    pub contract_name: String,
    pub contract_namespace: String,
    /// Infrastructure endpoints (metadata exchange and the like) are skipped
    /// when instancing is configured.
    pub is_system_endpoint: bool,
    pub address_filter: AddressFilter,
    pub runtime: DispatchRuntime,
}

impl EndpointDispatcher {
    /// Endpoint serving `contract` at `address`, with an exact address filter.
    pub fn new(address: impl Into<String>, contract: &ContractDescription) -> Self {
        let address = address.into();
        Self {
            address_filter: AddressFilter::Exact(address.clone()),
            address,
            contract_name: contract.name().to_string(),
            contract_namespace: contract.namespace().to_string(),
            is_system_endpoint: false,
            runtime: DispatchRuntime::default(),
        }
    }

    /// Infrastructure endpoint that instancing leaves alone.
    pub fn system(
        address: impl Into<String>,
        contract_name: impl Into<String>,
        contract_namespace: impl Into<String>,
    ) -> Self {
        let address = address.into();
        Self {
            address_filter: AddressFilter::Exact(address.clone()),
            address,
            contract_name: contract_name.into(),
            contract_namespace: contract_namespace.into(),
            is_system_endpoint: true,
            runtime: DispatchRuntime::default(),
        }
    }

    /// True when this dispatcher serves `endpoint`.
    pub fn serves(&self, endpoint: &ServiceEndpoint) -> bool {
        self.address == endpoint.address
            && self.contract_name == endpoint.contract.name()
            && self.contract_namespace == endpoint.contract.namespace()
    }
}

/// Dispatchers for one listener.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    pub binding_name: String,
    pub endpoints: Vec<EndpointDispatcher>,
}

impl ChannelDispatcher {
    pub fn new(binding_name: impl Into<String>) -> Self {
        Self {
            binding_name: binding_name.into(),
            endpoints: Vec::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: EndpointDispatcher) -> Self {
        self.endpoints.push(endpoint);
        self
    }
}

/// An endpoint of the service description: a contract at an address.
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    pub address: String,
    pub contract: ContractDescription,
}

impl ServiceEndpoint {
    pub fn new(address: impl Into<String>, contract: ContractDescription) -> Self {
        Self {
            address: address.into(),
            contract,
        }
    }
}

/// What the host exposes: its endpoints and the contracts it implements.
#[derive(Debug, Clone, Default)]
pub struct ServiceDescription {
    pub configuration_name: String,
    pub endpoints: Vec<ServiceEndpoint>,
    /// Implemented contracts by configuration name, in registration order
    pub contracts: Vec<ContractDescription>,
}

impl ServiceDescription {
    /// Implemented contract with the given configuration name.
    pub fn contract(&self, configuration_name: &str) -> Option<&ContractDescription> {
        self.contracts
            .iter()
            .find(|c| c.configuration_name() == configuration_name)
    }
}
