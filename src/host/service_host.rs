//! The service host: description, endpoints, and startup.

use std::fmt;

use super::behavior::ServiceBehavior;
use super::configurer::{ConfiguredContract, DispatchConfigurer};
use super::contract::ContractDescription;
use super::dispatch::{
    ChannelDispatcher, EndpointDispatcher, ServiceDescription, ServiceEndpoint,
};
use super::lifecycle::CommunicationState;
use crate::config::HostOptions;
use crate::error::{HostError, HostResult};
use crate::provider::ServiceProvider;

/// Everything a host needs at startup. Passed in explicitly; there is no
/// process-wide container.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub provider: ServiceProvider,
    pub options: HostOptions,
}

impl HostConfig {
    pub fn new(provider: ServiceProvider) -> Self {
        Self {
            provider,
            options: HostOptions::default(),
        }
    }

    pub fn with_options(mut self, options: HostOptions) -> Self {
        self.options = options;
        self
    }
}

/// Hosts the services of one container.
///
/// The description's contracts are taken from the registrations. Endpoints
/// are added before [`open`](ServiceHost::open), which installs the
/// instancing hooks into every endpoint dispatcher and fails on any
/// configuration error before a call is served.
///
/// # Examples
///
/// ```
/// use ferrous_host::host::{CommunicationState, HostConfig, ServiceHost};
/// use ferrous_host::{ContractDescription, ServiceCollection};
/// use std::sync::Arc;
///
/// trait Echo: Send + Sync {
///     fn echo(&self, text: &str) -> String;
/// }
/// struct EchoService;
/// impl Echo for EchoService {
///     fn echo(&self, text: &str) -> String { text.to_string() }
/// }
///
/// let mut services = ServiceCollection::new();
/// services
///     .register::<EchoService, _>(|_| Ok(EchoService))
///     .implements(ContractDescription::of::<dyn Echo>(), |s| s as Arc<dyn Echo>)
///     .add();
///
/// let mut host = ServiceHost::new(HostConfig::new(services.build())).unwrap();
/// host.add_endpoint("Echo", "net.tcp://localhost/echo", "netTcp").unwrap();
/// host.open().unwrap();
///
/// assert_eq!(host.state(), CommunicationState::Opened);
/// let endpoint = host.endpoint("net.tcp://localhost/echo", "Echo").unwrap();
/// assert!(endpoint.runtime.instance_provider.is_some());
/// ```
pub struct ServiceHost {
    config: HostConfig,
    description: ServiceDescription,
    dispatchers: Vec<ChannelDispatcher>,
    configured: Vec<ConfiguredContract>,
    state: CommunicationState,
}

impl ServiceHost {
    /// Builds the description from the provider's registrations.
    ///
    /// Fails if two different contract types share a configuration name.
    pub fn new(config: HostConfig) -> HostResult<Self> {
        let mut contracts: Vec<ContractDescription> = Vec::new();
        for registration in config.provider.registry().iter() {
            for contract in registration.contracts() {
                match contracts
                    .iter()
                    .find(|c| c.configuration_name() == contract.configuration_name())
                {
                    Some(existing) if existing.contract_type() != contract.contract_type() => {
                        return Err(HostError::Config {
                            message: format!(
                                "contracts `{}` and `{}` share the configuration name `{}`",
                                existing.contract_type(),
                                contract.contract_type(),
                                contract.configuration_name()
                            ),
                        });
                    }
                    Some(_) => {}
                    None => contracts.push(contract.clone()),
                }
            }
        }

        let description = ServiceDescription {
            configuration_name: config.options.configuration_name.clone(),
            endpoints: Vec::new(),
            contracts,
        };
        Ok(Self {
            config,
            description,
            dispatchers: Vec::new(),
            configured: Vec::new(),
            state: CommunicationState::Created,
        })
    }

    /// Exposes the contract named `contract` at `address` over `binding_name`.
    ///
    /// Relative addresses are resolved against the first base address.
    pub fn add_endpoint(
        &mut self,
        contract: &str,
        address: &str,
        binding_name: &str,
    ) -> HostResult<&mut Self> {
        self.ensure_created()?;
        let contract = self
            .description
            .contract(contract)
            .cloned()
            .ok_or_else(|| HostError::Config {
                message: format!("service does not implement a contract named `{contract}`"),
            })?;
        let address = self.config.options.resolve_address(address);

        self.dispatcher_for(binding_name)
            .endpoints
            .push(EndpointDispatcher::new(address.clone(), &contract));
        self.description
            .endpoints
            .push(ServiceEndpoint::new(address, contract));
        Ok(self)
    }

    /// Adds an infrastructure endpoint (metadata exchange and the like).
    pub fn add_system_endpoint(
        &mut self,
        contract_name: &str,
        address: &str,
        binding_name: &str,
    ) -> HostResult<&mut Self> {
        self.ensure_created()?;
        let address = self.config.options.resolve_address(address);
        self.dispatcher_for(binding_name)
            .endpoints
            .push(EndpointDispatcher::system(
                address,
                contract_name,
                "http://schemas.microsoft.com/2006/04/mex",
            ));
        Ok(self)
    }

    /// Installs instancing into every endpoint and opens the host.
    ///
    /// On error nothing is installed and the host stays `Created`. Opening an
    /// opened host does nothing.
    pub fn open(&mut self) -> HostResult<()> {
        match self.state {
            CommunicationState::Opened => return Ok(()),
            CommunicationState::Created => {}
            state => {
                return Err(HostError::Config {
                    message: format!("cannot open a host in state {state}"),
                })
            }
        }

        let options = &self.config.options;
        let mut configurer = DispatchConfigurer::new(self.config.provider.clone())
            .log_endpoints(options.log_endpoints);
        if let Some(mode) = options.default_instance_mode {
            configurer = configurer.with_fallback(ServiceBehavior::with_mode(mode));
        }

        self.configured = configurer.apply(&self.description, &mut self.dispatchers)?;
        self.state = CommunicationState::Opened;
        tracing::info!(
            service = %self.description.configuration_name,
            endpoints = self.description.endpoints.len(),
            contracts = self.configured.len(),
            "service host opened"
        );
        Ok(())
    }

    /// Stops accepting calls and closes the singleton instance contexts.
    /// Sessions already bound keep their scopes until their channels close.
    pub fn close(&mut self) {
        if self.state != CommunicationState::Closed {
            self.state = CommunicationState::Closed;
            for provider in self
                .dispatchers
                .iter()
                .flat_map(|d| d.endpoints.iter())
                .filter_map(|e| e.runtime.instance_context_provider.as_ref())
            {
                provider.shutdown();
            }
            tracing::info!(service = %self.description.configuration_name, "service host closed");
        }
    }

    pub fn state(&self) -> CommunicationState {
        self.state
    }

    pub fn description(&self) -> &ServiceDescription {
        &self.description
    }

    /// Contracts configured by the last successful [`open`](Self::open)
    pub fn configured_contracts(&self) -> &[ConfiguredContract] {
        &self.configured
    }

    pub fn dispatchers(&self) -> &[ChannelDispatcher] {
        &self.dispatchers
    }

    pub fn provider(&self) -> &ServiceProvider {
        &self.config.provider
    }

    /// Endpoint dispatcher for `contract_name` at `address`.
    pub fn endpoint(&self, address: &str, contract_name: &str) -> Option<&EndpointDispatcher> {
        self.dispatchers
            .iter()
            .flat_map(|d| d.endpoints.iter())
            .find(|e| e.address == address && e.contract_name == contract_name)
    }

    fn ensure_created(&self) -> HostResult<()> {
        if self.state == CommunicationState::Created {
            Ok(())
        } else {
            Err(HostError::Config {
                message: format!("endpoints cannot be added to a host in state {}", self.state),
            })
        }
    }

    fn dispatcher_for(&mut self, binding_name: &str) -> &mut ChannelDispatcher {
        let index = match self
            .dispatchers
            .iter()
            .position(|d| d.binding_name == binding_name)
        {
            Some(index) => index,
            None => {
                self.dispatchers.push(ChannelDispatcher::new(binding_name));
                self.dispatchers.len() - 1
            }
        };
        &mut self.dispatchers[index]
    }
}

impl fmt::Debug for ServiceHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHost")
            .field("service", &self.description.configuration_name)
            .field("state", &self.state)
            .field("endpoints", &self.description.endpoints.len())
            .finish()
    }
}
