//! Installs instancing hooks and behavior flags into the host's dispatchers.

use std::sync::Arc;

use super::behavior::{InstanceContextMode, ServiceBehavior};
use super::contract::ContractDescription;
use super::dispatch::{AddressFilter, ChannelDispatcher, DispatchRuntime, ServiceDescription};
use super::instance_provider::InstanceProvider;
use super::policy::policy_for;
use super::resolver::RegistrationResolver;
use crate::error::HostResult;
use crate::key::RegistrationId;
use crate::provider::ServiceProvider;
use crate::registration::Registration;

/// Summary of one configured contract.
#[derive(Debug, Clone)]
pub struct ConfiguredContract {
    pub contract: ContractDescription,
    pub registration: RegistrationId,
    pub mode: InstanceContextMode,
    /// Endpoint dispatchers the contract was installed into
    pub endpoints: usize,
}

/// Endpoint dispatchers, as (channel dispatcher, endpoint) indices, grouped by contract.
struct ContractEndpoints<'d> {
    contract: &'d ContractDescription,
    endpoints: Vec<(usize, usize)>,
}

/// Contracts sharing one registration, and so one instancing policy.
struct RegistrationPlan<'d, 'r> {
    registration: &'r Registration,
    behavior: ServiceBehavior,
    contracts: Vec<ContractEndpoints<'d>>,
}

/// Wires every non-system endpoint dispatcher to the registration
/// implementing its contract.
///
/// Contracts implemented by the same registration share one instancing
/// policy, so a PerSession component serving two contracts over one channel
/// keeps one context. Every contract is resolved before any dispatcher is
/// touched: a configuration error leaves the dispatchers unchanged.
#[derive(Debug, Clone)]
pub struct DispatchConfigurer {
    provider: ServiceProvider,
    fallback: ServiceBehavior,
    log_endpoints: bool,
}

impl DispatchConfigurer {
    pub fn new(provider: ServiceProvider) -> Self {
        Self {
            provider,
            fallback: ServiceBehavior::default(),
            log_endpoints: true,
        }
    }

    /// Behavior for registrations that neither carry nor declare one.
    pub fn with_fallback(mut self, fallback: ServiceBehavior) -> Self {
        self.fallback = fallback;
        self
    }

    /// Whether each configured endpoint is logged at `info`.
    pub fn log_endpoints(mut self, enabled: bool) -> Self {
        self.log_endpoints = enabled;
        self
    }

    /// Configures `dispatchers` for the endpoints of `description`.
    pub fn apply(
        &self,
        description: &ServiceDescription,
        dispatchers: &mut [ChannelDispatcher],
    ) -> HostResult<Vec<ConfiguredContract>> {
        let plans = self.plan(description, dispatchers)?;
        let mut configured = Vec::new();

        for plan in plans {
            let policy = policy_for(
                plan.behavior.instance_context_mode,
                &self.provider,
                plan.registration.id(),
            );
            for group in &plan.contracts {
                let instance_provider = Arc::new(InstanceProvider::new(
                    plan.registration,
                    group.contract.callback_contract(),
                ));
                for &(channel_index, endpoint_index) in &group.endpoints {
                    let channel = &mut dispatchers[channel_index];
                    let binding_name = channel.binding_name.clone();
                    let endpoint = &mut channel.endpoints[endpoint_index];

                    apply_behavior(&mut endpoint.runtime, &plan.behavior);
                    endpoint.address_filter =
                        AddressFilter::for_mode(plan.behavior.address_filter_mode, &endpoint.address);
                    endpoint.runtime.instance_context_provider = Some(policy.clone());
                    endpoint.runtime.instance_provider = Some(instance_provider.clone());

                    if self.log_endpoints {
                        tracing::info!(
                            channel = %binding_name,
                            endpoint = %endpoint.address,
                            contract = %group.contract.name(),
                            callback = ?group.contract.callback_contract(),
                            registration = %plan.registration.component(),
                            mode = %plan.behavior.instance_context_mode,
                            "endpoint configured"
                        );
                    }
                }
                configured.push(ConfiguredContract {
                    contract: group.contract.clone(),
                    registration: plan.registration.id(),
                    mode: plan.behavior.instance_context_mode,
                    endpoints: group.endpoints.len(),
                });
            }
        }
        Ok(configured)
    }

    fn plan<'d, 'r>(
        &'r self,
        description: &'d ServiceDescription,
        dispatchers: &[ChannelDispatcher],
    ) -> HostResult<Vec<RegistrationPlan<'d, 'r>>> {
        // Join endpoint dispatchers with the description's endpoints and
        // group the matches by contract, keeping first-seen order.
        let mut by_contract: Vec<ContractEndpoints<'d>> = Vec::new();
        for (channel_index, channel) in dispatchers.iter().enumerate() {
            for (endpoint_index, dispatcher) in channel.endpoints.iter().enumerate() {
                if dispatcher.is_system_endpoint {
                    continue;
                }
                for endpoint in description.endpoints.iter().filter(|e| dispatcher.serves(e)) {
                    let position = by_contract
                        .iter()
                        .position(|g| *g.contract == endpoint.contract);
                    let group = match position {
                        Some(i) => &mut by_contract[i],
                        None => {
                            by_contract.push(ContractEndpoints {
                                contract: &endpoint.contract,
                                endpoints: Vec::new(),
                            });
                            let last = by_contract.len() - 1;
                            &mut by_contract[last]
                        }
                    };
                    group.endpoints.push((channel_index, endpoint_index));
                }
            }
        }

        let resolver =
            RegistrationResolver::new(self.provider.registry()).with_fallback(self.fallback.clone());
        let mut plans: Vec<RegistrationPlan<'d, 'r>> = Vec::new();
        for group in by_contract {
            let registration = resolver.resolve(group.contract)?;
            match plans
                .iter_mut()
                .find(|p| p.registration.id() == registration.id())
            {
                Some(plan) => plan.contracts.push(group),
                None => plans.push(RegistrationPlan {
                    registration,
                    behavior: resolver.behavior_for(registration)?,
                    contracts: vec![group],
                }),
            }
        }
        Ok(plans)
    }
}

fn apply_behavior(runtime: &mut DispatchRuntime, behavior: &ServiceBehavior) {
    runtime.concurrency_mode = behavior.concurrency_mode;
    runtime.ensure_ordered_dispatch = behavior.ensure_ordered_dispatch;
    runtime.validate_must_understand = behavior.validate_must_understand;
    runtime.automatic_input_session_shutdown = behavior.automatic_session_shutdown;
    runtime.transaction_auto_complete_on_session_close =
        behavior.transaction_auto_complete_on_session_close;
    runtime.release_service_instance_on_transaction_complete =
        behavior.release_service_instance_on_transaction_complete;
    runtime.use_synchronization_context = behavior.use_synchronization_context;
    runtime.serializer.ignore_extension_data_object = behavior.ignore_extension_data_object;
    runtime.serializer.max_items_in_object_graph = behavior.max_items_in_object_graph;
}
