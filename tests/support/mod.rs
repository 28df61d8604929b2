//! Shared fixtures: a minimal transport dispatcher and counting observers.

#![allow(dead_code)]

use ferrous_host::host::{
    Channel, DispatchRuntime, HostConfig, InstanceContext, InstanceContextMode, MemoryChannel,
    Message, ServiceBehavior, ServiceHost, ServiceInstance,
};
use ferrous_host::{
    ContractDescription, DiObserver, HostOptions, HostResult, Lifetime, ServiceCollection,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Does what a transport does for one incoming message: reuse or create the
/// instance context, then ask for the service object.
pub fn dispatch(
    runtime: &DispatchRuntime,
    channel: &Arc<dyn Channel>,
    message: &Message,
) -> HostResult<(Arc<InstanceContext>, ServiceInstance)> {
    let contexts = runtime
        .instance_context_provider
        .as_ref()
        .expect("instance context provider installed");
    let instances = runtime
        .instance_provider
        .as_ref()
        .expect("instance provider installed");

    let context = match contexts.get_existing_instance_context(message, channel)? {
        Some(context) => context,
        None => {
            let context = InstanceContext::new();
            contexts.initialize_instance_context(&context, message, channel)?;
            context
        }
    };
    let instance = instances.get_instance_for_message(&context, message)?;
    Ok((context, instance))
}

pub fn channel() -> (Arc<MemoryChannel>, Arc<dyn Channel>) {
    let concrete = MemoryChannel::open();
    let channel: Arc<dyn Channel> = concrete.clone();
    (concrete, channel)
}

pub const ECHO_ADDRESS: &str = "net.tcp://localhost/echo";

pub fn message() -> Message {
    Message::new("Echo", ECHO_ADDRESS)
}

pub trait Echo: Send + Sync {
    fn echo(&self, text: &str) -> String;
    fn serial(&self) -> usize;
}

pub struct EchoService {
    serial: usize,
}

impl Echo for EchoService {
    fn echo(&self, text: &str) -> String {
        format!("{}:{}", self.serial, text)
    }

    fn serial(&self) -> usize {
        self.serial
    }
}

/// Opened host exposing `EchoService` as `Echo` with the given instancing
/// mode and container lifetime. `created` counts factory runs.
pub fn echo_host(
    mode: InstanceContextMode,
    lifetime: Lifetime,
    ledger: Arc<ScopeLedger>,
    created: Arc<AtomicUsize>,
) -> ServiceHost {
    let mut services = ServiceCollection::new();
    services.add_observer(ledger);
    services
        .register::<EchoService, _>(move |_| {
            Ok(EchoService {
                serial: created.fetch_add(1, Ordering::SeqCst) + 1,
            })
        })
        .lifetime(lifetime)
        .implements(ContractDescription::of::<dyn Echo>(), |s| s as Arc<dyn Echo>)
        .with_behavior(ServiceBehavior::with_mode(mode))
        .add();

    let options = HostOptions::new("EchoHost").with_log_endpoints(false);
    let mut host = ServiceHost::new(HostConfig::new(services.build()).with_options(options))
        .expect("host description");
    host.add_endpoint("Echo", ECHO_ADDRESS, "netTcp")
        .expect("echo endpoint");
    host.open().expect("host opens");
    host
}

pub fn echo_runtime(host: &ServiceHost) -> &DispatchRuntime {
    &host
        .endpoint(ECHO_ADDRESS, "Echo")
        .expect("echo endpoint dispatcher")
        .runtime
}

/// Counts scope transitions and component constructions.
#[derive(Default)]
pub struct ScopeLedger {
    opened: AtomicUsize,
    disposals: Mutex<HashMap<u64, usize>>,
    resolutions: Mutex<HashMap<&'static str, usize>>,
}

impl ScopeLedger {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Total disposals of child scopes (the root, id 0, is excluded).
    pub fn disposed(&self) -> usize {
        self.disposals
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| **id != 0)
            .map(|(_, n)| *n)
            .sum()
    }

    pub fn disposals_of(&self, scope: u64) -> usize {
        self.disposals.lock().unwrap().get(&scope).copied().unwrap_or(0)
    }

    /// Constructions of components whose type name ends with `component`.
    pub fn resolutions_of(&self, component: &str) -> usize {
        self.resolutions
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name.ends_with(component))
            .map(|(_, n)| *n)
            .sum()
    }
}

impl DiObserver for ScopeLedger {
    fn resolved(&self, component: &'static str, _duration: Duration) {
        *self.resolutions.lock().unwrap().entry(component).or_default() += 1;
    }

    fn scope_opened(&self, _scope: u64) {
        self.opened.fetch_add(1, Ordering::SeqCst);
    }

    fn scope_disposed(&self, scope: u64) {
        *self.disposals.lock().unwrap().entry(scope).or_default() += 1;
    }
}

/// Idle callback that counts its invocations.
pub fn counting_idle(counter: &Arc<AtomicUsize>) -> ferrous_host::host::IdleCallback {
    let counter = counter.clone();
    Box::new(move |_context| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}
