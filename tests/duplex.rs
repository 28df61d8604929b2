//! Duplex contracts receive the caller's channel.

mod support;

use ferrous_host::host::{
    CallbackChannel, HostConfig, InstanceContextMode, MemoryChannel, ServiceBehavior, ServiceHost,
};
use ferrous_host::{ContractDescription, HostOptions, Lifetime, ServiceCollection, TypeKey};
use std::sync::Arc;
use support::{channel, dispatch, message};

trait Chat: Send + Sync {
    fn say(&self, text: &str);
    fn has_callback(&self) -> bool;
}

trait ChatCallback: Send + Sync {}

struct ChatService {
    callback: Option<Arc<CallbackChannel>>,
}

impl Chat for ChatService {
    fn say(&self, text: &str) {
        if let Some(callback) = &self.callback {
            let channel = callback.downcast::<MemoryChannel>().expect("memory channel");
            channel.send_callback(format!("echo: {text}"));
        }
    }

    fn has_callback(&self) -> bool {
        self.callback.is_some()
    }
}

fn host(contract: ContractDescription, mode: InstanceContextMode) -> ServiceHost {
    let mut services = ServiceCollection::new();
    services
        .register::<ChatService, _>(|ctx| {
            Ok(ChatService {
                callback: ctx.callback_channel(),
            })
        })
        .lifetime(Lifetime::Transient)
        .implements(contract, |s| s as Arc<dyn Chat>)
        .with_behavior(ServiceBehavior::with_mode(mode))
        .add();

    let options = HostOptions::new("Chat").with_log_endpoints(false);
    let mut host =
        ServiceHost::new(HostConfig::new(services.build()).with_options(options)).unwrap();
    host.add_endpoint("Chat", support::ECHO_ADDRESS, "netTcp").unwrap();
    host.open().unwrap();
    host
}

fn runtime(host: &ServiceHost) -> &ferrous_host::host::DispatchRuntime {
    &host.endpoint(support::ECHO_ADDRESS, "Chat").unwrap().runtime
}

#[test]
fn test_duplex_service_receives_its_channel() {
    let contract = ContractDescription::of::<dyn Chat>().with_callback::<dyn ChatCallback>();
    let host = host(contract, InstanceContextMode::PerSession);
    let (concrete, channel) = channel();

    let (_, instance) = dispatch(runtime(&host), &channel, &message()).unwrap();
    let chat = instance.contract::<dyn Chat>().unwrap();
    assert!(chat.has_callback());

    chat.say("hi");
    assert_eq!(concrete.callbacks(), vec!["echo: hi".to_string()]);
}

#[test]
fn test_callback_is_keyed_by_callback_contract() {
    let contract = ContractDescription::of::<dyn Chat>().with_callback::<dyn ChatCallback>();
    let host = host(contract, InstanceContextMode::PerCall);
    let provider = runtime(&host).instance_provider.as_ref().unwrap();

    assert_eq!(
        provider.callback_contract(),
        Some(TypeKey::of::<dyn ChatCallback>())
    );
}

#[test]
fn test_each_caller_gets_its_own_channel() {
    let contract = ContractDescription::of::<dyn Chat>().with_callback::<dyn ChatCallback>();
    let host = host(contract, InstanceContextMode::PerCall);
    let (alice, alice_channel) = channel();
    let (bob, bob_channel) = channel();

    let (_, a) = dispatch(runtime(&host), &alice_channel, &message()).unwrap();
    let (_, b) = dispatch(runtime(&host), &bob_channel, &message()).unwrap();
    a.contract::<dyn Chat>().unwrap().say("from alice");
    b.contract::<dyn Chat>().unwrap().say("from bob");

    assert_eq!(alice.callbacks(), vec!["echo: from alice".to_string()]);
    assert_eq!(bob.callbacks(), vec!["echo: from bob".to_string()]);
}

#[test]
fn test_simplex_service_gets_no_channel() {
    let host = host(ContractDescription::of::<dyn Chat>(), InstanceContextMode::PerSession);
    let (concrete, channel) = channel();

    let (_, instance) = dispatch(runtime(&host), &channel, &message()).unwrap();
    let chat = instance.contract::<dyn Chat>().unwrap();
    chat.say("ignored");

    assert!(!chat.has_callback());
    assert!(concrete.callbacks().is_empty());
}
