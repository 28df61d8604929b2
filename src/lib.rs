//! # ferrous-host
//!
//! Container-driven service instances for RPC hosts.
//!
//! Service objects are resolved from a dependency injection container
//! instead of being constructed by the host, and how long each one lives is
//! decided by its registration rather than by the host's defaults:
//!
//! - **Single**: one object for the process, resolved once from the root
//! - **PerSession**: one child scope per channel, disposed when the channel
//!   closes or faults
//! - **PerCall**: one child scope per call
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_host::host::{
//!     Channel, HostConfig, InstanceContext, InstanceContextMode, MemoryChannel, Message,
//!     ServiceBehavior, ServiceHost,
//! };
//! use ferrous_host::{ContractDescription, Lifetime, ServiceCollection};
//! use std::sync::Arc;
//!
//! trait Echo: Send + Sync {
//!     fn echo(&self, text: &str) -> String;
//! }
//!
//! struct EchoService;
//! impl Echo for EchoService {
//!     fn echo(&self, text: &str) -> String {
//!         text.to_string()
//!     }
//! }
//!
//! let mut services = ServiceCollection::new();
//! services
//!     .register::<EchoService, _>(|_| Ok(EchoService))
//!     .lifetime(Lifetime::Scoped)
//!     .implements(ContractDescription::of::<dyn Echo>(), |s| s as Arc<dyn Echo>)
//!     .with_behavior(ServiceBehavior::with_mode(InstanceContextMode::PerSession))
//!     .add();
//!
//! let mut host = ServiceHost::new(HostConfig::new(services.build())).unwrap();
//! host.add_endpoint("Echo", "net.tcp://localhost/echo", "netTcp").unwrap();
//! host.open().unwrap();
//!
//! // What the transport does for each incoming message:
//! let runtime = &host.endpoint("net.tcp://localhost/echo", "Echo").unwrap().runtime;
//! let contexts = runtime.instance_context_provider.as_ref().unwrap();
//! let instances = runtime.instance_provider.as_ref().unwrap();
//!
//! let channel: Arc<dyn Channel> = MemoryChannel::open();
//! let message = Message::new("Echo", "net.tcp://localhost/echo");
//! let context = match contexts.get_existing_instance_context(&message, &channel).unwrap() {
//!     Some(context) => context,
//!     None => {
//!         let context = InstanceContext::new();
//!         contexts.initialize_instance_context(&context, &message, &channel).unwrap();
//!         context
//!     }
//! };
//!
//! let echo = instances.get_instance(&context).unwrap().contract::<dyn Echo>().unwrap();
//! assert_eq!(echo.echo("hello"), "hello");
//! ```
//!
//! ## Container
//!
//! The container is deliberately small: registrations with a `Lifetime`,
//! contracts and metadata; a root [`ServiceProvider`]; child [`Scope`]s with
//! LIFO disposal; per-thread circular dependency detection. Factories receive
//! a [`ResolverContext`] exposing any per-resolution [`Parameter`]s, which is
//! how duplex services receive their callback channel.
//!
//! ## Feature Flags
//!
//! - `config`: serde support for [`HostOptions`] and
//!   [`ServiceBehavior`](host::ServiceBehavior), plus `HostOptions::from_json`
//! - `diagnostics`: `ServiceProvider::to_debug_string`

pub mod collection;
pub mod config;
pub mod error;
pub mod host;
pub mod key;
pub mod lifetime;
pub mod observer;
pub mod provider;
pub mod traits;

mod internal;
mod registration;

pub use collection::{RegistrationBuilder, ServiceCollection};
pub use config::HostOptions;
pub use error::{DiError, DiResult, HostError, HostResult};
pub use host::{ContractDescription, HostConfig, ServiceHost};
pub use key::{RegistrationId, TypeKey};
pub use lifetime::Lifetime;
pub use observer::{DiObserver, TracingObserver};
pub use provider::{ResolverContext, Scope, ServiceProvider};
pub use registration::{Parameter, Registration, Registry};
pub use traits::{Dispose, Resolver, ResolverCore};
