//! Binding of an instance context to its resolution scope and channel.
//!
//! A [`ContextBinding`] is created once per instance context by the
//! instancing policy. It owns the context's child scope (none for
//! singletons), observes the channel and the context, and tears down on the
//! first Closed or Faulted it sees: the scope is disposed and the idle
//! callbacks run, each exactly once.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::channel::{Channel, ChannelId};
use super::instance_context::InstanceContext;
use super::lifecycle::{LifecycleEvent, LifecycleHandler, SubscriptionId};
use crate::error::{DiResult, HostError, HostResult};
use crate::key::RegistrationId;
use crate::provider::{Scope, ServiceProvider, ROOT_SCOPE_ID};
use crate::registration::{AnyArc, Parameter};

/// Called with the owning context once the binding has torn down.
pub type IdleCallback = Box<dyn FnOnce(&Arc<InstanceContext>) + Send>;

/// Where a bound context resolves its service object.
pub enum BindingScope {
    /// The root provider; never disposed by the binding
    Root(ServiceProvider),
    /// A child scope owned by the binding
    Owned(Scope),
}

impl BindingScope {
    /// Resolves `registration` from this scope.
    pub fn resolve_component(
        &self,
        registration: RegistrationId,
        parameters: &[Parameter],
    ) -> DiResult<AnyArc> {
        match self {
            BindingScope::Root(provider) => provider.resolve_component(registration, parameters),
            BindingScope::Owned(scope) => scope.resolve_component(registration, parameters),
        }
    }

    /// Id of the underlying scope (`ROOT_SCOPE_ID` for the root)
    pub fn id(&self) -> u64 {
        match self {
            BindingScope::Root(_) => ROOT_SCOPE_ID,
            BindingScope::Owned(scope) => scope.id(),
        }
    }

    /// True when the binding owns a child scope.
    pub fn is_owned(&self) -> bool {
        matches!(self, BindingScope::Owned(_))
    }

    /// True once the underlying scope refuses to resolve.
    pub fn is_disposed(&self) -> bool {
        match self {
            BindingScope::Root(provider) => provider.is_disposed(),
            BindingScope::Owned(scope) => scope.is_disposed(),
        }
    }
}

impl fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingScope::Root(_) => f.write_str("Root"),
            BindingScope::Owned(scope) => f.debug_tuple("Owned").field(&scope.id()).finish(),
        }
    }
}

/// Binding state. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BindingState {
    /// Constructed, not yet attached
    Unbound = 0,
    /// Attached and observing lifecycle events
    Bound = 1,
    /// Scope disposed, idle callbacks run
    Disposed = 2,
}

impl BindingState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => BindingState::Unbound,
            1 => BindingState::Bound,
            _ => BindingState::Disposed,
        }
    }
}

/// What caused a teardown. Only used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownCause {
    /// The bound channel closed
    ChannelClosed,
    /// The bound channel faulted
    ChannelFaulted,
    /// The instance context closed
    ContextClosed,
    /// The instance context faulted
    ContextFaulted,
    /// The binding was dropped while still bound
    Dropped,
}

/// Handlers this binding registered, removed again on teardown.
#[derive(Default)]
struct Subscriptions {
    context: Option<SubscriptionId>,
    channel: Option<SubscriptionId>,
}

#[derive(Clone, Copy)]
enum EventSource {
    Channel,
    Context,
}

impl TeardownCause {
    fn from_event(source: EventSource, event: LifecycleEvent) -> Self {
        match (source, event) {
            (EventSource::Channel, LifecycleEvent::Closed) => TeardownCause::ChannelClosed,
            (EventSource::Channel, LifecycleEvent::Faulted) => TeardownCause::ChannelFaulted,
            (EventSource::Context, LifecycleEvent::Closed) => TeardownCause::ContextClosed,
            (EventSource::Context, LifecycleEvent::Faulted) => TeardownCause::ContextFaulted,
        }
    }
}

/// Ties one instance context to its scope and, for sessionful and per-call
/// policies, to one channel.
///
/// Holds only weak references to the context and the channel; the context
/// holds the binding. Event handlers hold the binding weakly as well, so a
/// channel outliving its session does not keep the scope alive.
pub struct ContextBinding {
    context: Weak<InstanceContext>,
    scope: BindingScope,
    channel: Option<Weak<dyn Channel>>,
    channel_id: Option<ChannelId>,
    state: AtomicU8,
    idle: Mutex<Vec<IdleCallback>>,
    subscriptions: Mutex<Subscriptions>,
}

impl ContextBinding {
    /// Creates a binding, attaches it to `context` and subscribes to the
    /// Closed/Faulted events of the context and of `channel`.
    ///
    /// If either is already closed the binding tears down before this returns.
    pub(crate) fn bind(
        context: &Arc<InstanceContext>,
        scope: BindingScope,
        channel: Option<&Arc<dyn Channel>>,
    ) -> HostResult<Arc<Self>> {
        let binding = Arc::new(Self {
            context: Arc::downgrade(context),
            scope,
            channel: channel.map(Arc::downgrade),
            channel_id: channel.map(|c| c.id()),
            state: AtomicU8::new(BindingState::Unbound as u8),
            idle: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Subscriptions::default()),
        });

        // On failure the binding is dropped here, which disposes its scope.
        context.attach_binding(binding.clone())?;
        binding
            .state
            .store(BindingState::Bound as u8, Ordering::Release);

        // Handlers may fire during `subscribe`, so the lock is only taken after.
        let weak = Arc::downgrade(&binding);
        let on_context = context.subscribe(teardown_handler(weak.clone(), EventSource::Context));
        let on_channel = channel.map(|c| c.subscribe(teardown_handler(weak, EventSource::Channel)));
        *binding.subscriptions.lock() = Subscriptions {
            context: Some(on_context),
            channel: on_channel,
        };
        if binding.is_disposed() {
            binding.release_subscriptions();
        }

        tracing::debug!(
            context = context.id(),
            scope = binding.scope.id(),
            channel = ?binding.channel_id,
            "instance context bound"
        );
        Ok(binding)
    }

    /// Current state
    pub fn state(&self) -> BindingState {
        BindingState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True once torn down
    pub fn is_disposed(&self) -> bool {
        self.state() == BindingState::Disposed
    }

    /// Scope the context resolves from
    pub fn scope(&self) -> &BindingScope {
        &self.scope
    }

    /// The owning context, if still alive
    pub fn context(&self) -> Option<Arc<InstanceContext>> {
        self.context.upgrade()
    }

    /// The bound channel, if any and still alive
    pub fn channel(&self) -> Option<Arc<dyn Channel>> {
        self.channel.as_ref().and_then(Weak::upgrade)
    }

    /// Id of the bound channel
    pub fn channel_id(&self) -> Option<ChannelId> {
        self.channel_id
    }

    /// Registers `callback` to run once this binding tears down; runs it
    /// immediately if that already happened.
    pub fn on_idle(&self, callback: IdleCallback) {
        {
            let mut idle = self.idle.lock();
            if !self.is_disposed() {
                idle.push(callback);
                return;
            }
        }
        tracing::trace!(scope = self.scope.id(), "idle callback registered after teardown");
        if let Some(context) = self.context.upgrade() {
            callback(&context);
        }
    }

    /// Always fails: bindings are released only by teardown.
    pub fn detach(&self) -> HostResult<()> {
        tracing::error!(
            scope = self.scope.id(),
            channel = ?self.channel_id,
            "attempt to detach a context binding"
        );
        Err(HostError::Consistency(
            "context bindings cannot be detached outside teardown",
        ))
    }

    /// Disposes the owned scope and runs the idle callbacks. Only the first
    /// call does anything; returns whether this call did.
    pub(crate) fn teardown(&self, cause: TeardownCause) -> bool {
        let previous = self
            .state
            .swap(BindingState::Disposed as u8, Ordering::AcqRel);
        if previous == BindingState::Disposed as u8 {
            tracing::trace!(scope = self.scope.id(), ?cause, "binding already torn down");
            return false;
        }

        self.release_subscriptions();
        if let BindingScope::Owned(scope) = &self.scope {
            scope.dispose();
        }

        // Taken after the state swap: `on_idle` checks the state under this lock.
        let callbacks = std::mem::take(&mut *self.idle.lock());
        let notified = callbacks.len();
        match self.context.upgrade() {
            Some(context) => {
                for callback in callbacks {
                    callback(&context);
                }
            }
            None if notified > 0 => {
                tracing::debug!(scope = self.scope.id(), "context gone, idle callbacks dropped");
            }
            None => {}
        }

        tracing::debug!(
            scope = self.scope.id(),
            channel = ?self.channel_id,
            ?cause,
            notified,
            "binding torn down"
        );
        true
    }

    fn release_subscriptions(&self) {
        let Subscriptions { context, channel } = std::mem::take(&mut *self.subscriptions.lock());
        if let (Some(id), Some(context)) = (context, self.context.upgrade()) {
            context.unsubscribe(id);
        }
        if let (Some(id), Some(channel)) = (channel, self.channel()) {
            channel.unsubscribe(id);
        }
    }
}

fn teardown_handler(binding: Weak<ContextBinding>, source: EventSource) -> LifecycleHandler {
    Arc::new(move |event| {
        if let Some(binding) = binding.upgrade() {
            binding.teardown(TeardownCause::from_event(source, event));
        }
    })
}

impl Drop for ContextBinding {
    fn drop(&mut self) {
        if !self.is_disposed() {
            self.teardown(TeardownCause::Dropped);
        }
    }
}

impl fmt::Debug for ContextBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextBinding")
            .field("state", &self.state())
            .field("scope", &self.scope)
            .field("channel", &self.channel_id)
            .finish()
    }
}
