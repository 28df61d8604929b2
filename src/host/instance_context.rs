//! Instance contexts: the host's unit of "which object serves this call".

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::binding::ContextBinding;
use super::lifecycle::{CommunicationState, LifecycleEvents, LifecycleHandler, SubscriptionId};
use crate::error::{HostError, HostResult};
use crate::registration::AnyArc;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Context correlating a service object with a call or a session.
///
/// The host creates one for each call it cannot serve from an existing
/// context, hands it to
/// [`InstanceContextProvider::initialize_instance_context`](super::InstanceContextProvider::initialize_instance_context),
/// and closes it when done. Policies decorate it with a single
/// [`ContextBinding`] which releases the context's scope when the context or
/// its channel closes.
pub struct InstanceContext {
    id: u64,
    events: LifecycleEvents,
    service_object: Option<AnyArc>,
    binding: OnceCell<Arc<ContextBinding>>,
}

impl InstanceContext {
    /// New, opened context.
    pub fn new() -> Arc<Self> {
        Self::create(None)
    }

    /// Context that already carries its service object.
    pub(crate) fn with_instance(instance: AnyArc) -> Arc<Self> {
        Self::create(Some(instance))
    }

    fn create(service_object: Option<AnyArc>) -> Arc<Self> {
        let context = Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            events: LifecycleEvents::new(),
            service_object,
            binding: OnceCell::new(),
        };
        context.events.open();
        Arc::new(context)
    }

    /// Process-unique id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current state
    pub fn state(&self) -> CommunicationState {
        self.events.state()
    }

    /// Closes the context, releasing the scope of its binding.
    pub fn close(&self) {
        tracing::trace!(context = self.id, "instance context closed");
        self.events.close();
    }

    /// Faults the context, releasing the scope of its binding.
    pub fn fault(&self) {
        tracing::trace!(context = self.id, "instance context faulted");
        self.events.fault();
    }

    /// Registers a Closed/Faulted subscriber.
    pub fn subscribe(&self, handler: LifecycleHandler) -> SubscriptionId {
        self.events.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.events.unsubscribe(id);
    }

    /// The binding attached by the instancing policy
    pub fn binding(&self) -> Option<&Arc<ContextBinding>> {
        self.binding.get()
    }

    /// True when the context was created around an existing service object.
    pub fn has_service_object(&self) -> bool {
        self.service_object.is_some()
    }

    pub(crate) fn service_object(&self) -> Option<&AnyArc> {
        self.service_object.as_ref()
    }

    pub(crate) fn attach_binding(&self, binding: Arc<ContextBinding>) -> HostResult<()> {
        self.binding
            .set(binding)
            .map_err(|_| HostError::Consistency("instance context already carries a binding"))
    }

    /// Always fails: a binding stays attached until its context is gone.
    pub fn detach_binding(&self) -> HostResult<()> {
        match self.binding.get() {
            Some(binding) => binding.detach(),
            None => Err(HostError::Consistency("instance context carries no binding")),
        }
    }
}

impl fmt::Debug for InstanceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceContext")
            .field("id", &self.id)
            .field("state", &self.events.state())
            .field("bound", &self.binding.get().is_some())
            .field("service_object", &self.service_object.is_some())
            .finish()
    }
}
