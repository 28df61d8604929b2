//! Channels: the transport's per-session (or per-call) handle.
//!
//! The transport owns its channels. This crate only needs their identity and
//! state, their close/fault notifications, and one attachment point used to
//! find a session's instance context on later calls.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use super::instance_context::InstanceContext;
use super::lifecycle::{CommunicationState, LifecycleEvents, LifecycleHandler, SubscriptionId};
use crate::error::{HostError, HostResult};
use crate::key::TypeKey;
use crate::provider::ResolverContext;

/// Transport-assigned channel identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel-{}", self.0)
    }
}

/// What the hosting layer needs from a transport channel.
pub trait Channel: Send + Sync + 'static {
    /// Stable identity for the life of the session
    fn id(&self) -> ChannelId;

    /// Current state
    fn state(&self) -> CommunicationState;

    /// Registers a Closed/Faulted subscriber. A subscriber added after the
    /// channel already closed or faulted must be invoked immediately.
    fn subscribe(&self, handler: LifecycleHandler) -> SubscriptionId;

    /// Removes a subscriber; unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Attachment point for the session's instance context
    fn session_slot(&self) -> &SessionSlot;

    /// For downcasting to the transport's concrete channel type
    fn as_any(&self) -> &dyn Any;
}

/// Holds the instance context of a session for the life of its channel.
///
/// Written once by the PerSession policy. There is no supported way to
/// replace or remove the context.
#[derive(Default)]
pub struct SessionSlot {
    context: OnceCell<Arc<InstanceContext>>,
}

impl SessionSlot {
    /// Empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// The attached context, if any
    pub fn get(&self) -> Option<Arc<InstanceContext>> {
        self.context.get().cloned()
    }

    /// Attaches `context`; fails if a context is already attached.
    pub fn attach(&self, context: Arc<InstanceContext>) -> HostResult<()> {
        self.context
            .set(context)
            .map_err(|_| HostError::Consistency("channel already carries a session instance context"))
    }

    /// Always fails: a session keeps its context until the channel is gone.
    pub fn detach(&self) -> HostResult<()> {
        tracing::error!("attempt to detach an instance context from its channel");
        Err(HostError::Consistency(
            "instance contexts cannot be detached from their channel",
        ))
    }
}

impl fmt::Debug for SessionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSlot")
            .field("context", &self.context.get().map(|c| c.id()))
            .finish()
    }
}

/// The originating channel, handed to duplex services so they can call the
/// client back. Keyed by the contract's callback contract type.
pub struct CallbackChannel {
    contract: TypeKey,
    channel: Arc<dyn Channel>,
}

impl CallbackChannel {
    pub(crate) fn new(contract: TypeKey, channel: Arc<dyn Channel>) -> Self {
        Self { contract, channel }
    }

    /// Callback contract this channel serves
    pub fn contract(&self) -> TypeKey {
        self.contract
    }

    /// The channel itself
    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    /// The channel as the transport's concrete type.
    pub fn downcast<C: Channel>(&self) -> Option<&C> {
        self.channel.as_any().downcast_ref::<C>()
    }
}

impl fmt::Debug for CallbackChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackChannel")
            .field("contract", &self.contract)
            .field("channel", &self.channel.id())
            .finish()
    }
}

impl ResolverContext<'_> {
    /// The caller's channel, present when resolving a service for a duplex contract.
    pub fn callback_channel(&self) -> Option<Arc<CallbackChannel>> {
        self.typed_parameter::<CallbackChannel>()
    }
}

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// In-process channel.
///
/// Used by hosts that dispatch locally and by tests. Callback messages sent
/// through it are recorded instead of transmitted.
pub struct MemoryChannel {
    id: ChannelId,
    events: LifecycleEvents,
    slot: SessionSlot,
    callbacks: Mutex<Vec<String>>,
}

impl MemoryChannel {
    /// New opened channel with a process-unique id.
    pub fn open() -> Arc<Self> {
        let channel = Self::with_id(ChannelId(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed)));
        channel.events.open();
        Arc::new(channel)
    }

    /// Channel in the `Created` state.
    pub fn with_id(id: ChannelId) -> Self {
        Self {
            id,
            events: LifecycleEvents::new(),
            slot: SessionSlot::new(),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// `Created` to `Opened`
    pub fn mark_opened(&self) -> bool {
        self.events.open()
    }

    /// Closes the channel and raises `Closed`.
    pub fn close(&self) {
        tracing::debug!(channel = %self.id, "channel closed");
        self.events.close();
    }

    /// Faults the channel and raises `Faulted`.
    pub fn fault(&self) {
        tracing::debug!(channel = %self.id, "channel faulted");
        self.events.fault();
    }

    /// Records a message sent back to the client.
    pub fn send_callback(&self, message: impl Into<String>) {
        self.callbacks.lock().push(message.into());
    }

    /// Messages sent back to the client so far
    pub fn callbacks(&self) -> Vec<String> {
        self.callbacks.lock().clone()
    }

    /// Close/fault subscribers currently registered
    pub fn subscriber_count(&self) -> usize {
        self.events.subscriber_count()
    }
}

impl Channel for MemoryChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn state(&self) -> CommunicationState {
        self.events.state()
    }

    fn subscribe(&self, handler: LifecycleHandler) -> SubscriptionId {
        self.events.subscribe(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.events.unsubscribe(id);
    }

    fn session_slot(&self) -> &SessionSlot {
        &self.slot
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for MemoryChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryChannel")
            .field("id", &self.id)
            .field("state", &self.events.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_channels_get_distinct_ids() {
        let a = MemoryChannel::open();
        let b = MemoryChannel::open();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.state(), CommunicationState::Opened);
    }

    #[test]
    fn session_slot_is_write_once_and_never_detaches() {
        let channel = MemoryChannel::open();
        let first = InstanceContext::new();
        channel.session_slot().attach(first.clone()).unwrap();

        let err = channel.session_slot().attach(InstanceContext::new()).unwrap_err();
        assert!(matches!(err, HostError::Consistency(_)));
        assert!(channel.session_slot().detach().is_err());
        assert!(Arc::ptr_eq(&channel.session_slot().get().unwrap(), &first));
    }

    #[test]
    fn downcast_to_concrete_channel() {
        let channel = MemoryChannel::open();
        let callback = CallbackChannel::new(TypeKey::of::<dyn Any>(), channel.clone());
        callback.downcast::<MemoryChannel>().unwrap().send_callback("ping");
        assert_eq!(channel.callbacks(), vec!["ping".to_string()]);
    }
}
