//! Communication state and close/fault notification shared by channels and
//! instance contexts.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// State of a channel or instance context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommunicationState {
    /// Constructed, not yet opened
    #[default]
    Created,
    /// Opening
    Opening,
    /// Usable
    Opened,
    /// Closing gracefully
    Closing,
    /// Closed gracefully
    Closed,
    /// Broken
    Faulted,
}

impl CommunicationState {
    /// Closed or Faulted
    pub fn is_terminal(self) -> bool {
        matches!(self, CommunicationState::Closed | CommunicationState::Faulted)
    }
}

impl fmt::Display for CommunicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Terminal notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Closed gracefully
    Closed,
    /// Faulted
    Faulted,
}

/// Subscriber for [`LifecycleEvent`]s.
pub type LifecycleHandler = Arc<dyn Fn(LifecycleEvent) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct EventsInner {
    state: CommunicationState,
    first_terminal: Option<LifecycleEvent>,
    next_id: u64,
    handlers: Vec<(SubscriptionId, LifecycleHandler)>,
}

/// State plus Closed/Faulted subscribers.
///
/// Every `close`/`fault` call notifies every subscriber, so a subscriber may
/// see both events or the same one twice; deduplication is the subscriber's
/// job. Handlers run on the calling thread, outside the internal lock. A
/// handler subscribed after a terminal event has fired is invoked at once
/// with the first terminal event.
pub struct LifecycleEvents {
    inner: Mutex<EventsInner>,
}

impl LifecycleEvents {
    /// Events in the `Created` state with no subscribers.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(EventsInner {
                state: CommunicationState::Created,
                first_terminal: None,
                next_id: 0,
                handlers: Vec::new(),
            }),
        }
    }

    /// Current state
    pub fn state(&self) -> CommunicationState {
        self.inner.lock().state
    }

    /// Moves `Created`/`Opening` to `Opened`. Returns false from any other state.
    pub fn open(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CommunicationState::Created | CommunicationState::Opening => {
                inner.state = CommunicationState::Opened;
                true
            }
            _ => false,
        }
    }

    /// Adds a subscriber. A subscriber added after a terminal event is
    /// invoked at once and not retained.
    pub fn subscribe(&self, handler: LifecycleHandler) -> SubscriptionId {
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        match inner.first_terminal {
            Some(event) => {
                drop(inner);
                handler(event);
            }
            None => inner.handlers.push((id, handler)),
        }
        id
    }

    /// Removes a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.lock().handlers.retain(|(handler_id, _)| *handler_id != id);
    }

    /// Number of retained subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().handlers.len()
    }

    /// Marks the owner closed (a faulted owner stays faulted) and raises `Closed`.
    pub fn close(&self) {
        self.raise(LifecycleEvent::Closed);
    }

    /// Marks the owner faulted and raises `Faulted`.
    pub fn fault(&self) {
        self.raise(LifecycleEvent::Faulted);
    }

    fn raise(&self, event: LifecycleEvent) {
        let handlers = {
            let mut inner = self.inner.lock();
            inner.state = match (event, inner.state) {
                (LifecycleEvent::Closed, CommunicationState::Faulted) => CommunicationState::Faulted,
                (LifecycleEvent::Closed, _) => CommunicationState::Closed,
                (LifecycleEvent::Faulted, _) => CommunicationState::Faulted,
            };
            inner.first_terminal.get_or_insert(event);
            inner.handlers.clone()
        };
        for (_, handler) in handlers {
            handler(event);
        }
    }
}

impl Default for LifecycleEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LifecycleEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LifecycleEvents")
            .field("state", &inner.state)
            .field("subscribers", &inner.handlers.len())
            .finish()
    }
}
