//! Exactly-once teardown of context bindings, whatever the event order.

mod support;

use ferrous_host::host::{
    Channel, InstanceContext, InstanceContextProvider, MemoryChannel, PerCallPolicy,
    PerSessionPolicy,
};
use ferrous_host::{Dispose, Lifetime, Resolver, ServiceCollection, ServiceProvider};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use support::{counting_idle, message};

struct Session {
    disposed: Arc<AtomicUsize>,
}

impl Dispose for Session {
    fn dispose(&self) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Provider whose scoped `Session` counts its disposals.
fn provider(disposed: &Arc<AtomicUsize>) -> ServiceProvider {
    let disposed = disposed.clone();
    let mut services = ServiceCollection::new();
    services
        .register_arc::<Session, _>(move |r| {
            let session = Arc::new(Session {
                disposed: disposed.clone(),
            });
            r.register_disposer(session.clone());
            Ok(session)
        })
        .lifetime(Lifetime::Scoped)
        .add();
    services.build()
}

struct Bound {
    channel: Arc<MemoryChannel>,
    context: Arc<InstanceContext>,
    disposed: Arc<AtomicUsize>,
    idle: Arc<AtomicUsize>,
}

fn bound_session() -> Bound {
    let disposed = Arc::new(AtomicUsize::new(0));
    let idle = Arc::new(AtomicUsize::new(0));
    let provider = provider(&disposed);
    let policy = PerSessionPolicy::new(provider);

    let concrete = MemoryChannel::open();
    let channel: Arc<dyn Channel> = concrete.clone();
    let context = InstanceContext::new();
    policy
        .initialize_instance_context(&context, &message(), &channel)
        .unwrap();

    // Materialize the scoped component so its disposer is registered
    let binding = context.binding().unwrap();
    if let ferrous_host::host::BindingScope::Owned(scope) = binding.scope() {
        scope.get::<Session>().unwrap();
    }
    policy
        .notify_idle(&context, counting_idle(&idle))
        .unwrap();

    Bound {
        channel: concrete,
        context,
        disposed,
        idle,
    }
}

#[derive(Debug, Clone, Copy)]
enum Event {
    ChannelClosed,
    ChannelFaulted,
    ContextClosed,
    ContextFaulted,
}

fn event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::ChannelClosed),
        Just(Event::ChannelFaulted),
        Just(Event::ContextClosed),
        Just(Event::ContextFaulted),
    ]
}

proptest! {
    #[test]
    fn teardown_happens_once_for_any_event_sequence(events in prop::collection::vec(event(), 0..8)) {
        let bound = bound_session();

        for event in &events {
            match event {
                Event::ChannelClosed => bound.channel.close(),
                Event::ChannelFaulted => bound.channel.fault(),
                Event::ContextClosed => bound.context.close(),
                Event::ContextFaulted => bound.context.fault(),
            }
        }

        let expected = if events.is_empty() { 0 } else { 1 };
        prop_assert_eq!(bound.disposed.load(Ordering::SeqCst), expected);
        prop_assert_eq!(bound.idle.load(Ordering::SeqCst), expected);
        prop_assert_eq!(bound.context.binding().unwrap().is_disposed(), !events.is_empty());
    }
}

#[test]
fn test_close_and_fault_racing_tear_down_once() {
    for _ in 0..200 {
        let bound = bound_session();
        let barrier = Arc::new(Barrier::new(3));

        let closer = {
            let channel = bound.channel.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                channel.close();
            })
        };
        let faulter = {
            let channel = bound.channel.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                channel.fault();
            })
        };
        let context_closer = {
            let context = bound.context.clone();
            thread::spawn(move || {
                barrier.wait();
                context.close();
            })
        };

        closer.join().unwrap();
        faulter.join().unwrap();
        context_closer.join().unwrap();

        assert_eq!(bound.disposed.load(Ordering::SeqCst), 1);
        assert_eq!(bound.idle.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_dropping_the_context_tears_down() {
    let bound = bound_session();
    let Bound {
        channel,
        context,
        disposed,
        idle,
    } = bound;

    drop(context);
    assert_eq!(disposed.load(Ordering::SeqCst), 0, "the channel still holds the session");

    drop(channel);
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
    // The context is gone, so there is nobody to hand to idle callbacks
    assert_eq!(idle.load(Ordering::SeqCst), 0);
}

#[test]
fn test_per_call_binding_ignores_channel_reuse() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let policy = PerCallPolicy::new(provider(&disposed));
    let concrete = MemoryChannel::open();
    let channel: Arc<dyn Channel> = concrete.clone();

    let first = InstanceContext::new();
    let second = InstanceContext::new();
    policy.initialize_instance_context(&first, &message(), &channel).unwrap();
    policy.initialize_instance_context(&second, &message(), &channel).unwrap();
    assert!(channel.session_slot().get().is_none());

    concrete.close();
    assert!(first.binding().unwrap().is_disposed());
    assert!(second.binding().unwrap().is_disposed());
}
