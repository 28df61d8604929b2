//! PerSession instancing: one context and child scope per channel.

mod support;

use ferrous_host::host::{InstanceContext, InstanceContextMode, InstanceContextProvider};
use ferrous_host::{HostError, Lifetime};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use support::{
    channel, counting_idle, dispatch, echo_host, echo_runtime, message, Echo, ScopeLedger,
};

#[test]
fn test_echo_session_scenario() {
    let ledger = Arc::new(ScopeLedger::default());
    let created = Arc::new(AtomicUsize::new(0));
    let host = echo_host(
        InstanceContextMode::PerSession,
        Lifetime::Transient,
        ledger.clone(),
        created.clone(),
    );
    let runtime = echo_runtime(&host);
    let (concrete, channel) = channel();

    let mut contexts = Vec::new();
    for text in ["one", "two", "three"] {
        let (context, instance) = dispatch(runtime, &channel, &message()).unwrap();
        let echo = instance.contract::<dyn Echo>().unwrap();
        assert!(echo.echo(text).ends_with(text));
        contexts.push(context);
    }

    // One session: one context, one scope, three resolutions against it
    assert!(contexts.iter().all(|c| Arc::ptr_eq(c, &contexts[0])));
    assert_eq!(ledger.opened(), 1);
    assert_eq!(created.load(Ordering::SeqCst), 3);
    assert_eq!(ledger.resolutions_of("EchoService"), 3);
    assert_eq!(ledger.disposed(), 0);

    concrete.close();
    assert_eq!(ledger.disposed(), 1);
    assert!(contexts[0].binding().unwrap().is_disposed());
}

#[test]
fn test_scoped_registration_is_resolved_once_per_session() {
    let ledger = Arc::new(ScopeLedger::default());
    let created = Arc::new(AtomicUsize::new(0));
    let host = echo_host(
        InstanceContextMode::PerSession,
        Lifetime::Scoped,
        ledger,
        created.clone(),
    );
    let runtime = echo_runtime(&host);
    let (_, channel) = channel();

    let (_, a) = dispatch(runtime, &channel, &message()).unwrap();
    let (_, b) = dispatch(runtime, &channel, &message()).unwrap();
    let (_, c) = dispatch(runtime, &channel, &message()).unwrap();

    assert!(a.ptr_eq(&b) && b.ptr_eq(&c));
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_independent_sessions_get_independent_scopes() {
    let ledger = Arc::new(ScopeLedger::default());
    let host = echo_host(
        InstanceContextMode::PerSession,
        Lifetime::Scoped,
        ledger.clone(),
        Arc::new(AtomicUsize::new(0)),
    );
    let runtime = echo_runtime(&host);
    let (first, first_channel) = channel();
    let (_, second_channel) = channel();

    let (ctx1, a) = dispatch(runtime, &first_channel, &message()).unwrap();
    let (ctx2, b) = dispatch(runtime, &second_channel, &message()).unwrap();

    assert!(!Arc::ptr_eq(&ctx1, &ctx2));
    assert!(!a.ptr_eq(&b));
    assert_eq!(ledger.opened(), 2);

    // Closing one session leaves the other alone
    first.close();
    assert!(ctx1.binding().unwrap().is_disposed());
    assert!(!ctx2.binding().unwrap().is_disposed());
    assert!(dispatch(runtime, &second_channel, &message()).is_ok());
}

#[test]
fn test_idle_follows_the_channel() {
    let host = echo_host(
        InstanceContextMode::PerSession,
        Lifetime::Transient,
        Arc::new(ScopeLedger::default()),
        Arc::new(AtomicUsize::new(0)),
    );
    let runtime = echo_runtime(&host);
    let contexts = runtime.instance_context_provider.as_ref().unwrap();
    let (concrete, channel) = channel();

    let (context, _) = dispatch(runtime, &channel, &message()).unwrap();
    let fired = Arc::new(AtomicUsize::new(0));
    contexts.notify_idle(&context, counting_idle(&fired)).unwrap();

    assert!(!contexts.is_idle(&context).unwrap());
    concrete.fault();
    assert!(contexts.is_idle(&context).unwrap());
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    // Registering after teardown fires at once
    contexts.notify_idle(&context, counting_idle(&fired)).unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 2);
}

#[test]
fn test_calls_after_close_fail_to_resolve() {
    let host = echo_host(
        InstanceContextMode::PerSession,
        Lifetime::Transient,
        Arc::new(ScopeLedger::default()),
        Arc::new(AtomicUsize::new(0)),
    );
    let runtime = echo_runtime(&host);
    let (concrete, channel) = channel();

    dispatch(runtime, &channel, &message()).unwrap();
    concrete.close();

    let err = dispatch(runtime, &channel, &message()).unwrap_err();
    assert!(matches!(err, HostError::Resolution(_)));
}

#[test]
fn test_uninitialized_context_is_a_consistency_error() {
    let host = echo_host(
        InstanceContextMode::PerSession,
        Lifetime::Transient,
        Arc::new(ScopeLedger::default()),
        Arc::new(AtomicUsize::new(0)),
    );
    let runtime = echo_runtime(&host);
    let contexts = runtime.instance_context_provider.as_ref().unwrap();
    let instances = runtime.instance_provider.as_ref().unwrap();
    let stray = InstanceContext::new();

    assert!(matches!(contexts.is_idle(&stray), Err(HostError::Consistency(_))));
    assert!(matches!(instances.get_instance(&stray), Err(HostError::Consistency(_))));
}

#[test]
fn test_second_initialize_on_one_channel_is_rejected() {
    let host = echo_host(
        InstanceContextMode::PerSession,
        Lifetime::Transient,
        Arc::new(ScopeLedger::default()),
        Arc::new(AtomicUsize::new(0)),
    );
    let runtime = echo_runtime(&host);
    let contexts = runtime.instance_context_provider.as_ref().unwrap();
    let (_, channel) = channel();

    dispatch(runtime, &channel, &message()).unwrap();
    let intruder = InstanceContext::new();
    let err = contexts
        .initialize_instance_context(&intruder, &message(), &channel)
        .unwrap_err();

    assert!(matches!(err, HostError::Consistency(_)));
    assert!(channel.session_slot().detach().is_err());
}
