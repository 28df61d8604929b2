use ferrous_host::{DiError, Dispose, Lifetime, Resolver, ServiceCollection};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

#[test]
fn test_scoped_lifetime() {
    struct RequestContext {
        id: String,
    }

    let counter = Arc::new(Mutex::new(0));
    let counter_clone = counter.clone();

    let mut sc = ServiceCollection::new();
    sc.register::<RequestContext, _>(move |_| {
        let mut c = counter_clone.lock().unwrap();
        *c += 1;
        Ok(RequestContext {
            id: format!("req-{}", *c),
        })
    })
    .lifetime(Lifetime::Scoped)
    .add();

    let sp = sc.build();

    let scope1 = sp.begin_scope();
    let scope2 = sp.begin_scope();

    let ctx1a = scope1.get::<RequestContext>().unwrap();
    let ctx1b = scope1.get::<RequestContext>().unwrap();
    let ctx2a = scope2.get::<RequestContext>().unwrap();

    // Same instance within same scope
    assert!(Arc::ptr_eq(&ctx1a, &ctx1b));
    // Different instances across scopes
    assert!(!Arc::ptr_eq(&ctx1a, &ctx2a));

    assert_eq!(ctx1a.id, "req-1");
    assert_eq!(ctx2a.id, "req-2");
}

#[test]
fn test_cannot_resolve_scoped_from_root() {
    struct ScopedService;

    let mut sc = ServiceCollection::new();
    sc.register::<ScopedService, _>(|_| Ok(ScopedService))
        .lifetime(Lifetime::Scoped)
        .add();

    let sp = sc.build();

    assert!(matches!(
        sp.get::<ScopedService>(),
        Err(DiError::WrongLifetime(_))
    ));
}

#[test]
fn test_scoped_with_singleton_dependency() {
    struct Database {
        connection: String,
    }

    struct Repository {
        db: Arc<Database>,
    }

    let mut sc = ServiceCollection::new();
    sc.add_instance(Database {
        connection: "postgres://localhost".to_string(),
    });
    sc.register::<Repository, _>(|r| Ok(Repository { db: r.get::<Database>()? }))
        .lifetime(Lifetime::Scoped)
        .add();

    let sp = sc.build();

    let scope1 = sp.begin_scope();
    let scope2 = sp.begin_scope();

    let repo1 = scope1.get::<Repository>().unwrap();
    let repo2 = scope2.get::<Repository>().unwrap();

    // Different repository instances, same database
    assert!(!Arc::ptr_eq(&repo1, &repo2));
    assert!(Arc::ptr_eq(&repo1.db, &repo2.db));
    assert_eq!(repo1.db.connection, "postgres://localhost");
}

struct Tracked {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Dispose for Tracked {
    fn dispose(&self) {
        self.log.lock().unwrap().push(self.name);
    }
}

#[test]
fn test_disposal_runs_in_reverse_order_once() {
    struct First(Arc<Tracked>);
    struct Second(Arc<Tracked>);

    let log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    let first_log = log.clone();
    sc.register::<First, _>(move |r| {
        let tracked = Arc::new(Tracked { name: "first", log: first_log.clone() });
        r.register_disposer(tracked.clone());
        Ok(First(tracked))
    })
    .lifetime(Lifetime::Scoped)
    .add();
    let second_log = log.clone();
    sc.register::<Second, _>(move |r| {
        let tracked = Arc::new(Tracked { name: "second", log: second_log.clone() });
        r.register_disposer(tracked.clone());
        Ok(Second(tracked))
    })
    .lifetime(Lifetime::Scoped)
    .add();

    let sp = sc.build();
    let scope = sp.begin_scope();
    scope.get::<First>().unwrap();
    scope.get::<Second>().unwrap();

    assert!(scope.dispose());
    assert!(!scope.dispose());
    drop(scope);

    assert_eq!(*log.lock().unwrap(), vec!["second", "first"]);
}

#[test]
fn test_disposed_scope_refuses_resolution() {
    struct Unit;

    let mut sc = ServiceCollection::new();
    sc.register::<Unit, _>(|_| Ok(Unit)).lifetime(Lifetime::Scoped).add();

    let sp = sc.build();
    let scope = sp.begin_scope();
    let id = scope.id();
    scope.dispose();

    match scope.get::<Unit>() {
        Err(DiError::ScopeDisposed(scope_id)) => assert_eq!(scope_id, id),
        other => panic!("expected ScopeDisposed, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_dispose_during_construction_still_runs_the_hook() {
    struct Slow;

    let log = Arc::new(Mutex::new(Vec::new()));
    let hook_log = log.clone();
    let barrier = Arc::new(Barrier::new(2));
    let factory_barrier = barrier.clone();

    let mut sc = ServiceCollection::new();
    sc.register::<Slow, _>(move |r| {
        // Entered; then wait for the scope to be disposed underneath us
        factory_barrier.wait();
        factory_barrier.wait();
        r.register_disposer(Arc::new(Tracked { name: "slow", log: hook_log.clone() }));
        Ok(Slow)
    })
    .lifetime(Lifetime::Scoped)
    .add();

    let sp = sc.build();
    let scope = sp.begin_scope();
    let id = scope.id();

    let result = thread::scope(|s| {
        let resolving = s.spawn(|| scope.get::<Slow>().map(|_| ()));
        barrier.wait();
        assert!(scope.dispose());
        barrier.wait();
        resolving.join().unwrap()
    });

    match result {
        Err(DiError::ScopeDisposed(scope_id)) => assert_eq!(scope_id, id),
        other => panic!("expected ScopeDisposed, got {:?}", other),
    }
    assert_eq!(*log.lock().unwrap(), vec!["slow"]);
    assert!(scope.get::<Slow>().is_err());
}

#[test]
fn test_dropping_a_scope_disposes_it() {
    struct Unit;

    let log = Arc::new(Mutex::new(Vec::new()));
    let hook_log = log.clone();

    let mut sc = ServiceCollection::new();
    sc.register::<Unit, _>(move |r| {
        r.register_disposer(Arc::new(Tracked { name: "unit", log: hook_log.clone() }));
        Ok(Unit)
    })
    .lifetime(Lifetime::Scoped)
    .add();

    let sp = sc.build();
    {
        let scope = sp.begin_scope();
        scope.get::<Unit>().unwrap();
    }
    assert_eq!(*log.lock().unwrap(), vec!["unit"]);
}

#[test]
fn test_nested_scopes_have_distinct_ids() {
    let sp = ServiceCollection::new().build();
    let outer = sp.begin_scope();
    let inner = outer.begin_scope();

    assert_ne!(outer.id(), inner.id());
    assert_eq!(inner.parent_id(), outer.id());
    assert!(inner.provider().same_root(&sp));

    // Disposing the parent leaves the child usable
    outer.dispose();
    assert!(!inner.is_disposed());
}
