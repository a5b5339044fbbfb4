//! End-to-end scenarios through the public facade.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use khazin::prelude::*;
use parking_lot::Mutex;

#[derive(Debug)]
struct Class;

struct Window {
    title: String,
}

impl Construct<(), &'static str> for Window {
    fn construct((): (), title: &'static str) -> Self {
        Window { title: title.into() }
    }
}

struct Engine {
    window: Arc<Window>,
    fps: u32,
}

impl Construct<(Arc<Window>,), u32> for Engine {
    fn construct((window,): (Arc<Window>,), fps: u32) -> Self {
        Engine { window, fps }
    }
}

khazin::service! {
    WindowService => LocalDescriptor<Window, Singleton>;
    EngineService => LocalDescriptor<Engine, Scoped, (WindowService,)>;
}

fn window_engine() -> ServiceProvider {
    let mut services = ServiceCollection::new();
    services
        .add::<WindowService>(LocalDescriptor::with_args("main"))
        .add::<EngineService>(LocalDescriptor::with_args(60u32));
    services.build().unwrap()
}

#[test]
fn service_not_found() {
    type ClassService = FunctorDescriptor<Class, Transient>;

    let mut provider = ServiceCollection::new().build().unwrap();

    assert!(!provider.has::<ClassService>());
    let err = provider.get::<ClassService>().unwrap_err();
    assert!(err.is_service_not_found());
}

#[test]
fn service_not_found_for_wrong_value_type() {
    type Actual = LocalDescriptor<Class, Singleton>;
    type Wrong = FunctorDescriptor<Arc<Class>, Singleton>;

    let mut services = ServiceCollection::new();
    services.add::<Actual>(LocalDescriptor::from_fn(|_| Ok(Class)));
    let mut provider = services.build().unwrap();

    assert!(provider.has::<Actual>());
    assert!(matches!(
        provider.get::<Wrong>(),
        Err(KhazinError::ServiceNotFound(_))
    ));
}

#[test]
fn window_engine_across_scopes() {
    let provider = window_engine();

    let mut first = provider.create_scope();
    let mut second = provider.create_scope();

    let a = first.get::<EngineService>().unwrap();
    let b = second.get::<EngineService>().unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a.window, &b.window));
    assert_eq!(a.window.title, "main");
    assert_eq!(b.fps, 60);
}

#[test]
fn scope_teardown_releases_only_scoped_instances() {
    let provider = window_engine();
    let window = {
        let mut scope = provider.create_scope();
        let engine = scope.get::<EngineService>().unwrap();
        Arc::downgrade(&engine.window)
    };

    // The engine is gone with its scope; the window is a singleton.
    assert!(window.upgrade().is_some());
    assert_eq!(provider.singleton_count(), 1);
}

#[test]
fn singletons_released_in_reverse_creation_order() {
    struct Tracked(&'static str, Arc<Mutex<Vec<&'static str>>>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.1.lock().push(self.0);
        }
    }

    khazin::service! {
        First => FunctorDescriptor<Tracked, Singleton>, key = "first";
        Second => FunctorDescriptor<Tracked, Singleton>, key = "second";
        Third => FunctorDescriptor<Tracked, Singleton>, key = "third";
    }

    let log = Arc::new(Mutex::new(Vec::new()));
    {
        let (l1, l2, l3) = (Arc::clone(&log), Arc::clone(&log), Arc::clone(&log));
        let mut services = ServiceCollection::new();
        services
            .add::<First>(FunctorDescriptor::new(move |_| Ok(Tracked("I1", Arc::clone(&l1)))))
            .add::<Second>(FunctorDescriptor::new(move |_| Ok(Tracked("I2", Arc::clone(&l2)))))
            .add::<Third>(FunctorDescriptor::new(move |_| Ok(Tracked("I3", Arc::clone(&l3)))));
        let mut provider = services.build().unwrap();

        provider.get::<First>().unwrap();
        provider.get::<Second>().unwrap();
        provider.get::<Third>().unwrap();
    }

    assert_eq!(*log.lock(), vec!["I3", "I2", "I1"]);
}

#[test]
fn default_registration_unless_provided() {
    type Title = FunctorDescriptor<String, Singleton>;

    let mut services = ServiceCollection::new();
    services.add::<Title>(FunctorDescriptor::new(|_| Ok(String::from("host"))));
    assert!(!services.emplace::<Title>(FunctorDescriptor::new(|_| Ok(String::from("default")))));

    let mut provider = services.build().unwrap();
    assert_eq!(*provider.get::<Title>().unwrap(), "host");
}

#[test]
fn listeners_notified_in_registration_order() {
    type Listener = FunctorDescriptor<&'static str, Singleton>;

    let mut services = ServiceCollection::new();
    for name in ["audio", "input", "render"] {
        services.add::<Listener>(FunctorDescriptor::new(move |_| Ok(name)));
    }
    let mut provider = services.build().unwrap();

    let mut order = Vec::new();
    provider.for_each::<Listener>(|l| order.push(*l)).unwrap();
    assert_eq!(order, vec!["audio", "input", "render"]);
    assert_eq!(provider.count::<Listener>(), 3);
}

#[test]
fn scopes_resolve_on_many_threads() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&builds);

    let mut services = ServiceCollection::new();
    services
        .add::<WindowService>(LocalDescriptor::from_fn(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Window { title: "shared".into() })
        }))
        .add::<EngineService>(LocalDescriptor::with_args(30u32));
    let provider = Arc::new(services.build().unwrap());

    let windows: Vec<Arc<Window>> = (0..8)
        .map(|_| {
            let provider = Arc::clone(&provider);
            thread::spawn(move || {
                let mut scope = provider.create_scope();
                Arc::clone(&scope.get::<EngineService>().unwrap().window)
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(windows.iter().all(|w| Arc::ptr_eq(w, &windows[0])));
}

#[test]
fn scope_moves_between_threads() {
    let provider = window_engine();
    let mut scope = provider.create_scope();
    let engine = scope.get::<EngineService>().unwrap();

    let again = thread::spawn(move || scope.get::<EngineService>().unwrap())
        .join()
        .unwrap();
    assert!(Arc::ptr_eq(&engine, &again));
}

#[test]
fn modules_compose() {
    struct Graphics;

    impl ServiceModule for Graphics {
        fn register(&self, services: &mut ServiceCollection) {
            services.add::<WindowService>(LocalDescriptor::with_args("module"));
        }
    }

    struct Gameplay;

    impl ServiceModule for Gameplay {
        fn register(&self, services: &mut ServiceCollection) {
            services.add::<EngineService>(LocalDescriptor::with_args(120u32));
        }
    }

    let mut services = ServiceCollection::new();
    services.add_module(&Graphics).add_module(&Gameplay);
    let mut provider = services.build().unwrap();

    let engine = provider.get::<EngineService>().unwrap();
    assert_eq!(engine.window.title, "module");
    assert_eq!(engine.fps, 120);
}
