use keystone_di::{Constructor, Container, DiError, Injectable, Key, Lifestyle, Parameter, Resolver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Settings {
    source: &'static str,
}

impl Injectable for Settings {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |_| Ok(Settings { source: "constructed" }))]
    }
}

struct Service {
    settings: Arc<Settings>,
}

impl Injectable for Service {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |args| Ok(Service { settings: args.next()? }))
            .param(Parameter::service::<Settings>("settings"))]
    }
}

#[test]
fn test_hook_supplies_missing_registration() {
    let container = Container::new();
    container
        .on_unregistered_type(|event| {
            if event.key() == Key::of::<Settings>() {
                event.register::<Settings, Settings>(Lifestyle::Singleton)?;
            }
            Ok(())
        })
        .unwrap();

    let a = container.get_instance::<Settings>().unwrap();
    let b = container.get_instance::<Settings>().unwrap();
    assert_eq!(a.source, "constructed");
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn test_hook_runs_once_per_key() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();

    let container = Container::new();
    container
        .on_unregistered_type(move |event| {
            seen.fetch_add(1, Ordering::SeqCst);
            if event.key() == Key::of::<Settings>() {
                event.register_factory::<Settings, _>(Lifestyle::Transient, |_| {
                    Ok(Arc::new(Settings { source: "hook" }))
                })?;
            }
            Ok(())
        })
        .unwrap();

    for _ in 0..3 {
        assert_eq!(container.get_instance::<Settings>().unwrap().source, "hook");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_hook_not_consulted_for_registered_types() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();

    let container = Container::new();
    container.register_concrete::<Settings>(Lifestyle::Transient).unwrap();
    container
        .on_unregistered_type(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    container.get_instance::<Settings>().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_hook_satisfies_constructor_dependencies_during_verify() {
    let container = Container::new();
    container.register_concrete::<Service>(Lifestyle::Transient).unwrap();
    container
        .on_unregistered_type(|event| {
            if event.key() == Key::of::<Settings>() {
                event.register::<Settings, Settings>(Lifestyle::Singleton)?;
            }
            Ok(())
        })
        .unwrap();

    let report = container.verify().unwrap();
    assert_eq!(report.graph().nodes.len(), 2);
    assert_eq!(container.get_instance::<Service>().unwrap().settings.source, "constructed");
    assert_eq!(container.get_current_registrations().len(), 2);
}

#[test]
fn test_unhandled_key_is_not_registered() {
    let container = Container::new();
    container.on_unregistered_type(|_| Ok(())).unwrap();

    assert!(matches!(container.get_instance::<Settings>(), Err(DiError::NotRegistered(_))));
}

#[test]
fn test_two_suppliers_conflict() {
    let container = Container::new();
    for _ in 0..2 {
        container
            .on_unregistered_type(|event| {
                if !event.handled() || event.key() == Key::of::<Settings>() {
                    event.register::<Settings, Settings>(Lifestyle::Transient)?;
                }
                Ok(())
            })
            .unwrap();
    }

    match container.get_instance::<Settings>() {
        Err(DiError::Configuration(message)) => {
            assert!(message.contains("Multiple unregistered type hooks"));
        }
        other => panic!("expected a configuration error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_hook_must_supply_requested_service() {
    struct Other;

    let container = Container::new();
    container
        .on_unregistered_type(|event| {
            if event.key() == Key::of::<Other>() {
                event.register::<Settings, Settings>(Lifestyle::Transient)?;
            }
            Ok(())
        })
        .unwrap();

    match container.get_instance::<Other>() {
        Err(DiError::Configuration(message)) => assert!(message.contains("does not implement")),
        other => panic!("expected a configuration error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_hooks_cannot_be_added_after_lock() {
    let container = Container::new();
    container.verify().unwrap();

    assert!(matches!(container.on_unregistered_type(|_| Ok(())), Err(DiError::Locked)));
}
