use keystone_di::{
    Constructor, Container, ContainerOptions, DiError, DiagnosticKind, ErrorCategory, Injectable, Lifestyle,
    Parameter, Resolver, Severity, VerificationOption,
};
use std::sync::Arc;

struct Leaf;

impl Injectable for Leaf {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |_| Ok(Leaf))]
    }
}

struct Branch {
    _leaf: Arc<Leaf>,
}

impl Injectable for Branch {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |args| Ok(Branch { _leaf: args.next()? }))
            .param(Parameter::service::<Leaf>("leaf"))]
    }
}

struct Tree {
    _branch: Arc<Branch>,
}

impl Injectable for Tree {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |args| Ok(Tree { _branch: args.next()? }))
            .param(Parameter::service::<Branch>("branch"))]
    }
}

struct Settings {
    _retries: u32,
}

impl Injectable for Settings {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |args| Ok(Settings { _retries: args.value()? }))
            .param(Parameter::value::<u32>("retries"))]
    }
}

struct Greeting {
    _text: Arc<String>,
}

impl Injectable for Greeting {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |args| Ok(Greeting { _text: args.next()? }))
            .param(Parameter::service::<String>("text"))]
    }
}

struct Ping {
    _pong: Arc<Pong>,
}

struct Pong {
    _ping: Arc<Ping>,
}

impl Injectable for Ping {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |args| Ok(Ping { _pong: args.next()? }))
            .param(Parameter::service::<Pong>("pong"))]
    }
}

impl Injectable for Pong {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |args| Ok(Pong { _ping: args.next()? }))
            .param(Parameter::service::<Ping>("ping"))]
    }
}

struct Ouroboros {
    _tail: Arc<Ouroboros>,
}

impl Injectable for Ouroboros {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |args| Ok(Ouroboros { _tail: args.next()? }))
            .param(Parameter::service::<Ouroboros>("tail"))]
    }
}

fn verification_error(result: Result<keystone_di::VerificationReport, DiError>) -> keystone_di::VerificationError {
    match result {
        Err(DiError::Verification(error)) => error,
        Err(other) => panic!("expected a verification error, got {other}"),
        Ok(_) => panic!("expected verification to fail"),
    }
}

#[test]
fn test_valid_graph_verifies() {
    let container = Container::new();
    container.register_concrete::<Leaf>(Lifestyle::Transient).unwrap();
    container.register_concrete::<Branch>(Lifestyle::Transient).unwrap();
    container.register_concrete::<Tree>(Lifestyle::Transient).unwrap();

    let report = container.verify().unwrap();
    assert!(!report.has_warnings());
    assert_eq!(report.graph().nodes.len(), 3);
    assert_eq!(report.graph().edges.len(), 2);
    assert!(container.is_locked());
}

#[test]
fn test_missing_dependency_is_reported() {
    let container = Container::new();
    container.register_concrete::<Branch>(Lifestyle::Transient).unwrap();

    let error = verification_error(container.verify());
    assert_eq!(error.issues.len(), 1);
    assert_eq!(error.issues[0].kind, DiagnosticKind::MissingDependency);
    assert!(error.mentions("contains the parameter 'leaf'"));
    assert!(error.mentions("that is not registered"));
}

#[test]
fn test_failed_dependency_is_reported_once_per_target() {
    let container = Container::new();
    // Branch can't be built; Tree depends on it
    container.register_concrete::<Branch>(Lifestyle::Transient).unwrap();
    container.register_concrete::<Tree>(Lifestyle::Transient).unwrap();

    let error = verification_error(container.verify());
    let missing: Vec<_> = error
        .issues
        .iter()
        .filter(|issue| issue.message.contains("could not be built"))
        .collect();
    assert_eq!(missing.len(), 1);
    assert!(missing[0].service.ends_with("Branch"));
}

#[test]
fn test_value_parameter_message() {
    let container = Container::new();
    container.register_concrete::<Settings>(Lifestyle::Transient).unwrap();

    let error = verification_error(container.verify());
    assert!(error.mentions("contains parameter 'retries' of type u32 which can not be used for constructor injection because it is a value type."));
}

#[test]
fn test_ambiguous_parameter_message() {
    let container = Container::new();
    container.register_instance(Arc::new("hello".to_string())).unwrap();
    container.register_concrete::<Greeting>(Lifestyle::Transient).unwrap();

    let error = verification_error(container.verify());
    assert_eq!(error.issues.len(), 1);
    assert!(error.mentions("contains parameter 'text' of type alloc::string::String which can not be used for constructor injection."));
}

#[test]
fn test_two_node_cycle_is_reported() {
    let container = Container::new();
    container.register_concrete::<Ping>(Lifestyle::Transient).unwrap();
    container.register_concrete::<Pong>(Lifestyle::Transient).unwrap();

    let error = verification_error(container.verify());
    let cycles: Vec<_> = error.issues.iter().filter(|issue| issue.kind == DiagnosticKind::Cycle).collect();
    assert_eq!(cycles.len(), 1);
    assert!(cycles[0].message.starts_with("Cyclic dependency: "));
    assert!(cycles[0].message.contains("Ping"));
    assert!(cycles[0].message.contains("Pong"));
}

#[test]
fn test_self_cycle_is_reported() {
    let container = Container::new();
    container.register_concrete::<Ouroboros>(Lifestyle::Transient).unwrap();

    let error = verification_error(container.verify());
    assert!(error.issues.iter().any(|issue| issue.kind == DiagnosticKind::Cycle));
}

#[test]
fn test_adhoc_cycle_resolution_fails_instead_of_overflowing() {
    let container = Container::new();
    container.register_concrete::<Ping>(Lifestyle::Transient).unwrap();
    container.register_concrete::<Pong>(Lifestyle::Transient).unwrap();

    match container.get_instance::<Ping>() {
        Err(DiError::Cyclic(path)) => {
            assert_eq!(path.len(), 3);
            assert_eq!(path.first(), path.last());
            assert!(path[0].ends_with("Ping"));
        }
        other => panic!("expected a cycle, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_lifestyle_mismatch_is_a_warning() {
    let container = Container::new();
    container.register_concrete::<Leaf>(Lifestyle::Transient).unwrap();
    container.register_concrete::<Branch>(Lifestyle::Singleton).unwrap();

    let report = container.verify().unwrap();
    assert_eq!(report.warnings().len(), 1);

    let warning = &report.warnings()[0];
    assert_eq!(warning.kind, DiagnosticKind::LifestyleMismatch);
    assert_eq!(warning.severity(), Severity::Warning);
    assert!(warning.message.starts_with("Potential lifestyle mismatch:"));
    assert!(warning.message.contains("Branch (Singleton) depends on"));
    assert!(warning.message.contains("Leaf (Transient)"));
}

#[test]
fn test_scoped_in_singleton_is_a_mismatch() {
    let container = Container::new();
    container.register_concrete::<Leaf>(Lifestyle::scoped()).unwrap();
    container.register_concrete::<Branch>(Lifestyle::Singleton).unwrap();

    let report = container.verify().unwrap();
    assert_eq!(report.warnings().len(), 1);
}

#[test]
fn test_longer_lived_dependencies_are_fine() {
    let container = Container::new();
    container.register_concrete::<Leaf>(Lifestyle::Singleton).unwrap();
    container.register_concrete::<Branch>(Lifestyle::scoped()).unwrap();
    container.register_concrete::<Tree>(Lifestyle::Transient).unwrap();

    assert!(!container.verify().unwrap().has_warnings());
}

#[test]
fn test_verify_is_idempotent() {
    let container = Container::new();
    container.register_concrete::<Branch>(Lifestyle::Transient).unwrap();
    container.register_concrete::<Ping>(Lifestyle::Transient).unwrap();
    container.register_concrete::<Pong>(Lifestyle::Transient).unwrap();

    let first = verification_error(container.verify());
    let second = verification_error(container.verify());
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(first.issues.len(), second.issues.len());
    assert_eq!(DiError::Verification(first).category(), ErrorCategory::Verification);
}

#[test]
fn test_all_issues_are_aggregated() {
    let container = Container::new();
    container.register_concrete::<Branch>(Lifestyle::Transient).unwrap();
    container.register_concrete::<Settings>(Lifestyle::Transient).unwrap();

    let error = verification_error(container.verify());
    assert_eq!(error.issues.len(), 2);
    assert!(error.to_string().starts_with("The configuration is invalid. 2 issue(s) found:"));
}

#[test]
fn test_verify_and_instantiate_runs_factories() {
    let options = ContainerOptions::new().with_verification(VerificationOption::VerifyAndInstantiate);
    let container = Container::with_options(options);
    container
        .register_factory::<Leaf, _>(Lifestyle::scoped(), |_| Err(DiError::factory("Leaf", "disk unavailable")))
        .unwrap();

    let error = verification_error(container.verify());
    assert_eq!(error.issues.len(), 1);
    assert_eq!(error.issues[0].kind, DiagnosticKind::Instantiation);
    assert!(error.mentions("disk unavailable"));
}

#[test]
fn test_compile_only_verification_does_not_run_factories() {
    let container = Container::new();
    container
        .register_factory::<Leaf, _>(Lifestyle::Transient, |_| Err(DiError::factory("Leaf", "disk unavailable")))
        .unwrap();

    assert!(container.verify().is_ok());
}

#[test]
fn test_relationships_require_lock() {
    let container = Container::new();
    container.register_concrete::<Leaf>(Lifestyle::Transient).unwrap();
    container.register_concrete::<Branch>(Lifestyle::Singleton).unwrap();

    assert!(matches!(container.relationships(), Err(DiError::InvalidOperation(_))));

    container.verify().unwrap();
    let relationships = container.relationships().unwrap();
    assert_eq!(relationships.len(), 1);
    assert!(relationships[0].implementation_type().name().ends_with("Branch"));
    assert_eq!(relationships[0].lifestyle(), &Lifestyle::Singleton);
    assert!(relationships[0].dependency().service_type().name().ends_with("Leaf"));
    assert!(relationships[0].is_lifestyle_mismatch());
}

#[test]
fn test_hybrid_edges_are_merged() {
    let container = Container::new();
    container.register_concrete::<Leaf>(Lifestyle::Transient).unwrap();
    let hybrid = Lifestyle::hybrid(|| false, Lifestyle::Singleton, Lifestyle::scoped());
    container.register_concrete::<Branch>(hybrid.clone()).unwrap();

    let report = container.verify().unwrap();
    // both branches consume Leaf; the hybrid reports a single edge
    assert_eq!(report.graph().edges.len(), 1);
    assert_eq!(report.graph().edges[0].lifestyle, hybrid.name());
    assert_eq!(report.warnings().len(), 1);
}

#[cfg(feature = "graph-export")]
#[test]
fn test_graph_exports_as_json() {
    let container = Container::new();
    container.register_concrete::<Leaf>(Lifestyle::Singleton).unwrap();
    container.register_concrete::<Branch>(Lifestyle::Transient).unwrap();

    let report = container.verify().unwrap();
    let json = report.graph().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(value["edges"].as_array().unwrap().len(), 1);
    assert_eq!(value["edges"][0]["lifestyle"], "Transient");

    let restored: keystone_di::DependencyGraph = serde_json::from_str(&json).unwrap();
    assert_eq!(&restored, report.graph());
}
