//! Configuration diagnostics: dependency edges, the verification report and
//! the graph built while verifying.

mod graph;
mod verifier;

use std::fmt;
use std::sync::Arc;

use crate::key::TypeInfo;
use crate::lifestyle::Lifestyle;
use crate::producer::InstanceProducer;

pub use graph::{DependencyGraph, GraphEdge, GraphNode};
pub(crate) use verifier::{verify, walk};

/// A dependency edge recorded while a registration built its plan.
///
/// `implementation` consumes `dependency`; `lifestyle` is the lifestyle of
/// the consuming registration.
#[derive(Clone)]
pub struct KnownRelationship {
    implementation: TypeInfo,
    lifestyle: Lifestyle,
    dependency: Arc<InstanceProducer>,
}

impl KnownRelationship {
    pub(crate) fn new(implementation: TypeInfo, lifestyle: Lifestyle, dependency: Arc<InstanceProducer>) -> Self {
        Self { implementation, lifestyle, dependency }
    }

    pub fn implementation_type(&self) -> TypeInfo {
        self.implementation
    }

    pub fn lifestyle(&self) -> &Lifestyle {
        &self.lifestyle
    }

    pub fn dependency(&self) -> &Arc<InstanceProducer> {
        &self.dependency
    }

    /// Whether a longer-lived component holds a shorter-lived dependency.
    ///
    /// Always `false` for collection dependencies: a collection holds its
    /// elements' instances, so the elements are what must live long enough.
    pub fn is_lifestyle_mismatch(&self) -> bool {
        !self.dependency.registration().is_collection()
            && self.lifestyle.component_length() > self.dependency.lifestyle().dependency_length()
    }

    pub(crate) fn with_lifestyle(self, lifestyle: Lifestyle) -> Self {
        Self { lifestyle, ..self }
    }

    pub(crate) fn with_dependency(self, dependency: Arc<InstanceProducer>) -> Self {
        Self { dependency, ..self }
    }

    pub(crate) fn same_edge(&self, other: &KnownRelationship) -> bool {
        self.implementation == other.implementation
            && self.lifestyle == other.lifestyle
            && Arc::ptr_eq(&self.dependency, &other.dependency)
    }
}

impl fmt::Debug for KnownRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnownRelationship")
            .field("implementation", &self.implementation)
            .field("lifestyle", &self.lifestyle)
            .field("dependency", &self.dependency.key())
            .finish()
    }
}

/// Whether an issue blocks verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Class of a diagnostic finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A producer's plan could not be built
    Build,
    /// A dependency is unregistered or failed to build
    MissingDependency,
    /// A producer depends on itself through relationship edges
    Cycle,
    /// A component outlives one of its dependencies
    LifestyleMismatch,
    /// Resolving a producer failed during instantiating verification
    Instantiation,
    /// The verification scope failed to dispose its instances
    Disposal,
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::LifestyleMismatch => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiagnosticKind::Build => "Build error",
            DiagnosticKind::MissingDependency => "Missing dependency",
            DiagnosticKind::Cycle => "Cyclic dependency",
            DiagnosticKind::LifestyleMismatch => "Lifestyle mismatch",
            DiagnosticKind::Instantiation => "Instantiation error",
            DiagnosticKind::Disposal => "Disposal error",
        };
        f.write_str(label)
    }
}

/// One finding of [`Container::verify`](crate::Container::verify).
#[derive(Debug, Clone)]
pub struct DiagnosticIssue {
    pub kind: DiagnosticKind,
    /// Service the finding is reported against
    pub service: String,
    pub message: String,
}

impl DiagnosticIssue {
    pub(crate) fn new(kind: DiagnosticKind, service: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind, service: service.into(), message: message.into() }
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Outcome of a successful verification.
///
/// # Examples
///
/// ```rust
/// use keystone_di::{Constructor, Container, Injectable, Lifestyle, Parameter};
///
/// struct Clock;
/// impl Injectable for Clock {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new("new", |_| Ok(Clock))]
///     }
/// }
///
/// struct Cache { _clock: std::sync::Arc<Clock> }
/// impl Injectable for Cache {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new("new", |args| Ok(Cache { _clock: args.next()? }))
///             .param(Parameter::service::<Clock>("clock"))]
///     }
/// }
///
/// let container = Container::new();
/// container.register_concrete::<Clock>(Lifestyle::Transient).unwrap();
/// container.register_concrete::<Cache>(Lifestyle::Singleton).unwrap();
///
/// let report = container.verify().unwrap();
/// assert_eq!(report.warnings().len(), 1);
/// assert!(report.warnings()[0].message.contains("Potential lifestyle mismatch"));
/// assert_eq!(report.graph().edges.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct VerificationReport {
    warnings: Vec<DiagnosticIssue>,
    graph: DependencyGraph,
}

impl VerificationReport {
    pub(crate) fn new(warnings: Vec<DiagnosticIssue>, graph: DependencyGraph) -> Self {
        Self { warnings, graph }
    }

    /// Non-fatal findings, currently potential lifestyle mismatches.
    pub fn warnings(&self) -> &[DiagnosticIssue] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }
}
