//! Whole-graph verification.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::VerificationOption;
use crate::container::Container;
use crate::error::{DiError, DiResult, VerificationError};
use crate::producer::InstanceProducer;
use crate::provider::ResolverContext;

use super::{DependencyGraph, DiagnosticIssue, DiagnosticKind, KnownRelationship, VerificationReport};

/// A producer reached by [`walk`], with its build failure if any.
pub(crate) struct Visited {
    pub(crate) producer: Arc<InstanceProducer>,
    pub(crate) error: Option<DiError>,
}

/// Visits every registered producer, every producer supplied after the lock
/// and everything reachable from them through relationship edges.
///
/// With `build` set, each producer is compiled before its edges are read;
/// otherwise only edges recorded so far are followed.
pub(crate) fn walk(container: &Container, build: bool) -> Vec<Visited> {
    let snapshot = container.snapshot();
    let mut queue: VecDeque<Arc<InstanceProducer>> = snapshot.roots().cloned().collect();
    queue.extend(container.late_producers());

    let mut seen: HashSet<u64> = HashSet::new();
    let mut visited = Vec::new();

    while let Some(producer) = queue.pop_front() {
        if !seen.insert(producer.id()) {
            continue;
        }
        let error = if build { producer.build(container).err() } else { None };
        for relationship in producer.relationships() {
            if !seen.contains(&relationship.dependency().id()) {
                queue.push_back(relationship.dependency().clone());
            }
        }
        visited.push(Visited { producer, error });
    }

    visited
}

pub(crate) fn verify(container: &Container) -> DiResult<VerificationReport> {
    let visited = walk(container, true);
    let graph = DependencyGraph::from_visited(&visited);

    let mut errors = build_issues(&visited);
    errors.extend(missing_dependency_issues(&visited));
    errors.extend(cycle_issues(&graph));
    let warnings = mismatch_issues(&visited);

    if errors.is_empty() && container.options().verification() == VerificationOption::VerifyAndInstantiate {
        errors.extend(instantiate(container, &visited));
    }

    info!(
        producers = visited.len(),
        errors = errors.len(),
        warnings = warnings.len(),
        "container verified"
    );

    if errors.is_empty() {
        Ok(VerificationReport::new(warnings, graph))
    } else {
        Err(DiError::Verification(VerificationError { issues: errors }))
    }
}

fn build_issues(visited: &[Visited]) -> Vec<DiagnosticIssue> {
    visited
        .iter()
        .filter_map(|entry| {
            let error = entry.error.as_ref()?;
            let kind = match error {
                DiError::NotRegistered(_) | DiError::UnregisteredParameter { .. } => DiagnosticKind::MissingDependency,
                _ => DiagnosticKind::Build,
            };
            Some(DiagnosticIssue::new(kind, entry.producer.key().to_string(), error.to_string()))
        })
        .collect()
}

// Edges into a producer that failed to build, one issue per failed target
fn missing_dependency_issues(visited: &[Visited]) -> Vec<DiagnosticIssue> {
    let failed: HashSet<u64> = visited
        .iter()
        .filter(|entry| entry.error.is_some())
        .map(|entry| entry.producer.id())
        .collect();

    let mut reported = HashSet::new();
    let mut issues = Vec::new();
    for entry in visited {
        for relationship in entry.producer.relationships() {
            let target = relationship.dependency();
            if failed.contains(&target.id()) && reported.insert(target.id()) {
                issues.push(DiagnosticIssue::new(
                    DiagnosticKind::MissingDependency,
                    target.key().to_string(),
                    format!(
                        "{} depends on {}, which could not be built.",
                        relationship.implementation_type(),
                        target.key()
                    ),
                ));
            }
        }
    }
    issues
}

fn cycle_issues(graph: &DependencyGraph) -> Vec<DiagnosticIssue> {
    graph
        .find_cycles()
        .into_iter()
        .map(|cycle| {
            let names: Vec<&str> = cycle
                .iter()
                .filter_map(|id| graph.node(*id))
                .map(|node| node.service.as_str())
                .collect();
            let service = names.first().copied().unwrap_or_default().to_string();
            DiagnosticIssue::new(
                DiagnosticKind::Cycle,
                service,
                format!("Cyclic dependency: {}", names.join(" -> ")),
            )
        })
        .collect()
}

fn mismatch_issues(visited: &[Visited]) -> Vec<DiagnosticIssue> {
    let mut seen: Vec<KnownRelationship> = Vec::new();
    let mut issues = Vec::new();

    for relationship in visited
        .iter()
        .flat_map(|entry| entry.producer.relationships())
        .flat_map(through_collections)
    {
        if !relationship.is_lifestyle_mismatch() || seen.iter().any(|known| known.same_edge(&relationship)) {
            continue;
        }
        let dependency = relationship.dependency();
        let message = format!(
            "Potential lifestyle mismatch: {} ({}) depends on {} ({}).",
            relationship.implementation_type(),
            relationship.lifestyle(),
            dependency.implementation_type(),
            dependency.lifestyle()
        );
        warn!(
            component = %relationship.implementation_type(),
            dependency = %dependency.implementation_type(),
            "{message}"
        );
        issues.push(DiagnosticIssue::new(
            DiagnosticKind::LifestyleMismatch,
            relationship.implementation_type().to_string(),
            message,
        ));
        seen.push(relationship);
    }

    issues
}

// An edge into a collection stands for one edge into each of its elements,
// carrying the consumer's lifestyle.
fn through_collections(relationship: KnownRelationship) -> Vec<KnownRelationship> {
    let mut edges = Vec::new();
    let mut expanded = HashSet::new();
    let mut pending = VecDeque::from([relationship]);

    while let Some(edge) = pending.pop_front() {
        let dependency = edge.dependency().clone();
        if !dependency.registration().is_collection() {
            edges.push(edge);
            continue;
        }
        if !expanded.insert(dependency.id()) {
            continue;
        }
        for element in dependency.relationships() {
            pending.push_back(edge.clone().with_dependency(element.dependency().clone()));
        }
    }

    edges
}

// Resolves everything once inside a throw-away scope
fn instantiate(container: &Container, visited: &[Visited]) -> Vec<DiagnosticIssue> {
    let outcome = container.using_scope(|scope| {
        let context = ResolverContext::new(container.clone(), Some(scope.clone()));
        Ok(visited
            .iter()
            .filter_map(|entry| {
                let err = entry.producer.resolve(&context).err()?;
                Some(DiagnosticIssue::new(
                    DiagnosticKind::Instantiation,
                    entry.producer.key().to_string(),
                    err.to_string(),
                ))
            })
            .collect::<Vec<_>>())
    });

    match outcome {
        Ok(issues) => issues,
        Err(err) => vec![DiagnosticIssue::new(DiagnosticKind::Disposal, "verification scope", err.to_string())],
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tracing_test::traced_test;

    use super::*;
    use crate::descriptors::{Constructor, Injectable, Parameter};
    use crate::lifestyle::Lifestyle;

    struct Engine;

    impl Injectable for Engine {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new("new", |_| Ok(Engine))]
        }
    }

    struct Car {
        _engine: Arc<Engine>,
    }

    impl Injectable for Car {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new("new", |args| Ok(Car { _engine: args.next()? }))
                .param(Parameter::service::<Engine>("engine"))]
        }
    }

    #[test]
    #[traced_test]
    fn mismatch_is_logged_and_summary_emitted() {
        let container = Container::new();
        container.register_concrete::<Engine>(Lifestyle::Transient).unwrap();
        container.register_concrete::<Car>(Lifestyle::Singleton).unwrap();

        let report = verify(&container).unwrap();
        assert_eq!(report.warnings().len(), 1);
        assert!(logs_contain("Potential lifestyle mismatch"));
        assert!(logs_contain("container verified"));
    }

    #[test]
    fn walk_without_build_only_follows_recorded_edges() {
        let container = Container::new();
        container.register_concrete::<Engine>(Lifestyle::Transient).unwrap();
        container.register_concrete::<Car>(Lifestyle::Transient).unwrap();

        let unbuilt = walk(&container, false);
        assert_eq!(unbuilt.len(), 2);
        assert!(unbuilt.iter().all(|entry| !entry.producer.is_compiled()));

        let built = walk(&container, true);
        assert!(built.iter().all(|entry| entry.producer.is_compiled() && entry.error.is_none()));
    }
}
