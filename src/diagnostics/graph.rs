//! Explicit dependency graph: nodes are producers, edges are relationships.

use std::collections::HashMap;

#[cfg(feature = "graph-export")]
use serde::{Deserialize, Serialize};

use super::verifier::Visited;

/// A producer in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub struct GraphNode {
    /// Producer id, unique within the process
    pub id: u64,
    pub service: String,
    pub implementation: String,
    pub lifestyle: String,
    pub component_length: u32,
    pub dependency_length: u32,
    /// Build failure, when the producer could not be compiled
    pub error: Option<String>,
}

/// A relationship: `from` consumes `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub struct GraphEdge {
    pub from: u64,
    pub to: u64,
    /// Consuming implementation type
    pub implementation: String,
    /// Lifestyle the edge was recorded under
    pub lifestyle: String,
    pub component_length: u32,
}

/// Dependency graph assembled once per verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "graph-export", derive(Serialize, Deserialize))]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl DependencyGraph {
    pub(crate) fn from_visited(visited: &[Visited]) -> Self {
        let mut graph = DependencyGraph::default();

        for entry in visited {
            let producer = &entry.producer;
            let lifestyle = producer.lifestyle();
            graph.nodes.push(GraphNode {
                id: producer.id(),
                service: producer.key().to_string(),
                implementation: producer.implementation_type().name().to_string(),
                lifestyle: lifestyle.name(),
                component_length: lifestyle.component_length(),
                dependency_length: lifestyle.dependency_length(),
                error: entry.error.as_ref().map(ToString::to_string),
            });

            for relationship in producer.relationships() {
                graph.edges.push(GraphEdge {
                    from: producer.id(),
                    to: relationship.dependency().id(),
                    implementation: relationship.implementation_type().name().to_string(),
                    lifestyle: relationship.lifestyle().name(),
                    component_length: relationship.lifestyle().component_length(),
                });
            }
        }

        graph
    }

    pub fn node(&self, id: u64) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Outgoing edges of `id`.
    pub fn dependencies_of(&self, id: u64) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |edge| edge.from == id)
    }

    /// Every elementary cycle reachable by depth-first search, each reported
    /// once as a closed path of node ids (`[a, b, a]`).
    ///
    /// Iterative, so self-referential graphs of any depth can't exhaust the stack.
    pub fn find_cycles(&self) -> Vec<Vec<u64>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut adjacency: HashMap<u64, Vec<u64>> = HashMap::new();
        for edge in &self.edges {
            adjacency.entry(edge.from).or_default().push(edge.to);
        }

        let mut color: HashMap<u64, Color> = self.nodes.iter().map(|node| (node.id, Color::White)).collect();
        let mut cycles: Vec<Vec<u64>> = Vec::new();
        let empty = Vec::new();

        for root in self.nodes.iter().map(|node| node.id) {
            if color.get(&root) != Some(&Color::White) {
                continue;
            }

            // (node, index of the next child to visit)
            let mut stack: Vec<(u64, usize)> = vec![(root, 0)];
            color.insert(root, Color::Gray);

            while let Some(top) = stack.last_mut() {
                let (node, next) = *top;
                top.1 += 1;
                let children = adjacency.get(&node).unwrap_or(&empty);
                if let Some(&child) = children.get(next) {
                    match color.get(&child).copied().unwrap_or(Color::Black) {
                        Color::White => {
                            color.insert(child, Color::Gray);
                            stack.push((child, 0));
                        }
                        Color::Gray => {
                            let start = stack.iter().position(|&(id, _)| id == child).unwrap_or(0);
                            let mut cycle: Vec<u64> = stack[start..].iter().map(|&(id, _)| id).collect();
                            cycle.push(child);
                            if !cycles.iter().any(|known| same_cycle(known, &cycle)) {
                                cycles.push(cycle);
                            }
                        }
                        Color::Black => {}
                    }
                } else {
                    color.insert(node, Color::Black);
                    stack.pop();
                }
            }
        }

        cycles
    }

    /// Serializes the graph as pretty-printed JSON.
    #[cfg(feature = "graph-export")]
    pub fn to_json(&self) -> crate::DiResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|_| crate::DiError::InvalidOperation("dependency graph serialization failed"))
    }
}

// Closed paths describe the same cycle when one is a rotation of the other
fn same_cycle(left: &[u64], right: &[u64]) -> bool {
    let left = &left[..left.len().saturating_sub(1)];
    let right = &right[..right.len().saturating_sub(1)];
    if left.len() != right.len() {
        return false;
    }
    (0..left.len()).any(|shift| left.iter().cycle().skip(shift).take(left.len()).eq(right.iter()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(nodes: &[u64], edges: &[(u64, u64)]) -> DependencyGraph {
        DependencyGraph {
            nodes: nodes
                .iter()
                .map(|&id| GraphNode {
                    id,
                    service: format!("S{id}"),
                    implementation: format!("I{id}"),
                    lifestyle: "Transient".to_string(),
                    component_length: 0,
                    dependency_length: 0,
                    error: None,
                })
                .collect(),
            edges: edges
                .iter()
                .map(|&(from, to)| GraphEdge {
                    from,
                    to,
                    implementation: format!("I{from}"),
                    lifestyle: "Transient".to_string(),
                    component_length: 0,
                })
                .collect(),
        }
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let g = graph(&[1, 2, 3], &[(1, 2), (2, 3), (1, 3)]);
        assert!(g.find_cycles().is_empty());
    }

    #[test]
    fn two_node_cycle_is_reported_once() {
        let g = graph(&[1, 2], &[(1, 2), (2, 1)]);
        assert_eq!(g.find_cycles(), vec![vec![1, 2, 1]]);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let g = graph(&[7], &[(7, 7)]);
        assert_eq!(g.find_cycles(), vec![vec![7, 7]]);
    }

    #[test]
    fn deep_chain_does_not_recurse() {
        let ids: Vec<u64> = (0..50_000).collect();
        let edges: Vec<(u64, u64)> = ids.windows(2).map(|pair| (pair[0], pair[1])).chain([(49_999, 0)]).collect();
        let cycles = graph(&ids, &edges).find_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 50_001);
    }

    #[test]
    fn rotations_compare_equal() {
        assert!(same_cycle(&[1, 2, 3, 1], &[2, 3, 1, 2]));
        assert!(!same_cycle(&[1, 2, 1], &[1, 3, 1]));
    }
}
