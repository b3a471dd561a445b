//! Cycle detection over the Link graph.
//!
//! Evaluation guards against cycles at resolve time; this is the static
//! check run by `chill check` so a broken site is caught before it serves.

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use chill_core::{Link, NodeId};

/// Returns every set of Nodes that link to each other in a cycle, including
/// Nodes linked to themselves. Each cycle is sorted, and cycles are ordered
/// by their smallest member.
pub fn link_cycles(links: &[Link]) -> Vec<Vec<NodeId>> {
    let mut graph: DiGraphMap<NodeId, ()> = DiGraphMap::new();
    for link in links {
        graph.add_edge(link.node_id, link.target_node_id, ());
    }

    let mut cycles: Vec<Vec<NodeId>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| match component.as_slice() {
            [single] => graph.contains_edge(*single, *single),
            _ => true,
        })
        .map(|mut component| {
            component.sort();
            component
        })
        .collect();
    cycles.sort();
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(from: i64, to: i64) -> Link {
        Link {
            node_id: NodeId(from),
            target_node_id: NodeId(to),
            name: None,
        }
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        assert!(link_cycles(&[link(1, 2), link(2, 3), link(1, 3)]).is_empty());
    }

    #[test]
    fn finds_two_node_cycle() {
        let cycles = link_cycles(&[link(1, 2), link(2, 1), link(2, 3)]);
        assert_eq!(cycles, vec![vec![NodeId(1), NodeId(2)]]);
    }

    #[test]
    fn self_link_is_a_cycle() {
        let cycles = link_cycles(&[link(4, 4), link(1, 2)]);
        assert_eq!(cycles, vec![vec![NodeId(4)]]);
    }

    #[test]
    fn shared_child_is_not_a_cycle() {
        assert!(link_cycles(&[link(1, 3), link(2, 3)]).is_empty());
    }
}
