//! Graph traversal orders.
//!
//! - [`dfs`] - iterative depth-first pre-order, lazily evaluated
//! - [`postorder`] - depth-first post-order
//! - [`reverse_postorder`] - the usual iteration order for forward dataflow
//!
//! All traversals only visit nodes reachable from the start node and break ties
//! by successor order, so the result is deterministic for a given graph.

use crate::utils::graph::{NodeId, Successors};

/// Depth-first pre-order iterator.
///
/// A node is yielded before any of its descendants, and successors are explored
/// in their natural order (the first successor's subtree is finished before the
/// second successor is entered).
pub struct DfsIterator<'g, G: Successors> {
    graph: &'g G,
    stack: Vec<NodeId>,
    visited: Vec<bool>,
}

impl<'g, G: Successors> DfsIterator<'g, G> {
    fn new(graph: &'g G, start: NodeId) -> Self {
        let node_count = graph.node_count();
        let stack = if start.index() < node_count {
            vec![start]
        } else {
            Vec::new()
        };

        DfsIterator {
            graph,
            stack,
            visited: vec![false; node_count],
        }
    }
}

impl<G: Successors> Iterator for DfsIterator<'_, G> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            if self.visited[node.index()] {
                continue;
            }
            self.visited[node.index()] = true;

            // Reverse push so the first successor is popped first
            let successors: Vec<NodeId> = self.graph.successors(node).collect();
            for &succ in successors.iter().rev() {
                if !self.visited[succ.index()] {
                    self.stack.push(succ);
                }
            }

            return Some(node);
        }
        None
    }
}

/// Returns a depth-first pre-order iterator starting from `start`.
///
/// # Complexity
///
/// - Time: O(V + E)
/// - Space: O(V + E) in the worst case for the explicit stack
///
/// # Examples
///
/// ```rust,ignore
/// use evmopt::utils::graph::{DirectedGraph, algorithms::dfs};
///
/// let mut graph: DirectedGraph<&str> = DirectedGraph::new();
/// let a = graph.add_node("A");
/// let b = graph.add_node("B");
/// let c = graph.add_node("C");
/// graph.add_edge(a, b)?;
/// graph.add_edge(b, c)?;
///
/// assert_eq!(dfs(&graph, a).collect::<Vec<_>>(), vec![a, b, c]);
/// ```
pub fn dfs<G: Successors>(graph: &G, start: NodeId) -> DfsIterator<'_, G> {
    DfsIterator::new(graph, start)
}

/// Computes the post-order of nodes reachable from `start`.
///
/// A node appears after all of the nodes first discovered through it.
#[allow(clippy::items_after_statements)]
pub fn postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let node_count = graph.node_count();
    if start.index() >= node_count {
        return Vec::new();
    }

    let mut visited = vec![false; node_count];
    let mut result = Vec::with_capacity(node_count);

    #[derive(Clone, Copy)]
    enum State {
        Enter,
        Exit,
    }

    let mut stack = vec![(start, State::Enter)];

    while let Some((node, state)) = stack.pop() {
        match state {
            State::Enter => {
                if visited[node.index()] {
                    continue;
                }
                visited[node.index()] = true;
                stack.push((node, State::Exit));

                let successors: Vec<NodeId> = graph.successors(node).collect();
                for &succ in successors.iter().rev() {
                    if !visited[succ.index()] {
                        stack.push((succ, State::Enter));
                    }
                }
            }
            State::Exit => result.push(node),
        }
    }

    result
}

/// Computes the reverse post-order of nodes reachable from `start`.
///
/// In an acyclic graph this is a topological order; with loops, every node is
/// still placed after its predecessors along non-back edges, which is what
/// makes it the preferred order for forward dataflow and for the iterative
/// dominator computation.
pub fn reverse_postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let mut order = postorder(graph, start);
    order.reverse();
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::graph::DirectedGraph;

    fn create_diamond_graph() -> (DirectedGraph<&'static str>, [NodeId; 4]) {
        let mut graph = DirectedGraph::new();
        let a = graph.add_node("A");
        let b = graph.add_node("B");
        let c = graph.add_node("C");
        let d = graph.add_node("D");
        graph.add_edge(a, b).unwrap();
        graph.add_edge(a, c).unwrap();
        graph.add_edge(b, d).unwrap();
        graph.add_edge(c, d).unwrap();
        (graph, [a, b, c, d])
    }

    #[test]
    fn test_dfs_diamond_is_preorder() {
        let (graph, [a, b, c, d]) = create_diamond_graph();
        // D is reached through B before C is entered
        assert_eq!(dfs(&graph, a).collect::<Vec<_>>(), vec![a, b, d, c]);
    }

    #[test]
    fn test_dfs_cycle_terminates() {
        let mut graph: DirectedGraph<()> = DirectedGraph::new();
        let a = graph.add_node(());
        let b = graph.add_node(());
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, a).unwrap();
        graph.add_edge(b, b).unwrap();
        assert_eq!(dfs(&graph, a).collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn test_dfs_skips_unreachable() {
        let mut graph: DirectedGraph<()> = DirectedGraph::new();
        let a = graph.add_node(());
        let _island = graph.add_node(());
        assert_eq!(dfs(&graph, a).count(), 1);
        assert_eq!(dfs(&graph, NodeId::new(9)).count(), 0);
    }

    #[test]
    fn test_postorder_diamond() {
        let (graph, [a, b, c, d]) = create_diamond_graph();
        assert_eq!(postorder(&graph, a), vec![d, b, c, a]);
    }

    #[test]
    fn test_reverse_postorder_diamond() {
        let (graph, [a, b, c, d]) = create_diamond_graph();
        let rpo = reverse_postorder(&graph, a);
        assert_eq!(rpo, vec![a, c, b, d]);
        assert_eq!(rpo.first(), Some(&a));
        assert_eq!(rpo.last(), Some(&d));
    }

    #[test]
    fn test_iterator_early_termination() {
        let (graph, [a, ..]) = create_diamond_graph();
        assert_eq!(dfs(&graph, a).take(2).count(), 2);
    }
}
