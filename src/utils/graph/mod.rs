//! Generic directed graph infrastructure.
//!
//! The control-flow and dominator analyses are written against the small trait
//! family defined here rather than against a concrete graph type:
//!
//! - [`GraphBase`] - node count and node enumeration
//! - [`Successors`] / [`Predecessors`] - adjacency in either direction
//! - [`RootedGraph`] - a graph with a distinguished entry node
//!
//! [`DirectedGraph`] is a plain adjacency-list implementation of all of them. It is
//! used by unit tests and by callers that want to run the algorithms in
//! [`algorithms`] on graphs that are not derived from IR.

pub mod algorithms;
mod node;

pub use node::NodeId;

use crate::{Error, Result};

/// Basic graph properties shared by every graph view.
pub trait GraphBase {
    /// Returns the number of nodes. Valid ids are `0..node_count()`.
    fn node_count(&self) -> usize;

    /// Returns an iterator over every node id in index order.
    fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.node_count()).map(NodeId::new)
    }
}

/// Forward adjacency.
pub trait Successors: GraphBase {
    /// Returns the direct successors of `node`, in edge insertion order.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_;
}

/// Backward adjacency.
pub trait Predecessors: GraphBase {
    /// Returns the direct predecessors of `node`, in edge insertion order.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_;
}

/// A graph with a single distinguished entry node.
pub trait RootedGraph: Successors + Predecessors {
    /// The entry node from which reachability is defined.
    fn entry(&self) -> NodeId;
}

/// A simple adjacency-list directed graph with node payloads.
///
/// Parallel edges are kept; algorithms built on [`Successors`] must tolerate
/// seeing the same successor more than once.
#[derive(Debug, Clone)]
pub struct DirectedGraph<N> {
    nodes: Vec<N>,
    succs: Vec<Vec<NodeId>>,
    preds: Vec<Vec<NodeId>>,
    entry: Option<NodeId>,
}

impl<N> Default for DirectedGraph<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> DirectedGraph<N> {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        DirectedGraph {
            nodes: Vec::new(),
            succs: Vec::new(),
            preds: Vec::new(),
            entry: None,
        }
    }

    /// Adds a node and returns its id. The first node added becomes the entry
    /// unless [`set_entry`](Self::set_entry) says otherwise.
    pub fn add_node(&mut self, data: N) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(data);
        self.succs.push(Vec::new());
        self.preds.push(Vec::new());
        if self.entry.is_none() {
            self.entry = Some(id);
        }
        id
    }

    /// Adds an edge `from -> to`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if either endpoint does not exist.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        if from.index() >= self.nodes.len() || to.index() >= self.nodes.len() {
            return Err(Error::GraphError(format!(
                "edge {from} -> {to} references a node outside 0..{}",
                self.nodes.len()
            )));
        }
        self.succs[from.index()].push(to);
        self.preds[to.index()].push(from);
        Ok(())
    }

    /// Overrides the entry node.
    pub fn set_entry(&mut self, entry: NodeId) {
        self.entry = Some(entry);
    }

    /// Returns the payload of `node`, if it exists.
    #[must_use]
    pub fn node(&self, node: NodeId) -> Option<&N> {
        self.nodes.get(node.index())
    }
}

impl<N> GraphBase for DirectedGraph<N> {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl<N> Successors for DirectedGraph<N> {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.succs
            .get(node.index())
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }
}

impl<N> Predecessors for DirectedGraph<N> {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.preds
            .get(node.index())
            .into_iter()
            .flat_map(|p| p.iter().copied())
    }
}

impl<N> RootedGraph for DirectedGraph<N> {
    fn entry(&self) -> NodeId {
        self.entry.unwrap_or(NodeId::new(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_edge_rejects_unknown_nodes() {
        let mut graph: DirectedGraph<()> = DirectedGraph::new();
        let a = graph.add_node(());
        assert!(graph.add_edge(a, NodeId::new(7)).is_err());
        assert!(graph.add_edge(a, a).is_ok());
    }

    #[test]
    fn test_adjacency_both_directions() {
        let mut graph: DirectedGraph<&str> = DirectedGraph::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        let c = graph.add_node("c");
        graph.add_edge(a, b).unwrap();
        graph.add_edge(a, c).unwrap();
        graph.add_edge(b, c).unwrap();

        assert_eq!(graph.successors(a).collect::<Vec<_>>(), vec![b, c]);
        assert_eq!(graph.predecessors(c).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(graph.entry(), a);
        assert_eq!(graph.node(b), Some(&"b"));
    }
}
