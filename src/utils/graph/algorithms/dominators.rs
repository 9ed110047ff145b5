//! Dominator tree computation using the Cooper-Harvey-Kennedy iterative algorithm.
//!
//! A node `d` **dominates** a node `n` if every path from the entry node to `n`
//! must pass through `d`. The **immediate dominator** of `n` (idom(n)) is the
//! unique node that strictly dominates `n` but does not strictly dominate any
//! other dominator of `n`. Making every node's immediate dominator its parent
//! yields the dominator tree, rooted at the entry.
//!
//! # Algorithm
//!
//! Nodes are numbered in reverse post-order and the immediate dominator of each
//! node is repeatedly recomputed as the nearest common ancestor ("intersection")
//! of its already-processed predecessors until nothing changes. On reducible
//! graphs this converges in two passes; irreducible graphs take a few more.
//! See Cooper, Harvey & Kennedy, *A Simple, Fast Dominance Algorithm* (2001).
//!
//! Nodes not reachable from the entry have no immediate dominator and are
//! dominated only by themselves.

use std::collections::BTreeSet;

use crate::utils::graph::{algorithms::reverse_postorder, NodeId, Predecessors, Successors};

/// Result of dominator tree computation.
///
/// # Examples
///
/// ```rust,ignore
/// use evmopt::utils::graph::{DirectedGraph, algorithms::compute_dominators};
///
/// // entry -> a -> b
/// let mut graph: DirectedGraph<&str> = DirectedGraph::new();
/// let entry = graph.add_node("entry");
/// let a = graph.add_node("a");
/// let b = graph.add_node("b");
/// graph.add_edge(entry, a)?;
/// graph.add_edge(a, b)?;
///
/// let dom_tree = compute_dominators(&graph, entry);
/// assert!(dom_tree.dominates(entry, b));
/// assert_eq!(dom_tree.immediate_dominator(b), Some(a));
/// ```
#[derive(Debug, Clone)]
pub struct DominatorTree {
    /// The entry (root) node of the dominator tree
    entry: NodeId,
    /// Immediate dominator per node; `None` for the entry and unreachable nodes
    idom: Vec<Option<NodeId>>,
    /// Dominator tree children, in reverse post-order of the graph
    children: Vec<Vec<NodeId>>,
    /// Reachability from the entry
    reachable: Vec<bool>,
}

impl DominatorTree {
    /// Returns the entry (root) node of the dominator tree.
    #[inline]
    #[must_use]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Returns the immediate dominator of a node, or `None` for the entry node
    /// and for nodes that are unreachable from the entry.
    #[inline]
    #[must_use]
    pub fn immediate_dominator(&self, node: NodeId) -> Option<NodeId> {
        self.idom.get(node.index()).copied().flatten()
    }

    /// Returns `true` if `node` is reachable from the entry.
    #[inline]
    #[must_use]
    pub fn is_reachable(&self, node: NodeId) -> bool {
        self.reachable.get(node.index()).copied().unwrap_or(false)
    }

    /// Checks if node `a` dominates node `b`.
    ///
    /// Dominance is reflexive: every node dominates itself. The entry node
    /// dominates every reachable node, and no other node dominates an
    /// unreachable one.
    ///
    /// # Complexity
    ///
    /// O(depth) where depth is the depth of `b` in the dominator tree.
    #[must_use]
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        self.dominators(b).any(|dominator| dominator == a)
    }

    /// Returns an iterator over all dominators of a node, from the node itself
    /// up to the entry node.
    pub fn dominators(&self, node: NodeId) -> DominatorIterator<'_> {
        DominatorIterator {
            tree: self,
            current: Some(node),
        }
    }

    /// Returns the depth of a node in the dominator tree. The entry has depth 0.
    #[must_use]
    pub fn depth(&self, node: NodeId) -> usize {
        self.dominators(node).count() - 1
    }

    /// Returns the nodes immediately dominated by `node`.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.children.get(node.index()).map_or(&[], Vec::as_slice)
    }

    /// Returns the reachable nodes in dominator tree pre-order, starting at the entry.
    ///
    /// Every node appears after its immediate dominator, which is the order
    /// SSA renaming needs.
    #[must_use]
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        if !self.is_reachable(self.entry) {
            return order;
        }
        let mut stack = vec![self.entry];
        while let Some(node) = stack.pop() {
            order.push(node);
            for &child in self.children(node).iter().rev() {
                stack.push(child);
            }
        }
        order
    }

    /// Returns the number of nodes covered by the tree (reachable or not).
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.idom.len()
    }
}

/// Iterator over dominators of a node, from the node up to the entry.
pub struct DominatorIterator<'a> {
    tree: &'a DominatorTree,
    current: Option<NodeId>,
}

impl Iterator for DominatorIterator<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = self.tree.immediate_dominator(current);
        Some(current)
    }
}

/// Computes the dominator tree of `graph` rooted at `entry`.
///
/// # Complexity
///
/// - Time: O(V + E) per pass; the number of passes is bounded by the loop
///   connectedness of the graph (two for reducible graphs)
/// - Space: O(V)
pub fn compute_dominators<G>(graph: &G, entry: NodeId) -> DominatorTree
where
    G: Successors + Predecessors,
{
    let node_count = graph.node_count();
    let mut idom: Vec<Option<NodeId>> = vec![None; node_count];
    let mut reachable = vec![false; node_count];
    let mut children = vec![Vec::new(); node_count];

    if entry.index() >= node_count {
        return DominatorTree {
            entry,
            idom,
            children,
            reachable,
        };
    }

    let rpo = reverse_postorder(graph, entry);
    let mut rpo_number = vec![usize::MAX; node_count];
    for (number, node) in rpo.iter().enumerate() {
        rpo_number[node.index()] = number;
        reachable[node.index()] = true;
    }

    // During the fixpoint the entry is its own idom; cleared afterwards
    idom[entry.index()] = Some(entry);

    let mut changed = true;
    while changed {
        changed = false;
        for &node in rpo.iter().skip(1) {
            let mut new_idom: Option<NodeId> = None;
            for pred in graph.predecessors(node) {
                if idom[pred.index()].is_none() {
                    // Unprocessed or unreachable predecessor
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => pred,
                    Some(current) => intersect(&idom, &rpo_number, pred, current),
                });
            }
            if new_idom.is_some() && idom[node.index()] != new_idom {
                idom[node.index()] = new_idom;
                changed = true;
            }
        }
    }

    idom[entry.index()] = None;
    for &node in &rpo {
        if let Some(parent) = idom[node.index()] {
            children[parent.index()].push(node);
        }
    }

    DominatorTree {
        entry,
        idom,
        children,
        reachable,
    }
}

/// Walks both fingers up the partially built tree until they meet.
fn intersect(
    idom: &[Option<NodeId>],
    rpo_number: &[usize],
    mut finger1: NodeId,
    mut finger2: NodeId,
) -> NodeId {
    while finger1 != finger2 {
        while rpo_number[finger1.index()] > rpo_number[finger2.index()] {
            match idom[finger1.index()] {
                Some(next) => finger1 = next,
                None => return finger2,
            }
        }
        while rpo_number[finger2.index()] > rpo_number[finger1.index()] {
            match idom[finger2.index()] {
                Some(next) => finger2 = next,
                None => return finger1,
            }
        }
    }
    finger1
}

/// Computes dominance frontiers for all nodes.
///
/// The dominance frontier of `n` is the set of nodes `m` such that `n`
/// dominates a predecessor of `m` but does not strictly dominate `m`. These are
/// the join points where phi nodes must be placed for definitions made in `n`.
///
/// The entry node is treated as having one extra, implicit predecessor (the
/// function's caller), so a back edge into the entry makes the entry a join
/// point as well.
///
/// Only reachable predecessors contribute. The result is indexed by node and
/// each frontier is ordered by node id.
///
/// # Examples
///
/// ```rust,ignore
/// use evmopt::utils::graph::algorithms::{compute_dominators, compute_dominance_frontiers};
///
/// // entry -> {left, right} -> join
/// let dom_tree = compute_dominators(&graph, entry);
/// let frontiers = compute_dominance_frontiers(&graph, &dom_tree);
/// assert!(frontiers[left.index()].contains(&join));
/// ```
pub fn compute_dominance_frontiers<G>(graph: &G, dom_tree: &DominatorTree) -> Vec<BTreeSet<NodeId>>
where
    G: Predecessors,
{
    let n = graph.node_count();
    let mut frontiers: Vec<BTreeSet<NodeId>> = vec![BTreeSet::new(); n];

    for node in graph.node_ids() {
        if !dom_tree.is_reachable(node) {
            continue;
        }

        let preds: Vec<NodeId> = graph
            .predecessors(node)
            .filter(|p| dom_tree.is_reachable(*p))
            .collect();
        let implicit = usize::from(node == dom_tree.entry());
        if preds.len() + implicit < 2 {
            continue;
        }

        let idom_node = dom_tree.immediate_dominator(node);
        for pred in preds {
            let mut runner = Some(pred);
            while let Some(current) = runner {
                if Some(current) == idom_node {
                    break;
                }
                frontiers[current.index()].insert(node);
                runner = dom_tree.immediate_dominator(current);
            }
        }
    }

    frontiers
}
