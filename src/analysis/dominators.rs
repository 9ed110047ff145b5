//! Dominator tree and dominance frontier analysis.
//!
//! A thin, IR-facing layer over
//! [`compute_dominators`](crate::utils::graph::algorithms::compute_dominators)
//! and [`compute_dominance_frontiers`](crate::utils::graph::algorithms::compute_dominance_frontiers)
//! that also precomputes the dominator tree pre-order used by SSA renaming.

use std::collections::BTreeSet;

use crate::{
    analysis::CfgAnalysis,
    utils::graph::{
        algorithms::{compute_dominance_frontiers, compute_dominators, DominatorTree},
        NodeId, RootedGraph,
    },
};

/// Immediate dominators and dominance frontiers of a function's blocks.
#[derive(Debug, Clone)]
pub struct DominatorTreeAnalysis {
    tree: DominatorTree,
    frontiers: Vec<BTreeSet<NodeId>>,
    preorder: Vec<NodeId>,
}

impl DominatorTreeAnalysis {
    /// Computes dominators over `cfg`.
    #[must_use]
    pub fn build(cfg: &CfgAnalysis) -> Self {
        let tree = compute_dominators(cfg, cfg.entry());
        let frontiers = compute_dominance_frontiers(cfg, &tree);
        let preorder = tree.preorder();
        log::trace!(
            "dominators: {} reachable blocks, {} non-empty frontiers",
            preorder.len(),
            frontiers.iter().filter(|f| !f.is_empty()).count()
        );
        DominatorTreeAnalysis {
            tree,
            frontiers,
            preorder,
        }
    }

    /// The immediate dominator of `block`; `None` for the entry and unreachable blocks.
    #[must_use]
    pub fn immediate_dominator(&self, block: NodeId) -> Option<NodeId> {
        self.tree.immediate_dominator(block)
    }

    /// Returns `true` if `a` dominates `b`. Every block dominates itself.
    #[must_use]
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        self.tree.dominates(a, b)
    }

    /// The dominance frontier of `block`, ordered by block id.
    #[must_use]
    pub fn dominance_frontier(&self, block: NodeId) -> &BTreeSet<NodeId> {
        &self.frontiers[block.index()]
    }

    /// Blocks immediately dominated by `block`.
    #[must_use]
    pub fn dominated(&self, block: NodeId) -> &[NodeId] {
        self.tree.children(block)
    }

    /// Reachable blocks in dominator tree pre-order.
    #[must_use]
    pub fn dom_pre_order(&self) -> &[NodeId] {
        &self.preorder
    }

    /// Depth of `block` in the dominator tree (entry is 0).
    #[must_use]
    pub fn depth(&self, block: NodeId) -> usize {
        self.tree.depth(block)
    }

    /// The underlying tree.
    #[must_use]
    pub fn tree(&self) -> &DominatorTree {
        &self.tree
    }

    /// The iterated dominance frontier of `blocks`: the fixpoint of adding
    /// the frontier of every block already in the set. These are exactly the
    /// blocks that need a phi for a value defined in `blocks`.
    #[must_use]
    pub fn iterated_frontier(&self, blocks: impl IntoIterator<Item = NodeId>) -> BTreeSet<NodeId> {
        let mut result = BTreeSet::new();
        let mut worklist: Vec<NodeId> = blocks.into_iter().collect();
        while let Some(block) = worklist.pop() {
            for &frontier in self.dominance_frontier(block) {
                if result.insert(frontier) {
                    worklist.push(frontier);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{parse_function, Function, Label};

    const NESTED: &str = "
function nested {
entry:
    %c = callvalue
    jnz %c, @outer, @exit
outer:
    %d = caller
    jnz %d, @left, @right
left:
    jmp @merge
right:
    jmp @merge
merge:
    jmp @exit
exit:
    stop
}
";

    fn ids(func: &Function, names: &[&str]) -> Vec<NodeId> {
        names
            .iter()
            .map(|n| func.block_id(&Label::new(n)).unwrap())
            .collect()
    }

    #[test]
    fn test_entry_dominates_reachable_blocks() {
        let func = parse_function(NESTED).unwrap();
        let cfg = CfgAnalysis::build(&func);
        let doms = DominatorTreeAnalysis::build(&cfg);
        for &block in cfg.dfs_pre_order() {
            assert!(doms.dominates(func.entry(), block));
        }
    }

    #[test]
    fn test_idoms_and_frontiers() {
        let func = parse_function(NESTED).unwrap();
        let cfg = CfgAnalysis::build(&func);
        let doms = DominatorTreeAnalysis::build(&cfg);
        let b = ids(&func, &["entry", "outer", "left", "right", "merge", "exit"]);
        let (entry, outer, left, right, merge, exit) = (b[0], b[1], b[2], b[3], b[4], b[5]);

        assert_eq!(doms.immediate_dominator(entry), None);
        assert_eq!(doms.immediate_dominator(merge), Some(outer));
        assert_eq!(doms.immediate_dominator(exit), Some(entry));
        assert!(doms.dominates(outer, merge));
        assert!(!doms.dominates(left, merge));

        assert_eq!(doms.dominance_frontier(left).iter().copied().collect::<Vec<_>>(), vec![merge]);
        assert_eq!(doms.dominance_frontier(right).iter().copied().collect::<Vec<_>>(), vec![merge]);
        assert_eq!(doms.dominance_frontier(outer).iter().copied().collect::<Vec<_>>(), vec![exit]);
        assert_eq!(doms.dominance_frontier(merge).iter().copied().collect::<Vec<_>>(), vec![exit]);

        assert_eq!(doms.iterated_frontier([left]), BTreeSet::from([merge, exit]));
        assert_eq!(doms.depth(merge), 2);
    }

    #[test]
    fn test_dom_pre_order_visits_parents_first() {
        let func = parse_function(NESTED).unwrap();
        let cfg = CfgAnalysis::build(&func);
        let doms = DominatorTreeAnalysis::build(&cfg);
        let order = doms.dom_pre_order();
        assert_eq!(order.len(), func.block_count());
        for (position, block) in order.iter().enumerate() {
            if let Some(idom) = doms.immediate_dominator(*block) {
                assert!(order[..position].contains(&idom));
            }
        }
    }
}
