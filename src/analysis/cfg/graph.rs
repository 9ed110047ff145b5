//! The control flow graph of a single function.

use crate::{
    analysis::cfg::CfgEdgeKind,
    ir::{Function, Label, Opcode},
    utils::graph::{
        algorithms::{dfs, postorder, reverse_postorder},
        GraphBase, NodeId, Predecessors, RootedGraph, Successors,
    },
};

/// Successor and predecessor relations of a function's blocks.
///
/// Built once from a verified [`Function`]; it holds no references into the
/// IR, so passes may keep it while mutating the function as long as they
/// invalidate it afterwards.
///
/// # Construction
///
/// [`CfgAnalysis::build`] panics if a block does not end in exactly one
/// terminator or if a terminator names an unknown label. Both conditions
/// mean an earlier stage produced malformed IR.
#[derive(Debug, Clone)]
pub struct CfgAnalysis {
    /// Successors per block, deduplicated, in terminator operand order
    succs: Vec<Vec<NodeId>>,
    /// Edge kind for each entry of `succs`
    kinds: Vec<Vec<CfgEdgeKind>>,
    /// Predecessors per block, deduplicated, in block order
    preds: Vec<Vec<NodeId>>,
    /// Blocks reachable from the entry in depth-first pre-order
    dfs_order: Vec<NodeId>,
    /// Reachability from the entry
    reachable: Vec<bool>,
    /// Blocks whose terminator has no successors
    exits: Vec<NodeId>,
}

impl CfgAnalysis {
    /// Derives the CFG of `function`.
    ///
    /// # Panics
    ///
    /// Panics on a block with zero or several terminators, a terminator that
    /// is not the last instruction, or a jump to an unknown label.
    #[must_use]
    pub fn build(function: &Function) -> Self {
        let block_count = function.block_count();
        let mut succs: Vec<Vec<NodeId>> = vec![Vec::new(); block_count];
        let mut kinds: Vec<Vec<CfgEdgeKind>> = vec![Vec::new(); block_count];
        let mut preds: Vec<Vec<NodeId>> = vec![Vec::new(); block_count];
        let mut exits = Vec::new();

        for (index, block) in function.blocks().iter().enumerate() {
            let node = NodeId::new(index);
            let terminators = block.instructions().iter().filter(|i| i.is_terminator()).count();
            let Some(terminator) = block.terminator().filter(|_| terminators == 1) else {
                panic!(
                    "malformed IR: block @{} in function '{}' must end in exactly one terminator (found {})",
                    block.label().name(),
                    function.name(),
                    terminators
                );
            };

            let resolve = |label: &Label| -> NodeId {
                function.block_id(label).unwrap_or_else(|| {
                    panic!(
                        "malformed IR: '{}' in block @{} of function '{}' references unknown label {}",
                        terminator,
                        block.label().name(),
                        function.name(),
                        label
                    )
                })
            };

            let edges: Vec<(NodeId, CfgEdgeKind)> = match terminator.opcode() {
                Opcode::Jmp => terminator
                    .labels()
                    .map(|l| (resolve(l), CfgEdgeKind::Unconditional))
                    .collect(),
                Opcode::Jnz => {
                    let targets: Vec<NodeId> = terminator.labels().map(resolve).collect();
                    match targets.as_slice() {
                        [t, f] if t == f => vec![(*t, CfgEdgeKind::Unconditional)],
                        [t, f] => vec![
                            (*t, CfgEdgeKind::ConditionalTrue),
                            (*f, CfgEdgeKind::ConditionalFalse),
                        ],
                        _ => panic!(
                            "malformed IR: '{}' in block @{} must name exactly two targets",
                            terminator,
                            block.label().name()
                        ),
                    }
                }
                Opcode::Djmp => terminator
                    .labels()
                    .enumerate()
                    .map(|(index, l)| (resolve(l), CfgEdgeKind::Dynamic { index }))
                    .collect(),
                _ => Vec::new(),
            };

            if edges.is_empty() {
                exits.push(node);
            }
            for (target, kind) in edges {
                if succs[index].contains(&target) {
                    continue;
                }
                succs[index].push(target);
                kinds[index].push(kind);
                preds[target.index()].push(node);
            }
        }

        for list in &mut preds {
            list.sort();
            list.dedup();
        }

        let mut cfg = CfgAnalysis {
            succs,
            kinds,
            preds,
            dfs_order: Vec::new(),
            reachable: vec![false; block_count],
            exits,
        };
        if block_count > 0 {
            cfg.dfs_order = dfs(&cfg, function.entry()).collect();
        }
        for node in &cfg.dfs_order {
            cfg.reachable[node.index()] = true;
        }

        log::trace!(
            "cfg of '{}': {} blocks, {} reachable",
            function.name(),
            block_count,
            cfg.dfs_order.len()
        );
        cfg
    }

    /// Successors of `block`.
    #[must_use]
    pub fn cfg_out(&self, block: NodeId) -> &[NodeId] {
        &self.succs[block.index()]
    }

    /// Predecessors of `block`, including unreachable ones.
    #[must_use]
    pub fn cfg_in(&self, block: NodeId) -> &[NodeId] {
        &self.preds[block.index()]
    }

    /// The kind of the edge `from -> to`, if it exists.
    #[must_use]
    pub fn edge_kind(&self, from: NodeId, to: NodeId) -> Option<CfgEdgeKind> {
        let position = self.succs[from.index()].iter().position(|s| *s == to)?;
        Some(self.kinds[from.index()][position])
    }

    /// Reachable blocks in depth-first pre-order from the entry.
    #[must_use]
    pub fn dfs_pre_order(&self) -> &[NodeId] {
        &self.dfs_order
    }

    /// Reachable blocks in post-order.
    #[must_use]
    pub fn post_order(&self) -> Vec<NodeId> {
        if self.succs.is_empty() {
            return Vec::new();
        }
        postorder(self, self.entry())
    }

    /// Reachable blocks in reverse post-order.
    #[must_use]
    pub fn reverse_post_order(&self) -> Vec<NodeId> {
        if self.succs.is_empty() {
            return Vec::new();
        }
        reverse_postorder(self, self.entry())
    }

    /// Returns `true` if `block` is reachable from the entry.
    #[must_use]
    pub fn is_reachable(&self, block: NodeId) -> bool {
        self.reachable.get(block.index()).copied().unwrap_or(false)
    }

    /// Blocks without successors (returning, stopping or reverting).
    #[must_use]
    pub fn exits(&self) -> &[NodeId] {
        &self.exits
    }

    /// Number of blocks, reachable or not.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.succs.len()
    }

    /// Returns `true` if the CFG has no critical edges, i.e. no edge leaves a
    /// block with several successors and enters a block with several predecessors.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        self.node_ids().all(|block| {
            self.cfg_in(block).len() < 2
                || self.cfg_in(block).iter().all(|pred| self.cfg_out(*pred).len() < 2)
        })
    }
}

impl GraphBase for CfgAnalysis {
    fn node_count(&self) -> usize {
        self.succs.len()
    }
}

impl Successors for CfgAnalysis {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.succs[node.index()].iter().copied()
    }
}

impl Predecessors for CfgAnalysis {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.preds[node.index()].iter().copied()
    }
}

impl RootedGraph for CfgAnalysis {
    fn entry(&self) -> NodeId {
        NodeId::new(0)
    }
}
