//! Memory SSA: explicit def-use-phi chains for memory effects.
//!
//! Every instruction that reads an address space becomes a `MemoryUse`, every
//! instruction that writes it becomes a `MemoryDef`, and `MemoryPhi`s merge
//! memory states where control flow joins. Each access points at its reaching
//! definition, so "what was the last write that could have produced the value
//! this load sees?" becomes a walk over a sparse chain instead of a scan over
//! the whole function.
//!
//! # Construction
//!
//! 1. Number accesses in CFG pre-order (id 0 is `LiveOnEntry`).
//! 2. Place phis at the iterated dominance frontier of the blocks holding defs.
//! 3. Compute each block's exit definition in dominator tree pre-order.
//! 4. Fill phi operands from predecessor exit definitions and link every
//!    use/def to its reaching definition.
//! 5. Remove phis whose operands (ignoring self references) are all the same
//!    access, to a fixpoint.
//!
//! All accesses live in one arena and refer to each other by
//! [`MemoryAccessId`], so the cyclic phi graph needs no shared ownership.

use std::{collections::VecDeque, fmt, rc::Rc};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    analysis::{CfgAnalysis, DominatorTreeAnalysis, MemoryAliasAnalysis},
    ir::{read_location, write_location, AddrSpace, Function, InstId, MemoryLocation},
    utils::graph::NodeId,
};

/// Dense identifier of a memory access within one [`MemorySsa`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryAccessId(u32);

impl MemoryAccessId {
    /// The id reserved for `LiveOnEntry`.
    pub const LIVE_ON_ENTRY: MemoryAccessId = MemoryAccessId(0);

    /// The raw index into the access arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MemoryAccessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The variant-specific part of a memory access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryAccessKind {
    /// The memory state on function entry
    LiveOnEntry,
    /// A write
    Def {
        /// The writing instruction
        inst: InstId,
        /// Block holding `inst`
        block: NodeId,
        /// The memory state the write is applied to
        reaching_def: MemoryAccessId,
    },
    /// A read
    Use {
        /// The reading instruction
        inst: InstId,
        /// Block holding `inst`
        block: NodeId,
        /// The memory state the read observes
        reaching_def: MemoryAccessId,
    },
    /// A merge of the states arriving from each predecessor
    Phi {
        /// Block the phi is placed in
        block: NodeId,
        /// `(incoming state, predecessor)` pairs; the function entry is
        /// represented by the entry block itself paired with `LiveOnEntry`
        operands: Vec<(MemoryAccessId, NodeId)>,
    },
}

/// A node of the Memory SSA graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryAccess {
    id: MemoryAccessId,
    kind: MemoryAccessKind,
    loc: MemoryLocation,
}

impl MemoryAccess {
    /// The access id.
    #[must_use]
    pub fn id(&self) -> MemoryAccessId {
        self.id
    }

    /// The variant data.
    #[must_use]
    pub fn kind(&self) -> &MemoryAccessKind {
        &self.kind
    }

    /// The region read or written. Phis and `LiveOnEntry` cover the whole space.
    #[must_use]
    pub fn loc(&self) -> &MemoryLocation {
        &self.loc
    }

    /// Returns `true` for the `LiveOnEntry` sentinel.
    #[must_use]
    pub fn is_live_on_entry(&self) -> bool {
        matches!(self.kind, MemoryAccessKind::LiveOnEntry)
    }

    /// Returns `true` for a `MemoryDef`.
    #[must_use]
    pub fn is_def(&self) -> bool {
        matches!(self.kind, MemoryAccessKind::Def { .. })
    }

    /// Returns `true` for a `MemoryUse`.
    #[must_use]
    pub fn is_use(&self) -> bool {
        matches!(self.kind, MemoryAccessKind::Use { .. })
    }

    /// Returns `true` for a `MemoryPhi`.
    #[must_use]
    pub fn is_phi(&self) -> bool {
        matches!(self.kind, MemoryAccessKind::Phi { .. })
    }

    /// The owning instruction of a def or use.
    #[must_use]
    pub fn inst(&self) -> Option<InstId> {
        match self.kind {
            MemoryAccessKind::Def { inst, .. } | MemoryAccessKind::Use { inst, .. } => Some(inst),
            _ => None,
        }
    }

    /// The block of a def, use or phi.
    #[must_use]
    pub fn block(&self) -> Option<NodeId> {
        match self.kind {
            MemoryAccessKind::Def { block, .. }
            | MemoryAccessKind::Use { block, .. }
            | MemoryAccessKind::Phi { block, .. } => Some(block),
            MemoryAccessKind::LiveOnEntry => None,
        }
    }

    /// The reaching definition of a def or use.
    #[must_use]
    pub fn reaching_def(&self) -> Option<MemoryAccessId> {
        match self.kind {
            MemoryAccessKind::Def { reaching_def, .. }
            | MemoryAccessKind::Use { reaching_def, .. } => Some(reaching_def),
            _ => None,
        }
    }

    /// The incoming pairs of a phi; empty otherwise.
    #[must_use]
    pub fn phi_operands(&self) -> &[(MemoryAccessId, NodeId)] {
        match &self.kind {
            MemoryAccessKind::Phi { operands, .. } => operands,
            _ => &[],
        }
    }

    fn set_reaching_def(&mut self, new: MemoryAccessId) {
        if let MemoryAccessKind::Def { reaching_def, .. } | MemoryAccessKind::Use { reaching_def, .. } =
            &mut self.kind
        {
            *reaching_def = new;
        }
    }
}

/// Statistics about a Memory SSA graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySsaStats {
    /// Number of `MemoryDef`s
    pub def_count: usize,
    /// Number of `MemoryUse`s
    pub use_count: usize,
    /// Number of phis that survived redundancy elimination
    pub phi_count: usize,
    /// Number of phis removed as redundant
    pub removed_phi_count: usize,
}

enum ScanOutcome {
    /// A may-aliasing read observes the value
    Observed,
    /// A def completely overwrites the value
    Clobbered(MemoryAccessId),
    /// Neither; control continues past the block
    PassedThrough,
}

/// Memory SSA of one function for one address space.
#[derive(Debug, Clone)]
pub struct MemorySsa {
    space: AddrSpace,
    accesses: Vec<MemoryAccess>,
    removed: FxHashSet<MemoryAccessId>,
    /// Defs and uses of each block in instruction order (use before def for one instruction)
    block_accesses: Vec<Vec<MemoryAccessId>>,
    phis: FxHashMap<NodeId, MemoryAccessId>,
    exit_defs: Vec<MemoryAccessId>,
    inst_to_def: FxHashMap<InstId, MemoryAccessId>,
    inst_to_use: FxHashMap<InstId, MemoryAccessId>,
    succs: Vec<Vec<NodeId>>,
    alias: Rc<MemoryAliasAnalysis>,
}

impl MemorySsa {
    /// Builds Memory SSA for `space`, answering alias queries through `alias`.
    ///
    /// `alias` must cover the same address space; its cache is shared with
    /// every other holder of the handle.
    #[must_use]
    pub fn build(
        function: &Function,
        cfg: &CfgAnalysis,
        doms: &DominatorTreeAnalysis,
        alias: Rc<MemoryAliasAnalysis>,
    ) -> Self {
        let space = alias.space();
        let block_count = function.block_count();
        let mut mem_ssa = MemorySsa {
            space,
            accesses: vec![MemoryAccess {
                id: MemoryAccessId::LIVE_ON_ENTRY,
                kind: MemoryAccessKind::LiveOnEntry,
                loc: MemoryLocation::undefined(space),
            }],
            removed: FxHashSet::default(),
            block_accesses: vec![Vec::new(); block_count],
            phis: FxHashMap::default(),
            exit_defs: vec![MemoryAccessId::LIVE_ON_ENTRY; block_count],
            inst_to_def: FxHashMap::default(),
            inst_to_use: FxHashMap::default(),
            succs: (0..block_count)
                .map(|b| cfg.cfg_out(NodeId::new(b)).to_vec())
                .collect(),
            alias,
        };

        mem_ssa.create_accesses(function, cfg);
        mem_ssa.place_phis(cfg, doms);
        mem_ssa.compute_exit_defs(doms);
        mem_ssa.connect(cfg, doms);
        mem_ssa.remove_redundant_phis();

        let stats = mem_ssa.stats();
        log::debug!(
            "memory ssa of '{}' ({space}): {} defs, {} uses, {} phis ({} redundant removed)",
            function.name(),
            stats.def_count,
            stats.use_count,
            stats.phi_count,
            stats.removed_phi_count
        );
        mem_ssa
    }

    fn push_access(&mut self, kind: MemoryAccessKind, loc: MemoryLocation) -> MemoryAccessId {
        let id = MemoryAccessId(u32::try_from(self.accesses.len()).unwrap_or(u32::MAX));
        self.accesses.push(MemoryAccess { id, kind, loc });
        id
    }

    fn create_accesses(&mut self, function: &Function, cfg: &CfgAnalysis) {
        let effect = self.space.effect();
        let observed = self.space.observing_effects();
        for &block in cfg.dfs_pre_order() {
            for inst in function.block(block).instructions() {
                if inst.read_effects().intersects(observed) {
                    let kind = MemoryAccessKind::Use {
                        inst: inst.id(),
                        block,
                        reaching_def: MemoryAccessId::LIVE_ON_ENTRY,
                    };
                    let id = self.push_access(kind, read_location(inst, self.space));
                    self.inst_to_use.insert(inst.id(), id);
                    self.block_accesses[block.index()].push(id);
                }
                if inst.write_effects().intersects(effect) {
                    let kind = MemoryAccessKind::Def {
                        inst: inst.id(),
                        block,
                        reaching_def: MemoryAccessId::LIVE_ON_ENTRY,
                    };
                    let id = self.push_access(kind, write_location(inst, self.space));
                    self.inst_to_def.insert(inst.id(), id);
                    self.block_accesses[block.index()].push(id);
                }
            }
        }
    }

    fn place_phis(&mut self, cfg: &CfgAnalysis, doms: &DominatorTreeAnalysis) {
        let def_blocks: Vec<NodeId> = cfg
            .dfs_pre_order()
            .iter()
            .copied()
            .filter(|b| {
                self.block_accesses[b.index()]
                    .iter()
                    .any(|id| self.accesses[id.index()].is_def())
            })
            .collect();

        for block in doms.iterated_frontier(def_blocks) {
            let kind = MemoryAccessKind::Phi {
                block,
                operands: Vec::new(),
            };
            let id = self.push_access(kind, MemoryLocation::undefined(self.space));
            self.phis.insert(block, id);
        }
    }

    fn last_def(&self, block: NodeId) -> Option<MemoryAccessId> {
        self.block_accesses[block.index()]
            .iter()
            .rev()
            .copied()
            .find(|id| self.accesses[id.index()].is_def())
    }

    /// State at the top of `block`: its phi, else the exit state of its idom.
    fn entry_def(&self, block: NodeId, doms: &DominatorTreeAnalysis) -> MemoryAccessId {
        if let Some(phi) = self.phis.get(&block) {
            return *phi;
        }
        doms.immediate_dominator(block)
            .map_or(MemoryAccessId::LIVE_ON_ENTRY, |idom| self.exit_defs[idom.index()])
    }

    fn compute_exit_defs(&mut self, doms: &DominatorTreeAnalysis) {
        // Dominator pre-order guarantees the idom's exit def is final
        for &block in doms.dom_pre_order() {
            self.exit_defs[block.index()] = match self.last_def(block) {
                Some(def) => def,
                None => self.entry_def(block, doms),
            };
        }
    }

    fn connect(&mut self, cfg: &CfgAnalysis, doms: &DominatorTreeAnalysis) {
        let phi_blocks: Vec<(NodeId, MemoryAccessId)> =
            self.phis.iter().map(|(block, id)| (*block, *id)).collect();
        for (block, phi) in phi_blocks {
            let mut operands: Vec<(MemoryAccessId, NodeId)> = cfg
                .cfg_in(block)
                .iter()
                .filter(|pred| cfg.is_reachable(**pred))
                .map(|pred| (self.exit_defs[pred.index()], *pred))
                .collect();
            if block == doms.tree().entry() {
                operands.insert(0, (MemoryAccessId::LIVE_ON_ENTRY, block));
            }
            if let MemoryAccessKind::Phi { operands: slot, .. } = &mut self.accesses[phi.index()].kind {
                *slot = operands;
            }
        }

        for &block in cfg.dfs_pre_order() {
            let mut current = self.entry_def(block, doms);
            let ids = self.block_accesses[block.index()].clone();
            for id in ids {
                let access = &mut self.accesses[id.index()];
                access.set_reaching_def(current);
                if access.is_def() {
                    current = id;
                }
            }
        }
    }

    fn remove_redundant_phis(&mut self) {
        loop {
            let mut replacement: Option<(MemoryAccessId, MemoryAccessId)> = None;
            let mut phi_ids: Vec<MemoryAccessId> = self.phis.values().copied().collect();
            phi_ids.sort();
            for phi in phi_ids {
                let mut distinct = self.accesses[phi.index()]
                    .phi_operands()
                    .iter()
                    .map(|(incoming, _)| *incoming)
                    .filter(|incoming| *incoming != phi);
                let Some(first) = distinct.next() else {
                    replacement = Some((phi, MemoryAccessId::LIVE_ON_ENTRY));
                    break;
                };
                if distinct.all(|incoming| incoming == first) {
                    replacement = Some((phi, first));
                    break;
                }
            }

            let Some((phi, with)) = replacement else {
                break;
            };
            self.replace_all_uses(phi, with);
            if let Some(block) = self.accesses[phi.index()].block() {
                self.phis.remove(&block);
            }
            self.removed.insert(phi);
        }
    }

    fn replace_all_uses(&mut self, old: MemoryAccessId, new: MemoryAccessId) {
        for access in &mut self.accesses {
            match &mut access.kind {
                MemoryAccessKind::Def { reaching_def, .. } | MemoryAccessKind::Use { reaching_def, .. } => {
                    if *reaching_def == old {
                        *reaching_def = new;
                    }
                }
                MemoryAccessKind::Phi { operands, .. } => {
                    for (incoming, _) in operands.iter_mut() {
                        if *incoming == old {
                            *incoming = new;
                        }
                    }
                }
                MemoryAccessKind::LiveOnEntry => {}
            }
        }
        for exit in &mut self.exit_defs {
            if *exit == old {
                *exit = new;
            }
        }
    }

    /// The address space this graph covers.
    #[must_use]
    pub fn space(&self) -> AddrSpace {
        self.space
    }

    /// The access with the given id.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this graph.
    #[must_use]
    pub fn access(&self, id: MemoryAccessId) -> &MemoryAccess {
        &self.accesses[id.index()]
    }

    /// The `LiveOnEntry` sentinel.
    #[must_use]
    pub fn live_on_entry(&self) -> &MemoryAccess {
        &self.accesses[0]
    }

    /// All live accesses (removed phis excluded), in id order.
    pub fn accesses(&self) -> impl Iterator<Item = &MemoryAccess> {
        self.accesses
            .iter()
            .filter(|access| !self.removed.contains(&access.id))
    }

    /// The `MemoryDef` of `inst`, if it writes this address space.
    #[must_use]
    pub fn get_memory_def(&self, inst: InstId) -> Option<&MemoryAccess> {
        self.inst_to_def.get(&inst).map(|id| self.access(*id))
    }

    /// The `MemoryUse` of `inst`, if it reads this address space.
    #[must_use]
    pub fn get_memory_use(&self, inst: InstId) -> Option<&MemoryAccess> {
        self.inst_to_use.get(&inst).map(|id| self.access(*id))
    }

    /// The phi placed in `block`, if any survived.
    #[must_use]
    pub fn phi(&self, block: NodeId) -> Option<&MemoryAccess> {
        self.phis.get(&block).map(|id| self.access(*id))
    }

    /// The memory state at the end of `block`.
    #[must_use]
    pub fn exit_def(&self, block: NodeId) -> MemoryAccessId {
        self.exit_defs[block.index()]
    }

    /// Defs and uses of `block` in program order.
    #[must_use]
    pub fn block_accesses(&self, block: NodeId) -> &[MemoryAccessId] {
        &self.block_accesses[block.index()]
    }

    /// The alias analysis used by the clobber queries.
    #[must_use]
    pub fn alias(&self) -> &MemoryAliasAnalysis {
        &self.alias
    }

    /// Finds the nearest def that completely overwrites what `access` reads or writes.
    ///
    /// Walks the reaching-definition chain backwards. At a phi, if any
    /// incoming path contains a completely covering def, the phi itself is
    /// returned, since it cannot be assumed to carry the entry value.
    ///
    /// Returns `None` only for `LiveOnEntry` itself; otherwise `LiveOnEntry`
    /// means nothing overwrites the location before `access`.
    #[must_use]
    pub fn get_clobbered_memory_access(&self, access: MemoryAccessId) -> Option<MemoryAccessId> {
        let start = self.access(access);
        if start.is_live_on_entry() {
            return None;
        }
        let query = start.loc;

        let found = match start.reaching_def() {
            Some(reaching) => self.walk_for_clobbered(reaching, &query),
            // Querying a phi starts from its incoming states
            None => self
                .path_clobbered(start.phi_operands().iter().map(|(id, _)| *id), &query, access)
                .then_some(access),
        };
        Some(found.unwrap_or(MemoryAccessId::LIVE_ON_ENTRY))
    }

    fn walk_for_clobbered(&self, start: MemoryAccessId, query: &MemoryLocation) -> Option<MemoryAccessId> {
        let mut visited = FxHashSet::default();
        let mut current = start;
        while visited.insert(current) {
            let access = self.access(current);
            match &access.kind {
                MemoryAccessKind::LiveOnEntry => return None,
                MemoryAccessKind::Def { reaching_def, .. } => {
                    if access.loc.completely_contains(query) {
                        return Some(current);
                    }
                    current = *reaching_def;
                }
                MemoryAccessKind::Use { reaching_def, .. } => current = *reaching_def,
                MemoryAccessKind::Phi { operands, .. } => {
                    let incoming = operands.iter().map(|(id, _)| *id);
                    return self.path_clobbered(incoming, query, current).then_some(current);
                }
            }
        }
        None
    }

    /// Returns `true` if a completely covering def lies on any backward path
    /// from `starts`. Explicit stack; `phi` is pre-marked to cut loops.
    fn path_clobbered(
        &self,
        starts: impl Iterator<Item = MemoryAccessId>,
        query: &MemoryLocation,
        phi: MemoryAccessId,
    ) -> bool {
        let mut visited: FxHashSet<MemoryAccessId> = FxHashSet::default();
        visited.insert(phi);
        let mut stack: Vec<MemoryAccessId> = starts.collect();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let access = self.access(id);
            match &access.kind {
                MemoryAccessKind::LiveOnEntry => {}
                MemoryAccessKind::Def { reaching_def, .. } => {
                    if access.loc.completely_contains(query) {
                        return true;
                    }
                    stack.push(*reaching_def);
                }
                MemoryAccessKind::Use { reaching_def, .. } => stack.push(*reaching_def),
                MemoryAccessKind::Phi { operands, .. } => {
                    stack.extend(operands.iter().map(|(incoming, _)| *incoming));
                }
            }
        }
        false
    }

    /// Finds the def that makes `def` dead, if there is one.
    ///
    /// Searches forward through the rest of `def`'s block and then through
    /// successor blocks. A path ends at the first def that completely
    /// contains `def`'s location. The search gives up with `None` as soon as
    /// any path reaches a use whose location may alias `def`'s, since that
    /// use could observe the stored value. Exits that keep state alive
    /// (`return`, `ret`, `stop` for storage) are such uses.
    ///
    /// Returns the first clobbering def found in breadth-first order, or
    /// `None` if `def` is not a def or no path overwrites it.
    #[must_use]
    pub fn get_clobbering_memory_access(&self, def: MemoryAccessId) -> Option<MemoryAccessId> {
        let access = self.access(def);
        let MemoryAccessKind::Def { block, .. } = access.kind else {
            return None;
        };
        let query = access.loc;

        let accesses = self.block_accesses(block);
        let position = accesses.iter().position(|id| *id == def)?;
        match self.scan(&accesses[position + 1..], &query) {
            ScanOutcome::Observed => return None,
            ScanOutcome::Clobbered(clobber) => return Some(clobber),
            ScanOutcome::PassedThrough => {}
        }

        let mut first_clobber = None;
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        let mut queue: VecDeque<NodeId> = self.succs[block.index()].iter().copied().collect();
        while let Some(next) = queue.pop_front() {
            if !visited.insert(next) {
                continue;
            }
            match self.scan(self.block_accesses(next), &query) {
                ScanOutcome::Observed => return None,
                ScanOutcome::Clobbered(clobber) => {
                    first_clobber.get_or_insert(clobber);
                }
                ScanOutcome::PassedThrough => queue.extend(self.succs[next.index()].iter().copied()),
            }
        }
        first_clobber
    }

    fn scan(&self, ids: &[MemoryAccessId], query: &MemoryLocation) -> ScanOutcome {
        for &id in ids {
            let access = self.access(id);
            if access.is_use() && self.alias.may_alias(&access.loc, query) {
                return ScanOutcome::Observed;
            }
            if access.is_def() && access.loc.completely_contains(query) {
                return ScanOutcome::Clobbered(id);
            }
        }
        ScanOutcome::PassedThrough
    }

    /// Marks every def whose location may alias `loc` as volatile and returns
    /// the volatile version of `loc`.
    ///
    /// Later alias queries against those defs are decided afresh instead of
    /// from the cache.
    pub fn mark_location_volatile(&mut self, loc: &MemoryLocation) -> MemoryLocation {
        let volatile = self.alias.mark_volatile(loc);
        let mut marked = 0usize;
        for access in &mut self.accesses {
            if access.is_def() && !access.loc.is_volatile() && self.alias.may_alias(&access.loc, loc) {
                access.loc = access.loc.with_volatile(true);
                marked += 1;
            }
        }
        log::trace!("marked {marked} defs volatile for {loc}");
        volatile
    }

    /// Counts of defs, uses and phis.
    #[must_use]
    pub fn stats(&self) -> MemorySsaStats {
        let live = self.accesses();
        let (mut def_count, mut use_count, mut phi_count) = (0, 0, 0);
        for access in live {
            match access.kind {
                MemoryAccessKind::Def { .. } => def_count += 1,
                MemoryAccessKind::Use { .. } => use_count += 1,
                MemoryAccessKind::Phi { .. } => phi_count += 1,
                MemoryAccessKind::LiveOnEntry => {}
            }
        }
        MemorySsaStats {
            def_count,
            use_count,
            phi_count,
            removed_phi_count: self.removed.len(),
        }
    }
}

impl fmt::Display for MemorySsa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "memory ssa ({})", self.space)?;
        for access in self.accesses() {
            match &access.kind {
                MemoryAccessKind::LiveOnEntry => writeln!(f, "  {}: live_on_entry", access.id)?,
                MemoryAccessKind::Def { inst, block, reaching_def } => writeln!(
                    f,
                    "  {}: def({reaching_def}) {inst} in {block} {}",
                    access.id, access.loc
                )?,
                MemoryAccessKind::Use { inst, block, reaching_def } => writeln!(
                    f,
                    "  {}: use({reaching_def}) {inst} in {block} {}",
                    access.id, access.loc
                )?,
                MemoryAccessKind::Phi { block, operands } => {
                    let ops: Vec<String> = operands
                        .iter()
                        .map(|(incoming, pred)| format!("{incoming} from {pred}"))
                        .collect();
                    writeln!(f, "  {}: phi in {block} [{}]", access.id, ops.join(", "))?;
                }
            }
        }
        Ok(())
    }
}
