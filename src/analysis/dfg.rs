//! Def-use index over SSA variables.
//!
//! [`DfgAnalysis`] answers "which instruction defines `%x`?" and "which
//! instructions read `%x`?". Range analysis uses it to find the comparison
//! behind a branch condition; passes use it to check for remaining uses.
//!
//! The index owns copies of the defining instructions, so it stays valid
//! (though possibly stale) while the function is being mutated. Passes that
//! add, remove or rewrite instructions must invalidate it.

use rustc_hash::FxHashMap;

use crate::{
    ir::{Function, InstId, Instruction, Variable},
    utils::graph::NodeId,
};

/// Location of an instruction: block and position within the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    /// Block holding the instruction
    pub block: NodeId,
    /// Position within the block
    pub index: usize,
}

impl Location {
    /// Creates a new location.
    #[must_use]
    pub const fn new(block: NodeId, index: usize) -> Self {
        Self { block, index }
    }
}

/// Index for def-use queries on a function.
#[derive(Debug, Clone, Default)]
pub struct DfgAnalysis {
    defs: FxHashMap<Variable, (Location, Instruction)>,
    uses: FxHashMap<Variable, Vec<InstId>>,
    locations: FxHashMap<InstId, Location>,
}

impl DfgAnalysis {
    /// Indexes every definition and use in `function`.
    #[must_use]
    pub fn build(function: &Function) -> Self {
        let mut index = DfgAnalysis::default();
        for (block_index, block) in function.blocks().iter().enumerate() {
            for (position, inst) in block.instructions().iter().enumerate() {
                let location = Location::new(NodeId::new(block_index), position);
                index.locations.insert(inst.id(), location);
                if let Some(output) = inst.output() {
                    index.defs.insert(output.clone(), (location, inst.clone()));
                }
                for var in inst.used_variables() {
                    let uses = index.uses.entry(var.clone()).or_default();
                    if !uses.contains(&inst.id()) {
                        uses.push(inst.id());
                    }
                }
            }
        }
        index
    }

    /// The instruction that defines `var`, if any (parameters of the function
    /// and undefined names have none).
    #[must_use]
    pub fn producing_instruction(&self, var: &Variable) -> Option<&Instruction> {
        self.defs.get(var).map(|(_, inst)| inst)
    }

    /// Where `var` is defined.
    #[must_use]
    pub fn def_location(&self, var: &Variable) -> Option<Location> {
        self.defs.get(var).map(|(location, _)| *location)
    }

    /// Instructions reading `var`, in program layout order.
    #[must_use]
    pub fn uses(&self, var: &Variable) -> &[InstId] {
        self.uses.get(var).map_or(&[], Vec::as_slice)
    }

    /// Returns `true` if nothing reads `var`.
    #[must_use]
    pub fn is_unused(&self, var: &Variable) -> bool {
        self.uses(var).is_empty()
    }

    /// Where the instruction with id `inst` sits.
    #[must_use]
    pub fn location(&self, inst: InstId) -> Option<Location> {
        self.locations.get(&inst).copied()
    }

    /// Number of defined variables.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.defs.len()
    }
}
