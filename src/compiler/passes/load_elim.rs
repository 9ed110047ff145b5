//! Forwarding of stored values to later loads of the same slot.

use crate::{
    analysis::{locations_must_alias, AnalysisKind, AnalysisManager, MemoryAccessId, MemorySsa},
    compiler::{passes::{is_plain_load, is_plain_store}, EventKind, EventLog, Pass},
    ir::{AddrSpace, Function, InstId, Opcode, Operand},
    Result,
};

/// Replaces a load with the value of the store it must read.
///
/// For `%v = mload 0` preceded by `mstore 0, %x`, the load becomes
/// `%v = %x` when Memory SSA shows the store as the load's clobbering def,
/// both touch the identical fixed word, and no def that may alias the word
/// lies between them. The same applies to `sload`/`sstore` and
/// `tload`/`tstore`.
#[derive(Debug, Default)]
pub struct RedundantLoadEliminationPass;

impl RedundantLoadEliminationPass {
    /// Creates the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

struct Forward {
    load: InstId,
    block: String,
    value: Operand,
    message: String,
}

/// The stored operand `use_id` is guaranteed to read, if any.
fn forwarded_value(function: &Function, mem_ssa: &MemorySsa, use_id: MemoryAccessId) -> Option<Operand> {
    let load = mem_ssa.access(use_id);
    let clobber = mem_ssa.get_clobbered_memory_access(use_id)?;
    let def = mem_ssa.access(clobber);
    if !def.is_def() || def.loc().is_volatile() || !locations_must_alias(def.loc(), load.loc()) {
        return None;
    }

    // Partial overlaps are skipped by the clobber walk but still change the word
    let mut current = load.reaching_def()?;
    while current != clobber {
        let access = mem_ssa.access(current);
        if !access.is_def() || mem_ssa.alias().may_alias(access.loc(), load.loc()) {
            return None;
        }
        current = access.reaching_def()?;
    }

    let store = function.instruction(def.inst()?)?;
    if !is_plain_store(store.opcode(), mem_ssa.space()) {
        return None;
    }
    store.operand(1).cloned()
}

impl Pass for RedundantLoadEliminationPass {
    fn name(&self) -> &'static str {
        "redundant-load-elimination"
    }

    fn description(&self) -> &'static str {
        "Forwards stored values to loads of the same fixed location"
    }

    fn should_run(&self, function: &Function) -> bool {
        function.instructions().any(|(_, inst)| {
            AddrSpace::ALL
                .into_iter()
                .any(|space| is_plain_load(inst.opcode(), space))
        })
    }

    fn run_on_function(
        &self,
        function: &mut Function,
        analyses: &mut AnalysisManager,
        events: &EventLog,
    ) -> Result<bool> {
        let mut forwards = Vec::new();
        for space in AddrSpace::ALL {
            if !function.instructions().any(|(_, inst)| is_plain_load(inst.opcode(), space)) {
                continue;
            }
            let mem_ssa = analyses.memory_ssa(function, space);
            for (block, inst) in function.instructions() {
                if !is_plain_load(inst.opcode(), space) {
                    continue;
                }
                let Some(use_access) = mem_ssa.get_memory_use(inst.id()) else {
                    continue;
                };
                if let Some(value) = forwarded_value(function, &mem_ssa, use_access.id()) {
                    forwards.push(Forward {
                        load: inst.id(),
                        block: function.block(block).label().name().to_string(),
                        message: format!("{inst} -> {value}"),
                        value,
                    });
                }
            }
        }

        for forward in &forwards {
            function.replace_instruction(forward.load, Opcode::Assign, vec![forward.value.clone()]);
            events
                .record(EventKind::LoadForwarded)
                .at(function.name(), forward.block.as_str())
                .pass(self.name())
                .message(forward.message.as_str());
        }

        Ok(!forwards.is_empty())
    }

    fn invalidates(&self) -> Vec<AnalysisKind> {
        let mut kinds = vec![AnalysisKind::Dfg];
        kinds.extend(AddrSpace::ALL.into_iter().map(AnalysisKind::MemoryAlias));
        kinds
    }
}
