//! Removal of stores that are overwritten before being read.

use crate::{
    analysis::{AnalysisKind, AnalysisManager},
    compiler::{passes::is_plain_store, EventKind, EventLog, Pass},
    ir::{AddrSpace, Function, InstId},
    Result,
};

/// Removes `mstore`, `sstore` and `tstore` instructions whose value no path
/// can observe.
///
/// A store is dead when Memory SSA finds a later def that completely
/// overwrites it and no read that may alias it comes first on any path.
#[derive(Debug, Default)]
pub struct DeadStoreEliminationPass;

impl DeadStoreEliminationPass {
    /// Creates the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pass for DeadStoreEliminationPass {
    fn name(&self) -> &'static str {
        "dead-store-elimination"
    }

    fn description(&self) -> &'static str {
        "Removes stores overwritten before any read"
    }

    fn should_run(&self, function: &Function) -> bool {
        function.instructions().any(|(_, inst)| {
            AddrSpace::ALL
                .into_iter()
                .any(|space| is_plain_store(inst.opcode(), space))
        })
    }

    fn run_on_function(
        &self,
        function: &mut Function,
        analyses: &mut AnalysisManager,
        events: &EventLog,
    ) -> Result<bool> {
        let mut removals: Vec<(InstId, String, String)> = Vec::new();
        for space in AddrSpace::ALL {
            if !function.instructions().any(|(_, inst)| is_plain_store(inst.opcode(), space)) {
                continue;
            }
            let mem_ssa = analyses.memory_ssa(function, space);
            for (block, inst) in function.instructions() {
                if !is_plain_store(inst.opcode(), space) {
                    continue;
                }
                let Some(def) = mem_ssa.get_memory_def(inst.id()) else {
                    continue;
                };
                if def.loc().is_volatile() {
                    continue;
                }
                let Some(clobber) = mem_ssa.get_clobbering_memory_access(def.id()) else {
                    continue;
                };
                let overwritten_by = mem_ssa
                    .access(clobber)
                    .inst()
                    .and_then(|id| function.instruction(id))
                    .map_or_else(|| clobber.to_string(), ToString::to_string);
                removals.push((
                    inst.id(),
                    function.block(block).label().name().to_string(),
                    format!("{inst} overwritten by {overwritten_by}"),
                ));
            }
        }

        for (id, block, message) in &removals {
            function.remove_instruction(*id);
            events
                .record(EventKind::StoreRemoved)
                .at(function.name(), block.as_str())
                .pass(self.name())
                .message(message.as_str());
        }

        Ok(!removals.is_empty())
    }

    fn invalidates(&self) -> Vec<AnalysisKind> {
        let mut kinds = vec![AnalysisKind::Dfg];
        kinds.extend(AddrSpace::ALL.into_iter().map(AnalysisKind::MemoryAlias));
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{parse_function, Opcode};

    fn run(source: &str) -> (Function, EventLog, bool) {
        let mut func = parse_function(source).unwrap();
        let mut analyses = AnalysisManager::new();
        let events = EventLog::new();
        let changed = DeadStoreEliminationPass::new()
            .run_on_function(&mut func, &mut analyses, &events)
            .unwrap();
        (func, events, changed)
    }

    fn stores(func: &Function) -> Vec<String> {
        func.instructions()
            .filter(|(_, inst)| matches!(inst.opcode(), Opcode::Mstore | Opcode::Sstore | Opcode::Tstore))
            .map(|(_, inst)| inst.to_string())
            .collect()
    }

    #[test]
    fn test_removes_overwritten_store() {
        let (func, events, changed) = run("
function f {
entry:
    mstore 0, 1
    mstore 0, 2
    return 0, 32
}
");
        assert!(changed);
        assert_eq!(stores(&func), vec!["mstore 0, 2"]);
        assert_eq!(events.count_kind(EventKind::StoreRemoved), 1);
    }

    #[test]
    fn test_read_keeps_store() {
        let (func, _, changed) = run("
function f {
entry:
    sstore 0, 1
    %v = sload 0
    sstore 0, %v
    stop
}
");
        assert!(!changed);
        assert_eq!(stores(&func).len(), 2);
    }

    #[test]
    fn test_partial_overwrite_keeps_store() {
        let (func, _, changed) = run("
function f {
entry:
    mstore 0, 1
    mstore 16, 2
    return 0, 64
}
");
        assert!(!changed);
        assert_eq!(stores(&func).len(), 2);
    }

    #[test]
    fn test_msize_keeps_store() {
        let (func, events, changed) = run("
function f {
entry:
    mstore 4096, 1
    %s = msize
    mstore 4096, 2
    mstore 0, %s
    return 0, 32
}
");
        assert!(!changed);
        assert_eq!(stores(&func), vec!["mstore 4096, 1", "mstore 4096, 2", "mstore 0, %s"]);
        assert!(!events.has_transformations());
    }

    #[test]
    fn test_overwritten_on_every_path() {
        let (func, _, changed) = run("
function f {
entry:
    tstore 3, 1
    %c = callvalue
    jnz %c, @a, @b
a:
    tstore 3, 2
    stop
b:
    tstore 3, 4
    stop
}
");
        assert!(changed);
        assert_eq!(stores(&func), vec!["tstore 3, 2", "tstore 3, 4"]);
    }

    #[test]
    fn test_read_on_one_path_keeps_store() {
        let (func, _, changed) = run("
function f {
entry:
    sstore 3, 1
    %c = callvalue
    jnz %c, @a, @b
a:
    %v = sload 3
    sstore 3, %v
    stop
b:
    sstore 3, 4
    stop
}
");
        assert!(!changed);
        assert_eq!(stores(&func).len(), 3);
    }
}
