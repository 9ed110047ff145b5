//! Folding of conditional branches whose condition is known.

use crate::{
    analysis::{AnalysisKind, AnalysisManager, ValueRange},
    compiler::{EventKind, EventLog, Pass},
    ir::{Function, InstId, Label, Opcode, Operand},
    Result,
};

/// Rewrites `jnz` into `jmp` when the condition's range decides it.
///
/// A condition that can never be zero always takes the true edge; a
/// condition that is exactly zero always takes the false edge. The edge that
/// disappears is also removed from the phis of its target. Branches in
/// unreachable code (condition range `Bottom`) are left alone.
#[derive(Debug, Default)]
pub struct BranchOptimizationPass;

struct Fold {
    inst: InstId,
    block: Label,
    taken: Label,
    dropped: Label,
    condition: ValueRange,
}

impl BranchOptimizationPass {
    /// Creates the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pass for BranchOptimizationPass {
    fn name(&self) -> &'static str {
        "branch-optimization"
    }

    fn description(&self) -> &'static str {
        "Replaces conditional branches on known conditions with jumps"
    }

    fn should_run(&self, function: &Function) -> bool {
        function
            .blocks()
            .iter()
            .any(|block| block.terminator().is_some_and(|t| t.opcode() == Opcode::Jnz))
    }

    fn run_on_function(
        &self,
        function: &mut Function,
        analyses: &mut AnalysisManager,
        events: &EventLog,
    ) -> Result<bool> {
        let ranges = analyses.variable_ranges(function);

        let mut folds = Vec::new();
        for block in function.blocks() {
            let Some(term) = block.terminator().filter(|t| t.opcode() == Opcode::Jnz) else {
                continue;
            };
            let ops = term.operands();
            let (Some(cond), Some(Operand::Label(on_true)), Some(Operand::Label(on_false))) =
                (ops.first(), ops.get(1), ops.get(2))
            else {
                continue;
            };

            let condition = ranges.get_range(cond, term.id());
            let (taken, dropped) = if condition.is_bottom() {
                continue;
            } else if condition.excludes_zero() {
                (on_true, on_false)
            } else if condition.is_zero() {
                (on_false, on_true)
            } else {
                continue;
            };
            folds.push(Fold {
                inst: term.id(),
                block: block.label().clone(),
                taken: taken.clone(),
                dropped: dropped.clone(),
                condition,
            });
        }

        for fold in &folds {
            function.replace_instruction(fold.inst, Opcode::Jmp, vec![Operand::Label(fold.taken.clone())]);
            if fold.dropped != fold.taken {
                if let Some(target) = function.block_id(&fold.dropped) {
                    // A phi with a single incoming pair means the target just
                    // became unreachable; its phis stay well-formed as they are
                    let orphaned = function
                        .block(target)
                        .phis()
                        .any(|phi| phi.phi_operands().count() == 1);
                    if !orphaned {
                        function.remove_phi_incoming(target, &fold.block);
                    }
                }
            }
            events
                .record(EventKind::BranchFolded)
                .at(function.name(), fold.block.name())
                .pass(self.name())
                .message(format!("condition {} -> jmp {}", fold.condition, fold.taken));
        }

        Ok(!folds.is_empty())
    }

    fn invalidates(&self) -> Vec<AnalysisKind> {
        vec![AnalysisKind::Cfg]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::parse_function;

    fn run(source: &str) -> (Function, EventLog, bool) {
        let mut func = parse_function(source).unwrap();
        let mut analyses = AnalysisManager::new();
        let events = EventLog::new();
        let changed = BranchOptimizationPass::new()
            .run_on_function(&mut func, &mut analyses, &events)
            .unwrap();
        (func, events, changed)
    }

    fn terminator(func: &Function, label: &str) -> String {
        let block = func.block(func.block_id(&Label::new(label)).unwrap());
        block.terminator().unwrap().to_string()
    }

    #[test]
    fn test_nonzero_condition_takes_true_edge() {
        let (func, events, changed) = run("
function f {
entry:
    %x = callvalue
    %c = or %x, 1
    jnz %c, @then, @join
then:
    jmp @join
join:
    %z = phi @entry, 1, @then, 2
    stop
}
");
        assert!(changed);
        assert_eq!(terminator(&func, "entry"), "jmp @then");
        let join = func.block(func.block_id(&Label::new("join")).unwrap());
        let phi = join.phis().next().unwrap();
        assert_eq!(phi.phi_operands().count(), 1);
        assert_eq!(events.count_kind(EventKind::BranchFolded), 1);
    }

    #[test]
    fn test_zero_condition_takes_false_edge() {
        let (func, _, changed) = run("
function f {
entry:
    %c = iszero 5
    jnz %c, @then, @else
then:
    stop
else:
    revert 0, 0
}
");
        assert!(changed);
        assert_eq!(terminator(&func, "entry"), "jmp @else");
    }

    #[test]
    fn test_unknown_condition_is_kept() {
        let (func, events, changed) = run("
function f {
entry:
    %c = calldataload 0
    jnz %c, @then, @else
then:
    stop
else:
    stop
}
");
        assert!(!changed);
        assert!(terminator(&func, "entry").starts_with("jnz"));
        assert!(events.is_empty());
    }

    #[test]
    fn test_unreachable_branch_is_kept() {
        let (func, _, changed) = run("
function f {
entry:
    stop
dead:
    %c = 1
    jnz %c, @dead, @dead2
dead2:
    stop
}
");
        assert!(!changed);
        assert!(terminator(&func, "dead").starts_with("jnz"));
    }
}
