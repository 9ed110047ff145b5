//! Removal of assertions that can never fail.

use crate::{
    analysis::{AnalysisKind, AnalysisManager},
    compiler::{EventKind, EventLog, Pass},
    ir::{Function, InstId, Opcode},
    Result,
};

/// Removes `assert` and `assert_unreachable` whose operand can never be zero.
///
/// Checked arithmetic lowers its overflow checks to these, so a range proof
/// that the checked value is nonzero makes the check dead.
#[derive(Debug, Default)]
pub struct AssertEliminationPass;

impl AssertEliminationPass {
    /// Creates the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn is_assert(opcode: Opcode) -> bool {
    matches!(opcode, Opcode::Assert | Opcode::AssertUnreachable)
}

impl Pass for AssertEliminationPass {
    fn name(&self) -> &'static str {
        "assert-elimination"
    }

    fn description(&self) -> &'static str {
        "Removes assertions on values proven nonzero"
    }

    fn should_run(&self, function: &Function) -> bool {
        function.instructions().any(|(_, inst)| is_assert(inst.opcode()))
    }

    fn run_on_function(
        &self,
        function: &mut Function,
        analyses: &mut AnalysisManager,
        events: &EventLog,
    ) -> Result<bool> {
        let ranges = analyses.variable_ranges(function);

        let mut removals: Vec<(InstId, String, String)> = Vec::new();
        for (block, inst) in function.instructions() {
            if !is_assert(inst.opcode()) {
                continue;
            }
            let Some(cond) = inst.operand(0) else {
                continue;
            };
            let range = ranges.get_range(cond, inst.id());
            if !range.is_bottom() && range.excludes_zero() {
                let label = function.block(block).label().name().to_string();
                removals.push((inst.id(), label, format!("{inst} with {cond} in {range}")));
            }
        }

        for (id, block, message) in &removals {
            function.remove_instruction(*id);
            events
                .record(EventKind::AssertRemoved)
                .at(function.name(), block.as_str())
                .pass(self.name())
                .message(message.as_str());
        }

        Ok(!removals.is_empty())
    }

    fn invalidates(&self) -> Vec<AnalysisKind> {
        vec![AnalysisKind::Dfg]
    }
}
