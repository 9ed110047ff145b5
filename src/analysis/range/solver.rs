//! Worklist fixpoint driver for variable range analysis.
//!
//! # Algorithm
//!
//! 1. Seed a FIFO worklist with the entry block.
//! 2. For a block taken off the worklist:
//!    a. Join the edge states of every processed predecessor. An edge state
//!       is the predecessor's exit state refined by its branch condition.
//!    b. Evaluate the block's phis, each operand read from the edge state of
//!       its predecessor.
//!    c. At a loop header past the widening threshold, send every variable
//!       whose range grew since the last visit to `Top`.
//!    d. Evaluate the remaining instructions in order, recording the state in
//!       front of each one.
//!    e. If the exit state changed, queue the successors.
//!
//! A loop header is the target of a retreating edge in reverse post-order.
//! Every cycle contains one, and after the threshold a header variable can
//! change at most once more (to `Top`), so the loop terminates on any CFG.
//! Blocks inside the loop are not widened, which lets branch narrowing keep
//! their ranges bounded.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::{
    analysis::{
        range::{evaluate, operand_range, refine_condition, RangeState},
        AnalysisConfig, CfgAnalysis, DfgAnalysis,
    },
    ir::{Function, InstId, Opcode, Operand, Variable},
    utils::graph::NodeId,
};

use super::ValueRange;

/// Flow-sensitive interval ranges of every SSA variable at every instruction.
#[derive(Debug, Clone)]
pub struct VariableRangeAnalysis {
    config: AnalysisConfig,
    /// State after phis, per block
    entry_states: Vec<Option<RangeState>>,
    exit_states: Vec<Option<RangeState>>,
    /// State immediately before each instruction
    snapshots: FxHashMap<InstId, RangeState>,
    visits: Vec<usize>,
    /// Blocks where widening applies
    loop_headers: Vec<bool>,
    in_worklist: Vec<bool>,
    iterations: usize,
}

impl VariableRangeAnalysis {
    /// Runs the analysis to a fixpoint.
    #[must_use]
    pub fn build(function: &Function, cfg: &CfgAnalysis, dfg: &DfgAnalysis, config: &AnalysisConfig) -> Self {
        let block_count = function.block_count();
        let mut analysis = VariableRangeAnalysis {
            config: config.clone(),
            entry_states: vec![None; block_count],
            exit_states: vec![None; block_count],
            snapshots: FxHashMap::default(),
            visits: vec![0; block_count],
            loop_headers: loop_headers(cfg, block_count),
            in_worklist: vec![false; block_count],
            iterations: 0,
        };
        if block_count == 0 {
            return analysis;
        }

        let mut worklist = VecDeque::from([function.entry()]);
        analysis.in_worklist[function.entry().index()] = true;
        while let Some(block) = worklist.pop_front() {
            analysis.in_worklist[block.index()] = false;
            analysis.iterations += 1;
            analysis.visits[block.index()] += 1;

            if analysis.process_block(function, cfg, dfg, block) {
                for &succ in cfg.cfg_out(block) {
                    if !analysis.in_worklist[succ.index()] {
                        analysis.in_worklist[succ.index()] = true;
                        worklist.push_back(succ);
                    }
                }
            }
        }

        log::debug!(
            "range analysis of '{}' converged after {} block visits",
            function.name(),
            analysis.iterations
        );
        analysis
    }

    /// Processes one block; returns `true` if its exit state changed.
    fn process_block(&mut self, function: &Function, cfg: &CfgAnalysis, dfg: &DfgAnalysis, block: NodeId) -> bool {
        let mut state = RangeState::default();
        let mut edge_states: FxHashMap<NodeId, RangeState> = FxHashMap::default();
        for &pred in cfg.cfg_in(block) {
            if let Some(edge) = self.edge_state(function, cfg, dfg, pred, block) {
                join_into(&mut state, &edge);
                edge_states.insert(pred, edge);
            }
        }

        let basic_block = function.block(block);
        let pre_phi = state.clone();
        for phi in basic_block.phis() {
            self.snapshots.insert(phi.id(), pre_phi.clone());
            let Some(output) = phi.output() else {
                continue;
            };
            let mut range = ValueRange::Bottom;
            for (label, operand) in phi.phi_operands() {
                let edge = function
                    .block_id(label)
                    .and_then(|pred| edge_states.get(&pred));
                if let Some(edge) = edge {
                    range = range.union(&operand_range(operand, edge));
                }
            }
            state.insert(output.clone(), range);
        }

        if self.loop_headers[block.index()] && self.visits[block.index()] > self.config.widening_threshold {
            if let Some(previous) = &self.entry_states[block.index()] {
                widen_state(&mut state, previous, function, block);
            }
        }
        self.entry_states[block.index()] = Some(state.clone());

        for inst in basic_block.instructions().iter().filter(|inst| !inst.is_phi()) {
            self.snapshots.insert(inst.id(), state.clone());
            if let Some(output) = inst.output() {
                let range = evaluate(inst, &state, &self.config);
                state.insert(output.clone(), range);
            }
        }

        log::trace!("range analysis: {block} visit {}", self.visits[block.index()]);
        let changed = self.exit_states[block.index()].as_ref() != Some(&state);
        self.exit_states[block.index()] = Some(state);
        changed
    }

    /// Exit state of `pred` refined by the branch that leads to `succ`.
    fn edge_state(
        &self,
        function: &Function,
        cfg: &CfgAnalysis,
        dfg: &DfgAnalysis,
        pred: NodeId,
        succ: NodeId,
    ) -> Option<RangeState> {
        let mut edge = self.exit_states[pred.index()].clone()?;
        let taken = cfg.edge_kind(pred, succ).and_then(|kind| kind.branch_taken());
        let terminator = function.block(pred).terminator();
        if let (Some(taken), Some(terminator)) = (taken, terminator) {
            if terminator.opcode() == Opcode::Jnz {
                if let Some(condition) = terminator.operand(0) {
                    refine_condition(&mut edge, condition, taken, dfg, self.config.max_refinement_depth);
                }
            }
        }
        Some(edge)
    }

    /// Range of `operand` immediately before `inst`.
    ///
    /// Literals give their value regardless of `inst`. A variable at an
    /// instruction that was never reached is `Bottom`; a variable with no
    /// recorded range is `Top`.
    #[must_use]
    pub fn get_range(&self, operand: &Operand, inst: InstId) -> ValueRange {
        match operand {
            Operand::Literal(word) => ValueRange::from_word(*word),
            Operand::Label(_) => ValueRange::Top,
            Operand::Variable(var) => match self.snapshots.get(&inst) {
                Some(state) => state.get(var).cloned().unwrap_or(ValueRange::Top),
                None => ValueRange::Bottom,
            },
        }
    }

    /// The full state immediately before `inst`, if it was reached.
    #[must_use]
    pub fn state_before(&self, inst: InstId) -> Option<&RangeState> {
        self.snapshots.get(&inst)
    }

    /// Range of `var` at the top of `block`, after its phis.
    #[must_use]
    pub fn range_at_entry(&self, var: &Variable, block: NodeId) -> ValueRange {
        lookup_in(self.entry_states[block.index()].as_ref(), var)
    }

    /// Range of `var` at the end of `block`.
    #[must_use]
    pub fn range_at_exit(&self, var: &Variable, block: NodeId) -> ValueRange {
        lookup_in(self.exit_states[block.index()].as_ref(), var)
    }

    /// Returns `true` if the analysis reached `block`.
    #[must_use]
    pub fn is_visited(&self, block: NodeId) -> bool {
        self.visits[block.index()] > 0
    }

    /// Returns `true` if `block` is the target of a loop back edge and is widened.
    #[must_use]
    pub fn is_loop_header(&self, block: NodeId) -> bool {
        self.loop_headers[block.index()]
    }

    /// Number of times `block` was processed.
    #[must_use]
    pub fn visits(&self, block: NodeId) -> usize {
        self.visits[block.index()]
    }

    /// Total block visits until the fixpoint.
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// The configuration the analysis ran with.
    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }
}

fn lookup_in(state: Option<&RangeState>, var: &Variable) -> ValueRange {
    match state {
        Some(state) => state.get(var).cloned().unwrap_or(ValueRange::Top),
        None => ValueRange::Bottom,
    }
}

/// Pointwise union; a variable missing from one side takes the other's range.
fn join_into(state: &mut RangeState, other: &RangeState) {
    for (var, range) in other {
        state
            .entry(var.clone())
            .and_modify(|current| *current = current.union(range))
            .or_insert_with(|| range.clone());
    }
}

/// Marks every block entered by an edge from a block no earlier in reverse post-order.
fn loop_headers(cfg: &CfgAnalysis, block_count: usize) -> Vec<bool> {
    let mut rpo_index = vec![None; block_count];
    for (position, block) in cfg.reverse_post_order().into_iter().enumerate() {
        rpo_index[block.index()] = Some(position);
    }
    (0..block_count)
        .map(|index| {
            let Some(position) = rpo_index[index] else {
                return false;
            };
            cfg.cfg_in(NodeId::new(index))
                .iter()
                .any(|pred| rpo_index[pred.index()].is_some_and(|pred_position| pred_position >= position))
        })
        .collect()
}

fn widen_state(state: &mut RangeState, previous: &RangeState, function: &Function, block: NodeId) {
    for (var, range) in state.iter_mut() {
        let Some(before) = previous.get(var) else {
            continue;
        };
        if range == before {
            continue;
        }
        let widened = before.widen(range);
        if range.grew_from(before) {
            log::warn!(
                "range of {var} in '{}' {block} kept growing ({before} -> {range}), widened to top",
                function.name()
            );
        }
        *range = widened;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{parse_function, Label};

    fn analyze(source: &str) -> (Function, VariableRangeAnalysis) {
        analyze_with(source, &AnalysisConfig::default())
    }

    fn analyze_with(source: &str, config: &AnalysisConfig) -> (Function, VariableRangeAnalysis) {
        let function = parse_function(source).unwrap();
        let cfg = CfgAnalysis::build(&function);
        let dfg = DfgAnalysis::build(&function);
        let ranges = VariableRangeAnalysis::build(&function, &cfg, &dfg, config);
        (function, ranges)
    }

    fn terminator_of(function: &Function, label: &str) -> InstId {
        let block = function.block_id(&Label::new(label)).unwrap();
        function.block(block).terminator().unwrap().id()
    }

    #[test]
    fn test_straight_line_constant() {
        let (function, ranges) = analyze(
            "
function f {
entry:
    %x = 5
    %y = add %x, 7
    stop
}",
        );
        let stop = terminator_of(&function, "entry");
        assert_eq!(ranges.get_range(&Operand::var("y"), stop), ValueRange::constant(12));
        assert_eq!(ranges.get_range(&Operand::literal(3u64), stop), ValueRange::constant(3));
        assert!(ranges.get_range(&Operand::var("unknown"), stop).is_top());
    }

    #[test]
    fn test_iszero_false_edge_excludes_zero() {
        let (function, ranges) = analyze(
            "
function f {
entry:
    %raw = calldataload 0
    %len = mod %raw, 1000
    %flag = iszero %len
    jnz %flag, @empty, @loop
empty:
    stop
loop:
    %use = add %len, 1
    stop
}",
        );
        let in_loop = terminator_of(&function, "loop");
        let len = ranges.get_range(&Operand::var("len"), in_loop);
        assert_eq!(len, ValueRange::new(1, 999));
        assert_eq!(ranges.get_range(&Operand::var("use"), in_loop), ValueRange::new(2, 1000));

        let in_empty = terminator_of(&function, "empty");
        assert_eq!(ranges.get_range(&Operand::var("len"), in_empty), ValueRange::constant(0));
        // The branching block itself is unrefined
        let jnz = terminator_of(&function, "entry");
        assert_eq!(ranges.get_range(&Operand::var("len"), jnz), ValueRange::new(0, 999));
    }

    #[test]
    fn test_join_unions_edge_states() {
        let (function, ranges) = analyze(
            "
function f {
entry:
    %c = calldataload 0
    jnz %c, @a, @b
a:
    %x = 5
    jmp @join
b:
    %y = 10
    jmp @join
join:
    %z = phi @a, %x, @b, %y
    stop
}",
        );
        let stop = terminator_of(&function, "join");
        assert_eq!(ranges.get_range(&Operand::var("z"), stop), ValueRange::new(5, 10));
        // The condition is non-zero on the true edge
        let in_a = terminator_of(&function, "a");
        assert!(ranges.get_range(&Operand::var("c"), in_a).excludes_zero());
    }

    #[test]
    fn test_phi_reads_refined_edge_state() {
        let (function, ranges) = analyze(
            "
function f {
entry:
    %x = calldataload 0
    %small = lt %x, 10
    jnz %small, @join, @clamp
clamp:
    jmp @join
join:
    %y = phi @entry, %x, @clamp, 9
    stop
}",
        );
        let stop = terminator_of(&function, "join");
        assert_eq!(ranges.get_range(&Operand::var("y"), stop), ValueRange::new(0, 9));
    }

    const COUNTER: &str = "
function counter {
entry:
    %n = calldataload 0
    jmp @header
header:
    %i = phi @entry, 0, @body, %next
    %c = lt %i, 10
    jnz %c, @body, @exit
body:
    %next = add %i, 1
    jmp @header
exit:
    stop
}";

    #[test]
    fn test_loop_widening_terminates_with_narrowing() {
        let (function, ranges) = analyze(COUNTER);
        let header = function.block_id(&Label::new("header")).unwrap();
        let body_jmp = terminator_of(&function, "body");
        let exit_stop = terminator_of(&function, "exit");

        let body = function.block_id(&Label::new("body")).unwrap();
        assert!(ranges.is_loop_header(header));
        assert!(!ranges.is_loop_header(body));

        assert!(ranges.range_at_entry(&Variable::new("i"), header).is_top());
        assert_eq!(ranges.get_range(&Operand::var("i"), body_jmp), ValueRange::new(0, 9));
        assert_eq!(ranges.get_range(&Operand::var("next"), body_jmp), ValueRange::new(1, 10));
        assert_eq!(
            ranges.get_range(&Operand::var("i"), exit_stop).lo(),
            Some(&num_bigint::BigInt::from(10))
        );
        assert!(ranges.visits(header) <= 6);
    }

    #[test]
    fn test_unbounded_loop_stabilizes_at_top() {
        let (function, ranges) = analyze(
            "
function f {
entry:
    jmp @header
header:
    %i = phi @entry, 0, @header, %next
    %next = add %i, 1
    %c = calldataload %i
    jnz %c, @header, @exit
exit:
    stop
}",
        );
        let header = function.block_id(&Label::new("header")).unwrap();
        assert!(ranges.range_at_entry(&Variable::new("i"), header).is_top());
        assert!(ranges.range_at_exit(&Variable::new("next"), header).is_top());
        assert!(ranges.iterations() < 16);
    }

    #[test]
    fn test_higher_threshold_delays_widening() {
        let config = AnalysisConfig::default().with_widening_threshold(20);
        let (function, ranges) = analyze_with(COUNTER, &config);
        let header = function.block_id(&Label::new("header")).unwrap();
        // Precise enough to converge on [0, 10] before widening kicks in
        assert_eq!(ranges.range_at_entry(&Variable::new("i"), header), ValueRange::new(0, 10));
    }

    #[test]
    fn test_unreachable_block_is_bottom() {
        let (function, ranges) = analyze(
            "
function f {
entry:
    %x = 1
    stop
dead:
    %y = add %x, 1
    stop
}",
        );
        let dead = function.block_id(&Label::new("dead")).unwrap();
        assert!(!ranges.is_visited(dead));
        let dead_stop = terminator_of(&function, "dead");
        assert!(ranges.get_range(&Operand::var("x"), dead_stop).is_bottom());
        assert!(ranges.state_before(dead_stop).is_none());
    }
}
