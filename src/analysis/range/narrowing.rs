//! Branch-condition refinement of range states.
//!
//! When control leaves a block through `jnz %c, @t, @f`, the edge into `@t`
//! knows `%c != 0` and the edge into `@f` knows `%c == 0`. Looking up how
//! `%c` was computed lets that fact narrow the comparison's operands:
//!
//! | condition       | true edge             | false edge          |
//! |-----------------|-----------------------|---------------------|
//! | `iszero(x)`     | `x = 0`               | `x != 0`            |
//! | `eq(x, y)`      | `x, y = x ∩ y`        | nothing             |
//! | `lt(x, b)`      | `x ∈ [0, b-1]`        | `x ∈ [b, MAX]`      |
//! | `lt(b, x)`      | `x ∈ [b+1, MAX]`      | `x ∈ [0, b]`        |
//! | `gt(x, b)`      | `x ∈ [b+1, MAX]`      | `x ∈ [0, b]`        |
//! | `gt(b, x)`      | `x ∈ [0, b-1]`        | `x ∈ [b, MAX]`      |
//!
//! `slt`/`sgt` use the signed domain. `b` is a literal or a variable whose
//! range is a single value. Nested `iszero` wrappers flip the polarity and are
//! followed up to a configured depth.

use num_bigint::BigInt;
use num_traits::One;

use crate::{
    analysis::{
        range::{
            lattice::{to_signed, word_to_bigint, wrap, MAX_INT256, MAX_UINT256, MIN_INT256},
            RangeState,
        },
        DfgAnalysis,
    },
    ir::{Opcode, Operand, Variable},
};

use super::ValueRange;

/// Refines `state` with the knowledge that `condition` is non-zero (`truthy`)
/// or zero (`!truthy`).
pub fn refine_condition(
    state: &mut RangeState,
    condition: &Operand,
    truthy: bool,
    dfg: &DfgAnalysis,
    max_depth: usize,
) {
    let Some(mut var) = condition.as_variable().cloned() else {
        return;
    };
    let mut truthy = truthy;

    for depth in 0..=max_depth {
        let current = lookup(state, &var);
        let narrowed = if truthy {
            current.exclude_zero()
        } else {
            current.intersect(&ValueRange::constant(0))
        };
        state.insert(var.clone(), narrowed);

        let Some(inst) = dfg.producing_instruction(&var) else {
            return;
        };
        match (inst.opcode(), inst.operands()) {
            (Opcode::Iszero, [Operand::Variable(inner)]) if depth < max_depth => {
                var = inner.clone();
                truthy = !truthy;
            }
            (Opcode::Eq, [a, b]) => {
                if truthy {
                    narrow_equal(state, a, b);
                }
                return;
            }
            (opcode @ (Opcode::Lt | Opcode::Gt | Opcode::Slt | Opcode::Sgt), [a, b]) => {
                narrow_comparison(state, opcode, a, b, truthy);
                return;
            }
            _ => return,
        }
    }
}

fn lookup(state: &RangeState, var: &Variable) -> ValueRange {
    state.get(var).cloned().unwrap_or(ValueRange::Top)
}

/// Unsigned word value of a literal or single-valued variable.
fn constant_of(operand: &Operand, state: &RangeState) -> Option<BigInt> {
    match operand {
        Operand::Literal(word) => Some(word_to_bigint(*word)),
        Operand::Variable(var) => lookup(state, var).as_constant().map(|c| wrap(c.clone())),
        Operand::Label(_) => None,
    }
}

fn narrow_equal(state: &mut RangeState, a: &Operand, b: &Operand) {
    let range_of = |operand: &Operand, state: &RangeState| match operand {
        Operand::Variable(var) => lookup(state, var).to_unsigned(),
        Operand::Literal(word) => ValueRange::from_word(*word),
        Operand::Label(_) => ValueRange::Top,
    };
    let common = range_of(a, state).intersect(&range_of(b, state));
    for operand in [a, b] {
        if let Operand::Variable(var) = operand {
            state.insert(var.clone(), common.clone());
        }
    }
}

fn narrow_comparison(state: &mut RangeState, opcode: Opcode, a: &Operand, b: &Operand, truthy: bool) {
    let (var, bound, var_on_left) =
        match (a, b, constant_of(a, state), constant_of(b, state)) {
            (Operand::Variable(var), _, None, Some(bound)) => (var, bound, true),
            (_, Operand::Variable(var), Some(bound), None) => (var, bound, false),
            _ => return,
        };

    let signed = matches!(opcode, Opcode::Slt | Opcode::Sgt);
    let (domain_lo, domain_hi, bound, current) = if signed {
        (
            MIN_INT256.clone(),
            MAX_INT256.clone(),
            to_signed(&bound),
            lookup(state, var).to_signed(),
        )
    } else {
        (BigInt::from(0), MAX_UINT256.clone(), bound, lookup(state, var).to_unsigned())
    };

    // Normalize to "var < bound" or "var > bound"
    let var_less = matches!(
        (opcode, var_on_left),
        (Opcode::Lt | Opcode::Slt, true) | (Opcode::Gt | Opcode::Sgt, false)
    );
    let constraint = match (var_less, truthy) {
        (true, true) => ValueRange::new(domain_lo, bound - BigInt::one()),
        (true, false) => ValueRange::new(bound, domain_hi),
        (false, true) => ValueRange::new(bound + BigInt::one(), domain_hi),
        (false, false) => ValueRange::new(domain_lo, bound),
    };
    state.insert(var.clone(), current.intersect(&constraint));
}
