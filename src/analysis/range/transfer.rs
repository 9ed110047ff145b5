//! Interval transfer functions, one per opcode.
//!
//! Every function here is pure and total: an opcode without a rule, or an
//! input too wide to rule out 256-bit wraparound, yields `Top`. When every
//! input is a single value the instruction is folded exactly with EVM
//! semantics instead.

use std::cmp::{max, min};

use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::{
    analysis::{
        range::{
            lattice::{to_signed, wrap, MAX_UINT256},
            RangeState,
        },
        AnalysisConfig,
    },
    ir::{Instruction, Opcode, Operand},
};

use super::ValueRange;

/// Range of an operand in `state`. Literals are single values; a variable
/// with no entry is unconstrained.
#[must_use]
pub fn operand_range(operand: &Operand, state: &RangeState) -> ValueRange {
    match operand {
        Operand::Literal(word) => ValueRange::from_word(*word),
        Operand::Variable(var) => state.get(var).cloned().unwrap_or(ValueRange::Top),
        Operand::Label(_) => ValueRange::Top,
    }
}

/// Range of the value `inst` produces, given the ranges of its inputs in `state`.
///
/// Phis are joined by the analysis driver and get `Top` here.
#[must_use]
pub fn evaluate(inst: &Instruction, state: &RangeState, config: &AnalysisConfig) -> ValueRange {
    let opcode = inst.opcode();
    if opcode == Opcode::Assign {
        return inst
            .operand(0)
            .map_or(ValueRange::Top, |operand| operand_range(operand, state));
    }
    if opcode == Opcode::Phi || !opcode.produces_output() {
        return ValueRange::Top;
    }

    let inputs: Vec<ValueRange> = inst
        .operands()
        .iter()
        .map(|operand| operand_range(operand, state))
        .collect();
    if inputs.iter().any(ValueRange::is_bottom) {
        return ValueRange::Bottom;
    }

    let constants: Option<Vec<BigInt>> = inputs
        .iter()
        .map(|range| range.as_constant().map(|c| wrap(c.clone())))
        .collect();
    if let Some(folded) = constants.and_then(|args| fold_constant(opcode, &args)) {
        return ValueRange::constant(folded);
    }

    let limit = BigInt::one() << config.width_limit_bits;
    let result = match (opcode, inputs.as_slice()) {
        (Opcode::Add, [a, b]) => add(a, b, &limit),
        (Opcode::Sub, [a, b]) => sub(a, b, &limit),
        (Opcode::Mul, [a, b]) => mul(a, b, &limit),
        (Opcode::Div, [a, b]) => div(a, b),
        (Opcode::Mod, [a, b]) => modulo(a, b),
        (Opcode::And, [a, b]) => and(a, b),
        (Opcode::Or, [a, b]) => or(a, b),
        (Opcode::Shl, [shift, value]) => shl(shift, value),
        (Opcode::Shr, [shift, value]) => shr(shift, value),
        (Opcode::Sar, [shift, value]) => sar(shift, value),
        (Opcode::Byte, [index, value]) => byte(index, value),
        (Opcode::Signextend, [bytes, value]) => signextend(bytes, value),
        (Opcode::Eq, [a, b]) => Some(eq(a, b)),
        (Opcode::Lt, [a, b]) => compare(a.unsigned_bounds(), b.unsigned_bounds()),
        (Opcode::Gt, [a, b]) => compare(b.unsigned_bounds(), a.unsigned_bounds()),
        (Opcode::Slt, [a, b]) => compare(a.signed_bounds(), b.signed_bounds()),
        (Opcode::Sgt, [a, b]) => compare(b.signed_bounds(), a.signed_bounds()),
        (Opcode::Iszero, [a]) => Some(iszero(a)),
        _ => None,
    };
    result.unwrap_or(ValueRange::Top)
}

/// Bounds of `range` if both lie within `[-limit, limit]`.
fn within_limit(range: &ValueRange, limit: &BigInt) -> Option<(BigInt, BigInt)> {
    let (lo, hi) = (range.lo()?, range.hi()?);
    (lo.abs() <= *limit && hi.abs() <= *limit).then(|| (lo.clone(), hi.clone()))
}

fn add(a: &ValueRange, b: &ValueRange, limit: &BigInt) -> Option<ValueRange> {
    let (a_lo, a_hi) = within_limit(a, limit)?;
    let (b_lo, b_hi) = within_limit(b, limit)?;
    Some(ValueRange::new(a_lo + b_lo, a_hi + b_hi))
}

fn sub(a: &ValueRange, b: &ValueRange, limit: &BigInt) -> Option<ValueRange> {
    let (a_lo, a_hi) = within_limit(a, limit)?;
    let (b_lo, b_hi) = within_limit(b, limit)?;
    Some(ValueRange::new(a_lo - b_hi, a_hi - b_lo))
}

fn mul(a: &ValueRange, b: &ValueRange, limit: &BigInt) -> Option<ValueRange> {
    let (a_lo, a_hi) = within_limit(a, limit)?;
    let (b_lo, b_hi) = within_limit(b, limit)?;
    let corners = [&a_lo * &b_lo, &a_lo * &b_hi, &a_hi * &b_lo, &a_hi * &b_hi];
    let lo = corners.iter().min()?.clone();
    let hi = corners.iter().max()?.clone();
    // 2^128 * 2^128 no longer fits a word
    if hi > *MAX_UINT256 || lo < -(&*MAX_UINT256) {
        return None;
    }
    Some(ValueRange::new(lo, hi))
}

fn div(a: &ValueRange, b: &ValueRange) -> Option<ValueRange> {
    let (a_lo, a_hi) = a.unsigned_bounds()?;
    let (b_lo, b_hi) = b.unsigned_bounds()?;
    if b_hi.is_zero() {
        return Some(ValueRange::constant(0));
    }
    // Division by zero yields zero
    let lo = if b_lo.is_zero() { BigInt::zero() } else { a_lo / &b_hi };
    let hi = a_hi / max(b_lo, BigInt::one());
    Some(ValueRange::new(lo, hi))
}

fn modulo(a: &ValueRange, b: &ValueRange) -> Option<ValueRange> {
    let (a_lo, a_hi) = a.unsigned_bounds()?;
    let (b_lo, b_hi) = b.unsigned_bounds()?;
    if b_hi.is_zero() {
        return Some(ValueRange::constant(0));
    }
    if a_hi < b_lo {
        return Some(ValueRange::new(a_lo, a_hi));
    }
    Some(ValueRange::new(0, min(a_hi, b_hi - BigInt::one())))
}

fn and(a: &ValueRange, b: &ValueRange) -> Option<ValueRange> {
    let (_, a_hi) = a.unsigned_bounds()?;
    let (_, b_hi) = b.unsigned_bounds()?;
    Some(ValueRange::new(0, min(a_hi, b_hi)))
}

fn or(a: &ValueRange, b: &ValueRange) -> Option<ValueRange> {
    let (a_lo, a_hi) = a.unsigned_bounds()?;
    let (b_lo, b_hi) = b.unsigned_bounds()?;
    let bits = max(a_hi, b_hi).bits();
    Some(ValueRange::new(max(a_lo, b_lo), (BigInt::one() << bits) - BigInt::one()))
}

/// Shift amounts of 256 or more are all equivalent; `None` means "at least 256".
fn shift_amount(value: &BigInt) -> Option<usize> {
    value.to_usize().filter(|shift| *shift < 256)
}

fn shl(shift: &ValueRange, value: &ValueRange) -> Option<ValueRange> {
    let (s_lo, s_hi) = shift.unsigned_bounds()?;
    let (v_lo, v_hi) = value.unsigned_bounds()?;
    let Some(s_lo) = shift_amount(&s_lo) else {
        return Some(ValueRange::constant(0));
    };
    let s_hi = shift_amount(&s_hi)?;
    let hi = v_hi << s_hi;
    if hi > *MAX_UINT256 {
        return None;
    }
    Some(ValueRange::new(v_lo << s_lo, hi))
}

fn shr(shift: &ValueRange, value: &ValueRange) -> Option<ValueRange> {
    let (s_lo, s_hi) = shift.unsigned_bounds()?;
    let (v_lo, v_hi) = value.unsigned_bounds()?;
    let Some(s_lo) = shift_amount(&s_lo) else {
        return Some(ValueRange::constant(0));
    };
    let lo = shift_amount(&s_hi).map_or_else(BigInt::zero, |s_hi| v_lo >> s_hi);
    Some(ValueRange::new(lo, v_hi >> s_lo))
}

/// Arithmetic shift right, rounding toward negative infinity.
fn floor_shr(value: &BigInt, shift: usize) -> BigInt {
    if value.is_negative() {
        let magnitude: BigInt = -value - BigInt::one();
        -(magnitude >> shift) - BigInt::one()
    } else {
        value >> shift
    }
}

fn sar(shift: &ValueRange, value: &ValueRange) -> Option<ValueRange> {
    let (s_lo, s_hi) = shift.unsigned_bounds()?;
    let (v_lo, v_hi) = value.signed_bounds()?;
    // Shifting a signed word by 255 already leaves only the sign
    let s_lo = shift_amount(&s_lo).unwrap_or(255).min(255);
    let s_hi = shift_amount(&s_hi).unwrap_or(255).min(255);
    let corners = [
        floor_shr(&v_lo, s_lo),
        floor_shr(&v_lo, s_hi),
        floor_shr(&v_hi, s_lo),
        floor_shr(&v_hi, s_hi),
    ];
    Some(ValueRange::new(
        corners.iter().min()?.clone(),
        corners.iter().max()?.clone(),
    ))
}

fn byte(index: &ValueRange, value: &ValueRange) -> Option<ValueRange> {
    let (i_lo, _) = index.unsigned_bounds()?;
    if i_lo >= BigInt::from(32) {
        return Some(ValueRange::constant(0));
    }
    let (v_lo, v_hi) = value.unsigned_bounds()?;
    if index.as_constant() == Some(&BigInt::from(31)) && v_hi <= BigInt::from(255) {
        return Some(ValueRange::new(v_lo, v_hi));
    }
    Some(ValueRange::new(0, 255))
}

fn signextend(bytes: &ValueRange, value: &ValueRange) -> Option<ValueRange> {
    let bytes = bytes.as_constant()?;
    if *bytes >= BigInt::from(31) {
        return Some(value.clone());
    }
    let bits = 8 * (bytes.to_usize()? + 1);
    let half = BigInt::one() << (bits - 1);
    let (v_lo, v_hi) = value.unsigned_bounds()?;
    if v_hi < half {
        return Some(ValueRange::new(v_lo, v_hi));
    }
    Some(ValueRange::new(-&half, half - BigInt::one()))
}

fn eq(a: &ValueRange, b: &ValueRange) -> ValueRange {
    if a.to_unsigned().intersect(&b.to_unsigned()).is_bottom() {
        ValueRange::constant(0)
    } else {
        ValueRange::boolean()
    }
}

/// `lhs < rhs` over bounds already in a common (signed or unsigned) view.
fn compare(lhs: Option<(BigInt, BigInt)>, rhs: Option<(BigInt, BigInt)>) -> Option<ValueRange> {
    let (l_lo, l_hi) = lhs?;
    let (r_lo, r_hi) = rhs?;
    if l_hi < r_lo {
        Some(ValueRange::constant(1))
    } else if l_lo >= r_hi {
        Some(ValueRange::constant(0))
    } else {
        Some(ValueRange::boolean())
    }
}

fn iszero(a: &ValueRange) -> ValueRange {
    if a.is_zero() {
        ValueRange::constant(1)
    } else if a.excludes_zero() {
        ValueRange::constant(0)
    } else {
        ValueRange::boolean()
    }
}

fn bool_word(value: bool) -> BigInt {
    if value {
        BigInt::one()
    } else {
        BigInt::zero()
    }
}

/// Evaluates `opcode` on concrete unsigned words with EVM semantics.
///
/// Returns `None` for opcodes that do not compute a pure function of their
/// operands (loads, environment queries, calls).
#[must_use]
pub fn fold_constant(opcode: Opcode, args: &[BigInt]) -> Option<BigInt> {
    let word_bits = 256usize;
    let result = match (opcode, args) {
        (Opcode::Add, [a, b]) => a + b,
        (Opcode::Sub, [a, b]) => a - b,
        (Opcode::Mul, [a, b]) => a * b,
        (Opcode::Div, [a, b]) => {
            if b.is_zero() {
                BigInt::zero()
            } else {
                a / b
            }
        }
        (Opcode::Sdiv, [a, b]) => {
            if b.is_zero() {
                BigInt::zero()
            } else {
                // BigInt division truncates toward zero, like SDIV
                to_signed(a) / to_signed(b)
            }
        }
        (Opcode::Mod, [a, b]) => {
            if b.is_zero() {
                BigInt::zero()
            } else {
                a % b
            }
        }
        (Opcode::Smod, [a, b]) => {
            if b.is_zero() {
                BigInt::zero()
            } else {
                to_signed(a) % to_signed(b)
            }
        }
        (Opcode::Exp, [base, exponent]) => base.modpow(exponent, &(BigInt::one() << word_bits)),
        (Opcode::Addmod, [a, b, n]) => {
            if n.is_zero() {
                BigInt::zero()
            } else {
                (a + b) % n
            }
        }
        (Opcode::Mulmod, [a, b, n]) => {
            if n.is_zero() {
                BigInt::zero()
            } else {
                (a * b) % n
            }
        }
        (Opcode::And, [a, b]) => a & b,
        (Opcode::Or, [a, b]) => a | b,
        (Opcode::Xor, [a, b]) => a ^ b,
        (Opcode::Not, [a]) => &*MAX_UINT256 - a,
        (Opcode::Shl, [shift, value]) => match shift_amount(shift) {
            Some(shift) => value << shift,
            None => BigInt::zero(),
        },
        (Opcode::Shr, [shift, value]) => match shift_amount(shift) {
            Some(shift) => value >> shift,
            None => BigInt::zero(),
        },
        (Opcode::Sar, [shift, value]) => {
            floor_shr(&to_signed(value), shift_amount(shift).unwrap_or(255))
        }
        (Opcode::Byte, [index, value]) => match index.to_usize().filter(|i| *i < 32) {
            Some(index) => (value >> (8 * (31 - index))) & BigInt::from(0xff),
            None => BigInt::zero(),
        },
        (Opcode::Signextend, [bytes, value]) => match bytes.to_usize().filter(|b| *b < 31) {
            Some(bytes) => {
                let bits = 8 * (bytes + 1);
                let truncated: BigInt = value & ((BigInt::one() << bits) - BigInt::one());
                if truncated.bit((bits - 1) as u64) {
                    truncated - (BigInt::one() << bits)
                } else {
                    truncated
                }
            }
            None => value.clone(),
        },
        (Opcode::Eq, [a, b]) => bool_word(a == b),
        (Opcode::Lt, [a, b]) => bool_word(a < b),
        (Opcode::Gt, [a, b]) => bool_word(a > b),
        (Opcode::Slt, [a, b]) => bool_word(to_signed(a) < to_signed(b)),
        (Opcode::Sgt, [a, b]) => bool_word(to_signed(a) > to_signed(b)),
        (Opcode::Iszero, [a]) => bool_word(a.is_zero()),
        _ => return None,
    };
    Some(wrap(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::range::lattice::{MAX_INT256, MIN_INT256},
        ir::Variable,
    };

    fn state(entries: &[(&str, ValueRange)]) -> RangeState {
        entries
            .iter()
            .map(|(name, range)| (Variable::new(name), range.clone()))
            .collect()
    }

    fn eval(opcode: Opcode, operands: Vec<Operand>, state: &RangeState) -> ValueRange {
        let inst = Instruction::new(opcode, operands, Some(Variable::new("out")));
        evaluate(&inst, state, &AnalysisConfig::default())
    }

    #[test]
    fn test_constant_folding() {
        let empty = RangeState::default();
        let add = eval(Opcode::Add, vec![Operand::literal(5u64), Operand::literal(7u64)], &empty);
        assert_eq!(add, ValueRange::constant(12));

        let wrapped = eval(Opcode::Sub, vec![Operand::literal(0u64), Operand::literal(1u64)], &empty);
        assert_eq!(wrapped, ValueRange::constant(MAX_UINT256.clone()));

        let div_zero = eval(Opcode::Div, vec![Operand::literal(9u64), Operand::literal(0u64)], &empty);
        assert_eq!(div_zero, ValueRange::constant(0));
    }

    #[test]
    fn test_fold_signed_and_bitwise() {
        let minus = |v: i64| wrap(BigInt::from(v));
        let fold = |opcode, args: &[BigInt]| fold_constant(opcode, args).unwrap();

        assert_eq!(fold(Opcode::Sdiv, &[minus(-7), BigInt::from(2)]), minus(-3));
        assert_eq!(fold(Opcode::Smod, &[minus(-7), BigInt::from(2)]), minus(-1));
        assert_eq!(fold(Opcode::Sar, &[BigInt::from(1), minus(-7)]), minus(-4));
        assert_eq!(fold(Opcode::Sar, &[BigInt::from(300), minus(-7)]), minus(-1));
        assert_eq!(fold(Opcode::Shl, &[BigInt::from(256), BigInt::one()]), BigInt::zero());
        assert_eq!(fold(Opcode::Byte, &[BigInt::from(31), BigInt::from(0x1234)]), BigInt::from(0x34));
        assert_eq!(fold(Opcode::Signextend, &[BigInt::zero(), BigInt::from(0xff)]), minus(-1));
        assert_eq!(fold(Opcode::Signextend, &[BigInt::zero(), BigInt::from(0x7f)]), BigInt::from(0x7f));
        assert_eq!(fold(Opcode::Not, &[BigInt::zero()]), MAX_UINT256.clone());
        assert_eq!(fold(Opcode::Slt, &[minus(-1), BigInt::zero()]), BigInt::one());
        assert_eq!(fold(Opcode::Lt, &[minus(-1), BigInt::zero()]), BigInt::zero());
        assert_eq!(fold(Opcode::Exp, &[BigInt::from(2), BigInt::from(256)]), BigInt::zero());
        assert_eq!(fold(Opcode::Addmod, &[BigInt::from(5), BigInt::from(6), BigInt::from(4)]), BigInt::from(3));
        assert!(fold_constant(Opcode::Calldataload, &[BigInt::zero()]).is_none());
    }

    #[test]
    fn test_arithmetic_intervals() {
        let s = state(&[("x", ValueRange::new(0, 10)), ("y", ValueRange::new(-3, 4))]);
        let x = || Operand::var("x");
        let y = || Operand::var("y");

        assert_eq!(eval(Opcode::Add, vec![x(), y()], &s), ValueRange::new(-3, 14));
        assert_eq!(eval(Opcode::Sub, vec![x(), y()], &s), ValueRange::new(-4, 13));
        assert_eq!(eval(Opcode::Mul, vec![x(), y()], &s), ValueRange::new(-30, 40));
        assert_eq!(
            eval(Opcode::Div, vec![x(), Operand::literal(2u64)], &s),
            ValueRange::new(0, 5)
        );
        assert_eq!(
            eval(Opcode::Mod, vec![Operand::var("unknown"), Operand::literal(1000u64)], &s),
            ValueRange::new(0, 999)
        );
        assert_eq!(
            eval(Opcode::Mod, vec![x(), Operand::literal(1000u64)], &s),
            ValueRange::new(0, 10)
        );
    }

    #[test]
    fn test_width_limit_gives_top() {
        let wide = ValueRange::new(0, BigInt::one() << 129usize);
        let s = state(&[("w", wide), ("x", ValueRange::new(0, 10))]);
        assert!(eval(Opcode::Add, vec![Operand::var("w"), Operand::var("x")], &s).is_top());
        assert!(eval(Opcode::Mul, vec![Operand::var("w"), Operand::var("x")], &s).is_top());
        assert!(eval(Opcode::Sub, vec![Operand::var("top"), Operand::var("x")], &s).is_top());

        let narrow = AnalysisConfig::default().with_width_limit_bits(2);
        let inst = Instruction::new(
            Opcode::Add,
            vec![Operand::var("x"), Operand::literal(1u64)],
            Some(Variable::new("out")),
        );
        assert!(evaluate(&inst, &s, &narrow).is_top());
    }

    #[test]
    fn test_bitwise_and_shifts() {
        let s = state(&[("x", ValueRange::new(3, 200)), ("top", ValueRange::Top)]);
        let x = || Operand::var("x");
        assert_eq!(
            eval(Opcode::And, vec![Operand::var("top"), Operand::literal(0xffu64)], &s),
            ValueRange::new(0, 255)
        );
        assert_eq!(eval(Opcode::Or, vec![x(), Operand::literal(1u64)], &s), ValueRange::new(3, 255));
        assert_eq!(eval(Opcode::Shl, vec![Operand::literal(4u64), x()], &s), ValueRange::new(48, 3200));
        assert_eq!(eval(Opcode::Shr, vec![Operand::literal(1u64), x()], &s), ValueRange::new(1, 100));
        assert_eq!(
            eval(Opcode::Shr, vec![Operand::literal(248u64), Operand::var("top")], &s),
            ValueRange::new(0, 255)
        );
        assert!(eval(Opcode::Shl, vec![Operand::literal(255u64), x()], &s).is_top());
        assert_eq!(
            eval(Opcode::Byte, vec![Operand::literal(0u64), Operand::var("top")], &s),
            ValueRange::new(0, 255)
        );
        assert_eq!(
            eval(Opcode::Sar, vec![Operand::literal(1u64), Operand::var("top")], &s),
            ValueRange::new(MIN_INT256.clone() / BigInt::from(2), MAX_INT256.clone() / BigInt::from(2))
        );
        assert_eq!(
            eval(Opcode::Signextend, vec![Operand::literal(0u64), Operand::var("top")], &s),
            ValueRange::new(-128, 127)
        );
    }

    #[test]
    fn test_comparisons() {
        let s = state(&[
            ("small", ValueRange::new(0, 9)),
            ("big", ValueRange::new(10, 20)),
            ("neg", ValueRange::new(-5, -1)),
        ]);
        let op = Operand::var;
        assert_eq!(eval(Opcode::Lt, vec![op("small"), op("big")], &s), ValueRange::constant(1));
        assert_eq!(eval(Opcode::Gt, vec![op("small"), op("big")], &s), ValueRange::constant(0));
        // Negative words are huge when read unsigned
        assert_eq!(eval(Opcode::Lt, vec![op("neg"), op("small")], &s), ValueRange::constant(0));
        assert_eq!(eval(Opcode::Slt, vec![op("neg"), op("small")], &s), ValueRange::constant(1));
        assert_eq!(eval(Opcode::Sgt, vec![op("neg"), op("small")], &s), ValueRange::constant(0));
        assert_eq!(eval(Opcode::Eq, vec![op("small"), op("big")], &s), ValueRange::constant(0));
        assert_eq!(eval(Opcode::Eq, vec![op("small"), op("small")], &s), ValueRange::boolean());
        assert_eq!(eval(Opcode::Iszero, vec![op("big")], &s), ValueRange::constant(0));
        assert_eq!(eval(Opcode::Iszero, vec![op("small")], &s), ValueRange::boolean());
    }

    #[test]
    fn test_unknown_opcode_and_assign() {
        let s = state(&[("x", ValueRange::new(1, 2))]);
        assert!(eval(Opcode::Calldataload, vec![Operand::literal(0u64)], &s).is_top());
        assert!(eval(Opcode::Xor, vec![Operand::var("x"), Operand::literal(1u64)], &s).is_top());
        assert_eq!(eval(Opcode::Assign, vec![Operand::var("x")], &s), ValueRange::new(1, 2));
        let bottom = state(&[("x", ValueRange::Bottom)]);
        assert!(eval(Opcode::Add, vec![Operand::var("x"), Operand::literal(1u64)], &bottom).is_bottom());
    }
}
