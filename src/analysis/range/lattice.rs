//! The interval lattice over 256-bit words.
//!
//! Bounds are arbitrary-precision integers constrained to
//! `[MIN_INT256, MAX_UINT256]`, so one interval can be read either as a set of
//! unsigned words or as a set of signed words. An integer `x` denotes the word
//! `x mod 2^256`; `-1` and `MAX_UINT256` are the same word.
//!
//! ```text
//!            ⊤  (no information)
//!            |
//!         [lo, hi]
//!            |
//!          [c, c]
//!            |
//!            ⊥  (unreachable)
//! ```

use std::{
    cmp::{max, min},
    fmt,
    sync::LazyLock,
};

use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use primitive_types::U256;

/// Smallest signed 256-bit value, `-2^255`.
pub static MIN_INT256: LazyLock<BigInt> = LazyLock::new(|| -(BigInt::one() << 255usize));

/// Largest signed 256-bit value, `2^255 - 1`.
pub static MAX_INT256: LazyLock<BigInt> = LazyLock::new(|| (BigInt::one() << 255usize) - BigInt::one());

/// Largest unsigned 256-bit value, `2^256 - 1`.
pub static MAX_UINT256: LazyLock<BigInt> = LazyLock::new(|| (BigInt::one() << 256usize) - BigInt::one());

static WORD_MODULUS: LazyLock<BigInt> = LazyLock::new(|| BigInt::one() << 256usize);

/// Converts an EVM word to its unsigned integer value.
#[must_use]
pub fn word_to_bigint(word: U256) -> BigInt {
    word.0
        .iter()
        .rev()
        .fold(BigInt::zero(), |acc: BigInt, limb| (acc << 64usize) + BigInt::from(*limb))
}

/// Reduces `value` modulo `2^256` and converts it to an EVM word.
#[must_use]
pub fn bigint_to_word(value: &BigInt) -> U256 {
    let (_, digits) = wrap(value.clone()).to_u64_digits();
    let mut limbs = [0u64; 4];
    for (limb, digit) in limbs.iter_mut().zip(digits) {
        *limb = digit;
    }
    U256(limbs)
}

/// Reduces `value` into `[0, 2^256)`.
#[must_use]
pub fn wrap(value: BigInt) -> BigInt {
    let reduced = value % &*WORD_MODULUS;
    if reduced.is_negative() {
        reduced + &*WORD_MODULUS
    } else {
        reduced
    }
}

/// Interprets an unsigned word value as two's complement.
#[must_use]
pub fn to_signed(word: &BigInt) -> BigInt {
    if *word > *MAX_INT256 {
        word - &*WORD_MODULUS
    } else {
        word.clone()
    }
}

/// A set of possible values of a 256-bit variable.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub enum ValueRange {
    /// No possible values (unreachable code).
    Bottom,
    /// Every integer in `[lo, hi]`.
    Interval {
        /// Inclusive lower bound
        lo: BigInt,
        /// Inclusive upper bound
        hi: BigInt,
    },
    /// All values possible (no information).
    #[default]
    Top,
}

impl ValueRange {
    /// The range containing every value.
    #[must_use]
    pub const fn top() -> Self {
        ValueRange::Top
    }

    /// The empty range.
    #[must_use]
    pub const fn bottom() -> Self {
        ValueRange::Bottom
    }

    /// Creates `[lo, hi]`, clamped to `[MIN_INT256, MAX_UINT256]`.
    ///
    /// An inverted interval is `Bottom`; one covering the whole domain is `Top`.
    #[must_use]
    pub fn new(lo: impl Into<BigInt>, hi: impl Into<BigInt>) -> Self {
        let lo = max(lo.into(), MIN_INT256.clone());
        let hi = min(hi.into(), MAX_UINT256.clone());
        if lo > hi {
            ValueRange::Bottom
        } else if lo == *MIN_INT256 && hi == *MAX_UINT256 {
            ValueRange::Top
        } else {
            ValueRange::Interval { lo, hi }
        }
    }

    /// The single value `value`.
    #[must_use]
    pub fn constant(value: impl Into<BigInt>) -> Self {
        let value = value.into();
        Self::new(value.clone(), value)
    }

    /// The single unsigned word `word`.
    #[must_use]
    pub fn from_word(word: U256) -> Self {
        Self::constant(word_to_bigint(word))
    }

    /// `[0, MAX_UINT256]`: every word, read unsigned.
    #[must_use]
    pub fn unsigned_full() -> Self {
        Self::new(0, MAX_UINT256.clone())
    }

    /// `[MIN_INT256, MAX_INT256]`: every word, read signed.
    #[must_use]
    pub fn signed_full() -> Self {
        Self::new(MIN_INT256.clone(), MAX_INT256.clone())
    }

    /// `[0, 1]`, the result of a comparison.
    #[must_use]
    pub fn boolean() -> Self {
        Self::new(0, 1)
    }

    /// Returns `true` for `Top`.
    #[must_use]
    pub fn is_top(&self) -> bool {
        matches!(self, ValueRange::Top)
    }

    /// Returns `true` for `Bottom`.
    #[must_use]
    pub fn is_bottom(&self) -> bool {
        matches!(self, ValueRange::Bottom)
    }

    /// Lower bound of a concrete interval.
    #[must_use]
    pub fn lo(&self) -> Option<&BigInt> {
        match self {
            ValueRange::Interval { lo, .. } => Some(lo),
            _ => None,
        }
    }

    /// Upper bound of a concrete interval.
    #[must_use]
    pub fn hi(&self) -> Option<&BigInt> {
        match self {
            ValueRange::Interval { hi, .. } => Some(hi),
            _ => None,
        }
    }

    /// The value of a single-value range.
    #[must_use]
    pub fn as_constant(&self) -> Option<&BigInt> {
        match self {
            ValueRange::Interval { lo, hi } if lo == hi => Some(lo),
            _ => None,
        }
    }

    /// Returns `true` if exactly one value is possible.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.as_constant().is_some()
    }

    /// Returns `true` if `value` is in the range.
    #[must_use]
    pub fn contains(&self, value: &BigInt) -> bool {
        match self {
            ValueRange::Bottom => false,
            ValueRange::Top => true,
            ValueRange::Interval { lo, hi } => lo <= value && value <= hi,
        }
    }

    /// Returns `true` if the word zero is impossible.
    ///
    /// `Bottom` vacuously excludes zero.
    #[must_use]
    pub fn excludes_zero(&self) -> bool {
        !self.contains(&BigInt::zero())
    }

    /// Returns `true` if the range is exactly `{0}`.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.as_constant().is_some_and(Zero::is_zero)
    }

    /// Returns `true` if every value of `self` is also in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        match (self, other) {
            (ValueRange::Bottom, _) | (_, ValueRange::Top) => true,
            (_, ValueRange::Bottom) | (ValueRange::Top, _) => false,
            (
                ValueRange::Interval { lo: a_lo, hi: a_hi },
                ValueRange::Interval { lo: b_lo, hi: b_hi },
            ) => b_lo <= a_lo && a_hi <= b_hi,
        }
    }

    /// Least upper bound: the smallest interval containing both.
    ///
    /// `Bottom` is the identity and `Top` absorbs.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        match (self, other) {
            (ValueRange::Bottom, x) | (x, ValueRange::Bottom) => x.clone(),
            (ValueRange::Top, _) | (_, ValueRange::Top) => ValueRange::Top,
            (
                ValueRange::Interval { lo: a_lo, hi: a_hi },
                ValueRange::Interval { lo: b_lo, hi: b_hi },
            ) => Self::new(min(a_lo, b_lo).clone(), max(a_hi, b_hi).clone()),
        }
    }

    /// Greatest lower bound: the values in both.
    ///
    /// `Top` is the identity; disjoint intervals give `Bottom`.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        match (self, other) {
            (ValueRange::Top, x) | (x, ValueRange::Top) => x.clone(),
            (ValueRange::Bottom, _) | (_, ValueRange::Bottom) => ValueRange::Bottom,
            (
                ValueRange::Interval { lo: a_lo, hi: a_hi },
                ValueRange::Interval { lo: b_lo, hi: b_hi },
            ) => Self::new(max(a_lo, b_lo).clone(), min(a_hi, b_hi).clone()),
        }
    }

    /// Widens `self` (the previously recorded range) against `next`.
    ///
    /// A range that did not grow keeps the previous value; anything else
    /// jumps to `Top`, so a variable can change at most once more after the
    /// widening threshold is reached.
    #[must_use]
    pub fn widen(&self, next: &Self) -> Self {
        if next.is_subset_of(self) {
            self.clone()
        } else {
            ValueRange::Top
        }
    }

    /// Returns `true` if `self` extends past `previous` on either side.
    #[must_use]
    pub fn grew_from(&self, previous: &Self) -> bool {
        !self.is_subset_of(previous)
    }

    /// Bounds of the words in the range read as unsigned integers.
    ///
    /// An interval straddling zero wraps around the unsigned domain and is
    /// widened to `[0, MAX_UINT256]`.
    #[must_use]
    pub fn unsigned_bounds(&self) -> Option<(BigInt, BigInt)> {
        match self {
            ValueRange::Bottom => None,
            ValueRange::Top => Some((BigInt::zero(), MAX_UINT256.clone())),
            ValueRange::Interval { lo, hi } => {
                if !lo.is_negative() {
                    Some((lo.clone(), hi.clone()))
                } else if hi.is_negative() {
                    Some((lo + &*WORD_MODULUS, hi + &*WORD_MODULUS))
                } else {
                    Some((BigInt::zero(), MAX_UINT256.clone()))
                }
            }
        }
    }

    /// Bounds of the words in the range read as two's complement integers.
    ///
    /// An interval straddling `2^255` is widened to `[MIN_INT256, MAX_INT256]`.
    #[must_use]
    pub fn signed_bounds(&self) -> Option<(BigInt, BigInt)> {
        match self {
            ValueRange::Bottom => None,
            ValueRange::Top => Some((MIN_INT256.clone(), MAX_INT256.clone())),
            ValueRange::Interval { lo, hi } => {
                if *hi <= *MAX_INT256 {
                    Some((lo.clone(), hi.clone()))
                } else if *lo > *MAX_INT256 {
                    Some((lo - &*WORD_MODULUS, hi - &*WORD_MODULUS))
                } else {
                    Some((MIN_INT256.clone(), MAX_INT256.clone()))
                }
            }
        }
    }

    /// The same words re-expressed in unsigned form.
    #[must_use]
    pub fn to_unsigned(&self) -> Self {
        match self.unsigned_bounds() {
            Some((lo, hi)) => Self::new(lo, hi),
            None => ValueRange::Bottom,
        }
    }

    /// The same words re-expressed in signed form.
    #[must_use]
    pub fn to_signed(&self) -> Self {
        match self.signed_bounds() {
            Some((lo, hi)) => Self::new(lo, hi),
            None => ValueRange::Bottom,
        }
    }

    /// The range with the word zero removed, as far as one interval allows.
    #[must_use]
    pub fn exclude_zero(&self) -> Self {
        match self {
            ValueRange::Top => Self::new(1, MAX_UINT256.clone()),
            ValueRange::Interval { lo, hi } if lo.is_zero() => Self::new(BigInt::one(), hi.clone()),
            ValueRange::Interval { lo, hi } if hi.is_zero() => Self::new(lo.clone(), -BigInt::one()),
            other => other.clone(),
        }
    }
}

impl fmt::Debug for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueRange::Bottom => write!(f, "⊥"),
            ValueRange::Top => write!(f, "⊤"),
            ValueRange::Interval { lo, hi } => write!(f, "[{lo}, {hi}]"),
        }
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_normalizes() {
        assert_eq!(ValueRange::new(5, 3), ValueRange::Bottom);
        assert_eq!(
            ValueRange::new(MIN_INT256.clone() - BigInt::from(10), MAX_UINT256.clone() + BigInt::from(10)),
            ValueRange::Top
        );
        let clamped = ValueRange::new(-5, MAX_UINT256.clone() + BigInt::one());
        assert_eq!(clamped.hi(), Some(&*MAX_UINT256));
        assert_eq!(ValueRange::constant(7).as_constant(), Some(&BigInt::from(7)));
    }

    #[test]
    fn test_union_and_intersect() {
        let a = ValueRange::new(0, 10);
        let b = ValueRange::new(5, 20);
        let c = ValueRange::new(30, 40);
        assert_eq!(a.union(&b), ValueRange::new(0, 20));
        assert_eq!(a.intersect(&b), ValueRange::new(5, 10));
        assert_eq!(a.intersect(&c), ValueRange::Bottom);
        assert_eq!(a.union(&ValueRange::Bottom), a);
        assert_eq!(a.union(&ValueRange::Top), ValueRange::Top);
        assert_eq!(a.intersect(&ValueRange::Top), a);
    }

    #[test]
    fn test_widen() {
        let previous = ValueRange::new(0, 10);
        assert_eq!(previous.widen(&ValueRange::new(2, 8)), previous);
        assert_eq!(previous.widen(&ValueRange::new(0, 11)), ValueRange::Top);
        assert_eq!(ValueRange::Bottom.widen(&previous), ValueRange::Top);
        assert!(ValueRange::new(-1, 10).grew_from(&previous));
        assert!(!ValueRange::Bottom.grew_from(&previous));
    }

    #[test]
    fn test_views() {
        let minus_one = ValueRange::constant(-1);
        assert_eq!(
            minus_one.unsigned_bounds(),
            Some((MAX_UINT256.clone(), MAX_UINT256.clone()))
        );
        assert_eq!(ValueRange::from_word(U256::MAX).to_signed(), minus_one);

        let straddle = ValueRange::new(-1, 1);
        assert_eq!(straddle.to_unsigned(), ValueRange::unsigned_full());
        assert_eq!(straddle.signed_bounds(), Some((BigInt::from(-1), BigInt::one())));
        assert_eq!(ValueRange::Top.signed_bounds(), Some((MIN_INT256.clone(), MAX_INT256.clone())));
        assert_eq!(ValueRange::Bottom.unsigned_bounds(), None);
    }

    #[test]
    fn test_zero_queries() {
        assert!(ValueRange::new(1, 9).excludes_zero());
        assert!(!ValueRange::new(0, 9).excludes_zero());
        assert!(!ValueRange::Top.excludes_zero());
        assert!(ValueRange::constant(0).is_zero());
        assert_eq!(ValueRange::new(0, 9).exclude_zero(), ValueRange::new(1, 9));
        assert_eq!(ValueRange::new(-4, 0).exclude_zero(), ValueRange::new(-4, -1));
        assert_eq!(ValueRange::new(-4, 4).exclude_zero(), ValueRange::new(-4, 4));
        assert_eq!(ValueRange::Top.exclude_zero().lo(), Some(&BigInt::one()));
    }

    #[test]
    fn test_word_conversions() {
        let word = U256::from(0xdead_beefu64) << 130u32;
        let value = word_to_bigint(word);
        assert_eq!(value, BigInt::from(0xdead_beefu64) << 130usize);
        assert_eq!(bigint_to_word(&value), word);
        assert_eq!(bigint_to_word(&BigInt::from(-1)), U256::MAX);
        assert_eq!(wrap(MAX_UINT256.clone() + BigInt::from(2)), BigInt::one());
        assert_eq!(to_signed(&MAX_UINT256), BigInt::from(-1));
    }

    #[test]
    fn test_display() {
        assert_eq!(ValueRange::Top.to_string(), "⊤");
        assert_eq!(ValueRange::Bottom.to_string(), "⊥");
        assert_eq!(ValueRange::new(-3, 12).to_string(), "[-3, 12]");
    }

    fn arb_range() -> impl Strategy<Value = ValueRange> {
        prop_oneof![
            1 => Just(ValueRange::Top),
            1 => Just(ValueRange::Bottom),
            6 => (any::<i64>(), any::<i64>()).prop_map(|(a, b)| ValueRange::new(a.min(b), a.max(b))),
            2 => (any::<u64>(), 0u32..200).prop_map(|(a, shift)| {
                let lo = BigInt::from(a) << shift;
                let hi = lo.clone() + BigInt::from(a);
                ValueRange::new(lo, hi)
            }),
        ]
    }

    proptest! {
        #[test]
        fn union_is_commutative(a in arb_range(), b in arb_range()) {
            prop_assert_eq!(a.union(&b), b.union(&a));
        }

        #[test]
        fn union_is_associative(a in arb_range(), b in arb_range(), c in arb_range()) {
            prop_assert_eq!(a.union(&b).union(&c), a.union(&b.union(&c)));
        }

        #[test]
        fn top_absorbs_and_bottom_is_identity(a in arb_range()) {
            prop_assert_eq!(a.union(&ValueRange::Top), ValueRange::Top);
            prop_assert_eq!(a.union(&ValueRange::Bottom), a.clone());
            prop_assert_eq!(a.intersect(&ValueRange::Top), a.clone());
            prop_assert_eq!(a.intersect(&ValueRange::Bottom), ValueRange::Bottom);
        }

        #[test]
        fn union_widens_and_intersect_narrows(a in arb_range(), b in arb_range()) {
            prop_assert!(a.is_subset_of(&a.union(&b)));
            prop_assert!(a.intersect(&b).is_subset_of(&a));
            prop_assert!(a.intersect(&b).is_subset_of(&b));
        }

        #[test]
        fn intersect_is_monotone(a in arb_range(), b in arb_range(), c in arb_range()) {
            let wider = a.union(&b);
            prop_assert!(a.intersect(&c).is_subset_of(&wider.intersect(&c)));
        }

        #[test]
        fn disjoint_intervals_meet_at_bottom(lo in any::<i64>(), len in 0i64..1000, gap in 1i64..1000) {
            let lo = i128::from(lo);
            let first = ValueRange::new(lo, lo + i128::from(len));
            let second_lo = lo + i128::from(len) + i128::from(gap);
            let second = ValueRange::new(second_lo, second_lo + 5);
            prop_assert_eq!(first.intersect(&second), ValueRange::Bottom);
        }

        #[test]
        fn word_round_trip(value in any::<u128>(), shift in 0u32..128) {
            let word = U256::from(value) << shift;
            prop_assert_eq!(bigint_to_word(&word_to_bigint(word)), word);
        }
    }
}
