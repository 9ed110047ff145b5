//! Variable range analysis.
//!
//! A forward interval abstract interpretation over the CFG. Every SSA variable
//! is tracked as a [`ValueRange`] at every instruction, with
//!
//! - closed-form transfer functions for arithmetic, bitwise and comparison
//!   opcodes ([`evaluate`]),
//! - branch narrowing on the edges out of `jnz` ([`refine_condition`]),
//! - widening to `Top` for ranges that keep growing around loops.
//!
//! # Usage
//!
//! ```rust
//! use evmopt::analysis::{AnalysisConfig, CfgAnalysis, DfgAnalysis, ValueRange, VariableRangeAnalysis};
//! use evmopt::ir::{parse_function, Operand};
//!
//! let function = parse_function("function f {\nentry:\n    %x = 5\n    %y = add %x, 7\n    stop\n}")?;
//! let cfg = CfgAnalysis::build(&function);
//! let dfg = DfgAnalysis::build(&function);
//! let ranges = VariableRangeAnalysis::build(&function, &cfg, &dfg, &AnalysisConfig::default());
//!
//! let stop = function.block(function.entry()).terminator().unwrap().id();
//! assert_eq!(ranges.get_range(&Operand::var("y"), stop), ValueRange::constant(12));
//! # Ok::<(), evmopt::Error>(())
//! ```

use rustc_hash::FxHashMap;

use crate::ir::Variable;

mod lattice;
mod narrowing;
mod solver;
mod transfer;

pub use lattice::{
    bigint_to_word, to_signed, word_to_bigint, wrap, ValueRange, MAX_INT256, MAX_UINT256, MIN_INT256,
};
pub use narrowing::refine_condition;
pub use solver::VariableRangeAnalysis;
pub use transfer::{evaluate, fold_constant, operand_range};

/// Ranges of the variables at one program point. A missing variable is `Top`.
pub type RangeState = FxHashMap<Variable, ValueRange>;
