//! Optimization passes built on the analyses.
//!
//! | Pass | Uses | Rewrites |
//! |------|------|----------|
//! | [`BranchOptimizationPass`] | variable ranges | `jnz` with a known condition into `jmp` |
//! | [`AssertEliminationPass`] | variable ranges | drops `assert` of a never-zero value |
//! | [`RedundantLoadEliminationPass`] | memory SSA | load after a store to the same slot into `assign` |
//! | [`DeadStoreEliminationPass`] | memory SSA | drops stores overwritten before any read |

mod asserts;
mod branch;
mod dead_store;
mod load_elim;

pub use asserts::AssertEliminationPass;
pub use branch::BranchOptimizationPass;
pub use dead_store::DeadStoreEliminationPass;
pub use load_elim::RedundantLoadEliminationPass;

use crate::ir::{AddrSpace, Opcode};

/// Returns `true` for the single-word store of `space`.
pub(crate) fn is_plain_store(opcode: Opcode, space: AddrSpace) -> bool {
    matches!(
        (space, opcode),
        (AddrSpace::Memory, Opcode::Mstore)
            | (AddrSpace::Storage, Opcode::Sstore)
            | (AddrSpace::Transient, Opcode::Tstore)
    )
}

/// Returns `true` for the single-word load of `space`.
pub(crate) fn is_plain_load(opcode: Opcode, space: AddrSpace) -> bool {
    matches!(
        (space, opcode),
        (AddrSpace::Memory, Opcode::Mload)
            | (AddrSpace::Storage, Opcode::Sload)
            | (AddrSpace::Transient, Opcode::Tload)
    )
}
