//! Program analyses over the IR.
//!
//! Every analysis is a read-only view built from a [`Function`](crate::ir::Function)
//! and owns its results, so it stays usable (though possibly stale) while a
//! pass mutates the function.
//!
//! # Architecture
//!
//! - [`cfg`] - successor/predecessor edges, traversal orders, reachability
//! - [`DominatorTreeAnalysis`] - immediate dominators and dominance frontiers
//! - [`DfgAnalysis`] - def-use index over SSA variables
//! - [`memory`] - may-alias decisions and Memory SSA per address space
//! - [`range`] - flow-sensitive interval ranges with branch narrowing and widening
//! - [`AnalysisManager`] - per-function get-or-build cache with explicit invalidation
//!
//! ```text
//! Function ─► CfgAnalysis ─► DominatorTreeAnalysis ─► MemorySsa ◄─ MemoryAliasAnalysis
//!                 │
//!                 └─► VariableRangeAnalysis ◄─ DfgAnalysis
//! ```
//!
//! # Usage
//!
//! ```rust
//! use evmopt::analysis::{AnalysisKind, AnalysisManager};
//! use evmopt::ir::{parse_function, AddrSpace};
//!
//! let function = parse_function(
//!     "function f {\nentry:\n    mstore 0, 1\n    %v = mload 0\n    stop\n}",
//! )?;
//! let mut am = AnalysisManager::new();
//!
//! let mem_ssa = am.memory_ssa(&function, AddrSpace::Memory);
//! let load = function.instructions().nth(1).map(|(_, inst)| inst.id()).unwrap();
//! let use_of_load = mem_ssa.get_memory_use(load).unwrap();
//! let clobber = mem_ssa.get_clobbered_memory_access(use_of_load.id()).unwrap();
//! assert!(!mem_ssa.access(clobber).is_live_on_entry());
//!
//! am.invalidate(AnalysisKind::Cfg);
//! # Ok::<(), evmopt::Error>(())
//! ```

pub mod cfg;
pub mod memory;
pub mod range;

mod config;
mod dfg;
mod dominators;
mod manager;

pub use cfg::{CfgAnalysis, CfgEdgeKind};
pub use config::AnalysisConfig;
pub use dfg::{DfgAnalysis, Location};
pub use dominators::DominatorTreeAnalysis;
pub use manager::{AnalysisKind, AnalysisManager};
pub use memory::{
    analyze_alias, locations_may_alias, locations_must_alias, AliasResult, MemoryAccess, MemoryAccessId,
    MemoryAccessKind, MemoryAliasAnalysis, MemorySsa, MemorySsaStats,
};
pub use range::{RangeState, ValueRange, VariableRangeAnalysis};
