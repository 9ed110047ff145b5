//! Memory effect analyses.
//!
//! - [`alias`] decides whether two [`MemoryLocation`](crate::ir::MemoryLocation)s can overlap.
//! - [`ssa`] builds Memory SSA per address space and answers clobber queries.
//!
//! Each address space (memory, storage, transient) is analyzed independently:
//! a storage write never clobbers a memory read.

mod alias;
mod ssa;

pub use alias::{analyze_alias, locations_may_alias, locations_must_alias, AliasResult, MemoryAliasAnalysis};
pub use ssa::{MemoryAccess, MemoryAccessId, MemoryAccessKind, MemorySsa, MemorySsaStats};
