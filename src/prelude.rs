//! # evmopt Prelude
//!
//! The types most programs touching the IR and its analyses need. Import it
//! with `use evmopt::prelude::*;`.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all evmopt operations
pub use crate::Error;

/// The result type used throughout evmopt
pub use crate::Result;

// ================================================================================================
// IR
// ================================================================================================

/// Functions, blocks and modules
pub use crate::ir::{BasicBlock, Function, FunctionBuilder, Module};

/// Instructions and their operands
pub use crate::ir::{Effects, InstId, Instruction, Label, Opcode, Operand, Variable};

/// Memory regions touched by instructions
pub use crate::ir::{AddrSpace, MemoryLocation};

/// Text format
pub use crate::ir::{parse_function, parse_module};

// ================================================================================================
// Analyses
// ================================================================================================

/// Analysis cache and configuration
pub use crate::analysis::{AnalysisConfig, AnalysisKind, AnalysisManager};

/// Structural analyses
pub use crate::analysis::{CfgAnalysis, DfgAnalysis, DominatorTreeAnalysis};

/// Memory analyses
pub use crate::analysis::{MemoryAccess, MemoryAccessId, MemoryAliasAnalysis, MemorySsa};

/// Value ranges
pub use crate::analysis::{ValueRange, VariableRangeAnalysis};

// ================================================================================================
// Passes
// ================================================================================================

/// Pass infrastructure
pub use crate::compiler::{EventKind, EventLog, Pass, PassScheduler, SchedulerConfig};

/// Built-in passes
pub use crate::compiler::{
    AssertEliminationPass, BranchOptimizationPass, DeadStoreEliminationPass,
    RedundantLoadEliminationPass,
};

/// Graph node ids shared by blocks and generic graphs
pub use crate::utils::graph::NodeId;
