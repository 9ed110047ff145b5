// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # evmopt
//!
//! The analysis layer of a compiler middle-end that targets the Ethereum
//! Virtual Machine. Given a function in a basic-block IR, `evmopt` derives the
//! facts optimization passes rely on:
//!
//! - **Control flow**: predecessors, successors and a stable visiting order
//! - **Dominance**: immediate dominators, dominance frontiers, dominator tree order
//! - **Memory aliasing**: whether two memory, storage or transient regions may overlap
//! - **Memory SSA**: which earlier write a read observes, and which later
//!   write makes a store dead
//! - **Value ranges**: a sound integer interval for every variable at every
//!   program point, refined along branch edges and widened in loops
//!
//! A small set of passes built on these analyses (branch folding, assert
//! removal, redundant load and dead store elimination) and a fixpoint
//! scheduler come with the crate.
//!
//! ## Quick Start
//!
//! ```rust
//! use evmopt::prelude::*;
//!
//! let func = parse_function(
//!     "function f {
//! entry:
//!     %x = 5
//!     %y = add %x, 7
//!     mstore 0, %y
//!     %z = mload 0
//!     return 0, 32
//! }",
//! )?;
//!
//! let mut analyses = AnalysisManager::new();
//! let ranges = analyses.variable_ranges(&func);
//! let store = func.blocks()[0].instructions()[2].id();
//! assert_eq!(ranges.get_range(&Operand::var("y"), store), ValueRange::constant(12));
//!
//! let mem_ssa = analyses.memory_ssa(&func, AddrSpace::Memory);
//! let load = func.blocks()[0].instructions()[3].id();
//! let read = mem_ssa.get_memory_use(load).map(MemoryAccess::id);
//! let writer = read.and_then(|id| mem_ssa.get_clobbered_memory_access(id));
//! assert_eq!(writer, mem_ssa.get_memory_def(store).map(MemoryAccess::id));
//! # Ok::<(), evmopt::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`ir`] - functions, blocks, instructions, opcodes and their effects; text parser and printer
//! - [`analysis`] - the analyses and the [`analysis::AnalysisManager`] cache
//! - [`compiler`] - passes, the pass scheduler and the event log
//! - [`utils`] - generic graph traits and algorithms
//! - [`Error`] and [`Result`] - errors at the IR construction and pass boundary
//!
//! Analyses treat malformed IR as a bug in an earlier stage and panic with a
//! diagnostic; only parsing, building, verifying and running passes return
//! errors.

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust
/// use evmopt::prelude::*;
///
/// let func = parse_function("function f {\nentry:\n    stop\n}")?;
/// let cfg = CfgAnalysis::build(&func);
/// assert_eq!(cfg.exits().len(), 1);
/// # Ok::<(), evmopt::Error>(())
/// ```
pub mod prelude;

/// The basic-block IR every analysis consumes.
///
/// See [`ir::parse_function`] for the text format and [`ir::FunctionBuilder`]
/// for programmatic construction.
pub mod ir;

/// Control flow, dominance, memory and value range analyses.
pub mod analysis;

/// Optimization passes, the fixpoint scheduler and the event log.
pub mod compiler;

/// Generic graph infrastructure shared by the analyses.
pub mod utils;

/// `evmopt` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `evmopt` Error type
///
/// # Examples
///
/// ```rust
/// use evmopt::{ir::parse_function, Error};
///
/// match parse_function("function f {\nentry:\n    %x = frob 1\n    stop\n}") {
///     Err(Error::UnknownOpcode(name)) => assert_eq!(name, "frob"),
///     other => panic!("unexpected: {other:?}"),
/// }
/// ```
pub use error::Error;
