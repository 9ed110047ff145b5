//! Control Flow Graph (CFG) analysis.
//!
//! [`CfgAnalysis`] derives successor and predecessor edges from block
//! terminators:
//!
//! | Terminator | Successors |
//! |------------|------------|
//! | `jmp @a` | `a` |
//! | `jnz %c, @t, @f` | `t` (true edge), `f` (false edge) |
//! | `djmp %s, @a, @b, ...` | the static target list |
//! | `ret`, `return`, `stop`, `revert`, `invalid` | none |
//!
//! It also fixes the depth-first pre-order from the entry block that every
//! later analysis uses to visit blocks in a stable order.
//!
//! The CFG implements the traits of [`crate::utils::graph`], so the generic
//! dominator and traversal algorithms run on it directly.
//!
//! # Examples
//!
//! ```rust,ignore
//! use evmopt::{analysis::CfgAnalysis, ir::parse_function};
//!
//! let func = parse_function(source)?;
//! let cfg = CfgAnalysis::build(&func);
//! for block in cfg.dfs_pre_order() {
//!     println!("{} -> {:?}", func.block(*block).label(), cfg.cfg_out(*block));
//! }
//! ```

mod edge;
mod graph;

pub use edge::CfgEdgeKind;
pub use graph::CfgAnalysis;
