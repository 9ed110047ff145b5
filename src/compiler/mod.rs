//! Optimization passes and the machinery that runs them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  PassScheduler            fixpoint over the pipeline          │
//! │    ├─ per function        own AnalysisManager (rayon)         │
//! │    ├─ after a change      Function::verify + invalidate       │
//! │    └─ SchedulerConfig     max_iterations, parallel            │
//! │                                                              │
//! │  Pass trait               name, should_run, run_on_function,  │
//! │                           invalidates                         │
//! │                                                              │
//! │  Passes                                                      │
//! │    ├─ BranchOptimizationPass        (ranges)                  │
//! │    ├─ AssertEliminationPass         (ranges)                  │
//! │    ├─ RedundantLoadEliminationPass  (memory SSA)              │
//! │    └─ DeadStoreEliminationPass      (memory SSA)              │
//! │                                                              │
//! │  EventLog                 lock-free record of every rewrite   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use evmopt::{
//!     compiler::{EventKind, EventLog, PassScheduler, SchedulerConfig},
//!     ir::parse_module,
//! };
//!
//! let mut module = parse_module(
//!     "function f {
//! entry:
//!     %c = add 10, 20
//!     jnz %c, @then, @else
//! then:
//!     stop
//! else:
//!     revert 0, 0
//! }",
//! )?;
//!
//! let events = EventLog::new();
//! let scheduler = PassScheduler::with_default_pipeline(SchedulerConfig::default());
//! scheduler.run_on_module(&mut module, &events)?;
//!
//! assert_eq!(events.count_kind(EventKind::BranchFolded), 1);
//! # Ok::<(), evmopt::Error>(())
//! ```

mod events;
mod pass;
pub mod passes;
mod scheduler;

pub use events::{Event, EventBuilder, EventKind, EventLog};
pub use pass::Pass;
pub use passes::{
    AssertEliminationPass, BranchOptimizationPass, DeadStoreEliminationPass,
    RedundantLoadEliminationPass,
};
pub use scheduler::{PassScheduler, SchedulerConfig};
