//! The interface every optimization pass implements.

use crate::{
    analysis::{AnalysisKind, AnalysisManager},
    compiler::EventLog,
    ir::Function,
    Result,
};

/// A transformation over one function.
///
/// Passes must be thread-safe (`Send + Sync`) so the scheduler can run one
/// pass instance over several functions in parallel. Each function brings
/// its own [`AnalysisManager`]; a pass asks it for the analyses it needs and
/// never invalidates them itself. After a pass reports a change, the
/// scheduler drops everything listed in [`Pass::invalidates`].
pub trait Pass: Send + Sync {
    /// Unique name for logging and events.
    fn name(&self) -> &'static str;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Should this pass run on `function`?
    ///
    /// Override to skip functions the pass cannot improve, for example
    /// functions without any instruction the pass rewrites.
    fn should_run(&self, _function: &Function) -> bool {
        true
    }

    /// Runs the pass on a single function.
    ///
    /// Returns `true` if the function changed. Every individual rewrite
    /// should be recorded in `events`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass cannot complete its transformation.
    fn run_on_function(
        &self,
        function: &mut Function,
        analyses: &mut AnalysisManager,
        events: &EventLog,
    ) -> Result<bool>;

    /// Analyses made stale when this pass changes a function.
    ///
    /// Dependents are dropped along with each listed kind. The default
    /// drops everything.
    fn invalidates(&self) -> Vec<AnalysisKind> {
        vec![AnalysisKind::Cfg]
    }
}
