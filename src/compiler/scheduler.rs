//! Pass scheduler for running a pipeline to a fixpoint.
//!
//! The [`PassScheduler`] runs its passes in order over a function, drops the
//! analyses a changing pass made stale, and repeats the whole pipeline until
//! one round changes nothing or the iteration limit is reached. Functions of
//! a module are independent, so with [`SchedulerConfig::parallel`] set they
//! are processed on the rayon thread pool, each with its own
//! [`AnalysisManager`].

use rayon::prelude::*;

use crate::{
    analysis::{AnalysisConfig, AnalysisManager},
    compiler::{
        passes::{
            AssertEliminationPass, BranchOptimizationPass, DeadStoreEliminationPass,
            RedundantLoadEliminationPass,
        },
        EventKind, EventLog, Pass,
    },
    ir::{Function, Module},
    Error, Result,
};

/// Limits and execution mode of a [`PassScheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum rounds of the whole pipeline per function.
    pub max_iterations: usize,
    /// Process the functions of a module in parallel.
    pub parallel: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 16,
            parallel: true,
        }
    }
}

impl SchedulerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the round limit.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Enables or disables parallel processing of functions.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Runs a sequence of passes to a fixpoint.
pub struct PassScheduler {
    config: SchedulerConfig,
    analysis_config: AnalysisConfig,
    passes: Vec<Box<dyn Pass>>,
}

impl Default for PassScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl PassScheduler {
    /// Creates a scheduler with an empty pipeline.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            analysis_config: AnalysisConfig::default(),
            passes: Vec::new(),
        }
    }

    /// Creates a scheduler running the built-in passes: branch folding,
    /// assert elimination, redundant load elimination and dead store
    /// elimination, in that order.
    #[must_use]
    pub fn with_default_pipeline(config: SchedulerConfig) -> Self {
        let mut scheduler = Self::new(config);
        scheduler.add_pass(BranchOptimizationPass::new());
        scheduler.add_pass(AssertEliminationPass::new());
        scheduler.add_pass(RedundantLoadEliminationPass::new());
        scheduler.add_pass(DeadStoreEliminationPass::new());
        scheduler
    }

    /// Sets the configuration every per-function [`AnalysisManager`] is created with.
    #[must_use]
    pub fn with_analysis_config(mut self, config: AnalysisConfig) -> Self {
        self.analysis_config = config;
        self
    }

    /// Appends a pass to the pipeline.
    pub fn add_pass(&mut self, pass: impl Pass + 'static) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// The scheduler configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Names of the passes in pipeline order.
    #[must_use]
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Runs the pipeline over every function of `module`.
    ///
    /// Returns the largest number of rounds any function needed.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by a pass, or [`Error::PassFailed`]
    /// if a pass left a function malformed.
    pub fn run_on_module(&self, module: &mut Module, events: &EventLog) -> Result<usize> {
        let rounds: Vec<usize> = if self.config.parallel {
            module
                .functions
                .par_iter_mut()
                .map(|function| self.run_on_function(function, events))
                .collect::<Result<_>>()?
        } else {
            module
                .functions
                .iter_mut()
                .map(|function| self.run_on_function(function, events))
                .collect::<Result<_>>()?
        };
        Ok(rounds.into_iter().max().unwrap_or(0))
    }

    /// Runs the pipeline over one function until a round changes nothing.
    ///
    /// Returns the number of rounds run, including the final unchanged one.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by a pass, or [`Error::PassFailed`]
    /// if a pass left the function malformed.
    pub fn run_on_function(&self, function: &mut Function, events: &EventLog) -> Result<usize> {
        let mut analyses = AnalysisManager::with_config(self.analysis_config.clone());
        let mut rounds = 0;

        while rounds < self.config.max_iterations {
            rounds += 1;
            let mut changed = false;
            for pass in &self.passes {
                if self.run_pass(pass.as_ref(), function, &mut analyses, events)? {
                    changed = true;
                }
            }
            if !changed {
                log::debug!("'{}' stable after {rounds} rounds", function.name());
                return Ok(rounds);
            }
        }

        log::warn!(
            "'{}' still changing after {} rounds, giving up",
            function.name(),
            self.config.max_iterations
        );
        Ok(rounds)
    }

    fn run_pass(
        &self,
        pass: &dyn Pass,
        function: &mut Function,
        analyses: &mut AnalysisManager,
        events: &EventLog,
    ) -> Result<bool> {
        if !pass.should_run(function) {
            return Ok(false);
        }

        let changed = pass.run_on_function(function, analyses, events)?;
        if changed {
            function.verify().map_err(|err| Error::PassFailed {
                pass: pass.name().to_string(),
                message: err.to_string(),
            })?;
            for kind in pass.invalidates() {
                for dropped in analyses.invalidate(kind) {
                    events
                        .record(EventKind::AnalysisInvalidated)
                        .function(function.name())
                        .pass(pass.name())
                        .message(dropped.to_string());
                }
            }
        }

        events
            .record(EventKind::PassCompleted)
            .function(function.name())
            .pass(pass.name())
            .message(if changed { "changed" } else { "unchanged" });
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        analysis::AnalysisKind,
        ir::{parse_function, parse_module, Opcode},
    };

    /// Rewrites the first `nop` it finds into `assert 1`, once per call.
    struct NopToAssert;

    impl Pass for NopToAssert {
        fn name(&self) -> &'static str {
            "nop-to-assert"
        }

        fn run_on_function(
            &self,
            function: &mut Function,
            _analyses: &mut AnalysisManager,
            _events: &EventLog,
        ) -> Result<bool> {
            let nop = function
                .instructions()
                .find(|(_, inst)| inst.opcode() == Opcode::Nop)
                .map(|(_, inst)| inst.id());
            Ok(match nop {
                Some(id) => {
                    function.replace_instruction(id, Opcode::Assert, vec![crate::ir::Operand::literal(1u64)])
                }
                None => false,
            })
        }

        fn invalidates(&self) -> Vec<AnalysisKind> {
            vec![AnalysisKind::Dfg]
        }
    }

    struct Counting(AtomicUsize);

    impl Pass for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn run_on_function(
            &self,
            _function: &mut Function,
            _analyses: &mut AnalysisManager,
            _events: &EventLog,
        ) -> Result<bool> {
            self.0.fetch_add(1, Ordering::Relaxed);
            Ok(true)
        }
    }

    struct Breaker;

    impl Pass for Breaker {
        fn name(&self) -> &'static str {
            "breaker"
        }

        fn run_on_function(
            &self,
            function: &mut Function,
            _analyses: &mut AnalysisManager,
            _events: &EventLog,
        ) -> Result<bool> {
            let terminator = function.block(function.entry()).terminator().map(|inst| inst.id());
            Ok(terminator.is_some_and(|id| function.remove_instruction(id).is_some()))
        }
    }

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_iterations, 16);
        assert!(config.parallel);
        let config = SchedulerConfig::new().with_max_iterations(3).with_parallel(false);
        assert_eq!(config.max_iterations, 3);
        assert!(!config.parallel);
    }

    #[test]
    fn test_default_pipeline_order() {
        let scheduler = PassScheduler::with_default_pipeline(SchedulerConfig::default());
        assert_eq!(
            scheduler.pass_names(),
            vec![
                "branch-optimization",
                "assert-elimination",
                "redundant-load-elimination",
                "dead-store-elimination"
            ]
        );
    }

    #[test]
    fn test_runs_to_fixpoint() {
        let mut func =
            parse_function("function f {\nentry:\n    nop\n    nop\n    stop\n}").unwrap();
        let mut scheduler = PassScheduler::default();
        scheduler.add_pass(NopToAssert);
        let events = EventLog::new();

        let rounds = scheduler.run_on_function(&mut func, &events).unwrap();
        assert_eq!(rounds, 3);
        assert!(func.instructions().all(|(_, inst)| inst.opcode() != Opcode::Nop));
        assert_eq!(events.count_kind(EventKind::PassCompleted), 3);
    }

    #[test]
    fn test_iteration_limit() {
        let mut func = parse_function("function f {\nentry:\n    stop\n}").unwrap();
        let mut scheduler = PassScheduler::new(SchedulerConfig::new().with_max_iterations(4));
        let counting = Counting(AtomicUsize::new(0));
        scheduler.add_pass(counting);

        let rounds = scheduler.run_on_function(&mut func, &EventLog::new()).unwrap();
        assert_eq!(rounds, 4);
    }

    #[test]
    fn test_malformed_result_is_reported() {
        let mut func = parse_function("function f {\nentry:\n    stop\n}").unwrap();
        let mut scheduler = PassScheduler::default();
        scheduler.add_pass(Breaker);

        let err = scheduler.run_on_function(&mut func, &EventLog::new()).unwrap_err();
        assert!(matches!(err, Error::PassFailed { ref pass, .. } if pass == "breaker"));
    }

    #[test]
    fn test_module_sequential_and_parallel_agree() {
        let source = "function a {\nentry:\n    nop\n    stop\n}\n\nfunction b {\nentry:\n    nop\n    nop\n    stop\n}";
        for parallel in [false, true] {
            let mut module = parse_module(source).unwrap();
            let mut scheduler = PassScheduler::new(SchedulerConfig::new().with_parallel(parallel));
            scheduler.add_pass(NopToAssert);
            let events = EventLog::new();

            let rounds = scheduler.run_on_module(&mut module, &events).unwrap();
            assert_eq!(rounds, 3);
            assert_eq!(events.filter_function("a").count(), 2);
            assert_eq!(events.filter_function("b").count(), 3);
        }
    }
}
