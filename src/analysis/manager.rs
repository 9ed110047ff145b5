//! Per-function analysis cache with explicit invalidation.
//!
//! [`AnalysisManager`] builds each analysis on first request and hands out
//! shared [`Rc`] handles until a pass invalidates it. Nothing tracks staleness
//! implicitly: a pass that adds, removes or rewrites instructions must call
//! [`AnalysisManager::invalidate`] for every analysis its change can affect.
//!
//! Invalidation follows the dependencies between analyses:
//!
//! ```text
//! Cfg ──► Dominators ──► MemorySsa(space)
//!  │                        ▲
//!  ├──► MemoryAlias(space) ─┘
//!  └──► Dfg ──► VariableRange
//! ```
//!
//! Invalidating a kind also drops everything downstream of it.

use std::{fmt, rc::Rc};

use rustc_hash::FxHashMap;

use crate::{
    analysis::{
        AnalysisConfig, CfgAnalysis, DfgAnalysis, DominatorTreeAnalysis, MemoryAliasAnalysis, MemorySsa,
        VariableRangeAnalysis,
    },
    ir::{AddrSpace, Function},
};

/// Identifies a cached analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisKind {
    /// [`CfgAnalysis`]
    Cfg,
    /// [`DominatorTreeAnalysis`]
    Dominators,
    /// [`DfgAnalysis`]
    Dfg,
    /// [`MemoryAliasAnalysis`] of one address space
    MemoryAlias(AddrSpace),
    /// [`MemorySsa`] of one address space
    MemorySsa(AddrSpace),
    /// [`VariableRangeAnalysis`]
    VariableRange,
}

impl AnalysisKind {
    /// Kinds that must be dropped together with `self`, including `self`.
    #[must_use]
    pub fn with_dependents(self) -> Vec<AnalysisKind> {
        let mut kinds = vec![self];
        match self {
            AnalysisKind::Cfg => {
                kinds.extend([AnalysisKind::Dominators, AnalysisKind::Dfg, AnalysisKind::VariableRange]);
                for space in AddrSpace::ALL {
                    kinds.push(AnalysisKind::MemoryAlias(space));
                    kinds.push(AnalysisKind::MemorySsa(space));
                }
            }
            AnalysisKind::Dominators => {
                kinds.extend(AddrSpace::ALL.into_iter().map(AnalysisKind::MemorySsa));
            }
            AnalysisKind::Dfg => kinds.push(AnalysisKind::VariableRange),
            AnalysisKind::MemoryAlias(space) => kinds.push(AnalysisKind::MemorySsa(space)),
            AnalysisKind::MemorySsa(_) | AnalysisKind::VariableRange => {}
        }
        kinds
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisKind::Cfg => write!(f, "cfg"),
            AnalysisKind::Dominators => write!(f, "dominators"),
            AnalysisKind::Dfg => write!(f, "dfg"),
            AnalysisKind::MemoryAlias(space) => write!(f, "memory_alias({space})"),
            AnalysisKind::MemorySsa(space) => write!(f, "memory_ssa({space})"),
            AnalysisKind::VariableRange => write!(f, "variable_range"),
        }
    }
}

/// Get-or-build cache of the analyses of one function.
///
/// The manager does not own the function; every accessor takes it so that
/// missing analyses can be built. Passing a different function than the one
/// the cache was filled from is a logic error.
#[derive(Debug, Default)]
pub struct AnalysisManager {
    config: AnalysisConfig,
    cfg: Option<Rc<CfgAnalysis>>,
    dominators: Option<Rc<DominatorTreeAnalysis>>,
    dfg: Option<Rc<DfgAnalysis>>,
    alias: FxHashMap<AddrSpace, Rc<MemoryAliasAnalysis>>,
    memory_ssa: FxHashMap<AddrSpace, Rc<MemorySsa>>,
    ranges: Option<Rc<VariableRangeAnalysis>>,
    builds: usize,
}

impl AnalysisManager {
    /// Creates an empty manager with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty manager that builds analyses with `config`.
    #[must_use]
    pub fn with_config(config: AnalysisConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The configuration analyses are built with.
    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Number of analyses built so far, across invalidations.
    #[must_use]
    pub fn build_count(&self) -> usize {
        self.builds
    }

    /// The control flow graph.
    ///
    /// # Panics
    ///
    /// Panics if `function` is malformed (see [`CfgAnalysis::build`]).
    pub fn cfg(&mut self, function: &Function) -> Rc<CfgAnalysis> {
        if let Some(cfg) = &self.cfg {
            return Rc::clone(cfg);
        }
        let cfg = Rc::new(CfgAnalysis::build(function));
        self.record_build(AnalysisKind::Cfg, function);
        self.cfg = Some(Rc::clone(&cfg));
        cfg
    }

    /// The dominator tree and dominance frontiers.
    pub fn dominators(&mut self, function: &Function) -> Rc<DominatorTreeAnalysis> {
        if let Some(dominators) = &self.dominators {
            return Rc::clone(dominators);
        }
        let cfg = self.cfg(function);
        let dominators = Rc::new(DominatorTreeAnalysis::build(&cfg));
        self.record_build(AnalysisKind::Dominators, function);
        self.dominators = Some(Rc::clone(&dominators));
        dominators
    }

    /// The def-use index.
    pub fn dfg(&mut self, function: &Function) -> Rc<DfgAnalysis> {
        if let Some(dfg) = &self.dfg {
            return Rc::clone(dfg);
        }
        let dfg = Rc::new(DfgAnalysis::build(function));
        self.record_build(AnalysisKind::Dfg, function);
        self.dfg = Some(Rc::clone(&dfg));
        dfg
    }

    /// The alias analysis of `space`, seeded with the function's locations.
    pub fn memory_alias(&mut self, function: &Function, space: AddrSpace) -> Rc<MemoryAliasAnalysis> {
        if let Some(alias) = self.alias.get(&space) {
            return Rc::clone(alias);
        }
        let alias = Rc::new(MemoryAliasAnalysis::build(function, space));
        self.record_build(AnalysisKind::MemoryAlias(space), function);
        self.alias.insert(space, Rc::clone(&alias));
        alias
    }

    /// Memory SSA of `space`.
    pub fn memory_ssa(&mut self, function: &Function, space: AddrSpace) -> Rc<MemorySsa> {
        if let Some(mem_ssa) = self.memory_ssa.get(&space) {
            return Rc::clone(mem_ssa);
        }
        let cfg = self.cfg(function);
        let dominators = self.dominators(function);
        let alias = self.memory_alias(function, space);
        let mem_ssa = Rc::new(MemorySsa::build(function, &cfg, &dominators, alias));
        self.record_build(AnalysisKind::MemorySsa(space), function);
        self.memory_ssa.insert(space, Rc::clone(&mem_ssa));
        mem_ssa
    }

    /// Mutable access to the cached Memory SSA of `space`, for volatility marking.
    ///
    /// Handles given out earlier keep seeing the unmodified graph.
    pub fn memory_ssa_mut(&mut self, function: &Function, space: AddrSpace) -> &mut MemorySsa {
        let built = self.memory_ssa(function, space);
        // `built` is dropped on the occupied path, leaving the cache as the only owner
        let entry = self.memory_ssa.entry(space).or_insert(built);
        Rc::make_mut(entry)
    }

    /// Variable ranges.
    pub fn variable_ranges(&mut self, function: &Function) -> Rc<VariableRangeAnalysis> {
        if let Some(ranges) = &self.ranges {
            return Rc::clone(ranges);
        }
        let cfg = self.cfg(function);
        let dfg = self.dfg(function);
        let ranges = Rc::new(VariableRangeAnalysis::build(function, &cfg, &dfg, &self.config));
        self.record_build(AnalysisKind::VariableRange, function);
        self.ranges = Some(Rc::clone(&ranges));
        ranges
    }

    /// Returns `true` if `kind` is currently cached.
    #[must_use]
    pub fn is_cached(&self, kind: AnalysisKind) -> bool {
        match kind {
            AnalysisKind::Cfg => self.cfg.is_some(),
            AnalysisKind::Dominators => self.dominators.is_some(),
            AnalysisKind::Dfg => self.dfg.is_some(),
            AnalysisKind::MemoryAlias(space) => self.alias.contains_key(&space),
            AnalysisKind::MemorySsa(space) => self.memory_ssa.contains_key(&space),
            AnalysisKind::VariableRange => self.ranges.is_some(),
        }
    }

    /// Drops `kind` and everything that depends on it.
    ///
    /// Returns the kinds that were actually cached and are now gone.
    pub fn invalidate(&mut self, kind: AnalysisKind) -> Vec<AnalysisKind> {
        let dropped: Vec<AnalysisKind> = kind
            .with_dependents()
            .into_iter()
            .filter(|dependent| self.drop_one(*dependent))
            .collect();
        if !dropped.is_empty() {
            log::debug!("invalidated {kind}: dropped {} cached analyses", dropped.len());
        }
        dropped
    }

    /// Drops every cached analysis.
    pub fn invalidate_all(&mut self) {
        self.invalidate(AnalysisKind::Cfg);
    }

    fn drop_one(&mut self, kind: AnalysisKind) -> bool {
        match kind {
            AnalysisKind::Cfg => self.cfg.take().is_some(),
            AnalysisKind::Dominators => self.dominators.take().is_some(),
            AnalysisKind::Dfg => self.dfg.take().is_some(),
            AnalysisKind::MemoryAlias(space) => self.alias.remove(&space).is_some(),
            AnalysisKind::MemorySsa(space) => self.memory_ssa.remove(&space).is_some(),
            AnalysisKind::VariableRange => self.ranges.take().is_some(),
        }
    }

    fn record_build(&mut self, kind: AnalysisKind, function: &Function) {
        self.builds += 1;
        log::trace!("built {kind} for '{}'", function.name());
    }
}
