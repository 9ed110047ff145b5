//! May-alias decisions between abstract memory locations.
//!
//! [`locations_may_alias`] is the pure decision procedure. [`MemoryAliasAnalysis`]
//! wraps it with a symmetric per-function cache of alias sets, seeded from
//! every location the function touches in one address space.

use std::cell::RefCell;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ir::{read_location, write_location, AddrSpace, Function, MemoryLocation};

/// Alias analysis result for a pair of memory locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasResult {
    /// The locations definitely do not alias.
    NoAlias,
    /// The locations may alias (conservative).
    MayAlias,
    /// The locations definitely alias (same fixed region).
    MustAlias,
}

/// Decides whether two locations may overlap.
///
/// Never returns a false negative:
///
/// 1. Locations in different address spaces never alias.
/// 2. A zero-sized location aliases nothing.
/// 3. Two fully fixed locations alias iff their half-open ranges overlap.
/// 4. With both offsets fixed but one size unknown, they alias unless the
///    fixed-size location ends at or before the other one starts.
/// 5. Anything involving an unknown offset is assumed to alias.
#[must_use]
pub fn locations_may_alias(a: &MemoryLocation, b: &MemoryLocation) -> bool {
    if a.space() != b.space() {
        return false;
    }
    if a.is_empty() || b.is_empty() {
        return false;
    }
    match (a.offset(), a.end(), b.offset(), b.end()) {
        (Some(start_a), Some(end_a), Some(start_b), Some(end_b)) => {
            start_a < end_b && start_b < end_a
        }
        (Some(_), Some(end_a), Some(start_b), None) => end_a > start_b,
        (Some(start_a), None, Some(_), Some(end_b)) => end_b > start_a,
        _ => true,
    }
}

/// Returns `true` if both locations are the same fixed region.
#[must_use]
pub fn locations_must_alias(a: &MemoryLocation, b: &MemoryLocation) -> bool {
    a.space() == b.space()
        && a.is_fixed()
        && !a.is_empty()
        && a.offset() == b.offset()
        && a.size() == b.size()
}

/// Classifies the relation between two locations.
#[must_use]
pub fn analyze_alias(a: &MemoryLocation, b: &MemoryLocation) -> AliasResult {
    if locations_must_alias(a, b) {
        AliasResult::MustAlias
    } else if locations_may_alias(a, b) {
        AliasResult::MayAlias
    } else {
        AliasResult::NoAlias
    }
}

/// Cached may-alias queries for one function and address space.
///
/// Every location seen is "analyzed" once against all previously analyzed
/// ones, and the aliasing pairs are recorded in both directions. Queries
/// involving a volatile location skip the cache and are decided afresh.
#[derive(Debug, Clone)]
pub struct MemoryAliasAnalysis {
    space: AddrSpace,
    cache: RefCell<AliasCache>,
}

#[derive(Debug, Clone, Default)]
struct AliasCache {
    analyzed: Vec<MemoryLocation>,
    alias_sets: FxHashMap<MemoryLocation, FxHashSet<MemoryLocation>>,
}

impl AliasCache {
    fn analyze(&mut self, loc: MemoryLocation) {
        if self.alias_sets.contains_key(&loc) {
            return;
        }
        let mut set = FxHashSet::default();
        for other in &self.analyzed {
            if locations_may_alias(&loc, other) {
                set.insert(*other);
                if let Some(other_set) = self.alias_sets.get_mut(other) {
                    other_set.insert(loc);
                }
            }
        }
        if locations_may_alias(&loc, &loc) {
            set.insert(loc);
        }
        self.alias_sets.insert(loc, set);
        self.analyzed.push(loc);
    }
}

impl MemoryAliasAnalysis {
    /// Creates an analysis with an empty cache.
    #[must_use]
    pub fn new(space: AddrSpace) -> Self {
        MemoryAliasAnalysis {
            space,
            cache: RefCell::new(AliasCache::default()),
        }
    }

    /// Seeds the cache with every location `function` reads or writes in `space`.
    #[must_use]
    pub fn build(function: &Function, space: AddrSpace) -> Self {
        let analysis = Self::new(space);
        {
            let mut cache = analysis.cache.borrow_mut();
            for (_, inst) in function.instructions() {
                for loc in [read_location(inst, space), write_location(inst, space)] {
                    if !loc.is_empty() {
                        cache.analyze(loc);
                    }
                }
            }
            log::trace!(
                "alias analysis of '{}' ({space}): {} locations",
                function.name(),
                cache.analyzed.len()
            );
        }
        analysis
    }

    /// The address space this analysis covers.
    #[must_use]
    pub fn space(&self) -> AddrSpace {
        self.space
    }

    /// Returns `true` unless `a` and `b` provably do not overlap.
    #[must_use]
    pub fn may_alias(&self, a: &MemoryLocation, b: &MemoryLocation) -> bool {
        if a.is_volatile() || b.is_volatile() {
            return locations_may_alias(a, b);
        }
        let mut cache = self.cache.borrow_mut();
        cache.analyze(*a);
        cache.analyze(*b);
        cache
            .alias_sets
            .get(a)
            .is_some_and(|set| set.contains(b))
    }

    /// Returns a volatile copy of `loc`.
    ///
    /// The copy aliases exactly what `loc` aliases, but queries involving it
    /// are never answered from the cache. Use it for locations whose effect
    /// cannot be modeled precisely, such as buffers handed to external calls.
    #[must_use]
    pub fn mark_volatile(&self, loc: &MemoryLocation) -> MemoryLocation {
        loc.with_volatile(true)
    }

    /// Number of distinct locations analyzed so far.
    #[must_use]
    pub fn location_count(&self) -> usize {
        self.cache.borrow().analyzed.len()
    }
}

#[cfg(test)]
mod tests {
    use primitive_types::U256;

    use super::*;
    use crate::ir::parse_function;

    fn mem(offset: Option<u64>, size: Option<u64>) -> MemoryLocation {
        MemoryLocation::new(AddrSpace::Memory, offset.map(U256::from), size.map(U256::from))
    }

    #[test]
    fn test_fixed_ranges() {
        assert!(locations_may_alias(&mem(Some(0), Some(32)), &mem(Some(16), Some(32))));
        assert!(!locations_may_alias(&mem(Some(0), Some(32)), &mem(Some(32), Some(32))));
        assert!(locations_must_alias(&mem(Some(64), Some(32)), &mem(Some(64), Some(32))));
    }

    #[test]
    fn test_zero_size_never_aliases() {
        assert!(!locations_may_alias(&mem(Some(5), Some(0)), &mem(Some(0), Some(10))));
        assert!(!locations_may_alias(&mem(None, Some(0)), &mem(None, None)));
    }

    #[test]
    fn test_one_unknown_size() {
        // Fixed region ends before the unbounded one starts
        assert!(!locations_may_alias(&mem(Some(0), Some(32)), &mem(Some(32), None)));
        assert!(locations_may_alias(&mem(Some(0), Some(33)), &mem(Some(32), None)));
        // Unbounded region starting earlier may reach the fixed one
        assert!(locations_may_alias(&mem(Some(0), None), &mem(Some(64), Some(32))));
        assert!(!locations_may_alias(&mem(Some(96), None), &mem(Some(64), Some(32))));
    }

    #[test]
    fn test_unknown_offset_aliases() {
        assert!(locations_may_alias(&mem(None, Some(32)), &mem(Some(1000), Some(32))));
        assert_eq!(
            analyze_alias(&mem(None, Some(32)), &mem(Some(0), Some(32))),
            AliasResult::MayAlias
        );
    }

    #[test]
    fn test_spaces_are_disjoint() {
        let slot = MemoryLocation::fixed(AddrSpace::Storage, U256::zero(), U256::one());
        let word = MemoryLocation::fixed(AddrSpace::Memory, U256::zero(), U256::from(32));
        assert_eq!(analyze_alias(&slot, &word), AliasResult::NoAlias);
    }

    #[test]
    fn test_cache_is_symmetric() {
        let func = parse_function(
            "function f {\nentry:\n    mstore 0, 1\n    mstore 16, 2\n    %x = mload 64\n    stop\n}",
        )
        .unwrap();
        let alias = MemoryAliasAnalysis::build(&func, AddrSpace::Memory);
        assert_eq!(alias.location_count(), 3);

        let a = mem(Some(0), Some(32));
        let b = mem(Some(16), Some(32));
        let c = mem(Some(64), Some(32));
        assert!(alias.may_alias(&a, &b));
        assert!(alias.may_alias(&b, &a));
        assert!(!alias.may_alias(&a, &c));
        assert!(!alias.may_alias(&c, &a));

        // A location not in the function is analyzed on demand
        let d = mem(Some(60), Some(8));
        assert!(alias.may_alias(&d, &c));
        assert_eq!(alias.location_count(), 4);
    }

    #[test]
    fn test_volatile_keeps_aliasing_and_skips_cache() {
        let alias = MemoryAliasAnalysis::new(AddrSpace::Memory);
        let a = mem(Some(0), Some(32));
        let b = mem(Some(16), Some(32));
        let c = mem(Some(64), Some(32));
        let volatile = alias.mark_volatile(&a);

        assert!(volatile.is_volatile());
        assert!(alias.may_alias(&volatile, &b));
        assert!(!alias.may_alias(&volatile, &c));
        assert_eq!(alias.location_count(), 0);
    }
}
