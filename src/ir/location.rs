//! Abstract memory locations and their derivation from instructions.
//!
//! A [`MemoryLocation`] names the region an instruction reads or writes within
//! one [`AddrSpace`]. Offsets and sizes are only known when the corresponding
//! operand is a literal; anything computed at runtime becomes "unknown", which
//! alias analysis treats conservatively.

use std::fmt;

use primitive_types::U256;

use crate::ir::{Effects, Instruction, Opcode, Operand};

/// The independent address spaces tracked by memory analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddrSpace {
    /// Byte-addressed scratch memory
    Memory,
    /// Slot-addressed persistent storage
    Storage,
    /// Slot-addressed transient storage
    Transient,
}

impl AddrSpace {
    /// Every address space, in a fixed order.
    pub const ALL: [AddrSpace; 3] = [AddrSpace::Memory, AddrSpace::Storage, AddrSpace::Transient];

    /// The effect flag that marks an access to this space.
    #[must_use]
    pub fn effect(self) -> Effects {
        match self {
            AddrSpace::Memory => Effects::MEMORY,
            AddrSpace::Storage => Effects::STORAGE,
            AddrSpace::Transient => Effects::TRANSIENT,
        }
    }

    /// Read effects that observe this space.
    ///
    /// `msize` reports the highest memory offset touched so far, so it
    /// observes every memory write.
    #[must_use]
    pub fn observing_effects(self) -> Effects {
        match self {
            AddrSpace::Memory => Effects::MEMORY | Effects::MSIZE,
            AddrSpace::Storage | AddrSpace::Transient => self.effect(),
        }
    }

    /// Size of the unit accessed by a single load or store.
    #[must_use]
    pub fn word_size(self) -> U256 {
        match self {
            AddrSpace::Memory => U256::from(32),
            AddrSpace::Storage | AddrSpace::Transient => U256::one(),
        }
    }
}

impl fmt::Display for AddrSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddrSpace::Memory => "memory",
            AddrSpace::Storage => "storage",
            AddrSpace::Transient => "transient",
        };
        f.write_str(name)
    }
}

/// A region within an address space.
///
/// `offset` and `size` are `None` when unknown at compile time. A volatile
/// location is one whose aliasing may not be cached; see
/// [`MemoryAliasAnalysis::mark_volatile`](crate::analysis::MemoryAliasAnalysis::mark_volatile).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryLocation {
    space: AddrSpace,
    offset: Option<U256>,
    size: Option<U256>,
    volatile: bool,
}

impl MemoryLocation {
    /// Creates a location from optional offset and size.
    #[must_use]
    pub fn new(space: AddrSpace, offset: Option<U256>, size: Option<U256>) -> Self {
        MemoryLocation {
            space,
            offset,
            size,
            volatile: false,
        }
    }

    /// A location with known offset and size.
    #[must_use]
    pub fn fixed(space: AddrSpace, offset: U256, size: U256) -> Self {
        Self::new(space, Some(offset), Some(size))
    }

    /// A location of unknown offset and size: may overlap anything in `space`.
    #[must_use]
    pub fn undefined(space: AddrSpace) -> Self {
        Self::new(space, None, None)
    }

    /// The zero-sized location, which overlaps nothing.
    #[must_use]
    pub fn empty(space: AddrSpace) -> Self {
        Self::new(space, Some(U256::zero()), Some(U256::zero()))
    }

    /// The address space.
    #[must_use]
    pub fn space(&self) -> AddrSpace {
        self.space
    }

    /// The offset, if known.
    #[must_use]
    pub fn offset(&self) -> Option<U256> {
        self.offset
    }

    /// The size, if known.
    #[must_use]
    pub fn size(&self) -> Option<U256> {
        self.size
    }

    /// Whether aliasing queries involving this location bypass the cache.
    #[must_use]
    pub fn is_volatile(&self) -> bool {
        self.volatile
    }

    /// Returns a copy with the volatility flag set.
    #[must_use]
    pub fn with_volatile(mut self, volatile: bool) -> Self {
        self.volatile = volatile;
        self
    }

    /// Offset and size both known.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.offset.is_some() && self.size.is_some()
    }

    /// Size known to be zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == Some(U256::zero())
    }

    /// Exclusive end of a fixed-size region, saturating at the top of the space.
    #[must_use]
    pub fn end(&self) -> Option<U256> {
        Some(self.offset?.saturating_add(self.size?))
    }

    /// Returns `true` if every byte of `other` provably lies inside `self`.
    ///
    /// The empty region is contained in everything. Otherwise both locations
    /// must be in the same space and fully fixed.
    #[must_use]
    pub fn completely_contains(&self, other: &MemoryLocation) -> bool {
        if other.is_empty() {
            return true;
        }
        if self.space != other.space || !self.is_fixed() || !other.is_fixed() {
            return false;
        }
        match (self.offset, self.end(), other.offset, other.end()) {
            (Some(start), Some(end), Some(other_start), Some(other_end)) => {
                start <= other_start && end >= other_end
            }
            _ => false,
        }
    }
}

impl fmt::Display for MemoryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let offset = self.offset.map_or("?".to_string(), |o| o.to_string());
        let size = self.size.map_or("?".to_string(), |s| s.to_string());
        write!(f, "{}[{offset}; {size}]", self.space)?;
        if self.volatile {
            write!(f, " volatile")?;
        }
        Ok(())
    }
}

/// The region `inst` may write in `space`, or the empty location if it writes nothing there.
#[must_use]
pub fn write_location(inst: &Instruction, space: AddrSpace) -> MemoryLocation {
    if !inst.write_effects().intersects(space.effect()) {
        return MemoryLocation::empty(space);
    }
    let ops = inst.operands();
    match (space, inst.opcode()) {
        (AddrSpace::Memory, Opcode::Mstore) => sized(space, ops.first(), Some(space.word_size())),
        (
            AddrSpace::Memory,
            Opcode::Mcopy | Opcode::Calldatacopy | Opcode::Codecopy | Opcode::Returndatacopy,
        ) => region(space, ops.first(), ops.get(2)),
        (AddrSpace::Memory, Opcode::Extcodecopy) => region(space, ops.get(1), ops.get(3)),
        (AddrSpace::Memory, Opcode::Call) => region(space, ops.get(5), ops.get(6)),
        (AddrSpace::Memory, Opcode::Staticcall | Opcode::Delegatecall) => {
            region(space, ops.get(4), ops.get(5))
        }
        (AddrSpace::Storage, Opcode::Sstore) | (AddrSpace::Transient, Opcode::Tstore) => {
            sized(space, ops.first(), Some(space.word_size()))
        }
        _ => MemoryLocation::undefined(space),
    }
}

/// The region `inst` may read in `space`, or the empty location if it reads nothing there.
#[must_use]
pub fn read_location(inst: &Instruction, space: AddrSpace) -> MemoryLocation {
    if !inst.read_effects().intersects(space.observing_effects()) {
        return MemoryLocation::empty(space);
    }
    let ops = inst.operands();
    match (space, inst.opcode()) {
        (AddrSpace::Memory, Opcode::Mload) => sized(space, ops.first(), Some(space.word_size())),
        (AddrSpace::Memory, Opcode::Mcopy) => region(space, ops.get(1), ops.get(2)),
        (AddrSpace::Memory, Opcode::Return | Opcode::Revert | Opcode::Sha3 | Opcode::Log) => {
            region(space, ops.first(), ops.get(1))
        }
        (AddrSpace::Memory, Opcode::Call) => region(space, ops.get(3), ops.get(4)),
        (AddrSpace::Memory, Opcode::Staticcall | Opcode::Delegatecall) => {
            region(space, ops.get(2), ops.get(3))
        }
        (AddrSpace::Memory, Opcode::Create | Opcode::Create2) => {
            region(space, ops.get(1), ops.get(2))
        }
        (AddrSpace::Storage, Opcode::Sload) | (AddrSpace::Transient, Opcode::Tload) => {
            sized(space, ops.first(), Some(space.word_size()))
        }
        _ => MemoryLocation::undefined(space),
    }
}

fn region(space: AddrSpace, offset: Option<&Operand>, size: Option<&Operand>) -> MemoryLocation {
    sized(space, offset, size.and_then(Operand::as_literal))
}

fn sized(space: AddrSpace, offset: Option<&Operand>, size: Option<U256>) -> MemoryLocation {
    if size == Some(U256::zero()) {
        return MemoryLocation::empty(space);
    }
    MemoryLocation::new(space, offset.and_then(Operand::as_literal), size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Variable;

    fn inst(opcode: Opcode, operands: Vec<Operand>) -> Instruction {
        let output = opcode.produces_output().then(|| Variable::new("out"));
        Instruction::new(opcode, operands, output)
    }

    #[test]
    fn test_mstore_and_mload_locations() {
        let store = inst(Opcode::Mstore, vec![Operand::literal(64u64), Operand::var("v")]);
        let load = inst(Opcode::Mload, vec![Operand::literal(64u64)]);
        let expected = MemoryLocation::fixed(AddrSpace::Memory, U256::from(64), U256::from(32));
        assert_eq!(write_location(&store, AddrSpace::Memory), expected);
        assert_eq!(read_location(&load, AddrSpace::Memory), expected);
        assert!(read_location(&store, AddrSpace::Memory).is_empty());
        assert!(write_location(&store, AddrSpace::Storage).is_empty());
    }

    #[test]
    fn test_variable_offset_is_unknown() {
        let load = inst(Opcode::Mload, vec![Operand::var("p")]);
        let loc = read_location(&load, AddrSpace::Memory);
        assert_eq!(loc.offset(), None);
        assert_eq!(loc.size(), Some(U256::from(32)));
        assert!(!loc.is_fixed());
    }

    #[test]
    fn test_copy_and_call_regions() {
        let copy = inst(
            Opcode::Mcopy,
            vec![Operand::literal(0u64), Operand::literal(128u64), Operand::literal(64u64)],
        );
        assert_eq!(
            write_location(&copy, AddrSpace::Memory),
            MemoryLocation::fixed(AddrSpace::Memory, U256::zero(), U256::from(64))
        );
        assert_eq!(
            read_location(&copy, AddrSpace::Memory),
            MemoryLocation::fixed(AddrSpace::Memory, U256::from(128), U256::from(64))
        );

        let call = inst(
            Opcode::Call,
            [0u64, 1, 0, 0, 0, 32, 32].into_iter().map(Operand::literal).collect(),
        );
        assert_eq!(
            write_location(&call, AddrSpace::Memory),
            MemoryLocation::fixed(AddrSpace::Memory, U256::from(32), U256::from(32))
        );
        assert_eq!(
            write_location(&call, AddrSpace::Storage),
            MemoryLocation::undefined(AddrSpace::Storage)
        );
    }

    #[test]
    fn test_storage_slots_are_unit_sized() {
        let store = inst(Opcode::Sstore, vec![Operand::literal(3u64), Operand::var("v")]);
        assert_eq!(
            write_location(&store, AddrSpace::Storage),
            MemoryLocation::fixed(AddrSpace::Storage, U256::from(3), U256::one())
        );
    }

    #[test]
    fn test_completely_contains() {
        let big = MemoryLocation::fixed(AddrSpace::Memory, U256::zero(), U256::from(64));
        let small = MemoryLocation::fixed(AddrSpace::Memory, U256::from(32), U256::from(32));
        let straddle = MemoryLocation::fixed(AddrSpace::Memory, U256::from(48), U256::from(32));
        assert!(big.completely_contains(&small));
        assert!(!small.completely_contains(&big));
        assert!(!big.completely_contains(&straddle));
        assert!(small.completely_contains(&MemoryLocation::empty(AddrSpace::Memory)));
        assert!(!big.completely_contains(&MemoryLocation::undefined(AddrSpace::Memory)));
    }

    #[test]
    fn test_msize_reads_all_of_memory() {
        let msize = inst(Opcode::Msize, Vec::new());
        assert_eq!(
            read_location(&msize, AddrSpace::Memory),
            MemoryLocation::undefined(AddrSpace::Memory)
        );
        assert!(read_location(&msize, AddrSpace::Storage).is_empty());
    }
}
