//! Read and write effect sets.
//!
//! Every [`Opcode`](crate::ir::Opcode) declares which pieces of machine state it
//! reads and which it writes. Analyses never inspect mnemonics to decide whether
//! an instruction touches memory; they test these flags.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// A set of machine-state categories an instruction may read or write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Effects: u16 {
        /// Byte-addressed scratch memory
        const MEMORY = 0x0001;
        /// Persistent contract storage
        const STORAGE = 0x0002;
        /// Transaction-scoped transient storage
        const TRANSIENT = 0x0004;
        /// The memory high-water mark observed by `msize`
        const MSIZE = 0x0008;
        /// The return data buffer of the last external call
        const RETURNDATA = 0x0010;
        /// The event log
        const LOG = 0x0020;
        /// Account balances
        const BALANCE = 0x0040;
        /// Code of other accounts
        const EXTCODE = 0x0080;
        /// Immutable values embedded in deployed code
        const IMMUTABLES = 0x0100;
    }
}

impl Effects {
    /// Every effect category.
    pub const ALL: Effects = Effects::all();

    /// No effect at all.
    pub const NONE: Effects = Effects::empty();
}

impl fmt::Display for Effects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        write!(f, "{}", names.join("|").to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effects_display() {
        assert_eq!(Effects::NONE.to_string(), "none");
        assert_eq!((Effects::MEMORY | Effects::STORAGE).to_string(), "memory|storage");
    }

    #[test]
    fn test_effects_all_contains_every_space() {
        assert!(Effects::ALL.contains(Effects::MEMORY | Effects::STORAGE | Effects::TRANSIENT));
    }
}
