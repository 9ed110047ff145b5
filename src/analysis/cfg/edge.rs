//! Control flow edge kinds.

use std::fmt;

/// Classification of a CFG edge by the terminator that creates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CfgEdgeKind {
    /// `jmp`, or a `jnz` whose two targets coincide
    Unconditional,
    /// The `jnz` edge taken when the condition is non-zero
    ConditionalTrue,
    /// The `jnz` edge taken when the condition is zero
    ConditionalFalse,
    /// One entry of a `djmp` target list
    Dynamic {
        /// Position of the target in the `djmp` operand list
        index: usize,
    },
}

impl CfgEdgeKind {
    /// Returns `true` for either arm of a two-way branch.
    #[must_use]
    pub const fn is_conditional(&self) -> bool {
        matches!(self, Self::ConditionalTrue | Self::ConditionalFalse)
    }

    /// For conditional edges, whether the condition held on this edge.
    #[must_use]
    pub const fn branch_taken(&self) -> Option<bool> {
        match self {
            Self::ConditionalTrue => Some(true),
            Self::ConditionalFalse => Some(false),
            _ => None,
        }
    }
}

impl fmt::Display for CfgEdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconditional => write!(f, "jmp"),
            Self::ConditionalTrue => write!(f, "true"),
            Self::ConditionalFalse => write!(f, "false"),
            Self::Dynamic { index } => write!(f, "djmp[{index}]"),
        }
    }
}
