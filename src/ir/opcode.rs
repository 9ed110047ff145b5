//! The opcode vocabulary of the IR.
//!
//! Opcodes mirror EVM instructions closely, plus a handful of IR-only forms
//! (`phi`, `assign`, `param`, `invoke`, `jnz`, `djmp`, `assert`, ...). The
//! snake_case name of each variant is its textual mnemonic.

use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::ir::Effects;

/// An IR opcode.
///
/// Operand order follows EVM stack order read left to right, e.g.
/// `mstore offset, value` and `shl shift, value`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, AsRefStr, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum Opcode {
    // ── Control flow ──
    /// `jmp @target`
    Jmp,
    /// `jnz cond, @if_nonzero, @if_zero`
    Jnz,
    /// `djmp selector, @a, @b, ...` - indirect jump to one of a static target list
    Djmp,
    /// `ret` - return from an internal function
    Ret,
    /// `return offset, size`
    Return,
    /// `stop`
    Stop,
    /// `revert offset, size`
    Revert,
    /// `invalid`
    Invalid,

    // ── SSA forms ──
    /// `phi @pred1, %v1, @pred2, %v2, ...`
    Phi,
    /// `%x = operand`
    Assign,
    /// `param` - function parameter
    Param,

    // ── Arithmetic and logic ──
    /// `add a, b`
    Add,
    /// `sub a, b` (a - b)
    Sub,
    /// `mul a, b`
    Mul,
    /// `div a, b` (unsigned, division by zero yields zero)
    Div,
    /// `sdiv a, b`
    Sdiv,
    /// `mod a, b` (unsigned, modulo zero yields zero)
    Mod,
    /// `smod a, b`
    Smod,
    /// `exp base, exponent`
    Exp,
    /// `addmod a, b, n`
    Addmod,
    /// `mulmod a, b, n`
    Mulmod,
    /// `and a, b`
    And,
    /// `or a, b`
    Or,
    /// `xor a, b`
    Xor,
    /// `not a`
    Not,
    /// `shl shift, value`
    Shl,
    /// `shr shift, value`
    Shr,
    /// `sar shift, value`
    Sar,
    /// `byte index, value`
    Byte,
    /// `signextend byte_index, value`
    Signextend,
    /// `eq a, b`
    Eq,
    /// `lt a, b` (unsigned a < b)
    Lt,
    /// `gt a, b` (unsigned a > b)
    Gt,
    /// `slt a, b`
    Slt,
    /// `sgt a, b`
    Sgt,
    /// `iszero a`
    Iszero,

    // ── Memory and storage ──
    /// `mload offset`
    Mload,
    /// `mstore offset, value`
    Mstore,
    /// `mcopy dst, src, size`
    Mcopy,
    /// `msize`
    Msize,
    /// `sload slot`
    Sload,
    /// `sstore slot, value`
    Sstore,
    /// `tload slot`
    Tload,
    /// `tstore slot, value`
    Tstore,
    /// `calldatacopy dst, src, size`
    Calldatacopy,
    /// `codecopy dst, src, size`
    Codecopy,
    /// `returndatacopy dst, src, size`
    Returndatacopy,
    /// `extcodecopy address, dst, src, size`
    Extcodecopy,
    /// `sha3 offset, size`
    Sha3,

    // ── Environment ──
    /// `calldataload offset`
    Calldataload,
    /// `calldatasize`
    Calldatasize,
    /// `callvalue`
    Callvalue,
    /// `caller`
    Caller,
    /// `origin`
    Origin,
    /// `address`
    Address,
    /// `balance address`
    Balance,
    /// `selfbalance`
    Selfbalance,
    /// `gas`
    Gas,
    /// `gasprice`
    Gasprice,
    /// `timestamp`
    Timestamp,
    /// `number`
    Number,
    /// `chainid`
    Chainid,
    /// `codesize`
    Codesize,
    /// `returndatasize`
    Returndatasize,
    /// `extcodesize address`
    Extcodesize,
    /// `extcodehash address`
    Extcodehash,

    // ── Calls and contract creation ──
    /// `call gas, address, value, args_offset, args_size, ret_offset, ret_size`
    Call,
    /// `staticcall gas, address, args_offset, args_size, ret_offset, ret_size`
    Staticcall,
    /// `delegatecall gas, address, args_offset, args_size, ret_offset, ret_size`
    Delegatecall,
    /// `create value, offset, size`
    Create,
    /// `create2 value, offset, size, salt`
    Create2,
    /// `invoke @function, args...` - internal call
    Invoke,
    /// `log offset, size, topics...`
    Log,

    // ── Checks ──
    /// `assert cond` - reverts when `cond` is zero
    Assert,
    /// `assert_unreachable cond` - traps when `cond` is zero
    AssertUnreachable,
    /// `nop`
    Nop,
}

impl Opcode {
    /// Returns `true` if this opcode must end a basic block.
    #[must_use]
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Jmp
                | Opcode::Jnz
                | Opcode::Djmp
                | Opcode::Ret
                | Opcode::Return
                | Opcode::Stop
                | Opcode::Revert
                | Opcode::Invalid
        )
    }

    /// Returns `true` if the opcode can define an output variable.
    #[must_use]
    pub fn produces_output(self) -> bool {
        !self.is_terminator()
            && !matches!(
                self,
                Opcode::Mstore
                    | Opcode::Sstore
                    | Opcode::Tstore
                    | Opcode::Mcopy
                    | Opcode::Calldatacopy
                    | Opcode::Codecopy
                    | Opcode::Returndatacopy
                    | Opcode::Extcodecopy
                    | Opcode::Log
                    | Opcode::Assert
                    | Opcode::AssertUnreachable
                    | Opcode::Nop
            )
    }

    /// Returns `true` for the comparison opcodes producing 0 or 1.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Opcode::Eq | Opcode::Lt | Opcode::Gt | Opcode::Slt | Opcode::Sgt | Opcode::Iszero
        )
    }

    /// The state this opcode may read.
    #[must_use]
    pub fn read_effects(self) -> Effects {
        match self {
            Opcode::Mload | Opcode::Mcopy | Opcode::Sha3 | Opcode::Log => Effects::MEMORY,
            Opcode::Revert => Effects::MEMORY,
            Opcode::Sload => Effects::STORAGE,
            Opcode::Tload => Effects::TRANSIENT,
            Opcode::Msize => Effects::MSIZE,
            Opcode::Returndatacopy | Opcode::Returndatasize => Effects::RETURNDATA,
            Opcode::Balance | Opcode::Selfbalance => Effects::BALANCE,
            Opcode::Extcodecopy | Opcode::Extcodesize | Opcode::Extcodehash => Effects::EXTCODE,
            Opcode::Call
            | Opcode::Staticcall
            | Opcode::Delegatecall
            | Opcode::Create
            | Opcode::Create2
            | Opcode::Invoke => Effects::ALL,
            // Leaving the function observes whatever outlives it
            Opcode::Return | Opcode::Ret => Effects::MEMORY | Effects::STORAGE | Effects::TRANSIENT,
            Opcode::Stop => Effects::STORAGE | Effects::TRANSIENT,
            _ => Effects::NONE,
        }
    }

    /// The state this opcode may write.
    #[must_use]
    pub fn write_effects(self) -> Effects {
        match self {
            Opcode::Mstore
            | Opcode::Mcopy
            | Opcode::Calldatacopy
            | Opcode::Codecopy
            | Opcode::Returndatacopy
            | Opcode::Extcodecopy => Effects::MEMORY,
            Opcode::Sstore => Effects::STORAGE,
            Opcode::Tstore => Effects::TRANSIENT,
            Opcode::Log => Effects::LOG,
            Opcode::Staticcall => Effects::MEMORY | Effects::RETURNDATA,
            Opcode::Call
            | Opcode::Delegatecall
            | Opcode::Create
            | Opcode::Create2
            | Opcode::Invoke => Effects::ALL.difference(Effects::IMMUTABLES),
            _ => Effects::NONE,
        }
    }
}
