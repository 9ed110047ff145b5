//! The intermediate representation consumed by every analysis.
//!
//! # Architecture
//!
//! ```text
//! Module
//!  └─ Function            (entry = first block)
//!      └─ BasicBlock      (label, instructions, exactly one terminator)
//!          └─ Instruction (opcode, operands, optional output, InstId)
//!              └─ Operand (Literal(U256) | Variable | Label)
//! ```
//!
//! Each [`Opcode`] declares its read and write [`Effects`]. Memory-touching
//! instructions additionally map their operands to [`MemoryLocation`]s through
//! [`read_location`] and [`write_location`].
//!
//! Functions can be built programmatically with [`FunctionBuilder`] or parsed
//! from text with [`parse_function`] / [`parse_module`]; `Display` prints the
//! same text format back.

mod builder;
mod effects;
mod function;
mod instruction;
mod location;
mod opcode;
mod operand;
mod parser;

pub use builder::FunctionBuilder;
pub use effects::Effects;
pub use function::{BasicBlock, Function, Module};
pub use instruction::{InstId, Instruction};
pub use location::{read_location, write_location, AddrSpace, MemoryLocation};
pub use opcode::Opcode;
pub use operand::{Label, Operand, Variable};
pub use parser::{parse_function, parse_module};
