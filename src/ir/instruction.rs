//! Instructions and their stable identifiers.

use std::fmt;

use crate::ir::{Effects, Label, Opcode, Operand, Variable};

/// A function-unique, stable instruction identifier.
///
/// Ids survive insertion and removal of other instructions, which lets analyses
/// key their results by instruction without holding references into the IR.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub(crate) u32);

impl InstId {
    /// Creates an id from its raw value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        InstId(raw)
    }

    /// The raw value.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstId({})", self.0)
    }
}

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// A single IR instruction: opcode, operands, and at most one output variable.
///
/// Read and write effects are derived from the opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub(crate) id: InstId,
    opcode: Opcode,
    operands: Vec<Operand>,
    output: Option<Variable>,
}

impl Instruction {
    /// Creates an instruction. The id is assigned when it is added to a function.
    #[must_use]
    pub fn new(opcode: Opcode, operands: Vec<Operand>, output: Option<Variable>) -> Self {
        Instruction {
            id: InstId(u32::MAX),
            opcode,
            operands,
            output,
        }
    }

    /// The stable id of this instruction.
    #[must_use]
    pub fn id(&self) -> InstId {
        self.id
    }

    /// The opcode.
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// The operands in source order.
    #[must_use]
    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    /// The operand at `index`, if present.
    #[must_use]
    pub fn operand(&self, index: usize) -> Option<&Operand> {
        self.operands.get(index)
    }

    /// The defined variable, if any.
    #[must_use]
    pub fn output(&self) -> Option<&Variable> {
        self.output.as_ref()
    }

    /// The state this instruction may read.
    #[must_use]
    pub fn read_effects(&self) -> Effects {
        self.opcode.read_effects()
    }

    /// The state this instruction may write.
    #[must_use]
    pub fn write_effects(&self) -> Effects {
        self.opcode.write_effects()
    }

    /// Returns `true` if this instruction ends its block.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        self.opcode.is_terminator()
    }

    /// Returns `true` for `phi`.
    #[must_use]
    pub fn is_phi(&self) -> bool {
        self.opcode == Opcode::Phi
    }

    /// All label operands, in order. For terminators these are the jump targets.
    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.operands.iter().filter_map(Operand::as_label)
    }

    /// All variables read by this instruction.
    pub fn used_variables(&self) -> impl Iterator<Item = &Variable> {
        self.operands.iter().filter_map(Operand::as_variable)
    }

    /// The `(predecessor, value)` pairs of a `phi`. Empty for other opcodes.
    pub fn phi_operands(&self) -> impl Iterator<Item = (&Label, &Operand)> {
        let pairs = if self.is_phi() { self.operands.as_slice() } else { &[] };
        pairs
            .chunks_exact(2)
            .filter_map(|pair| pair[0].as_label().map(|label| (label, &pair[1])))
    }

    /// Replaces opcode and operands in place, keeping id and output.
    pub fn rewrite(&mut self, opcode: Opcode, operands: Vec<Operand>) {
        self.opcode = opcode;
        self.operands = operands;
    }

    /// Drops the `phi` incoming pair for `pred`. Returns `true` if one was removed.
    pub fn remove_phi_incoming(&mut self, pred: &Label) -> bool {
        if !self.is_phi() {
            return false;
        }
        let before = self.operands.len();
        let mut kept = Vec::with_capacity(before);
        for pair in self.operands.chunks(2) {
            if pair.first().and_then(Operand::as_label) != Some(pred) {
                kept.extend_from_slice(pair);
            }
        }
        self.operands = kept;
        self.operands.len() != before
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(output) = &self.output {
            write!(f, "{output} = ")?;
            if self.opcode == Opcode::Assign {
                return match self.operands.first() {
                    Some(operand) => write!(f, "{operand}"),
                    None => write!(f, "assign"),
                };
            }
        }
        write!(f, "{}", self.opcode)?;
        for (index, operand) in self.operands.iter().enumerate() {
            let sep = if index == 0 { " " } else { ", " };
            write!(f, "{sep}{operand}")?;
        }
        Ok(())
    }
}
