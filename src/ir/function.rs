//! Functions, basic blocks and modules.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    ir::{InstId, Instruction, Label, Opcode, Operand, Variable},
    utils::graph::NodeId,
    Error, Result,
};

/// A basic block: a label and a straight-line instruction sequence ending in
/// exactly one terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    label: Label,
    instructions: Vec<Instruction>,
}

impl BasicBlock {
    /// Creates an empty block.
    #[must_use]
    pub fn new(label: Label) -> Self {
        BasicBlock {
            label,
            instructions: Vec::new(),
        }
    }

    /// The block label.
    #[must_use]
    pub fn label(&self) -> &Label {
        &self.label
    }

    /// All instructions in order, phis first and terminator last.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// The terminator, if the block is well formed.
    #[must_use]
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|inst| inst.is_terminator())
    }

    /// The leading `phi` instructions.
    pub fn phis(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter().take_while(|inst| inst.is_phi())
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` if the block has no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.label.name())?;
        for inst in &self.instructions {
            writeln!(f, "    {inst}")?;
        }
        Ok(())
    }
}

/// A function: an ordered list of basic blocks whose first block is the entry.
///
/// Blocks are addressed by [`NodeId`] (their position) and by [`Label`].
/// Predecessor and successor relations are not stored here; they are derived
/// by [`CfgAnalysis`](crate::analysis::CfgAnalysis).
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    blocks: Vec<BasicBlock>,
    labels: FxHashMap<Label, NodeId>,
    next_inst_id: u32,
}

impl Function {
    /// Creates a function with no blocks.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Function {
            name: name.to_string(),
            blocks: Vec::new(),
            labels: FxHashMap::default(),
            next_inst_id: 0,
        }
    }

    /// The function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The entry block.
    #[must_use]
    pub fn entry(&self) -> NodeId {
        NodeId::new(0)
    }

    /// All blocks in layout order.
    #[must_use]
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The block with the given id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    #[must_use]
    pub fn block(&self, id: NodeId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    /// Resolves a label to its block id.
    #[must_use]
    pub fn block_id(&self, label: &Label) -> Option<NodeId> {
        self.labels.get(label).copied()
    }

    /// Iterates every instruction with the block that holds it.
    pub fn instructions(&self) -> impl Iterator<Item = (NodeId, &Instruction)> {
        self.blocks.iter().enumerate().flat_map(|(index, block)| {
            block
                .instructions
                .iter()
                .map(move |inst| (NodeId::new(index), inst))
        })
    }

    /// Total number of instructions.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(BasicBlock::len).sum()
    }

    /// Finds the block and position of an instruction.
    #[must_use]
    pub fn locate(&self, id: InstId) -> Option<(NodeId, usize)> {
        self.blocks.iter().enumerate().find_map(|(block, bb)| {
            bb.instructions
                .iter()
                .position(|inst| inst.id == id)
                .map(|pos| (NodeId::new(block), pos))
        })
    }

    /// Returns the instruction with the given id.
    #[must_use]
    pub fn instruction(&self, id: InstId) -> Option<&Instruction> {
        let (block, pos) = self.locate(id)?;
        self.blocks[block.index()].instructions.get(pos)
    }

    /// Appends a new empty block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateLabel`] if the label is already used.
    pub fn add_block(&mut self, label: Label) -> Result<NodeId> {
        if self.labels.contains_key(&label) {
            return Err(Error::DuplicateLabel(label.name().to_string()));
        }
        let id = NodeId::new(self.blocks.len());
        self.labels.insert(label.clone(), id);
        self.blocks.push(BasicBlock::new(label));
        Ok(id)
    }

    /// Appends an instruction to `block`, assigning it a fresh id.
    ///
    /// # Panics
    ///
    /// Panics if `block` is out of range.
    pub fn append_instruction(&mut self, block: NodeId, mut inst: Instruction) -> InstId {
        inst.id = InstId(self.next_inst_id);
        self.next_inst_id += 1;
        let id = inst.id;
        self.blocks[block.index()].instructions.push(inst);
        id
    }

    /// Rewrites the opcode and operands of an instruction, keeping its id and output.
    ///
    /// Returns `false` if no instruction has that id.
    pub fn replace_instruction(&mut self, id: InstId, opcode: Opcode, operands: Vec<Operand>) -> bool {
        match self.instruction_mut(id) {
            Some(inst) => {
                inst.rewrite(opcode, operands);
                true
            }
            None => false,
        }
    }

    /// Removes an instruction and returns it.
    pub fn remove_instruction(&mut self, id: InstId) -> Option<Instruction> {
        let (block, pos) = self.locate(id)?;
        Some(self.blocks[block.index()].instructions.remove(pos))
    }

    /// Drops the incoming pair for `pred` from every phi in `block`.
    ///
    /// Returns the number of phis that changed.
    pub fn remove_phi_incoming(&mut self, block: NodeId, pred: &Label) -> usize {
        self.blocks[block.index()]
            .instructions
            .iter_mut()
            .take_while(|inst| inst.is_phi())
            .filter_map(|phi| phi.remove_phi_incoming(pred).then_some(()))
            .count()
    }

    fn instruction_mut(&mut self, id: InstId) -> Option<&mut Instruction> {
        self.blocks
            .iter_mut()
            .flat_map(|bb| bb.instructions.iter_mut())
            .find(|inst| inst.id == id)
    }

    /// Checks structural well-formedness.
    ///
    /// - the function has at least one block
    /// - every block ends in exactly one terminator and has no other
    /// - phis appear only at the top of a block
    /// - every label operand names an existing block
    /// - branch operand counts are correct
    /// - every variable is defined at most once
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] or [`Error::UnknownLabel`] describing the first violation.
    pub fn verify(&self) -> Result<()> {
        if self.blocks.is_empty() {
            return Err(malformed_error!("function '{}' has no blocks", self.name));
        }

        let mut defined: FxHashSet<&Variable> = FxHashSet::default();
        for block in &self.blocks {
            let label = block.label.name();
            match block.instructions.iter().filter(|i| i.is_terminator()).count() {
                0 => {
                    return Err(malformed_error!(
                        "block '{}' in '{}' has no terminator",
                        label,
                        self.name
                    ))
                }
                1 => {}
                n => {
                    return Err(malformed_error!(
                        "block '{}' in '{}' has {} terminators",
                        label,
                        self.name,
                        n
                    ))
                }
            }
            if block.terminator().is_none() {
                return Err(malformed_error!(
                    "terminator of block '{}' in '{}' is not its last instruction",
                    label,
                    self.name
                ));
            }

            let mut seen_non_phi = false;
            for inst in &block.instructions {
                if inst.is_phi() && seen_non_phi {
                    return Err(malformed_error!(
                        "phi '{}' in block '{}' follows a non-phi instruction",
                        inst,
                        label
                    ));
                }
                seen_non_phi |= !inst.is_phi();

                for target in inst.labels() {
                    if inst.opcode() != Opcode::Invoke && !self.labels.contains_key(target) {
                        return Err(Error::UnknownLabel(target.name().to_string()));
                    }
                }
                self.verify_shape(inst, label)?;

                if let Some(output) = inst.output() {
                    if !defined.insert(output) {
                        return Err(malformed_error!(
                            "variable {} is defined more than once (block '{}')",
                            output,
                            label
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn verify_shape(&self, inst: &Instruction, block: &str) -> Result<()> {
        let ops = inst.operands();
        let ok = match inst.opcode() {
            Opcode::Jmp => ops.len() == 1 && ops[0].as_label().is_some(),
            Opcode::Jnz => {
                ops.len() == 3
                    && ops[0].as_label().is_none()
                    && ops[1].as_label().is_some()
                    && ops[2].as_label().is_some()
            }
            Opcode::Djmp => {
                ops.len() >= 2
                    && ops[0].as_label().is_none()
                    && ops[1..].iter().all(|op| op.as_label().is_some())
            }
            Opcode::Phi => {
                ops.len() % 2 == 0
                    && ops.len() >= 2
                    && ops.chunks(2).all(|pair| pair[0].as_label().is_some())
            }
            Opcode::Assign => ops.len() == 1 && ops[0].as_label().is_none(),
            _ => true,
        };
        if ok {
            Ok(())
        } else {
            Err(malformed_error!(
                "instruction '{}' in block '{}' has malformed operands",
                inst,
                block
            ))
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "function {} {{", self.name)?;
        for block in &self.blocks {
            write!(f, "{block}")?;
        }
        writeln!(f, "}}")
    }
}

/// An ordered collection of functions compiled together.
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// The functions, in definition order
    pub functions: Vec<Function>,
}

impl Module {
    /// Creates an empty module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|func| func.name() == name)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, func) in self.functions.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{func}")?;
        }
        Ok(())
    }
}
