//! Programmatic construction of functions.

use crate::{
    ir::{Function, Instruction, Label, Opcode, Operand, Variable},
    utils::graph::NodeId,
    Result,
};

/// Incrementally builds a [`Function`], one block at a time.
///
/// Instructions are appended to the current block, selected with
/// [`block`](Self::block). Blocks may be referenced by label before they are
/// created; [`build`](Self::build) verifies the result.
///
/// # Examples
///
/// ```rust,ignore
/// use evmopt::ir::{FunctionBuilder, Opcode, Operand};
///
/// let mut builder = FunctionBuilder::new("main");
/// builder.block("entry")?;
/// let x = builder.emit_named("x", Opcode::Assign, vec![Operand::literal(5u64)]);
/// builder.emit_named("y", Opcode::Add, vec![x.into(), Operand::literal(7u64)]);
/// builder.emit_void(Opcode::Stop, vec![]);
/// let function = builder.build()?;
/// ```
#[derive(Debug)]
pub struct FunctionBuilder {
    function: Function,
    current: Option<NodeId>,
    next_temp: usize,
}

impl FunctionBuilder {
    /// Starts a new function.
    #[must_use]
    pub fn new(name: &str) -> Self {
        FunctionBuilder {
            function: Function::new(name),
            current: None,
            next_temp: 0,
        }
    }

    /// Creates a block and makes it current. The first block is the entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateLabel`](crate::Error::DuplicateLabel) if the label exists.
    pub fn block(&mut self, label: &str) -> Result<NodeId> {
        let id = self.function.add_block(Label::new(label))?;
        self.current = Some(id);
        Ok(id)
    }

    /// Appends an instruction with a fresh temporary output (`%t0`, `%t1`, ...).
    pub fn emit(&mut self, opcode: Opcode, operands: Vec<Operand>) -> Variable {
        let name = loop {
            let candidate = format!("t{}", self.next_temp);
            self.next_temp += 1;
            let var = Variable::new(&candidate);
            if !self.is_defined(&var) {
                break var;
            }
        };
        self.push(Instruction::new(opcode, operands, Some(name.clone())));
        name
    }

    /// Appends an instruction defining the named variable.
    pub fn emit_named(&mut self, name: &str, opcode: Opcode, operands: Vec<Operand>) -> Variable {
        let var = Variable::new(name);
        self.push(Instruction::new(opcode, operands, Some(var.clone())));
        var
    }

    /// Appends an instruction without an output.
    pub fn emit_void(&mut self, opcode: Opcode, operands: Vec<Operand>) {
        self.push(Instruction::new(opcode, operands, None));
    }

    /// Appends a fully formed instruction.
    pub fn push(&mut self, inst: Instruction) {
        let block = match self.current {
            Some(block) => block,
            None => {
                // Implicit entry block for builders that never named one
                let Ok(block) = self.function.add_block(Label::new("entry")) else {
                    return;
                };
                self.current = Some(block);
                block
            }
        };
        self.function.append_instruction(block, inst);
    }

    /// Verifies and returns the function.
    ///
    /// # Errors
    ///
    /// Returns any error reported by [`Function::verify`].
    pub fn build(self) -> Result<Function> {
        self.function.verify()?;
        Ok(self.function)
    }

    fn is_defined(&self, var: &Variable) -> bool {
        self.function
            .instructions()
            .any(|(_, inst)| inst.output() == Some(var))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_builder_produces_verified_function() {
        let mut builder = FunctionBuilder::new("main");
        builder.block("entry").unwrap();
        let x = builder.emit_named("x", Opcode::Assign, vec![Operand::literal(5u64)]);
        let t = builder.emit(Opcode::Add, vec![x.into(), Operand::literal(7u64)]);
        builder.emit_void(Opcode::Mstore, vec![Operand::literal(0u64), t.into()]);
        builder.emit_void(Opcode::Stop, vec![]);

        let func = builder.build().unwrap();
        assert_eq!(func.instruction_count(), 4);
        assert_eq!(
            func.to_string(),
            "function main {\nentry:\n    %x = 5\n    %t0 = add %x, 7\n    mstore 0, %t0\n    stop\n}\n"
        );
    }

    #[test]
    fn test_builder_rejects_dangling_label() {
        let mut builder = FunctionBuilder::new("main");
        builder.block("entry").unwrap();
        builder.emit_void(Opcode::Jmp, vec![Operand::label("missing")]);
        assert!(matches!(builder.build(), Err(Error::UnknownLabel(_))));
    }

    #[test]
    fn test_temporaries_skip_taken_names() {
        let mut builder = FunctionBuilder::new("main");
        builder.emit_named("t0", Opcode::Callvalue, vec![]);
        let fresh = builder.emit(Opcode::Caller, vec![]);
        assert_eq!(fresh.name(), "t1");
    }
}
