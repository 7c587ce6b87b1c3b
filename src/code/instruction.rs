use std::{
    collections::HashMap,
    fmt::{self, Display},
    sync::Arc,
};

use crate::code::opcodes::{self, mnemonic};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    General,
    Jump,
    FieldAccess,
    Invocation,
    Return,
    Switch,
}

impl Group {
    pub fn of(opcode: u8) -> Group {
        match opcode {
            opcodes::IFEQ..=opcodes::JSR | opcodes::IFNULL..=opcodes::JSR_W => Group::Jump,
            opcodes::GETSTATIC..=opcodes::PUTFIELD => Group::FieldAccess,
            opcodes::INVOKEVIRTUAL..=opcodes::INVOKEDYNAMIC => Group::Invocation,
            opcodes::IRETURN..=opcodes::RETURN | opcodes::ATHROW => Group::Return,
            opcodes::TABLESWITCH | opcodes::LOOKUPSWITCH => Group::Switch,
            _ => Group::General,
        }
    }
}

/// Resolved targets of a `tableswitch` or `lookupswitch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchTable {
    pub default: usize,
    pub values: Vec<i32>,
    pub destinations: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: u8,
    pub group: Group,
    pub wide: bool,
    pub operands: Vec<i32>,
    /// Encoded size, including a `wide` prefix and switch padding.
    pub length: usize,
    /// Target instruction index of a jump.
    pub destination: Option<usize>,
    pub switch_table: Option<SwitchTable>,
}

impl Instruction {
    pub(crate) fn new(opcode: u8, wide: bool, operands: Vec<i32>, length: usize) -> Self {
        Self {
            opcode,
            group: Group::of(opcode),
            wide,
            operands,
            length,
            destination: None,
            switch_table: None,
        }
    }

    pub fn operand(&self, index: usize) -> Option<i32> {
        self.operands.get(index).copied()
    }

    pub fn mnemonic(&self) -> &'static str {
        mnemonic(self.opcode)
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.wide {
            f.write_str("wide ")?;
        }
        f.write_str(self.mnemonic())?;
        match (&self.destination, &self.switch_table) {
            (Some(destination), _) => write!(f, " #{destination}"),
            (_, Some(table)) => {
                write!(f, " default: #{}", table.default)?;
                for (value, destination) in table.values.iter().zip(&table.destinations) {
                    write!(f, ", {value}: #{destination}")?;
                }
                Ok(())
            }
            _ => {
                for operand in &self.operands {
                    write!(f, " {operand}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub from: u16,
    pub to: u16,
    pub handler: u16,
    pub from_instruction: usize,
    /// Exclusive; equals the sequence length when `to` is the code end.
    pub to_instruction: usize,
    pub handler_instruction: usize,
    /// `None` catches everything (`finally`).
    pub exception_class: Option<Arc<str>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExceptionTable {
    pub handlers: Vec<ExceptionHandler>,
}

/// Decoded method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionSequence {
    instructions: Vec<Instruction>,
    offsets: Vec<usize>,
    offset_index: HashMap<usize, usize>,
    exception_table: ExceptionTable,
}

impl InstructionSequence {
    pub(crate) fn new(
        instructions: Vec<Instruction>,
        offsets: Vec<usize>,
        exception_table: ExceptionTable,
    ) -> Self {
        let offset_index = offsets.iter().enumerate().map(|(i, &o)| (o, i)).collect();
        Self {
            instructions,
            offsets,
            offset_index,
            exception_table,
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instruction(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub(crate) fn instructions_mut(&mut self) -> &mut [Instruction] {
        &mut self.instructions
    }

    pub fn offset(&self, index: usize) -> Option<usize> {
        self.offsets.get(index).copied()
    }

    pub fn index_of_offset(&self, offset: usize) -> Option<usize> {
        self.offset_index.get(&offset).copied()
    }

    pub fn exception_table(&self) -> &ExceptionTable {
        &self.exception_table
    }

    pub(crate) fn set_exception_table(&mut self, exception_table: ExceptionTable) {
        self.exception_table = exception_table;
    }

    /// `(bytecode offset, instruction)` pairs in code order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Instruction)> {
        self.offsets.iter().copied().zip(&self.instructions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_follow_opcode_ranges() {
        assert_eq!(Group::of(opcodes::IFEQ), Group::Jump);
        assert_eq!(Group::of(opcodes::JSR), Group::Jump);
        assert_eq!(Group::of(opcodes::RET), Group::General);
        assert_eq!(Group::of(opcodes::GOTO_W), Group::Jump);
        assert_eq!(Group::of(opcodes::PUTFIELD), Group::FieldAccess);
        assert_eq!(Group::of(opcodes::INVOKEDYNAMIC), Group::Invocation);
        assert_eq!(Group::of(opcodes::ATHROW), Group::Return);
        assert_eq!(Group::of(opcodes::LOOKUPSWITCH), Group::Switch);
        assert_eq!(Group::of(opcodes::NEW), Group::General);
    }

    #[test]
    fn displays_mnemonic_and_operands() {
        let mut instruction = Instruction::new(opcodes::ILOAD, true, vec![300], 4);
        assert_eq!(instruction.to_string(), "wide iload 300");
        instruction = Instruction::new(opcodes::GOTO, false, vec![-3], 3);
        instruction.destination = Some(0);
        assert_eq!(instruction.to_string(), "goto #0");
    }
}
