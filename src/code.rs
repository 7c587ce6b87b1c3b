//! Method bodies decoded into instruction sequences.

pub mod decoder;
pub mod instruction;
pub mod opcodes;

pub use instruction::{
    ExceptionHandler, ExceptionTable, Group, Instruction, InstructionSequence, SwitchTable,
};
