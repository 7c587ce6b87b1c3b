use std::sync::Arc;

use crate::{
    class::{constant_pool::ConstantPool, stream::ByteStream},
    code::{
        instruction::{
            ExceptionHandler, ExceptionTable, Group, Instruction, InstructionSequence, SwitchTable,
        },
        opcodes,
    },
    consts::BYTECODE_JAVA_7,
    error::ClassFormatError,
};

/// Decodes a method body: `code_length` bytes of code followed by the
/// exception table.
pub fn decode(
    body: &[u8],
    code_length: usize,
    bytecode_version: u16,
    pool: &ConstantPool,
) -> Result<InstructionSequence, ClassFormatError> {
    let Some((code, tail)) = body.split_at_checked(code_length) else {
        return Err(ClassFormatError::CodeOverrun {
            offset: body.len(),
            code_length,
        });
    };

    let mut stream = ByteStream::new(code);
    let mut instructions = Vec::new();
    let mut offsets = Vec::new();
    while !stream.is_empty() {
        let offset = stream.position();
        let instruction =
            decode_instruction(&mut stream, offset, bytecode_version).map_err(|err| match err {
                ClassFormatError::Truncated { .. } => ClassFormatError::CodeOverrun {
                    offset,
                    code_length,
                },
                err => err,
            })?;
        offsets.push(offset);
        instructions.push(instruction);
    }

    let raw_handlers = read_exception_table(tail, pool)?;
    let mut sequence = InstructionSequence::new(instructions, offsets, ExceptionTable::default());
    resolve_targets(&mut sequence)?;
    let handlers = raw_handlers
        .into_iter()
        .map(|raw| raw.resolve(&sequence, code_length))
        .collect::<Result<Vec<_>, _>>()?;
    sequence.set_exception_table(ExceptionTable { handlers });
    Ok(sequence)
}

fn is_wide_capable(opcode: u8) -> bool {
    matches!(
        opcode,
        opcodes::ILOAD..=opcodes::ALOAD
            | opcodes::ISTORE..=opcodes::ASTORE
            | opcodes::RET
            | opcodes::IINC
    )
}

fn decode_instruction(
    stream: &mut ByteStream<'_>,
    offset: usize,
    bytecode_version: u16,
) -> Result<Instruction, ClassFormatError> {
    let mut opcode = stream.read_u8()?;
    let wide = opcode == opcodes::WIDE;
    if wide {
        opcode = stream.read_u8()?;
        if !is_wide_capable(opcode) {
            return Err(ClassFormatError::IllegalOpcode { opcode, offset });
        }
    }

    let mut operands = Vec::new();
    match opcode {
        opcodes::ICONST_M1..=opcodes::ICONST_5 => {
            operands.push(opcode as i32 - opcodes::ICONST_0 as i32);
            opcode = opcodes::BIPUSH;
        }
        opcodes::ILOAD_0..=opcodes::ALOAD_3 => {
            let relative = opcode - opcodes::ILOAD_0;
            operands.push((relative % 4) as i32);
            opcode = opcodes::ILOAD + relative / 4;
        }
        opcodes::ISTORE_0..=opcodes::ASTORE_3 => {
            let relative = opcode - opcodes::ISTORE_0;
            operands.push((relative % 4) as i32);
            opcode = opcodes::ISTORE + relative / 4;
        }
        opcodes::BIPUSH => operands.push(stream.read_i8()? as i32),
        opcodes::SIPUSH => operands.push(stream.read_i16()? as i32),
        opcodes::LDC | opcodes::NEWARRAY => operands.push(stream.read_u8()? as i32),
        opcodes::LDC_W
        | opcodes::LDC2_W
        | opcodes::GETSTATIC..=opcodes::INVOKESTATIC
        | opcodes::NEW
        | opcodes::ANEWARRAY
        | opcodes::CHECKCAST
        | opcodes::INSTANCEOF => operands.push(stream.read_u16()? as i32),
        opcodes::ILOAD..=opcodes::ALOAD | opcodes::ISTORE..=opcodes::ASTORE | opcodes::RET => {
            operands.push(read_local_index(stream, wide)?)
        }
        opcodes::IINC => {
            operands.push(read_local_index(stream, wide)?);
            let increment = if wide {
                stream.read_i16()? as i32
            } else {
                stream.read_i8()? as i32
            };
            operands.push(increment);
        }
        opcodes::IFEQ..=opcodes::JSR | opcodes::IFNULL | opcodes::IFNONNULL => {
            operands.push(stream.read_i16()? as i32)
        }
        opcodes::GOTO_W | opcodes::JSR_W => operands.push(stream.read_i32()?),
        opcodes::INVOKEINTERFACE => {
            operands.push(stream.read_u16()? as i32);
            // count and the reserved zero byte
            stream.discard(2)?;
        }
        opcodes::INVOKEDYNAMIC => {
            if bytecode_version < BYTECODE_JAVA_7 {
                return Err(ClassFormatError::IllegalOpcode { opcode, offset });
            }
            operands.push(stream.read_u16()? as i32);
            stream.discard(2)?;
        }
        opcodes::MULTIANEWARRAY => {
            operands.push(stream.read_u16()? as i32);
            operands.push(stream.read_u8()? as i32);
        }
        opcodes::TABLESWITCH => {
            stream.discard(switch_padding(offset))?;
            let default = stream.read_i32()?;
            let low = stream.read_i32()?;
            let high = stream.read_i32()?;
            if high < low {
                return Err(ClassFormatError::BadSwitch { offset });
            }
            operands.extend([default, low, high]);
            for _ in 0..=(high as i64 - low as i64) {
                operands.push(stream.read_i32()?);
            }
        }
        opcodes::LOOKUPSWITCH => {
            stream.discard(switch_padding(offset))?;
            let default = stream.read_i32()?;
            let npairs = stream.read_i32()?;
            if npairs < 0 {
                return Err(ClassFormatError::BadSwitch { offset });
            }
            operands.extend([default, npairs]);
            for _ in 0..npairs {
                operands.push(stream.read_i32()?);
                operands.push(stream.read_i32()?);
            }
        }
        opcode if opcode > opcodes::JSR_W => {
            return Err(ClassFormatError::IllegalOpcode { opcode, offset });
        }
        _ => {}
    }

    let length = stream.position() - offset;
    Ok(Instruction::new(opcode, wide, operands, length))
}

fn read_local_index(stream: &mut ByteStream<'_>, wide: bool) -> Result<i32, ClassFormatError> {
    Ok(if wide {
        stream.read_u16()? as i32
    } else {
        stream.read_u8()? as i32
    })
}

/// Bytes between a switch opcode at `offset` and its 4-byte aligned operands.
pub fn switch_padding(offset: usize) -> usize {
    (4 - (offset + 1) % 4) % 4
}

/// Jumps and switches resolve their targets, last instruction first.
fn resolve_targets(sequence: &mut InstructionSequence) -> Result<(), ClassFormatError> {
    for index in (0..sequence.len()).rev() {
        let Some(offset) = sequence.offset(index) else {
            continue;
        };
        let target = |relative: i32| -> Result<usize, ClassFormatError> {
            let absolute = offset as i64 + relative as i64;
            usize::try_from(absolute)
                .ok()
                .and_then(|absolute| sequence.index_of_offset(absolute))
                .ok_or(ClassFormatError::BadJumpTarget {
                    from: offset,
                    to: absolute,
                })
        };

        let instruction = &sequence.instructions()[index];
        let (destination, switch_table) = match instruction.group {
            Group::Jump => (Some(target(instruction.operands[0])?), None),
            Group::Switch => {
                let operands = &instruction.operands;
                let default = target(operands[0])?;
                let (values, destinations) = if instruction.opcode == opcodes::TABLESWITCH {
                    let low = operands[1];
                    operands[3..]
                        .iter()
                        .enumerate()
                        .map(|(i, &relative)| Ok((low.wrapping_add(i as i32), target(relative)?)))
                        .collect::<Result<(Vec<_>, Vec<_>), ClassFormatError>>()?
                } else {
                    operands[2..]
                        .chunks_exact(2)
                        .map(|pair| Ok((pair[0], target(pair[1])?)))
                        .collect::<Result<(Vec<_>, Vec<_>), ClassFormatError>>()?
                };
                (
                    None,
                    Some(SwitchTable {
                        default,
                        values,
                        destinations,
                    }),
                )
            }
            _ => continue,
        };

        let instruction = &mut sequence.instructions_mut()[index];
        instruction.destination = destination;
        instruction.switch_table = switch_table;
    }
    Ok(())
}

struct RawHandler {
    from: u16,
    to: u16,
    handler: u16,
    exception_class: Option<Arc<str>>,
}

impl RawHandler {
    fn resolve(
        self,
        sequence: &InstructionSequence,
        code_length: usize,
    ) -> Result<ExceptionHandler, ClassFormatError> {
        let index = |offset: u16| {
            sequence
                .index_of_offset(offset as usize)
                .ok_or(ClassFormatError::BadJumpTarget {
                    from: self.from as usize,
                    to: offset as i64,
                })
        };
        let to_instruction = if self.to as usize == code_length {
            sequence.len()
        } else {
            index(self.to)?
        };
        Ok(ExceptionHandler {
            from: self.from,
            to: self.to,
            handler: self.handler,
            from_instruction: index(self.from)?,
            to_instruction,
            handler_instruction: index(self.handler)?,
            exception_class: self.exception_class,
        })
    }
}

fn read_exception_table(
    tail: &[u8],
    pool: &ConstantPool,
) -> Result<Vec<RawHandler>, ClassFormatError> {
    let mut stream = ByteStream::new(tail);
    let handler_count = stream.read_u16()?;
    let mut handlers = Vec::with_capacity(handler_count as usize);
    for _ in 0..handler_count {
        let from = stream.read_u16()?;
        let to = stream.read_u16()?;
        let handler = stream.read_u16()?;
        let catch_type = stream.read_u16()?;
        handlers.push(RawHandler {
            from,
            to,
            handler,
            exception_class: pool.optional_class_name(catch_type)?.cloned(),
        });
    }
    Ok(handlers)
}
