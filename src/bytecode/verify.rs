use thiserror::Error;

use crate::bytecode::ir::CompiledCode;
use crate::bytecode::op::{Command, Opcode};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("{debug} debug entries for {instructions} instructions")]
    DebugMismatch { instructions: usize, debug: usize },

    #[error("pc={pc}: {command} jumps to {target}, past the end at {len}")]
    JumpOutOfRange {
        pc: usize,
        command: Command,
        target: usize,
        len: usize,
    },

    #[error("pc={pc}: {command} refers to {pool} slot {index}, pool has {size}")]
    PoolIndexOutOfRange {
        pc: usize,
        command: Command,
        pool: &'static str,
        index: usize,
        size: usize,
    },

    #[error("pc={pc}: {command} has an invalid operand")]
    BadOperand { pc: usize, command: Command },

    #[error("pc={pc}: stack underflow in {command}, needed {needed} with {height} available")]
    StackUnderflow {
        pc: usize,
        command: Command,
        needed: u32,
        height: u32,
    },
}

/// Checks that every operand refers to something that exists, then runs a
/// stack height scan.
pub fn verify(code: &CompiledCode) -> Result<(), VerifyError> {
    let len = code.instructions.len();
    if code.debug.len() != len {
        return Err(VerifyError::DebugMismatch {
            instructions: len,
            debug: code.debug.len(),
        });
    }

    for (pc, &command) in code.instructions.iter().enumerate() {
        let index = command.operand.index();
        let pool = |pool: &'static str, size: usize| {
            if index < size {
                Ok(())
            } else {
                Err(VerifyError::PoolIndexOutOfRange {
                    pc,
                    command,
                    pool,
                    index,
                    size,
                })
            }
        };

        match command.opcode {
            Opcode::PushConstInt => pool("int", code.ints.len())?,
            Opcode::PushConstNumber => pool("number", code.numbers.len())?,
            Opcode::PushConstString
            | Opcode::PushGlobal
            | Opcode::DefineGlobal
            | Opcode::SetGlobal => pool("string", code.strings.len())?,
            // a jump to `len` ends the program
            Opcode::Goto | Opcode::IfTrueGoto if index > len => {
                return Err(VerifyError::JumpOutOfRange {
                    pc,
                    command,
                    target: index,
                    len,
                });
            }
            Opcode::PushLocalFunction if index >= len => {
                return Err(VerifyError::JumpOutOfRange {
                    pc,
                    command,
                    target: index,
                    len,
                });
            }
            Opcode::PushConstBool | Opcode::Return if index > 1 => {
                return Err(VerifyError::BadOperand { pc, command });
            }
            _ => {}
        }
    }

    check_stack(code)
}

/// Linear scan for stack underflow starting from an empty stack.
///
/// NOTE: jumps are not followed. Every statement the compiler emits leaves
/// the stack as it found it, so walking both arms of a branch in order gives
/// the same heights as either path.
pub fn check_stack(code: &CompiledCode) -> Result<(), VerifyError> {
    let mut height: u32 = 0;
    for (pc, &command) in code.instructions.iter().enumerate() {
        let (pops, pushes) = command.opcode.stack_effect(command.operand.get());
        if pops > height {
            return Err(VerifyError::StackUnderflow {
                pc,
                command,
                needed: pops,
                height,
            });
        }
        height = height - pops + pushes;
    }
    Ok(())
}
