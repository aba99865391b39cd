use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Packed instruction words
//
//   31        26 25                          0
//  +------------+-----------------------------+
//  |   opcode   |           operand           |
//  +------------+-----------------------------+
// =============================================================================

pub const OPCODE_BITS: u32 = 6;
pub const OPERAND_BITS: u32 = 26;
pub const MAX_OPERAND: u32 = (1 << OPERAND_BITS) - 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("operand {0} does not fit in 26 bits")]
    OperandOutOfRange(u64),

    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0,

    // ( -- value )
    PushConstInt,
    PushConstNumber,
    PushConstNull,
    PushConstBool,
    PushConstString,
    PushLocalFunction,
    PushGlobal,

    // ( value*n -- )
    Pop,

    // control flow, absolute targets
    Goto,
    IfTrueGoto,

    // ( args* callee -- ) / ( args* callee -- result )
    CallFunctionDiscardReturn,
    CallFunctionWithReturn,

    // globals, operand is a string-pool index
    DefineGlobal,
    SetGlobal,

    /// Operand is the number of values returned (0 or 1).
    Return,

    // ( a b -- result )
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    BitAnd,
    BitOr,

    // ( a -- result )
    Negate,
    Not,
    BitNot,

    // ( a -- a a )
    Dup,
}

impl Opcode {
    const ALL: [Opcode; 33] = [
        Opcode::Nop,
        Opcode::PushConstInt,
        Opcode::PushConstNumber,
        Opcode::PushConstNull,
        Opcode::PushConstBool,
        Opcode::PushConstString,
        Opcode::PushLocalFunction,
        Opcode::PushGlobal,
        Opcode::Pop,
        Opcode::Goto,
        Opcode::IfTrueGoto,
        Opcode::CallFunctionDiscardReturn,
        Opcode::CallFunctionWithReturn,
        Opcode::DefineGlobal,
        Opcode::SetGlobal,
        Opcode::Return,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Mod,
        Opcode::Less,
        Opcode::LessEqual,
        Opcode::Greater,
        Opcode::GreaterEqual,
        Opcode::Equal,
        Opcode::NotEqual,
        Opcode::BitAnd,
        Opcode::BitOr,
        Opcode::Negate,
        Opcode::Not,
        Opcode::BitNot,
        Opcode::Dup,
    ];

    /// Every opcode, indexed by its encoding.
    pub fn all() -> &'static [Opcode] {
        &Self::ALL
    }

    pub fn from_u8(code: u8) -> Result<Opcode, CommandError> {
        Self::all()
            .get(code as usize)
            .copied()
            .ok_or(CommandError::UnknownOpcode(code))
    }

    /// `(pops, pushes)` as seen by the caller's stack.
    pub fn stack_effect(self, operand: u32) -> (u32, u32) {
        use Opcode::*;
        match self {
            Nop => (0, 0),
            PushConstInt | PushConstNumber | PushConstNull | PushConstBool | PushConstString
            | PushLocalFunction | PushGlobal => (0, 1),
            Pop => (operand, 0),
            Goto => (0, 0),
            IfTrueGoto => (1, 0),
            DefineGlobal | SetGlobal => (1, 0),
            Add | Sub | Mul | Div | Mod | Less | LessEqual | Greater | GreaterEqual | Equal
            | NotEqual | BitAnd | BitOr => (2, 1),
            Negate | Not | BitNot => (1, 1),
            Dup => (1, 2),
            CallFunctionDiscardReturn => (operand + 1, 0),
            CallFunctionWithReturn => (operand + 1, 1),
            Return => (operand, 0),
        }
    }

    /// True for instructions whose operand is an instruction index.
    pub fn is_jump(self) -> bool {
        matches!(self, Opcode::Goto | Opcode::IfTrueGoto)
    }
}

/// A 26-bit operand. Only constructible through a range check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Operand(u32);

impl Operand {
    pub const ZERO: Operand = Operand(0);

    pub fn new(value: usize) -> Result<Operand, CommandError> {
        if value as u64 > MAX_OPERAND as u64 {
            return Err(CommandError::OperandOutOfRange(value as u64));
        }
        Ok(Operand(value as u32))
    }

    pub fn from_bool(value: bool) -> Operand {
        Operand(value as u32)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One instruction: an opcode and its operand packed into a `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub struct Command {
    pub opcode: Opcode,
    pub operand: Operand,
}

impl Command {
    pub fn new(opcode: Opcode, operand: Operand) -> Self {
        Command { opcode, operand }
    }

    /// Instruction without a meaningful operand.
    pub fn bare(opcode: Opcode) -> Self {
        Command::new(opcode, Operand::ZERO)
    }

    pub fn to_u32(self) -> u32 {
        ((self.opcode as u32) << OPERAND_BITS) | self.operand.get()
    }

    pub fn from_u32(word: u32) -> Result<Command, CommandError> {
        let opcode = Opcode::from_u8((word >> OPERAND_BITS) as u8)?;
        let operand = Operand(word & MAX_OPERAND);
        Ok(Command { opcode, operand })
    }
}

impl From<Command> for u32 {
    fn from(command: Command) -> u32 {
        command.to_u32()
    }
}

impl TryFrom<u32> for Command {
    type Error = CommandError;

    fn try_from(word: u32) -> Result<Self, Self::Error> {
        Command::from_u32(word)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} {}", self.opcode, self.operand.get())
    }
}
