use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bytecode::op::Command;
use crate::bytecode::verify::{verify, VerifyError};
use crate::lang::location::Location;

/// Magic bytes at the start of a persisted code file.
pub const MAGIC: &[u8; 4] = b"FELB";
/// Current on-disk format version.
pub const FORMAT_VERSION: u16 = 1;

/// Where an instruction came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub location: Location,
    /// Operand locations for operator instructions, left to right.
    pub operands: Vec<Location>,
}

/// A compiled program: the instruction stream plus its constant pools.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledCode {
    pub instructions: Vec<Command>,
    pub strings: Vec<Rc<str>>,
    pub ints: Vec<i32>,
    pub numbers: Vec<f32>,
    /// Parallel to `instructions`.
    pub debug: Vec<DebugInfo>,
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("not a fel bytecode file")]
    BadMagic,

    #[error("unsupported bytecode version {0}")]
    UnsupportedVersion(u16),

    #[error("malformed bytecode: {0}")]
    Decode(#[from] postcard::Error),

    #[error("invalid bytecode: {0}")]
    Invalid(#[from] VerifyError),
}

impl CompiledCode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn debug_at(&self, pc: usize) -> Option<&DebugInfo> {
        self.debug.get(pc)
    }

    /// Encodes as `FELB`, a little-endian version, then the postcard body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistError> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        let body = postcard::to_allocvec(self)?;
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Decodes and verifies a persisted program.
    pub fn from_bytes(bytes: &[u8]) -> Result<CompiledCode, PersistError> {
        let rest = bytes.strip_prefix(MAGIC).ok_or(PersistError::BadMagic)?;
        let (version, body) = match rest {
            [lo, hi, body @ ..] => (u16::from_le_bytes([*lo, *hi]), body),
            _ => return Err(PersistError::BadMagic),
        };
        if version != FORMAT_VERSION {
            return Err(PersistError::UnsupportedVersion(version));
        }

        let code: CompiledCode = postcard::from_bytes(body)?;
        verify(&code)?;
        tracing::debug!(instructions = code.len(), "loaded bytecode");
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::op::{Opcode, Operand};

    fn sample() -> CompiledCode {
        let here = Location::new(Rc::from("test.fel"), 1, 1);
        let mut code = CompiledCode::new();
        code.strings.push(Rc::from("dog"));
        code.strings.push(Rc::from("print"));
        code.ints.push(42);
        code.numbers.push(1.5);
        for (opcode, operand) in [
            (Opcode::PushConstString, 0),
            (Opcode::PushConstInt, 0),
            (Opcode::PushConstString, 1),
            (Opcode::CallFunctionDiscardReturn, 2),
        ] {
            code.instructions
                .push(Command::new(opcode, Operand::new(operand).unwrap()));
            code.debug.push(DebugInfo {
                location: here.clone(),
                operands: vec![],
            });
        }
        code
    }

    #[test]
    fn test_persist_roundtrip() {
        let code = sample();
        let bytes = code.to_bytes().unwrap();
        assert_eq!(&bytes[..4], b"FELB");
        assert_eq!(&bytes[4..6], &[1, 0]);
        assert_eq!(CompiledCode::from_bytes(&bytes).unwrap(), code);
    }

    #[test]
    fn test_rejects_bad_header() {
        assert!(matches!(
            CompiledCode::from_bytes(b"NOPE\x01\x00"),
            Err(PersistError::BadMagic)
        ));
        assert!(matches!(
            CompiledCode::from_bytes(b"FELB"),
            Err(PersistError::BadMagic)
        ));
        assert!(matches!(
            CompiledCode::from_bytes(b"FELB\x02\x00"),
            Err(PersistError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_rejects_truncated_body() {
        let bytes = sample().to_bytes().unwrap();
        assert!(matches!(
            CompiledCode::from_bytes(&bytes[..bytes.len() - 3]),
            Err(PersistError::Decode(_))
        ));
    }

    #[test]
    fn test_rejects_code_failing_verification() {
        let mut code = sample();
        code.instructions[1] = Command::new(Opcode::PushConstInt, Operand::new(9).unwrap());
        let bytes = code.to_bytes().unwrap();
        assert!(matches!(
            CompiledCode::from_bytes(&bytes),
            Err(PersistError::Invalid(_))
        ));
    }
}
