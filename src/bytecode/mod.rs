pub mod compile;
pub mod disasm;
pub mod ir;
pub mod op;
pub mod verify;

pub use compile::compile;
pub use ir::{CompiledCode, DebugInfo, PersistError};
pub use op::{Command, CommandError, Opcode, Operand};
pub use verify::{verify, VerifyError};
