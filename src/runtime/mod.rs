//! Execution: the bytecode VM, the expression evaluator and the operator
//! semantics they share.

pub mod interpreter;
pub mod ops;
pub mod vm;

pub use interpreter::{evaluate, Interpreter};
pub use vm::{HostFunction, HostFunctions, State, Vm, VmConfig};
