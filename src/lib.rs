//! Fel: a small embeddable scripting language.
//!
//! Source goes through [`frontend`] (lexer, parser) into a [`lang::ast`]
//! arena, is lowered by [`bytecode`] into packed commands and executed by
//! [`runtime::vm`]. Every stage reports into one [`diagnostics::Log`].
//!
//! ```no_run
//! use fel::{Fel, Log};
//!
//! let mut fel = Fel::new();
//! fel.set_function("print", |state| {
//!     let line: String = state.args().iter().map(|v| v.to_string()).collect();
//!     println!("{}", line);
//!     0
//! });
//!
//! let mut log = Log::new();
//! fel.load_and_run_string("print('hello ', 42);", "hello.fel", &mut log);
//! if !log.is_empty() {
//!     eprint!("{}", log);
//! }
//! ```

pub mod bytecode;
pub mod diagnostics;
pub mod fel;
pub mod frontend;
pub mod lang;
pub mod runtime;

pub use crate::diagnostics::{DiagnosticKind, Log};
pub use crate::fel::Fel;
pub use crate::lang::value::Value;
pub use crate::runtime::vm::{State, VmConfig};
