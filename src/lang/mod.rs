//! # Fel language model
//!
//! Source locations, runtime values and the AST shared by the frontend, the
//! bytecode compiler and the tree-walking evaluator.

pub mod ast;
pub mod location;
pub mod printer;
pub mod value;
