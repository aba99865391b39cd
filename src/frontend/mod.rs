//! Source text to syntax tree: cursor, lexer and parser.

pub mod cursor;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod token_dumper;
