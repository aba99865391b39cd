use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// A position in a source file.
///
/// `line` and `column` are 1-based. The file name is shared between every
/// token and node of a file instead of being copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: Rc<str>,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(file: Rc<str>, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }

    /// Location used for diagnostics that have no source position, such as a
    /// file that failed to open.
    pub fn unknown(file: &str) -> Self {
        Self {
            file: Rc::from(file),
            line: 0,
            column: 0,
        }
    }
}

impl std::fmt::Display for Location {
    /// Formats as `file(line:column)`, the prefix used by log entries.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}:{})", self.file, self.line, self.column)
    }
}
