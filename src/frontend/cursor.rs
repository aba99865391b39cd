use std::rc::Rc;

use crate::lang::location::Location;

/// Character-addressable view over one source buffer.
///
/// Reading `\n` moves to the next line and resets the column counter to 0;
/// every other read increments it. [`Cursor::location`] reports the position
/// of the next unread character, so the first character of a line is at
/// column 1.
pub struct Cursor {
    source: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    file: Rc<str>,
}

impl Cursor {
    pub fn new(source: &str, file: &str) -> Self {
        Cursor {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 0,
            file: Rc::from(file),
        }
    }

    pub fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    pub fn peek_next(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    pub fn read(&mut self) -> Option<char> {
        let ch = self.peek()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        self.pos += 1;
        Some(ch)
    }

    /// Consumes the next character if it is `expected`.
    pub fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.read();
            true
        } else {
            false
        }
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Source text between two offsets.
    pub fn slice(&self, start: usize, end: usize) -> String {
        let end = end.min(self.source.len());
        self.source[start.min(end)..end].iter().collect()
    }

    pub fn location(&self) -> Location {
        Location::new(self.file.clone(), self.line, self.column + 1)
    }

    pub fn file(&self) -> &Rc<str> {
        &self.file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_and_column_tracking() {
        let mut cursor = Cursor::new("ab\ncd", "test");
        assert_eq!(cursor.location().line, 1);
        assert_eq!(cursor.location().column, 1);

        cursor.read();
        cursor.read();
        assert_eq!(cursor.location().column, 3);

        assert_eq!(cursor.read(), Some('\n'));
        let loc = cursor.location();
        assert_eq!((loc.line, loc.column), (2, 1));

        cursor.read();
        assert_eq!(cursor.location().column, 2);
    }

    #[test]
    fn test_read_past_end() {
        let mut cursor = Cursor::new("x", "test");
        assert_eq!(cursor.read(), Some('x'));
        assert!(cursor.is_eof());
        assert_eq!(cursor.read(), None);
        assert_eq!(cursor.peek(), None);
        assert_eq!(cursor.location().column, 2);
    }

    #[test]
    fn test_slice_and_eat() {
        let mut cursor = Cursor::new("==x", "test");
        let start = cursor.offset();
        assert!(cursor.eat('='));
        assert!(cursor.eat('='));
        assert!(!cursor.eat('='));
        assert_eq!(cursor.slice(start, cursor.offset()), "==");
    }
}
