use crate::diagnostics::{DiagnosticKind, Log};
use crate::frontend::cursor::Cursor;
use crate::frontend::token::{Token, TokenKind};
use crate::lang::location::Location;
use crate::lang::value::Value;

/// Turns a source buffer into tokens on demand.
///
/// Lexing never fails: problems are recorded in the lexer's own [`Log`] and a
/// best-effort token is still produced. Callers collect them with
/// [`Lexer::take_log`].
pub struct Lexer {
    cursor: Cursor,
    log: Log,
}

impl Lexer {
    pub fn new(source: &str, file: &str) -> Self {
        Lexer {
            cursor: Cursor::new(source, file),
            log: Log::new(),
        }
    }

    /// Diagnostics gathered so far. The lexer's log is left empty.
    pub fn take_log(&mut self) -> Log {
        std::mem::take(&mut self.log)
    }

    pub fn file(&self) -> &str {
        self.cursor.file()
    }

    fn error(&mut self, location: Location, kind: DiagnosticKind, args: Vec<String>) {
        tracing::debug!(?kind, %location, "lexer error");
        self.log.add_error(location, kind, args);
    }

    /// Skips whitespace, line comments and (nested) block comments.
    fn skip_trivia(&mut self) {
        loop {
            match (self.cursor.peek(), self.cursor.peek_next()) {
                (Some(' ' | '\t' | '\r' | '\n'), _) => {
                    self.cursor.read();
                }
                (Some('/'), Some('/')) => {
                    while let Some(ch) = self.cursor.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.cursor.read();
                    }
                }
                (Some('/'), Some('*')) => self.skip_block_comment(),
                _ => return,
            }
        }
    }

    fn skip_block_comment(&mut self) {
        let start = self.cursor.location();
        self.cursor.read();
        self.cursor.read();

        let mut depth = 1usize;
        while depth > 0 {
            match (self.cursor.peek(), self.cursor.peek_next()) {
                (None, _) => {
                    self.error(start, DiagnosticKind::EosInComment, vec![]);
                    return;
                }
                (Some('/'), Some('*')) => {
                    self.cursor.read();
                    self.cursor.read();
                    depth += 1;
                }
                (Some('*'), Some('/')) => {
                    self.cursor.read();
                    self.cursor.read();
                    depth -= 1;
                }
                _ => {
                    self.cursor.read();
                }
            }
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();

        let location = self.cursor.location();
        let start = self.cursor.offset();

        let Some(ch) = self.cursor.read() else {
            return Token::new(TokenKind::EndOfStream, String::new(), location);
        };

        let kind = match ch {
            '{' => TokenKind::BeginBrace,
            '}' => TokenKind::EndBrace,
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            '[' => TokenKind::OpenBracket,
            ']' => TokenKind::CloseBracket,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Mult,
            '/' => TokenKind::Div,
            '%' => TokenKind::Mod,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Term,
            '~' => TokenKind::BitNot,
            '.' => self.one_or_two('.', TokenKind::Dot, TokenKind::DotDot),
            '=' => self.one_or_two('=', TokenKind::Assign, TokenKind::Equal),
            '!' => self.one_or_two('=', TokenKind::Not, TokenKind::NotEqual),
            '<' => self.one_or_two('=', TokenKind::Less, TokenKind::LessEqual),
            '>' => self.one_or_two('=', TokenKind::Greater, TokenKind::GreaterEqual),
            '&' => self.one_or_two('&', TokenKind::BitAnd, TokenKind::And),
            '|' => self.one_or_two('|', TokenKind::BitOr, TokenKind::Or),
            '\'' | '"' => return self.read_string(ch, start, location),
            c if c.is_ascii_digit() => return self.read_number(start, location),
            c if c.is_ascii_alphabetic() || c == '_' => {
                return self.read_identifier(start, location);
            }
            c => {
                self.error(
                    location.clone(),
                    DiagnosticKind::UnknownCharacter,
                    vec![c.to_string()],
                );
                TokenKind::Unknown
            }
        };

        let lexeme = self.cursor.slice(start, self.cursor.offset());
        Token::new(kind, lexeme, location)
    }

    fn one_or_two(&mut self, second: char, single: TokenKind, double: TokenKind) -> TokenKind {
        if self.cursor.eat(second) {
            double
        } else {
            single
        }
    }

    fn read_string(&mut self, quote: char, start: usize, location: Location) -> Token {
        let mut text = String::new();
        loop {
            match self.cursor.peek() {
                None | Some('\n') | Some('\t') => {
                    self.error(location.clone(), DiagnosticKind::EosInString, vec![]);
                    break;
                }
                Some(c) if c == quote => {
                    self.cursor.read();
                    break;
                }
                Some('\\') => {
                    let escape_at = self.cursor.location();
                    self.cursor.read();
                    match self.cursor.peek() {
                        Some('\\') => text.push('\\'),
                        Some('n') => text.push('\n'),
                        Some('r') => text.push('\r'),
                        Some('t') => text.push('\t'),
                        Some('\'') => text.push('\''),
                        Some('"') => text.push('"'),
                        None => {
                            self.error(location.clone(), DiagnosticKind::EosInString, vec![]);
                            break;
                        }
                        Some(other) => {
                            self.error(
                                escape_at,
                                DiagnosticKind::InvalidEscapeCharacter,
                                vec![other.to_string()],
                            );
                        }
                    }
                    self.cursor.read();
                }
                Some(c) => {
                    text.push(c);
                    self.cursor.read();
                }
            }
        }

        let lexeme = self.cursor.slice(start, self.cursor.offset());
        Token::new(TokenKind::String, lexeme, location).with_literal(Some(Value::string(&text)))
    }

    fn read_number(&mut self, start: usize, location: Location) -> Token {
        while self.cursor.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.cursor.read();
        }

        // `1.` and `1..2` stay integers followed by a dot token
        let is_fraction = self.cursor.peek() == Some('.')
            && self.cursor.peek_next().is_some_and(|c| c.is_ascii_digit());
        if is_fraction {
            self.cursor.read();
            while self.cursor.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.cursor.read();
            }
        }

        let lexeme = self.cursor.slice(start, self.cursor.offset());
        if is_fraction {
            let literal = lexeme
                .parse::<f32>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Value::Number);
            Token::new(TokenKind::Number, lexeme, location).with_literal(literal)
        } else {
            let literal = lexeme.parse::<i32>().ok().map(Value::Int);
            Token::new(TokenKind::Int, lexeme, location).with_literal(literal)
        }
    }

    fn read_identifier(&mut self, start: usize, location: Location) -> Token {
        while self
            .cursor
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.cursor.read();
        }

        let lexeme = self.cursor.slice(start, self.cursor.offset());
        let kind = TokenKind::keyword(&lexeme).unwrap_or(TokenKind::Identifier);
        Token::new(kind, lexeme, location)
    }
}

/// A [`Lexer`] with one token of lookahead.
pub struct LexerReader {
    lexer: Lexer,
    peeked: Option<Token>,
    previous: Option<Token>,
}

impl LexerReader {
    pub fn new(source: &str, file: &str) -> Self {
        LexerReader {
            lexer: Lexer::new(source, file),
            peeked: None,
            previous: None,
        }
    }

    pub fn peek(&mut self) -> &Token {
        self.peeked.get_or_insert_with(|| self.lexer.next_token())
    }

    pub fn read(&mut self) -> Token {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.lexer.next_token(),
        };
        tracing::trace!(kind = ?token.kind, lexeme = %token.lexeme, "token");
        self.previous = Some(token.clone());
        token
    }

    /// The last token returned by [`LexerReader::read`].
    pub fn previous(&self) -> Option<&Token> {
        self.previous.as_ref()
    }

    pub fn file(&self) -> &str {
        self.lexer.file()
    }

    /// Lexer diagnostics gathered so far.
    pub fn take_log(&mut self) -> Log {
        self.lexer.take_log()
    }
}

/// Reads every remaining token, excluding the final `EndOfStream`.
pub fn get_all_tokens_in_file(reader: &mut LexerReader) -> Vec<Token> {
    let mut tokens = Vec::new();
    while reader.peek().kind != TokenKind::EndOfStream {
        tokens.push(reader.read());
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> (Vec<Token>, Log) {
        let mut reader = LexerReader::new(source, "source");
        let tokens = get_all_tokens_in_file(&mut reader);
        (tokens, reader.take_log())
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).0.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_empty_sources() {
        for source in ["", " ", "\n\t\n", "/* comment */", "// comment"] {
            let (tokens, log) = lex(source);
            assert!(tokens.is_empty(), "tokens for {:?}", source);
            assert!(log.is_empty(), "log for {:?}", source);
        }
    }

    #[test]
    fn test_nested_comments() {
        let (tokens, log) = lex("/* outer /* inner */ still-outer */ x");
        assert!(log.is_empty());
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].lexeme, "x");
    }

    #[test]
    fn test_unclosed_block_comment() {
        let (tokens, log) = lex("f(); /*some comment*");
        assert_eq!(tokens.len(), 4);
        assert!(log.contains(DiagnosticKind::EosInComment));
    }

    #[test]
    fn test_comments_between_tokens() {
        assert_eq!(
            kinds("/*hello*/f/*is it*/(/*me you're*/)/*looking*/;// for?"),
            vec![
                TokenKind::Identifier,
                TokenKind::OpenParen,
                TokenKind::CloseParen,
                TokenKind::Term,
            ]
        );
    }

    #[test]
    fn test_operators_greedy() {
        assert_eq!(
            kinds(". .. = == ! != < <= > >= & && | || ~ %"),
            vec![
                TokenKind::Dot,
                TokenKind::DotDot,
                TokenKind::Assign,
                TokenKind::Equal,
                TokenKind::Not,
                TokenKind::NotEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::BitAnd,
                TokenKind::And,
                TokenKind::BitOr,
                TokenKind::Or,
                TokenKind::BitNot,
                TokenKind::Mod,
            ]
        );
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(
            kinds("{}()[]+-*/,:;"),
            vec![
                TokenKind::BeginBrace,
                TokenKind::EndBrace,
                TokenKind::OpenParen,
                TokenKind::CloseParen,
                TokenKind::OpenBracket,
                TokenKind::CloseBracket,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Mult,
                TokenKind::Div,
                TokenKind::Comma,
                TokenKind::Colon,
                TokenKind::Term,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let (tokens, log) = lex(r"'a\'b'");
        assert!(log.is_empty());
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].literal, Some(Value::string("a'b")));
        assert_eq!(tokens[0].lexeme, r"'a\'b'");

        let (tokens, log) = lex(r#""\\ \n \r \t \"""#);
        assert!(log.is_empty());
        assert_eq!(tokens[0].literal, Some(Value::string("\\ \n \r \t \"")));
    }

    #[test]
    fn test_quotes_nest_the_other_kind() {
        let (tokens, _) = lex(r#"'"dog"' "'cat'""#);
        assert_eq!(tokens[0].literal, Some(Value::string("\"dog\"")));
        assert_eq!(tokens[1].literal, Some(Value::string("'cat'")));
    }

    #[test]
    fn test_unterminated_string() {
        let (tokens, log) = lex("'abc");
        assert!(log.contains(DiagnosticKind::EosInString));
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].literal, Some(Value::string("abc")));
    }

    #[test]
    fn test_newline_and_tab_end_a_string() {
        let (tokens, log) = lex("'dog\nx");
        assert!(log.contains(DiagnosticKind::EosInString));
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].location.line, 2);

        let (_, log) = lex("'dog\t'");
        assert!(log.contains(DiagnosticKind::EosInString));
    }

    #[test]
    fn test_invalid_escape() {
        let (tokens, log) = lex(r"'do\g'");
        assert!(log.contains(DiagnosticKind::InvalidEscapeCharacter));
        assert_eq!(log.entries[0].arguments, vec!["g".to_string()]);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].literal, Some(Value::string("do")));
    }

    #[test]
    fn test_numbers() {
        let (tokens, log) = lex("42 3.5 7.x 1..2");
        assert!(log.is_empty());
        let summary: Vec<_> = tokens
            .iter()
            .map(|t| (t.kind, t.literal.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (TokenKind::Int, Some(Value::Int(42))),
                (TokenKind::Number, Some(Value::Number(3.5))),
                (TokenKind::Int, Some(Value::Int(7))),
                (TokenKind::Dot, None),
                (TokenKind::Identifier, None),
                (TokenKind::Int, Some(Value::Int(1))),
                (TokenKind::DotDot, None),
                (TokenKind::Int, Some(Value::Int(2))),
            ]
        );
    }

    #[test]
    fn test_int_overflow_has_no_literal() {
        let (tokens, log) = lex("99999999999");
        assert!(log.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Int);
        assert_eq!(tokens[0].literal, None);
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("if else for fun var return while true false null iffy _x9"),
            vec![
                TokenKind::KeywordIf,
                TokenKind::KeywordElse,
                TokenKind::KeywordFor,
                TokenKind::KeywordFun,
                TokenKind::KeywordVar,
                TokenKind::KeywordReturn,
                TokenKind::KeywordWhile,
                TokenKind::KeywordTrue,
                TokenKind::KeywordFalse,
                TokenKind::KeywordNull,
                TokenKind::Identifier,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn test_unknown_character() {
        let (tokens, log) = lex("a @ b");
        assert_eq!(tokens[1].kind, TokenKind::Unknown);
        assert_eq!(tokens[1].lexeme, "@");
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries[0].message(), "Unknown character @");
        assert_eq!(log.entries[0].location.column, 3);
    }

    #[test]
    fn test_locations() {
        let (tokens, _) = lex("var x = 1;\n  dog(x);");
        let positions: Vec<_> = tokens
            .iter()
            .map(|t| (t.location.line, t.location.column))
            .collect();
        assert_eq!(
            positions,
            vec![
                (1, 1),
                (1, 5),
                (1, 7),
                (1, 9),
                (1, 10),
                (2, 3),
                (2, 6),
                (2, 7),
                (2, 8),
                (2, 9),
            ]
        );
        assert!(tokens.iter().all(|t| &*t.location.file == "source"));
    }

    #[test]
    fn test_end_of_stream_repeats() {
        let mut reader = LexerReader::new("x", "source");
        assert_eq!(reader.read().kind, TokenKind::Identifier);
        assert_eq!(reader.read().kind, TokenKind::EndOfStream);
        assert_eq!(reader.read().kind, TokenKind::EndOfStream);
        assert_eq!(reader.peek().kind, TokenKind::EndOfStream);
    }

    #[test]
    fn test_reader_peek_and_previous() {
        let mut reader = LexerReader::new("a b", "source");
        assert!(reader.previous().is_none());
        assert_eq!(reader.peek().lexeme, "a");
        assert_eq!(reader.peek().lexeme, "a");
        assert_eq!(reader.read().lexeme, "a");
        assert_eq!(reader.previous().map(|t| t.lexeme.as_str()), Some("a"));
        assert_eq!(reader.peek().lexeme, "b");
    }
}
