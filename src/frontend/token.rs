use crate::lang::location::Location;
use crate::lang::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Unknown,

    // Delimiters
    BeginBrace,   // {
    EndBrace,     // }
    OpenParen,    // (
    CloseParen,   // )
    OpenBracket,  // [
    CloseBracket, // ]

    // Punctuation and arithmetic
    Plus,
    Minus,
    Mult,
    Div,
    Mod,
    Comma,
    Colon,
    Term, // ;
    Dot,
    DotDot,

    // Comparison and assignment
    Equal,
    NotEqual,
    Assign,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    // Logic and bitwise
    Not,
    BitNot,
    And,
    Or,
    BitAnd,
    BitOr,

    // Literals
    String,
    Int,
    Number,

    Identifier,

    // Keywords
    KeywordIf,
    KeywordElse,
    KeywordFor,
    KeywordFun,
    KeywordVar,
    KeywordReturn,
    KeywordWhile,
    KeywordTrue,
    KeywordFalse,
    KeywordNull,

    EndOfStream,
}

impl TokenKind {
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        let kind = match ident {
            "if" => TokenKind::KeywordIf,
            "else" => TokenKind::KeywordElse,
            "for" => TokenKind::KeywordFor,
            "fun" => TokenKind::KeywordFun,
            "var" => TokenKind::KeywordVar,
            "return" => TokenKind::KeywordReturn,
            "while" => TokenKind::KeywordWhile,
            "true" => TokenKind::KeywordTrue,
            "false" => TokenKind::KeywordFalse,
            "null" => TokenKind::KeywordNull,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::KeywordIf
                | TokenKind::KeywordElse
                | TokenKind::KeywordFor
                | TokenKind::KeywordFun
                | TokenKind::KeywordVar
                | TokenKind::KeywordReturn
                | TokenKind::KeywordWhile
                | TokenKind::KeywordTrue
                | TokenKind::KeywordFalse
                | TokenKind::KeywordNull
        )
    }
}

impl std::fmt::Display for TokenKind {
    /// How the kind is named in diagnostics: the symbol for fixed tokens, a
    /// description for the rest.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TokenKind::Unknown => "unknown",
            TokenKind::BeginBrace => "{",
            TokenKind::EndBrace => "}",
            TokenKind::OpenParen => "(",
            TokenKind::CloseParen => ")",
            TokenKind::OpenBracket => "[",
            TokenKind::CloseBracket => "]",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Mult => "*",
            TokenKind::Div => "/",
            TokenKind::Mod => "%",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Term => ";",
            TokenKind::Dot => ".",
            TokenKind::DotDot => "..",
            TokenKind::Equal => "==",
            TokenKind::NotEqual => "!=",
            TokenKind::Assign => "=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::Not => "!",
            TokenKind::BitNot => "~",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::BitAnd => "&",
            TokenKind::BitOr => "|",
            TokenKind::String => "string",
            TokenKind::Int => "int",
            TokenKind::Number => "number",
            TokenKind::Identifier => "identifier",
            TokenKind::KeywordIf => "if",
            TokenKind::KeywordElse => "else",
            TokenKind::KeywordFor => "for",
            TokenKind::KeywordFun => "fun",
            TokenKind::KeywordVar => "var",
            TokenKind::KeywordReturn => "return",
            TokenKind::KeywordWhile => "while",
            TokenKind::KeywordTrue => "true",
            TokenKind::KeywordFalse => "false",
            TokenKind::KeywordNull => "null",
            TokenKind::EndOfStream => "end of stream",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token, quotes included for strings.
    pub lexeme: String,
    /// Decoded value for `String`, `Int` and `Number` tokens. `None` when a
    /// numeric literal does not fit its type.
    pub literal: Option<Value>,
    pub location: Location,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: String, location: Location) -> Self {
        Token {
            kind,
            lexeme,
            literal: None,
            location,
        }
    }

    pub fn with_literal(mut self, literal: Option<Value>) -> Self {
        self.literal = literal;
        self
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TokenKind::EndOfStream => write!(f, "end of stream"),
            _ => write!(f, "{}", self.lexeme),
        }
    }
}
