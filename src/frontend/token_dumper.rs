use crate::frontend::token::{Token, TokenKind};

pub struct TokenDumper {
    pub color: bool,
    pub show_debug_repr: bool, // if false, prints the lexeme instead of the literal
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self {
            color: true,
            show_debug_repr: true,
        }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const GRN: &'static str = "\x1b[32m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";
    const BLU: &'static str = "\x1b[34m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.show_debug_repr = false;
        self
    }

    pub fn dump(&self, tokens: &[Token]) {
        print!("{}", self.render(tokens));
    }

    pub fn render(&self, tokens: &[Token]) -> String {
        let mut out = String::new();
        for t in tokens {
            self.render_one(&mut out, t);
        }
        out
    }

    fn render_one(&self, out: &mut String, t: &Token) {
        let line = t.location.line;
        let col = t.location.column;

        let group = Self::group(t.kind);
        let colr = if self.color { Self::color(t.kind) } else { "" };
        let reset = if self.color { Self::RESET } else { "" };

        let detail = match (&t.literal, self.show_debug_repr) {
            (Some(value), true) => format!("{:?}", value),
            _ => t.lexeme.clone(),
        };

        out.push_str(&format!(
            "[{:02}:{:02}] {}{:<8} {:?} {}{}\n",
            line, col, colr, group, t.kind, detail, reset
        ));
    }

    fn group(kind: TokenKind) -> &'static str {
        use TokenKind::*;
        match kind {
            Unknown => "UNKNOWN",
            EndOfStream => "EOF",

            Int | Number => "NUMBER",
            String => "STRING",

            Identifier => "IDENT",

            BeginBrace | EndBrace => "BRACE",
            OpenParen | CloseParen => "PAREN",
            OpenBracket | CloseBracket => "BRACKET",

            Plus | Minus | Mult | Div | Mod | Not | BitNot | And | Or | BitAnd | BitOr => "OP",
            Equal | NotEqual | Less | LessEqual | Greater | GreaterEqual => "CMP",
            Comma | Colon | Term | Dot | DotDot | Assign => "PUNCT",

            KeywordIf | KeywordElse | KeywordFor | KeywordFun | KeywordVar | KeywordReturn
            | KeywordWhile | KeywordTrue | KeywordFalse | KeywordNull => "KEYWORD",
        }
    }

    fn color(kind: TokenKind) -> &'static str {
        use TokenKind::*;
        match kind {
            Unknown | EndOfStream => Self::DIM,
            String => Self::GRN,
            Int | Number => Self::CYN,
            Identifier => Self::YEL,
            Equal | NotEqual | Less | LessEqual | Greater | GreaterEqual => Self::MAG,
            Plus | Minus | Mult | Div | Mod | Not | BitNot | And | Or | BitAnd | BitOr => Self::MAG,
            k if k.is_keyword() => Self::BLU,
            _ => Self::RESET,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::{get_all_tokens_in_file, LexerReader};

    #[test]
    fn test_render_plain() {
        let mut reader = LexerReader::new("var x = 'a';", "source");
        let tokens = get_all_tokens_in_file(&mut reader);
        let out = TokenDumper::new().no_color().pretty().render(&tokens);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "[01:01] KEYWORD  KeywordVar var");
        assert_eq!(lines[3], "[01:09] STRING   String 'a'");
    }

    #[test]
    fn test_render_literal_values() {
        let mut reader = LexerReader::new("2.5", "source");
        let tokens = get_all_tokens_in_file(&mut reader);
        let out = TokenDumper::new().no_color().render(&tokens);
        assert_eq!(out, "[01:01] NUMBER   Number Number(2.5)\n");
    }
}
