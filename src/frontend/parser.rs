use crate::diagnostics::{DiagnosticKind, Log};
use crate::frontend::lexer::LexerReader;
use crate::frontend::token::{Token, TokenKind};
use crate::lang::ast::{
    Ast, BinaryOp, ExprId, ExprKind, LogicalOp, Program, StmtId, StmtKind, UnaryOp,
};
use crate::lang::location::Location;
use crate::lang::value::Value;

/// Marker for a grammar rule that failed. The diagnostic is already in the
/// log when this is returned.
#[derive(Debug)]
struct ParseError;

type ParseResult<T> = Result<T, ParseError>;

/// Binary operator levels from loosest to tightest, below `&&`/`||`.
const BIT_OR: &[(TokenKind, BinaryOp)] = &[(TokenKind::BitOr, BinaryOp::BitOr)];
const BIT_AND: &[(TokenKind, BinaryOp)] = &[(TokenKind::BitAnd, BinaryOp::BitAnd)];
const EQUALITY: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::Equal, BinaryOp::Equal),
    (TokenKind::NotEqual, BinaryOp::NotEqual),
];
const COMPARISON: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::Less, BinaryOp::Less),
    (TokenKind::LessEqual, BinaryOp::LessEqual),
    (TokenKind::Greater, BinaryOp::Greater),
    (TokenKind::GreaterEqual, BinaryOp::GreaterEqual),
];
const TERM: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::Plus, BinaryOp::Add),
    (TokenKind::Minus, BinaryOp::Sub),
];
const FACTOR: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::Mult, BinaryOp::Mul),
    (TokenKind::Div, BinaryOp::Div),
    (TokenKind::Mod, BinaryOp::Mod),
];

/// How many statements and expressions may be open inside each other while
/// parsing.
pub const MAX_NESTING: usize = 128;

/// Deepest node the parser will build. Operator chains like `a+b+c` grow the
/// tree without nesting in the source, so this is looser than [`MAX_NESTING`].
pub const MAX_TREE_DEPTH: u32 = 512;

/// Recursive-descent parser for Fel.
///
/// Builds one [`Ast`] arena. Errors are written to the log with the stack of
/// active rule names and unwind to the nearest statement loop, which skips
/// ahead to a likely statement start and carries on so later errors are
/// reported too.
pub struct Parser<'a> {
    reader: &'a mut LexerReader,
    log: &'a mut Log,
    ast: Ast,
    debug_context: Vec<&'static str>,
    had_error: bool,
    nesting: usize,
    /// Height of every node built so far, indexed like the arena.
    expr_depths: Vec<u32>,
    stmt_depths: Vec<u32>,
}

impl<'a> Parser<'a> {
    pub fn new(reader: &'a mut LexerReader, log: &'a mut Log) -> Self {
        Parser {
            reader,
            log,
            ast: Ast::new(),
            debug_context: Vec::new(),
            had_error: false,
            nesting: 0,
            expr_depths: Vec::new(),
            stmt_depths: Vec::new(),
        }
    }

    /// Parses statements until end of stream. Returns `None` if the lexer or
    /// the parser reported anything.
    pub fn parse(mut self) -> Option<Program> {
        let location = self.peek().location;
        let mut stmts = Vec::new();
        while self.peek_kind() != TokenKind::EndOfStream {
            match self.statement() {
                Ok(stmt) => stmts.push(stmt),
                Err(ParseError) => self.synchronize(false),
            }
        }
        let root = self.ast.add_stmt(StmtKind::List(stmts), location);
        tracing::debug!(
            exprs = self.ast.expr_count(),
            stmts = self.ast.stmt_count(),
            "program built"
        );
        let ast = std::mem::take(&mut self.ast);
        self.finish(Program { ast, root })
    }

    /// Parses a single expression that must span the whole input.
    pub fn parse_expression(mut self) -> Option<(Ast, ExprId)> {
        let result = self.expression().and_then(|expr| {
            self.require(TokenKind::EndOfStream)?;
            Ok(expr)
        });
        match result {
            Ok(expr) => {
                let ast = std::mem::take(&mut self.ast);
                self.finish((ast, expr))
            }
            Err(ParseError) => {
                self.flush_lexer();
                None
            }
        }
    }

    fn finish<T>(&mut self, result: T) -> Option<T> {
        self.flush_lexer();
        if self.had_error {
            tracing::debug!(file = self.reader.file(), "parse failed");
            None
        } else {
            tracing::debug!(file = self.reader.file(), "parsed");
            Some(result)
        }
    }

    // ─────────────────────────── token plumbing ───────────────────────────

    /// Moves lexer diagnostics into the shared log.
    fn flush_lexer(&mut self) {
        let lexed = self.reader.take_log();
        if !lexed.is_empty() {
            self.had_error = true;
            self.log.entries.extend(lexed.entries);
        }
    }

    fn peek(&mut self) -> Token {
        let token = self.reader.peek().clone();
        self.flush_lexer();
        token
    }

    fn peek_kind(&mut self) -> TokenKind {
        let kind = self.reader.peek().kind;
        self.flush_lexer();
        kind
    }

    fn advance(&mut self) -> Token {
        let token = self.reader.read();
        self.flush_lexer();
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn require(&mut self, kind: TokenKind) -> ParseResult<Token> {
        let token = self.peek();
        if token.kind == kind {
            return Ok(self.advance());
        }
        Err(self.error(
            token.location.clone(),
            DiagnosticKind::UnexpectedSymbol,
            vec![kind.to_string(), token.to_string()],
        ))
    }

    fn error(&mut self, location: Location, kind: DiagnosticKind, args: Vec<String>) -> ParseError {
        let context = self.debug_context.iter().map(|s| s.to_string()).collect();
        self.log.add_error_with_context(location, kind, args, context);
        self.had_error = true;
        ParseError
    }

    fn with_context<T>(
        &mut self,
        name: &'static str,
        rule: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        self.debug_context.push(name);
        let result = rule(self);
        self.debug_context.pop();
        result
    }

    /// Runs `rule` one level deeper, failing once [`MAX_NESTING`] levels are
    /// open.
    fn nested<T>(&mut self, rule: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.nesting >= MAX_NESTING {
            let location = self.peek().location;
            return Err(self.error(
                location,
                DiagnosticKind::NestingTooDeep,
                vec![MAX_NESTING.to_string()],
            ));
        }
        self.nesting += 1;
        let result = rule(self);
        self.nesting -= 1;
        result
    }

    fn expr_depth(&self, id: ExprId) -> u32 {
        self.expr_depths[id.index()]
    }

    fn stmt_depth(&self, id: StmtId) -> u32 {
        self.stmt_depths[id.index()]
    }

    fn check_depth(&mut self, depth: u32, location: &Location) -> ParseResult<()> {
        if depth > MAX_TREE_DEPTH {
            return Err(self.error(
                location.clone(),
                DiagnosticKind::NestingTooDeep,
                vec![MAX_TREE_DEPTH.to_string()],
            ));
        }
        Ok(())
    }

    fn add_expr(&mut self, kind: ExprKind, location: Location) -> ParseResult<ExprId> {
        let children = match &kind {
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.expr_depth(*left).max(self.expr_depth(*right))
            }
            ExprKind::Unary { right, .. } => self.expr_depth(*right),
            ExprKind::Grouping(inner) => self.expr_depth(*inner),
            ExprKind::Literal(_) | ExprKind::Ident(_) => 0,
            ExprKind::FunctionDefinition { body } => self.stmt_depth(*body),
            ExprKind::CallFunction { callee, args } | ExprKind::CallArray { callee, args } => args
                .iter()
                .fold(self.expr_depth(*callee), |d, arg| d.max(self.expr_depth(*arg))),
            ExprKind::DotAccess { parent, child } => {
                self.expr_depth(*parent).max(self.expr_depth(*child))
            }
        };
        self.check_depth(children + 1, &location)?;
        self.expr_depths.push(children + 1);
        Ok(self.ast.add_expr(kind, location))
    }

    fn add_stmt(&mut self, kind: StmtKind, location: Location) -> ParseResult<StmtId> {
        let children = match &kind {
            StmtKind::Null | StmtKind::Return => 0,
            StmtKind::Declaration { value, .. } => self.expr_depth(*value),
            StmtKind::List(stmts) => stmts.iter().map(|s| self.stmt_depth(*s)).max().unwrap_or(0),
            StmtKind::ReturnValue(value) | StmtKind::Expression(value) => self.expr_depth(*value),
            StmtKind::ConditionIf {
                condition,
                body,
                else_body,
            } => {
                let branches = else_body.map_or(0, |s| self.stmt_depth(s));
                self.expr_depth(*condition)
                    .max(self.stmt_depth(*body))
                    .max(branches)
            }
            StmtKind::While { condition, body } => {
                self.expr_depth(*condition).max(self.stmt_depth(*body))
            }
            StmtKind::Assign { lhs, rhs } => self.expr_depth(*lhs).max(self.expr_depth(*rhs)),
        };
        self.check_depth(children + 1, &location)?;
        self.stmt_depths.push(children + 1);
        Ok(self.ast.add_stmt(kind, location))
    }

    /// Skips to just after the next `;`, or to the next token that starts a
    /// statement or closes a block. Consumes at least one token, except for a
    /// `}` that `in_block` says belongs to the enclosing block.
    fn synchronize(&mut self, in_block: bool) {
        if in_block && self.peek_kind() == TokenKind::EndBrace {
            tracing::debug!("parser synchronizing at end of block");
            return;
        }
        let skipped = self.advance();
        tracing::debug!(at = %skipped.location, "parser synchronizing");
        if skipped.kind == TokenKind::Term {
            return;
        }
        loop {
            match self.peek_kind() {
                TokenKind::EndOfStream
                | TokenKind::EndBrace
                | TokenKind::KeywordFun
                | TokenKind::KeywordVar
                | TokenKind::KeywordFor
                | TokenKind::KeywordIf
                | TokenKind::KeywordWhile
                | TokenKind::KeywordReturn => return,
                TokenKind::Term => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ─────────────────────────── statements ───────────────────────────

    fn statement(&mut self) -> ParseResult<StmtId> {
        self.nested(|p| {
            p.with_context("statement", |p| {
                let start = p.peek();
                let location = start.location.clone();
                match start.kind {
                    TokenKind::Term => {
                        p.advance();
                        p.add_stmt(StmtKind::Null, location)
                    }
                    TokenKind::BeginBrace => p.block(),
                    TokenKind::KeywordVar => p.declaration(),
                    TokenKind::KeywordReturn => p.return_statement(),
                    TokenKind::KeywordIf => p.if_statement(),
                    TokenKind::KeywordWhile => p.while_statement(),
                    TokenKind::KeywordFor | TokenKind::KeywordElse => Err(p.error(
                        location,
                        DiagnosticKind::InvalidSymbol,
                        vec![start.lexeme],
                    )),
                    _ => p.expression_statement(),
                }
            })
        })
    }

    fn block(&mut self) -> ParseResult<StmtId> {
        self.with_context("block", |p| {
            let open = p.require(TokenKind::BeginBrace)?;
            let mut stmts = Vec::new();
            loop {
                match p.peek_kind() {
                    TokenKind::EndBrace | TokenKind::EndOfStream => break,
                    _ => match p.statement() {
                        Ok(stmt) => stmts.push(stmt),
                        Err(ParseError) => p.synchronize(true),
                    },
                }
            }
            p.require(TokenKind::EndBrace)?;
            p.add_stmt(StmtKind::List(stmts), open.location)
        })
    }

    fn declaration(&mut self) -> ParseResult<StmtId> {
        self.with_context("declaration", |p| {
            let var = p.require(TokenKind::KeywordVar)?;
            let name = p.require(TokenKind::Identifier)?;
            p.require(TokenKind::Assign)?;
            let value = p.expression()?;
            p.require(TokenKind::Term)?;
            p.add_stmt(
                StmtKind::Declaration {
                    name: name.lexeme,
                    value,
                },
                var.location,
            )
        })
    }

    fn return_statement(&mut self) -> ParseResult<StmtId> {
        self.with_context("return", |p| {
            let keyword = p.require(TokenKind::KeywordReturn)?;
            if p.eat(TokenKind::Term) {
                return p.add_stmt(StmtKind::Return, keyword.location);
            }
            let value = p.expression()?;
            p.require(TokenKind::Term)?;
            p.add_stmt(StmtKind::ReturnValue(value), keyword.location)
        })
    }

    fn if_statement(&mut self) -> ParseResult<StmtId> {
        self.with_context("if", |p| {
            let keyword = p.require(TokenKind::KeywordIf)?;
            let condition = p.condition()?;
            let body = p.statement()?;
            let else_body = if p.eat(TokenKind::KeywordElse) {
                Some(p.statement()?)
            } else {
                None
            };
            p.add_stmt(
                StmtKind::ConditionIf {
                    condition,
                    body,
                    else_body,
                },
                keyword.location,
            )
        })
    }

    fn while_statement(&mut self) -> ParseResult<StmtId> {
        self.with_context("while", |p| {
            let keyword = p.require(TokenKind::KeywordWhile)?;
            let condition = p.condition()?;
            let body = p.statement()?;
            p.add_stmt(StmtKind::While { condition, body }, keyword.location)
        })
    }

    /// `( value )`
    fn condition(&mut self) -> ParseResult<ExprId> {
        self.require(TokenKind::OpenParen)?;
        let value = self.expression()?;
        self.require(TokenKind::CloseParen)?;
        Ok(value)
    }

    fn expression_statement(&mut self) -> ParseResult<StmtId> {
        self.with_context("value", |p| {
            let location = p.peek().location;
            let value = p.expression()?;
            if p.eat(TokenKind::Assign) {
                let rhs = p.expression()?;
                p.require(TokenKind::Term)?;
                return p.add_stmt(StmtKind::Assign { lhs: value, rhs }, location);
            }
            p.require(TokenKind::Term)?;
            p.add_stmt(StmtKind::Expression(value), location)
        })
    }

    // ─────────────────────────── expressions ───────────────────────────

    fn expression(&mut self) -> ParseResult<ExprId> {
        self.nested(Self::logical_or)
    }

    fn logical_or(&mut self) -> ParseResult<ExprId> {
        self.logical(TokenKind::Or, LogicalOp::Or, Self::logical_and)
    }

    fn logical_and(&mut self) -> ParseResult<ExprId> {
        self.logical(TokenKind::And, LogicalOp::And, Self::bit_or)
    }

    fn logical(
        &mut self,
        token: TokenKind,
        op: LogicalOp,
        next: fn(&mut Self) -> ParseResult<ExprId>,
    ) -> ParseResult<ExprId> {
        let mut left = next(self)?;
        while self.peek_kind() == token {
            let location = self.advance().location;
            let right = next(self)?;
            left = self.add_expr(ExprKind::Logical { left, op, right }, location)?;
        }
        Ok(left)
    }

    fn bit_or(&mut self) -> ParseResult<ExprId> {
        self.binary(BIT_OR, Self::bit_and)
    }

    fn bit_and(&mut self) -> ParseResult<ExprId> {
        self.binary(BIT_AND, Self::equality)
    }

    fn equality(&mut self) -> ParseResult<ExprId> {
        self.binary(EQUALITY, Self::comparison)
    }

    fn comparison(&mut self) -> ParseResult<ExprId> {
        self.binary(COMPARISON, Self::term)
    }

    fn term(&mut self) -> ParseResult<ExprId> {
        self.binary(TERM, Self::factor)
    }

    fn factor(&mut self) -> ParseResult<ExprId> {
        self.binary(FACTOR, Self::unary)
    }

    /// One left-associative binary level.
    fn binary(
        &mut self,
        ops: &[(TokenKind, BinaryOp)],
        next: fn(&mut Self) -> ParseResult<ExprId>,
    ) -> ParseResult<ExprId> {
        let mut left = next(self)?;
        loop {
            let kind = self.peek_kind();
            let Some(&(_, op)) = ops.iter().find(|(k, _)| *k == kind) else {
                return Ok(left);
            };
            let location = self.advance().location;
            let right = next(self)?;
            left = self.add_expr(ExprKind::Binary { left, op, right }, location)?;
        }
    }

    fn unary(&mut self) -> ParseResult<ExprId> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Not => UnaryOp::Not,
            TokenKind::BitNot => UnaryOp::BitNot,
            _ => return self.primary(),
        };
        let location = self.advance().location;
        let right = self.nested(Self::unary)?;
        self.add_expr(ExprKind::Unary { op, right }, location)
    }

    fn primary(&mut self) -> ParseResult<ExprId> {
        let token = self.peek();
        let location = token.location.clone();
        match token.kind {
            TokenKind::KeywordTrue => self.literal(Value::Bool(true)),
            TokenKind::KeywordFalse => self.literal(Value::Bool(false)),
            TokenKind::KeywordNull => self.literal(Value::Null),
            TokenKind::Int | TokenKind::Number => match token.literal {
                Some(value) => self.literal(value),
                None => Err(self.error(
                    location,
                    DiagnosticKind::UnableToParseNumber,
                    vec![token.lexeme],
                )),
            },
            TokenKind::String => match token.literal {
                Some(value) => self.literal(value),
                None => Err(self.error(
                    location,
                    DiagnosticKind::InvalidParserState,
                    vec!["string token without a value".to_string()],
                )),
            },
            TokenKind::OpenParen => {
                self.advance();
                let inner = self.expression()?;
                let close = self.peek();
                if close.kind != TokenKind::CloseParen {
                    return Err(self.error(
                        close.location.clone(),
                        DiagnosticKind::MissingCloseParen,
                        vec![close.to_string()],
                    ));
                }
                self.advance();
                self.add_expr(ExprKind::Grouping(inner), location)
            }
            TokenKind::Identifier => {
                self.advance();
                let ident = self.add_expr(ExprKind::Ident(token.lexeme), location)?;
                self.postfix(ident)
            }
            TokenKind::KeywordFun => {
                let function = self.function_definition()?;
                self.postfix(function)
            }
            TokenKind::Unknown => Err(self.error(
                location,
                DiagnosticKind::InvalidSymbol,
                vec![token.lexeme],
            )),
            _ => Err(self.error(
                location,
                DiagnosticKind::ExpectedExpression,
                vec![token.to_string()],
            )),
        }
    }

    fn literal(&mut self, value: Value) -> ParseResult<ExprId> {
        let location = self.advance().location;
        self.add_expr(ExprKind::Literal(value), location)
    }

    /// `fun() <statement>`
    fn function_definition(&mut self) -> ParseResult<ExprId> {
        self.with_context("function", |p| {
            let keyword = p.require(TokenKind::KeywordFun)?;
            p.require(TokenKind::OpenParen)?;
            p.require(TokenKind::CloseParen)?;
            let body = p.statement()?;
            p.add_expr(ExprKind::FunctionDefinition { body }, keyword.location)
        })
    }

    /// Calls, indexing and member access following a callable.
    fn postfix(&mut self, mut callee: ExprId) -> ParseResult<ExprId> {
        loop {
            let location = self.ast.location(callee).clone();
            callee = match self.peek_kind() {
                TokenKind::OpenParen => {
                    self.advance();
                    let args = self.arguments(TokenKind::CloseParen)?;
                    self.add_expr(ExprKind::CallFunction { callee, args }, location)?
                }
                TokenKind::OpenBracket => {
                    self.advance();
                    let args = self.arguments(TokenKind::CloseBracket)?;
                    self.add_expr(ExprKind::CallArray { callee, args }, location)?
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.require(TokenKind::Identifier)?;
                    let child = self.add_expr(ExprKind::Ident(name.lexeme), name.location)?;
                    self.add_expr(
                        ExprKind::DotAccess {
                            parent: callee,
                            child,
                        },
                        location,
                    )?
                }
                _ => return Ok(callee),
            };
        }
    }

    /// Comma-separated expressions up to `close`. The opener is consumed.
    fn arguments(&mut self, close: TokenKind) -> ParseResult<Vec<ExprId>> {
        self.with_context("arguments", |p| {
            let mut args = Vec::new();
            if p.eat(close) {
                return Ok(args);
            }
            loop {
                args.push(p.expression()?);
                if !p.eat(TokenKind::Comma) {
                    p.require(close)?;
                    return Ok(args);
                }
            }
        })
    }
}

/// Parses a whole file from `reader`. Lexer and parser diagnostics go to
/// `log`; any of them means no program.
pub fn parse(reader: &mut LexerReader, log: &mut Log) -> Option<Program> {
    Parser::new(reader, log).parse()
}

/// Parses `source` as one expression, for tooling and the evaluator.
pub fn parse_expression(source: &str, file: &str, log: &mut Log) -> Option<(Ast, ExprId)> {
    let mut reader = LexerReader::new(source, file);
    Parser::new(&mut reader, log).parse_expression()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::printer::{print_program, print_sexpr};

    fn parse_source(source: &str) -> (Option<Program>, Log) {
        let mut log = Log::new();
        let mut reader = LexerReader::new(source, "source");
        let program = parse(&mut reader, &mut log);
        (program, log)
    }

    fn roundtrip(source: &str) -> String {
        let (program, log) = parse_source(source);
        assert!(log.is_empty(), "{}", log);
        print_program(&program.unwrap())
    }

    fn sexpr(source: &str) -> String {
        let mut log = Log::new();
        let (ast, expr) = parse_expression(source, "source", &mut log).unwrap();
        print_sexpr(&ast, expr)
    }

    #[test]
    fn test_accepts_valid_programs() {
        let sources = [
            "",
            "dog();",
            "dog(42);",
            "dog('dog', 42);",
            "doggy(dog, doogy, dog);",
            "cat = awesome;",
            "if(dog) dog();",
            "if(cat) { cat(); }",
            "if(why);",
            "if(foo()) {}",
            "a.b.c[d,e].f(g,h) = i;",
            "fun() { return cat; } ().name = 'mittens';",
            "fun() return dog;().name = 'sparky';",
            "var x = 1 + 2 * 3;",
            "while(x < 10) x = x + 1;",
            "if(a) b(); else c();",
            "return;",
        ];
        for source in sources {
            let (program, log) = parse_source(source);
            assert!(log.is_empty(), "{}: {}", source, log);
            assert!(program.is_some(), "{}", source);
        }
    }

    #[test]
    fn test_rejects_invalid_programs() {
        let sources = [
            "a =", "b(", "b(c,", "b(3,);", "b(,);", "b(3,,)", "b(3;4);",
        ];
        for source in sources {
            let (program, log) = parse_source(source);
            assert!(!log.is_empty(), "{}", source);
            assert!(program.is_none(), "{}", source);
        }
    }

    #[test]
    fn test_print_roundtrip() {
        assert_eq!(roundtrip("dog(42);"), "dog(42);\n");
        assert_eq!(roundtrip("cat(); dog();"), "cat();\ndog();\n");
        assert_eq!(
            roundtrip("if(cat) { cat(); } else dog();"),
            "if(cat)\n{\n    cat();\n}\nelse\n    dog();\n"
        );
        assert_eq!(
            roundtrip("fun() return dog;().name = 'sparky';"),
            "fun() return dog;().name = \"sparky\";\n"
        );
    }

    #[test]
    fn test_precedence() {
        assert_eq!(sexpr("1 + 2 * 3"), "(+ 1 (* 2 3))");
        assert_eq!(sexpr("1 - 2 - 3"), "(- (- 1 2) 3)");
        assert_eq!(sexpr("(1 + 2) * 3"), "(* (group (+ 1 2)) 3)");
        assert_eq!(sexpr("a < b == c > d"), "(== (< a b) (> c d))");
        assert_eq!(sexpr("a || b && c"), "(|| a (&& b c))");
        assert_eq!(sexpr("a | b & c"), "(| a (& b c))");
        assert_eq!(sexpr("-a * !b"), "(* (- a) (! b))");
        assert_eq!(sexpr("~~1 % 2"), "(% (~ (~ 1)) 2)");
    }

    #[test]
    fn test_error_location_and_context() {
        let (program, log) = parse_source("var x = 1\ndog();");
        assert!(program.is_none());
        let entry = &log.entries[0];
        assert_eq!(entry.kind, DiagnosticKind::UnexpectedSymbol);
        assert_eq!(entry.message(), "Unexpected symbol dog, expected ;");
        assert_eq!((entry.location.line, entry.location.column), (2, 1));
        assert_eq!(entry.context_trail(), "statement->declaration");
    }

    #[test]
    fn test_recovers_to_report_several_errors() {
        let (program, log) = parse_source("a = ;\nb(,);\nc();\nd(;");
        assert!(program.is_none());
        let lines: Vec<u32> = log.entries.iter().map(|e| e.location.line).collect();
        assert_eq!(lines, vec![1, 2, 4]);
    }

    #[test]
    fn test_recovery_inside_block() {
        let (program, log) = parse_source("{ a(; b(); }\nc(;");
        assert!(program.is_none());
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries[1].location.line, 2);
    }

    #[test]
    fn test_recovery_leaves_closing_brace_to_block() {
        for source in ["{ a = }\nb();", "while (x) { if (y) }\nc();"] {
            let (program, log) = parse_source(source);
            assert!(program.is_none());
            assert_eq!(log.len(), 1, "{}: {}", source, log);
            assert_eq!(log.entries[0].kind, DiagnosticKind::ExpectedExpression);
        }
    }

    #[test]
    fn test_stray_closing_brace() {
        let (program, log) = parse_source("}\na();");
        assert!(program.is_none());
        assert_eq!(log.len(), 1, "{}", log);
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let parens = format!("x = {}1{};", "(".repeat(10_000), ")".repeat(10_000));
        let negations = format!("x = {}1;", "-".repeat(10_000));
        for source in [parens, negations] {
            let (program, log) = parse_source(&source);
            assert!(program.is_none());
            assert_eq!(log.len(), 1, "{}", log);
            assert_eq!(log.entries[0].kind, DiagnosticKind::NestingTooDeep);
            assert_eq!(log.entries[0].message(), "Nesting deeper than 128 levels");
        }

        let (_, log) = parse_source(&"{".repeat(10_000));
        assert!(log.contains(DiagnosticKind::NestingTooDeep));
    }

    #[test]
    fn test_long_operator_chain_is_an_error() {
        let (program, log) = parse_source(&format!("x = 1{};", " + 1".repeat(5_000)));
        assert!(program.is_none());
        assert_eq!(log.len(), 1, "{}", log);
        assert_eq!(log.entries[0].message(), "Nesting deeper than 512 levels");

        let (program, log) = parse_source(&format!("x = a{};", ".b".repeat(5_000)));
        assert!(program.is_none());
        assert!(log.contains(DiagnosticKind::NestingTooDeep));
    }

    #[test]
    fn test_moderate_nesting_parses() {
        let sources = [
            format!("x = {}1{};", "(".repeat(100), ")".repeat(100)),
            format!("x = 1{};", " + 1".repeat(400)),
            format!("{}{}", "{".repeat(100), "}".repeat(100)),
        ];
        for source in sources {
            let (program, log) = parse_source(&source);
            assert!(log.is_empty(), "{}", log);
            assert!(program.is_some());
        }
    }

    #[test]
    fn test_missing_close_paren() {
        let (_, log) = parse_source("x = (1 + 2;");
        assert_eq!(log.entries[0].kind, DiagnosticKind::MissingCloseParen);
        assert_eq!(log.entries[0].message(), "Missing ), found ;");
    }

    #[test]
    fn test_number_out_of_range() {
        let (_, log) = parse_source("f(99999999999);");
        assert_eq!(log.entries[0].kind, DiagnosticKind::UnableToParseNumber);
    }

    #[test]
    fn test_lexer_errors_fail_the_parse() {
        let (program, log) = parse_source("f('dog);");
        assert!(program.is_none());
        assert!(log.contains(DiagnosticKind::EosInString));
    }

    #[test]
    fn test_reserved_and_unknown_symbols() {
        let (_, log) = parse_source("for;");
        assert_eq!(log.entries[0].kind, DiagnosticKind::InvalidSymbol);

        let (_, log) = parse_source("f(@);");
        assert!(log.contains(DiagnosticKind::UnknownCharacter));
        assert!(log.contains(DiagnosticKind::InvalidSymbol));
    }

    #[test]
    fn test_expression_must_span_input() {
        let mut log = Log::new();
        assert!(parse_expression("1 + 2 3", "source", &mut log).is_none());
        assert_eq!(log.entries[0].kind, DiagnosticKind::UnexpectedSymbol);
    }

    #[test]
    fn test_node_locations() {
        let (program, _) = parse_source("x = 1 +\n  2;");
        let program = program.unwrap();
        let StmtKind::Assign { rhs, .. } = &program.ast.stmt(program.statements()[0]).kind else {
            panic!("expected assignment");
        };
        let loc = program.ast.location(*rhs);
        assert_eq!((loc.line, loc.column), (1, 7));
    }
}
