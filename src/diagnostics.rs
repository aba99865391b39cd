//! Diagnostic log shared by every stage of the pipeline.
//!
//! The lexer, parser, compiler and VM all append to one [`Log`]. A stage never
//! throws past its boundary: callers check [`Log::is_empty`] before handing
//! work to the next stage.

use crate::lang::location::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Note => write!(f, "Note"),
            Severity::Warning => write!(f, "Warning"),
            Severity::Error => write!(f, "Error"),
        }
    }
}

/// What went wrong. Each kind has a message template filled from the entry's
/// arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    // lexer
    EosInString,
    EosInComment,
    InvalidEscapeCharacter,
    UnknownCharacter,

    // parser
    UnexpectedSymbol,
    InvalidSymbol,
    MissingCloseParen,
    ExpectedExpression,
    UnableToParseNumber,
    InvalidParserState,
    NestingTooDeep,

    // compiler
    InvalidAssignmentTarget,
    UnsupportedExpression,

    // runtime
    InvalidOperationOnNull,
    InvalidBinaryOperation,
    InvalidUnaryOperation,
    DivisionByZero,
    ThisEvaluatesTo,
    UnknownFunction,
    UnknownVariable,
    StackOverflow,
    StepLimitExceeded,

    FailedToOpenFile,
    InternalError,
}

/// One accumulated diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub location: Location,
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub arguments: Vec<String>,
    /// Grammar rules active when the parser reported the entry, outermost
    /// first. Empty outside the parser.
    pub debug_context: Vec<String>,
}

impl Entry {
    fn arg(&self, i: usize) -> &str {
        self.arguments
            .get(i)
            .map(String::as_str)
            .unwrap_or("<missing argument>")
    }

    /// The templated message, without the location prefix.
    pub fn message(&self) -> String {
        use DiagnosticKind::*;
        match self.kind {
            EosInString => "'End Of Stream' detected in string".to_string(),
            EosInComment => "'End Of Stream' detected in block comment".to_string(),
            InvalidEscapeCharacter => format!("Invalid escape character \\{}", self.arg(0)),
            UnknownCharacter => format!("Unknown character {}", self.arg(0)),
            UnexpectedSymbol => format!(
                "Unexpected symbol {}, expected {}",
                self.arg(1),
                self.arg(0)
            ),
            InvalidSymbol => format!("Invalid symbol {}", self.arg(0)),
            MissingCloseParen => format!("Missing ), found {}", self.arg(0)),
            ExpectedExpression => format!("Expected expression, found {}", self.arg(0)),
            UnableToParseNumber => format!("Unable to parse {} as a number", self.arg(0)),
            InvalidParserState => format!("Invalid parser state: {}", self.arg(0)),
            NestingTooDeep => format!("Nesting deeper than {} levels", self.arg(0)),
            InvalidAssignmentTarget => format!("Unable to assign to {}", self.arg(0)),
            UnsupportedExpression => {
                format!("{} is not supported here", self.arg(0))
            }
            InvalidOperationOnNull => format!("Invalid operation {} on null", self.arg(0)),
            InvalidBinaryOperation => format!("Invalid binary operation {}", self.arg(0)),
            InvalidUnaryOperation => format!("Invalid unary operation {}", self.arg(0)),
            DivisionByZero => format!("Division by zero in {}", self.arg(0)),
            ThisEvaluatesTo => {
                format!("This evaluates to {}: {}", self.arg(0), self.arg(1))
            }
            UnknownFunction => format!("{} is not a function", self.arg(0)),
            UnknownVariable => format!("{} is not defined", self.arg(0)),
            StackOverflow => format!("Stack overflow: {}", self.arg(0)),
            StepLimitExceeded => format!("Execution step limit of {} exceeded", self.arg(0)),
            FailedToOpenFile => format!("Failed to open file {}: {}", self.arg(0), self.arg(1)),
            InternalError => format!("Internal error: {}", self.arg(0)),
        }
    }

    /// The parser rule trail, `statement->value->call arguments`.
    pub fn context_trail(&self) -> String {
        self.debug_context.join("->")
    }
}

impl std::fmt::Display for Entry {
    /// `file(line:column) Severity: message`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.location, self.severity, self.message())
    }
}

/// Accumulates entries across lexing, parsing, compiling and running.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Log {
    pub entries: Vec<Entry>,
}

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, location: Location, kind: DiagnosticKind, args: Vec<String>) {
        self.add(location, Severity::Error, kind, args, Vec::new());
    }

    /// Error reported from inside the parser, with the active rule names.
    pub fn add_error_with_context(
        &mut self,
        location: Location,
        kind: DiagnosticKind,
        args: Vec<String>,
        debug_context: Vec<String>,
    ) {
        self.add(location, Severity::Error, kind, args, debug_context);
    }

    pub fn add_note(&mut self, location: Location, kind: DiagnosticKind, args: Vec<String>) {
        self.add(location, Severity::Note, kind, args, Vec::new());
    }

    fn add(
        &mut self,
        location: Location,
        severity: Severity,
        kind: DiagnosticKind,
        arguments: Vec<String>,
        debug_context: Vec<String>,
    ) {
        tracing::debug!(?kind, %location, ?arguments, "diagnostic");
        self.entries.push(Entry {
            location,
            severity,
            kind,
            arguments,
            debug_context,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.entries
            .iter()
            .filter(|e| e.severity == severity)
            .count()
    }

    /// True if any entry has the given kind.
    pub fn contains(&self, kind: DiagnosticKind) -> bool {
        self.entries.iter().any(|e| e.kind == kind)
    }
}

impl std::fmt::Display for Log {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}", entry)?;
        }
        writeln!(
            f,
            "{} error(s) and {} warning(s) detected.",
            self.error_count(),
            self.warning_count()
        )
    }
}
