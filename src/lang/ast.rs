//! # Fel Abstract Syntax Tree
//!
//! The parser builds one [`Ast`] arena per compilation unit. Nodes never own
//! each other directly: children are referenced by [`ExprId`] / [`StmtId`],
//! which keeps ownership acyclic and lets a whole program be serialized in one
//! go.

use serde::{Deserialize, Serialize};

use super::location::Location;
use super::value::Value;

/// Index of an expression node in an [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExprId(u32);

/// Index of a statement node in an [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StmtId(u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl StmtId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ───────────────────────────── Operators ─────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    BitAnd,
    BitOr,
}

impl BinaryOp {
    /// Surface syntax of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

/// Short-circuiting operators. Kept apart from [`BinaryOp`] because the right
/// operand is evaluated conditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        }
    }
}

// ───────────────────────────── Expressions ─────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// `left op right`. The node location is the operator's.
    Binary {
        left: ExprId,
        op: BinaryOp,
        right: ExprId,
    },

    /// `left && right`, `left || right`.
    Logical {
        left: ExprId,
        op: LogicalOp,
        right: ExprId,
    },

    Unary {
        op: UnaryOp,
        right: ExprId,
    },

    /// `( inner )`
    Grouping(ExprId),

    Literal(Value),

    Ident(String),

    /// `fun() <statement>`
    FunctionDefinition {
        body: StmtId,
    },

    /// `callee(args...)`
    CallFunction {
        callee: ExprId,
        args: Vec<ExprId>,
    },

    /// `callee[args...]`
    CallArray {
        callee: ExprId,
        args: Vec<ExprId>,
    },

    /// `parent.child`, where the parser always makes `child` an identifier.
    DotAccess {
        parent: ExprId,
        child: ExprId,
    },
}

// ───────────────────────────── Statements ─────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// A lone `;`.
    Null,

    /// `var name = value;`
    Declaration {
        name: String,
        value: ExprId,
    },

    /// `{ ... }`, and the program root.
    List(Vec<StmtId>),

    /// `return;`
    Return,

    /// `return value;`
    ReturnValue(ExprId),

    /// `if (condition) body [else else_body]`
    ConditionIf {
        condition: ExprId,
        body: StmtId,
        else_body: Option<StmtId>,
    },

    /// `while (condition) body`
    While {
        condition: ExprId,
        body: StmtId,
    },

    /// `value;`
    Expression(ExprId),

    /// `lhs = rhs;`
    Assign {
        lhs: ExprId,
        rhs: ExprId,
    },
}

// ───────────────────────────── Arena ─────────────────────────────

/// Flat storage for every node of one compilation unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ast {
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_expr(&mut self, kind: ExprKind, location: Location) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(Expr { kind, location });
        id
    }

    pub fn add_stmt(&mut self, kind: StmtKind, location: Location) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(Stmt { kind, location });
        id
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    /// Location of an expression, for diagnostics.
    pub fn location(&self, id: ExprId) -> &Location {
        &self.expr(id).location
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }
}

/// A parsed compilation unit: the arena plus its top-level block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub ast: Ast,
    /// Always a [`StmtKind::List`].
    pub root: StmtId,
}

impl Program {
    /// Top-level statements in source order.
    pub fn statements(&self) -> &[StmtId] {
        match &self.ast.stmt(self.root).kind {
            StmtKind::List(stmts) => stmts,
            _ => &[],
        }
    }
}
