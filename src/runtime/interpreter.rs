use crate::diagnostics::{DiagnosticKind, Log};
use crate::lang::ast::{Ast, ExprId, ExprKind, LogicalOp};
use crate::lang::value::Value;
use crate::runtime::ops;

/// Tree-walking evaluator for a single expression.
///
/// Only literals and operators are understood. Anything else, and any
/// operator error, is reported to the log and evaluates to `null`.
pub struct Interpreter<'a> {
    ast: &'a Ast,
    log: &'a mut Log,
}

impl<'a> Interpreter<'a> {
    pub fn new(ast: &'a Ast, log: &'a mut Log) -> Self {
        Self { ast, log }
    }

    pub fn evaluate(&mut self, id: ExprId) -> Value {
        let ast = self.ast;
        let expr = ast.expr(id);

        match &expr.kind {
            ExprKind::Literal(value) => value.clone(),
            ExprKind::Grouping(inner) => self.evaluate(*inner),

            ExprKind::Unary { op, right } => {
                let value = self.evaluate(*right);
                ops::unary(*op, &value).unwrap_or_else(|error| {
                    ops::report_unary(
                        self.log,
                        error,
                        *op,
                        &expr.location,
                        (ast.location(*right), &value),
                    );
                    Value::Null
                })
            }

            ExprKind::Binary { left, op, right } => {
                let a = self.evaluate(*left);
                let b = self.evaluate(*right);
                ops::binary(*op, &a, &b).unwrap_or_else(|error| {
                    ops::report_binary(
                        self.log,
                        error,
                        *op,
                        &expr.location,
                        [(ast.location(*left), &a), (ast.location(*right), &b)],
                    );
                    Value::Null
                })
            }

            ExprKind::Logical { left, op, right } => {
                let a = self.evaluate(*left).is_truthy();
                let decided = match op {
                    LogicalOp::And => !a,
                    LogicalOp::Or => a,
                };
                if decided {
                    Value::Bool(a)
                } else {
                    Value::Bool(self.evaluate(*right).is_truthy())
                }
            }

            ExprKind::Ident(_) => self.unsupported(id, "Variable lookup"),
            ExprKind::FunctionDefinition { .. } => self.unsupported(id, "Function definition"),
            ExprKind::CallFunction { .. } => self.unsupported(id, "Function call"),
            ExprKind::CallArray { .. } => self.unsupported(id, "Array access"),
            ExprKind::DotAccess { .. } => self.unsupported(id, "Member access"),
        }
    }

    fn unsupported(&mut self, id: ExprId, what: &str) -> Value {
        tracing::debug!(what, "expression not supported by the evaluator");
        self.log.add_error(
            self.ast.location(id).clone(),
            DiagnosticKind::UnsupportedExpression,
            vec![what.to_string()],
        );
        Value::Null
    }
}

/// Evaluates `id` in `ast`, reporting problems to `log`.
pub fn evaluate(ast: &Ast, id: ExprId, log: &mut Log) -> Value {
    Interpreter::new(ast, log).evaluate(id)
}
