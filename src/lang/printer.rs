//! Pretty printers for the AST.
//!
//! [`print_program`] produces source text that parses back to the same tree.
//! [`print_sexpr`] renders a single expression fully parenthesized, which is
//! handy for checking precedence.

use super::ast::{Ast, ExprId, ExprKind, Program, StmtId, StmtKind};
use super::value::Value;

const INDENT: &str = "    ";

/// Prints every top-level statement of a program, one per line.
pub fn print_program(program: &Program) -> String {
    let mut printer = Printer::new(&program.ast);
    for &stmt in program.statements() {
        printer.stmt(stmt);
    }
    printer.out
}

pub fn print_statement(ast: &Ast, stmt: StmtId) -> String {
    let mut printer = Printer::new(ast);
    printer.stmt(stmt);
    printer.out
}

pub fn print_expression(ast: &Ast, expr: ExprId) -> String {
    let mut printer = Printer::new(ast);
    printer.expr(expr);
    printer.out
}

/// `1 + 2 * 3` becomes `(+ 1 (* 2 3))`.
pub fn print_sexpr(ast: &Ast, expr: ExprId) -> String {
    match &ast.expr(expr).kind {
        ExprKind::Binary { left, op, right } => {
            parenthesize(ast, op.symbol(), &[*left, *right])
        }
        ExprKind::Logical { left, op, right } => {
            parenthesize(ast, op.symbol(), &[*left, *right])
        }
        ExprKind::Unary { op, right } => parenthesize(ast, op.symbol(), &[*right]),
        ExprKind::Grouping(inner) => parenthesize(ast, "group", &[*inner]),
        _ => print_expression(ast, expr),
    }
}

fn parenthesize(ast: &Ast, name: &str, exprs: &[ExprId]) -> String {
    let mut out = format!("({}", name);
    for &e in exprs {
        out.push(' ');
        out.push_str(&print_sexpr(ast, e));
    }
    out.push(')');
    out
}

/// Literal as it would be written in source.
fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => {
            let mut out = String::with_capacity(s.len() + 2);
            out.push('"');
            for c in s.chars() {
                match c {
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\r' => out.push_str("\\r"),
                    '\t' => out.push_str("\\t"),
                    '"' => out.push_str("\\\""),
                    c => out.push(c),
                }
            }
            out.push('"');
            out
        }
        // keep a fraction so the literal lexes back as a number
        Value::Number(n) => {
            let text = n.to_string();
            if text.chars().all(|c| c.is_ascii_digit() || c == '-') {
                format!("{}.0", text)
            } else {
                text
            }
        }
        other => other.to_string(),
    }
}

struct Printer<'a> {
    ast: &'a Ast,
    out: String,
    indent: usize,
}

impl<'a> Printer<'a> {
    fn new(ast: &'a Ast) -> Self {
        Self {
            ast,
            out: String::new(),
            indent: 0,
        }
    }

    fn begin_line(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
    }

    fn end_line(&mut self) {
        self.out.push('\n');
    }

    fn write(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn stmt(&mut self, id: StmtId) {
        let ast = self.ast;
        match &ast.stmt(id).kind {
            StmtKind::Null => {
                self.begin_line();
                self.write(";");
                self.end_line();
            }
            StmtKind::Declaration { name, value } => {
                self.begin_line();
                self.write("var ");
                self.write(name);
                self.write(" = ");
                self.expr(*value);
                self.write(";");
                self.end_line();
            }
            StmtKind::List(stmts) => {
                self.begin_line();
                self.write("{");
                self.end_line();
                self.block_body(stmts);
                self.begin_line();
                self.write("}");
                self.end_line();
            }
            StmtKind::Return => {
                self.begin_line();
                self.write("return;");
                self.end_line();
            }
            StmtKind::ReturnValue(value) => {
                self.begin_line();
                self.write("return ");
                self.expr(*value);
                self.write(";");
                self.end_line();
            }
            StmtKind::ConditionIf {
                condition,
                body,
                else_body,
            } => {
                self.begin_line();
                self.write("if(");
                self.expr(*condition);
                self.write(")");
                self.end_line();
                self.nested(*body);
                if let Some(else_body) = else_body {
                    self.begin_line();
                    self.write("else");
                    self.end_line();
                    self.nested(*else_body);
                }
            }
            StmtKind::While { condition, body } => {
                self.begin_line();
                self.write("while(");
                self.expr(*condition);
                self.write(")");
                self.end_line();
                self.nested(*body);
            }
            StmtKind::Expression(value) => {
                self.begin_line();
                self.expr(*value);
                self.write(";");
                self.end_line();
            }
            StmtKind::Assign { lhs, rhs } => {
                self.begin_line();
                self.expr(*lhs);
                self.write(" = ");
                self.expr(*rhs);
                self.write(";");
                self.end_line();
            }
        }
    }

    fn block_body(&mut self, stmts: &[StmtId]) {
        self.indent += 1;
        for &s in stmts {
            self.stmt(s);
        }
        self.indent -= 1;
    }

    /// Body of an `if`/`while`: blocks stay at the current level, single
    /// statements are indented.
    fn nested(&mut self, body: StmtId) {
        let ast = self.ast;
        if matches!(ast.stmt(body).kind, StmtKind::List(_)) {
            self.stmt(body);
        } else {
            self.indent += 1;
            self.stmt(body);
            self.indent -= 1;
        }
    }

    fn args(&mut self, args: &[ExprId]) {
        for (i, &arg) in args.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.expr(arg);
        }
    }

    fn expr(&mut self, id: ExprId) {
        let ast = self.ast;
        match &ast.expr(id).kind {
            ExprKind::Binary { left, op, right } => {
                self.expr(*left);
                self.write(" ");
                self.write(op.symbol());
                self.write(" ");
                self.expr(*right);
            }
            ExprKind::Logical { left, op, right } => {
                self.expr(*left);
                self.write(" ");
                self.write(op.symbol());
                self.write(" ");
                self.expr(*right);
            }
            ExprKind::Unary { op, right } => {
                self.write(op.symbol());
                self.expr(*right);
            }
            ExprKind::Grouping(inner) => {
                self.write("(");
                self.expr(*inner);
                self.write(")");
            }
            ExprKind::Literal(value) => {
                let text = literal(value);
                self.write(&text);
            }
            ExprKind::Ident(name) => self.write(name),
            ExprKind::FunctionDefinition { body } => {
                self.write("fun() ");
                match &ast.stmt(*body).kind {
                    StmtKind::List(stmts) => {
                        self.write("{");
                        self.end_line();
                        self.block_body(stmts);
                        self.begin_line();
                        self.write("}");
                    }
                    _ => {
                        let inline = print_statement(ast, *body);
                        self.write(inline.trim_end());
                    }
                }
            }
            ExprKind::CallFunction { callee, args } => {
                self.expr(*callee);
                self.write("(");
                self.args(args);
                self.write(")");
            }
            ExprKind::CallArray { callee, args } => {
                self.expr(*callee);
                self.write("[");
                self.args(args);
                self.write("]");
            }
            ExprKind::DotAccess { parent, child } => {
                self.expr(*parent);
                self.write(".");
                self.expr(*child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::location::Location;
    use std::rc::Rc;

    fn here() -> Location {
        Location::new(Rc::from("test"), 1, 1)
    }

    #[test]
    fn test_print_literals() {
        let mut ast = Ast::new();
        let s = ast.add_expr(ExprKind::Literal(Value::string("a\"b\n")), here());
        let n = ast.add_expr(ExprKind::Literal(Value::Number(2.0)), here());
        let f = ast.add_expr(ExprKind::Literal(Value::Number(1.5)), here());

        assert_eq!(print_expression(&ast, s), r#""a\"b\n""#);
        assert_eq!(print_expression(&ast, n), "2.0");
        assert_eq!(print_expression(&ast, f), "1.5");
    }

    #[test]
    fn test_print_nested_block() {
        let mut ast = Ast::new();
        let callee = ast.add_expr(ExprKind::Ident("cat".to_string()), here());
        let call = ast.add_expr(
            ExprKind::CallFunction {
                callee,
                args: vec![],
            },
            here(),
        );
        let inner = ast.add_stmt(StmtKind::Expression(call), here());
        let block = ast.add_stmt(StmtKind::List(vec![inner]), here());

        assert_eq!(print_statement(&ast, block), "{\n    cat();\n}\n");
    }
}
