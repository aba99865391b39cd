use std::collections::HashSet;
use std::rc::Rc;

use crate::bytecode::ir::{CompiledCode, DebugInfo};
use crate::bytecode::op::{Command, Opcode, Operand};
use crate::diagnostics::{DiagnosticKind, Log};
use crate::lang::ast::{
    Ast, BinaryOp, ExprId, ExprKind, LogicalOp, Program, StmtId, StmtKind, UnaryOp,
};
use crate::lang::location::Location;
use crate::lang::printer::print_expression;
use crate::lang::value::Value;

/// Lowers a parsed program to bytecode in one forward pass.
///
/// Problems are reported to the log; the returned code is only meaningful
/// when nothing was added.
pub fn compile(program: &Program, log: &mut Log) -> CompiledCode {
    let mut compiler = Compiler::new(&program.ast, log);
    compiler.compile_statement(program.root);
    compiler.finish()
}

pub struct Compiler<'a> {
    ast: &'a Ast,
    log: &'a mut Log,

    /// Output bytecode program
    code: CompiledCode,

    /// Names introduced with `var` so far. Calls through any other plain
    /// name go to the host.
    globals: HashSet<String>,
}

impl<'a> Compiler<'a> {
    pub fn new(ast: &'a Ast, log: &'a mut Log) -> Self {
        Self {
            ast,
            log,
            code: CompiledCode::new(),
            globals: HashSet::new(),
        }
    }

    pub fn finish(self) -> CompiledCode {
        tracing::debug!(
            instructions = self.code.instructions.len(),
            strings = self.code.strings.len(),
            ints = self.code.ints.len(),
            numbers = self.code.numbers.len(),
            "compiled"
        );
        self.code
    }

    // =========================================================================
    // Emission
    // =========================================================================

    fn here(&self) -> usize {
        self.code.instructions.len()
    }

    fn operand(&mut self, value: usize, location: &Location) -> Operand {
        match Operand::new(value) {
            Ok(operand) => operand,
            Err(e) => {
                self.log.add_error(
                    location.clone(),
                    DiagnosticKind::InternalError,
                    vec![e.to_string()],
                );
                Operand::ZERO
            }
        }
    }

    fn emit_with_operands(
        &mut self,
        opcode: Opcode,
        operand: usize,
        location: &Location,
        operands: Vec<Location>,
    ) -> usize {
        let operand = self.operand(operand, location);
        let pc = self.here();
        self.code.instructions.push(Command::new(opcode, operand));
        self.code.debug.push(DebugInfo {
            location: location.clone(),
            operands,
        });
        pc
    }

    fn emit(&mut self, opcode: Opcode, operand: usize, location: &Location) -> usize {
        self.emit_with_operands(opcode, operand, location, Vec::new())
    }

    /// Points the jump at `pc` to the next instruction to be emitted.
    fn patch_to_here(&mut self, pc: usize) {
        let target = self.here();
        let location = self.code.debug[pc].location.clone();
        let operand = self.operand(target, &location);
        self.code.instructions[pc].operand = operand;
    }

    // constant pools, one slot per use

    fn add_string(&mut self, s: &str) -> usize {
        self.code.strings.push(Rc::from(s));
        self.code.strings.len() - 1
    }

    fn add_int(&mut self, i: i32) -> usize {
        self.code.ints.push(i);
        self.code.ints.len() - 1
    }

    fn add_number(&mut self, n: f32) -> usize {
        self.code.numbers.push(n);
        self.code.numbers.len() - 1
    }

    fn error(&mut self, location: &Location, kind: DiagnosticKind, arg: String) {
        self.log.add_error(location.clone(), kind, vec![arg]);
    }

    // =========================================================================
    // Statements
    // =========================================================================

    pub fn compile_statement(&mut self, id: StmtId) {
        let ast = self.ast;
        let stmt = ast.stmt(id);
        let location = &stmt.location;

        match &stmt.kind {
            StmtKind::Null => {}

            StmtKind::Declaration { name, value } => {
                self.globals.insert(name.clone());
                self.compile_expression(*value);
                let slot = self.add_string(name);
                self.emit(Opcode::DefineGlobal, slot, location);
            }

            StmtKind::List(stmts) => {
                for &s in stmts {
                    self.compile_statement(s);
                }
            }

            StmtKind::Return => {
                self.emit(Opcode::Return, 0, location);
            }

            StmtKind::ReturnValue(value) => {
                self.compile_expression(*value);
                self.emit(Opcode::Return, 1, location);
            }

            StmtKind::ConditionIf {
                condition,
                body,
                else_body,
            } => {
                self.compile_expression(*condition);
                self.emit(Opcode::Not, 0, location);
                let skip_body = self.emit(Opcode::IfTrueGoto, 0, location);
                self.compile_statement(*body);
                match else_body {
                    Some(else_body) => {
                        let skip_else = self.emit(Opcode::Goto, 0, location);
                        self.patch_to_here(skip_body);
                        self.compile_statement(*else_body);
                        self.patch_to_here(skip_else);
                    }
                    None => self.patch_to_here(skip_body),
                }
            }

            StmtKind::While { condition, body } => {
                let start = self.here();
                self.compile_expression(*condition);
                self.emit(Opcode::Not, 0, location);
                let exit = self.emit(Opcode::IfTrueGoto, 0, location);
                self.compile_statement(*body);
                self.emit(Opcode::Goto, start, location);
                self.patch_to_here(exit);
            }

            StmtKind::Expression(value) => {
                if let ExprKind::CallFunction { callee, args } = &ast.expr(*value).kind {
                    self.compile_call(*value, *callee, args, false);
                } else {
                    self.compile_expression(*value);
                    self.emit(Opcode::Pop, 1, location);
                }
            }

            StmtKind::Assign { lhs, rhs } => match &ast.expr(*lhs).kind {
                ExprKind::Ident(name) => {
                    self.compile_expression(*rhs);
                    let slot = self.add_string(name);
                    self.emit(Opcode::SetGlobal, slot, location);
                }
                _ => {
                    let target = print_expression(ast, *lhs);
                    self.error(
                        ast.location(*lhs),
                        DiagnosticKind::InvalidAssignmentTarget,
                        target,
                    );
                }
            },
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// Compiles `id` so that it leaves exactly one value on the stack.
    pub fn compile_expression(&mut self, id: ExprId) {
        let ast = self.ast;
        let expr = ast.expr(id);
        let location = &expr.location;

        match &expr.kind {
            ExprKind::Literal(value) => self.compile_literal(value, location),

            ExprKind::Ident(name) => {
                let slot = self.add_string(name);
                self.emit(Opcode::PushGlobal, slot, location);
            }

            ExprKind::Grouping(inner) => self.compile_expression(*inner),

            ExprKind::Unary { op, right } => {
                self.compile_expression(*right);
                let opcode = match op {
                    UnaryOp::Negate => Opcode::Negate,
                    UnaryOp::Not => Opcode::Not,
                    UnaryOp::BitNot => Opcode::BitNot,
                };
                let operands = vec![ast.location(*right).clone()];
                self.emit_with_operands(opcode, 0, location, operands);
            }

            ExprKind::Binary { left, op, right } => {
                self.compile_expression(*left);
                self.compile_expression(*right);
                let operands = vec![ast.location(*left).clone(), ast.location(*right).clone()];
                self.emit_with_operands(binary_opcode(*op), 0, location, operands);
            }

            // left; dup; [not;] if-true-goto end; pop; right; end: not; not
            ExprKind::Logical { left, op, right } => {
                self.compile_expression(*left);
                self.emit(Opcode::Dup, 0, location);
                if *op == LogicalOp::And {
                    self.emit(Opcode::Not, 0, location);
                }
                let short_circuit = self.emit(Opcode::IfTrueGoto, 0, location);
                self.emit(Opcode::Pop, 1, location);
                self.compile_expression(*right);
                self.patch_to_here(short_circuit);
                self.emit(Opcode::Not, 0, location);
                self.emit(Opcode::Not, 0, location);
            }

            ExprKind::FunctionDefinition { body } => {
                let skip = self.emit(Opcode::Goto, 0, location);
                let entry = self.here();
                self.compile_statement(*body);
                self.emit(Opcode::Return, 0, location);
                self.patch_to_here(skip);
                self.emit(Opcode::PushLocalFunction, entry, location);
            }

            ExprKind::CallFunction { callee, args } => {
                self.compile_call(id, *callee, args, true);
            }

            ExprKind::CallArray { .. } => {
                self.error(
                    location,
                    DiagnosticKind::UnsupportedExpression,
                    "Array access".to_string(),
                );
                self.emit(Opcode::PushConstNull, 0, location);
            }

            ExprKind::DotAccess { .. } => match dotted_name(ast, id) {
                Some(name) => {
                    let slot = self.add_string(&name);
                    self.emit(Opcode::PushGlobal, slot, location);
                }
                None => {
                    self.error(
                        location,
                        DiagnosticKind::UnsupportedExpression,
                        "Member access".to_string(),
                    );
                    self.emit(Opcode::PushConstNull, 0, location);
                }
            },
        }
    }

    fn compile_literal(&mut self, value: &Value, location: &Location) {
        match value {
            Value::Null => {
                self.emit(Opcode::PushConstNull, 0, location);
            }
            Value::Bool(b) => {
                self.emit(Opcode::PushConstBool, *b as usize, location);
            }
            Value::Int(i) => {
                let slot = self.add_int(*i);
                self.emit(Opcode::PushConstInt, slot, location);
            }
            Value::Number(n) => {
                let slot = self.add_number(*n);
                self.emit(Opcode::PushConstNumber, slot, location);
            }
            Value::String(s) => {
                let slot = self.add_string(s);
                self.emit(Opcode::PushConstString, slot, location);
            }
            Value::Function(entry) => {
                self.emit(Opcode::PushLocalFunction, *entry as usize, location);
            }
        }
    }

    /// Arguments left to right, then the callee, then the call.
    fn compile_call(&mut self, call: ExprId, callee: ExprId, args: &[ExprId], returns: bool) {
        let ast = self.ast;
        for &arg in args {
            self.compile_expression(arg);
        }

        let callee_location = ast.location(callee);
        match (&ast.expr(callee).kind, dotted_name(ast, callee)) {
            (ExprKind::Ident(name), _) if self.globals.contains(name) => {
                let slot = self.add_string(name);
                self.emit(Opcode::PushGlobal, slot, callee_location);
            }
            (_, Some(name)) => {
                let slot = self.add_string(&name);
                self.emit(Opcode::PushConstString, slot, callee_location);
            }
            (_, None) => self.compile_expression(callee),
        }

        let opcode = if returns {
            Opcode::CallFunctionWithReturn
        } else {
            Opcode::CallFunctionDiscardReturn
        };
        self.emit(opcode, args.len(), ast.location(call));
    }
}

fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Mod => Opcode::Mod,
        BinaryOp::Less => Opcode::Less,
        BinaryOp::LessEqual => Opcode::LessEqual,
        BinaryOp::Greater => Opcode::Greater,
        BinaryOp::GreaterEqual => Opcode::GreaterEqual,
        BinaryOp::Equal => Opcode::Equal,
        BinaryOp::NotEqual => Opcode::NotEqual,
        BinaryOp::BitAnd => Opcode::BitAnd,
        BinaryOp::BitOr => Opcode::BitOr,
    }
}

/// `a`, `a.b`, `a.b.c` as a single name; `None` for anything else.
fn dotted_name(ast: &Ast, id: ExprId) -> Option<String> {
    match &ast.expr(id).kind {
        ExprKind::Ident(name) => Some(name.clone()),
        ExprKind::DotAccess { parent, child } => {
            let parent = dotted_name(ast, *parent)?;
            let child = dotted_name(ast, *child)?;
            Some(format!("{}.{}", parent, child))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::verify::verify;
    use crate::frontend::lexer::LexerReader;
    use crate::frontend::parser::parse;

    fn compile_source(source: &str) -> (CompiledCode, Log) {
        let mut log = Log::new();
        let mut reader = LexerReader::new(source, "test.fel");
        let program = parse(&mut reader, &mut log).expect("source should parse");
        let code = compile(&program, &mut log);
        (code, log)
    }

    fn ops(code: &CompiledCode) -> Vec<(Opcode, u32)> {
        code.instructions
            .iter()
            .map(|c| (c.opcode, c.operand.get()))
            .collect()
    }

    #[test]
    fn test_compile_host_call() {
        let (code, log) = compile_source("dog(42);");
        assert!(log.is_empty());
        assert_eq!(
            ops(&code),
            vec![
                (Opcode::PushConstInt, 0),
                (Opcode::PushConstString, 0),
                (Opcode::CallFunctionDiscardReturn, 1),
            ]
        );
        assert_eq!(code.ints, vec![42]);
        assert_eq!(code.strings, vec![Rc::from("dog")]);
    }

    #[test]
    fn test_pools_are_not_deduplicated() {
        let (code, _) = compile_source("f('a'); f('a');");
        let strings: Vec<&str> = code.strings.iter().map(|s| &**s).collect();
        assert_eq!(strings, vec!["a", "f", "a", "f"]);
    }

    #[test]
    fn test_call_used_as_value() {
        let (code, log) = compile_source("f(g());");
        assert!(log.is_empty());
        assert_eq!(
            ops(&code),
            vec![
                (Opcode::PushConstString, 0),
                (Opcode::CallFunctionWithReturn, 0),
                (Opcode::PushConstString, 1),
                (Opcode::CallFunctionDiscardReturn, 1),
            ]
        );
    }

    #[test]
    fn test_dotted_host_name() {
        let (code, log) = compile_source("math.sqrt(4);");
        assert!(log.is_empty());
        assert_eq!(&*code.strings[0], "math.sqrt");
    }

    #[test]
    fn test_declared_callee_uses_global() {
        let (code, log) = compile_source("var f = fun() return 1;; f();");
        assert!(log.is_empty());
        assert_eq!(
            ops(&code),
            vec![
                (Opcode::Goto, 4),
                (Opcode::PushConstInt, 0),
                (Opcode::Return, 1),
                (Opcode::Return, 0),
                (Opcode::PushLocalFunction, 1),
                (Opcode::DefineGlobal, 0),
                (Opcode::PushGlobal, 1),
                (Opcode::CallFunctionDiscardReturn, 0),
            ]
        );
        assert_eq!(verify(&code), Ok(()));
    }

    #[test]
    fn test_if_else_targets() {
        let (code, _) = compile_source("if(x) a(); else b();");
        assert_eq!(
            ops(&code),
            vec![
                (Opcode::PushGlobal, 0),
                (Opcode::Not, 0),
                (Opcode::IfTrueGoto, 6),
                (Opcode::PushConstString, 1),
                (Opcode::CallFunctionDiscardReturn, 0),
                (Opcode::Goto, 8),
                (Opcode::PushConstString, 2),
                (Opcode::CallFunctionDiscardReturn, 0),
            ]
        );
    }

    #[test]
    fn test_while_loops_back() {
        let (code, _) = compile_source("while(x) x = x - 1;");
        let ops = ops(&code);
        assert_eq!(ops[2], (Opcode::IfTrueGoto, 8));
        assert_eq!(ops[7], (Opcode::Goto, 0));
        assert_eq!(ops.len(), 8);
    }

    #[test]
    fn test_logical_and_short_circuits() {
        let (code, _) = compile_source("var r = a && b;");
        assert_eq!(
            ops(&code),
            vec![
                (Opcode::PushGlobal, 0),
                (Opcode::Dup, 0),
                (Opcode::Not, 0),
                (Opcode::IfTrueGoto, 6),
                (Opcode::Pop, 1),
                (Opcode::PushGlobal, 1),
                (Opcode::Not, 0),
                (Opcode::Not, 0),
                (Opcode::DefineGlobal, 2),
            ]
        );
    }

    #[test]
    fn test_operator_debug_info() {
        let (code, _) = compile_source("var r = 1 +\n 'b';");
        let add = &code.debug[2];
        assert_eq!(code.instructions[2].opcode, Opcode::Add);
        assert_eq!(add.operands.len(), 2);
        assert_eq!(add.operands[0].line, 1);
        assert_eq!(add.operands[1].line, 2);
    }

    #[test]
    fn test_invalid_assignment_target() {
        let (_, log) = compile_source("a.b.c[d,e].f(g,h) = i;");
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries[0].kind, DiagnosticKind::InvalidAssignmentTarget);
        assert_eq!(
            log.entries[0].message(),
            "Unable to assign to a.b.c[d, e].f(g, h)"
        );
    }

    #[test]
    fn test_array_access_unsupported() {
        let (_, log) = compile_source("f(a[1]);");
        assert!(log.contains(DiagnosticKind::UnsupportedExpression));
    }

    #[test]
    fn test_compiled_programs_verify() {
        let (code, log) = compile_source(
            "var n = 0; var f = fun() { n = n + 1; return n * 2.5; };\n\
             while(n < 3 || false) { if(!(n == 2)) print(f()); else print(-n); }",
        );
        assert!(log.is_empty(), "{}", log);
        assert_eq!(verify(&code), Ok(()));
    }
}
