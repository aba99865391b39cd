use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::ir::CompiledCode;
use crate::bytecode::op::Opcode;
use crate::bytecode::verify::verify;
use crate::diagnostics::{DiagnosticKind, Log};
use crate::lang::ast::{BinaryOp, UnaryOp};
use crate::lang::location::Location;
use crate::lang::value::Value;
use crate::runtime::ops;

/// Resource limits for one run.
#[derive(Debug, Clone)]
pub struct VmConfig {
    pub max_call_depth: usize,
    pub max_stack_size: usize,
    pub max_steps: Option<usize>,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            max_call_depth: 1000,
            max_stack_size: 10_000,
            max_steps: None,
        }
    }
}

/// What a host function sees of the VM during a call.
pub struct State<'s> {
    stack: &'s mut Vec<Value>,
    base: usize,
    arguments: usize,
}

impl<'s> State<'s> {
    /// Number of arguments passed to the call.
    pub fn arguments(&self) -> usize {
        self.arguments
    }

    /// Argument `i`, counting from the first one.
    pub fn get_arg(&self, i: usize) -> Option<&Value> {
        if i < self.arguments {
            self.stack.get(self.base + i)
        } else {
            None
        }
    }

    pub fn args(&self) -> &[Value] {
        let end = (self.base + self.arguments).min(self.stack.len());
        &self.stack[self.base.min(end)..end]
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// The whole operand stack, arguments on top.
    pub fn stack(&mut self) -> &mut Vec<Value> {
        &mut *self.stack
    }
}

/// A host callback. Returns how many values it pushed (0 or 1).
pub type HostFunction = Box<dyn FnMut(&mut State<'_>) -> usize>;

pub type HostFunctions = HashMap<String, HostFunction>;

/// A call into a local function.
#[derive(Debug, Clone, Copy)]
struct Frame {
    return_pc: usize,
    /// Stack height below the call's arguments.
    base: usize,
    returns: bool,
}

/// The run stopped; the reason is already in the log.
struct Halt;

pub struct Vm<'a> {
    code: &'a CompiledCode,
    functions: &'a mut HostFunctions,
    log: &'a mut Log,

    stack: Vec<Value>,
    frames: Vec<Frame>,
    globals: HashMap<Rc<str>, Value>,

    // Safety limits
    config: VmConfig,
    steps: usize,
}

impl<'a> Vm<'a> {
    pub fn new(
        code: &'a CompiledCode,
        functions: &'a mut HostFunctions,
        config: VmConfig,
        log: &'a mut Log,
    ) -> Self {
        Self {
            code,
            functions,
            log,
            stack: Vec::new(),
            frames: Vec::new(),
            globals: HashMap::new(),
            config,
            steps: 0,
        }
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn reset_execution_state(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.steps = 0;
    }

    /// Runs the code from the first instruction. Errors go to the log and stop
    /// the run.
    pub fn run(&mut self) {
        self.reset_execution_state();

        if let Err(e) = verify(self.code) {
            let location = self
                .code
                .debug_at(0)
                .map(|d| d.location.clone())
                .unwrap_or_else(|| Location::unknown("<bytecode>"));
            self.log
                .add_error(location, DiagnosticKind::InternalError, vec![e.to_string()]);
            return;
        }

        tracing::debug!(instructions = self.code.len(), "vm start");
        let result = self.execute();
        tracing::debug!(
            steps = self.steps,
            halted = result.is_err(),
            "vm finished"
        );
    }

    // =========================================================================
    // Execution
    // =========================================================================

    fn location(&self, pc: usize) -> Location {
        self.code
            .debug_at(pc)
            .map(|d| d.location.clone())
            .unwrap_or_else(|| Location::unknown("<bytecode>"))
    }

    fn operand_location(&self, pc: usize, i: usize) -> Location {
        self.code
            .debug_at(pc)
            .and_then(|d| d.operands.get(i).cloned())
            .unwrap_or_else(|| self.location(pc))
    }

    fn fail(&mut self, pc: usize, kind: DiagnosticKind, args: Vec<String>) -> Halt {
        let location = self.location(pc);
        self.log.add_error(location, kind, args);
        Halt
    }

    fn check_limits(&mut self, pc: usize) -> Result<(), Halt> {
        self.steps += 1;

        if let Some(max) = self.config.max_steps {
            if self.steps > max {
                return Err(self.fail(pc, DiagnosticKind::StepLimitExceeded, vec![max.to_string()]));
            }
        }

        if self.stack.len() > self.config.max_stack_size {
            let reason = format!("stack size limit of {} exceeded", self.config.max_stack_size);
            return Err(self.fail(pc, DiagnosticKind::StackOverflow, vec![reason]));
        }

        Ok(())
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self, pc: usize) -> Result<Value, Halt> {
        match self.stack.pop() {
            Some(value) => Ok(value),
            None => Err(self.fail(
                pc,
                DiagnosticKind::InternalError,
                vec!["stack underflow".to_string()],
            )),
        }
    }

    fn string_at(&self, index: usize) -> Rc<str> {
        self.code.strings[index].clone()
    }

    fn execute(&mut self) -> Result<(), Halt> {
        let code = self.code;
        let mut pc: usize = 0;

        while pc < code.len() {
            self.check_limits(pc)?;

            let command = code.instructions[pc];
            let operand = command.operand.index();
            let mut next = pc + 1;

            match command.opcode {
                Opcode::Nop => {}

                // Constants
                Opcode::PushConstInt => self.push(Value::Int(code.ints[operand])),
                Opcode::PushConstNumber => self.push(Value::Number(code.numbers[operand])),
                Opcode::PushConstNull => self.push(Value::Null),
                Opcode::PushConstBool => self.push(Value::Bool(operand != 0)),
                Opcode::PushConstString => self.push(Value::String(self.string_at(operand))),
                Opcode::PushLocalFunction => self.push(Value::Function(command.operand.get())),

                // Globals
                Opcode::PushGlobal => {
                    let name = self.string_at(operand);
                    match self.globals.get(&name) {
                        Some(value) => {
                            let value = value.clone();
                            self.push(value);
                        }
                        None => {
                            return Err(self.fail(
                                pc,
                                DiagnosticKind::UnknownVariable,
                                vec![name.to_string()],
                            ));
                        }
                    }
                }
                Opcode::DefineGlobal => {
                    let value = self.pop(pc)?;
                    let name = self.string_at(operand);
                    self.globals.insert(name, value);
                }
                Opcode::SetGlobal => {
                    let value = self.pop(pc)?;
                    let name = self.string_at(operand);
                    match self.globals.get_mut(&name) {
                        Some(slot) => *slot = value,
                        None => {
                            return Err(self.fail(
                                pc,
                                DiagnosticKind::UnknownVariable,
                                vec![name.to_string()],
                            ));
                        }
                    }
                }

                // Stack
                Opcode::Pop => {
                    if operand > self.stack.len() {
                        return Err(self.fail(
                            pc,
                            DiagnosticKind::InternalError,
                            vec!["stack underflow".to_string()],
                        ));
                    }
                    self.stack.truncate(self.stack.len() - operand);
                }
                Opcode::Dup => {
                    let top = self.pop(pc)?;
                    self.push(top.clone());
                    self.push(top);
                }

                // Control flow
                Opcode::Goto => next = operand,
                Opcode::IfTrueGoto => {
                    if self.pop(pc)?.is_truthy() {
                        next = operand;
                    }
                }
                Opcode::CallFunctionDiscardReturn => next = self.call(pc, operand, false)?,
                Opcode::CallFunctionWithReturn => next = self.call(pc, operand, true)?,
                Opcode::Return => {
                    let value = if operand == 1 {
                        Some(self.pop(pc)?)
                    } else {
                        None
                    };
                    match self.frames.pop() {
                        Some(frame) => {
                            self.stack.truncate(frame.base);
                            if frame.returns {
                                self.push(value.unwrap_or(Value::Null));
                            }
                            next = frame.return_pc;
                        }
                        // top-level return ends the program
                        None => return Ok(()),
                    }
                }

                // Operators
                Opcode::Negate => self.unary(pc, UnaryOp::Negate)?,
                Opcode::Not => self.unary(pc, UnaryOp::Not)?,
                Opcode::BitNot => self.unary(pc, UnaryOp::BitNot)?,
                Opcode::Add => self.binary(pc, BinaryOp::Add)?,
                Opcode::Sub => self.binary(pc, BinaryOp::Sub)?,
                Opcode::Mul => self.binary(pc, BinaryOp::Mul)?,
                Opcode::Div => self.binary(pc, BinaryOp::Div)?,
                Opcode::Mod => self.binary(pc, BinaryOp::Mod)?,
                Opcode::Less => self.binary(pc, BinaryOp::Less)?,
                Opcode::LessEqual => self.binary(pc, BinaryOp::LessEqual)?,
                Opcode::Greater => self.binary(pc, BinaryOp::Greater)?,
                Opcode::GreaterEqual => self.binary(pc, BinaryOp::GreaterEqual)?,
                Opcode::Equal => self.binary(pc, BinaryOp::Equal)?,
                Opcode::NotEqual => self.binary(pc, BinaryOp::NotEqual)?,
                Opcode::BitAnd => self.binary(pc, BinaryOp::BitAnd)?,
                Opcode::BitOr => self.binary(pc, BinaryOp::BitOr)?,
            }

            pc = next;
        }

        Ok(())
    }

    fn unary(&mut self, pc: usize, op: UnaryOp) -> Result<(), Halt> {
        let value = self.pop(pc)?;
        match ops::unary(op, &value) {
            Ok(result) => {
                self.push(result);
                Ok(())
            }
            Err(error) => {
                let location = self.location(pc);
                let at = self.operand_location(pc, 0);
                ops::report_unary(self.log, error, op, &location, (&at, &value));
                Err(Halt)
            }
        }
    }

    fn binary(&mut self, pc: usize, op: BinaryOp) -> Result<(), Halt> {
        let b = self.pop(pc)?;
        let a = self.pop(pc)?;
        match ops::binary(op, &a, &b) {
            Ok(result) => {
                self.push(result);
                Ok(())
            }
            Err(error) => {
                let location = self.location(pc);
                let left = self.operand_location(pc, 0);
                let right = self.operand_location(pc, 1);
                ops::report_binary(
                    self.log,
                    error,
                    op,
                    &location,
                    [(&left, &a), (&right, &b)],
                );
                Err(Halt)
            }
        }
    }

    /// Calls the value on top of the stack with `arguments` values below it.
    /// Returns the next pc.
    fn call(&mut self, pc: usize, arguments: usize, returns: bool) -> Result<usize, Halt> {
        let callee = self.pop(pc)?;
        if arguments > self.stack.len() {
            return Err(self.fail(
                pc,
                DiagnosticKind::InternalError,
                vec!["stack underflow".to_string()],
            ));
        }
        let base = self.stack.len() - arguments;

        match callee {
            Value::String(name) => {
                tracing::trace!(name = &*name, arguments, "host call");
                let pushed = match self.functions.get_mut(&*name) {
                    Some(function) => {
                        let mut state = State {
                            stack: &mut self.stack,
                            base,
                            arguments,
                        };
                        function(&mut state)
                    }
                    None => {
                        tracing::debug!(name = &*name, "unknown host function");
                        return Err(self.fail(
                            pc,
                            DiagnosticKind::UnknownFunction,
                            vec![name.to_string()],
                        ));
                    }
                };

                let result = if pushed > 0 && self.stack.len() > base + arguments {
                    self.stack.pop()
                } else {
                    None
                };
                self.stack.truncate(base);
                if returns {
                    self.push(result.unwrap_or(Value::Null));
                }
                Ok(pc + 1)
            }

            Value::Function(entry) => {
                if self.frames.len() >= self.config.max_call_depth {
                    let reason = format!(
                        "call depth limit of {} exceeded",
                        self.config.max_call_depth
                    );
                    return Err(self.fail(pc, DiagnosticKind::StackOverflow, vec![reason]));
                }
                tracing::trace!(entry, depth = self.frames.len() + 1, "local call");
                self.frames.push(Frame {
                    return_pc: pc + 1,
                    base,
                    returns,
                });
                Ok(entry as usize)
            }

            other => Err(self.fail(
                pc,
                DiagnosticKind::UnknownFunction,
                vec![other.to_string()],
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compile::compile;
    use crate::frontend::lexer::LexerReader;
    use crate::frontend::parser::parse;
    use std::cell::RefCell;

    fn compiled(source: &str) -> CompiledCode {
        let mut log = Log::new();
        let mut reader = LexerReader::new(source, "vm.fel");
        let program = parse(&mut reader, &mut log).unwrap();
        let code = compile(&program, &mut log);
        assert!(log.is_empty(), "{}", log);
        code
    }

    fn host(f: impl FnMut(&mut State<'_>) -> usize + 'static) -> HostFunction {
        Box::new(f)
    }

    /// Host table with a `print` that records its joined arguments.
    fn recording() -> (HostFunctions, Rc<RefCell<Vec<String>>>) {
        let out = Rc::new(RefCell::new(Vec::new()));
        let sink = out.clone();
        let mut functions = HostFunctions::new();
        functions.insert(
            "print".to_string(),
            host(move |state| {
                let line: String = state.args().iter().map(|v| v.to_string()).collect();
                sink.borrow_mut().push(line);
                0
            }),
        );
        (functions, out)
    }

    fn run_with(source: &str, config: VmConfig) -> (Vec<String>, Log) {
        let code = compiled(source);
        let (mut functions, out) = recording();
        let mut log = Log::new();
        Vm::new(&code, &mut functions, config, &mut log).run();
        let lines = out.borrow().clone();
        (lines, log)
    }

    fn run(source: &str) -> (Vec<String>, Log) {
        run_with(source, VmConfig::default())
    }

    #[test]
    fn test_host_call_receives_arguments() {
        let (out, log) = run("print('a', 1, 2.5, true, null);");
        assert!(log.is_empty());
        assert_eq!(out, vec!["a12.5truenull"]);
    }

    #[test]
    fn test_unknown_function() {
        let (out, log) = run("missing(); print('not reached');");
        assert!(out.is_empty());
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries[0].message(), "missing is not a function");
        assert_eq!(log.entries[0].location.line, 1);
    }

    #[test]
    fn test_return_value_reconciliation() {
        let code = compiled("var x = nothing(); var y = one(); one();");
        let mut functions = HostFunctions::new();
        functions.insert("nothing".to_string(), host(|_| 0));
        functions.insert(
            "one".to_string(),
            host(|state| {
                state.push(Value::Int(1));
                1
            }),
        );
        let mut log = Log::new();
        let mut vm = Vm::new(&code, &mut functions, VmConfig::default(), &mut log);
        vm.run();
        assert_eq!(vm.global("x"), Some(&Value::Null));
        assert_eq!(vm.global("y"), Some(&Value::Int(1)));
        assert!(vm.stack().is_empty());
    }

    #[test]
    fn test_get_arg() {
        let code = compiled("var r = second(10, 20);");
        let mut functions = HostFunctions::new();
        functions.insert(
            "second".to_string(),
            host(|state| {
                assert_eq!(state.arguments(), 2);
                assert_eq!(state.get_arg(2), None);
                let value = state.get_arg(1).cloned().unwrap_or(Value::Null);
                state.push(value);
                1
            }),
        );
        let mut log = Log::new();
        let mut vm = Vm::new(&code, &mut functions, VmConfig::default(), &mut log);
        vm.run();
        assert_eq!(vm.global("r"), Some(&Value::Int(20)));
    }

    #[test]
    fn test_globals_and_arithmetic() {
        let (out, log) = run("var a = 2; a = a * 3 + 1; print(a, ' ', a / 2.0);");
        assert!(log.is_empty(), "{}", log);
        assert_eq!(out, vec!["7 3.5"]);
    }

    #[test]
    fn test_unknown_variable() {
        let (_, log) = run("print(nope);");
        assert_eq!(log.entries[0].message(), "nope is not defined");

        let (_, log) = run("nope = 1;");
        assert_eq!(log.entries[0].kind, DiagnosticKind::UnknownVariable);
    }

    #[test]
    fn test_if_else_and_while() {
        let (out, log) = run(
            "var i = 0;
             while (i < 3) {
                 if (i == 1) print('one'); else print(i);
                 i = i + 1;
             }",
        );
        assert!(log.is_empty(), "{}", log);
        assert_eq!(out, vec!["0", "one", "2"]);
    }

    #[test]
    fn test_local_functions() {
        let (out, log) = run(
            "var twice = fun() { print('hi'); print('hi'); };
             twice();
             var answer = fun() return 42;;
             print(answer());
             var nothing = fun() return;;
             print(nothing());",
        );
        assert!(log.is_empty(), "{}", log);
        assert_eq!(out, vec!["hi", "hi", "42", "null"]);
    }

    #[test]
    fn test_short_circuit() {
        let (out, log) = run(
            "var t = fun() { print('t'); return true; };
             var f = fun() { print('f'); return false; };
             print(f() && t());
             print(t() || f());
             print(t() && 0);",
        );
        assert!(log.is_empty(), "{}", log);
        assert_eq!(out, vec!["f", "false", "t", "true", "t", "true"]);
    }

    #[test]
    fn test_operator_error_notes_operands() {
        let (out, log) = run("print(1 + 'b');");
        assert!(out.is_empty());
        assert_eq!(log.entries[0].kind, DiagnosticKind::InvalidBinaryOperation);
        assert_eq!(log.entries[1].message(), "This evaluates to int: 1");
        assert_eq!(log.entries[1].location.column, 7);
        assert_eq!(log.entries[2].message(), "This evaluates to string: b");
        assert_eq!(log.entries[2].location.column, 11);
    }

    #[test]
    fn test_calling_a_non_function() {
        let (_, log) = run("var x = 3; x();");
        assert_eq!(log.entries[0].message(), "3 is not a function");
    }

    #[test]
    fn test_top_level_return_stops() {
        let (out, log) = run("print('a'); return; print('b');");
        assert!(log.is_empty());
        assert_eq!(out, vec!["a"]);
    }

    #[test]
    fn test_call_depth_limit() {
        let config = VmConfig {
            max_call_depth: 50,
            ..VmConfig::default()
        };
        let (_, log) = run_with("var f = fun() f();; f();", config);
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries[0].kind, DiagnosticKind::StackOverflow);
        assert_eq!(
            log.entries[0].message(),
            "Stack overflow: call depth limit of 50 exceeded"
        );
    }

    #[test]
    fn test_step_limit() {
        let config = VmConfig {
            max_steps: Some(100),
            ..VmConfig::default()
        };
        let (_, log) = run_with("while (true) ;", config);
        assert_eq!(log.len(), 1);
        assert_eq!(
            log.entries[0].message(),
            "Execution step limit of 100 exceeded"
        );
    }

    #[test]
    fn test_unverified_code_is_rejected() {
        let mut code = compiled("print('x');");
        code.strings.clear();
        let (mut functions, out) = recording();
        let mut log = Log::new();
        Vm::new(&code, &mut functions, VmConfig::default(), &mut log).run();
        assert!(out.borrow().is_empty());
        assert_eq!(log.entries[0].kind, DiagnosticKind::InternalError);
    }
}
