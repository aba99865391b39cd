use std::collections::{BTreeSet, HashMap};

use crate::bytecode::ir::CompiledCode;
use crate::bytecode::op::{Command, Opcode};

/// Print disassembly of a compiled program
pub fn print_bc(code: &CompiledCode) {
    println!("=== BYTECODE PROGRAM ===\n");
    println!("════════════════════════════════════════");
    println!(" {} instructions", code.instructions.len());
    println!(
        " pools: {} string(s), {} int(s), {} number(s)",
        code.strings.len(),
        code.ints.len(),
        code.numbers.len()
    );
    println!("════════════════════════════════════════");
    print!("{}", disassemble_to_string(code));
    println!();
}

/// Return disassembly as a String
pub fn disassemble_to_string(code: &CompiledCode) -> String {
    let mut output = String::new();
    let jump_targets = collect_jump_targets(code);
    let entries = collect_function_entries(code);

    for (ip, &command) in code.instructions.iter().enumerate() {
        if entries.contains(&ip) {
            output.push_str(&format!("      ┌─── fun @{:04} ───────────────────────\n", ip));
        } else if jump_targets.contains(&ip) {
            output.push_str("      ┌──────────────────────────────────\n");
        }

        output.push_str(&format!("{:04} ", ip));

        if jump_targets.contains(&ip) {
            output.push_str("► ");
        } else {
            output.push_str("  ");
        }

        output.push_str(&format_command(code, command, ip));
        if let Some(debug) = code.debug_at(ip) {
            output.push_str(&format!("  ; {}:{}", debug.location.line, debug.location.column));
        }
        output.push('\n');
    }

    output
}

fn collect_jump_targets(code: &CompiledCode) -> BTreeSet<usize> {
    code.instructions
        .iter()
        .filter(|c| c.opcode.is_jump())
        .map(|c| c.operand.index())
        .collect()
}

fn collect_function_entries(code: &CompiledCode) -> BTreeSet<usize> {
    code.instructions
        .iter()
        .filter(|c| c.opcode == Opcode::PushLocalFunction)
        .map(|c| c.operand.index())
        .collect()
}

fn format_command(code: &CompiledCode, command: Command, ip: usize) -> String {
    let name = op_name(command.opcode);
    let index = command.operand.index();
    let missing = || "<out of range>".to_string();

    match command.opcode {
        Opcode::PushConstInt => {
            let value = code.ints.get(index).map(|i| i.to_string()).unwrap_or_else(missing);
            format!("{:<12}#{} = {}", name, index, value)
        }
        Opcode::PushConstNumber => {
            let value = code
                .numbers
                .get(index)
                .map(|n| format!("{:?}", n))
                .unwrap_or_else(missing);
            format!("{:<12}#{} = {}", name, index, value)
        }
        Opcode::PushConstString => {
            let value = code
                .strings
                .get(index)
                .map(|s| format!("{:?}", &**s))
                .unwrap_or_else(missing);
            format!("{:<12}#{} = {}", name, index, value)
        }
        Opcode::PushGlobal | Opcode::DefineGlobal | Opcode::SetGlobal => {
            let value = code
                .strings
                .get(index)
                .map(|s| s.to_string())
                .unwrap_or_else(missing);
            format!("{:<12}{}", name, value)
        }
        Opcode::PushConstBool => format!("{:<12}{}", name, index != 0),
        Opcode::Goto | Opcode::IfTrueGoto | Opcode::PushLocalFunction => {
            let arrow = if index <= ip { "↑" } else { "↓" };
            format!("{:<12}{} {:04}", name, arrow, index)
        }
        Opcode::Pop
        | Opcode::CallFunctionDiscardReturn
        | Opcode::CallFunctionWithReturn
        | Opcode::Return => format!("{:<12}{}", name, index),
        _ => name.to_string(),
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Print bytecode statistics
pub fn print_bc_stats(code: &CompiledCode) {
    println!("=== BYTECODE STATISTICS ===\n");

    let total_ops = code.instructions.len();
    println!("Instructions:     {}", total_ops);
    println!("Functions:        {}", collect_function_entries(code).len());
    println!();

    println!("Op frequency:");
    let op_counts = count_ops(code);
    let mut counts: Vec<_> = op_counts.iter().collect();
    counts.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

    for (op, count) in counts.iter().take(10) {
        let pct = (**count as f64 / total_ops.max(1) as f64) * 100.0;
        println!("  {:<14} {:>4} ({:>5.1}%)", op, count, pct);
    }
}

fn count_ops(code: &CompiledCode) -> HashMap<&'static str, usize> {
    let mut counts = HashMap::new();
    for command in &code.instructions {
        *counts.entry(op_name(command.opcode)).or_insert(0) += 1;
    }
    counts
}

fn op_name(opcode: Opcode) -> &'static str {
    match opcode {
        Opcode::Nop => "NOP",
        Opcode::PushConstInt => "PUSH_INT",
        Opcode::PushConstNumber => "PUSH_NUMBER",
        Opcode::PushConstNull => "PUSH_NULL",
        Opcode::PushConstBool => "PUSH_BOOL",
        Opcode::PushConstString => "PUSH_STRING",
        Opcode::PushLocalFunction => "PUSH_FUN",
        Opcode::PushGlobal => "PUSH_GLOBAL",
        Opcode::Pop => "POP",
        Opcode::Goto => "GOTO",
        Opcode::IfTrueGoto => "IF_TRUE",
        Opcode::CallFunctionDiscardReturn => "CALL",
        Opcode::CallFunctionWithReturn => "CALL_RET",
        Opcode::DefineGlobal => "DEFINE",
        Opcode::SetGlobal => "SET",
        Opcode::Return => "RETURN",
        Opcode::Add => "ADD",
        Opcode::Sub => "SUB",
        Opcode::Mul => "MUL",
        Opcode::Div => "DIV",
        Opcode::Mod => "MOD",
        Opcode::Less => "LT",
        Opcode::LessEqual => "LE",
        Opcode::Greater => "GT",
        Opcode::GreaterEqual => "GE",
        Opcode::Equal => "EQ",
        Opcode::NotEqual => "NE",
        Opcode::BitAnd => "BIT_AND",
        Opcode::BitOr => "BIT_OR",
        Opcode::Negate => "NEG",
        Opcode::Not => "NOT",
        Opcode::BitNot => "BIT_NOT",
        Opcode::Dup => "DUP",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compile::compile;
    use crate::diagnostics::Log;
    use crate::frontend::lexer::LexerReader;
    use crate::frontend::parser::parse;

    fn compiled(source: &str) -> CompiledCode {
        let mut log = Log::new();
        let mut reader = LexerReader::new(source, "test.fel");
        let program = parse(&mut reader, &mut log).unwrap();
        compile(&program, &mut log)
    }

    #[test]
    fn test_disassemble_host_call() {
        let output = disassemble_to_string(&compiled("dog('rex', 42);"));
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "0000   PUSH_STRING #0 = \"rex\"  ; 1:5");
        assert_eq!(lines[1], "0001   PUSH_INT    #0 = 42  ; 1:12");
        assert_eq!(lines[3], "0003   CALL        2  ; 1:1");
    }

    #[test]
    fn test_jump_targets_are_marked() {
        let output = disassemble_to_string(&compiled("while(x) f();"));
        assert!(output.contains("IF_TRUE     ↓ 0006"));
        assert!(output.contains("GOTO        ↑ 0000"));
        assert!(output.starts_with("      ┌──"));
        assert!(output.contains("0000 ► PUSH_GLOBAL x"));
    }

    #[test]
    fn test_function_entries_are_labelled() {
        let output = disassemble_to_string(&compiled("var f = fun() return;;"));
        assert!(output.contains("┌─── fun @0001"));
        assert!(output.contains("0003 ► PUSH_FUN    ↑ 0001"));
    }

    #[test]
    fn test_op_counts() {
        let counts = count_ops(&compiled("a(); b(); c(1 + 2);"));
        assert_eq!(counts.get("CALL"), Some(&3));
        assert_eq!(counts.get("PUSH_INT"), Some(&2));
        assert_eq!(counts.get("ADD"), Some(&1));
    }
}
