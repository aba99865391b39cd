//! Operator semantics shared by the tree-walking evaluator and the VM.
//!
//! - Int op Int stays Int (wrapping); mixed Int/Number becomes Number.
//! - `+` also concatenates two strings.
//! - `%`, `&`, `|` and `~` take Ints only.
//! - `==`/`!=` compare null, bools and ints; anything else is an error.
//! - A null operand to arithmetic or ordering is its own error.

use crate::diagnostics::{DiagnosticKind, Log};
use crate::lang::ast::{BinaryOp, UnaryOp};
use crate::lang::location::Location;
use crate::lang::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpError {
    OnNull,
    InvalidOperands,
    DivisionByZero,
}

pub fn binary(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, OpError> {
    use BinaryOp::*;

    match op {
        Equal => return equal(a, b).map(Value::Bool),
        NotEqual => return equal(a, b).map(|eq| Value::Bool(!eq)),
        _ => {}
    }

    if a.is_null() || b.is_null() {
        return Err(OpError::OnNull);
    }

    match op {
        Add => match (a, b) {
            (Value::String(x), Value::String(y)) => {
                let mut s = String::with_capacity(x.len() + y.len());
                s.push_str(x);
                s.push_str(y);
                Ok(Value::string(&s))
            }
            _ => arithmetic(a, b, i32::wrapping_add, |x, y| x + y),
        },
        Sub => arithmetic(a, b, i32::wrapping_sub, |x, y| x - y),
        Mul => arithmetic(a, b, i32::wrapping_mul, |x, y| x * y),
        Div => match (a, b) {
            (Value::Int(_), Value::Int(0)) => Err(OpError::DivisionByZero),
            _ => arithmetic(a, b, i32::wrapping_div, |x, y| x / y),
        },
        Mod => match (a, b) {
            (Value::Int(_), Value::Int(0)) => Err(OpError::DivisionByZero),
            (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x.wrapping_rem(*y))),
            _ => Err(OpError::InvalidOperands),
        },
        Less => compare(a, b, |x, y| x < y),
        LessEqual => compare(a, b, |x, y| x <= y),
        Greater => compare(a, b, |x, y| x > y),
        GreaterEqual => compare(a, b, |x, y| x >= y),
        BitAnd => integers(a, b, |x, y| x & y),
        BitOr => integers(a, b, |x, y| x | y),
        Equal | NotEqual => Err(OpError::InvalidOperands),
    }
}

pub fn unary(op: UnaryOp, a: &Value) -> Result<Value, OpError> {
    match (op, a) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (_, Value::Null) => Err(OpError::OnNull),
        (UnaryOp::Negate, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
        (UnaryOp::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
        (UnaryOp::BitNot, Value::Int(i)) => Ok(Value::Int(!i)),
        _ => Err(OpError::InvalidOperands),
    }
}

fn arithmetic(
    a: &Value,
    b: &Value,
    int_op: fn(i32, i32) -> i32,
    number_op: fn(f32, f32) -> f32,
) -> Result<Value, OpError> {
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        return Ok(Value::Int(int_op(*x, *y)));
    }
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => Ok(Value::Number(number_op(x, y))),
        _ => Err(OpError::InvalidOperands),
    }
}

fn compare(a: &Value, b: &Value, test: fn(f32, f32) -> bool) -> Result<Value, OpError> {
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        return Ok(Value::Bool(int_order(*x, *y, test)));
    }
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => Ok(Value::Bool(test(x, y))),
        _ => Err(OpError::InvalidOperands),
    }
}

/// Large ints collapse to the same f32, so ints are ordered exactly and the
/// result is mapped onto the float predicate.
fn int_order(x: i32, y: i32, test: fn(f32, f32) -> bool) -> bool {
    match x.cmp(&y) {
        std::cmp::Ordering::Less => test(0.0, 1.0),
        std::cmp::Ordering::Equal => test(0.0, 0.0),
        std::cmp::Ordering::Greater => test(1.0, 0.0),
    }
}

fn integers(a: &Value, b: &Value, op: fn(i32, i32) -> i32) -> Result<Value, OpError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(op(*x, *y))),
        _ => Err(OpError::InvalidOperands),
    }
}

fn equal(a: &Value, b: &Value) -> Result<bool, OpError> {
    match (a, b) {
        (Value::Null, Value::Null) => Ok(true),
        (Value::Null, _) | (_, Value::Null) => Ok(false),
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::Int(x), Value::Int(y)) => Ok(x == y),
        _ => Err(OpError::InvalidOperands),
    }
}

/// Adds the error for a failed binary operator plus one note per operand.
pub fn report_binary(
    log: &mut Log,
    error: OpError,
    op: BinaryOp,
    location: &Location,
    operands: [(&Location, &Value); 2],
) {
    let kind = match error {
        OpError::OnNull => DiagnosticKind::InvalidOperationOnNull,
        OpError::InvalidOperands => DiagnosticKind::InvalidBinaryOperation,
        OpError::DivisionByZero => DiagnosticKind::DivisionByZero,
    };
    log.add_error(location.clone(), kind, vec![op.symbol().to_string()]);
    if error != OpError::DivisionByZero {
        for (at, value) in operands {
            note_value(log, at, value);
        }
    }
}

pub fn report_unary(
    log: &mut Log,
    error: OpError,
    op: UnaryOp,
    location: &Location,
    operand: (&Location, &Value),
) {
    let kind = match error {
        OpError::OnNull => DiagnosticKind::InvalidOperationOnNull,
        OpError::InvalidOperands | OpError::DivisionByZero => {
            DiagnosticKind::InvalidUnaryOperation
        }
    };
    log.add_error(location.clone(), kind, vec![op.symbol().to_string()]);
    note_value(log, operand.0, operand.1);
}

fn note_value(log: &mut Log, at: &Location, value: &Value) {
    log.add_note(
        at.clone(),
        DiagnosticKind::ThisEvaluatesTo,
        vec![value.type_name().to_string(), value.to_string()],
    );
}
