use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Runtime value in the Fel language.
///
/// Values are immutable once constructed. Strings are reference counted so a
/// literal in the AST, a constant-pool entry and a stack slot can share one
/// allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// The absence of a value.
    Null,

    Bool(bool),

    /// 32-bit signed integer.
    Int(i32),

    /// 32-bit floating-point number.
    Number(f32),

    String(Rc<str>),

    /// A compiled local function: the instruction index of its entry point.
    Function(u32),
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::String(Rc::from(s))
    }

    /// Name of the value's kind, as used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
        }
    }

    /// `null` and `false` are false, everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            _ => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Ints and numbers coerce to a number; nothing else does.
    pub fn as_number(&self) -> Option<f32> {
        match self {
            Value::Int(i) => Some(*i as f32),
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    /// Formats the value the way a host `print` shows it: strings unquoted.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Function(entry) => write!(f, "<function @{}>", entry),
        }
    }
}
