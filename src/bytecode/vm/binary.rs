//! Arithmetic opcode bodies (`Add`/`Sub`/`Mul`/`Div`/`Mod`/`Neg`).
//!
//! Resolved open question (spec.md §9 "integer vs float division"): every
//! number is a uniform `f64` (spec.md §3), so `Div`/`Mod` are always
//! floating-point; there is no separate integer-division opcode.

use crate::{
    exception_private::{RunError, RunResult},
    exception_public::CodeLoc,
    value::Value,
};

/// `+`: numeric addition, or string concatenation if either operand is a
/// string (the other is rendered via its `Display` impl, same as `Print`).
pub fn add(a: &Value, b: &Value, loc: CodeLoc) -> RunResult<Value> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(Value::Number(x + y)),
        (Value::String(_), _) | (_, Value::String(_)) => Ok(Value::string(format!("{a}{b}"))),
        _ => Err(RunError::TypeMismatch {
            op: "+",
            detail: format!("cannot add {} and {}", a.type_name(), b.type_name()),
            loc,
        }),
    }
}

fn numeric(op: &'static str, a: &Value, b: &Value, loc: CodeLoc) -> RunResult<(f64, f64)> {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(RunError::TypeMismatch {
            op,
            detail: format!("expected two numbers, got {} and {}", a.type_name(), b.type_name()),
            loc,
        }),
    }
}

pub fn sub(a: &Value, b: &Value, loc: CodeLoc) -> RunResult<Value> {
    let (x, y) = numeric("-", a, b, loc)?;
    Ok(Value::Number(x - y))
}

pub fn mul(a: &Value, b: &Value, loc: CodeLoc) -> RunResult<Value> {
    let (x, y) = numeric("*", a, b, loc)?;
    Ok(Value::Number(x * y))
}

pub fn div(a: &Value, b: &Value, loc: CodeLoc) -> RunResult<Value> {
    let (x, y) = numeric("/", a, b, loc)?;
    if y == 0.0 {
        return Err(RunError::DivisionByZero { loc });
    }
    Ok(Value::Number(x / y))
}

pub fn rem(a: &Value, b: &Value, loc: CodeLoc) -> RunResult<Value> {
    let (x, y) = numeric("%", a, b, loc)?;
    if y == 0.0 {
        return Err(RunError::DivisionByZero { loc });
    }
    Ok(Value::Number(x % y))
}

pub fn neg(a: &Value, loc: CodeLoc) -> RunResult<Value> {
    match a.as_number() {
        Some(x) => Ok(Value::Number(-x)),
        None => Err(RunError::TypeMismatch {
            op: "-",
            detail: format!("cannot negate a {}", a.type_name()),
            loc,
        }),
    }
}
