//! Value comparison, shared by `Eq`/`Neq`/`Lt`/`Gt`/`Lte`/`Gte` and by
//! event filter matching (`crate::events::filter`).
//!
//! Resolved open question (spec.md §9 "cross-tag equality"): equality never
//! coerces across types. Two values of different tags compare unequal
//! rather than raising an error — `5 == "5"` is `false`, not a type error.
//! Ordering comparisons between mismatched types (`5 < "a"`) *do* raise
//! `RunError::TypeMismatch`, since there's no sensible total order to fall
//! back to.
//!
//! Arrays and objects compare by contents (spec.md §4.4: "deep value
//! equality with tag match"), not by `HeapId`, so two separately built
//! structurally-identical values are equal; object comparison is
//! order-independent over keys.

use std::cmp::Ordering;

use crate::{heap::Heap, value::Value};

#[must_use]
pub fn values_equal(heap: &Heap, a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => match (heap.array(*x), heap.array(*y)) {
            (Some(xs), Some(ys)) => xs.len() == ys.len() && xs.iter().zip(ys).all(|(xv, yv)| values_equal(heap, xv, yv)),
            _ => false,
        },
        (Value::Object(x), Value::Object(y)) => match (heap.object(*x), heap.object(*y)) {
            (Some(xo), Some(yo)) => {
                xo.properties.len() == yo.properties.len()
                    && xo.properties.iter().all(|(k, v)| yo.get(k).is_some_and(|yv| values_equal(heap, v, yv)))
            }
            _ => false,
        },
        (Value::FunctionRef(x), Value::FunctionRef(y)) => x == y,
        (Value::NativeRef(x), Value::NativeRef(y)) => x == y,
        _ => false,
    }
}

/// `None` when the pair has no defined order (different tags, or either
/// side isn't orderable at all).
#[must_use]
pub fn values_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (Value::String(x), Value::String(y)) => Some(x.as_ref().cmp(y.as_ref())),
        _ => None,
    }
}
