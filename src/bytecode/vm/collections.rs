//! Array/object opcode bodies (spec.md §4.4): `NewArray`/`ArrayPush`,
//! `GetIndex`/`SetIndex`, `NewObject`/`SetProperty`/`GetProperty`,
//! `SetNestedProperty`, `CopyProperties`.
//!
//! `IndexAccess`/`IndexAssignment` dispatch on the receiver's runtime tag
//! rather than the static shape of the expression: `a[0]` and `o["key"]`
//! both lower to the same `GetIndex`/`SetIndex` opcodes, and the array vs.
//! object behavior is chosen here, at runtime.

use crate::{
    exception_private::{RunError, RunResult},
    exception_public::CodeLoc,
    heap::Heap,
    value::Value,
};

fn array_index(index: &Value, len: usize, loc: CodeLoc) -> RunResult<usize> {
    let Some(n) = index.as_number() else {
        return Err(RunError::TypeMismatch {
            op: "index",
            detail: format!("array index must be a number, got {}", index.type_name()),
            loc,
        });
    };
    #[allow(clippy::cast_possible_truncation)]
    let i = n as i64;
    if i < 0 || i as usize >= len {
        return Err(RunError::IndexOutOfRange { index: i, len, loc });
    }
    Ok(i as usize)
}

pub fn array_push(heap: &mut Heap, array: &Value, value: Value, loc: CodeLoc) -> RunResult<()> {
    let id = array.as_array().ok_or_else(|| RunError::TypeMismatch {
        op: "push",
        detail: format!("cannot push onto a {}", array.type_name()),
        loc,
    })?;
    heap.array_mut(id).expect("array tag implies array heap data").push(value);
    Ok(())
}

pub fn get_index(heap: &Heap, receiver: &Value, index: &Value, loc: CodeLoc) -> RunResult<Value> {
    match receiver {
        Value::Array(id) => {
            let values = heap.array(*id).expect("array tag implies array heap data");
            let i = array_index(index, values.len(), loc)?;
            Ok(values[i].clone())
        }
        Value::Object(id) => {
            let key = index.as_str().ok_or_else(|| RunError::TypeMismatch {
                op: "index",
                detail: format!("object key must be a string, got {}", index.type_name()),
                loc,
            })?;
            let data = heap.object(*id).expect("object tag implies object heap data");
            Ok(data.get(key).cloned().unwrap_or(Value::Null))
        }
        other => Err(RunError::TypeMismatch {
            op: "index",
            detail: format!("cannot index a {}", other.type_name()),
            loc,
        }),
    }
}

pub fn set_index(heap: &mut Heap, receiver: &Value, index: &Value, value: Value, loc: CodeLoc) -> RunResult<()> {
    match receiver {
        Value::Array(id) => {
            let len = heap.array(*id).expect("array tag implies array heap data").len();
            let i = array_index(index, len, loc)?;
            heap.array_mut(*id).expect("array tag implies array heap data")[i] = value;
            Ok(())
        }
        Value::Object(id) => {
            let key = index.as_str().ok_or_else(|| RunError::TypeMismatch {
                op: "index",
                detail: format!("object key must be a string, got {}", index.type_name()),
                loc,
            })?;
            heap.object_mut(*id).expect("object tag implies object heap data").set(key.to_owned(), value);
            Ok(())
        }
        other => Err(RunError::TypeMismatch {
            op: "index",
            detail: format!("cannot index a {}", other.type_name()),
            loc,
        }),
    }
}

fn as_object_id(value: &Value, loc: CodeLoc) -> RunResult<crate::heap::HeapId> {
    value.as_object().ok_or(RunError::UnknownPropertyOnNonObject { loc })
}

pub fn set_property(heap: &mut Heap, object: &Value, key: &str, value: Value, loc: CodeLoc) -> RunResult<()> {
    let id = as_object_id(object, loc)?;
    heap.object_mut(id).expect("object tag implies object heap data").set(key.to_owned(), value);
    Ok(())
}

pub fn get_property(heap: &Heap, object: &Value, key: &str, loc: CodeLoc) -> RunResult<Value> {
    let id = as_object_id(object, loc)?;
    Ok(heap.object(id).expect("object tag implies object heap data").get(key).cloned().unwrap_or(Value::Null))
}

/// `a.b.c = v`: walks every key but the last, requiring each intermediate
/// to already be an object, then sets the final key.
pub fn set_nested_property(heap: &mut Heap, base: &Value, path: &[&str], value: Value, loc: CodeLoc) -> RunResult<()> {
    let Some((last, init)) = path.split_last() else {
        return Ok(());
    };
    let mut current = as_object_id(base, loc)?;
    for key in init {
        let next = heap
            .object(current)
            .expect("object tag implies object heap data")
            .get(*key)
            .cloned()
            .ok_or_else(|| RunError::KeyNotFound { key: (*key).to_owned(), loc })?;
        current = as_object_id(&next, loc)?;
    }
    heap.object_mut(current).expect("object tag implies object heap data").set((*last).to_owned(), value);
    Ok(())
}

/// `CopyProperties`: shallow-copies every key from `source` into `target`,
/// later calls overwriting earlier ones (spec.md §4.3: mixins apply left to
/// right, explicit keys override mixins), and records `source` in
/// `target.prototypes` for introspection.
pub fn copy_properties(heap: &mut Heap, source: &Value, target: &Value, loc: CodeLoc) -> RunResult<()> {
    let source_id = as_object_id(source, loc)?;
    let target_id = as_object_id(target, loc)?;
    let copied: Vec<(String, Value)> = heap
        .object(source_id)
        .expect("object tag implies object heap data")
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let target_data = heap.object_mut(target_id).expect("object tag implies object heap data");
    for (key, value) in copied {
        target_data.set(key, value);
    }
    target_data.prototypes.push(source_id);
    Ok(())
}
