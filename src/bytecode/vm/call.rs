//! `Call`/`CallMethod`/`Return` opcode bodies (spec.md §4.4).
//!
//! `Call(argc)`: the stack holds the callee below `argc` arguments. If the
//! callee is a script function, a new [`CallFrame`] is pushed and the
//! caller's `ip` is returned for the dispatch loop to jump to; if it's a
//! native, the host callable runs synchronously and its result is pushed in
//! place. `CallMethod` is the same, but the callee is resolved by looking
//! `method_name` up on a receiver object rather than being on the stack
//! directly, and the receiver is bound as `this` in the new frame.

use crate::{
    capability::NativeRegistry,
    exception_private::{RunError, RunResult},
    exception_public::CodeLoc,
    function::{CallFrame, FunctionId, FunctionTable},
    heap::Heap,
    resource::ResourceTracker,
    value::Value,
};

/// Pushes a frame / performs a native call for an already-resolved callee.
/// `args_at` is the stack index of the first argument; everything from
/// there to the top of the stack is consumed.
fn invoke(
    stack: &mut Vec<Value>,
    frames: &mut Vec<CallFrame>,
    functions: &FunctionTable,
    natives: &NativeRegistry,
    tracker: &mut dyn ResourceTracker,
    callee: Value,
    args_at: usize,
    this: Option<Value>,
    return_ip: usize,
    loc: CodeLoc,
) -> RunResult<Option<usize>> {
    match callee {
        Value::FunctionRef(id) => Ok(Some(enter_frame(stack, frames, functions, tracker, id, args_at, this, return_ip, loc)?)),
        Value::NativeRef(id) => {
            let args = stack.split_off(args_at);
            let result = natives.call(id, &args).map_err(|err| RunError::NativeCallFailed {
                name: natives.name(id).to_owned(),
                message: err.message,
                loc,
            })?;
            stack.push(result);
            Ok(None)
        }
        other => Err(RunError::TypeMismatch {
            op: "call",
            detail: format!("cannot call a {}", other.type_name()),
            loc,
        }),
    }
}

fn enter_frame(
    stack: &mut Vec<Value>,
    frames: &mut Vec<CallFrame>,
    functions: &FunctionTable,
    tracker: &mut dyn ResourceTracker,
    id: FunctionId,
    args_at: usize,
    this: Option<Value>,
    return_ip: usize,
    loc: CodeLoc,
) -> RunResult<usize> {
    let function = functions.get(id);
    if stack.len() - args_at != function.param_count() {
        return Err(RunError::TypeMismatch {
            op: "call",
            detail: format!("'{}' expects {} argument(s), got {}", function.name, function.param_count(), stack.len() - args_at),
            loc,
        });
    }
    tracker.check_call_depth(frames.len() + 1, loc)?;
    let stack_base = args_at;
    for _ in function.param_count()..function.local_count as usize {
        stack.push(Value::Null);
    }
    frames.push(CallFrame {
        function: id,
        return_ip,
        stack_base,
        this,
    });
    Ok(function.entry_point)
}

/// `Call(argc)`: pops the callee from below `argc` arguments.
pub fn call(
    stack: &mut Vec<Value>,
    frames: &mut Vec<CallFrame>,
    functions: &FunctionTable,
    natives: &NativeRegistry,
    tracker: &mut dyn ResourceTracker,
    argc: u8,
    return_ip: usize,
    loc: CodeLoc,
) -> RunResult<Option<usize>> {
    let argc = argc as usize;
    if stack.len() < argc + 1 {
        return Err(RunError::StackUnderflow { loc });
    }
    let callee_at = stack.len() - argc - 1;
    let callee = stack.remove(callee_at);
    invoke(stack, frames, functions, natives, tracker, callee, callee_at, None, return_ip, loc)
}

/// `CallMethod(method_name, argc)`: resolves the callee as a property on
/// the receiver found below `argc` arguments, and binds the receiver as
/// `this`.
pub fn call_method(
    stack: &mut Vec<Value>,
    frames: &mut Vec<CallFrame>,
    functions: &FunctionTable,
    natives: &NativeRegistry,
    heap: &Heap,
    tracker: &mut dyn ResourceTracker,
    method_name: &str,
    argc: u8,
    return_ip: usize,
    loc: CodeLoc,
) -> RunResult<Option<usize>> {
    let argc = argc as usize;
    if stack.len() < argc + 1 {
        return Err(RunError::StackUnderflow { loc });
    }
    let receiver_at = stack.len() - argc - 1;
    let receiver = stack.remove(receiver_at);
    let Some(object_id) = receiver.as_object() else {
        return Err(RunError::UnknownPropertyOnNonObject { loc });
    };
    let callee = heap
        .object(object_id)
        .and_then(|data| data.get(method_name))
        .cloned()
        .ok_or_else(|| RunError::KeyNotFound { key: method_name.to_owned(), loc })?;
    invoke(stack, frames, functions, natives, tracker, callee, receiver_at, Some(receiver), return_ip, loc)
}

/// `Return`: pops the current frame, discarding its locals, leaving the
/// top-of-stack return value in place at the caller's stack depth.
pub fn do_return(stack: &mut Vec<Value>, frames: &mut Vec<CallFrame>, loc: CodeLoc) -> RunResult<usize> {
    let Some(frame) = frames.pop() else {
        return Err(RunError::StackUnderflow { loc });
    };
    let retval = stack.pop().unwrap_or(Value::Null);
    stack.truncate(frame.stack_base);
    stack.push(retval);
    Ok(frame.return_ip)
}
