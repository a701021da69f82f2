//! `BindEvent`/`Broadcast` opcode support (spec.md §4.5).
//!
//! The nested re-entrant calls a dispatch needs (condition, then handler,
//! once per matching listener) go through `VM::call_function` in
//! `super::mod`, since only the VM owns the operand stack and frame stack
//! a nested call needs. This module holds the parts that don't: building
//! the listener record, and deciding which listeners match.

use indexmap::IndexMap;

use crate::{
    ast::{FilterComparator, Priority},
    events::{filter, BoundFilter, EventConfig, EventData, EventListener, EventRegistry},
    function::{FunctionId, VMFunction},
    heap::Heap,
    value::Value,
};

/// Builds and registers one listener. `tags`/`values` are parallel (the
/// compiler emits one `(tag, comparator)` pair per filter and the VM pops
/// one value per filter off the stack, in the same order).
pub fn bind(
    registry: &mut EventRegistry,
    event_name: String,
    handler_fn: FunctionId,
    condition_fn: Option<FunctionId>,
    priority: Priority,
    tags: Vec<(String, FilterComparator)>,
    values: Vec<Value>,
    owner: Option<Value>,
) {
    let filters = tags
        .into_iter()
        .zip(values)
        .map(|((tag, comparator), value)| BoundFilter { tag, comparator, value })
        .collect();
    registry.register(event_name, EventListener { handler_fn, condition_fn, priority, filters, owner, seq: 0 });
}

/// Maps a handler's declared parameters onto a broadcast's named arguments
/// by name, defaulting to `Null` for any parameter the broadcast didn't
/// supply (handler binding is by name, not position — see DESIGN.md).
#[must_use]
pub fn bind_param_values(function: &VMFunction, args: &IndexMap<String, Value>) -> Vec<Value> {
    function.param_names.iter().map(|name| args.get(name).cloned().unwrap_or(Value::Null)).collect()
}

/// Whether every filter on `listener` matches the current broadcast.
#[must_use]
pub fn filters_match(listener: &EventListener, event: &EventData, heap: &Heap, config: &EventConfig) -> bool {
    listener.filters.iter().all(|f| filter::matches(f, listener.owner.as_ref(), event, heap, config))
}
