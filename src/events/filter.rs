//! Filter clause matching (spec.md §4.5).
//!
//! Each bound listener carries zero or more filter clauses, evaluated at
//! broadcast time against the listener's `owner` (the `this` it was bound
//! under) and the broadcast's [`EventData`]. `priority(...)` is handled
//! entirely at compile time (it never reaches this module) and `ui` is
//! special-cased below rather than reading any property at all.

use crate::{
    ast::FilterComparator,
    bytecode::vm::compare::{values_cmp, values_equal},
    events::{BoundFilter, EventConfig, EventData},
    heap::Heap,
    value::Value,
};

fn compare(heap: &Heap, comparator: FilterComparator, lhs: &Value, rhs: &Value) -> bool {
    match comparator {
        FilterComparator::Eq => values_equal(heap, lhs, rhs),
        FilterComparator::Neq => !values_equal(heap, lhs, rhs),
        FilterComparator::Lt => values_cmp(lhs, rhs).is_some_and(std::cmp::Ordering::is_lt),
        FilterComparator::Lte => values_cmp(lhs, rhs).is_some_and(std::cmp::Ordering::is_le),
        FilterComparator::Gt => values_cmp(lhs, rhs).is_some_and(std::cmp::Ordering::is_gt),
        FilterComparator::Gte => values_cmp(lhs, rhs).is_some_and(std::cmp::Ordering::is_ge),
    }
}

fn owner_property<'a>(owner: Option<&'a Value>, heap: &'a Heap, key: &str) -> Option<&'a Value> {
    let id = owner.and_then(Value::as_object)?;
    heap.object(id).and_then(|data| data.get(key))
}

/// Whether `filter` matches, given the listener's `owner` and the current
/// broadcast's `event` payload.
#[must_use]
pub fn matches(filter: &BoundFilter, owner: Option<&Value>, event: &EventData, heap: &Heap, config: &EventConfig) -> bool {
    match filter.tag.as_str() {
        "all" => true,
        // `ui` listeners only ever fire from the host's own UI dispatch path,
        // which this core never drives — see DESIGN.md.
        "ui" => false,
        "debug" => filter.value.as_bool() == Some(config.debug),
        "near" => {
            let other = Some(&filter.value);
            let coords = |who: Option<&Value>| -> Option<(f64, f64)> {
                Some((owner_property(who, heap, "x")?.as_number()?, owner_property(who, heap, "y")?.as_number()?))
            };
            let (Some((ox, oy)), Some((nx, ny))) = (coords(owner), coords(other)) else {
                return false;
            };
            let distance = ((ox - nx).powi(2) + (oy - ny).powi(2)).sqrt();
            distance <= config.near_threshold
        }
        "target" => event.args.get("target").is_some_and(|v| compare(heap, filter.comparator, v, &filter.value)),
        "owner" => event.args.get("owner").is_some_and(|v| compare(heap, filter.comparator, v, &filter.value)),
        tag => owner_property(owner, heap, tag).is_some_and(|v| compare(heap, filter.comparator, v, &filter.value)),
    }
}
