//! Event/listener broadcast subsystem (spec.md §4.5).
//!
//! Registration (`EventBinding`) and dispatch (`EventBroadcast`) both run
//! through the VM (`crate::bytecode::vm::events`); this module holds the
//! data these two sides share: the registry of bound listeners and the
//! per-broadcast event payload.

pub mod filter;

use ahash::AHashMap;

use crate::{ast::Priority, function::FunctionId, value::Value};

/// One filter clause resolved to its bind-time value (spec.md §4.5:
/// listener-side filters are evaluated once, at registration).
#[derive(Debug, Clone)]
pub struct BoundFilter {
    pub tag: String,
    pub comparator: crate::ast::FilterComparator,
    pub value: Value,
}

/// A listener bound by one `EventBinding` statement.
#[derive(Debug, Clone)]
pub struct EventListener {
    pub handler_fn: FunctionId,
    pub condition_fn: Option<FunctionId>,
    pub priority: Priority,
    pub filters: Vec<BoundFilter>,
    /// The `this` the listener was registered under, if any — the object
    /// filter clauses like `type(...)`/`role(...)` match against.
    pub owner: Option<Value>,
    /// Registration order, broken only by `priority` (spec.md §4.5:
    /// "dispatched in priority order, ties broken by registration order").
    pub seq: u64,
}

/// Per-broadcast payload. Lives only as a `VM` field with save/restore
/// around dispatch (see DESIGN.md) — scripts never see it as a bound
/// identifier, only indirectly through handler parameter binding and
/// through [`crate::tracer::VmTracer::on_event_dispatch`].
#[derive(Debug, Clone)]
pub struct EventData {
    pub name: String,
    /// Named arguments in broadcast order. Handler parameters bind to these
    /// by name (see DESIGN.md).
    pub args: indexmap::IndexMap<String, Value>,
}

/// Tunables for the filter tags that need one (spec.md §4.5: `near`,
/// `debug`).
#[derive(Debug, Clone, Copy)]
pub struct EventConfig {
    /// Maximum distance `near(...)` treats as a match when the listener's
    /// owner doesn't itself specify one as an override value.
    pub near_threshold: f64,
    /// Whether `debug`-tagged listeners are live this run.
    pub debug: bool,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            near_threshold: 10.0,
            debug: false,
        }
    }
}

/// All listeners currently bound, grouped by event name.
#[derive(Debug, Default)]
pub struct EventRegistry {
    listeners: AHashMap<String, Vec<EventListener>>,
    next_seq: u64,
}

impl EventRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for `event_name`, stamping it with the next
    /// registration sequence number.
    pub fn register(&mut self, event_name: String, mut listener: EventListener) {
        listener.seq = self.next_seq;
        self.next_seq += 1;
        self.listeners.entry(event_name).or_default().push(listener);
    }

    /// Every listener bound to `event_name`, in dispatch order: highest
    /// `priority` first, registration order within a priority tier.
    #[must_use]
    pub fn dispatch_order(&self, event_name: &str) -> Vec<&EventListener> {
        let mut matched: Vec<&EventListener> = self.listeners.get(event_name).into_iter().flatten().collect();
        matched.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        matched
    }
}
