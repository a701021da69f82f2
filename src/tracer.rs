//! VM execution tracing.
//!
//! Plays the role a `log`/`tracing` dependency would elsewhere in this
//! corpus: the VM is generic over a `VmTracer`, so [`NoopTracer`] compiles
//! away to nothing via monomorphization in production builds, while
//! [`StderrTracer`] or [`RecordingTracer`] can be swapped in for debugging
//! or tests without touching the dispatch loop.

use crate::{bytecode::Opcode, events::EventData};

/// A single traced execution event, as captured by [`RecordingTracer`].
#[derive(Debug, Clone)]
pub enum TraceEvent {
    Instruction { ip: usize, opcode: Opcode, stack_depth: usize },
    Call { name: Option<String>, depth: usize },
    Return { depth: usize },
    EventDispatched { name: String, listener_count: usize },
}

/// Hook points the VM calls during execution.
pub trait VmTracer {
    fn on_instruction(&mut self, _ip: usize, _opcode: Opcode, _stack_depth: usize) {}
    fn on_call(&mut self, _name: Option<&str>, _depth: usize) {}
    fn on_return(&mut self, _depth: usize) {}
    fn on_event_dispatch(&mut self, _event: &EventData, _matched: usize) {}
}

/// Zero-cost tracer used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl VmTracer for NoopTracer {}

/// Tracer that prints a human-readable execution log to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrTracer;

impl VmTracer for StderrTracer {
    fn on_instruction(&mut self, ip: usize, opcode: Opcode, stack_depth: usize) {
        eprintln!("  ip={ip:04} {opcode:?} (stack={stack_depth})");
    }

    fn on_call(&mut self, name: Option<&str>, depth: usize) {
        eprintln!("call {} (depth={depth})", name.unwrap_or("<anonymous>"));
    }

    fn on_return(&mut self, depth: usize) {
        eprintln!("return (depth={depth})");
    }

    fn on_event_dispatch(&mut self, event: &EventData, matched: usize) {
        eprintln!("fire \"{}\" -> {matched} listener(s)", event.name);
    }
}

/// Tracer that records every event into a `Vec`, for assertions in tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    pub events: Vec<TraceEvent>,
}

impl VmTracer for RecordingTracer {
    fn on_instruction(&mut self, ip: usize, opcode: Opcode, stack_depth: usize) {
        self.events.push(TraceEvent::Instruction { ip, opcode, stack_depth });
    }

    fn on_call(&mut self, name: Option<&str>, depth: usize) {
        self.events.push(TraceEvent::Call {
            name: name.map(str::to_owned),
            depth,
        });
    }

    fn on_return(&mut self, depth: usize) {
        self.events.push(TraceEvent::Return { depth });
    }

    fn on_event_dispatch(&mut self, event: &EventData, matched: usize) {
        self.events.push(TraceEvent::EventDispatched {
            name: event.name.clone(),
            listener_count: matched,
        });
    }
}
