//! Embeddable indentation-sensitive scripting language: lexer, parser,
//! single-pass bytecode compiler, and a stack-based VM with a
//! prototype/mixin object model and an event/listener broadcast subsystem.
//!
//! Hosts typically only need [`compile`]/[`run`], [`VM`], and the types they
//! take as arguments (`Environment`, `NativeRegistry`, `ImportResolver`,
//! `ErrorSink`). Everything else is reachable for hosts that want finer
//! control over individual pipeline stages.

mod ast;
mod bytecode;
pub mod capability;
mod events;
mod exception_private;
pub mod exception_public;
mod function;
mod heap;
mod io;
mod lexer;
mod namespace;
mod parse;
pub mod registry;
mod resource;
mod run;
mod symbol;
mod token;
pub mod tracer;
mod value;

pub use crate::{
    bytecode::{vm::VM, Code, CodeBuilder, Compiler, Opcode},
    events::EventConfig,
    exception_public::{CodeLoc, CollectingSink, ErrorSink, ScriptError},
    function::FunctionId,
    heap::{Heap, HeapData, HeapId, ObjectData},
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    namespace::Environment,
    resource::{LimitedTracker, NoLimitTracker, ResourceError, ResourceTracker, DEFAULT_MAX_CALL_DEPTH},
    run::{compile, run},
    tracer::{NoopTracer, RecordingTracer, StderrTracer, TraceEvent, VmTracer},
    value::Value,
};
