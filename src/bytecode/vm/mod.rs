//! The stack-based virtual machine (spec.md §4.4).
//!
//! `VM::run` drives a single flat dispatch loop over one `Code` chunk.
//! Calling into a script function (`Call`/`CallMethod`) just changes `ip`
//! and pushes a frame — the loop keeps going, since the function body lives
//! inline in the same chunk, fenced by the `Jump` the compiler wrapped it
//! in. Event dispatch is different: `Broadcast` must run a handler to
//! completion, in isolation from dispatch to the next listener, *before*
//! resuming at the instruction after `Broadcast` — so it drives a nested
//! copy of the same loop via `call_function`.

pub(crate) mod binary;
pub(crate) mod call;
pub(crate) mod collections;
pub(crate) mod compare;
mod events;

use indexmap::IndexMap;

use crate::{
    ast::{FilterComparator, Priority},
    bytecode::{Code, Opcode},
    capability::NativeRegistry,
    events::{EventConfig, EventData, EventRegistry},
    exception_private::{RunError, RunResult},
    exception_public::{CodeLoc, ErrorSink, ScriptError},
    function::{CallFrame, FunctionId},
    heap::{Heap, ObjectData},
    io::{PrintWriter, StdPrint},
    namespace::Environment,
    resource::{NoLimitTracker, ResourceTracker},
    tracer::{NoopTracer, VmTracer},
    value::Value,
};

/// Heap-aware rendering used by `Print`/`ToString` — [`Value`]'s own
/// `Display` impl can't see array/object contents, only their tag.
#[must_use]
pub fn format_value(heap: &Heap, value: &Value) -> String {
    match value {
        Value::Array(id) => {
            let items = heap.array(*id).expect("array tag implies array heap data");
            let rendered: Vec<String> = items.iter().map(|v| format_value(heap, v)).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Object(id) => {
            let data = heap.object(*id).expect("object tag implies object heap data");
            let rendered: Vec<String> = data.properties.iter().map(|(k, v)| format!("{k}: {}", format_value(heap, v))).collect();
            format!("{{{}}}", rendered.join(", "))
        }
        other => other.to_string(),
    }
}

/// Everything the VM needs to execute one `Code` chunk: the compiled
/// program, the heap arena, the global environment, the host's native
/// callables, and the event registry, plus the observability/resource hooks
/// a host may swap in (tracer, resource tracker, print sink).
pub struct VM {
    code: Code,
    heap: Heap,
    environment: Environment,
    natives: NativeRegistry,
    events: EventRegistry,
    event_config: EventConfig,
    current_event: Option<EventData>,
    tracker: Box<dyn ResourceTracker>,
    tracer: Box<dyn VmTracer>,
    print: Box<dyn PrintWriter>,
}

impl VM {
    #[must_use]
    pub fn new(code: Code, environment: Environment, natives: NativeRegistry) -> Self {
        Self {
            code,
            heap: Heap::new(),
            environment,
            natives,
            events: EventRegistry::new(),
            event_config: EventConfig::default(),
            current_event: None,
            tracker: Box::new(NoLimitTracker),
            tracer: Box::new(NoopTracer),
            print: Box::new(StdPrint),
        }
    }

    #[must_use]
    pub fn with_event_config(mut self, config: EventConfig) -> Self {
        self.event_config = config;
        self
    }

    #[must_use]
    pub fn with_resource_tracker(mut self, tracker: impl ResourceTracker + 'static) -> Self {
        self.tracker = Box::new(tracker);
        self
    }

    #[must_use]
    pub fn with_tracer(mut self, tracer: impl VmTracer + 'static) -> Self {
        self.tracer = Box::new(tracer);
        self
    }

    #[must_use]
    pub fn with_print_writer(mut self, print: impl PrintWriter + 'static) -> Self {
        self.print = Box::new(print);
        self
    }

    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.environment
    }

    #[must_use]
    pub fn print_writer(&self) -> &dyn PrintWriter {
        self.print.as_ref()
    }

    /// Runs the top-level chunk to completion. Runtime errors during normal
    /// (non-handler) execution abort the loop and are returned; per spec.md
    /// §4.5, errors raised *inside* an event handler are instead reported
    /// through `sink` and dispatch continues with the next listener.
    pub fn run(&mut self, sink: &mut dyn ErrorSink) -> RunResult<()> {
        let mut stack: Vec<Value> = Vec::new();
        let mut frames: Vec<CallFrame> = Vec::new();
        let mut ip = 0usize;
        while ip < self.code.bytecode().len() {
            ip = self.step(ip, &mut stack, &mut frames, sink)?;
        }
        Ok(())
    }

    fn loc_at(&self, ip: usize) -> CodeLoc {
        let (line, column) = self.code.location_at(ip);
        CodeLoc::new(line, column)
    }

    fn read_u8(&self, ip: usize) -> u8 {
        self.code.bytecode()[ip]
    }

    fn read_u16(&self, ip: usize) -> u16 {
        u16::from_be_bytes([self.code.bytecode()[ip], self.code.bytecode()[ip + 1]])
    }

    /// Runs `function` to completion with `args` bound as its locals and
    /// `this` as its receiver, returning its result. Used for event
    /// conditions and handlers, which must finish (including any further
    /// nested broadcasts) before the `Broadcast` opcode that started them
    /// can continue.
    fn call_function(
        &mut self,
        stack: &mut Vec<Value>,
        frames: &mut Vec<CallFrame>,
        function_id: FunctionId,
        args: Vec<Value>,
        this: Option<Value>,
        loc: CodeLoc,
        sink: &mut dyn ErrorSink,
    ) -> RunResult<Value> {
        let depth_before = frames.len();
        let args_at = stack.len();
        stack.extend(args);
        let function = self.code.functions.get(function_id).clone();
        if stack.len() - args_at != function.param_count() {
            stack.truncate(args_at);
            return Err(RunError::TypeMismatch {
                op: "call",
                detail: format!("'{}' expects {} argument(s)", function.name, function.param_count()),
                loc,
            });
        }
        self.tracker.check_call_depth(frames.len() + 1, loc)?;
        for _ in function.param_count()..function.local_count as usize {
            stack.push(Value::Null);
        }
        frames.push(CallFrame {
            function: function_id,
            return_ip: usize::MAX,
            stack_base: args_at,
            this,
        });
        self.tracer.on_call(Some(&function.name), frames.len());
        let mut ip = function.entry_point;
        while frames.len() > depth_before {
            ip = self.step(ip, stack, frames, sink)?;
        }
        self.tracer.on_return(depth_before);
        Ok(stack.pop().unwrap_or(Value::Null))
    }

    #[allow(clippy::too_many_lines)]
    fn step(&mut self, ip: usize, stack: &mut Vec<Value>, frames: &mut Vec<CallFrame>, sink: &mut dyn ErrorSink) -> RunResult<usize> {
        let loc = self.loc_at(ip);
        let Some(opcode) = Opcode::from_byte(self.read_u8(ip)) else {
            return Err(RunError::IllegalOpcode { byte: self.read_u8(ip), loc });
        };
        self.tracer.on_instruction(ip, opcode, stack.len());
        self.tracker.tick_operation(loc)?;

        let pop = |stack: &mut Vec<Value>| stack.pop().ok_or(RunError::StackUnderflow { loc });

        match opcode {
            Opcode::Noop | Opcode::Yield | Opcode::Resume => Ok(ip + 1),
            Opcode::Pop => {
                pop(stack)?;
                Ok(ip + 1)
            }
            Opcode::Dup => {
                let top = stack.last().ok_or(RunError::StackUnderflow { loc })?.clone();
                stack.push(top);
                Ok(ip + 1)
            }
            Opcode::Swap => {
                let len = stack.len();
                if len < 2 {
                    return Err(RunError::StackUnderflow { loc });
                }
                stack.swap(len - 1, len - 2);
                Ok(ip + 1)
            }
            Opcode::LoadConst => {
                let value = self.code.constant(self.read_u8(ip + 1)).clone();
                stack.push(value);
                Ok(ip + 2)
            }
            Opcode::LoadVar => {
                let slot = self.read_u8(ip + 1) as usize;
                let frame = frames.last().expect("LoadVar outside a call frame");
                stack.push(stack[frame.stack_base + slot].clone());
                Ok(ip + 2)
            }
            Opcode::StoreVar => {
                let slot = self.read_u8(ip + 1) as usize;
                let value = pop(stack)?;
                let frame = frames.last().expect("StoreVar outside a call frame");
                stack[frame.stack_base + slot] = value;
                Ok(ip + 2)
            }
            Opcode::LoadGlobal => {
                let name = self.code.constant(self.read_u8(ip + 1)).as_str().expect("global name constant must be a string").to_owned();
                let value = self
                    .environment
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| RunError::UnknownGlobal { name: name.clone(), loc })?;
                stack.push(value);
                Ok(ip + 2)
            }
            Opcode::StoreGlobal => {
                let name = self.code.constant(self.read_u8(ip + 1)).as_str().expect("global name constant must be a string").to_owned();
                let value = pop(stack)?;
                self.environment.set(&name, value, loc)?;
                Ok(ip + 2)
            }
            Opcode::Add => self.binary(stack, loc, binary::add).map(|()| ip + 1),
            Opcode::Sub => self.binary(stack, loc, binary::sub).map(|()| ip + 1),
            Opcode::Mul => self.binary(stack, loc, binary::mul).map(|()| ip + 1),
            Opcode::Div => self.binary(stack, loc, binary::div).map(|()| ip + 1),
            Opcode::Mod => self.binary(stack, loc, binary::rem).map(|()| ip + 1),
            Opcode::Neg => {
                let a = pop(stack)?;
                stack.push(binary::neg(&a, loc)?);
                Ok(ip + 1)
            }
            Opcode::Not => {
                let a = pop(stack)?;
                stack.push(Value::Boolean(!a.is_truthy()));
                Ok(ip + 1)
            }
            Opcode::And => {
                let b = pop(stack)?;
                let a = pop(stack)?;
                stack.push(Value::Boolean(a.is_truthy() && b.is_truthy()));
                Ok(ip + 1)
            }
            Opcode::Or => {
                let b = pop(stack)?;
                let a = pop(stack)?;
                stack.push(Value::Boolean(a.is_truthy() || b.is_truthy()));
                Ok(ip + 1)
            }
            Opcode::Eq => {
                let b = pop(stack)?;
                let a = pop(stack)?;
                stack.push(Value::Boolean(compare::values_equal(&self.heap, &a, &b)));
                Ok(ip + 1)
            }
            Opcode::Neq => {
                let b = pop(stack)?;
                let a = pop(stack)?;
                stack.push(Value::Boolean(!compare::values_equal(&self.heap, &a, &b)));
                Ok(ip + 1)
            }
            Opcode::Lt | Opcode::Gt | Opcode::Lte | Opcode::Gte => {
                let b = pop(stack)?;
                let a = pop(stack)?;
                let Some(ordering) = compare::values_cmp(&a, &b) else {
                    return Err(RunError::TypeMismatch {
                        op: "comparison",
                        detail: format!("cannot order {} and {}", a.type_name(), b.type_name()),
                        loc,
                    });
                };
                let result = match opcode {
                    Opcode::Lt => ordering.is_lt(),
                    Opcode::Gt => ordering.is_gt(),
                    Opcode::Lte => ordering.is_le(),
                    Opcode::Gte => ordering.is_ge(),
                    _ => unreachable!(),
                };
                stack.push(Value::Boolean(result));
                Ok(ip + 1)
            }
            Opcode::Jump => Ok(ip + 3 + self.read_u16(ip + 1) as usize),
            Opcode::JumpIfFalse => {
                let cond = pop(stack)?;
                let offset = self.read_u16(ip + 1) as usize;
                Ok(if cond.is_truthy() { ip + 3 } else { ip + 3 + offset })
            }
            Opcode::JumpIfTrue => {
                let cond = pop(stack)?;
                let offset = self.read_u16(ip + 1) as usize;
                Ok(if cond.is_truthy() { ip + 3 + offset } else { ip + 3 })
            }
            Opcode::Loop => {
                let distance = self.read_u16(ip + 1) as usize;
                Ok(ip + 3 - distance)
            }
            Opcode::Call => {
                let argc = self.read_u8(ip + 1);
                let return_ip = ip + 2;
                match call::call(stack, frames, &self.code.functions, &self.natives, self.tracker.as_mut(), argc, return_ip, loc)? {
                    Some(entry) => {
                        self.tracer.on_call(None, frames.len());
                        Ok(entry)
                    }
                    None => Ok(return_ip),
                }
            }
            Opcode::CallMethod => {
                let method_name = self.code.constant(self.read_u8(ip + 1)).as_str().expect("method name constant must be a string").to_owned();
                let argc = self.read_u8(ip + 2);
                let return_ip = ip + 3;
                match call::call_method(stack, frames, &self.code.functions, &self.natives, &self.heap, self.tracker.as_mut(), &method_name, argc, return_ip, loc)? {
                    Some(entry) => {
                        self.tracer.on_call(Some(&method_name), frames.len());
                        Ok(entry)
                    }
                    None => Ok(return_ip),
                }
            }
            Opcode::Return => {
                let depth = frames.len();
                let next_ip = call::do_return(stack, frames, loc)?;
                self.tracer.on_return(depth);
                Ok(next_ip)
            }
            Opcode::NewArray => {
                let id = self.heap.alloc_array(Vec::new());
                stack.push(Value::Array(id));
                Ok(ip + 1)
            }
            Opcode::ArrayPush => {
                let value = pop(stack)?;
                let array = stack.last().ok_or(RunError::StackUnderflow { loc })?.clone();
                collections::array_push(&mut self.heap, &array, value, loc)?;
                Ok(ip + 1)
            }
            Opcode::GetIndex => {
                let index = pop(stack)?;
                let receiver = pop(stack)?;
                stack.push(collections::get_index(&self.heap, &receiver, &index, loc)?);
                Ok(ip + 1)
            }
            Opcode::SetIndex => {
                let value = pop(stack)?;
                let index = pop(stack)?;
                let receiver = stack.last().ok_or(RunError::StackUnderflow { loc })?.clone();
                collections::set_index(&mut self.heap, &receiver, &index, value, loc)?;
                Ok(ip + 1)
            }
            Opcode::NewObject => {
                let id = self.heap.alloc_object(ObjectData::new());
                stack.push(Value::Object(id));
                Ok(ip + 1)
            }
            Opcode::SetProperty => {
                let key = self.code.constant(self.read_u8(ip + 1)).as_str().expect("property key constant must be a string").to_owned();
                let value = pop(stack)?;
                let object = stack.last().ok_or(RunError::StackUnderflow { loc })?.clone();
                collections::set_property(&mut self.heap, &object, &key, value, loc)?;
                Ok(ip + 2)
            }
            Opcode::GetProperty => {
                let key = self.code.constant(self.read_u8(ip + 1)).as_str().expect("property key constant must be a string").to_owned();
                let object = pop(stack)?;
                stack.push(collections::get_property(&self.heap, &object, &key, loc)?);
                Ok(ip + 2)
            }
            Opcode::SetNestedProperty => {
                let path_len = self.read_u8(ip + 1) as usize;
                let keys: Vec<String> = (0..path_len)
                    .map(|i| self.code.constant(self.read_u8(ip + 2 + i)).as_str().expect("nested property key constant must be a string").to_owned())
                    .collect();
                let value = pop(stack)?;
                let base = pop(stack)?;
                let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
                collections::set_nested_property(&mut self.heap, &base, &key_refs, value, loc)?;
                Ok(ip + 2 + path_len)
            }
            Opcode::CopyProperties => {
                let source = pop(stack)?;
                let target = stack.last().ok_or(RunError::StackUnderflow { loc })?.clone();
                collections::copy_properties(&mut self.heap, &source, &target, loc)?;
                Ok(ip + 1)
            }
            Opcode::Print => {
                let argc = self.read_u8(ip + 1) as usize;
                if stack.len() < argc {
                    return Err(RunError::StackUnderflow { loc });
                }
                let args = stack.split_off(stack.len() - argc);
                let line = args.iter().map(|v| format_value(&self.heap, v)).collect::<Vec<_>>().join(" ");
                self.print.write_line(&line);
                Ok(ip + 2)
            }
            Opcode::ToString => {
                let value = pop(stack)?;
                stack.push(Value::string(format_value(&self.heap, &value)));
                Ok(ip + 1)
            }
            Opcode::BindEvent => self.exec_bind_event(ip, stack, frames),
            Opcode::Broadcast => self.exec_broadcast(ip, stack, frames, sink),
        }
    }

    fn binary(&self, stack: &mut Vec<Value>, loc: CodeLoc, op: fn(&Value, &Value, CodeLoc) -> RunResult<Value>) -> RunResult<()> {
        let b = stack.pop().ok_or(RunError::StackUnderflow { loc })?;
        let a = stack.pop().ok_or(RunError::StackUnderflow { loc })?;
        stack.push(op(&a, &b, loc)?);
        Ok(())
    }

    fn exec_bind_event(&mut self, ip: usize, stack: &mut Vec<Value>, frames: &[CallFrame]) -> RunResult<usize> {
        let loc = self.loc_at(ip);
        let event_name_const = self.read_u8(ip + 1);
        let handler_fn = FunctionId::from_index(self.read_u16(ip + 2));
        let condition_raw = self.read_u16(ip + 4);
        let condition_fn = (condition_raw != 0xFFFF).then(|| FunctionId::from_index(condition_raw));
        let priority = Priority::from_byte(self.read_u8(ip + 6));
        let filter_count = self.read_u8(ip + 7) as usize;
        let mut tags = Vec::with_capacity(filter_count);
        let mut cursor = ip + 8;
        for _ in 0..filter_count {
            let tag = self.code.constant(self.read_u8(cursor)).as_str().expect("filter tag constant must be a string").to_owned();
            let comparator = FilterComparator::from_byte(self.read_u8(cursor + 1)).expect("illegal filter comparator byte");
            tags.push((tag, comparator));
            cursor += 2;
        }
        if stack.len() < filter_count {
            return Err(RunError::StackUnderflow { loc });
        }
        let values = stack.split_off(stack.len() - filter_count);
        let event_name = self.code.constant(event_name_const).as_str().expect("event name constant must be a string").to_owned();
        let owner = frames.last().and_then(|f| f.this.clone());
        events::bind(&mut self.events, event_name, handler_fn, condition_fn, priority, tags, values, owner);
        Ok(cursor)
    }

    fn exec_broadcast(&mut self, ip: usize, stack: &mut Vec<Value>, frames: &mut Vec<CallFrame>, sink: &mut dyn ErrorSink) -> RunResult<usize> {
        let loc = self.loc_at(ip);
        let event_name_const = self.read_u8(ip + 1);
        let arg_count = self.read_u8(ip + 2) as usize;
        let arg_name_consts: Vec<u8> = (0..arg_count).map(|i| self.read_u8(ip + 3 + i)).collect();
        let mut cursor = ip + 3 + arg_count;
        let filter_count = self.read_u8(cursor) as usize;
        cursor += 1;
        let mut tags = Vec::with_capacity(filter_count);
        for _ in 0..filter_count {
            let tag = self.code.constant(self.read_u8(cursor)).as_str().expect("filter tag constant must be a string").to_owned();
            let comparator = FilterComparator::from_byte(self.read_u8(cursor + 1)).expect("illegal filter comparator byte");
            tags.push((tag, comparator));
            cursor += 2;
        }
        let total_popped = arg_count + filter_count;
        if stack.len() < total_popped {
            return Err(RunError::StackUnderflow { loc });
        }
        let mut popped = stack.split_off(stack.len() - total_popped);
        let filter_values: Vec<Value> = popped.split_off(arg_count);
        let arg_values = popped;

        let event_name = self.code.constant(event_name_const).as_str().expect("event name constant must be a string").to_owned();
        let mut args = IndexMap::with_capacity(arg_count);
        for (name_const, value) in arg_name_consts.iter().zip(arg_values) {
            let name = self.code.constant(*name_const).as_str().expect("argument name constant must be a string").to_owned();
            args.insert(name, value);
        }

        let broadcaster = frames.last().and_then(|f| f.this.clone());
        let broadcast_filters: Vec<(String, FilterComparator)> = tags;
        let broadcast_event = EventData { name: event_name.clone(), args };
        let broadcast_ok = broadcast_filters.iter().zip(&filter_values).all(|((tag, comparator), value)| {
            let clause = crate::events::BoundFilter { tag: tag.clone(), comparator: *comparator, value: value.clone() };
            crate::events::filter::matches(&clause, broadcaster.as_ref(), &broadcast_event, &self.heap, &self.event_config)
        });
        if !broadcast_ok {
            return Ok(cursor);
        }

        let listeners: Vec<_> = self.events.dispatch_order(&event_name).into_iter().cloned().collect();
        let previous_event = self.current_event.replace(broadcast_event.clone());
        let mut matched = 0usize;
        for listener in &listeners {
            if let Some(condition_fn) = listener.condition_fn {
                let condition_args = events::bind_param_values(self.code.functions.get(condition_fn), &broadcast_event.args);
                match self.call_function(stack, frames, condition_fn, condition_args, listener.owner.clone(), loc, sink) {
                    Ok(result) if !result.is_truthy() => continue,
                    Ok(_) => {}
                    Err(err) => {
                        sink.report(ScriptError::new(err.loc(), err.to_string()));
                        continue;
                    }
                }
            }

            if !events::filters_match(listener, &broadcast_event, &self.heap, &self.event_config) {
                continue;
            }
            let function = self.code.functions.get(listener.handler_fn).clone();
            let args = events::bind_param_values(&function, &broadcast_event.args);

            matched += 1;
            if let Err(err) = self.call_function(stack, frames, listener.handler_fn, args, listener.owner.clone(), loc, sink) {
                sink.report(ScriptError::new(err.loc(), err.to_string()));
            }
        }
        self.tracer.on_event_dispatch(&broadcast_event, matched);
        self.current_event = previous_event;
        Ok(cursor)
    }
}
