//! `CodeBuilder`: emits bytecode during compilation, handling forward-jump
//! patching and constant/function interning (spec.md §4.3).

use super::{code::LocationEntry, op::Opcode, Code};
use crate::{exception_public::CodeLoc, function::{FunctionId, VMFunction}, value::Value};

/// An emitted jump whose 16-bit offset operand hasn't been patched yet.
/// Returned by [`CodeBuilder::emit_jump`]; pass to [`CodeBuilder::patch_jump`]
/// once the target is known.
#[derive(Debug, Clone, Copy)]
pub struct JumpLabel {
    operand_at: usize,
}

#[derive(Debug, Default)]
pub struct CodeBuilder {
    code: Code,
    current_loc: CodeLoc,
    stack_depth: i32,
    max_stack_depth: i32,
}

impl CodeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_location(&mut self, loc: CodeLoc) {
        self.current_loc = loc;
    }

    #[must_use]
    pub fn here(&self) -> usize {
        self.code.len()
    }

    #[must_use]
    pub fn max_stack_depth(&self) -> i32 {
        self.max_stack_depth
    }

    fn track(&mut self, effect: i32) {
        self.stack_depth += effect;
        self.max_stack_depth = self.max_stack_depth.max(self.stack_depth);
    }

    fn mark_location(&mut self, ip: usize) {
        self.code.push_location(LocationEntry { start_ip: ip, line: self.current_loc.line, column: self.current_loc.column });
    }

    /// Emits a no-operand instruction.
    pub fn emit(&mut self, op: Opcode) {
        let ip = self.code.push_byte(op as u8);
        self.mark_location(ip);
        self.track(op.fixed_stack_effect().unwrap_or(0));
    }

    /// Emits an instruction with one `u8` operand (slot or constant index).
    pub fn emit_u8(&mut self, op: Opcode, operand: u8) {
        let ip = self.code.push_byte(op as u8);
        self.mark_location(ip);
        self.code.push_byte(operand);
        self.track(op.fixed_stack_effect().unwrap_or(0));
    }

    /// Emits an instruction with a big-endian `u16` operand (jump/loop
    /// offsets, spec.md §6).
    fn emit_u16(&mut self, op: Opcode, operand: u16) -> usize {
        let ip = self.code.push_byte(op as u8);
        self.mark_location(ip);
        let bytes = operand.to_be_bytes();
        self.code.push_byte(bytes[0]);
        let operand_at = self.code.push_byte(bytes[1]) - 1;
        self.track(op.fixed_stack_effect().unwrap_or(0));
        operand_at
    }

    /// `Call`: pops the callee (a `FunctionRef`/`NativeRef` pushed below
    /// the arguments) and `argc` arguments, pushes one return value.
    pub fn emit_call(&mut self, argc: u8) {
        let ip = self.code.push_byte(Opcode::Call as u8);
        self.mark_location(ip);
        self.code.push_byte(argc);
        self.track(-(i32::from(argc) + 1) + 1);
    }

    /// `CallMethod`: pops the receiver (pushed below the arguments) and
    /// `argc` arguments, pushes one return value.
    pub fn emit_call_method(&mut self, method_name_const: u8, argc: u8) {
        let ip = self.code.push_byte(Opcode::CallMethod as u8);
        self.mark_location(ip);
        self.code.push_byte(method_name_const);
        self.code.push_byte(argc);
        self.track(-(i32::from(argc) + 1) + 1);
    }

    pub fn emit_print(&mut self, argc: u8) {
        let ip = self.code.push_byte(Opcode::Print as u8);
        self.mark_location(ip);
        self.code.push_byte(argc);
        self.track(-i32::from(argc));
    }

    pub fn emit_get_property(&mut self, key_const: u8) {
        let ip = self.code.push_byte(Opcode::GetProperty as u8);
        self.mark_location(ip);
        self.code.push_byte(key_const);
        self.track(0);
    }

    pub fn emit_set_property(&mut self, key_const: u8) {
        let ip = self.code.push_byte(Opcode::SetProperty as u8);
        self.mark_location(ip);
        self.code.push_byte(key_const);
        self.track(-1);
    }

    /// `SetNestedProperty`: a `u8` path length followed by that many `u8`
    /// constant indices (spec.md §9: avoid leaking intermediates on the
    /// stack for `a.b.c = v`). Pops the base object and the value.
    pub fn emit_set_nested_property(&mut self, key_consts: &[u8]) {
        let ip = self.code.push_byte(Opcode::SetNestedProperty as u8);
        self.mark_location(ip);
        self.code.push_byte(u8::try_from(key_consts.len()).expect("nested property path too long"));
        for key in key_consts {
            self.code.push_byte(*key);
        }
        self.track(-2);
    }

    /// `BindEvent`: event name constant, handler function index, an
    /// optional condition function index (`None` encodes as `0xFFFF`, a
    /// sentinel safe against any realistic function table size), a
    /// dispatch priority, then one `(tag constant, comparator)` pair per
    /// runtime filter. The filter *values* are expected already pushed
    /// onto the operand stack, one per filter, in source order (spec.md
    /// §4.5) — this call accounts for popping them but does not emit
    /// their loads itself.
    pub fn emit_bind_event(
        &mut self,
        event_name_const: u8,
        handler_fn: u16,
        condition_fn: Option<u16>,
        priority: u8,
        filters: &[(u8, u8)],
    ) {
        let ip = self.code.push_byte(Opcode::BindEvent as u8);
        self.mark_location(ip);
        self.code.push_byte(event_name_const);
        for byte in handler_fn.to_be_bytes() {
            self.code.push_byte(byte);
        }
        for byte in condition_fn.unwrap_or(0xFFFF).to_be_bytes() {
            self.code.push_byte(byte);
        }
        self.code.push_byte(priority);
        self.code.push_byte(u8::try_from(filters.len()).expect("too many filters on one listener"));
        for (tag_const, comparator) in filters {
            self.code.push_byte(*tag_const);
            self.code.push_byte(*comparator);
        }
        self.track(-i32::try_from(filters.len()).expect("too many filters on one listener"));
    }

    /// `Broadcast`: event name constant, argument name constants (handler
    /// parameters bind to these by name, defaulting to `Null` for any
    /// parameter a broadcast didn't supply — see DESIGN.md), then filter
    /// `(tag, comparator)` pairs in the same shape as `BindEvent`'s. Values
    /// for both the arguments and the filters are expected already pushed
    /// onto the operand stack, arguments first then filters, each group in
    /// source order.
    pub fn emit_broadcast(&mut self, event_name_const: u8, arg_name_consts: &[u8], filters: &[(u8, u8)]) {
        let ip = self.code.push_byte(Opcode::Broadcast as u8);
        self.mark_location(ip);
        self.code.push_byte(event_name_const);
        self.code.push_byte(u8::try_from(arg_name_consts.len()).expect("too many broadcast arguments"));
        for name_const in arg_name_consts {
            self.code.push_byte(*name_const);
        }
        self.code.push_byte(u8::try_from(filters.len()).expect("too many filters on one broadcast"));
        for (tag_const, comparator) in filters {
            self.code.push_byte(*tag_const);
            self.code.push_byte(*comparator);
        }
        let popped = arg_name_consts.len() + filters.len();
        self.track(-i32::try_from(popped).expect("too many broadcast operands"));
    }

    /// Emits a forward jump with a placeholder offset; patch with
    /// [`Self::patch_jump`] once the target is known.
    pub fn emit_jump(&mut self, op: Opcode) -> JumpLabel {
        debug_assert!(matches!(op, Opcode::Jump | Opcode::JumpIfFalse | Opcode::JumpIfTrue));
        let operand_at = self.emit_u16(op, 0);
        JumpLabel { operand_at }
    }

    /// Patches a previously emitted jump to land at the current position.
    pub fn patch_jump(&mut self, label: JumpLabel) {
        let target = self.code.len();
        let offset = u16::try_from(target - (label.operand_at + 2)).expect("jump target too far");
        self.code.patch_u16(label.operand_at, offset);
    }

    /// Emits a backward `Loop` jump to `target` (a position already behind
    /// the current one).
    pub fn emit_loop(&mut self, target: usize) {
        let ip = self.code.push_byte(Opcode::Loop as u8);
        self.mark_location(ip);
        let operand_at = self.code.len();
        let distance = u16::try_from(operand_at + 2 - target).expect("loop body too large");
        let bytes = distance.to_be_bytes();
        self.code.push_byte(bytes[0]);
        self.code.push_byte(bytes[1]);
        self.track(0);
    }

    /// Interns a constant, returning its index. Constants are appended
    /// monotonically, never deduplicated (spec.md §3 invariant).
    pub fn add_constant(&mut self, value: Value) -> u8 {
        u8::try_from(self.code.push_constant(value)).expect("more than 255 constants in one chunk")
    }

    pub fn add_function(&mut self, function: VMFunction) -> FunctionId {
        self.code.functions.push(function)
    }

    #[must_use]
    pub fn build(self) -> Code {
        self.code
    }
}
