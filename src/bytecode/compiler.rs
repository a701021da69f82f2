//! Single-pass AST -> bytecode compiler (spec.md §4.3).
//!
//! One depth-first walk of the tree, emitting bytecode and constants as it
//! goes (no separate constant-folding or optimization pass). Function
//! bodies — including event handler and condition bodies — are emitted
//! inline in the same instruction stream, fenced off by a `Jump` around
//! them so ordinary top-level control flow skips straight past; `Call`
//! only ever reaches them via their recorded entry point.

use std::collections::HashMap;

use crate::{
    ast::{BinaryOperator, FilterExpr, Literal, LogicalOperator, NamedArg, Node, NodeKind, Priority, UnaryOperator},
    bytecode::{builder::CodeBuilder, code::Code, op::Opcode},
    exception_private::CompileError,
    exception_public::{CodeLoc, ErrorSink, ScriptError},
    function::VMFunction,
    registry::ImportResolver,
    symbol::SymbolTable,
    value::Value,
};

/// Where a name resolves to: a function-local slot, or a name-keyed global
/// binding (spec.md §5's "single process-wide environment"). Top-level
/// statements (`scopes` empty) always resolve to `Global`.
#[derive(Debug, Clone, Copy)]
enum Target {
    Local(u8),
    Global(u8),
}

pub struct Compiler<'a> {
    builder: CodeBuilder,
    /// One `SymbolTable` per function currently being compiled, innermost
    /// last. Empty while compiling top-level statements. Functions don't
    /// nest lexically here (no closures — spec.md's event/VM design never
    /// asks for captured upvalues), so this is pushed and popped around
    /// each `FunctionDef`/handler/condition body, never accumulated.
    scopes: Vec<SymbolTable>,
    /// Mirrors every module-level `var`/`let`/implicit binding seen so
    /// far, purely to catch immutable reassignment at compile time; slots
    /// here are never used as operands (globals address by name).
    globals: SymbolTable,
    /// Every `FunctionDef` compiled so far, by name. Flat: "functions are
    /// interned once per definition" (spec.md §3) regardless of where in
    /// the tree the definition appears.
    functions: HashMap<String, crate::function::FunctionId>,
    resolver: &'a dyn ImportResolver,
    sink: &'a mut dyn ErrorSink,
    error_count: usize,
}

impl<'a> Compiler<'a> {
    /// Compiles a parsed program to a `Code` chunk, or `None` if any
    /// compile error was reported (spec.md §7: "compile errors halt the
    /// compiler with a boolean false return").
    #[must_use]
    pub fn compile(program: &[Node], resolver: &'a dyn ImportResolver, sink: &'a mut dyn ErrorSink) -> Option<Code> {
        let mut compiler = Self {
            builder: CodeBuilder::new(),
            scopes: Vec::new(),
            globals: SymbolTable::new(),
            functions: HashMap::new(),
            resolver,
            sink,
            error_count: 0,
        };
        for stmt in program {
            compiler.compile_stmt(stmt);
        }
        if compiler.error_count > 0 {
            None
        } else {
            Some(compiler.builder.build())
        }
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    fn report_compile_error(&mut self, err: CompileError) {
        let loc = err.loc();
        self.sink.report(ScriptError::new(loc, err.to_string()));
        self.error_count += 1;
    }

    fn report(&mut self, loc: CodeLoc, message: impl Into<String>) {
        self.sink.report(ScriptError::new(loc, message.into()));
        self.error_count += 1;
    }

    fn in_function(&self) -> bool {
        !self.scopes.is_empty()
    }

    fn intern_string(&mut self, s: &str) -> u8 {
        self.builder.add_constant(Value::string(s))
    }

    fn load_null(&mut self) {
        let ix = self.builder.add_constant(Value::Null);
        self.builder.emit_u8(Opcode::LoadConst, ix);
    }

    // --- name resolution -------------------------------------------------

    /// Declares `name` in the innermost applicable scope (current function,
    /// or globals at top level), reusing its slot if already declared.
    fn declare_target(&mut self, name: &str, mutable: bool) -> Target {
        if self.in_function() {
            let slot = self.scopes.last_mut().expect("in_function").get_or_add(name, mutable, false);
            Target::Local(u8::try_from(slot).expect("more than 255 locals in one function"))
        } else {
            self.globals.get_or_add(name, mutable, false);
            Target::Global(self.intern_string(name))
        }
    }

    fn mark_initialized(&mut self, name: &str) {
        if self.in_function() {
            if let Some(sym) = self.scopes.last_mut().expect("in_function").lookup_mut(name) {
                sym.initialized = true;
            }
        } else if let Some(sym) = self.globals.lookup_mut(name) {
            sym.initialized = true;
        }
    }

    /// `true` if reassigning `name` right now would violate `let`
    /// immutability (spec.md §8: "once a `let` binding is initialised, any
    /// subsequent store fails at compile time").
    fn would_violate_immutability(&self, name: &str) -> bool {
        let existing = if self.in_function() {
            self.scopes.last().and_then(|scope| scope.lookup(name))
        } else {
            self.globals.lookup(name)
        };
        existing.is_some_and(|sym| !sym.mutable && sym.initialized)
    }

    fn emit_store(&mut self, target: Target) {
        match target {
            Target::Local(slot) => self.builder.emit_u8(Opcode::StoreVar, slot),
            Target::Global(name_const) => self.builder.emit_u8(Opcode::StoreGlobal, name_const),
        }
    }

    fn emit_load(&mut self, target: Target) {
        match target {
            Target::Local(slot) => self.builder.emit_u8(Opcode::LoadVar, slot),
            Target::Global(name_const) => self.builder.emit_u8(Opcode::LoadGlobal, name_const),
        }
    }

    /// Loads a bare identifier: a local slot if one is declared in the
    /// current function, else an interned script function, else a global.
    fn compile_identifier_load(&mut self, name: &str) {
        if self.in_function() {
            if let Some(sym) = self.scopes.last().expect("in_function").lookup(name) {
                let slot = u8::try_from(sym.slot).expect("more than 255 locals in one function");
                self.builder.emit_u8(Opcode::LoadVar, slot);
                return;
            }
        }
        if let Some(&fid) = self.functions.get(name) {
            let ix = self.builder.add_constant(Value::FunctionRef(fid));
            self.builder.emit_u8(Opcode::LoadConst, ix);
            return;
        }
        let name_const = self.intern_string(name);
        self.builder.emit_u8(Opcode::LoadGlobal, name_const);
    }

    // --- statements --------------------------------------------------------

    fn compile_block_contents(&mut self, body: &Node) {
        match &body.kind {
            NodeKind::Block(stmts) => {
                for stmt in stmts {
                    self.compile_stmt(stmt);
                }
            }
            _ => self.compile_stmt(body),
        }
    }

    fn compile_stmt(&mut self, node: &Node) {
        let loc = node.loc;
        match &node.kind {
            NodeKind::VariableDecl { name, initializer, mutable, .. } => {
                self.compile_variable_decl(name, initializer, *mutable, loc);
            }
            NodeKind::Block(stmts) => {
                for stmt in stmts {
                    self.compile_stmt(stmt);
                }
            }
            NodeKind::If { condition, body, else_body } => self.compile_if(condition, body, else_body.as_deref()),
            NodeKind::While { condition, body } => self.compile_while(condition, body),
            NodeKind::For { initializer, condition, increment, body } => {
                self.compile_for(initializer.as_deref(), condition.as_deref(), increment.as_deref(), body);
            }
            NodeKind::SwitchCase { discriminant, cases, default } => {
                self.compile_switch(discriminant, cases, default.as_deref());
            }
            NodeKind::FunctionDef { name, params, body } => self.compile_function_def(name, params, body),
            NodeKind::NakedIterator { var_name, iterable, body } => self.compile_naked_iterator(var_name, iterable, body, loc),
            NodeKind::EventBinding { .. } => self.compile_event_binding(&node.kind),
            NodeKind::EventBroadcast { .. } => self.compile_event_broadcast(&node.kind),
            NodeKind::Import { path } => self.compile_import(path, loc),
            NodeKind::Return { value } => self.compile_return(value.as_deref()),
            NodeKind::Assignment { target, value } => self.compile_assignment(target, value, loc),
            NodeKind::PropertyAssignment { object, property, value } => {
                self.compile_property_assignment(object, property, value);
            }
            NodeKind::IndexAssignment { array, index, value } => {
                self.compile_expr(array);
                self.compile_expr(index);
                self.compile_expr(value);
                self.builder.emit(Opcode::SetIndex);
                self.builder.emit(Opcode::Pop);
            }
            _ => {
                self.compile_expr(node);
                self.builder.emit(Opcode::Pop);
            }
        }
    }

    fn compile_variable_decl(&mut self, name: &str, initializer: &Option<Box<Node>>, mutable: bool, loc: CodeLoc) {
        if self.would_violate_immutability(name) {
            self.report_compile_error(CompileError::AssignToImmutable { name: name.to_owned(), loc });
        }
        match initializer {
            Some(expr) => self.compile_expr(expr),
            None => self.load_null(),
        }
        let target = self.declare_target(name, mutable);
        self.emit_store(target);
        self.mark_initialized(name);
    }

    fn compile_assignment(&mut self, target_name: &str, value: &Node, loc: CodeLoc) {
        self.compile_expr(value);
        if self.would_violate_immutability(target_name) {
            self.report_compile_error(CompileError::AssignToImmutable { name: target_name.to_owned(), loc });
        }
        let target = if self.in_function() && self.scopes.last().expect("in_function").lookup(target_name).is_some() {
            let slot = self.scopes.last().expect("in_function").lookup(target_name).expect("checked above").slot;
            Target::Local(u8::try_from(slot).expect("more than 255 locals in one function"))
        } else {
            Target::Global(self.intern_string(target_name))
        };
        self.emit_store(target);
        self.mark_initialized(target_name);
    }

    /// Collapses a chain of `PropertyAccess` nodes down to its root
    /// expression and the list of keys along the way, e.g. `a.b.c` ->
    /// `(a, ["b", "c"])`. Used to fold multi-level property writes into a
    /// single `SetNestedProperty` (spec.md §9: avoid leaking intermediate
    /// objects onto the stack for `a.b.c = v`).
    fn collect_property_path<'n>(node: &'n Node) -> (&'n Node, Vec<&'n str>) {
        match &node.kind {
            NodeKind::PropertyAccess { object, property } => {
                let (base, mut path) = Self::collect_property_path(object);
                path.push(property.as_str());
                (base, path)
            }
            _ => (node, Vec::new()),
        }
    }

    fn compile_property_assignment(&mut self, object: &Node, property: &str, value: &Node) {
        let (base, mut path) = Self::collect_property_path(object);
        path.push(property);
        if path.len() > 1 {
            self.compile_expr(base);
            self.compile_expr(value);
            let key_consts: Vec<u8> = path.iter().map(|key| self.intern_string(key)).collect();
            self.builder.emit_set_nested_property(&key_consts);
        } else {
            self.compile_expr(object);
            self.compile_expr(value);
            let key_const = self.intern_string(property);
            self.builder.emit_set_property(key_const);
            self.builder.emit(Opcode::Pop);
        }
    }

    fn compile_if(&mut self, condition: &Node, body: &Node, else_body: Option<&Node>) {
        self.compile_expr(condition);
        let else_jump = self.builder.emit_jump(Opcode::JumpIfFalse);
        self.compile_stmt(body);
        match else_body {
            Some(else_node) => {
                let end_jump = self.builder.emit_jump(Opcode::Jump);
                self.builder.patch_jump(else_jump);
                self.compile_stmt(else_node);
                self.builder.patch_jump(end_jump);
            }
            None => self.builder.patch_jump(else_jump),
        }
    }

    fn compile_while(&mut self, condition: &Node, body: &Node) {
        let loop_start = self.builder.here();
        self.compile_expr(condition);
        let exit = self.builder.emit_jump(Opcode::JumpIfFalse);
        self.compile_stmt(body);
        self.builder.emit_loop(loop_start);
        self.builder.patch_jump(exit);
    }

    /// Lowering order per spec.md §4.3: "initializer, label L0, condition,
    /// `JumpIfFalse` L1, body, increment, `Loop` L0, label L1."
    fn compile_for(&mut self, initializer: Option<&Node>, condition: Option<&Node>, increment: Option<&Node>, body: &Node) {
        if let Some(init) = initializer {
            self.compile_stmt(init);
        }
        let l0 = self.builder.here();
        let exit = condition.map(|cond| {
            self.compile_expr(cond);
            self.builder.emit_jump(Opcode::JumpIfFalse)
        });
        self.compile_stmt(body);
        if let Some(inc) = increment {
            self.compile_stmt(inc);
        }
        self.builder.emit_loop(l0);
        if let Some(exit) = exit {
            self.builder.patch_jump(exit);
        }
    }

    /// Linear `case`-by-`case` comparison against the discriminant, no
    /// jump table: each arm is `Dup; <value>; Eq; JumpIfFalse next`.
    fn compile_switch(&mut self, discriminant: &Node, cases: &[(Node, Node)], default: Option<&Node>) {
        self.compile_expr(discriminant);
        let mut end_jumps = Vec::new();
        for (value, body) in cases {
            self.builder.emit(Opcode::Dup);
            self.compile_expr(value);
            self.builder.emit(Opcode::Eq);
            let skip = self.builder.emit_jump(Opcode::JumpIfFalse);
            self.builder.emit(Opcode::Pop);
            self.compile_stmt(body);
            end_jumps.push(self.builder.emit_jump(Opcode::Jump));
            self.builder.patch_jump(skip);
        }
        self.builder.emit(Opcode::Pop);
        if let Some(default_body) = default {
            self.compile_stmt(default_body);
        }
        for end in end_jumps {
            self.builder.patch_jump(end);
        }
    }

    /// Naked iterators only ever range over a `Range` (spec.md §4.3: "Naked
    /// iterators over a range lower to an induction variable bound to
    /// `start`, loop-test `< end`..."); anything else reaching here is a
    /// parser/grammar mismatch, reported rather than silently miscompiled.
    fn compile_naked_iterator(&mut self, var_name: &str, iterable: &Node, body: &Node, loc: CodeLoc) {
        let NodeKind::Range { start, end } = &iterable.kind else {
            self.report(loc, "naked iterator requires a range iterable");
            return;
        };
        self.compile_expr(start);
        let var = self.declare_target(var_name, true);
        self.emit_store(var);
        self.mark_initialized(var_name);

        let l0 = self.builder.here();
        self.emit_load(var);
        self.compile_expr(end);
        self.builder.emit(Opcode::Lt);
        let exit = self.builder.emit_jump(Opcode::JumpIfFalse);
        self.compile_stmt(body);
        self.emit_load(var);
        let one = self.builder.add_constant(Value::Number(1.0));
        self.builder.emit_u8(Opcode::LoadConst, one);
        self.builder.emit(Opcode::Add);
        self.emit_store(var);
        self.builder.emit_loop(l0);
        self.builder.patch_jump(exit);
    }

    fn compile_function_def(&mut self, name: &str, params: &[String], body: &Node) {
        let id = self.compile_callable(name, params, |c| {
            c.compile_block_contents(body);
            c.load_null();
            c.builder.emit(Opcode::Return);
        });
        self.functions.insert(name.to_owned(), id);
    }

    fn compile_return(&mut self, value: Option<&Node>) {
        match value {
            Some(expr) => self.compile_expr(expr),
            None => self.load_null(),
        }
        self.builder.emit(Opcode::Return);
    }

    fn compile_import(&mut self, path: &str, loc: CodeLoc) {
        if !self.resolver.is_installed(path) {
            self.report_compile_error(CompileError::UninstalledImport { path: path.to_owned(), loc });
        }
    }

    /// Emits a callable's body fenced by a `Jump` (so normal control flow
    /// skips over it) and registers it in the function table. Used for
    /// `FunctionDef`, event handler bodies, and event condition bodies
    /// alike — they all share this same shape.
    fn compile_callable(&mut self, name: &str, params: &[String], emit_body: impl FnOnce(&mut Self)) -> crate::function::FunctionId {
        let skip = self.builder.emit_jump(Opcode::Jump);
        let entry = self.builder.here();
        let mut scope = SymbolTable::new();
        for param in params {
            scope.get_or_add(param, true, false);
            if let Some(sym) = scope.lookup_mut(param) {
                sym.initialized = true;
            }
        }
        self.scopes.push(scope);
        emit_body(self);
        let scope = self.scopes.pop().expect("pushed immediately above");
        self.builder.patch_jump(skip);
        let local_count = u16::try_from(scope.len()).expect("more than 65535 locals in one function");
        self.builder.add_function(VMFunction {
            name: name.to_owned(),
            entry_point: entry,
            param_names: params.to_vec(),
            local_count,
        })
    }

    fn compile_condition_function(&mut self, handler_name: &str, params: &[String], condition: &Node) -> crate::function::FunctionId {
        let name = format!("{handler_name}$condition");
        self.compile_callable(&name, params, |c| {
            c.compile_expr(condition);
            c.builder.emit(Opcode::Return);
        })
    }

    /// Compiles one filter chain, special-casing `priority(...)`: it never
    /// produces a runtime filter record, only the listener's dispatch-order
    /// byte (spec.md §4.5: "used at registration time only; always matches
    /// at dispatch"). Every other filter's value expression is evaluated
    /// once, here, and left on the operand stack for the caller's
    /// `BindEvent`/`Broadcast` to consume.
    fn compile_filters(&mut self, filters: &[FilterExpr]) -> (u8, Vec<(u8, u8)>) {
        let mut priority_byte = Priority::default() as u8;
        let mut records = Vec::new();
        for filter in filters {
            if filter.tag == "priority" {
                priority_byte = Self::extract_priority(&filter.value) as u8;
                continue;
            }
            self.compile_expr(&filter.value);
            let tag_const = self.intern_string(&filter.tag);
            records.push((tag_const, filter.comparator.as_byte()));
        }
        (priority_byte, records)
    }

    /// `priority(high)` parses its argument as a bare identifier (or,
    /// defensively, a string literal); anything else defaults to `Medium`
    /// rather than failing compilation over unusual but harmless input.
    fn extract_priority(value: &Node) -> Priority {
        let text = match &value.kind {
            NodeKind::Variable(name) => name.as_str(),
            NodeKind::Literal(Literal::String(s)) => s.as_str(),
            _ => "",
        };
        match text {
            "high" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Medium,
        }
    }

    fn compile_event_binding(&mut self, kind: &NodeKind) {
        let NodeKind::EventBinding { handler_name, params, event_name, condition, filters, body } = kind else {
            unreachable!("caller matched EventBinding")
        };
        let handler_fn = self.compile_callable(handler_name, params, |c| {
            c.compile_block_contents(body);
            c.load_null();
            c.builder.emit(Opcode::Return);
        });
        let condition_fn = condition.as_deref().map(|cond| self.compile_condition_function(handler_name, params, cond));
        let (priority_byte, records) = self.compile_filters(filters);
        let condition_operand = condition_fn.map(|id| u16::try_from(id.index()).expect("more than 65535 functions"));
        let handler_operand = u16::try_from(handler_fn.index()).expect("more than 65535 functions");
        let event_name_const = self.intern_string(event_name);
        self.builder.emit_bind_event(event_name_const, handler_operand, condition_operand, priority_byte, &records);
    }

    fn compile_event_broadcast(&mut self, kind: &NodeKind) {
        let NodeKind::EventBroadcast { event_name, condition, filters, args } = kind else {
            unreachable!("caller matched EventBroadcast")
        };
        let guard = condition.as_deref().map(|cond| {
            self.compile_expr(cond);
            self.builder.emit_jump(Opcode::JumpIfFalse)
        });
        let mut arg_name_consts = Vec::new();
        for NamedArg { name, value } in args {
            self.compile_expr(value);
            arg_name_consts.push(self.intern_string(name));
        }
        // A broadcast's own priority filter (if written) has nothing to
        // register against and is meaningless at dispatch time; dropped.
        let (_, records) = self.compile_filters(filters);
        let event_name_const = self.intern_string(event_name);
        self.builder.emit_broadcast(event_name_const, &arg_name_consts, &records);
        if let Some(guard) = guard {
            self.builder.patch_jump(guard);
        }
    }

    // --- expressions ---------------------------------------------------

    fn compile_expr(&mut self, node: &Node) {
        let loc = node.loc;
        match &node.kind {
            NodeKind::Literal(lit) => self.compile_literal(lit),
            NodeKind::Variable(name) => self.compile_identifier_load(name),
            NodeKind::BinaryOp { left, right, op } => {
                self.compile_expr(left);
                self.compile_expr(right);
                self.builder.emit(binop_opcode(*op));
            }
            NodeKind::LogicalOp { left, right, op } => self.compile_logical(left, right, *op),
            NodeKind::UnaryOp { operand, op } => {
                self.compile_expr(operand);
                self.builder.emit(unop_opcode(*op));
            }
            NodeKind::ArrayLiteral(elements) => {
                self.builder.emit(Opcode::NewArray);
                for element in elements {
                    self.compile_expr(element);
                    self.builder.emit(Opcode::ArrayPush);
                }
            }
            NodeKind::IndexAccess { array, index } => {
                self.compile_expr(array);
                self.compile_expr(index);
                self.builder.emit(Opcode::GetIndex);
            }
            NodeKind::ObjectLiteral { entries, mixins } => self.compile_object_literal(entries, mixins),
            NodeKind::PropertyAccess { object, property } => {
                self.compile_expr(object);
                let key_const = self.intern_string(property);
                self.builder.emit_get_property(key_const);
            }
            NodeKind::MethodCall { object, method, args } => self.compile_method_call(object, method, args),
            NodeKind::FunctionCall { callee, args } => self.compile_function_call(callee, args, loc),
            NodeKind::Range { .. } => {
                self.report(loc, "range expression is only valid as a loop's iterable");
                self.load_null();
            }
            _ => {
                self.report(loc, "node kind is not valid in expression position");
                self.load_null();
            }
        }
    }

    fn compile_literal(&mut self, lit: &Literal) {
        let value = match lit {
            Literal::Number(n) => Value::Number(*n),
            Literal::String(s) => Value::string(s.as_str()),
            Literal::Boolean(b) => Value::Boolean(*b),
            Literal::Null => Value::Null,
        };
        let ix = self.builder.add_constant(value);
        self.builder.emit_u8(Opcode::LoadConst, ix);
    }

    /// `&&`/`||` as branch-and-pop (spec.md §9): evaluate left, `Dup` it so
    /// the conditional jump can consume one copy while the other survives
    /// as the short-circuited result, pop the surviving copy only on the
    /// fallthrough path before evaluating right.
    fn compile_logical(&mut self, left: &Node, right: &Node, op: LogicalOperator) {
        self.compile_expr(left);
        self.builder.emit(Opcode::Dup);
        let end = match op {
            LogicalOperator::And => self.builder.emit_jump(Opcode::JumpIfFalse),
            LogicalOperator::Or => self.builder.emit_jump(Opcode::JumpIfTrue),
        };
        self.builder.emit(Opcode::Pop);
        self.compile_expr(right);
        self.builder.patch_jump(end);
    }

    fn compile_object_literal(&mut self, entries: &[(String, Node)], mixins: &[String]) {
        self.builder.emit(Opcode::NewObject);
        for mixin_name in mixins {
            self.compile_identifier_load(mixin_name);
            self.builder.emit(Opcode::CopyProperties);
        }
        for (key, value) in entries {
            self.compile_expr(value);
            let key_const = self.intern_string(key);
            self.builder.emit_set_property(key_const);
        }
    }

    fn compile_method_call(&mut self, object: &Node, method: &str, args: &[Node]) {
        if method == "toString" && args.is_empty() {
            self.compile_expr(object);
            self.builder.emit(Opcode::ToString);
            return;
        }
        self.compile_expr(object);
        for arg in args {
            self.compile_expr(arg);
        }
        let method_const = self.intern_string(method);
        self.builder.emit_call_method(method_const, u8::try_from(args.len()).expect("more than 255 arguments"));
    }

    /// `print(...)` lowers to the dedicated `Print` opcode rather than a
    /// generic call; every other identifier is resolved like any other
    /// value (local, script function, or global) and invoked via `Call`.
    fn compile_function_call(&mut self, callee: &str, args: &[Node], loc: CodeLoc) {
        if callee == "print" {
            for arg in args {
                self.compile_expr(arg);
            }
            self.builder.emit_print(u8::try_from(args.len()).expect("more than 255 arguments"));
            return;
        }
        let known = self.in_function() && self.scopes.last().expect("in_function").lookup(callee).is_some()
            || self.functions.contains_key(callee)
            || self.globals.lookup(callee).is_some();
        if !known {
            // Could still be a host native registered into the global
            // environment before `vm_run`, invisible to the compiler — but
            // a name the script itself never touched at all before this
            // call is almost certainly a typo (spec.md §7: "unknown
            // function in direct call"). Report it, then still emit an
            // optimistic `LoadGlobal` so the rest of the chunk stays
            // well-formed for recovery.
            self.report_compile_error(CompileError::UnknownFunction { name: callee.to_owned(), loc });
        }
        self.compile_identifier_load(callee);
        for arg in args {
            self.compile_expr(arg);
        }
        self.builder.emit_call(u8::try_from(args.len()).expect("more than 255 arguments"));
    }
}

fn binop_opcode(op: BinaryOperator) -> Opcode {
    match op {
        BinaryOperator::Add => Opcode::Add,
        BinaryOperator::Sub => Opcode::Sub,
        BinaryOperator::Mul => Opcode::Mul,
        BinaryOperator::Div => Opcode::Div,
        BinaryOperator::Mod => Opcode::Mod,
        BinaryOperator::Eq => Opcode::Eq,
        BinaryOperator::Neq => Opcode::Neq,
        BinaryOperator::Lt => Opcode::Lt,
        BinaryOperator::Gt => Opcode::Gt,
        BinaryOperator::Lte => Opcode::Lte,
        BinaryOperator::Gte => Opcode::Gte,
    }
}

fn unop_opcode(op: UnaryOperator) -> Opcode {
    match op {
        UnaryOperator::Neg => Opcode::Neg,
        UnaryOperator::Not => Opcode::Not,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{exception_public::CollectingSink, lexer::Lexer, parse::Parser, registry::PermissiveRegistry};

    fn compile_source(src: &str) -> (Option<Code>, CollectingSink) {
        let (tokens, lex_errors) = Lexer::new(src).tokenize();
        assert!(lex_errors.is_empty(), "unexpected lex errors: {lex_errors:?}");
        let mut sink = CollectingSink::default();
        let mut parser = Parser::new(&tokens, &mut sink);
        let program = parser.parse_program();
        let registry = PermissiveRegistry;
        let code = Compiler::compile(&program, &registry, &mut sink);
        (code, sink)
    }

    #[test]
    fn arithmetic_compiles_without_error() {
        let (code, sink) = compile_source("x: 1 + 2 * 3\n");
        assert!(code.is_some(), "{:?}", sink.errors);
    }

    #[test]
    fn let_reassignment_is_a_compile_error() {
        let (code, _) = compile_source("let k: 1\nk: 2\n");
        assert!(code.is_none());
    }

    #[test]
    fn unknown_function_call_is_reported() {
        let (code, sink) = compile_source("totallyUnknownThing()\n");
        assert!(code.is_none());
        assert!(sink.errors.iter().any(|e| e.message.contains("unknown function")));
    }

    #[test]
    fn naked_iterator_over_range_compiles() {
        let (code, sink) = compile_source("i: 0..3\n    print(i)\n");
        assert!(code.is_some(), "{:?}", sink.errors);
    }

    #[test]
    fn object_literal_with_mixin_compiles() {
        let (code, sink) = compile_source("base: { hp: 10, atk: 1 }\nhero: { base, atk: 5, name: \"A\" }\n");
        assert!(code.is_some(), "{:?}", sink.errors);
    }

    #[test]
    fn event_binding_and_broadcast_compiles() {
        let src = "onHit: function(dmg) <- [\"Damage\" | type(\"enemy\") | priority(high)]\n    print(dmg)\nfire[\"Damage\"](damage: 7)\n";
        let (code, sink) = compile_source(src);
        assert!(code.is_some(), "{:?}", sink.errors);
    }
}
