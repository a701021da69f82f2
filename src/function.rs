//! Script-defined functions and call-frame bookkeeping.

/// Index into the VM's function table. `Value::FunctionRef` carries one of
/// these; it is assigned once, at function-definition compile time, and is
/// interned once per definition (spec.md §3: "Functions are interned once
/// per definition").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct FunctionId(u32);

impl FunctionId {
    #[must_use]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    /// Reconstructs the id the compiler wrote as a raw `u16` operand
    /// (`BindEvent`'s handler/condition function indices).
    #[must_use]
    pub(crate) fn from_index(index: u16) -> Self {
        Self(u32::from(index))
    }
}

/// A compiled script function: name, entry point, and parameter list.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VMFunction {
    pub name: String,
    /// Byte offset of the function's first instruction within the owning
    /// chunk's bytecode array.
    pub entry_point: usize,
    pub param_names: Vec<String>,
    /// Total local slot count (parameters plus every other declared name),
    /// i.e. the final length of the function's symbol table. The VM
    /// reserves this many stack slots, initialized to `Null`, when pushing
    /// the call frame, then overwrites the first `param_count()` with the
    /// call's arguments.
    pub local_count: u16,
}

impl VMFunction {
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.param_names.len()
    }
}

/// Table of all script functions compiled into a chunk, indexed by
/// [`FunctionId`].
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionTable {
    functions: Vec<VMFunction>,
}

impl FunctionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, function: VMFunction) -> FunctionId {
        let id = FunctionId(u32::try_from(self.functions.len()).expect("too many functions"));
        self.functions.push(function);
        id
    }

    #[must_use]
    pub fn get(&self, id: FunctionId) -> &VMFunction {
        &self.functions[id.index()]
    }
}

/// An activation record for a single function call.
///
/// `stack_base` is the operand-stack index at which this frame's locals
/// (parameters, then local variable slots) begin; `LoadVar(slot)` /
/// `StoreVar(slot)` opcodes index relative to it.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub function: FunctionId,
    pub return_ip: usize,
    pub stack_base: usize,
    /// Bound `this` object for `CallMethod` frames, `None` for plain calls.
    pub this: Option<crate::value::Value>,
}
