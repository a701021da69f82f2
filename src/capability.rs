//! Host-callable ABI (spec.md §6).
//!
//! Host-provided built-in modules, file I/O, and everything else spec.md §1
//! calls out as an external collaborator reach the VM exclusively through
//! this registry: the host registers named callables before execution,
//! binds each one into the global [`crate::namespace::Environment`] as a
//! `Value::NativeRef`, and the `Call`/`CallMethod` opcodes invoke them with
//! a fully evaluated argument vector owned by the VM's stack. The host must
//! not retain references past return.

use crate::{exception_public::ScriptError, value::Value};

/// Index into a [`NativeRegistry`]. `Value::NativeRef` carries one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct NativeId(u32);

impl NativeId {
    #[must_use]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A host-provided function. Takes the fully evaluated argument vector and
/// returns a single `RuntimeValue`, or an error that propagates as a
/// `RunError::NativeCallFailed`.
pub type NativeFn = Box<dyn Fn(&[Value]) -> Result<Value, ScriptError> + 'static>;

/// Name-keyed table of host callables, built by the host before constructing
/// the `VM` and consulted whenever script code calls an identifier that
/// does not resolve to a script-defined function.
#[derive(Default)]
pub struct NativeRegistry {
    names: Vec<String>,
    functions: Vec<NativeFn>,
}

impl NativeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` as a host callable. Registering the same name twice
    /// replaces the previous entry's id is *not* reused — the new
    /// registration gets a fresh `NativeId` and the old binding is orphaned.
    /// Callers should register each name exactly once before execution.
    pub fn register(&mut self, name: impl Into<String>, f: impl Fn(&[Value]) -> Result<Value, ScriptError> + 'static) -> NativeId {
        let id = NativeId(u32::try_from(self.functions.len()).expect("too many native functions"));
        self.names.push(name.into());
        self.functions.push(Box::new(f));
        id
    }

    #[must_use]
    pub fn lookup_by_name(&self, name: &str) -> Option<NativeId> {
        self.names.iter().position(|n| n == name).map(|i| NativeId(u32::try_from(i).unwrap()))
    }

    #[must_use]
    pub fn name(&self, id: NativeId) -> &str {
        &self.names[id.index()]
    }

    pub fn call(&self, id: NativeId, args: &[Value]) -> Result<Value, ScriptError> {
        (self.functions[id.index()])(args)
    }
}

impl std::fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeRegistry").field("names", &self.names).finish_non_exhaustive()
    }
}
