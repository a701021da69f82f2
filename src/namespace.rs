//! `Environment`: the named-binding chain backing `LoadGlobal`/`StoreGlobal`
//! (spec.md §3/§5).
//!
//! Compiled local variables resolve to fixed slots via [`crate::symbol::SymbolTable`]
//! and never touch this type. `Environment` exists for the one binding set
//! that genuinely is name-keyed at runtime: module-level globals, which the
//! host may pre-populate with input values and native callables before
//! `vm_run` (spec.md §5: "a single process-wide environment ... read/written
//! by any script frame").

use ahash::AHashMap;

use crate::{exception_private::RunResult, exception_public::CodeLoc, exception_private::RunError, value::Value};

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    mutable: bool,
}

/// One link in the environment chain. The VM only ever pushes a scope for
/// constructs that need dynamic (not slot-resolved) name shadowing; in
/// practice that's just the module-level scope, so `Environment::new`
/// starts with exactly one.
#[derive(Debug, Default, Clone)]
struct Scope {
    bindings: AHashMap<String, Binding>,
}

/// Linked chain of name -> value mappings, outermost (global) scope first.
#[derive(Debug, Clone)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "cannot pop the global scope");
        self.scopes.pop();
    }

    /// Declares `name` in the innermost scope. Used by the host to seed
    /// globals and by `Import` handling to bind a module value.
    pub fn declare(&mut self, name: impl Into<String>, value: Value, mutable: bool) {
        self.scopes
            .last_mut()
            .expect("environment always has a scope")
            .bindings
            .insert(name.into(), Binding { value, mutable });
    }

    /// Looks up `name`, walking outward from the innermost scope.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.bindings.get(name)).map(|b| &b.value)
    }

    /// Writes to an existing binding, walking outward. Fails if the
    /// binding is immutable or the name is undeclared.
    pub fn set(&mut self, name: &str, value: Value, loc: CodeLoc) -> RunResult<()> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(binding) = scope.bindings.get_mut(name) {
                if !binding.mutable {
                    return Err(RunError::StoreToImmutableGlobal {
                        name: name.to_owned(),
                        loc,
                    });
                }
                binding.value = value;
                return Ok(());
            }
        }
        Err(RunError::UnknownGlobal {
            name: name.to_owned(),
            loc,
        })
    }
}
