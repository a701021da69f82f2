//! Convenience pipeline wiring lexer -> parser -> compiler -> VM (spec.md §6).
//!
//! Most embedding hosts don't need to touch `Lexer`/`Parser` directly; they
//! call [`compile`] (or [`run`] for the common compile-then-execute case) and
//! get every stage's diagnostics back through one [`ErrorSink`].

use crate::{
    bytecode::{vm::VM, Code, Compiler},
    capability::NativeRegistry,
    exception_public::{ErrorSink, ScriptError},
    lexer::Lexer,
    namespace::Environment,
    parse::Parser,
    registry::ImportResolver,
};

/// Runs `source` through the lexer, parser, and compiler, reporting every
/// diagnostic to `sink`. Returns `None` if any stage failed; a failed lex
/// still runs the parser over whatever tokens it produced (panic-mode
/// recovery keeps error counts meaningful) but compilation is skipped once
/// either stage reported an error, since the AST can't be trusted.
#[must_use]
pub fn compile(source: &str, resolver: &dyn ImportResolver, sink: &mut dyn ErrorSink) -> Option<Code> {
    let (tokens, lex_errors) = Lexer::new(source).tokenize();
    for err in &lex_errors {
        sink.report(ScriptError::new(err.loc(), err.to_string()));
    }
    let mut parser = Parser::new(&tokens, sink);
    let program = parser.parse_program();
    if !lex_errors.is_empty() || parser.error_count() > 0 {
        return None;
    }
    Compiler::compile(&program, resolver, sink)
}

/// Compiles and runs `source` to completion. Returns the `VM` (so the host
/// can inspect its heap/environment afterward) paired with whether
/// execution completed without a fatal runtime error; `None` if compilation
/// itself failed.
///
/// A fatal `RunError` is reported to `sink` in addition to being reflected
/// in the returned `bool`, so callers who only care about diagnostics can
/// ignore the `VM` and look at `sink` alone.
pub fn run(
    source: &str,
    environment: Environment,
    natives: NativeRegistry,
    resolver: &dyn ImportResolver,
    sink: &mut dyn ErrorSink,
) -> Option<VM> {
    let code = compile(source, resolver, sink)?;
    let mut vm = VM::new(code, environment, natives);
    if let Err(err) = vm.run(sink) {
        sink.report(ScriptError::new(err.loc(), err.to_string()));
    }
    Some(vm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{exception_public::CollectingSink, registry::StaticRegistry};

    #[test]
    fn compiles_clean_program() {
        let mut sink = CollectingSink::default();
        let code = compile("x: 1 + 2\n", &StaticRegistry::new(), &mut sink);
        assert!(sink.errors.is_empty());
        assert!(code.is_some());
    }

    #[test]
    fn reports_lex_errors_and_skips_compilation() {
        let mut sink = CollectingSink::default();
        let code = compile("\"unterminated\n", &StaticRegistry::new(), &mut sink);
        assert!(!sink.errors.is_empty());
        assert!(code.is_none());
    }

    #[test]
    fn runs_clean_program_to_completion() {
        let mut sink = CollectingSink::default();
        let vm = run("x: 1 + 2\n", Environment::new(), NativeRegistry::new(), &StaticRegistry::new(), &mut sink);
        assert!(sink.errors.is_empty());
        assert!(vm.is_some());
    }
}
