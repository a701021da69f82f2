//! End-to-end coverage of the worked scenarios and invariants (spec.md §8).
//!
//! Each scenario goes through the real pipeline (`ember::compile` + `VM`),
//! never constructing `Code` by hand, so these also exercise the lexer and
//! parser, not just the compiler and VM. Every scenario below asserts the
//! actual printed output against the spec's literal expected strings, not
//! just "no errors" — a wrong value from `print` should fail these tests.

use ember::{capability::NativeRegistry, registry::StaticRegistry, CollectStringPrint, CollectingSink, Environment, VM};

/// Compiles and runs `source`, returning every line `print` wrote plus the
/// diagnostics sink, so callers can assert both.
fn run_and_capture(source: &str) -> (Vec<String>, CollectingSink) {
    let mut sink = CollectingSink::default();
    let code = ember::compile(source, &StaticRegistry::new(), &mut sink).expect("should compile");
    let mut vm = VM::new(code, Environment::new(), NativeRegistry::new()).with_print_writer(CollectStringPrint::default());
    vm.run(&mut sink).expect("should run to completion");
    let lines = vm
        .print_writer()
        .as_any()
        .downcast_ref::<CollectStringPrint>()
        .expect("print writer is the CollectStringPrint set above")
        .lines
        .clone();
    (lines, sink)
}

#[test]
fn arithmetic_and_precedence() {
    let (lines, sink) = run_and_capture("x: 1 + 2 * 3\nprint(x)\n");
    assert!(sink.errors.is_empty(), "{:?}", sink.errors);
    assert_eq!(lines, vec!["7"]);
}

#[test]
fn if_else_with_indentation() {
    let src = "var x: 10\nif x > 5\n    print(\"big\")\nelse\n    print(\"small\")\n";
    let (lines, sink) = run_and_capture(src);
    assert!(sink.errors.is_empty(), "{:?}", sink.errors);
    assert_eq!(lines, vec!["big"]);
}

#[test]
fn naked_iterator_is_half_open() {
    let src = "i: 0..3\n    print(i)\n";
    let (lines, sink) = run_and_capture(src);
    assert!(sink.errors.is_empty(), "{:?}", sink.errors);
    assert_eq!(lines, vec!["0", "1", "2"]);
}

#[test]
fn object_literal_with_mixin_copies_then_overrides() {
    let src = "base: { hp: 10, atk: 1 }\nhero: { base, atk: 5, name: \"A\" }\nprint(hero.hp)\nprint(hero.atk)\nprint(hero.name)\n";
    let (lines, sink) = run_and_capture(src);
    assert!(sink.errors.is_empty(), "{:?}", sink.errors);
    assert_eq!(lines, vec!["10", "5", "A"]);
}

/// spec.md scenario 5: the `onHit` binding must run inside a method call so
/// its `EventListener.owner` picks up the receiver (`CallFrame.this`) — a
/// binding statement executed at top level never gets an owner (DESIGN.md).
#[test]
fn event_binding_fires_for_matching_owner() {
    let src = "bindOnHit: function()\n    onHit: function(dmg) <- [\"Damage\" | type(\"enemy\") | priority(high)]\n        print(dmg)\nenemy: { type: \"enemy\" }\nenemy.bind = bindOnHit\nenemy.bind()\nfire[\"Damage\"](damage: 7)\n";
    let (lines, sink) = run_and_capture(src);
    assert!(sink.errors.is_empty(), "{:?}", sink.errors);
    assert_eq!(lines, vec!["7"]);
}

/// Same binding, but the owner's `type` doesn't match the listener's filter:
/// no handler body runs, so nothing is printed.
#[test]
fn event_binding_does_not_fire_for_mismatched_owner() {
    let src = "bindOnHit: function()\n    onHit: function(dmg) <- [\"Damage\" | type(\"enemy\") | priority(high)]\n        print(dmg)\nally: { type: \"friendly\" }\nally.bind = bindOnHit\nally.bind()\nfire[\"Damage\"](damage: 7)\n";
    let (lines, sink) = run_and_capture(src);
    assert!(sink.errors.is_empty(), "{:?}", sink.errors);
    assert!(lines.is_empty(), "expected no handler to run, got {lines:?}");
}

#[test]
fn let_reassignment_is_a_compile_error_not_a_runtime_one() {
    let mut sink = CollectingSink::default();
    let code = ember::compile("let k: 1\nk: 2\n", &StaticRegistry::new(), &mut sink);
    assert!(code.is_none());
    assert!(!sink.errors.is_empty());
}

#[test]
fn undeclared_import_is_a_compile_error() {
    let mut sink = CollectingSink::default();
    let code = ember::compile("import \"not_installed\"\n", &StaticRegistry::new(), &mut sink);
    assert!(code.is_none());
    assert!(!sink.errors.is_empty());
}

/// Dispatch order is priority-first, registration order breaking ties
/// within a priority tier (spec.md §4.5), never broadcast-args order.
#[test]
fn event_dispatch_order_is_priority_then_registration() {
    let src = "\
onLow: function() <- [\"Ping\" | priority(low)]
    print(\"low\")
onHighFirst: function() <- [\"Ping\" | priority(high)]
    print(\"high-first\")
onHighSecond: function() <- [\"Ping\" | priority(high)]
    print(\"high-second\")
fire[\"Ping\"]()
";
    let (lines, sink) = run_and_capture(src);
    assert!(sink.errors.is_empty(), "{:?}", sink.errors);
    assert_eq!(lines, vec!["high-first", "high-second", "low"]);
}

/// A `let` can't be reassigned, but a `var` can be, freely and repeatedly.
#[test]
fn var_can_be_reassigned_freely() {
    let src = "var x: 1\nx: 2\nx: x + 1\nprint(x)\n";
    let (lines, sink) = run_and_capture(src);
    assert!(sink.errors.is_empty(), "{:?}", sink.errors);
    assert_eq!(lines, vec!["3"]);
}

/// Cross-tag equality never coerces (spec.md §9 open question, resolved in
/// DESIGN.md): `0 == "0"` is `false`, not `true`.
#[test]
fn cross_tag_equality_never_coerces() {
    let src = "result: 0 == \"0\"\nif result\n    print(\"coerced\")\nelse\n    print(\"not-coerced\")\n";
    let (lines, sink) = run_and_capture(src);
    assert!(sink.errors.is_empty(), "{:?}", sink.errors);
    assert_eq!(lines, vec!["not-coerced"]);
}

/// Structurally identical arrays/objects built separately still compare
/// equal: `Eq` is deep value equality, not `HeapId` identity.
#[test]
fn array_and_object_equality_is_by_contents_not_identity() {
    let src = "print([1, 2] == [1, 2])\nprint({ a: 1, b: 2 } == { b: 2, a: 1 })\nprint([1, 2] == [1, 3])\n";
    let (lines, sink) = run_and_capture(src);
    assert!(sink.errors.is_empty(), "{:?}", sink.errors);
    assert_eq!(lines, vec!["true", "true", "false"]);
}

/// Division and modulo are always floating-point; there is no separate
/// integer-division opcode (spec.md §9 open question).
#[test]
fn division_is_always_floating_point() {
    let (lines, sink) = run_and_capture("x: 7 / 2\nprint(x)\n");
    assert!(sink.errors.is_empty(), "{:?}", sink.errors);
    assert_eq!(lines, vec!["3.5"]);
}

/// A runtime error raised from inside an event handler is reported through
/// the sink and does not abort the broadcast loop or the caller (spec.md
/// §4.5/§7): the later, unrelated listener still runs.
#[test]
fn handler_error_is_reported_without_aborting_dispatch() {
    let src = "\
onBad: function() <- [\"Boom\" | priority(high)]
    1 / 0
    print(\"unreachable\")
onGood: function() <- [\"Boom\" | priority(low)]
    print(\"still-ran\")
fire[\"Boom\"]()
";
    let (lines, sink) = run_and_capture(src);
    assert!(!sink.errors.is_empty(), "expected the division-by-zero to be reported");
    assert_eq!(lines, vec!["still-ran"]);
}

/// Unknown-function-call detection happens at compile time, not at the
/// first attempted call.
#[test]
fn unknown_function_reported_before_any_code_runs() {
    let mut sink = CollectingSink::default();
    let code = ember::compile("totallyUnknownThing()\n", &StaticRegistry::new(), &mut sink);
    assert!(code.is_none());
    assert!(sink.errors.iter().any(|e| e.message.contains("unknown function")));
}
