//! Integration tests for the Rill engine.
//!
//! Covers: program results, operators and coercions, control flow,
//! functions and closures, objects and prototypes, arrays, exceptions,
//! the step bound, single-stepping, and host-initiated calls.

use rill_eval::{Engine, EngineError, EngineOptions, Native, RunState};

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

fn eval(source: &str) -> Native {
    let mut engine = Engine::new();
    engine
        .eval(source)
        .unwrap_or_else(|e| panic!("eval failed: {e}"))
}

fn eval_num(source: &str) -> f64 {
    match eval(source) {
        Native::Number(n) => n,
        other => panic!("expected a number, got {other:?}"),
    }
}

fn eval_str(source: &str) -> String {
    match eval(source) {
        Native::String(s) => s,
        other => panic!("expected a string, got {other:?}"),
    }
}

fn eval_bool(source: &str) -> bool {
    match eval(source) {
        Native::Bool(b) => b,
        other => panic!("expected a boolean, got {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────
// Program results
// ─────────────────────────────────────────────────────────────────────

#[test]
fn top_level_return_is_the_result() {
    assert_eq!(eval_num("return 2 + 2;"), 4.0);
}

#[test]
fn last_expression_statement_is_the_result() {
    assert_eq!(eval_num("var x = 3; x * 2;"), 6.0);
}

#[test]
fn empty_program_yields_undefined() {
    assert!(matches!(eval(""), Native::Undefined));
}

// ─────────────────────────────────────────────────────────────────────
// Operators and coercions
// ─────────────────────────────────────────────────────────────────────

#[test]
fn addition_concatenates_when_either_side_is_a_string() {
    assert_eq!(eval_str("return '1' + 2;"), "12");
    assert_eq!(eval_num("return '6' * '7';"), 42.0);
}

#[test]
fn loose_and_strict_equality_differ() {
    assert!(eval_bool("return 1 == '1';"));
    assert!(!eval_bool("return 1 === '1';"));
    assert!(eval_bool("return null == undefined;"));
    assert!(!eval_bool("return null === undefined;"));
}

#[test]
fn nan_is_not_equal_to_itself() {
    assert!(!eval_bool("var n = 0 / 0; return n === n;"));
}

#[test]
fn shifts_and_bitwise_operators() {
    assert_eq!(eval_num("return (5 << 2) >> 1;"), 10.0);
    assert_eq!(eval_num("return -1 >>> 28;"), 15.0);
    assert_eq!(eval_num("return (6 & 3) | (4 ^ 1);"), 7.0);
    assert_eq!(eval_num("return ~5;"), -6.0);
}

#[test]
fn logical_operators_short_circuit_and_keep_values() {
    assert!(!eval_bool(
        "var called = false;
         function f() { called = true; return 2; }
         var x = true || f();
         return called;"
    ));
    assert_eq!(eval_str("return 'left' && 'right';"), "right");
    assert_eq!(eval_str("return '' || 'fallback';"), "fallback");
}

#[test]
fn conditional_expression() {
    assert_eq!(eval_str("return 5 > 3 ? 'yes' : 'no';"), "yes");
}

#[test]
fn compound_assignment_and_updates() {
    assert_eq!(eval_num("var i = 5; i += 2; i++; return ++i;"), 9.0);
    assert_eq!(eval_num("var i = 5; return i++;"), 5.0);
    assert_eq!(eval_num("var o = { n: 1 }; o.n += 4; return o.n;"), 5.0);
    assert_eq!(eval_num("var a = [10]; a[0]--; return a[0];"), 9.0);
}

#[test]
fn typeof_reports_tags_and_tolerates_unresolved_names() {
    assert_eq!(eval_str("return typeof 1;"), "number");
    assert_eq!(eval_str("return typeof 'x';"), "string");
    assert_eq!(eval_str("return typeof {};"), "object");
    assert_eq!(eval_str("return typeof function() {};"), "function");
    assert_eq!(eval_str("return typeof neverDeclared;"), "undefined");
}

// ─────────────────────────────────────────────────────────────────────
// Control flow
// ─────────────────────────────────────────────────────────────────────

#[test]
fn while_loop_accumulates() {
    assert_eq!(
        eval_num(
            "var total = 0; var i = 0;
             while (i < 5) { total += i; i++; }
             return total;"
        ),
        10.0
    );
}

#[test]
fn for_loop_with_break_and_continue() {
    assert_eq!(
        eval_num(
            "var total = 0;
             for (var i = 0; i < 100; i++) {
               if (i % 2 === 0) { continue; }
               if (i > 8) { break; }
               total += i;
             }
             return total;"
        ),
        16.0 // 1 + 3 + 5 + 7
    );
}

#[test]
fn break_targets_the_innermost_loop() {
    assert_eq!(
        eval_num(
            "var count = 0;
             for (var i = 0; i < 3; i++) {
               for (var j = 0; j < 10; j++) {
                 if (j === 2) { break; }
                 count++;
               }
             }
             return count;"
        ),
        6.0
    );
}

#[test]
fn if_else_branches() {
    assert_eq!(
        eval_str("if (false) { return 'a'; } else if (true) { return 'b'; } return 'c';"),
        "b"
    );
}

// ─────────────────────────────────────────────────────────────────────
// Functions and closures
// ─────────────────────────────────────────────────────────────────────

#[test]
fn declarations_are_hoisted() {
    assert_eq!(eval_num("return f(); function f() { return 7; }"), 7.0);
}

#[test]
fn closures_capture_their_defining_scope() {
    assert_eq!(
        eval_num(
            "function counter() {
               var n = 0;
               return function() { n = n + 1; return n; };
             }
             var c = counter();
             c(); c();
             return c();"
        ),
        3.0
    );
}

#[test]
fn closures_are_independent_per_activation() {
    assert_eq!(
        eval_num(
            "function counter() {
               var n = 0;
               return function() { n++; return n; };
             }
             var a = counter();
             var b = counter();
             a(); a(); a();
             return b();"
        ),
        1.0
    );
}

#[test]
fn recursion() {
    assert_eq!(
        eval_num(
            "function fib(n) {
               if (n < 2) { return n; }
               return fib(n - 1) + fib(n - 2);
             }
             return fib(10);"
        ),
        55.0
    );
}

#[test]
fn missing_arguments_are_undefined() {
    assert_eq!(eval_str("function f(a, b) { return typeof b; } return f(1);"), "undefined");
}

#[test]
fn function_without_return_yields_undefined() {
    assert!(matches!(
        eval("function f() { var x = 1; } return f();"),
        Native::Undefined
    ));
}

#[test]
fn calling_a_non_function_is_a_type_error() {
    assert_eq!(
        eval_str("try { var x = 4; x(); } catch (e) { return e.name; }"),
        "TypeError"
    );
}

#[test]
fn call_and_apply_rebind_this() {
    assert_eq!(
        eval_num(
            "function f(a, b) { return this.x + a + b; }
             return f.call({ x: 1 }, 2, 3);"
        ),
        6.0
    );
    assert_eq!(
        eval_num(
            "function f(a, b) { return this.x + a + b; }
             return f.apply({ x: 10 }, [2, 3]);"
        ),
        15.0
    );
}

// ─────────────────────────────────────────────────────────────────────
// Objects and prototypes
// ─────────────────────────────────────────────────────────────────────

#[test]
fn object_literals_and_member_access() {
    assert_eq!(
        eval_num("var o = { a: 1, b: { c: 41 } }; return o.a + o.b.c;"),
        42.0
    );
    assert_eq!(eval_num("var o = {}; o.x = 5; return o['x'];"), 5.0);
}

#[test]
fn methods_see_their_receiver() {
    assert_eq!(
        eval_num(
            "var o = { n: 2, double: function() { return this.n * 2; } };
             return o.double();"
        ),
        4.0
    );
}

#[test]
fn reading_a_missing_property_yields_undefined() {
    assert_eq!(eval_str("var o = {}; return typeof o.missing;"), "undefined");
}

#[test]
fn reading_from_undefined_is_a_type_error() {
    assert_eq!(
        eval_str("try { var o; o.x; } catch (e) { return e.name; }"),
        "TypeError"
    );
}

#[test]
fn constructors_and_prototype_methods() {
    assert_eq!(
        eval_num(
            "function Point(x, y) { this.x = x; this.y = y; }
             Point.prototype.norm2 = function() {
               return this.x * this.x + this.y * this.y;
             };
             var p = new Point(3, 4);
             return p.norm2();"
        ),
        25.0
    );
}

#[test]
fn constructor_returning_an_object_overrides_this() {
    assert_eq!(
        eval_num(
            "function F() { this.x = 1; return { x: 99 }; }
             return new F().x;"
        ),
        99.0
    );
}

#[test]
fn has_own_property_ignores_the_prototype() {
    assert!(eval_bool("var o = { a: 1 }; return o.hasOwnProperty('a');"));
    assert!(!eval_bool("var o = { a: 1 }; return o.hasOwnProperty('toString');"));
}

// ─────────────────────────────────────────────────────────────────────
// Arrays
// ─────────────────────────────────────────────────────────────────────

#[test]
fn writing_past_the_end_grows_length() {
    assert_eq!(eval_num("var a = [1, 2]; a[5] = 9; return a.length;"), 6.0);
}

#[test]
fn shrinking_length_drops_elements() {
    assert_eq!(
        eval_str("var a = [1, 2, 3, 4]; a.length = 2; return a.join('-');"),
        "1-2"
    );
}

#[test]
fn push_join_index_of() {
    assert_eq!(
        eval_num("var a = []; a.push(1); a.push(2, 3); return a.length;"),
        3.0
    );
    assert_eq!(eval_str("return [1, 2, 3].join();"), "1,2,3");
    assert_eq!(eval_num("return ['a', 'b', 'c'].indexOf('b');"), 1.0);
    assert_eq!(eval_num("return [1, 2].indexOf('2');"), -1.0);
}

#[test]
fn holes_read_as_undefined() {
    assert_eq!(
        eval_str("var a = []; a[3] = 1; return typeof a[1];"),
        "undefined"
    );
}

// ─────────────────────────────────────────────────────────────────────
// Strings
// ─────────────────────────────────────────────────────────────────────

#[test]
fn string_length_and_indexing() {
    assert_eq!(eval_num("return 'hello'.length;"), 5.0);
    assert_eq!(eval_str("return 'hello'[1];"), "e");
    assert_eq!(eval_str("return typeof 'hello'[99];"), "undefined");
}

#[test]
fn non_ascii_literals_keep_their_text() {
    assert_eq!(eval_str("return 'héllo';"), "héllo");
    assert_eq!(eval_str("return '日本' + '語';"), "日本語");
    assert_eq!(eval_num("return 'héllo'.length;"), 5.0);
}

#[test]
fn operator_coercion_uses_the_builtin_rendering() {
    // A guest-defined toString is not consulted by `+`; only explicit
    // calls reach it.
    assert_eq!(
        eval_str(
            "var o = { toString: function() { return 'x'; } };
             return o + '';"
        ),
        "[object Object]"
    );
    assert_eq!(
        eval_str(
            "var o = { toString: function() { return 'x'; } };
             return o.toString();"
        ),
        "x"
    );
}

#[test]
fn number_to_string() {
    assert_eq!(eval_str("return (42).toString();"), "42");
    assert_eq!(eval_str("return '' + 1.5;"), "1.5");
}

// ─────────────────────────────────────────────────────────────────────
// Exceptions
// ─────────────────────────────────────────────────────────────────────

#[test]
fn thrown_values_reach_the_catch_unchanged() {
    assert_eq!(eval_str("try { throw 'boom'; } catch (e) { return e; }"), "boom");
}

#[test]
fn runtime_faults_become_catchable_error_objects() {
    assert_eq!(
        eval_str("try { missing(); } catch (e) { return e.name; }"),
        "ReferenceError"
    );
    assert_eq!(
        eval_str("try { missing(); } catch (e) { return e.message; }"),
        "missing is not defined"
    );
}

#[test]
fn throw_inside_a_function_unwinds_to_the_caller() {
    assert_eq!(
        eval_str(
            "function f() { throw 'deep'; }
             function g() { f(); return 'unreached'; }
             try { g(); } catch (e) { return e; }"
        ),
        "deep"
    );
}

#[test]
fn catch_parameter_shadows_without_leaking() {
    assert_eq!(
        eval_num(
            "var e = 1;
             try { throw 10; } catch (e) { e = e + 1; }
             return e;"
        ),
        1.0
    );
}

#[test]
fn uncaught_throws_surface_as_guest_errors() {
    let mut engine = Engine::new();
    let err = engine.eval("throw 'kaboom';").unwrap_err();
    match err {
        EngineError::Guest(gf) => assert_eq!(gf.message, "kaboom"),
        other => panic!("expected a guest error, got {other}"),
    }
}

#[test]
fn uncaught_errors_carry_the_call_stack() {
    let mut engine = Engine::new();
    let err = engine
        .eval(
            "function inner() { throw 'x'; }
             function outer() { inner(); }
             outer();",
        )
        .unwrap_err();
    match err {
        EngineError::Guest(gf) => {
            let stack = gf.stack.expect("stacks enabled by default");
            assert_eq!(stack, vec!["inner", "outer", "<program>"]);
        }
        other => panic!("expected a guest error, got {other}"),
    }
}

// ─────────────────────────────────────────────────────────────────────
// Execution bound
// ─────────────────────────────────────────────────────────────────────

#[test]
fn infinite_loops_hit_the_step_bound() {
    let mut engine = Engine::with_options(EngineOptions {
        step_limit: 500,
        ..Default::default()
    });
    let err = engine.eval("while (true) {}").unwrap_err();
    assert!(matches!(err, EngineError::BoundExceeded { steps: 500 }));
}

#[test]
fn the_engine_stays_usable_after_an_abort() {
    let mut engine = Engine::with_options(EngineOptions {
        step_limit: 500,
        ..Default::default()
    });
    engine.eval("while (true) {}").unwrap_err();
    assert_eq!(
        match engine.eval("return 1;").unwrap() {
            Native::Number(n) => n,
            other => panic!("expected a number, got {other:?}"),
        },
        1.0
    );
}

#[test]
fn default_bound_allows_substantial_programs() {
    assert_eq!(
        eval_num(
            "var total = 0;
             for (var i = 0; i < 1000; i++) { total += i; }
             return total;"
        ),
        499_500.0
    );
}

// ─────────────────────────────────────────────────────────────────────
// Single-stepping
// ─────────────────────────────────────────────────────────────────────

#[test]
fn stepping_without_a_loaded_program_is_an_error() {
    let mut engine = Engine::new();
    assert!(matches!(engine.step(), Err(EngineError::Internal(_))));
}

#[test]
fn stepping_runs_a_program_incrementally() {
    let mut engine = Engine::new();
    engine.load("var x = 1; return x + 1;").unwrap();
    assert_eq!(engine.state(), Some(RunState::Ready));

    let mut steps = 0;
    loop {
        steps += 1;
        if engine.step().unwrap() {
            break;
        }
        assert_eq!(engine.state(), Some(RunState::Suspended));
    }
    assert!(steps > 1, "expected more than one step, took {steps}");
    assert_eq!(engine.state(), Some(RunState::Completed));
    assert!(matches!(engine.result(), Some(Native::Number(n)) if n == 2.0));
}

#[test]
fn stepping_a_finished_computation_is_an_error() {
    let mut engine = Engine::new();
    engine.load("return 1;").unwrap();
    while !engine.step().unwrap() {}
    assert!(matches!(engine.step(), Err(EngineError::Internal(_))));
}

#[test]
fn loading_replaces_the_previous_computation() {
    let mut engine = Engine::new();
    engine.load("return 1;").unwrap();
    engine.step().unwrap();
    engine.load("return 2;").unwrap();
    while !engine.step().unwrap() {}
    assert!(matches!(engine.result(), Some(Native::Number(n)) if n == 2.0));
}

// ─────────────────────────────────────────────────────────────────────
// Host-initiated calls
// ─────────────────────────────────────────────────────────────────────

#[test]
fn fetch_function_calls_a_guest_global() {
    let mut engine = Engine::new();
    engine
        .eval("function add(a, b) { return a + b; }")
        .unwrap();
    let add = engine.fetch_function("add").unwrap();
    assert!(matches!(
        add.call(&[Native::Number(2.0), Native::Number(40.0)]).unwrap(),
        Native::Number(n) if n == 42.0
    ));
    // Repeated calls reuse the same closure.
    assert!(matches!(
        add.call(&[Native::Number(1.0), Native::Number(1.0)]).unwrap(),
        Native::Number(n) if n == 2.0
    ));
}

#[test]
fn fetch_function_rejects_missing_and_non_function_globals() {
    let mut engine = Engine::new();
    engine.eval("var notAFunction = 3;").unwrap();
    assert!(matches!(
        engine.fetch_function("nope"),
        Err(EngineError::Internal(_))
    ));
    assert!(matches!(
        engine.fetch_function("notAFunction"),
        Err(EngineError::Internal(_))
    ));
}

#[test]
fn guest_functions_keep_state_across_host_calls() {
    let mut engine = Engine::new();
    engine
        .eval("var n = 0; function bump() { n++; return n; }")
        .unwrap();
    let bump = engine.fetch_function("bump").unwrap();
    bump.call(&[]).unwrap();
    bump.call(&[]).unwrap();
    assert!(matches!(bump.call(&[]).unwrap(), Native::Number(n) if n == 3.0));
}

// ─────────────────────────────────────────────────────────────────────
// Debug helper
// ─────────────────────────────────────────────────────────────────────

#[test]
fn rill_str_renders_values() {
    assert_eq!(eval_str("return Rill.str([1, 2]);"), "[1,2]");
    assert_eq!(eval_str("return Rill.str(undefined);"), "undefined");
    assert_eq!(eval_str("return Rill.str('text');"), "text");
    assert_eq!(eval_str("return Rill.str({});"), "[object Object]");
}
