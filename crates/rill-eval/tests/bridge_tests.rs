//! Integration tests for the host-object bridge.
//!
//! Covers: capability-policy gating on smart-linked objects, the `rill_`
//! override convention, the privileged bypass, raw (bridge) exposure,
//! shared host arrays, host functions and constructors, and guest
//! callbacks handed back to the host.

use rill_eval::{
    CapabilityPolicy, Engine, EngineError, EngineOptions, Fault, ForeignObjectMode, HostFn,
    Native, NativeFunction, NativeObject, NativeObjectRef,
};
use std::cell::RefCell;
use std::rc::Rc;

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

/// A host object with one method, one read-only property, one read-write
/// property, and one member kept off every allow-list.
fn user_object() -> NativeObjectRef {
    let mut user = NativeObject::new("User");
    user.set_field("name", Native::from("ada"));
    user.set_field("secret", Native::from("hunter2"));
    user.set_method("greet", |this, _args| {
        let name = match &this {
            Native::Object(obj) => match obj.borrow().field("name") {
                Some(Native::String(s)) => s.clone(),
                _ => String::new(),
            },
            _ => String::new(),
        };
        Ok(Native::String(format!("hi {name}")))
    });
    user.policy = CapabilityPolicy::default()
        .with_methods(["greet"])
        .with_properties(["name"])
        .with_user_properties(["nue"]);
    user.wrap()
}

fn engine_with(name: &str, value: Native) -> Engine {
    let engine = Engine::new();
    engine.add_global(name, value);
    engine
}

fn eval_str(engine: &mut Engine, source: &str) -> String {
    match engine.eval(source) {
        Ok(Native::String(s)) => s,
        Ok(other) => panic!("expected a string, got {other:?}"),
        Err(e) => panic!("eval failed: {e}"),
    }
}

fn eval_num(engine: &mut Engine, source: &str) -> f64 {
    match engine.eval(source) {
        Ok(Native::Number(n)) => n,
        Ok(other) => panic!("expected a number, got {other:?}"),
        Err(e) => panic!("eval failed: {e}"),
    }
}

// ─────────────────────────────────────────────────────────────────────
// Policy gating
// ─────────────────────────────────────────────────────────────────────

#[test]
fn allow_listed_properties_are_readable() {
    let mut engine = engine_with("user", Native::Object(user_object()));
    assert_eq!(eval_str(&mut engine, "return user.name;"), "ada");
}

#[test]
fn unlisted_members_are_denied() {
    let mut engine = engine_with("user", Native::Object(user_object()));
    let err = engine.eval("return user.secret;").unwrap_err();
    match err {
        EngineError::AccessDenied { message, .. } => {
            assert_eq!(message, "cannot read protected property: secret");
        }
        other => panic!("expected access denied, got {other}"),
    }
}

#[test]
fn denied_reads_are_catchable_in_guest_code() {
    let mut engine = engine_with("user", Native::Object(user_object()));
    assert_eq!(
        eval_str(
            &mut engine,
            "try { return user.secret; } catch (e) { return e.name; }"
        ),
        "AccessDeniedError"
    );
    assert_eq!(
        eval_str(
            &mut engine,
            "try { return user.secret; } catch (e) { return e.message; }"
        ),
        "cannot read protected property: secret"
    );
}

#[test]
fn read_only_properties_reject_writes() {
    let mut engine = engine_with("user", Native::Object(user_object()));
    let err = engine.eval("user.name = 'eve';").unwrap_err();
    match err {
        EngineError::AccessDenied { message, .. } => {
            assert_eq!(message, "cannot write to protected property: name");
        }
        other => panic!("expected access denied, got {other}"),
    }
}

#[test]
fn methods_reject_writes() {
    let mut engine = engine_with("user", Native::Object(user_object()));
    assert!(matches!(
        engine.eval("user.greet = 1;").unwrap_err(),
        EngineError::AccessDenied { .. }
    ));
}

#[test]
fn user_properties_pass_writes_through_to_the_host() {
    let user = user_object();
    let mut engine = engine_with("user", Native::Object(user.clone()));
    assert_eq!(
        eval_num(&mut engine, "user.nue = 5; user.nue += 2; return user.nue;"),
        7.0
    );
    assert!(matches!(
        user.borrow().field("nue"),
        Some(Native::Number(n)) if *n == 7.0
    ));
}

#[test]
fn unset_user_properties_read_as_undefined() {
    let mut engine = engine_with("user", Native::Object(user_object()));
    assert_eq!(eval_str(&mut engine, "return typeof user.nue;"), "undefined");
}

#[test]
fn allow_listed_methods_are_callable() {
    let mut engine = engine_with("user", Native::Object(user_object()));
    assert_eq!(eval_str(&mut engine, "return user.greet();"), "hi ada");
}

#[test]
fn extracted_methods_stay_bound_to_their_host_object() {
    let mut engine = engine_with("user", Native::Object(user_object()));
    assert_eq!(
        eval_str(&mut engine, "var g = user.greet; return g();"),
        "hi ada"
    );
}

#[test]
fn allow_listed_method_missing_on_the_host_reads_as_undefined() {
    let mut obj = NativeObject::new("Ghost");
    obj.policy = CapabilityPolicy::default().with_methods(["vanish"]);
    let mut engine = engine_with("ghost", Native::Object(obj.wrap()));
    assert_eq!(
        eval_str(&mut engine, "return typeof ghost.vanish;"),
        "undefined"
    );
}

#[test]
fn smart_linked_objects_report_typeof_object() {
    let mut engine = engine_with("user", Native::Object(user_object()));
    assert_eq!(eval_str(&mut engine, "return typeof user;"), "object");
}

// ─────────────────────────────────────────────────────────────────────
// Override members
// ─────────────────────────────────────────────────────────────────────

#[test]
fn override_fields_answer_for_the_unprefixed_name() {
    let mut obj = NativeObject::new("Box");
    obj.set_field("rill_label", Native::from("visible"));
    let mut engine = engine_with("box", Native::Object(obj.wrap()));
    assert_eq!(eval_str(&mut engine, "return box.label;"), "visible");
}

#[test]
fn overrides_win_over_the_allow_lists() {
    let mut obj = NativeObject::new("Box");
    obj.set_field("name", Native::from("real"));
    obj.set_field("rill_name", Native::from("masked"));
    obj.policy = CapabilityPolicy::default().with_properties(["name"]);
    let mut engine = engine_with("box", Native::Object(obj.wrap()));
    assert_eq!(eval_str(&mut engine, "return box.name;"), "masked");
}

#[test]
fn override_methods_receive_the_original_host_object() {
    let mut obj = NativeObject::new("Box");
    obj.set_field("tag", Native::from("host"));
    obj.set_method("rill_describe", |this, _args| {
        let tag = match &this {
            Native::Object(o) => match o.borrow().field("tag") {
                Some(Native::String(s)) => s.clone(),
                _ => String::new(),
            },
            _ => String::new(),
        };
        Ok(Native::String(format!("Box:{tag}")))
    });
    let mut engine = engine_with("box", Native::Object(obj.wrap()));
    assert_eq!(eval_str(&mut engine, "return box.describe();"), "Box:host");
}

#[test]
fn override_accessors_permit_gated_writes() {
    let mut obj = NativeObject::new("Box");
    obj.set_field("level_raw", Native::Number(0.0));
    obj.set_accessor(
        "rill_level",
        Some(Rc::new(|this: Native, _args: &[Native]| match &this {
            Native::Object(o) => Ok(o
                .borrow()
                .field("level_raw")
                .cloned()
                .unwrap_or(Native::Undefined)),
            _ => Ok(Native::Undefined),
        }) as HostFn),
        Some(Rc::new(|this: Native, args: &[Native]| {
            if let Native::Object(o) = &this {
                let value = args.first().cloned().unwrap_or(Native::Undefined);
                o.borrow_mut().set_field("level_raw", value);
            }
            Ok(Native::Undefined)
        }) as HostFn),
    );
    let mut engine = engine_with("box", Native::Object(obj.wrap()));
    assert_eq!(
        eval_num(&mut engine, "box.level = 9; return box.level;"),
        9.0
    );
}

// ─────────────────────────────────────────────────────────────────────
// Privileged bypass and raw mode
// ─────────────────────────────────────────────────────────────────────

#[test]
fn privileged_context_bypasses_the_policy() {
    let user = user_object();
    let mut engine = engine_with("user", Native::Object(user.clone()));
    engine.make_privileged();
    assert_eq!(eval_str(&mut engine, "return user.secret;"), "hunter2");
    eval_str(&mut engine, "user.secret = 'changed'; return user.secret;");
    assert!(matches!(
        user.borrow().field("secret"),
        Some(Native::String(s)) if s == "changed"
    ));
}

#[test]
fn raw_mode_exposes_every_member() {
    let user = user_object();
    let engine_opts = EngineOptions {
        foreign_object_mode: ForeignObjectMode::Raw,
        ..Default::default()
    };
    let mut engine = Engine::with_options(engine_opts);
    engine.add_global("user", Native::Object(user.clone()));
    assert_eq!(eval_str(&mut engine, "return user.secret;"), "hunter2");
    eval_num(&mut engine, "user.extra = 1; return 0;");
    assert!(user.borrow().field("extra").is_some());
}

// ─────────────────────────────────────────────────────────────────────
// Identity across wrappers
// ─────────────────────────────────────────────────────────────────────

#[test]
fn the_same_host_object_is_strictly_equal_through_two_globals() {
    let user = user_object();
    let engine = Engine::new();
    engine.add_global("a", Native::Object(user.clone()));
    engine.add_global("b", Native::Object(user));
    engine.add_global("c", Native::Object(user_object()));
    let mut engine = engine;
    assert!(matches!(
        engine.eval("return a === b;").unwrap(),
        Native::Bool(true)
    ));
    assert!(matches!(
        engine.eval("return a === c;").unwrap(),
        Native::Bool(false)
    ));
}

// ─────────────────────────────────────────────────────────────────────
// Host arrays
// ─────────────────────────────────────────────────────────────────────

#[test]
fn host_arrays_share_mutations_with_the_guest() {
    let items = Rc::new(RefCell::new(vec![Native::Number(1.0), Native::Number(2.0)]));
    let mut engine = engine_with("xs", Native::Array(items.clone()));
    assert_eq!(eval_num(&mut engine, "return xs.length;"), 2.0);
    assert_eq!(eval_num(&mut engine, "xs[3] = 7; return xs.length;"), 4.0);
    assert!(matches!(items.borrow()[3], Native::Number(n) if n == 7.0));
    items.borrow_mut().push(Native::from("tail"));
    assert_eq!(eval_str(&mut engine, "return xs[4];"), "tail");
}

#[test]
fn host_arrays_refuse_growth_past_the_limit() {
    let items = Rc::new(RefCell::new(vec![Native::Number(1.0), Native::Number(2.0)]));
    let mut engine = engine_with("xs", Native::Array(items.clone()));
    assert_eq!(
        eval_str(
            &mut engine,
            "try { xs[999999] = 1; } catch (e) { return e.message; }"
        ),
        "cannot grow host array to 1000000 elements (limit is 100000)"
    );
    assert_eq!(
        eval_str(
            &mut engine,
            "try { xs.length = 5000000; } catch (e) { return e.name; }"
        ),
        "Error"
    );
    // The host vector never materialized the requested elements.
    assert_eq!(items.borrow().len(), 2);
    // Shrinking and growth within the limit still work.
    assert_eq!(eval_num(&mut engine, "xs[10] = 1; return xs.length;"), 11.0);
    assert_eq!(eval_num(&mut engine, "xs.length = 2; return xs.length;"), 2.0);
}

#[test]
fn the_growth_limit_is_configurable() {
    let items = Rc::new(RefCell::new(Vec::new()));
    let mut engine = Engine::with_options(EngineOptions {
        host_array_growth_limit: 4,
        ..Default::default()
    });
    engine.add_global("xs", Native::Array(items.clone()));
    assert_eq!(eval_num(&mut engine, "xs[3] = 1; return xs.length;"), 4.0);
    assert_eq!(
        eval_str(&mut engine, "try { xs[4] = 1; } catch (e) { return e.name; }"),
        "Error"
    );
    assert_eq!(items.borrow().len(), 4);
}

#[test]
fn host_arrays_take_canonical_indices_only() {
    let items = Rc::new(RefCell::new(vec![
        Native::Number(0.0),
        Native::Number(1.0),
        Native::Number(2.0),
    ]));
    let mut engine = engine_with("xs", Native::Array(items.clone()));
    assert_eq!(eval_num(&mut engine, "return xs[2];"), 2.0);
    assert_eq!(eval_str(&mut engine, "return typeof xs['02'];"), "undefined");
    // A non-canonical write neither lands on the element nor grows the
    // vector, matching guest arrays.
    eval_num(&mut engine, "xs['02'] = 99; return xs[2];");
    assert!(matches!(items.borrow()[2], Native::Number(n) if n == 2.0));
    assert_eq!(items.borrow().len(), 3);
}

// ─────────────────────────────────────────────────────────────────────
// Host functions and constructors
// ─────────────────────────────────────────────────────────────────────

#[test]
fn host_functions_are_callable_with_converted_arguments() {
    let double = NativeFunction::new("double", |_this, args| {
        match args.first() {
            Some(Native::Number(n)) => Ok(Native::Number(n * 2.0)),
            _ => Err(Fault::type_error("double expects a number")),
        }
    });
    let mut engine = engine_with("double", Native::Function(double));
    assert_eq!(eval_num(&mut engine, "return double(21);"), 42.0);
}

#[test]
fn host_function_faults_are_catchable() {
    let boom = NativeFunction::new("boom", |_this, _args| Err(Fault::error("host exploded")));
    let mut engine = engine_with("boom", Native::Function(boom));
    assert_eq!(
        eval_str(&mut engine, "try { boom(); } catch (e) { return e.message; }"),
        "host exploded"
    );
    assert_eq!(
        eval_str(&mut engine, "try { boom(); } catch (e) { return e.name; }"),
        "Error"
    );
}

#[test]
fn host_constructors_build_policy_wrapped_instances() {
    let ctor = NativeFunction::new("Vec", |_this, _args| Ok(Native::Undefined)).with_construct(
        |_this, args| {
            let mut v = NativeObject::new("Vec");
            v.set_field("x", args.first().cloned().unwrap_or(Native::Undefined));
            v.policy = CapabilityPolicy::default().with_properties(["x"]);
            Ok(Native::Object(v.wrap()))
        },
    );
    let mut engine = engine_with("Vec", Native::Function(ctor));
    assert_eq!(eval_num(&mut engine, "var v = new Vec(7); return v.x;"), 7.0);
}

#[test]
fn guest_functions_hand_back_as_host_callbacks() {
    let twice = NativeFunction::new("twice", |_this, args| match args.first() {
        Some(Native::Function(f)) => {
            let once = (f.call)(Native::Undefined, &[Native::Number(5.0)])?;
            (f.call)(Native::Undefined, &[once])
        }
        _ => Err(Fault::type_error("twice expects a function")),
    });
    let mut engine = engine_with("twice", Native::Function(twice));
    assert_eq!(
        eval_num(&mut engine, "return twice(function(x) { return x + 1; });"),
        7.0
    );
}

// ─────────────────────────────────────────────────────────────────────
// Debug rendering
// ─────────────────────────────────────────────────────────────────────

#[test]
fn rill_str_names_the_class_and_policy_surface() {
    let mut engine = engine_with("user", Native::Object(user_object()));
    assert_eq!(
        eval_str(&mut engine, "return Rill.str(user);"),
        "[SmartLink: User, props: greet, name, nue]"
    );
}
