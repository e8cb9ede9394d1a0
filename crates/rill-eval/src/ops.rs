//! Value operations shared by the evaluator and the builtins: coercions,
//! operators, and member access across plain objects and host wrappers.

use crate::bridge;
use crate::environment::Environment;
use crate::error::Fault;
use crate::native::Native;
use crate::value::{BuiltinFn, BuiltinOutcome, ObjectKind, ObjectRef, Property, Value};
use rill_types::ast::{BinOp, UnaryOp};
use std::rc::Rc;

const STRINGIFY_DEPTH: usize = 8;

pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Undefined | Value::Null => false,
        Value::Boolean(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::String(s) => !s.is_empty(),
        Value::Object(_) => true,
        Value::Bridge(n) => n.truthy(),
        Value::SmartLink(_) => true,
    }
}

pub fn type_of(v: &Value) -> &'static str {
    match v {
        Value::Undefined => "undefined",
        Value::Null => "object",
        Value::Boolean(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Object(o) => match o.borrow().kind {
            ObjectKind::Function(_) | ObjectKind::Builtin(_) => "function",
            _ => "object",
        },
        Value::Bridge(n) => n.type_name(),
        Value::SmartLink(_) => "object",
    }
}

// ── Coercions ─────────────────────────────────────────────────────────────

/// Reduce a value to a primitive. Object-like values stringify with the
/// built-in rendering; a guest-defined `toString` is not consulted here,
/// since operator coercion cannot re-enter the evaluator.
pub fn to_primitive(v: &Value) -> Value {
    match unwrap_primitive(v) {
        prim @ (Value::Undefined
        | Value::Null
        | Value::Boolean(_)
        | Value::Number(_)
        | Value::String(_)) => prim,
        other => Value::String(to_string_value(&other)),
    }
}

/// Strip a transparent wrapper off a host primitive; everything else passes
/// through unchanged.
fn unwrap_primitive(v: &Value) -> Value {
    match v {
        Value::Bridge(Native::Undefined) => Value::Undefined,
        Value::Bridge(Native::Null) => Value::Null,
        Value::Bridge(Native::Bool(b)) => Value::Boolean(*b),
        Value::Bridge(Native::Number(n)) => Value::Number(*n),
        Value::Bridge(Native::String(s)) => Value::String(s.clone()),
        other => other.clone(),
    }
}

pub fn to_number(v: &Value) -> f64 {
    match unwrap_primitive(v) {
        Value::Undefined => f64::NAN,
        Value::Null => 0.0,
        Value::Boolean(b) => {
            if b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n,
        Value::String(s) => string_to_number(&s),
        other => match to_primitive(&other) {
            Value::String(s) => string_to_number(&s),
            prim => to_number(&prim),
        },
    }
}

fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => t.parse().unwrap_or(f64::NAN),
    }
}

pub fn to_uint32(v: &Value) -> u32 {
    let n = to_number(v);
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let m = n.trunc() % 4294967296.0;
    let m = if m < 0.0 { m + 4294967296.0 } else { m };
    m as u32
}

pub fn to_int32(v: &Value) -> i32 {
    to_uint32(v) as i32
}

/// Number-to-string matching the guest's display rules: integral values
/// print without a fraction.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e21 {
        return format!("{}", n as i64);
    }
    format!("{n}")
}

pub fn to_string_value(v: &Value) -> String {
    stringify(v, STRINGIFY_DEPTH)
}

fn stringify(v: &Value, depth: usize) -> String {
    match v {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Number(n) => number_to_string(*n),
        Value::String(s) => s.clone(),
        Value::Object(o) => {
            if depth == 0 {
                return "...".to_string();
            }
            let data = o.borrow();
            match &data.kind {
                ObjectKind::Array => {
                    let len = data.array_length();
                    let mut parts = Vec::with_capacity(len as usize);
                    for i in 0..len {
                        let part = match data.properties.get(&i.to_string()) {
                            Some(p) => match &p.value {
                                Value::Undefined | Value::Null => String::new(),
                                other => stringify(other, depth - 1),
                            },
                            None => String::new(),
                        };
                        parts.push(part);
                    }
                    parts.join(",")
                }
                ObjectKind::Function(f) => {
                    format!("function {}() {{ ... }}", f.name.as_deref().unwrap_or(""))
                }
                ObjectKind::Builtin(b) => format!("function {}() {{ [native code] }}", b.name),
                ObjectKind::Plain => "[object Object]".to_string(),
            }
        }
        Value::Bridge(n) => native_stringify(n, depth),
        Value::SmartLink(o) => format!("[object {}]", o.borrow().class_name),
    }
}

fn native_stringify(n: &Native, depth: usize) -> String {
    match n {
        Native::Undefined => "undefined".to_string(),
        Native::Null => "null".to_string(),
        Native::Bool(b) => b.to_string(),
        Native::Number(x) => number_to_string(*x),
        Native::String(s) => s.clone(),
        Native::Array(a) => {
            if depth == 0 {
                return "...".to_string();
            }
            let items = a.borrow();
            items
                .iter()
                .map(|item| match item {
                    Native::Undefined | Native::Null => String::new(),
                    other => native_stringify(other, depth - 1),
                })
                .collect::<Vec<_>>()
                .join(",")
        }
        Native::Function(f) => format!("function {}() {{ [native code] }}", f.name),
        Native::Object(o) => format!("[object {}]", o.borrow().class_name),
    }
}

/// Developer-facing rendering, used by the `Rill.str` debug helper. Host
/// wrappers announce themselves instead of posing as plain objects.
pub fn debug_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Object(o) if o.borrow().is_array() => {
            format!("[{}]", stringify(v, STRINGIFY_DEPTH))
        }
        Value::Bridge(n) => match n {
            Native::Array(_) | Native::Object(_) | Native::Function(_) => {
                format!("[Bridge: {}]", native_stringify(n, STRINGIFY_DEPTH))
            }
            _ => native_stringify(n, STRINGIFY_DEPTH),
        },
        Value::SmartLink(o) => bridge::smartlink_debug(o),
        other => to_string_value(other),
    }
}

// ── Equality ──────────────────────────────────────────────────────────────

/// `===`. Primitives by value, heap values by identity. Wrappers compare by
/// the identity of the host value behind them, so the same host object seen
/// through two wrappers is strictly equal to itself.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    if let (Some(na), Some(nb)) = (a.as_wrapped_native(), b.as_wrapped_native()) {
        return na.identity_eq(&nb);
    }
    let a = unwrap_primitive(a);
    let b = unwrap_primitive(b);
    match (&a, &b) {
        (Value::Undefined, Value::Undefined) => true,
        (Value::Null, Value::Null) => true,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// `==` with the usual coercions.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    let a = unwrap_primitive(a);
    let b = unwrap_primitive(b);
    match (&a, &b) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Number(x), Value::String(_)) => *x == to_number(&b),
        (Value::String(_), Value::Number(y)) => to_number(&a) == *y,
        (Value::Boolean(_), _) => loose_eq(&Value::Number(to_number(&a)), &b),
        (_, Value::Boolean(_)) => loose_eq(&a, &Value::Number(to_number(&b))),
        _ if a.is_object_like() && b.is_object_like() => strict_eq(&a, &b),
        _ if a.is_object_like() => loose_eq(&to_primitive(&a), &b),
        _ if b.is_object_like() => loose_eq(&a, &to_primitive(&b)),
        _ => false,
    }
}

// ── Operators ─────────────────────────────────────────────────────────────

pub fn binary_op(op: BinOp, a: &Value, b: &Value) -> Result<Value, Fault> {
    let result = match op {
        BinOp::Add => {
            let pa = to_primitive(a);
            let pb = to_primitive(b);
            if matches!(pa, Value::String(_)) || matches!(pb, Value::String(_)) {
                Value::String(format!("{}{}", to_string_value(&pa), to_string_value(&pb)))
            } else {
                Value::Number(to_number(&pa) + to_number(&pb))
            }
        }
        BinOp::Sub => Value::Number(to_number(a) - to_number(b)),
        BinOp::Mul => Value::Number(to_number(a) * to_number(b)),
        BinOp::Div => Value::Number(to_number(a) / to_number(b)),
        BinOp::Mod => Value::Number(to_number(a) % to_number(b)),
        BinOp::ShiftLeft => Value::Number((to_int32(a) << (to_uint32(b) & 31)) as f64),
        BinOp::ShiftRight => Value::Number((to_int32(a) >> (to_uint32(b) & 31)) as f64),
        BinOp::ShiftRightZeroFill => Value::Number((to_uint32(a) >> (to_uint32(b) & 31)) as f64),
        BinOp::BitAnd => Value::Number((to_int32(a) & to_int32(b)) as f64),
        BinOp::BitXor => Value::Number((to_int32(a) ^ to_int32(b)) as f64),
        BinOp::BitOr => Value::Number((to_int32(a) | to_int32(b)) as f64),
        BinOp::Less => Value::Boolean(compare(a, b, |o| o == std::cmp::Ordering::Less)),
        BinOp::Greater => Value::Boolean(compare(a, b, |o| o == std::cmp::Ordering::Greater)),
        BinOp::LessEq => Value::Boolean(compare(a, b, |o| o != std::cmp::Ordering::Greater)),
        BinOp::GreaterEq => Value::Boolean(compare(a, b, |o| o != std::cmp::Ordering::Less)),
        BinOp::LooseEq => Value::Boolean(loose_eq(a, b)),
        BinOp::LooseNotEq => Value::Boolean(!loose_eq(a, b)),
        BinOp::StrictEq => Value::Boolean(strict_eq(a, b)),
        BinOp::StrictNotEq => Value::Boolean(!strict_eq(a, b)),
    };
    Ok(result)
}

/// Relational comparison. Both sides reduce to primitives; two strings
/// compare lexicographically, anything else numerically. `NaN` on either
/// side makes every relation false.
fn compare(a: &Value, b: &Value, accept: impl Fn(std::cmp::Ordering) -> bool) -> bool {
    let pa = to_primitive(a);
    let pb = to_primitive(b);
    if let (Value::String(x), Value::String(y)) = (&pa, &pb) {
        return accept(x.cmp(y));
    }
    let x = to_number(&pa);
    let y = to_number(&pb);
    match x.partial_cmp(&y) {
        Some(ordering) => accept(ordering),
        None => false,
    }
}

pub fn unary_op(op: UnaryOp, v: &Value) -> Value {
    match op {
        UnaryOp::Neg => Value::Number(-to_number(v)),
        UnaryOp::Plus => Value::Number(to_number(v)),
        UnaryOp::Not => Value::Boolean(!truthy(v)),
        UnaryOp::BitNot => Value::Number(!to_int32(v) as f64),
        UnaryOp::Typeof => Value::String(type_of(v).to_string()),
    }
}

// ── Member Access ─────────────────────────────────────────────────────────

/// The property key an index expression resolves to.
pub fn index_key(v: &Value) -> String {
    to_string_value(v)
}

/// Walk the prototype chain for a named property.
fn lookup_property(obj: &ObjectRef, name: &str) -> Option<Property> {
    let mut current = obj.clone();
    loop {
        if let Some(p) = current.borrow().properties.get(name) {
            return Some(p.clone());
        }
        let next = current.borrow().prototype.clone();
        match next {
            Some(proto) => current = proto,
            None => return None,
        }
    }
}

fn call_getter(
    env: &Rc<Environment>,
    getter: &BuiltinFn,
    this: &Value,
) -> Result<Value, Fault> {
    match getter(env, this, &[])? {
        BuiltinOutcome::Value(v) => Ok(v),
        BuiltinOutcome::Invoke { .. } => Err(Fault::error("accessor must produce a value")),
    }
}

fn proto_member(
    env: &Rc<Environment>,
    proto: &ObjectRef,
    this: &Value,
    name: &str,
) -> Result<Value, Fault> {
    match lookup_property(proto, name) {
        Some(p) => {
            if let Some(getter) = &p.getter {
                call_getter(env, getter, this)
            } else {
                Ok(p.value.clone())
            }
        }
        None => Ok(Value::Undefined),
    }
}

/// Read `target.name`, dispatching on the receiver's shape.
pub fn get_member(env: &Rc<Environment>, target: &Value, name: &str) -> Result<Value, Fault> {
    match target {
        Value::Undefined | Value::Null => Err(Fault::type_error(format!(
            "cannot read property '{name}' of {}",
            type_of(target)
        ))),
        Value::Boolean(_) => proto_member(env, &env.intrinsics().boolean_prototype, target, name),
        Value::Number(_) => proto_member(env, &env.intrinsics().number_prototype, target, name),
        Value::String(s) => {
            if name == "length" {
                return Ok(Value::Number(s.chars().count() as f64));
            }
            if let Some(index) = crate::value::parse_array_index(name) {
                return Ok(match s.chars().nth(index as usize) {
                    Some(c) => Value::String(c.to_string()),
                    None => Value::Undefined,
                });
            }
            proto_member(env, &env.intrinsics().string_prototype, target, name)
        }
        Value::Object(obj) => match lookup_property(obj, name) {
            Some(p) => {
                if let Some(getter) = &p.getter {
                    call_getter(env, getter, target)
                } else {
                    Ok(p.value.clone())
                }
            }
            None => Ok(Value::Undefined),
        },
        Value::Bridge(native) => bridge::bridge_get(env, native, name),
        Value::SmartLink(obj) => {
            bridge::smart_read(env, obj, name, env.exec_context().is_privileged())
        }
    }
}

/// Write `target.name = value`.
pub fn set_member(
    env: &Rc<Environment>,
    target: &Value,
    name: &str,
    value: Value,
) -> Result<(), Fault> {
    match target {
        Value::Undefined | Value::Null => Err(Fault::type_error(format!(
            "cannot set property '{name}' of {}",
            type_of(target)
        ))),
        Value::Object(obj) => {
            if name == "length" && obj.borrow().is_array() {
                let len = to_uint32(&value);
                obj.borrow_mut().resize_array(len);
                return Ok(());
            }
            if let Some(existing) = lookup_property(obj, name) {
                if existing.is_accessor() {
                    if let Some(setter) = &existing.setter {
                        setter(env, target, std::slice::from_ref(&value))?;
                    }
                    return Ok(());
                }
            }
            let mut data = obj.borrow_mut();
            match data.properties.get_mut(name) {
                Some(own) => {
                    if own.writable {
                        own.value = value;
                    }
                }
                None => {
                    data.properties.insert(name.to_string(), Property::data(value));
                }
            }
            data.adjust_array_length(name);
            Ok(())
        }
        Value::Bridge(native) => bridge::bridge_set(env, native, name, &value),
        Value::SmartLink(obj) => {
            bridge::smart_write(env, obj, name, &value, env.exec_context().is_privileged())
        }
        // Writes to primitives vanish silently.
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_strings_drop_integral_fractions() {
        assert_eq!(number_to_string(4.0), "4");
        assert_eq!(number_to_string(-0.5), "-0.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::INFINITY), "Infinity");
    }

    #[test]
    fn int32_conversion_wraps() {
        assert_eq!(to_int32(&Value::Number(4294967296.0)), 0);
        assert_eq!(to_int32(&Value::Number(-1.0)), -1);
        assert_eq!(to_int32(&Value::Number(2147483648.0)), -2147483648);
        assert_eq!(to_uint32(&Value::Number(-1.0)), 4294967295);
    }

    #[test]
    fn add_prefers_concatenation() {
        let v = binary_op(
            BinOp::Add,
            &Value::String("a".into()),
            &Value::Number(1.0),
        )
        .unwrap();
        assert!(matches!(v, Value::String(s) if s == "a1"));
        let v = binary_op(BinOp::Add, &Value::Number(2.0), &Value::Number(2.0)).unwrap();
        assert!(matches!(v, Value::Number(n) if n == 4.0));
    }

    #[test]
    fn loose_equality_coerces() {
        assert!(loose_eq(&Value::Number(1.0), &Value::String("1".into())));
        assert!(loose_eq(&Value::Undefined, &Value::Null));
        assert!(loose_eq(&Value::Boolean(true), &Value::Number(1.0)));
        assert!(!strict_eq(&Value::Number(1.0), &Value::String("1".into())));
        assert!(!strict_eq(&Value::Undefined, &Value::Null));
    }

    #[test]
    fn nan_compares_false() {
        let nan = Value::Number(f64::NAN);
        let one = Value::Number(1.0);
        assert!(!compare(&nan, &one, |o| o == std::cmp::Ordering::Less));
        assert!(!compare(&one, &nan, |o| o == std::cmp::Ordering::Greater));
        assert!(!strict_eq(&nan, &nan));
    }
}
