//! Host-object access from guest code.
//!
//! Two exposure modes share this module. A [`Value::Bridge`] delegates every
//! read and write straight to the host value. A [`Value::SmartLink`] routes
//! each access through the object's [`CapabilityPolicy`], with an override
//! convention on top: a host member named `rill_<name>` transparently stands
//! in for `<name>`, receiving the original host object as its receiver.

use crate::environment::{Environment, ExecContext};
use crate::error::Fault;
use crate::native::{HostFn, Native, NativeObjectRef};
use crate::value::{parse_array_index, BuiltinOutcome, Value};
use std::rc::Rc;

/// Host members under this prefix override the unprefixed name on
/// policy-wrapped objects.
pub const OVERRIDE_PREFIX: &str = "rill_";

/// Grant the environment's execution context privileged access: every
/// policy check on every smart-linked object is bypassed until the engine
/// is dropped. There is deliberately no way back down.
pub fn make_context_privileged(ctx: &ExecContext) {
    ctx.escalate();
}

enum Member {
    Getter(HostFn),
    SetterOnly,
    Field(Native),
    Method(HostFn),
}

fn classify(obj: &NativeObjectRef, name: &str) -> Option<Member> {
    let data = obj.borrow();
    if let Some(acc) = data.accessor(name) {
        return Some(match &acc.get {
            Some(getter) => Member::Getter(getter.clone()),
            None => Member::SetterOnly,
        });
    }
    if let Some(field) = data.field(name) {
        return Some(Member::Field(field.clone()));
    }
    data.method(name).map(Member::Method)
}

/// A guest-callable wrapper around a host method, permanently bound to its
/// host object. The guest-side `this` is ignored.
fn bound_method(
    env: &Rc<Environment>,
    obj: &NativeObjectRef,
    public_name: &str,
    method: HostFn,
) -> Value {
    let target = obj.clone();
    env.new_builtin(public_name, move |env, _this, args| {
        let native_args: Vec<Native> = args.iter().map(|a| env.to_native(a)).collect();
        let result = method(Native::Object(target.clone()), &native_args)?;
        Ok(BuiltinOutcome::Value(env.from_native(&result)))
    })
}

fn read_member(
    env: &Rc<Environment>,
    obj: &NativeObjectRef,
    member: Member,
    public_name: &str,
) -> Result<Value, Fault> {
    match member {
        Member::Getter(getter) => {
            let result = getter(Native::Object(obj.clone()), &[])?;
            Ok(env.from_native(&result))
        }
        Member::SetterOnly => Ok(Value::Undefined),
        Member::Field(field) => Ok(env.from_native(&field)),
        Member::Method(method) => Ok(bound_method(env, obj, public_name, method)),
    }
}

/// Unrestricted read of a host object member.
pub fn native_object_get(
    env: &Rc<Environment>,
    obj: &NativeObjectRef,
    name: &str,
) -> Result<Value, Fault> {
    match classify(obj, name) {
        Some(member) => read_member(env, obj, member, name),
        None => Ok(Value::Undefined),
    }
}

/// Unrestricted write of a host object member. A getter-only accessor
/// swallows the write.
pub fn native_object_set(
    env: &Rc<Environment>,
    obj: &NativeObjectRef,
    name: &str,
    value: &Value,
) -> Result<(), Fault> {
    let accessor = obj.borrow().accessor(name).cloned();
    if let Some(acc) = accessor {
        if let Some(setter) = &acc.set {
            let native = env.to_native(value);
            setter(Native::Object(obj.clone()), std::slice::from_ref(&native))?;
        }
        return Ok(());
    }
    let native = env.to_native(value);
    obj.borrow_mut().set_field(name, native);
    Ok(())
}

/// Policy-gated read. Resolution order: override member, then the policy
/// allow-lists, then the privileged bypass; everything else is denied.
pub fn smart_read(
    env: &Rc<Environment>,
    obj: &NativeObjectRef,
    name: &str,
    privileged: bool,
) -> Result<Value, Fault> {
    let override_name = format!("{OVERRIDE_PREFIX}{name}");
    if let Some(member) = classify(obj, &override_name) {
        return read_member(env, obj, member, name);
    }
    let policy = obj.borrow().policy.clone();
    if policy.is_method(name) {
        let method = obj.borrow().method(name);
        return Ok(match method {
            Some(m) => bound_method(env, obj, name, m),
            None => Value::Undefined,
        });
    }
    if policy.is_property(name) || policy.is_user_property(name) {
        return native_object_get(env, obj, name);
    }
    if privileged {
        return native_object_get(env, obj, name);
    }
    Err(Fault::access_denied(format!(
        "cannot read protected property: {name}"
    )))
}

/// Policy-gated write. Only override setters, user properties, and the
/// privileged bypass permit writes; allow-listed methods and read-only
/// properties reject them.
pub fn smart_write(
    env: &Rc<Environment>,
    obj: &NativeObjectRef,
    name: &str,
    value: &Value,
    privileged: bool,
) -> Result<(), Fault> {
    let override_name = format!("{OVERRIDE_PREFIX}{name}");
    let override_setter = obj
        .borrow()
        .accessor(&override_name)
        .and_then(|acc| acc.set.clone());
    if let Some(setter) = override_setter {
        let native = env.to_native(value);
        setter(Native::Object(obj.clone()), std::slice::from_ref(&native))?;
        return Ok(());
    }
    if obj.borrow().policy.is_user_property(name) {
        return native_object_set(env, obj, name, value);
    }
    if privileged {
        return native_object_set(env, obj, name, value);
    }
    Err(Fault::access_denied(format!(
        "cannot write to protected property: {name}"
    )))
}

/// Transparent read through a bridge wrapper.
pub fn bridge_get(env: &Rc<Environment>, native: &Native, name: &str) -> Result<Value, Fault> {
    match native {
        Native::Object(obj) => native_object_get(env, obj, name),
        Native::Array(items) => {
            if name == "length" {
                return Ok(Value::Number(items.borrow().len() as f64));
            }
            // Canonical indices only, matching guest arrays: "007" is a
            // plain (absent) property, not element 7.
            if let Some(index) = parse_array_index(name) {
                return Ok(match items.borrow().get(index as usize) {
                    Some(item) => env.from_native(item),
                    None => Value::Undefined,
                });
            }
            Ok(Value::Undefined)
        }
        Native::String(s) => {
            if name == "length" {
                return Ok(Value::Number(s.chars().count() as f64));
            }
            if let Some(index) = parse_array_index(name) {
                return Ok(match s.chars().nth(index as usize) {
                    Some(c) => Value::String(c.to_string()),
                    None => Value::Undefined,
                });
            }
            Ok(Value::Undefined)
        }
        Native::Function(f) => Ok(if name == "name" {
            Value::String(f.name.clone())
        } else {
            Value::Undefined
        }),
        _ => Ok(Value::Undefined),
    }
}

/// Transparent write through a bridge wrapper. Writes to host primitives
/// vanish, matching writes to guest primitives. Writes that would grow the
/// shared host vector past the engine's growth limit fault instead of
/// allocating; the step bound cannot meter a single `resize`.
pub fn bridge_set(
    env: &Rc<Environment>,
    native: &Native,
    name: &str,
    value: &Value,
) -> Result<(), Fault> {
    match native {
        Native::Object(obj) => native_object_set(env, obj, name, value),
        Native::Array(items) => {
            let limit = env.options().host_array_growth_limit;
            if name == "length" {
                let len = crate::ops::to_uint32(value) as usize;
                if len > items.borrow().len() && len > limit {
                    return Err(grow_denied(len, limit));
                }
                items.borrow_mut().resize(len, Native::Undefined);
                return Ok(());
            }
            if let Some(index) = parse_array_index(name) {
                let index = index as usize;
                let converted = env.to_native(value);
                let mut vec = items.borrow_mut();
                if index >= vec.len() {
                    if index + 1 > limit {
                        return Err(grow_denied(index + 1, limit));
                    }
                    vec.resize(index + 1, Native::Undefined);
                }
                vec[index] = converted;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn grow_denied(requested: usize, limit: usize) -> Fault {
    Fault::error(format!(
        "cannot grow host array to {requested} elements (limit is {limit})"
    ))
}

/// Debug rendering of a policy-wrapped object: its class and the names its
/// policy exposes.
pub fn smartlink_debug(obj: &NativeObjectRef) -> String {
    let data = obj.borrow();
    format!(
        "[SmartLink: {}, props: {}]",
        data.class_name,
        data.policy.surface().join(", ")
    )
}
