//! The built-in prototype objects every environment carries.

use crate::error::Fault;
use crate::ops;
use crate::value::{
    BuiltinFn, BuiltinFunction, BuiltinOutcome, ObjectData, ObjectKind, ObjectRef, Property, Value,
};
use std::rc::Rc;

/// The prototype objects shared by all values of a given shape.
pub struct Intrinsics {
    pub object_prototype: ObjectRef,
    pub function_prototype: ObjectRef,
    pub array_prototype: ObjectRef,
    pub string_prototype: ObjectRef,
    pub number_prototype: ObjectRef,
    pub boolean_prototype: ObjectRef,
}

fn builtin(
    function_prototype: &ObjectRef,
    name: &str,
    f: impl Fn(&Rc<crate::environment::Environment>, &Value, &[Value]) -> Result<BuiltinOutcome, Fault>
        + 'static,
) -> Value {
    let data = ObjectData::new(
        ObjectKind::Builtin(BuiltinFunction {
            name: name.to_string(),
            func: Rc::new(f) as BuiltinFn,
        }),
        Some(function_prototype.clone()),
    );
    Value::Object(data.wrap())
}

fn install(proto: &ObjectRef, name: &str, value: Value) {
    proto
        .borrow_mut()
        .properties
        .insert(name.to_string(), Property::hidden(value));
}

/// Elements of a guest array, reading holes as `undefined`.
pub fn array_elements(obj: &ObjectRef) -> Vec<Value> {
    let data = obj.borrow();
    let len = data.array_length();
    (0..len)
        .map(|i| {
            data.properties
                .get(&i.to_string())
                .map(|p| p.value.clone())
                .unwrap_or(Value::Undefined)
        })
        .collect()
}

impl Intrinsics {
    pub fn new() -> Self {
        let object_prototype = ObjectData::new(ObjectKind::Plain, None).wrap();
        let function_prototype =
            ObjectData::new(ObjectKind::Plain, Some(object_prototype.clone())).wrap();
        let array_prototype =
            ObjectData::new(ObjectKind::Plain, Some(object_prototype.clone())).wrap();
        let string_prototype =
            ObjectData::new(ObjectKind::Plain, Some(object_prototype.clone())).wrap();
        let number_prototype =
            ObjectData::new(ObjectKind::Plain, Some(object_prototype.clone())).wrap();
        let boolean_prototype =
            ObjectData::new(ObjectKind::Plain, Some(object_prototype.clone())).wrap();

        install(
            &object_prototype,
            "toString",
            builtin(&function_prototype, "toString", |_env, this, _args| {
                Ok(BuiltinOutcome::Value(Value::String(ops::to_string_value(
                    this,
                ))))
            }),
        );
        install(
            &object_prototype,
            "hasOwnProperty",
            builtin(&function_prototype, "hasOwnProperty", |_env, this, args| {
                let key = match args.first() {
                    Some(k) => ops::index_key(k),
                    None => return Ok(BuiltinOutcome::Value(Value::Boolean(false))),
                };
                let has = match this {
                    Value::Object(o) => o.borrow().properties.contains_key(&key),
                    _ => false,
                };
                Ok(BuiltinOutcome::Value(Value::Boolean(has)))
            }),
        );

        install(
            &array_prototype,
            "push",
            builtin(&function_prototype, "push", |_env, this, args| {
                let obj = match this {
                    Value::Object(o) if o.borrow().is_array() => o.clone(),
                    _ => return Err(Fault::type_error("push called on a non-array")),
                };
                let mut data = obj.borrow_mut();
                for arg in args {
                    let key = data.array_length().to_string();
                    data.properties.insert(key.clone(), Property::data(arg.clone()));
                    data.adjust_array_length(&key);
                }
                Ok(BuiltinOutcome::Value(Value::Number(
                    data.array_length() as f64
                )))
            }),
        );
        install(
            &array_prototype,
            "join",
            builtin(&function_prototype, "join", |_env, this, args| {
                let obj = match this {
                    Value::Object(o) if o.borrow().is_array() => o.clone(),
                    _ => return Err(Fault::type_error("join called on a non-array")),
                };
                let sep = match args.first() {
                    Some(Value::Undefined) | None => ",".to_string(),
                    Some(v) => ops::to_string_value(v),
                };
                let parts: Vec<String> = array_elements(&obj)
                    .iter()
                    .map(|v| match v {
                        Value::Undefined | Value::Null => String::new(),
                        other => ops::to_string_value(other),
                    })
                    .collect();
                Ok(BuiltinOutcome::Value(Value::String(parts.join(&sep))))
            }),
        );
        install(
            &array_prototype,
            "indexOf",
            builtin(&function_prototype, "indexOf", |_env, this, args| {
                let obj = match this {
                    Value::Object(o) if o.borrow().is_array() => o.clone(),
                    _ => return Err(Fault::type_error("indexOf called on a non-array")),
                };
                let needle = args.first().cloned().unwrap_or(Value::Undefined);
                let found = array_elements(&obj)
                    .iter()
                    .position(|v| ops::strict_eq(v, &needle))
                    .map(|i| i as f64)
                    .unwrap_or(-1.0);
                Ok(BuiltinOutcome::Value(Value::Number(found)))
            }),
        );

        // `call` and `apply` hand the target back to the evaluator instead
        // of recursing into it.
        install(
            &function_prototype,
            "call",
            builtin(&function_prototype, "call", |_env, this, args| {
                if !this.is_callable() {
                    return Err(Fault::type_error("call target is not a function"));
                }
                Ok(BuiltinOutcome::Invoke {
                    func: this.clone(),
                    this: args.first().cloned().unwrap_or(Value::Undefined),
                    args: args.get(1..).unwrap_or(&[]).to_vec(),
                })
            }),
        );
        install(
            &function_prototype,
            "apply",
            builtin(&function_prototype, "apply", |_env, this, args| {
                if !this.is_callable() {
                    return Err(Fault::type_error("apply target is not a function"));
                }
                let call_args = match args.get(1) {
                    None | Some(Value::Undefined) | Some(Value::Null) => Vec::new(),
                    Some(Value::Object(o)) if o.borrow().is_array() => array_elements(o),
                    Some(_) => return Err(Fault::type_error("apply expects an array")),
                };
                Ok(BuiltinOutcome::Invoke {
                    func: this.clone(),
                    this: args.first().cloned().unwrap_or(Value::Undefined),
                    args: call_args,
                })
            }),
        );

        for proto in [&string_prototype, &number_prototype, &boolean_prototype] {
            install(
                proto,
                "toString",
                builtin(&function_prototype, "toString", |_env, this, _args| {
                    Ok(BuiltinOutcome::Value(Value::String(ops::to_string_value(
                        this,
                    ))))
                }),
            );
        }

        Self {
            object_prototype,
            function_prototype,
            array_prototype,
            string_prototype,
            number_prototype,
            boolean_prototype,
        }
    }
}
