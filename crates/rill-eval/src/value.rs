//! Guest-side values.
//!
//! Everything guest code can hold lands in [`Value`]. Primitives are inline;
//! objects are shared mutable cells; the two bridge variants wrap host values
//! without copying, either transparently ([`Value::Bridge`]) or behind a
//! capability policy ([`Value::SmartLink`]).

use crate::environment::Environment;
use crate::error::Fault;
use crate::native::{Native, NativeObjectRef};
use crate::scope::Scope;
use rill_types::ast::BlockRef;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

pub type ObjectRef = Rc<RefCell<ObjectData>>;

/// A builtin implemented by the engine itself. Receives the environment, the
/// `this` value, and the arguments.
pub type BuiltinFn = Rc<dyn Fn(&Rc<Environment>, &Value, &[Value]) -> Result<BuiltinOutcome, Fault>>;

/// What a builtin produced: a finished value, or a request to invoke guest
/// code. The invoke form lets builtins like `call` and `apply` re-enter the
/// evaluator without recursing into it.
pub enum BuiltinOutcome {
    Value(Value),
    Invoke {
        func: Value,
        this: Value,
        args: Vec<Value>,
    },
}

/// A guest-language value.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Object(ObjectRef),
    /// Transparent wrapper around a host value: every operation delegates
    /// straight to the native side.
    Bridge(Native),
    /// Policy-gated wrapper around a host object: reads and writes go
    /// through the object's capability policy.
    SmartLink(NativeObjectRef),
}

/// Heap object payload: a kind tag, named properties, and a prototype link.
pub struct ObjectData {
    pub kind: ObjectKind,
    pub properties: BTreeMap<String, Property>,
    pub prototype: Option<ObjectRef>,
}

#[derive(Clone)]
pub enum ObjectKind {
    Plain,
    /// Array semantics: integer writes keep the `length` property in sync.
    Array,
    Function(Rc<GuestFunctionData>),
    Builtin(BuiltinFunction),
}

#[derive(Clone)]
pub struct BuiltinFunction {
    pub name: String,
    pub func: BuiltinFn,
}

/// A closure produced by evaluating a guest `function`.
pub struct GuestFunctionData {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: BlockRef,
    pub closure: Scope,
}

/// A named property slot.
#[derive(Clone)]
pub struct Property {
    pub value: Value,
    pub enumerable: bool,
    pub writable: bool,
    pub getter: Option<BuiltinFn>,
    pub setter: Option<BuiltinFn>,
}

impl Property {
    /// An ordinary enumerable, writable data property.
    pub fn data(value: Value) -> Self {
        Self {
            value,
            enumerable: true,
            writable: true,
            getter: None,
            setter: None,
        }
    }

    /// A non-enumerable data property, used for intrinsics and `length`.
    pub fn hidden(value: Value) -> Self {
        Self {
            enumerable: false,
            ..Self::data(value)
        }
    }

    pub fn accessor(getter: Option<BuiltinFn>, setter: Option<BuiltinFn>) -> Self {
        Self {
            value: Value::Undefined,
            enumerable: true,
            writable: true,
            getter,
            setter,
        }
    }

    pub fn is_accessor(&self) -> bool {
        self.getter.is_some() || self.setter.is_some()
    }
}

impl ObjectData {
    pub fn new(kind: ObjectKind, prototype: Option<ObjectRef>) -> Self {
        Self {
            kind,
            properties: BTreeMap::new(),
            prototype,
        }
    }

    pub fn wrap(self) -> ObjectRef {
        Rc::new(RefCell::new(self))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array)
    }

    /// Current array length, read from the `length` property.
    pub fn array_length(&self) -> u32 {
        match self.properties.get("length") {
            Some(p) => match &p.value {
                Value::Number(n) if *n >= 0.0 => *n as u32,
                _ => 0,
            },
            None => 0,
        }
    }

    fn set_array_length(&mut self, len: u32) {
        self.properties
            .insert("length".to_string(), Property::hidden(Value::Number(len as f64)));
    }

    /// After a write to `key`, grow `length` when `key` is an index at or
    /// beyond the current length.
    pub fn adjust_array_length(&mut self, key: &str) {
        if !self.is_array() {
            return;
        }
        if let Some(index) = parse_array_index(key) {
            if index >= self.array_length() {
                self.set_array_length(index + 1);
            }
        }
    }

    /// Truncate or grow `length` directly, dropping elements past the new
    /// length when shrinking.
    pub fn resize_array(&mut self, len: u32) {
        let old = self.array_length();
        if len < old {
            for i in len..old {
                self.properties.remove(&i.to_string());
            }
        }
        self.set_array_length(len);
    }
}

/// Parse a canonical array index: digits only, no leading zeros except "0".
pub fn parse_array_index(key: &str) -> Option<u32> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

impl Value {
    pub fn is_callable(&self) -> bool {
        match self {
            Value::Object(o) => matches!(
                o.borrow().kind,
                ObjectKind::Function(_) | ObjectKind::Builtin(_)
            ),
            Value::Bridge(Native::Function(_)) => true,
            _ => false,
        }
    }

    /// True for values that carry object identity.
    pub fn is_object_like(&self) -> bool {
        matches!(
            self,
            Value::Object(_)
                | Value::SmartLink(_)
                | Value::Bridge(Native::Object(_))
                | Value::Bridge(Native::Array(_))
                | Value::Bridge(Native::Function(_))
        )
    }

    /// The host value behind a wrapper, if this value is one.
    pub fn as_wrapped_native(&self) -> Option<Native> {
        match self {
            Value::Bridge(n) => Some(n.clone()),
            Value::SmartLink(o) => Some(Native::Object(o.clone())),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Identity semantics, matching the guest's `===` except that `NaN`
    /// compares unequal to itself there too.
    fn eq(&self, other: &Self) -> bool {
        crate::ops::strict_eq(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::ops::debug_string(self))
    }
}
