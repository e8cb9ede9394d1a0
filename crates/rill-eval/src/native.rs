//! Host-side values and the capability policy.
//!
//! [`Native`] is the currency the embedding host speaks: plain Rust data plus
//! shared, mutable objects and callbacks. Guest code never touches a
//! `Native` directly; the environment wraps host values on the way in and
//! unwraps guest values on the way out.

use crate::error::Fault;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

/// A host callback: receives the host-side `this` and arguments, returns a
/// host value or a fault that becomes a guest-catchable exception.
pub type HostFn = Rc<dyn Fn(Native, &[Native]) -> Result<Native, Fault>>;

pub type NativeObjectRef = Rc<RefCell<NativeObject>>;
pub type NativeArrayRef = Rc<RefCell<Vec<Native>>>;

/// A host value.
#[derive(Clone)]
pub enum Native {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Shared mutable list; guest mutations are visible to the host.
    Array(NativeArrayRef),
    Function(NativeFunction),
    Object(NativeObjectRef),
}

/// A host function exposed to guest code.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    pub call: HostFn,
    /// Invoked for `new f(...)` when present; plain `call` otherwise.
    pub construct: Option<HostFn>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        call: impl Fn(Native, &[Native]) -> Result<Native, Fault> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            call: Rc::new(call),
            construct: None,
        }
    }

    pub fn with_construct(
        mut self,
        construct: impl Fn(Native, &[Native]) -> Result<Native, Fault> + 'static,
    ) -> Self {
        self.construct = Some(Rc::new(construct));
        self
    }
}

/// Getter/setter pair attached to a host object member.
#[derive(Clone)]
pub struct NativeAccessor {
    pub get: Option<HostFn>,
    pub set: Option<HostFn>,
}

/// The capability allow-lists that gate guest access to a policy-wrapped
/// host object. Empty lists deny everything.
#[derive(Clone, Default)]
pub struct CapabilityPolicy {
    api_methods: BTreeSet<String>,
    api_properties: BTreeSet<String>,
    api_user_properties: BTreeSet<String>,
}

impl CapabilityPolicy {
    /// Methods the guest may read and call, bound to the host object.
    pub fn with_methods<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_methods.extend(names.into_iter().map(Into::into));
        self
    }

    /// Members the guest may read but not write.
    pub fn with_properties<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_properties
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Members the guest may both read and write.
    pub fn with_user_properties<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_user_properties
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn is_method(&self, name: &str) -> bool {
        self.api_methods.contains(name)
    }

    pub fn is_property(&self, name: &str) -> bool {
        self.api_properties.contains(name)
    }

    pub fn is_user_property(&self, name: &str) -> bool {
        self.api_user_properties.contains(name)
    }

    /// Every name the policy exposes, in sorted order. Used for the debug
    /// rendering of policy-wrapped objects.
    pub fn surface(&self) -> Vec<String> {
        let mut names: BTreeSet<&String> = BTreeSet::new();
        names.extend(&self.api_methods);
        names.extend(&self.api_properties);
        names.extend(&self.api_user_properties);
        names.into_iter().cloned().collect()
    }
}

/// A structured host object: named fields, methods, and accessors, plus the
/// policy consulted when the object is exposed in smart mode.
pub struct NativeObject {
    pub class_name: String,
    fields: BTreeMap<String, Native>,
    methods: BTreeMap<String, HostFn>,
    accessors: BTreeMap<String, NativeAccessor>,
    pub policy: CapabilityPolicy,
}

impl NativeObject {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            fields: BTreeMap::new(),
            methods: BTreeMap::new(),
            accessors: BTreeMap::new(),
            policy: CapabilityPolicy::default(),
        }
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: Native) {
        self.fields.insert(name.into(), value);
    }

    pub fn field(&self, name: &str) -> Option<&Native> {
        self.fields.get(name)
    }

    pub fn set_method(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(Native, &[Native]) -> Result<Native, Fault> + 'static,
    ) {
        self.methods.insert(name.into(), Rc::new(f));
    }

    pub fn method(&self, name: &str) -> Option<HostFn> {
        self.methods.get(name).cloned()
    }

    pub fn set_accessor(&mut self, name: impl Into<String>, get: Option<HostFn>, set: Option<HostFn>) {
        self.accessors.insert(name.into(), NativeAccessor { get, set });
    }

    pub fn accessor(&self, name: &str) -> Option<&NativeAccessor> {
        self.accessors.get(name)
    }

    /// True if the object carries any member under this name.
    pub fn has_member(&self, name: &str) -> bool {
        self.fields.contains_key(name)
            || self.methods.contains_key(name)
            || self.accessors.contains_key(name)
    }

    pub fn wrap(self) -> NativeObjectRef {
        Rc::new(RefCell::new(self))
    }
}

impl Native {
    /// `typeof`-style tag for a host value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Native::Undefined => "undefined",
            Native::Null => "object",
            Native::Bool(_) => "boolean",
            Native::Number(_) => "number",
            Native::String(_) => "string",
            Native::Array(_) | Native::Object(_) => "object",
            Native::Function(_) => "function",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Native::Undefined | Native::Null => false,
            Native::Bool(b) => *b,
            Native::Number(n) => *n != 0.0 && !n.is_nan(),
            Native::String(s) => !s.is_empty(),
            Native::Array(_) | Native::Function(_) | Native::Object(_) => true,
        }
    }

    /// Strict identity: value equality for primitives, pointer identity for
    /// heap values. `NaN` is not equal to itself.
    pub fn identity_eq(&self, other: &Native) -> bool {
        match (self, other) {
            (Native::Undefined, Native::Undefined) => true,
            (Native::Null, Native::Null) => true,
            (Native::Bool(a), Native::Bool(b)) => a == b,
            (Native::Number(a), Native::Number(b)) => a == b,
            (Native::String(a), Native::String(b)) => a == b,
            (Native::Array(a), Native::Array(b)) => Rc::ptr_eq(a, b),
            (Native::Object(a), Native::Object(b)) => Rc::ptr_eq(a, b),
            (Native::Function(a), Native::Function(b)) => Rc::ptr_eq(&a.call, &b.call),
            _ => false,
        }
    }
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Native::Undefined => write!(f, "undefined"),
            Native::Null => write!(f, "null"),
            Native::Bool(b) => write!(f, "{b}"),
            Native::Number(n) => write!(f, "{n}"),
            Native::String(s) => write!(f, "{s:?}"),
            Native::Array(a) => f.debug_list().entries(a.borrow().iter()).finish(),
            Native::Function(nf) => write!(f, "[function {}]", nf.name),
            Native::Object(o) => write!(f, "[object {}]", o.borrow().class_name),
        }
    }
}

impl From<f64> for Native {
    fn from(n: f64) -> Self {
        Native::Number(n)
    }
}

impl From<i32> for Native {
    fn from(n: i32) -> Self {
        Native::Number(n as f64)
    }
}

impl From<bool> for Native {
    fn from(b: bool) -> Self {
        Native::Bool(b)
    }
}

impl From<&str> for Native {
    fn from(s: &str) -> Self {
        Native::String(s.to_string())
    }
}

impl From<String> for Native {
    fn from(s: String) -> Self {
        Native::String(s)
    }
}
