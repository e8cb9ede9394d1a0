//! The engine environment: global scope, intrinsics, execution context, and
//! the conversions between host and guest values.

use crate::error::Fault;
use crate::evaluator::Computation;
use crate::intrinsics::{array_elements, Intrinsics};
use crate::native::{Native, NativeFunction, NativeObject};
use crate::ops;
use crate::scope::Scope;
use crate::value::{
    BuiltinFn, BuiltinFunction, BuiltinOutcome, GuestFunctionData, ObjectData, ObjectKind,
    ObjectRef, Property, Value,
};
use std::cell::Cell;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// How host objects handed to guest code are wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForeignObjectMode {
    /// Wrap behind the object's capability policy.
    #[default]
    Smart,
    /// Wrap transparently; every member is reachable.
    Raw,
}

/// Engine construction options.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub foreign_object_mode: ForeignObjectMode,
    /// Evaluator transitions a computation may take before it is aborted.
    pub step_limit: u64,
    /// Largest length a guest write may grow a shared host array to.
    pub host_array_growth_limit: usize,
    /// Collect guest call names onto uncaught errors.
    pub add_extra_error_info_to_stacks: bool,
    /// Append an engine-side marker to collected stacks.
    pub add_internal_stack: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            foreign_object_mode: ForeignObjectMode::Smart,
            step_limit: 100_000,
            host_array_growth_limit: 100_000,
            add_extra_error_info_to_stacks: true,
            add_internal_stack: false,
        }
    }
}

/// Per-environment execution context. Privilege is a one-way latch shared
/// by every computation the environment runs.
#[derive(Default)]
pub struct ExecContext {
    privileged: Cell<bool>,
}

impl ExecContext {
    pub fn is_privileged(&self) -> bool {
        self.privileged.get()
    }

    pub fn escalate(&self) {
        self.privileged.set(true);
    }
}

/// Shared engine state: one per [`crate::Engine`], referenced by every
/// computation, closure proxy, and builtin it produces.
pub struct Environment {
    /// Back-reference to the owning `Rc`, so conversions can hand owned
    /// handles to the closures they build.
    weak: Weak<Environment>,
    global: Scope,
    intrinsics: Intrinsics,
    context: ExecContext,
    options: EngineOptions,
}

impl Environment {
    pub fn new(options: EngineOptions) -> Rc<Self> {
        let env = Rc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            global: Scope::root(),
            intrinsics: Intrinsics::new(),
            context: ExecContext::default(),
            options,
        });
        env.global.bind("undefined", Value::Undefined, false);

        // The `Rill` namespace: debug helpers for guest code.
        let namespace = env.new_object();
        namespace.borrow_mut().properties.insert(
            "str".to_string(),
            Property::data(env.new_builtin("str", |_env, _this, args| {
                let target = args.first().cloned().unwrap_or(Value::Undefined);
                Ok(BuiltinOutcome::Value(Value::String(ops::debug_string(
                    &target,
                ))))
            })),
        );
        env.global.bind("Rill", Value::Object(namespace), true);
        env
    }

    fn rc(&self) -> Rc<Environment> {
        self.weak.upgrade().expect("environment outlives its borrows")
    }

    pub fn global_scope(&self) -> Scope {
        self.global.clone()
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    pub fn exec_context(&self) -> &ExecContext {
        &self.context
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    // ── Guest Value Construction ──────────────────────────────────────────

    pub fn new_object(&self) -> ObjectRef {
        ObjectData::new(
            ObjectKind::Plain,
            Some(self.intrinsics.object_prototype.clone()),
        )
        .wrap()
    }

    pub fn new_array(&self) -> ObjectRef {
        let mut data = ObjectData::new(
            ObjectKind::Array,
            Some(self.intrinsics.array_prototype.clone()),
        );
        data.resize_array(0);
        data.wrap()
    }

    /// A guest closure. Carries a fresh `prototype` object so constructed
    /// instances can share methods.
    pub fn new_function(&self, data: GuestFunctionData) -> Value {
        let mut object = ObjectData::new(
            ObjectKind::Function(Rc::new(data)),
            Some(self.intrinsics.function_prototype.clone()),
        );
        object.properties.insert(
            "prototype".to_string(),
            Property::hidden(Value::Object(self.new_object())),
        );
        Value::Object(object.wrap())
    }

    pub fn new_builtin(
        &self,
        name: &str,
        f: impl Fn(&Rc<Environment>, &Value, &[Value]) -> Result<BuiltinOutcome, Fault> + 'static,
    ) -> Value {
        let object = ObjectData::new(
            ObjectKind::Builtin(BuiltinFunction {
                name: name.to_string(),
                func: Rc::new(f) as BuiltinFn,
            }),
            Some(self.intrinsics.function_prototype.clone()),
        );
        Value::Object(object.wrap())
    }

    /// The guest error object a fault surfaces as.
    pub fn error_object(&self, fault: &Fault) -> Value {
        let obj = self.new_object();
        {
            let mut data = obj.borrow_mut();
            data.properties.insert(
                "name".to_string(),
                Property::data(Value::String(fault.kind.guest_name().to_string())),
            );
            data.properties.insert(
                "message".to_string(),
                Property::data(Value::String(fault.message.clone())),
            );
        }
        Value::Object(obj)
    }

    // ── Host/Guest Conversions ────────────────────────────────────────────

    /// Wrap a host value for guest consumption. Primitives copy; host
    /// arrays and functions wrap transparently; host objects wrap per the
    /// configured foreign-object mode.
    pub fn from_native(&self, n: &Native) -> Value {
        match n {
            Native::Undefined => Value::Undefined,
            Native::Null => Value::Null,
            Native::Bool(b) => Value::Boolean(*b),
            Native::Number(x) => Value::Number(*x),
            Native::String(s) => Value::String(s.clone()),
            Native::Array(_) | Native::Function(_) => Value::Bridge(n.clone()),
            Native::Object(obj) => match self.options.foreign_object_mode {
                ForeignObjectMode::Smart => Value::SmartLink(obj.clone()),
                ForeignObjectMode::Raw => Value::Bridge(n.clone()),
            },
        }
    }

    /// A guest array built from host values.
    pub fn array_from_natives(&self, items: &[Native]) -> Value {
        let arr = self.new_array();
        {
            let mut data = arr.borrow_mut();
            for (i, item) in items.iter().enumerate() {
                let key = i.to_string();
                data.properties
                    .insert(key.clone(), Property::data(self.from_native(item)));
                data.adjust_array_length(&key);
            }
        }
        Value::Object(arr)
    }

    /// Unwrap a guest value for the host. Wrappers hand back the host value
    /// they wrap; guest arrays copy out; guest functions become host
    /// callbacks that re-enter the evaluator.
    pub fn to_native(&self, v: &Value) -> Native {
        match v {
            Value::Undefined => Native::Undefined,
            Value::Null => Native::Null,
            Value::Boolean(b) => Native::Bool(*b),
            Value::Number(n) => Native::Number(*n),
            Value::String(s) => Native::String(s.clone()),
            Value::Bridge(n) => n.clone(),
            Value::SmartLink(obj) => Native::Object(obj.clone()),
            Value::Object(obj) => {
                let kind = obj.borrow().kind.clone();
                match kind {
                    ObjectKind::Array => {
                        let items: Vec<Native> = array_elements(obj)
                            .iter()
                            .map(|item| self.to_native(item))
                            .collect();
                        Native::Array(Rc::new(RefCell::new(items)))
                    }
                    ObjectKind::Function(data) => {
                        let name = data.name.clone().unwrap_or_else(|| "anonymous".to_string());
                        self.guest_callable(name, v.clone())
                    }
                    ObjectKind::Builtin(b) => self.guest_callable(b.name.clone(), v.clone()),
                    ObjectKind::Plain => {
                        let mut snapshot = NativeObject::new("Object");
                        for (name, prop) in &obj.borrow().properties {
                            if prop.enumerable && !prop.is_accessor() {
                                snapshot.set_field(name.clone(), self.to_native(&prop.value));
                            }
                        }
                        Native::Object(snapshot.wrap())
                    }
                }
            }
        }
    }

    /// A host callback that runs the given guest callable to completion on
    /// a fresh computation.
    fn guest_callable(&self, name: String, func: Value) -> Native {
        let env = self.rc();
        Native::Function(NativeFunction::new(name, move |this, args| {
            let this_value = env.from_native(&this);
            let arg_values: Vec<Value> = args.iter().map(|a| env.from_native(a)).collect();
            let mut comp = Computation::call(env.clone(), func.clone(), this_value, arg_values);
            match comp.run_to_completion() {
                Ok(result) => Ok(env.to_native(&result)),
                Err(e) => Err(Fault::from(e)),
            }
        }))
    }
}
