//! The embedding surface.

use crate::bridge;
use crate::environment::{EngineOptions, Environment};
use crate::error::EngineError;
use crate::evaluator::{Computation, RunState};
use crate::native::Native;
use crate::scope::Scope;
use crate::value::Value;
use std::rc::Rc;

/// A guest-language engine: one environment plus at most one loaded
/// computation. Evaluate whole programs with [`Engine::eval`], or drive
/// execution cooperatively with [`Engine::load`] and [`Engine::step`].
pub struct Engine {
    env: Rc<Environment>,
    computation: Option<Computation>,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            env: Environment::new(options),
            computation: None,
        }
    }

    pub fn env(&self) -> &Rc<Environment> {
        &self.env
    }

    pub fn options(&self) -> &EngineOptions {
        self.env.options()
    }

    pub fn global_scope(&self) -> Scope {
        self.env.global_scope()
    }

    /// Expose a host value as a global, wrapped per the engine's
    /// foreign-object mode.
    pub fn add_global(&self, name: &str, value: Native) {
        let wrapped = self.env.from_native(&value);
        self.env.global_scope().add(name, wrapped);
    }

    /// Expose an already-wrapped guest value as a global.
    pub fn add_global_value(&self, name: &str, value: Value) {
        self.env.global_scope().add(name, value);
    }

    /// Grant this engine's execution context privileged access to every
    /// policy-wrapped host object. Irreversible for the engine's lifetime.
    pub fn make_privileged(&self) {
        bridge::make_context_privileged(self.env.exec_context());
    }

    /// Parse a program and install it as the current computation without
    /// running it.
    pub fn load(&mut self, source: &str) -> Result<(), EngineError> {
        let program = rill_parser::parse(source)?;
        self.computation = Some(Computation::new(self.env.clone(), &program));
        Ok(())
    }

    /// Advance the loaded computation by one step. `Ok(true)` means it
    /// completed on this step.
    pub fn step(&mut self) -> Result<bool, EngineError> {
        match &mut self.computation {
            Some(comp) => comp.step(),
            None => Err(EngineError::Internal("no program loaded".to_string())),
        }
    }

    /// State of the loaded computation, if any.
    pub fn state(&self) -> Option<RunState> {
        self.computation.as_ref().map(|c| c.state())
    }

    /// Result of the loaded computation once it has completed.
    pub fn result(&self) -> Option<Native> {
        self.computation
            .as_ref()
            .and_then(|c| c.result())
            .map(|v| self.env.to_native(v))
    }

    /// Evaluate a program to completion and return its guest result. The
    /// program's value is its `return` value, or the value of its last
    /// top-level expression statement.
    pub fn eval_value(&mut self, source: &str) -> Result<Value, EngineError> {
        self.load(source)?;
        let mut comp = match self.computation.take() {
            Some(c) => c,
            None => return Err(EngineError::Internal("no program loaded".to_string())),
        };
        comp.run_to_completion()
    }

    /// Evaluate a program to completion and hand the result back as a host
    /// value.
    pub fn eval(&mut self, source: &str) -> Result<Native, EngineError> {
        let value = self.eval_value(source)?;
        Ok(self.env.to_native(&value))
    }

    /// Look up a guest function defined in the global scope, for repeated
    /// host-initiated calls.
    pub fn fetch_function(&self, name: &str) -> Result<GuestFunction, EngineError> {
        let value = self
            .env
            .global_scope()
            .lookup(name)
            .ok_or_else(|| EngineError::Internal(format!("global '{name}' is not defined")))?;
        if !value.is_callable() {
            return Err(EngineError::Internal(format!(
                "global '{name}' is not a function"
            )));
        }
        Ok(GuestFunction {
            env: self.env.clone(),
            func: value,
            name: name.to_string(),
        })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// A handle to a guest function, callable from the host. Each call runs on
/// a fresh computation with its own step bound.
pub struct GuestFunction {
    env: Rc<Environment>,
    func: Value,
    name: String,
}

impl GuestFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Call with host arguments and a host result.
    pub fn call(&self, args: &[Native]) -> Result<Native, EngineError> {
        let arg_values: Vec<Value> = args.iter().map(|a| self.env.from_native(a)).collect();
        let result = self.call_value(Value::Undefined, arg_values)?;
        Ok(self.env.to_native(&result))
    }

    /// Call with guest values, keeping the result wrapped.
    pub fn call_value(&self, this: Value, args: Vec<Value>) -> Result<Value, EngineError> {
        let mut comp = Computation::call(self.env.clone(), self.func.clone(), this, args);
        comp.run_to_completion()
    }
}
