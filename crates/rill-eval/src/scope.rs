//! Lexical scope chain.

use crate::error::Fault;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Clone)]
struct Slot {
    value: Value,
    mutable: bool,
}

struct ScopeData {
    bindings: RefCell<BTreeMap<String, Slot>>,
    parent: Option<Scope>,
}

/// A frame in the scope chain. Cloning a `Scope` shares the frame; closures
/// keep their defining chain alive through this handle.
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeData>,
}

impl Scope {
    /// The root frame of a chain, usually the global scope.
    pub fn root() -> Self {
        Self {
            inner: Rc::new(ScopeData {
                bindings: RefCell::new(BTreeMap::new()),
                parent: None,
            }),
        }
    }

    /// A fresh frame whose lookups fall through to `self`.
    pub fn child(&self) -> Self {
        Self {
            inner: Rc::new(ScopeData {
                bindings: RefCell::new(BTreeMap::new()),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Resolve a name, walking outward through the chain.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut frame = self.clone();
        loop {
            if let Some(slot) = frame.inner.bindings.borrow().get(name) {
                return Some(slot.value.clone());
            }
            match &frame.inner.parent {
                Some(parent) => {
                    let next = parent.clone();
                    frame = next;
                }
                None => return None,
            }
        }
    }

    /// True if any frame in the chain binds `name`.
    pub fn contains(&self, name: &str) -> bool {
        let mut frame = self.clone();
        loop {
            if frame.inner.bindings.borrow().contains_key(name) {
                return true;
            }
            match &frame.inner.parent {
                Some(parent) => {
                    let next = parent.clone();
                    frame = next;
                }
                None => return false,
            }
        }
    }

    /// Create or overwrite a binding in this frame only.
    pub fn bind(&self, name: impl Into<String>, value: Value, mutable: bool) {
        self.inner
            .bindings
            .borrow_mut()
            .insert(name.into(), Slot { value, mutable });
    }

    /// Convenience for host-injected globals.
    pub fn add(&self, name: impl Into<String>, value: Value) {
        self.bind(name, value, true);
    }

    /// Assign to the nearest existing binding. Fails with a reference fault
    /// when the name is unbound anywhere in the chain.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), Fault> {
        let mut frame = self.clone();
        loop {
            {
                let mut bindings = frame.inner.bindings.borrow_mut();
                if let Some(slot) = bindings.get_mut(name) {
                    if !slot.mutable {
                        return Err(Fault::type_error(format!(
                            "assignment to immutable binding: {name}"
                        )));
                    }
                    slot.value = value;
                    return Ok(());
                }
            }
            match &frame.inner.parent {
                Some(parent) => {
                    let next = parent.clone();
                    frame = next;
                }
                None => {
                    return Err(Fault::reference_error(format!("{name} is not defined")));
                }
            }
        }
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_outward() {
        let root = Scope::root();
        root.bind("x", Value::Number(1.0), true);
        let child = root.child();
        child.bind("y", Value::Number(2.0), true);
        assert!(matches!(child.lookup("x"), Some(Value::Number(n)) if n == 1.0));
        assert!(matches!(child.lookup("y"), Some(Value::Number(n)) if n == 2.0));
        assert!(root.lookup("y").is_none());
    }

    #[test]
    fn bind_shadows_without_touching_outer() {
        let root = Scope::root();
        root.bind("x", Value::Number(1.0), true);
        let child = root.child();
        child.bind("x", Value::Number(9.0), true);
        assert!(matches!(child.lookup("x"), Some(Value::Number(n)) if n == 9.0));
        assert!(matches!(root.lookup("x"), Some(Value::Number(n)) if n == 1.0));
    }

    #[test]
    fn assign_writes_through_to_defining_frame() {
        let root = Scope::root();
        root.bind("x", Value::Number(1.0), true);
        let child = root.child();
        child.assign("x", Value::Number(5.0)).unwrap();
        assert!(matches!(root.lookup("x"), Some(Value::Number(n)) if n == 5.0));
    }

    #[test]
    fn assign_to_unbound_name_faults() {
        let scope = Scope::root();
        let err = scope.assign("missing", Value::Null).unwrap_err();
        assert_eq!(err.message, "missing is not defined");
    }
}
