//! The Rill engine: an embeddable interpreter for a small, dynamically
//! typed scripting language with cooperative execution and a capability
//! gated host-object bridge.
//!
//! The two load-bearing pieces:
//!
//! - [`Computation`] is a resumable evaluation: one frame transition per
//!   [`Computation::step`], a hard step bound, and suspension between steps,
//!   so untrusted guest code can never monopolize the host.
//! - [`Value::SmartLink`] wraps host objects behind a per-object
//!   [`CapabilityPolicy`]; guest access outside the allow-lists is denied
//!   unless the engine's context has been made privileged.
//!
//! ```no_run
//! use rill_eval::Engine;
//!
//! let mut engine = Engine::new();
//! let result = engine.eval("return 2 + 2;").unwrap();
//! ```

pub mod bridge;
mod engine;
mod environment;
mod error;
mod evaluator;
mod frame;
mod intrinsics;
mod native;
mod ops;
mod scope;
mod value;

pub use engine::{Engine, GuestFunction};
pub use environment::{EngineOptions, Environment, ExecContext, ForeignObjectMode};
pub use error::{EngineError, Fault, FaultKind, GuestFault};
pub use evaluator::{Computation, RunState};
pub use native::{
    CapabilityPolicy, HostFn, Native, NativeFunction, NativeObject, NativeObjectRef,
};
pub use scope::Scope;
pub use value::{BuiltinOutcome, ObjectKind, ObjectRef, Property, Value};
