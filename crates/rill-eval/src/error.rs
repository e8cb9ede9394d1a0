//! Engine error taxonomy.
//!
//! Two layers: [`Fault`] is the internal error currency inside the evaluator
//! and the host bridge, cheap to build and convertible into a guest-catchable
//! exception. [`EngineError`] is what crosses the embedding boundary.

use rill_types::ParseError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Category of a runtime fault, mirrored into guest error objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FaultKind {
    /// Wrong kind of value for an operation, e.g. calling a non-function.
    Type,
    /// Unresolved or unassignable identifier.
    Reference,
    /// A capability policy rejected a host-object access.
    AccessDenied,
    /// A plain guest `throw` or a generic host error.
    Error,
}

impl FaultKind {
    /// The `name` field installed on the matching guest error object.
    pub fn guest_name(self) -> &'static str {
        match self {
            FaultKind::Type => "TypeError",
            FaultKind::Reference => "ReferenceError",
            FaultKind::AccessDenied => "AccessDeniedError",
            FaultKind::Error => "Error",
        }
    }
}

/// A runtime fault raised inside the evaluator or by host callbacks.
///
/// Faults become guest-catchable exceptions at the point they cross into
/// guest code; a fault that is never caught surfaces as an [`EngineError`].
#[derive(Debug, Clone)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn type_error(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Type,
            message: message.into(),
        }
    }

    pub fn reference_error(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Reference,
            message: message.into(),
        }
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::AccessDenied,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.guest_name(), self.message)
    }
}

/// An uncaught guest exception as reported to the host.
#[derive(Debug, Clone, Serialize)]
pub struct GuestFault {
    pub kind: FaultKind,
    pub message: String,
    /// Innermost-first guest call names, present when the engine is
    /// configured to collect stacks.
    pub stack: Option<Vec<String>>,
}

impl fmt::Display for GuestFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.guest_name(), self.message)?;
        if let Some(stack) = &self.stack {
            for frame in stack {
                write!(f, "\n    at {frame}")?;
            }
        }
        Ok(())
    }
}

/// Errors surfaced to the embedding host.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The source text did not parse.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Guest code threw and nothing caught it.
    #[error("uncaught guest exception: {0}")]
    Guest(GuestFault),

    /// A capability policy rejected an access and guest code did not
    /// catch the resulting exception.
    #[error("access denied: {message}")]
    AccessDenied {
        message: String,
        stack: Option<Vec<String>>,
    },

    /// The computation consumed its step bound without completing.
    #[error("execution bound exceeded after {steps} steps")]
    BoundExceeded { steps: u64 },

    /// Engine misuse or an evaluator invariant violation.
    #[error("internal engine error: {0}")]
    Internal(String),
}

/// Collapse an engine error back into a fault, for host callbacks that
/// re-enter the evaluator and report failure to the calling guest.
impl From<EngineError> for Fault {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Guest(gf) => Fault {
                kind: gf.kind,
                message: gf.message,
            },
            EngineError::AccessDenied { message, .. } => Fault::access_denied(message),
            other => Fault::error(other.to_string()),
        }
    }
}
