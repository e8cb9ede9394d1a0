use crate::Span;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A parse (or lex) error for guest source text.
///
/// Parsing fails fast: the first malformed construct aborts the parse and
/// is surfaced to the host caller before any evaluation begins.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("parse error at {span}: {message}")]
pub struct ParseError {
    /// Human-readable description of what went wrong.
    pub message: String,
    /// Source location.
    pub span: Span,
}

impl ParseError {
    /// Create a new parse error.
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}
