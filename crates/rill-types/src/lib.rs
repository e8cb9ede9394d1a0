//! Shared types for the Rill engine.
//!
//! This crate defines the AST node types, source spans, and the parse
//! error type shared between the lexer, parser, and evaluator crates.

mod error;
mod span;
pub mod ast;

pub use error::ParseError;
pub use span::{SourceFile, Span};

/// Result type used by the lexer and parser.
pub type Result<T> = std::result::Result<T, ParseError>;
