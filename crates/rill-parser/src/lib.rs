//! Recursive-descent parser for the Rill guest language.
//!
//! The engine consumes this crate as a pure function: [`parse`] turns source
//! text into a [`Program`] AST or fails with the first [`ParseError`].

mod parse_expr;
mod parse_stmt;
mod parser;

pub use parser::Parser;

use rill_lexer::Lexer;
use rill_types::ast::Program;
use rill_types::{ParseError, SourceFile};

/// Parse guest source text into a program AST.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let sf = SourceFile::new("guest", source);
    let tokens = Lexer::new(&sf).lex()?;
    Parser::new(tokens).parse_program()
}
