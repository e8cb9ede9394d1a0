//! Core parser infrastructure: token cursor and expect helpers.

use rill_lexer::token::{Token, TokenKind};
use rill_types::ast::{Ident, Program};
use rill_types::{ParseError, Span};
use std::rc::Rc;

/// The Rill parser.
///
/// Consumes a token stream produced by the lexer and builds an AST.
/// Fails fast on the first error.
pub struct Parser {
    /// The token stream, ending with `Eof`.
    tokens: Vec<Token>,
    /// Current index into `tokens`.
    pos: usize,
    /// Current loop nesting depth — `break`/`continue` outside a loop is a
    /// parse error, so the evaluator never sees a stray loop completion.
    pub(crate) loop_depth: u32,
}

impl Parser {
    /// Create a new parser from a token stream.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            loop_depth: 0,
        }
    }

    /// Parse a complete program.
    pub fn parse_program(mut self) -> Result<Program, ParseError> {
        let start = self.current_span();
        let mut body = Vec::new();
        while !self.at_end() {
            body.push(Rc::new(self.parse_statement()?));
        }
        let span = start.merge(self.previous_span());
        Ok(Program {
            body: Rc::new(body),
            span,
        })
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    /// Returns the current token without advancing.
    pub(crate) fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or_else(|| {
            self.tokens
                .last()
                .expect("token stream always ends with Eof")
        })
    }

    /// Returns the kind of the current token.
    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    /// Look ahead by `n` tokens from the current position.
    pub(crate) fn look_ahead(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    /// Advance the cursor by one and return the consumed token.
    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    /// Returns the previously consumed token's span.
    pub(crate) fn previous_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            Span::point(1, 1)
        }
    }

    /// Returns the span of the current token.
    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    /// Returns `true` if the current token is `Eof`.
    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    /// Check if the current token matches the given kind exactly.
    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// If the current token matches, advance and return `true`.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    // ── Expect Helpers ────────────────────────────────────────────────────────

    /// Expect a specific token kind, or fail.
    pub(crate) fn expect(&mut self, expected: &TokenKind) -> Result<Token, ParseError> {
        if self.check(expected) {
            Ok(self.advance())
        } else {
            Err(self.error_at_current(format!(
                "expected '{}', got '{}'",
                expected,
                self.peek_kind()
            )))
        }
    }

    /// Expect an identifier token. Returns the name and span.
    pub(crate) fn expect_identifier(&mut self) -> Result<Ident, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                Ok(Ident::new(name, span))
            }
            other => Err(self.error_at_current(format!("expected identifier, got '{other}'"))),
        }
    }

    /// Consume an optional statement terminator.
    pub(crate) fn eat_semicolon(&mut self) {
        self.eat(&TokenKind::Semicolon);
    }

    /// Build an error at the current token.
    pub(crate) fn error_at_current(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.current_span())
    }
}
