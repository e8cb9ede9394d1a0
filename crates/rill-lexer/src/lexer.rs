//! Core Rill lexer — converts source text to a token stream.
//!
//! Features:
//! - All guest-language tokens (keywords, operators, punctuation, literals)
//! - Single- and double-quoted strings with escapes
//! - `//` line comments and `/* */` block comments stripped
//! - Fail-fast: the first malformed lexeme aborts with a [`ParseError`]

use rill_types::{ParseError, SourceFile, Span};

use crate::token::{Token, TokenKind};

/// The Rill lexer.
///
/// Converts source text into a vector of [`Token`]s ending with
/// [`TokenKind::Eof`].
pub struct Lexer<'src> {
    /// The full source text as bytes.
    source: &'src [u8],
    /// Current byte offset into `source`.
    pos: usize,
    /// Current line number (1-based).
    line: u32,
    /// Current column number (1-based).
    col: u32,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source file.
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            source: source_file.source.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Lex the entire source into a token stream.
    pub fn lex(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.scan_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn here(&self) -> (u32, u32) {
        (self.line, self.col)
    }

    fn span_from(&self, start: (u32, u32)) -> Span {
        Span::new(start.0, start.1, self.line, self.col.saturating_sub(1).max(1))
    }

    fn error(&self, message: impl Into<String>, start: (u32, u32)) -> ParseError {
        ParseError::new(message, self.span_from(start))
    }

    // ─────────────────────────────────────────────────────────────
    // Whitespace & comments
    // ─────────────────────────────────────────────────────────────

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => {
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(ch) = self.peek() {
                        if ch == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.here();
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => {
                                self.advance();
                            }
                            None => {
                                return Err(self.error("unterminated block comment", start));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Token scanning
    // ─────────────────────────────────────────────────────────────

    fn scan_token(&mut self) -> Result<Token, ParseError> {
        self.skip_trivia()?;
        let start = self.here();
        if self.at_end() {
            return Ok(Token::new(TokenKind::Eof, Span::point(self.line, self.col)));
        }

        let ch = self.peek().unwrap_or(0);
        if ch.is_ascii_digit() {
            return self.scan_number(start);
        }
        if ch == b'"' || ch == b'\'' {
            return self.scan_string(start);
        }
        if ch.is_ascii_alphabetic() || ch == b'_' || ch == b'$' {
            return Ok(self.scan_word(start));
        }
        self.scan_operator(start)
    }

    fn scan_number(&mut self, start: (u32, u32)) -> Result<Token, ParseError> {
        let begin = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        let text = std::str::from_utf8(&self.source[begin..self.pos])
            .map_err(|_| self.error("invalid number literal", start))?;
        let value: f64 = text
            .parse()
            .map_err(|_| self.error(format!("invalid number literal '{text}'"), start))?;
        Ok(Token::new(TokenKind::Number(value), self.span_from(start)))
    }

    fn scan_string(&mut self, start: (u32, u32)) -> Result<Token, ParseError> {
        let quote = self.advance().unwrap_or(b'"');
        // Accumulate raw bytes and decode once: the terminator checks below
        // only match ASCII, so a multi-byte UTF-8 sequence is never split.
        let mut bytes = Vec::new();
        loop {
            match self.advance() {
                None => return Err(self.error("unterminated string literal", start)),
                Some(c) if c == quote => break,
                Some(b'\\') => match self.advance() {
                    Some(b'n') => bytes.push(b'\n'),
                    Some(b't') => bytes.push(b'\t'),
                    Some(b'r') => bytes.push(b'\r'),
                    Some(b'\\') => bytes.push(b'\\'),
                    Some(b'0') => bytes.push(b'\0'),
                    Some(b'\'') => bytes.push(b'\''),
                    Some(b'"') => bytes.push(b'"'),
                    Some(other) => bytes.push(other),
                    None => return Err(self.error("unterminated string literal", start)),
                },
                Some(b'\n') => return Err(self.error("unterminated string literal", start)),
                Some(c) => bytes.push(c),
            }
        }
        let value = String::from_utf8(bytes)
            .map_err(|_| self.error("invalid UTF-8 in string literal", start))?;
        Ok(Token::new(TokenKind::String(value), self.span_from(start)))
    }

    fn scan_word(&mut self, start: (u32, u32)) -> Token {
        let begin = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_' || c == b'$')
        {
            self.advance();
        }
        let word = std::str::from_utf8(&self.source[begin..self.pos]).unwrap_or("");
        let kind = TokenKind::keyword(word)
            .unwrap_or_else(|| TokenKind::Identifier(word.to_string()));
        Token::new(kind, self.span_from(start))
    }

    fn scan_operator(&mut self, start: (u32, u32)) -> Result<Token, ParseError> {
        let ch = self.advance().unwrap_or(0);
        let next = self.peek();
        let kind = match ch {
            b'+' => match next {
                Some(b'+') => {
                    self.advance();
                    TokenKind::PlusPlus
                }
                Some(b'=') => {
                    self.advance();
                    TokenKind::PlusAssign
                }
                _ => TokenKind::Plus,
            },
            b'-' => match next {
                Some(b'-') => {
                    self.advance();
                    TokenKind::MinusMinus
                }
                Some(b'=') => {
                    self.advance();
                    TokenKind::MinusAssign
                }
                _ => TokenKind::Minus,
            },
            b'*' => match next {
                Some(b'=') => {
                    self.advance();
                    TokenKind::StarAssign
                }
                _ => TokenKind::Star,
            },
            b'/' => match next {
                Some(b'=') => {
                    self.advance();
                    TokenKind::SlashAssign
                }
                _ => TokenKind::Slash,
            },
            b'%' => match next {
                Some(b'=') => {
                    self.advance();
                    TokenKind::PercentAssign
                }
                _ => TokenKind::Percent,
            },
            b'=' => match next {
                Some(b'=') => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        TokenKind::EqEqEq
                    } else {
                        TokenKind::EqEq
                    }
                }
                _ => TokenKind::Assign,
            },
            b'!' => match next {
                Some(b'=') => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        TokenKind::BangEqEq
                    } else {
                        TokenKind::BangEq
                    }
                }
                _ => TokenKind::Bang,
            },
            b'<' => match next {
                Some(b'=') => {
                    self.advance();
                    TokenKind::LessEq
                }
                Some(b'<') => {
                    self.advance();
                    TokenKind::ShiftLeft
                }
                _ => TokenKind::Less,
            },
            b'>' => match next {
                Some(b'=') => {
                    self.advance();
                    TokenKind::GreaterEq
                }
                Some(b'>') => {
                    self.advance();
                    if self.peek() == Some(b'>') {
                        self.advance();
                        TokenKind::ShiftRightZeroFill
                    } else {
                        TokenKind::ShiftRight
                    }
                }
                _ => TokenKind::Greater,
            },
            b'&' => match next {
                Some(b'&') => {
                    self.advance();
                    TokenKind::AmpAmp
                }
                _ => TokenKind::Amp,
            },
            b'|' => match next {
                Some(b'|') => {
                    self.advance();
                    TokenKind::PipePipe
                }
                _ => TokenKind::Pipe,
            },
            b'^' => TokenKind::Caret,
            b'~' => TokenKind::Tilde,
            b'?' => TokenKind::Question,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,
            b':' => TokenKind::Colon,
            b';' => TokenKind::Semicolon,
            other => {
                return Err(self.error(
                    format!("unexpected character '{}'", other as char),
                    start,
                ));
            }
        };
        Ok(Token::new(kind, self.span_from(start)))
    }
}
