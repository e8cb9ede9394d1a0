//! Expression parsing with full operator precedence.
//!
//! Precedence (lowest → highest):
//! 12. assignment `=`, `+=`, `-=`, `*=`, `/=`, `%=` (right-assoc)
//! 11. conditional `?:`
//! 10. `||`
//!  9. `&&`
//!  8. `|`
//!  7. `^`
//!  6. `&`
//!  5. `==`, `!=`, `===`, `!==`
//!  4. `<`, `>`, `<=`, `>=`
//!  3. `<<`, `>>`, `>>>`
//!  2. `+`, `-` / `*`, `/`, `%`
//!  1. unary `- + ! ~ typeof ++ --`, postfix `++ --`
//!  0. `new`, call `()`, member `.` `[]`

use rill_lexer::token::TokenKind;
use rill_types::ast::*;
use rill_types::ParseError;
use std::rc::Rc;

use crate::parser::Parser;

impl Parser {
    /// Parse an expression.
    pub(crate) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_assignment()
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Assignment & conditional
    // ══════════════════════════════════════════════════════════════════════════

    /// `AssignExpr = ConditionalExpr [ AssignOp AssignExpr ]`
    pub(crate) fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_conditional()?;

        let op = match self.peek_kind() {
            TokenKind::Assign => None,
            TokenKind::PlusAssign => Some(BinOp::Add),
            TokenKind::MinusAssign => Some(BinOp::Sub),
            TokenKind::StarAssign => Some(BinOp::Mul),
            TokenKind::SlashAssign => Some(BinOp::Div),
            TokenKind::PercentAssign => Some(BinOp::Mod),
            _ => return Ok(left),
        };
        if !matches!(
            left.kind,
            ExprKind::Identifier(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
        ) {
            return Err(self.error_at_current("invalid assignment target"));
        }
        self.advance(); // the assignment operator
        let value = self.parse_assignment()?;
        let span = left.span.merge(value.span);
        Ok(Expr::new(
            ExprKind::Assign {
                op,
                target: Rc::new(left),
                value: Rc::new(value),
            },
            span,
        ))
    }

    /// `ConditionalExpr = OrExpr [ "?" AssignExpr ":" AssignExpr ]`
    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_or()?;
        if !self.eat(&TokenKind::Question) {
            return Ok(cond);
        }
        let cons = self.parse_assignment()?;
        self.expect(&TokenKind::Colon)?;
        let alt = self.parse_assignment()?;
        let span = cond.span.merge(alt.span);
        Ok(Expr::new(
            ExprKind::Conditional {
                cond: Rc::new(cond),
                cons: Rc::new(cons),
                alt: Rc::new(alt),
            },
            span,
        ))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Binary precedence chain
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::PipePipe) {
            let right = self.parse_and()?;
            left = logical(left, LogicalOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_bit_or()?;
        while self.eat(&TokenKind::AmpAmp) {
            let right = self.parse_bit_or()?;
            left = logical(left, LogicalOp::And, right);
        }
        Ok(left)
    }

    fn parse_bit_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_bit_xor()?;
        while self.eat(&TokenKind::Pipe) {
            let right = self.parse_bit_xor()?;
            left = binary(left, BinOp::BitOr, right);
        }
        Ok(left)
    }

    fn parse_bit_xor(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_bit_and()?;
        while self.eat(&TokenKind::Caret) {
            let right = self.parse_bit_and()?;
            left = binary(left, BinOp::BitXor, right);
        }
        Ok(left)
    }

    fn parse_bit_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while self.eat(&TokenKind::Amp) {
            let right = self.parse_equality()?;
            left = binary(left, BinOp::BitAnd, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinOp::LooseEq,
                TokenKind::BangEq => BinOp::LooseNotEq,
                TokenKind::EqEqEq => BinOp::StrictEq,
                TokenKind::BangEqEq => BinOp::StrictNotEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_shift()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Less => BinOp::Less,
                TokenKind::Greater => BinOp::Greater,
                TokenKind::LessEq => BinOp::LessEq,
                TokenKind::GreaterEq => BinOp::GreaterEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_shift()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::ShiftLeft => BinOp::ShiftLeft,
                TokenKind::ShiftRight => BinOp::ShiftRight,
                TokenKind::ShiftRightZeroFill => BinOp::ShiftRightZeroFill,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Unary, postfix, call/member
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek_kind() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Typeof => Some(UnaryOp::Typeof),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.advance().span;
            let operand = self.parse_unary()?;
            let span = start.merge(operand.span);
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Rc::new(operand),
                },
                span,
            ));
        }

        let update = match self.peek_kind() {
            TokenKind::PlusPlus => Some(UpdateOp::Increment),
            TokenKind::MinusMinus => Some(UpdateOp::Decrement),
            _ => None,
        };
        if let Some(op) = update {
            let start = self.advance().span;
            let target = self.parse_unary()?;
            self.check_update_target(&target)?;
            let span = start.merge(target.span);
            return Ok(Expr::new(
                ExprKind::Update {
                    op,
                    prefix: true,
                    target: Rc::new(target),
                },
                span,
            ));
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_call_member()?;
        let op = match self.peek_kind() {
            TokenKind::PlusPlus => UpdateOp::Increment,
            TokenKind::MinusMinus => UpdateOp::Decrement,
            _ => return Ok(expr),
        };
        self.check_update_target(&expr)?;
        let end = self.advance().span;
        let span = expr.span.merge(end);
        Ok(Expr::new(
            ExprKind::Update {
                op,
                prefix: false,
                target: Rc::new(expr),
            },
            span,
        ))
    }

    fn check_update_target(&self, target: &Expr) -> Result<(), ParseError> {
        if matches!(
            target.kind,
            ExprKind::Identifier(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
        ) {
            Ok(())
        } else {
            Err(self.error_at_current("invalid increment/decrement target"))
        }
    }

    /// Calls, `new`, and member access, left to right.
    fn parse_call_member(&mut self) -> Result<Expr, ParseError> {
        let mut expr = if self.check(&TokenKind::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };

        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.expect_identifier()?;
                    let span = expr.span.merge(property.span);
                    expr = Expr::new(
                        ExprKind::Member {
                            object: Rc::new(expr),
                            property: property.name,
                        },
                        span,
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&TokenKind::RBracket)?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Index {
                            object: Rc::new(expr),
                            index: Rc::new(index),
                        },
                        span,
                    );
                }
                TokenKind::LParen => {
                    let args = self.parse_arguments()?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Rc::new(expr),
                            args,
                        },
                        span,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// `new Callee(args)` — the callee is a primary plus member accesses,
    /// so `new a.b.C(1)` constructs `a.b.C`.
    fn parse_new(&mut self) -> Result<Expr, ParseError> {
        let start = self.expect(&TokenKind::New)?.span;
        let mut callee = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.expect_identifier()?;
                    let span = callee.span.merge(property.span);
                    callee = Expr::new(
                        ExprKind::Member {
                            object: Rc::new(callee),
                            property: property.name,
                        },
                        span,
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&TokenKind::RBracket)?;
                    let span = callee.span.merge(self.previous_span());
                    callee = Expr::new(
                        ExprKind::Index {
                            object: Rc::new(callee),
                            index: Rc::new(index),
                        },
                        span,
                    );
                }
                _ => break,
            }
        }
        let args = if self.check(&TokenKind::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        let span = start.merge(self.previous_span());
        Ok(Expr::new(
            ExprKind::New {
                callee: Rc::new(callee),
                args,
            },
            span,
        ))
    }

    /// `( arg, arg, … )`
    fn parse_arguments(&mut self) -> Result<Vec<ExprRef>, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(Rc::new(self.parse_assignment()?));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Primary expressions
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.current_span();
        match self.peek_kind().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::new(ExprKind::Number(n), span))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::new(ExprKind::String(s), span))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::new(ExprKind::Boolean(true), span))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::new(ExprKind::Boolean(false), span))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::new(ExprKind::Null, span))
            }
            TokenKind::This => {
                self.advance();
                Ok(Expr::new(ExprKind::This, span))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::new(ExprKind::Identifier(name), span))
            }
            TokenKind::Function => {
                let func = self.parse_function_expr(false)?;
                let span = func.span;
                Ok(Expr::new(ExprKind::Function(Rc::new(func)), span))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_object_literal(),
            other => Err(self.error_at_current(format!("unexpected token '{other}'"))),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expr, ParseError> {
        let start = self.expect(&TokenKind::LBracket)?.span;
        let mut elements = Vec::new();
        if !self.check(&TokenKind::RBracket) {
            loop {
                elements.push(Rc::new(self.parse_assignment()?));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
                // Trailing comma
                if self.check(&TokenKind::RBracket) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBracket)?;
        let span = start.merge(self.previous_span());
        Ok(Expr::new(ExprKind::Array(elements), span))
    }

    fn parse_object_literal(&mut self) -> Result<Expr, ParseError> {
        let start = self.expect(&TokenKind::LBrace)?.span;
        let mut entries = Vec::new();
        if !self.check(&TokenKind::RBrace) {
            loop {
                let key = self.parse_property_key()?;
                self.expect(&TokenKind::Colon)?;
                let value = Rc::new(self.parse_assignment()?);
                entries.push(ObjectEntry { key, value });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
                if self.check(&TokenKind::RBrace) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBrace)?;
        let span = start.merge(self.previous_span());
        Ok(Expr::new(ExprKind::Object(entries), span))
    }

    /// Identifier, string, or number keys, normalized to a property name.
    fn parse_property_key(&mut self) -> Result<String, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(s)
            }
            TokenKind::Number(n) => {
                self.advance();
                if n.fract() == 0.0 && n.is_finite() {
                    Ok(format!("{}", n as i64))
                } else {
                    Ok(format!("{n}"))
                }
            }
            other => Err(self.error_at_current(format!(
                "expected property name, got '{other}'"
            ))),
        }
    }
}

fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
    let span = left.span.merge(right.span);
    Expr::new(
        ExprKind::Binary {
            op,
            left: Rc::new(left),
            right: Rc::new(right),
        },
        span,
    )
}

fn logical(left: Expr, op: LogicalOp, right: Expr) -> Expr {
    let span = left.span.merge(right.span);
    Expr::new(
        ExprKind::Logical {
            op,
            left: Rc::new(left),
            right: Rc::new(right),
        },
        span,
    )
}
