//! Statement parsing.

use rill_lexer::token::TokenKind;
use rill_types::ast::*;
use rill_types::ParseError;
use std::rc::Rc;

use crate::parser::Parser;

impl Parser {
    /// Parse a single statement.
    pub(crate) fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek_kind() {
            TokenKind::Var => self.parse_var_statement(),
            TokenKind::Function => self.parse_function_declaration(),
            TokenKind::Return => self.parse_return(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Break => self.parse_break(),
            TokenKind::Continue => self.parse_continue(),
            TokenKind::Throw => self.parse_throw(),
            TokenKind::Try => self.parse_try(),
            TokenKind::LBrace => self.parse_block_statement(),
            TokenKind::Semicolon => {
                let span = self.advance().span;
                Ok(Stmt::new(StmtKind::Empty, span))
            }
            _ => self.parse_expression_statement(),
        }
    }

    /// `var a = 1, b;`
    fn parse_var_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance().span; // `var`
        let decls = self.parse_var_declarators()?;
        self.eat_semicolon();
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::Var(Rc::new(decls)), span))
    }

    /// The declarator list of a `var` statement (shared with `for` init).
    pub(crate) fn parse_var_declarators(&mut self) -> Result<Vec<VarDeclarator>, ParseError> {
        let mut decls = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            let init = if self.eat(&TokenKind::Assign) {
                Some(Rc::new(self.parse_assignment()?))
            } else {
                None
            };
            decls.push(VarDeclarator { name, init });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(decls)
    }

    /// `function name(params) { body }`
    fn parse_function_declaration(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current_span();
        let func = self.parse_function_expr(true)?;
        let name = Ident::new(
            func.name.clone().expect("declaration always has a name"),
            start,
        );
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::Function(name, Rc::new(func)), span))
    }

    /// Parse `function [name](params) { body }` starting at the `function`
    /// keyword. `require_name` distinguishes declarations from expressions.
    pub(crate) fn parse_function_expr(
        &mut self,
        require_name: bool,
    ) -> Result<FunctionExpr, ParseError> {
        let start = self.expect(&TokenKind::Function)?.span;
        let name = if let TokenKind::Identifier(_) = self.peek_kind() {
            Some(self.expect_identifier()?.name)
        } else if require_name {
            return Err(self.error_at_current("expected function name"));
        } else {
            None
        };

        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.expect_identifier()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;

        // Function bodies reset the loop context: a `break` inside a function
        // nested in a loop does not target the outer loop.
        let saved_depth = std::mem::take(&mut self.loop_depth);
        let body = self.parse_brace_block();
        self.loop_depth = saved_depth;
        let body = body?;

        let span = start.merge(self.previous_span());
        Ok(FunctionExpr {
            name,
            params,
            body,
            span,
        })
    }

    /// `return;` / `return expr;`
    fn parse_return(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance().span;
        let value = if self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RBrace)
            || self.at_end()
        {
            None
        } else {
            Some(Rc::new(self.parse_expression()?))
        };
        self.eat_semicolon();
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::Return(value), span))
    }

    /// `if (cond) cons [else alt]`
    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance().span;
        self.expect(&TokenKind::LParen)?;
        let cond = Rc::new(self.parse_expression()?);
        self.expect(&TokenKind::RParen)?;
        let cons = Rc::new(self.parse_statement()?);
        let alt = if self.eat(&TokenKind::Else) {
            Some(Rc::new(self.parse_statement()?))
        } else {
            None
        };
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::If { cond, cons, alt }, span))
    }

    /// `while (cond) body`
    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance().span;
        self.expect(&TokenKind::LParen)?;
        let cond = Rc::new(self.parse_expression()?);
        self.expect(&TokenKind::RParen)?;
        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        let body = Rc::new(body?);
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::While { cond, body }, span))
    }

    /// `for (init; cond; update) body` — each clause may be empty.
    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance().span;
        self.expect(&TokenKind::LParen)?;

        let init = if self.eat(&TokenKind::Semicolon) {
            None
        } else if self.eat(&TokenKind::Var) {
            let decls = self.parse_var_declarators()?;
            self.expect(&TokenKind::Semicolon)?;
            Some(ForInit::Var(Rc::new(decls)))
        } else {
            let expr = Rc::new(self.parse_expression()?);
            self.expect(&TokenKind::Semicolon)?;
            Some(ForInit::Expr(expr))
        };

        let cond = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(Rc::new(self.parse_expression()?))
        };
        self.expect(&TokenKind::Semicolon)?;

        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(Rc::new(self.parse_expression()?))
        };
        self.expect(&TokenKind::RParen)?;

        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        let body = Rc::new(body?);

        let span = start.merge(self.previous_span());
        Ok(Stmt::new(
            StmtKind::For {
                init,
                cond,
                update,
                body,
            },
            span,
        ))
    }

    fn parse_break(&mut self) -> Result<Stmt, ParseError> {
        if self.loop_depth == 0 {
            return Err(self.error_at_current("'break' outside of a loop"));
        }
        let span = self.advance().span;
        self.eat_semicolon();
        Ok(Stmt::new(StmtKind::Break, span))
    }

    fn parse_continue(&mut self) -> Result<Stmt, ParseError> {
        if self.loop_depth == 0 {
            return Err(self.error_at_current("'continue' outside of a loop"));
        }
        let span = self.advance().span;
        self.eat_semicolon();
        Ok(Stmt::new(StmtKind::Continue, span))
    }

    /// `throw expr;`
    fn parse_throw(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance().span;
        let value = Rc::new(self.parse_expression()?);
        self.eat_semicolon();
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::Throw(value), span))
    }

    /// `try { block } catch (param) { handler }`
    fn parse_try(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance().span;
        let block = self.parse_brace_block()?;
        self.expect(&TokenKind::Catch)?;
        self.expect(&TokenKind::LParen)?;
        let param = self.expect_identifier()?;
        self.expect(&TokenKind::RParen)?;
        let handler = self.parse_brace_block()?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(
            StmtKind::Try {
                block,
                param,
                handler,
            },
            span,
        ))
    }

    fn parse_block_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current_span();
        let body = self.parse_brace_block()?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::Block(body), span))
    }

    /// A `{ stmt* }` statement list.
    pub(crate) fn parse_brace_block(&mut self) -> Result<BlockRef, ParseError> {
        self.expect(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.at_end() {
                return Err(self.error_at_current("unclosed block, expected '}'"));
            }
            body.push(Rc::new(self.parse_statement()?));
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Rc::new(body))
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current_span();
        let expr = Rc::new(self.parse_expression()?);
        self.eat_semicolon();
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::Expr(expr), span))
    }
}
