pub mod ast;
pub mod clause;

use crate::diagnostics::CompileError;
use crate::lexer::{self, token::Token};
use crate::span::{Span, Spanned};
use ast::*;

/// Which extensions the expression grammar accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseMode {
    /// Boolean clauses: `old(E)` and `result` are recognised.
    Condition,
    /// Effect target lists: additionally `...E`.
    Effect,
}

pub struct Parser<'a> {
    tokens: &'a [Spanned<Token>],
    source: &'a str,
    pos: usize,
    next_decl: u32,
    next_site: u32,
    clause_mode: Option<ClauseMode>,
}

/// Lex and parse a whole compilation unit.
pub fn parse_source(source: &str) -> Result<CompilationUnit, CompileError> {
    let tokens = lexer::lex(source)?;
    let mut parser = Parser::new(&tokens, source);
    parser.parse_unit()
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Spanned<Token>], source: &'a str) -> Self {
        Self { tokens, source, pos: 0, next_decl: 0, next_site: 0, clause_mode: None }
    }

    /// A parser over clause text. Call-site ids continue from `first_site` so
    /// they never collide with ids in host bodies.
    pub fn for_clause(
        tokens: &'a [Spanned<Token>],
        source: &'a str,
        mode: ClauseMode,
        first_site: u32,
    ) -> Self {
        Self { tokens, source, pos: 0, next_decl: 0, next_site: first_site, clause_mode: Some(mode) }
    }

    pub fn next_site(&self) -> u32 {
        self.next_site
    }

    fn peek_nth(&self, n: usize) -> Option<&Spanned<Token>> {
        // Stray doc comments (inside bodies, before `}`) carry no meaning
        self.tokens[self.pos.min(self.tokens.len())..]
            .iter()
            .filter(|t| !matches!(t.node, Token::BlockComment(_)))
            .nth(n)
    }

    fn peek(&self) -> Option<&Spanned<Token>> {
        self.peek_nth(0)
    }

    fn peek_is(&self, expected: &Token) -> bool {
        self.peek_nth_is(0, expected)
    }

    fn peek_nth_is(&self, n: usize, expected: &Token) -> bool {
        self.peek_nth(n)
            .is_some_and(|t| std::mem::discriminant(&t.node) == std::mem::discriminant(expected))
    }

    fn skip_docs(&mut self) {
        while self.pos < self.tokens.len() && matches!(self.tokens[self.pos].node, Token::BlockComment(_)) {
            self.pos += 1;
        }
    }

    fn advance(&mut self) -> Option<&Spanned<Token>> {
        self.skip_docs();
        if self.pos < self.tokens.len() {
            let tok = &self.tokens[self.pos];
            self.pos += 1;
            Some(tok)
        } else {
            None
        }
    }

    /// Consume the next token if it matches.
    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek_is(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume doc comments directly ahead; the last one documents what follows.
    fn take_doc(&mut self) -> Option<DocComment> {
        let tokens = self.tokens;
        let mut doc = None;
        while let Some(tok) = tokens.get(self.pos) {
            match tok.node {
                Token::BlockComment(true) => {
                    doc = Some(DocComment { text: self.text(tok.span).to_string(), span: tok.span });
                    self.pos += 1;
                }
                Token::BlockComment(false) => self.pos += 1,
                _ => break,
            }
        }
        doc
    }

    fn expect(&mut self, expected: &Token) -> Result<Span, CompileError> {
        self.skip_docs();
        let tokens = self.tokens;
        match tokens.get(self.pos) {
            Some(tok) if std::mem::discriminant(&tok.node) == std::mem::discriminant(expected) => {
                self.pos += 1;
                Ok(tok.span)
            }
            Some(tok) => Err(CompileError::syntax(
                format!("expected {expected}, found {}", tok.node),
                tok.span,
            )),
            None => Err(CompileError::syntax(
                format!("expected {expected}, found end of file"),
                self.eof_span(),
            )),
        }
    }

    fn expect_ident(&mut self) -> Result<Spanned<String>, CompileError> {
        self.skip_docs();
        let tokens = self.tokens;
        match tokens.get(self.pos) {
            Some(tok) if matches!(tok.node, Token::Ident) => {
                let name = self.text(tok.span).to_string();
                self.pos += 1;
                Ok(Spanned::new(name, tok.span))
            }
            Some(tok) => Err(CompileError::syntax(
                format!("expected identifier, found {}", tok.node),
                tok.span,
            )),
            None => Err(CompileError::syntax(
                "expected identifier, found end of file",
                self.eof_span(),
            )),
        }
    }

    fn text(&self, span: Span) -> &'a str {
        &self.source[span.start..span.end]
    }

    fn eof_span(&self) -> Span {
        if let Some(last) = self.tokens.last() {
            Span::new(last.span.end, last.span.end)
        } else {
            Span::dummy()
        }
    }

    fn current_start(&self) -> usize {
        self.peek().map(|t| t.span.start).unwrap_or_else(|| self.eof_span().start)
    }

    fn fresh_decl(&mut self) -> DeclId {
        let id = DeclId(self.next_decl);
        self.next_decl += 1;
        id
    }

    fn fresh_site(&mut self) -> CallSiteId {
        let id = CallSiteId(self.next_site);
        self.next_site += 1;
        id
    }

    pub fn is_at_end(&self) -> bool {
        self.peek().is_none()
    }

    pub fn parse_unit(&mut self) -> Result<CompilationUnit, CompileError> {
        let mut types = Vec::new();
        loop {
            let doc = self.take_doc();
            let Some(tok) = self.peek() else { break };
            match tok.node {
                Token::Class => types.push(self.parse_class(doc)?),
                Token::Interface => types.push(self.parse_interface(doc)?),
                _ => {
                    return Err(CompileError::syntax(
                        format!("expected class or interface, found {}", tok.node),
                        tok.span,
                    ));
                }
            }
        }
        Ok(CompilationUnit { types, decl_count: self.next_decl, site_count: self.next_site })
    }

    fn parse_class(&mut self, doc: Option<DocComment>) -> Result<Spanned<TypeDecl>, CompileError> {
        let start = self.expect(&Token::Class)?.start;
        let id = self.fresh_decl();
        let name = self.expect_ident()?;

        let superclass = if self.eat(&Token::Extends) { Some(self.expect_ident()?) } else { None };
        let mut interfaces = Vec::new();
        if self.eat(&Token::Implements) {
            loop {
                interfaces.push(self.expect_ident()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }

        self.expect(&Token::LBrace)?;
        let mut members = Vec::new();
        loop {
            let doc = self.take_doc();
            if self.peek_is(&Token::RBrace) || self.is_at_end() {
                break;
            }
            members.push(self.parse_member(&name.node, doc)?);
        }
        let end = self.expect(&Token::RBrace)?.end;

        Ok(Spanned::new(
            TypeDecl { id, kind: TypeKind::Class, name, superclass, interfaces, doc, members },
            Span::new(start, end),
        ))
    }

    fn parse_interface(&mut self, doc: Option<DocComment>) -> Result<Spanned<TypeDecl>, CompileError> {
        let start = self.expect(&Token::Interface)?.start;
        let id = self.fresh_decl();
        let name = self.expect_ident()?;

        let mut interfaces = Vec::new();
        if self.eat(&Token::Extends) {
            loop {
                interfaces.push(self.expect_ident()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }

        self.expect(&Token::LBrace)?;
        let mut members = Vec::new();
        loop {
            let doc = self.take_doc();
            if self.peek_is(&Token::RBrace) || self.is_at_end() {
                break;
            }
            let member = self.parse_member(&name.node, doc)?;
            match &member {
                Member::Method(m) if m.node.body.is_none() && !m.node.is_static => members.push(member),
                other => {
                    return Err(CompileError::syntax(
                        "interfaces may only declare instance method signatures",
                        other.span(),
                    ));
                }
            }
        }
        let end = self.expect(&Token::RBrace)?.end;

        Ok(Spanned::new(
            TypeDecl { id, kind: TypeKind::Interface, name, superclass: None, interfaces, doc, members },
            Span::new(start, end),
        ))
    }

    fn parse_member(&mut self, class_name: &str, doc: Option<DocComment>) -> Result<Member, CompileError> {
        let start = self.current_start();
        let id = self.fresh_decl();

        if self.peek_is(&Token::LBrace) {
            let body = self.parse_block()?;
            let span = Span::new(start, body.span.end);
            return Ok(Member::Initializer(Spanned::new(InitBlock { id, doc, body }, span)));
        }

        let is_static = self.eat(&Token::Static);

        let is_ctor = !is_static
            && self.peek_nth_is(1, &Token::LParen)
            && self.peek().is_some_and(|t| matches!(t.node, Token::Ident) && self.text(t.span) == class_name);
        if is_ctor {
            let name = self.expect_ident()?;
            let params = self.parse_params()?;
            let body = self.parse_block()?;
            let span = Span::new(start, body.span.end);
            return Ok(Member::Constructor(Spanned::new(
                MethodDecl {
                    id,
                    doc,
                    is_static: false,
                    is_constructor: true,
                    return_type: None,
                    name,
                    params,
                    body: Some(body),
                },
                span,
            )));
        }

        let return_type = if self.eat(&Token::Void) { None } else { Some(self.parse_type()?) };
        let name = self.expect_ident()?;

        if self.peek_is(&Token::LParen) {
            let params = self.parse_params()?;
            let (body, end) = if self.peek_is(&Token::Semi) {
                (None, self.expect(&Token::Semi)?.end)
            } else {
                let body = self.parse_block()?;
                let end = body.span.end;
                (Some(body), end)
            };
            return Ok(Member::Method(Spanned::new(
                MethodDecl { id, doc, is_static, is_constructor: false, return_type, name, params, body },
                Span::new(start, end),
            )));
        }

        let Some(ty) = return_type else {
            return Err(CompileError::syntax("fields cannot have type void", name.span));
        };
        let init = if self.eat(&Token::Eq) { Some(self.parse_expr(0)?) } else { None };
        let end = self.expect(&Token::Semi)?.end;
        Ok(Member::Field(Spanned::new(
            FieldDecl { id, doc, is_static, ty, name, init },
            Span::new(start, end),
        )))
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, CompileError> {
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        while !self.peek_is(&Token::RParen) && !self.is_at_end() {
            if !params.is_empty() {
                self.expect(&Token::Comma)?;
            }
            let ty = self.parse_type()?;
            let name = self.expect_ident()?;
            params.push(Param { name, ty });
        }
        self.expect(&Token::RParen)?;
        Ok(params)
    }

    fn parse_type(&mut self) -> Result<Spanned<TypeExpr>, CompileError> {
        self.skip_docs();
        let tokens = self.tokens;
        let Some(tok) = tokens.get(self.pos) else {
            return Err(CompileError::syntax("expected type, found end of file", self.eof_span()));
        };
        let span = tok.span;
        let base = match tok.node {
            Token::Int => TypeExpr::Int,
            Token::Boolean => TypeExpr::Boolean,
            Token::Ident => TypeExpr::Named(self.text(span).to_string()),
            ref other => {
                return Err(CompileError::syntax(format!("expected type, found {other}"), span));
            }
        };
        self.pos += 1;

        let mut ty = Spanned::new(base, span);
        while self.peek_is(&Token::LBracket) && self.peek_nth_is(1, &Token::RBracket) {
            self.advance();
            let end = self.expect(&Token::RBracket)?.end;
            let span = Span::new(ty.span.start, end);
            ty = Spanned::new(TypeExpr::Array(Box::new(ty)), span);
        }
        Ok(ty)
    }

    fn parse_block(&mut self) -> Result<Spanned<Block>, CompileError> {
        let start = self.expect(&Token::LBrace)?.start;
        let mut stmts = Vec::new();
        while !self.peek_is(&Token::RBrace) && !self.is_at_end() {
            stmts.push(self.parse_stmt()?);
        }
        let end = self.expect(&Token::RBrace)?.end;
        Ok(Spanned::new(Block { stmts }, Span::new(start, end)))
    }

    fn is_local_decl_ahead(&self) -> bool {
        match self.peek().map(|t| &t.node) {
            Some(Token::Int) | Some(Token::Boolean) => true,
            Some(Token::Ident) => {
                self.peek_nth_is(1, &Token::Ident)
                    || (self.peek_nth_is(1, &Token::LBracket) && self.peek_nth_is(2, &Token::RBracket))
            }
            _ => false,
        }
    }

    fn parse_stmt(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let start = self.current_start();
        let Some(tok) = self.peek() else {
            return Err(CompileError::syntax("unexpected end of file in statement", self.eof_span()));
        };

        match tok.node {
            Token::LBrace => {
                let block = self.parse_block()?;
                let span = block.span;
                Ok(Spanned::new(Stmt::Block(block), span))
            }
            Token::If => self.parse_if_stmt(),
            Token::While => self.parse_while_stmt(),
            Token::Return => self.parse_return_stmt(),
            Token::Try => self.parse_try_stmt(),
            Token::Throw => {
                self.advance();
                let value = self.parse_expr(0)?;
                let end = self.expect(&Token::Semi)?.end;
                Ok(Spanned::new(Stmt::Throw(value), Span::new(start, end)))
            }
            Token::Super => {
                self.advance();
                let site = self.fresh_site();
                let (args, _) = self.parse_args()?;
                let end = self.expect(&Token::Semi)?.end;
                Ok(Spanned::new(Stmt::SuperCall { site, args }, Span::new(start, end)))
            }
            _ if self.is_local_decl_ahead() => {
                let ty = self.parse_type()?;
                let name = self.expect_ident()?;
                let value = if self.eat(&Token::Eq) { Some(self.parse_expr(0)?) } else { None };
                let end = self.expect(&Token::Semi)?.end;
                Ok(Spanned::new(Stmt::Local { ty, name, value }, Span::new(start, end)))
            }
            _ => {
                let expr = self.parse_expr(0)?;
                if self.eat(&Token::Eq) {
                    if !matches!(expr.node, Expr::Ident(_) | Expr::FieldAccess { .. } | Expr::Index { .. }) {
                        return Err(CompileError::syntax("invalid assignment target", expr.span));
                    }
                    let value = self.parse_expr(0)?;
                    let end = self.expect(&Token::Semi)?.end;
                    return Ok(Spanned::new(Stmt::Assign { target: expr, value }, Span::new(start, end)));
                }
                let end = self.expect(&Token::Semi)?.end;
                Ok(Spanned::new(Stmt::Expr(expr), Span::new(start, end)))
            }
        }
    }

    fn parse_if_stmt(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let start = self.expect(&Token::If)?.start;
        self.expect(&Token::LParen)?;
        let condition = self.parse_expr(0)?;
        self.expect(&Token::RParen)?;
        let then_branch = Box::new(self.parse_stmt()?);
        let mut end = then_branch.span.end;
        let else_branch = if self.eat(&Token::Else) {
            let stmt = self.parse_stmt()?;
            end = stmt.span.end;
            Some(Box::new(stmt))
        } else {
            None
        };
        Ok(Spanned::new(Stmt::If { condition, then_branch, else_branch }, Span::new(start, end)))
    }

    fn parse_while_stmt(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let start = self.expect(&Token::While)?.start;
        self.expect(&Token::LParen)?;
        let condition = self.parse_expr(0)?;
        self.expect(&Token::RParen)?;
        let body = Box::new(self.parse_stmt()?);
        let end = body.span.end;
        Ok(Spanned::new(Stmt::While { condition, body }, Span::new(start, end)))
    }

    fn parse_return_stmt(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let start = self.expect(&Token::Return)?.start;
        let value = if self.peek_is(&Token::Semi) { None } else { Some(self.parse_expr(0)?) };
        let end = self.expect(&Token::Semi)?.end;
        Ok(Spanned::new(Stmt::Return(value), Span::new(start, end)))
    }

    fn parse_try_stmt(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let start = self.expect(&Token::Try)?.start;
        let body = self.parse_block()?;
        let mut end = body.span.end;

        let mut catches = Vec::new();
        while self.eat(&Token::Catch) {
            self.expect(&Token::LParen)?;
            let class = self.expect_ident()?;
            let var = self.expect_ident()?;
            self.expect(&Token::RParen)?;
            let body = self.parse_block()?;
            end = body.span.end;
            catches.push(CatchClause { class, var, body });
        }

        let finally = if self.eat(&Token::Finally) {
            let block = self.parse_block()?;
            end = block.span.end;
            Some(block)
        } else {
            None
        };

        if catches.is_empty() && finally.is_none() {
            return Err(CompileError::syntax(
                "try requires at least one catch or a finally block",
                Span::new(start, end),
            ));
        }
        Ok(Spanned::new(Stmt::Try { body, catches, finally }, Span::new(start, end)))
    }

    /// `( expr, ... )`, returning the arguments and the span end of `)`.
    fn parse_args(&mut self) -> Result<(Vec<Spanned<Expr>>, usize), CompileError> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        while !self.peek_is(&Token::RParen) && !self.is_at_end() {
            if !args.is_empty() {
                self.expect(&Token::Comma)?;
            }
            args.push(self.parse_expr(0)?);
        }
        let end = self.expect(&Token::RParen)?.end;
        Ok((args, end))
    }

    pub fn parse_expr(&mut self, min_bp: u8) -> Result<Spanned<Expr>, CompileError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let Some(tok) = self.peek() else { break };

            // Postfix forms bind tighter than every operator
            if matches!(tok.node, Token::Dot) {
                self.advance();
                let member = self.expect_ident()?;
                if self.peek_is(&Token::LParen) {
                    let site = self.fresh_site();
                    let (args, end) = self.parse_args()?;
                    let span = Span::new(lhs.span.start, end);
                    lhs = Spanned::new(
                        Expr::MethodCall { site, object: Box::new(lhs), method: member, args },
                        span,
                    );
                } else {
                    let span = Span::new(lhs.span.start, member.span.end);
                    lhs = Spanned::new(Expr::FieldAccess { object: Box::new(lhs), field: member }, span);
                }
                continue;
            }
            if matches!(tok.node, Token::LBracket) {
                self.advance();
                let index = self.parse_expr(0)?;
                let end = self.expect(&Token::RBracket)?.end;
                let span = Span::new(lhs.span.start, end);
                lhs = Spanned::new(Expr::Index { object: Box::new(lhs), index: Box::new(index) }, span);
                continue;
            }

            let op = match tok.node {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                Token::EqEq => BinOp::Eq,
                Token::BangEq => BinOp::Neq,
                Token::Lt => BinOp::Lt,
                Token::Gt => BinOp::Gt,
                Token::LtEq => BinOp::LtEq,
                Token::GtEq => BinOp::GtEq,
                Token::AmpAmp => BinOp::And,
                Token::PipePipe => BinOp::Or,
                _ => break,
            };

            let (lbp, rbp) = infix_binding_power(op);
            if lbp < min_bp {
                break;
            }
            self.advance(); // consume operator

            let rhs = self.parse_expr(rbp)?;
            let span = Span::new(lhs.span.start, rhs.span.end);
            lhs = Spanned::new(Expr::BinOp { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, span);
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Spanned<Expr>, CompileError> {
        self.skip_docs();
        let tokens = self.tokens;
        let Some(tok) = tokens.get(self.pos) else {
            return Err(CompileError::syntax("unexpected end of file in expression", self.eof_span()));
        };
        let span = tok.span;

        match tok.node {
            Token::IntLit(n) => {
                self.pos += 1;
                Ok(Spanned::new(Expr::IntLit(n), span))
            }
            Token::True => {
                self.pos += 1;
                Ok(Spanned::new(Expr::BoolLit(true), span))
            }
            Token::False => {
                self.pos += 1;
                Ok(Spanned::new(Expr::BoolLit(false), span))
            }
            Token::Null => {
                self.pos += 1;
                Ok(Spanned::new(Expr::Null, span))
            }
            Token::This => {
                self.pos += 1;
                Ok(Spanned::new(Expr::This, span))
            }
            Token::Ident => {
                let ident = self.expect_ident()?;
                self.parse_expr_after_ident(ident)
            }
            Token::New => self.parse_new(),
            Token::LParen => {
                self.pos += 1;
                let expr = self.parse_expr(0)?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Token::Minus | Token::Bang => {
                let op = if matches!(tok.node, Token::Minus) { UnaryOp::Neg } else { UnaryOp::Not };
                self.pos += 1;
                let operand = self.parse_expr(PREFIX_BP)?;
                let end = operand.span.end;
                Ok(Spanned::new(
                    Expr::UnaryOp { op, operand: Box::new(operand) },
                    Span::new(span.start, end),
                ))
            }
            Token::Ellipsis => {
                if self.clause_mode != Some(ClauseMode::Effect) {
                    return Err(CompileError::syntax(
                        "spread `...` is only allowed in effect clauses",
                        span,
                    ));
                }
                self.pos += 1;
                let collection = self.parse_expr(PREFIX_BP)?;
                let end = collection.span.end;
                Ok(Spanned::new(Expr::Spread(Box::new(collection)), Span::new(span.start, end)))
            }
            ref other => Err(CompileError::syntax(
                format!("unexpected token {other} in expression"),
                span,
            )),
        }
    }

    /// Continue an expression that started with an identifier: call, clause
    /// keyword, or plain name.
    fn parse_expr_after_ident(&mut self, ident: Spanned<String>) -> Result<Spanned<Expr>, CompileError> {
        if self.clause_mode.is_some() {
            if ident.node == "result" {
                return Ok(Spanned::new(Expr::Result, ident.span));
            }
            if ident.node == "old" && self.peek_is(&Token::LParen) {
                self.advance();
                let inner = self.parse_expr(0)?;
                let end = self.expect(&Token::RParen)?.end;
                return Ok(Spanned::new(Expr::Old(Box::new(inner)), Span::new(ident.span.start, end)));
            }
        }

        if self.peek_is(&Token::LParen) {
            let site = self.fresh_site();
            let (args, end) = self.parse_args()?;
            let span = Span::new(ident.span.start, end);
            return Ok(Spanned::new(Expr::Call { site, name: ident, args }, span));
        }

        let span = ident.span;
        Ok(Spanned::new(Expr::Ident(ident.node), span))
    }

    fn parse_new(&mut self) -> Result<Spanned<Expr>, CompileError> {
        let start = self.expect(&Token::New)?.start;

        if self.peek_is(&Token::Int) || self.peek_is(&Token::Boolean) || self.peek_nth_is(1, &Token::LBracket) {
            self.skip_docs();
            let tokens = self.tokens;
            let Some(tok) = tokens.get(self.pos) else {
                return Err(CompileError::syntax("expected type after new", self.eof_span()));
            };
            let elem = match tok.node {
                Token::Int => TypeExpr::Int,
                Token::Boolean => TypeExpr::Boolean,
                Token::Ident => TypeExpr::Named(self.text(tok.span).to_string()),
                ref other => {
                    return Err(CompileError::syntax(format!("expected type, found {other}"), tok.span));
                }
            };
            let elem = Spanned::new(elem, tok.span);
            self.pos += 1;
            self.expect(&Token::LBracket)?;
            let len = self.parse_expr(0)?;
            let end = self.expect(&Token::RBracket)?.end;
            return Ok(Spanned::new(
                Expr::NewArray { elem, len: Box::new(len) },
                Span::new(start, end),
            ));
        }

        let class = self.expect_ident()?;
        let site = self.fresh_site();
        let (args, end) = self.parse_args()?;
        Ok(Spanned::new(Expr::New { site, class, args }, Span::new(start, end)))
    }
}

/// Binding power for prefix operands; above every infix operator.
const PREFIX_BP: u8 = 13;

fn infix_binding_power(op: BinOp) -> (u8, u8) {
    match op {
        BinOp::Or => (1, 2),
        BinOp::And => (3, 4),
        BinOp::Eq | BinOp::Neq => (5, 6),
        BinOp::Lt | BinOp::Gt | BinOp::LtEq | BinOp::GtEq => (7, 8),
        BinOp::Add | BinOp::Sub => (9, 10),
        BinOp::Mul | BinOp::Div | BinOp::Mod => (11, 12),
    }
}
