//! The clause expression grammar: host expressions plus `old(E)`, `result`
//! and, in effect clauses, `...E` and comma-separated target lists.

use crate::clauses::ClauseRecord;
use crate::diagnostics::CompileError;
use crate::lexer::{self, token::Token};
use crate::span::{Span, Spanned};

use super::ast::{Expr, TypeExpr};
use super::{ClauseMode, Parser};

/// Parsed text of one clause, spans already relative to the source file.
#[derive(Debug, Clone, PartialEq)]
pub enum ClauseBody {
    Condition(Spanned<Expr>),
    Targets(Vec<Spanned<Expr>>),
}

/// Parse the text of `record`. Call sites inside the clause are numbered from
/// `first_site`; the returned counter is the next free id.
pub fn parse_clause(record: &ClauseRecord, first_site: u32) -> Result<(ClauseBody, u32), CompileError> {
    let mode = if record.tag.is_effect() { ClauseMode::Effect } else { ClauseMode::Condition };
    let tokens = lexer::lex_clause(&record.raw_text).map_err(|e| relocate_error(e, record))?;
    let mut parser = Parser::for_clause(&tokens, &record.raw_text, mode, first_site);

    let mut body = match mode {
        ClauseMode::Condition => parser.parse_condition(),
        ClauseMode::Effect => parser.parse_targets(),
    }
    .map_err(|e| relocate_error(e, record))?;

    match &mut body {
        ClauseBody::Condition(expr) => relocate(expr, record),
        ClauseBody::Targets(targets) => targets.iter_mut().for_each(|t| relocate(t, record)),
    }
    Ok((body, parser.next_site()))
}

impl<'a> Parser<'a> {
    fn parse_condition(&mut self) -> Result<ClauseBody, CompileError> {
        let expr = self.parse_expr(0)?;
        self.expect_clause_end()?;
        Ok(ClauseBody::Condition(expr))
    }

    fn parse_targets(&mut self) -> Result<ClauseBody, CompileError> {
        let mut targets = vec![self.parse_expr(0)?];
        while self.eat(&Token::Comma) {
            targets.push(self.parse_expr(0)?);
        }
        self.expect_clause_end()?;
        Ok(ClauseBody::Targets(targets))
    }

    fn expect_clause_end(&self) -> Result<(), CompileError> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(CompileError::syntax(
                format!("unexpected {} after clause expression", tok.node),
                tok.span,
            )),
        }
    }
}

fn relocate_error(err: CompileError, record: &ClauseRecord) -> CompileError {
    match err {
        CompileError::Syntax { msg, span } => CompileError::syntax(msg, record.source_span(span)),
        CompileError::Type { msg, span } => CompileError::type_err(msg, record.source_span(span)),
        other => other,
    }
}

fn relocate_span(span: &mut Span, record: &ClauseRecord) {
    *span = record.source_span(*span);
}

fn relocate_type(ty: &mut Spanned<TypeExpr>, record: &ClauseRecord) {
    relocate_span(&mut ty.span, record);
    if let TypeExpr::Array(inner) = &mut ty.node {
        relocate_type(inner, record);
    }
}

/// Rewrite every span of a clause expression from `raw_text` offsets to
/// source offsets.
fn relocate(expr: &mut Spanned<Expr>, record: &ClauseRecord) {
    relocate_span(&mut expr.span, record);
    match &mut expr.node {
        Expr::IntLit(_) | Expr::BoolLit(_) | Expr::Null | Expr::This | Expr::Ident(_) | Expr::Result => {}
        Expr::BinOp { lhs, rhs, .. } => {
            relocate(lhs, record);
            relocate(rhs, record);
        }
        Expr::UnaryOp { operand, .. } => relocate(operand, record),
        Expr::FieldAccess { object, field } => {
            relocate(object, record);
            relocate_span(&mut field.span, record);
        }
        Expr::Call { name, args, .. } => {
            relocate_span(&mut name.span, record);
            args.iter_mut().for_each(|a| relocate(a, record));
        }
        Expr::MethodCall { object, method, args, .. } => {
            relocate(object, record);
            relocate_span(&mut method.span, record);
            args.iter_mut().for_each(|a| relocate(a, record));
        }
        Expr::New { class, args, .. } => {
            relocate_span(&mut class.span, record);
            args.iter_mut().for_each(|a| relocate(a, record));
        }
        Expr::NewArray { elem, len } => {
            relocate_type(elem, record);
            relocate(len, record);
        }
        Expr::Index { object, index } => {
            relocate(object, record);
            relocate(index, record);
        }
        Expr::Old(inner) | Expr::Spread(inner) => relocate(inner, record),
    }
}
