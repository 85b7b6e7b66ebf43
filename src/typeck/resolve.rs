//! The host side of clause binding.

use crate::contracts::{ClauseScope, ExprResolver};
use crate::diagnostics::CompileError;
use crate::parser::ast::Expr;
use crate::span::Spanned;

use super::check::{Checker, ClauseFrame};
use super::env::Env;
use super::typed::TypedExpr;
use super::types::Type;

impl ExprResolver for Env {
    fn resolve_expression(&self, scope: &ClauseScope, expr: &Spanned<Expr>) -> Result<TypedExpr, CompileError> {
        let frame = ClauseFrame { params: scope.params.clone(), result: scope.result.clone() };
        let mut checker = Checker::for_clause(self, &scope.class, scope.decl, scope.is_static, frame);
        checker.check_expr(expr)
    }

    fn iterable_element_type(&self, ty: &Type) -> Option<Type> {
        match ty {
            Type::Array(elem) => Some((**elem).clone()),
            _ => None,
        }
    }
}
