//! Resolved, typed trees for bodies and clause expressions.

use serde::Serialize;

use crate::parser::ast::{BinOp, CallSiteId, DeclId, UnaryOp};
use crate::span::{Span, Spanned};

use super::types::Type;

/// A stored `old(...)` value of one declaration's snapshot site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SlotId(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypedExpr {
    pub kind: TExpr,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Receiver {
    Static,
    Virtual(Box<TypedExpr>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TExpr {
    Int(i64),
    Bool(bool),
    Null,
    This,
    Local(String),
    /// Parameter read from a clause; evaluates to the argument value at entry.
    Param { index: usize, name: String },
    Field { object: Box<TypedExpr>, field: String },
    StaticField { class: String, field: String },
    Length(Box<TypedExpr>),
    Index { array: Box<TypedExpr>, index: Box<TypedExpr> },
    Binary { op: BinOp, lhs: Box<TypedExpr>, rhs: Box<TypedExpr> },
    Unary { op: UnaryOp, operand: Box<TypedExpr> },
    Call { site: CallSiteId, receiver: Receiver, method: DeclId, name: String, args: Vec<TypedExpr> },
    New { site: CallSiteId, class: String, ctor: DeclId, args: Vec<TypedExpr> },
    NewArray { elem: Type, len: Box<TypedExpr> },
    Old(Box<TypedExpr>),
    Result,
    Spread(Box<TypedExpr>),
    Slot(SlotId),
}

impl TypedExpr {
    pub fn new(kind: TExpr, ty: Type, span: Span) -> Self {
        Self { kind, ty, span }
    }

    /// Pre-order walk over this expression and every subexpression.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a TypedExpr)) {
        f(self);
        match &self.kind {
            TExpr::Int(_)
            | TExpr::Bool(_)
            | TExpr::Null
            | TExpr::This
            | TExpr::Local(_)
            | TExpr::Param { .. }
            | TExpr::StaticField { .. }
            | TExpr::Result
            | TExpr::Slot(_) => {}
            TExpr::Field { object, .. } | TExpr::Length(object) => object.walk(f),
            TExpr::Index { array, index } => {
                array.walk(f);
                index.walk(f);
            }
            TExpr::Binary { lhs, rhs, .. } => {
                lhs.walk(f);
                rhs.walk(f);
            }
            TExpr::Unary { operand, .. } => operand.walk(f),
            TExpr::Call { receiver, args, .. } => {
                if let Receiver::Virtual(object) = receiver {
                    object.walk(f);
                }
                args.iter().for_each(|a| a.walk(f));
            }
            TExpr::New { args, .. } => args.iter().for_each(|a| a.walk(f)),
            TExpr::NewArray { len, .. } => len.walk(f),
            TExpr::Old(inner) | TExpr::Spread(inner) => inner.walk(f),
        }
    }

    /// Rebuild the tree bottom-up, letting `f` replace any node.
    pub fn rewrite(self, f: &mut dyn FnMut(TypedExpr) -> TypedExpr) -> TypedExpr {
        let TypedExpr { kind, ty, span } = self;
        let kind = match kind {
            TExpr::Field { object, field } => TExpr::Field { object: Box::new(object.rewrite(f)), field },
            TExpr::Length(object) => TExpr::Length(Box::new(object.rewrite(f))),
            TExpr::Index { array, index } => {
                let array = Box::new(array.rewrite(f));
                TExpr::Index { array, index: Box::new(index.rewrite(f)) }
            }
            TExpr::Binary { op, lhs, rhs } => {
                let lhs = Box::new(lhs.rewrite(f));
                TExpr::Binary { op, lhs, rhs: Box::new(rhs.rewrite(f)) }
            }
            TExpr::Unary { op, operand } => TExpr::Unary { op, operand: Box::new(operand.rewrite(f)) },
            TExpr::Call { site, receiver, method, name, args } => {
                let receiver = match receiver {
                    Receiver::Static => Receiver::Static,
                    Receiver::Virtual(object) => Receiver::Virtual(Box::new(object.rewrite(f))),
                };
                let args = args.into_iter().map(|a| a.rewrite(f)).collect();
                TExpr::Call { site, receiver, method, name, args }
            }
            TExpr::New { site, class, ctor, args } => {
                let args = args.into_iter().map(|a| a.rewrite(f)).collect();
                TExpr::New { site, class, ctor, args }
            }
            TExpr::NewArray { elem, len } => TExpr::NewArray { elem, len: Box::new(len.rewrite(f)) },
            TExpr::Old(inner) => TExpr::Old(Box::new(inner.rewrite(f))),
            TExpr::Spread(inner) => TExpr::Spread(Box::new(inner.rewrite(f))),
            leaf => leaf,
        };
        f(TypedExpr { kind, ty, span })
    }

    pub fn contains(&self, pred: impl Fn(&TExpr) -> bool) -> bool {
        let mut found = false;
        self.walk(&mut |e| found |= pred(&e.kind));
        found
    }
}

impl std::fmt::Display for TypedExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TExpr::Int(n) => write!(f, "{n}"),
            TExpr::Bool(b) => write!(f, "{b}"),
            TExpr::Null => write!(f, "null"),
            TExpr::This => write!(f, "this"),
            TExpr::Local(name) => write!(f, "{name}"),
            TExpr::Param { name, .. } => write!(f, "{name}"),
            TExpr::Field { object, field } => write!(f, "{object}.{field}"),
            TExpr::StaticField { class, field } => write!(f, "{class}.{field}"),
            TExpr::Length(object) => write!(f, "{object}.length"),
            TExpr::Index { array, index } => write!(f, "{array}[{index}]"),
            TExpr::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            TExpr::Unary { op, operand } => write!(f, "{op}{operand}"),
            TExpr::Call { receiver, name, args, .. } => {
                match receiver {
                    Receiver::Static => write!(f, "{name}(")?,
                    Receiver::Virtual(object) => write!(f, "{object}.{name}(")?,
                }
                write_args(f, args)
            }
            TExpr::New { class, args, .. } => {
                write!(f, "new {class}(")?;
                write_args(f, args)
            }
            TExpr::NewArray { elem, len } => write!(f, "new {elem}[{len}]"),
            TExpr::Old(inner) => write!(f, "old({inner})"),
            TExpr::Result => write!(f, "result"),
            TExpr::Spread(inner) => write!(f, "...{inner}"),
            TExpr::Slot(slot) => write!(f, "$old{}", slot.0),
        }
    }
}

fn write_args(f: &mut std::fmt::Formatter<'_>, args: &[TypedExpr]) -> std::fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    write!(f, ")")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TStmt {
    Local { name: String, ty: Type, value: Option<TypedExpr> },
    AssignLocal { name: String, value: TypedExpr },
    AssignField { object: TypedExpr, field: String, value: TypedExpr },
    AssignStatic { class: String, field: String, value: TypedExpr },
    AssignIndex { array: TypedExpr, index: TypedExpr, value: TypedExpr },
    Expr(TypedExpr),
    If { cond: TypedExpr, then_branch: Box<Spanned<TStmt>>, else_branch: Option<Box<Spanned<TStmt>>> },
    While { cond: TypedExpr, body: Box<Spanned<TStmt>> },
    Return(Option<TypedExpr>),
    Throw(TypedExpr),
    SuperCall { site: CallSiteId, ctor: DeclId, args: Vec<TypedExpr> },
    Try { body: Vec<Spanned<TStmt>>, catches: Vec<TCatch>, finally: Option<Vec<Spanned<TStmt>>> },
    Block(Vec<Spanned<TStmt>>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TCatch {
    pub class: String,
    pub var: String,
    pub body: Vec<Spanned<TStmt>>,
}
