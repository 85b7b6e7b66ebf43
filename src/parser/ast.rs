use serde::{Deserialize, Serialize};

use crate::span::{Span, Spanned};

/// Identity of a declaration (class, interface, field, constructor, method,
/// initializer block). Specification data hangs off side tables keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclId(pub u32);

/// Identity of a call, method call or `new` expression, or a `super(...)` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallSiteId(pub u32);

impl std::fmt::Display for DeclId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub types: Vec<Spanned<TypeDecl>>,
    /// Number of declaration ids handed out by the parser. Ids at or above this
    /// are free for synthesized declarations.
    pub decl_count: u32,
    pub site_count: u32,
}

/// Raw `/** ... */` text with the offset of its first byte.
#[derive(Debug, Clone, PartialEq)]
pub struct DocComment {
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub id: DeclId,
    pub kind: TypeKind,
    pub name: Spanned<String>,
    pub superclass: Option<Spanned<String>>,
    /// `implements` list for classes, `extends` list for interfaces.
    pub interfaces: Vec<Spanned<String>>,
    pub doc: Option<DocComment>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone)]
pub enum Member {
    Field(Spanned<FieldDecl>),
    Constructor(Spanned<MethodDecl>),
    Method(Spanned<MethodDecl>),
    Initializer(Spanned<InitBlock>),
}

impl Member {
    pub fn id(&self) -> DeclId {
        match self {
            Member::Field(f) => f.node.id,
            Member::Constructor(m) | Member::Method(m) => m.node.id,
            Member::Initializer(b) => b.node.id,
        }
    }

    pub fn doc(&self) -> Option<&DocComment> {
        match self {
            Member::Field(f) => f.node.doc.as_ref(),
            Member::Constructor(m) | Member::Method(m) => m.node.doc.as_ref(),
            Member::Initializer(b) => b.node.doc.as_ref(),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Member::Field(f) => f.span,
            Member::Constructor(m) | Member::Method(m) => m.span,
            Member::Initializer(b) => b.span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub id: DeclId,
    pub doc: Option<DocComment>,
    pub is_static: bool,
    pub ty: Spanned<TypeExpr>,
    pub name: Spanned<String>,
    pub init: Option<Spanned<Expr>>,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub id: DeclId,
    pub doc: Option<DocComment>,
    pub is_static: bool,
    pub is_constructor: bool,
    /// `None` for `void` methods and constructors.
    pub return_type: Option<Spanned<TypeExpr>>,
    pub name: Spanned<String>,
    pub params: Vec<Param>,
    /// `None` for interface and abstract methods.
    pub body: Option<Spanned<Block>>,
}

#[derive(Debug, Clone)]
pub struct InitBlock {
    pub id: DeclId,
    pub doc: Option<DocComment>,
    pub body: Spanned<Block>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Spanned<String>,
    pub ty: Spanned<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Int,
    Boolean,
    Named(String),
    Array(Box<Spanned<TypeExpr>>),
}

#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Spanned<Stmt>>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Local {
        ty: Spanned<TypeExpr>,
        name: Spanned<String>,
        value: Option<Spanned<Expr>>,
    },
    Assign {
        target: Spanned<Expr>,
        value: Spanned<Expr>,
    },
    Expr(Spanned<Expr>),
    If {
        condition: Spanned<Expr>,
        then_branch: Box<Spanned<Stmt>>,
        else_branch: Option<Box<Spanned<Stmt>>>,
    },
    While {
        condition: Spanned<Expr>,
        body: Box<Spanned<Stmt>>,
    },
    Return(Option<Spanned<Expr>>),
    Throw(Spanned<Expr>),
    SuperCall {
        site: CallSiteId,
        args: Vec<Spanned<Expr>>,
    },
    Try {
        body: Spanned<Block>,
        catches: Vec<CatchClause>,
        finally: Option<Spanned<Block>>,
    },
    Block(Spanned<Block>),
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub class: Spanned<String>,
    pub var: Spanned<String>,
    pub body: Spanned<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLit(i64),
    BoolLit(bool),
    Null,
    This,
    Ident(String),
    BinOp {
        op: BinOp,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Spanned<Expr>>,
    },
    FieldAccess {
        object: Box<Spanned<Expr>>,
        field: Spanned<String>,
    },
    /// Unqualified call `m(args)`.
    Call {
        site: CallSiteId,
        name: Spanned<String>,
        args: Vec<Spanned<Expr>>,
    },
    MethodCall {
        site: CallSiteId,
        object: Box<Spanned<Expr>>,
        method: Spanned<String>,
        args: Vec<Spanned<Expr>>,
    },
    New {
        site: CallSiteId,
        class: Spanned<String>,
        args: Vec<Spanned<Expr>>,
    },
    NewArray {
        elem: Spanned<TypeExpr>,
        len: Box<Spanned<Expr>>,
    },
    Index {
        object: Box<Spanned<Expr>>,
        index: Box<Spanned<Expr>>,
    },
    // Clause-only forms
    Old(Box<Spanned<Expr>>),
    Result,
    Spread(Box<Spanned<Expr>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::LtEq => "<=",
            BinOp::GtEq => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        };
        f.write_str(s)
    }
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOp::Neg => f.write_str("-"),
            UnaryOp::Not => f.write_str("!"),
        }
    }
}
