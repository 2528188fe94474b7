//! HIR data model.
//!
//! HIR reuses the AST's expression nodes verbatim (so the per-expression type
//! map built by semantic analysis can key off the same [`volta_parser::NodeId`]
//! without cloning into a parallel tree) but narrows the statement set: `for`,
//! and the compound-assign/increment/decrement sugar are gone, replaced by
//! their desugared form. `while` gains an optional `increment` slot, which is
//! how desugared `for` attaches its step.

use serde::{Deserialize, Serialize};
use volta_common::{Position, Span};
use volta_parser::ast::{Expr, NodeId, Param, TypeExpr};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HirProgram {
    pub items: Vec<HirItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HirItem {
    Function(HirFunction),
    Struct(HirStructDecl),
    Extern(HirExternBlock),
    Import(HirImportDecl),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HirFunction {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: Vec<HirStmt>,
    pub is_pub: bool,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HirStructDecl {
    pub name: String,
    pub is_pub: bool,
    pub fields: Vec<(String, TypeExpr, bool)>,
    pub methods: Vec<HirFunction>,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HirExternBlock {
    pub abi: String,
    pub functions: Vec<HirExternFnSig>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HirExternFnSig {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HirImportDecl {
    pub path: Vec<String>,
    pub symbols: Vec<String>,
    pub span: Span,
}

/// A `let` declaration's array dimension vector, populated when its type
/// annotation (or inferred array-literal shape) is multi-dimensional; the
/// element type itself has already been flattened to a single-dimension
/// array of the total element count by the time lowering finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HirStmt {
    VarDecl {
        name: String,
        is_mut: bool,
        ty: Option<TypeExpr>,
        init: Option<Expr>,
        dimensions: Vec<u32>,
        span: Span,
    },
    ExprStmt(Expr),
    Return(Option<Expr>, Span),
    If {
        cond: Expr,
        then_body: Vec<HirStmt>,
        else_body: Vec<HirStmt>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Vec<HirStmt>,
        /// Evaluated at the end of each iteration, before the condition is
        /// re-checked. `continue` inside `body` targets this slot.
        increment: Option<Expr>,
        span: Span,
    },
    Block(Vec<HirStmt>),
    Break(Span),
    Continue(Span),
}

impl HirStmt {
    pub fn span(&self) -> Span {
        match self {
            HirStmt::VarDecl { span, .. }
            | HirStmt::Return(_, span)
            | HirStmt::If { span, .. }
            | HirStmt::While { span, .. }
            | HirStmt::Break(span)
            | HirStmt::Continue(span) => *span,
            HirStmt::ExprStmt(e) => e.span,
            HirStmt::Block(stmts) => stmts
                .first()
                .map(|s| s.span())
                .unwrap_or_else(|| Span::single(Position::start(), 0)),
        }
    }
}
