//! Abstract syntax tree for Volta source.
//!
//! Every statement and expression node carries a [`NodeId`], a small integer
//! assigned by the parser in traversal order. Later phases key side tables
//! (the per-expression type map, the HIR-to-MIR value map) off this id
//! instead of node identity, so the tree itself can be owned plainly.

use serde::{Deserialize, Serialize};
use volta_common::Span;

pub type NodeId = u32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub items: Vec<Item>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Item {
    Function(Function),
    Struct(StructDecl),
    Extern(ExternBlock),
    Import(ImportDecl),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: Block,
    pub is_pub: bool,
    pub span: Span,
    pub id: NodeId,
}

/// A parameter: `self`/`mut self`, `name: T`, `ref name: T`, or
/// `mut ref name: T` (equivalently `ref mut name: T`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Param {
    SelfParam { is_mut: bool, span: Span },
    Named { name: String, ty: TypeExpr, is_ref: bool, is_mut_ref: bool, span: Span },
}

impl Param {
    pub fn span(&self) -> Span {
        match self {
            Param::SelfParam { span, .. } => *span,
            Param::Named { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: String,
    pub is_pub: bool,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<Function>,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub is_pub: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternBlock {
    pub abi: String,
    pub functions: Vec<ExternFnSig>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternFnSig {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDecl {
    pub path: Vec<String>,
    pub symbols: Vec<String>,
    pub span: Span,
}

/// A type as written in source: a name (primitive or struct) or an array
/// type. Resolved to an interned `TypeId` during semantic analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeExpr {
    Named(String),
    Array(Box<TypeExpr>, u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtKind {
    Let { name: String, is_mut: bool, ty: Option<TypeExpr>, init: Option<Expr> },
    Return(Option<Expr>),
    If { cond: Expr, then_block: Block, else_branch: Option<ElseBranch> },
    While { cond: Expr, body: Block },
    For { var: String, start: Expr, end: Expr, inclusive: bool, body: Block },
    Break,
    Continue,
    Block(Block),
    Expr(Expr),
}

/// `else if cond { .. }` chains are parsed as a nested `if`-statement held
/// in `ElseBranch::If`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ElseBranch {
    Block(Block),
    If(Box<Stmt>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub kind: Box<ExprKind>,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    BoolLiteral(bool),
    NullLiteral,

    Variable(String),

    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Grouping(Box<Expr>),

    Call { callee: String, args: Vec<Expr> },
    StaticMethodCall { type_name: String, method: String, args: Vec<Expr> },
    InstanceMethodCall { receiver: Box<Expr>, method: String, args: Vec<Expr> },

    FieldAccess { object: Box<Expr>, field: String },
    Index { array: Box<Expr>, index: Box<Expr> },

    ArrayLiteral(ArrayLiteralKind),
    StructLiteral { type_name: String, fields: Vec<(String, Expr)> },

    Assign { target: Box<Expr>, value: Box<Expr> },
    CompoundAssign { op: BinaryOp, target: Box<Expr>, value: Box<Expr> },
    Increment(Box<Expr>),
    Decrement(Box<Expr>),

    Range { start: Box<Expr>, end: Box<Expr>, inclusive: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ArrayLiteralKind {
    Elements(Vec<Expr>),
    Repeat { value: Box<Expr>, count: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
    AddrOf,
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        };
        write!(f, "{}", s)
    }
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Not => "not",
            UnaryOp::AddrOf => "addrof",
        };
        write!(f, "{}", s)
    }
}
