//! MIR data model: a typed, single-assignment instruction set lowered from
//! HIR. Every [`Value`] carries the [`TypeId`] it was typed with by semantic
//! analysis (or synthesized during lowering); nothing downstream needs to
//! re-derive a type from shape.

use serde::{Deserialize, Serialize};
use volta_types::TypeId;

pub type ValueId = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
}

/// A typed SSA value. `Local` and `Param` are identified by a per-function
/// counter; `Global` names an external symbol (currently only
/// `@volta_gc_malloc`); `Constant` carries its literal payload inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Local(ValueId, TypeId),
    Param(ValueId, TypeId),
    Global(String, TypeId),
    Constant(Constant, TypeId),
}

impl Value {
    pub fn type_id(&self) -> TypeId {
        match self {
            Value::Local(_, t) | Value::Param(_, t) | Value::Global(_, t) | Value::Constant(_, t) => *t,
        }
    }

    pub fn as_local_id(&self) -> Option<ValueId> {
        match self {
            Value::Local(id, _) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    IAdd,
    ISub,
    IMul,
    IDiv,
    IRem,
    UDiv,
    URem,
    FAdd,
    FSub,
    FMul,
    FDiv,
    ICmpEq,
    ICmpNe,
    ICmpSlt,
    ICmpSle,
    ICmpSgt,
    ICmpSge,
    ICmpUlt,
    ICmpUle,
    ICmpUgt,
    ICmpUge,
    FCmpOeq,
    FCmpOne,
    FCmpOlt,
    FCmpOle,
    FCmpOgt,
    FCmpOge,
    And,
    Or,
    Not,
    Alloca,
    Load,
    Store,
    /// Computes the address of an array element. The last operand is the
    /// flattened `I64` index; the first is the base pointer.
    GetElementPtr,
    /// Computes the address of a struct field, named by `field_index`.
    GetFieldPtr,
    Call,
    Trunc,
    ZExt,
    SExt,
    FPTrunc,
    FPExt,
    SIToFP,
    UIToFP,
    FPToSI,
    FPToUI,
    Bitcast,
}

/// One MIR instruction. `result` is `None` for stores and void calls.
/// `field_index` is only meaningful for `GetFieldPtr`; `call_target` only
/// for `Call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub result: Option<Value>,
    pub operands: Vec<Value>,
    pub call_target: Option<String>,
    pub field_index: Option<usize>,
}

impl Instruction {
    pub fn new(opcode: Opcode, result: Option<Value>, operands: Vec<Value>) -> Self {
        Self { opcode, result, operands, call_target: None, field_index: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Terminator {
    Return(Option<Value>),
    Branch(String),
    CondBranch { cond: Value, then_label: String, else_label: String },
    Switch { value: Value, cases: Vec<(i64, String)>, default: String },
    Unreachable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicBlock {
    pub label: String,
    pub instructions: Vec<Instruction>,
    pub terminator: Option<Terminator>,
}

impl BasicBlock {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), instructions: Vec::new(), terminator: None }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub params: Vec<Value>,
    pub return_type: TypeId,
    pub blocks: Vec<BasicBlock>,
}

impl Function {
    /// An empty block list denotes an extern declaration with no body.
    pub fn is_extern(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Program {
    pub functions: Vec<Function>,
}

/// The well-known external allocator every MIR program declares once.
pub const GC_MALLOC: &str = "volta_gc_malloc";
