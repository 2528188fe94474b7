//! Semantic analysis for the Volta compiler core: struct registration,
//! a symbol table and function registry, and the typing rules that turn a
//! desugared HIR program into a fully type-checked one with a per-expression
//! type map attached.

pub mod analyzer;
pub mod builtins;
pub mod symbol;

pub use analyzer::{AnalysisOutput, FieldAccessInfo, SemanticAnalyzer};
pub use symbol::{FunctionParameter, FunctionRegistry, FunctionSignature, ParamMode, Scope, Symbol, SymbolTable};
