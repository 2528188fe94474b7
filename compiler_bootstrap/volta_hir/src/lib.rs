//! Desugars Volta's AST into its HIR statement discipline: compound
//! assignment, increment/decrement, and `for` loops are rewritten in terms of
//! plain assignment, binary operators, and `while`.

pub mod hir;
pub mod lowering;

pub use hir::*;
pub use lowering::lower_program;
