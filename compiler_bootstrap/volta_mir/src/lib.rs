//! SSA mid-level IR for the Volta compiler core: the typed instruction set
//! itself, the builder that assembles a function's basic blocks, the
//! lowering pass from HIR to MIR, the structural verifier every MIR program
//! must pass before a backend sees it, and the merge step that combines a
//! driver's per-module programs into one.

pub mod builder;
pub mod ir;
pub mod lowering;
pub mod merge;
pub mod verifier;

pub use builder::MirBuilder;
pub use ir::{BasicBlock, Constant, Function, Instruction, Opcode, Program, Terminator, Value, ValueId, GC_MALLOC};
pub use lowering::{Lowering, LoweringOutput};
pub use merge::merge_modules;
pub use verifier::verify_program;
