//! Interned type representation for the Volta compiler core.
//!
//! Types are born in the registry and live for the rest of compilation;
//! nothing outside [`TypeRegistry`] constructs a [`Type`] directly. Two
//! structurally equal types always share the same [`TypeId`], so callers
//! compare types by id rather than by structural equality.

pub mod registry;
pub mod types;

pub use registry::{RegisterStructError, TypeRegistry};
pub use types::{MethodSignature, PrimitiveKind, StructType, Type, TypeId};
