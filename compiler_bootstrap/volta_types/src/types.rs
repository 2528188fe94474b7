//! The `Type` variants and the structural keys the registry interns them by.

use serde::{Deserialize, Serialize};

/// Index into [`crate::registry::TypeRegistry`]'s arena. Equality between two
/// types is equality of their `TypeId`, never a structural comparison.
pub type TypeId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
    Void,
    String,
}

impl PrimitiveKind {
    pub fn is_signed(self) -> bool {
        matches!(self, PrimitiveKind::I8 | PrimitiveKind::I16 | PrimitiveKind::I32 | PrimitiveKind::I64)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, PrimitiveKind::U8 | PrimitiveKind::U16 | PrimitiveKind::U32 | PrimitiveKind::U64)
    }

    pub fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub fn is_float(self) -> bool {
        matches!(self, PrimitiveKind::F32 | PrimitiveKind::F64)
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Void => "void",
            PrimitiveKind::String => "string",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "i8" => PrimitiveKind::I8,
            "i16" => PrimitiveKind::I16,
            "i32" => PrimitiveKind::I32,
            "i64" => PrimitiveKind::I64,
            "u8" => PrimitiveKind::U8,
            "u16" => PrimitiveKind::U16,
            "u32" => PrimitiveKind::U32,
            "u64" => PrimitiveKind::U64,
            "f32" => PrimitiveKind::F32,
            "f64" => PrimitiveKind::F64,
            "bool" => PrimitiveKind::Bool,
            "void" => PrimitiveKind::Void,
            "string" => PrimitiveKind::String,
            _ => return None,
        })
    }
}

/// A method signature attached to a [`StructType`]. Parameter reference modes
/// live on the AST/HIR parameter, not here; this records only what the type
/// system needs to check a call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub name: String,
    pub param_types: Vec<TypeId>,
    pub return_type: TypeId,
    pub has_self: bool,
    pub has_mut_self: bool,
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<(String, TypeId)>,
    pub methods: Vec<MethodSignature>,
}

impl StructType {
    pub fn is_stub(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_type(&self, field_name: &str) -> Option<TypeId> {
        self.fields.iter().find(|(n, _)| n == field_name).map(|(_, t)| *t)
    }

    pub fn method(&self, method_name: &str) -> Option<&MethodSignature> {
        self.methods.iter().find(|m| m.name == method_name)
    }
}

/// A type value, uniquely identified by the `TypeId` the registry assigned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Primitive(PrimitiveKind),
    Pointer(TypeId),
    Array(TypeId, u32),
    Struct(StructType),
    /// A named type applied to type arguments. The surface grammar has no
    /// generic syntax (Non-goal: polymorphic inference), but the registry
    /// operation exists for forward compatibility with `extern` signatures
    /// that name a parameterized foreign type.
    Generic(String, Vec<TypeId>),
    /// Singleton untyped pointee, used only inside `Pointer(Opaque)`.
    Opaque,
    /// A forward reference created when a type name is used before it is a
    /// registered struct. Must be replaced by a concrete type before semantic
    /// analysis completes, or it is an error.
    Unresolved(String),
}
