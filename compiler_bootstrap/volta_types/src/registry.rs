//! Interning registry: the sole creator of [`Type`] values.

use crate::types::{MethodSignature, PrimitiveKind, StructType, Type, TypeId};
use hashbrown::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterStructError {
    #[error("struct '{0}' is already registered with fields")]
    AlreadyDefined(String),
}

/// Owns every `Type` ever created during a compilation and interns them so
/// that structurally equal requests return the same `TypeId`.
pub struct TypeRegistry {
    arena: Vec<Type>,
    primitives: HashMap<PrimitiveKind, TypeId>,
    arrays: HashMap<(TypeId, u32), TypeId>,
    pointers: HashMap<TypeId, TypeId>,
    generics: HashMap<(String, Vec<TypeId>), TypeId>,
    structs: HashMap<String, TypeId>,
    unresolved: HashMap<String, TypeId>,
    opaque: Option<TypeId>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            arena: Vec::new(),
            primitives: HashMap::new(),
            arrays: HashMap::new(),
            pointers: HashMap::new(),
            generics: HashMap::new(),
            structs: HashMap::new(),
            unresolved: HashMap::new(),
            opaque: None,
        }
    }

    fn intern(&mut self, ty: Type) -> TypeId {
        let id = self.arena.len() as TypeId;
        self.arena.push(ty);
        id
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.arena[id as usize]
    }

    pub fn get_primitive(&mut self, kind: PrimitiveKind) -> TypeId {
        if let Some(&id) = self.primitives.get(&kind) {
            return id;
        }
        let id = self.intern(Type::Primitive(kind));
        self.primitives.insert(kind, id);
        id
    }

    pub fn get_array(&mut self, element: TypeId, size: u32) -> TypeId {
        debug_assert!(size >= 1, "array size must be at least 1");
        if let Some(&id) = self.arrays.get(&(element, size)) {
            return id;
        }
        let id = self.intern(Type::Array(element, size));
        self.arrays.insert((element, size), id);
        id
    }

    pub fn get_pointer(&mut self, pointee: TypeId) -> TypeId {
        if let Some(&id) = self.pointers.get(&pointee) {
            return id;
        }
        let id = self.intern(Type::Pointer(pointee));
        self.pointers.insert(pointee, id);
        id
    }

    pub fn get_generic(&mut self, name: &str, type_params: Vec<TypeId>) -> TypeId {
        let key = (name.to_string(), type_params.clone());
        if let Some(&id) = self.generics.get(&key) {
            return id;
        }
        let id = self.intern(Type::Generic(name.to_string(), type_params));
        self.generics.insert(key, id);
        id
    }

    pub fn get_opaque(&mut self) -> TypeId {
        if let Some(id) = self.opaque {
            return id;
        }
        let id = self.intern(Type::Opaque);
        self.opaque = Some(id);
        id
    }

    pub fn get_unresolved(&mut self, name: &str) -> TypeId {
        if let Some(&id) = self.unresolved.get(name) {
            return id;
        }
        let id = self.intern(Type::Unresolved(name.to_string()));
        self.unresolved.insert(name.to_string(), id);
        id
    }

    /// Registers a fully-defined struct. Succeeds exactly once per name: a
    /// prior stub (empty field list) is completed in place; a prior
    /// fully-defined struct is an error.
    pub fn register_struct(
        &mut self,
        name: &str,
        fields: Vec<(String, TypeId)>,
    ) -> Result<TypeId, RegisterStructError> {
        if let Some(&id) = self.structs.get(name) {
            let existing = &self.arena[id as usize];
            match existing {
                Type::Struct(s) if s.is_stub() => {
                    self.arena[id as usize] = Type::Struct(StructType { name: name.to_string(), fields, methods: Vec::new() });
                    Ok(id)
                }
                _ => Err(RegisterStructError::AlreadyDefined(name.to_string())),
            }
        } else {
            let id = self.intern(Type::Struct(StructType { name: name.to_string(), fields, methods: Vec::new() }));
            self.structs.insert(name.to_string(), id);
            Ok(id)
        }
    }

    /// Idempotent: registers an empty-field stub for `name`, or returns the
    /// existing registration (stub or complete) unchanged.
    pub fn register_struct_stub(&mut self, name: &str) -> TypeId {
        if let Some(&id) = self.structs.get(name) {
            return id;
        }
        let id = self.intern(Type::Struct(StructType { name: name.to_string(), fields: Vec::new(), methods: Vec::new() }));
        self.structs.insert(name.to_string(), id);
        id
    }

    pub fn get_struct(&self, name: &str) -> Option<TypeId> {
        self.structs.get(name).copied()
    }

    pub fn has_struct(&self, name: &str) -> bool {
        self.structs.contains_key(name)
    }

    pub fn add_method(&mut self, struct_id: TypeId, method: MethodSignature) {
        if let Type::Struct(s) = &mut self.arena[struct_id as usize] {
            s.methods.push(method);
        }
    }

    pub fn struct_type(&self, id: TypeId) -> Option<&StructType> {
        match &self.arena[id as usize] {
            Type::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Resolves a type name written in source to a `Type`: a primitive
    /// keyword or an already-registered struct name. Anything else is `None`
    /// (the caller registers an `Unresolved` forward reference instead).
    pub fn parse_type_name(&mut self, name: &str) -> Option<TypeId> {
        if let Some(kind) = PrimitiveKind::from_name(name) {
            return Some(self.get_primitive(kind));
        }
        self.get_struct(name)
    }

    /// Renders a type for diagnostics, e.g. `[i32; 4]`, `ptr Point`, `Point`.
    pub fn display(&self, id: TypeId) -> String {
        match &self.arena[id as usize] {
            Type::Primitive(kind) => kind.name().to_string(),
            Type::Pointer(pointee) => format!("ptr {}", self.display(*pointee)),
            Type::Array(elem, size) => format!("[{}; {}]", self.display(*elem), size),
            Type::Struct(s) => s.name.clone(),
            Type::Generic(name, params) => {
                let rendered: Vec<String> = params.iter().map(|p| self.display(*p)).collect();
                format!("{}<{}>", name, rendered.join(", "))
            }
            Type::Opaque => "opaque".to_string(),
            Type::Unresolved(name) => format!("{} (unresolved)", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_and_opaque_are_singletons() {
        let mut reg = TypeRegistry::new();
        let a = reg.get_primitive(PrimitiveKind::I32);
        let b = reg.get_primitive(PrimitiveKind::I32);
        assert_eq!(a, b);
        assert_eq!(reg.get_opaque(), reg.get_opaque());
    }

    #[test]
    fn arrays_and_pointers_intern_structurally() {
        let mut reg = TypeRegistry::new();
        let i32_ty = reg.get_primitive(PrimitiveKind::I32);
        let arr1 = reg.get_array(i32_ty, 4);
        let arr2 = reg.get_array(i32_ty, 4);
        let arr3 = reg.get_array(i32_ty, 5);
        assert_eq!(arr1, arr2);
        assert_ne!(arr1, arr3);

        let ptr1 = reg.get_pointer(i32_ty);
        let ptr2 = reg.get_pointer(i32_ty);
        assert_eq!(ptr1, ptr2);
    }

    #[test]
    fn stub_then_complete_keeps_the_same_id() {
        let mut reg = TypeRegistry::new();
        let stub = reg.register_struct_stub("Point");
        assert!(reg.struct_type(stub).unwrap().is_stub());

        let i32_ty = reg.get_primitive(PrimitiveKind::I32);
        let complete = reg
            .register_struct("Point", vec![("x".to_string(), i32_ty), ("y".to_string(), i32_ty)])
            .unwrap();
        assert_eq!(stub, complete);
        assert_eq!(reg.struct_type(complete).unwrap().fields.len(), 2);
    }

    #[test]
    fn registering_a_defined_struct_twice_is_an_error() {
        let mut reg = TypeRegistry::new();
        let i32_ty = reg.get_primitive(PrimitiveKind::I32);
        reg.register_struct("Point", vec![("x".to_string(), i32_ty)]).unwrap();
        let result = reg.register_struct("Point", vec![("y".to_string(), i32_ty)]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_type_name_resolves_primitives_and_structs() {
        let mut reg = TypeRegistry::new();
        reg.register_struct_stub("Point");
        assert!(reg.parse_type_name("i64").is_some());
        assert!(reg.parse_type_name("Point").is_some());
        assert!(reg.parse_type_name("Nonexistent").is_none());
    }

    #[test]
    fn display_renders_nested_types() {
        let mut reg = TypeRegistry::new();
        let i32_ty = reg.get_primitive(PrimitiveKind::I32);
        let arr = reg.get_array(i32_ty, 3);
        assert_eq!(reg.display(arr), "[i32; 3]");
        let ptr = reg.get_pointer(arr);
        assert_eq!(reg.display(ptr), "ptr [i32; 3]");
    }
}
