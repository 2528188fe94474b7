//! Functions implicitly available in every module without an `extern`
//! declaration: I/O, panics, assertions, and numeric-to-string conversions.
//! Each is backed by a runtime symbol of the same name; semantic analysis
//! treats them exactly like any other extern signature.

use volta_types::{PrimitiveKind, TypeRegistry};

use crate::symbol::{FunctionParameter, FunctionRegistry, FunctionSignature, ParamMode};

fn sig(name: &str, params: Vec<FunctionParameter>, return_type: volta_types::TypeId) -> FunctionSignature {
    FunctionSignature {
        name: name.to_string(),
        params,
        return_type,
        is_extern: true,
        is_pub: true,
        owner: None,
        has_self: false,
        has_mut_self: false,
    }
}

fn param(name: &str, type_id: volta_types::TypeId) -> FunctionParameter {
    FunctionParameter { name: name.to_string(), type_id, mode: ParamMode::Value }
}

/// Every name `seed` may register, for callers (MIR lowering) that need to
/// declare the matching runtime externs without re-deriving this list.
pub const BUILTIN_NAMES: &[&str] = &[
    "println", "print", "print_i32", "print_i64", "print_u32", "print_u64", "print_f32", "print_f64",
    "print_bool", "panic", "assert", "i32_to_string", "i64_to_string", "f32_to_string", "f64_to_string",
    "bool_to_string", "sizeof",
];

/// Registers every builtin into `registry`, skipping any name a module has
/// already declared itself (an explicit `extern` block takes precedence).
pub fn seed(registry: &mut FunctionRegistry, types: &mut TypeRegistry) {
    let void = types.get_primitive(PrimitiveKind::Void);
    let boolean = types.get_primitive(PrimitiveKind::Bool);
    let string = types.get_primitive(PrimitiveKind::String);
    let i32_ty = types.get_primitive(PrimitiveKind::I32);
    let i64_ty = types.get_primitive(PrimitiveKind::I64);
    let u32_ty = types.get_primitive(PrimitiveKind::U32);
    let u64_ty = types.get_primitive(PrimitiveKind::U64);
    let f32_ty = types.get_primitive(PrimitiveKind::F32);
    let f64_ty = types.get_primitive(PrimitiveKind::F64);

    let builtins = [
        sig("println", vec![param("s", string)], void),
        sig("print", vec![param("s", string)], void),
        sig("print_i32", vec![param("v", i32_ty)], void),
        sig("print_i64", vec![param("v", i64_ty)], void),
        sig("print_u32", vec![param("v", u32_ty)], void),
        sig("print_u64", vec![param("v", u64_ty)], void),
        sig("print_f32", vec![param("v", f32_ty)], void),
        sig("print_f64", vec![param("v", f64_ty)], void),
        sig("print_bool", vec![param("v", boolean)], void),
        sig("panic", vec![param("msg", string)], void),
        sig("assert", vec![param("cond", boolean), param("msg", string)], void),
        sig("i32_to_string", vec![param("v", i32_ty)], string),
        sig("i64_to_string", vec![param("v", i64_ty)], string),
        sig("f32_to_string", vec![param("v", f32_ty)], string),
        sig("f64_to_string", vec![param("v", f64_ty)], string),
        sig("bool_to_string", vec![param("v", boolean)], string),
        sig("sizeof", vec![param("size", u64_ty)], u64_ty),
    ];

    for signature in builtins {
        if !registry.has(&signature.name) {
            registry.register(signature);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_println_and_panic() {
        let mut types = TypeRegistry::new();
        let mut registry = FunctionRegistry::new();
        seed(&mut registry, &mut types);
        assert!(registry.has("println"));
        assert!(registry.has("panic"));
        assert_eq!(registry.get("println").unwrap().params.len(), 1);
    }

    #[test]
    fn does_not_override_a_module_declared_extern() {
        let mut types = TypeRegistry::new();
        let mut registry = FunctionRegistry::new();
        let void = types.get_primitive(PrimitiveKind::Void);
        registry.register(sig("println", vec![], void));
        seed(&mut registry, &mut types);
        assert_eq!(registry.get("println").unwrap().params.len(), 0);
    }
}
