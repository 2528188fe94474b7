//! Exercises `compile` end to end, the way a real caller (the `voltac`
//! binary) would: raw source text in, a verified and merged MIR program or
//! error diagnostics out.

use volta_driver::{compile, module_name_from_path, SourceModule};

fn module(source: &str) -> SourceModule {
    SourceModule { name: "main".to_string(), source: source.to_string() }
}

#[test]
fn minimal_program_compiles_to_a_verified_program() {
    let result = compile(vec![module("fn main() -> i32 { return 0; }")]);
    assert!(result.succeeded(), "{:?}", result.diagnostics.messages());
    let program = result.program.unwrap();
    assert!(program.functions.iter().any(|f| f.name == "main"));
}

#[test]
fn arithmetic_and_variables_produce_a_single_block_function() {
    let result = compile(vec![module(
        "fn main() -> i32 { let x: i32 = 1; let y: i32 = 2; return x + y * 3; }",
    )]);
    assert!(result.succeeded(), "{:?}", result.diagnostics.messages());
    let program = result.program.unwrap();
    let main = program.functions.iter().find(|f| f.name == "main").unwrap();
    assert!(!main.blocks.is_empty());
    assert!(main.blocks[0].terminator.is_some());
}

#[test]
fn while_loop_with_break_and_continue_verifies() {
    let source = "fn main() -> i32 { \
         let mut total: i32 = 0; \
         let mut i: i32 = 0; \
         while i < 10 { \
             if i == 5 { continue; } \
             if i == 9 { break; } \
             total = total + i; \
             i = i + 1; \
         } \
         return total; \
     }";
    let result = compile(vec![module(source)]);
    assert!(result.succeeded(), "{:?}", result.diagnostics.messages());
}

#[test]
fn struct_with_method_lowers_the_method_as_its_own_function() {
    let source = "struct Point { x: i32, y: i32, \
         pub fn sum(self) -> i32 { return self.x + self.y; } \
     } \
     fn main() -> i32 { let p = Point { x: 1, y: 2 }; return p.sum(); }";
    let result = compile(vec![module(source)]);
    assert!(result.succeeded(), "{:?}", result.diagnostics.messages());
    let program = result.program.unwrap();
    assert!(program.functions.iter().any(|f| f.name == "Point__sum"));
}

#[test]
fn type_mismatch_halts_before_mir_lowering() {
    let result = compile(vec![module(
        "fn main() -> i32 { let x: i32 = 1; let y: i64 = 2; let z = x + y; return 0; }",
    )]);
    assert!(!result.succeeded());
    assert!(result.program.is_none());
    assert!(result.diagnostics.has_errors());
}

#[test]
fn later_module_can_call_an_earlier_modules_public_function() {
    let a = SourceModule {
        name: "a".to_string(),
        source: "pub fn double(x: i32) -> i32 { return x * 2; }".to_string(),
    };
    let b = SourceModule {
        name: "b".to_string(),
        source: "fn main() -> i32 { return double(21); }".to_string(),
    };
    let result = compile(vec![a, b]);
    assert!(result.succeeded(), "{:?}", result.diagnostics.messages());
}

#[test]
fn builtins_are_callable_without_an_explicit_extern_declaration() {
    let result = compile(vec![module(r#"fn main() -> i32 { println("hi"); return 0; }"#)]);
    assert!(result.succeeded(), "{:?}", result.diagnostics.messages());
    let program = result.program.unwrap();
    let println_decl = program.functions.iter().find(|f| f.name == "println").unwrap();
    assert!(println_decl.is_extern());
}

#[test]
fn module_name_derivation_matches_the_path_to_dotted_name_rule() {
    assert_eq!(module_name_from_path("./std/io.vlt"), "std.io");
    assert_eq!(module_name_from_path("math.volta"), "math");
}
