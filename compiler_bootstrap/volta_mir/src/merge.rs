//! Combines the per-source-file MIR programs a driver lowered independently
//! into one program ready for the backend: functions appended in the
//! driver's module order, with duplicate `extern` declarations (most
//! notably the allocator every module declares) collapsed to one.

use hashbrown::HashSet;

use crate::ir::Program;

/// Appends every module's functions in the order given, keeping the first
/// occurrence of any externally-declared name and dropping later duplicates
/// (an extern re-declared identically in two modules is not a conflict).
pub fn merge_modules(modules: Vec<Program>) -> Program {
    let mut merged = Program::default();
    let mut seen_externs: HashSet<String> = HashSet::new();
    let mut seen_defined: HashSet<String> = HashSet::new();

    for module in modules {
        for function in module.functions {
            if function.is_extern() {
                if seen_externs.insert(function.name.clone()) {
                    merged.functions.push(function);
                }
            } else if seen_defined.insert(function.name.clone()) {
                merged.functions.push(function);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Function, Value};

    fn extern_fn(name: &str) -> Function {
        Function { name: name.into(), params: vec![], return_type: 0, blocks: vec![] }
    }

    fn defined_fn(name: &str) -> Function {
        Function { name: name.into(), params: vec![Value::Param(0, 0)], return_type: 0, blocks: vec![crate::ir::BasicBlock::new("entry")] }
    }

    #[test]
    fn duplicate_extern_declarations_collapse_to_one() {
        let a = Program { functions: vec![extern_fn("volta_gc_malloc"), defined_fn("main")] };
        let b = Program { functions: vec![extern_fn("volta_gc_malloc"), defined_fn("helper")] };
        let merged = merge_modules(vec![a, b]);
        let malloc_count = merged.functions.iter().filter(|f| f.name == "volta_gc_malloc").count();
        assert_eq!(malloc_count, 1);
        assert_eq!(merged.functions.len(), 3);
    }

    #[test]
    fn functions_stay_in_module_source_order() {
        let a = Program { functions: vec![defined_fn("a")] };
        let b = Program { functions: vec![defined_fn("b")] };
        let merged = merge_modules(vec![a, b]);
        let names: Vec<&str> = merged.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
