//! Scopes, symbols, and the function registry.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use volta_types::TypeId;

/// A variable binding in a single scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub type_id: TypeId,
    pub is_mut: bool,
}

/// A single lexical scope: name-unique within itself.
pub type Scope = HashMap<String, Symbol>;

/// How a function parameter is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamMode {
    Value,
    Ref,
    MutRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionParameter {
    pub name: String,
    pub type_id: TypeId,
    pub mode: ParamMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<FunctionParameter>,
    pub return_type: TypeId,
    pub is_extern: bool,
    pub is_pub: bool,
    /// `Some(struct_type)` for methods; `None` for free functions.
    pub owner: Option<TypeId>,
    pub has_self: bool,
    pub has_mut_self: bool,
}

/// Functions visible to the current module: its own declarations plus
/// whatever a caller merged in from other modules' public functions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionSignature>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function signature. Returns `false` (and leaves the
    /// registry unchanged) if the name is already registered.
    pub fn register(&mut self, signature: FunctionSignature) -> bool {
        if self.functions.contains_key(&signature.name) {
            return false;
        }
        self.functions.insert(signature.name.clone(), signature);
        true
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn public_functions(&self) -> impl Iterator<Item = &FunctionSignature> {
        self.functions.values().filter(|f| f.is_pub)
    }

    /// Merges another module's public functions into this registry, for
    /// cross-module resolution. Skips names already present.
    pub fn merge_public_from(&mut self, other: &FunctionRegistry) {
        for sig in other.public_functions() {
            self.functions
                .entry(sig.name.clone())
                .or_insert_with(|| sig.clone());
        }
    }
}

/// A stack of scopes with the global scope at index 0, plus the function
/// registry visible to the current module.
pub struct SymbolTable {
    scopes: Vec<Scope>,
    pub functions: FunctionRegistry,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self { scopes: vec![Scope::new()], functions: FunctionRegistry::new() }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    /// Pops the current scope. Does nothing if already at the global scope.
    pub fn exit_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn is_global_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Adds a variable to the current scope. Returns `false` if a variable
    /// of that name already exists in the current scope.
    pub fn define(&mut self, name: &str, type_id: TypeId, is_mut: bool) -> bool {
        let scope = self.scopes.last_mut().expect("global scope always present");
        if scope.contains_key(name) {
            return false;
        }
        scope.insert(name.to_string(), Symbol { name: name.to_string(), type_id, is_mut });
        true
    }

    /// Looks up a variable from the innermost scope outward.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn exists_in_current_scope(&self, name: &str) -> bool {
        self.scopes.last().map(|s| s.contains_key(name)).unwrap_or(false)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_scopes_from_innermost_out() {
        let mut table = SymbolTable::new();
        table.define("x", 1, false);
        table.enter_scope();
        table.define("y", 2, true);
        assert_eq!(table.lookup("x").unwrap().type_id, 1);
        assert_eq!(table.lookup("y").unwrap().type_id, 2);
        table.exit_scope();
        assert!(table.lookup("y").is_none());
        assert!(table.lookup("x").is_some());
    }

    #[test]
    fn redefining_in_the_same_scope_fails() {
        let mut table = SymbolTable::new();
        assert!(table.define("x", 1, false));
        assert!(!table.define("x", 2, false));
    }

    #[test]
    fn shadowing_in_a_nested_scope_succeeds() {
        let mut table = SymbolTable::new();
        table.define("x", 1, false);
        table.enter_scope();
        assert!(table.define("x", 2, true));
        assert_eq!(table.lookup("x").unwrap().type_id, 2);
    }

    #[test]
    fn function_registry_rejects_duplicate_names() {
        let mut functions = FunctionRegistry::new();
        let sig = FunctionSignature {
            name: "f".into(),
            params: vec![],
            return_type: 0,
            is_extern: false,
            is_pub: true,
            owner: None,
            has_self: false,
            has_mut_self: false,
        };
        assert!(functions.register(sig.clone()));
        assert!(!functions.register(sig));
    }
}
