use std::collections::HashMap;

use crate::types::CelType;

/// Stack of local bindings introduced by comprehensions and `cel.bind`.
/// Declared environment variables live outside the stack and are shadowed
/// by any local of the same name.
#[derive(Debug, Clone)]
pub struct TypeScope {
    scopes: Vec<HashMap<String, CelType>>,
}

impl Default for TypeScope {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeScope {
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn exit_scope(&mut self) {
        self.scopes.pop();
    }

    /// Get a type by name, searching from innermost to outermost scope
    pub fn get_type(&self, name: &str) -> Option<&CelType> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn insert_type(&mut self, name: impl Into<String>, ty: CelType) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), ty);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_type(name).is_some()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_shadowing() {
        let mut scope = TypeScope::new();
        scope.enter_scope();
        scope.insert_type("x", CelType::Int);
        scope.enter_scope();
        scope.insert_type("x", CelType::String);
        assert_eq!(scope.get_type("x"), Some(&CelType::String));
        scope.exit_scope();
        assert_eq!(scope.get_type("x"), Some(&CelType::Int));
        scope.exit_scope();
        assert!(!scope.contains("x"));
        assert_eq!(scope.depth(), 0);
    }

    #[test]
    fn test_insert_without_scope_is_ignored() {
        let mut scope = TypeScope::new();
        scope.insert_type("x", CelType::Int);
        assert!(!scope.contains("x"));
    }
}
