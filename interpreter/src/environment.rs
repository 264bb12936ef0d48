use std::collections::HashMap;

use factscript::MemorySchema;

use crate::error::SchemaViolation;
use crate::runtime_value::RuntimeValue;

/// A single scope level, one per (nested) instruction list run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    variables: HashMap<String, RuntimeValue>,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }

    pub fn get_variable(&self, name: &str) -> Option<&RuntimeValue> {
        self.variables.get(name)
    }

    pub fn set_variable(&mut self, name: &str, value: impl Into<RuntimeValue>) {
        self.variables.insert(name.to_string(), value.into());
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Check that this scope holds exactly the schema's keys, with matching types.
    pub fn conform(&self, schema: &MemorySchema) -> Result<(), SchemaViolation> {
        for &(key, expected) in schema.entries() {
            let value = self
                .variables
                .get(key)
                .ok_or_else(|| SchemaViolation::Missing {
                    key: key.to_string(),
                })?;
            let found = value.value_type();
            if found != expected {
                return Err(SchemaViolation::TypeMismatch {
                    key: key.to_string(),
                    expected,
                    found,
                });
            }
        }

        let mut unexpected: Vec<&String> = self
            .variables
            .keys()
            .filter(|key| !schema.contains(key))
            .collect();
        unexpected.sort();
        match unexpected.first() {
            Some(key) => Err(SchemaViolation::Unexpected {
                key: key.to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl<K: Into<String>, V: Into<RuntimeValue>> FromIterator<(K, V)> for Scope {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Scope {
            variables: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Scopes of one execution, outermost (root) first.
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack::default()
    }

    pub fn with_root(root: Scope) -> Self {
        ScopeStack { scopes: vec![root] }
    }

    pub fn push_scope(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    pub fn pop_scope(&mut self) -> Option<Scope> {
        self.scopes.pop()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Look up a variable, searching from innermost scope outward.
    pub fn get_variable(&self, name: &str) -> Option<&RuntimeValue> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get_variable(name))
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.get_variable(name).is_some()
    }

    /// Define-or-update: overwrite the nearest scope that already declares
    /// `name`, otherwise define it in the innermost scope.
    ///
    /// Returns false when there is no scope to define it in.
    pub fn assign(&mut self, name: &str, value: impl Into<RuntimeValue>) -> bool {
        let target = match self.scopes.iter().rposition(|scope| scope.has_variable(name)) {
            Some(index) => self.scopes.get_mut(index),
            None => self.scopes.last_mut(),
        };
        match target {
            Some(scope) => {
                scope.set_variable(name, value);
                true
            }
            None => false,
        }
    }
}
