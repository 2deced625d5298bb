//! Named parameter registry collected while resolving a statement.

use std::collections::HashMap;

use tracing::debug;

use crate::query::value::Value;

/// Parameters declared by one parsed statement, plus any values bound so far.
///
/// Names are unique: a placeholder used twice in one statement is declared
/// once and bound once.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params {
    names: Vec<String>,
    values: HashMap<String, Value>,
}

impl Params {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `name` (idempotent) and returns its placeholder value.
    pub fn declare(&mut self, name: &str) -> Value {
        if !self.names.iter().any(|known| known == name) {
            self.names.push(name.to_owned());
        }
        Value::Param(name.to_owned())
    }

    /// Records a value for `name`.
    ///
    /// Binding a name the statement never declared is a silent no-op; the
    /// return value reports whether the name was known.
    pub fn bind(&mut self, name: &str, value: Value) -> bool {
        if !self.contains(name) {
            debug!(param = name, "ignoring bind for undeclared parameter");
            return false;
        }
        self.values.insert(name.to_owned(), value);
        true
    }

    /// Declared names in first-seen order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Declared names that have no value yet.
    pub fn unbound(&self) -> Vec<String> {
        self.names
            .iter()
            .filter(|name| !self.values.contains_key(*name))
            .cloned()
            .collect()
    }

    /// Bound value for `name`, if any.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns true when `name` was declared by the statement.
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|known| known == name)
    }

    /// Number of declared parameters.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true when the statement declared no parameters.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
