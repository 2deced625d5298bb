//! Name resolution hooks bridging DSL-level names to storage-level names.
//!
//! Statements name entities and fields the way callers think about them; a
//! backend may store them under different names (embedded-document prefixes,
//! renamed columns). An [`Observer`] performs that translation while a raw
//! parse tree is resolved, and is consulted again on every resolution, so
//! implementations must be deterministic per `(entity, field)` pair.

use std::collections::HashMap;

/// Translates entity and field names while a statement is resolved.
pub trait Observer {
    /// Maps a DSL entity name to its storage name.
    fn resolve_entity(&self, name: &str) -> String {
        name.to_owned()
    }

    /// Maps a field of `entity` (the DSL entity name) to its storage name.
    fn resolve_field(&self, entity: &str, field: &str) -> String {
        let _ = entity;
        field.to_owned()
    }
}

impl<O: Observer + ?Sized> Observer for &O {
    fn resolve_entity(&self, name: &str) -> String {
        (**self).resolve_entity(name)
    }

    fn resolve_field(&self, entity: &str, field: &str) -> String {
        (**self).resolve_field(entity, field)
    }
}

/// Observer that leaves every name unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityObserver;

impl Observer for IdentityObserver {}

/// Observer backed by explicit rename tables; unmapped names pass through.
#[derive(Clone, Debug, Default)]
pub struct MappedObserver {
    entities: HashMap<String, String>,
    fields: HashMap<(String, String), String>,
}

impl MappedObserver {
    /// Creates an observer with no mappings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps DSL entity `name` to storage name `to`.
    pub fn with_entity(mut self, name: impl Into<String>, to: impl Into<String>) -> Self {
        self.entities.insert(name.into(), to.into());
        self
    }

    /// Maps `field` of DSL entity `entity` to storage name `to`.
    pub fn with_field(
        mut self,
        entity: impl Into<String>,
        field: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.fields.insert((entity.into(), field.into()), to.into());
        self
    }
}

impl Observer for MappedObserver {
    fn resolve_entity(&self, name: &str) -> String {
        self.entities
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_owned())
    }

    fn resolve_field(&self, entity: &str, field: &str) -> String {
        self.fields
            .get(&(entity.to_owned(), field.to_owned()))
            .cloned()
            .unwrap_or_else(|| field.to_owned())
    }
}
