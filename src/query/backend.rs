//! Contract between the query core and a storage backend.
//!
//! The core never performs I/O itself: parsed or built statements are handed
//! to a [`Backend`] through [`execute`], or through the callback-accepting
//! `*_async` methods when the caller wants to dispatch without waiting.

use std::time::Duration;

use tracing::debug;

use crate::error::{QueryError, Result};
use crate::query::ast::{DeleteQuery, Entity, SelectQuery, Statement};

/// Completion callback for the asynchronous backend verbs.
pub type Callback<T> = Box<dyn FnOnce(Result<T>) + Send + 'static>;

/// Storage operations a backend exposes to the query core.
///
/// Errors a backend raises for operations it cannot express (for example
/// [`QueryError::Unsupported`]) are propagated to the caller unchanged.
pub trait Backend {
    /// Returns the records matching `query`.
    fn select(&self, query: &SelectQuery) -> Result<Vec<Entity>>;

    /// Deletes the records (or the listed columns) matching `query`.
    fn delete(&self, query: &DeleteQuery) -> Result<()>;

    /// Stores `entity`, optionally expiring after `ttl`, and returns the stored record.
    fn insert(&self, entity: &Entity, ttl: Option<Duration>) -> Result<Entity>;

    /// Updates `entity` and returns the stored record.
    fn update(&self, entity: &Entity) -> Result<Entity>;

    /// Inserts every record in order, stopping at the first failure.
    fn insert_all(&self, entities: &[Entity], ttl: Option<Duration>) -> Result<Vec<Entity>> {
        entities
            .iter()
            .map(|entity| self.insert(entity, ttl))
            .collect()
    }

    /// Updates every record in order, stopping at the first failure.
    fn update_all(&self, entities: &[Entity]) -> Result<Vec<Entity>> {
        entities.iter().map(|entity| self.update(entity)).collect()
    }

    /// Callback form of [`Backend::select`]. The default runs synchronously.
    fn select_async(&self, query: SelectQuery, callback: Callback<Vec<Entity>>) {
        callback(self.select(&query));
    }

    /// Callback form of [`Backend::delete`]. The default runs synchronously.
    fn delete_async(&self, query: DeleteQuery, callback: Callback<()>) {
        callback(self.delete(&query));
    }

    /// Callback form of [`Backend::insert`]. The default runs synchronously.
    fn insert_async(&self, entity: Entity, ttl: Option<Duration>, callback: Callback<Entity>) {
        callback(self.insert(&entity, ttl));
    }

    /// Callback form of [`Backend::update`]. The default runs synchronously.
    fn update_async(&self, entity: Entity, callback: Callback<Entity>) {
        callback(self.update(&entity));
    }
}

impl<B: Backend + ?Sized> Backend for &B {
    fn select(&self, query: &SelectQuery) -> Result<Vec<Entity>> {
        (**self).select(query)
    }

    fn delete(&self, query: &DeleteQuery) -> Result<()> {
        (**self).delete(query)
    }

    fn insert(&self, entity: &Entity, ttl: Option<Duration>) -> Result<Entity> {
        (**self).insert(entity, ttl)
    }

    fn update(&self, entity: &Entity) -> Result<Entity> {
        (**self).update(entity)
    }

    fn select_async(&self, query: SelectQuery, callback: Callback<Vec<Entity>>) {
        (**self).select_async(query, callback)
    }

    fn delete_async(&self, query: DeleteQuery, callback: Callback<()>) {
        (**self).delete_async(query, callback)
    }

    fn insert_async(&self, entity: Entity, ttl: Option<Duration>, callback: Callback<Entity>) {
        (**self).insert_async(entity, ttl, callback)
    }

    fn update_async(&self, entity: Entity, callback: Callback<Entity>) {
        (**self).update_async(entity, callback)
    }
}

/// Runs `statement` with exactly one backend call.
///
/// Selects return their rows, deletes an empty list, and inserts and updates
/// a one-element list holding the record the backend returned.
pub fn execute<B: Backend + ?Sized>(backend: &B, statement: &Statement) -> Result<Vec<Entity>> {
    debug!(kind = statement.kind().keyword(), "dispatching statement to backend");
    match statement {
        Statement::Select(query) => backend.select(query),
        Statement::Delete(query) => backend.delete(query).map(|()| Vec::new()),
        Statement::Insert(query) => backend.insert(&query.entity, query.ttl).map(|row| vec![row]),
        Statement::Update(query) => backend.update(&query.entity).map(|row| vec![row]),
    }
}

/// Callback form of [`execute`], with the same result shapes.
pub fn execute_async<B: Backend + ?Sized>(
    backend: &B,
    statement: Statement,
    callback: Callback<Vec<Entity>>,
) {
    debug!(kind = statement.kind().keyword(), "dispatching statement to backend (async)");
    match statement {
        Statement::Select(query) => backend.select_async(query, callback),
        Statement::Delete(query) => {
            backend.delete_async(query, Box::new(move |result| callback(result.map(|()| Vec::new()))))
        }
        Statement::Insert(query) => backend.insert_async(
            query.entity,
            query.ttl,
            Box::new(move |result| callback(result.map(|row| vec![row]))),
        ),
        Statement::Update(query) => backend.update_async(
            query.entity,
            Box::new(move |result| callback(result.map(|row| vec![row]))),
        ),
    }
}

/// Reduces a result list to at most one record.
pub fn into_single(rows: Vec<Entity>) -> Result<Option<Entity>> {
    if rows.len() > 1 {
        return Err(QueryError::NonUniqueResult { count: rows.len() });
    }
    Ok(rows.into_iter().next())
}
