//! Prepared statements: bind named parameters, then execute once per call.

use std::fmt;

use tracing::{debug, warn};

use crate::error::{QueryError, Result};
use crate::query::ast::{Entity, Statement, StatementKind};
use crate::query::backend::{self, Backend, Callback};
use crate::query::params::Params;
use crate::query::parser::ParsedQuery;
use crate::query::value::Value;

/// A parsed statement waiting for its parameters.
///
/// Every `execute`-family call checks that all declared parameters are bound
/// and then makes exactly one backend call. Binding takes `&mut self`, so a
/// bind/execute session belongs to one owner at a time; clone the statement
/// to run independent parameter sets.
pub struct PreparedStatement<'b, B: Backend + ?Sized> {
    statement: Statement,
    params: Params,
    backend: &'b B,
}

impl<'b, B: Backend + ?Sized> PreparedStatement<'b, B> {
    /// Wraps a parsed statement for execution against `backend`.
    pub fn new(parsed: ParsedQuery, backend: &'b B) -> Self {
        Self {
            statement: parsed.statement,
            params: parsed.params,
            backend,
        }
    }

    /// Records `value` for `name`. Names the statement never declared are ignored.
    pub fn bind(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        if self.params.bind(name, value.into()) {
            debug!(param = name, "bound parameter");
        }
        self
    }

    /// Declared parameter names in first-seen order.
    pub fn params(&self) -> &[String] {
        self.params.names()
    }

    /// Declared names still waiting for a value.
    pub fn unbound(&self) -> Vec<String> {
        self.params.unbound()
    }

    /// Type tag of the underlying statement.
    pub fn kind(&self) -> StatementKind {
        self.statement.kind()
    }

    /// The statement with every placeholder replaced by its bound value.
    ///
    /// Use this to dispatch the statement yourself, for example through
    /// [`backend::execute_async`].
    pub fn statement(&self) -> Result<Statement> {
        let unbound = self.params.unbound();
        if !unbound.is_empty() {
            warn!(params = ?unbound, "execute with unbound parameters");
            return Err(QueryError::UnboundParameters { names: unbound });
        }
        self.statement.bind(&self.params)
    }

    /// Executes the statement. See [`backend::execute`] for the result shapes.
    pub fn execute(&self) -> Result<Vec<Entity>> {
        let statement = self.statement()?;
        backend::execute(self.backend, &statement)
    }

    /// Alias of [`PreparedStatement::execute`] for read queries.
    pub fn result_list(&self) -> Result<Vec<Entity>> {
        self.execute()
    }

    /// Executes and returns at most one record; more than one is an error.
    pub fn single_result(&self) -> Result<Option<Entity>> {
        backend::into_single(self.execute()?)
    }

    /// Executes through the backend's callback verbs.
    ///
    /// Binding errors are reported through `callback` without calling the backend.
    pub fn execute_async(&self, callback: Callback<Vec<Entity>>) {
        match self.statement() {
            Ok(statement) => backend::execute_async(self.backend, statement, callback),
            Err(err) => callback(Err(err)),
        }
    }
}

impl<B: Backend + ?Sized> Clone for PreparedStatement<'_, B> {
    fn clone(&self) -> Self {
        Self {
            statement: self.statement.clone(),
            params: self.params.clone(),
            backend: self.backend,
        }
    }
}

impl<B: Backend + ?Sized> fmt::Debug for PreparedStatement<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("statement", &self.statement)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
