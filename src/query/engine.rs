//! Entry points tying the parser, cache, observer and backend together.

use tracing::debug;

use crate::config::QueryConfig;
use crate::error::Result;
use crate::query::ast::{Entity, Statement};
use crate::query::backend::{self, Backend};
use crate::query::cache::{CacheStats, QueryCache};
use crate::query::observer::{IdentityObserver, Observer};
use crate::query::parser::ParsedQuery;
use crate::query::prepared::PreparedStatement;

/// Text-query front end.
///
/// The observer is supplied once at construction and used for every
/// statement this engine resolves; parsed trees are shared through the
/// engine's [`QueryCache`].
///
/// ```
/// use quill::query::{MemoryBackend, QueryEngine};
///
/// let engine = QueryEngine::new();
/// let backend = MemoryBackend::new();
/// engine.query("insert God (name = \"Diana\")", &backend).unwrap();
///
/// let mut prepared = engine.prepare("select * from God where name = @name", &backend).unwrap();
/// prepared.bind("name", "Diana");
/// assert_eq!(prepared.result_list().unwrap().len(), 1);
/// ```
#[derive(Debug)]
pub struct QueryEngine<O: Observer = IdentityObserver> {
    cache: QueryCache,
    observer: O,
}

impl QueryEngine<IdentityObserver> {
    /// Engine with default limits and no name mapping.
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    /// Engine using `config` for cache size and parser limits.
    pub fn with_config(config: QueryConfig) -> Self {
        Self {
            cache: QueryCache::from_config(config),
            observer: IdentityObserver,
        }
    }
}

impl Default for QueryEngine<IdentityObserver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Observer> QueryEngine<O> {
    /// Engine resolving names through `observer`.
    pub fn with_observer(config: QueryConfig, observer: O) -> Self {
        Self {
            cache: QueryCache::from_config(config),
            observer,
        }
    }

    /// The observer applied to every statement.
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Parses `query` through the cache and resolves it with this engine's observer.
    pub fn parse(&self, query: &str) -> Result<ParsedQuery> {
        self.cache.get(query, &self.observer)
    }

    /// Parses a parameter-free `query` into a statement for the caller to dispatch,
    /// for example through [`backend::execute_async`].
    pub fn statement(&self, query: &str) -> Result<Statement> {
        self.parse(query)?.into_statement()
    }

    /// Parses and runs a parameter-free `query`.
    ///
    /// Queries declaring `@name` placeholders are rejected before the backend
    /// is called; use [`QueryEngine::prepare`] for those.
    pub fn query<B: Backend + ?Sized>(&self, query: &str, backend: &B) -> Result<Vec<Entity>> {
        let statement = self.statement(query)?;
        debug!(kind = statement.kind().keyword(), "executing query");
        backend::execute(backend, &statement)
    }

    /// Like [`QueryEngine::query`] but returns at most one record.
    pub fn query_single<B: Backend + ?Sized>(
        &self,
        query: &str,
        backend: &B,
    ) -> Result<Option<Entity>> {
        backend::into_single(self.query(query, backend)?)
    }

    /// Parses `query` into a statement whose placeholders can be bound before execution.
    pub fn prepare<'b, B: Backend + ?Sized>(
        &self,
        query: &str,
        backend: &'b B,
    ) -> Result<PreparedStatement<'b, B>> {
        let parsed = self.parse(query)?;
        debug!(params = ?parsed.params.names(), "prepared statement");
        Ok(PreparedStatement::new(parsed, backend))
    }
}
