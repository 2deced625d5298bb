//! Cache of parsed statements keyed by the exact query text.
//!
//! Entries hold the raw parse tree, before any observer has touched it. Each
//! [`QueryCache::get`] resolves the cached tree against the observer it was
//! given, so callers with different observers can share one cache.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::config::QueryConfig;
use crate::error::Result;
use crate::query::conditions;
use crate::query::observer::Observer;
use crate::query::parser::raw::RawStatement;
use crate::query::parser::{parse_raw, ParsedQuery};

/// Hit/miss counters and current size of a [`QueryCache`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that had to parse.
    pub misses: u64,
    /// Statements currently cached.
    pub entries: usize,
}

/// LRU cache of parsed statements, safe to share between threads.
///
/// Two threads missing on the same text may both parse it; the later insert
/// wins. Parse errors are never cached.
pub struct QueryCache {
    entries: Option<Mutex<LruCache<String, Arc<RawStatement>>>>,
    config: QueryConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryCache {
    /// Cache holding up to `capacity` statements with default parser limits.
    /// A capacity of `0` disables caching.
    pub fn new(capacity: usize) -> Self {
        Self::from_config(QueryConfig {
            cache_capacity: capacity,
            ..QueryConfig::default()
        })
    }

    /// Cache sized and limited by `config`.
    pub fn from_config(config: QueryConfig) -> Self {
        let entries = NonZeroUsize::new(config.cache_capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        Self {
            entries,
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the resolved statement for `query`, parsing it on a miss.
    pub fn get(&self, query: &str, observer: &dyn Observer) -> Result<ParsedQuery> {
        let raw = self.raw(query)?;
        conditions::resolve(&raw, observer)
    }

    fn raw(&self, query: &str) -> Result<Arc<RawStatement>> {
        let Some(entries) = &self.entries else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return parse_raw(query, &self.config).map(Arc::new);
        };

        if let Some(raw) = entries.lock().get(query).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(query, "query cache hit");
            return Ok(raw);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(query, "query cache miss");
        let raw = Arc::new(parse_raw(query, &self.config)?);
        entries.lock().put(query.to_owned(), Arc::clone(&raw));
        Ok(raw)
    }

    /// Parser limits applied on a miss.
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Number of cached statements.
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |entries| entries.lock().len())
    }

    /// Returns true when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached statement. Counters are kept.
    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            entries.lock().clear();
        }
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::from_config(QueryConfig::default())
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::observer::{IdentityObserver, MappedObserver};
    use crate::query::ast::Statement;

    #[test]
    fn second_lookup_hits() {
        let cache = QueryCache::new(8);
        let first = cache.get("select * from God", &IdentityObserver).unwrap();
        let second = cache.get("select * from God", &IdentityObserver).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn keys_are_exact_text() {
        let cache = QueryCache::new(8);
        cache.get("select * from God", &IdentityObserver).unwrap();
        cache.get("select *  from God", &IdentityObserver).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn observer_applies_on_every_lookup() {
        let cache = QueryCache::new(8);
        let renamed = MappedObserver::new().with_entity("God", "deities");
        cache.get("select * from God", &IdentityObserver).unwrap();
        let parsed = cache.get("select * from God", &renamed).unwrap();
        match parsed.statement {
            Statement::Select(select) => assert_eq!(select.entity, "deities"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn errors_are_not_cached() {
        let cache = QueryCache::new(8);
        assert!(cache.get("select from", &IdentityObserver).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let cache = QueryCache::new(0);
        cache.get("select * from God", &IdentityObserver).unwrap();
        cache.get("select * from God", &IdentityObserver).unwrap();
        assert_eq!(cache.stats().misses, 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn least_recently_used_entry_is_evicted() {
        let cache = QueryCache::new(2);
        cache.get("select * from A", &IdentityObserver).unwrap();
        cache.get("select * from B", &IdentityObserver).unwrap();
        cache.get("select * from A", &IdentityObserver).unwrap();
        cache.get("select * from C", &IdentityObserver).unwrap();
        cache.get("select * from A", &IdentityObserver).unwrap();
        assert_eq!(cache.stats().hits, 2);
        assert_eq!(cache.len(), 2);
    }
}
