#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;

use quill::query::{
    CacheStats, IdentityObserver, MappedObserver, QueryCache, QueryEngine, Statement,
};
use quill::QueryConfig;

const QUERY: &str = "select name from Person where age > 10 order by name";

#[test]
fn same_text_and_observer_give_equal_results() {
    let cache = QueryCache::new(16);
    let first = cache.get(QUERY, &IdentityObserver).unwrap();
    let second = cache.get(QUERY, &IdentityObserver).unwrap();
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
fn observers_apply_per_lookup() {
    let cache = QueryCache::new(16);
    let mapped = MappedObserver::new().with_entity("Person", "people");

    let plain = cache.get(QUERY, &IdentityObserver).unwrap();
    let renamed = cache.get(QUERY, &mapped).unwrap();
    let plain_again = cache.get(QUERY, &IdentityObserver).unwrap();

    let entity = |statement: &Statement| match statement {
        Statement::Select(select) => select.entity.clone(),
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(entity(&plain.statement), "Person");
    assert_eq!(entity(&renamed.statement), "people");
    assert_eq!(plain, plain_again);
    assert_eq!(cache.len(), 1);
}

#[test]
fn concurrent_lookups_share_entries() {
    let cache = Arc::new(QueryCache::new(64));
    let queries: Vec<String> = (0..8)
        .map(|i| format!("select * from God where age > {i}"))
        .collect();

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            let queries = queries.clone();
            thread::spawn(move || {
                for round in 0..50 {
                    let query = &queries[(worker + round) % queries.len()];
                    let parsed = cache.get(query, &IdentityObserver).unwrap();
                    assert!(matches!(parsed.statement, Statement::Select(_)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = cache.stats();
    assert_eq!(stats.hits + stats.misses, 8 * 50);
    assert!(stats.misses >= 8);
    assert_eq!(stats.entries, 8);
}

#[test]
fn capacity_bounds_entries() {
    let cache = QueryCache::from_config(QueryConfig {
        cache_capacity: 2,
        ..QueryConfig::default()
    });
    for entity in ["A", "B", "C"] {
        cache
            .get(&format!("select * from {entity}"), &IdentityObserver)
            .unwrap();
    }
    assert_eq!(cache.len(), 2);

    cache.get("select * from A", &IdentityObserver).unwrap();
    assert_eq!(cache.stats().misses, 4);

    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn failed_parses_are_not_cached() {
    let cache = QueryCache::new(4);
    assert!(cache.get("select * from", &IdentityObserver).is_err());
    assert!(cache.get("select * from", &IdentityObserver).is_err());
    assert!(cache.is_empty());
    assert_eq!(cache.stats().hits, 0);
}

#[test]
fn engine_reports_cache_activity() {
    let engine = QueryEngine::new();
    for _ in 0..3 {
        engine.parse(QUERY).unwrap();
    }
    let stats = engine.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 2);
}
