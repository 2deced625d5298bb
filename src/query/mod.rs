#![forbid(unsafe_code)]

//! Query language core.
//!
//! Text statements are parsed into raw trees, resolved through an
//! [`Observer`], optionally cached, bound through prepared statements and
//! finally dispatched to a [`Backend`]. The fluent [`builder`] produces the
//! same descriptors without going through text.

/// Select/delete/insert/update descriptors, records and sort keys.
pub mod ast;

/// Storage backend contract and statement dispatch.
///
/// Exposes both synchronous verbs and callback-accepting variants.
pub mod backend;

/// Fluent query builder for programmatic query construction.
pub mod builder;

/// LRU cache of parsed statements keyed by query text.
pub mod cache;

/// Immutable condition trees for `where` clauses.
pub mod condition;

/// Resolution of raw parse trees into statements.
pub(crate) mod conditions;

/// Engine façade combining cache, observer and backend dispatch.
pub mod engine;

/// Reference in-memory backend.
pub mod memory;

/// Name-resolution hooks.
pub mod observer;

/// Named parameter registry.
pub mod params;

/// Text query parser.
///
/// Tokenizes DSL statements and builds raw trees with recursive descent.
pub mod parser;

/// Prepared statements with named parameter binding.
pub mod prepared;

/// Typed values, columns and type readers.
pub mod value;

pub use ast::{
    DeleteQuery, Entity, InsertQuery, SelectQuery, Sort, SortOrder, Statement, StatementKind,
    UpdateQuery,
};
pub use backend::{execute, execute_async, into_single, Backend, Callback};
pub use builder::{delete, delete_fields, select, select_fields, DeleteBuilder, SelectBuilder};
pub use cache::{CacheStats, QueryCache};
pub use condition::{Condition, ConditionKind, Connective};
pub use engine::QueryEngine;
pub use memory::MemoryBackend;
pub use observer::{IdentityObserver, MappedObserver, Observer};
pub use params::Params;
pub use parser::{parse, parse_literal, parse_with_config, ParsedQuery};
pub use prepared::PreparedStatement;
pub use value::{Column, FromValue, TypeHint, Value};
