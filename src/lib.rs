//! Quill: a text query language and condition-tree compiler for NoSQL backends.
//!
//! Statements such as `select * from God where age > 10 order by name desc` are
//! tokenized, parsed, resolved against a caller-supplied [`query::Observer`],
//! and compiled into backend-agnostic query descriptors. Parameterized
//! statements (`@name`) go through [`query::PreparedStatement`]; storage is
//! reached only through the [`query::Backend`] trait.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod query;

pub use config::QueryConfig;
pub use error::{QueryError, Result};
