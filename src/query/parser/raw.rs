//! Parse trees before name resolution.
//!
//! Raw trees keep names exactly as written and placeholders as
//! [`Value::Param`]; nothing here depends on an observer, so one raw tree can
//! be cached and resolved many times.

use std::time::Duration;

use crate::query::ast::Sort;
use crate::query::condition::{ConditionKind, Connective};
use crate::query::value::{Column, Value};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum RawStatement {
    Select(RawSelect),
    Delete(RawDelete),
    Insert(RawWrite),
    Update(RawWrite),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RawSelect {
    pub(crate) entity: String,
    pub(crate) fields: Vec<String>,
    pub(crate) condition: Option<RawCondition>,
    pub(crate) sorts: Vec<Sort>,
    pub(crate) limit: u64,
    pub(crate) skip: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RawDelete {
    pub(crate) entity: String,
    pub(crate) fields: Vec<String>,
    pub(crate) condition: Option<RawCondition>,
}

/// Body shared by `insert` and `update`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RawWrite {
    pub(crate) entity: String,
    pub(crate) columns: Vec<Column>,
    pub(crate) ttl: Option<Duration>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum RawCondition {
    Compare {
        field: String,
        kind: ConditionKind,
        value: Value,
    },
    Not(Box<RawCondition>),
    /// Operands joined left to right; connectives are not ranked.
    Chain {
        first: Box<RawCondition>,
        rest: Vec<(Connective, RawCondition)>,
    },
}
