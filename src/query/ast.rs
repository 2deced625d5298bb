//! Backend-agnostic query descriptors produced by the parser and the builder.
//!
//! Every descriptor is plain data: constructed once, never mutated afterwards,
//! and handed to a [`Backend`](crate::query::Backend) for execution.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::query::condition::Condition;
use crate::query::params::Params;
use crate::query::value::{Column, FromValue, Value};

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// One `order by` key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    /// Field to sort on.
    pub name: String,
    /// Direction.
    pub order: SortOrder,
}

impl Sort {
    /// Ascending sort on `name`.
    pub fn asc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: SortOrder::Asc,
        }
    }

    /// Descending sort on `name`.
    pub fn desc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: SortOrder::Desc,
        }
    }
}

/// A record: entity (collection/column family) name plus its columns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity name.
    pub name: String,
    /// Columns in insertion order.
    pub columns: Vec<Column>,
}

impl Entity {
    /// Creates an empty record for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Adds a column, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.push(Column::new(name, value));
        self
    }

    /// Column named `name`, if present.
    pub fn find(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Reads column `name` as `T`; `None` when the column is absent.
    pub fn get<T: FromValue>(&self, name: &str) -> Result<Option<T>> {
        self.find(name).map(|column| column.get()).transpose()
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true when the record has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Renders the columns as a plain JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.columns
                .iter()
                .map(|column| (column.name.clone(), column.value.to_json()))
                .collect(),
        )
    }

    fn bind(&self, params: &Params) -> Result<Entity> {
        let columns = self
            .columns
            .iter()
            .map(|column| Ok(Column::new(column.name.clone(), column.value.bind(params)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Entity {
            name: self.name.clone(),
            columns,
        })
    }
}

/// `select` descriptor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectQuery {
    /// Entity to read from.
    pub entity: String,
    /// Projected fields; empty means all fields.
    pub fields: Vec<String>,
    /// Optional `where` tree.
    pub condition: Option<Condition>,
    /// Sort keys in priority order.
    pub sorts: Vec<Sort>,
    /// Maximum rows; `0` means unbounded.
    pub limit: u64,
    /// Rows to skip before returning results.
    pub skip: u64,
}

impl SelectQuery {
    /// Select of all fields from `entity` with no condition.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Self::default()
        }
    }
}

/// `delete` descriptor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteQuery {
    /// Entity to delete from.
    pub entity: String,
    /// Columns to remove; empty removes whole records.
    pub fields: Vec<String>,
    /// Optional `where` tree.
    pub condition: Option<Condition>,
}

impl DeleteQuery {
    /// Delete of whole records from `entity` with no condition.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Self::default()
        }
    }
}

/// `insert` descriptor: the record plus an optional time-to-live.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InsertQuery {
    /// Record to insert.
    pub entity: Entity,
    /// Expiration duration, when the statement carried one.
    pub ttl: Option<Duration>,
}

/// `update` descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateQuery {
    /// Record carrying the new column values.
    pub entity: Entity,
}

/// Statement type tag used to pick the backend verb.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    /// `select`
    Select,
    /// `delete`
    Delete,
    /// `insert`
    Insert,
    /// `update`
    Update,
}

impl StatementKind {
    /// Keyword that introduces the statement.
    pub fn keyword(self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Delete => "delete",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
        }
    }
}

/// Any parsed statement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Statement {
    /// Read query.
    Select(SelectQuery),
    /// Delete query.
    Delete(DeleteQuery),
    /// Insert of one record.
    Insert(InsertQuery),
    /// Update of one record.
    Update(UpdateQuery),
}

impl Statement {
    /// Type tag of the statement.
    pub fn kind(&self) -> StatementKind {
        match self {
            Statement::Select(_) => StatementKind::Select,
            Statement::Delete(_) => StatementKind::Delete,
            Statement::Insert(_) => StatementKind::Insert,
            Statement::Update(_) => StatementKind::Update,
        }
    }

    /// Returns a copy with every placeholder replaced by its bound value.
    pub fn bind(&self, params: &Params) -> Result<Statement> {
        let bind_condition = |condition: &Option<Condition>| {
            condition
                .as_ref()
                .map(|condition| condition.bind(params))
                .transpose()
        };
        Ok(match self {
            Statement::Select(query) => Statement::Select(SelectQuery {
                condition: bind_condition(&query.condition)?,
                ..query.clone()
            }),
            Statement::Delete(query) => Statement::Delete(DeleteQuery {
                condition: bind_condition(&query.condition)?,
                ..query.clone()
            }),
            Statement::Insert(query) => Statement::Insert(InsertQuery {
                entity: query.entity.bind(params)?,
                ttl: query.ttl,
            }),
            Statement::Update(query) => Statement::Update(UpdateQuery {
                entity: query.entity.bind(params)?,
            }),
        })
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Select(query) => {
                write!(f, "select ")?;
                write_fields(f, &query.fields, "*")?;
                write!(f, " from {}", query.entity)?;
                if let Some(condition) = &query.condition {
                    write!(f, " where {condition}")?;
                }
                if !query.sorts.is_empty() {
                    write!(f, " order by ")?;
                    for (idx, sort) in query.sorts.iter().enumerate() {
                        if idx > 0 {
                            write!(f, ", ")?;
                        }
                        let order = match sort.order {
                            SortOrder::Asc => "asc",
                            SortOrder::Desc => "desc",
                        };
                        write!(f, "{} {order}", sort.name)?;
                    }
                }
                if query.skip > 0 {
                    write!(f, " skip {}", query.skip)?;
                }
                if query.limit > 0 {
                    write!(f, " limit {}", query.limit)?;
                }
                Ok(())
            }
            Statement::Delete(query) => {
                write!(f, "delete ")?;
                if !query.fields.is_empty() {
                    write_fields(f, &query.fields, "")?;
                    write!(f, " ")?;
                }
                write!(f, "from {}", query.entity)?;
                if let Some(condition) = &query.condition {
                    write!(f, " where {condition}")?;
                }
                Ok(())
            }
            Statement::Insert(query) => {
                write!(f, "insert ")?;
                write_entity(f, &query.entity)?;
                if let Some(ttl) = query.ttl {
                    write!(f, " ")?;
                    write_ttl(f, ttl)?;
                }
                Ok(())
            }
            Statement::Update(query) => {
                write!(f, "update ")?;
                write_entity(f, &query.entity)
            }
        }
    }
}

/// Writes `ttl` in the largest unit that represents it exactly.
fn write_ttl(f: &mut fmt::Formatter<'_>, ttl: Duration) -> fmt::Result {
    const UNITS: [(&str, u128); 6] = [
        ("day", 86_400_000_000_000),
        ("hour", 3_600_000_000_000),
        ("minute", 60_000_000_000),
        ("second", 1_000_000_000),
        ("millisecond", 1_000_000),
        ("nanosecond", 1),
    ];
    let nanos = ttl.as_nanos();
    let (unit, factor) = UNITS
        .into_iter()
        .find(|(_, factor)| nanos % factor == 0)
        .unwrap_or(("nanosecond", 1));
    let amount = nanos / factor;
    let plural = if amount == 1 { "" } else { "s" };
    write!(f, "{amount} {unit}{plural}")
}

fn write_fields(f: &mut fmt::Formatter<'_>, fields: &[String], empty: &str) -> fmt::Result {
    if fields.is_empty() {
        f.write_str(empty)
    } else {
        f.write_str(&fields.join(", "))
    }
}

fn write_entity(f: &mut fmt::Formatter<'_>, entity: &Entity) -> fmt::Result {
    write!(f, "{} (", entity.name)?;
    for (idx, column) in entity.columns.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{} = {}", column.name, column.value)?;
    }
    write!(f, ")")
}
