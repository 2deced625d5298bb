//! Fluent construction of select and delete queries.
//!
//! ```
//! use quill::query::builder::select;
//!
//! let query = select()
//!     .from("God")
//!     .r#where("age").gt(10)
//!     .and("name").like("D%")
//!     .order_by("age").desc()
//!     .limit(5)
//!     .build()
//!     .unwrap();
//! assert_eq!(query.entity, "God");
//! ```
//!
//! `r#where`, `and` and `or` name the field for the next comparison; the
//! comparison then joins the accumulated condition using the most recent
//! connective, exactly as the text parser folds `a and b or c`. Misuse is
//! recorded and reported by `build`, so chains never panic.

use crate::error::{QueryError, Result};
use crate::query::ast::{DeleteQuery, Entity, SelectQuery, Sort, SortOrder, Statement};
use crate::query::backend::{self, Backend};
use crate::query::condition::{Condition, ConditionKind, Connective};
use crate::query::value::{Column, Value};

/// Starts a select of every field.
pub fn select() -> SelectBuilder {
    SelectBuilder::default()
}

/// Starts a select projecting `fields`.
pub fn select_fields<I, S>(fields: I) -> SelectBuilder
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    SelectBuilder {
        fields: fields.into_iter().map(Into::into).collect(),
        ..SelectBuilder::default()
    }
}

/// Starts a delete of whole records.
pub fn delete() -> DeleteBuilder {
    DeleteBuilder::default()
}

/// Starts a delete removing only `fields` from matching records.
pub fn delete_fields<I, S>(fields: I) -> DeleteBuilder
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    DeleteBuilder {
        fields: fields.into_iter().map(Into::into).collect(),
        ..DeleteBuilder::default()
    }
}

/// `where` clause under construction.
#[derive(Debug, Default)]
struct WhereState {
    field: Option<String>,
    connective: Option<Connective>,
    negate: bool,
    condition: Option<Condition>,
}

impl WhereState {
    fn start(&mut self, field: String, connective: Option<Connective>) -> Result<()> {
        if self.field.is_some() {
            return Err(QueryError::Builder("previous field has no comparison"));
        }
        match (connective, &self.condition) {
            (None, Some(_)) => return Err(QueryError::Builder("where called twice")),
            (Some(_), None) => return Err(QueryError::Builder("and/or requires a preceding where")),
            _ => {}
        }
        self.field = Some(field);
        self.connective = connective;
        self.negate = false;
        Ok(())
    }

    fn not(&mut self) -> Result<()> {
        if self.field.is_none() {
            return Err(QueryError::Builder("not requires a field"));
        }
        self.negate = !self.negate;
        Ok(())
    }

    fn compare(&mut self, kind: ConditionKind, value: Value) -> Result<()> {
        let field = self
            .field
            .take()
            .ok_or(QueryError::Builder("comparison requires where, and or or"))?;
        let mut next = Condition::compare(kind, Column::new(field, value))?;
        if std::mem::take(&mut self.negate) {
            next = next.negate();
        }
        self.condition = Some(match (self.condition.take(), self.connective) {
            (Some(tree), Some(connective)) => tree.combine(connective, next),
            _ => next,
        });
        Ok(())
    }

    fn finish(self) -> Result<Option<Condition>> {
        if self.field.is_some() {
            return Err(QueryError::Builder("last field has no comparison"));
        }
        Ok(self.condition)
    }
}

/// Generates the `where`-clause methods shared by both builders.
macro_rules! where_methods {
    ($builder:ident) => {
        impl $builder {
            /// Names the first field of the `where` clause.
            pub fn r#where(self, field: impl Into<String>) -> Self {
                let field = field.into();
                self.with_filter(|filter| filter.start(field, None))
            }

            /// Names the next field, joined with `and`.
            pub fn and(self, field: impl Into<String>) -> Self {
                let field = field.into();
                self.with_filter(|filter| filter.start(field, Some(Connective::And)))
            }

            /// Names the next field, joined with `or`.
            pub fn or(self, field: impl Into<String>) -> Self {
                let field = field.into();
                self.with_filter(|filter| filter.start(field, Some(Connective::Or)))
            }

            /// Negates the next comparison.
            pub fn not(self) -> Self {
                self.with_filter(WhereState::not)
            }

            /// `field = value`
            pub fn eq(self, value: impl Into<Value>) -> Self {
                self.compare(ConditionKind::Equals, value.into())
            }

            /// `field > value`
            pub fn gt(self, value: impl Into<Value>) -> Self {
                self.compare(ConditionKind::GreaterThan, value.into())
            }

            /// `field >= value`
            pub fn gte(self, value: impl Into<Value>) -> Self {
                self.compare(ConditionKind::GreaterEqualsThan, value.into())
            }

            /// `field < value`
            pub fn lt(self, value: impl Into<Value>) -> Self {
                self.compare(ConditionKind::LesserThan, value.into())
            }

            /// `field <= value`
            pub fn lte(self, value: impl Into<Value>) -> Self {
                self.compare(ConditionKind::LesserEqualsThan, value.into())
            }

            /// `field like pattern`
            pub fn like(self, pattern: impl Into<Value>) -> Self {
                self.compare(ConditionKind::Like, pattern.into())
            }

            /// `field in (values...)`
            pub fn r#in<I, V>(self, values: I) -> Self
            where
                I: IntoIterator<Item = V>,
                V: Into<Value>,
            {
                let values = values.into_iter().map(Into::into).collect();
                self.compare(ConditionKind::In, Value::List(values))
            }

            /// `field between low and high`, both bounds inclusive.
            pub fn between(self, low: impl Into<Value>, high: impl Into<Value>) -> Self {
                self.compare(
                    ConditionKind::Between,
                    Value::List(vec![low.into(), high.into()]),
                )
            }

            fn compare(self, kind: ConditionKind, value: Value) -> Self {
                self.with_filter(|filter| filter.compare(kind, value))
            }

            fn with_filter<F>(mut self, op: F) -> Self
            where
                F: FnOnce(&mut WhereState) -> Result<()>,
            {
                if self.error.is_some() {
                    return self;
                }
                if let Err(err) = op(&mut self.filter) {
                    self.error = Some(err);
                }
                self
            }
        }
    };
}

/// Builder for [`SelectQuery`].
#[derive(Debug, Default)]
pub struct SelectBuilder {
    fields: Vec<String>,
    entity: Option<String>,
    filter: WhereState,
    sorts: Vec<Sort>,
    pending_sort: Option<String>,
    limit: u64,
    skip: u64,
    error: Option<QueryError>,
}

where_methods!(SelectBuilder);

impl SelectBuilder {
    /// Sets the entity to read from.
    pub fn from(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Adds a sort key; ascending unless followed by [`SelectBuilder::desc`].
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.flush_sort(SortOrder::Asc);
        self.pending_sort = Some(field.into());
        self
    }

    /// Sorts the last `order_by` field ascending.
    pub fn asc(self) -> Self {
        self.direction(SortOrder::Asc)
    }

    /// Sorts the last `order_by` field descending.
    pub fn desc(self) -> Self {
        self.direction(SortOrder::Desc)
    }

    /// Caps the number of rows; `0` means unbounded.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Skips the first `skip` rows.
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    fn direction(mut self, order: SortOrder) -> Self {
        if self.error.is_none() && self.pending_sort.is_none() {
            self.error = Some(QueryError::Builder("asc/desc requires order_by"));
        }
        self.flush_sort(order);
        self
    }

    fn flush_sort(&mut self, order: SortOrder) {
        if let Some(name) = self.pending_sort.take() {
            self.sorts.push(Sort { name, order });
        }
    }

    /// Produces the query, or the first misuse recorded along the chain.
    pub fn build(mut self) -> Result<SelectQuery> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.flush_sort(SortOrder::Asc);
        let entity = self
            .entity
            .ok_or(QueryError::MissingEntity { command: "select" })?;
        Ok(SelectQuery {
            entity,
            fields: self.fields,
            condition: self.filter.finish()?,
            sorts: self.sorts,
            limit: self.limit,
            skip: self.skip,
        })
    }

    /// Builds and runs the query against `backend`.
    pub fn execute<B: Backend + ?Sized>(self, backend: &B) -> Result<Vec<Entity>> {
        backend::execute(backend, &Statement::Select(self.build()?))
    }

    /// Builds and runs the query, returning at most one record.
    pub fn execute_single<B: Backend + ?Sized>(self, backend: &B) -> Result<Option<Entity>> {
        backend::into_single(self.execute(backend)?)
    }
}

/// Builder for [`DeleteQuery`].
#[derive(Debug, Default)]
pub struct DeleteBuilder {
    fields: Vec<String>,
    entity: Option<String>,
    filter: WhereState,
    error: Option<QueryError>,
}

where_methods!(DeleteBuilder);

impl DeleteBuilder {
    /// Sets the entity to delete from.
    pub fn from(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Produces the query, or the first misuse recorded along the chain.
    pub fn build(mut self) -> Result<DeleteQuery> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        let entity = self
            .entity
            .ok_or(QueryError::MissingEntity { command: "delete" })?;
        Ok(DeleteQuery {
            entity,
            fields: self.fields,
            condition: self.filter.finish()?,
        })
    }

    /// Builds and runs the delete against `backend`.
    pub fn execute<B: Backend + ?Sized>(self, backend: &B) -> Result<()> {
        backend.delete(&self.build()?)
    }
}
