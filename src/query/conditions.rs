//! Resolution of raw parse trees into statements.
//!
//! Every field name is routed through the [`Observer`] using the entity name
//! as written in the query, and every `@name` placeholder is declared in a
//! fresh [`Params`]. Leaves are built through [`Condition::compare`], so the
//! constructor invariants (two `between` bounds, list-valued `in`) hold for
//! parsed and hand-built trees alike.

use tracing::trace;

use crate::error::Result;
use crate::query::ast::{DeleteQuery, Entity, InsertQuery, SelectQuery, Sort, Statement, UpdateQuery};
use crate::query::condition::Condition;
use crate::query::observer::Observer;
use crate::query::params::Params;
use crate::query::parser::raw::{RawCondition, RawStatement, RawWrite};
use crate::query::parser::ParsedQuery;
use crate::query::value::{Column, Value};

/// Resolves `raw` against `observer`.
pub(crate) fn resolve(raw: &RawStatement, observer: &dyn Observer) -> Result<ParsedQuery> {
    let mut params = Params::new();
    let statement = match raw {
        RawStatement::Select(select) => {
            let mut scope = Scope::new(observer, &select.entity, &mut params);
            Statement::Select(SelectQuery {
                entity: scope.entity(),
                fields: scope.fields(&select.fields),
                condition: scope.optional(select.condition.as_ref())?,
                sorts: select
                    .sorts
                    .iter()
                    .map(|sort| Sort {
                        name: scope.field(&sort.name),
                        order: sort.order,
                    })
                    .collect(),
                limit: select.limit,
                skip: select.skip,
            })
        }
        RawStatement::Delete(delete) => {
            let mut scope = Scope::new(observer, &delete.entity, &mut params);
            Statement::Delete(DeleteQuery {
                entity: scope.entity(),
                fields: scope.fields(&delete.fields),
                condition: scope.optional(delete.condition.as_ref())?,
            })
        }
        RawStatement::Insert(write) => Statement::Insert(InsertQuery {
            entity: Scope::new(observer, &write.entity, &mut params).record(write),
            ttl: write.ttl,
        }),
        RawStatement::Update(write) => Statement::Update(UpdateQuery {
            entity: Scope::new(observer, &write.entity, &mut params).record(write),
        }),
    };
    trace!(params = params.len(), "resolved statement");
    Ok(ParsedQuery { statement, params })
}

/// Resolution context for one statement.
struct Scope<'a> {
    observer: &'a dyn Observer,
    entity: &'a str,
    params: &'a mut Params,
}

impl<'a> Scope<'a> {
    fn new(observer: &'a dyn Observer, entity: &'a str, params: &'a mut Params) -> Self {
        Self {
            observer,
            entity,
            params,
        }
    }

    fn entity(&self) -> String {
        self.observer.resolve_entity(self.entity)
    }

    fn field(&self, name: &str) -> String {
        self.observer.resolve_field(self.entity, name)
    }

    fn fields(&self, names: &[String]) -> Vec<String> {
        names.iter().map(|name| self.field(name)).collect()
    }

    fn value(&mut self, value: &Value) -> Value {
        let params = &mut *self.params;
        value.visit_params(&mut |name| {
            params.declare(name);
        });
        value.clone()
    }

    fn record(mut self, write: &RawWrite) -> Entity {
        let columns = write
            .columns
            .iter()
            .map(|column| Column::new(self.field(&column.name), self.value(&column.value)))
            .collect();
        Entity {
            name: self.entity(),
            columns,
        }
    }

    fn optional(&mut self, raw: Option<&RawCondition>) -> Result<Option<Condition>> {
        raw.map(|raw| self.condition(raw)).transpose()
    }

    fn condition(&mut self, raw: &RawCondition) -> Result<Condition> {
        match raw {
            RawCondition::Compare { field, kind, value } => {
                let column = Column::new(self.field(field), self.value(value));
                Condition::compare(*kind, column)
            }
            RawCondition::Not(inner) => Ok(self.condition(inner)?.negate()),
            RawCondition::Chain { first, rest } => {
                let mut tree = self.condition(first)?;
                for (connective, next) in rest {
                    tree = tree.combine(*connective, self.condition(next)?);
                }
                Ok(tree)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryConfig;
    use crate::query::condition::ConditionKind;
    use crate::query::observer::{IdentityObserver, MappedObserver};
    use crate::query::parser::parse_raw;

    fn resolve_text(query: &str, observer: &dyn Observer) -> ParsedQuery {
        let raw = parse_raw(query, &QueryConfig::default()).expect("parse");
        resolve(&raw, observer).expect("resolve")
    }

    #[test]
    fn observer_renames_entity_fields_and_sorts() {
        let observer = MappedObserver::new()
            .with_entity("Person", "people")
            .with_field("Person", "city", "address.city");
        let parsed = resolve_text(
            "select city from Person where city = 'Paris' order by city",
            &observer,
        );
        let Statement::Select(select) = parsed.statement else {
            panic!("expected select");
        };
        assert_eq!(select.entity, "people");
        assert_eq!(select.fields, vec!["address.city"]);
        assert_eq!(select.sorts, vec![Sort::asc("address.city")]);
        assert_eq!(
            select.condition,
            Some(Condition::eq(Column::new("address.city", "Paris")))
        );
    }

    #[test]
    fn placeholders_are_declared_once() {
        let parsed = resolve_text(
            "select * from God where age > @age and age < @age or name in @names",
            &IdentityObserver,
        );
        assert_eq!(parsed.params.names(), ["age", "names"]);
        assert_eq!(parsed.params.unbound().len(), 2);
    }

    #[test]
    fn write_columns_declare_nested_placeholders() {
        let parsed = resolve_text(
            "update God {name: @name, address: {city: @city}}",
            &IdentityObserver,
        );
        assert_eq!(parsed.params.names(), ["name", "city"]);
    }

    #[test]
    fn double_negation_unwraps() {
        let parsed = resolve_text(
            "delete from God where not not age = 1",
            &IdentityObserver,
        );
        let Statement::Delete(delete) = parsed.statement else {
            panic!("expected delete");
        };
        assert_eq!(delete.condition.map(|c| c.kind()), Some(ConditionKind::Equals));
    }
}
