//! Text query parser.
//!
//! Parsing runs in two phases. [`parse_raw`] tokenizes the statement and
//! builds a raw tree that keeps every name as written; resolution then routes
//! names through an [`Observer`] and collects placeholders into [`Params`]. The query cache
//! stores the raw tree, so only the first phase is ever skipped.

mod lexer;
pub(crate) mod raw;
mod statement;

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::QueryConfig;
use crate::error::{QueryError, Result};
use crate::query::ast::{Statement, StatementKind};
use crate::query::conditions;
use crate::query::observer::Observer;
use crate::query::params::Params;
use crate::query::value::Value;

use self::lexer::Lexer;
use self::raw::RawStatement;
use self::statement::Parser;

/// Length of the command keyword used for dispatch.
const COMMAND_LEN: usize = 6;

/// A resolved statement together with the placeholders it declares.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParsedQuery {
    /// Statement with observer-resolved names; placeholders remain as [`Value::Param`].
    pub statement: Statement,
    /// Declared parameters, all unbound.
    #[serde(serialize_with = "serialize_param_names")]
    pub params: Params,
}

impl ParsedQuery {
    /// Type tag of the statement.
    pub fn kind(&self) -> StatementKind {
        self.statement.kind()
    }

    /// Returns true when the statement declares at least one `@name` placeholder.
    pub fn is_parameterized(&self) -> bool {
        !self.params.is_empty()
    }

    /// Unwraps a parameter-free statement.
    ///
    /// Statements with placeholders must go through a prepared statement.
    pub fn into_statement(self) -> Result<Statement> {
        if self.is_parameterized() {
            return Err(QueryError::ParametersRequirePrepare {
                names: self.params.names().to_vec(),
            });
        }
        Ok(self.statement)
    }
}

fn serialize_param_names<S: serde::Serializer>(
    params: &Params,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    params.names().serialize(serializer)
}

/// Parses and resolves `query` with the default [`QueryConfig`] limits.
///
/// ```
/// use quill::query::{parse, IdentityObserver, Statement};
///
/// let parsed = parse("select * from God", &IdentityObserver).unwrap();
/// match parsed.statement {
///     Statement::Select(select) => assert_eq!(select.entity, "God"),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
pub fn parse(query: &str, observer: &dyn Observer) -> Result<ParsedQuery> {
    parse_with_config(query, observer, &QueryConfig::default())
}

/// Parses and resolves `query` under the limits in `config`.
pub fn parse_with_config(
    query: &str,
    observer: &dyn Observer,
    config: &QueryConfig,
) -> Result<ParsedQuery> {
    let raw = parse_raw(query, config)?;
    conditions::resolve(&raw, observer)
}

/// Parses a standalone literal such as `12`, `"Ada"`, `{a: 1}` or `convert("3", int)`.
pub fn parse_literal(text: &str) -> Result<Value> {
    let config = QueryConfig::default();
    let tokens = Lexer::new(text).tokenize()?;
    let mut parser = Parser::new(text, tokens, &config);
    let value = parser.value()?;
    parser.expect_end()?;
    if let Value::Param(name) = &value {
        return Err(QueryError::syntax(
            "expected a literal, not a parameter",
            &format!("@{name}"),
        ));
    }
    Ok(value)
}

/// Selects the sub-parser from the first six characters and builds the raw tree.
pub(crate) fn parse_raw(query: &str, config: &QueryConfig) -> Result<RawStatement> {
    let command: String = query.chars().take(COMMAND_LEN).collect();
    let kind = match command.as_str() {
        "select" => StatementKind::Select,
        "delete" => StatementKind::Delete,
        "insert" => StatementKind::Insert,
        "update" => StatementKind::Update,
        _ => return Err(QueryError::unrecognized(query)),
    };
    trace!(command = kind.keyword(), "dispatching statement");

    let tokens = Lexer::new(query).tokenize()?;
    let mut parser = Parser::new(query, tokens, config);
    let raw = match kind {
        StatementKind::Select => RawStatement::Select(parser.select()?),
        StatementKind::Delete => RawStatement::Delete(parser.delete()?),
        StatementKind::Insert => RawStatement::Insert(parser.insert()?),
        StatementKind::Update => RawStatement::Update(parser.update()?),
    };
    debug!(command = kind.keyword(), "parsed statement");
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::query::ast::{Sort, SortOrder};
    use crate::query::condition::{Condition, ConditionKind};
    use crate::query::observer::IdentityObserver;
    use crate::query::value::Column;

    fn statement(query: &str) -> Statement {
        parse(query, &IdentityObserver)
            .unwrap_or_else(|err| panic!("{query}: {err}"))
            .statement
    }

    fn where_of(query: &str) -> Condition {
        match statement(query) {
            Statement::Select(select) => select.condition.expect("condition"),
            Statement::Delete(delete) => delete.condition.expect("condition"),
            other => panic!("no condition on {other:?}"),
        }
    }

    #[test]
    fn dispatch_requires_known_prefix() {
        for query in ["", "sel", "selec", "SELECT * from X", "upsert X (a = 1)", " select * from X"] {
            assert!(
                matches!(
                    parse(query, &IdentityObserver),
                    Err(QueryError::UnrecognizedCommand { .. })
                ),
                "{query:?}"
            );
        }
    }

    #[test]
    fn select_clauses_in_any_order() {
        let Statement::Select(select) =
            statement("select name, age from God limit 5 order by age desc, name skip 2")
        else {
            panic!("expected select");
        };
        assert_eq!(select.fields, vec!["name", "age"]);
        assert_eq!(select.limit, 5);
        assert_eq!(select.skip, 2);
        assert_eq!(
            select.sorts,
            vec![
                Sort::desc("age"),
                Sort {
                    name: "name".into(),
                    order: SortOrder::Asc
                }
            ]
        );
    }

    #[test]
    fn duplicate_or_negative_clauses_fail() {
        assert!(parse("select * from God limit 1 limit 2", &IdentityObserver).is_err());
        assert!(parse("select * from God skip -1", &IdentityObserver).is_err());
    }

    #[test]
    fn missing_entity_is_reported() {
        for (query, command) in [
            ("select * from", "select"),
            ("select name", "select"),
            ("delete from", "delete"),
            ("insert", "insert"),
            ("update", "update"),
        ] {
            assert_eq!(
                parse(query, &IdentityObserver).unwrap_err(),
                QueryError::MissingEntity { command },
                "{query}"
            );
        }
    }

    #[test]
    fn mixed_connectives_fold_left_to_right() {
        let tree = where_of("select * from God where a = 1 and b = 2 or c = 3");
        let Condition::Or(children) = tree else {
            panic!("expected Or root");
        };
        assert_eq!(children[0].kind(), ConditionKind::And);
        assert_eq!(children[1], Condition::eq(Column::new("c", 3i64)));
    }

    #[test]
    fn groups_are_single_operands() {
        let tree = where_of("select * from God where a = 1 and (b = 2 or c = 3)");
        let Condition::And(children) = tree else {
            panic!("expected And root");
        };
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].kind(), ConditionKind::Or);
    }

    #[test]
    fn not_wraps_operands() {
        let tree = where_of("delete from God where not (a = 1 and b = 2)");
        assert_eq!(tree.kind(), ConditionKind::Not);
        assert_eq!(tree.children()[0].kind(), ConditionKind::And);

        let tree = where_of("delete from God where name not in (\"a\", \"b\")");
        assert_eq!(tree.kind(), ConditionKind::Not);
        assert_eq!(tree.children()[0].kind(), ConditionKind::In);
    }

    #[test]
    fn between_and_in_lists() {
        assert_eq!(
            where_of("delete from God where age between 10 and 30"),
            Condition::between(Column::new("age", vec![10i64, 30])).unwrap()
        );
        assert_eq!(
            where_of("select * from God where name in ('Ada', \"Bob\")"),
            Condition::in_list(Column::new("name", vec!["Ada", "Bob"])).unwrap()
        );
        assert_eq!(
            where_of("select * from God where name in {'Ada'}"),
            Condition::in_list(Column::new("name", vec!["Ada"])).unwrap()
        );
    }

    #[test]
    fn nested_documents_compare_by_equals() {
        let tree = where_of("select * from Person where address = {city: 'Paris', \"zip\": 75001}");
        assert_eq!(
            tree,
            Condition::eq(Column::new(
                "address",
                Value::document([Column::new("city", "Paris"), Column::new("zip", 75001i64)])
            ))
        );
    }

    #[test]
    fn convert_coerces_literals() {
        assert_eq!(
            where_of("select * from God where age = convert(\"12\", java.lang.Integer)"),
            Condition::eq(Column::new("age", 12i64))
        );
        assert!(matches!(
            parse("select * from God where age = convert(12, Widget)", &IdentityObserver),
            Err(QueryError::UnsupportedType { .. })
        ));
        assert!(matches!(
            parse("select * from God where age = convert(@age, int)", &IdentityObserver),
            Err(QueryError::Syntax { .. })
        ));
    }

    #[test]
    fn insert_forms_and_ttl() {
        let Statement::Insert(insert) = statement("insert God (name = \"Diana\", age = 3) 10 seconds")
        else {
            panic!("expected insert");
        };
        assert_eq!(insert.entity.name, "God");
        assert_eq!(insert.entity.len(), 2);
        assert_eq!(insert.ttl, Some(Duration::from_secs(10)));

        let Statement::Insert(json) = statement("insert God {\"name\": \"Diana\", tags: [\"a\"]}")
        else {
            panic!("expected insert");
        };
        assert_eq!(json.entity.get::<String>("name").unwrap().as_deref(), Some("Diana"));
        assert_eq!(json.ttl, None);

        assert!(parse("insert God (name = 1) 3 fortnights", &IdentityObserver).is_err());
    }

    #[test]
    fn update_accepts_wrapped_json() {
        let Statement::Update(update) = statement("update God ({name: 'Diana', age: 4.5})") else {
            panic!("expected update");
        };
        assert_eq!(update.entity.get::<f64>("age").unwrap(), Some(4.5));
    }

    #[test]
    fn unsupported_operator_is_named() {
        assert_eq!(
            parse("select * from God where age near 3", &IdentityObserver).unwrap_err(),
            QueryError::UnsupportedOperator {
                operator: "near".into()
            }
        );
    }

    #[test]
    fn syntax_errors_quote_the_failing_fragment() {
        match parse("select * from God where age = ", &IdentityObserver).unwrap_err() {
            QueryError::Syntax { fragment, .. } => assert_eq!(fragment, ""),
            other => panic!("unexpected {other:?}"),
        }
        match parse("select * from God where age = 1 garbage here", &IdentityObserver).unwrap_err() {
            QueryError::Syntax { fragment, .. } => assert_eq!(fragment, "garbage here"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn limits_are_enforced() {
        let config = QueryConfig {
            max_condition_depth: 2,
            max_in_list: 2,
            ..QueryConfig::default()
        };
        assert!(matches!(
            parse_with_config("select * from A where not not not a = 1", &IdentityObserver, &config),
            Err(QueryError::LimitExceeded { what: "condition depth", .. })
        ));
        assert!(matches!(
            parse_with_config("select * from A where a in (1, 2, 3)", &IdentityObserver, &config),
            Err(QueryError::LimitExceeded { what: "in list", .. })
        ));
        for query in ["select * from A where a in [1, 2, 3]", "select * from A where a in {1, 2, 3}"] {
            assert!(
                matches!(
                    parse_with_config(query, &IdentityObserver, &config),
                    Err(QueryError::LimitExceeded { what: "in list", .. })
                ),
                "{query}"
            );
        }
        assert!(parse_with_config("select * from A where a in [1, 2]", &IdentityObserver, &config).is_ok());
        assert!(parse_with_config("select * from A where (not a = 1)", &IdentityObserver, &config).is_ok());
    }

    #[test]
    fn literal_nesting_is_bounded() {
        let config = QueryConfig {
            max_literal_depth: 3,
            ..QueryConfig::default()
        };
        let lists = format!("insert A {{k: {}1{}}}", "[".repeat(1000), "]".repeat(1000));
        let documents = format!("select * from A where a = {}1{}", "{k: ".repeat(1000), "}".repeat(1000));
        for query in [&lists, &documents] {
            for config in [&config, &QueryConfig::default()] {
                assert!(matches!(
                    parse_with_config(query, &IdentityObserver, config),
                    Err(QueryError::LimitExceeded { what: "literal depth", .. })
                ));
            }
        }
        assert!(parse_with_config("insert A {k: [[[1]]]}", &IdentityObserver, &config).is_ok());
        assert!(parse_with_config("insert A {k: [[[[1]]]]}", &IdentityObserver, &config).is_err());
        assert!(matches!(
            parse_literal(&format!("{}1{}", "[".repeat(500), "]".repeat(500))),
            Err(QueryError::LimitExceeded { .. })
        ));
    }

    #[test]
    fn literals_parse_standalone() {
        assert_eq!(parse_literal("12").unwrap(), Value::Int(12));
        assert_eq!(parse_literal("'Ada'").unwrap(), Value::from("Ada"));
        assert_eq!(parse_literal("[1, 2.5]").unwrap(), Value::List(vec![Value::Int(1), Value::Float(2.5)]));
        assert!(parse_literal("@age").is_err());
        assert!(parse_literal("1 2").is_err());
    }
}
