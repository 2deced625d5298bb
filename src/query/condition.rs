//! Immutable condition trees describing `where` clauses.
//!
//! Leaves pair a field name with a value; `And`/`Or` hold child lists and
//! `Not` wraps exactly one child. The combinators consume their inputs and
//! return new trees, so a tree never changes once built.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};
use crate::query::params::Params;
use crate::query::value::{Column, Value};

/// Discriminant of a [`Condition`] node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionKind {
    /// `field = value`
    Equals,
    /// `field > value`
    GreaterThan,
    /// `field >= value`
    GreaterEqualsThan,
    /// `field < value`
    LesserThan,
    /// `field <= value`
    LesserEqualsThan,
    /// `field in (v1, v2, ...)`
    In,
    /// `field like "pattern"`
    Like,
    /// `field between low and high`
    Between,
    /// Conjunction of child conditions.
    And,
    /// Disjunction of child conditions.
    Or,
    /// Negation of one child condition.
    Not,
}

impl ConditionKind {
    /// Returns true for leaf kinds that carry a field and a value.
    pub fn is_leaf(self) -> bool {
        !matches!(
            self,
            ConditionKind::And | ConditionKind::Or | ConditionKind::Not
        )
    }

    /// DSL spelling of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            ConditionKind::Equals => "=",
            ConditionKind::GreaterThan => ">",
            ConditionKind::GreaterEqualsThan => ">=",
            ConditionKind::LesserThan => "<",
            ConditionKind::LesserEqualsThan => "<=",
            ConditionKind::In => "in",
            ConditionKind::Like => "like",
            ConditionKind::Between => "between",
            ConditionKind::And => "and",
            ConditionKind::Or => "or",
            ConditionKind::Not => "not",
        }
    }
}

/// Boolean connective used when chaining conditions left to right.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connective {
    /// `and`
    And,
    /// `or`
    Or,
}

/// A node of a `where` clause.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "of", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Condition {
    /// Field equals value.
    Equals(Column),
    /// Field strictly greater than value.
    GreaterThan(Column),
    /// Field greater than or equal to value.
    GreaterEqualsThan(Column),
    /// Field strictly less than value.
    LesserThan(Column),
    /// Field less than or equal to value.
    LesserEqualsThan(Column),
    /// Field is one of the values in a [`Value::List`].
    In(Column),
    /// Field matches a `%`/`_` pattern.
    Like(Column),
    /// Field lies within a two-element [`Value::List`], both bounds inclusive.
    Between(Column),
    /// All children hold.
    And(Vec<Condition>),
    /// At least one child holds.
    Or(Vec<Condition>),
    /// The child does not hold.
    Not(Box<Condition>),
}

impl Condition {
    /// `column.name = column.value`
    pub fn eq(column: Column) -> Self {
        Condition::Equals(column)
    }

    /// `column.name > column.value`
    pub fn gt(column: Column) -> Self {
        Condition::GreaterThan(column)
    }

    /// `column.name >= column.value`
    pub fn gte(column: Column) -> Self {
        Condition::GreaterEqualsThan(column)
    }

    /// `column.name < column.value`
    pub fn lt(column: Column) -> Self {
        Condition::LesserThan(column)
    }

    /// `column.name <= column.value`
    pub fn lte(column: Column) -> Self {
        Condition::LesserEqualsThan(column)
    }

    /// `column.name like column.value`
    pub fn like(column: Column) -> Self {
        Condition::Like(column)
    }

    /// `column.name in (...)`; the value must be a list or a placeholder.
    pub fn in_list(column: Column) -> Result<Self> {
        match column.value {
            Value::List(_) | Value::Param(_) => Ok(Condition::In(column)),
            _ => Err(QueryError::InvalidCondition("in requires a list value")),
        }
    }

    /// `column.name between a and b`; the value must hold exactly two bounds.
    pub fn between(column: Column) -> Result<Self> {
        match &column.value {
            Value::List(bounds) if bounds.len() == 2 => Ok(Condition::Between(column)),
            _ => Err(QueryError::InvalidCondition(
                "between requires exactly two values",
            )),
        }
    }

    /// Builds a leaf condition of the given kind.
    pub fn compare(kind: ConditionKind, column: Column) -> Result<Self> {
        match kind {
            ConditionKind::Equals => Ok(Condition::eq(column)),
            ConditionKind::GreaterThan => Ok(Condition::gt(column)),
            ConditionKind::GreaterEqualsThan => Ok(Condition::gte(column)),
            ConditionKind::LesserThan => Ok(Condition::lt(column)),
            ConditionKind::LesserEqualsThan => Ok(Condition::lte(column)),
            ConditionKind::Like => Ok(Condition::like(column)),
            ConditionKind::In => Condition::in_list(column),
            ConditionKind::Between => Condition::between(column),
            ConditionKind::And | ConditionKind::Or | ConditionKind::Not => {
                Err(QueryError::UnsupportedOperator {
                    operator: kind.symbol().to_owned(),
                })
            }
        }
    }

    /// Conjunction of one or more conditions.
    pub fn and_all(conditions: Vec<Condition>) -> Result<Self> {
        if conditions.is_empty() {
            return Err(QueryError::InvalidCondition(
                "and requires at least one condition",
            ));
        }
        Ok(Condition::And(conditions))
    }

    /// Disjunction of one or more conditions.
    pub fn or_all(conditions: Vec<Condition>) -> Result<Self> {
        if conditions.is_empty() {
            return Err(QueryError::InvalidCondition(
                "or requires at least one condition",
            ));
        }
        Ok(Condition::Or(conditions))
    }

    /// Wraps the condition in `Not`; negating a `Not` unwraps it.
    ///
    /// No De Morgan rewriting happens: `a = 1` negated is `Not(a = 1)`.
    pub fn negate(self) -> Self {
        match self {
            Condition::Not(inner) => *inner,
            other => Condition::Not(Box::new(other)),
        }
    }

    /// Appends `other` to an existing `And`, or forms `And[self, other]`.
    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::And(mut children) => {
                children.push(other);
                Condition::And(children)
            }
            this => Condition::And(vec![this, other]),
        }
    }

    /// Appends `other` to an existing `Or`, or forms `Or[self, other]`.
    pub fn or(self, other: Condition) -> Self {
        match self {
            Condition::Or(mut children) => {
                children.push(other);
                Condition::Or(children)
            }
            this => Condition::Or(vec![this, other]),
        }
    }

    /// Applies [`Condition::and`] or [`Condition::or`].
    ///
    /// Folding a chain with this makes the last connective the root:
    /// `a and b or c` becomes `Or[And[a, b], c]`.
    pub fn combine(self, connective: Connective, other: Condition) -> Self {
        match connective {
            Connective::And => self.and(other),
            Connective::Or => self.or(other),
        }
    }

    /// Kind of this node.
    pub fn kind(&self) -> ConditionKind {
        match self {
            Condition::Equals(_) => ConditionKind::Equals,
            Condition::GreaterThan(_) => ConditionKind::GreaterThan,
            Condition::GreaterEqualsThan(_) => ConditionKind::GreaterEqualsThan,
            Condition::LesserThan(_) => ConditionKind::LesserThan,
            Condition::LesserEqualsThan(_) => ConditionKind::LesserEqualsThan,
            Condition::In(_) => ConditionKind::In,
            Condition::Like(_) => ConditionKind::Like,
            Condition::Between(_) => ConditionKind::Between,
            Condition::And(_) => ConditionKind::And,
            Condition::Or(_) => ConditionKind::Or,
            Condition::Not(_) => ConditionKind::Not,
        }
    }

    /// Field and value of a leaf node.
    pub fn column(&self) -> Option<&Column> {
        match self {
            Condition::Equals(c)
            | Condition::GreaterThan(c)
            | Condition::GreaterEqualsThan(c)
            | Condition::LesserThan(c)
            | Condition::LesserEqualsThan(c)
            | Condition::In(c)
            | Condition::Like(c)
            | Condition::Between(c) => Some(c),
            _ => None,
        }
    }

    /// Children of an `And`/`Or`/`Not` node; empty for leaves.
    pub fn children(&self) -> &[Condition] {
        match self {
            Condition::And(children) | Condition::Or(children) => children,
            Condition::Not(inner) => std::slice::from_ref(inner.as_ref()),
            _ => &[],
        }
    }

    /// Calls `visit` for every placeholder in the tree, depth first.
    pub fn visit_params<F: FnMut(&str)>(&self, visit: &mut F) {
        match self.column() {
            Some(column) => column.value.visit_params(visit),
            None => self
                .children()
                .iter()
                .for_each(|child| child.visit_params(visit)),
        }
    }

    /// Returns a copy with every placeholder replaced by its bound value.
    ///
    /// An `in` placeholder bound to a scalar becomes a one-element list.
    pub fn bind(&self, params: &Params) -> Result<Condition> {
        match self {
            Condition::And(children) => Ok(Condition::And(bind_all(children, params)?)),
            Condition::Or(children) => Ok(Condition::Or(bind_all(children, params)?)),
            Condition::Not(inner) => Ok(Condition::Not(Box::new(inner.bind(params)?))),
            leaf => {
                let column = leaf.column().ok_or(QueryError::InvalidCondition(
                    "leaf condition without a column",
                ))?;
                let mut value = column.value.bind(params)?;
                if leaf.kind() == ConditionKind::In && !matches!(value, Value::List(_)) {
                    value = Value::List(vec![value]);
                }
                Condition::compare(leaf.kind(), Column::new(column.name.clone(), value))
            }
        }
    }
}

fn bind_all(children: &[Condition], params: &Params) -> Result<Vec<Condition>> {
    children.iter().map(|child| child.bind(params)).collect()
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Between(column) => match &column.value {
                Value::List(bounds) if bounds.len() == 2 => write!(
                    f,
                    "{} between {} and {}",
                    column.name, bounds[0], bounds[1]
                ),
                other => write!(f, "{} between {}", column.name, other),
            },
            Condition::And(children) | Condition::Or(children) => {
                let joiner = format!(" {} ", self.kind().symbol());
                write!(f, "(")?;
                for (idx, child) in children.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(&joiner)?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
            Condition::Not(inner) => write!(f, "not {inner}"),
            leaf => match leaf.column() {
                Some(column) => write!(
                    f,
                    "{} {} {}",
                    column.name,
                    leaf.kind().symbol(),
                    column.value
                ),
                None => Ok(()),
            },
        }
    }
}
