//! In-memory backend evaluating statements over plain record lists.
//!
//! Used by the CLI and by tests as a reference for how a backend interprets
//! the condition tree. Records live in insertion order per entity.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{QueryError, Result};
use crate::query::ast::{DeleteQuery, Entity, SelectQuery, SortOrder};
use crate::query::backend::Backend;
use crate::query::condition::Condition;
use crate::query::value::{Column, Value};

#[derive(Clone, Debug)]
struct StoredRecord {
    entity: Entity,
    ttl: Option<Duration>,
}

/// Thread-safe in-memory store implementing [`Backend`].
///
/// TTLs are recorded but records never expire.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entities: RwLock<HashMap<String, Vec<StoredRecord>>>,
}

impl MemoryBackend {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `{"Entity": [{"field": value, ...}, ...], ...}`.
    pub fn from_json(data: serde_json::Value) -> Result<Self> {
        let entities = match data {
            serde_json::Value::Object(entities) => entities,
            other => return Err(shape_error(&other, "object of entity arrays")),
        };
        let mut store: HashMap<String, Vec<StoredRecord>> = HashMap::new();
        for (name, rows) in entities {
            let rows = match rows {
                serde_json::Value::Array(rows) => rows,
                other => return Err(shape_error(&other, "array of records")),
            };
            let records = store.entry(name.clone()).or_default();
            for row in rows {
                let columns = match Value::from_json(row) {
                    Value::Document(columns) => columns,
                    other => return Err(shape_error(&other.to_json(), "record object")),
                };
                records.push(StoredRecord {
                    entity: Entity {
                        name: name.clone(),
                        columns,
                    },
                    ttl: None,
                });
            }
        }
        Ok(Self {
            entities: RwLock::new(store),
        })
    }

    /// Exports the store in the shape [`MemoryBackend::from_json`] accepts.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entities
                .read()
                .iter()
                .map(|(name, rows)| {
                    let rows = rows.iter().map(|row| row.entity.to_json()).collect();
                    (name.clone(), serde_json::Value::Array(rows))
                })
                .collect(),
        )
    }

    /// Number of records stored for `entity`.
    pub fn len(&self, entity: &str) -> usize {
        self.entities.read().get(entity).map_or(0, Vec::len)
    }

    /// Returns true when no entity holds any record.
    pub fn is_empty(&self) -> bool {
        self.entities.read().values().all(Vec::is_empty)
    }

    /// Snapshot of the records stored for `entity`, in insertion order.
    pub fn records(&self, entity: &str) -> Vec<Entity> {
        self.entities
            .read()
            .get(entity)
            .map(|rows| rows.iter().map(|row| row.entity.clone()).collect())
            .unwrap_or_default()
    }

    /// TTLs recorded for `entity`, parallel to [`MemoryBackend::records`].
    pub fn ttls(&self, entity: &str) -> Vec<Option<Duration>> {
        self.entities
            .read()
            .get(entity)
            .map(|rows| rows.iter().map(|row| row.ttl).collect())
            .unwrap_or_default()
    }
}

impl Backend for MemoryBackend {
    fn select(&self, query: &SelectQuery) -> Result<Vec<Entity>> {
        let store = self.entities.read();
        let mut rows = Vec::new();
        for record in store.get(&query.entity).into_iter().flatten() {
            if matches_optional(&record.entity, query.condition.as_ref())? {
                rows.push(&record.entity);
            }
        }

        rows.sort_by(|a, b| {
            query
                .sorts
                .iter()
                .map(|sort| {
                    let ordering = order_missing_first(lookup(a, &sort.name), lookup(b, &sort.name));
                    match sort.order {
                        SortOrder::Asc => ordering,
                        SortOrder::Desc => ordering.reverse(),
                    }
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        });

        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = match query.limit {
            0 => usize::MAX,
            n => usize::try_from(n).unwrap_or(usize::MAX),
        };
        let result: Vec<Entity> = rows
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|row| project(row, &query.fields))
            .collect();
        debug!(entity = %query.entity, rows = result.len(), "memory select");
        Ok(result)
    }

    fn delete(&self, query: &DeleteQuery) -> Result<()> {
        let mut store = self.entities.write();
        let Some(records) = store.get_mut(&query.entity) else {
            return Ok(());
        };
        let hits = records
            .iter()
            .map(|record| matches_optional(&record.entity, query.condition.as_ref()))
            .collect::<Result<Vec<bool>>>()?;
        let touched = hits.iter().filter(|hit| **hit).count();
        if query.fields.is_empty() {
            let mut hits = hits.into_iter();
            records.retain(|_| !hits.next().unwrap_or(false));
        } else {
            for (record, _) in records.iter_mut().zip(&hits).filter(|(_, hit)| **hit) {
                record
                    .entity
                    .columns
                    .retain(|column| !query.fields.contains(&column.name));
            }
        }
        debug!(entity = %query.entity, rows = touched, "memory delete");
        Ok(())
    }

    fn insert(&self, entity: &Entity, ttl: Option<Duration>) -> Result<Entity> {
        reject_params(entity)?;
        self.entities
            .write()
            .entry(entity.name.clone())
            .or_default()
            .push(StoredRecord {
                entity: entity.clone(),
                ttl,
            });
        debug!(entity = %entity.name, ?ttl, "memory insert");
        Ok(entity.clone())
    }

    fn update(&self, entity: &Entity) -> Result<Entity> {
        reject_params(entity)?;
        let key = entity
            .columns
            .first()
            .ok_or_else(|| QueryError::unsupported("update requires at least one column"))?;
        let mut store = self.entities.write();
        let records = store.entry(entity.name.clone()).or_default();
        let existing = records.iter().position(|record| {
            record
                .entity
                .find(&key.name)
                .is_some_and(|column| values_equal(&column.value, &key.value))
        });
        match existing {
            Some(idx) => records[idx].entity = entity.clone(),
            None => records.push(StoredRecord {
                entity: entity.clone(),
                ttl: None,
            }),
        }
        debug!(entity = %entity.name, key = %key.name, "memory update");
        Ok(entity.clone())
    }
}

fn shape_error(json: &serde_json::Value, target: &'static str) -> QueryError {
    QueryError::Conversion {
        value: json.to_string(),
        target,
    }
}

fn reject_params(entity: &Entity) -> Result<()> {
    for column in &entity.columns {
        let mut unbound = None;
        column.value.visit_params(&mut |name| {
            unbound.get_or_insert_with(|| name.to_owned());
        });
        if let Some(name) = unbound {
            return Err(QueryError::unsupported(format!(
                "memory backend cannot store unbound parameter @{name}"
            )));
        }
    }
    Ok(())
}

/// Looks up `path` by exact column name, then by descending dotted segments
/// into nested documents.
fn lookup<'a>(entity: &'a Entity, path: &str) -> Option<&'a Value> {
    if let Some(column) = entity.find(path) {
        return Some(&column.value);
    }
    let mut segments = path.split('.');
    let mut current = &entity.find(segments.next()?)?.value;
    for segment in segments {
        let Value::Document(columns) = current else {
            return None;
        };
        current = &columns.iter().find(|column| column.name == segment)?.value;
    }
    Some(current)
}

fn project(entity: &Entity, fields: &[String]) -> Entity {
    if fields.is_empty() {
        return entity.clone();
    }
    Entity {
        name: entity.name.clone(),
        columns: fields
            .iter()
            .filter_map(|field| lookup(entity, field).map(|value| Column::new(field.clone(), value.clone())))
            .collect(),
    }
}

fn matches_optional(entity: &Entity, condition: Option<&Condition>) -> Result<bool> {
    condition.map_or(Ok(true), |condition| matches(entity, condition))
}

fn matches(entity: &Entity, condition: &Condition) -> Result<bool> {
    match condition {
        Condition::And(children) => {
            for child in children {
                if !matches(entity, child)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Condition::Or(children) => {
            for child in children {
                if matches(entity, child)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Condition::Not(inner) => Ok(!matches(entity, inner)?),
        leaf => {
            let Some(column) = leaf.column() else {
                return Ok(false);
            };
            if let Value::Param(name) = &column.value {
                return Err(QueryError::unsupported(format!(
                    "memory backend cannot evaluate unbound parameter @{name}"
                )));
            }
            let Some(actual) = lookup(entity, &column.name) else {
                return Ok(false);
            };
            Ok(evaluate(leaf, actual, &column.value))
        }
    }
}

fn evaluate(leaf: &Condition, actual: &Value, expected: &Value) -> bool {
    let ordering = || compare_values(actual, expected);
    match leaf {
        Condition::Equals(_) => values_equal(actual, expected),
        Condition::GreaterThan(_) => ordering() == Some(Ordering::Greater),
        Condition::GreaterEqualsThan(_) => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
        Condition::LesserThan(_) => ordering() == Some(Ordering::Less),
        Condition::LesserEqualsThan(_) => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
        Condition::In(_) => match expected {
            Value::List(items) => items.iter().any(|item| values_equal(actual, item)),
            single => values_equal(actual, single),
        },
        Condition::Like(_) => match (actual, expected) {
            (Value::String(text), Value::String(pattern)) => like(pattern, text),
            _ => false,
        },
        Condition::Between(_) => match expected {
            Value::List(bounds) if bounds.len() == 2 => {
                matches!(
                    compare_values(actual, &bounds[0]),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(
                    compare_values(actual, &bounds[1]),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }
            _ => false,
        },
        Condition::And(_) | Condition::Or(_) | Condition::Not(_) => false,
    }
}

/// Equality with Int/Float cross-comparison and order-insensitive documents.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            compare_values(a, b) == Some(Ordering::Equal)
        }
        (Value::List(left), Value::List(right)) => {
            left.len() == right.len() && left.iter().zip(right).all(|(l, r)| values_equal(l, r))
        }
        (Value::Document(left), Value::Document(right)) => {
            left.len() == right.len()
                && left.iter().all(|column| {
                    right
                        .iter()
                        .find(|other| other.name == column.name)
                        .is_some_and(|other| values_equal(&column.value, &other.value))
                })
        }
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn order_missing_first(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => sort_order(a, b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Total order for sorting: numbers compare numerically, lists element-wise,
/// and values of different types fall back to their type rank.
fn sort_order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Int(x), Value::Float(y)) => (*x as f64).total_cmp(y),
        (Value::Float(x), Value::Int(y)) => x.total_cmp(&(*y as f64)),
        (Value::Float(x), Value::Float(y)) => x.total_cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::List(x), Value::List(y)) => x
            .iter()
            .zip(y)
            .map(|(x, y)| sort_order(x, y))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Param(x), Value::Param(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::String(_) => 3,
        Value::List(_) => 4,
        Value::Document(_) => 5,
        Value::Param(_) => 6,
    }
}

/// SQL-style pattern match: `%` matches any run of characters, `_` exactly one.
fn like(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    // matched[j]: pattern[..i] matches text[..j]
    let mut matched = vec![false; text.len() + 1];
    matched[0] = true;
    for &p in &pattern {
        let mut next = vec![false; text.len() + 1];
        match p {
            '%' => {
                let mut seen = false;
                for j in 0..=text.len() {
                    seen |= matched[j];
                    next[j] = seen;
                }
            }
            _ => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1] && (p == '_' || p == text[j - 1]);
                }
            }
        }
        matched = next;
    }
    matched[text.len()]
}
