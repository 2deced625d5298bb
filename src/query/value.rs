//! Canonical value representation shared by the parser, condition trees,
//! prepared statements, and backends.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};
use crate::query::params::Params;

/// Typed value tagged with explicit type information.
///
/// Parameter placeholders are ordinary values ([`Value::Param`]) until a
/// prepared statement substitutes the bound value, so every other variant is
/// immutable once constructed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    /// Null literal.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Signed 64-bit integer literal.
    Int(i64),
    /// 64-bit floating point literal.
    Float(f64),
    /// UTF-8 string literal.
    String(String),
    /// Ordered list of values (`in` lists, `between` bounds, array literals).
    List(Vec<Value>),
    /// Nested document expanded from a `{key: value}` literal.
    Document(Vec<Column>),
    /// Named placeholder (`@name`) awaiting a bound value.
    Param(String),
}

/// A named value: one field of a record or one side of a comparison.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Field name.
    pub name: String,
    /// Field value.
    pub value: Value,
}

impl Column {
    /// Creates a column from a name and anything convertible into a [`Value`].
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Reads the column value as `T`.
    pub fn get<T: FromValue>(&self) -> Result<T> {
        self.value.get()
    }
}

impl Value {
    /// Builds a nested document value.
    pub fn document(columns: impl IntoIterator<Item = Column>) -> Self {
        Value::Document(columns.into_iter().collect())
    }

    /// Builds a parameter placeholder.
    pub fn param(name: impl Into<String>) -> Self {
        Value::Param(name.into())
    }

    /// Reads the value as `T` using that type's [`FromValue`] reader.
    pub fn get<T: FromValue>(&self) -> Result<T> {
        T::from_value(self)
    }

    /// Returns true for an unbound parameter placeholder.
    pub fn is_param(&self) -> bool {
        matches!(self, Value::Param(_))
    }

    /// Short name of the variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Document(_) => "document",
            Value::Param(_) => "param",
        }
    }

    /// Calls `visit` for every parameter placeholder in this value, depth first.
    pub fn visit_params<F: FnMut(&str)>(&self, visit: &mut F) {
        match self {
            Value::Param(name) => visit(name),
            Value::List(items) => items.iter().for_each(|item| item.visit_params(visit)),
            Value::Document(columns) => columns
                .iter()
                .for_each(|column| column.value.visit_params(visit)),
            _ => {}
        }
    }

    /// Returns a copy with every placeholder replaced by its bound value.
    pub fn bind(&self, params: &Params) -> Result<Value> {
        match self {
            Value::Param(name) => {
                params
                    .value(name)
                    .cloned()
                    .ok_or_else(|| QueryError::UnboundParameters {
                        names: vec![name.clone()],
                    })
            }
            Value::List(items) => items
                .iter()
                .map(|item| item.bind(params))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            Value::Document(columns) => columns
                .iter()
                .map(|column| {
                    Ok(Column {
                        name: column.name.clone(),
                        value: column.value.bind(params)?,
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::Document),
            other => Ok(other.clone()),
        }
    }

    /// Applies a `convert(value, Type)` coercion. Lists convert element-wise.
    pub fn convert(&self, hint: TypeHint) -> Result<Value> {
        if let Value::List(items) = self {
            return items
                .iter()
                .map(|item| item.convert(hint))
                .collect::<Result<Vec<_>>>()
                .map(Value::List);
        }
        Ok(match hint {
            TypeHint::Int => Value::Int(self.get()?),
            TypeHint::Float => Value::Float(self.get()?),
            TypeHint::Bool => Value::Bool(self.get()?),
            TypeHint::String => Value::String(self.get()?),
        })
    }

    /// Converts a JSON document into a value; objects become [`Value::Document`].
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Document(
                map.into_iter()
                    .map(|(name, value)| Column::new(name, Value::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Renders the value as plain JSON (placeholders render as `"@name"`).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Document(columns) => serde_json::Value::Object(
                columns
                    .iter()
                    .map(|column| (column.name.clone(), column.value.to_json()))
                    .collect(),
            ),
            Value::Param(name) => serde_json::Value::String(format!("@{name}")),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Document(columns) => {
                write!(f, "{{")?;
                for (idx, column) in columns.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", column.name, column.value)?;
                }
                write!(f, "}}")
            }
            Value::Param(name) => write!(f, "@{name}"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Target type named in a `convert(value, Type)` literal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeHint {
    /// Signed integer.
    Int,
    /// Floating point number.
    Float,
    /// Boolean.
    Bool,
    /// String.
    String,
}

impl TypeHint {
    /// Resolves a simple or dotted type name; the last segment decides, case-insensitively.
    pub fn parse(type_name: &str) -> Result<Self> {
        let simple = type_name.rsplit('.').next().unwrap_or(type_name);
        match simple.to_ascii_lowercase().as_str() {
            "int" | "integer" | "long" | "short" | "byte" | "biginteger" => Ok(TypeHint::Int),
            "float" | "double" | "bigdecimal" | "number" => Ok(TypeHint::Float),
            "bool" | "boolean" => Ok(TypeHint::Bool),
            "string" | "char" | "character" => Ok(TypeHint::String),
            _ => Err(QueryError::UnsupportedType {
                type_name: type_name.to_owned(),
            }),
        }
    }
}

/// Type reader used by [`Value::get`].
pub trait FromValue: Sized {
    /// Reads `Self` out of `value`, converting where the reader allows it.
    fn from_value(value: &Value) -> Result<Self>;
}

fn conversion(value: &Value, target: &'static str) -> QueryError {
    QueryError::Conversion {
        value: value.to_string(),
        target,
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => Ok(*f as i64),
            Value::String(s) => s.trim().parse().map_err(|_| conversion(value, "i64")),
            _ => Err(conversion(value, "i64")),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        let wide: i64 = value.get()?;
        i32::try_from(wide).map_err(|_| conversion(value, "i32"))
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> Result<Self> {
        let wide: i64 = value.get()?;
        u64::try_from(wide).map_err(|_| conversion(value, "u64"))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            Value::String(s) => s.trim().parse().map_err(|_| conversion(value, "f64")),
            _ => Err(conversion(value, "f64")),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(conversion(value, "bool")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Int(_) | Value::Float(_) | Value::Bool(_) => Ok(value.to_string()),
            _ => Err(conversion(value, "string")),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::List(items) => items.iter().map(T::from_value).collect(),
            single => Ok(vec![T::from_value(single)?]),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_convert_between_scalars() {
        assert_eq!(Value::String("42".into()).get::<i64>().unwrap(), 42);
        assert_eq!(Value::Int(3).get::<f64>().unwrap(), 3.0);
        assert_eq!(Value::Float(7.0).get::<i32>().unwrap(), 7);
        assert_eq!(Value::Int(10).get::<String>().unwrap(), "10");
        assert!(Value::String("TRUE".into()).get::<bool>().unwrap());
        assert_eq!(
            Value::from(vec![1i64, 2]).get::<Vec<i64>>().unwrap(),
            vec![1, 2]
        );
        assert_eq!(Value::Null.get::<Option<i64>>().unwrap(), None);
    }

    #[test]
    fn readers_reject_lossy_reads() {
        assert!(matches!(
            Value::Float(1.5).get::<i64>(),
            Err(QueryError::Conversion { target: "i64", .. })
        ));
        assert!(Value::Int(-1).get::<u64>().is_err());
        assert!(Value::param("age").get::<i64>().is_err());
    }

    #[test]
    fn type_hints_use_last_segment() {
        assert_eq!(TypeHint::parse("java.lang.Integer").unwrap(), TypeHint::Int);
        assert_eq!(TypeHint::parse("Double").unwrap(), TypeHint::Float);
        assert_eq!(TypeHint::parse("bool").unwrap(), TypeHint::Bool);
        assert!(matches!(
            TypeHint::parse("java.time.Instant"),
            Err(QueryError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn convert_maps_lists_elementwise() {
        let list = Value::from(vec!["1", "2"]);
        assert_eq!(
            list.convert(TypeHint::Int).unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn bind_substitutes_nested_params() {
        let mut params = Params::new();
        params.declare("age");
        params.bind("age", Value::Int(12));
        let value = Value::document([Column::new("age", Value::param("age"))]);
        assert_eq!(
            value.bind(&params).unwrap(),
            Value::document([Column::new("age", 12i64)])
        );
        assert!(Value::param("missing").bind(&params).is_err());
    }

    #[test]
    fn json_round_trip_keeps_documents() {
        let json = serde_json::json!({"name": "Ada", "tags": ["a", 1], "score": 1.5});
        let value = Value::from_json(json.clone());
        assert!(matches!(value, Value::Document(_)));
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn display_uses_dsl_forms() {
        assert_eq!(Value::from("Ada").to_string(), "\"Ada\"");
        assert_eq!(Value::Float(10.0).to_string(), "10.0");
        assert_eq!(Value::param("age").to_string(), "@age");
        assert_eq!(Value::from(vec![1i64, 2]).to_string(), "[1, 2]");
    }
}
