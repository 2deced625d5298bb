//! Error taxonomy shared by the parser, condition builder, prepared statements,
//! and backends.

use std::fmt;

use thiserror::Error;

/// Longest input fragment echoed back in a syntax error.
const FRAGMENT_LEN: usize = 32;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, QueryError>;

/// Errors raised while parsing, building, binding, or executing queries.
///
/// Backends report their own feature gaps through [`QueryError::Unsupported`];
/// the query core propagates those unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Malformed DSL text.
    #[error("syntax error: {message} near '{fragment}'")]
    Syntax {
        /// What the parser expected or rejected.
        message: String,
        /// Offending input starting at the failing token.
        fragment: String,
    },
    /// The statement does not start with `select`, `delete`, `insert`, or `update`.
    #[error("invalid query: command not recognized in '{fragment}'")]
    UnrecognizedCommand {
        /// Leading input that failed dispatch.
        fragment: String,
    },
    /// A statement omitted its entity name.
    #[error("{command} query requires an entity name")]
    MissingEntity {
        /// Command that was missing the entity.
        command: &'static str,
    },
    /// A condition operator is not valid in this position.
    #[error("operator '{operator}' is not supported")]
    UnsupportedOperator {
        /// Operator name as written or as its condition kind.
        operator: String,
    },
    /// `convert(value, Type)` named a type with no registered reader.
    #[error("convert() does not support type '{type_name}'")]
    UnsupportedType {
        /// Type name as written in the query.
        type_name: String,
    },
    /// A value could not be read as the requested type.
    #[error("cannot convert {value} to {target}")]
    Conversion {
        /// Rendered source value.
        value: String,
        /// Requested target type.
        target: &'static str,
    },
    /// A condition constructor was given a shape it cannot represent.
    #[error("invalid condition: {0}")]
    InvalidCondition(&'static str),
    /// Fluent builder methods were called out of order.
    #[error("invalid builder usage: {0}")]
    Builder(&'static str),
    /// A parameterized query was run through the non-prepared entry point.
    #[error("query declares parameters {names:?}; use a prepared statement instead")]
    ParametersRequirePrepare {
        /// Declared parameter names.
        names: Vec<String>,
    },
    /// A prepared statement executed with parameters still unbound.
    #[error("Check all parameters before execute: unbound {names:?}")]
    UnboundParameters {
        /// Names still waiting for a value.
        names: Vec<String>,
    },
    /// A single-result call produced more than one row.
    #[error("non-unique result: query returned {count} rows")]
    NonUniqueResult {
        /// Rows returned by the backend.
        count: usize,
    },
    /// Backend-specific feature gap.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    /// Input exceeded a configured parser limit.
    #[error("{what} exceeds maximum of {max} (got {found})")]
    LimitExceeded {
        /// Limited quantity.
        what: &'static str,
        /// Configured maximum.
        max: usize,
        /// Observed value.
        found: usize,
    },
}

impl QueryError {
    /// Builds a [`QueryError::Syntax`] quoting at most a short prefix of `rest`.
    pub fn syntax(message: impl Into<String>, rest: &str) -> Self {
        QueryError::Syntax {
            message: message.into(),
            fragment: fragment(rest),
        }
    }

    /// Builds a [`QueryError::UnrecognizedCommand`] for the given input.
    pub fn unrecognized(input: &str) -> Self {
        QueryError::UnrecognizedCommand {
            fragment: fragment(input),
        }
    }

    /// Builds a [`QueryError::Unsupported`] from any displayable message.
    pub fn unsupported(message: impl fmt::Display) -> Self {
        QueryError::Unsupported(message.to_string())
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::Syntax { .. } => "Syntax",
            QueryError::UnrecognizedCommand { .. } => "UnrecognizedCommand",
            QueryError::MissingEntity { .. } => "MissingEntity",
            QueryError::UnsupportedOperator { .. } => "UnsupportedOperator",
            QueryError::UnsupportedType { .. } => "UnsupportedType",
            QueryError::Conversion { .. } => "Conversion",
            QueryError::InvalidCondition(_) => "InvalidCondition",
            QueryError::Builder(_) => "Builder",
            QueryError::ParametersRequirePrepare { .. } => "ParametersRequirePrepare",
            QueryError::UnboundParameters { .. } => "UnboundParameters",
            QueryError::NonUniqueResult { .. } => "NonUniqueResult",
            QueryError::Unsupported(_) => "Unsupported",
            QueryError::LimitExceeded { .. } => "LimitExceeded",
        }
    }
}

/// Convenience wrapper that formats query errors with their codes.
pub struct QueryErrorWithCode<'a>(pub &'a QueryError);

impl fmt::Display for QueryErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}

fn fragment(rest: &str) -> String {
    let trimmed = rest.trim_start();
    match trimmed.char_indices().nth(FRAGMENT_LEN) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_owned(),
    }
}
