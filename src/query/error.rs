//! RQL error types
//!
//! Defines the per-request error conditions raised while parsing and
//! compiling a query. Schema declaration problems live in
//! [`crate::schema::SchemaError`] and are never raised per request.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Structured detail attached to every per-request error
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorDetails {
    /// Filter name the error refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Lookup that was attempted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup: Option<String>,
    /// Raw value from the query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Free-form description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Byte offset into the query text (syntax errors only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl ErrorDetails {
    /// Details naming a filter, a lookup and the offending raw value
    pub fn filter(
        filter: impl Into<String>,
        lookup: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            filter: Some(filter.into()),
            lookup: Some(lookup.into()),
            value: Some(value.into()),
            ..Default::default()
        }
    }

    /// Details carrying a message only
    pub fn message(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

impl fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(error) = &self.error {
            parts.push(error.clone());
        }
        if let Some(filter) = &self.filter {
            parts.push(format!("filter={}", filter));
        }
        if let Some(lookup) = &self.lookup {
            parts.push(format!("lookup={}", lookup));
        }
        if let Some(value) = &self.value {
            parts.push(format!("value={}", value));
        }
        if let Some(position) = self.position {
            parts.push(format!("position={}", position));
        }
        f.write_str(&parts.join(", "))
    }
}

/// Errors that can occur while parsing or compiling an RQL query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RqlError {
    /// Malformed query text or malformed select/ordering structure
    #[error("RQL Parsing error. {0}")]
    Parsing(ErrorDetails),

    /// Lookup not permitted for the resolved filter
    #[error("RQL Lookup error. {0}")]
    Lookup(ErrorDetails),

    /// Value failed type coercion
    #[error("RQL Value error. {0}")]
    Value(ErrorDetails),
}

impl RqlError {
    /// Parsing error with a message
    pub fn parsing(error: impl Into<String>) -> Self {
        RqlError::Parsing(ErrorDetails::message(error))
    }

    /// Syntax error at a byte offset of the query text
    pub fn syntax(position: usize) -> Self {
        RqlError::Parsing(ErrorDetails {
            error: Some("Bad filter query.".to_string()),
            position: Some(position),
            ..Default::default()
        })
    }

    /// Lookup error for a filter
    pub fn lookup(
        filter: impl Into<String>,
        lookup: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        RqlError::Lookup(ErrorDetails::filter(filter, lookup, value))
    }

    /// Value error for a filter
    pub fn value(
        filter: impl Into<String>,
        lookup: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        RqlError::Value(ErrorDetails::filter(filter, lookup, value))
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            RqlError::Parsing(_) => "RQL_PARSING_ERROR",
            RqlError::Lookup(_) => "RQL_LOOKUP_ERROR",
            RqlError::Value(_) => "RQL_VALUE_ERROR",
        }
    }

    /// Structured details of the error
    pub fn details(&self) -> &ErrorDetails {
        match self {
            RqlError::Parsing(d) | RqlError::Lookup(d) | RqlError::Value(d) => d,
        }
    }
}

/// Result type for query operations
pub type RqlResult<T> = Result<T, RqlError>;
