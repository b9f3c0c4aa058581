//! Schema declaration errors
//!
//! Raised while building a [`crate::schema::FilterSchema`]. These describe a
//! broken declaration and are fatal at build time; they never surface per
//! request.

use thiserror::Error;

/// Errors that can occur while building a filter schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("{model}: unknown field '{field}'")]
    UnknownField { model: String, field: String },

    #[error("Unsupported field type: {0}.")]
    NotScalar(String),

    #[error("{0}: field is not a relation.")]
    NotRelation(String),

    #[error("'{0}' is a reserved filter name.")]
    ReservedName(String),

    #[error("{0}: filter is declared more than once.")]
    DuplicateFilter(String),

    #[error("{name}: '{option}' is not supported by namespaces.")]
    NamespaceOption { name: String, option: &'static str },

    #[error("All extended filters must have 'filter' set.")]
    MissingFilterName,

    #[error("{0}: custom filters must specify possible lookups.")]
    CustomWithoutLookups(String),

    #[error("{name}: 'use_repr' and '{option}' can't be used together.")]
    UseReprConflict { name: String, option: &'static str },

    #[error("{0}: dynamic filters are not supported in namespaces.")]
    DynamicInNamespace(String),

    #[error("{0}: dynamic filters must have 'field' set.")]
    DynamicWithoutField(String),

    #[error("{0}: common filters can't have 'field' set.")]
    FieldOnCommonFilter(String),

    #[error("{0}: 'search' can be applied only to text filters.")]
    SearchOnNonText(String),

    #[error("{0}: at least one optimization must be specified.")]
    EmptyOptimization(String),

    #[error("Extended search route '{0}' must point at a text field.")]
    BadSearchRoute(String),

    #[error("Invalid declaration: {0}")]
    Declaration(String),
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
