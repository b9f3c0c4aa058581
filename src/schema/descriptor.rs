//! Built schema records
//!
//! Immutable results of the builder: filter descriptors, namespace info and
//! schema-wide options.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::decl::OpenApiMeta;
use super::lookups::FilterLookup;
use super::model::FieldMeta;

/// How a filter produces its predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterKind {
    /// Backed by one or more model fields (or a computed field when dynamic)
    Field {
        sources: Vec<String>,
        field: FieldMeta,
        dynamic: bool,
    },
    /// Predicate built by [`super::FilterHooks::build_custom_predicate`]
    Custom,
}

/// Schema record for one named filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterDescriptor {
    /// Full dotted name
    pub name: String,
    #[serde(flatten)]
    pub kind: FilterKind,
    pub lookups: BTreeSet<FilterLookup>,
    pub null_values: BTreeSet<String>,
    pub use_repr: bool,
    pub distinct: bool,
    pub ordering: bool,
    pub search: bool,
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openapi: Option<OpenApiMeta>,
}

impl FilterDescriptor {
    /// Backing field metadata (absent for custom filters)
    pub fn field(&self) -> Option<&FieldMeta> {
        match &self.kind {
            FilterKind::Field { field, .. } => Some(field),
            FilterKind::Custom => None,
        }
    }

    /// Backing paths in dotted form (empty for custom filters)
    pub fn sources(&self) -> &[String] {
        match &self.kind {
            FilterKind::Field { sources, .. } => sources,
            FilterKind::Custom => &[],
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self.kind, FilterKind::Custom)
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.kind, FilterKind::Field { dynamic: true, .. })
    }

    pub fn allows(&self, lookup: FilterLookup) -> bool {
        self.lookups.contains(&lookup)
    }
}

/// Built namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceInfo {
    /// Full dotted namespace name
    pub name: String,
    /// Dotted backing relation path
    pub route: String,
    /// Collection-valued relation
    pub many: bool,
    pub hidden: bool,
    pub distinct: bool,
}

/// Handling of filter names the schema does not know
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFilterPolicy {
    /// Treat as an always-true predicate
    #[default]
    Ignore,
    /// Fail with a parsing error
    Reject,
}

/// Schema-wide options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaOptions {
    /// Every compiled query requires distinct rows
    pub distinct: bool,
    /// Enable `select()` projection and the optimization pass
    pub select: bool,
    /// Backing paths that always take part in `search=`
    pub extended_search_routes: Vec<String>,
    pub unknown_filters: UnknownFilterPolicy,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            distinct: false,
            select: true,
            extended_search_routes: Vec::new(),
            unknown_filters: UnknownFilterPolicy::default(),
        }
    }
}
