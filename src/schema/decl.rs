//! Filter declarations
//!
//! The declarative input of the schema builder. A declaration is either a
//! bare field name or an item describing a filter or a namespace. Items can
//! be written with the builder methods below or deserialized from TOML/JSON:
//!
//! ```toml
//! [[filters]]
//! filter = "title"
//! ordering = true
//! search = true
//!
//! [[filters]]
//! namespace = "author"
//! qs = { kind = "select_related", relations = ["author"] }
//! filters = ["name", { filter = "country", hidden = true }]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::lookups::FilterLookup;
use super::model::FieldMeta;
use crate::projection::Optimization;

/// Documentation metadata carried through to API descriptions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenApiMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub hidden: bool,
}

/// One entry of a filter declaration list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Declaration {
    /// Field name used as filter name and backing source
    Name(String),
    /// Filter or namespace item
    Item(Box<DeclItem>),
}

impl Declaration {
    /// Bare field declaration
    pub fn name(name: impl Into<String>) -> Self {
        Declaration::Name(name.into())
    }

    /// Start a filter item
    pub fn filter(name: impl Into<String>) -> DeclItem {
        DeclItem {
            filter: Some(name.into()),
            ..Default::default()
        }
    }

    /// Start a namespace item
    pub fn namespace(name: impl Into<String>) -> DeclItem {
        DeclItem {
            namespace: Some(name.into()),
            ..Default::default()
        }
    }
}

impl From<&str> for Declaration {
    fn from(name: &str) -> Self {
        Declaration::Name(name.to_string())
    }
}

impl From<String> for Declaration {
    fn from(name: String) -> Self {
        Declaration::Name(name)
    }
}

impl From<DeclItem> for Declaration {
    fn from(item: DeclItem) -> Self {
        Declaration::Item(Box::new(item))
    }
}

/// Filter or namespace declaration
///
/// Exactly one of `filter` / `namespace` identifies the kind; the builder
/// rejects options that do not apply to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookups: Option<BTreeSet<FilterLookup>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub null_values: Option<BTreeSet<String>>,
    pub use_repr: bool,
    pub ordering: bool,
    pub search: bool,
    pub custom: bool,
    pub dynamic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldMeta>,
    pub distinct: bool,
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qs: Option<Optimization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openapi: Option<OpenApiMeta>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Declaration>,
}

impl DeclItem {
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    pub fn lookups(mut self, lookups: impl IntoIterator<Item = FilterLookup>) -> Self {
        self.lookups = Some(lookups.into_iter().collect());
        self
    }

    pub fn null_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.null_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn use_repr(mut self) -> Self {
        self.use_repr = true;
        self
    }

    pub fn ordering(mut self) -> Self {
        self.ordering = true;
        self
    }

    pub fn search(mut self) -> Self {
        self.search = true;
        self
    }

    pub fn custom(mut self) -> Self {
        self.custom = true;
        self
    }

    /// Computed field described by `field` metadata instead of the model
    pub fn dynamic(mut self, field: FieldMeta) -> Self {
        self.dynamic = true;
        self.field = Some(field);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn qs(mut self, optimization: Optimization) -> Self {
        self.qs = Some(optimization);
        self
    }

    pub fn openapi(mut self, meta: OpenApiMeta) -> Self {
        self.openapi = Some(meta);
        self
    }

    /// Add a nested declaration (namespaces only)
    pub fn with(mut self, declaration: impl Into<Declaration>) -> Self {
        self.filters.push(declaration.into());
        self
    }
}
