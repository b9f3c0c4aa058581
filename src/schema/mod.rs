//! Filter Schema
//!
//! Declarative description of which filters a resource exposes and how they
//! map onto backing fields:
//!
//! - **Model**: Backing record metadata (value types, nullability, relations)
//! - **Decl**: Declaration items accepted by the builder
//! - **Builder**: Validation and flattening into a [`FilterSchema`]
//! - **Registry**: Process-scoped store of built schemas
//!
//! # Example
//!
//! ```rust
//! use rql::schema::{Catalog, Declaration, FieldMeta, FilterSchema, Model};
//!
//! let catalog = Catalog::new().with_model(
//!     Model::new("book")
//!         .field("id", FieldMeta::int().primary_key())
//!         .field("title", FieldMeta::string()),
//! );
//!
//! let schema = FilterSchema::builder("books", &catalog, "book")
//!     .declare("id")
//!     .declare(Declaration::filter("title").ordering().search())
//!     .build()
//!     .unwrap();
//!
//! assert!(schema.filter("title").is_some());
//! assert!(schema.is_orderable("title"));
//! ```

mod builder;
mod decl;
mod descriptor;
mod error;
mod hooks;
mod lookups;
mod model;
mod registry;

pub use builder::{SchemaBuilder, SchemaDefinition};
pub use decl::{DeclItem, Declaration, OpenApiMeta};
pub use descriptor::{
    FilterDescriptor, FilterKind, NamespaceInfo, SchemaOptions, UnknownFilterPolicy,
};
pub use error::{SchemaError, SchemaResult};
pub use hooks::{DefaultHooks, FilterArgs, FilterHooks, OptimizationArgs};
pub use lookups::FilterLookup;
pub use model::{dotted_route, route_parts, Catalog, Choice, Field, FieldMeta, Model, ValueType};
pub use registry::SchemaRegistry;

use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::projection::{BoundDirective, ProjectionTree};

/// Built, immutable filter schema
///
/// Cloning is cheap; clones share the same maps.
#[derive(Clone)]
pub struct FilterSchema {
    inner: Arc<SchemaInner>,
}

struct SchemaInner {
    name: String,
    filters: IndexMap<String, FilterDescriptor>,
    namespaces: BTreeMap<String, NamespaceInfo>,
    ordering_filters: BTreeSet<String>,
    search_filters: BTreeSet<String>,
    projection: ProjectionTree,
    default_exclusions: BTreeSet<String>,
    annotations: BTreeMap<String, Vec<BoundDirective>>,
    options: SchemaOptions,
    hooks: Arc<dyn FilterHooks>,
}

impl FilterSchema {
    /// Start building a schema over `model`
    pub fn builder<'c>(
        name: impl Into<String>,
        catalog: &'c Catalog,
        model: impl Into<String>,
    ) -> SchemaBuilder<'c> {
        SchemaBuilder::new(name, catalog, model)
    }

    /// Schema identity used in cache fingerprints
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Descriptor of a filter by full dotted name
    pub fn filter(&self, name: &str) -> Option<&FilterDescriptor> {
        self.inner.filters.get(name)
    }

    /// All descriptors in declaration order
    pub fn filters(&self) -> impl Iterator<Item = &FilterDescriptor> {
        self.inner.filters.values()
    }

    /// Namespace by full dotted name
    pub fn namespace(&self, name: &str) -> Option<&NamespaceInfo> {
        self.inner.namespaces.get(name)
    }

    pub fn is_orderable(&self, name: &str) -> bool {
        self.inner.ordering_filters.contains(name)
    }

    pub fn ordering_filters(&self) -> &BTreeSet<String> {
        &self.inner.ordering_filters
    }

    /// Filters taking part in `search=`
    pub fn search_filters(&self) -> &BTreeSet<String> {
        &self.inner.search_filters
    }

    pub fn projection(&self) -> &ProjectionTree {
        &self.inner.projection
    }

    /// Projection paths hidden unless selected
    pub fn default_exclusions(&self) -> &BTreeSet<String> {
        &self.inner.default_exclusions
    }

    /// Annotations applied when the given filter or path is touched
    pub fn annotations_for(&self, name: &str) -> &[BoundDirective] {
        self.inner
            .annotations
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.inner.options
    }

    pub fn hooks(&self) -> &dyn FilterHooks {
        self.inner.hooks.as_ref()
    }
}

impl fmt::Debug for FilterSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSchema")
            .field("name", &self.inner.name)
            .field("filters", &self.inner.filters.len())
            .field("namespaces", &self.inner.namespaces.len())
            .field("options", &self.inner.options)
            .finish()
    }
}
