//! Schema builder
//!
//! Flattens a declaration list into dotted filter names while building the
//! parallel projection tree. Runs once per schema; every problem found here
//! is a [`SchemaError`].

use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::decl::{DeclItem, Declaration};
use super::descriptor::{FilterDescriptor, FilterKind, NamespaceInfo, SchemaOptions};
use super::error::{SchemaError, SchemaResult};
use super::hooks::{DefaultHooks, FilterHooks};
use super::lookups::FilterLookup;
use super::model::{dotted_route, Catalog, FieldMeta, Model, ValueType};
use super::{FilterSchema, SchemaInner};
use crate::projection::{
    insert_node, BoundDirective, DirectiveId, NodeSpec, Optimization, ProjectionLevel,
    ProjectionTree,
};
use crate::query::{RESERVED_FILTER_NAMES, RQL_NULL};

/// Builder for [`FilterSchema`]
pub struct SchemaBuilder<'c> {
    name: String,
    catalog: &'c Catalog,
    model: String,
    declarations: Vec<Declaration>,
    options: SchemaOptions,
    hooks: Arc<dyn FilterHooks>,
}

impl<'c> SchemaBuilder<'c> {
    /// Start a schema named `name` over `model` from `catalog`
    pub fn new(name: impl Into<String>, catalog: &'c Catalog, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            catalog,
            model: model.into(),
            declarations: Vec::new(),
            options: SchemaOptions::default(),
            hooks: Arc::new(DefaultHooks),
        }
    }

    /// Add one declaration
    pub fn declare(mut self, declaration: impl Into<Declaration>) -> Self {
        self.declarations.push(declaration.into());
        self
    }

    /// Add several declarations
    pub fn declarations(mut self, declarations: impl IntoIterator<Item = Declaration>) -> Self {
        self.declarations.extend(declarations);
        self
    }

    pub fn options(mut self, options: SchemaOptions) -> Self {
        self.options = options;
        self
    }

    /// Require distinct rows for every query
    pub fn distinct(mut self, distinct: bool) -> Self {
        self.options.distinct = distinct;
        self
    }

    /// Enable or disable `select()` support
    pub fn select(mut self, select: bool) -> Self {
        self.options.select = select;
        self
    }

    /// Add a backing path that always takes part in `search=`
    pub fn extended_search_route(mut self, route: impl Into<String>) -> Self {
        self.options.extended_search_routes.push(route.into());
        self
    }

    pub fn unknown_filters(mut self, policy: super::UnknownFilterPolicy) -> Self {
        self.options.unknown_filters = policy;
        self
    }

    pub fn hooks(mut self, hooks: impl FilterHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Build the schema
    pub fn build(self) -> SchemaResult<FilterSchema> {
        let model = self.catalog.model(&self.model)?;
        let mut state = BuildState::new(self.catalog);
        let mut roots = ProjectionLevel::new();

        let root = Level {
            filter_route: String::new(),
            orm_route: String::new(),
            model,
            parent_qs: None,
            distinct: false,
        };
        state.build_level(&self.declarations, &root, &mut roots)?;
        state.extend_annotations();

        let mut options = self.options;
        options.extended_search_routes = options
            .extended_search_routes
            .iter()
            .map(|route| {
                let field = self.catalog.scalar(model, route)?;
                if field.meta.value_type != ValueType::String {
                    return Err(SchemaError::BadSearchRoute(route.clone()));
                }
                Ok(dotted_route(route))
            })
            .collect::<SchemaResult<_>>()?;

        tracing::info!(
            schema = %self.name,
            model = %self.model,
            filters = state.filters.len(),
            namespaces = state.namespaces.len(),
            directives = state.next_id,
            "Built filter schema"
        );

        Ok(FilterSchema {
            inner: Arc::new(SchemaInner {
                name: self.name,
                filters: state.filters,
                namespaces: state.namespaces,
                ordering_filters: state.ordering_filters,
                search_filters: state.search_filters,
                projection: ProjectionTree::from_roots(roots),
                default_exclusions: state.default_exclusions,
                annotations: state.annotations,
                options,
                hooks: self.hooks,
            }),
        })
    }
}

/// Declaration context of one nesting level
struct Level<'m> {
    /// Dotted filter name prefix, `""` or ending with `.`
    filter_route: String,
    /// Dotted backing path prefix, `""` or ending with `.`
    orm_route: String,
    model: &'m Model,
    /// Nearest ancestor directive
    parent_qs: Option<Optimization>,
    /// Inherited from distinct namespaces
    distinct: bool,
}

struct BuildState<'c> {
    catalog: &'c Catalog,
    filters: IndexMap<String, FilterDescriptor>,
    namespaces: BTreeMap<String, NamespaceInfo>,
    ordering_filters: BTreeSet<String>,
    search_filters: BTreeSet<String>,
    default_exclusions: BTreeSet<String>,
    annotations: BTreeMap<String, Vec<BoundDirective>>,
    next_id: u32,
}

impl<'c> BuildState<'c> {
    fn new(catalog: &'c Catalog) -> Self {
        Self {
            catalog,
            filters: IndexMap::new(),
            namespaces: BTreeMap::new(),
            ordering_filters: BTreeSet::new(),
            search_filters: BTreeSet::new(),
            default_exclusions: BTreeSet::new(),
            annotations: BTreeMap::new(),
            next_id: 0,
        }
    }

    fn build_level(
        &mut self,
        declarations: &[Declaration],
        level: &Level<'c>,
        tree: &mut ProjectionLevel,
    ) -> SchemaResult<()> {
        for declaration in declarations {
            match declaration {
                Declaration::Name(name) => self.build_plain(name, level, tree)?,
                Declaration::Item(item) if item.namespace.is_some() => {
                    self.build_namespace(item, level, tree)?
                }
                Declaration::Item(item) => self.build_filter(item, level, tree)?,
            }
        }
        Ok(())
    }

    fn build_plain(
        &mut self,
        name: &str,
        level: &Level<'c>,
        tree: &mut ProjectionLevel,
    ) -> SchemaResult<()> {
        let full_name = format!("{}{}", level.filter_route, name);
        let field = self.catalog.scalar(level.model, name)?;
        let descriptor = mapped_descriptor(
            full_name,
            vec![format!("{}{}", level.orm_route, dotted_route(name))],
            field.meta.clone(),
            &DeclItem::default(),
            level.distinct,
        );

        self.add_filter(descriptor)?;
        self.fill_tree(tree, level, name, NodeKind::Filter, false, None)?;
        Ok(())
    }

    fn build_namespace(
        &mut self,
        item: &DeclItem,
        level: &Level<'c>,
        tree: &mut ProjectionLevel,
    ) -> SchemaResult<()> {
        let namespace = item.namespace.as_deref().unwrap_or_default();
        for (option, set) in [
            ("filter", item.filter.is_some()),
            ("dynamic", item.dynamic),
            ("custom", item.custom),
        ] {
            if set {
                return Err(SchemaError::NamespaceOption {
                    name: namespace.to_string(),
                    option,
                });
            }
        }

        let catalog = self.catalog;
        let source = item.source.as_deref().unwrap_or(namespace);
        let relation = catalog.relation(level.model, source)?;
        let full_name = format!("{}{}", level.filter_route, namespace);
        let route = format!("{}{}", level.orm_route, dotted_route(source));
        let distinct = level.distinct || item.distinct;

        self.namespaces.insert(
            full_name.clone(),
            NamespaceInfo {
                name: full_name.clone(),
                route: route.clone(),
                many: relation.many,
                hidden: item.hidden,
                distinct,
            },
        );

        let (children, parent_qs) = self.fill_tree(
            tree,
            level,
            namespace,
            NodeKind::Namespace,
            item.hidden,
            item.qs.as_ref(),
        )?;

        let nested = Level {
            filter_route: format!("{}.", full_name),
            orm_route: format!("{}.", route),
            model: relation.model,
            parent_qs,
            distinct,
        };
        self.build_level(&item.filters, &nested, children)
    }

    fn build_filter(
        &mut self,
        item: &DeclItem,
        level: &Level<'c>,
        tree: &mut ProjectionLevel,
    ) -> SchemaResult<()> {
        let name = item.filter.as_deref().ok_or(SchemaError::MissingFilterName)?;
        let full_name = format!("{}{}", level.filter_route, name);

        self.fill_tree(
            tree,
            level,
            name,
            NodeKind::Filter,
            item.hidden,
            item.qs.as_ref(),
        )?;

        if item.custom {
            let lookups = item
                .lookups
                .clone()
                .ok_or_else(|| SchemaError::CustomWithoutLookups(full_name.clone()))?;
            let descriptor = FilterDescriptor {
                name: full_name,
                kind: FilterKind::Custom,
                lookups,
                null_values: item.null_values.clone().unwrap_or_default(),
                use_repr: item.use_repr,
                distinct: item.distinct || level.distinct,
                ordering: item.ordering,
                search: item.search,
                hidden: item.hidden,
                openapi: item.openapi.clone(),
            };
            return self.add_filter(descriptor);
        }

        check_use_repr(item, &full_name)?;
        check_dynamic(item, &full_name, level)?;

        let sources: Vec<&str> = match &item.sources {
            Some(sources) => sources.iter().map(String::as_str).collect(),
            None => vec![item.source.as_deref().unwrap_or(name)],
        };

        let mut field = item.field.clone();
        let mut routes = Vec::with_capacity(sources.len());
        for source in sources {
            if !item.dynamic {
                let resolved = self.catalog.scalar(level.model, source)?;
                field.get_or_insert_with(|| resolved.meta.clone());
            }
            routes.push(format!("{}{}", level.orm_route, dotted_route(source)));
        }

        let field = field.ok_or_else(|| {
            SchemaError::Declaration(format!("{}: no backing source.", full_name))
        })?;
        if item.search && field.value_type != ValueType::String {
            return Err(SchemaError::SearchOnNonText(full_name));
        }

        let descriptor = mapped_descriptor(full_name, routes, field, item, level.distinct);
        self.add_filter(descriptor)
    }

    /// Insert the projection node of a declaration
    ///
    /// Returns the node's children and the ancestor directive its own
    /// children rebuild against.
    fn fill_tree<'t>(
        &mut self,
        tree: &'t mut ProjectionLevel,
        level: &Level<'c>,
        local_name: &str,
        kind: NodeKind,
        hidden: bool,
        qs: Option<&Optimization>,
    ) -> SchemaResult<(&'t mut ProjectionLevel, Option<Optimization>)> {
        let full_name = format!("{}{}", level.filter_route, local_name);
        if hidden {
            self.default_exclusions.insert(full_name.clone());
        }

        let directive = match qs {
            Some(qs) => {
                qs.validate(&full_name)?;
                let id = self.next_directive_id();
                let optimization = if qs.is_annotation() {
                    self.annotations.insert(
                        full_name.clone(),
                        vec![BoundDirective {
                            id,
                            optimization: qs.clone(),
                        }],
                    );
                    qs.clone()
                } else {
                    qs.rebuild(level.parent_qs.as_ref().filter(|p| !p.is_annotation()))
                };
                Some(BoundDirective { id, optimization })
            }
            None => None,
        };

        let parent_qs = match &directive {
            Some(bound) => Some(bound.optimization.clone()),
            None => level.parent_qs.clone(),
        };

        let spec = NodeSpec {
            hidden,
            namespace: kind == NodeKind::Namespace,
            directive,
        };
        let children = insert_node(tree, &level.filter_route, local_name, spec);
        Ok((children, parent_qs))
    }

    fn next_directive_id(&mut self) -> DirectiveId {
        let id = DirectiveId(self.next_id);
        self.next_id += 1;
        id
    }

    fn add_filter(&mut self, descriptor: FilterDescriptor) -> SchemaResult<()> {
        let name = descriptor.name.clone();
        if RESERVED_FILTER_NAMES.contains(&name.as_str()) {
            return Err(SchemaError::ReservedName(name));
        }
        if self.filters.contains_key(&name) {
            return Err(SchemaError::DuplicateFilter(name));
        }

        if descriptor.ordering {
            self.ordering_filters.insert(name.clone());
        }
        if descriptor.search {
            self.search_filters.insert(name.clone());
        }

        tracing::debug!(filter = %name, lookups = descriptor.lookups.len(), "Registered filter");
        self.filters.insert(name, descriptor);
        Ok(())
    }

    /// Associate namespace annotations with every filter below them
    fn extend_annotations(&mut self) {
        let mut extended = BTreeMap::new();

        for name in self.filters.keys() {
            let mut inherited: Vec<BoundDirective> = Vec::new();
            let mut prefix = String::new();
            let parts: Vec<&str> = name.split('.').collect();

            for part in &parts[..parts.len() - 1] {
                prefix.push_str(part);
                if let Some(annotations) = self.annotations.get(&prefix) {
                    inherited.extend(annotations.iter().cloned());
                }
                prefix.push('.');
            }

            if inherited.is_empty() {
                continue;
            }
            if let Some(own) = self.annotations.get(name) {
                inherited.extend(own.iter().cloned());
            }
            extended.insert(name.clone(), inherited);
        }

        self.annotations.extend(extended);
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Filter,
    Namespace,
}

fn mapped_descriptor(
    name: String,
    sources: Vec<String>,
    field: FieldMeta,
    item: &DeclItem,
    inherited_distinct: bool,
) -> FilterDescriptor {
    let mut lookups = item
        .lookups
        .clone()
        .unwrap_or_else(|| FilterLookup::defaults_for(field.value_type));
    if !(field.nullable || field.primary_key) {
        lookups.remove(&FilterLookup::Null);
    }

    let null_values = item
        .null_values
        .clone()
        .unwrap_or_else(|| [RQL_NULL.to_string()].into_iter().collect());

    FilterDescriptor {
        name,
        kind: FilterKind::Field {
            sources,
            field,
            dynamic: item.dynamic,
        },
        lookups,
        null_values,
        use_repr: item.use_repr,
        distinct: item.distinct || inherited_distinct,
        ordering: item.ordering,
        search: item.search,
        hidden: item.hidden,
        openapi: item.openapi.clone(),
    }
}

fn check_use_repr(item: &DeclItem, name: &str) -> SchemaResult<()> {
    if item.use_repr {
        for (option, set) in [("ordering", item.ordering), ("search", item.search)] {
            if set {
                return Err(SchemaError::UseReprConflict {
                    name: name.to_string(),
                    option,
                });
            }
        }
    }
    Ok(())
}

fn check_dynamic(item: &DeclItem, name: &str, level: &Level<'_>) -> SchemaResult<()> {
    if item.dynamic {
        if !level.filter_route.is_empty() {
            return Err(SchemaError::DynamicInNamespace(name.to_string()));
        }
        if item.field.is_none() {
            return Err(SchemaError::DynamicWithoutField(name.to_string()));
        }
    } else if item.field.is_some() {
        return Err(SchemaError::FieldOnCommonFilter(name.to_string()));
    }
    Ok(())
}

/// Complete schema declaration as loaded from a TOML/JSON file
///
/// ```toml
/// name = "books"
/// model = "book"
/// filters = ["id", { filter = "title", search = true }]
///
/// [options]
/// unknown_filters = "reject"
///
/// [models.book]
/// name = "book"
/// fields.id = { kind = "scalar", type = "int", primary_key = true }
/// fields.title = { kind = "scalar", type = "string" }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaDefinition {
    pub name: String,
    pub model: String,
    #[serde(default)]
    pub options: SchemaOptions,
    #[serde(default)]
    pub filters: Vec<Declaration>,
    #[serde(flatten)]
    pub catalog: Catalog,
}

impl SchemaDefinition {
    /// Parse a definition from TOML text
    pub fn from_toml(content: &str) -> SchemaResult<Self> {
        toml::from_str(content).map_err(|e| SchemaError::Declaration(e.to_string()))
    }

    /// Parse a definition from JSON text
    pub fn from_json(content: &str) -> SchemaResult<Self> {
        serde_json::from_str(content).map_err(|e| SchemaError::Declaration(e.to_string()))
    }

    /// Build the declared schema with default hooks
    pub fn build(&self) -> SchemaResult<FilterSchema> {
        SchemaBuilder::new(self.name.clone(), &self.catalog, self.model.clone())
            .declarations(self.filters.iter().cloned())
            .options(self.options.clone())
            .build()
    }
}
