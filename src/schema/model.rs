//! Data model metadata
//!
//! Describes the backing records a schema is declared against: scalar field
//! types with their constraints, and relations to other models. Models are
//! plain data and can be loaded from TOML/JSON.
//!
//! ```toml
//! [models.book]
//! fields.id = { kind = "scalar", type = "int", primary_key = true }
//! fields.title = { kind = "scalar", type = "string", blank = true }
//! fields.author = { kind = "relation", model = "author" }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::{SchemaError, SchemaResult};

/// Value type of a scalar field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ValueType {
    Int,
    Decimal { places: u32 },
    Float,
    Date,
    DateTime,
    String,
    Boolean,
}

impl ValueType {
    /// Numeric-like types (ordered comparisons apply)
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Int | Self::Decimal { .. } | Self::Float | Self::Date | Self::DateTime
        )
    }
}

/// A stored choice value and its display label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

impl Choice {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Metadata of a scalar field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMeta {
    #[serde(flatten)]
    pub value_type: ValueType,

    #[serde(default)]
    pub nullable: bool,

    #[serde(default)]
    pub blank: bool,

    #[serde(default)]
    pub primary_key: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Choice>>,
}

impl FieldMeta {
    /// Create metadata for a non-null, non-blank field of the given type
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            nullable: false,
            blank: false,
            primary_key: false,
            choices: None,
        }
    }

    pub fn int() -> Self {
        Self::new(ValueType::Int)
    }

    pub fn decimal(places: u32) -> Self {
        Self::new(ValueType::Decimal { places })
    }

    pub fn float() -> Self {
        Self::new(ValueType::Float)
    }

    pub fn date() -> Self {
        Self::new(ValueType::Date)
    }

    pub fn datetime() -> Self {
        Self::new(ValueType::DateTime)
    }

    pub fn string() -> Self {
        Self::new(ValueType::String)
    }

    pub fn boolean() -> Self {
        Self::new(ValueType::Boolean)
    }

    /// Allow null values
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Allow blank values
    pub fn blank(mut self) -> Self {
        self.blank = true;
        self
    }

    /// Mark as primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Restrict to the given choices
    pub fn choices(mut self, choices: impl IntoIterator<Item = Choice>) -> Self {
        self.choices = Some(choices.into_iter().collect());
        self
    }
}

/// A model field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Field {
    /// Plain value column
    Scalar(FieldMeta),
    /// Link to another model; `many` for collection-valued relations
    Relation {
        model: String,
        #[serde(default)]
        many: bool,
    },
}

/// A named record type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    #[serde(default)]
    pub fields: IndexMap<String, Field>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    /// Add a scalar field
    pub fn field(mut self, name: impl Into<String>, meta: FieldMeta) -> Self {
        self.fields.insert(name.into(), Field::Scalar(meta));
        self
    }

    /// Add a single-valued relation
    pub fn relation(mut self, name: impl Into<String>, model: impl Into<String>) -> Self {
        self.fields.insert(
            name.into(),
            Field::Relation {
                model: model.into(),
                many: false,
            },
        );
        self
    }

    /// Add a collection-valued relation
    pub fn relation_many(mut self, name: impl Into<String>, model: impl Into<String>) -> Self {
        self.fields.insert(
            name.into(),
            Field::Relation {
                model: model.into(),
                many: true,
            },
        );
        self
    }
}

/// A scalar field reached through a route
#[derive(Debug, Clone, Copy)]
pub struct ResolvedField<'a> {
    pub meta: &'a FieldMeta,
}

/// A relation reached through a route
#[derive(Debug, Clone, Copy)]
pub struct ResolvedRelation<'a> {
    pub model: &'a Model,
    pub many: bool,
}

/// Set of models that relations can point into
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub models: HashMap<String, Model>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under its own name
    pub fn with_model(mut self, model: Model) -> Self {
        self.models.insert(model.name.clone(), model);
        self
    }

    /// Look up a model by name
    pub fn model(&self, name: &str) -> SchemaResult<&Model> {
        self.models
            .get(name)
            .ok_or_else(|| SchemaError::UnknownModel(name.to_string()))
    }

    /// Resolve a route ending in a scalar field
    pub fn scalar<'a>(&'a self, model: &'a Model, route: &str) -> SchemaResult<ResolvedField<'a>> {
        match self.walk(model, route)? {
            Field::Scalar(meta) => Ok(ResolvedField { meta }),
            Field::Relation { .. } => Err(SchemaError::NotScalar(route.to_string())),
        }
    }

    /// Resolve a route ending in a relation
    pub fn relation<'a>(
        &'a self,
        model: &'a Model,
        route: &str,
    ) -> SchemaResult<ResolvedRelation<'a>> {
        match self.walk(model, route)? {
            Field::Relation { model, many } => Ok(ResolvedRelation {
                model: self.model(model)?,
                many: *many,
            }),
            Field::Scalar(_) => Err(SchemaError::NotRelation(route.to_string())),
        }
    }

    fn walk<'a>(&'a self, model: &'a Model, route: &str) -> SchemaResult<&'a Field> {
        let parts = route_parts(route);
        let mut current = model;

        for (index, part) in parts.iter().enumerate() {
            let field = current
                .fields
                .get(*part)
                .ok_or_else(|| SchemaError::UnknownField {
                    model: current.name.clone(),
                    field: part.to_string(),
                })?;

            if index == parts.len() - 1 {
                return Ok(field);
            }

            match field {
                Field::Relation { model, .. } => current = self.model(model)?,
                Field::Scalar(_) => return Err(SchemaError::NotRelation(part.to_string())),
            }
        }

        Err(SchemaError::UnknownField {
            model: model.name.clone(),
            field: route.to_string(),
        })
    }
}

/// Split a route on `.`, or on `__` when it has no dots
pub fn route_parts(route: &str) -> Vec<&str> {
    if route.is_empty() {
        return Vec::new();
    }
    if route.contains('.') {
        route.split('.').collect()
    } else {
        route.split("__").collect()
    }
}

/// Normalize a route to its dotted form
pub fn dotted_route(route: &str) -> String {
    route_parts(route).join(".")
}
