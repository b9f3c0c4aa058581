//! Process-scoped schema registry
//!
//! Schemas are built once and shared by every request that uses them.

use parking_lot::RwLock;
use std::collections::HashMap;

use super::error::SchemaResult;
use super::FilterSchema;

/// Thread-safe map of built schemas keyed by name
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<String, FilterSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<FilterSchema> {
        self.schemas.read().get(name).cloned()
    }

    /// Register a schema under its own name, replacing any previous one
    pub fn put(&self, schema: FilterSchema) -> Option<FilterSchema> {
        tracing::info!(schema = %schema.name(), "Registered schema");
        self.schemas.write().insert(schema.name().to_string(), schema)
    }

    /// Return the registered schema or build and register it
    ///
    /// The build runs without holding the lock; if two callers race, the
    /// first registered schema wins.
    pub fn get_or_try_insert_with<F>(&self, name: &str, build: F) -> SchemaResult<FilterSchema>
    where
        F: FnOnce() -> SchemaResult<FilterSchema>,
    {
        if let Some(schema) = self.get(name) {
            return Ok(schema);
        }

        let built = build()?;
        let mut schemas = self.schemas.write();
        let schema = schemas
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::info!(schema = %name, "Registered schema");
                built
            })
            .clone();
        Ok(schema)
    }

    pub fn remove(&self, name: &str) -> Option<FilterSchema> {
        self.schemas.write().remove(name)
    }

    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }

    pub fn clear(&self) {
        self.schemas.write().clear();
    }
}
