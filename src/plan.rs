//! Query plans
//!
//! A [`QueryPlan`] is the final output handed to a storage adapter: the
//! compiled predicate folded into the caller's base query, the resolved
//! projection and the directives the optimizer chose.

use serde::{Deserialize, Serialize};

use crate::compile::{CompiledQuery, Predicate};
use crate::projection::{optimize, AppliedDirective, SelectionMap};
use crate::query::RqlResult;
use crate::schema::FilterSchema;

/// Constraints the caller applies before any query string
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseQuery {
    #[serde(default)]
    pub predicate: Predicate,
    /// Default ordering, replaced by `ordering()` when present
    #[serde(default)]
    pub ordering: Vec<String>,
}

impl BaseQuery {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            ordering: Vec::new(),
        }
    }

    pub fn ordering<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ordering = keys.into_iter().map(Into::into).collect();
        self
    }
}

/// Executable plan for one request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub predicate: Predicate,
    pub ordering: Vec<String>,
    /// Projection paths explicitly included (`true`) or excluded (`false`)
    pub selection: SelectionMap,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub distinct: bool,
    /// Directives in application order
    pub directives: Vec<AppliedDirective>,
}

impl QueryPlan {
    /// Resolve projection, run the optimizer and fold in the base query
    pub fn assemble(
        compiled: CompiledQuery,
        schema: &FilterSchema,
        base: &BaseQuery,
    ) -> RqlResult<Self> {
        let selection = if schema.options().select {
            schema
                .projection()
                .resolve_selection(&compiled.select, schema.default_exclusions())?
        } else {
            SelectionMap::new()
        };
        let directives = optimize(schema, &selection, &compiled.touched);

        let ordering = if compiled.ordering.is_empty() {
            base.ordering.clone()
        } else {
            compiled.ordering
        };

        Ok(Self {
            predicate: Predicate::and([base.predicate.clone(), compiled.predicate]),
            ordering,
            selection,
            limit: compiled.limit,
            offset: compiled.offset,
            distinct: compiled.distinct,
            directives,
        })
    }

    /// Whether a projection path is part of the output
    pub fn is_included(&self, path: &str) -> bool {
        self.selection.get(path).copied().unwrap_or(true)
    }
}
