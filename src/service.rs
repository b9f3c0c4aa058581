//! Query service
//!
//! Ties the pipeline together for one schema: decode the raw query string,
//! parse it, compile it, assemble the plan and cache the result for
//! read-only requests.
//!
//! ```text
//! raw query → decode → parse → compile → assemble → QueryPlan
//!                                   ↑                   ↓
//!                                   └── QueryCache ─────┘
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use crate::cache::{Fingerprint, QueryCache, RequestMethod};
use crate::compile::{compile, CompiledQuery};
use crate::config::Config;
use crate::plan::{BaseQuery, QueryPlan};
use crate::query::{CachedParser, RqlError, RqlResult};
use crate::schema::FilterSchema;

/// Percent-decode a raw query string
pub fn decode_query(raw: &str) -> RqlResult<Cow<'_, str>> {
    urlencoding::decode(raw).map_err(|e| {
        tracing::debug!(query = %raw, error = %e, "Undecodable query string");
        RqlError::parsing("Bad filter query.")
    })
}

/// Compiles query strings against one schema
pub struct QueryService {
    schema: FilterSchema,
    parser: CachedParser,
    cache: Option<QueryCache>,
}

impl QueryService {
    /// Service with default parser memo and plan cache
    pub fn new(schema: FilterSchema) -> Self {
        Self::from_config(schema, &Config::default())
    }

    pub fn from_config(schema: FilterSchema, config: &Config) -> Self {
        let cache = QueryCache::from_config(&config.cache);
        tracing::info!(
            schema = %schema.name(),
            cache = cache.is_some(),
            policy = ?config.cache.policy,
            "Created query service"
        );

        Self {
            schema,
            parser: CachedParser::new(config.parser.cache_capacity),
            cache,
        }
    }

    /// Replace the plan cache
    pub fn with_cache(mut self, cache: Option<QueryCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn schema(&self) -> &FilterSchema {
        &self.schema
    }

    pub fn cache(&self) -> Option<&QueryCache> {
        self.cache.as_ref()
    }

    /// Decode, parse and compile a raw query string
    pub fn compile(&self, raw: &str) -> RqlResult<CompiledQuery> {
        let query = decode_query(raw)?;
        let ast = self.parser.parse(&query)?;
        compile(ast.as_deref(), &self.schema)
    }

    /// Build a plan without consulting the cache
    pub fn plan(&self, raw: &str, base: &BaseQuery) -> RqlResult<QueryPlan> {
        let compiled = self.compile(raw)?;
        QueryPlan::assemble(compiled, &self.schema, base)
    }

    /// Build a plan, serving read-only requests from the cache
    pub fn apply(
        &self,
        method: RequestMethod,
        raw: &str,
        base: &BaseQuery,
    ) -> RqlResult<Arc<QueryPlan>> {
        let cache = match &self.cache {
            Some(cache) if method.is_cacheable() => cache,
            _ => return self.plan(raw, base).map(Arc::new),
        };

        let key = match Fingerprint::new(self.schema.name(), raw, base) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(
                    schema = %self.schema.name(),
                    error = %e,
                    "Base query not serializable, bypassing plan cache"
                );
                return self.plan(raw, base).map(Arc::new);
            }
        };
        cache.get_or_try_insert_with(key, || self.plan(raw, base))
    }

    /// Drop cached plans and memoized ASTs
    pub fn clear(&self) {
        self.parser.clear();
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }
}
